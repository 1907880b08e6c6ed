use serde::Deserialize;

use super::ApiError;

/// A user id as sent by clients: a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserIdParam {
    Number(i64),
    Text(String),
}

impl UserIdParam {
    /// `Ok(None)` for an empty string, an error for anything non-numeric.
    pub fn resolve(&self) -> Result<Option<i64>, ApiError> {
        match self {
            UserIdParam::Number(id) => Ok(Some(*id)),
            UserIdParam::Text(text) if text.trim().is_empty() => Ok(None),
            UserIdParam::Text(text) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("Invalid user_id: {}", text))),
        }
    }
}

pub fn optional_user_id(param: Option<&UserIdParam>) -> Result<Option<i64>, ApiError> {
    match param {
        Some(param) => param.resolve(),
        None => Ok(None),
    }
}

pub fn required_user_id(param: Option<&UserIdParam>) -> Result<i64, ApiError> {
    optional_user_id(param)?.ok_or_else(|| ApiError::bad_request("User ID is required"))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(default)]
    pub user_id: Option<UserIdParam>,
}
