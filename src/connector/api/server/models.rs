use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub status: &'static str,
    pub models: Vec<ModelEntry>,
}

/// `GET /api/models`
pub async fn list_models(State(container): State<AppState>) -> Json<ModelsResponse> {
    let models = container
        .catalog()
        .list_models()
        .iter()
        .map(|model| ModelEntry {
            id: model.id().to_string(),
            name: model.display_name().to_string(),
            description: model.description().to_string(),
        })
        .collect();

    Json(ModelsResponse {
        status: "success",
        models,
    })
}
