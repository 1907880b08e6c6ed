use crate::domain::{
    BackendMessage, BackendRole, ContentPart, ConversationTurn, InstructionRole, MessageContent,
    RequestContext, Role,
};

/// Turns caller-supplied conversation turns into backend messages.
///
/// Pure and shape-agnostic: the instruction role (`developer` or `system`) is a
/// parameter so the same history renders for either call shape.
pub struct HistoryFormatter;

impl HistoryFormatter {
    /// Format the history, injecting `developer_message` first when the
    /// history carries no developer turn of its own.
    pub fn format(
        history: &[ConversationTurn],
        developer_message: Option<&str>,
        instruction_role: InstructionRole,
    ) -> Vec<BackendMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);

        let has_developer_turn = history.iter().any(|t| t.role() == Role::Developer);
        if let Some(text) = developer_message.filter(|_| !has_developer_turn) {
            messages.push(BackendMessage::text(instruction_role.into(), text));
        }

        messages.extend(history.iter().map(|turn| Self::format_turn(turn, instruction_role)));
        messages
    }

    /// Format the whole request: history, optional instruction, then the
    /// caller's current message.
    pub fn format_request(ctx: &RequestContext, instruction_role: InstructionRole) -> Vec<BackendMessage> {
        let mut messages = Self::format(ctx.history(), ctx.developer_message(), instruction_role);
        messages.push(Self::format_turn(&ctx.current_turn(), instruction_role));
        messages
    }

    pub fn format_turn(turn: &ConversationTurn, instruction_role: InstructionRole) -> BackendMessage {
        match turn.role() {
            Role::User => match turn.image() {
                Some(image) => BackendMessage::parts(
                    BackendRole::User,
                    vec![
                        ContentPart::Text(turn.text().to_string()),
                        ContentPart::ImageUrl(Self::image_data_uri(image)),
                    ],
                ),
                None => BackendMessage::text(BackendRole::User, turn.text()),
            },
            Role::Assistant => BackendMessage::text(BackendRole::Assistant, turn.text()),
            Role::Developer => BackendMessage::text(instruction_role.into(), turn.text()),
        }
    }

    /// Re-render instruction messages under another role, e.g. when a call is
    /// retried against a different endpoint.
    pub fn with_instruction_role(
        messages: Vec<BackendMessage>,
        instruction_role: InstructionRole,
    ) -> Vec<BackendMessage> {
        messages
            .into_iter()
            .map(|mut message| {
                if message.role.is_instruction() {
                    message.role = instruction_role.into();
                }
                message
            })
            .collect()
    }

    /// Replace multi-part user content with its text, for models without vision.
    pub fn without_images(messages: Vec<BackendMessage>) -> Vec<BackendMessage> {
        messages
            .into_iter()
            .map(|message| match message.content {
                MessageContent::Parts(_) => {
                    let text = message.plain_text();
                    BackendMessage::text(message.role, text)
                }
                MessageContent::Text(_) => message,
            })
            .collect()
    }

    /// Wrap a base64 payload in a data URI. Payloads that already are data
    /// URIs pass through.
    pub fn image_data_uri(payload: &str) -> String {
        let payload = payload.trim();
        if payload.starts_with("data:") {
            return payload.to_string();
        }
        format!("data:{};base64,{}", sniff_image_mime(payload), payload)
    }
}

/// Guess the MIME type from the base64 encoding of the file's magic bytes.
fn sniff_image_mime(base64_payload: &str) -> &'static str {
    if base64_payload.starts_with("iVBORw0KGgo") {
        "image/png"
    } else if base64_payload.starts_with("R0lGOD") {
        "image/gif"
    } else if base64_payload.starts_with("UklGR") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_history() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::user("What is Rust?"),
            ConversationTurn::assistant("A systems programming language."),
            ConversationTurn::user_with_image("And this?", "/9j/4AAQSkZJRg=="),
        ]
    }

    #[test]
    fn test_format_preserves_order_and_length() {
        let history = sample_history();
        let messages = HistoryFormatter::format(&history, None, InstructionRole::System);

        assert_eq!(messages.len(), history.len());
        assert_eq!(messages[0].role, BackendRole::User);
        assert_eq!(messages[1].role, BackendRole::Assistant);
        assert_eq!(messages[1].plain_text(), "A systems programming language.");
        assert!(messages[2].has_image());
    }

    #[test]
    fn test_user_image_becomes_multipart() {
        let history = vec![ConversationTurn::user_with_image("look", "/9j/abc")];
        let messages = HistoryFormatter::format(&history, None, InstructionRole::Developer);

        assert_eq!(
            messages[0].content,
            MessageContent::Parts(vec![
                ContentPart::Text("look".to_string()),
                ContentPart::ImageUrl("data:image/jpeg;base64,/9j/abc".to_string()),
            ])
        );
    }

    #[test]
    fn test_developer_message_injected_first() {
        let history = sample_history();
        let messages =
            HistoryFormatter::format(&history, Some("Be brief."), InstructionRole::Developer);

        assert_eq!(messages.len(), history.len() + 1);
        assert_eq!(messages[0], BackendMessage::text(BackendRole::Developer, "Be brief."));
        assert_eq!(messages[1].plain_text(), "What is Rust?");
    }

    #[test]
    fn test_developer_message_not_injected_when_history_has_one() {
        let history = vec![
            ConversationTurn::developer("Answer in French."),
            ConversationTurn::user("Hello"),
        ];
        let messages =
            HistoryFormatter::format(&history, Some("Be brief."), InstructionRole::System);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], BackendMessage::text(BackendRole::System, "Answer in French."));
    }

    #[test]
    fn test_developer_turn_rendering_follows_instruction_role() {
        let history = vec![ConversationTurn::developer("rules")];

        let developer = HistoryFormatter::format(&history, None, InstructionRole::Developer);
        let system = HistoryFormatter::format(&history, None, InstructionRole::System);

        assert_eq!(developer[0].role, BackendRole::Developer);
        assert_eq!(system[0].role, BackendRole::System);
    }

    #[test]
    fn test_format_request_appends_current_message() {
        let ctx = RequestContext::new("Hello")
            .with_history(sample_history())
            .with_image("iVBORw0KGgoAAAA");
        let messages = HistoryFormatter::format_request(&ctx, InstructionRole::System);

        let last = messages.last().unwrap();
        assert_eq!(last.role, BackendRole::User);
        assert_eq!(
            last.content,
            MessageContent::Parts(vec![
                ContentPart::Text("Hello".to_string()),
                ContentPart::ImageUrl("data:image/png;base64,iVBORw0KGgoAAAA".to_string()),
            ])
        );
    }

    #[test]
    fn test_with_instruction_role_rewrites_only_instructions() {
        let messages = vec![
            BackendMessage::text(BackendRole::Developer, "rules"),
            BackendMessage::text(BackendRole::User, "hi"),
        ];
        let rewritten = HistoryFormatter::with_instruction_role(messages, InstructionRole::System);

        assert_eq!(rewritten[0].role, BackendRole::System);
        assert_eq!(rewritten[1].role, BackendRole::User);
    }

    #[test]
    fn test_without_images_keeps_text() {
        let history = vec![ConversationTurn::user_with_image("caption", "/9j/abc")];
        let messages = HistoryFormatter::without_images(HistoryFormatter::format(
            &history,
            None,
            InstructionRole::System,
        ));

        assert_eq!(messages[0], BackendMessage::text(BackendRole::User, "caption"));
    }

    #[test]
    fn test_existing_data_uri_passes_through() {
        let uri = "data:image/webp;base64,UklGRabc";
        assert_eq!(HistoryFormatter::image_data_uri(uri), uri);
        assert_eq!(
            HistoryFormatter::image_data_uri("R0lGODlh"),
            "data:image/gif;base64,R0lGODlh"
        );
    }
}
