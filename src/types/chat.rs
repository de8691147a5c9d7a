use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Transcript entry. Lives only as long as the dashboard session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ChatMessage {
    pub fn user(text: &str, image: Option<String>) -> Self {
        ChatMessage {
            role: ChatRole::User,
            text: text.to_string(),
            image,
        }
    }

    pub fn assistant(text: &str, image: Option<String>) -> Self {
        ChatMessage {
            role: ChatRole::Assistant,
            text: text.to_string(),
            image,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AskRequest {
    pub question: String,
}
