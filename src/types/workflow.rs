use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{ActivityEntry, ChatMessage};
use crate::workflow::{AnalyzedItem, PointsMirror};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecycleChoice {
    Recycle,
    NotInterested,
}

#[derive(Deserialize, ToSchema)]
pub struct ChoiceRequest {
    pub choice: RecycleChoice,
}

#[derive(Deserialize, ToSchema)]
pub struct SelectImageQuery {
    pub preview_ref: Option<String>,
}

/// Pickup contact form. Every field is required.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub item_name: String,
    pub description: String,
    pub location: String,
}

impl ContactDetails {
    pub fn is_complete(&self) -> bool {
        [
            &self.name,
            &self.email,
            &self.phone,
            &self.item_name,
            &self.description,
            &self.location,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }

    pub fn trimmed(self) -> Self {
        ContactDetails {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            item_name: self.item_name.trim().to_string(),
            description: self.description.trim().to_string(),
            location: self.location.trim().to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Idle,
    ImageSelected,
    Analyzing,
    AwaitingChoice,
    DetailForm,
    Persisting,
}

/// Everything the dashboard renders.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct DashboardView {
    pub stage: StageName,
    pub preview_ref: Option<String>,
    pub analyzed_item: Option<AnalyzedItem>,
    pub choices: Vec<RecycleChoice>,
    pub form: Option<ContactDetails>,
    pub transcript: Vec<ChatMessage>,
    pub points: PointsMirror,
    pub activity: Vec<ActivityEntry>,
    pub error: Option<String>,
}
