use utoipa::OpenApi;

use crate::models::{Upload, UploadStatus};
use crate::types::{
    ActivityEntry, ActivityResponse, AskRequest, ChatMessage, ChatRole, ChoiceRequest,
    ContactDetails, DashboardView, RecycleChoice, StageName,
};
use crate::workflow::{AnalyzedItem, PointsMirror, PointsStatus};

/// Payload schemas for the dashboard API, served with Scalar at `/docs`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "EcoPoints API",
        version = "0.1.0",
        description = "Photograph e-waste, get hazard guidance, and earn eco points for recycling it. Every endpoint except /health and /docs expects a bearer session token."
    ),
    components(schemas(
        DashboardView,
        StageName,
        AnalyzedItem,
        RecycleChoice,
        ChoiceRequest,
        ContactDetails,
        ChatMessage,
        ChatRole,
        AskRequest,
        PointsMirror,
        PointsStatus,
        ActivityEntry,
        ActivityResponse,
        Upload,
        UploadStatus,
    ))
)]
pub struct ApiDoc;
