//! Upload-to-reward workflow.
//!
//! A dashboard session walks `Idle -> ImageSelected -> Analyzing -> AwaitingChoice`, then
//! either persists straight away (decline, or accept without the contact form) or goes
//! through `DetailForm` first. Persisting writes one upload record and, for accepted items,
//! one atomic points increment, after which the session is back at `Idle`.
//!
//! Session state sits behind a per-user mutex that is never held across a remote call:
//! a step marks the session `Analyzing`/`Persisting`, releases the lock, awaits the
//! remote services and re-locks to commit. A second trigger arriving in between sees the
//! in-flight stage and is turned away as busy.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cloudinary::ImageHost;
use crate::error::WorkflowError;
use crate::gemini::Assistant;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::upload::recognized_item;
use crate::models::{NewUpload, UploadStatus};
use crate::prompts::Prompts;
use crate::store::UploadStore;
use crate::types::{
    ActivityEntry, ActivityQuery, ActivityResponse, ChatMessage, ContactDetails, DashboardView,
    RecycleChoice, StageName,
};

const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);
const MAX_SESSIONS: u64 = 10_000;

/// Switches that used to be separate dashboard variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowOptions {
    /// Upload to the image host; otherwise the client's preview reference is recorded.
    pub host_images: bool,
    /// Collect the contact form before an accepted item is persisted.
    pub require_details: bool,
    /// Points awarded for an accepted item.
    pub recycle_award: i64,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        WorkflowOptions {
            host_images: true,
            require_details: true,
            recycle_award: 50,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SelectedImage {
    pub bytes: Bytes,
    pub mime: String,
    pub preview_ref: String,
}

/// The "last analyzed item": what the AI said about the image, and where the image lives.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct AnalyzedItem {
    pub url: String,
    pub ai_message: String,
    pub recognized_item: Option<String>,
}

impl AnalyzedItem {
    pub fn new(url: String, ai_message: String) -> Self {
        let recognized_item = recognized_item(&ai_message);
        AnalyzedItem {
            url,
            ai_message,
            recognized_item,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PointsStatus {
    Pending,
    Confirmed,
}

/// Local copy of the points balance. Optimistic awards stay `pending` until the store
/// acknowledges them, and fall back to the last confirmed value if it doesn't.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct PointsMirror {
    pub value: i64,
    pub status: PointsStatus,
    #[serde(skip)]
    confirmed: i64,
}

impl Default for PointsMirror {
    fn default() -> Self {
        PointsMirror {
            value: 0,
            status: PointsStatus::Confirmed,
            confirmed: 0,
        }
    }
}

impl PointsMirror {
    pub fn optimistic(&mut self, award: i64) {
        self.value = self.confirmed + award;
        self.status = PointsStatus::Pending;
    }

    pub fn confirm(&mut self, total: i64) {
        self.confirmed = total;
        self.value = total;
        self.status = PointsStatus::Confirmed;
    }

    pub fn revert(&mut self) {
        self.value = self.confirmed;
        self.status = PointsStatus::Confirmed;
    }
}

#[derive(Clone, Debug)]
enum Stage {
    Idle,
    ImageSelected(SelectedImage),
    Analyzing(SelectedImage),
    AwaitingChoice(AnalyzedItem),
    DetailForm {
        item: AnalyzedItem,
        form: ContactDetails,
    },
    Persisting {
        item: AnalyzedItem,
        form: Option<ContactDetails>,
    },
}

impl Stage {
    fn name(&self) -> StageName {
        match self {
            Stage::Idle => StageName::Idle,
            Stage::ImageSelected(_) => StageName::ImageSelected,
            Stage::Analyzing(_) => StageName::Analyzing,
            Stage::AwaitingChoice(_) => StageName::AwaitingChoice,
            Stage::DetailForm { .. } => StageName::DetailForm,
            Stage::Persisting { .. } => StageName::Persisting,
        }
    }

    fn in_flight(&self) -> bool {
        matches!(self, Stage::Analyzing(_) | Stage::Persisting { .. })
    }
}

/// One user's dashboard.
struct Session {
    stage: Stage,
    transcript: Vec<ChatMessage>,
    points: PointsMirror,
    activity: Vec<ActivityEntry>,
    last_error: Option<String>,
}

impl Session {
    fn new() -> Self {
        Session {
            stage: Stage::Idle,
            transcript: Vec::new(),
            points: PointsMirror::default(),
            activity: Vec::new(),
            last_error: None,
        }
    }

    fn view(&self) -> DashboardView {
        let (preview_ref, analyzed_item, choices, form) = match &self.stage {
            Stage::Idle => (None, None, Vec::new(), None),
            Stage::ImageSelected(image) | Stage::Analyzing(image) => {
                (Some(image.preview_ref.clone()), None, Vec::new(), None)
            }
            Stage::AwaitingChoice(item) => (
                None,
                Some(item.clone()),
                vec![RecycleChoice::Recycle, RecycleChoice::NotInterested],
                None,
            ),
            Stage::DetailForm { item, form } => {
                (None, Some(item.clone()), Vec::new(), Some(form.clone()))
            }
            Stage::Persisting { item, .. } => (None, Some(item.clone()), Vec::new(), None),
        };

        DashboardView {
            stage: self.stage.name(),
            preview_ref,
            analyzed_item,
            choices,
            form,
            transcript: self.transcript.clone(),
            points: self.points,
            activity: self.activity.clone(),
            error: self.last_error.clone(),
        }
    }

    /// Records a failure for the dashboard and hands it back to the caller.
    fn fail(&mut self, err: WorkflowError) -> WorkflowError {
        self.last_error = Some(err.to_string());
        err
    }
}

struct Outcome {
    status: UploadStatus,
    points: i64,
    contact: Option<ContactDetails>,
}

pub struct UploadWorkflow {
    assistant: Arc<dyn Assistant>,
    host: Arc<dyn ImageHost>,
    store: Arc<dyn UploadStore>,
    options: WorkflowOptions,
    sessions: Cache<String, Arc<Mutex<Session>>>,
}

impl UploadWorkflow {
    pub fn new(
        assistant: Arc<dyn Assistant>,
        host: Arc<dyn ImageHost>,
        store: Arc<dyn UploadStore>,
        options: WorkflowOptions,
    ) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(SESSION_IDLE_TIMEOUT)
            .build();

        Self {
            assistant,
            host,
            store,
            options,
            sessions,
        }
    }

    pub fn options(&self) -> WorkflowOptions {
        self.options
    }

    async fn session(&self, user: &AuthenticatedUser) -> Arc<Mutex<Session>> {
        self.sessions
            .get_with(user.user_id.clone(), async {
                Arc::new(Mutex::new(Session::new()))
            })
            .await
    }

    /// Session start: make sure the user exists, then load the balance and recent activity.
    pub async fn start_session(
        &self,
        user: &AuthenticatedUser,
    ) -> Result<DashboardView, WorkflowError> {
        let handle = self.session(user).await;

        let email = user.email.clone().unwrap_or_default();
        self.store
            .ensure_user(&user.user_id, &user.display_name(), &email)
            .await
            .map_err(|e| {
                error!("Failed to load user {}: {:?}", user.user_id, e);
                WorkflowError::remote(&e)
            })?;

        let refreshed = self.refresh(&user.user_id).await;

        let mut session = handle.lock().await;
        match refreshed {
            Ok((total, activity)) => {
                // An in-flight award owns the mirror until the store confirms it.
                if !session.stage.in_flight() {
                    session.points.confirm(total);
                }
                session.activity = activity;
                info!("Session started for {} with {} points", user.user_id, total);
                Ok(session.view())
            }
            Err(e) => Err(session.fail(WorkflowError::remote(&e))),
        }
    }

    pub async fn view(&self, user: &AuthenticatedUser) -> DashboardView {
        let handle = self.session(user).await;
        let session = handle.lock().await;
        session.view()
    }

    pub async fn select_image(
        &self,
        user: &AuthenticatedUser,
        bytes: Bytes,
        mime: &str,
        preview_ref: Option<String>,
    ) -> DashboardView {
        let handle = self.session(user).await;
        let mut session = handle.lock().await;

        if matches!(session.stage, Stage::Idle | Stage::ImageSelected(_)) {
            let preview_ref = preview_ref
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| format!("preview:{}", Uuid::new_v4()));
            debug!(
                "User {} selected a {} byte {} image",
                user.user_id,
                bytes.len(),
                mime
            );
            session.stage = Stage::ImageSelected(SelectedImage {
                bytes,
                mime: mime.to_string(),
                preview_ref,
            });
            session.last_error = None;
        } else {
            debug!(
                "Ignoring image selection for {} in stage {:?}",
                user.user_id,
                session.stage.name()
            );
        }

        session.view()
    }

    pub async fn analyze(&self, user: &AuthenticatedUser) -> Result<DashboardView, WorkflowError> {
        let handle = self.session(user).await;

        let image = {
            let mut session = handle.lock().await;
            let image = match &session.stage {
                Stage::ImageSelected(image) => image.clone(),
                stage if stage.in_flight() => return Err(WorkflowError::Busy),
                _ => return Ok(session.view()),
            };
            session.stage = Stage::Analyzing(image.clone());
            session.last_error = None;
            session.transcript.push(ChatMessage::user(
                Prompts::IMAGE_UPLOADED,
                Some(image.preview_ref.clone()),
            ));
            image
        };

        let result = self.run_analysis(&image).await;

        let mut session = handle.lock().await;
        match result {
            Ok(item) => {
                info!(
                    "Analyzed image for {}: {:?}",
                    user.user_id, item.recognized_item
                );
                session.transcript.push(ChatMessage::assistant(
                    &item.ai_message,
                    Some(item.url.clone()),
                ));
                session.stage = Stage::AwaitingChoice(item);
                Ok(session.view())
            }
            Err(e) => {
                warn!("Analysis failed for {}: {:?}", user.user_id, e);
                session.stage = Stage::ImageSelected(image);
                Err(session.fail(WorkflowError::remote(&e)))
            }
        }
    }

    async fn run_analysis(&self, image: &SelectedImage) -> anyhow::Result<AnalyzedItem> {
        let url = if self.options.host_images {
            self.host.upload(&image.bytes, &image.mime).await?
        } else {
            image.preview_ref.clone()
        };

        let ai_message = self
            .assistant
            .identify_hazards(&image.bytes, &image.mime)
            .await?;

        Ok(AnalyzedItem::new(url, ai_message))
    }

    pub async fn choose(
        &self,
        user: &AuthenticatedUser,
        choice: RecycleChoice,
    ) -> Result<DashboardView, WorkflowError> {
        let handle = self.session(user).await;

        let (item, outcome) = {
            let mut session = handle.lock().await;
            let item = match &session.stage {
                Stage::AwaitingChoice(item) => item.clone(),
                stage if stage.in_flight() => return Err(WorkflowError::Busy),
                _ => return Ok(session.view()),
            };
            session.last_error = None;

            match choice {
                RecycleChoice::NotInterested => {
                    session.stage = Stage::Persisting {
                        item: item.clone(),
                        form: None,
                    };
                    let outcome = Outcome {
                        status: UploadStatus::NotInterested,
                        points: 0,
                        contact: None,
                    };
                    (item, outcome)
                }
                RecycleChoice::Recycle if self.options.require_details => {
                    let form = ContactDetails {
                        name: user.display_name(),
                        email: user.email.clone().unwrap_or_default(),
                        item_name: item.recognized_item.clone().unwrap_or_default(),
                        ..Default::default()
                    };
                    session.stage = Stage::DetailForm { item, form };
                    return Ok(session.view());
                }
                RecycleChoice::Recycle => {
                    session.stage = Stage::Persisting {
                        item: item.clone(),
                        form: None,
                    };
                    session.points.optimistic(self.options.recycle_award);
                    let outcome = Outcome {
                        status: UploadStatus::Recycled,
                        points: self.options.recycle_award,
                        contact: None,
                    };
                    (item, outcome)
                }
            }
        };

        self.persist(user, &handle, item, outcome).await
    }

    /// Incomplete forms are ignored and the form stays open.
    pub async fn submit_details(
        &self,
        user: &AuthenticatedUser,
        form: ContactDetails,
    ) -> Result<DashboardView, WorkflowError> {
        let handle = self.session(user).await;

        let (item, outcome) = {
            let mut session = handle.lock().await;
            let item = match &session.stage {
                Stage::DetailForm { item, .. } => item.clone(),
                stage if stage.in_flight() => return Err(WorkflowError::Busy),
                _ => return Ok(session.view()),
            };
            if !form.is_complete() {
                debug!("Ignoring incomplete contact form from {}", user.user_id);
                return Ok(session.view());
            }

            let form = form.trimmed();
            session.last_error = None;
            session.stage = Stage::Persisting {
                item: item.clone(),
                form: Some(form.clone()),
            };
            session.points.optimistic(self.options.recycle_award);
            let outcome = Outcome {
                status: UploadStatus::Recycled,
                points: self.options.recycle_award,
                contact: Some(form),
            };
            (item, outcome)
        };

        self.persist(user, &handle, item, outcome).await
    }

    /// Writes the record, applies the award, then refreshes totals and activity.
    /// The session must already be in `Persisting`.
    async fn persist(
        &self,
        user: &AuthenticatedUser,
        handle: &Arc<Mutex<Session>>,
        item: AnalyzedItem,
        outcome: Outcome,
    ) -> Result<DashboardView, WorkflowError> {
        let points = outcome.points;
        let new_upload = NewUpload {
            user_id: user.user_id.clone(),
            url: item.url.clone(),
            ai_message: item.ai_message.clone(),
            status: outcome.status,
            points,
            contact: outcome.contact,
        };

        // uploads.user_id references users; the session may not have been started.
        let email = user.email.clone().unwrap_or_default();
        let inserted = match self
            .store
            .ensure_user(&user.user_id, &user.display_name(), &email)
            .await
        {
            Ok(_) => self.store.insert_upload(new_upload).await,
            Err(e) => Err(e),
        };

        let upload = match inserted {
            Ok(upload) => upload,
            Err(e) => {
                error!("Failed to save upload for {}: {:?}", user.user_id, e);
                let mut session = handle.lock().await;
                // Nothing was written, so the choice can be made again.
                session.stage = match std::mem::replace(&mut session.stage, Stage::Idle) {
                    Stage::Persisting {
                        item,
                        form: Some(form),
                    } => Stage::DetailForm { item, form },
                    Stage::Persisting { item, form: None } => Stage::AwaitingChoice(item),
                    other => other,
                };
                session.points.revert();
                return Err(session.fail(WorkflowError::persist(&e)));
            }
        };
        info!(
            "Saved upload {} for {} as {:?} (+{})",
            upload.id, user.user_id, upload.status, upload.points
        );

        let awarded_total = if points > 0 {
            match self.store.add_points(&user.user_id, points).await {
                Ok(total) => Some(total),
                Err(e) => {
                    error!("Failed to award points to {}: {:?}", user.user_id, e);
                    let mut session = handle.lock().await;
                    // The record exists; retrying the choice would duplicate it.
                    session.stage = Stage::Idle;
                    session.points.revert();
                    return Err(session.fail(WorkflowError::persist(&e)));
                }
            }
        } else {
            None
        };

        let refreshed = self.refresh(&user.user_id).await;

        let mut session = handle.lock().await;
        session.stage = Stage::Idle;
        match awarded_total {
            Some(total) => session.points.confirm(total),
            None => session.points.revert(),
        }
        match refreshed {
            Ok((total, activity)) => {
                session.points.confirm(total);
                session.activity = activity;
                Ok(session.view())
            }
            Err(e) => {
                error!("Failed to refresh activity for {}: {:?}", user.user_id, e);
                Err(session.fail(WorkflowError::persist(&e)))
            }
        }
    }

    async fn refresh(&self, user_id: &str) -> anyhow::Result<(i64, Vec<ActivityEntry>)> {
        let total = self.store.points_total(user_id).await?;
        let uploads = self
            .store
            .list_uploads(user_id, &ActivityQuery::default())
            .await?;
        Ok((total, uploads.into_iter().map(ActivityEntry::from).collect()))
    }

    /// Free-text question to the assistant. Blank questions are ignored.
    pub async fn ask(
        &self,
        user: &AuthenticatedUser,
        question: &str,
    ) -> Result<DashboardView, WorkflowError> {
        let handle = self.session(user).await;
        let question = question.trim();

        {
            let mut session = handle.lock().await;
            if question.is_empty() {
                return Ok(session.view());
            }
            session.last_error = None;
            session.transcript.push(ChatMessage::user(question, None));
        }

        let result = self.assistant.answer(question).await;

        let mut session = handle.lock().await;
        match result {
            Ok(answer) => {
                session.transcript.push(ChatMessage::assistant(&answer, None));
                Ok(session.view())
            }
            Err(e) => {
                warn!("Question from {} failed: {:?}", user.user_id, e);
                Err(session.fail(WorkflowError::remote(&e)))
            }
        }
    }

    /// A page of the activity feed with the current balance. Does not touch the session.
    pub async fn activity(
        &self,
        user: &AuthenticatedUser,
        query: &ActivityQuery,
    ) -> Result<ActivityResponse, WorkflowError> {
        let total = self
            .store
            .points_total(&user.user_id)
            .await
            .map_err(|e| WorkflowError::remote(&e))?;
        let uploads = self
            .store
            .list_uploads(&user.user_id, query)
            .await
            .map_err(|e| WorkflowError::remote(&e))?;

        Ok(ActivityResponse::new(total, uploads, query.limit()))
    }
}
