//! In-memory stand-ins for the remote services, shared by unit and route tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use tokio::sync::Notify;

use crate::cloudinary::ImageHost;
use crate::gemini::Assistant;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{NewUpload, Upload, User};
use crate::store::UploadStore;
use crate::types::ActivityQuery;

pub fn user(id: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: id.to_string(),
        name: None,
        email: Some(format!("{}@example.com", id)),
    }
}

#[derive(Default)]
pub struct FakeAssistant {
    reply: Mutex<String>,
    failure: Mutex<Option<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    called: Notify,
    image_calls: AtomicUsize,
    text_calls: AtomicUsize,
}

impl FakeAssistant {
    pub fn replying(reply: &str) -> Self {
        FakeAssistant {
            reply: Mutex::new(reply.to_string()),
            ..Default::default()
        }
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Image analysis blocks until the returned gate is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub async fn wait_until_called(&self) {
        self.called.notified().await;
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    fn outcome(&self) -> Result<String> {
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(self.reply.lock().unwrap().clone()),
        }
    }
}

#[async_trait]
impl Assistant for FakeAssistant {
    async fn identify_hazards(&self, _image: &[u8], _mime: &str) -> Result<String> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.called.notify_one();
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.outcome()
    }

    async fn answer(&self, _question: &str) -> Result<String> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        self.outcome()
    }
}

#[derive(Default)]
pub struct FakeHost {
    url: String,
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeHost {
    pub fn returning(url: &str) -> Self {
        FakeHost {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageHost for FakeHost {
    async fn upload(&self, _image: &[u8], _mime: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(self.url.clone()),
        }
    }
}

/// Uploads get strictly increasing timestamps unless the clock is frozen.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    uploads: Mutex<Vec<Upload>>,
    fail_inserts: AtomicBool,
    fail_awards: AtomicBool,
    fail_reads: AtomicBool,
    frozen_clock: AtomicBool,
    award_gate: Mutex<Option<Arc<Notify>>>,
    awarding: Notify,
    add_points_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn balance(&self, user_id: &str) -> i64 {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.eco_points)
            .unwrap_or(0)
    }

    pub fn add_points_calls(&self) -> usize {
        self.add_points_calls.load(Ordering::SeqCst)
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_awards(&self, fail: bool) {
        self.fail_awards.store(fail, Ordering::SeqCst);
    }

    /// Activity listing fails; writes and the balance still work.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Every later upload shares the same `created_at`.
    pub fn freeze_clock(&self) {
        self.frozen_clock.store(true, Ordering::SeqCst);
    }

    /// Points increments block until the returned gate is notified.
    pub fn hold_awards(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.award_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub async fn wait_until_awarding(&self) {
        self.awarding.notified().await;
    }
}

#[async_trait]
impl UploadStore for MemoryStore {
    async fn ensure_user(&self, user_id: &str, display_name: &str, email: &str) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        if let Some(existing) = users.iter().find(|u| u.id == user_id) {
            return Ok(existing.clone());
        }
        let user = User {
            id: user_id.to_string(),
            display_name: display_name.to_string(),
            email: email.to_string(),
            ..Default::default()
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn insert_upload(&self, upload: NewUpload) -> Result<Upload> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(anyhow!("insert rejected"));
        }
        let mut uploads = self.uploads.lock().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap();
        let created_at = if self.frozen_clock.load(Ordering::SeqCst) {
            base
        } else {
            base + Duration::seconds(uploads.len() as i64)
        };
        let upload = Upload::from_new(upload, created_at);
        uploads.push(upload.clone());
        Ok(upload)
    }

    async fn add_points(&self, user_id: &str, points: i64) -> Result<i64> {
        self.add_points_calls.fetch_add(1, Ordering::SeqCst);
        self.awarding.notify_one();
        let gate = self.award_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_awards.load(Ordering::SeqCst) {
            return Err(anyhow!("increment rejected"));
        }
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.eco_points += points;
                Ok(user.eco_points)
            }
            None => {
                users.push(User {
                    id: user_id.to_string(),
                    eco_points: points,
                    ..Default::default()
                });
                Ok(points)
            }
        }
    }

    async fn points_total(&self, user_id: &str) -> Result<i64> {
        Ok(self.balance(user_id))
    }

    async fn list_uploads(&self, user_id: &str, page: &ActivityQuery) -> Result<Vec<Upload>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("read timeout"));
        }
        let mut uploads: Vec<Upload> = self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.user_id == user_id)
            .filter(|u| page.admits(u.created_at, u.id))
            .cloned()
            .collect();
        uploads.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        uploads.truncate(page.limit() as usize);
        Ok(uploads)
    }
}
