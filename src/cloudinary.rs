use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::AppConfig;

/// Durable public hosting for uploaded photos.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Stores the image and returns its public URL.
    async fn upload(&self, image: &[u8], mime: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: Option<String>,
    error: Option<CloudinaryError>,
}

#[derive(Deserialize)]
struct CloudinaryError {
    message: String,
}

/// Unsigned uploads against a Cloudinary upload preset; no API secret involved.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    upload_url: String,
    upload_preset: String,
}

impl CloudinaryClient {
    pub fn new(api_base: &str, cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            client: Client::new(),
            upload_url: format!(
                "{}/v1_1/{}/image/upload",
                api_base.trim_end_matches('/'),
                cloud_name
            ),
            upload_preset: upload_preset.to_string(),
        }
    }

    pub fn from_config(app_config: &AppConfig) -> Self {
        Self::new(
            &app_config.cloudinary_api_base,
            &app_config.cloudinary_cloud_name,
            &app_config.cloudinary_upload_preset,
        )
    }
}

fn file_name_for(mime: &str) -> String {
    let extension = mime
        .split('/')
        .nth(1)
        .map(|subtype| subtype.split(';').next().unwrap_or(subtype).trim())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");
    format!("{}.{}", Uuid::new_v4(), extension)
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(&self, image: &[u8], mime: &str) -> Result<String> {
        let file_name = file_name_for(mime);
        info!("Uploading {} ({} bytes) to Cloudinary", file_name, image.len());

        // An unparseable MIME type still uploads, just without a part content type.
        let part = match Part::bytes(image.to_vec())
            .file_name(file_name.clone())
            .mime_str(mime)
        {
            Ok(part) => part,
            Err(_) => Part::bytes(image.to_vec()).file_name(file_name),
        };

        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .context("Cloudinary request failed")?;

        let status = response.status();
        let body = response
            .json::<CloudinaryUploadResponse>()
            .await
            .with_context(|| format!("Unreadable Cloudinary response ({})", status))?;

        match body {
            CloudinaryUploadResponse {
                secure_url: Some(url),
                ..
            } if status.is_success() => Ok(url),
            CloudinaryUploadResponse {
                error: Some(err), ..
            } => {
                error!("Cloudinary rejected upload: {}", err.message);
                Err(anyhow!("Cloudinary upload failed: {}", err.message))
            }
            _ => Err(anyhow!("Cloudinary upload failed")),
        }
    }
}
