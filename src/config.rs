use anyhow::{anyhow, Context};
use shuttle_runtime::SecretStore;

use crate::workflow::WorkflowOptions;

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const DEFAULT_CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com";
const DEFAULT_RECYCLE_POINTS: i64 = 50;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub database_url: String,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub cloudinary_api_base: String,
    pub cloudinary_cloud_name: String,
    pub cloudinary_upload_preset: String,
    pub cors_origins: Vec<String>,
    pub workflow: WorkflowOptions,
}

impl AppConfig {
    pub fn new(secret_store: &SecretStore) -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| secret_store.get(key))
    }

    /// Builds the config from any key lookup, so tests don't need a secret store.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{} not found", key));

        let jwt_secret = required("JWT_SECRET")?;
        let database_url = required("DATABASE_URL")?;
        let gemini_api_key = required("GEMINI_API_KEY")?;
        let cloudinary_cloud_name = required("CLOUDINARY_CLOUD_NAME")?;
        let cloudinary_upload_preset = required("CLOUDINARY_UPLOAD_PRESET")?;

        let gemini_api_base =
            lookup("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());
        let gemini_model =
            lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let cloudinary_api_base = lookup("CLOUDINARY_API_BASE")
            .unwrap_or_else(|| DEFAULT_CLOUDINARY_API_BASE.to_string());

        let recycle_award = match lookup("RECYCLE_POINTS") {
            Some(value) => value
                .trim()
                .parse::<i64>()
                .with_context(|| format!("RECYCLE_POINTS is not an integer: {}", value))?,
            None => DEFAULT_RECYCLE_POINTS,
        };
        if recycle_award < 0 {
            return Err(anyhow!("RECYCLE_POINTS must not be negative"));
        }

        let host_images = parse_flag(lookup("HOST_IMAGES"), "HOST_IMAGES", true)?;
        let require_details = parse_flag(lookup("REQUIRE_DETAILS"), "REQUIRE_DETAILS", true)?;

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(AppConfig {
            jwt_secret,
            database_url,
            gemini_api_key,
            gemini_api_base,
            gemini_model,
            cloudinary_api_base,
            cloudinary_cloud_name,
            cloudinary_upload_preset,
            cors_origins,
            workflow: WorkflowOptions {
                host_images,
                require_details,
                recycle_award,
            },
        })
    }
}

fn parse_flag(value: Option<String>, key: &str, default: bool) -> Result<bool, anyhow::Error> {
    match value.as_deref().map(str::trim) {
        None => Ok(default),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(anyhow!("{} must be a boolean, got {}", key, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn secrets(extra: &[(&str, &str)]) -> HashMap<String, String> {
        let mut map: HashMap<String, String> = [
            ("JWT_SECRET", "secret"),
            ("DATABASE_URL", "postgres://localhost/ecopoints"),
            ("GEMINI_API_KEY", "gemini-key"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_UPLOAD_PRESET", "unsigned_ewaste"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in extra {
            map.insert(k.to_string(), v.to_string());
        }
        map
    }

    #[test]
    fn defaults_apply_when_optional_secrets_are_missing() {
        let map = secrets(&[]);
        let config = AppConfig::from_lookup(|key| map.get(key).cloned()).unwrap();

        assert_eq!(config.gemini_model, "gemini-1.5-flash");
        assert_eq!(config.workflow.recycle_award, 50);
        assert!(config.workflow.host_images);
        assert!(config.workflow.require_details);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn missing_required_secret_is_named_in_the_error() {
        let mut map = secrets(&[]);
        map.remove("GEMINI_API_KEY");
        let err = AppConfig::from_lookup(|key| map.get(key).cloned()).unwrap_err();
        assert_eq!(err.to_string(), "GEMINI_API_KEY not found");
    }

    #[test]
    fn overrides_are_parsed() {
        let map = secrets(&[
            ("RECYCLE_POINTS", "10"),
            ("HOST_IMAGES", "false"),
            ("REQUIRE_DETAILS", "0"),
            ("CORS_ORIGINS", "http://localhost:5173, https://ewaste.example.com"),
        ]);
        let config = AppConfig::from_lookup(|key| map.get(key).cloned()).unwrap();

        assert_eq!(config.workflow.recycle_award, 10);
        assert!(!config.workflow.host_images);
        assert!(!config.workflow.require_details);
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:5173", "https://ewaste.example.com"]
        );
    }

    #[test]
    fn bad_values_are_rejected() {
        let map = secrets(&[("RECYCLE_POINTS", "lots")]);
        assert!(AppConfig::from_lookup(|key| map.get(key).cloned()).is_err());

        let map = secrets(&[("RECYCLE_POINTS", "-5")]);
        assert!(AppConfig::from_lookup(|key| map.get(key).cloned()).is_err());

        let map = secrets(&[("HOST_IMAGES", "maybe")]);
        assert!(AppConfig::from_lookup(|key| map.get(key).cloned()).is_err());
    }
}
