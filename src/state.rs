use std::sync::Arc;

use crate::auth::{AdminAuth, OtpStore, TokenSigner};
use crate::config::Config;
use crate::db::Database;
use crate::images::{CloudinaryStore, ImageStore, LocalImageStore};
use crate::mail::{self, Mailer};
use crate::{AppError, AppResult};

/// Shared handles for request handlers. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    db: Option<Database>,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
    pub images: Arc<dyn ImageStore>,
    pub auth: Arc<AdminAuth>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Option<Database>,
        mailer: Arc<dyn Mailer>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        let auth = AdminAuth::new(
            config.admin_emails.clone(),
            OtpStore::default(),
            TokenSigner::new(&config.jwt_secret),
        );
        Self {
            db,
            config: Arc::new(config),
            mailer,
            images,
            auth: Arc::new(auth),
        }
    }

    /// Wire mail and image storage from configuration. Neither can fail startup.
    pub fn from_config(config: Config, db: Option<Database>) -> Self {
        let mailer: Arc<dyn Mailer> = Arc::from(mail::from_config(config.smtp.as_ref()));
        let images = image_store(&config);
        Self::new(config, db, mailer, images)
    }

    /// The database, or `DB/UNAVAILABLE` when running degraded.
    pub fn db(&self) -> AppResult<&Database> {
        self.db.as_ref().ok_or_else(AppError::db_unavailable)
    }

    pub fn has_db(&self) -> bool {
        self.db.is_some()
    }
}

pub fn image_store(config: &Config) -> Arc<dyn ImageStore> {
    if let Some(cfg) = &config.cloudinary {
        match CloudinaryStore::new(cfg.clone()) {
            Ok(store) => {
                tracing::info!(target: "imobiliaria", event = "images_ready", store = "cloudinary", cloud = %cfg.cloud_name);
                return Arc::new(store);
            }
            Err(err) => {
                tracing::error!(target: "imobiliaria", event = "images_init_failed", store = "cloudinary", error = %err);
            }
        }
    }
    tracing::info!(
        target: "imobiliaria",
        event = "images_ready",
        store = "local",
        dir = %config.upload_dir.display(),
    );
    Arc::new(LocalImageStore::new(&config.upload_dir, &config.public_base()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::DisabledMailer;

    #[test]
    fn degraded_state_reports_db_unavailable() {
        let config = Config::from_env(&|_: &str| -> Option<String> { None });
        let images = image_store(&config);
        let state = AppState::new(config, None, Arc::new(DisabledMailer), images);
        let err = state.db().expect_err("degraded");
        assert_eq!(err.code(), AppError::DB_UNAVAILABLE_CODE);
        assert_eq!(state.images.kind(), "local");
        assert!(!state.mailer.enabled());
    }
}
