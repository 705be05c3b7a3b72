use crate::queue::{CertificateGenerator, CertificateQueue};
use crate::rate_limit::BadRequestLimiter;
use crate::settings_cache::SettingsCache;
use coursehub_common::AppConfig;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub queue: Arc<dyn CertificateQueue>,
    pub settings: SettingsCache,
    pub callback_limiter: BadRequestLimiter,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig, queue: Arc<dyn CertificateQueue>) -> Self {
        let settings = SettingsCache::new(
            Duration::from_secs(config.config_cache_ttl_secs),
            config.certs_html_view_config_path.clone(),
        );
        let callback_limiter = BadRequestLimiter::new(
            config.callback_bad_request_limit,
            Duration::from_secs(config.callback_bad_request_window_secs),
        );
        Self {
            db,
            config: Arc::new(config),
            queue,
            settings,
            callback_limiter,
        }
    }

    pub fn generator(&self) -> CertificateGenerator<'_> {
        CertificateGenerator::new(&self.db, &self.config, self.queue.as_ref())
    }
}
