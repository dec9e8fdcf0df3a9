// src/state.rs
use crate::config::Config;
use crate::models::ServiceError;
use crate::services::db::Database;
use crate::services::kv_store::KvStore;
use crate::services::mailer::{self, DynMailClient};
use crate::services::oauth::OAuthClient;
use crate::utils::jwt::TokenService;

// Process-wide handles shared by every worker through web::Data
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub kv: KvStore,
    pub mailer: DynMailClient,
    pub tokens: TokenService,
    pub oauth: OAuthClient,
}

impl AppState {
    /// Connects every backing service described by `config`.
    pub async fn connect(config: Config) -> Result<Self, ServiceError> {
        let db = Database::connect(&config.database_url).await?;
        db.migrate().await?;

        let kv = match &config.redis_uri {
            Some(uri) => KvStore::connect_redis(uri).await?,
            None => KvStore::in_memory(),
        };

        Ok(Self {
            mailer: mailer::create_mail_client(&config)?,
            tokens: TokenService::new(&config.jwt_secret, &config.jwt_refresh_secret),
            oauth: OAuthClient::new(&config)?,
            config,
            db,
            kv,
        })
    }

    // Fully in-memory state for tests; the caller keeps a handle on the mail client
    pub async fn in_memory(config: Config, mailer: DynMailClient) -> Result<Self, ServiceError> {
        let db = Database::connect_in_memory().await?;
        db.migrate().await?;

        Ok(Self {
            kv: KvStore::in_memory(),
            tokens: TokenService::new(&config.jwt_secret, &config.jwt_refresh_secret),
            oauth: OAuthClient::new(&config)?,
            mailer,
            config,
            db,
        })
    }
}
