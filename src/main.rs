use std::str::FromStr;
use std::sync::Arc;

use alerta_push::push::{
    auth::{Authenticator, InMemoryAuthenticator, SupabaseAuthenticator},
    config::ServiceConfig,
    providers::{ExpoPushClient, FcmPushClient},
    server::PushServerBuilder,
    stores::{SqliteNotificationStore, SqlitePushTokenStore},
};
use anyhow::Context;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = ServiceConfig::from_env()?;

    info!("Opening database {}", config.database_url);
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .context("invalid DATABASE_URL")?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options)
        .await
        .context("failed to open database")?;

    let token_store = SqlitePushTokenStore::new(pool.clone());
    token_store.initialize().await?;
    let notification_store = SqliteNotificationStore::new(pool);
    notification_store.initialize().await?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("failed to build HTTP client")?;

    let authenticator: Arc<dyn Authenticator> = match &config.supabase {
        Some(supabase) => Arc::new(SupabaseAuthenticator::new(
            http.clone(),
            &supabase.url,
            supabase.anon_key.clone(),
            supabase.service_role_key.clone(),
        )),
        None => {
            warn!("Supabase credentials not set; authenticated routes will reject every caller");
            Arc::new(InMemoryAuthenticator::new())
        }
    };

    let mut builder = PushServerBuilder::new()
        .with_token_store(Arc::new(token_store))
        .with_notification_store(Arc::new(notification_store))
        .with_authenticator(authenticator)
        .with_provider(Arc::new(ExpoPushClient::with_endpoint(
            http.clone(),
            config.expo_push_url.clone(),
        )))
        .with_config(config.server_config());

    if let Some(key) = &config.fcm_server_key {
        builder = builder.with_provider(Arc::new(FcmPushClient::with_endpoint(
            http.clone(),
            config.fcm_url.clone(),
            key.clone(),
        )));
    }

    builder.build()?.serve().await?;
    Ok(())
}
