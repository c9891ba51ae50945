//! HTTP server
//!
//! Builds the axum router around a [`NotificationDispatcher`] and serves it
//! with graceful shutdown.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::push::auth::{Authenticator, TriggerSecrets};
use crate::push::dispatcher::NotificationDispatcher;
use crate::push::providers::PushProvider;
use crate::push::stores::{
    InMemoryNotificationStore, InMemoryPushTokenStore, NotificationStore, PushTokenStore,
};
use crate::PushError;

pub use handlers::*;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub trigger_secrets: TriggerSecrets,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            trigger_secrets: TriggerSecrets::default(),
        }
    }
}

/// Shared handler state
pub struct AppState {
    pub dispatcher: Arc<NotificationDispatcher>,
    pub token_store: Arc<dyn PushTokenStore>,
    pub notification_store: Arc<dyn NotificationStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub trigger_secrets: TriggerSecrets,
}

/// Builder for [`PushServer`]
#[derive(Default)]
pub struct PushServerBuilder {
    token_store: Option<Arc<dyn PushTokenStore>>,
    notification_store: Option<Arc<dyn NotificationStore>>,
    providers: Vec<Arc<dyn PushProvider>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    config: ServerConfig,
}

impl PushServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_store(mut self, store: Arc<dyn PushTokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    pub fn with_notification_store(mut self, store: Arc<dyn NotificationStore>) -> Self {
        self.notification_store = Some(store);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Stores default to in-memory; an authenticator is required
    pub fn build(self) -> Result<PushServer, PushError> {
        let authenticator = self
            .authenticator
            .ok_or_else(|| PushError::config("Authenticator is required"))?;
        let token_store = self
            .token_store
            .unwrap_or_else(|| Arc::new(InMemoryPushTokenStore::new()) as Arc<dyn PushTokenStore>);
        let notification_store = self
            .notification_store
            .unwrap_or_else(|| Arc::new(InMemoryNotificationStore::new()) as Arc<dyn NotificationStore>);

        let dispatcher = self.providers.into_iter().fold(
            NotificationDispatcher::new(token_store.clone(), notification_store.clone()),
            |dispatcher, provider| dispatcher.with_provider(provider),
        );

        Ok(PushServer {
            bind_addr: self.config.bind_addr,
            state: Arc::new(AppState {
                dispatcher: Arc::new(dispatcher),
                token_store,
                notification_store,
                authenticator,
                trigger_secrets: self.config.trigger_secrets,
            }),
        })
    }
}

pub struct PushServer {
    bind_addr: SocketAddr,
    state: Arc<AppState>,
}

impl PushServer {
    pub fn build_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                AUTHORIZATION,
                CONTENT_TYPE,
                HeaderName::from_static("x-client-info"),
                HeaderName::from_static("apikey"),
                HeaderName::from_static(WEBHOOK_SECRET_HEADER),
                HeaderName::from_static(INVOKE_SECRET_HEADER),
            ])
            .max_age(Duration::from_secs(60 * 60));

        Router::new()
            .route("/health", get(health_handler))
            .route("/push-tokens", post(register_token_handler))
            .route("/notifications", get(list_notifications_handler))
            .route("/notifications/send", post(send_notification_handler))
            .route("/notify-on-event", post(notify_on_event_handler))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    pub async fn serve(self) -> Result<(), PushError> {
        let router = self.build_router();

        let listener = TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| PushError::internal(&format!("Failed to bind {}: {}", self.bind_addr, e)))?;
        info!("Push service listening on {}", self.bind_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| PushError::internal(&format!("Server error: {}", e)))?;

        info!("Push service shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
