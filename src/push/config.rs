//! Service configuration loaded from the environment

use std::{env, fmt::Display, net::SocketAddr, str::FromStr, time::Duration};

use tracing::{info, warn};
use url::Url;

use crate::push::auth::TriggerSecrets;
use crate::push::providers::{EXPO_PUSH_URL, FCM_URL};
use crate::push::server::ServerConfig;
use crate::PushError;

/// Supabase project credentials used to verify callers
#[derive(Debug, Clone)]
pub struct SupabaseSettings {
    pub url: String,
    pub anon_key: String,
    pub service_role_key: String,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub expo_push_url: String,
    pub fcm_url: String,
    /// FCM delivery is disabled without a server key
    pub fcm_server_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub invoke_secret: Option<String>,
    pub supabase: Option<SupabaseSettings>,
    pub http_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: "sqlite://alerta.db".to_string(),
            expo_push_url: EXPO_PUSH_URL.to_string(),
            fcm_url: FCM_URL.to_string(),
            fcm_server_key: None,
            webhook_secret: None,
            invoke_secret: None,
            supabase: None,
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, PushError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PushError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let supabase = match (
            var("SUPABASE_URL"),
            var("SUPABASE_ANON_KEY"),
            var("SUPABASE_SERVICE_ROLE_KEY"),
        ) {
            (Some(url), Some(anon_key), Some(service_role_key)) => Some(SupabaseSettings {
                url: url_or(Some(url), "SUPABASE_URL", String::new())?,
                anon_key,
                service_role_key,
            }),
            (None, None, None) => None,
            _ => {
                return Err(PushError::config(
                    "SUPABASE_URL, SUPABASE_ANON_KEY and SUPABASE_SERVICE_ROLE_KEY must be set together",
                ))
            }
        };

        let fcm_server_key = var("FCM_SERVER_KEY");
        if fcm_server_key.is_none() {
            warn!("FCM_SERVER_KEY not set; FCM tokens will not be delivered");
        }

        Ok(Self {
            bind_addr: parse_or(var("BIND_ADDR"), "BIND_ADDR", defaults.bind_addr)?,
            database_url: string_or(var("DATABASE_URL"), "DATABASE_URL", defaults.database_url),
            expo_push_url: url_or(var("EXPO_PUSH_URL"), "EXPO_PUSH_URL", defaults.expo_push_url)?,
            fcm_url: url_or(var("FCM_URL"), "FCM_URL", defaults.fcm_url)?,
            fcm_server_key,
            webhook_secret: var("WEBHOOK_SECRET"),
            invoke_secret: var("INVOKE_SECRET"),
            supabase,
            http_timeout: Duration::from_secs(parse_or(
                var("HTTP_TIMEOUT_SECS"),
                "HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
        })
    }

    /// HTTP-facing subset of the configuration
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind_addr,
            trigger_secrets: TriggerSecrets {
                webhook_secret: self.webhook_secret.clone(),
                invoke_secret: self.invoke_secret.clone(),
            },
        }
    }
}

fn string_or(value: Option<String>, key: &str, default: String) -> String {
    value.unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default
    })
}

fn url_or(value: Option<String>, key: &str, default: String) -> Result<String, PushError> {
    let raw = string_or(value, key, default);
    Url::parse(&raw).map_err(|e| PushError::config(&format!("Invalid {key} URL {raw:?}: {e}")))?;
    Ok(raw)
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, PushError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e| PushError::config(&format!("Invalid {key} value {raw:?}: {e}"))),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
