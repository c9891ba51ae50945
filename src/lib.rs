//! Alerta Madeira push dispatch service
//!
//! Collects registered device tokens, fans a notification out to the Expo
//! push API and Firebase Cloud Messaging, prunes tokens the providers reject
//! and records one history row per send attempt.

pub mod push;

pub use push::error::PushError;
pub use push::models::*;
