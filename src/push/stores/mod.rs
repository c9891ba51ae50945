//! Storage module
//!
//! Persistence for registered device tokens and the notification history,
//! each with an in-memory and a SQLite implementation.

pub mod push_token_store;
pub mod sql_push_token_store;
pub mod notification_store;
pub mod sql_notification_store;

pub use push_token_store::*;
pub use sql_push_token_store::*;
pub use notification_store::*;
pub use sql_notification_store::*;
