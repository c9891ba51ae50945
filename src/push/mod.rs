//! Push notification dispatch
//!
//! Stores, provider clients, the dispatcher that ties them together and the
//! HTTP surface that exposes it.

pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod models;
pub mod providers;
pub mod server;
pub mod stores;
