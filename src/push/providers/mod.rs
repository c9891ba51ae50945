//! Push provider clients
//!
//! One client per delivery channel. Clients report a [`DeliveryOutcome`] for
//! every token they were handed; transport failures are folded into failed
//! outcomes instead of aborting the batch.

pub mod expo;
pub mod fcm;

pub use expo::*;
pub use fcm::*;

use crate::{DeliveryOutcome, PushMessage, TokenScheme};
use async_trait::async_trait;

/// Push Provider interface
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Token scheme this provider delivers to
    fn scheme(&self) -> TokenScheme;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Delivers `message` to each token, returning one outcome per token
    async fn deliver(&self, tokens: &[String], message: &PushMessage) -> Vec<DeliveryOutcome>;
}
