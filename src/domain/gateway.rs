use super::{BoxFuture, error::PipelineError, id::WebhookId};

/// Gateway-side webhook subscriptions.
pub trait WebhookRegistry: Send + Sync {
    /// Remove a subscription. A subscription that is already gone counts as
    /// removed.
    fn remove_webhook<'a>(&'a self, id: &'a WebhookId)
    -> BoxFuture<'a, Result<(), PipelineError>>;
}
