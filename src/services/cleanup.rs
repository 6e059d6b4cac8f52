use crate::domain::{
    error::PipelineError, gateway::WebhookRegistry, payment::Payment, store::PaymentStore,
};

/// Deregister the payment's remaining webhook subscriptions.
///
/// Runs after the reconciliation transaction committed. Nothing here is
/// surfaced to the caller: failures are logged and left for the next delivery.
/// A credentials failure stops the pass, since every other call would fail the
/// same way. Returns the number of subscriptions removed.
pub async fn remove_subscriptions(
    store: &dyn PaymentStore,
    registry: &dyn WebhookRegistry,
    payment: &Payment,
) -> usize {
    let mut removed = 0;

    for webhook_id in payment.webhook_ids() {
        match registry.remove_webhook(&webhook_id).await {
            Ok(()) => {
                removed += 1;
                tracing::info!(%webhook_id, "webhook subscription removed");
                if let Err(e) = store
                    .forget_webhook(payment.payment_id(), &webhook_id)
                    .await
                {
                    tracing::warn!(%webhook_id, error = %e, "failed to clear removed webhook id");
                }
            }
            Err(e @ PipelineError::Credentials(_)) => {
                tracing::warn!(%webhook_id, error = %e, "gateway credentials unavailable, cleanup skipped");
                break;
            }
            Err(e) => {
                tracing::warn!(%webhook_id, error = %e, "webhook removal failed");
            }
        }
    }

    removed
}
