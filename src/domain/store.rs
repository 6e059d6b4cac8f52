use super::{
    BoxFuture,
    error::PipelineError,
    id::{PaymentId, WebhookId},
    payment::{NewPayment, Payment},
};

/// One open storage transaction.
///
/// Dropping a transaction without committing rolls it back.
pub trait PaymentTx: Send {
    /// Read a payment and hold its row lock until the transaction ends.
    fn lock_payment<'a>(
        &'a mut self,
        id: &'a PaymentId,
    ) -> BoxFuture<'a, Result<Option<Payment>, PipelineError>>;

    /// Write back status, instrument snapshot and the applied flag.
    fn save<'a>(&'a mut self, payment: &'a Payment) -> BoxFuture<'a, Result<(), PipelineError>>;

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), PipelineError>>;

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), PipelineError>>;
}

pub trait PaymentStore: Send + Sync {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn PaymentTx>, PipelineError>>;

    fn insert<'a>(&'a self, payment: &'a NewPayment) -> BoxFuture<'a, Result<(), PipelineError>>;

    fn get<'a>(
        &'a self,
        id: &'a PaymentId,
    ) -> BoxFuture<'a, Result<Option<Payment>, PipelineError>>;

    /// Clear a webhook id from the record after the gateway dropped it.
    fn forget_webhook<'a>(
        &'a self,
        id: &'a PaymentId,
        webhook_id: &'a WebhookId,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;
}

/// Close a transaction: commit when `outcome` is `Ok`, roll back otherwise.
///
/// Every transactional path ends here, so no branch can leave a transaction
/// half-finished or commit after a failure.
pub async fn settle<T>(
    tx: Box<dyn PaymentTx>,
    outcome: Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
