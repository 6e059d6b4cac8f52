use super::{
    BoxFuture, error::PipelineError, notification::CancellationDetails, payment::Payment,
};

/// Downstream action fired when a payment reaches a terminal status.
///
/// Neither call is idempotent on the receiving side; the engine guarantees at
/// most one successful call per payment.
pub trait EntitlementNotifier: Send + Sync {
    /// Grant what was bought. An error leaves the payment unapplied.
    fn grant<'a>(&'a self, payment: &'a Payment) -> BoxFuture<'a, Result<(), PipelineError>>;

    /// Tell the user the payment was canceled. Best effort.
    fn notify_canceled<'a>(
        &'a self,
        payment: &'a Payment,
        details: Option<&'a CancellationDetails>,
    ) -> BoxFuture<'a, ()>;
}
