use {
    crate::domain::{
        entitlement::EntitlementNotifier,
        error::PipelineError,
        gateway::WebhookRegistry,
        notification::Notification,
        payment::{Payment, ProcessResult},
        store::{PaymentStore, PaymentTx, settle},
    },
    crate::{config::CLEANUP_TIMEOUT, services::cleanup::remove_subscriptions},
    std::{sync::Arc, time::Duration},
};

pub const DEFAULT_NOTIFIER_TIMEOUT: Duration = Duration::from_secs(10);

/// Maps gateway notifications onto stored payments.
///
/// Stateless between calls: everything lives in the store, and the row lock
/// taken by [`PaymentTx::lock_payment`] serializes deliveries for one payment.
pub struct Reconciler {
    store: Arc<dyn PaymentStore>,
    notifier: Arc<dyn EntitlementNotifier>,
    registry: Arc<dyn WebhookRegistry>,
    notifier_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        notifier: Arc<dyn EntitlementNotifier>,
        registry: Arc<dyn WebhookRegistry>,
    ) -> Self {
        Self {
            store,
            notifier,
            registry,
            notifier_timeout: DEFAULT_NOTIFIER_TIMEOUT,
        }
    }

    pub fn with_notifier_timeout(mut self, timeout: Duration) -> Self {
        self.notifier_timeout = timeout;
        self
    }

    /// Process one notification: lock, decide, apply, commit, then clean up.
    ///
    /// Cleanup runs after the commit and only once the payment is applied.
    /// It is cut off after [`CLEANUP_TIMEOUT`]; its failures are logged and
    /// never change the returned result.
    #[tracing::instrument(
        name = "reconcile",
        skip_all,
        fields(payment_id = %notification.payment_id(), event = notification.event())
    )]
    pub async fn reconcile(
        &self,
        notification: &Notification,
    ) -> Result<ProcessResult, PipelineError> {
        let mut tx = self.store.begin().await?;
        let outcome = self.apply_locked(tx.as_mut(), notification).await;
        let (result, payment) = settle(tx, outcome).await?;

        match &result {
            ProcessResult::Applied(status) => {
                tracing::info!(%status, "payment applied");
            }
            ProcessResult::Recorded(status) => {
                tracing::info!(%status, "status snapshot recorded");
            }
            ProcessResult::AlreadyApplied => {
                tracing::info!("payment already applied, side effects skipped");
            }
        }

        if result.is_applied() {
            let cleanup =
                remove_subscriptions(self.store.as_ref(), self.registry.as_ref(), &payment);
            if tokio::time::timeout(CLEANUP_TIMEOUT, cleanup).await.is_err() {
                // Ids not yet retired are retried on the next delivery.
                tracing::warn!(timeout = ?CLEANUP_TIMEOUT, "webhook cleanup timed out");
            }
        }

        Ok(result)
    }

    async fn apply_locked(
        &self,
        tx: &mut dyn PaymentTx,
        notification: &Notification,
    ) -> Result<(ProcessResult, Payment), PipelineError> {
        let id = notification.payment_id();
        let mut payment = tx
            .lock_payment(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(id.clone()))?;

        if payment.is_applied() {
            return Ok((ProcessResult::AlreadyApplied, payment));
        }

        let previous = payment.status();
        payment.record(notification)?;

        if !payment.status().is_terminal() {
            tx.save(&payment).await?;
            tracing::debug!(from = %previous, to = %payment.status(), "non-terminal transition");
            return Ok((ProcessResult::Recorded(payment.status()), payment));
        }

        // The flag is written before the side effect; a failing side effect
        // rolls both back together.
        payment.mark_applied()?;
        tx.save(&payment).await?;

        match notification {
            Notification::Succeeded(_) => self.grant(&payment).await?,
            Notification::Canceled { details, .. } => {
                let notice = self.notifier.notify_canceled(&payment, details.as_ref());
                if tokio::time::timeout(self.notifier_timeout, notice)
                    .await
                    .is_err()
                {
                    tracing::warn!(
                        timeout = ?self.notifier_timeout,
                        "cancellation notice timed out"
                    );
                }
            }
            Notification::WaitingForCapture(_) | Notification::Pending(_) => {}
        }

        Ok((ProcessResult::Applied(payment.status()), payment))
    }

    async fn grant(&self, payment: &Payment) -> Result<(), PipelineError> {
        match tokio::time::timeout(self.notifier_timeout, self.notifier.grant(payment)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "entitlement grant failed, rolling back");
                Err(match e {
                    PipelineError::Apply(_) => e,
                    other => PipelineError::Apply(other.to_string()),
                })
            }
            Err(_) => {
                tracing::error!(
                    timeout = ?self.notifier_timeout,
                    "entitlement grant timed out, rolling back"
                );
                Err(PipelineError::Apply(format!(
                    "entitlement grant timed out after {:?}",
                    self.notifier_timeout
                )))
            }
        }
    }
}
