#![allow(dead_code)]

use pay_sync::AppState;
use pay_sync::domain::BoxFuture;
use pay_sync::domain::entitlement::EntitlementNotifier;
use pay_sync::domain::error::PipelineError;
use pay_sync::domain::gateway::WebhookRegistry;
use pay_sync::domain::id::{PaymentId, WebhookId};
use pay_sync::domain::notification::{
    CancellationDetails, Notification, PaymentMethod, PaymentSnapshot,
};
use pay_sync::domain::payment::{NewPayment, NewPaymentParams, Payment, PaymentStatus, Recipient};
use pay_sync::domain::store::{PaymentStore, PaymentTx};
use pay_sync::infra::memory::InMemoryPaymentStore;
use pay_sync::services::reconcile::Reconciler;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── fixtures ───────────────────────────────────────────────────────────────

pub fn pid(id: &str) -> PaymentId {
    PaymentId::new(id).unwrap()
}

pub fn succeeded_webhook(id: &str) -> WebhookId {
    WebhookId::new(format!("wh_succeeded_{id}")).unwrap()
}

pub fn canceled_webhook(id: &str) -> WebhookId {
    WebhookId::new(format!("wh_canceled_{id}")).unwrap()
}

/// A pending payment with both webhook subscriptions registered.
pub fn new_payment(id: &str) -> NewPayment {
    NewPayment::new(NewPaymentParams {
        payment_id: pid(id),
        status: PaymentStatus::Pending,
        succeeded_webhook_id: Some(succeeded_webhook(id)),
        canceled_webhook_id: Some(canceled_webhook(id)),
        recipient: Recipient {
            subscription_ref: Some(format!("sub_{id}")),
            recipient_email: Some("buyer@example.com".into()),
            chat_ref: None,
            user_ref: Some("user_1".into()),
        },
    })
}

pub fn card() -> PaymentMethod {
    PaymentMethod {
        id: "pm_card_1".into(),
        kind: "bank_card".into(),
        saved: true,
    }
}

fn snapshot(id: &str, payment_method: Option<PaymentMethod>) -> PaymentSnapshot {
    PaymentSnapshot {
        payment_id: pid(id),
        payment_method,
    }
}

pub fn succeeded(id: &str) -> Notification {
    Notification::Succeeded(snapshot(id, Some(card())))
}

pub fn canceled(id: &str) -> Notification {
    Notification::Canceled {
        snapshot: snapshot(id, None),
        details: Some(CancellationDetails {
            party: "yoo_money".into(),
            reason: "insufficient_funds".into(),
        }),
    }
}

pub fn pending(id: &str) -> Notification {
    Notification::Pending(snapshot(id, None))
}

pub fn waiting_for_capture(id: &str) -> Notification {
    Notification::WaitingForCapture(snapshot(id, Some(card())))
}

/// Raw gateway body for `event` with an object in `status`.
pub fn body(event: &str, id: &str, status: &str) -> String {
    serde_json::json!({
        "type": "notification",
        "event": event,
        "object": {
            "id": id,
            "status": status,
            "payment_method": {"id": "pm_card_1", "type": "bank_card", "saved": true}
        }
    })
    .to_string()
}

// ── recording notifier ─────────────────────────────────────────────────────

/// Notifier that keeps every payment it was handed.
#[derive(Default)]
pub struct RecordingNotifier {
    granted: Mutex<Vec<Payment>>,
    canceled: Mutex<Vec<Payment>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl RecordingNotifier {
    pub fn grants(&self) -> usize {
        self.granted.lock().unwrap().len()
    }

    pub fn cancellations(&self) -> usize {
        self.canceled.lock().unwrap().len()
    }

    pub fn granted_payments(&self) -> Vec<Payment> {
        self.granted.lock().unwrap().clone()
    }

    pub fn canceled_payments(&self) -> Vec<Payment> {
        self.canceled.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    fn current_delay(&self) -> Option<Duration> {
        *self.delay.lock().unwrap()
    }
}

impl EntitlementNotifier for RecordingNotifier {
    fn grant<'a>(&'a self, payment: &'a Payment) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            if let Some(delay) = self.current_delay() {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(PipelineError::Apply("entitlement service unavailable".into()));
            }
            self.granted.lock().unwrap().push(payment.clone());
            Ok(())
        })
    }

    fn notify_canceled<'a>(
        &'a self,
        payment: &'a Payment,
        _details: Option<&'a CancellationDetails>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Some(delay) = self.current_delay() {
                tokio::time::sleep(delay).await;
            }
            self.canceled.lock().unwrap().push(payment.clone());
        })
    }
}

// ── recording registry ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryMode {
    #[default]
    Ok,
    Fail,
    NoCredentials,
    /// Every call hangs for a minute, then fails.
    Stalled,
}

#[derive(Default)]
pub struct RecordingRegistry {
    removed: Mutex<Vec<WebhookId>>,
    attempts: AtomicUsize,
    mode: Mutex<RegistryMode>,
}

impl RecordingRegistry {
    pub fn removed(&self) -> Vec<WebhookId> {
        self.removed.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn set_mode(&self, mode: RegistryMode) {
        *self.mode.lock().unwrap() = mode;
    }
}

impl WebhookRegistry for RecordingRegistry {
    fn remove_webhook<'a>(&'a self, id: &'a WebhookId) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let mode = *self.mode.lock().unwrap();
            match mode {
                RegistryMode::Ok => {
                    self.removed.lock().unwrap().push(id.clone());
                    Ok(())
                }
                RegistryMode::Fail => Err(PipelineError::Cleanup("gateway returned 503".into())),
                RegistryMode::NoCredentials => {
                    Err(PipelineError::Credentials("not configured".into()))
                }
                RegistryMode::Stalled => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Err(PipelineError::Cleanup("gateway timed out".into()))
                }
            }
        })
    }
}

// ── failing store ──────────────────────────────────────────────────────────

/// Store whose every call fails, as if the database were unreachable.
pub struct UnavailableStore;

impl PaymentStore for UnavailableStore {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn PaymentTx>, PipelineError>> {
        Box::pin(async { Err(PipelineError::Store("connection refused".into())) })
    }

    fn insert<'a>(&'a self, _payment: &'a NewPayment) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async { Err(PipelineError::Store("connection refused".into())) })
    }

    fn get<'a>(
        &'a self,
        _id: &'a PaymentId,
    ) -> BoxFuture<'a, Result<Option<Payment>, PipelineError>> {
        Box::pin(async { Err(PipelineError::Store("connection refused".into())) })
    }

    fn forget_webhook<'a>(
        &'a self,
        _id: &'a PaymentId,
        _webhook_id: &'a WebhookId,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async { Err(PipelineError::Store("connection refused".into())) })
    }
}

// ── harness ────────────────────────────────────────────────────────────────

pub struct Harness {
    pub store: Arc<InMemoryPaymentStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub registry: Arc<RecordingRegistry>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let store = Arc::new(InMemoryPaymentStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = Arc::new(RecordingRegistry::default());
        let reconciler = Reconciler::new(store.clone(), notifier.clone(), registry.clone())
            .with_notifier_timeout(timeout);
        Self {
            store,
            notifier,
            registry,
            reconciler: Arc::new(reconciler),
        }
    }

    pub async fn seed(&self, id: &str) {
        self.store.insert(&new_payment(id)).await.unwrap();
    }

    pub async fn payment(&self, id: &str) -> Payment {
        self.store.get(&pid(id)).await.unwrap().unwrap()
    }

    pub fn state(&self) -> AppState {
        AppState {
            reconciler: self.reconciler.clone(),
        }
    }
}
