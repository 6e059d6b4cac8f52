use {
    crate::domain::{
        BoxFuture,
        error::PipelineError,
        id::{PaymentId, WebhookId},
        payment::{NewPayment, Payment},
        store::{PaymentStore, PaymentTx},
    },
    std::{collections::HashMap, sync::Arc},
    tokio::sync::{Mutex, OwnedMutexGuard, RwLock},
};

type Rows = Arc<RwLock<HashMap<PaymentId, Arc<Mutex<Payment>>>>>;

/// Payment store held in process memory.
///
/// Each row sits behind its own mutex. A transaction keeps the guard of every
/// row it locked until it commits or is dropped, which gives the same
/// per-payment serialization as `SELECT ... FOR UPDATE`.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    rows: Rows,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn row(&self, id: &PaymentId) -> Option<Arc<Mutex<Payment>>> {
        self.rows.read().await.get(id).cloned()
    }
}

struct LockedRow {
    guard: OwnedMutexGuard<Payment>,
    working: Payment,
}

struct InMemoryTx {
    rows: Rows,
    locked: HashMap<PaymentId, LockedRow>,
}

impl PaymentTx for InMemoryTx {
    fn lock_payment<'a>(
        &'a mut self,
        id: &'a PaymentId,
    ) -> BoxFuture<'a, Result<Option<Payment>, PipelineError>> {
        Box::pin(async move {
            if let Some(locked) = self.locked.get(id) {
                return Ok(Some(locked.working.clone()));
            }

            let Some(row) = self.rows.read().await.get(id).cloned() else {
                return Ok(None);
            };
            let guard = row.lock_owned().await;
            let working = guard.clone();
            self.locked.insert(
                id.clone(),
                LockedRow {
                    guard,
                    working: working.clone(),
                },
            );
            Ok(Some(working))
        })
    }

    fn save<'a>(&'a mut self, payment: &'a Payment) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let locked = self.locked.get_mut(payment.payment_id()).ok_or_else(|| {
                PipelineError::Store(format!(
                    "payment {} was not locked in this transaction",
                    payment.payment_id()
                ))
            })?;
            locked.working = payment.clone();
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), PipelineError>> {
        Box::pin(async move {
            for (_, mut locked) in self.locked {
                *locked.guard = locked.working;
            }
            Ok(())
        })
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), PipelineError>> {
        Box::pin(async move {
            drop(self);
            Ok(())
        })
    }
}

impl PaymentStore for InMemoryPaymentStore {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn PaymentTx>, PipelineError>> {
        Box::pin(async move {
            let tx: Box<dyn PaymentTx> = Box::new(InMemoryTx {
                rows: Arc::clone(&self.rows),
                locked: HashMap::new(),
            });
            Ok(tx)
        })
    }

    fn insert<'a>(&'a self, payment: &'a NewPayment) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let mut rows = self.rows.write().await;
            if rows.contains_key(payment.payment_id()) {
                return Err(PipelineError::Store(format!(
                    "payment {} already exists",
                    payment.payment_id()
                )));
            }
            rows.insert(
                payment.payment_id().clone(),
                Arc::new(Mutex::new(payment.clone().into_payment())),
            );
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        id: &'a PaymentId,
    ) -> BoxFuture<'a, Result<Option<Payment>, PipelineError>> {
        Box::pin(async move {
            match self.row(id).await {
                Some(row) => Ok(Some(row.lock().await.clone())),
                None => Ok(None),
            }
        })
    }

    fn forget_webhook<'a>(
        &'a self,
        id: &'a PaymentId,
        webhook_id: &'a WebhookId,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            if let Some(row) = self.row(id).await {
                row.lock().await.forget_webhook(webhook_id);
            }
            Ok(())
        })
    }
}
