use {
    crate::config::LOCK_TIMEOUT,
    crate::domain::{
        BoxFuture,
        error::PipelineError,
        id::{PaymentId, WebhookId},
        notification::PaymentMethod,
        payment::{NewPayment, Payment, PaymentParts, PaymentStatus, Recipient},
        store::{PaymentStore, PaymentTx},
    },
    chrono::{DateTime, Utc},
    sqlx::{PgPool, Postgres, Transaction},
    uuid::Uuid,
};

const SELECT_PAYMENT: &str = r#"
    SELECT payment_id, status, payment_method_id, payment_method_type, method_saved,
           applied, succeeded_webhook_id, canceled_webhook_id,
           subscription_ref, recipient_email, chat_ref, user_ref, updated_at
    FROM payments
    WHERE payment_id = $1
"#;

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    payment_id: String,
    status: String,
    payment_method_id: Option<String>,
    payment_method_type: Option<String>,
    method_saved: bool,
    applied: bool,
    succeeded_webhook_id: Option<String>,
    canceled_webhook_id: Option<String>,
    subscription_ref: Option<String>,
    recipient_email: Option<String>,
    chat_ref: Option<String>,
    user_ref: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = PipelineError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let payment_method = row.payment_method_id.map(|id| PaymentMethod {
            id,
            kind: row.payment_method_type.unwrap_or_default(),
            saved: row.method_saved,
        });

        Payment::from_parts(PaymentParts {
            payment_id: PaymentId::new(row.payment_id)?,
            status: PaymentStatus::try_from(row.status.as_str())?,
            payment_method,
            applied: row.applied,
            succeeded_webhook_id: row.succeeded_webhook_id.map(WebhookId::new).transpose()?,
            canceled_webhook_id: row.canceled_webhook_id.map(WebhookId::new).transpose()?,
            recipient: Recipient {
                subscription_ref: row.subscription_ref,
                recipient_email: row.recipient_email,
                chat_ref: row.chat_ref,
                user_ref: row.user_ref,
            },
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL payment store. Row locks come from `SELECT ... FOR UPDATE`.
#[derive(Clone)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), PipelineError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PipelineError::Store(format!("migration failed: {e}")))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PaymentTx for PgTx {
    fn lock_payment<'a>(
        &'a mut self,
        id: &'a PaymentId,
    ) -> BoxFuture<'a, Result<Option<Payment>, PipelineError>> {
        Box::pin(async move {
            let sql = format!("{SELECT_PAYMENT} FOR UPDATE");
            let row: Option<PaymentRow> = sqlx::query_as(&sql)
                .bind(id.as_str())
                .fetch_optional(&mut *self.tx)
                .await?;

            row.map(Payment::try_from).transpose()
        })
    }

    fn save<'a>(&'a mut self, payment: &'a Payment) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let method = payment.payment_method();
            let result = sqlx::query(
                r#"
                UPDATE payments
                SET status = $2,
                    payment_method_id = $3,
                    payment_method_type = $4,
                    method_saved = $5,
                    applied = $6,
                    updated_at = $7
                WHERE payment_id = $1
                "#,
            )
            .bind(payment.payment_id().as_str())
            .bind(payment.status().as_str())
            .bind(method.map(|m| m.id.as_str()))
            .bind(method.map(|m| m.kind.as_str()))
            .bind(method.is_some_and(|m| m.saved))
            .bind(payment.is_applied())
            .bind(payment.updated_at())
            .execute(&mut *self.tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(PipelineError::NotFound(payment.payment_id().clone()));
            }
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<(), PipelineError>> {
        Box::pin(async move {
            self.tx.commit().await?;
            Ok(())
        })
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<(), PipelineError>> {
        Box::pin(async move {
            self.tx.rollback().await?;
            Ok(())
        })
    }
}

impl PaymentStore for PgPaymentStore {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn PaymentTx>, PipelineError>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            // A stuck holder of the row must not stall this delivery forever;
            // the gateway will re-deliver.
            let set_lock_timeout =
                format!("SET LOCAL lock_timeout = '{}ms'", LOCK_TIMEOUT.as_millis());
            sqlx::query(&set_lock_timeout).execute(&mut *tx).await?;

            let tx: Box<dyn PaymentTx> = Box::new(PgTx { tx });
            Ok(tx)
        })
    }

    fn insert<'a>(&'a self, payment: &'a NewPayment) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let recipient = payment.recipient();
            sqlx::query(
                r#"
                INSERT INTO payments
                    (id, payment_id, status, succeeded_webhook_id, canceled_webhook_id,
                     subscription_ref, recipient_email, chat_ref, user_ref)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(payment.payment_id().as_str())
            .bind(payment.status().as_str())
            .bind(payment.succeeded_webhook_id().map(|w| w.as_str()))
            .bind(payment.canceled_webhook_id().map(|w| w.as_str()))
            .bind(recipient.subscription_ref.as_deref())
            .bind(recipient.recipient_email.as_deref())
            .bind(recipient.chat_ref.as_deref())
            .bind(recipient.user_ref.as_deref())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        id: &'a PaymentId,
    ) -> BoxFuture<'a, Result<Option<Payment>, PipelineError>> {
        Box::pin(async move {
            let row: Option<PaymentRow> = sqlx::query_as(SELECT_PAYMENT)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

            row.map(Payment::try_from).transpose()
        })
    }

    fn forget_webhook<'a>(
        &'a self,
        id: &'a PaymentId,
        webhook_id: &'a WebhookId,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                UPDATE payments
                SET succeeded_webhook_id = NULLIF(succeeded_webhook_id, $2),
                    canceled_webhook_id = NULLIF(canceled_webhook_id, $2),
                    updated_at = now()
                WHERE payment_id = $1
                "#,
            )
            .bind(id.as_str())
            .bind(webhook_id.as_str())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }
}
