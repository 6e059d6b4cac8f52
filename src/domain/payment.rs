use {
    super::error::PipelineError,
    super::id::{PaymentId, WebhookId},
    super::notification::{Notification, PaymentMethod},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    WaitingForCapture,
    Pending,
    Succeeded,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaitingForCapture => "waiting_for_capture",
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Canceled)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "waiting_for_capture" => Ok(Self::WaitingForCapture),
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "canceled" => Ok(Self::Canceled),
            other => Err(PipelineError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// Identifiers the entitlement notifier needs. Opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub subscription_ref: Option<String>,
    pub recipient_email: Option<String>,
    pub chat_ref: Option<String>,
    pub user_ref: Option<String>,
}

/// Full payment record, as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payment {
    payment_id: PaymentId,
    status: PaymentStatus,
    payment_method: Option<PaymentMethod>,
    applied: bool,
    succeeded_webhook_id: Option<WebhookId>,
    canceled_webhook_id: Option<WebhookId>,
    recipient: Recipient,
    updated_at: DateTime<Utc>,
}

/// Column values for rebuilding a [`Payment`] in a store adapter.
pub struct PaymentParts {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub applied: bool,
    pub succeeded_webhook_id: Option<WebhookId>,
    pub canceled_webhook_id: Option<WebhookId>,
    pub recipient: Recipient,
    pub updated_at: DateTime<Utc>,
}

/// Whether the applied flag may be paired with the given status.
fn check_applied(applied: bool, status: PaymentStatus) -> Result<(), PipelineError> {
    if applied && !status.is_terminal() {
        return Err(PipelineError::Validation(format!(
            "payment cannot be applied in status {status}"
        )));
    }
    Ok(())
}

impl Payment {
    pub fn from_parts(parts: PaymentParts) -> Result<Self, PipelineError> {
        check_applied(parts.applied, parts.status)?;
        Ok(Self {
            payment_id: parts.payment_id,
            status: parts.status,
            payment_method: parts.payment_method,
            applied: parts.applied,
            succeeded_webhook_id: parts.succeeded_webhook_id,
            canceled_webhook_id: parts.canceled_webhook_id,
            recipient: parts.recipient,
            updated_at: parts.updated_at,
        })
    }

    pub fn payment_id(&self) -> &PaymentId {
        &self.payment_id
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn payment_method(&self) -> Option<&PaymentMethod> {
        self.payment_method.as_ref()
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn succeeded_webhook_id(&self) -> Option<&WebhookId> {
        self.succeeded_webhook_id.as_ref()
    }

    pub fn canceled_webhook_id(&self) -> Option<&WebhookId> {
        self.canceled_webhook_id.as_ref()
    }

    /// Subscriptions still registered with the gateway for this payment.
    pub fn webhook_ids(&self) -> Vec<WebhookId> {
        self.succeeded_webhook_id
            .iter()
            .chain(self.canceled_webhook_id.iter())
            .cloned()
            .collect()
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Write the status and instrument snapshot carried by a notification.
    /// An absent instrument leaves the stored one untouched.
    pub fn record(&mut self, notification: &Notification) -> Result<(), PipelineError> {
        if self.applied {
            return Err(PipelineError::Validation(format!(
                "payment {} is already applied",
                self.payment_id
            )));
        }
        self.status = notification.target_status();
        if let Some(method) = &notification.snapshot().payment_method {
            self.payment_method = Some(method.clone());
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_applied(&mut self) -> Result<(), PipelineError> {
        check_applied(true, self.status)?;
        self.applied = true;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Drop a subscription id once the gateway confirmed its removal.
    pub fn forget_webhook(&mut self, webhook_id: &WebhookId) {
        if self.succeeded_webhook_id.as_ref() == Some(webhook_id) {
            self.succeeded_webhook_id = None;
        }
        if self.canceled_webhook_id.as_ref() == Some(webhook_id) {
            self.canceled_webhook_id = None;
        }
    }
}

/// Params for constructing a NewPayment.
pub struct NewPaymentParams {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    pub succeeded_webhook_id: Option<WebhookId>,
    pub canceled_webhook_id: Option<WebhookId>,
    pub recipient: Recipient,
}

/// For INSERT, written by whoever initiated the payment with the gateway.
#[derive(Debug, Clone)]
pub struct NewPayment {
    payment_id: PaymentId,
    status: PaymentStatus,
    succeeded_webhook_id: Option<WebhookId>,
    canceled_webhook_id: Option<WebhookId>,
    recipient: Recipient,
}

impl NewPayment {
    pub fn new(params: NewPaymentParams) -> Self {
        Self {
            payment_id: params.payment_id,
            status: params.status,
            succeeded_webhook_id: params.succeeded_webhook_id,
            canceled_webhook_id: params.canceled_webhook_id,
            recipient: params.recipient,
        }
    }

    pub fn payment_id(&self) -> &PaymentId {
        &self.payment_id
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn succeeded_webhook_id(&self) -> Option<&WebhookId> {
        self.succeeded_webhook_id.as_ref()
    }

    pub fn canceled_webhook_id(&self) -> Option<&WebhookId> {
        self.canceled_webhook_id.as_ref()
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    /// The record as it looks right after creation.
    pub fn into_payment(self) -> Payment {
        Payment {
            payment_id: self.payment_id,
            status: self.status,
            payment_method: None,
            applied: false,
            succeeded_webhook_id: self.succeeded_webhook_id,
            canceled_webhook_id: self.canceled_webhook_id,
            recipient: self.recipient,
            updated_at: Utc::now(),
        }
    }
}

/// What the engine did with one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    /// Terminal side effect executed and `applied` set in this delivery.
    Applied(PaymentStatus),
    /// Non-terminal status snapshot recorded; nothing triggered.
    Recorded(PaymentStatus),
    /// The payment was applied by an earlier delivery; no state touched.
    AlreadyApplied,
}

impl ProcessResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Recorded(_) => "recorded",
            Self::AlreadyApplied => "already_applied",
        }
    }

    /// Whether the payment ended the transaction in its applied state.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_) | Self::AlreadyApplied)
    }
}
