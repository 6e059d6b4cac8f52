//! Inbound payment-status notifications.
//!
//! The wire body is decoded into a closed union keyed by `event`. Anything the
//! gateway can send us that is not one of the four payment events fails to
//! decode; business-level inconsistencies (status disagreeing with the event,
//! unexpected envelope type) are reported as validation errors.

use {
    super::{error::PipelineError, id::PaymentId, payment::PaymentStatus},
    serde::{Deserialize, Serialize},
};

const NOTIFICATION_TYPE: &str = "notification";

/// Snapshot of the payment instrument, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub saved: bool,
}

/// Who canceled a payment and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationDetails {
    pub party: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct WireObject {
    id: String,
    status: String,
    #[serde(default)]
    payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Deserialize)]
struct WireCanceledObject {
    id: String,
    status: String,
    #[serde(default)]
    payment_method: Option<PaymentMethod>,
    #[serde(default)]
    cancellation_details: Option<CancellationDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event")]
enum WireNotification {
    #[serde(rename = "payment.waiting_for_capture")]
    WaitingForCapture {
        #[serde(rename = "type")]
        kind: String,
        object: WireObject,
    },
    #[serde(rename = "payment.pending")]
    Pending {
        #[serde(rename = "type")]
        kind: String,
        object: WireObject,
    },
    #[serde(rename = "payment.succeeded")]
    Succeeded {
        #[serde(rename = "type")]
        kind: String,
        object: WireObject,
    },
    #[serde(rename = "payment.canceled")]
    Canceled {
        #[serde(rename = "type")]
        kind: String,
        object: WireCanceledObject,
    },
}

/// Fields common to every payment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSnapshot {
    pub payment_id: PaymentId,
    pub payment_method: Option<PaymentMethod>,
}

/// A decoded, validated gateway notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    WaitingForCapture(PaymentSnapshot),
    Pending(PaymentSnapshot),
    Succeeded(PaymentSnapshot),
    Canceled {
        snapshot: PaymentSnapshot,
        details: Option<CancellationDetails>,
    },
}

impl Notification {
    /// Decode a raw request body.
    pub fn decode(body: &[u8]) -> Result<Self, PipelineError> {
        let wire: WireNotification = serde_json::from_slice(body)?;
        Self::try_from(wire)
    }

    pub fn snapshot(&self) -> &PaymentSnapshot {
        match self {
            Self::WaitingForCapture(s) | Self::Pending(s) | Self::Succeeded(s) => s,
            Self::Canceled { snapshot, .. } => snapshot,
        }
    }

    pub fn payment_id(&self) -> &PaymentId {
        &self.snapshot().payment_id
    }

    /// The status this event declares the payment has reached.
    pub fn target_status(&self) -> PaymentStatus {
        match self {
            Self::WaitingForCapture(_) => PaymentStatus::WaitingForCapture,
            Self::Pending(_) => PaymentStatus::Pending,
            Self::Succeeded(_) => PaymentStatus::Succeeded,
            Self::Canceled { .. } => PaymentStatus::Canceled,
        }
    }

    pub fn event(&self) -> &'static str {
        match self {
            Self::WaitingForCapture(_) => "payment.waiting_for_capture",
            Self::Pending(_) => "payment.pending",
            Self::Succeeded(_) => "payment.succeeded",
            Self::Canceled { .. } => "payment.canceled",
        }
    }
}

fn check_type(kind: &str) -> Result<(), PipelineError> {
    if kind != NOTIFICATION_TYPE {
        return Err(PipelineError::Validation(format!(
            "unexpected notification type: {kind}"
        )));
    }
    Ok(())
}

fn snapshot(
    expected: PaymentStatus,
    id: String,
    status: &str,
    payment_method: Option<PaymentMethod>,
) -> Result<PaymentSnapshot, PipelineError> {
    let status = PaymentStatus::try_from(status)?;
    if status != expected {
        return Err(PipelineError::Validation(format!(
            "object status {status} does not match event status {expected}"
        )));
    }
    Ok(PaymentSnapshot {
        payment_id: PaymentId::new(id)?,
        payment_method,
    })
}

impl TryFrom<WireNotification> for Notification {
    type Error = PipelineError;

    fn try_from(wire: WireNotification) -> Result<Self, Self::Error> {
        match wire {
            WireNotification::WaitingForCapture { kind, object } => {
                check_type(&kind)?;
                Ok(Self::WaitingForCapture(snapshot(
                    PaymentStatus::WaitingForCapture,
                    object.id,
                    &object.status,
                    object.payment_method,
                )?))
            }
            WireNotification::Pending { kind, object } => {
                check_type(&kind)?;
                Ok(Self::Pending(snapshot(
                    PaymentStatus::Pending,
                    object.id,
                    &object.status,
                    object.payment_method,
                )?))
            }
            WireNotification::Succeeded { kind, object } => {
                check_type(&kind)?;
                Ok(Self::Succeeded(snapshot(
                    PaymentStatus::Succeeded,
                    object.id,
                    &object.status,
                    object.payment_method,
                )?))
            }
            WireNotification::Canceled { kind, object } => {
                check_type(&kind)?;
                Ok(Self::Canceled {
                    snapshot: snapshot(
                        PaymentStatus::Canceled,
                        object.id,
                        &object.status,
                        object.payment_method,
                    )?,
                    details: object.cancellation_details,
                })
            }
        }
    }
}
