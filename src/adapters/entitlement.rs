use {
    crate::domain::{
        BoxFuture,
        entitlement::EntitlementNotifier,
        error::PipelineError,
        id::PaymentId,
        notification::{CancellationDetails, PaymentMethod},
        payment::{Payment, PaymentStatus, Recipient},
    },
    reqwest::{Client, Url},
    serde::Serialize,
    std::time::Duration,
};

#[derive(Serialize)]
struct EntitlementRequest<'a> {
    payment_id: &'a PaymentId,
    status: PaymentStatus,
    payment_method: Option<&'a PaymentMethod>,
    recipient: &'a Recipient,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancellation_details: Option<&'a CancellationDetails>,
}

impl<'a> EntitlementRequest<'a> {
    fn new(payment: &'a Payment, details: Option<&'a CancellationDetails>) -> Self {
        Self {
            payment_id: payment.payment_id(),
            status: payment.status(),
            payment_method: payment.payment_method(),
            recipient: payment.recipient(),
            cancellation_details: details,
        }
    }
}

/// Entitlement service reached over HTTP: `POST {base}/grants` and
/// `POST {base}/cancellations`.
pub struct HttpEntitlementNotifier {
    http: Client,
    base_url: Url,
}

impl HttpEntitlementNotifier {
    /// `timeout` bounds each request; the engine applies its own deadline too.
    pub fn new(base_url: Url, timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, name: &str) -> Result<Url, PipelineError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                PipelineError::Apply(format!("entitlement url {} has no path", self.base_url))
            })?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    async fn post(&self, name: &str, body: &EntitlementRequest<'_>) -> Result<(), PipelineError> {
        let resp = self
            .http
            .post(self.endpoint(name)?)
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::Apply(format!("{name}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Apply(format!(
                "{name}: entitlement service returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

impl EntitlementNotifier for HttpEntitlementNotifier {
    fn grant<'a>(&'a self, payment: &'a Payment) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            self.post("grants", &EntitlementRequest::new(payment, None))
                .await
        })
    }

    fn notify_canceled<'a>(
        &'a self,
        payment: &'a Payment,
        details: Option<&'a CancellationDetails>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Err(e) = self
                .post("cancellations", &EntitlementRequest::new(payment, details))
                .await
            {
                tracing::warn!(error = %e, "cancellation notice failed");
            }
        })
    }
}
