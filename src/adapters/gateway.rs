use {
    crate::{
        config::GatewayCredentials,
        domain::{BoxFuture, error::PipelineError, gateway::WebhookRegistry, id::WebhookId},
    },
    reqwest::{Client, StatusCode, Url},
    secrecy::ExposeSecret,
    serde::{Deserialize, Serialize},
    std::time::Duration,
    uuid::Uuid,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct RegisterWebhook<'a> {
    event: &'a str,
    url: &'a str,
}

#[derive(Deserialize)]
struct RegisteredWebhook {
    id: String,
}

/// Client for the gateway's webhook-subscription API.
pub struct GatewayClient {
    http: Client,
    base_url: Url,
    credentials: Option<GatewayCredentials>,
}

impl GatewayClient {
    pub fn new(base_url: Url, credentials: Option<GatewayCredentials>) -> reqwest::Result<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn credentials(&self) -> Result<&GatewayCredentials, PipelineError> {
        self.credentials.as_ref().ok_or_else(|| {
            PipelineError::Credentials("gateway shop id and api key are not configured".into())
        })
    }

    fn webhooks_url(&self, id: Option<&WebhookId>) -> Result<Url, PipelineError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                PipelineError::Cleanup(format!("gateway base url {} has no path", self.base_url))
            })?;
            segments.pop_if_empty().push("webhooks");
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        Ok(url)
    }

    fn webhook_url(&self, id: &WebhookId) -> Result<Url, PipelineError> {
        self.webhooks_url(Some(id))
    }

    /// Subscribe `url` to `event` notifications. Retrying with the same
    /// `idempotence_key` returns the existing subscription.
    pub async fn register_webhook(
        &self,
        event: &str,
        url: &Url,
        idempotence_key: Uuid,
    ) -> Result<WebhookId, PipelineError> {
        let creds = self.credentials()?;

        let resp = self
            .http
            .post(self.webhooks_url(None)?)
            .basic_auth(creds.shop_id, Some(creds.api_key.expose_secret()))
            .header("Idempotence-Key", idempotence_key.to_string())
            .json(&RegisterWebhook {
                event,
                url: url.as_str(),
            })
            .send()
            .await
            .map_err(|e| PipelineError::Gateway(format!("register {event}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Gateway(format!(
                "register {event}: gateway returned {status}: {body}"
            )));
        }

        let registered: RegisteredWebhook = resp
            .json()
            .await
            .map_err(|e| PipelineError::Gateway(format!("register {event}: {e}")))?;
        WebhookId::new(registered.id)
    }

    async fn delete_webhook(&self, id: &WebhookId) -> Result<(), PipelineError> {
        let creds = self.credentials()?;

        let resp = self
            .http
            .delete(self.webhook_url(id)?)
            .basic_auth(creds.shop_id, Some(creds.api_key.expose_secret()))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| PipelineError::Cleanup(format!("webhook {id}: {e}")))?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            // Already gone on the gateway side.
            StatusCode::NOT_FOUND => Ok(()),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(PipelineError::Cleanup(format!(
                    "webhook {id}: gateway returned {status}: {body}"
                )))
            }
        }
    }
}

impl WebhookRegistry for GatewayClient {
    fn remove_webhook<'a>(&'a self, id: &'a WebhookId) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(self.delete_webhook(id))
    }
}
