use {
    crate::{AppState, adapters::api_errors::ApiError, domain::notification::Notification},
    axum::{Json, body::Bytes, extract::State},
};

/// `POST /webhooks`: receive one payment-status notification from the gateway.
///
/// A 2xx tells the gateway to stop re-delivering, so it is only returned once
/// the notification is durably handled (or was already handled earlier).
pub async fn notification_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let notification = Notification::decode(&body)?;

    tracing::info!(
        payment_id = %notification.payment_id(),
        event = notification.event(),
        ?notification,
        "notification received"
    );

    let result = state.reconciler.reconcile(&notification).await?;

    Ok(Json(serde_json::json!({"status": result.as_str()})))
}
