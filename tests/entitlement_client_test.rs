mod common;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use common::*;
use pay_sync::adapters::entitlement::HttpEntitlementNotifier;
use pay_sync::domain::entitlement::EntitlementNotifier;
use pay_sync::domain::error::PipelineError;
use pay_sync::domain::notification::CancellationDetails;
use reqwest::Url;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
struct Fake {
    status: StatusCode,
    bodies: Arc<Mutex<Vec<(&'static str, serde_json::Value)>>>,
}

async fn fake_entitlements(status: StatusCode) -> (Url, Fake) {
    let fake = Fake {
        status,
        bodies: Arc::default(),
    };
    let app = Router::new()
        .route(
            "/api/grants",
            post(|State(f): State<Fake>, Json(v): Json<serde_json::Value>| async move {
                f.bodies.lock().unwrap().push(("grants", v));
                f.status
            }),
        )
        .route(
            "/api/cancellations",
            post(|State(f): State<Fake>, Json(v): Json<serde_json::Value>| async move {
                f.bodies.lock().unwrap().push(("cancellations", v));
                f.status
            }),
        )
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (Url::parse(&format!("http://{addr}/api/")).unwrap(), fake)
}

/// A payment as the engine hands it to the notifier: succeeded, with a card.
async fn succeeded_payment(id: &str) -> pay_sync::domain::payment::Payment {
    let h = Harness::new();
    h.seed(id).await;
    h.reconciler.reconcile(&succeeded(id)).await.unwrap();
    h.payment(id).await
}

// ── 1. grant_posts_payment_and_recipient ───────────────────────────────────

#[tokio::test]
async fn grant_posts_payment_and_recipient() {
    let (base, fake) = fake_entitlements(StatusCode::OK).await;
    let notifier = HttpEntitlementNotifier::new(base, Duration::from_secs(5)).unwrap();
    let payment = succeeded_payment("p_grant").await;

    notifier.grant(&payment).await.unwrap();

    let bodies = fake.bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    let (endpoint, body) = &bodies[0];
    assert_eq!(*endpoint, "grants");
    assert_eq!(body["payment_id"], "p_grant");
    assert_eq!(body["status"], "succeeded");
    assert_eq!(body["payment_method"]["type"], "bank_card");
    assert_eq!(body["recipient"]["subscription_ref"], "sub_p_grant");
    assert!(body.get("cancellation_details").is_none());
}

// ── 2. rejected_grant_is_an_apply_error ────────────────────────────────────

#[tokio::test]
async fn rejected_grant_is_an_apply_error() {
    let (base, _) = fake_entitlements(StatusCode::SERVICE_UNAVAILABLE).await;
    let notifier = HttpEntitlementNotifier::new(base, Duration::from_secs(5)).unwrap();
    let payment = succeeded_payment("p_reject").await;

    let err = notifier.grant(&payment).await.unwrap_err();
    assert!(matches!(err, PipelineError::Apply(_)));
}

// ── 3. failed_cancellation_notice_is_swallowed ─────────────────────────────

#[tokio::test]
async fn failed_cancellation_notice_is_swallowed() {
    let (base, fake) = fake_entitlements(StatusCode::INTERNAL_SERVER_ERROR).await;
    let notifier = HttpEntitlementNotifier::new(base, Duration::from_secs(5)).unwrap();
    let payment = succeeded_payment("p_cancel_notice").await;
    let details = CancellationDetails {
        party: "merchant".into(),
        reason: "expired_on_capture".into(),
    };

    notifier.notify_canceled(&payment, Some(&details)).await;

    let bodies = fake.bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].0, "cancellations");
    assert_eq!(bodies[0].1["cancellation_details"]["reason"], "expired_on_capture");
}
