//! Integration tests for the HTTP backend and the end-to-end flows.
//!
//! Each test spins up an Axum mock of the portal backend on a random port
//! and drives the real reqwest client against it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use employer_onboard::api::{HttpBackend, OnboardingBackend};
use employer_onboard::config::OnboardConfig;
use employer_onboard::error::FetchError;
use employer_onboard::notify::BroadcastNotifier;
use employer_onboard::onboarding::{
    FlowState, FlowTimings, Navigation, OnboardingDeps, OnboardingOrchestrator,
};
use employer_onboard::payment::{PaymentMethod, SimulatedProcessor};
use employer_onboard::registration::{AccountStatus, RegistrationDraft};
use employer_onboard::session::SessionStore;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Scriptable stand-in for the portal backend.
#[derive(Default)]
struct MockPortal {
    /// Answer with camelCase envelope keys instead of PascalCase.
    lowercase: bool,
    /// Status answers, popped per query; `"fail"` yields a 500.
    statuses: Mutex<VecDeque<&'static str>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl MockPortal {
    fn envelope(&self, success: bool, message: &str, data: Value) -> Value {
        if self.lowercase {
            json!({"success": success, "message": message, "data": data})
        } else {
            json!({"Success": success, "Message": message, "Data": data})
        }
    }

    fn record(&self, endpoint: &str, body: Value) {
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.to_string(), body));
    }

    fn requests_to(&self, endpoint: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

async fn products(State(portal): State<Arc<MockPortal>>) -> impl IntoResponse {
    let list = json!([
        {"ProductId": 5, "Name": "Starter", "Description": "Small teams", "PricePerUserMonthly": "49.00", "IsActive": true},
        {"ProductId": 6, "Name": "Legacy", "PricePerUserMonthly": "10", "IsActive": false}
    ]);
    if portal.lowercase {
        Json(portal.envelope(true, "", list))
    } else {
        Json(list)
    }
}

async fn register(State(portal): State<Arc<MockPortal>>, Json(body): Json<Value>) -> impl IntoResponse {
    portal.record("register", body.clone());
    if body["Payload"]["MobileNo"] == "9000000000" {
        return (
            StatusCode::CONFLICT,
            Json(portal.envelope(false, "Mobile number already registered", Value::Null)),
        );
    }
    let data = if portal.lowercase {
        json!({"empId": "EMP-42", "name": "Acme", "role": "Employer", "status": "Pending"})
    } else {
        json!({"EmpId": "EMP-42", "Name": "Acme", "Role": "Employer", "Status": "Pending"})
    };
    (StatusCode::OK, Json(portal.envelope(true, "Registered", data)))
}

async fn register_paid(
    State(portal): State<Arc<MockPortal>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    portal.record("register-paid", body);
    Json(portal.envelope(
        true,
        "Registered",
        json!({"EmpId": "EMP-43", "Name": "Acme", "Role": "Employer", "Status": "Active"}),
    ))
}

async fn status(State(portal): State<Arc<MockPortal>>, Json(body): Json<Value>) -> impl IntoResponse {
    portal.record("status", body);
    let next = portal.statuses.lock().unwrap().pop_front().unwrap_or("Pending");
    if next == "fail" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream down").into_response();
    }
    let data = if next == "Rejected" {
        json!({"Status": next, "RejectionReason": "Invalid GST"})
    } else {
        json!({"Status": next})
    };
    Json(portal.envelope(true, "", data)).into_response()
}

/// Start the mock portal on a random port, return its base URL.
async fn start_portal(portal: Arc<MockPortal>) -> String {
    let app = Router::new()
        .route("/master/product/public", get(products))
        .route("/accounts/employer-register", post(register))
        .route("/accounts/employer-register-paid", post(register_paid))
        .route("/accounts/get-employer-status", post(status))
        .with_state(portal);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

fn config(base_url: String) -> OnboardConfig {
    OnboardConfig {
        api_base_url: base_url,
        auth_token: SecretString::from("token-abc".to_string()),
        poll_interval: Duration::from_millis(100),
        payment_delay: Duration::from_millis(20),
        redirect_delay: Duration::from_millis(50),
        request_timeout: Duration::from_secs(2),
        ..OnboardConfig::default()
    }
}

fn draft(paying: bool) -> RegistrationDraft {
    serde_json::from_value(json!({
        "Name": "Acme",
        "CompanyName": "Acme Pvt Ltd",
        "MobileNo": "9123456789",
        "EmailId": "admin@acme.in",
        "AadharNo": "123456789012",
        "Password": "secret1",
        "Ticket": "T1",
        "ProductId": if paying { json!(5) } else { Value::Null },
        "Licenses": 3,
        "isPaying": paying
    }))
    .unwrap()
}

fn orchestrator(config: &OnboardConfig) -> (Arc<OnboardingOrchestrator>, Arc<SessionStore>) {
    let backend: Arc<dyn OnboardingBackend> = Arc::new(HttpBackend::new(config).unwrap());
    let session = SessionStore::in_memory();
    let flow = OnboardingOrchestrator::new(
        OnboardingDeps {
            backend,
            session: Arc::clone(&session),
            notifier: BroadcastNotifier::new(),
            processor: Arc::new(SimulatedProcessor::new(config.payment_delay)),
        },
        FlowTimings::from_config(config),
    );
    (flow, session)
}

async fn wait_for_navigation(flow: &OnboardingOrchestrator, target: Navigation) {
    let mut rx = flow.navigation();
    timeout(TEST_TIMEOUT, async {
        loop {
            if rx.borrow_and_update().as_ref() == Some(&target) {
                return;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("Timed out waiting for navigation");
}

#[tokio::test]
async fn products_accept_bare_array_and_envelope() {
    for lowercase in [false, true] {
        let portal = Arc::new(MockPortal {
            lowercase,
            ..Default::default()
        });
        let backend = HttpBackend::new(&config(start_portal(portal).await)).unwrap();

        let products = backend.fetch_products().await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].product_id, 5);
        assert_eq!(products[0].price_per_user_monthly.to_string(), "49.00");
        assert!(!products[1].is_active);
    }
}

#[tokio::test]
async fn registration_envelope_normalizes_either_casing() {
    for lowercase in [false, true] {
        let portal = Arc::new(MockPortal {
            lowercase,
            ..Default::default()
        });
        let backend = HttpBackend::new(&config(start_portal(Arc::clone(&portal)).await)).unwrap();

        let resp = backend
            .register_employer(&draft(false).to_payload())
            .await
            .unwrap();
        assert!(resp.success);
        assert_eq!(resp.message, "Registered");

        let sent = &portal.requests_to("register")[0];
        assert!(sent["RequestId"].as_str().unwrap().starts_with("employer-register-"));
        assert_eq!(sent["AuthToken"], "token-abc");
        assert_eq!(sent["Payload"]["CompanyName"], "Acme Pvt Ltd");
        assert_eq!(sent["Payload"]["Licenses"], 3);
        assert!(sent["Payload"].get("isPaid").is_none());
    }
}

#[tokio::test]
async fn error_status_with_envelope_keeps_backend_message() {
    let portal = Arc::new(MockPortal::default());
    let backend = HttpBackend::new(&config(start_portal(portal).await)).unwrap();

    let mut d = draft(false);
    d.mobile_no = "9000000000".into();
    let resp = backend.register_employer(&d.to_payload()).await.unwrap();
    assert!(!resp.success);
    assert_eq!(resp.message, "Mobile number already registered");
}

#[tokio::test]
async fn status_query_maps_failures() {
    let portal = Arc::new(MockPortal::default());
    portal
        .statuses
        .lock()
        .unwrap()
        .extend(["fail", "Rejected"]);
    let backend = HttpBackend::new(&config(start_portal(Arc::clone(&portal)).await)).unwrap();

    let err = backend.get_employer_status("EMP-42").await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 500, .. }));

    let report = backend.get_employer_status("EMP-42").await.unwrap();
    assert_eq!(report.status, AccountStatus::Rejected);
    assert_eq!(report.rejection_reason.as_deref(), Some("Invalid GST"));
    assert_eq!(portal.requests_to("status")[1]["Payload"]["EmpId"], "EMP-42");
}

#[tokio::test]
async fn unreachable_backend_is_an_http_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let backend = HttpBackend::new(&config(format!("http://127.0.0.1:{port}"))).unwrap();
    assert!(matches!(
        backend.fetch_products().await,
        Err(FetchError::Http { .. })
    ));
}

#[tokio::test]
async fn pending_flow_polls_until_approved() {
    let portal = Arc::new(MockPortal {
        lowercase: true,
        ..Default::default()
    });
    portal
        .statuses
        .lock()
        .unwrap()
        .extend(["Pending", "fail", "Pending", "Approved", "Approved"]);
    let config = config(start_portal(Arc::clone(&portal)).await);
    let (flow, session) = orchestrator(&config);
    assert_eq!(flow.load_catalog().await, 2);

    let state = flow.submit(draft(false)).await.unwrap();
    assert_eq!(
        state,
        FlowState::Pending {
            emp_id: "EMP-42".into()
        }
    );

    wait_for_navigation(&flow, Navigation::EmployerDashboard).await;
    assert!(matches!(flow.state().await, FlowState::Approved { .. }));
    assert_eq!(session.current().unwrap().status, AccountStatus::Approved);
    assert_eq!(portal.requests_to("status").len(), 4);
    assert!(portal.requests_to("register-paid").is_empty());
    assert_eq!(
        flow.navigations(),
        vec![Navigation::PendingStatus, Navigation::EmployerDashboard]
    );
    flow.abandon().await;
}

#[tokio::test]
async fn paid_flow_registers_once_and_redirects() {
    let portal = Arc::new(MockPortal::default());
    let config = config(start_portal(Arc::clone(&portal)).await);
    let (flow, session) = orchestrator(&config);
    flow.load_catalog().await;

    let state = flow.submit(draft(true)).await.unwrap();
    assert_eq!(state, FlowState::PaymentFlow { product_id: 5 });

    let state = flow.pay(PaymentMethod::upi("acme@upi")).await.unwrap();
    assert_eq!(
        state,
        FlowState::Approved {
            emp_id: "EMP-43".into()
        }
    );
    wait_for_navigation(&flow, Navigation::EmployerDashboard).await;

    let paid = portal.requests_to("register-paid");
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0]["Payload"]["paymentMethod"], "upi");
    assert_eq!(paid[0]["Payload"]["paymentAmount"], 49.0);
    assert_eq!(paid[0]["Payload"]["isPaid"], true);
    assert!(portal.requests_to("register").is_empty());
    assert!(portal.requests_to("status").is_empty());
    assert_eq!(session.current().unwrap().status, AccountStatus::Approved);
}
