use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, BufReader};

use employer_onboard::api::{HttpBackend, OnboardingBackend};
use employer_onboard::config::OnboardConfig;
use employer_onboard::error::{Error, PaymentError};
use employer_onboard::notify::BroadcastNotifier;
use employer_onboard::onboarding::{
    FlowState, FlowTimings, Navigation, OnboardingDeps, OnboardingOrchestrator,
    OnboardingRouteState, onboarding_routes,
};
use employer_onboard::payment::{PaymentMethod, SimulatedProcessor};
use employer_onboard::registration::RegistrationDraft;
use employer_onboard::session::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match OnboardConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  export ONBOARD_API_BASE_URL=https://portal.example.com/api");
            std::process::exit(1);
        }
    };

    let mut args = std::env::args().skip(1);
    let draft_path = args.next();
    let payment_path = args.next();

    eprintln!("🏢 Employer Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.api_base_url);
    eprintln!("   Poll interval: {}s", config.poll_interval.as_secs());
    eprintln!("   State API: http://0.0.0.0:{}/api/onboarding/state", config.http_port);

    // ── Session ──────────────────────────────────────────────────────────
    let session = match config.session_path {
        Some(ref path) => {
            eprintln!("   Session: {}", path.display());
            SessionStore::open(path).await.context("opening session store")?
        }
        None => {
            eprintln!("   Session: in-memory");
            SessionStore::in_memory()
        }
    };

    // ── Flow ─────────────────────────────────────────────────────────────
    let backend: Arc<dyn OnboardingBackend> =
        Arc::new(HttpBackend::new(&config).context("building HTTP client")?);
    let notices = BroadcastNotifier::new();
    let orchestrator = OnboardingOrchestrator::new(
        OnboardingDeps {
            backend,
            session: Arc::clone(&session),
            notifier: notices.clone(),
            processor: Arc::new(SimulatedProcessor::new(config.payment_delay)),
        },
        FlowTimings::from_config(&config),
    );
    let products = orchestrator.load_catalog().await;
    eprintln!("   Products: {products} available");
    eprintln!("   Flow: {}\n", orchestrator.flow_id());

    // Spawn the read-only state server
    let app = onboarding_routes(OnboardingRouteState {
        orchestrator: Arc::clone(&orchestrator),
        session,
        notices,
    });
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .with_context(|| format!("binding port {}", config.http_port))?;
    tokio::spawn(async move {
        tracing::info!(port = listener.local_addr().map(|a| a.port()).unwrap_or_default(), "State server started");
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "State server stopped");
        }
    });

    let mut state = match draft_path {
        Some(path) => {
            let draft: RegistrationDraft = read_json(&path).await?;
            orchestrator.submit(draft).await?
        }
        None => orchestrator.resume().await?,
    };

    if let FlowState::PaymentFlow { product_id } = state {
        let path = payment_path
            .with_context(|| format!("product {product_id} needs a payment method file"))?;
        match pay_with_retry(&orchestrator, &path).await? {
            Some(paid) => state = paid,
            None => {
                eprintln!("   Interrupted");
                orchestrator.abandon().await;
                return Ok(());
            }
        }
    }
    eprintln!("   State: {state}");

    // Wait for the dashboard, a rejection, or Ctrl-C
    let mut navigation = orchestrator.navigation();
    let mut changes = orchestrator.state_changes();
    loop {
        if navigation.borrow_and_update().as_ref() == Some(&Navigation::EmployerDashboard) {
            eprintln!("   ✅ Approved; opening employer dashboard");
            break;
        }
        if let FlowState::Rejected { reason } = &*changes.borrow_and_update() {
            eprintln!(
                "   ❌ Rejected: {}. Please contact support.",
                reason.as_deref().unwrap_or("no reason given")
            );
            break;
        }
        tokio::select! {
            changed = navigation.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("   Interrupted");
                break;
            }
        }
    }

    orchestrator.abandon().await;
    Ok(())
}

/// Pay from the method file. A declined or incomplete payment, or a paid
/// registration the backend refused, is offered again once the user presses
/// Enter. Returns `None` when the user gives up.
async fn pay_with_retry(
    orchestrator: &Arc<OnboardingOrchestrator>,
    path: &str,
) -> anyhow::Result<Option<FlowState>> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let method: PaymentMethod = read_json(path).await?;
        match orchestrator.pay(method).await {
            Ok(state) => return Ok(Some(state)),
            Err(
                e @ (Error::Payment(PaymentError::Declined { .. } | PaymentError::MissingDetails { .. })
                | Error::Registration(_)),
            ) => {
                eprintln!("   ⚠️  {e}");
                eprintln!("   Press Enter to retry with {path}, or Ctrl-C to quit");
            }
            Err(e) => return Err(e.into()),
        }

        tokio::select! {
            line = stdin.next_line() => {
                if line.context("reading stdin")?.is_none() {
                    return Ok(None);
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(None),
        }
    }
}

async fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
