use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use durian_client::render::{render_dashboard, render_payment_page};
use durian_client::views::{DashboardState, PaymentPage, QueryParams, SEND_AMOUNT, SEND_MERCHANT};
use durian_client::{
    ApiClient, Orchestrator, OrchestratorConfig, PaymentResult, Platform, ReplaySdk,
};

#[derive(Parser)]
#[command(name = "durian-pay")]
#[command(about = "DurianBank demo client: dashboard, payment page and attestation-gated payments")]
struct Cli {
    /// Demo server base URL
    #[arg(long, env = "VITE_API_URL", default_value = durian_pay::DEFAULT_API_URL)]
    api_url: String,

    /// User agent used to pick the attestation platform
    #[arg(long, env = "USER_AGENT", default_value = "")]
    user_agent: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the dashboard for a query string (e.g. "payment=true")
    Dashboard {
        #[arg(long, default_value = "")]
        query: String,
    },

    /// Render the standalone payment page
    Payment,

    /// Attest and pay from the dashboard's confirmation modal
    Pay {
        /// Query string; without amount+merchant the Send draft is used
        #[arg(long, default_value = "")]
        query: String,

        /// Attestation application id
        #[arg(long, env = "PRIMUS_APP_ID", default_value_t = durian_pay::DEFAULT_APP_ID)]
        app_id: Address,

        /// Attestation template id
        #[arg(long, default_value = durian_pay::DEFAULT_TEMPLATE_ID)]
        template_id: String,

        /// Subject address of the attestation
        #[arg(long, default_value_t = durian_pay::DEFAULT_USER_ADDRESS)]
        user_address: Address,

        /// Recorded attestation data to replay (JSON file)
        #[arg(long)]
        recording: Option<PathBuf>,

        /// Attestation step timeout in seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let api = match ApiClient::new(&cli.api_url) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let ok = match cli.command {
        Commands::Dashboard { query } => {
            let mut state = DashboardState::from_query(QueryParams::parse(&query));
            load_payment(&api, &mut state).await;
            print!("{}", render_dashboard(&state));
            true
        }
        Commands::Payment => {
            let mut page = PaymentPage::Loading;
            page.on_fetch(api.fetch_payment().await);
            print!("{}", render_payment_page(&page));
            !matches!(page, PaymentPage::Failed(_))
        }
        Commands::Pay {
            query,
            app_id,
            template_id,
            user_address,
            recording,
            timeout_secs,
        } => {
            let config = OrchestratorConfig {
                app_id,
                template_id,
                user_address,
                platform: Platform::from_user_agent(&cli.user_agent),
                attestation_timeout: Duration::from_secs(timeout_secs),
            };
            let orchestrator =
                Orchestrator::new(Arc::new(ReplaySdk::new(recording)), Arc::new(api), config);
            pay(&orchestrator, &query).await
        }
    };

    if !ok {
        std::process::exit(1);
    }
}

async fn load_payment(api: &ApiClient, state: &mut DashboardState) {
    if !state.needs_fetch() {
        return;
    }
    match api.fetch_payment().await {
        Ok(record) => state.on_fetch_success(record),
        Err(e) => state.on_fetch_failure(e.to_string()),
    }
}

async fn pay(orchestrator: &Orchestrator, query: &str) -> bool {
    let mut state = DashboardState::from_query(QueryParams::parse(query));
    if state.payment.is_none() {
        state.open_send(SEND_AMOUNT, SEND_MERCHANT);
    }
    print!("{}", render_dashboard(&state));

    let Some(options) = state.begin_pay() else {
        eprintln!("nothing to pay");
        return false;
    };
    println!();
    print!("{}", render_dashboard(&state));

    let result = orchestrator.attempt_payment(&options).await;
    let outcome = PaymentResult::from(&result);
    match result {
        Ok(receipt) => state.on_pay_success(receipt),
        Err(e) => state.on_pay_failure(e.to_string()),
    }

    println!();
    print!("{}", render_dashboard(&state));
    match serde_json::to_string_pretty(&outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "failed to serialize outcome"),
    }
    outcome.ok
}
