use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{
    middleware::{from_fn, Logger},
    web, App, HttpServer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use durian_server::{cors::build_cors, metrics, routes, AppState, ServerConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    let port = config.port;
    let allowed_origins = config.allowed_origins.clone();
    let rate_limit_rpm = config.rate_limit_rpm;

    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("startup failed: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("durian-server listening at http://localhost:{port}");
    tracing::info!(
        "Attestation signing: {}",
        if state.signer.is_some() {
            "enabled"
        } else {
            "disabled (PRIMUS_APP_SECRET not set)"
        }
    );
    match state.settler {
        Some(ref settler) => tracing::info!(
            payer = %settler.payer(),
            merchant = %settler.merchant(),
            amount = %state.config.pay_amount,
            "Settlement: enabled"
        ),
        None => tracing::warn!(
            "Settlement: disabled ({} not set)",
            state.config.settlement_gap().unwrap_or("WALLET_PRIVATE_KEY")
        ),
    }
    if state.config.metrics_token.is_none() && !state.config.public_metrics {
        tracing::info!("/metrics is closed (set METRICS_TOKEN or DURIAN_PUBLIC_METRICS=true)");
    }
    tracing::info!("Rate limit: {rate_limit_rpm} req/min per IP");

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm)
        .finish()
        .expect("failed to build rate limiter config");

    let state_data = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .wrap(from_fn(metrics::count_requests))
            .wrap(Logger::default())
            .wrap(build_cors(&allowed_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(web::JsonConfig::default().limit(65_536))
            .app_data(web::PayloadConfig::new(65_536))
            .app_data(state_data.clone())
            .configure(routes::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
