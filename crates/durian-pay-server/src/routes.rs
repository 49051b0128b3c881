use actix_web::{get, post, web, HttpRequest, HttpResponse};
use durian_pay::{AttestationRequest, PaymentRecord, SettlementError, SettlementRequest};
use serde::Deserialize;

use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

/// Register every server route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(payment)
        .service(sign)
        .service(pay_merchant)
        .service(health)
        .service(metrics_endpoint);
}

#[get("/api/payment")]
pub async fn payment() -> HttpResponse {
    HttpResponse::Ok().json(PaymentRecord::demo(chrono::Utc::now()))
}

#[derive(Debug, Deserialize)]
pub struct SignQuery {
    #[serde(rename = "signParams")]
    pub sign_params: Option<String>,
}

#[get("/primus/sign")]
pub async fn sign(
    state: web::Data<AppState>,
    query: web::Query<SignQuery>,
) -> Result<HttpResponse, ApiError> {
    let result = sign_inner(&state, query.into_inner()).await;
    let label = match &result {
        Ok(_) => "success",
        Err(ApiError::BadRequest(_)) => "invalid",
        Err(ApiError::NotConfigured(_)) => "unconfigured",
        Err(_) => "error",
    };
    metrics::SIGN_REQUESTS.with_label_values(&[label]).inc();
    result
}

async fn sign_inner(state: &AppState, query: SignQuery) -> Result<HttpResponse, ApiError> {
    let sign_params = query
        .sign_params
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("signParams is required".to_string()))?;

    let request: AttestationRequest = serde_json::from_str(&sign_params)
        .map_err(|e| ApiError::BadRequest(format!("signParams is not an attestation request: {e}")))?;

    let signer = state
        .signer
        .as_ref()
        .ok_or(ApiError::NotConfigured("PRIMUS_APP_SECRET"))?;

    if request.app_id != signer.app_id() {
        return Err(ApiError::BadRequest(format!(
            "signParams is bound to app id {}, expected {}",
            request.app_id,
            signer.app_id()
        )));
    }

    tracing::debug!(
        template = %request.att_template_id,
        request_id = %request.request_id,
        "signing attestation request"
    );

    let sign_result = signer.sign(&sign_params).await.map_err(|e| match e {
        durian_pay::PayError::InvalidRequest(msg) => ApiError::BadRequest(msg),
        other => {
            tracing::error!(error = %other, "attestation signer failed");
            ApiError::SignerFailed(other.to_string())
        }
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "signResult": sign_result })))
}

#[post("/pay-merchant")]
pub async fn pay_merchant(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let Some(settler) = state.settler.as_ref() else {
        let missing = state.config.settlement_gap().unwrap_or("WALLET_PRIVATE_KEY");
        tracing::error!("settlement requested but {missing} is not configured");
        metrics::SETTLEMENTS
            .with_label_values(&["unconfigured"])
            .inc();
        return Err(ApiError::NotConfigured(missing));
    };

    let request: SettlementRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SettlementRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?
    };

    let start = std::time::Instant::now();
    let result = settler.settle(&request).await;
    let label = match &result {
        Ok(_) => "success",
        Err(SettlementError::InProgress(_)) => "in_progress",
        Err(SettlementError::Transfer(_)) => "chain_error",
        Err(SettlementError::Unconfirmed { .. }) => "unconfirmed",
        Err(SettlementError::CompletionRejected { .. }) => "completion_rejected",
        Err(SettlementError::CompletionUnreachable { .. }) => "completion_unreachable",
    };
    metrics::SETTLEMENTS.with_label_values(&[label]).inc();
    metrics::SETTLE_LATENCY
        .with_label_values(&[label])
        .observe(start.elapsed().as_secs_f64());

    let receipt = result?;
    Ok(HttpResponse::Ok().json(receipt))
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let mut response = serde_json::json!({
        "status": "ok",
        "service": "durian-server",
        "version": env!("CARGO_PKG_VERSION"),
    });

    if let Some(ref settler) = state.settler {
        response["payerWallet"] = serde_json::json!(settler.payer());
        match settler.health_check().await {
            Ok(block) => {
                response["latestBlock"] = serde_json::json!(block.to_string());
            }
            Err(e) => {
                tracing::error!(error = %e, "health check: RPC unreachable");
                response["status"] = serde_json::json!("degraded");
                response["error"] = serde_json::json!("RPC unreachable");
            }
        }
    }

    if response["status"] == "degraded" {
        HttpResponse::ServiceUnavailable().json(response)
    } else {
        HttpResponse::Ok().json(response)
    }
}

/// Constant-time byte comparison that does not leak input lengths.
/// Both inputs are hashed to fixed-length digests before comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use sha2::{Digest, Sha256};
    use subtle::ConstantTimeEq;
    let ha = Sha256::digest(a);
    let hb = Sha256::digest(b);
    ha.ct_eq(&hb).into()
}

#[get("/metrics")]
pub async fn metrics_endpoint(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    match &state.config.metrics_token {
        Some(expected) => {
            let authorized = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()))
                .unwrap_or(false);

            if !authorized {
                return HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "unauthorized",
                    "message": "Valid Bearer token required for /metrics"
                }));
            }
        }
        None => {
            // No token configured: metrics stay closed unless explicitly opened.
            if !state.config.public_metrics {
                return HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "forbidden",
                    "message": "Set METRICS_TOKEN or DURIAN_PUBLIC_METRICS=true to access /metrics"
                }));
            }
        }
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::metrics_output())
}
