use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use durian_pay::SettlementError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing client input
    #[error("{0}")]
    BadRequest(String),

    /// A required server credential is absent
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    /// The attestation signer failed
    #[error("signing failed: {0}")]
    SignerFailed(String),

    #[error(transparent)]
    Settlement(#[from] SettlementError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::SignerFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::Settlement(e) => match e {
                SettlementError::InProgress(_) => StatusCode::CONFLICT,
                SettlementError::Transfer(_) | SettlementError::Unconfirmed { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                SettlementError::CompletionRejected { .. }
                | SettlementError::CompletionUnreachable { .. } => StatusCode::BAD_GATEWAY,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Settlement(SettlementError::InProgress(reference)) => serde_json::json!({
                "error": self.to_string(),
                "reference": reference,
            }),
            ApiError::Settlement(SettlementError::Unconfirmed {
                tx_hash,
                reference,
                error,
            }) => serde_json::json!({
                "error": format!("Transfer not confirmed: {error}"),
                "tx_hash": tx_hash,
                "reference": reference,
            }),
            ApiError::Settlement(SettlementError::CompletionRejected {
                tx_hash,
                reference,
                status,
                body,
                ..
            }) => serde_json::json!({
                "error": "Payment complete API rejected the settlement",
                "tx_hash": tx_hash,
                "reference": reference,
                "status": status,
                "body": body,
            }),
            ApiError::Settlement(SettlementError::CompletionUnreachable {
                tx_hash,
                reference,
                error,
                ..
            }) => serde_json::json!({
                "error": format!("Payment complete API unreachable: {error}"),
                "tx_hash": tx_hash,
                "reference": reference,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, TxHash};
    use durian_pay::PayError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotConfigured("WALLET_PRIVATE_KEY").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(SettlementError::InProgress("r".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(SettlementError::Transfer(PayError::ChainError("x".into())))
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(SettlementError::CompletionUnreachable {
                tx_hash: TxHash::ZERO,
                reference: "r".into(),
                payer_wallet: Address::ZERO,
                error: "timeout".into(),
            })
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[actix_rt::test]
    async fn test_unconfirmed_transfer_body_carries_tx_hash() {
        let err = ApiError::from(SettlementError::Unconfirmed {
            tx_hash: TxHash::repeat_byte(0x42),
            reference: Some("order-7".into()),
            error: "no receipt after 60s".into(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = actix_web::body::to_bytes(err.error_response().into_body())
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["tx_hash"], serde_json::json!(TxHash::repeat_byte(0x42)));
        assert_eq!(json["reference"], "order-7");
    }

    #[test]
    fn test_not_configured_message() {
        assert_eq!(
            ApiError::NotConfigured("WALLET_PRIVATE_KEY").to_string(),
            "WALLET_PRIVATE_KEY not configured"
        );
    }
}
