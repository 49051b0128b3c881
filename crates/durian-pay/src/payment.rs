use alloy::primitives::{Address, TxHash};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the demo payment served by `/api/payment`.
pub const DEMO_PAYMENT_ID: &str = "pay_9x7k2m4n1q";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: String,
    pub name: String,
    pub category: String,
}

/// A payment as shown on the payment detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: String,
    pub status: String,
    pub date: DateTime<Utc>,
    pub amount: f64,
    pub currency: String,
    pub customer: Customer,
    pub merchant: Merchant,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// The static demo payment with timestamps relative to `now`.
    /// `createdAt` is one hour before `now`.
    pub fn demo(now: DateTime<Utc>) -> Self {
        Self {
            id: DEMO_PAYMENT_ID.to_string(),
            status: "succeeded".to_string(),
            date: now,
            amount: 49.99,
            currency: "USD".to_string(),
            customer: Customer {
                id: "cus_a1b2c3d4".to_string(),
                name: "Alex Chen".to_string(),
                email: "alex.chen@example.com".to_string(),
            },
            merchant: Merchant {
                id: "merchant_wakame_001".to_string(),
                name: "Wakame".to_string(),
                category: "Retail".to_string(),
            },
            description: "Payment for order #2847".to_string(),
            created_at: now - Duration::hours(1),
            completed_at: now,
        }
    }
}

/// Body of `POST /pay-merchant`. All fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_address: Option<String>,
    /// Accepts either a JSON number or a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<serde_json::Value>,
}

/// Successful settlement: the transfer landed and the completion API accepted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub success: bool,
    pub tx_hash: TxHash,
    pub reference: String,
    pub payer_wallet: Address,
    #[serde(rename = "paymentComplete")]
    pub payment_complete: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_record_fixed_fields() {
        let now = Utc::now();
        let record = PaymentRecord::demo(now);
        assert_eq!(record.id, "pay_9x7k2m4n1q");
        assert_eq!(record.status, "succeeded");
        assert_eq!(record.amount, 49.99);
        assert_eq!(record.currency, "USD");
        assert_eq!(record.completed_at, now);
        assert_eq!(record.created_at, now - Duration::hours(1));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_value(PaymentRecord::demo(Utc::now())).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("completedAt").is_some());
        assert_eq!(json["customer"]["email"], "alex.chen@example.com");
        assert_eq!(json["merchant"]["category"], "Retail");
    }

    #[test]
    fn test_settlement_request_accepts_empty_body() {
        let req: SettlementRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, SettlementRequest::default());
    }

    #[test]
    fn test_settlement_request_numeric_amount() {
        let req: SettlementRequest =
            serde_json::from_str(r#"{"reference":"DUR-1","merchantAddress":"0xabc","amount":10.5}"#)
                .unwrap();
        assert_eq!(req.reference.as_deref(), Some("DUR-1"));
        assert_eq!(req.merchant_address.as_deref(), Some("0xabc"));
        assert_eq!(req.amount, Some(serde_json::json!(10.5)));
    }

    #[test]
    fn test_receipt_wire_names() {
        let receipt = SettlementReceipt {
            success: true,
            tx_hash: TxHash::ZERO,
            reference: "DUR-X".to_string(),
            payer_wallet: Address::ZERO,
            payment_complete: serde_json::json!({"ok": true}),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("tx_hash").is_some());
        assert!(json.get("payer_wallet").is_some());
        assert_eq!(json["paymentComplete"]["ok"], true);
    }
}
