//! Dashboard and payment page state.
//!
//! The dashboard's payment modal is an explicit state machine. Its initial
//! state is hydrated from URL query parameters; user actions and fetch
//! results move it between [`ModalStatus`] values.

use chrono::{DateTime, Utc};
use durian_pay::{PaymentRecord, SettlementReceipt, SettlementRequest};

pub const BRAND: &str = "DurianBank";
pub const BALANCE: &str = "$231.00";

/// Amount and recipient used by the dashboard's Send button.
pub const SEND_AMOUNT: f64 = 10.0;
pub const SEND_MERCHANT: &str = "Merchant";

const DRAFT_DESCRIPTION: &str = "Payment for order #2847";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transaction {
    pub name: &'static str,
    pub amount: f64,
    pub note: Option<&'static str>,
}

pub const RECENT_TRANSACTIONS: &[Transaction] = &[
    Transaction {
        name: "Decent",
        amount: -10.0,
        note: None,
    },
    Transaction {
        name: "Wakame",
        amount: 3.0,
        note: Some("rent"),
    },
    Transaction {
        name: "Wakame",
        amount: -1.37,
        note: None,
    },
    Transaction {
        name: "Zinyo",
        amount: 0.0,
        note: None,
    },
];

/// `-$10.00` for negatives, `$3.00` otherwise.
pub fn format_signed_amount(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${:.2}", amount.abs())
}

/// Payment-related query parameters: `payment`, `amount`, `merchant`, `ref`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pub payment: bool,
    pub amount: Option<String>,
    pub merchant: Option<String>,
    pub reference: Option<String>,
}

impl QueryParams {
    /// Parse a query string, with or without the leading `?`. Empty values
    /// count as absent; the first occurrence of a key wins.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        let mut seen_payment = false;
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let value = (!value.is_empty()).then(|| value.into_owned());
            match key.as_ref() {
                "payment" if !seen_payment => {
                    seen_payment = true;
                    params.payment = value.as_deref() == Some("true");
                }
                "amount" if params.amount.is_none() => params.amount = value,
                "merchant" if params.merchant.is_none() => params.merchant = value,
                "ref" if params.reference.is_none() => params.reference = value,
                _ => {}
            }
        }
        params
    }

    /// A payment confirmation draft was requested via `amount` + `merchant`.
    pub fn has_draft(&self) -> bool {
        self.amount.is_some() && self.merchant.is_some()
    }

    /// Whether these parameters open the payment modal.
    pub fn has_payment(&self) -> bool {
        self.payment || self.has_draft()
    }
}

/// What the modal shows about a payment, from a fetched record or a local draft.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSummary {
    pub id: Option<String>,
    pub status: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub merchant: String,
    pub merchant_category: Option<String>,
    pub customer: String,
    pub customer_email: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentSummary {
    pub fn draft(amount: f64, merchant: &str, description: String) -> Self {
        Self {
            id: None,
            status: None,
            amount,
            currency: "USD".to_string(),
            description,
            merchant: merchant.to_string(),
            merchant_category: None,
            customer: "You".to_string(),
            customer_email: None,
            date: None,
            completed_at: None,
        }
    }
}

impl From<PaymentRecord> for PaymentSummary {
    fn from(record: PaymentRecord) -> Self {
        Self {
            id: Some(record.id),
            status: Some(record.status),
            amount: record.amount,
            currency: record.currency,
            description: record.description,
            merchant: record.merchant.name,
            merchant_category: Some(record.merchant.category),
            customer: record.customer.name,
            customer_email: Some(record.customer.email),
            date: Some(record.date),
            completed_at: Some(record.completed_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalStatus {
    Loading,
    Ready,
    Processing,
    Success,
}

/// One independently shown part of the modal. More than one can be visible
/// at a time (a fetch error overlays the loading spinner).
#[derive(Debug, Clone, PartialEq)]
pub enum ModalSection<'a> {
    Loading,
    Error(&'a str),
    Processing,
    Details(&'a PaymentSummary),
    Confirm(&'a PaymentSummary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub params: QueryParams,
    pub visible: bool,
    pub status: ModalStatus,
    pub payment: Option<PaymentSummary>,
    pub error: Option<String>,
    pub receipt: Option<SettlementReceipt>,
}

impl DashboardState {
    /// Initial state for a page load with `params`.
    pub fn from_query(params: QueryParams) -> Self {
        let visible = params.has_payment();
        let (status, payment) = if params.payment {
            (ModalStatus::Loading, None)
        } else if params.has_draft() {
            let amount = params
                .amount
                .as_deref()
                .and_then(|a| a.trim().parse::<f64>().ok())
                .filter(|a| a.is_finite())
                .unwrap_or(0.0);
            let merchant = params.merchant.as_deref().unwrap_or(SEND_MERCHANT);
            (
                ModalStatus::Ready,
                Some(PaymentSummary::draft(
                    amount,
                    merchant,
                    DRAFT_DESCRIPTION.to_string(),
                )),
            )
        } else {
            (ModalStatus::Loading, None)
        };
        Self {
            params,
            visible,
            status,
            payment,
            error: None,
            receipt: None,
        }
    }

    /// `payment=true` pages load the record from the server.
    pub fn needs_fetch(&self) -> bool {
        self.visible && self.params.payment && self.status == ModalStatus::Loading
    }

    pub fn on_fetch_success(&mut self, record: PaymentRecord) {
        self.payment = Some(record.into());
        self.status = ModalStatus::Success;
    }

    /// The spinner stays up with the error overlaid on it.
    pub fn on_fetch_failure(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.status = ModalStatus::Loading;
    }

    /// Send button: open a confirmation draft for `amount` to `merchant`.
    pub fn open_send(&mut self, amount: f64, merchant: &str) {
        let merchant = if merchant.is_empty() { SEND_MERCHANT } else { merchant };
        self.payment = Some(PaymentSummary::draft(
            amount,
            merchant,
            format!("Payment to {merchant}"),
        ));
        self.status = ModalStatus::Ready;
        self.visible = true;
        self.error = None;
        self.receipt = None;
    }

    /// Pay button. Moves `Ready` to `Processing` and returns the settlement
    /// options to hand to the orchestrator; `None` when paying isn't offered.
    pub fn begin_pay(&mut self) -> Option<SettlementRequest> {
        if !self.visible
            || self.status != ModalStatus::Ready
            || self.payment.is_none()
            || self.error.is_some()
        {
            return None;
        }
        self.status = ModalStatus::Processing;
        Some(SettlementRequest {
            reference: self.params.reference.clone(),
            ..Default::default()
        })
    }

    pub fn on_pay_success(&mut self, receipt: SettlementReceipt) {
        if self.status != ModalStatus::Processing {
            return;
        }
        self.receipt = Some(receipt);
        self.status = ModalStatus::Success;
    }

    pub fn on_pay_failure(&mut self, message: impl Into<String>) {
        if self.status != ModalStatus::Processing {
            return;
        }
        self.error = Some(message.into());
        self.status = ModalStatus::Ready;
    }

    /// Close or Cancel: hide the modal, reset everything and drop the query.
    pub fn close(&mut self) {
        *self = Self::from_query(QueryParams::default());
    }

    /// Back/forward navigation to a URL carrying `params`.
    pub fn on_navigate(&mut self, params: QueryParams) {
        self.visible = params.has_payment();
        if self.visible {
            self.status = ModalStatus::Loading;
            self.payment = None;
            self.error = None;
            self.receipt = None;
        }
        self.params = params;
    }

    /// Clicking outside the modal closes it only once a payment succeeded.
    pub fn overlay_click(&mut self) {
        if self.status == ModalStatus::Success {
            self.close();
        }
    }

    /// Sections to show, in display order. Empty when hidden.
    pub fn modal_sections(&self) -> Vec<ModalSection<'_>> {
        let mut sections = Vec::new();
        if !self.visible {
            return sections;
        }
        if self.status == ModalStatus::Loading {
            sections.push(ModalSection::Loading);
        }
        if let Some(error) = &self.error {
            sections.push(ModalSection::Error(error));
        }
        if self.status == ModalStatus::Processing {
            sections.push(ModalSection::Processing);
        }
        match (&self.payment, self.status) {
            (Some(payment), ModalStatus::Success) => sections.push(ModalSection::Details(payment)),
            (Some(payment), ModalStatus::Ready) if self.error.is_none() => {
                sections.push(ModalSection::Confirm(payment))
            }
            _ => {}
        }
        sections
    }
}

/// The standalone `/payment` page.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentPage {
    Loading,
    Loaded(Box<PaymentRecord>),
    Failed(String),
}

impl PaymentPage {
    pub fn on_fetch<E: std::fmt::Display>(&mut self, result: Result<PaymentRecord, E>) {
        *self = match result {
            Ok(record) => PaymentPage::Loaded(Box::new(record)),
            Err(e) => PaymentPage::Failed(e.to_string()),
        };
    }
}
