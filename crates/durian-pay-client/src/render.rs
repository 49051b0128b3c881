//! Plain-text rendering of the dashboard and payment page.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use durian_pay::PaymentRecord;

use crate::views::{
    format_signed_amount, DashboardState, ModalSection, PaymentPage, PaymentSummary, BALANCE,
    BRAND, RECENT_TRANSACTIONS,
};

const NAV: &[&str] = &[
    "Dashboard",
    "Payment",
    "Accounts",
    "Cards",
    "Notifications",
    "Help",
    "Settings",
];

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn render_nav(out: &mut String, active: &str) {
    let _ = writeln!(out, "{BRAND}");
    let items: Vec<String> = NAV
        .iter()
        .map(|item| {
            if *item == active {
                format!("[{item}]")
            } else {
                item.to_string()
            }
        })
        .collect();
    let _ = writeln!(out, "{}", items.join("  "));
    let _ = writeln!(out);
}

pub fn render_dashboard(state: &DashboardState) -> String {
    let mut out = String::new();
    render_nav(&mut out, "Dashboard");

    let _ = writeln!(out, "Dashboard");
    let _ = writeln!(out, "Balance: {BALANCE}");
    let _ = writeln!(out, "  [Send]  [Transfer]");
    let _ = writeln!(out);
    let _ = writeln!(out, "Recent transactions");
    for tx in RECENT_TRANSACTIONS {
        let name = match tx.note {
            Some(note) => format!("{} ({note})", tx.name),
            None => tx.name.to_string(),
        };
        let _ = writeln!(out, "  {name:<20} {:>10}", format_signed_amount(tx.amount));
    }

    let sections = state.modal_sections();
    if !sections.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "+-- Payment ---------------------------------");
        for section in sections {
            render_section(&mut out, &section, state);
        }
        let _ = writeln!(out, "+--------------------------------------------");
    }
    out
}

fn render_section(out: &mut String, section: &ModalSection<'_>, state: &DashboardState) {
    match section {
        ModalSection::Loading => {
            let _ = writeln!(out, "| Loading payment...");
        }
        ModalSection::Error(message) => {
            let _ = writeln!(out, "| Error: {message}");
            let _ = writeln!(out, "| [Close]");
        }
        ModalSection::Processing => {
            let _ = writeln!(out, "| Processing payment...");
        }
        ModalSection::Details(payment) => {
            let _ = writeln!(out, "| Payment details");
            let _ = writeln!(out, "| SUCCEEDED");
            render_details(out, payment);
            if let Some(receipt) = &state.receipt {
                let _ = writeln!(out, "| Reference: {}", receipt.reference);
                let _ = writeln!(out, "| Tx:        {}", receipt.tx_hash);
            }
            let _ = writeln!(out, "| [Close]");
        }
        ModalSection::Confirm(payment) => {
            let _ = writeln!(out, "| Confirm Payment");
            let _ = writeln!(
                out,
                "| ${:.2} {}",
                payment.amount, payment.currency
            );
            let _ = writeln!(out, "| To:          {}", payment.merchant);
            let _ = writeln!(out, "| Description: {}", payment.description);
            let _ = writeln!(out, "| [Cancel]  [Pay]");
        }
    }
}

fn render_details(out: &mut String, payment: &PaymentSummary) {
    let now = Some(Utc::now());
    let _ = writeln!(
        out,
        "| ID: {}",
        payment.id.as_deref().unwrap_or("pay_9x7k2m4n1q")
    );
    let _ = writeln!(out, "| ${:.2} {}", payment.amount, payment.currency);
    let _ = writeln!(out, "| {}", payment.description);
    let _ = writeln!(out, "| Date:      {}", format_time(payment.date.or(now)));
    let _ = writeln!(
        out,
        "| Completed: {}",
        format_time(payment.completed_at.or(now))
    );
    let customer = match &payment.customer_email {
        Some(email) => format!("{} ({email})", payment.customer),
        None => payment.customer.clone(),
    };
    let _ = writeln!(out, "| Customer:  {customer}");
    let merchant = match &payment.merchant_category {
        Some(category) => format!("{} - {category}", payment.merchant),
        None => payment.merchant.clone(),
    };
    let _ = writeln!(out, "| Merchant:  {merchant}");
}

pub fn render_payment_page(page: &PaymentPage) -> String {
    let mut out = String::new();
    render_nav(&mut out, "Payment");
    match page {
        PaymentPage::Loading => {
            let _ = writeln!(out, "Loading payment...");
        }
        PaymentPage::Failed(message) => {
            let _ = writeln!(out, "Could not load payment: {message}");
            let _ = writeln!(out, "<- Back to Dashboard");
        }
        PaymentPage::Loaded(record) => render_record(&mut out, record),
    }
    out
}

fn render_record(out: &mut String, record: &PaymentRecord) {
    let _ = writeln!(out, "<- Dashboard");
    let _ = writeln!(out, "Payment details");
    let _ = writeln!(out, "{}", record.status);
    let _ = writeln!(out, "ID: {}", record.id);
    let _ = writeln!(out, "${:.2} {}", record.amount, record.currency);
    if !record.description.is_empty() {
        let _ = writeln!(out, "{}", record.description);
    }
    let _ = writeln!(out, "Date:      {}", format_time(Some(record.date)));
    let _ = writeln!(out, "Completed: {}", format_time(Some(record.completed_at)));
    let _ = writeln!(
        out,
        "Customer:  {} ({})",
        record.customer.name, record.customer.email
    );
    let _ = writeln!(
        out,
        "Merchant:  {} - {}",
        record.merchant.name, record.merchant.category
    );
}
