//! # Transaction validation
//!
//! [`TransactionValidator`] checks transaction requests before they are sent to the processor, and processor
//! confirmations before they are applied to an order. Expected failures never produce an `Err`; they are collected
//! into a [`ValidationResult`]. Only infrastructure faults (the reference lookup failing) are errors.
//!
//! Confirmations are checked in a fixed order: status, currency, amount tolerance and the over-payment guard. The
//! fraud heuristics only run once all of those pass.
mod fraud;
mod rules;

use std::sync::{Arc, OnceLock};

use log::*;
use paystack_tools::VerifiedTransaction;
use plg_common::{Currency, MinorUnits};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub use fraud::{CustomerEmailMatches, FraudCheck, ReferenceMatches};
pub use rules::{ValidationRules, DEFAULT_CHANNELS, DEFAULT_MAX_METADATA_BYTES};

use crate::{
    db_types::Order,
    helpers::is_valid_email,
    traits::{LinkManagement, PaymentGatewayError},
};

/// A request to create a transaction, before any of its fields have been checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub email: String,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub reference: String,
    pub callback_url: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Fraud heuristic failures. They block a confirmation just like errors do.
    pub warnings: Vec<String>,
    /// Normalised values worked out while validating
    pub data: Map<String, Value>,
}

impl ValidationResult {
    fn new() -> Self {
        Self::default()
    }

    fn error<S: Into<String>>(&mut self, msg: S) {
        self.errors.push(msg.into());
    }

    fn warn<S: Into<String>>(&mut self, msg: S) {
        self.warnings.push(msg.into());
    }

    fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty() && self.warnings.is_empty();
        self
    }

    /// All problems, errors first.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().chain(self.warnings.iter()).cloned().collect()
    }
}

/// What a confirmation is checked against.
pub struct ConfirmationContext<'a> {
    pub reference: &'a str,
    pub expected_amount: MinorUnits,
    pub expected_currency: Currency,
    pub expected_email: &'a str,
    /// The order the transaction pays for. `None` for custom links.
    pub order: Option<&'a Order>,
    /// Sum of payments already confirmed against the order
    pub already_confirmed: MinorUnits,
    pub verified: &'a VerifiedTransaction,
}

#[derive(Clone)]
pub struct TransactionValidator {
    rules: ValidationRules,
    fraud_checks: Vec<Arc<dyn FraudCheck>>,
}

impl Default for TransactionValidator {
    fn default() -> Self {
        Self::new(ValidationRules::default())
    }
}

impl TransactionValidator {
    /// A validator with the default fraud heuristics installed.
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules, fraud_checks: vec![Arc::new(ReferenceMatches), Arc::new(CustomerEmailMatches)] }
    }

    pub fn without_fraud_checks(mut self) -> Self {
        self.fraud_checks.clear();
        self
    }

    pub fn with_fraud_check<F: FraudCheck + 'static>(mut self, check: F) -> Self {
        self.fraud_checks.push(Arc::new(check));
        self
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Checks every field of the request that can be checked without I/O.
    pub fn check_request(&self, req: &TransactionRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        if req.email.trim().is_empty() {
            result.error("email is required");
        } else if !is_valid_email(&req.email) {
            result.error(format!("{} is not a valid email address", req.email));
        }
        if req.reference.trim().is_empty() {
            result.error("reference is required");
        }
        if req.currency.trim().is_empty() {
            result.error("currency is required");
        } else {
            match req.currency.parse::<Currency>() {
                Ok(c) if self.rules.supported_currencies.contains(&c) => {
                    result.data.insert("currency".into(), json!(c.code()));
                    self.check_amount(req.amount, c, &mut result);
                },
                _ => result.error(format!("currency {} is not supported", req.currency)),
            }
        }
        if let Some(url) = &req.callback_url {
            if !callback_url_regex().is_match(url) {
                result.error(format!("callback URL {url} is not a well-formed http(s) URL"));
            }
        }
        let unknown = req.channels.iter().filter(|c| !self.rules.allowed_channels.contains(c)).collect::<Vec<_>>();
        if !unknown.is_empty() {
            let unknown = unknown.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
            result.error(format!("channels not allowed: {unknown}"));
        }
        if let Some(metadata) = &req.metadata {
            let size = serde_json::to_vec(metadata).map(|v| v.len()).unwrap_or(usize::MAX);
            if size > self.rules.max_metadata_bytes {
                result.error(format!(
                    "metadata is {size} bytes when serialised, over the limit of {} bytes",
                    self.rules.max_metadata_bytes
                ));
            }
        }
        result.finish()
    }

    fn check_amount(&self, amount: i64, currency: Currency, result: &mut ValidationResult) {
        let (min, max) = self.rules.bounds_for(currency);
        let amount = MinorUnits::from(amount);
        if amount < min || amount > max {
            result.error(format!(
                "amount {} {currency} is outside the allowed range of {} to {}",
                currency.format_amount(amount),
                currency.format_amount(min),
                currency.format_amount(max)
            ));
        } else {
            result.data.insert("amount".into(), json!(amount.value()));
            result.data.insert("amount_display".into(), json!(currency.format_amount(amount)));
        }
    }

    /// [`Self::check_request`] plus the check that the reference has never been used.
    pub async fn validate_request<L: LinkManagement>(
        &self,
        req: &TransactionRequest,
        lookup: &L,
    ) -> Result<ValidationResult, PaymentGatewayError> {
        let mut result = self.check_request(req);
        if !req.reference.trim().is_empty() && lookup.reference_exists(&req.reference).await? {
            result.error(format!("reference {} has already been used", req.reference));
        }
        let result = result.finish();
        if !result.valid {
            debug!("🧮️ Transaction request {} failed validation: {}", req.reference, result.errors.join("; "));
        }
        Ok(result)
    }

    /// Checks a processor confirmation against what we expect to have been paid.
    pub fn validate_confirmation(&self, ctx: &ConfirmationContext<'_>) -> ValidationResult {
        let mut result = ValidationResult::new();
        let verified = ctx.verified;
        if !verified.is_successful() {
            result.error(format!("transaction status is {}, not success", verified.status));
        }
        match verified.currency.parse::<Currency>() {
            Ok(c) if c == ctx.expected_currency => {},
            _ => result.error(format!("paid in {}, expected {}", verified.currency, ctx.expected_currency)),
        }
        let currency = ctx.expected_currency;
        let diff = verified.amount.abs_diff(ctx.expected_amount);
        if !within_tolerance(diff, currency) {
            result.error(format!(
                "paid {} {currency}, expected {} {currency}",
                currency.format_amount(verified.amount),
                currency.format_amount(ctx.expected_amount)
            ));
        }
        if let Some(order) = ctx.order {
            let confirmed = ctx.already_confirmed + verified.amount;
            let excess = confirmed - order.total;
            if excess.is_positive() && !within_tolerance(excess.value().unsigned_abs(), currency) {
                result.error(format!(
                    "confirming this payment would bring order {} to {} {currency}, over its total of {} {currency}",
                    order.id,
                    currency.format_amount(confirmed),
                    currency.format_amount(order.total)
                ));
            }
        }
        if result.errors.is_empty() {
            for check in &self.fraud_checks {
                if let Some(reason) = check.check(ctx) {
                    warn!("🧮️ Fraud heuristic {} flagged {}: {reason}", check.name(), ctx.reference);
                    result.warn(reason);
                }
            }
        }
        result.data.insert("reference".into(), json!(ctx.reference));
        result.data.insert("amount".into(), json!(verified.amount.value()));
        result.finish()
    }
}

/// True if `diff` minor units is at most 0.01 display units of `currency`.
fn within_tolerance(diff: u64, currency: Currency) -> bool {
    diff.saturating_mul(100) <= currency.multiplier().unsigned_abs()
}

fn callback_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://[A-Za-z0-9\-._~]+(:\d{1,5})?(/[^\s]*)?$").unwrap())
}
