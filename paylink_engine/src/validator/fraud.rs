//! Pluggable fraud heuristics.
//!
//! Heuristics only run on confirmations that passed every structural check. A failing heuristic blocks the
//! confirmation and is reported as a warning rather than an error.
use crate::validator::ConfirmationContext;

pub trait FraudCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns a human-readable reason if the confirmation looks suspicious.
    fn check(&self, ctx: &ConfirmationContext<'_>) -> Option<String>;
}

/// The processor must report the same reference we asked it to verify.
pub struct ReferenceMatches;

impl FraudCheck for ReferenceMatches {
    fn name(&self) -> &'static str {
        "reference_matches"
    }

    fn check(&self, ctx: &ConfirmationContext<'_>) -> Option<String> {
        (ctx.verified.reference != ctx.reference).then(|| {
            format!("Processor reported reference {} while verifying {}", ctx.verified.reference, ctx.reference)
        })
    }
}

/// The paying customer should be the one the transaction was initialized for.
pub struct CustomerEmailMatches;

impl FraudCheck for CustomerEmailMatches {
    fn name(&self) -> &'static str {
        "customer_email_matches"
    }

    fn check(&self, ctx: &ConfirmationContext<'_>) -> Option<String> {
        let paid_by = ctx.verified.customer.as_ref().and_then(|c| c.email.as_deref())?;
        (!paid_by.trim().eq_ignore_ascii_case(ctx.expected_email.trim()))
            .then(|| format!("Payment was made by {paid_by}, but the transaction belongs to {}", ctx.expected_email))
    }
}
