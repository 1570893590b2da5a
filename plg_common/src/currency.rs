use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::MinorUnits;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("Unsupported currency: {0}")]
    Unsupported(String),
    #[error("Invalid amount for {currency}: {value}")]
    InvalidAmount { currency: Currency, value: String },
}

//--------------------------------------       Currency       ---------------------------------------------------------
/// The set of currencies the processor settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Nigerian naira. 1 NGN = 100 kobo.
    Ngn,
    /// Ghanaian cedi. 1 GHS = 100 pesewas.
    Ghs,
    /// South African rand.
    Zar,
    /// US dollar.
    Usd,
    /// Kenyan shilling.
    Kes,
    /// West African CFA franc. Has no minor unit.
    Xof,
}

impl Currency {
    pub const ALL: [Currency; 6] =
        [Currency::Ngn, Currency::Ghs, Currency::Zar, Currency::Usd, Currency::Kes, Currency::Xof];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ngn => "NGN",
            Currency::Ghs => "GHS",
            Currency::Zar => "ZAR",
            Currency::Usd => "USD",
            Currency::Kes => "KES",
            Currency::Xof => "XOF",
        }
    }

    /// Number of decimal places in the display representation.
    pub fn exponent(&self) -> u32 {
        match self {
            Currency::Xof => 0,
            _ => 2,
        }
    }

    /// Minor units per display unit.
    pub fn multiplier(&self) -> i64 {
        10i64.pow(self.exponent())
    }

    /// The default `(min, max)` amounts the processor accepts, in minor units.
    pub fn default_bounds(&self) -> (MinorUnits, MinorUnits) {
        let (min, max) = match self {
            Currency::Ngn => (5_000, 1_000_000_000),
            Currency::Ghs => (10, 100_000_000),
            Currency::Zar => (100, 100_000_000),
            Currency::Usd => (200, 1_000_000),
            Currency::Kes => (100, 150_000_000),
            Currency::Xof => (100, 10_000_000),
        };
        (MinorUnits::from(min), MinorUnits::from(max))
    }

    /// Converts a display amount such as `"5000.00"` or `"12.5"` into minor units.
    ///
    /// More fractional digits than the currency supports is an error rather than a silent rounding.
    pub fn parse_amount(&self, value: &str) -> Result<MinorUnits, CurrencyError> {
        let err = || CurrencyError::InvalidAmount { currency: *self, value: value.to_string() };
        let trimmed = value.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let mut parts = digits.splitn(2, '.');
        // Signs are only accepted once, above
        let whole = parts.next().filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())).ok_or_else(err)?;
        let whole = whole.parse::<i64>().map_err(|_| err())?;
        let exponent = self.exponent() as usize;
        let fraction = match parts.next() {
            None => 0,
            Some(f) if f.len() > exponent || !f.chars().all(|c| c.is_ascii_digit()) => return Err(err()),
            Some("") => 0,
            Some(f) => {
                let padded = format!("{f:0<exponent$}");
                padded.parse::<i64>().map_err(|_| err())?
            },
        };
        let amount = whole.checked_mul(self.multiplier()).and_then(|w| w.checked_add(fraction)).ok_or_else(err)?;
        Ok(MinorUnits::from(if negative { -amount } else { amount }))
    }

    /// Formats an amount in minor units for display, e.g. `500000` kobo becomes `"5000.00"`.
    pub fn format_amount(&self, amount: MinorUnits) -> String {
        let exponent = self.exponent() as usize;
        if exponent == 0 {
            return amount.value().to_string();
        }
        let m = self.multiplier();
        let sign = if amount.value() < 0 { "-" } else { "" };
        let v = amount.value().unsigned_abs();
        let m = m.unsigned_abs();
        format!("{sign}{}.{:0exponent$}", v / m, v % m)
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Currency::ALL.into_iter().find(|c| c.code() == code).ok_or_else(|| CurrencyError::Unsupported(s.to_string()))
    }
}
