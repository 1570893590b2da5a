use std::collections::HashMap;

use plg_common::{Currency, MinorUnits};

pub const DEFAULT_MAX_METADATA_BYTES: usize = 5 * 1024;
pub const DEFAULT_CHANNELS: [&str; 6] = ["card", "bank", "ussd", "qr", "mobile_money", "bank_transfer"];

/// The limits a transaction request is checked against.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub supported_currencies: Vec<Currency>,
    /// Inclusive `(min, max)` per currency, in minor units.
    pub amount_bounds: HashMap<Currency, (MinorUnits, MinorUnits)>,
    pub allowed_channels: Vec<String>,
    /// Limit on the serialised size of the metadata object.
    pub max_metadata_bytes: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        let amount_bounds = Currency::ALL.iter().map(|c| (*c, c.default_bounds())).collect();
        Self {
            supported_currencies: Currency::ALL.to_vec(),
            amount_bounds,
            allowed_channels: DEFAULT_CHANNELS.iter().map(|s| s.to_string()).collect(),
            max_metadata_bytes: DEFAULT_MAX_METADATA_BYTES,
        }
    }
}

impl ValidationRules {
    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.allowed_channels = channels;
        self
    }

    pub fn with_bounds(mut self, currency: Currency, min: MinorUnits, max: MinorUnits) -> Self {
        self.amount_bounds.insert(currency, (min, max));
        self
    }

    pub fn with_currencies(mut self, currencies: Vec<Currency>) -> Self {
        self.supported_currencies = currencies;
        self
    }

    pub fn bounds_for(&self, currency: Currency) -> (MinorUnits, MinorUnits) {
        self.amount_bounds.get(&currency).copied().unwrap_or_else(|| currency.default_bounds())
    }
}
