mod currency;
mod helpers;
mod minor_units;

pub mod op;
mod secret;

pub use currency::{Currency, CurrencyError};
pub use helpers::{parse_boolean_flag, parse_list};
pub use minor_units::{MinorUnits, MinorUnitsConversionError};
pub use secret::Secret;
