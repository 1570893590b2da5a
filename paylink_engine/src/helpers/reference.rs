use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::OrderId;

const SUFFIX_LENGTH: usize = 10;

/// Generates a transaction reference of the form `{PREFIX}_{order_id}_{unix_millis}_{random}`.
///
/// The random suffix is ten alphanumeric characters, so two references minted in the same millisecond for the same
/// order collide with negligible probability. The database's unique constraint is the final arbiter.
pub fn generate_reference(prefix: &str, order_id: OrderId) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let suffix = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LENGTH)
        .map(char::from)
        .collect::<String>()
        .to_ascii_lowercase();
    format!("{}_{}_{timestamp}_{suffix}", prefix.to_ascii_uppercase(), order_id.value())
}
