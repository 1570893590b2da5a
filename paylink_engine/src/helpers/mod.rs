mod contact;
mod keyed_lock;
mod reference;

pub use contact::{is_valid_email, normalize_contact};
pub use keyed_lock::KeyedLocks;
pub use reference::generate_reference;
