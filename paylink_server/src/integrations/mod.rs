pub mod messaging;
pub mod paystack;
