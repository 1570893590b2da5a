use std::sync::OnceLock;

use regex::Regex;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap()
    })
}

pub fn is_valid_email(s: &str) -> bool {
    email_regex().is_match(s.trim())
}

/// Reduces a contact to a canonical form so that suppressions and schedules match however the contact was typed.
///
/// E-mail addresses are trimmed and lower-cased. Anything else is treated as a phone number and reduced to its
/// digits, so `+234 801-234-5678` and `2348012345678` are the same contact.
pub fn normalize_contact(contact: &str) -> String {
    let trimmed = contact.trim();
    if trimmed.contains('@') {
        trimmed.to_ascii_lowercase()
    } else {
        trimmed.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}
