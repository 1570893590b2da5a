use serde_json::{Map, Value};

const SENSITIVE_KEYS: [&str; 9] =
    ["email", "phone", "authorization", "secret", "token", "card", "cvv", "pin", "account_number"];

/// Returns a copy of `payload` that is safe to log. Values under keys that look like personal data or credentials
/// are replaced with `****`, at any depth.
pub fn redact_payload(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            let redacted = map
                .iter()
                .map(|(k, v)| {
                    let key = k.to_ascii_lowercase();
                    if SENSITIVE_KEYS.iter().any(|s| key.contains(s)) {
                        (k.clone(), Value::String("****".into()))
                    } else {
                        (k.clone(), redact_payload(v))
                    }
                })
                .collect::<Map<String, Value>>();
            Value::Object(redacted)
        },
        Value::Array(items) => Value::Array(items.iter().map(redact_payload).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn masks_nested_personal_data() {
        let payload = json!({
            "email": "ada@example.com",
            "amount": 500000,
            "metadata": { "customer_phone": "+2348012345678", "items": [{"sku": "A1", "card_last4": "4081"}] },
            "authorization_url": "https://checkout.paystack.com/abc"
        });
        let r = redact_payload(&payload);
        assert_eq!(r["email"], "****");
        assert_eq!(r["amount"], 500000);
        assert_eq!(r["metadata"]["customer_phone"], "****");
        assert_eq!(r["metadata"]["items"][0]["sku"], "A1");
        assert_eq!(r["metadata"]["items"][0]["card_last4"], "****");
        assert_eq!(r["authorization_url"], "****");
    }
}
