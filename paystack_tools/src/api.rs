use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::PaystackConfig,
    data_objects::{InitializeTransactionRequest, InitializedTransaction, PaystackResponse, VerifiedTransaction},
    rate_limiter::RateLimiter,
    redact::redact_payload,
    signature::verify_signature,
    PaystackApiError,
};

#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
    limiter: Arc<RateLimiter>,
}

impl PaystackApi {
    pub fn new(config: PaystackConfig) -> Result<Self, PaystackApiError> {
        if config.secret_key.is_blank() {
            return Err(PaystackApiError::MissingCredentials);
        }
        let mut headers = HeaderMap::with_capacity(2);
        let mut val = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        let limiter = RateLimiter::new(config.rate_limit, config.rate_window);
        Ok(Self { config, client: Arc::new(client), limiter: Arc::new(limiter) })
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url, endpoint.trim_start_matches('/'))
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Sends an authenticated request to `endpoint` and decodes the JSON response.
    ///
    /// The endpoint's rate window is consulted first; when it is full the call fails with
    /// [`PaystackApiError::RateLimited`] and nothing goes over the wire.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<T, PaystackApiError> {
        self.limiter.check(endpoint)?;
        let url = self.url(endpoint);
        let logged = body.map(redact_payload).unwrap_or(Value::Null);
        debug!("💳️ {method} {endpoint} {logged}");
        let mut req = self.client.request(method.clone(), url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(|e| {
            warn!("💳️ {method} {endpoint} failed in transit. {e}. Payload: {logged}");
            PaystackApiError::TransportError(e.to_string())
        })?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            warn!("💳️ {method} {endpoint} response could not be read. {e}");
            PaystackApiError::TransportError(e.to_string())
        })?;
        if status.as_u16() >= 400 {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v["message"].as_str().map(String::from))
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).to_string());
            warn!("💳️ {method} {endpoint} returned {status}. {message}. Payload: {logged}");
            return Err(PaystackApiError::HttpError { status: status.as_u16(), message });
        }
        self.limiter.record(endpoint);
        trace!("💳️ {method} {endpoint} returned {status}");
        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            warn!("💳️ {method} {endpoint} returned a body we could not decode. {e}");
            PaystackApiError::DecodeError(e.to_string())
        })
    }

    /// Creates the processor-side transaction. Never retried automatically, since a retry after a lost response
    /// would hit a duplicate-reference error at best.
    pub async fn initialize_transaction(
        &self,
        request: &InitializeTransactionRequest,
    ) -> Result<InitializedTransaction, PaystackApiError> {
        let body = serde_json::to_value(request).map_err(|e| PaystackApiError::DecodeError(e.to_string()))?;
        let response = self
            .call::<PaystackResponse<InitializedTransaction>>(Method::POST, "/transaction/initialize", Some(&body))
            .await?;
        let result = unwrap_envelope(response)?;
        info!("💳️ Transaction {} initialized", result.reference);
        Ok(result)
    }

    /// Fetches the authoritative state of a transaction. Transient failures are retried with a linear backoff.
    pub async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, PaystackApiError> {
        let endpoint = format!("/transaction/verify/{reference}");
        let mut attempt = 0;
        loop {
            let result = self
                .call::<PaystackResponse<VerifiedTransaction>>(Method::GET, &endpoint, None)
                .await
                .and_then(unwrap_envelope);
            match result {
                Err(e) if e.is_transient() && attempt < self.config.verify_retries => {
                    attempt += 1;
                    let delay = self.config.retry_backoff * attempt;
                    warn!("💳️ Verifying {reference} failed ({e}). Retry {attempt} in {delay:?}");
                    tokio::time::sleep(delay).await;
                },
                result => return result,
            }
        }
    }

    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        verify_signature(self.config.secret_key.reveal(), body, signature)
    }
}

fn unwrap_envelope<T>(response: PaystackResponse<T>) -> Result<T, PaystackApiError> {
    match (response.status, response.data) {
        (true, Some(data)) => Ok(data),
        (_, _) => Err(PaystackApiError::DecodeError(format!("Response carried no data. {}", response.message))),
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    fn offline_api() -> PaystackApi {
        // Nothing listens on the discard port, so any request that does go out fails fast
        let config = PaystackConfig {
            retry_backoff: Duration::from_millis(1),
            ..PaystackConfig::default().with_secret_key("sk_test_123").with_base_url("http://127.0.0.1:9/")
        };
        PaystackApi::new(config).unwrap()
    }

    #[test]
    fn missing_credentials_fail_closed() {
        let err = PaystackApi::new(PaystackConfig::default()).err();
        assert_eq!(err, Some(PaystackApiError::MissingCredentials));
    }

    #[test]
    fn urls() {
        let api = offline_api();
        assert_eq!(api.url("/transaction/initialize"), "http://127.0.0.1:9/transaction/initialize");
    }

    #[tokio::test]
    async fn rate_limited_calls_never_leave_the_process() {
        let _ = env_logger::try_init();
        let api = offline_api();
        for _ in 0..100 {
            api.rate_limiter().record("/transaction/verify");
        }
        let start = std::time::Instant::now();
        let err = api.verify_transaction("PLG_1_1_abc").await.unwrap_err();
        assert!(matches!(err, PaystackApiError::RateLimited { .. }), "{err:?}");
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(api.rate_limiter().current_count("/transaction/verify/PLG_1_1_abc"), 100);
    }

    #[tokio::test]
    async fn transport_errors_are_classified_and_not_counted() {
        let api = offline_api();
        let err = api.verify_transaction("PLG_1_1_abc").await.unwrap_err();
        assert!(matches!(err, PaystackApiError::TransportError(_)), "{err:?}");
        assert_eq!(api.rate_limiter().current_count("/transaction/verify"), 0);
    }

    #[test]
    fn envelopes_without_data_are_decode_errors() {
        let resp = PaystackResponse::<InitializedTransaction> {
            status: false,
            message: "Duplicate Transaction Reference".into(),
            data: None,
        };
        let err = unwrap_envelope(resp).unwrap_err();
        assert!(matches!(err, PaystackApiError::DecodeError(m) if m.contains("Duplicate")));
    }
}
