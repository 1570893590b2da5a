use log::*;
use paylink_engine::PaymentProcessor;
use paystack_tools::{
    InitializeTransactionRequest,
    InitializedTransaction,
    PaystackApi,
    PaystackApiError,
    PaystackConfig,
    VerifiedTransaction,
};

/// The processor the server hands to the engine.
///
/// When no secret key is configured the gateway still starts, but fails closed: every processor call returns
/// [`PaystackApiError::MissingCredentials`] and every webhook signature is rejected.
#[derive(Clone)]
pub enum GatewayProcessor {
    Live(PaystackApi),
    Unavailable,
}

impl GatewayProcessor {
    pub fn from_config(config: PaystackConfig) -> Self {
        match PaystackApi::new(config) {
            Ok(api) => {
                info!("💳️ Paystack client ready");
                Self::Live(api)
            },
            Err(e) => {
                error!("💳️ The payment gateway is unavailable. {e}");
                Self::Unavailable
            },
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Live(_))
    }
}

impl PaymentProcessor for GatewayProcessor {
    async fn initialize_transaction(
        &self,
        request: &InitializeTransactionRequest,
    ) -> Result<InitializedTransaction, PaystackApiError> {
        match self {
            Self::Live(api) => api.initialize_transaction(request).await,
            Self::Unavailable => Err(PaystackApiError::MissingCredentials),
        }
    }

    async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, PaystackApiError> {
        match self {
            Self::Live(api) => api.verify_transaction(reference).await,
            Self::Unavailable => Err(PaystackApiError::MissingCredentials),
        }
    }

    fn verify_signature(&self, body: &[u8], signature: &str) -> bool {
        match self {
            Self::Live(api) => api.verify_webhook_signature(body, signature),
            Self::Unavailable => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn missing_credentials_fail_closed() {
        let processor = GatewayProcessor::from_config(PaystackConfig::default());
        assert!(!processor.is_available());
        let err = processor.verify_transaction("PLG_1_abc").await.unwrap_err();
        assert_eq!(err, PaystackApiError::MissingCredentials);
        assert!(!processor.verify_signature(b"{}", "00"));
    }

    #[test]
    fn configured_key_is_live() {
        let processor = GatewayProcessor::from_config(PaystackConfig::default().with_secret_key("sk_test_123"));
        assert!(processor.is_available());
    }
}
