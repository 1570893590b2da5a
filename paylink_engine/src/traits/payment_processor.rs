use paystack_tools::{
    InitializeTransactionRequest,
    InitializedTransaction,
    PaystackApi,
    PaystackApiError,
    VerifiedTransaction,
};

/// The processor's transaction API, as the engine uses it.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    async fn initialize_transaction(
        &self,
        request: &InitializeTransactionRequest,
    ) -> Result<InitializedTransaction, PaystackApiError>;

    async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, PaystackApiError>;

    /// Checks the webhook signature over the raw request body.
    fn verify_signature(&self, body: &[u8], signature: &str) -> bool;
}

impl PaymentProcessor for PaystackApi {
    async fn initialize_transaction(
        &self,
        request: &InitializeTransactionRequest,
    ) -> Result<InitializedTransaction, PaystackApiError> {
        PaystackApi::initialize_transaction(self, request).await
    }

    async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, PaystackApiError> {
        PaystackApi::verify_transaction(self, reference).await
    }

    fn verify_signature(&self, body: &[u8], signature: &str) -> bool {
        self.verify_webhook_signature(body, signature)
    }
}
