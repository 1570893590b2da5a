use mockall::mock;
use paylink_engine::traits::{MessageReceipt, MessagingChannel, MessagingError, PaymentProcessor};
use paystack_tools::{InitializeTransactionRequest, InitializedTransaction, PaystackApiError, VerifiedTransaction};

mock! {
    pub Processor {}
    impl PaymentProcessor for Processor {
        async fn initialize_transaction(&self, request: &InitializeTransactionRequest) -> Result<InitializedTransaction, PaystackApiError>;
        async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, PaystackApiError>;
        fn verify_signature(&self, body: &[u8], signature: &str) -> bool;
    }
}

mock! {
    pub Messenger {}
    impl MessagingChannel for Messenger {
        async fn send_message(&self, contact: &str, text: &str) -> Result<MessageReceipt, MessagingError>;
    }
}
