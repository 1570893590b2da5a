use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use chrono::Utc;
use paystack_tools::{
    sign_payload,
    verify_signature,
    Customer,
    InitializeTransactionRequest,
    InitializedTransaction,
    PaystackApiError,
    VerifiedTransaction,
};
use plg_common::MinorUnits;
use tokio::sync::Notify;
use serde_json::Value;

use crate::traits::{MessageReceipt, MessagingChannel, MessagingError, PaymentProcessor};

pub const FAKE_WEBHOOK_SECRET: &str = "sk_test_paylink_fake";

/// An in-memory processor. Initialized transactions stay unpaid until [`FakeProcessor::settle`] is called.
#[derive(Debug, Default)]
pub struct FakeProcessor {
    initialized: Mutex<HashMap<String, InitializeTransactionRequest>>,
    settled: Mutex<HashMap<String, VerifiedTransaction>>,
    init_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    fail_initialize: Mutex<Option<PaystackApiError>>,
    fail_verify: Mutex<Option<PaystackApiError>>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signs `body` the way the processor would.
    pub fn sign(&self, body: &[u8]) -> String {
        sign_payload(FAKE_WEBHOOK_SECRET, body)
    }

    /// Marks the transaction as paid with the given amount and currency.
    pub fn settle(&self, reference: &str, amount: i64, currency: &str) {
        let email = self.initialized.lock().unwrap().get(reference).map(|r| r.email.clone());
        let verified = VerifiedTransaction {
            id: 1_000 + self.settled.lock().unwrap().len() as i64,
            status: "success".into(),
            reference: reference.to_string(),
            amount: MinorUnits::from(amount),
            currency: currency.to_string(),
            channel: Some("card".into()),
            paid_at: Some(Utc::now()),
            gateway_response: Some("Successful".into()),
            customer: Some(Customer { email, phone: None }),
            metadata: Value::Null,
        };
        self.settled.lock().unwrap().insert(reference.to_string(), verified);
    }

    pub fn fail_initialize_with(&self, err: Option<PaystackApiError>) {
        *self.fail_initialize.lock().unwrap() = err;
    }

    pub fn fail_verify_with(&self, err: Option<PaystackApiError>) {
        *self.fail_verify.lock().unwrap() = err;
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

impl PaymentProcessor for FakeProcessor {
    async fn initialize_transaction(
        &self,
        request: &InitializeTransactionRequest,
    ) -> Result<InitializedTransaction, PaystackApiError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_initialize.lock().unwrap().clone() {
            return Err(err);
        }
        // A little latency so that concurrent creators really overlap
        tokio::time::sleep(Duration::from_millis(10)).await;
        let reference = request.reference.clone();
        self.initialized.lock().unwrap().insert(reference.clone(), request.clone());
        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.paystack.test/{reference}"),
            access_code: format!("ac_{reference}"),
            reference,
        })
    }

    async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, PaystackApiError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_verify.lock().unwrap().clone() {
            return Err(err);
        }
        if let Some(v) = self.settled.lock().unwrap().get(reference) {
            return Ok(v.clone());
        }
        let request = self.initialized.lock().unwrap().get(reference).cloned();
        match request {
            Some(req) => Ok(VerifiedTransaction {
                id: 1,
                status: "abandoned".into(),
                reference: reference.to_string(),
                amount: req.amount,
                currency: req.currency.to_string(),
                channel: None,
                paid_at: None,
                gateway_response: None,
                customer: None,
                metadata: Value::Null,
            }),
            None => Err(PaystackApiError::HttpError { status: 404, message: "Transaction reference not found".into() }),
        }
    }

    fn verify_signature(&self, body: &[u8], signature: &str) -> bool {
        verify_signature(FAKE_WEBHOOK_SECRET, body, signature)
    }
}

/// A messaging channel that records what it was asked to send. It can be told to fail a number of times, or to
/// hold the next send until released.
#[derive(Debug, Default)]
pub struct FakeMessenger {
    sent: Mutex<Vec<(String, String)>>,
    failures_left: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
    sending: Notify,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// The next send blocks until `notify_one` is called on the returned handle.
    pub fn hold_next_send(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Resolves once a held send has started.
    pub async fn wait_for_send(&self) {
        self.sending.notified().await;
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, contact: &str) -> usize {
        self.sent.lock().unwrap().iter().filter(|(c, _)| c == contact).count()
    }
}

impl MessagingChannel for FakeMessenger {
    async fn send_message(&self, contact: &str, text: &str) -> Result<MessageReceipt, MessagingError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.sending.notify_one();
            gate.notified().await;
        }
        let fail = self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok();
        if fail {
            return Err(MessagingError::Transport("connection reset".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((contact.to_string(), text.to_string()));
        Ok(MessageReceipt { message_id: format!("msg_{}", sent.len()) })
    }
}
