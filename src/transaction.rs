//! Transaction Store (§4.8): the per-request record of what the pipeline
//! saw and decided, keyed by request id. Grounded on the teacher's
//! `RwLock`-guarded in-process map of server state (`MockServerState`).

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use http::{Request, Response};

use crate::validate::ValidationError;

/// Everything recorded about a single proxied request (§4.8).
#[derive(Debug, Clone)]
pub struct Transaction {
    pub request_id: String,
    pub request: Request<Bytes>,
    /// The request actually sent upstream, if the Request Rewriter ran
    /// (absent on a mock hit, which never reaches the Transport Wrapper).
    pub rewritten_request: Option<Request<Bytes>>,
    pub response: Option<Response<Bytes>>,
    pub request_validation_errors: Vec<ValidationError>,
    pub response_validation_errors: Vec<ValidationError>,
    pub received_at: chrono::DateTime<chrono::Local>,
}

impl Transaction {
    pub fn new(request_id: impl Into<String>, request: Request<Bytes>) -> Self {
        Self {
            request_id: request_id.into(),
            request,
            rewritten_request: None,
            response: None,
            request_validation_errors: Vec::new(),
            response_validation_errors: Vec::new(),
            received_at: chrono::Local::now(),
        }
    }
}

/// Implemented by whatever holds transactions for later inspection.
pub trait TransactionStore: Send + Sync {
    fn put(&self, transaction: Transaction);
    fn get(&self, request_id: &str) -> Option<Transaction>;
    fn set_rewritten_request(&self, request_id: &str, request: Request<Bytes>);
    fn set_response(&self, request_id: &str, response: Response<Bytes>);
    fn set_request_validation_errors(&self, request_id: &str, errors: Vec<ValidationError>);
    fn set_response_validation_errors(&self, request_id: &str, errors: Vec<ValidationError>);
}

/// Default in-process implementation: an `RwLock`-guarded map, readable by
/// any number of concurrent lookups and written once per transaction.
#[derive(Default)]
pub struct InMemoryTransactionStore {
    transactions: RwLock<HashMap<String, Transaction>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn put(&self, transaction: Transaction) {
        self.transactions
            .write()
            .expect("transaction store lock poisoned")
            .insert(transaction.request_id.clone(), transaction);
    }

    fn get(&self, request_id: &str) -> Option<Transaction> {
        self.transactions
            .read()
            .expect("transaction store lock poisoned")
            .get(request_id)
            .cloned()
    }

    fn set_rewritten_request(&self, request_id: &str, request: Request<Bytes>) {
        if let Some(txn) = self
            .transactions
            .write()
            .expect("transaction store lock poisoned")
            .get_mut(request_id)
        {
            txn.rewritten_request = Some(request);
        }
    }

    fn set_response(&self, request_id: &str, response: Response<Bytes>) {
        if let Some(txn) = self
            .transactions
            .write()
            .expect("transaction store lock poisoned")
            .get_mut(request_id)
        {
            txn.response = Some(response);
        }
    }

    fn set_request_validation_errors(&self, request_id: &str, errors: Vec<ValidationError>) {
        if let Some(txn) = self
            .transactions
            .write()
            .expect("transaction store lock poisoned")
            .get_mut(request_id)
        {
            txn.request_validation_errors = errors;
        }
    }

    fn set_response_validation_errors(&self, request_id: &str, errors: Vec<ValidationError>) {
        if let Some(txn) = self
            .transactions
            .write()
            .expect("transaction store lock poisoned")
            .get_mut(request_id)
        {
            txn.response_validation_errors = errors;
        }
    }
}
