//! dApp request, response and notification types

use serde::Serialize;

/// dApp method with its opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Method {
    Connect { favicon: Option<String> },
    Disconnect,
    GetPublicKey,
    SignTransaction { tx: Vec<u8> },
    SignAllTransactions { txs: Vec<Vec<u8>> },
    SignMessage { message: Vec<u8> },
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Connect { .. } => "connect",
            Method::Disconnect => "disconnect",
            Method::GetPublicKey => "get_public_key",
            Method::SignTransaction { .. } => "sign_transaction",
            Method::SignAllTransactions { .. } => "sign_all_transactions",
            Method::SignMessage { .. } => "sign_message",
        }
    }

    pub fn is_signing(&self) -> bool {
        matches!(
            self,
            Method::SignTransaction { .. }
                | Method::SignAllTransactions { .. }
                | Method::SignMessage { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    PublicKey(String),
    Signature(Vec<u8>),
    Signatures(Vec<Vec<u8>>),
    Disconnected,
}

/// A request waiting for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRequest {
    pub id: u64,
    pub origin: String,
    pub method: Method,
    /// The UI must collect the password before it can approve
    pub requires_reauth: bool,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Approved,
    Rejected(String),
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A request took the slot, or its reauth flag changed.
    Pending { request: PendingRequest },
    Response {
        request_id: u64,
        origin: String,
        outcome: Outcome,
    },
    Disconnected { origin: String },
}
