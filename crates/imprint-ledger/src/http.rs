//! REST gateway client.
//!
//! Talks JSON to a submission gateway that fronts the consensus network:
//!
//! - `POST {gateway}/api/v1/topics/{topic}/messages`
//! - `GET  {gateway}/api/v1/transactions/{transaction}/receipt`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use imprint_core::TransactionId;

use crate::client::{LedgerClient, ReceiptStatus, SubmitAck, SubmitRequest};
use crate::error::ClientError;

#[derive(Debug, Serialize)]
struct SubmitBody {
    transaction_id: String,
    /// Hex of the envelope bytes.
    message: String,
    signature: String,
    public_key: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    transaction_id: String,
    accepted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
enum ReceiptBody {
    Success {
        sequence_number: u64,
        consensus_timestamp: DateTime<Utc>,
    },
    Pending,
    Rejected {
        reason: String,
    },
}

impl From<ReceiptBody> for ReceiptStatus {
    fn from(body: ReceiptBody) -> Self {
        match body {
            ReceiptBody::Success {
                sequence_number,
                consensus_timestamp,
            } => ReceiptStatus::Success {
                sequence_number,
                consensus_at: consensus_timestamp,
            },
            ReceiptBody::Pending => ReceiptStatus::Pending,
            ReceiptBody::Rejected { reason } => ReceiptStatus::Rejected(reason),
        }
    }
}

/// Map a non-success HTTP status to a client error.
fn status_error(status: StatusCode, body: &str) -> ClientError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized(detail),
        StatusCode::NOT_FOUND => ClientError::NotFound(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ClientError::Transport(detail)
        }
        s if s.is_client_error() => ClientError::Rejected(detail),
        _ => ClientError::Transport(detail),
    }
}

/// Ledger client for a JSON submission gateway.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    http: reqwest::Client,
    gateway_url: String,
}

impl HttpLedgerClient {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), gateway_url)
    }

    /// Use a preconfigured reqwest client (proxies, TLS roots).
    pub fn with_client(http: reqwest::Client, gateway_url: impl Into<String>) -> Self {
        Self {
            http,
            gateway_url: gateway_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn messages_url(&self, request: &SubmitRequest) -> String {
        format!("{}/api/v1/topics/{}/messages", self.gateway_url, request.topic_id)
    }

    fn receipt_url(&self, transaction_id: &TransactionId) -> String {
        format!(
            "{}/api/v1/transactions/{}/receipt",
            self.gateway_url, transaction_id
        )
    }

    async fn read_error(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        status_error(status, body.trim())
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn submit_message(&self, request: SubmitRequest) -> Result<SubmitAck, ClientError> {
        let body = SubmitBody {
            transaction_id: request.transaction_id.to_string(),
            message: hex::encode(&request.payload),
            signature: hex::encode(request.signature.to_bytes()),
            public_key: hex::encode(request.public_key.to_bytes()),
        };

        let response = self
            .http
            .post(self.messages_url(&request))
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let ack: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        let transaction_id: TransactionId = ack
            .transaction_id
            .parse()
            .map_err(|e| ClientError::InvalidResponse(format!("transaction id: {}", e)))?;

        Ok(SubmitAck {
            transaction_id,
            accepted_at: ack.accepted_at,
        })
    }

    async fn get_receipt(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<ReceiptStatus, ClientError> {
        let response = self
            .http
            .get(self.receipt_url(transaction_id))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body: ReceiptBody = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        Ok(body.into())
    }
}
