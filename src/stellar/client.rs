use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HorizonError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
}

/// Response from Horizon /transactions/{hash}, reduced to the fields the
/// dispatcher consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub hash: String,
    pub successful: bool,
    pub ledger: i64,
    pub created_at: DateTime<Utc>,
}

/// HTTP client for interacting with the Stellar Horizon API
#[derive(Clone)]
pub struct HorizonClient {
    client: Client,
    base_url: String,
}

impl HorizonClient {
    /// Creates a new HorizonClient with the specified base URL
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        HorizonClient { client, base_url }
    }

    /// Fetches an on-chain transaction by hash. Used as the oracle for the
    /// instant a transfer was confirmed on the network.
    pub async fn get_transaction(&self, hash: &str) -> Result<TransactionRecord, HorizonError> {
        let url = format!(
            "{}/transactions/{}",
            self.base_url.trim_end_matches('/'),
            hash
        );

        let response = self.client.get(&url).send().await?;

        if response.status() == 404 {
            return Err(HorizonError::TransactionNotFound(hash.to_string()));
        }

        let record = response.json::<TransactionRecord>().await?;
        Ok(record)
    }
}
