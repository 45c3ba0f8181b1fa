use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{SettlementError, SettlementResult};
use crate::ledger::UtxoSource;
use crate::models::{KupoDatumResponse, KupoUtxoResponse, OutputReference, Utxo};

/// Read-only ledger view backed by a Kupo indexer.
pub struct KupoApi {
    api_url: String,
    client: reqwest::Client,
}

/// Kupo match pattern selecting a single output.
pub fn output_pattern(reference: &OutputReference) -> String {
    format!("{}@{}", reference.output_index, reference.tx_hash)
}

impl KupoApi {
    pub fn new(api_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // 5 minutes for large queries
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self::with_client(api_url, client))
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn with_client(api_url: &str, client: reqwest::Client) -> Self {
        Self {
            api_url: crate::utils::remove_trailing_slash(api_url),
            client,
        }
    }

    fn build_matches_url(&self, match_pattern: &str, unspent: bool) -> String {
        let base = format!("{}/matches/{}", self.api_url, match_pattern);
        if unspent {
            format!("{}?unspent", base)
        } else {
            base
        }
    }

    fn build_datum_url(&self, hash: &str) -> String {
        format!("{}/datums/{}", self.api_url, hash)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(anyhow!("rate_limited"));
        }
        if !response.status().is_success() {
            return Err(anyhow!("{} returned {}", url, response.status()));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Outputs matching `match_pattern`, with inline datums resolved.
    pub async fn get(&self, match_pattern: &str, unspent: bool) -> Result<Vec<Utxo>> {
        let url = self.build_matches_url(match_pattern, unspent);
        let matches: Vec<KupoUtxoResponse> =
            crate::utils::retry(10, 1000, || self.fetch_json(&url)).await?;

        let mut utxos = Vec::with_capacity(matches.len());
        for m in matches {
            let inline = m.datum_type.as_deref() == Some("inline");
            let mut utxo = m.into_utxo();
            if inline {
                if let Some(hash) = utxo.data_hash.clone() {
                    utxo.inline_datum = self.datum(&hash).await?;
                }
            }
            utxos.push(utxo);
        }
        debug!(pattern = match_pattern, count = utxos.len(), "kupo matches");
        Ok(utxos)
    }

    /// CBOR of the datum with `hash`, if Kupo has seen it.
    pub async fn datum(&self, hash: &str) -> Result<Option<String>> {
        let url = self.build_datum_url(hash);
        let response: Option<KupoDatumResponse> =
            crate::utils::retry(10, 1000, || self.fetch_json(&url)).await?;
        Ok(response.map(|r| r.datum))
    }
}

fn source(e: anyhow::Error) -> SettlementError {
    SettlementError::Source(e.to_string())
}

#[async_trait]
impl UtxoSource for KupoApi {
    async fn utxos_at(&self, address: &str) -> SettlementResult<Vec<Utxo>> {
        self.get(address, true).await.map_err(source)
    }

    async fn utxos_by_refs(&self, refs: &[OutputReference]) -> SettlementResult<Vec<Utxo>> {
        let mut utxos = Vec::with_capacity(refs.len());
        for reference in refs {
            let found = self
                .get(&output_pattern(reference), true)
                .await
                .map_err(source)?
                .into_iter()
                .next()
                .ok_or_else(|| SettlementError::TargetNotFound(reference.to_string()))?;
            utxos.push(found);
        }
        Ok(utxos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let kupo = KupoApi::new("http://localhost:1442/").unwrap();
        assert_eq!(kupo.api_url(), "http://localhost:1442");
        assert_eq!(
            kupo.build_matches_url("addr_test1wq", true),
            "http://localhost:1442/matches/addr_test1wq?unspent"
        );
        assert_eq!(
            kupo.build_datum_url("dd"),
            "http://localhost:1442/datums/dd"
        );
    }

    #[test]
    fn test_output_pattern() {
        let reference = OutputReference::new("ABCD", 3);
        assert_eq!(output_pattern(&reference), "3@abcd");
    }

    #[test]
    fn test_datum_response_may_be_null() {
        let none: Option<KupoDatumResponse> = serde_json::from_str("null").unwrap();
        assert!(none.is_none());
        let some: Option<KupoDatumResponse> =
            serde_json::from_str(r#"{"datum": "d87980"}"#).unwrap();
        assert_eq!(some.unwrap().datum, "d87980");
    }
}
