//! HTTP light-client provider speaking the CometBFT-style RPC.
//!
//! `abci_query?path="/snapshot/height"` yields the provider's latest snapshot
//! height (a base64 JSON document in `response.value`); `commit?height=N`
//! yields the signed header at that height.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::anchor::{HeaderInfo, LightClient, LightClientConnector, ProviderError, SnapshotInfo};
use crate::NodeError;

const SNAPSHOT_HEIGHT_PATH: &str = "\"/snapshot/height\"";

/// Opens [`HttpLightClient`]s sharing one connection pool.
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    /// `request_timeout` bounds each HTTP request; the resolver's per-attempt
    /// timeout still bounds the whole attempt.
    pub fn new(request_timeout: Duration) -> Result<Self, NodeError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| NodeError::Config(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

impl LightClientConnector for HttpConnector {
    fn connect(&self, endpoint: &str) -> Result<Box<dyn LightClient>, ProviderError> {
        Ok(Box::new(HttpLightClient {
            client: self.client.clone(),
            base: normalize_endpoint(endpoint)?,
        }))
    }
}

pub struct HttpLightClient {
    client: reqwest::Client,
    base: Url,
}

impl HttpLightClient {
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn rpc_result(&self, method: &str, query: &[(&str, String)]) -> Result<Value, ProviderError> {
        let url = self
            .base
            .join(method)
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Request(format!("{method}: HTTP {status}")));
        }
        let mut body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            return Err(ProviderError::Request(format!("{method}: {error}")));
        }
        body.get_mut("result")
            .map(Value::take)
            .ok_or_else(|| ProviderError::Decode(format!("{method}: missing result")))
    }
}

#[async_trait]
impl LightClient for HttpLightClient {
    async fn latest_snapshot_info(&self) -> Result<SnapshotInfo, ProviderError> {
        let result = self
            .rpc_result("abci_query", &[("path", SNAPSHOT_HEIGHT_PATH.to_string())])
            .await?;
        parse_snapshot_info(&result)
    }

    async fn header_at(&self, height: i64) -> Result<HeaderInfo, ProviderError> {
        let result = self
            .rpc_result("commit", &[("height", height.to_string())])
            .await?;
        parse_commit(&result)
    }
}

/// Turn a configured endpoint into a base URL. Bare `host:port` and
/// `tcp://` endpoints are served over plain HTTP.
pub fn normalize_endpoint(endpoint: &str) -> Result<Url, ProviderError> {
    let trimmed = endpoint.trim();
    let with_scheme = match trimmed.split_once("://") {
        Some(("tcp", rest)) => format!("http://{rest}"),
        Some(_) => trimmed.to_string(),
        None => format!("http://{trimmed}"),
    };
    let invalid = |reason: String| ProviderError::Endpoint {
        endpoint: endpoint.to_string(),
        reason,
    };
    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[derive(Deserialize)]
struct SnapshotHeight {
    height: u64,
}

fn parse_snapshot_info(result: &Value) -> Result<SnapshotInfo, ProviderError> {
    let response = &result["response"];
    if let Some(code) = response["code"].as_u64().filter(|c| *c != 0) {
        let log = response["log"].as_str().unwrap_or_default();
        return Err(ProviderError::Request(format!("abci_query code {code}: {log}")));
    }
    let encoded = response["value"]
        .as_str()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProviderError::Decode("abci_query: empty value".into()))?;
    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| ProviderError::Decode(format!("abci_query value: {e}")))?;
    let parsed: SnapshotHeight = serde_json::from_slice(&raw)
        .map_err(|e| ProviderError::Decode(format!("abci_query value: {e}")))?;
    Ok(SnapshotInfo {
        height: parsed.height,
    })
}

fn parse_commit(result: &Value) -> Result<HeaderInfo, ProviderError> {
    let signed = &result["signed_header"];
    let header = &signed["header"];
    let chain_id = header["chain_id"]
        .as_str()
        .ok_or_else(|| ProviderError::Decode("commit: missing chain_id".into()))?;
    let height = int_value(&header["height"])
        .ok_or_else(|| ProviderError::Decode("commit: missing height".into()))?;
    let hash = signed["commit"]["block_id"]["hash"]
        .as_str()
        .ok_or_else(|| ProviderError::Decode("commit: missing block hash".into()))?;
    Ok(HeaderInfo {
        chain_id: chain_id.to_string(),
        height,
        hash: hash.to_string(),
    })
}

/// Heights arrive as JSON strings from CometBFT, numbers from others.
fn int_value(v: &Value) -> Option<i64> {
    match v {
        Value::String(s) => s.parse().ok(),
        other => other.as_i64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoints_get_http_scheme_and_trailing_slash() {
        assert_eq!(
            normalize_endpoint("10.0.0.1:26657").unwrap().as_str(),
            "http://10.0.0.1:26657/"
        );
        assert_eq!(
            normalize_endpoint("tcp://node:26657").unwrap().as_str(),
            "http://node:26657/"
        );
        assert_eq!(
            normalize_endpoint("https://rpc.example.org/chain").unwrap().as_str(),
            "https://rpc.example.org/chain/"
        );
        assert!(normalize_endpoint("ftp://x").is_err());
    }

    #[test]
    fn snapshot_height_is_base64_json() {
        let value = STANDARD.encode(br#"{"height":1200}"#);
        let result = json!({"response": {"code": 0, "value": value}});
        assert_eq!(parse_snapshot_info(&result).unwrap().height, 1200);
    }

    #[test]
    fn failed_abci_query_is_rejected() {
        let result = json!({"response": {"code": 6, "log": "no snapshots"}});
        assert!(matches!(
            parse_snapshot_info(&result),
            Err(ProviderError::Request(_))
        ));
        let empty = json!({"response": {"code": 0, "value": null}});
        assert!(matches!(parse_snapshot_info(&empty), Err(ProviderError::Decode(_))));
    }

    #[test]
    fn commit_header_fields_are_extracted() {
        let result = json!({
            "signed_header": {
                "header": {"chain_id": "bastion-test", "height": "1200"},
                "commit": {"height": "1200", "block_id": {"hash": "ABCDEF"}}
            },
            "canonical": true
        });
        let header = parse_commit(&result).unwrap();
        assert_eq!(header.chain_id, "bastion-test");
        assert_eq!(header.height, 1200);
        assert_eq!(header.hash, "ABCDEF");
    }

    #[test]
    fn commit_without_hash_is_malformed() {
        let result = json!({"signed_header": {"header": {"chain_id": "c", "height": 3}}});
        assert!(matches!(parse_commit(&result), Err(ProviderError::Decode(_))));
    }
}
