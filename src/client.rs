use anyhow::{Context, Result};
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;

/// GET with the API key and client identity headers attached.
fn api_get(
    http: &reqwest::Client,
    url: &str,
    api_key: &str,
    user_agent: &str,
) -> reqwest::RequestBuilder {
    http.get(url)
        .header("x-api-key", api_key)
        .header(header::USER_AGENT, user_agent)
}

/// Primary API client. Each request carries the API key and client identity.
pub struct MpClient {
    http: reqwest::Client,
    host: String,
    api_key: String,
    user_agent: String,
}

impl MpClient {
    pub fn new(cfg: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: cfg.host.clone(),
            api_key: cfg.api_key.clone(),
            user_agent: cfg.user_agent.clone(),
        }
    }

    /// Fetch the full doc payload for a material. The record itself lives
    /// under the payload's top-level `response` key; callers check for it.
    pub async fn fetch_doc(&self, mpid: &str) -> Result<Value> {
        let url = format!("{}/rest/v2/materials/{}/doc", self.host, mpid);
        debug!("GET {}", url);
        let payload = api_get(&self.http, &url, &self.api_key, &self.user_agent)
            .send()
            .await
            .with_context(|| format!("doc request for {} failed", mpid))?
            .json::<Value>()
            .await
            .with_context(|| format!("doc payload for {} is not JSON", mpid))?;
        Ok(payload)
    }

    /// Fetch the bibliography endpoint. The body is the bibtex string itself,
    /// not JSON, and is taken verbatim without a status check.
    pub async fn fetch_bibtex(&self, mpid: &str) -> Result<String> {
        let url = format!("{}/materials/{}/bibtex", self.host, mpid);
        debug!("GET {}", url);
        let body = api_get(&self.http, &url, &self.api_key, &self.user_agent)
            .send()
            .await
            .with_context(|| format!("bibtex request for {} failed", mpid))?
            .text()
            .await
            .with_context(|| format!("bibtex body for {} is not text", mpid))?;
        Ok(body)
    }
}

/// Fallback client for materials whose doc payload carries no record.
/// Queries the summary endpoint and returns typed records.
pub struct SummaryClient {
    http: reqwest::Client,
    host: String,
    api_key: String,
    user_agent: String,
}

impl SummaryClient {
    pub fn new(cfg: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: cfg.host.clone(),
            api_key: cfg.api_key.clone(),
            user_agent: cfg.user_agent.clone(),
        }
    }

    pub async fn get_material(&self, mpid: &str) -> Result<Vec<MaterialSummary>> {
        let url = format!("{}/rest/v2/materials/{}/vasp", self.host, mpid);
        debug!("GET {} (summary fallback)", url);
        let payload: Value = api_get(&self.http, &url, &self.api_key, &self.user_agent)
            .send()
            .await
            .with_context(|| format!("summary request for {} failed", mpid))?
            .json()
            .await
            .with_context(|| format!("summary payload for {} is not JSON", mpid))?;
        let records = payload
            .get("response")
            .cloned()
            .with_context(|| format!("summary payload for {} has no response", mpid))?;
        serde_json::from_value(records)
            .with_context(|| format!("summary records for {} have unexpected shape", mpid))
    }
}

/// Typed record from the summary endpoint. Known fields are named; anything
/// else rides along in `extra` and survives the flatten back into a mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSummary {
    pub material_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretty_formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_per_atom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsites: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MaterialSummary {
    /// Convert into the loose raw-record mapping used downstream.
    pub fn into_record(self) -> Result<Value> {
        serde_json::to_value(self).context("serializing summary record")
    }
}
