//! YOURLS adapter.
//!
//! Talks to `{base}/yourls-api.php` with form-encoded POSTs and `format=json`.
//! `delete`, `update` and `change_keyword` need the corresponding API plugins
//! to be active on the instance.

mod response;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use ylb_core::{
    domain::{CreatedLink, ShortUrl},
    errors::Error,
    ports::ShortenerGateway,
    Result,
};

/// `limit` for the full listing; YOURLS has no "everything" switch.
const LISTING_LIMIT: &str = "1000000000";

#[derive(Clone, Debug)]
pub struct YourlsClient {
    base_url: String,
    api_url: String,
    signature: String,
    timestamped: bool,
    http: reqwest::Client,
}

impl YourlsClient {
    pub fn new(
        base_url: impl Into<String>,
        signature: impl Into<String>,
        timestamped: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("yourls http client: {e}")))?;
        Ok(Self {
            api_url: format!("{base_url}/yourls-api.php"),
            base_url,
            signature: signature.into(),
            timestamped,
            http,
        })
    }

    fn auth_params(&self) -> Vec<(&'static str, String)> {
        if !self.timestamped {
            return vec![("signature", self.signature.clone())];
        }
        let timestamp = Utc::now().timestamp().to_string();
        let signature = timed_signature(&timestamp, &self.signature);
        vec![
            ("timestamp", timestamp),
            ("signature", signature),
            ("hash", "sha256".to_string()),
        ]
    }

    async fn call(
        &self,
        action: &str,
        params: &[(&'static str, &str)],
    ) -> Result<serde_json::Value> {
        let mut form: Vec<(&str, String)> = vec![
            ("action", action.to_string()),
            ("format", "json".to_string()),
        ];
        form.extend(params.iter().map(|(k, v)| (*k, v.to_string())));
        form.extend(self.auth_params());

        let resp = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("yourls request error: {e}")))?;

        // Error replies still carry a JSON body, often with a 4xx status.
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("yourls read error: {e}")))?;
        debug!(action, status = status.as_u16(), "yourls api call");

        serde_json::from_str(&body).map_err(|_| {
            warn!(action, status = status.as_u16(), "yourls reply is not json");
            Error::Transport(format!(
                "yourls {action} failed: {status} {}",
                body.chars().take(200).collect::<String>()
            ))
        })
    }
}

/// `sha256(timestamp + token)`, hex encoded.
fn timed_signature(timestamp: &str, token: &str) -> String {
    let digest = Sha256::digest(format!("{timestamp}{token}").as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl ShortenerGateway for YourlsClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn expand(&self, keyword: &str) -> Result<String> {
        let v = self.call("expand", &[("shorturl", keyword)]).await?;
        response::parse_expanded(&v, keyword)
    }

    async fn create(&self, url: &str, keyword: Option<&str>) -> Result<CreatedLink> {
        let mut params = vec![("url", url)];
        if let Some(k) = keyword {
            params.push(("keyword", k));
        }
        let v = self.call("shorturl", &params).await?;
        response::parse_created(&v, keyword)
    }

    async fn rename(&self, old_keyword: &str, new_keyword: &str) -> Result<()> {
        let v = self
            .call(
                "change_keyword",
                &[
                    ("oldshorturl", old_keyword),
                    ("newshorturl", new_keyword),
                    ("title", "auto"),
                ],
            )
            .await?;
        response::parse_renamed(&v, old_keyword, new_keyword)
    }

    async fn retarget(&self, keyword: &str, url: &str) -> Result<()> {
        let v = self
            .call(
                "update",
                &[("shorturl", keyword), ("url", url), ("title", "auto")],
            )
            .await?;
        response::parse_ack(&v, keyword)
    }

    async fn remove(&self, keyword: &str) -> Result<()> {
        let v = self.call("delete", &[("shorturl", keyword)]).await?;
        response::parse_ack(&v, keyword)
    }

    async fn list_all(&self) -> Result<Vec<ShortUrl>> {
        let v = self
            .call("stats", &[("filter", "last"), ("limit", LISTING_LIMIT)])
            .await?;
        response::parse_listing(&v)
    }
}
