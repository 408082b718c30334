use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use bytes::Bytes;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use url::Url;

use crate::progress::{Progress, RequestKind};

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    progress: Option<Arc<Progress>>,
}

impl Fetcher {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            client,
            progress: None,
        })
    }

    pub(crate) fn with_progress(mut self, progress: Arc<Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        kind: RequestKind,
    ) -> anyhow::Result<T> {
        let (bytes, _headers) = self.get_bytes(url.clone(), kind).await?;
        serde_json::from_slice(&bytes).with_context(|| format!("decode json from {}", url))
    }

    /// GETs `url` once. Any non-success status is an error; nothing is retried.
    pub(crate) async fn get_bytes(
        &self,
        url: Url,
        kind: RequestKind,
    ) -> anyhow::Result<(Bytes, HeaderMap)> {
        if let Some(p) = &self.progress {
            p.http_start(kind, &url);
        }
        tracing::debug!(%url, "GET");

        let resp = match self.client.get(url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.report_err(kind, &url);
                return Err(e).with_context(|| format!("GET {}", url));
            }
        };

        let status = resp.status();
        let headers = resp.headers().clone();

        if !status.is_success() {
            self.report_err(kind, &url);
            return Err(match retry_after_duration(&headers) {
                Some(wait) => anyhow!(
                    "GET {} failed with status {} (server asked to retry after {}s)",
                    url,
                    status,
                    wait.as_secs()
                ),
                None => anyhow!("GET {} failed with status {}", url, status),
            });
        }

        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.report_err(kind, &url);
                return Err(e).context("read response body");
            }
        };
        if let Some(p) = &self.progress {
            p.http_ok(kind, &url, bytes.len());
        }
        Ok((bytes, headers))
    }

    fn report_err(&self, kind: RequestKind, url: &Url) {
        if let Some(p) = &self.progress {
            p.http_err(kind, url);
        }
    }
}

fn retry_after_duration(headers: &HeaderMap) -> Option<Duration> {
    let v = headers.get(RETRY_AFTER)?;
    let s = v.to_str().ok()?.trim();
    let seconds: u64 = s.parse().ok()?;
    Some(Duration::from_secs(seconds))
}
