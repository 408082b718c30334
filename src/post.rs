use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::date::DateFormatter;

/// One page of documents as returned by the content API.
#[derive(Debug, Deserialize)]
pub struct PageResponse {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u64>,
    pub results: Vec<RawPost>,
    #[serde(default)]
    pub next_page: Option<String>,
}

impl PageResponse {
    pub fn next_page_url(&self) -> anyhow::Result<Option<Url>> {
        match self.next_page.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Url::parse(raw)
                .map(Some)
                .with_context(|| format!("parse next_page {raw:?}")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawPost {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub first_publication_date: Option<String>,
    pub data: RawPostData,
}

#[derive(Debug, Deserialize)]
pub struct RawPostData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub uid: String,
    pub first_publication_date: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

impl PostSummary {
    pub fn from_raw(raw: RawPost) -> Self {
        let uid = raw.uid.unwrap_or_default();
        if uid.is_empty() {
            tracing::warn!(title = %raw.data.title, "post has no uid; it will not link to a detail page");
        }
        Self {
            uid,
            first_publication_date: raw.first_publication_date,
            title: raw.data.title,
            subtitle: raw.data.subtitle,
            author: raw.data.author,
        }
    }

    /// Replaces the ISO publication date with its display form.
    pub fn with_display_date(self, formatter: &DateFormatter) -> anyhow::Result<Self> {
        let first_publication_date = match self.first_publication_date.as_deref() {
            Some(iso) => Some(
                formatter
                    .format(iso)
                    .with_context(|| format!("format date of post {:?}", self.uid))?,
            ),
            None => None,
        };
        Ok(Self {
            first_publication_date,
            ..self
        })
    }
}

/// First page handed from the content fetcher to the renderer.
#[derive(Debug, Clone, Serialize)]
pub struct PostsPagination {
    pub results: Vec<PostSummary>,
    pub next_page: Option<Url>,
}

impl PostsPagination {
    pub fn from_response(response: PageResponse) -> anyhow::Result<Self> {
        let next_page = response.next_page_url()?;
        let results = response
            .results
            .into_iter()
            .map(PostSummary::from_raw)
            .collect();
        Ok(Self { results, next_page })
    }
}
