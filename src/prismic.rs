use anyhow::{Context as _, anyhow};
use serde::Deserialize;
use url::Url;

use crate::fetcher::Fetcher;
use crate::post::{PageResponse, PostsPagination};
use crate::progress::RequestKind;

/// A single-page query for documents of one custom type.
#[derive(Debug, Clone)]
pub struct ContentQuery {
    pub document_type: String,
    pub fields: Vec<String>,
    pub page_size: u32,
}

impl ContentQuery {
    /// Title, subtitle and author of `document_type` documents.
    pub fn summaries(document_type: &str, page_size: u32) -> Self {
        Self {
            document_type: document_type.to_string(),
            fields: ["title", "subtitle", "author"]
                .iter()
                .map(|field| format!("{document_type}.{field}"))
                .collect(),
            page_size,
        }
    }

    fn predicate(&self) -> String {
        format!("[[at(document.type, \"{}\")]]", self.document_type)
    }
}

impl Default for ContentQuery {
    fn default() -> Self {
        Self::summaries("post", 2)
    }
}

#[derive(Debug, Deserialize)]
struct ApiRoot {
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    id: String,
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default, rename = "isMasterRef")]
    is_master_ref: bool,
}

pub struct ContentSource {
    fetcher: Fetcher,
    endpoint: Url,
    access_token: Option<String>,
}

impl ContentSource {
    pub fn new(fetcher: Fetcher, endpoint: Url, access_token: Option<String>) -> Self {
        Self {
            fetcher,
            endpoint,
            access_token,
        }
    }

    /// Resolves the ref of the currently published content.
    pub async fn master_ref(&self) -> anyhow::Result<String> {
        let mut url = self.endpoint.clone();
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        let root: ApiRoot = self
            .fetcher
            .get_json(url, RequestKind::ApiRoot)
            .await
            .with_context(|| format!("read api root {}", self.endpoint))?;

        let found = root
            .refs
            .iter()
            .find(|r| r.is_master_ref)
            .or_else(|| root.refs.iter().find(|r| r.id == "master"))
            .ok_or_else(|| anyhow!("api root {} lists no master ref", self.endpoint))?;
        Ok(found.reference.clone())
    }

    pub fn search_url(&self, master_ref: &str, query: &ContentQuery) -> anyhow::Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("api endpoint {} cannot be a base url", self.endpoint))?
            .pop_if_empty()
            .extend(["documents", "search"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("ref", master_ref)
                .append_pair("q", &query.predicate())
                .append_pair("fetch", &query.fields.join(","))
                .append_pair("pageSize", &query.page_size.to_string());
            if let Some(token) = &self.access_token {
                pairs.append_pair("access_token", token);
            }
        }
        Ok(url)
    }

    pub async fn query(&self, query: &ContentQuery) -> anyhow::Result<PageResponse> {
        let master_ref = self.master_ref().await?;
        let url = self.search_url(&master_ref, query)?;
        self.fetcher
            .get_json(url, RequestKind::Search)
            .await
            .context("query documents")
    }
}

/// Fetches the first page of post summaries. Later pages are left to the paginator.
pub async fn fetch_posts_pagination(
    source: &ContentSource,
    query: &ContentQuery,
) -> anyhow::Result<PostsPagination> {
    let response = source.query(query).await?;
    tracing::info!(
        document_type = %query.document_type,
        count = response.results.len(),
        total_pages = response.total_pages.unwrap_or(0),
        "fetched first page"
    );
    PostsPagination::from_response(response)
}
