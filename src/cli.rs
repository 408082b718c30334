use std::path::PathBuf;

use chrono::Locale;
use clap::{Parser, ValueEnum};
use url::Url;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Mode {
    Dir,
    Single,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProgressMode {
    /// Enable progress UI when stderr is a TTY.
    Auto,
    /// Always enable progress UI (even when piped).
    Always,
    /// Never show progress UI.
    Never,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Root of the content API (e.g. `https://your-repo.cdn.prismic.io/api/v2`).
    #[arg(long)]
    pub api_endpoint: Url,

    /// Access token for private repositories, sent as the `access_token` query parameter.
    #[arg(long)]
    pub access_token: Option<String>,

    /// Custom type of the documents to list.
    #[arg(long, default_value = "post")]
    pub document_type: String,

    /// Number of posts per page requested from the content API.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: u32,

    /// Pages to include in the generated HTML. Pages after the first are loaded at build time
    /// by following `next_page`; the rest stay behind the "load more" button.
    #[arg(long, default_value_t = 1)]
    pub prefetch_pages: usize,

    /// Locale used for publication dates (e.g. `pt_BR`, `en_US`).
    #[arg(long, default_value = "pt_BR", value_parser = parse_locale)]
    pub locale: Locale,

    /// Site name used in the page title.
    #[arg(long, default_value = "SpaceTravelling")]
    pub site_title: String,

    /// Label of the "load more" button.
    #[arg(long, default_value = "Carregar mais posts")]
    pub load_more_label: String,

    /// Path prefix of the post detail route; the post uid is appended.
    #[arg(long, default_value = "/post/")]
    pub post_base_path: String,

    /// Local CSS files replacing the built-in theme.
    #[arg(long)]
    pub css: Vec<PathBuf>,

    /// Output mode: `dir` (HTML + assets/ + posts.json) or `single` (one self-contained HTML).
    #[arg(long, value_enum, default_value = "dir")]
    pub mode: Mode,

    /// Output path. For `dir` mode: a directory. For `single` mode: an HTML file path.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// HTTP User-Agent used for API requests.
    #[arg(long, default_value = "prismic-blog-render/0.1")]
    pub user_agent: String,

    /// Progress display: `auto`, `always`, or `never`.
    #[arg(long, value_enum, default_value = "auto")]
    pub progress: ProgressMode,
}

fn parse_locale(raw: &str) -> Result<Locale, String> {
    let normalized = raw.trim().replace('-', "_");
    Locale::try_from(normalized.as_str()).map_err(|_| format!("unknown locale `{raw}`"))
}
