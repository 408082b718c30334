mod builtin;
mod cli;
mod date;
mod fetcher;
mod html;
mod pagination;
mod post;
mod prismic;
mod progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use cli::Args;

pub use cli::{Args as CliArgs, Mode, ProgressMode};
pub use date::DateFormatter;
pub use fetcher::Fetcher;
pub use pagination::{Action, LoadOutcome, LoadToken, PageSource, Paginator, PostList, reduce};
pub use post::{PageResponse, PostSummary, PostsPagination, RawPost, RawPostData};
pub use prismic::{ContentQuery, ContentSource, fetch_posts_pagination};

pub async fn run(args: Args) -> anyhow::Result<()> {
    use std::io::IsTerminal as _;

    let progress_enabled = match args.progress {
        ProgressMode::Always => true,
        ProgressMode::Never => false,
        ProgressMode::Auto => std::io::stderr().is_terminal(),
    };
    let progress = progress::Progress::new(progress_enabled);
    let res = build(&args, progress.clone()).await;
    progress.finish();
    res
}

async fn build(args: &Args, progress: Arc<progress::Progress>) -> anyhow::Result<()> {
    let fetcher = Fetcher::new(&args.user_agent)?.with_progress(progress.clone());
    let formatter = DateFormatter::new(args.locale);

    progress.set_stage("fetching posts");
    progress.set_pages_total(args.prefetch_pages.max(1));
    let source = ContentSource::new(
        fetcher.clone(),
        args.api_endpoint.clone(),
        args.access_token.clone(),
    );
    let query = ContentQuery::summaries(&args.document_type, args.page_size);
    let first = fetch_posts_pagination(&source, &query)
        .await
        .with_context(|| format!("fetch posts from {}", args.api_endpoint))?;
    progress.page_loaded(first.results.len());

    let initial = PostList::from_initial(first, &formatter)?;
    let state = prefetch(initial, fetcher, formatter, args.prefetch_pages, &progress).await?;

    progress.set_stage("rendering");
    let options = html::PageOptions {
        site_title: &args.site_title,
        load_more_label: &args.load_more_label,
        post_base_path: &args.post_base_path,
        formatter: &formatter,
    };
    let css_text = load_css(&args.css)?;

    progress.set_stage("writing output");
    match args.mode {
        Mode::Dir => {
            let out_dir = args.out.clone().unwrap_or_else(|| PathBuf::from("out"));
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("create {}", out_dir.display()))?;
            let css_rel = write_css_file(&out_dir, &css_text)?;
            let html = html::build_html(&state, &options, "", Some(&css_rel))?;
            write_file(&out_dir.join("index.html"), &html)?;
            let props = serde_json::to_string_pretty(&state.to_pagination())
                .context("serialize posts.json")?;
            write_file(&out_dir.join("posts.json"), &props)?;
        }
        Mode::Single => {
            let out_path = args
                .out
                .clone()
                .unwrap_or_else(|| PathBuf::from("index.html"));
            if let Some(parent) = out_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("create {}", parent.display()))?;
                }
            }
            let html = html::build_html(&state, &options, &css_text, None)?;
            write_file(&out_path, &html)?;
        }
    }

    tracing::info!(
        posts = state.posts().len(),
        has_next = state.next_page().is_some(),
        "home page rendered"
    );
    Ok(())
}

/// Follows the cursor at build time until `pages` pages are loaded or it runs out.
async fn prefetch(
    initial: PostList,
    fetcher: Fetcher,
    formatter: DateFormatter,
    pages: usize,
    progress: &progress::Progress,
) -> anyhow::Result<PostList> {
    if pages <= 1 || initial.next_page().is_none() {
        return Ok(initial);
    }

    progress.set_stage("loading more posts");
    let paginator = Paginator::new(initial, fetcher, formatter);
    for _ in 1..pages {
        match paginator.load_more().await? {
            LoadOutcome::Appended { count } => progress.page_loaded(count),
            LoadOutcome::Exhausted => break,
            LoadOutcome::Busy => anyhow::bail!("pagination request already in flight"),
        }
    }
    paginator.into_state()
}

fn load_css(files: &[PathBuf]) -> anyhow::Result<String> {
    if files.is_empty() {
        return Ok(builtin::BUILTIN_CSS.to_string());
    }

    let mut bundled = String::new();
    for (idx, path) in files.iter().enumerate() {
        let css = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        if idx != 0 {
            bundled.push('\n');
        }
        bundled.push_str(&css);
        bundled.push('\n');
    }
    tracing::info!(count = files.len(), "using custom stylesheets");
    Ok(bundled)
}

fn write_css_file(out_dir: &Path, css: &str) -> anyhow::Result<String> {
    let rel = "assets/css/site.css".to_string();
    let abs = out_dir.join(&rel);
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    write_file(&abs, css)?;
    Ok(rel)
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
