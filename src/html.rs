use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::builtin;
use crate::date::DateFormatter;
use crate::pagination::PostList;
use crate::post::PostSummary;

pub struct PageOptions<'a> {
    pub site_title: &'a str,
    pub load_more_label: &'a str,
    pub post_base_path: &'a str,
    pub formatter: &'a DateFormatter,
}

pub fn build_html(
    state: &PostList,
    options: &PageOptions<'_>,
    css: &str,
    css_link_href: Option<&str>,
) -> anyhow::Result<String> {
    let title = format!("Home | {}", options.site_title);
    let lang = options.formatter.html_lang();
    let next_page = state.next_page();
    let months = serde_json::to_string(&options.formatter.month_abbreviations())?;

    let markup: Markup = html! {
        (DOCTYPE)
        html lang=(lang) {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                @if let Some(href) = css_link_href {
                    link rel="stylesheet" href=(href);
                } @else {
                    style { (PreEscaped(css)) }
                }
            }
            body {
                header class="header" data-type="large" {
                    a href="/" aria-label=(options.site_title) {
                        span class="logo" { "spacetraveling" }
                        span class="logo-dot" { "." }
                    }
                }
                main {
                    section id="posts" class="content" {
                        @for post in state.posts() {
                            (render_post(post, options.post_base_path))
                        }
                        @if let Some(url) = next_page {
                            button type="button" id="load-more" class="load-more"
                                data-next-page=(url.as_str())
                                data-post-base=(options.post_base_path)
                                data-months=(months) {
                                (options.load_more_label)
                            }
                        }
                    }
                }
                @if next_page.is_some() {
                    script { (PreEscaped(builtin::LOAD_MORE_JS)) }
                }
            }
        }
    };
    Ok(markup.into_string())
}

fn render_post(post: &PostSummary, post_base_path: &str) -> Markup {
    let article = html! {
        article class="post-article" {
            h2 { (post.title) }
            p { (post.subtitle) }
            div class="post-info" {
                div class="post-date" {
                    @if let Some(date) = &post.first_publication_date {
                        time { (date) }
                    }
                }
                div class="post-author" {
                    span { (post.author) }
                }
            }
        }
    };

    if post.uid.is_empty() {
        return article;
    }
    html! {
        a class="post-link" href=(format!("{}{}", post_base_path, post.uid)) {
            (article)
        }
    }
}
