//! HTML templates for rendered issues.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Titles, dates and URLs are auto-escaped; the markdown-derived intro and
//! article fragments are inserted as-is via `PreEscaped`.
//!
//! Both kinds share [`base_document`], which always emits a `<title>` element:
//! the listing and the mailer read the subject back from it.

use crate::config::SiteConfig;
use crate::types::IssueBody;
use maud::{DOCTYPE, Markup, PreEscaped, html};

const CSS: &str = include_str!("../static/newsletter.css");

/// Renders the base HTML document structure.
fn base_document(lang: &str, title: &str, body_class: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(lang) {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body class=[body_class] {
                div.wrapper {
                    (content)
                }
            }
        }
    }
}

fn masthead(title: &str, date: &str) -> Markup {
    html! {
        header.masthead {
            h1 { (title) }
            p.date { (date) }
        }
    }
}

fn site_footer(site: &SiteConfig) -> Markup {
    html! {
        footer.site-footer {
            p { (site.name) }
        }
    }
}

/// Render a complete issue document.
pub fn render_document(site: &SiteConfig, title: &str, date: &str, body: &IssueBody) -> Markup {
    let (class, main) = match body {
        IssueBody::Standard { intro, articles } => (
            None,
            html! {
                main {
                    section.intro { (PreEscaped(intro)) }
                    section.articles { (PreEscaped(articles)) }
                }
            },
        ),
        IssueBody::Canvas { image_url } => (
            Some("canvas-issue"),
            html! {
                main.canvas {
                    img src=(image_url) alt=(title);
                }
            },
        ),
    };

    let content = html! {
        (masthead(title, date))
        (main)
        (site_footer(site))
    };

    base_document(&site.language, title, class, content)
}
