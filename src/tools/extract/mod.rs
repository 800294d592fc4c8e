pub mod types;
mod utils;

pub use types::*;
use utils::*;

use scraper::{Html, Selector};
use url::Url;

use crate::error::{FetchError, Result};
use crate::tools::fetch::FetchResponse;

/// Summarize a page: title, meta description, H1–H3 headings, links and
/// images, with links and images resolved against `final_url`.
///
/// # Examples
/// ```
/// use tierfetch::tools::extract::summarize;
///
/// let html = r#"<title>Shop</title><h1>Deals</h1><a href="/cart">Cart</a>"#;
/// let summary = summarize(html, "https://shop.example.com/deals");
/// assert_eq!(summary.title, "Shop");
/// assert_eq!(summary.links[0].href, "https://shop.example.com/cart");
/// assert!(summary.links[0].same_host);
/// ```
pub fn summarize(html: &str, final_url: &str) -> PageSummary {
    let doc = Html::parse_document(html);
    let base = Url::parse(final_url).ok();

    PageSummary {
        title: extract_title(&doc),
        meta_description: extract_meta_description(&doc),
        headings: extract_headings(&doc),
        links: extract_links(&doc, base.as_ref()),
        images: extract_images(&doc, base.as_ref()),
    }
}

/// Summarize a fetched response using its body and post-redirect URL.
pub fn summarize_response(response: &FetchResponse) -> PageSummary {
    summarize(&response.body, &response.final_url)
}

/// Every element matching `css`: its text, or its markup (first 500 chars)
/// when it has no text.
pub fn select(html: &str, css: &str) -> Result<Vec<String>> {
    let selector =
        Selector::parse(css).map_err(|e| FetchError::InvalidSelector(format!("{css:?}: {e}")))?;
    let doc = Html::parse_document(html);

    Ok(doc
        .select(&selector)
        .map(|el| {
            let text = element_text(&el);
            if text.is_empty() {
                truncate_chars(&collapse_whitespace(&el.html()), MARKUP_LIMIT)
            } else {
                text
            }
        })
        .collect())
}
