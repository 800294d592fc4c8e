use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::types::{Heading, PageImage, PageLink};
use crate::selectors::{
    HEADING_SELECTOR, IMAGE_SELECTOR, LINK_SELECTOR, META_DESCRIPTION_SELECTOR,
    OG_DESCRIPTION_SELECTOR, TITLE_SELECTOR,
};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

pub(super) const MARKUP_LIMIT: usize = 500;

/// Element text with runs of whitespace collapsed to one space.
pub(super) fn element_text(el: &ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

pub(super) fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// First `limit` characters, never splitting a character.
pub(super) fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

/// Resolve `href` against `base`; unparseable bases keep the raw value.
pub(super) fn absolutize(base: Option<&Url>, href: &str) -> String {
    match base.and_then(|b| b.join(href.trim()).ok()) {
        Some(url) => url.to_string(),
        None => href.trim().to_string(),
    }
}

pub(super) fn extract_title(doc: &Html) -> String {
    doc.select(&TITLE_SELECTOR)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default()
}

fn meta_content(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
}

pub(super) fn extract_meta_description(doc: &Html) -> String {
    meta_content(doc, &META_DESCRIPTION_SELECTOR)
        .or_else(|| meta_content(doc, &OG_DESCRIPTION_SELECTOR))
        .unwrap_or_default()
}

/// All H1s first, then H2s, then H3s; empty headings dropped.
pub(super) fn extract_headings(doc: &Html) -> Vec<Heading> {
    let mut headings: Vec<Heading> = doc
        .select(&HEADING_SELECTOR)
        .filter_map(|el| {
            let text = element_text(&el);
            (!text.is_empty()).then(|| Heading {
                tag: el.value().name().to_ascii_uppercase(),
                text,
            })
        })
        .collect();
    headings.sort_by(|a, b| a.tag.cmp(&b.tag));
    headings
}

pub(super) fn extract_links(doc: &Html, base: Option<&Url>) -> Vec<PageLink> {
    let base_host = base.and_then(|b| b.host_str());
    doc.select(&LINK_SELECTOR)
        .filter_map(|el| {
            let href = absolutize(base, el.value().attr("href")?);
            let host = Url::parse(&href).ok().and_then(|u| u.host_str().map(str::to_string));
            Some(PageLink {
                same_host: base_host.is_some() && host.as_deref() == base_host,
                text: element_text(&el),
                href,
            })
        })
        .collect()
}

pub(super) fn extract_images(doc: &Html, base: Option<&Url>) -> Vec<PageImage> {
    doc.select(&IMAGE_SELECTOR)
        .filter_map(|el| {
            let src = el.value().attr("src")?;
            Some(PageImage {
                src: absolutize(base, src),
                alt: el.value().attr("alt").unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}
