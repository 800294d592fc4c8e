use serde::{Deserialize, Serialize};

/// Structured summary of one fetched page.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct PageSummary {
    pub title: String,
    /// `meta[name=description]`, else `og:description`; empty when neither.
    pub meta_description: String,
    #[serde(default)]
    pub headings: Vec<Heading>,
    #[serde(default)]
    pub links: Vec<PageLink>,
    #[serde(default)]
    pub images: Vec<PageImage>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// `H1`, `H2` or `H3`.
    pub tag: String,
    pub text: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Absolute, resolved against the page's final URL.
    pub href: String,
    pub text: String,
    /// Same host as the page itself.
    pub same_host: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub src: String,
    pub alt: String,
}
