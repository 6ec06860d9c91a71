//! Coarse page classification included in the planning prompt.

use std::fmt;

use serde::Serialize;

use crate::dom_utils::{closest_ancestor, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Dev,
    Marketplace,
    Blog,
    Generic,
}

impl PageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Dev => "dev",
            PageKind::Marketplace => "marketplace",
            PageKind::Blog => "blog",
            PageKind::Generic => "generic",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEV_HOSTS: [&str; 3] = ["github.com", "stackoverflow.com", "gitlab.com"];
const SHOP_HOSTS: [&str; 3] = ["amazon", "ebay", "shopify"];
const SHOP_MARKERS: &str =
    "meta[property='og:price:amount'], .product-price, #addToCart, .add-to-cart";
const LONG_READ_PARAGRAPHS: usize = 10;

/// Host names first, then markup markers; first match wins.
pub fn detect<D: Document + ?Sized>(document: &D) -> PageKind {
    let url = document.url();
    let host = reqwest::Url::parse(&url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default();
    let exists = |selector: &str| matches!(document.query_selector(selector), Ok(Some(_)));

    let code_block = document
        .query_selector_all("code")
        .unwrap_or_default()
        .iter()
        .any(|code| closest_ancestor(document, code, "pre").is_some());
    if DEV_HOSTS.iter().any(|dev| host.contains(dev)) || code_block || exists(".blob-code") {
        return PageKind::Dev;
    }

    if SHOP_HOSTS.iter().any(|shop| host.contains(shop)) || exists(SHOP_MARKERS) {
        return PageKind::Marketplace;
    }

    let long_read = exists("h1")
        && document
            .query_selector_all("p")
            .map_or(false, |paragraphs| paragraphs.len() > LONG_READ_PARAGRAPHS);
    if exists("article") || url.contains("/blog/") || url.contains("/news/") || long_read {
        return PageKind::Blog;
    }

    PageKind::Generic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_dom::{ElementSpec, MemoryDocument};

    #[test]
    fn test_host_heuristics() {
        assert_eq!(detect(&MemoryDocument::new("", "https://github.com/rust-lang/rust")), PageKind::Dev);
        assert_eq!(detect(&MemoryDocument::new("", "https://www.amazon.de/dp/1")), PageKind::Marketplace);
        assert_eq!(detect(&MemoryDocument::new("", "https://example.test/blog/hello")), PageKind::Blog);
        assert_eq!(detect(&MemoryDocument::new("", "not a url")), PageKind::Generic);
    }

    #[test]
    fn test_markup_heuristics() {
        let doc = MemoryDocument::new("", "https://example.test/");
        doc.append(doc.body(), ElementSpec::new("code").text("inline"));
        assert_eq!(detect(&doc), PageKind::Generic);
        doc.append(doc.body(), ElementSpec::new("pre").child(ElementSpec::new("code").text("fn main() {}")));
        assert_eq!(detect(&doc), PageKind::Dev);

        let shop = MemoryDocument::new("", "https://example.test/item");
        shop.append(shop.body(), ElementSpec::new("button").attr("id", "addToCart"));
        assert_eq!(detect(&shop), PageKind::Marketplace);

        let essay = MemoryDocument::new("", "https://example.test/essay");
        essay.append(essay.body(), ElementSpec::new("h1").text("Essay"));
        for _ in 0..11 {
            essay.append(essay.body(), ElementSpec::new("p").text("..."));
        }
        assert_eq!(detect(&essay), PageKind::Blog);
        assert_eq!(PageKind::Blog.to_string(), "blog");
    }
}
