//! Helper functions shared by source adapters
//!
//! This module provides the small pieces every HTML-scraping source needs:
//! - Stable id generation from canonical URLs
//! - Relative/absolute URL conversion against a source domain
//! - Selector compilation and element lookup that fails with a `SourceError`
//! - Image source resolution for lazy-loaded `<img>` tags
//! - Lenient date parsing
//!
//! # Examples
//!
//! ```
//! use merlintoon_parser::helpers::{to_absolute_url, to_relative_url};
//!
//! let abs = to_absolute_url("/seri/foo/", "merlintoon.com");
//! assert_eq!(abs, "https://merlintoon.com/seri/foo/");
//! assert_eq!(to_relative_url(&abs, "merlintoon.com"), "/seri/foo/");
//! ```

use crate::error::{Result, SourceError};
use crate::models::MangaSource;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

/// Attributes checked, in order, when looking for an image URL
const IMAGE_SOURCE_ATTRS: &[&str] = &[
    "data-src",
    "data-cfsrc",
    "data-original",
    "data-cdn",
    "data-lazy-src",
    "original-src",
    "src",
];

/// Derive a stable id for an entity from its source and canonical URL.
///
/// Same source and URL always give the same id, so the host can merge
/// records fetched at different times.
pub fn generate_uid(source: MangaSource, url: &str) -> i64 {
    let mut h: i64 = 1125899906842597;
    for unit in source.name().encode_utf16().chain(url.encode_utf16()) {
        h = h.wrapping_mul(31).wrapping_add(i64::from(unit));
    }
    h
}

/// Resolve a site-relative URL against `https://{domain}`
pub fn to_absolute_url(url: &str, domain: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else if url.starts_with('/') {
        format!("https://{}{}", domain, url)
    } else if url.starts_with("https://") || url.starts_with("http://") {
        url.to_string()
    } else {
        format!("https://{}/{}", domain, url)
    }
}

/// Strip scheme and host from URLs on `domain`; other URLs are returned unchanged
pub fn to_relative_url(url: &str, domain: &str) -> String {
    if url.is_empty() || (url.starts_with('/') && !url.starts_with("//")) {
        return url.to_string();
    }
    let parsed = if url.starts_with("//") {
        Url::parse(&format!("https:{}", url))
    } else {
        Url::parse(url)
    };
    match parsed {
        Ok(u) if u.host_str().is_some_and(|h| h.eq_ignore_ascii_case(domain)) => {
            let mut out = u.path().to_string();
            if let Some(q) = u.query() {
                out.push('?');
                out.push_str(q);
            }
            if let Some(f) = u.fragment() {
                out.push('#');
                out.push_str(f);
            }
            out
        }
        _ => url.to_string(),
    }
}

/// Compile a CSS selector, mapping the parse failure into `SourceError`
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| SourceError::Selector(css.to_string()))
}

/// Text content with runs of whitespace collapsed and the ends trimmed
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Plain text of an HTML snippet (entities decoded, tags dropped)
pub fn html_to_text(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    element_text(parsed.root_element())
}

pub fn select_first<'a>(element: ElementRef<'a>, css: &str) -> Result<Option<ElementRef<'a>>> {
    Ok(element.select(&selector(css)?).next())
}

/// First match for `css`, or `SourceError::MissingElement`
pub fn select_first_or_err<'a>(element: ElementRef<'a>, css: &str) -> Result<ElementRef<'a>> {
    select_first(element, css)?.ok_or_else(|| SourceError::MissingElement(css.to_string()))
}

pub fn select_last<'a>(element: ElementRef<'a>, css: &str) -> Result<Option<ElementRef<'a>>> {
    Ok(element.select(&selector(css)?).last())
}

fn require_attr<'a>(element: ElementRef<'a>, attr: &str) -> Result<&'a str> {
    element
        .value()
        .attr(attr)
        .map(str::trim)
        .ok_or_else(|| SourceError::MissingAttribute {
            element: element.value().name().to_string(),
            attr: attr.to_string(),
        })
}

/// Attribute value resolved against the page URL
pub fn attr_as_absolute_url(element: ElementRef<'_>, attr: &str, base: &Url) -> Result<String> {
    let value = require_attr(element, attr)?;
    Ok(base.join(value)?.to_string())
}

/// Attribute value resolved against the page URL, then made relative to the page host
pub fn attr_as_relative_url(element: ElementRef<'_>, attr: &str, base: &Url) -> Result<String> {
    let absolute = attr_as_absolute_url(element, attr, base)?;
    match base.host_str() {
        Some(host) => Ok(to_relative_url(&absolute, host)),
        None => Ok(absolute),
    }
}

/// Absolute image URL, looking through the usual lazy-loading attributes
pub fn image_src(element: ElementRef<'_>, base: &Url) -> Option<String> {
    IMAGE_SOURCE_ATTRS.iter().find_map(|attr| {
        let value = element.value().attr(attr)?.trim();
        if value.is_empty() || value.starts_with("data:") {
            return None;
        }
        base.join(value).ok().map(|u| u.to_string())
    })
}

/// Like [`image_src`] but a missing source is an error
pub fn require_src(element: ElementRef<'_>, base: &Url) -> Result<String> {
    image_src(element, base).ok_or_else(|| SourceError::MissingAttribute {
        element: element.value().name().to_string(),
        attr: "src".to_string(),
    })
}

/// Parse a date with a chrono format string, treating it as UTC. Returns `None` on failure.
pub fn parse_date_safe(value: &str, format: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), format)
        .ok()
        .map(|naive| naive.and_utc())
}
