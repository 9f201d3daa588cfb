// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Extraction of Education Code sections from leginfo display pages.
//!
//! The display page renders one section inside `div#codeLawSectionNoHead`,
//! preceded by the enclosing article heading and followed by the session-law
//! citation. Everything here is regex-based text extraction against that one
//! layout.

use crate::models::EdCodeSection;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

/// Section display page used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str =
    "https://leginfo.legislature.ca.gov/faces/codes_displaySection.xhtml";

/// Law code for the Education Code.
pub const DEFAULT_LAW_CODE: &str = "EDC";

const CONTAINER_ID: &str = "codeLawSectionNoHead";

/// Extraction error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Section container #codeLawSectionNoHead not found")]
    ContainerNotFound,

    #[error("Section container is empty")]
    EmptyContainer,

    #[error("Section {0} not present in page text")]
    SectionNotFound(String),
}

fn container_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"(?is)<div\b[^>]*\bid\s*=\s*["']{CONTAINER_ID}["'][^>]*>"#
        ))
        .expect("container pattern is valid")
    })
}

fn div_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<(/?)div\b[^>]*>").expect("div pattern is valid"))
}

fn any_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"))
}

fn numeric_entity() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").expect("entity pattern is valid")
    })
}

fn article_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"ARTICLE\s+\d+[^\[]*\[[^\]]+\]").expect("article pattern is valid")
    })
}

fn bracketed_range() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\[[^\]]+\]").expect("range pattern is valid"))
}

fn citation_start() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\((?:Added|Amended|Repealed and added) by Stats\.")
            .expect("citation pattern is valid")
    })
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

fn enumerator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\((?:[a-z]|[A-Z]|\d+)\)").expect("enumerator pattern is valid")
    })
}

/// Builds section URLs and extracts sections from their pages.
#[derive(Debug, Clone)]
pub struct EdCodeParser {
    base_url: Url,
    law_code: String,
}

impl EdCodeParser {
    /// Create a parser for the given display page and law code.
    pub fn new(base_url: &str, law_code: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            law_code: law_code.to_string(),
        })
    }

    /// URL of the display page for one section.
    ///
    /// The section number is sent with a trailing period, as the site expects.
    pub fn build_url(&self, section: &str) -> String {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("sectionNum", &format!("{section}."))
            .append_pair("lawCode", &self.law_code);
        url.to_string()
    }

    /// Extract `section` from a display page.
    pub fn parse_section(&self, html: &str, section: &str) -> Result<EdCodeSection, ExtractError> {
        let inner = container_inner(html).ok_or(ExtractError::ContainerNotFound)?;
        let text = html_to_text(inner);
        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractError::EmptyContainer);
        }

        let marker = find_section_marker(text, section)
            .ok_or_else(|| ExtractError::SectionNotFound(section.to_string()))?;

        Ok(EdCodeSection {
            section: section.to_string(),
            title: extract_title(&text[..marker], section),
            content: extract_content(&text[marker..]),
            url: self.build_url(section),
            fetched_at: None,
        })
    }
}

impl Default for EdCodeParser {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            law_code: DEFAULT_LAW_CODE.to_string(),
        }
    }
}

/// Markup between the container's opening tag and its matching `</div>`.
fn container_inner(html: &str) -> Option<&str> {
    let open = container_open().find(html)?;
    let body = &html[open.end()..];

    let mut depth = 1usize;
    for tag in div_tag().captures_iter(body) {
        let (Some(whole), Some(slash)) = (tag.get(0), tag.get(1)) else {
            continue;
        };
        if slash.as_str().is_empty() {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                return Some(&body[..whole.start()]);
            }
        }
    }

    // Unterminated container: take the rest of the document.
    Some(body)
}

fn html_to_text(markup: &str) -> String {
    let stripped = any_tag().replace_all(markup, " ");
    decode_entities(&stripped)
}

fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&sect;", "§")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    let numeric = numeric_entity().replace_all(&named, |caps: &regex::Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(|c| if c == '\u{a0}' { ' ' } else { c })
            .map(String::from)
            .unwrap_or_default()
    });

    // `&amp;` last so an escaped entity is not decoded twice.
    numeric.replace("&amp;", "&")
}

/// Byte offset of the first standalone `{section}.` in `text`.
fn find_section_marker(text: &str, section: &str) -> Option<usize> {
    let pattern = format!(r"(?:^|[^\d.])({}\.)(?:\D|$)", regex::escape(section));
    let re = Regex::new(&pattern).ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.start())
}

fn extract_title(before_marker: &str, section: &str) -> String {
    article_heading()
        .find_iter(before_marker)
        .last()
        .map(|heading| {
            let without_range = bracketed_range().replace_all(heading.as_str(), "");
            collapse_whitespace(&without_range)
        })
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| format!("Education Code Section {section}"))
}

fn extract_content(from_marker: &str) -> String {
    let mut content = from_marker;

    // Keep the session-law citation up to its closing parenthesis.
    if let Some(citation) = citation_start().find(content) {
        if let Some(close) = content[citation.end()..].find(')') {
            content = &content[..citation.end() + close + 1];
        }
    }

    let collapsed = collapse_whitespace(content);
    enumerator()
        .replace_all(&collapsed, "\n\n${0}")
        .trim()
        .to_string()
}

fn collapse_whitespace(text: &str) -> String {
    whitespace().replace_all(text, " ").trim().to_string()
}
