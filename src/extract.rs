//! Declarative result extraction.
//!
//! Every engine describes its markup as [`ExtractionRules`]: ordered selector
//! sets, a link resolver and filters. [`ResultExtractor`] applies those rules
//! to a page and yields normalized [`SearchResult`] records. Extraction is a
//! pure function of the markup, so re-running it on the same page yields the
//! same sequence.

use std::collections::HashSet;

use base64::Engine as _;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::result::{is_web_url, normalize_text, source_from_url};
use crate::{Result, SearchError, SearchResult};

/// One candidate location for a field value inside a result container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// CSS selector, relative to the result container.
    pub css: &'static str,
    /// Attribute to read. `None` reads the element's text.
    pub attr: Option<&'static str>,
}

impl Field {
    /// Reads the text of the first element matching `css`.
    pub const fn text(css: &'static str) -> Self {
        Self { css, attr: None }
    }

    /// Reads attribute `attr` of the first element matching `css`.
    pub const fn attr(css: &'static str, attr: &'static str) -> Self {
        Self {
            css,
            attr: Some(attr),
        }
    }

    /// Reads the `href` of the first element matching `css`.
    pub const fn href(css: &'static str) -> Self {
        Self::attr(css, "href")
    }
}

/// A complete selector strategy: result container plus per-field candidates,
/// each list tried in order until one yields a non-empty value.
#[derive(Debug, Clone, Copy)]
pub struct SelectorSet {
    /// Selector matching one element per result.
    pub container: &'static str,
    /// Title candidates.
    pub title: &'static [Field],
    /// Link candidates.
    pub link: &'static [Field],
    /// Description candidates.
    pub description: &'static [Field],
    /// Source label candidates. The link host is used when none match.
    pub source: &'static [Field],
}

/// How engine redirect links are unwrapped into the target URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkResolver {
    /// Links point straight at the target.
    Direct,
    /// `duckduckgo.com/l/?uddg=<target>`.
    DuckDuckGo,
    /// `bing.com/ck/a?...&u=a1<base64url(target)>`.
    Bing,
    /// `google.com/url?q=<target>`.
    Google,
    /// Any link carrying the target in the named query parameter.
    QueryParam(&'static str),
}

impl LinkResolver {
    /// Returns the target URL behind `href`, or `href` itself.
    pub fn resolve(&self, href: &str) -> String {
        let resolved = match self {
            LinkResolver::Direct => None,
            LinkResolver::DuckDuckGo => resolve_duckduckgo(href),
            LinkResolver::Bing => resolve_bing(href),
            LinkResolver::Google => resolve_google(href),
            LinkResolver::QueryParam(name) => query_param(href, name).filter(|t| is_web_url(t)),
        };
        resolved.unwrap_or_else(|| href.to_string())
    }
}

fn query_param(href: &str, name: &str) -> Option<String> {
    let parsed = Url::parse(href).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn resolve_duckduckgo(href: &str) -> Option<String> {
    let parsed = Url::parse(href).ok()?;
    let host = parsed.host_str()?;
    if !host.ends_with("duckduckgo.com") || !parsed.path().starts_with("/l/") {
        return None;
    }
    query_param(href, "uddg")
}

fn resolve_bing(href: &str) -> Option<String> {
    if !href.contains("bing.com/ck/a") {
        return None;
    }
    let encoded = query_param(href, "u")?;
    let encoded = encoded.strip_prefix("a1").unwrap_or(&encoded);
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .ok()?;
    let target = String::from_utf8(bytes).ok()?;
    is_web_url(&target).then_some(target)
}

fn resolve_google(href: &str) -> Option<String> {
    let parsed = Url::parse(href).ok()?;
    if parsed.path() != "/url" {
        return None;
    }
    query_param(href, "q")
        .or_else(|| query_param(href, "url"))
        .filter(|t| is_web_url(t))
}

/// Last-resort extraction: every external anchor in the raw markup.
#[derive(Debug, Clone, Copy)]
pub struct LinkScan {
    /// Links containing any of these fragments are skipped.
    pub excluded_hosts: &'static [&'static str],
    /// Maximum number of links kept.
    pub max_results: usize,
}

/// Per-engine extraction data. Engines keep one `static` instance so that
/// markup drift only ever touches that table.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRules {
    /// Selector strategies in priority order.
    pub strategies: &'static [SelectorSet],
    /// Redirect unwrapping applied to every link.
    pub link_resolver: LinkResolver,
    /// Results whose URL contains any of these fragments are dropped.
    pub internal_links: &'static [&'static str],
    /// Results whose title contains any of these labels are dropped.
    pub ad_labels: &'static [&'static str],
    /// Results whose container holds an element matching any of these are dropped.
    pub ad_markers: &'static [&'static str],
    /// Remove repeated URLs, keeping the first occurrence.
    pub dedupe: bool,
    /// Anchor scan used when no selector strategy matches.
    pub link_scan: Option<LinkScan>,
}

impl ExtractionRules {
    /// Rules with a single strategy and no filters.
    pub const fn simple(strategies: &'static [SelectorSet]) -> Self {
        Self {
            strategies,
            link_resolver: LinkResolver::Direct,
            internal_links: &[],
            ad_labels: &[],
            ad_markers: &[],
            dedupe: false,
            link_scan: None,
        }
    }
}

struct CompiledField {
    selector: Selector,
    attr: Option<&'static str>,
}

struct CompiledSet {
    container: Selector,
    title: Vec<CompiledField>,
    link: Vec<CompiledField>,
    description: Vec<CompiledField>,
    source: Vec<CompiledField>,
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {:?}", e)))
}

fn compile_fields(fields: &[Field]) -> Result<Vec<CompiledField>> {
    fields
        .iter()
        .map(|f| {
            Ok(CompiledField {
                selector: parse_selector(f.css)?,
                attr: f.attr,
            })
        })
        .collect()
}

impl CompiledSet {
    fn new(set: &SelectorSet) -> Result<Self> {
        Ok(Self {
            container: parse_selector(set.container)?,
            title: compile_fields(set.title)?,
            link: compile_fields(set.link)?,
            description: compile_fields(set.description)?,
            source: compile_fields(set.source)?,
        })
    }
}

fn first_value(element: ElementRef<'_>, fields: &[CompiledField]) -> Option<String> {
    fields.iter().find_map(|field| {
        let found = element.select(&field.selector).next()?;
        let value = match field.attr {
            Some(attr) => found.value().attr(attr).unwrap_or_default().trim().to_string(),
            None => normalize_text(&found.text().collect::<String>()),
        };
        (!value.is_empty()).then_some(value)
    })
}

/// Applies [`ExtractionRules`] to result pages of one engine.
#[derive(Debug, Clone)]
pub struct ResultExtractor {
    engine: String,
    rules: &'static ExtractionRules,
    base: Option<Url>,
}

impl ResultExtractor {
    /// Creates an extractor that stamps results with `engine`.
    pub fn new(engine: impl Into<String>, rules: &'static ExtractionRules) -> Self {
        Self {
            engine: engine.into(),
            rules,
            base: None,
        }
    }

    /// Sets the URL that relative links are resolved against.
    pub fn with_base(mut self, base: &str) -> Result<Self> {
        self.base = Some(Url::parse(base)?);
        Ok(self)
    }

    /// Returns the engine identifier stamped on results.
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Extracts results from `html`.
    ///
    /// Strategies run in order and the first non-empty one wins; the anchor
    /// scan runs only when every strategy came up empty.
    pub fn extract(&self, html: &str) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);
        let ad_markers = self
            .rules
            .ad_markers
            .iter()
            .map(|css| parse_selector(css))
            .collect::<Result<Vec<_>>>()?;

        let mut results = Vec::new();
        for (index, set) in self.rules.strategies.iter().enumerate() {
            let compiled = CompiledSet::new(set)?;
            results = document
                .select(&compiled.container)
                .filter_map(|element| self.extract_item(element, &compiled, &ad_markers))
                .collect();
            if !results.is_empty() {
                if index > 0 {
                    debug!(
                        "{}: strategy {} ({}) matched {} results",
                        self.engine,
                        index,
                        set.container,
                        results.len()
                    );
                }
                break;
            }
        }

        if results.is_empty() {
            if let Some(scan) = &self.rules.link_scan {
                debug!("{}: no selector matched, scanning anchors", self.engine);
                results = self.scan_links(html, scan)?;
            }
        }

        if self.rules.dedupe {
            let mut seen = HashSet::new();
            results.retain(|r| seen.insert(r.url.clone()));
        }

        Ok(results)
    }

    fn extract_item(
        &self,
        element: ElementRef<'_>,
        set: &CompiledSet,
        ad_markers: &[Selector],
    ) -> Option<SearchResult> {
        let title = first_value(element, &set.title)?;
        let href = first_value(element, &set.link)?;
        let url = self.rules.link_resolver.resolve(&self.absolutize(&href));

        if !is_web_url(&url) || self.is_filtered(&url, &title) {
            return None;
        }
        if ad_markers
            .iter()
            .any(|marker| element.select(marker).next().is_some())
        {
            return None;
        }

        let description = first_value(element, &set.description).unwrap_or_default();
        let source = first_value(element, &set.source).unwrap_or_else(|| source_from_url(&url));

        Some(
            SearchResult::new(title, url, self.engine.as_str())
                .with_description(description)
                .with_source(source),
        )
    }

    fn scan_links(&self, html: &str, scan: &LinkScan) -> Result<Vec<SearchResult>> {
        let anchor = Regex::new(r#"<a[^>]*href="(https?://[^"]+)"[^>]*>([^<]+)</a>"#)
            .map_err(|e| SearchError::Parse(format!("Failed to compile link pattern: {}", e)))?;

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for caps in anchor.captures_iter(html) {
            let url = caps[1].to_string();
            let title = normalize_text(&caps[2]);
            if title.is_empty()
                || scan.excluded_hosts.iter().any(|host| url.contains(host))
                || self.is_filtered(&url, &title)
                || !is_web_url(&url)
                || !seen.insert(url.clone())
            {
                continue;
            }
            let source = source_from_url(&url);
            results.push(SearchResult::new(title, url, self.engine.as_str()).with_source(source));
            if results.len() >= scan.max_results {
                break;
            }
        }
        Ok(results)
    }

    fn absolutize(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        if let Some(rest) = href.strip_prefix("//") {
            return format!("https://{}", rest);
        }
        match self.base.as_ref().and_then(|base| base.join(href).ok()) {
            Some(joined) => joined.to_string(),
            None => href.to_string(),
        }
    }

    fn is_filtered(&self, url: &str, title: &str) -> bool {
        self.rules.internal_links.iter().any(|p| url.contains(p))
            || self.rules.ad_labels.iter().any(|l| title.contains(l))
    }
}
