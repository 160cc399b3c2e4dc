//! Structural query capability over a page snapshot.
//!
//! The pipeline only talks to [`DocumentQuery`] and [`FragmentQuery`];
//! [`PageDocument`] is the adapter over a parsed HTML tree.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::error::AnalyzerError;

/// Elements whose text is never rendered to the reader.
const HIDDEN_TEXT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));
static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("valid selector"));
static JSON_LD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector")
});

/// Whole-document view: ordered structural queries plus metadata readers.
pub trait DocumentQuery {
    type Fragment<'a>: FragmentQuery
    where
        Self: 'a;

    /// All elements matching `pattern`, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Selector`] if `pattern` does not parse.
    fn query(&self, pattern: &str) -> Result<Vec<Self::Fragment<'_>>, AnalyzerError>;

    /// Trimmed `<title>` text, if present and non-empty.
    fn title(&self) -> Option<String>;

    /// `content` of the first `<meta>` whose `name`, `property`, or
    /// `itemprop` equals `key` (ASCII case-insensitive).
    fn meta_content(&self, key: &str) -> Option<String>;

    /// Raw bodies of `application/ld+json` script blocks.
    fn structured_data_blocks(&self) -> Vec<String>;

    /// Rendered text of the document body, whitespace-collapsed.
    fn visible_text(&self) -> String;

    /// The markup the document was parsed from.
    fn markup(&self) -> &str;
}

/// One candidate subtree of the document.
pub trait FragmentQuery: Sized {
    /// Rendered text of the subtree, whitespace-collapsed.
    fn text(&self) -> String;

    fn attr(&self, name: &str) -> Option<String>;

    /// Descendants matching `pattern` (the fragment itself is excluded).
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Selector`] if `pattern` does not parse.
    fn select(&self, pattern: &str) -> Result<Vec<Self>, AnalyzerError>;

    /// The fragment itself or its nearest ancestor matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Selector`] if `pattern` does not parse.
    fn closest(&self, pattern: &str) -> Result<Option<Self>, AnalyzerError>;

    /// # Errors
    ///
    /// Returns [`AnalyzerError::Selector`] if `pattern` does not parse.
    fn has(&self, pattern: &str) -> Result<bool, AnalyzerError> {
        Ok(!self.select(pattern)?.is_empty())
    }
}

/// Parses a CSS selector, mapping failures to [`AnalyzerError::Selector`].
///
/// # Errors
///
/// Returns [`AnalyzerError::Selector`] when the pattern is not valid CSS.
pub fn parse_selector(pattern: &str) -> Result<Selector, AnalyzerError> {
    Selector::parse(pattern).map_err(|e| AnalyzerError::Selector {
        pattern: pattern.to_owned(),
        reason: e.to_string(),
    })
}

/// A parsed HTML snapshot.
pub struct PageDocument {
    html: Html,
    markup: String,
}

impl PageDocument {
    #[must_use]
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
            markup: markup.to_owned(),
        }
    }
}

impl std::fmt::Debug for PageDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageDocument")
            .field("markup_bytes", &self.markup.len())
            .finish_non_exhaustive()
    }
}

impl DocumentQuery for PageDocument {
    type Fragment<'a> = PageFragment<'a>;

    fn query(&self, pattern: &str) -> Result<Vec<PageFragment<'_>>, AnalyzerError> {
        let selector = parse_selector(pattern)?;
        Ok(self
            .html
            .select(&selector)
            .map(|element| PageFragment { element })
            .collect())
    }

    fn title(&self) -> Option<String> {
        let title = self.html.select(&TITLE_SELECTOR).next()?;
        let text = collapse_whitespace(&title.text().collect::<String>());
        (!text.is_empty()).then_some(text)
    }

    fn meta_content(&self, key: &str) -> Option<String> {
        self.html.select(&META_SELECTOR).find_map(|meta| {
            let element = meta.value();
            let keyed = ["name", "property", "itemprop"]
                .iter()
                .filter_map(|attr| element.attr(attr))
                .any(|value| value.trim().eq_ignore_ascii_case(key));
            if !keyed {
                return None;
            }
            let content = collapse_whitespace(element.attr("content")?);
            (!content.is_empty()).then_some(content)
        })
    }

    fn structured_data_blocks(&self) -> Vec<String> {
        self.html
            .select(&JSON_LD_SELECTOR)
            .map(|script| script.text().collect::<String>())
            .filter(|raw| !raw.trim().is_empty())
            .collect()
    }

    fn visible_text(&self) -> String {
        let root = self
            .html
            .select(&BODY_SELECTOR)
            .next()
            .unwrap_or_else(|| self.html.root_element());
        visible_text_of(root)
    }

    fn markup(&self) -> &str {
        &self.markup
    }
}

/// An element of a [`PageDocument`].
#[derive(Debug, Clone, Copy)]
pub struct PageFragment<'a> {
    element: ElementRef<'a>,
}

impl PageFragment<'_> {
    /// Tag name of the underlying element.
    #[must_use]
    pub fn tag_name(&self) -> &str {
        self.element.value().name()
    }
}

impl FragmentQuery for PageFragment<'_> {
    fn text(&self) -> String {
        visible_text_of(self.element)
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.element.value().attr(name).map(str::to_owned)
    }

    fn select(&self, pattern: &str) -> Result<Vec<Self>, AnalyzerError> {
        let selector = parse_selector(pattern)?;
        Ok(self
            .element
            .select(&selector)
            .map(|element| PageFragment { element })
            .collect())
    }

    fn closest(&self, pattern: &str) -> Result<Option<Self>, AnalyzerError> {
        let selector = parse_selector(pattern)?;
        if selector.matches(&self.element) {
            return Ok(Some(*self));
        }
        Ok(self
            .element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|ancestor| selector.matches(ancestor))
            .map(|element| PageFragment { element }))
    }
}

/// Text nodes under `root` that are not inside a hidden element, joined and
/// whitespace-collapsed.
fn visible_text_of(root: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| HIDDEN_TEXT_TAGS.contains(&el.value().name()));
        if !hidden {
            parts.push(&**text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

/// Collapses runs of whitespace to single spaces and trims the ends.
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
