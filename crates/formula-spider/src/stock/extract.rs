use crate::error::{Result, SpiderError};
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap as Map;
use tracing::{debug, trace};

/// One statement row, as scraped: the label first, then one cell per period.
pub type RawRow = Vec<Option<String>>;

/// Rows with this many absent cells carry no information and are dropped.
const MAX_MISSING: usize = 4;

/// Marker appended to repeated labels.
const DUPLICATE: &str = " (duplicate";

lazy_static! {
    /// Statement rows are `div`s carrying the `D(tbr)` style class.
    static ref ROW: Selector = Selector::parse(r#"div[class*="D(tbr)"]"#).expect("row selector");

    /// Values are held in (possibly nested) spans.
    static ref SPAN: Selector = Selector::parse("span").expect("span selector");
}

/// Labels already seen on one statement page.
///
/// Financial statements legitimately repeat labels, e.g. "Deferred revenues" under both current
/// and non-current liabilities; the registry gives every repeat a distinct, traceable name. The
/// registry is scoped to a single page: pass it into [`extract_with`] and take it back out.
#[derive(Clone, Debug, Default)]
pub struct LabelRegistry {
    seen: Map<String, usize>,
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `label`, returning the name it should be stored under.
    ///
    /// The first occurrence keeps its name, the second becomes `"<label> (duplicate)"` and the
    /// n-th `"<label> (duplicate n-1)"`. Plain integers are data, not labels, and pass through.
    pub fn register(&mut self, label: &str) -> String {
        if label.parse::<i64>().is_ok() {
            return label.to_string();
        }

        let count = self.seen.entry(label.to_string()).or_insert(0);
        *count += 1;
        match *count {
            1 => label.to_string(),
            2 => format!("{label}{DUPLICATE})"),
            n => format!("{label}{DUPLICATE} {})", n - 1),
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.seen.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Strip a duplicate marker, recovering the account a stored label belongs to.
    ///
    /// ```rust
    /// use formula_spider::stock::extract::LabelRegistry;
    ///
    /// let mut registry = LabelRegistry::new();
    /// registry.register("Deferred revenues");
    /// let repeat = registry.register("Deferred revenues");
    ///
    /// assert_eq!(repeat, "Deferred revenues (duplicate)");
    /// assert_eq!(LabelRegistry::base_label(&repeat), "Deferred revenues");
    /// ```
    pub fn base_label(label: &str) -> &str {
        match label.rfind(DUPLICATE) {
            Some(i) if label.ends_with(')') => &label[..i],
            _ => label,
        }
    }
}

/// Extract the statement rows of one page, with a fresh [`LabelRegistry`].
pub fn extract(markup: &str) -> Result<Vec<RawRow>> {
    let (rows, _registry) = extract_with(markup, LabelRegistry::new())?;
    Ok(rows)
}

/// Extract the statement rows of one page, tracking labels in `registry`.
///
/// Fails with [`SpiderError::StructureNotFound`] when the page holds no statement rows at all;
/// an empty table would otherwise silently corrupt every downstream merge.
pub fn extract_with(
    markup: &str,
    mut registry: LabelRegistry,
) -> Result<(Vec<RawRow>, LabelRegistry)> {
    let document = Html::parse_document(markup);

    let mut found = 0;
    let mut rows: Vec<RawRow> = vec![];
    for row in document.select(&ROW) {
        found += 1;

        let mut parsed: RawRow = vec![];
        let mut missing = 0;
        for cell in row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "div")
        {
            match cell_text(cell) {
                Some(text) => {
                    let text = text.replace(',', "");
                    if parsed.is_empty() {
                        parsed.push(Some(registry.register(&text)));
                    } else {
                        parsed.push(Some(text));
                    }
                }
                None => {
                    parsed.push(None);
                    missing += 1;
                }
            }
        }

        if missing >= MAX_MISSING {
            trace!("dropping row with {missing} missing cells: {parsed:?}");
            continue;
        }
        rows.push(parsed);
    }

    if found == 0 {
        return Err(SpiderError::StructureNotFound {
            url: String::new(),
        });
    }

    debug!("extracted {} of {found} statement rows", rows.len());
    Ok((rows, registry))
}

/// The first non-empty text node directly beneath a span of `cell`. A lone `-` is the page's
/// placeholder for "no value", and counts as absent.
fn cell_text(cell: ElementRef<'_>) -> Option<String> {
    cell.select(&SPAN)
        .find_map(|span| {
            span.children().find_map(|node| {
                node.value()
                    .as_text()
                    .map(|text| text.trim())
                    .filter(|text| !text.is_empty())
                    .map(str::to_string)
            })
        })
        .filter(|text| text != "-")
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
