//! Document access for the generation probe.
//!
//! A `Document` answers `querySelectorAll`-style queries with the layout
//! metrics of each matching element. `HtmlSnapshot` implements it over a
//! static HTML capture, deriving metrics from inline styles since there is
//! no layout engine behind it.

use crate::types::{Display, DomError, ElementMetrics, Visibility};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::trace;

/// Box assumed for elements that do not declare their size inline
pub const DEFAULT_BOX_PX: f64 = 16.0;

/// A queryable page
pub trait Document {
    /// Metrics of every element matching `selector`, in document order
    fn query_all(&self, selector: &str) -> Result<Vec<ElementMetrics>, DomError>;

    /// Metrics of the first element matching `selector`
    fn query_first(&self, selector: &str) -> Result<Option<ElementMetrics>, DomError> {
        Ok(self.query_all(selector)?.into_iter().next())
    }
}

/// Parsed HTML capture of a page.
///
/// Boxes take their size from inline `px` widths and heights, defaulting to
/// 16px. An `opacity` that is not a plain number (`0%`, `nan`) counts as
/// visible.
pub struct HtmlSnapshot {
    html: Html,
}

impl HtmlSnapshot {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    fn metrics(element: ElementRef<'_>) -> ElementMetrics {
        let own = inline_style(element);

        // display:none anywhere up the tree removes the box
        let rendered = std::iter::once(element)
            .chain(element.ancestors().filter_map(ElementRef::wrap))
            .all(|e| !is_display_none(e));

        // visibility inherits; nearest declaration wins
        let visibility = std::iter::once(element)
            .chain(element.ancestors().filter_map(ElementRef::wrap))
            .find_map(|e| inline_style(e).get("visibility").cloned())
            .map(|v| match v.as_str() {
                "hidden" | "collapse" => Visibility::Hidden,
                _ => Visibility::Visible,
            })
            .unwrap_or(Visibility::Visible);

        let opacity = own
            .get("opacity")
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(1.0);

        let (width, height) = if rendered {
            (
                own.get("width").and_then(|v| parse_px(v)).unwrap_or(DEFAULT_BOX_PX),
                own.get("height").and_then(|v| parse_px(v)).unwrap_or(DEFAULT_BOX_PX),
            )
        } else {
            (0.0, 0.0)
        };

        ElementMetrics {
            attached: true,
            display: if is_display_none(element) {
                Display::None
            } else {
                Display::Shown
            },
            visibility,
            opacity,
            width,
            height,
        }
    }
}

impl Document for HtmlSnapshot {
    fn query_all(&self, selector: &str) -> Result<Vec<ElementMetrics>, DomError> {
        let parsed = Selector::parse(selector).map_err(|e| DomError::InvalidSelector {
            selector: selector.to_string(),
            reason: format!("{:?}", e),
        })?;

        let matches: Vec<_> = self.html.select(&parsed).map(Self::metrics).collect();
        trace!("Selector {} matched {} elements", selector, matches.len());
        Ok(matches)
    }
}

fn is_display_none(element: ElementRef<'_>) -> bool {
    element.value().attr("hidden").is_some()
        || inline_style(element).get("display").map(String::as_str) == Some("none")
}

/// Lowercased inline `style` declarations of an element
fn inline_style(element: ElementRef<'_>) -> HashMap<String, String> {
    element
        .value()
        .attr("style")
        .map(parse_declarations)
        .unwrap_or_default()
}

fn parse_declarations(style: &str) -> HashMap<String, String> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let value = value.trim().trim_end_matches("!important").trim();
            Some((name.trim().to_lowercase(), value.to_lowercase()))
        })
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// Parse `12px`, `12.5px` or a bare `0`
fn parse_px(value: &str) -> Option<f64> {
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number.parse::<f64>().ok()
}
