// src/services/parser.rs

//! Availability parsers for catalog responses.
//!
//! The catalog has come in two shapes over the years: a JSON section detail
//! API and an HTML course guide page. Each has its own parser; the right one
//! is picked once from the configured [`CatalogVariant`].

use scraper::{Html, Selector};
use serde::Deserialize;

use crate::error::QueryError;
use crate::models::{AvailabilityStatus, CatalogVariant, SectionId};

/// Text the catalog returns for sections that do not exist (any variant).
pub const NOT_AVAILABLE_SENTINEL: &str = "Section information is currently not available";

/// Field name that must appear in a JSON section detail body.
pub const SEATS_FIELD: &str = "AvailableSeats";

/// Extracts an open/closed status from a raw catalog response.
pub trait AvailabilityParser: Send + Sync {
    fn parse(&self, body: &str, id: &SectionId)
    -> std::result::Result<AvailabilityStatus, QueryError>;
}

/// Build the parser matching a catalog variant.
pub fn parser_for(variant: CatalogVariant) -> Box<dyn AvailabilityParser> {
    match variant {
        CatalogVariant::Api => Box::new(JsonParser),
        CatalogVariant::Legacy => Box::new(HtmlParser),
    }
}

fn check_not_available(body: &str, id: &SectionId) -> std::result::Result<(), QueryError> {
    if body.contains(NOT_AVAILABLE_SENTINEL) {
        return Err(QueryError::not_found(format!(
            "{id}: section information is not available"
        )));
    }
    Ok(())
}

// --- JSON ---

#[derive(Debug, Deserialize)]
struct SectionDetailEnvelope {
    #[serde(rename = "getSOCSectionDetailResponse")]
    detail: SectionDetail,
}

#[derive(Debug, Deserialize)]
struct SectionDetail {
    #[serde(rename = "AvailableSeats")]
    available_seats: String,
}

/// Parser for the JSON section detail API.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl AvailabilityParser for JsonParser {
    fn parse(
        &self,
        body: &str,
        id: &SectionId,
    ) -> std::result::Result<AvailabilityStatus, QueryError> {
        check_not_available(body, id)?;

        // Error payloads come back without the field at all.
        if !body.contains(SEATS_FIELD) {
            return Err(QueryError::not_found(format!(
                "{id}: response has no {SEATS_FIELD}"
            )));
        }

        let envelope: SectionDetailEnvelope = serde_json::from_str(body)
            .map_err(|e| QueryError::unparseable(format!("{id}: {e}")))?;

        Ok(AvailabilityStatus {
            open: envelope.detail.available_seats != "0",
        })
    }
}

// --- HTML ---

/// Bounds-checked forward cursor over a string.
///
/// Every lookup returns `None` instead of slicing out of range.
#[derive(Debug)]
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Absolute offset of the next `pattern` at or after the cursor.
    fn find(&self, pattern: &str) -> Option<usize> {
        self.text
            .get(self.pos..)?
            .find(pattern)
            .map(|offset| self.pos + offset)
    }

    /// Move the cursor to the start of the next `pattern`.
    fn seek(&mut self, pattern: &str) -> Option<()> {
        self.pos = self.find(pattern)?;
        Some(())
    }

    /// Move the cursor forward by `len` bytes, stopping at the end.
    fn advance(&mut self, len: usize) {
        self.pos = (self.pos + len).min(self.text.len());
    }

    /// Text from the cursor up to the next `pattern`, or to the end.
    fn until_or_rest(&self, pattern: &str) -> &'a str {
        let end = self.find(pattern).unwrap_or(self.text.len());
        self.text.get(self.pos..end).unwrap_or_default()
    }
}

/// Parser for the HTML course guide page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

/// Markup that opens every section's table, up to the section number.
const ROW_MARKER_PREFIX: &str = "<table border=1 cellspacing=0 cellpadding=3><tr><td><b>";

impl HtmlParser {
    /// Markup that opens the table for one section.
    pub fn row_marker(section: &str) -> String {
        format!("{ROW_MARKER_PREFIX}{section}<br>")
    }
}

impl AvailabilityParser for HtmlParser {
    fn parse(
        &self,
        body: &str,
        id: &SectionId,
    ) -> std::result::Result<AvailabilityStatus, QueryError> {
        check_not_available(body, id)?;

        let marker = Self::row_marker(&id.section);
        let mut scanner = Scanner::new(body);
        scanner
            .seek(&marker)
            .ok_or_else(|| QueryError::not_found(format!("{id}: no row for section")))?;
        scanner.advance(marker.len());

        // Rows may nest tables (meeting times); the next section's table ends the row.
        let row = scanner.until_or_rest(ROW_MARKER_PREFIX);
        let fragment = Html::parse_fragment(row);
        let span_sel = Selector::parse("span")
            .map_err(|e| QueryError::unparseable(format!("span selector: {e:?}")))?;

        let span = fragment
            .select(&span_sel)
            .next()
            .ok_or_else(|| QueryError::unparseable(format!("{id}: no status span in row")))?;

        let status: String = span.text().collect();
        Ok(AvailabilityStatus {
            open: status == "Open",
        })
    }
}
