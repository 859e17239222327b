//! Timeline table scanning.
//!
//! The timeline article lists every media release in in-universe order. Each
//! row carries a legend code, a title cell (with optional `*` notes and a `†`
//! marker for uncertain placement), the release date, the writers and the
//! in-universe year. [`scan_timeline`] turns those rows into
//! [`TimelineEntry`] values that seed the media drafts.

use std::str::FromStr;

use crate::date::{DateRange, parse_date};
use crate::document::{Document, FieldValue, Node, TableRow, decode_entities};
use crate::draft::{FullType, MediaType};
use crate::{ChronicleError, Result};

const TITLE_COLUMN: &str = "Title";
const LEGEND_COLUMN: &str = "col2";
const RELEASED_COLUMN: &str = "Released";
const WRITERS_COLUMN: &str = "Writer(s)";
const YEAR_COLUMN: &str = "Year";

/// Legend code of a timeline row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendCode {
    Comic,
    Novel,
    ShortStory,
    YoungReader,
    Junior,
    Television,
    Film,
    VideoGame,
    /// Promotional material, never catalogued.
    Promotional,
}

impl FromStr for LegendCode {
    type Err = ChronicleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "C" => Ok(Self::Comic),
            "N" => Ok(Self::Novel),
            "SS" => Ok(Self::ShortStory),
            "YR" => Ok(Self::YoungReader),
            "JR" => Ok(Self::Junior),
            "TV" => Ok(Self::Television),
            "F" => Ok(Self::Film),
            "VG" => Ok(Self::VideoGame),
            "P" => Ok(Self::Promotional),
            other => Err(ChronicleError::MarkupError(format!("Unknown timeline legend code: {}", other))),
        }
    }
}

impl LegendCode {
    /// Coarse type for the code, `None` for rows that are not catalogued.
    pub fn media_type(self) -> Option<MediaType> {
        match self {
            LegendCode::Comic => Some(MediaType::Comic),
            LegendCode::Novel | LegendCode::Junior => Some(MediaType::Book),
            LegendCode::ShortStory => Some(MediaType::ShortStory),
            LegendCode::YoungReader => Some(MediaType::Yr),
            LegendCode::Television => Some(MediaType::Tv),
            LegendCode::Film => Some(MediaType::Film),
            LegendCode::VideoGame => Some(MediaType::Game),
            LegendCode::Promotional => None,
        }
    }

    /// Full type implied by the code alone.
    pub fn preset_full_type(self) -> Option<FullType> {
        match self {
            LegendCode::Junior => Some(FullType::BookJr),
            _ => None,
        }
    }
}

/// One catalogued row of the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub title: String,
    pub legend_code: LegendCode,
    pub media_type: MediaType,
    pub preset_full_type: Option<FullType>,
    pub release_date: Option<String>,
    pub writers: Vec<String>,
    pub in_universe_date: Option<String>,
    pub date_ranges: Vec<DateRange>,
    pub chronology: usize,
    pub notes: Vec<String>,
    pub adaptation: bool,
    pub exact_placement_unknown: bool,
    /// The title cell has no link, so there is no article to enrich from.
    pub nopage: bool,
}

impl TimelineEntry {
    /// Builds an entry from a table row, `None` when the row is skipped.
    pub fn from_row(chronology: usize, row: &TableRow) -> Option<Self> {
        let code_text = cell_text(row, LEGEND_COLUMN);
        let legend_code = match code_text.parse::<LegendCode>() {
            Ok(code) => code,
            Err(_) => {
                tracing::warn!(code = %code_text, "Timeline parsing warning: unknown type, skipping");
                return None;
            }
        };
        let media_type = legend_code.media_type()?;

        let title_cell = row.get(TITLE_COLUMN).cloned().unwrap_or_default();
        let mut parts = title_cell.text.split('*');
        let title_text = parts.next().unwrap_or("");
        let notes: Vec<String> = parts.map(|s| s.trim().to_string()).collect();
        let adaptation = notes.iter().any(|n| {
            let n = n.to_lowercase();
            n.contains("adaptation") || n.contains("novelization")
        });

        let (title, nopage) = match title_cell.links.first() {
            Some(link) => (decode_entities(&link.page).into_owned(), false),
            None => {
                let cleaned = clean_title_text(title_text);
                tracing::warn!(title = %cleaned, "Timeline parsing warning: title has no link, marking as nopage");
                (cleaned, true)
            }
        };

        let in_universe_date = non_empty(decode_entities(cell_text(row, YEAR_COLUMN)).into_owned());
        let date_ranges = match parse_date(in_universe_date.as_deref()) {
            Ok(ranges) => ranges.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(title = %title, error = %e, "Unparsed in-universe date");
                Vec::new()
            }
        };

        Some(Self {
            title,
            legend_code,
            media_type,
            preset_full_type: legend_code.preset_full_type(),
            release_date: non_empty(cell_text(row, RELEASED_COLUMN).to_string()),
            writers: row
                .get(WRITERS_COLUMN)
                .map(|cell| cell.links.iter().map(|l| decode_entities(&l.page).into_owned()).collect())
                .unwrap_or_default(),
            in_universe_date,
            date_ranges,
            chronology,
            notes,
            adaptation,
            exact_placement_unknown: title_cell.text.contains('†'),
            nopage,
        })
    }

    /// The timeline notes as a single list node.
    pub fn notes_node(&self) -> Option<Node> {
        if self.notes.is_empty() {
            return None;
        }
        Some(Node::List { data: self.notes.iter().map(|n| vec![Node::text(n.as_str())]).collect() })
    }
}

fn cell_text<'a>(row: &'a TableRow, column: &str) -> &'a str {
    row.get(column).map(|v: &FieldValue| v.text.as_str()).unwrap_or("")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Strips the placement marker and surrounding quotes from an unlinked title.
fn clean_title_text(text: &str) -> String {
    let text = text.replace('†', "");
    let text = text.trim();
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
        .to_string()
}

/// Locates the media table: the first table with title and year columns.
fn media_table(doc: &Document) -> Option<&[TableRow]> {
    doc.tables
        .iter()
        .find(|table| {
            table
                .first()
                .is_some_and(|row| row.contains_key(TITLE_COLUMN) && row.contains_key(YEAR_COLUMN))
        })
        .map(|t| t.as_slice())
}

/// Scans the timeline article, optionally stopping after `limit` rows.
pub fn scan_timeline(doc: &Document, limit: Option<usize>) -> Result<Vec<TimelineEntry>> {
    let rows = media_table(doc)
        .ok_or_else(|| ChronicleError::MarkupError(format!("No media table in timeline article {}", doc.title)))?;
    let rows = match limit {
        Some(limit) => &rows[..limit.min(rows.len())],
        None => rows,
    };

    Ok(rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| TimelineEntry::from_row(i, row))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Link;
    use rstest::rstest;

    fn row(code: &str, title: FieldValue, year: &str) -> TableRow {
        let mut row = TableRow::new();
        row.insert(LEGEND_COLUMN.to_string(), FieldValue::from_text(code));
        row.insert(TITLE_COLUMN.to_string(), title);
        row.insert(YEAR_COLUMN.to_string(), FieldValue::from_text(year));
        row.insert(RELEASED_COLUMN.to_string(), FieldValue::from_text("2016-12-16"));
        row.insert(
            WRITERS_COLUMN.to_string(),
            FieldValue { links: vec![Link::new("Chris Weitz"), Link::new("Tony Gilroy")], ..Default::default() },
        );
        row
    }

    fn linked(text: &str, page: &str) -> FieldValue {
        FieldValue { text: text.to_string(), links: vec![Link::new(page)], ..Default::default() }
    }

    #[rstest]
    #[case("C", Some(MediaType::Comic))]
    #[case("N", Some(MediaType::Book))]
    #[case("SS", Some(MediaType::ShortStory))]
    #[case("YR", Some(MediaType::Yr))]
    #[case("JR", Some(MediaType::Book))]
    #[case("TV", Some(MediaType::Tv))]
    #[case("F", Some(MediaType::Film))]
    #[case("VG", Some(MediaType::Game))]
    #[case("P", None)]
    fn test_legend_codes(#[case] code: &str, #[case] expected: Option<MediaType>) {
        assert_eq!(code.parse::<LegendCode>().unwrap().media_type(), expected);
    }

    #[test]
    fn test_unknown_legend_code() {
        assert!("XX".parse::<LegendCode>().is_err());
        assert!(TimelineEntry::from_row(0, &row("XX", linked("A", "A"), "0 BBY")).is_none());
    }

    #[test]
    fn test_junior_presets_full_type() {
        let entry = TimelineEntry::from_row(3, &row("JR", linked("Lego", "Lego"), "1 ABY")).unwrap();
        assert_eq!(entry.media_type, MediaType::Book);
        assert_eq!(entry.preset_full_type, Some(FullType::BookJr));
        assert_eq!(entry.chronology, 3);
    }

    #[test]
    fn test_row_fields() {
        let title = linked("Rogue One &amp; more † *Novelization of the film", "Rogue One");
        let entry = TimelineEntry::from_row(0, &row("F", title, "0 BBY")).unwrap();
        assert_eq!(entry.title, "Rogue One");
        assert!(entry.exact_placement_unknown);
        assert!(entry.adaptation);
        assert_eq!(entry.notes, vec!["Novelization of the film".to_string()]);
        assert_eq!(entry.writers, vec!["Chris Weitz".to_string(), "Tony Gilroy".to_string()]);
        assert_eq!(entry.date_ranges, vec![DateRange::year(0)]);
        assert_eq!(entry.release_date.as_deref(), Some("2016-12-16"));
        assert!(matches!(entry.notes_node(), Some(Node::List { data }) if data.len() == 1));
    }

    #[test]
    fn test_unlinked_title_is_nopage() {
        let title = FieldValue::from_text("\"Untitled episode\" †");
        let entry = TimelineEntry::from_row(0, &row("TV", title, "19 BBY")).unwrap();
        assert!(entry.nopage);
        assert_eq!(entry.title, "Untitled episode");
    }

    #[test]
    fn test_bad_year_is_not_fatal() {
        let entry = TimelineEntry::from_row(0, &row("N", linked("A", "A"), "Unknown")).unwrap();
        assert!(entry.date_ranges.is_empty());
        assert_eq!(entry.in_universe_date.as_deref(), Some("Unknown"));
    }

    #[test]
    fn test_scan_finds_media_table_and_limits() {
        let mut doc = Document::new("Timeline of canon media");
        let mut legend = TableRow::new();
        legend.insert("Code".to_string(), FieldValue::from_text("C"));
        doc.tables.push(vec![legend]);
        doc.tables.push(vec![
            row("N", linked("A", "A"), "1 ABY"),
            row("P", linked("B", "B"), "2 ABY"),
            row("TV", linked("C", "C"), "3 ABY"),
        ]);

        let entries = scan_timeline(&doc, None).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].chronology, 2);

        let limited = scan_timeline(&doc, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_scan_without_table() {
        let doc = Document::new("Empty");
        assert!(matches!(scan_timeline(&doc, None), Err(ChronicleError::MarkupError(_))));
    }
}
