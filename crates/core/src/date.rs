//! In-universe date range parsing.
//!
//! Dates are written relative to an epoch with the era suffixes `BBY`
//! (before) and `ABY` (after). A single permissive pattern is matched
//! repeatedly over the lower-cased text and every match becomes one
//! [`DateRange`]. Years before the epoch are negative.
//!
//! Supported forms include:
//!
//! - `41 BBY`
//! - `32 BBY–4 ABY`, `4–5 ABY`, `4-5 ABY`
//! - `c. 40 BBY`, `c. 21 BBY–34 ABY`, `c. 231 BBY–c. 230 BBY`
//! - `During or prior to 146 BBY`, `During or after 5 ABY`
//! - `Between 44–32 BBY`, `Between 20 BBY and 19 BBY`
//! - `9 BBY or 8 BBY`, `3 BBY & 4 ABY`

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{ChronicleError, Result};

static DATE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:c\.)?\s*(?P<date1>\d+)\s*(?:(?P<era1>[ab])by)?\s*(?:[–\-&]|and|or)?(?:c\.)?\s*(?P<date2>\d+)?\s*(?:(?P<era2>[ab])by)?",
    )
    .unwrap()
});

/// A signed year, or a range of two, relative to the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(rename = "date1")]
    pub year1: i64,
    #[serde(rename = "date2", default, skip_serializing_if = "Option::is_none")]
    pub year2: Option<i64>,
}

impl DateRange {
    pub fn year(year: i64) -> Self {
        Self { year1: year, year2: None }
    }

    pub fn range(year1: i64, year2: i64) -> Self {
        Self { year1, year2: Some(year2) }
    }
}

/// Parses every date or date range in `text`.
///
/// Absent or empty input yields `Ok(None)`; text without any recognizable
/// year fails with [`ChronicleError::UnsupportedDateFormat`].
///
/// An era marker applies to both numbers of a range unless the other number
/// carries its own marker.
///
/// # Example
///
/// ```rust
/// use chronicle_core::{DateRange, parse_date};
///
/// let ranges = parse_date(Some("32 BBY–4 ABY")).unwrap().unwrap();
/// assert_eq!(ranges, vec![DateRange::range(-32, 4)]);
/// assert_eq!(parse_date(Some("")).unwrap(), None);
/// ```
pub fn parse_date(text: Option<&str>) -> Result<Option<Vec<DateRange>>> {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    let lower = text.to_lowercase();
    let mut ranges = Vec::new();

    for caps in DATE_RANGE.captures_iter(&lower) {
        let Some(year1) = caps.name("date1").and_then(|m| m.as_str().parse::<i64>().ok()) else {
            continue;
        };
        let year2 = caps.name("date2").and_then(|m| m.as_str().parse::<i64>().ok());
        let era1 = caps.name("era1").map(|m| m.as_str());
        let era2 = caps.name("era2").map(|m| m.as_str());

        let before1 = era1.or(era2) == Some("b");
        let before2 = era2.or(era1) == Some("b");

        ranges.push(DateRange {
            year1: if before1 { -year1 } else { year1 },
            year2: year2.map(|y| if before2 { -y } else { y }),
        });
    }

    if ranges.is_empty() {
        return Err(ChronicleError::UnsupportedDateFormat(text.to_string()));
    }

    Ok(Some(ranges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("41 BBY", vec![DateRange::year(-41)])]
    #[case("32 BBY–4 ABY", vec![DateRange::range(-32, 4)])]
    #[case("4–5 ABY", vec![DateRange::range(4, 5)])]
    #[case("4-5 ABY", vec![DateRange::range(4, 5)])]
    #[case("c. 40 BBY", vec![DateRange::year(-40)])]
    #[case("c. 21 BBY–34 ABY", vec![DateRange::range(-21, 34)])]
    #[case("c. 15–2 BBY", vec![DateRange::range(-15, -2)])]
    #[case("c. 231 BBY–c. 230 BBY", vec![DateRange::range(-231, -230)])]
    #[case("During or prior to 146 BBY", vec![DateRange::year(-146)])]
    #[case("During or after 5 ABY", vec![DateRange::year(5)])]
    #[case("Between 44–32 BBY", vec![DateRange::range(-44, -32)])]
    #[case("Between 20 BBY and 19 BBY", vec![DateRange::range(-20, -19)])]
    #[case("9 BBY or 8 BBY", vec![DateRange::range(-9, -8)])]
    #[case("3 BBY & 4 ABY", vec![DateRange::range(-3, 4)])]
    #[case("32 BBY, 4 ABY", vec![DateRange::year(-32), DateRange::year(4)])]
    fn test_parse_supported(#[case] input: &str, #[case] expected: Vec<DateRange>) {
        assert_eq!(parse_date(Some(input)).unwrap(), Some(expected));
    }

    #[test]
    fn test_or_joins_one_range() {
        // Two alternatives read as the span between them.
        assert_eq!(parse_date(Some("9 BBY or 8 BBY")).unwrap(), Some(vec![DateRange::range(-9, -8)]));
        assert_eq!(parse_date(Some("4 or 5 ABY")).unwrap(), Some(vec![DateRange::range(4, 5)]));
        assert_eq!(
            parse_date(Some("9 BBY or 8 BBY, 4 ABY")).unwrap(),
            Some(vec![DateRange::range(-9, -8), DateRange::year(4)])
        );
    }

    #[test]
    fn test_absent_input() {
        assert_eq!(parse_date(None).unwrap(), None);
        assert_eq!(parse_date(Some("")).unwrap(), None);
    }

    #[test]
    fn test_unsupported_format() {
        let result = parse_date(Some("not a date"));
        assert!(matches!(result, Err(ChronicleError::UnsupportedDateFormat(ref s)) if s == "not a date"));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(DateRange::year(-41)).unwrap();
        assert_eq!(json, serde_json::json!({"date1": -41}));
    }
}
