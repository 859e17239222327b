use crate::error::{ChronicleError, Result};
use crate::suppress::{Heuristic, SuppressList};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Suppress file parser
#[derive(Debug)]
pub struct SuppressParser;

impl SuppressParser {
    /// Parse a single suppress file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<SuppressList> {
        let file = std::fs::File::open(&path).map_err(|e| {
            ChronicleError::ConfigError(format!("Cannot open file {}: {}", path.as_ref().display(), e))
        })?;

        let reader = BufReader::new(file);
        Self::parse_reader(reader)
    }

    /// Parse a suppress list from a reader
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<SuppressList> {
        let mut list = SuppressList::new();

        for (i, line) in reader.lines().enumerate() {
            let line_number = i + 1;
            let line =
                line.map_err(|e| ChronicleError::ConfigError(format!("Read error at line {}: {}", line_number, e)))?;
            Self::parse_line(&mut list, &line, line_number)?;
        }

        Ok(list)
    }

    /// Parse a suppress list from a string
    pub fn parse_string(content: &str) -> Result<SuppressList> {
        let mut list = SuppressList::new();

        for (i, line) in content.lines().enumerate() {
            Self::parse_line(&mut list, line, i + 1)?;
        }

        Ok(list)
    }

    fn parse_line(list: &mut SuppressList, line: &str, line_number: usize) -> Result<()> {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        let Some((key, title)) = line.split_once(':') else {
            return Err(ChronicleError::ConfigError(format!(
                "Parse error at line {}: expected 'key: title'",
                line_number
            )));
        };

        let heuristic: Heuristic = key
            .parse()
            .map_err(|e| ChronicleError::ConfigError(format!("Parse error at line {}: {}", line_number, e)))?;

        let title = title.trim();
        if title.is_empty() {
            return Err(ChronicleError::ConfigError(format!("Parse error at line {}: empty title", line_number)));
        }

        list.add(heuristic, title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_string_basic() {
        let content = r#"
# Checked by hand
low_confidence_manga: The Banchiians
low_confidence_animated: Hunted

multiple_regex_matches: Star Wars: The High Republic Adventures
"#;

        let list = SuppressParser::parse_string(content).unwrap();

        assert_eq!(list.len(), 3);
        assert!(list.contains(Heuristic::LowConfidenceManga, "The Banchiians"));
        assert!(list.contains(Heuristic::MultipleRegexMatches, "Star Wars: The High Republic Adventures"));
    }

    #[test]
    fn test_parse_reader() {
        let reader = Cursor::new("low_confidence_adult_novel: Star Wars: The Aftermath Trilogy\n");
        let list = SuppressParser::parse_reader(reader).unwrap();
        assert!(list.contains(Heuristic::LowConfidenceAdultNovel, "Star Wars: The Aftermath Trilogy"));
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = SuppressParser::parse_string("\nno separator here").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = SuppressParser::parse_string("unknown_key: Title").unwrap_err();
        assert!(err.to_string().contains("line 1"));

        assert!(SuppressParser::parse_string("low_confidence_manga:   ").is_err());
    }
}
