//! Manual allow-lists for known false-positive heuristics.
//!
//! Several classification rules are guesses: a manga hint in the second
//! sentence, a plain "novel" mention, a series sentence matching two type
//! patterns, an "animated" mention with no category. For titles a maintainer
//! has already checked, the warning is noise. A [`SuppressList`] names those
//! titles per [`Heuristic`]; only the log line is silenced, the diagnostic is
//! still recorded.
//!
//! Lists are read from `suppress.txt` files in `key: value` form:
//!
//! ```text
//! # checked by hand
//! low_confidence_manga: The Banchiians
//! low_confidence_animated: Hunted
//! ```

pub mod loader;
pub mod parser;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::{ChronicleError, Result};

pub use loader::{SuppressLoader, SuppressLoaderBuilder};
pub use parser::SuppressParser;

/// A low-confidence or ambiguous classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Heuristic {
    /// Manga mentioned only in the second sentence.
    LowConfidenceManga,
    /// Adult audience inferred from a bare "novel" mention.
    LowConfidenceAdultNovel,
    /// A series sentence matched more than one type pattern.
    MultipleRegexMatches,
    /// Animated inferred from text with no category.
    LowConfidenceAnimated,
}

impl Heuristic {
    pub const ALL: [Heuristic; 4] = [
        Heuristic::LowConfidenceManga,
        Heuristic::LowConfidenceAdultNovel,
        Heuristic::MultipleRegexMatches,
        Heuristic::LowConfidenceAnimated,
    ];

    /// Key used in suppress files.
    pub fn key(&self) -> &'static str {
        match self {
            Heuristic::LowConfidenceManga => "low_confidence_manga",
            Heuristic::LowConfidenceAdultNovel => "low_confidence_adult_novel",
            Heuristic::MultipleRegexMatches => "multiple_regex_matches",
            Heuristic::LowConfidenceAnimated => "low_confidence_animated",
        }
    }
}

impl FromStr for Heuristic {
    type Err = ChronicleError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|h| h.key() == key)
            .ok_or_else(|| ChronicleError::ConfigError(format!("Unknown heuristic: {}", s)))
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Titles exempt from heuristic warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuppressList {
    titles: BTreeMap<Heuristic, BTreeSet<String>>,
}

impl SuppressList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// The titles already known to trip each heuristic.
    pub fn defaults() -> Self {
        let mut list = Self::new();
        list.extend(Heuristic::LowConfidenceManga, ["The Banchiians"]);
        list.extend(
            Heuristic::LowConfidenceAdultNovel,
            ["Star Wars: The Aftermath Trilogy", "The High Republic: Cataclysm"],
        );
        list.extend(
            Heuristic::MultipleRegexMatches,
            [
                "Star Wars: The High Republic (Marvel Comics 2021)",
                "Star Wars: The High Republic Adventures",
                "Star Wars: The High Republic: The Edge of Balance",
                "Star Wars: The High Republic: Trail of Shadows",
                "Star Wars: The High Republic: Eye of the Storm",
                "Star Wars: The High Republic Adventures (IDW Publishing 2021)",
                "Star Wars: The High Republic — The Blade",
                "Star Wars: The High Republic Adventures: The Nameless Terror",
            ],
        );
        list.extend(Heuristic::LowConfidenceAnimated, ["Hunted"]);
        list
    }

    pub fn add(&mut self, heuristic: Heuristic, title: impl Into<String>) {
        self.titles.entry(heuristic).or_default().insert(title.into());
    }

    pub fn extend<I, S>(&mut self, heuristic: Heuristic, titles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = self.titles.entry(heuristic).or_default();
        set.extend(titles.into_iter().map(Into::into));
    }

    pub fn contains(&self, heuristic: Heuristic, title: &str) -> bool {
        self.titles.get(&heuristic).is_some_and(|set| set.contains(title))
    }

    /// Titles listed for one heuristic.
    pub fn titles(&self, heuristic: Heuristic) -> impl Iterator<Item = &str> {
        self.titles.get(&heuristic).into_iter().flatten().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.titles.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds every entry of `other`.
    pub fn merge(&mut self, other: &SuppressList) {
        for (heuristic, titles) in &other.titles {
            self.titles.entry(*heuristic).or_default().extend(titles.iter().cloned());
        }
    }
}
