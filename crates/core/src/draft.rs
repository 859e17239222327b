//! Catalog records under construction.
//!
//! A [`MediaDraft`] is seeded from a timeline row, enriched from its article's
//! infobox and classified in two passes before it is handed to the
//! [`CatalogSink`](crate::sink::CatalogSink). A [`SeriesDraft`] is created
//! lazily the first time a media draft names a series.
//!
//! Both live in a [`DraftIndex`] keyed by canonical title. Renames caused by
//! title normalization or redirects go through [`DraftIndex::rekey`], which
//! removes the old key and inserts the new one in a single step.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::covers::CoverInfo;
use crate::date::DateRange;
use crate::document::Node;
use crate::infobox::InfoboxData;
use crate::timeline::TimelineEntry;
use crate::{ChronicleError, Result};

/// Coarse media category derived from the timeline legend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaType {
    Book,
    Yr,
    Comic,
    ShortStory,
    Film,
    Tv,
    Game,
    AudioDrama,
    Multimedia,
    Unknown,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Book => "book",
            MediaType::Yr => "yr",
            MediaType::Comic => "comic",
            MediaType::ShortStory => "short-story",
            MediaType::Film => "film",
            MediaType::Tv => "tv",
            MediaType::Game => "game",
            MediaType::AudioDrama => "audio-drama",
            MediaType::Multimedia => "multimedia",
            MediaType::Unknown => "unknown",
        }
    }

    /// Types whose drafts must end the pipeline with a full type.
    pub fn requires_full_type(&self) -> bool {
        matches!(self, MediaType::Tv | MediaType::Book | MediaType::Comic | MediaType::Game)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refined sub-classification used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FullType {
    BookJr,
    BookYa,
    BookA,
    TvMicroSeries,
    TvAnimated,
    TvLiveAction,
    Game,
    GameMobile,
    GameBrowser,
    GameVr,
    Comic,
    ComicManga,
    ComicStrip,
    ComicStory,
}

impl FullType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FullType::BookJr => "book-jr",
            FullType::BookYa => "book-ya",
            FullType::BookA => "book-a",
            FullType::TvMicroSeries => "tv-micro-series",
            FullType::TvAnimated => "tv-animated",
            FullType::TvLiveAction => "tv-live-action",
            FullType::Game => "game",
            FullType::GameMobile => "game-mobile",
            FullType::GameBrowser => "game-browser",
            FullType::GameVr => "game-vr",
            FullType::Comic => "comic",
            FullType::ComicManga => "comic-manga",
            FullType::ComicStrip => "comic-strip",
            FullType::ComicStory => "comic-story",
        }
    }
}

impl fmt::Display for FullType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A media record being enriched across pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDraft {
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_type: Option<FullType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(rename = "writer", skip_serializing_if = "Vec::is_empty")]
    pub writers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub date_ranges: Vec<DateRange>,
    pub chronology: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub timeline_notes: Vec<Node>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub adaptation: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exact_placement_unknown: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub nopage: bool,
    #[serde(rename = "wookieepediaId", skip_serializing_if = "Option::is_none")]
    pub page_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_timestamp: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub redirect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audiobook: Option<bool>,
    #[serde(flatten)]
    pub info: InfoboxData,
    #[serde(flatten)]
    pub cover: Option<CoverInfo>,
}

impl MediaDraft {
    /// Seeds a draft from a timeline entry.
    pub fn from_entry(entry: TimelineEntry) -> Self {
        let notes = entry.notes_node();
        Self {
            title: entry.title,
            media_type: entry.media_type,
            full_type: entry.preset_full_type,
            release_date: entry.release_date,
            writers: entry.writers,
            date: entry.in_universe_date,
            date_ranges: entry.date_ranges,
            chronology: entry.chronology,
            timeline_notes: notes.into_iter().collect(),
            adaptation: entry.adaptation,
            exact_placement_unknown: entry.exact_placement_unknown,
            nopage: entry.nopage,
            page_id: None,
            revision_timestamp: None,
            redirect: false,
            audiobook: None,
            info: InfoboxData::default(),
            cover: None,
        }
    }

    /// True when the draft names `series` among its series.
    pub fn in_series(&self, series: &str) -> bool {
        self.info.series.iter().any(|s| s == series)
    }
}

/// A series record, created on first reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesDraft {
    pub title: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub series_type: Option<MediaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_type: Option<FullType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    #[serde(rename = "wookieepediaId", skip_serializing_if = "Option::is_none")]
    pub page_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_timestamp: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub redirect: bool,
    #[serde(flatten)]
    pub info: InfoboxData,
}

impl SeriesDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }
}

/// Records addressable by title.
pub trait Titled {
    fn title(&self) -> &str;
    fn set_title(&mut self, title: String);
}

impl Titled for MediaDraft {
    fn title(&self) -> &str {
        &self.title
    }

    fn set_title(&mut self, title: String) {
        self.title = title;
    }
}

impl Titled for SeriesDraft {
    fn title(&self) -> &str {
        &self.title
    }

    fn set_title(&mut self, title: String) {
        self.title = title;
    }
}

/// In-memory index from canonical title to draft.
#[derive(Debug, Clone)]
pub struct DraftIndex<D> {
    drafts: BTreeMap<String, D>,
}

impl<D> Default for DraftIndex<D> {
    fn default() -> Self {
        Self { drafts: BTreeMap::new() }
    }
}

impl<D: Titled> DraftIndex<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a draft under its own title, replacing any previous one.
    pub fn insert(&mut self, draft: D) -> Option<D> {
        self.drafts.insert(draft.title().to_string(), draft)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.drafts.contains_key(title)
    }

    pub fn get(&self, title: &str) -> Option<&D> {
        self.drafts.get(title)
    }

    pub fn get_mut(&mut self, title: &str) -> Option<&mut D> {
        self.drafts.get_mut(title)
    }

    pub fn remove(&mut self, title: &str) -> Option<D> {
        self.drafts.remove(title)
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    pub fn titles(&self) -> Vec<String> {
        self.drafts.keys().cloned().collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &D> {
        self.drafts.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut D> {
        self.drafts.values_mut()
    }

    pub fn into_values(self) -> impl Iterator<Item = D> {
        self.drafts.into_values()
    }

    /// Moves the draft stored under `from` to `to`, rewriting its title.
    ///
    /// Fails when nothing is stored under `from` or when another draft already
    /// holds `to`. Renaming onto itself only rewrites the title.
    pub fn rekey(&mut self, from: &str, to: &str) -> Result<()> {
        if from != to && self.drafts.contains_key(to) {
            return Err(ChronicleError::TitleMismatch(to.to_string()));
        }
        let mut draft = self
            .drafts
            .remove(from)
            .ok_or_else(|| ChronicleError::TitleMismatch(from.to_string()))?;
        draft.set_title(to.to_string());
        self.drafts.insert(to.to_string(), draft);
        Ok(())
    }

    /// Resolves the canonical key for a page returned by the article source.
    ///
    /// When the source normalized the requested title the draft moves to the
    /// normalized key. An anchor present in the requested title (`Title#Part`)
    /// is carried over, since two series may differ only by anchor.
    pub fn reconcile(&mut self, page_title: &str, normalized_from: Option<&str>) -> Result<String> {
        let mut canonical = page_title.to_string();

        if let Some(from) = normalized_from {
            if let Some(pos) = from.find('#') {
                canonical.push_str(&from[pos..].replacen('_', " ", 1));
            }
            if canonical != from {
                tracing::debug!(from = %from, to = %canonical, "Title normalized");
                self.rekey(from, &canonical)?;
            }
        }

        if !self.drafts.contains_key(&canonical) {
            return Err(ChronicleError::TitleMismatch(canonical));
        }

        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_serialization() {
        assert_eq!(serde_json::to_value(MediaType::ShortStory).unwrap(), "short-story");
        assert_eq!(serde_json::to_value(MediaType::AudioDrama).unwrap(), "audio-drama");
        assert_eq!(MediaType::Yr.to_string(), "yr");
    }

    #[test]
    fn test_full_type_strings_match_serde() {
        for ft in [
            FullType::BookJr,
            FullType::TvMicroSeries,
            FullType::TvLiveAction,
            FullType::GameVr,
            FullType::ComicManga,
        ] {
            assert_eq!(serde_json::to_value(ft).unwrap(), ft.as_str());
        }
    }

    #[test]
    fn test_requires_full_type() {
        assert!(MediaType::Tv.requires_full_type());
        assert!(MediaType::Game.requires_full_type());
        assert!(!MediaType::Film.requires_full_type());
        assert!(!MediaType::Yr.requires_full_type());
    }

    #[test]
    fn test_rekey_moves_draft() {
        let mut index = DraftIndex::new();
        index.insert(SeriesDraft::new("Star_Wars_Rebels"));
        index.rekey("Star_Wars_Rebels", "Star Wars Rebels").unwrap();
        assert!(!index.contains("Star_Wars_Rebels"));
        assert_eq!(index.get("Star Wars Rebels").unwrap().title, "Star Wars Rebels");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_rekey_missing_is_mismatch() {
        let mut index: DraftIndex<SeriesDraft> = DraftIndex::new();
        assert!(matches!(index.rekey("A", "B"), Err(ChronicleError::TitleMismatch(_))));
    }

    #[test]
    fn test_rekey_onto_taken_title_is_mismatch() {
        let mut index = DraftIndex::new();
        index.insert(SeriesDraft::new("Andor"));
        index.insert(SeriesDraft::new("Star Wars: Andor"));

        let result = index.rekey("Star Wars: Andor", "Andor");
        assert!(matches!(result, Err(ChronicleError::TitleMismatch(ref t)) if t == "Andor"));
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("Star Wars: Andor").unwrap().title, "Star Wars: Andor");

        index.rekey("Andor", "Andor").unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_reconcile_keeps_anchor() {
        let mut index = DraftIndex::new();
        index.insert(SeriesDraft::new("Star_Wars:_Tales#Season_1"));
        let key = index.reconcile("Star Wars: Tales", Some("Star_Wars:_Tales#Season_1")).unwrap();
        assert_eq!(key, "Star Wars: Tales#Season 1");
        assert!(index.contains("Star Wars: Tales#Season 1"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_reconcile_without_normalization() {
        let mut index = DraftIndex::new();
        index.insert(SeriesDraft::new("Andor"));
        assert_eq!(index.reconcile("Andor", None).unwrap(), "Andor");
        assert!(matches!(index.reconcile("Ahsoka", None), Err(ChronicleError::TitleMismatch(_))));
    }
}
