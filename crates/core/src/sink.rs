//! Persistence contract for finished drafts.
//!
//! The catalog store is an external collaborator. A run reads back the cover
//! fields of the previous run, then replaces the media and series collections
//! wholesale. [`MemorySink`] keeps everything in memory and can dump it as
//! JSON.

use std::collections::HashMap;

use crate::Result;
use crate::covers::CoverInfo;
use crate::draft::{MediaDraft, SeriesDraft};

/// Where finished drafts go.
pub trait CatalogSink {
    /// Cover fields of every stored media record, keyed by title.
    fn cover_snapshot(&self) -> Result<HashMap<String, CoverInfo>>;

    /// Replaces all media records.
    fn replace_media(&mut self, media: Vec<MediaDraft>) -> Result<()>;

    /// Replaces all series records.
    fn replace_series(&mut self, series: Vec<SeriesDraft>) -> Result<()>;
}

/// In-memory sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub media: Vec<MediaDraft>,
    pub series: Vec<SeriesDraft>,
    /// Cover fields returned by [`CatalogSink::cover_snapshot`].
    pub covers: HashMap<String, CoverInfo>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with the cover fields of a previous run.
    pub fn with_covers(covers: HashMap<String, CoverInfo>) -> Self {
        Self { covers, ..Default::default() }
    }

    pub fn media(&self, title: &str) -> Option<&MediaDraft> {
        self.media.iter().find(|m| m.title == title)
    }

    pub fn series(&self, title: &str) -> Option<&SeriesDraft> {
        self.series.iter().find(|s| s.title == title)
    }

    /// Both collections as one JSON document.
    pub fn to_json(&self) -> Result<String> {
        let value = serde_json::json!({ "media": self.media, "series": self.series });
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

impl CatalogSink for MemorySink {
    fn cover_snapshot(&self) -> Result<HashMap<String, CoverInfo>> {
        Ok(self.covers.clone())
    }

    fn replace_media(&mut self, media: Vec<MediaDraft>) -> Result<()> {
        self.covers = media
            .iter()
            .filter_map(|m| m.cover.clone().map(|c| (m.title.clone(), c)))
            .collect();
        self.media = media;
        Ok(())
    }

    fn replace_series(&mut self, series: Vec<SeriesDraft>) -> Result<()> {
        self.series = series;
        Ok(())
    }
}
