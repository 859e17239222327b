//! The catalog build, stage by stage.
//!
//! A [`Pipeline`] owns the in-memory draft indexes and runs the stages in a
//! fixed order:
//!
//! 1. [`load_timeline`](Pipeline::load_timeline) and [`seed`](Pipeline::seed)
//!    the media drafts from the timeline table.
//! 2. [`article_pass`](Pipeline::article_pass): fetch every media article,
//!    reconcile titles, follow redirects, copy infobox fields and register the
//!    series they name.
//! 3. [`series_pass`](Pipeline::series_pass): fetch every series article and
//!    classify the series, inferring redlink series from their members.
//! 4. [`full_type_pass`](Pipeline::full_type_pass): classify each media draft
//!    now that series types are known.
//! 5. Young-reader refinement, cover metadata, the required full-type check
//!    and finally the hand-off to a [`CatalogSink`].
//!
//! Nothing reaches the sink unless every stage succeeds.

use std::collections::HashMap;
use std::rc::Rc;

use crate::articles::Articles;
use crate::classify::{Classifier, Diagnostic, DiagnosticKind, refine_young_reader_series};
use crate::covers::attach_covers;
use crate::document::{Document, MarkupParser};
use crate::draft::{DraftIndex, MediaDraft, MediaType, SeriesDraft};
use crate::fetch::{ArticleSource, PageProperties, Transport};
use crate::infobox::{InfoboxData, InfoboxKind};
use crate::sink::CatalogSink;
use crate::suppress::SuppressList;
use crate::timeline::{TimelineEntry, scan_timeline};
use crate::{ChronicleError, Result};

/// What to do with a timeline title that has no article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingArticlePolicy {
    /// Log the redlink and drop the draft.
    #[default]
    Drop,
    /// Abort the run.
    Fail,
}

/// Configuration for a catalog build.
///
/// # Example
///
/// ```rust
/// use chronicle_core::{MissingArticlePolicy, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .limit(25)
///     .missing_article(MissingArticlePolicy::Fail)
///     .require_full_types(true)
///     .build();
/// assert_eq!(config.limit, Some(25));
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Title of the timeline article (default: "Timeline of canon media").
    pub timeline_title: String,

    /// Only process the first rows of the timeline (default: all).
    pub limit: Option<usize>,

    /// Handling of timeline titles without an article (default: drop).
    pub missing_article: MissingArticlePolicy,

    /// Fail the run when a tv, book, comic or game draft has no full type
    /// (default: false, the drafts are only reported).
    pub require_full_types: bool,

    /// Fetch cover image metadata (default: true).
    pub fetch_covers: bool,

    /// Titles whose heuristic warnings are silenced (default: built-in list).
    pub suppress: SuppressList,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeline_title: "Timeline of canon media".to_string(),
            limit: None,
            missing_article: MissingArticlePolicy::Drop,
            require_full_types: false,
            fetch_covers: true,
            suppress: SuppressList::defaults(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new builder for PipelineConfig.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }
}

/// Builder for PipelineConfig.
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: PipelineConfig::default() }
    }

    /// Sets the timeline article title.
    pub fn timeline_title(mut self, value: impl Into<String>) -> Self {
        self.config.timeline_title = value.into();
        self
    }

    /// Limits the number of timeline rows processed.
    pub fn limit(mut self, value: usize) -> Self {
        self.config.limit = Some(value);
        self
    }

    /// Sets the missing article policy.
    pub fn missing_article(mut self, value: MissingArticlePolicy) -> Self {
        self.config.missing_article = value;
        self
    }

    /// Sets whether unresolved full types fail the run.
    pub fn require_full_types(mut self, value: bool) -> Self {
        self.config.require_full_types = value;
        self
    }

    /// Sets whether cover metadata is fetched.
    pub fn fetch_covers(mut self, value: bool) -> Self {
        self.config.fetch_covers = value;
        self
    }

    /// Sets the suppress list.
    pub fn suppress(mut self, value: SuppressList) -> Self {
        self.config.suppress = value;
        self
    }

    /// Builds the PipelineConfig.
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Media records written, excluding nopage drafts.
    pub media: usize,
    pub series: usize,
    pub nopage: usize,
    /// Timeline titles dropped because their article is missing.
    pub dropped: Vec<String>,
    /// Drafts that require a full type but have none.
    pub unresolved: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub redirects: usize,
    pub requests: usize,
    pub bytes: usize,
    pub stale_covers: usize,
}

/// A catalog build over one article source.
pub struct Pipeline<T, P> {
    config: PipelineConfig,
    articles: Articles<T, P>,
    classifier: Classifier,
    media: DraftIndex<MediaDraft>,
    series: DraftIndex<SeriesDraft>,
    nopage: Vec<MediaDraft>,
    docs: HashMap<String, Rc<Document>>,
    dropped: Vec<String>,
    stale_covers: usize,
}

impl<T: Transport, P: MarkupParser> Pipeline<T, P> {
    pub fn new(source: ArticleSource<T>, parser: P, config: PipelineConfig) -> Self {
        let classifier = Classifier::new(config.suppress.clone());
        Self {
            config,
            articles: Articles::new(source, parser),
            classifier,
            media: DraftIndex::new(),
            series: DraftIndex::new(),
            nopage: Vec::new(),
            docs: HashMap::new(),
            dropped: Vec::new(),
            stale_covers: 0,
        }
    }

    /// Replaces the classifier, e.g. to start from a known TV type cache.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn articles(&self) -> &Articles<T, P> {
        &self.articles
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn media(&self) -> &DraftIndex<MediaDraft> {
        &self.media
    }

    pub fn series(&self) -> &DraftIndex<SeriesDraft> {
        &self.series
    }

    pub fn nopage(&self) -> &[MediaDraft] {
        &self.nopage
    }

    /// Fetches the timeline article and scans its media table.
    pub async fn load_timeline(&mut self) -> Result<Vec<TimelineEntry>> {
        tracing::info!(title = %self.config.timeline_title, "Fetching timeline");
        let page = self
            .articles
            .source()
            .fetch_one(&self.config.timeline_title, PageProperties::Content)
            .await?;
        let resolved = self
            .articles
            .open(&page)
            .await?
            .ok_or_else(|| ChronicleError::MissingArticle(self.config.timeline_title.clone()))?;

        let entries = scan_timeline(&resolved.doc, self.config.limit)?;
        tracing::info!(entries = entries.len(), "Processed timeline");
        Ok(entries)
    }

    /// Creates a draft per entry. Entries without an article are kept aside.
    pub fn seed(&mut self, entries: Vec<TimelineEntry>) {
        for entry in entries {
            let draft = MediaDraft::from_entry(entry);
            if draft.nopage {
                self.nopage.push(draft);
            } else if let Some(previous) = self.media.insert(draft) {
                tracing::warn!(title = %previous.title, "Title appears twice in the timeline, keeping the later row");
            }
        }
    }

    /// Fetches every media article and enriches its draft.
    pub async fn article_pass(&mut self) -> Result<()> {
        let titles = self.media.titles();
        tracing::info!(count = titles.len(), "Fetching articles");

        let mut pages = self.articles.source().fetch(&titles, PageProperties::Content);
        while let Some(page) = pages.next().await {
            let page = page?;

            if page.missing {
                let key = page.requested_title().to_string();
                match self.config.missing_article {
                    MissingArticlePolicy::Fail => return Err(ChronicleError::MissingArticle(key)),
                    MissingArticlePolicy::Drop => {
                        tracing::info!(title = %key, "Redlink in the timeline, ignoring");
                        self.media.remove(&key);
                        self.dropped.push(key);
                        continue;
                    }
                }
            }

            let mut key = self.media.reconcile(&page.title, page.normalized_from.as_deref())?;
            let resolved = self
                .articles
                .open(&page)
                .await?
                .ok_or_else(|| ChronicleError::MissingArticle(key.clone()))?;
            let doc = resolved.doc;

            if resolved.redirected && doc.title != key {
                if self.media.contains(&doc.title) {
                    tracing::warn!(title = %key, target = %doc.title, "Redirect target already in the timeline, keeping the old title");
                } else {
                    self.media.rekey(&key, &doc.title)?;
                    key = doc.title.clone();
                }
            }

            if doc.disambiguation {
                tracing::error!(title = %key, "Disambiguation page");
                self.classifier.record(Diagnostic::new(DiagnosticKind::Disambiguation, &key, ""));
            }

            let infobox = doc.infobox().ok_or_else(|| ChronicleError::NoInfobox(key.clone()))?;
            let draft = self.media.get_mut(&key).ok_or_else(|| ChronicleError::TitleMismatch(key.clone()))?;

            draft.page_id = page.page_id;
            draft.revision_timestamp = page.revision_timestamp.clone();
            draft.redirect = resolved.redirected;
            if infobox.kind.parse::<InfoboxKind>().ok() == Some(InfoboxKind::Audiobook) {
                draft.audiobook = Some(true);
            }
            draft.info = InfoboxData::extract(infobox, &key);

            if draft.media_type == MediaType::Tv && draft.info.series.len() > 1 {
                tracing::warn!(title = %key, series = ?draft.info.series, "TV draft belongs to multiple series");
                self.classifier.record(Diagnostic::new(
                    DiagnosticKind::MultipleTvSeries,
                    &key,
                    draft.info.series.join(", "),
                ));
            }

            for series in &draft.info.series {
                if !self.series.contains(series) {
                    self.series.insert(SeriesDraft::new(series.as_str()));
                }
            }

            self.docs.insert(key, doc);
        }

        if let Some(key) = self.media.titles().into_iter().find(|t| !self.docs.contains_key(t)) {
            tracing::error!(title = %key, "No page returned for a requested title");
            return Err(ChronicleError::TitleMismatch(key));
        }

        Ok(())
    }

    /// Fetches every series article and classifies the series.
    pub async fn series_pass(&mut self) -> Result<()> {
        let titles = self.series.titles();
        tracing::info!(count = titles.len(), "Fetching series articles");

        let mut renames: Vec<(String, String)> = Vec::new();
        let mut pages = self.articles.source().fetch(&titles, PageProperties::Content);
        while let Some(page) = pages.next().await {
            let page = page?;

            if page.missing {
                let key = page.requested_title().to_string();
                let members: Vec<&MediaDraft> = self.media.values().filter(|m| m.in_series(&key)).collect();
                let draft = self.series.get_mut(&key).ok_or_else(|| ChronicleError::TitleMismatch(key.clone()))?;
                self.classifier.infer_redlink_series(draft, &members);
                continue;
            }

            let key = self.series.reconcile(&page.title, page.normalized_from.as_deref())?;
            if let Some(from) = page.normalized_from.as_deref()
                && from != key
            {
                renames.push((from.to_string(), key.clone()));
            }

            let resolved = self
                .articles
                .open(&page)
                .await?
                .ok_or_else(|| ChronicleError::MissingArticle(key.clone()))?;

            let draft = self.series.get_mut(&key).ok_or_else(|| ChronicleError::TitleMismatch(key.clone()))?;
            draft.page_id = page.page_id;
            draft.revision_timestamp = page.revision_timestamp.clone();
            draft.redirect = resolved.redirected;
            self.classifier.classify_series(draft, &resolved.doc, &self.articles).await?;
        }

        for (from, to) in renames {
            for draft in self.media.values_mut() {
                for series in draft.info.series.iter_mut().filter(|s| **s == from) {
                    *series = to.clone();
                }
            }
        }

        Ok(())
    }

    /// Classifies every media draft, in timeline order.
    pub async fn full_type_pass(&mut self) -> Result<()> {
        let mut order: Vec<(usize, String)> = self.media.values().map(|m| (m.chronology, m.title.clone())).collect();
        order.sort();

        for (_, title) in order {
            let doc = self
                .docs
                .get(&title)
                .cloned()
                .ok_or_else(|| ChronicleError::TitleMismatch(title.clone()))?;
            let draft = self
                .media
                .get_mut(&title)
                .ok_or_else(|| ChronicleError::TitleMismatch(title.clone()))?;
            self.classifier.classify_media(draft, &doc, &self.series, &self.articles).await?;
        }

        self.docs.clear();
        Ok(())
    }

    /// Titles of drafts whose type requires a full type they lack.
    pub fn unresolved_full_types(&self) -> Vec<String> {
        self.media
            .values()
            .filter(|m| m.media_type.requires_full_type() && m.full_type.is_none())
            .map(|m| m.title.clone())
            .collect()
    }

    /// Runs every stage and writes the result to `sink`.
    pub async fn run<S: CatalogSink>(&mut self, sink: &mut S) -> Result<RunReport> {
        let entries = self.load_timeline().await?;
        self.seed(entries);
        self.article_pass().await?;
        self.series_pass().await?;
        self.full_type_pass().await?;
        refine_young_reader_series(&mut self.series, &self.media);

        if self.config.fetch_covers {
            let snapshot = sink.cover_snapshot()?;
            self.stale_covers = attach_covers(self.articles.source(), &mut self.media, &snapshot).await?;
        }

        let unresolved = self.unresolved_full_types();
        if !unresolved.is_empty() {
            tracing::error!(count = unresolved.len(), titles = ?unresolved, "No full type despite being required");
            if self.config.require_full_types {
                return Err(ChronicleError::UnresolvedClassification(unresolved));
            }
        }

        let report = self.report(unresolved);

        let mut media: Vec<MediaDraft> = std::mem::take(&mut self.media).into_values().collect();
        media.append(&mut self.nopage);
        let series: Vec<SeriesDraft> = std::mem::take(&mut self.series).into_values().collect();

        tracing::info!(media = media.len(), series = series.len(), "Writing catalog");
        sink.replace_media(media)?;
        sink.replace_series(series)?;

        tracing::info!(
            redirects = report.redirects,
            requests = report.requests,
            bytes = report.bytes,
            stale_covers = report.stale_covers,
            "Done"
        );
        Ok(report)
    }

    fn report(&mut self, unresolved: Vec<String>) -> RunReport {
        let stats = self.articles.source().stats();
        RunReport {
            media: self.media.len(),
            series: self.series.len(),
            nopage: self.nopage.len(),
            dropped: self.dropped.clone(),
            unresolved,
            diagnostics: self.classifier.take_diagnostics(),
            redirects: self.articles.redirects(),
            requests: stats.requests,
            bytes: stats.bytes,
            stale_covers: self.stale_covers,
        }
    }
}
