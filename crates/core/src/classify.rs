//! Type and sub-type classification.
//!
//! Every draft starts with a coarse [`MediaType`] from the timeline legend.
//! The [`Classifier`] refines it into a [`FullType`] using, in order of
//! confidence, category membership, keyword patterns over the first sentence
//! and facts borrowed from the parent series.
//!
//! A few of the keyword rules are guesses. They still assign a value, but they
//! also record a [`Diagnostic`] and log a warning unless the title is on the
//! [`SuppressList`].
//!
//! TV sub-types are a series-level fact. The first episode (or the series
//! article itself, during the series pass) that derives one stores it in a
//! [`TvTypeCache`], and later episodes of the same series reuse it without
//! looking at any article.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::articles::DocumentLookup;
use crate::document::Document;
use crate::draft::{DraftIndex, FullType, MediaDraft, MediaType, SeriesDraft};
use crate::infobox::{InfoboxData, InfoboxKind, series_type_for};
use crate::suppress::{Heuristic, SuppressList};
use crate::{ChronicleError, Result};

const AUDIO_DRAMA_CATEGORY: &str = "Canon audio dramas";
const MULTIMEDIA_CATEGORY: &str = "Multimedia projects";
const ANIMATED_CATEGORY: &str = "Canon animated television series";
const LIVE_ACTION_CATEGORY: &str = "Canon live-action television series";
const MANGA_CATEGORY: &str = "Canon manga";
const MOBILE_GAME_CATEGORY: &str = "Canon mobile games";
const BROWSER_GAME_CATEGORY: &str = "Web-based games";
const VR_CATEGORIES: [&str; 3] = ["Virtual reality", "Virtual reality attractions", "Virtual reality games"];

const AUDIENCE_CATEGORIES: [(&str, Audience); 3] = [
    ("Canon adult novels", Audience::Adult),
    ("Canon young-adult novels", Audience::YoungAdult),
    ("Canon Young Readers", Audience::Junior),
];

static JUNIOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)junior|middle[ -]grade|chapter book|young[ -]reader|young children").unwrap());
static YOUNG_ADULT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)young[ -]adult").unwrap());
static ADULT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)adult|canon novel").unwrap());
static NOVEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)novels?").unwrap());

static MICRO_SERIES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)micro[- ]series").unwrap());
static ANIMATED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)animated").unwrap());
static CGI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bCG\b|\bCGI\b").unwrap());
static VIRTUAL_REALITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)virtual[ -]reality").unwrap());
static MANGA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)manga|japanese webcomic").unwrap());

/// First-sentence patterns for series types. Later entries win.
static SERIES_PATTERNS: LazyLock<[(MediaType, Regex); 4]> = LazyLock::new(|| {
    [
        (MediaType::Multimedia, Regex::new(r"(?i)multimedia project").unwrap()),
        (
            MediaType::Comic,
            Regex::new(
                r"(?i)((comic([ -]book)?|manga|graphic novel) (mini-?)?series|series of( young readers?)? (comic([ -]book)?s|mangas|graphic novels))",
            )
            .unwrap(),
        ),
        (MediaType::ShortStory, Regex::new(r"(?i)short stor(y|ies)").unwrap()),
        (MediaType::Game, Regex::new(r"(?i)video game").unwrap()),
    ]
});

/// Target audience of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Junior,
    YoungAdult,
    Adult,
}

impl Audience {
    pub fn full_type(self) -> FullType {
        match self {
            Audience::Junior => FullType::BookJr,
            Audience::YoungAdult => FullType::BookYa,
            Audience::Adult => FullType::BookA,
        }
    }
}

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A low-confidence rule or conflicting patterns decided the value.
    Heuristic(Heuristic),
    /// No TV category, the sub-type came from the sentence or the default.
    UnknownTvType,
    /// No audience could be found for a book.
    UnresolvedAudience,
    /// A TV draft names more than one series.
    MultipleTvSeries,
    /// A series title has no article.
    RedlinkSeries,
    /// A redlink series whose members disagree on type.
    UninferredSeriesType,
    /// A media title resolved to a disambiguation page.
    Disambiguation,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Heuristic(h) => write!(f, "{}", h),
            DiagnosticKind::UnknownTvType => f.write_str("unknown_tv_type"),
            DiagnosticKind::UnresolvedAudience => f.write_str("unresolved_audience"),
            DiagnosticKind::MultipleTvSeries => f.write_str("multiple_tv_series"),
            DiagnosticKind::RedlinkSeries => f.write_str("redlink_series"),
            DiagnosticKind::UninferredSeriesType => f.write_str("uninferred_series_type"),
            DiagnosticKind::Disambiguation => f.write_str("disambiguation"),
        }
    }
}

/// A recoverable classification event worth reviewing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub title: String,
    pub detail: String,
    /// The title is allow-listed, so no warning was logged.
    pub suppressed: bool,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { kind, title: title.into(), detail: detail.into(), suppressed: false }
    }
}

/// Series title to TV sub-type, shared across the run.
#[derive(Debug, Clone, Default)]
pub struct TvTypeCache {
    types: HashMap<String, FullType>,
}

impl TvTypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, series: &str) -> Option<FullType> {
        self.types.get(series).copied()
    }

    pub fn insert(&mut self, series: impl Into<String>, full_type: FullType) {
        self.types.insert(series.into(), full_type);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// True when the article is filed as an audio drama.
pub fn is_audio_drama(doc: &Document) -> bool {
    doc.has_category(AUDIO_DRAMA_CATEGORY)
}

/// Game sub-type from categories and the first sentence.
pub fn game_full_type(doc: &Document) -> FullType {
    if doc.has_category(MOBILE_GAME_CATEGORY) {
        FullType::GameMobile
    } else if doc.has_category(BROWSER_GAME_CATEGORY) {
        FullType::GameBrowser
    } else if VR_CATEGORIES.iter().any(|c| doc.has_category(c)) || VIRTUAL_REALITY.is_match(doc.sentence_text(0)) {
        FullType::GameVr
    } else {
        FullType::Game
    }
}

/// Key under which a TV draft's sub-type is cached: its TV series, else itself.
pub fn tv_series_key<'a>(draft: &'a MediaDraft, series: &DraftIndex<SeriesDraft>) -> &'a str {
    draft
        .info
        .series
        .iter()
        .find(|title| series.get(title).is_some_and(|s| s.series_type == Some(MediaType::Tv)))
        .map(String::as_str)
        .unwrap_or(&draft.title)
}

/// Classification state for one run.
#[derive(Debug, Default)]
pub struct Classifier {
    suppress: SuppressList,
    tv_types: TvTypeCache,
    diagnostics: Vec<Diagnostic>,
}

impl Classifier {
    pub fn new(suppress: SuppressList) -> Self {
        Self::with_tv_types(suppress, TvTypeCache::new())
    }

    /// Starts from an existing TV sub-type cache.
    pub fn with_tv_types(suppress: SuppressList, tv_types: TvTypeCache) -> Self {
        Self { suppress, tv_types, diagnostics: Vec::new() }
    }

    pub fn tv_types(&self) -> &TvTypeCache {
        &self.tv_types
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Records a heuristic hit, warning unless `title` is allow-listed.
    fn heuristic(&mut self, heuristic: Heuristic, title: &str, detail: &str) {
        let suppressed = self.suppress.contains(heuristic, title);
        if !suppressed {
            tracing::warn!(title = %title, heuristic = %heuristic, detail = %detail, "Low confidence classification");
        }
        self.record(Diagnostic { suppressed, ..Diagnostic::new(DiagnosticKind::Heuristic(heuristic), title, detail) });
    }

    /// Audience keywords in a sentence. `title` is used for the allow-list.
    fn audience_from_sentence(&mut self, sentence: &str, title: &str) -> Option<Audience> {
        if JUNIOR.is_match(sentence) {
            Some(Audience::Junior)
        } else if YOUNG_ADULT.is_match(sentence) {
            Some(Audience::YoungAdult)
        } else if ADULT.is_match(sentence) {
            Some(Audience::Adult)
        } else if NOVEL.is_match(sentence) {
            self.heuristic(Heuristic::LowConfidenceAdultNovel, title, sentence);
            Some(Audience::Adult)
        } else {
            None
        }
    }

    /// Resolves a book's audience: categories, first sentence, then the
    /// first sentence of the series named in the infobox.
    ///
    /// A named series without an article is an error.
    pub async fn audience<L: DocumentLookup>(&mut self, doc: &Document, lookup: &L) -> Result<Option<Audience>> {
        if let Some((_, audience)) = AUDIENCE_CATEGORIES.iter().find(|(c, _)| doc.has_category(c)) {
            return Ok(Some(*audience));
        }

        let sentence = doc.sentence_text(0);
        if let Some(audience) = self.audience_from_sentence(sentence, &doc.title) {
            return Ok(Some(audience));
        }

        let Some(series) = doc.infobox().and_then(|i| i.links("series").first()) else {
            tracing::warn!(title = %doc.title, sentence = %sentence, "Can't figure out target audience, no series to fall back on");
            self.record(Diagnostic::new(DiagnosticKind::UnresolvedAudience, &doc.title, sentence));
            return Ok(None);
        };

        tracing::info!(title = %doc.title, series = %series.page, "Getting series for audience");
        let series_doc = lookup
            .document(&series.page)
            .await?
            .ok_or_else(|| ChronicleError::MissingArticle(series.page.clone()))?;

        let series_sentence = series_doc.sentence_text(0);
        let audience = self.audience_from_sentence(series_sentence, &doc.title);
        if audience.is_none() {
            tracing::warn!(
                title = %doc.title,
                sentence = %sentence,
                series_sentence = %series_sentence,
                "Can't figure out target audience from the article nor its series"
            );
            self.record(Diagnostic::new(DiagnosticKind::UnresolvedAudience, &doc.title, series_sentence));
        }
        Ok(audience)
    }

    /// TV sub-type for the series cached under `key`.
    ///
    /// On a cache miss the series article is looked up (falling back to `doc`
    /// when `key` names `doc` itself or has no article) and the result cached.
    pub async fn tv_full_type<L: DocumentLookup>(&mut self, key: &str, doc: &Document, lookup: &L) -> Result<FullType> {
        if let Some(full_type) = self.tv_types.get(key) {
            return Ok(full_type);
        }

        let fetched = if key == doc.title { None } else { lookup.document(key).await? };
        Ok(self.tv_full_type_from(key, fetched.as_deref().unwrap_or(doc)))
    }

    /// Derives and caches the TV sub-type from the series article itself.
    fn tv_full_type_from(&mut self, key: &str, series_doc: &Document) -> FullType {
        if let Some(full_type) = self.tv_types.get(key) {
            return full_type;
        }

        let sentence = series_doc.sentence_text(0);
        let full_type = if MICRO_SERIES.is_match(sentence) {
            FullType::TvMicroSeries
        } else if series_doc.has_category(ANIMATED_CATEGORY) {
            FullType::TvAnimated
        } else if series_doc.has_category(LIVE_ACTION_CATEGORY) {
            FullType::TvLiveAction
        } else {
            tracing::warn!(series = %key, categories = ?series_doc.categories, "Unknown TV full type");
            if ANIMATED.is_match(sentence) || CGI.is_match(sentence) {
                self.heuristic(Heuristic::LowConfidenceAnimated, key, sentence);
                FullType::TvAnimated
            } else {
                tracing::warn!(series = %key, "Couldn't infer type from sentence, setting to live-action");
                self.record(Diagnostic::new(DiagnosticKind::UnknownTvType, key, sentence));
                FullType::TvLiveAction
            }
        };

        self.tv_types.insert(key, full_type);
        full_type
    }

    /// Comic sub-type: manga keywords, then the infobox template.
    pub fn comic_full_type(&mut self, title: &str, doc: &Document) -> FullType {
        if MANGA.is_match(doc.sentence_text(0)) || doc.has_category(MANGA_CATEGORY) {
            return FullType::ComicManga;
        }
        if MANGA.is_match(doc.sentence_text(1)) {
            let detail = format!("{} {}", doc.sentence_text(0), doc.sentence_text(1));
            self.heuristic(Heuristic::LowConfidenceManga, title, &detail);
            return FullType::ComicManga;
        }
        match doc.infobox_kind().parse::<InfoboxKind>() {
            Ok(InfoboxKind::ComicStrip) => FullType::ComicStrip,
            Ok(InfoboxKind::ComicStory) => FullType::ComicStory,
            _ => FullType::Comic,
        }
    }

    /// Full type for `media_type`. `tv_key` is `None` when `doc` is the
    /// series article, so the TV sub-type is derived from it directly.
    async fn derive_full_type<L: DocumentLookup>(
        &mut self, title: &str, media_type: MediaType, tv_key: Option<&str>, doc: &Document, lookup: &L,
    ) -> Result<Option<FullType>> {
        match media_type {
            MediaType::Book => Ok(self.audience(doc, lookup).await?.map(Audience::full_type)),
            MediaType::Tv => match tv_key {
                Some(key) => self.tv_full_type(key, doc, lookup).await.map(Some),
                None => Ok(Some(self.tv_full_type_from(title, doc))),
            },
            MediaType::Game => Ok(Some(game_full_type(doc))),
            MediaType::Comic => Ok(Some(self.comic_full_type(title, doc))),
            _ => Ok(None),
        }
    }

    /// Assigns a media draft's full type from its article.
    ///
    /// Books filed as audio dramas become [`MediaType::AudioDrama`] instead.
    /// A book that already has a full type keeps it.
    pub async fn classify_media<L: DocumentLookup>(
        &mut self, draft: &mut MediaDraft, doc: &Document, series: &DraftIndex<SeriesDraft>, lookup: &L,
    ) -> Result<()> {
        if draft.media_type == MediaType::Book {
            if is_audio_drama(doc) {
                draft.media_type = MediaType::AudioDrama;
                draft.audiobook = Some(false);
                return Ok(());
            }
            if draft.full_type.is_some() {
                return Ok(());
            }
        }

        let tv_key = tv_series_key(draft, series).to_string();
        if let Some(full_type) = self.derive_full_type(&draft.title, draft.media_type, Some(&tv_key), doc, lookup).await? {
            draft.full_type = Some(full_type);
        }
        Ok(())
    }

    /// Series type from the category and first-sentence patterns alone.
    pub fn series_type_from_text(&mut self, title: &str, doc: &Document) -> Option<MediaType> {
        if doc.has_category(MULTIMEDIA_CATEGORY) {
            return Some(MediaType::Multimedia);
        }

        let sentence = doc.sentence_text(0);
        let mut found: Option<MediaType> = None;
        for (media_type, pattern) in SERIES_PATTERNS.iter() {
            if !pattern.is_match(sentence) {
                continue;
            }
            if let Some(previous) = found {
                let detail = format!("matched {} and {}, latter wins: {}", previous, media_type, sentence);
                self.heuristic(Heuristic::MultipleRegexMatches, title, &detail);
            }
            found = Some(*media_type);
        }
        found
    }

    /// Classifies a series from its article and fills it from the infobox.
    ///
    /// Fails when the infobox template has no series type, or when there is
    /// neither an infobox nor a matching first sentence.
    pub async fn classify_series<L: DocumentLookup>(
        &mut self, draft: &mut SeriesDraft, doc: &Document, lookup: &L,
    ) -> Result<()> {
        if draft.title.contains('#') {
            draft.display_title = Some(draft.title.replace('#', " "));
        }

        draft.series_type = self.series_type_from_text(&draft.title, doc);

        let Some(infobox) = doc.infobox() else {
            if draft.series_type.is_none() {
                return Err(ChronicleError::UninferableSeries {
                    title: draft.title.clone(),
                    sentence: doc.sentence_text(0).to_string(),
                });
            }
            return Ok(());
        };

        let series_type = match draft.series_type {
            Some(series_type) => series_type,
            None => series_type_for(&draft.title, &infobox.kind)?,
        };
        draft.series_type = Some(series_type);
        draft.info = InfoboxData::extract(infobox, &draft.title);

        if series_type == MediaType::Book && is_audio_drama(doc) {
            draft.series_type = Some(MediaType::AudioDrama);
            return Ok(());
        }
        let title = draft.title.clone();
        if let Some(full_type) = self.derive_full_type(&title, series_type, None, doc, lookup).await? {
            draft.full_type = Some(full_type);
        }
        Ok(())
    }

    /// Infers the type of a series without an article from its members.
    ///
    /// A strict majority of member types wins, otherwise the type is
    /// [`MediaType::Unknown`]. The full type is copied only when every member
    /// has the same one.
    pub fn infer_redlink_series(&mut self, draft: &mut SeriesDraft, members: &[&MediaDraft]) {
        tracing::info!(series = %draft.title, members = members.len(), "Inferring series type from members of a redlink series");
        self.record(Diagnostic::new(DiagnosticKind::RedlinkSeries, &draft.title, format!("{} members", members.len())));

        let mut votes: BTreeMap<MediaType, usize> = BTreeMap::new();
        for member in members {
            *votes.entry(member.media_type).or_default() += 1;
        }
        let winner = votes
            .iter()
            .max_by_key(|(_, count)| **count)
            .filter(|(_, count)| **count * 2 > members.len())
            .map(|(media_type, _)| *media_type);

        match winner {
            Some(media_type) => {
                tracing::info!(series = %draft.title, inferred = %media_type, "Inferred redlink series type");
                draft.series_type = Some(media_type);
            }
            None => {
                tracing::warn!(series = %draft.title, "Failed to infer redlink series type, setting unknown");
                self.record(Diagnostic::new(
                    DiagnosticKind::UninferredSeriesType,
                    &draft.title,
                    format!("{:?}", votes),
                ));
                draft.series_type = Some(MediaType::Unknown);
            }
        }

        let first = members.first().and_then(|m| m.full_type);
        if first.is_some() && members.iter().all(|m| m.full_type == first) {
            tracing::info!(series = %draft.title, full_type = ?first, "Inferred redlink series full type");
            draft.full_type = first;
        }
    }
}

/// Reclassifies book series whose members are all young-reader books.
///
/// A series with no members is left alone.
pub fn refine_young_reader_series(series: &mut DraftIndex<SeriesDraft>, media: &DraftIndex<MediaDraft>) {
    for draft in series.values_mut() {
        if draft.series_type != Some(MediaType::Book) {
            continue;
        }
        let mut members = media.values().filter(|m| m.in_series(&draft.title)).peekable();
        if members.peek().is_none() {
            continue;
        }
        if members.all(|m| m.media_type == MediaType::Yr) {
            tracing::info!(series = %draft.title, "Series has only yr entries, therefore it is yr");
            draft.series_type = Some(MediaType::Yr);
            draft.full_type = None;
        }
    }
}
