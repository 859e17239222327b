//! Infobox field resolution.
//!
//! A [`FieldSpec`] names one or more aliases for an infobox key. Resolution is
//! a priority lookup: the first alias with non-empty text wins, its node tree
//! goes through the [AST normalizer](crate::ast), and empty results are
//! dropped so that key absence means "unknown".
//!
//! On top of the generic fields, [`InfoboxData::extract`] derives the cover
//! image identifier, publisher and series link targets, and the season number.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::ast::{FieldData, normalize};
use crate::document::{Infobox, Node, decode_entities};
use crate::draft::MediaType;
use crate::{ChronicleError, Result};

/// An infobox key with its aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub aliases: &'static [&'static str],
    /// Output key used instead of the first alias.
    pub name: Option<&'static str>,
    /// Append `Details` to the output key.
    pub details: bool,
}

impl FieldSpec {
    pub const fn key(aliases: &'static [&'static str]) -> Self {
        Self { aliases, name: None, details: false }
    }

    pub const fn details(aliases: &'static [&'static str]) -> Self {
        Self { aliases, name: None, details: true }
    }

    pub const fn named(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { aliases, name: Some(name), details: false }
    }

    /// The camel-cased output key.
    pub fn output_key(&self) -> String {
        let base = self.name.or_else(|| self.aliases.first().copied()).unwrap_or("");
        let mut key = to_camel_case(base);
        if self.details {
            key.push_str("Details");
        }
        key
    }
}

/// Fields copied from media and series infoboxes.
pub const MEDIA_FIELDS: &[FieldSpec] = &[
    FieldSpec::details(&["release date", "airdate", "publication date", "released", "first aired"]),
    FieldSpec::key(&["closed"]),
    FieldSpec::key(&["author"]),
    FieldSpec::details(&["writer", "writers"]),
    FieldSpec::key(&["narrator"]),
    FieldSpec::key(&["developer"]),
    FieldSpec::details(&["season"]),
    FieldSpec::key(&["episode"]),
    FieldSpec::key(&["production"]),
    FieldSpec::key(&["guests"]),
    FieldSpec::key(&["director", "directors"]),
    FieldSpec::key(&["producer"]),
    FieldSpec::key(&["starring"]),
    FieldSpec::key(&["music"]),
    FieldSpec::key(&["runtime", "run time"]),
    FieldSpec::key(&["budget"]),
    FieldSpec::key(&["penciller"]),
    FieldSpec::key(&["inker"]),
    FieldSpec::key(&["letterer"]),
    FieldSpec::key(&["colorist"]),
    FieldSpec::key(&["editor"]),
    FieldSpec::key(&["language"]),
    FieldSpec::details(&["publisher"]),
    FieldSpec::key(&["pages"]),
    FieldSpec::key(&["cover artist"]),
    FieldSpec::named("dateDetails", &["timeline"]),
    FieldSpec::key(&["illustrator"]),
    FieldSpec::key(&["media type"]),
    FieldSpec::key(&["published in"]),
    FieldSpec::key(&["engine"]),
    FieldSpec::key(&["genre"]),
    FieldSpec::key(&["modes"]),
    FieldSpec::key(&["ratings"]),
    FieldSpec::key(&["platforms"]),
    FieldSpec::details(&["series"]),
    FieldSpec::key(&["basegame"]),
    FieldSpec::key(&["expansions"]),
    FieldSpec::key(&["designer"]),
    FieldSpec::key(&["programmer"]),
    FieldSpec::key(&["artist"]),
    FieldSpec::key(&["composer"]),
    FieldSpec::key(&["issue"]),
    FieldSpec::key(&["num episodes"]),
    FieldSpec::key(&["num seasons"]),
    FieldSpec::key(&["network"]),
    FieldSpec::key(&["last aired"]),
    FieldSpec::key(&["creators"]),
    FieldSpec::key(&["executive producers"]),
    FieldSpec::key(&["prev"]),
    FieldSpec::key(&["next"]),
    FieldSpec::key(&["preceded by"]),
    FieldSpec::key(&["followed by"]),
    FieldSpec::key(&["upc"]),
    FieldSpec::key(&["isbn"]),
];

/// Camel-cases a space-separated key: `cover artist` becomes `coverArtist`.
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, word) in s.split_whitespace().enumerate() {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Resolves every spec against the infobox.
///
/// Keys whose aliases are all empty, or whose value normalizes to nothing,
/// are absent from the result.
pub fn resolve(infobox: &Infobox, specs: &[FieldSpec]) -> BTreeMap<String, FieldData> {
    let mut out = BTreeMap::new();

    for spec in specs {
        let Some(value) = spec
            .aliases
            .iter()
            .filter_map(|alias| infobox.get(alias))
            .find(|value| !value.text.is_empty())
        else {
            continue;
        };

        let data = if value.ast.is_empty() {
            normalize(&[Node::text(value.text.as_str())])
        } else {
            normalize(&value.ast)
        };

        if let Some(data) = data.filter(|d| !d.is_empty()) {
            out.insert(spec.output_key(), data);
        }
    }

    out
}

static COVER_SYNTAX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\[\[|File:|\]\]|\|.*)").unwrap());

/// Extracts the cover file name from the raw `image` field.
///
/// The field is frequently malformed as a link, so the wiki syntax is
/// stripped textually instead of being parsed.
pub fn cover_identifier(infobox: &Infobox) -> Option<String> {
    let raw = infobox.get("image")?.wikitext.as_str();
    let cleaned = COVER_SYNTAX.replace_all(raw, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() { None } else { Some(cleaned.to_string()) }
}

/// Publisher link targets.
pub fn publishers(infobox: &Infobox) -> Vec<String> {
    infobox
        .links("publisher")
        .iter()
        .map(|l| decode_entities(&l.page).into_owned())
        .collect()
}

/// Series link targets, keeping in-page anchors.
pub fn series(infobox: &Infobox) -> Vec<String> {
    infobox
        .links("series")
        .iter()
        .map(|l| decode_entities(&l.page_with_anchor()).into_owned())
        .collect()
}

const NUMBER_WORDS: [&str; 20] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven", "twelve", "thirteen",
    "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen", "twenty",
];

static SEASON_STRICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:season )?(?:(\d+)|({}))$", NUMBER_WORDS.join("|"))).unwrap()
});
static SEASON_LOOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?:season )?\b(?:(\d+)|({}))\b", NUMBER_WORDS.join("|"))).unwrap()
});
static EPISODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+([–-]\d+)?$").unwrap());

/// Value of an English number word from one to twenty.
pub fn number_word(word: &str) -> Option<u32> {
    NUMBER_WORDS.iter().position(|w| *w == word).map(|i| i as u32 + 1)
}

/// A season number parsed from free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Season {
    pub number: u32,
    /// The text marks the season as a shorts season.
    pub shorts: bool,
    /// Found by the anywhere-in-string fallback rather than a whole-string match.
    pub low_confidence: bool,
}

/// Parses a season number.
///
/// Tries a whole-string match of `season <N>` or a number word first, then
/// falls back to a word-boundary match anywhere, which is flagged low
/// confidence and may carry a `shorts` qualifier.
pub fn parse_season(text: &str) -> Option<Season> {
    let clean = text.trim().to_lowercase();
    if clean.is_empty() {
        return None;
    }

    if let Some(number) = SEASON_STRICT.captures(&clean).and_then(|c| season_number(&c)) {
        return Some(Season { number, shorts: false, low_confidence: false });
    }

    let number = SEASON_LOOSE.captures(&clean).and_then(|c| season_number(&c))?;
    Some(Season { number, shorts: clean.contains("shorts"), low_confidence: true })
}

fn season_number(caps: &regex::Captures<'_>) -> Option<u32> {
    if let Some(word) = caps.get(2) {
        return number_word(word.as_str());
    }
    caps.get(1).and_then(|d| d.as_str().parse().ok())
}

/// True for `11` or a double episode like `1-2`.
pub fn is_valid_episode(text: &str) -> bool {
    EPISODE.is_match(text)
}

/// Fields derived from an infobox, flattened into the owning draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoboxData {
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_wook: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub publisher: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_note: Option<String>,
    /// Compact label such as `S2 E11`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub se: Option<String>,
}

impl InfoboxData {
    /// Resolves [`MEDIA_FIELDS`] and the derived fields of `infobox`.
    pub fn extract(infobox: &Infobox, title: &str) -> Self {
        let mut fields = resolve(infobox, MEDIA_FIELDS);

        if fields.get("isbn").and_then(|v| v.as_text()) == Some("none") {
            fields.remove("isbn");
        }

        let season_text = infobox.text("season");
        let season = parse_season(season_text);
        match season {
            Some(s) if s.low_confidence => {
                tracing::debug!(title = %title, text = %season_text, "Season matched by word boundary fallback");
            }
            None if !season_text.is_empty() => {
                tracing::warn!(title = %title, text = %season_text, "Couldn't get season");
            }
            _ => {}
        }

        let episode = fields.get("episode").and_then(|v| v.as_text()).map(str::to_string);
        if let Some(ep) = &episode
            && !is_valid_episode(ep)
        {
            tracing::error!(title = %title, episode = %ep, "Episode does not have a valid format");
        }

        let season_note = season.filter(|s| s.shorts).map(|_| "shorts".to_string());
        let season = season.map(|s| s.number);

        Self {
            se: season_episode_label(season, season_note.as_deref(), episode.as_deref()),
            fields,
            cover_wook: cover_identifier(infobox),
            publisher: publishers(infobox),
            series: series(infobox),
            season,
            season_note,
        }
    }

    /// Generic field as plain text, when it normalized to a scalar.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_text())
    }
}

fn season_episode_label(season: Option<u32>, note: Option<&str>, episode: Option<&str>) -> Option<String> {
    let mut label = String::new();
    if let Some(season) = season {
        label.push_str(&format!("S{}", season));
        if let Some(note) = note {
            label.push('-');
            label.push_str(note);
        }
    }
    if let Some(episode) = episode {
        if !label.is_empty() {
            label.push(' ');
        }
        label.push_str(&format!("E{}", episode));
    }
    if label.is_empty() { None } else { Some(label) }
}

/// Infobox template names the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoboxKind {
    Book,
    BookSeries,
    Audiobook,
    ComicBook,
    ComicStrip,
    Webstrip,
    ComicStory,
    ComicStoryArc,
    ComicSeries,
    TradePaperback,
    ShortStory,
    ReferenceBook,
    VideoGame,
    Movie,
    TelevisionSeries,
    TelevisionSeason,
    TelevisionEpisode,
    Magazine,
}

impl InfoboxKind {
    const ALL: [(InfoboxKind, &'static str); 18] = [
        (InfoboxKind::Book, "book"),
        (InfoboxKind::BookSeries, "book series"),
        (InfoboxKind::Audiobook, "audiobook"),
        (InfoboxKind::ComicBook, "comic book"),
        (InfoboxKind::ComicStrip, "comic strip"),
        (InfoboxKind::Webstrip, "webstrip"),
        (InfoboxKind::ComicStory, "comic story"),
        (InfoboxKind::ComicStoryArc, "comic story arc"),
        (InfoboxKind::ComicSeries, "comic series"),
        (InfoboxKind::TradePaperback, "trade paperback"),
        (InfoboxKind::ShortStory, "short story"),
        (InfoboxKind::ReferenceBook, "reference book"),
        (InfoboxKind::VideoGame, "video game"),
        (InfoboxKind::Movie, "movie"),
        (InfoboxKind::TelevisionSeries, "television series"),
        (InfoboxKind::TelevisionSeason, "television season"),
        (InfoboxKind::TelevisionEpisode, "television episode"),
        (InfoboxKind::Magazine, "magazine"),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(kind, _)| kind == self)
            .map(|(_, name)| *name)
            .unwrap_or("")
    }

    /// Series type implied by a series article's infobox.
    pub fn series_type(&self) -> Option<MediaType> {
        match self {
            InfoboxKind::BookSeries => Some(MediaType::Book),
            InfoboxKind::ComicSeries | InfoboxKind::ComicStoryArc | InfoboxKind::Magazine => Some(MediaType::Comic),
            InfoboxKind::Movie => Some(MediaType::Film),
            InfoboxKind::TelevisionSeries => Some(MediaType::Tv),
            _ => None,
        }
    }
}

impl FromStr for InfoboxKind {
    type Err = ChronicleError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(kind, _)| *kind)
            .ok_or_else(|| ChronicleError::UnknownInfobox { title: String::new(), kind: s.to_string() })
    }
}

impl fmt::Display for InfoboxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Looks up the series type for a series article's infobox template.
///
/// Any template without an entry in the table is a hard error.
pub fn series_type_for(title: &str, kind: &str) -> Result<MediaType> {
    kind.parse::<InfoboxKind>()
        .ok()
        .and_then(|k| k.series_type())
        .ok_or_else(|| ChronicleError::UnknownInfobox { title: title.to_string(), kind: kind.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FieldValue, Link};
    use rstest::rstest;

    fn infobox() -> Infobox {
        Infobox::new("television episode")
            .with_field("airdate", FieldValue::from_text("October 3, 2014"))
            .with_field("release date", FieldValue::default())
            .with_field("writers", FieldValue::from_text("Simon Kinberg"))
            .with_field("episode", FieldValue::from_text("1-2"))
            .with_field("season", FieldValue::from_text("Season 1"))
            .with_field("isbn", FieldValue::from_text("none"))
            .with_field(
                "image",
                FieldValue { wikitext: "[[File:Spark of Rebellion.png|250px]]".to_string(), ..Default::default() },
            )
            .with_field(
                "series",
                FieldValue {
                    text: "Star Wars Rebels".to_string(),
                    links: vec![Link {
                        page: "Star Wars Rebels".to_string(),
                        anchor: Some("Season One".to_string()),
                        text: None,
                    }],
                    ..Default::default()
                },
            )
            .with_field(
                "publisher",
                FieldValue {
                    text: "Del Rey".to_string(),
                    links: vec![Link::new("Del Rey &amp; Co")],
                    ..Default::default()
                },
            )
    }

    #[rstest]
    #[case("release date", "releaseDate")]
    #[case("cover artist", "coverArtist")]
    #[case("num episodes", "numEpisodes")]
    #[case("dateDetails", "dateDetails")]
    #[case("isbn", "isbn")]
    fn test_camel_case(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(to_camel_case(input), expected);
    }

    #[test]
    fn test_output_keys() {
        assert_eq!(FieldSpec::details(&["release date"]).output_key(), "releaseDateDetails");
        assert_eq!(FieldSpec::named("dateDetails", &["timeline"]).output_key(), "dateDetails");
        assert_eq!(FieldSpec::key(&["run time"]).output_key(), "runTime");
    }

    #[test]
    fn test_first_non_empty_alias_wins() {
        let specs = [FieldSpec::details(&["release date", "airdate", "released"])];
        let out = resolve(&infobox(), &specs);
        assert_eq!(out.get("releaseDateDetails"), Some(&FieldData::from("October 3, 2014")));
    }

    #[test]
    fn test_all_aliases_empty_is_absent() {
        let specs = [FieldSpec::key(&["release date", "budget"])];
        let out = resolve(&infobox(), &specs);
        assert!(out.is_empty());
    }

    #[test]
    fn test_cover_identifier_strips_syntax() {
        assert_eq!(cover_identifier(&infobox()).as_deref(), Some("Spark of Rebellion.png"));
        assert_eq!(cover_identifier(&Infobox::new("book")), None);
    }

    #[test]
    fn test_series_keeps_anchor() {
        assert_eq!(series(&infobox()), vec!["Star Wars Rebels#Season One".to_string()]);
        assert_eq!(publishers(&infobox()), vec!["Del Rey & Co".to_string()]);
    }

    #[rstest]
    #[case("Season 2", 2, false)]
    #[case("season two", 2, false)]
    #[case("2", 2, false)]
    #[case("Twenty", 20, false)]
    #[case("Season 2 (shorts)", 2, true)]
    fn test_parse_season(#[case] input: &str, #[case] number: u32, #[case] shorts: bool) {
        let season = parse_season(input).unwrap();
        assert_eq!(season.number, number);
        assert_eq!(season.shorts, shorts);
    }

    #[test]
    fn test_parse_season_confidence() {
        assert!(!parse_season("Season 3").unwrap().low_confidence);
        assert!(parse_season("The third season, part 3").unwrap().low_confidence);
        assert_eq!(parse_season("Specials"), None);
        assert_eq!(parse_season(""), None);
    }

    #[test]
    fn test_episode_format() {
        assert!(is_valid_episode("11"));
        assert!(is_valid_episode("1-2"));
        assert!(is_valid_episode("1–2"));
        assert!(!is_valid_episode("Pilot"));
    }

    #[test]
    fn test_extract_derives_fields() {
        let data = InfoboxData::extract(&infobox(), "Spark of Rebellion");
        assert_eq!(data.season, Some(1));
        assert_eq!(data.se.as_deref(), Some("S1 E1-2"));
        assert!(!data.fields.contains_key("isbn"));
        assert_eq!(data.text("writerDetails"), Some("Simon Kinberg"));
        assert_eq!(data.cover_wook.as_deref(), Some("Spark of Rebellion.png"));
    }

    #[test]
    fn test_shorts_label() {
        assert_eq!(season_episode_label(Some(2), Some("shorts"), Some("3")).as_deref(), Some("S2-shorts E3"));
        assert_eq!(season_episode_label(None, None, None), None);
    }

    #[rstest]
    #[case("book series", MediaType::Book)]
    #[case("comic series", MediaType::Comic)]
    #[case("movie", MediaType::Film)]
    #[case("television series", MediaType::Tv)]
    #[case("comic story arc", MediaType::Comic)]
    #[case("magazine", MediaType::Comic)]
    fn test_series_type_table(#[case] kind: &str, #[case] expected: MediaType) {
        assert_eq!(series_type_for("X", kind).unwrap(), expected);
    }

    #[test]
    fn test_series_type_unknown_is_error() {
        assert!(matches!(
            series_type_for("X", "toy line"),
            Err(ChronicleError::UnknownInfobox { ref kind, .. }) if kind == "toy line"
        ));
        assert!(series_type_for("X", "television episode").is_err());
    }

    #[test]
    fn test_infobox_kind_round_trip_names() {
        for (kind, name) in InfoboxKind::ALL {
            assert_eq!(name.parse::<InfoboxKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), name);
        }
    }
}
