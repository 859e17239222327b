//! Cover image metadata.
//!
//! Image bytes are never fetched here. For every draft with a `coverWook`
//! file name this stage asks the article source for the file's metadata,
//! names the catalog copy (`.webp`) and compares the upload timestamp against
//! the previous snapshot to decide whether the stored image is stale.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::draft::{DraftIndex, MediaDraft};
use crate::fetch::{ArticleSource, PageProperties, Transport};
use crate::Result;

const FILE_PREFIX: &str = "File:";

/// Cover fields stored with a media record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverInfo {
    /// Catalog file name, always with a `.webp` extension.
    pub cover: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_sha1: Option<String>,
    /// The stored image is missing or older than the source file.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cover_stale: bool,
}

/// Swaps the extension of a file name for `.webp`.
pub fn webp_name(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(pos) => &file_name[..pos],
        None => file_name,
    };
    format!("{}.webp", stem)
}

/// True when the image must be (re)acquired.
///
/// That is the case for new media, media stored without a cover, and covers
/// whose source file was uploaded after the stored one.
pub fn is_stale(previous: Option<&CoverInfo>, timestamp: Option<&str>) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    if previous.cover.is_empty() {
        return true;
    }
    match (previous.cover_timestamp.as_deref(), timestamp) {
        (Some(old), Some(new)) => old < new,
        (None, Some(_)) => true,
        _ => false,
    }
}

/// Fetches image metadata for every draft cover and attaches [`CoverInfo`].
///
/// `snapshot` maps media titles to the cover fields stored by the previous
/// run. Returns the number of stale covers.
pub async fn attach_covers<T: Transport>(
    source: &ArticleSource<T>, media: &mut DraftIndex<MediaDraft>, snapshot: &HashMap<String, CoverInfo>,
) -> Result<usize> {
    let mut by_file: HashMap<String, String> = HashMap::new();
    for draft in media.values() {
        if let Some(file) = &draft.info.cover_wook {
            by_file.insert(file.clone(), draft.title.clone());
        }
    }
    if by_file.is_empty() {
        return Ok(0);
    }

    let files: Vec<String> = by_file.keys().map(|f| format!("{}{}", FILE_PREFIX, f)).collect();
    tracing::info!(count = files.len(), "Fetching imageinfo");

    let mut stale = 0;
    let mut pages = source.fetch(&files, PageProperties::ImageInfo);
    while let Some(page) = pages.next().await {
        let page = page?;
        let requested = page.requested_title();
        let file = requested.strip_prefix(FILE_PREFIX).unwrap_or(requested);

        let Some(title) = by_file.get(file) else {
            tracing::warn!(file = %page.title, "Image info for a file no draft asked for");
            continue;
        };
        let Some(image) = page.image.as_ref().filter(|_| !page.missing) else {
            tracing::warn!(title = %title, file = %page.title, "Cover file has no image info");
            continue;
        };

        let returned = page.title.strip_prefix(FILE_PREFIX).unwrap_or(&page.title);
        let previous = snapshot.get(title);
        let cover_stale = is_stale(previous, image.timestamp.as_deref());
        if cover_stale {
            stale += 1;
            tracing::info!(title = %title, file = %returned, "Cover is new or updated");
        }

        let info = CoverInfo {
            cover: webp_name(returned),
            cover_url: image.url.clone(),
            cover_timestamp: image.timestamp.clone(),
            cover_sha1: image.sha1.clone(),
            cover_stale,
        };
        if let Some(draft) = media.get_mut(title) {
            draft.cover = Some(info);
        }
    }

    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{QueryRequest, QueryResponse};
    use crate::infobox::InfoboxData;
    use crate::timeline::{LegendCode, TimelineEntry};
    use rstest::rstest;

    struct Files;

    impl Transport for Files {
        async fn send(&self, request: &QueryRequest) -> Result<QueryResponse> {
            assert_eq!(request.properties, PageProperties::ImageInfo);
            let body = serde_json::json!({
                "query": {
                    "normalized": [{"from": "File:Spark_of_Rebellion.png", "to": "File:Spark of Rebellion.png"}],
                    "pages": {
                        "1": {
                            "pageid": 1,
                            "title": "File:Spark of Rebellion.png",
                            "imageinfo": [{
                                "url": "https://static.example/Spark.png",
                                "sha1": "abc",
                                "timestamp": "2024-05-01T00:00:00Z"
                            }]
                        }
                    }
                }
            });
            Ok(QueryResponse { status: 200, body: body.to_string() })
        }
    }

    fn media() -> DraftIndex<MediaDraft> {
        let mut draft = MediaDraft::from_entry(TimelineEntry {
            title: "Spark of Rebellion".to_string(),
            legend_code: LegendCode::Television,
            media_type: crate::draft::MediaType::Tv,
            preset_full_type: None,
            release_date: None,
            writers: Vec::new(),
            in_universe_date: None,
            date_ranges: Vec::new(),
            chronology: 0,
            notes: Vec::new(),
            adaptation: false,
            exact_placement_unknown: false,
            nopage: false,
        });
        draft.info = InfoboxData { cover_wook: Some("Spark_of_Rebellion.png".to_string()), ..Default::default() };
        let mut index = DraftIndex::new();
        index.insert(draft);
        index
    }

    #[rstest]
    #[case("Spark of Rebellion.png", "Spark of Rebellion.webp")]
    #[case("Cover.final.jpg", "Cover.final.webp")]
    #[case("NoExtension", "NoExtension.webp")]
    fn test_webp_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(webp_name(input), expected);
    }

    #[test]
    fn test_staleness() {
        let stored = CoverInfo {
            cover: "A.webp".to_string(),
            cover_timestamp: Some("2024-01-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        assert!(is_stale(None, Some("2024-01-01T00:00:00Z")));
        assert!(is_stale(Some(&CoverInfo::default()), None));
        assert!(is_stale(Some(&stored), Some("2024-02-01T00:00:00Z")));
        assert!(!is_stale(Some(&stored), Some("2024-01-01T00:00:00Z")));
    }

    #[test]
    fn test_attach_maps_normalized_file_back() {
        let source = ArticleSource::new(Files);
        let mut media = media();

        let stale = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(attach_covers(&source, &mut media, &HashMap::new()))
            .unwrap();

        assert_eq!(stale, 1);
        let cover = media.get("Spark of Rebellion").unwrap().cover.clone().unwrap();
        assert_eq!(cover.cover, "Spark of Rebellion.webp");
        assert_eq!(cover.cover_sha1.as_deref(), Some("abc"));
        assert!(cover.cover_stale);
    }

    #[test]
    fn test_attach_up_to_date_cover() {
        let source = ArticleSource::new(Files);
        let mut media = media();
        let snapshot = HashMap::from([(
            "Spark of Rebellion".to_string(),
            CoverInfo {
                cover: "Spark of Rebellion.webp".to_string(),
                cover_timestamp: Some("2024-05-01T00:00:00Z".to_string()),
                ..Default::default()
            },
        )]);

        let stale = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(attach_covers(&source, &mut media, &snapshot))
            .unwrap();

        assert_eq!(stale, 0);
        assert!(!media.get("Spark of Rebellion").unwrap().cover.as_ref().unwrap().cover_stale);
    }
}
