pub mod articles;
pub mod ast;
pub mod classify;
pub mod covers;
pub mod date;
pub mod document;
pub mod draft;
pub mod error;
pub mod fetch;
pub mod infobox;
pub mod pipeline;
pub mod sink;
pub mod suppress;
pub mod timeline;

pub use articles::{ArticleCache, Articles, DocumentLookup, ResolvedPage};
pub use ast::{FieldData, normalize};
pub use classify::{Audience, Classifier, Diagnostic, DiagnosticKind, TvTypeCache, refine_young_reader_series};
pub use covers::{CoverInfo, attach_covers};
pub use date::{DateRange, parse_date};
pub use document::{Document, FieldValue, Infobox, Link, MarkupParser, Node, PreparsedJson, Sentence};
pub use draft::{DraftIndex, FullType, MediaDraft, MediaType, SeriesDraft, Titled};
pub use error::{ChronicleError, Result};
#[cfg(feature = "fetch")]
pub use fetch::HttpTransport;
pub use fetch::{ArticleSource, FetchConfig, FetchStats, PageProperties, PageResult, PageStream, Transport};
#[doc(hidden)]
pub use fetch::{QueryRequest, QueryResponse, parse_response};
pub use infobox::{FieldSpec, InfoboxData, InfoboxKind, MEDIA_FIELDS, parse_season, resolve};
pub use pipeline::{MissingArticlePolicy, Pipeline, PipelineConfig, PipelineConfigBuilder, RunReport};
pub use sink::{CatalogSink, MemorySink};
pub use suppress::{Heuristic, SuppressList, SuppressLoader, SuppressLoaderBuilder, SuppressParser};
pub use timeline::{LegendCode, TimelineEntry, scan_timeline};
