//! Parsed article access with a run-wide cache.
//!
//! [`Articles`] combines the batched [`ArticleSource`] with a
//! [`MarkupParser`] and an append-only cache keyed by canonical
//! (post-normalization) title, so a series article fetched while classifying
//! one episode is not fetched again for its siblings.
//!
//! Redirects are followed here, one hop at a time, stopping on a title that
//! was already visited.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;

use crate::document::{Document, MarkupParser};
use crate::fetch::{ArticleSource, PageProperties, PageResult, Transport};
use crate::{ChronicleError, Result};

/// Something that can hand out parsed articles by title.
pub trait DocumentLookup {
    /// The article for `title`, `None` when the page does not exist.
    fn document(&self, title: &str) -> impl Future<Output = Result<Option<Rc<Document>>>>;
}

/// Append-only article cache.
#[derive(Debug, Default)]
pub struct ArticleCache {
    docs: RefCell<HashMap<String, Option<Rc<Document>>>>,
    aliases: RefCell<HashMap<String, String>>,
}

impl ArticleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry for a canonical title or a requested alias of one.
    ///
    /// The outer `None` is a cache miss; `Some(None)` is a known missing page.
    pub fn get(&self, title: &str) -> Option<Option<Rc<Document>>> {
        let aliases = self.aliases.borrow();
        let key = aliases.get(title).map(String::as_str).unwrap_or(title);
        self.docs.borrow().get(key).cloned()
    }

    /// Records an article. Existing entries are never replaced.
    pub fn insert(&self, canonical: &str, doc: Option<Rc<Document>>) -> Option<Rc<Document>> {
        self.docs
            .borrow_mut()
            .entry(canonical.to_string())
            .or_insert(doc)
            .clone()
    }

    /// Remembers that `requested` normalizes to `canonical`.
    pub fn alias(&self, requested: &str, canonical: &str) {
        if requested != canonical {
            self.aliases
                .borrow_mut()
                .entry(requested.to_string())
                .or_insert_with(|| canonical.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.docs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.borrow().is_empty()
    }
}

/// A fetched page after redirect resolution.
#[derive(Debug, Clone)]
pub struct ResolvedPage {
    pub doc: Rc<Document>,
    /// At least one redirect was followed.
    pub redirected: bool,
}

/// Cached, parsed access to the article source.
pub struct Articles<T, P> {
    source: ArticleSource<T>,
    parser: P,
    cache: ArticleCache,
    redirects: Cell<usize>,
}

impl<T: Transport, P: MarkupParser> Articles<T, P> {
    pub fn new(source: ArticleSource<T>, parser: P) -> Self {
        Self { source, parser, cache: ArticleCache::new(), redirects: Cell::new(0) }
    }

    pub fn source(&self) -> &ArticleSource<T> {
        &self.source
    }

    pub fn cache(&self) -> &ArticleCache {
        &self.cache
    }

    /// Number of redirect hops followed so far.
    pub fn redirects(&self) -> usize {
        self.redirects.get()
    }

    /// Parses a fetched page and caches it under its canonical title.
    ///
    /// Returns `None` for a missing page.
    pub fn parse_page(&self, page: &PageResult) -> Result<Option<Rc<Document>>> {
        self.cache.alias(page.requested_title(), &page.title);
        if let Some(cached) = self.cache.get(&page.title) {
            return Ok(cached);
        }
        if page.missing {
            return Ok(self.cache.insert(&page.title, None));
        }

        let content = page.content.as_deref().unwrap_or("");
        let mut doc = self.parser.parse(&page.title, content)?;
        doc.title = page.title.clone();
        Ok(self.cache.insert(&page.title, Some(Rc::new(doc))))
    }

    /// Follows redirects from `doc` until a content page is reached.
    pub async fn resolve_redirects(&self, doc: Rc<Document>) -> Result<ResolvedPage> {
        let mut seen = HashSet::from([doc.title.clone()]);
        let mut current = doc;
        let mut redirected = false;

        while let Some(target) = current.redirect_target().map(str::to_string) {
            if !seen.insert(target.clone()) {
                return Err(ChronicleError::RedirectLoop(target));
            }
            tracing::info!(from = %current.title, to = %target, "Article is a redirect, fetching target");
            self.redirects.set(self.redirects.get() + 1);
            redirected = true;
            current = self
                .document(&target)
                .await?
                .ok_or(ChronicleError::MissingArticle(target))?;
        }

        Ok(ResolvedPage { doc: current, redirected })
    }

    /// Fetches, parses and redirect-resolves a page from a batch.
    ///
    /// Returns `None` for a missing page.
    pub async fn open(&self, page: &PageResult) -> Result<Option<ResolvedPage>> {
        match self.parse_page(page)? {
            Some(doc) => Ok(Some(self.resolve_redirects(doc).await?)),
            None => Ok(None),
        }
    }
}

impl<T: Transport, P: MarkupParser> DocumentLookup for Articles<T, P> {
    async fn document(&self, title: &str) -> Result<Option<Rc<Document>>> {
        if let Some(cached) = self.cache.get(title) {
            return Ok(cached);
        }
        let page = self.source.fetch_one(title, PageProperties::Content).await?;
        self.parse_page(&page)
    }
}
