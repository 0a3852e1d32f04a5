// src/ingest/paginate.rs
//! Generic page driver shared by all market sources.
//!
//! A source only knows how to fetch one page for a given cursor and how to
//! turn one raw record into a [`NormalizedPrediction`]. The driver owns the
//! loop: it advances the cursor, stops on exhaustion, and turns any page error
//! into an early, non-fatal stop.

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;

use crate::ingest::types::{NormalizedPrediction, SourceFetcher};

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// First page of a cursor-paginated source (no token yet).
    Start,
    /// Server-issued continuation token.
    Token(String),
    /// Record offset for offset-paginated sources.
    Offset(usize),
}

/// One fetched page. `next == None` means the server signalled exhaustion.
#[derive(Debug)]
pub struct Page<R> {
    pub records: Vec<R>,
    pub next: Option<PageCursor>,
}

#[async_trait]
pub trait PagedSource: Send + Sync {
    type Record: Send;

    fn name(&self) -> &'static str;
    fn first_cursor(&self) -> PageCursor;
    async fn fetch_page(&self, cursor: &PageCursor) -> Result<Page<Self::Record>>;
    /// Map one raw record; `None` skips it (missing id/title etc.).
    fn normalize(&self, record: Self::Record) -> Option<NormalizedPrediction>;
}

/// Drain a source page by page.
///
/// Stops when the server returns no continuation, an empty page, a cursor
/// that does not move, or when `page_limit` is set and the accumulated count
/// exceeds it. A page error stops pagination and keeps what was collected.
pub async fn paginate<S: PagedSource + ?Sized>(
    source: &S,
    page_limit: Option<usize>,
) -> Vec<NormalizedPrediction> {
    let name = source.name();
    let mut cursor = source.first_cursor();
    let mut out = Vec::new();
    let mut skipped = 0usize;
    let mut pages = 0usize;

    loop {
        tracing::debug!(source = name, ?cursor, accumulated = out.len(), "fetching page");

        let page = match source.fetch_page(&cursor).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(
                    source = name,
                    error = ?e,
                    accumulated = out.len(),
                    "stopping pagination after page error"
                );
                counter!("ingest_provider_errors_total", "source" => name).increment(1);
                break;
            }
        };
        pages += 1;
        counter!("ingest_pages_total", "source" => name).increment(1);

        let raw_count = page.records.len();
        for record in page.records {
            match source.normalize(record) {
                Some(p) => out.push(p),
                None => skipped += 1,
            }
        }

        if let Some(limit) = page_limit {
            if out.len() > limit {
                tracing::info!(source = name, limit, accumulated = out.len(), "fast exit");
                break;
            }
        }

        match page.next {
            Some(next) if raw_count > 0 && next != cursor => cursor = next,
            _ => break,
        }
    }

    counter!("ingest_records_total", "source" => name).increment(out.len() as u64);
    counter!("ingest_skipped_total", "source" => name).increment(skipped as u64);
    tracing::info!(source = name, pages, fetched = out.len(), skipped, "source drained");
    out
}

/// Adapter turning any [`PagedSource`] into a [`SourceFetcher`].
pub struct Paginated<S> {
    source: S,
    page_limit: Option<usize>,
}

impl<S: PagedSource> Paginated<S> {
    pub fn new(source: S, page_limit: Option<usize>) -> Self {
        Self { source, page_limit }
    }
}

#[async_trait]
impl<S: PagedSource> SourceFetcher for Paginated<S> {
    async fn fetch(&self) -> Vec<NormalizedPrediction> {
        paginate(&self.source, self.page_limit).await
    }

    fn name(&self) -> &'static str {
        self.source.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted source: page `i` is `pages[i]`; `None` entries fail.
    struct Scripted {
        pages: Vec<Option<Vec<&'static str>>>,
        calls: AtomicUsize,
        token_mode: bool,
    }

    impl Scripted {
        fn offsets(pages: Vec<Option<Vec<&'static str>>>) -> Self {
            Self {
                pages,
                calls: AtomicUsize::new(0),
                token_mode: false,
            }
        }
        fn tokens(pages: Vec<Option<Vec<&'static str>>>) -> Self {
            Self {
                pages,
                calls: AtomicUsize::new(0),
                token_mode: true,
            }
        }
    }

    #[async_trait]
    impl PagedSource for Scripted {
        type Record = &'static str;

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn first_cursor(&self) -> PageCursor {
            if self.token_mode {
                PageCursor::Start
            } else {
                PageCursor::Offset(0)
            }
        }

        async fn fetch_page(&self, cursor: &PageCursor) -> Result<Page<&'static str>> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let records = self
                .pages
                .get(i)
                .cloned()
                .unwrap_or_else(|| Some(vec![]))
                .ok_or_else(|| anyhow!("boom on page {i}"))?;
            let next = if self.token_mode {
                (i + 1 < self.pages.len()).then(|| PageCursor::Token(format!("t{}", i + 1)))
            } else {
                match cursor {
                    PageCursor::Offset(o) => Some(PageCursor::Offset(o + records.len())),
                    _ => None,
                }
            };
            Ok(Page { records, next })
        }

        fn normalize(&self, record: &'static str) -> Option<NormalizedPrediction> {
            // "!" marks a malformed record
            (record != "!").then(|| NormalizedPrediction {
                id: format!("s-{record}"),
                title: record.to_string(),
                bets: vec![],
                url: None,
            })
        }
    }

    #[tokio::test]
    async fn offset_source_stops_on_empty_page() {
        let src = Scripted::offsets(vec![Some(vec!["a", "b"]), Some(vec!["c"]), Some(vec![])]);
        let out = paginate(&src, None).await;
        assert_eq!(out.len(), 3);
        assert_eq!(src.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn token_source_stops_when_token_absent() {
        let src = Scripted::tokens(vec![Some(vec!["a"]), Some(vec!["b", "c"])]);
        let out = paginate(&src, None).await;
        let ids: Vec<_> = out.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["s-a", "s-b", "s-c"]);
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn page_error_keeps_accumulated_records() {
        let src = Scripted::offsets(vec![Some(vec!["a", "b"]), None, Some(vec!["never"])]);
        let out = paginate(&src, None).await;
        assert_eq!(out.len(), 2);
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn error_on_first_page_yields_empty() {
        let src = Scripted::tokens(vec![None]);
        assert!(paginate(&src, None).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_records_are_excluded_from_count() {
        let src = Scripted::offsets(vec![Some(vec!["a", "!", "b"]), Some(vec!["!", "c"])]);
        let out = paginate(&src, None).await;
        assert_eq!(out.len(), 3);
    }

    #[tokio::test]
    async fn page_limit_exits_early() {
        let src = Scripted::offsets(vec![
            Some(vec!["a", "b"]),
            Some(vec!["c", "d"]),
            Some(vec!["e", "f"]),
        ]);
        let out = paginate(&src, Some(2)).await;
        assert_eq!(out.len(), 4);
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }
}
