//! Cursor-driven retrieval from the remote service.
//!
//! One page is in flight at a time: each request depends on the continuation
//! returned by the previous one. Every page is fully decoded (including any
//! nested block children) before it is yielded, so a failure never hands the
//! caller part of a page and the reported cursor always sits on a page
//! boundary.

pub mod cursor;
pub mod http;
pub mod retry;
pub mod source;
pub mod wire;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

pub use cursor::FetchCursor;
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use source::{SourceId, SourceKind};
pub use wire::RawPage;

use crate::notifetch::pipeline::error::{Result, ToolError};
use crate::notifetch::pipeline::model::{BlockContent, RemoteRecord};

/// Largest page size the remote service accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Which listing a page request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Rows of a database.
    DatabaseQuery,
    /// Child blocks of a page or block.
    BlockChildren,
}

/// One page request against the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub endpoint: Endpoint,
    pub id: &'a str,
    pub cursor: Option<&'a str>,
    pub page_size: u32,
}

/// The remote data service as seen by the fetcher.
pub trait RemoteService {
    /// Determines whether `id` names a database or a page.
    fn identify(&self, id: &SourceId) -> Result<SourceKind>;

    /// Performs a single page request.
    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<RawPage>;
}

/// Cooperative cancellation shared between a fetch and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the fetch to stop at the next page boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Knobs of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub page_size: u32,
    /// Pause between successive page requests.
    pub page_pause: Duration,
    pub retry: RetryPolicy,
    /// Fetch the block children of each database row. Has no effect when
    /// `max_block_depth` is zero.
    pub include_page_content: bool,
    /// How many levels of nested blocks are fetched below a record.
    pub max_block_depth: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            page_pause: Duration::from_millis(100),
            retry: RetryPolicy::default(),
            include_page_content: false,
            max_block_depth: 2,
        }
    }
}

/// How a drained fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Complete,
    Cancelled,
}

/// Records of a drained fetch and where it stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub records: Vec<RemoteRecord>,
    pub cursor: FetchCursor,
    pub status: FetchStatus,
}

/// Drives paginated retrieval for one source.
pub struct Fetcher<'a> {
    service: &'a dyn RemoteService,
    sleeper: &'a dyn Sleeper,
    options: FetchOptions,
    cancel: CancelFlag,
}

impl<'a> Fetcher<'a> {
    pub fn new(service: &'a dyn RemoteService, sleeper: &'a dyn Sleeper, options: FetchOptions) -> Self {
        let page_size = options.page_size.clamp(1, MAX_PAGE_SIZE);
        Self {
            service,
            sleeper,
            options: FetchOptions {
                page_size,
                ..options
            },
            cancel: CancelFlag::default(),
        }
    }

    /// Shares a cancellation flag with the caller.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolves the kind of a source, retrying transient failures.
    pub fn identify(&self, source: &SourceId) -> Result<SourceKind> {
        self.options
            .retry
            .run(self.sleeper, "identify", || self.service.identify(source))
    }

    /// Lazily yields pages of records, starting at `cursor` (or the
    /// beginning).
    pub fn pages(
        &self,
        source: &SourceId,
        kind: SourceKind,
        cursor: Option<FetchCursor>,
    ) -> FetchPages<'_, 'a> {
        FetchPages {
            fetcher: self,
            source: source.to_string(),
            kind,
            cursor: cursor.unwrap_or_default(),
            pages_fetched: 0,
            finished: false,
            cancelled: false,
        }
    }

    /// Drains [`Fetcher::pages`]. Errors arrive as
    /// [`ToolError::FetchInterrupted`] carrying the cursor to resume from;
    /// records fetched before the error are dropped, so callers that want to
    /// keep them use [`Fetcher::fetch_into`].
    pub fn fetch_all(
        &self,
        source: &SourceId,
        kind: SourceKind,
        cursor: Option<FetchCursor>,
    ) -> Result<FetchOutcome> {
        let mut records = Vec::new();
        let (cursor, status) = self.fetch_into(source, kind, cursor, &mut records)?;
        Ok(FetchOutcome {
            records,
            cursor,
            status,
        })
    }

    /// Drains [`Fetcher::pages`] into `records`, page by page. On error the
    /// records of every completed page are already in `records` and the
    /// error's cursor points just past them.
    #[instrument(
        level = "info",
        skip_all,
        fields(source = %source, kind = %kind)
    )]
    pub fn fetch_into(
        &self,
        source: &SourceId,
        kind: SourceKind,
        cursor: Option<FetchCursor>,
        records: &mut Vec<RemoteRecord>,
    ) -> Result<(FetchCursor, FetchStatus)> {
        let mut pages = self.pages(source, kind, cursor);
        for page in pages.by_ref() {
            records.extend(page?);
        }

        let status = if pages.was_cancelled() {
            FetchStatus::Cancelled
        } else {
            FetchStatus::Complete
        };
        info!(record_count = records.len(), ?status, "fetch finished");
        Ok((pages.cursor().clone(), status))
    }

    /// Fetches one page at `cursor` and decodes it into records. Returns the
    /// records and the continuation for the next page.
    fn fetch_batch(
        &self,
        source: &str,
        kind: SourceKind,
        cursor: &FetchCursor,
    ) -> Result<(Vec<RemoteRecord>, Option<String>)> {
        let endpoint = match kind {
            SourceKind::Database => Endpoint::DatabaseQuery,
            SourceKind::Page => Endpoint::BlockChildren,
        };
        let request = PageRequest {
            endpoint,
            id: source,
            cursor: cursor.token(),
            page_size: self.options.page_size,
        };
        let page = self
            .options
            .retry
            .run(self.sleeper, "page", || self.service.fetch_page(&request))?;

        let mut records = Vec::with_capacity(page.results.len());
        for value in &page.results {
            let record = match kind {
                SourceKind::Database => {
                    let mut record = wire::decode_record(value)?;
                    if self.options.include_page_content && self.options.max_block_depth > 0 {
                        record.children = self.fetch_children(&record.id, 1)?;
                    }
                    record
                }
                SourceKind::Page => {
                    let mut block = wire::decode_block(value)?;
                    if block.has_children && self.options.max_block_depth > 0 {
                        block.children = self.fetch_children(&block.id, 1)?;
                    }
                    wire::block_record(block, value)
                }
            };
            records.push(record);
        }

        Ok((records, page.continuation()))
    }

    /// Fetches all child blocks of `parent`, descending while `depth` is
    /// within the configured limit.
    fn fetch_children(&self, parent: &str, depth: usize) -> Result<Vec<BlockContent>> {
        let mut children = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let request = PageRequest {
                endpoint: Endpoint::BlockChildren,
                id: parent,
                cursor: token.as_deref(),
                page_size: self.options.page_size,
            };
            let page = self
                .options
                .retry
                .run(self.sleeper, "children", || self.service.fetch_page(&request))?;

            for value in &page.results {
                let mut block = wire::decode_block(value)?;
                if block.has_children && depth < self.options.max_block_depth {
                    block.children = self.fetch_children(&block.id, depth + 1)?;
                }
                children.push(block);
            }

            match page.continuation() {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(parent, depth, child_count = children.len(), "fetched child blocks");
        Ok(children)
    }
}

/// Lazy sequence of record batches, one per remote page.
///
/// Iteration ends after the last page, after a cancellation, or after the
/// first error. The error is yielded once as
/// [`ToolError::FetchInterrupted`].
pub struct FetchPages<'f, 'a> {
    fetcher: &'f Fetcher<'a>,
    source: String,
    kind: SourceKind,
    cursor: FetchCursor,
    pages_fetched: usize,
    finished: bool,
    cancelled: bool,
}

impl FetchPages<'_, '_> {
    /// Position after the last page yielded.
    pub fn cursor(&self) -> &FetchCursor {
        &self.cursor
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Iterator for FetchPages<'_, '_> {
    type Item = Result<Vec<RemoteRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.cursor.is_exhausted() {
            return None;
        }

        if self.fetcher.cancel.is_cancelled() {
            info!(retrieved = self.cursor.retrieved(), "fetch cancelled at page boundary");
            self.finished = true;
            self.cancelled = true;
            return None;
        }

        let pause = self.fetcher.options.page_pause;
        if self.pages_fetched > 0 && !pause.is_zero() {
            self.fetcher.sleeper.sleep(pause);
        }

        match self
            .fetcher
            .fetch_batch(&self.source, self.kind, &self.cursor)
        {
            Ok((records, next)) => {
                self.cursor = self.cursor.advance(next, records.len());
                self.pages_fetched += 1;
                debug!(
                    page = self.pages_fetched,
                    batch = records.len(),
                    retrieved = self.cursor.retrieved(),
                    "page fetched"
                );
                Some(Ok(records))
            }
            Err(error) => {
                warn!(retrieved = self.cursor.retrieved(), %error, "fetch stopped");
                self.finished = true;
                Some(Err(ToolError::FetchInterrupted {
                    cursor: self.cursor.clone(),
                    source: Box::new(error),
                }))
            }
        }
    }
}
