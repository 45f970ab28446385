//! Lazy, forward-only listing of one prefix, page by page.

use log::{debug, warn};
use std::iter::FusedIterator;
use std::sync::Arc;

use crate::engine::retry::{Attempt, RetryPolicy, with_retry};
use crate::error::IngestError;
use crate::store::SourceStore;
use crate::types::{ContinuationCursor, ListingPage};

enum CursorState {
    Start,
    Next(ContinuationCursor),
    Exhausted,
}

/// Pages of one prefix, each requested with the previous page's cursor.
///
/// Not restartable: after the final page (or a fatal error) [`next_page`](Self::next_page)
/// returns [`IngestError::EnumeratorExhausted`] and the iterator yields `None`.
pub struct SourceEnumerator {
    source: Arc<dyn SourceStore>,
    prefix: String,
    page_size: usize,
    retry: RetryPolicy,
    state: CursorState,
    pages: usize,
    objects: usize,
}

impl SourceEnumerator {
    pub fn new(
        source: Arc<dyn SourceStore>,
        prefix: impl Into<String>,
        page_size: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            prefix: prefix.into(),
            page_size: page_size.max(1),
            retry,
            state: CursorState::Start,
            pages: 0,
            objects: 0,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn pages_listed(&self) -> usize {
        self.pages
    }

    pub fn objects_listed(&self) -> usize {
        self.objects
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, CursorState::Exhausted)
    }

    /// Fetch the next page, retrying transient listing errors per the policy.
    pub fn next_page(&mut self) -> Result<ListingPage, IngestError> {
        let cursor = match &self.state {
            CursorState::Start => None,
            CursorState::Next(c) => Some(c.clone()),
            CursorState::Exhausted => {
                return Err(IngestError::EnumeratorExhausted {
                    prefix: self.prefix.clone(),
                });
            }
        };

        let source = &self.source;
        let prefix = &self.prefix;
        let page_size = self.page_size;
        let label = format!("list {prefix}");
        let listed = with_retry(&self.retry, &label, |attempt| {
            match source.list_page(prefix, cursor.as_ref(), page_size) {
                Ok(page) => Attempt::Done(page),
                Err(e) if e.is_transient() => {
                    warn!("Listing {} failed on attempt {}: {}", prefix, attempt, e);
                    Attempt::Retry {
                        error: e,
                        after: None,
                    }
                }
                Err(e) => Attempt::Fail(e),
            }
        });

        let page = match listed {
            Ok(page) => page,
            Err(failure) => {
                self.state = CursorState::Exhausted;
                return Err(IngestError::Enumeration {
                    prefix: self.prefix.clone(),
                    attempts: failure.attempts,
                    reason: failure.error.to_string(),
                });
            }
        };

        if let (Some(sent), Some(next)) = (&cursor, &page.continuation)
            && sent == next
        {
            self.state = CursorState::Exhausted;
            return Err(IngestError::Enumeration {
                prefix: self.prefix.clone(),
                attempts: 1,
                reason: format!("listing did not advance past cursor '{}'", sent.as_str()),
            });
        }

        self.pages += 1;
        self.objects += page.len();
        debug!(
            "Listed page {} of {}: {} object(s){}",
            self.pages,
            self.prefix,
            page.len(),
            if page.is_final() { " (final)" } else { "" }
        );
        self.state = match &page.continuation {
            Some(c) => CursorState::Next(c.clone()),
            None => CursorState::Exhausted,
        };
        Ok(page)
    }
}

impl Iterator for SourceEnumerator {
    type Item = Result<ListingPage, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_exhausted() {
            return None;
        }
        Some(self.next_page())
    }
}

impl FusedIterator for SourceEnumerator {}
