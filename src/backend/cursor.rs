//! Server-side cursor bookkeeping for the embedded backends

use super::{CursorBatch, Document};
use crate::error::{ClientError, Result};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

struct OpenCursor {
    index: String,
    total: u64,
    pending: VecDeque<Document>,
}

/// Open cursors keyed by id.
///
/// A cursor holds the remaining matches of the query that opened it and is
/// removed once its last batch has been read. Matches are materialized when
/// the cursor opens, payloads included, so memory held by an embedded cursor
/// grows with the result set rather than with the batch size as it does for
/// a RediSearch cursor.
pub struct CursorRegistry {
    next_id: AtomicU64,
    open: DashMap<u64, OpenCursor>,
}

impl CursorRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            open: DashMap::new(),
        }
    }

    /// Register matches and hand out the first batch
    pub fn open(
        &self,
        index: &str,
        total: u64,
        documents: Vec<Document>,
        batch_size: usize,
    ) -> CursorBatch {
        let mut pending: VecDeque<Document> = documents.into();
        let first = take_batch(&mut pending, batch_size);

        if pending.is_empty() {
            return CursorBatch {
                total,
                documents: first,
                cursor: None,
            };
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.open.insert(
            id,
            OpenCursor {
                index: index.to_string(),
                total,
                pending,
            },
        );

        CursorBatch {
            total,
            documents: first,
            cursor: Some(id),
        }
    }

    pub fn read(&self, index: &str, id: u64, batch_size: usize) -> Result<CursorBatch> {
        let (documents, total, exhausted) = {
            let mut cursor = self
                .open
                .get_mut(&id)
                .filter(|c| c.index == index)
                .ok_or_else(|| {
                    ClientError::Backend(format!("Cursor {} not found on index {}", id, index))
                })?;
            let documents = take_batch(&mut cursor.pending, batch_size);
            (documents, cursor.total, cursor.pending.is_empty())
        };

        if exhausted {
            self.open.remove(&id);
        }

        Ok(CursorBatch {
            total,
            documents,
            cursor: (!exhausted).then_some(id),
        })
    }

    /// Discard a cursor; `false` when it was already gone
    pub fn close(&self, index: &str, id: u64) -> bool {
        self.open.remove_if(&id, |_, c| c.index == index).is_some()
    }

    /// Drop every cursor opened on an index
    pub fn close_all(&self, index: &str) {
        self.open.retain(|_, c| c.index != index);
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

impl Default for CursorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn take_batch(pending: &mut VecDeque<Document>, batch_size: usize) -> Vec<Document> {
    let n = batch_size.max(1).min(pending.len());
    pending.drain(..n).collect()
}
