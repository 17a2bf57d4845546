// flowline/src/pipeline/chain.rs

//! The append-only filter chain shared by all traversals of a pipeline.

use crate::core::describe::positional_label;
use crate::core::filter::FilterEntry;
use parking_lot::RwLock;
use std::sync::Arc;

pub(crate) struct FilterChain<T, E> {
  entries: RwLock<Vec<Arc<FilterEntry<T, E>>>>,
}

impl<T, E> FilterChain<T, E> {
  pub(crate) fn new() -> Self {
    Self {
      entries: RwLock::new(Vec::new()),
    }
  }

  /// Appends an entry and returns its 1-based position.
  pub(crate) fn append(&self, entry: FilterEntry<T, E>) -> usize {
    let mut entries = self.entries.write();
    entries.push(Arc::new(entry));
    entries.len()
  }

  /// Copies the current entries. A traversal works on its snapshot, so
  /// later appends never reach traversals that already started.
  pub(crate) fn snapshot(&self) -> Vec<Arc<FilterEntry<T, E>>> {
    self.entries.read().clone()
  }

  pub(crate) fn len(&self) -> usize {
    self.entries.read().len()
  }

  /// Display names in chain order, using positional labels for unnamed entries.
  pub(crate) fn display_names(&self) -> Vec<String> {
    self
      .entries
      .read()
      .iter()
      .enumerate()
      .map(|(idx, entry)| entry.name().map(str::to_string).unwrap_or_else(|| positional_label(idx + 1)))
      .collect()
  }
}
