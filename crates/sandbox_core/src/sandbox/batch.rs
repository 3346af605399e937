//! Per-batch bookkeeping: item error tracking and the store update scope.

use super::{SandboxResult, StepError, StepResult};
use crate::model::item::{BatchResult, ItemError, ItemFailure, SandboxItem};
use crate::store::GraphStore;
use log::{error, warn};

/// Input items plus the first error attached to each.
pub(crate) struct ItemTracker {
    operation: &'static str,
    items: Vec<SandboxItem>,
    errors: Vec<Option<ItemError>>,
}

impl ItemTracker {
    pub(crate) fn new(operation: &'static str, items: Vec<SandboxItem>) -> Self {
        let errors = vec![None; items.len()];
        let mut tracker = Self {
            operation,
            items,
            errors,
        };
        for idx in 0..tracker.items.len() {
            if tracker.items[idx].target.element_id().trim().is_empty() {
                tracker.fail(idx, ItemError::MissingIdentifier);
            }
        }
        tracker
    }

    pub(crate) fn item(&self, idx: usize) -> &SandboxItem {
        &self.items[idx]
    }

    /// Indices without an attached error, in input order.
    pub(crate) fn pending(&self) -> Vec<usize> {
        (0..self.items.len())
            .filter(|idx| self.errors[*idx].is_none())
            .collect()
    }

    /// Subset of `indices` still without an attached error.
    pub(crate) fn pending_in(&self, indices: &[usize]) -> Vec<usize> {
        indices
            .iter()
            .copied()
            .filter(|idx| self.errors[*idx].is_none())
            .collect()
    }

    /// Attaches `err` unless the item already failed earlier.
    pub(crate) fn fail(&mut self, idx: usize, err: ItemError) {
        if self.errors[idx].is_some() {
            return;
        }
        warn!(
            "event=sandbox_item module=sandbox status=error operation={} element_id={} error_code={}",
            self.operation,
            self.items[idx].target.element_id(),
            err.code()
        );
        self.errors[idx] = Some(err);
    }

    /// Attaches item errors and surfaces fatal ones.
    pub(crate) fn settle<T>(&mut self, idx: usize, result: StepResult<T>) -> SandboxResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(StepError::Item(err)) => {
                self.fail(idx, err);
                Ok(None)
            }
            Err(StepError::Fatal(err)) => Err(err),
        }
    }

    pub(crate) fn into_result(self) -> BatchResult {
        let mut result = BatchResult::default();
        for (item, error) in self.items.into_iter().zip(self.errors) {
            match error {
                Some(error) => result.failures.push(ItemFailure::new(item, error)),
                None => result.succeeded += 1,
            }
        }
        result
    }
}

/// Store transaction scope; aborts on drop unless flushed.
pub(crate) struct UpdateBatch<'a> {
    store: &'a dyn GraphStore,
    finished: bool,
}

impl<'a> UpdateBatch<'a> {
    pub(crate) fn begin(store: &'a dyn GraphStore) -> SandboxResult<Self> {
        store.begin_batch()?;
        Ok(Self {
            store,
            finished: false,
        })
    }

    /// Commits the batch; a failed commit is rolled back on drop.
    pub(crate) fn flush(mut self) -> SandboxResult<()> {
        self.store.flush()?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for UpdateBatch<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.store.abort_batch() {
            error!("event=batch_abort module=sandbox status=error error={err}");
        }
    }
}
