//! Process-wide handle to the current dataset index snapshot.
//!
//! Query handling calls [`IndexHandle::snapshot`] once and works against that
//! `Arc` until the query completes. The harvesting side builds a complete new
//! index and calls [`IndexHandle::publish`]; in-flight queries keep reading the
//! snapshot they started with, so no reader ever sees a half-updated record.

use std::sync::{Arc, RwLock};
use tracing::info;

use crate::traits::DatasetIndex;

pub struct IndexHandle {
    current: RwLock<Arc<dyn DatasetIndex>>,
}

impl IndexHandle {
    pub fn new(index: Arc<dyn DatasetIndex>) -> Self {
        Self { current: RwLock::new(index) }
    }

    pub fn snapshot(&self) -> Arc<dyn DatasetIndex> {
        // A poisoned lock still holds a complete Arc; readers keep going.
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn publish(&self, next: Arc<dyn DatasetIndex>) {
        let records = next.len();
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        info!(records, "published new dataset index snapshot");
    }
}
