use crate::handle::Settle;
use crate::registry::JobId;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Maps every outstanding one-shot job to the completion it must reject on
/// cancellation. Entries live from registration until the job settles.
#[derive(Default)]
pub(crate) struct CancellationTable {
    entries: FxHashMap<JobId, Rc<dyn Settle>>,
}

impl CancellationTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: JobId, settle: Rc<dyn Settle>) {
        self.entries.insert(id, settle);
    }

    pub(crate) fn get(&self, id: JobId) -> Option<Rc<dyn Settle>> {
        self.entries.get(&id).cloned()
    }

    pub(crate) fn remove(&mut self, id: JobId) -> Option<Rc<dyn Settle>> {
        self.entries.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
