//! # Profile Store
//!
//! Identity+ordinal-indexed storage of profile records.
//!
//! ## Layout
//!
//! ```text
//! TaskId ──hash──► shard[i] ─┬─ counts:  TaskId     → last ordinal
//!                            └─ records: ProfileKey → Arc<Mutex<ProfileRecord>>
//! ```
//!
//! Every key of one task lives in the same shard, so reserving the next
//! ordinal and inserting the record under it happen under one lock: no
//! caller can observe the count ahead of the record, and two concurrent
//! creations never share an ordinal. Distinct tasks spread over the shards,
//! which keeps contention low when many application threads fire events at
//! once.
//!
//! ## Transactions
//!
//! [`ProfileStore::slot`] locks the shard of one task and returns a
//! [`TaskSlot`]; the correlator uses it to make its whole read-decide-write
//! step for an event atomic with respect to other events for that task.

use log::warn;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{ExecutionOrdinal, ProfileKey, TaskId};
use crate::profile::{ProfileMode, ProfileRecord};

/// Default number of shards
const DEFAULT_SHARDS: usize = 64;

/// Shared handle to one stored record
pub type ProfileHandle<M> = Arc<Mutex<ProfileRecord<M>>>;

struct Shard<M> {
    counts: HashMap<TaskId, ExecutionOrdinal>,
    records: HashMap<ProfileKey, ProfileHandle<M>>,
}

impl<M> Default for Shard<M> {
    fn default() -> Self {
        Self { counts: HashMap::new(), records: HashMap::new() }
    }
}

/// Concurrent store of profile records keyed by (task, ordinal)
pub struct ProfileStore<M> {
    shards: Box<[Mutex<Shard<M>>]>,
}

impl<M: ProfileMode> Default for ProfileStore<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ProfileMode> ProfileStore<M> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Create a store with `n` shards (at least one)
    #[must_use]
    pub fn with_shards(n: usize) -> Self {
        let shards = (0..n.max(1)).map(|_| Mutex::new(Shard::default())).collect();
        Self { shards }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn shard_index(&self, task: TaskId) -> usize {
        // Fibonacci hashing spreads sequential ids across shards
        let mixed = task.0.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32;
        (mixed as usize) % self.shards.len()
    }

    /// Lock the shard holding `task` for a multi-step operation
    pub fn slot(&self, task: TaskId) -> TaskSlot<'_, M> {
        TaskSlot { task, shard: self.shards[self.shard_index(task)].lock() }
    }

    /// Allocate a fresh record at ordinal `count(task) + 1`
    ///
    /// Returns `None` once the task has used up every ordinal.
    pub fn create(&self, task: TaskId, class_name: &str) -> Option<ProfileHandle<M>> {
        self.slot(task).create(class_name)
    }

    /// Look up a record; `None` for ordinal 0, past the count, or unknown tasks
    #[must_use]
    pub fn get(&self, task: TaskId, ordinal: u32) -> Option<ProfileHandle<M>> {
        self.slot(task).get(ordinal)
    }

    /// The most recently created record for `task`
    #[must_use]
    pub fn get_last(&self, task: TaskId) -> Option<ProfileHandle<M>> {
        self.slot(task).get_last()
    }

    /// Number of records created for `task`, `None` if it has none
    #[must_use]
    pub fn count(&self, task: TaskId) -> Option<u32> {
        self.slot(task).count()
    }

    /// Total number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().records.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every stored record
    ///
    /// Records come back sorted by (task, ordinal). The store is left empty,
    /// so a second drain returns nothing. Handles still held elsewhere keep
    /// working but are no longer reachable through the store.
    pub fn drain(&self) -> Vec<ProfileRecord<M>> {
        let mut drained: Vec<(ProfileKey, ProfileRecord<M>)> = Vec::new();

        for shard in &*self.shards {
            let mut shard = shard.lock();
            shard.counts.clear();
            drained.extend(shard.records.drain().map(|(key, handle)| (key, take_record(handle))));
        }

        drained.sort_unstable_by_key(|(key, _)| *key);
        drained.into_iter().map(|(_, record)| record).collect()
    }
}

fn take_record<M: Clone>(handle: ProfileHandle<M>) -> ProfileRecord<M> {
    match Arc::try_unwrap(handle) {
        Ok(mutex) => mutex.into_inner(),
        Err(shared) => {
            let guard = shared.lock();
            guard.clone()
        }
    }
}

/// Exclusive view of one task's records
///
/// Holds the shard lock for as long as it lives; keep it short and never
/// open a second slot while holding one.
pub struct TaskSlot<'a, M> {
    task: TaskId,
    shard: MutexGuard<'a, Shard<M>>,
}

impl<M: ProfileMode> TaskSlot<'_, M> {
    #[must_use]
    pub fn task(&self) -> TaskId {
        self.task
    }

    #[must_use]
    pub fn count(&self) -> Option<u32> {
        self.shard.counts.get(&self.task).map(|o| o.get())
    }

    #[must_use]
    pub fn get(&self, ordinal: u32) -> Option<ProfileHandle<M>> {
        let ordinal = ExecutionOrdinal::new(ordinal)?;
        self.shard.records.get(&ProfileKey::new(self.task, ordinal)).cloned()
    }

    #[must_use]
    pub fn get_last(&self) -> Option<ProfileHandle<M>> {
        self.get(self.count()?)
    }

    /// Reserve `count + 1` for this task. Only called by `insert_with`, so
    /// the reservation is always followed by an insertion under the same
    /// lock. `None` when the ordinal space is exhausted; the count is left
    /// untouched so the last record is never overwritten.
    fn next_ordinal(&mut self) -> Option<ExecutionOrdinal> {
        let next = match self.shard.counts.get(&self.task) {
            Some(last) => last.next()?,
            None => ExecutionOrdinal::FIRST,
        };
        self.shard.counts.insert(self.task, next);
        Some(next)
    }

    /// Allocate a prefilled record at the next ordinal
    pub fn create(&mut self, class_name: &str) -> Option<ProfileHandle<M>> {
        self.insert_with(|ordinal| ProfileRecord::prefilled(class_name, ordinal))
    }

    /// Allocate a record at the next ordinal whose mode fields are a
    /// [`ProfileMode::clone_identity`] of `source`
    pub fn create_cloned(&mut self, source: &ProfileRecord<M>) -> Option<ProfileHandle<M>> {
        self.insert_with(|ordinal| {
            let mut record = ProfileRecord::prefilled(&source.class_name, ordinal);
            record.mode = source.mode.clone_identity();
            record
        })
    }

    /// The last record, creating the first one if the task has none
    pub fn get_or_create_last(&mut self, class_name: &str) -> Option<ProfileHandle<M>> {
        match self.get_last() {
            Some(handle) => Some(handle),
            None => self.create(class_name),
        }
    }

    fn insert_with(
        &mut self,
        build: impl FnOnce(ExecutionOrdinal) -> ProfileRecord<M>,
    ) -> Option<ProfileHandle<M>> {
        let Some(ordinal) = self.next_ordinal() else {
            warn!("{} has no ordinals left, dropping profile", self.task);
            return None;
        };
        let handle = Arc::new(Mutex::new(build(ordinal)));
        self.shard.records.insert(ProfileKey::new(self.task, ordinal), Arc::clone(&handle));
        Some(handle)
    }

    /// Pretend `ordinal` profiles already exist for this task
    #[cfg(test)]
    pub(crate) fn set_count(&mut self, ordinal: ExecutionOrdinal) {
        self.shard.counts.insert(self.task, ordinal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::CallingContextProfile;

    type Store = ProfileStore<CallingContextProfile>;

    #[test]
    fn test_unknown_task_is_absent() {
        let store = Store::new();
        assert_eq!(store.count(TaskId(1)), None);
        assert!(store.get_last(TaskId(1)).is_none());
        assert!(store.get(TaskId(1), 1).is_none());
    }

    #[test]
    fn test_create_assigns_dense_ordinals() {
        let store = Store::new();
        for expected in 1..=3 {
            let handle = store.create(TaskId(9), "Job").unwrap();
            assert_eq!(handle.lock().exec_number.get(), expected);
            assert_eq!(store.count(TaskId(9)), Some(expected));
        }
        assert!(store.get(TaskId(9), 0).is_none());
        assert!(store.get(TaskId(9), 4).is_none());
        for k in 1..=3 {
            assert!(store.get(TaskId(9), k).is_some(), "ordinal {k} should be present");
        }
    }

    #[test]
    fn test_create_prefills_class_name() {
        let store = Store::new();
        let handle = store.create(TaskId(2), "demo::Job").unwrap();
        assert_eq!(handle.lock().class_name, "demo::Job");
    }

    #[test]
    fn test_get_last_returns_newest() {
        let store = Store::new();
        store.create(TaskId(4), "Job");
        let second = store.create(TaskId(4), "Job").unwrap();
        let last = store.get_last(TaskId(4)).unwrap();
        assert!(Arc::ptr_eq(&second, &last));
    }

    #[test]
    fn test_get_or_create_last_reuses_existing() {
        let store = Store::new();
        let first = store.slot(TaskId(5)).get_or_create_last("Job").unwrap();
        let again = store.slot(TaskId(5)).get_or_create_last("Job").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(store.count(TaskId(5)), Some(1));
    }

    #[test]
    fn test_single_shard_keeps_tasks_apart() {
        let store = Store::with_shards(1);
        store.create(TaskId(1), "A");
        store.create(TaskId(2), "B");
        store.create(TaskId(2), "B");
        assert_eq!(store.count(TaskId(1)), Some(1));
        assert_eq!(store.count(TaskId(2)), Some(2));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_drain_empties_store() {
        let store = Store::new();
        for id in 0..10 {
            store.create(TaskId(id), "Job");
        }
        let drained = store.drain();
        assert_eq!(drained.len(), 10);
        assert!(store.is_empty());
        assert!(store.drain().is_empty(), "second drain must be empty");
        assert_eq!(store.count(TaskId(0)), None);
    }

    #[test]
    fn test_concurrent_create_yields_distinct_ordinals() {
        let store = Store::new();
        store.create(TaskId(77), "Job");

        let mut ordinals: Vec<u32> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| store.create(TaskId(77), "Job").unwrap().lock().exec_number.get()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        ordinals.sort_unstable();
        assert_eq!(ordinals, (2..=17).collect::<Vec<_>>());
        assert_eq!(store.count(TaskId(77)), Some(17));
    }

    #[test]
    fn test_exhausted_ordinals_never_overwrite() {
        let store = Store::new();
        let last = {
            let mut slot = store.slot(TaskId(3));
            slot.set_count(ExecutionOrdinal::new(u32::MAX - 1).unwrap());
            slot.create("Job").unwrap()
        };
        assert_eq!(last.lock().exec_number, ExecutionOrdinal::MAX);
        last.lock().class_name = "kept".to_string();

        assert!(store.create(TaskId(3), "Job").is_none());
        assert!(store.slot(TaskId(3)).create_cloned(&last.lock().clone()).is_none());
        assert_eq!(store.count(TaskId(3)), Some(u32::MAX));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_last(TaskId(3)).unwrap().lock().class_name, "kept");
    }
}
