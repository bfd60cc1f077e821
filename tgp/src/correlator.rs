//! # Lifecycle Correlation
//!
//! Merges the three independently arriving event kinds of a task into its
//! profiles.
//!
//! ## Event Routing
//!
//! - **creation** → last profile of the task (created if none)
//! - **submission** → last profile of the task (created if none)
//! - **execution** → one of three cases:
//!   - *A* no profile yet: create one
//!   - *B* exactly one profile, not executed yet: reuse it
//!   - *C* otherwise: re-execution, clone the creation fields of the last
//!     profile into a new one
//!
//! Creation and submission never fabricate a second profile, so the six
//! possible arrival orders of create/submit/execute for a single execution
//! all end in one profile holding all three payloads.
//!
//! Each event runs its whole resolve-and-write step under the store slot of
//! its task, so concurrent events for the same task serialize while events
//! for other tasks proceed in parallel.
//!
//! ## Dropped Events
//!
//! Events without a task, all events while the [`ProfileToggle`] is off, and
//! events for a task that has used up every execution ordinal are dropped
//! silently. Profiling never fails the caller.

use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::{ProfileKey, TaskRef};
use crate::profile::{CallingContextProfile, GranularityProfile, ProfileMode, ProfileRecord};
use crate::store::{ProfileHandle, ProfileStore, TaskSlot};

/// Process-wide switch consulted before any event is recorded
///
/// Enabled by default. Disable it to skip warm-up phases, then enable it
/// when measurement should start.
#[derive(Debug)]
pub struct ProfileToggle(AtomicBool);

impl ProfileToggle {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self(AtomicBool::new(enabled))
    }

    pub fn enable(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for ProfileToggle {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Which branch an execution event took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionCase {
    /// No profile existed; a new one was created
    Fresh,
    /// The single existing profile had no execution yet
    FirstExecution,
    /// The task ran before; a cloned profile was appended
    ReExecution,
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorStats {
    /// Events written into a profile
    pub recorded: u64,
    /// Events dropped (no task, or profiling disabled)
    pub dropped: u64,
    /// Execution events that appended a profile for an already executed task
    pub re_executions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    recorded: AtomicU64,
    dropped: AtomicU64,
    re_executions: AtomicU64,
}

/// Correlates task lifecycle events into profiles of mode `M`
pub struct LifecycleCorrelator<M: ProfileMode> {
    store: ProfileStore<M>,
    toggle: Arc<ProfileToggle>,
    counters: Counters,
}

/// Correlator for granularity profiling
pub type GranularityCorrelator = LifecycleCorrelator<GranularityProfile>;

/// Correlator for calling-context profiling
pub type CallingContextCorrelator = LifecycleCorrelator<CallingContextProfile>;

impl<M: ProfileMode> Default for LifecycleCorrelator<M> {
    fn default() -> Self {
        Self::new(Arc::new(ProfileToggle::default()))
    }
}

impl<M: ProfileMode> LifecycleCorrelator<M> {
    #[must_use]
    pub fn new(toggle: Arc<ProfileToggle>) -> Self {
        Self::with_store(ProfileStore::new(), toggle)
    }

    #[must_use]
    pub fn with_store(store: ProfileStore<M>, toggle: Arc<ProfileToggle>) -> Self {
        Self { store, toggle, counters: Counters::default() }
    }

    #[must_use]
    pub fn store(&self) -> &ProfileStore<M> {
        &self.store
    }

    #[must_use]
    pub fn toggle(&self) -> &Arc<ProfileToggle> {
        &self.toggle
    }

    #[must_use]
    pub fn stats(&self) -> CorrelatorStats {
        CorrelatorStats {
            recorded: self.counters.recorded.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            re_executions: self.counters.re_executions.load(Ordering::Relaxed),
        }
    }

    fn accept<'t>(&self, task: Option<TaskRef<'t>>, event: &str) -> Option<TaskRef<'t>> {
        let accepted = task.filter(|_| self.toggle.is_enabled());
        if accepted.is_none() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            trace!("Dropped {event} event (task present: {})", task.is_some());
        }
        accepted
    }

    /// Record a task creation
    ///
    /// Writes into the last profile of the task, creating the first one if
    /// an earlier submission or execution has not already done so.
    pub fn on_create(
        &self,
        task: Option<TaskRef<'_>>,
        payload: M::Creation,
    ) -> Option<ProfileKey> {
        let task = self.accept(task, "create")?;
        let mut slot = self.store.slot(task.id);
        let handle = self.exhausted(slot.get_or_create_last(task.class_name))?;
        Some(self.write(&task, &handle, |mode| mode.apply_creation(payload)))
    }

    /// Record a submission to an executor
    ///
    /// Same policy as creation: the latest profile of the task receives it.
    pub fn on_submit(
        &self,
        task: Option<TaskRef<'_>>,
        payload: M::Submission,
    ) -> Option<ProfileKey> {
        let task = self.accept(task, "submit")?;
        let mut slot = self.store.slot(task.id);
        let handle = self.exhausted(slot.get_or_create_last(task.class_name))?;
        Some(self.write(&task, &handle, |mode| mode.apply_submission(payload)))
    }

    /// Record one completed execution
    pub fn on_execute(
        &self,
        task: Option<TaskRef<'_>>,
        payload: M::Execution,
    ) -> Option<ProfileKey> {
        self.on_execute_case(task, payload).map(|(key, _)| key)
    }

    /// [`LifecycleCorrelator::on_execute`], also reporting which case applied
    pub fn on_execute_case(
        &self,
        task: Option<TaskRef<'_>>,
        payload: M::Execution,
    ) -> Option<(ProfileKey, ExecutionCase)> {
        let task = self.accept(task, "execute")?;
        let mut slot = self.store.slot(task.id);
        let (handle, case) = self.exhausted(Self::execution_target(&mut slot, task.class_name))?;

        if case == ExecutionCase::ReExecution {
            self.counters.re_executions.fetch_add(1, Ordering::Relaxed);
            debug!("{} executed again, appending profile", task.id);
        }

        let key = self.write(&task, &handle, |mode| mode.apply_execution(payload));
        Some((key, case))
    }

    fn execution_target(
        slot: &mut TaskSlot<'_, M>,
        class_name: &str,
    ) -> Option<(ProfileHandle<M>, ExecutionCase)> {
        match slot.count() {
            None => Some((slot.create(class_name)?, ExecutionCase::Fresh)),
            Some(1) => match slot.get(1).filter(|first| !first.lock().has_execution()) {
                Some(first) => Some((first, ExecutionCase::FirstExecution)),
                None => Some((Self::clone_last(slot, class_name)?, ExecutionCase::ReExecution)),
            },
            Some(_) => Some((Self::clone_last(slot, class_name)?, ExecutionCase::ReExecution)),
        }
    }

    fn clone_last(slot: &mut TaskSlot<'_, M>, class_name: &str) -> Option<ProfileHandle<M>> {
        match slot.get_last() {
            Some(last) => {
                let source = last.lock();
                slot.create_cloned(&source)
            }
            None => slot.create(class_name),
        }
    }

    /// Count an event whose task has no ordinals left as dropped
    fn exhausted<T>(&self, resolved: Option<T>) -> Option<T> {
        if resolved.is_none() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
        resolved
    }

    fn write(
        &self,
        task: &TaskRef<'_>,
        handle: &ProfileHandle<M>,
        apply: impl FnOnce(&mut M),
    ) -> ProfileKey {
        let mut record = handle.lock();
        record.id = task.identity_hash;
        apply(&mut record.mode);
        self.counters.recorded.fetch_add(1, Ordering::Relaxed);
        ProfileKey::new(task.id, record.exec_number)
    }

    /// Remove and return every profile; intended to be called once at shutdown
    pub fn drain_all_profiles(&self) -> Vec<ProfileRecord<M>> {
        let profiles = self.store.drain();
        info!("Drained {} {} profiles", profiles.len(), M::NAME);
        profiles
    }
}
