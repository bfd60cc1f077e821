//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing an identity hash
//! where a task handle is expected, and make function signatures more
//! expressive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Task identity
///
/// Opaque, stable handle to one task object for the lifetime of the process.
/// Equality is identity equality: two structurally identical tasks created
/// separately must be given different ids by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task#{}", self.0)
    }
}

/// Execution ordinal (1-based)
///
/// Counts how many profiles exist for a task. Ordinals of one task are dense:
/// `1..=count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionOrdinal(NonZeroU32);

impl ExecutionOrdinal {
    /// The ordinal of the first profile of any task
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    /// Create an ordinal, returning `None` for 0
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// The ordinal following this one, `None` once the ordinal space is
    /// exhausted
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    /// The largest representable ordinal
    pub const MAX: Self = Self(NonZeroU32::MAX);

    /// Raw 1-based value
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ExecutionOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Key of one profile record: (task identity, execution ordinal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileKey {
    pub task: TaskId,
    pub ordinal: ExecutionOrdinal,
}

impl ProfileKey {
    #[must_use]
    pub fn new(task: TaskId, ordinal: ExecutionOrdinal) -> Self {
        Self { task, ordinal }
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.task, self.ordinal)
    }
}

/// Identity hash reported by the instrumentation site
///
/// Stable for a given task object but NOT unique; it is only copied into
/// profiles, never used as a key. `0` means "no task" when used as an outer
/// task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityHash(pub i32);

impl IdentityHash {
    /// Hash reported when there is no enclosing task
    pub const NONE: Self = Self(tgp_common::NO_OUTER_TASK);

    /// Returns true if this hash denotes "no task"
    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread metadata attached to creation and execution events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    /// Identity hash of the thread object
    pub id: i32,
    pub name: String,
    /// Class (type) name of the thread object
    pub class: String,
}

impl ThreadInfo {
    /// Describe the calling OS thread
    ///
    /// The id is derived from the std thread id, so it is stable for the
    /// thread's lifetime but only meaningful within this process.
    #[must_use]
    pub fn current() -> Self {
        let thread = std::thread::current();
        Self {
            id: thread_hash(thread.id()),
            name: thread.name().unwrap_or("<unnamed>").to_string(),
            class: "std::thread::Thread".to_string(),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn thread_hash(id: std::thread::ThreadId) -> i32 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    id.hash(&mut hasher);
    // Fold to 31 bits so ids stay positive like identity hashes
    (hasher.finish() & 0x7fff_ffff) as i32
}

/// Reference to the task an event is about
///
/// Carries the key used for correlation (`id`), the hash stamped on every
/// profile (`identity_hash`) and the class name pre-filled into freshly
/// created profiles. `is_thread` marks tasks that are thread objects; it is
/// reported with every event about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRef<'a> {
    pub id: TaskId,
    pub identity_hash: IdentityHash,
    pub class_name: &'a str,
    pub is_thread: bool,
}

impl<'a> TaskRef<'a> {
    #[must_use]
    pub fn new(id: TaskId, identity_hash: IdentityHash, class_name: &'a str) -> Self {
        Self { id, identity_hash, class_name, is_thread: false }
    }

    /// Reference to a task that is itself a thread
    #[must_use]
    pub fn thread(id: TaskId, identity_hash: IdentityHash, class_name: &'a str) -> Self {
        Self { is_thread: true, ..Self::new(id, identity_hash, class_name) }
    }
}
