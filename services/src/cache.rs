//! Per-course mutual exclusion for analysis runs.
//!
//! Not a general mutex: one boolean per course, no queueing. A second
//! request for a course with an active run is rejected immediately so the
//! caller can report it, since a run can take minutes to hours. The state
//! lives in an injectable value (not a global) so tests can construct and
//! drop it freely.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::DetectionError;

#[derive(Clone, Default)]
pub struct PlagiarismCache {
    active: Arc<Mutex<HashSet<i64>>>,
}

impl PlagiarismCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a check as active for the course, failing fast if one already
    /// is. The returned guard releases the course when dropped, so release
    /// happens on every exit path including panics.
    pub fn acquire(&self, course_id: i64) -> Result<ActiveCheck, DetectionError> {
        let mut active = self.lock();
        if !active.insert(course_id) {
            return Err(DetectionError::AlreadyRunning { course_id });
        }
        Ok(ActiveCheck {
            course_id,
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self, course_id: i64) -> bool {
        self.lock().contains(&course_id)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<i64>> {
        // A poisoned lock only means a holder panicked; the set is still valid.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// RAII handle for one active check.
pub struct ActiveCheck {
    course_id: i64,
    active: Arc<Mutex<HashSet<i64>>>,
}

impl ActiveCheck {
    pub fn course_id(&self) -> i64 {
        self.course_id
    }

    /// Explicit release; equivalent to dropping the guard.
    pub fn release(self) {}
}

impl Drop for ActiveCheck {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.course_id);
    }
}
