//! Next-frame scheduling.
//!
//! The engine does not own a frame loop. Hosts provide one through the
//! [`Scheduler`] trait; [`FrameQueue`] is a manually pumped implementation
//! for hosts that drive frames themselves, and for tests.

use crate::effects::activity::Disposer;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Work scheduled for the next frame.
pub type FrameTask = Box<dyn FnOnce() + Send>;

/// A "run this on the next frame" primitive.
pub trait Scheduler: Send + Sync {
    /// Schedule `task`. Disposing the returned handle cancels the task if it
    /// has not run yet.
    fn next_frame(&self, task: FrameTask) -> Disposer;
}

#[derive(Default)]
struct Frames {
    next_id: u64,
    tasks: Vec<(u64, FrameTask)>,
}

/// Scheduler whose frames advance only when [`flush`](FrameQueue::flush) is called.
///
/// ```rust
/// use headless_machine::effects::{FrameQueue, Scheduler};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let frames = FrameQueue::new();
/// let ran = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&ran);
/// let _pending = frames.next_frame(Box::new(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }));
///
/// assert_eq!(ran.load(Ordering::SeqCst), 0);
/// assert_eq!(frames.flush(), 1);
/// assert_eq!(ran.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct FrameQueue {
    frames: Arc<Mutex<Frames>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every task scheduled before this call. Tasks scheduled while
    /// flushing wait for the next flush. Returns the number of tasks run.
    pub fn flush(&self) -> usize {
        let tasks = {
            let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut frames.tasks)
        };
        let count = tasks.len();
        for (_, task) in tasks {
            task();
        }
        count
    }

    /// Number of tasks waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tasks
            .len()
    }
}

impl Scheduler for FrameQueue {
    fn next_frame(&self, task: FrameTask) -> Disposer {
        let id = {
            let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
            let id = frames.next_id;
            frames.next_id += 1;
            frames.tasks.push((id, task));
            id
        };

        let frames: Weak<Mutex<Frames>> = Arc::downgrade(&self.frames);
        Disposer::new(move || {
            if let Some(frames) = frames.upgrade() {
                let mut frames = frames.lock().unwrap_or_else(PoisonError::into_inner);
                frames.tasks.retain(|(task_id, _)| *task_id != id);
            }
        })
    }
}
