// ============================================================================
// spark-components - Deferred Completions
// A tiny single-threaded task queue for awaitable operation bodies
// ============================================================================
//
// An operation body may hand back a future. The interceptor parks the rest
// of the protocol (post-hook, after-event) on this queue; the runtime polls
// it from `drive_tasks` / `poll` / `run_until_idle`. Tasks are only polled
// after their waker fired (or once, right after spawning).
// ============================================================================

use std::cell::RefCell;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::task::{waker, ArcWake};

use crate::core::error::{Error, Result};

struct WakeFlag(AtomicBool);

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::Release);
    }
}

struct Task {
    future: LocalBoxFuture<'static, Result<()>>,
    wake: Arc<WakeFlag>,
}

/// What one `drive` pass finished.
#[derive(Debug, Default)]
pub struct TaskReport {
    /// Tasks that ran to completion, successfully or not.
    pub completed: usize,
    /// Failures of the completed tasks.
    pub errors: Vec<Error>,
}

/// Queue of deferred completions.
#[derive(Default)]
pub struct TaskQueue {
    tasks: RefCell<Vec<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = Result<()>> + 'static,
    {
        self.tasks.borrow_mut().push(Task {
            future: future.boxed_local(),
            wake: Arc::new(WakeFlag(AtomicBool::new(true))),
        });
    }

    /// Tasks not yet finished.
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// True if some task was woken and would make progress on `drive`.
    pub fn has_runnable(&self) -> bool {
        self.tasks
            .borrow()
            .iter()
            .any(|task| task.wake.0.load(Ordering::Acquire))
    }

    /// Poll every woken task once.
    pub fn drive(&self) -> TaskReport {
        let mut report = TaskReport::default();
        let batch = std::mem::take(&mut *self.tasks.borrow_mut());
        let mut pending = Vec::with_capacity(batch.len());

        for mut task in batch {
            if !task.wake.0.swap(false, Ordering::AcqRel) {
                pending.push(task);
                continue;
            }

            let waker = waker(task.wake.clone());
            let mut cx = Context::from_waker(&waker);
            match task.future.poll_unpin(&mut cx) {
                Poll::Ready(Ok(())) => report.completed += 1,
                Poll::Ready(Err(err)) => {
                    report.completed += 1;
                    report.errors.push(err);
                }
                Poll::Pending => pending.push(task),
            }
        }

        // Tasks spawned while polling landed in the (emptied) queue
        let mut tasks = self.tasks.borrow_mut();
        pending.append(&mut tasks);
        *tasks = pending;

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_channel::oneshot;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn ready_future_completes_on_first_drive() {
        let queue = TaskQueue::new();
        let ran = Rc::new(Cell::new(false));
        let ran_clone = ran.clone();
        queue.spawn(async move {
            ran_clone.set(true);
            Ok(())
        });

        assert!(queue.has_runnable());
        let report = queue.drive();
        assert_eq!(report.completed, 1);
        assert!(ran.get());
        assert!(queue.is_empty());
    }

    #[test]
    fn pending_future_waits_for_wake() {
        let queue = TaskQueue::new();
        let (tx, rx) = oneshot::channel::<()>();
        queue.spawn(async move {
            let _ = rx.await;
            Ok(())
        });

        assert_eq!(queue.drive().completed, 0);
        assert_eq!(queue.len(), 1);
        assert!(!queue.has_runnable());

        tx.send(()).unwrap();
        assert!(queue.has_runnable());
        assert_eq!(queue.drive().completed, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn failures_are_reported() {
        let queue = TaskQueue::new();
        queue.spawn(async { Err(Error::FlushLoop { rounds: 1 }) });

        let report = queue.drive();
        assert_eq!(report.completed, 1);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn tasks_spawned_while_polling_are_kept() {
        let queue = Rc::new(TaskQueue::new());
        let inner_queue = queue.clone();
        queue.spawn(async move {
            inner_queue.spawn(async { Ok(()) });
            Ok(())
        });

        assert_eq!(queue.drive().completed, 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drive().completed, 1);
        assert!(queue.is_empty());
    }
}
