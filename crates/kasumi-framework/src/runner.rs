//! Background task execution with failure isolation.
//!
//! Every callback and command body runs as its own task on a shared
//! [`TaskRunner`]. A failing or panicking task is logged and reported to the
//! exception hook; it never affects the publisher or sibling tasks.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span, error, trace};

use crate::error::{BoxError, Halt};
use crate::hook::{Exception, ExceptionHook, ExceptionSource};

type HookSlot = Arc<RwLock<Option<Arc<dyn ExceptionHook>>>>;

/// Spawns isolated tasks and routes their failures to the exception hook.
#[derive(Clone, Default)]
pub struct TaskRunner {
    tracker: TaskTracker,
    hook: HookSlot,
    shutdown: CancellationToken,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the exception hook, replacing the previous one.
    pub fn set_hook(&self, hook: impl ExceptionHook) {
        *self.hook.write() = Some(Arc::new(hook));
    }

    /// Returns the installed hook, if any.
    pub fn hook(&self) -> Option<Arc<dyn ExceptionHook>> {
        self.hook.read().clone()
    }

    /// Runs `fut` in the background.
    ///
    /// `context` names the event or command the task belongs to and ends up
    /// in the reported [`Exception`].
    pub fn spawn<F>(&self, source: ExceptionSource, context: impl Into<String>, span: Span, fut: F)
    where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let context = context.into();
        let hook = Arc::clone(&self.hook);
        let task = async move {
            let exception = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => return,
                Ok(Err(err)) if err.is::<Halt>() => {
                    trace!(%source, %context, "task halted");
                    return;
                }
                Ok(Err(err)) => {
                    error!(%source, %context, error = %err, "task failed");
                    Exception::from_error(source, context, &err)
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(%source, %context, panic = %message, "task panicked");
                    Exception::from_panic(source, context, message)
                }
            };
            let hook = hook.read().clone();
            if let Some(hook) = hook {
                hook.report(&exception);
            }
        };
        self.tracker.spawn(task.instrument(span));
    }

    /// Signals long-lived tasks, such as interaction timers, to stop early.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Cancelled once [`shutdown`](Self::shutdown) has been called.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Number of tasks still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every task spawned so far, and every task those spawn,
    /// has finished.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("pending", &self.tracker.len())
            .field("has_hook", &self.hook.read().is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn collecting(runner: &TaskRunner) -> Arc<Mutex<Vec<Exception>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        runner.set_hook(move |e: &Exception| sink.lock().push(e.clone()));
        seen
    }

    #[tokio::test]
    async fn failures_reach_the_hook() {
        let runner = TaskRunner::new();
        let seen = collecting(&runner);

        runner.spawn(ExceptionSource::Event, "ok", Span::none(), async {
            Ok::<(), BoxError>(())
        });
        runner.spawn(ExceptionSource::Event, "halt", Span::none(), async {
            Err::<(), BoxError>(Halt.into())
        });
        runner.spawn(ExceptionSource::Command, "boom", Span::none(), async {
            Err::<(), BoxError>("boom".into())
        });
        runner.drain().await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].context, "boom");
        assert_eq!(seen[0].source, ExceptionSource::Command);
        assert_eq!(seen[0].message, "boom");
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let runner = TaskRunner::new();
        let seen = collecting(&runner);

        runner.spawn(ExceptionSource::Interaction, "paginator", Span::none(), async {
            if true {
                panic!("bad page");
            }
            Ok::<(), BoxError>(())
        });
        runner.drain().await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].class, crate::hook::PANIC_CLASS);
        assert_eq!(seen[0].message, "bad page");
    }

    #[tokio::test]
    async fn drain_reopens_the_runner() {
        let runner = TaskRunner::new();
        runner.drain().await;
        let seen = collecting(&runner);
        runner.spawn(ExceptionSource::Event, "late", Span::none(), async {
            Err::<(), BoxError>("late".into())
        });
        runner.drain().await;
        assert_eq!(seen.lock().len(), 1);
    }
}
