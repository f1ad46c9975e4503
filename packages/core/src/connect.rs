//! The bridge between an asynchronous value source and component render
//! state.
//!
//! A [`Connect`] owns exactly one live subscription. When the source has a
//! synchronously available first value, that value seeds the state and the
//! loading flag is never set; otherwise state starts empty with `loading`
//! until the first asynchronous emission. Later emissions replace state only
//! when they differ under the configured equality predicate, so value-equal
//! successive emissions cause no redundant renders. Source failures are
//! passed through to the error sink; the bridge is not an error boundary.

use crate::source::{value_now, DataStream, ProviderError};
use futures::StreamExt;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::debug;

/// Equality predicate for deduplicating successive emissions.
pub type DistinctFn = dyn Fn(&Value, &Value) -> bool + Send + Sync;

/// Sink invoked with each accepted render-state update.
pub type RenderSink = dyn Fn(&Value) + Send + Sync;

/// Sink invoked when the source fails; the surrounding failure-handling
/// collaborator decides what to do.
pub type ErrorSink = dyn Fn(ProviderError) + Send + Sync;

#[derive(Clone)]
pub struct ConnectOptions {
    pub distinct: Arc<DistinctFn>,
    pub on_render: Arc<RenderSink>,
    pub on_error: Arc<ErrorSink>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            distinct: Arc::new(|previous, next| previous == next),
            on_render: Arc::new(|_| {}),
            on_error: Arc::new(|_| {}),
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions").finish_non_exhaustive()
    }
}

struct Shared {
    state: Option<Value>,
    loading: bool,
    closed: bool,
}

/// A live subscription feeding render state.
#[derive(Debug)]
pub struct Connect {
    shared: Arc<Mutex<Shared>>,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("loading", &self.loading)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Connect {
    /// Subscribe to a source, seeding from its synchronous first value when
    /// one is available.
    pub fn new(mut stream: DataStream, options: ConnectOptions) -> Self {
        match value_now(&mut stream) {
            Some(Ok(emission)) => Self::with_initial(emission.render_state, stream, options),

            Some(Err(error)) => {
                (options.on_error)(error);
                Self {
                    shared: Arc::new(Mutex::new(Shared {
                        state: None,
                        loading: false,
                        closed: true,
                    })),
                    task: None,
                }
            }

            None => {
                let shared = Arc::new(Mutex::new(Shared {
                    state: None,
                    loading: true,
                    closed: false,
                }));
                let task = spawn_subscription(Arc::clone(&shared), stream, options);
                Self {
                    shared,
                    task: Some(task),
                }
            }
        }
    }

    /// Subscribe with an already-known first value, e.g. one replayed from a
    /// snapshot during hydration. The subscription continues with later
    /// emissions only.
    pub fn with_initial(initial: Value, stream: DataStream, options: ConnectOptions) -> Self {
        let shared = Arc::new(Mutex::new(Shared {
            state: Some(initial),
            loading: false,
            closed: false,
        }));
        let task = spawn_subscription(Arc::clone(&shared), stream, options);
        Self {
            shared,
            task: Some(task),
        }
    }

    /// The latest render state, if any emission has been accepted.
    pub fn state(&self) -> Option<Value> {
        lock(&self.shared).state.clone()
    }

    /// Is the bridge still waiting for the source's first emission?
    pub fn is_loading(&self) -> bool {
        lock(&self.shared).loading
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.shared).closed
    }

    /// Cancel the subscription. No state update or sink call happens after
    /// this returns; an emission or failure racing the teardown is discarded
    /// under the state lock.
    pub fn unsubscribe(&mut self) {
        {
            let mut shared = lock(&self.shared);
            if shared.closed {
                return;
            }
            shared.closed = true;
            shared.loading = false;
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }

        debug!("connect subscription torn down");
    }
}

impl Drop for Connect {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn spawn_subscription(
    shared: Arc<Mutex<Shared>>,
    mut stream: DataStream,
    options: ConnectOptions,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            match item {
                Ok(emission) => {
                    let accepted = {
                        let mut guard = lock(&shared);
                        if guard.closed {
                            break;
                        }

                        let changed = match &guard.state {
                            Some(previous) => !(options.distinct)(previous, &emission.render_state),
                            None => true,
                        };

                        if changed {
                            guard.state = Some(emission.render_state.clone());
                            guard.loading = false;
                        }
                        changed
                    };

                    if accepted {
                        (options.on_render)(&emission.render_state);
                    }
                }

                Err(error) => {
                    let was_closed = {
                        let mut guard = lock(&shared);
                        let was_closed = guard.closed;
                        guard.closed = true;
                        was_closed
                    };
                    if !was_closed {
                        (options.on_error)(error);
                    }
                    break;
                }
            }
        }
    })
}

fn lock(shared: &Arc<Mutex<Shared>>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
