//! Asynchronous value-source primitives.
//!
//! A data provider returns a [`DataStream`]: a stream of
//! `{render_state, persist_state}` emissions that may produce its first
//! emission synchronously (the first `poll_next` is `Ready` without ever
//! returning `Pending`) or later, and may terminate with an error. The
//! synchronous case is probed with [`value_now`], which never blocks.

use futures::future::{self, FutureExt};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use thiserror::Error;

/// One event produced by a data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    /// The value the component tree consumes to render.
    pub render_state: Value,
    /// The value serialized into the snapshot for later replay. Providers
    /// that need no replay data emit `None` and no snapshot entry is written
    /// for their key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_state: Option<Value>,
}

impl Emission {
    pub fn new(render_state: Value) -> Self {
        Self {
            render_state,
            persist_state: None,
        }
    }

    pub fn with_persist(render_state: Value, persist_state: Value) -> Self {
        Self {
            render_state,
            persist_state: Some(persist_state),
        }
    }
}

/// Failure raised by the underlying source. Carries the source's error value
/// verbatim so callers observe the original message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type SourceItem = Result<Emission, ProviderError>;

/// The asynchronous value source consumed by both render passes.
pub type DataStream = BoxStream<'static, SourceItem>;

/// A source that produces a single emission synchronously upon subscription.
pub fn constant(emission: Emission) -> DataStream {
    stream::once(future::ready(Ok(emission))).boxed()
}

/// A source that fails synchronously upon subscription.
pub fn failed(error: ProviderError) -> DataStream {
    stream::once(future::ready(Err(error))).boxed()
}

/// A source that never emits.
pub fn never() -> DataStream {
    stream::pending().boxed()
}

/// A source whose single emission becomes available when the future
/// completes.
pub fn from_future<F>(fut: F) -> DataStream
where
    F: Future<Output = SourceItem> + Send + 'static,
{
    stream::once(fut).boxed()
}

/// Probe the first emission of a source without blocking.
///
/// Returns `None` when the source has no synchronously available value; the
/// stream remains usable and the first emission can still be awaited later.
/// Returns `Some(item)` when the first emission (or failure) is available
/// immediately, consuming it from the stream.
pub fn value_now(stream: &mut DataStream) -> Option<SourceItem> {
    stream.next().now_or_never().flatten()
}

/// Does subscribing to this source produce an event synchronously?
///
/// Consumes the probe subscription, mirroring a throwaway
/// subscribe/unsubscribe; callers pass a freshly created stream.
pub fn has_value_now(mut stream: DataStream) -> bool {
    value_now(&mut stream).is_some()
}
