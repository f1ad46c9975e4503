use crate::connect::{Connect, ConnectOptions};
use crate::source::{failed, never, Emission, ProviderError, SourceItem};
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn channel_source() -> (mpsc::UnboundedSender<SourceItem>, crate::source::DataStream) {
    let (tx, rx) = mpsc::unbounded();
    (tx, rx.boxed())
}

fn counting_options(renders: &Arc<AtomicUsize>) -> ConnectOptions {
    let renders = Arc::clone(renders);
    ConnectOptions {
        on_render: Arc::new(move |_| {
            renders.fetch_add(1, Ordering::SeqCst);
        }),
        ..ConnectOptions::default()
    }
}

/// Let the subscription task drain everything currently queued.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_synchronous_first_value_seeds_state() {
    let (tx, stream) = channel_source();
    tx.unbounded_send(Ok(Emission::new(json!({"x": 625})))).unwrap();

    let renders = Arc::new(AtomicUsize::new(0));
    let bridge = Connect::new(stream, counting_options(&renders));

    assert_eq!(bridge.state(), Some(json!({"x": 625})));
    assert!(!bridge.is_loading());
    // The seed is the initial render, not a re-render.
    assert_eq!(renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_asynchronous_first_value_sets_loading() {
    let (tx, stream) = channel_source();

    let renders = Arc::new(AtomicUsize::new(0));
    let bridge = Connect::new(stream, counting_options(&renders));

    assert!(bridge.is_loading());
    assert_eq!(bridge.state(), None);

    tx.unbounded_send(Ok(Emission::new(json!({"x": 1})))).unwrap();
    settle().await;

    assert!(!bridge.is_loading());
    assert_eq!(bridge.state(), Some(json!({"x": 1})));
    assert_eq!(renders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_equal_emissions_do_not_rerender() {
    let (tx, stream) = channel_source();
    tx.unbounded_send(Ok(Emission::new(json!({"x": 1})))).unwrap();

    let renders = Arc::new(AtomicUsize::new(0));
    let bridge = Connect::new(stream, counting_options(&renders));

    tx.unbounded_send(Ok(Emission::new(json!({"x": 1})))).unwrap();
    settle().await;
    assert_eq!(renders.load(Ordering::SeqCst), 0);

    tx.unbounded_send(Ok(Emission::new(json!({"x": 2})))).unwrap();
    settle().await;
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.state(), Some(json!({"x": 2})));
}

#[tokio::test]
async fn test_caller_supplied_distinct_predicate() {
    let (tx, stream) = channel_source();
    tx.unbounded_send(Ok(Emission::new(json!({"id": 1, "noise": "a"}))))
        .unwrap();

    let renders = Arc::new(AtomicUsize::new(0));
    let options = ConnectOptions {
        // Distinct by id only: noise changes are not re-renders.
        distinct: Arc::new(|previous: &Value, next: &Value| previous["id"] == next["id"]),
        ..counting_options(&renders)
    };
    let bridge = Connect::new(stream, options);

    tx.unbounded_send(Ok(Emission::new(json!({"id": 1, "noise": "b"}))))
        .unwrap();
    settle().await;
    assert_eq!(renders.load(Ordering::SeqCst), 0);

    tx.unbounded_send(Ok(Emission::new(json!({"id": 2, "noise": "b"}))))
        .unwrap();
    settle().await;
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.state(), Some(json!({"id": 2, "noise": "b"})));
}

#[tokio::test]
async fn test_emission_racing_teardown_is_discarded() {
    let (tx, stream) = channel_source();
    tx.unbounded_send(Ok(Emission::new(json!({"x": 1})))).unwrap();

    let renders = Arc::new(AtomicUsize::new(0));
    let mut bridge = Connect::new(stream, counting_options(&renders));

    bridge.unsubscribe();
    tx.unbounded_send(Ok(Emission::new(json!({"x": 2})))).unwrap();
    settle().await;

    assert!(bridge.is_closed());
    assert_eq!(bridge.state(), Some(json!({"x": 1})));
    assert_eq!(renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_error_racing_teardown_is_not_delivered() {
    let (tx, stream) = channel_source();
    tx.unbounded_send(Ok(Emission::new(json!({"x": 1})))).unwrap();

    let seen = Arc::new(Mutex::new(Vec::<ProviderError>::new()));
    let options = ConnectOptions {
        on_error: Arc::new({
            let seen = Arc::clone(&seen);
            move |error| seen.lock().unwrap().push(error)
        }),
        ..ConnectOptions::default()
    };
    let mut bridge = Connect::new(stream, options);

    bridge.unsubscribe();
    tx.unbounded_send(Err(ProviderError::new("Nope!"))).unwrap();
    settle().await;

    assert!(bridge.is_closed());
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(bridge.state(), Some(json!({"x": 1})));
}

#[tokio::test]
async fn test_source_failure_passes_through() {
    let (tx, stream) = channel_source();
    tx.unbounded_send(Ok(Emission::new(json!({"x": 1})))).unwrap();

    let seen = Arc::new(Mutex::new(Vec::<ProviderError>::new()));
    let options = ConnectOptions {
        on_error: Arc::new({
            let seen = Arc::clone(&seen);
            move |error| seen.lock().unwrap().push(error)
        }),
        ..ConnectOptions::default()
    };
    let bridge = Connect::new(stream, options);

    tx.unbounded_send(Err(ProviderError::new("Nope!"))).unwrap();
    settle().await;

    assert_eq!(seen.lock().unwrap().as_slice(), &[ProviderError::new("Nope!")]);
    assert!(bridge.is_closed());
    // The last good state survives; the bridge is not an error boundary.
    assert_eq!(bridge.state(), Some(json!({"x": 1})));
}

#[tokio::test]
async fn test_immediately_failing_source() {
    let seen = Arc::new(Mutex::new(Vec::<ProviderError>::new()));
    let options = ConnectOptions {
        on_error: Arc::new({
            let seen = Arc::clone(&seen);
            move |error| seen.lock().unwrap().push(error)
        }),
        ..ConnectOptions::default()
    };

    let bridge = Connect::new(failed(ProviderError::new("Nope!")), options);

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(bridge.is_closed());
    assert_eq!(bridge.state(), None);
    assert!(!bridge.is_loading());
}

#[tokio::test]
async fn test_never_emitting_source_stays_loading() {
    let bridge = Connect::new(never(), ConnectOptions::default());

    settle().await;
    assert!(bridge.is_loading());
    assert_eq!(bridge.state(), None);
}
