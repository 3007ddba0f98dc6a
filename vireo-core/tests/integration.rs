//! Integration Tests for the Reactive System
//!
//! These tests verify that wrapped state, memos, effects, the store and the
//! template rewriter work together correctly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use vireo_core::graph::DepKey;
use vireo_core::opt::{extract_expressions, normalize};
use vireo_core::{
    opt, OptOptions, ReactiveError, Runtime, RuntimeConfig, Store, TokioFlush, Value,
};

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

/// Wrapping a wrapped value, or reading the same nested value twice,
/// yields the same handle.
#[test]
fn wrapping_is_idempotent() {
    let runtime = Runtime::new();
    let state = runtime.wrap(json!({ "user": { "tags": ["a"] } }));
    assert_eq!(runtime.wrap(state.clone()), state);

    let object = state.as_object().unwrap();
    let user = object.get("user").unwrap();
    assert_eq!(object.get("user").unwrap(), user);

    let tags = user.as_object().unwrap().get("tags").unwrap();
    assert_eq!(runtime.wrap(tags.clone()), tags);
}

/// An effect reading one key re-runs exactly once after that key is
/// written, however many times, and not at all for other keys.
#[test]
fn precise_tracking() {
    let runtime = Runtime::new();
    let state = runtime.wrap_object(json!({ "a": 0, "b": 0 })).unwrap();
    let runs = counter();

    let s = state.clone();
    let r = runs.clone();
    let _effect = runtime.create_effect(move || {
        r.fetch_add(1, Ordering::SeqCst);
        s.get("a");
    });

    state.set("b", 1);
    runtime.flush().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    state.set("a", 1);
    state.set("a", 2);
    state.set("a", 3);
    runtime.flush().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// A branch that stops reading a key stops being woken by it.
#[test]
fn dependencies_are_rebuilt_on_every_run() {
    let runtime = Runtime::new();
    let state = runtime
        .wrap_object(json!({ "flag": true, "a": 0, "b": 0 }))
        .unwrap();
    let runs = counter();

    let s = state.clone();
    let r = runs.clone();
    let effect = runtime.create_effect(move || {
        r.fetch_add(1, Ordering::SeqCst);
        let flag = s.get("flag").and_then(|v| v.as_bool()).unwrap_or(false);
        if flag {
            s.get("a");
        } else {
            s.get("b");
        }
    });
    assert_eq!(effect.dependency_count(), 2);

    state.set("flag", false);
    runtime.flush().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    state.set("a", 1);
    runtime.flush().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    let a_key = DepKey::Key("a".into());
    assert_eq!(state.dependencies().subscriber_count(&a_key), 0);

    state.set("b", 1);
    runtime.flush().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// Iteration depends on the array's shape; slot reads depend on the slot.
#[test]
fn array_structure_and_slots_are_tracked_separately() {
    let runtime = Runtime::new();
    let list = runtime.wrap(json!([1, 2, 3]));
    let list = list.as_array().unwrap().clone();
    let iterations = counter();
    let head_reads = counter();

    let l = list.clone();
    let i = iterations.clone();
    let _sum = runtime.create_effect(move || {
        i.fetch_add(1, Ordering::SeqCst);
        let _total: f64 = l.values().iter().filter_map(Value::as_f64).sum();
    });
    let l = list.clone();
    let h = head_reads.clone();
    let _head = runtime.create_effect(move || {
        h.fetch_add(1, Ordering::SeqCst);
        l.get(0);
    });

    list.push(4);
    runtime.flush().unwrap();
    assert_eq!(iterations.load(Ordering::SeqCst), 2);
    assert_eq!(head_reads.load(Ordering::SeqCst), 1);

    list.insert(0, 0).unwrap();
    runtime.flush().unwrap();
    assert_eq!(iterations.load(Ordering::SeqCst), 3);
    assert_eq!(head_reads.load(Ordering::SeqCst), 2);
}

/// A memo's body runs once between reads when nothing it read changed.
#[test]
fn memoization() {
    let runtime = Runtime::new();
    let state = runtime.wrap_object(json!({ "n": 2, "other": 0 })).unwrap();
    let calls = counter();

    let s = state.clone();
    let c = calls.clone();
    let squared = runtime.computed(move || {
        c.fetch_add(1, Ordering::SeqCst);
        let n = s.get("n").and_then(|v| v.as_f64()).unwrap_or(0.0);
        n * n
    });

    assert_eq!(squared.get(), 4.0);
    assert_eq!(squared.get(), 4.0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    state.set("other", 1);
    assert_eq!(squared.get(), 4.0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    state.set("n", 3);
    assert_eq!(squared.get(), 9.0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Memos can depend on other memos, and effects on both.
#[test]
fn memo_chain_feeds_an_effect() {
    let runtime = Runtime::new();
    let state = runtime.wrap_object(json!({ "n": 1 })).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = state.clone();
    let doubled = runtime.computed(move || s.get("n").and_then(|v| v.as_i64()).unwrap_or(0) * 2);
    let d = doubled.clone();
    let quadrupled = runtime.computed(move || d.get() * 2);

    let q = quadrupled.clone();
    let out = seen.clone();
    let _effect = runtime.create_effect(move || out.lock().push(q.get()));

    state.set("n", 5);
    runtime.flush().unwrap();
    assert_eq!(*seen.lock(), vec![4, 20]);
    assert_eq!(doubled.compute_count(), 2);
}

/// An effect that writes what it reads halts at the cap instead of looping.
#[test]
fn cycle_cap_stops_runaway_effects() {
    let config = RuntimeConfig {
        max_flush_iterations: 10,
    };
    let runtime = Runtime::with_config(config);
    let state = runtime.wrap_object(json!({ "n": 0 })).unwrap();

    let s = state.clone();
    let effect = runtime.create_effect(move || {
        let n = s.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
        s.set("n", n + 1);
    });

    let err = runtime.flush().unwrap_err();
    assert_eq!(err, ReactiveError::CycleDetected { rounds: 10, cap: 10 });
    assert_eq!(runtime.pending_effects(), 0);
    assert!(!runtime.is_flushing());
    assert_eq!(effect.run_count(), 11);

    effect.dispose();
    state.set("n", 0);
    assert_eq!(runtime.flush().unwrap().rounds, 0);
}

/// Subscribers see each discrete change once and are never re-entered,
/// even when they write to the store themselves.
#[test]
fn store_delivery_is_not_reentrant() {
    let runtime = Runtime::new();
    let store = Store::new(&runtime, json!({ "count": 0, "log": [] })).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let active = counter();

    let out = seen.clone();
    let a = active.clone();
    let _sub = store.subscribe(move |state| {
        assert_eq!(a.fetch_add(1, Ordering::SeqCst), 0, "re-entered");
        let count = state.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
        out.lock().push(count);
        if count == 1 {
            state.set("count", 2);
        }
        a.fetch_sub(1, Ordering::SeqCst);
    });

    store.update(|_| json!({ "count": 1 })).unwrap();
    runtime.flush().unwrap();
    assert_eq!(*seen.lock(), vec![0, 1, 2]);
    assert_eq!(store.snapshot(), json!({ "count": 2, "log": [] }));
}

/// Watchers fire with the new and old value only on change.
#[test]
fn watch_reports_changes() {
    let runtime = Runtime::new();
    let state = runtime.wrap_object(json!({ "items": [] })).unwrap();
    let changes = Arc::new(Mutex::new(Vec::new()));

    let s = state.clone();
    let out = changes.clone();
    let _watch = runtime.watch(
        move || {
            s.get("items")
                .and_then(|v| v.as_array().map(|a| a.len()))
                .unwrap_or(0)
        },
        move |new, old| out.lock().push((*new, *old)),
    );

    let items = state.get("items").unwrap();
    let items = items.as_array().unwrap();
    items.push("x");
    runtime.flush().unwrap();
    items.set(0, "y").unwrap();
    runtime.flush().unwrap();
    items.push("z");
    runtime.flush().unwrap();

    assert_eq!(*changes.lock(), vec![(1, 0), (2, 1)]);
}

/// Strip every `${contain(() => (X))}` back to `${X}`.
fn unwrap_isolation(src: &str) -> String {
    let options = OptOptions::default();
    let mut out = src.to_owned();
    for record in extract_expressions(src, &options).iter().rev() {
        let inner = record
            .text
            .strip_prefix("contain(() => (")
            .and_then(|text| text.strip_suffix("))"));
        if let Some(inner) = inner {
            let restored = format!("${{{}}}", unwrap_isolation(inner));
            out.replace_range(record.start..record.end, &restored);
        }
    }
    out
}

/// Undoing the wrapping gives back the normalized input, so the rewritten
/// template evaluates to the same output; callbacks are untouched.
#[test]
fn rewrite_preserves_the_template() {
    let sources = [
        "function() { return html`<x>${a + b}</x>`; }",
        "() => html`<ul>${items.map(i => html`<li>${i.name}</li>`)}</ul>`",
        "render() { const t = `${a}`; return html`<p class=${cls}>${ok ? html`${n}` : ''}</p>`; }",
        "(props) => { return html`<button onclick=${() => props.go()}>${props.label}</button>`; }",
    ];

    for src in sources {
        let out = opt(src).unwrap();
        assert!(out.contains("contain(() => ("), "{out}");
        assert_eq!(unwrap_isolation(&out), normalize(src).unwrap(), "{src}");
    }

    let out = opt(sources[3]).unwrap();
    assert!(out.contains("${() => props.go()}"));
}

/// Malformed input never panics and never loses text.
#[test]
fn unterminated_rewrite_input_is_kept() {
    let src = "function() { return html`<p>${a}</p>${ b + `; }";
    let out = opt(src).unwrap();
    assert!(out.ends_with("${ b + `; }"));
    assert!(out.contains("${contain(() => (a))}"));
}

/// With a tokio flush scheduler, writes are flushed without calling
/// `flush` by hand.
#[tokio::test]
async fn tokio_flush_runs_effects_after_yield() {
    let hook = TokioFlush::try_current().expect("inside a tokio runtime");
    let runtime = Runtime::with_flush_scheduler(RuntimeConfig::default(), hook);
    let state = runtime.wrap_object(json!({ "n": 0 })).unwrap();
    let runs = counter();

    let s = state.clone();
    let r = runs.clone();
    let _effect = runtime.create_effect(move || {
        r.fetch_add(1, Ordering::SeqCst);
        s.get("n");
    });

    state.set("n", 1);
    state.set("n", 2);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    for _ in 0..10 {
        if runs.load(Ordering::SeqCst) == 2 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(runtime.pending_effects(), 0);
}
