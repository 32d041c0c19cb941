//! Integration Tests for Reactive System
//!
//! These tests verify that signals, memos, and effects work together correctly
//! through the public API.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ripple_core::{
    batch, untracked, Computed, DirtyState, Effect, Memo, ReactiveError, Readable, Runtime, Signal,
};

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (count.clone(), count)
}

/// Reading an unchanged memo many times runs the computation once.
#[test]
fn memo_is_computed_once_between_writes() {
    let signal = Signal::new(21);
    let (runs, runs_clone) = counter();

    let signal_clone = signal.clone();
    let doubled = Computed::new(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        signal_clone.get() * 2
    });

    for _ in 0..1000 {
        assert_eq!(doubled.get(), 42);
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// One write to the top of a diamond recomputes the bottom exactly once.
#[test]
fn diamond_recomputes_sink_once() {
    let source = Signal::new(1);

    let s = source.clone();
    let left = Memo::new(move || s.get() + 1);
    let s = source.clone();
    let right = Memo::new(move || s.get() * 10);

    let (sink_runs, sink_runs_clone) = counter();
    let (l, r) = (left.clone(), right.clone());
    let sink = Memo::new(move || {
        sink_runs_clone.fetch_add(1, Ordering::SeqCst);
        l.get() + r.get()
    });

    assert_eq!(sink.get(), 12);
    assert_eq!(sink_runs.load(Ordering::SeqCst), 1);

    source.set(2);
    assert_eq!(sink.get(), 23);
    assert_eq!(sink_runs.load(Ordering::SeqCst), 2);
    assert_eq!(left.compute_count(), 2);
    assert_eq!(right.compute_count(), 2);
}

/// An effect at the bottom of a diamond runs once per write and never sees
/// a half-updated pair.
#[test]
fn diamond_effect_sees_consistent_values() {
    let source = Signal::new(1);

    let s = source.clone();
    let plus = Memo::new(move || s.get() + 1);
    let s = source.clone();
    let minus = Memo::new(move || s.get() - 1);

    let observed = Arc::new(Mutex::new(Vec::new()));
    let (p, m, log) = (plus.clone(), minus.clone(), observed.clone());
    let effect = Effect::new(move || {
        log.lock().push(p.get() + m.get());
    });

    source.set(5);
    source.set(8);

    assert_eq!(*observed.lock(), vec![2, 10, 16]);
    assert_eq!(effect.run_count(), 3);
}

/// A memo that switches branches stops reacting to the branch it left.
#[test]
fn memo_rewires_when_branch_changes() {
    let use_a = Signal::new(true);
    let a = Signal::new(1);
    let b = Signal::new(100);

    let (flag, a_clone, b_clone) = (use_a.clone(), a.clone(), b.clone());
    let picked = Memo::new(move || {
        if flag.get() {
            a_clone.get()
        } else {
            b_clone.get()
        }
    });

    assert_eq!(picked.get(), 1);
    assert_eq!(a.subscriber_count(), 1);
    assert_eq!(b.subscriber_count(), 0);

    // Writes to the untaken branch do nothing
    b.set(200);
    assert_eq!(picked.state(), DirtyState::Clean);

    use_a.set(false);
    assert_eq!(picked.get(), 200);
    assert_eq!(a.subscriber_count(), 0);
    assert_eq!(b.subscriber_count(), 1);

    let before = picked.compute_count();
    a.set(2);
    assert_eq!(picked.state(), DirtyState::Clean);
    assert_eq!(picked.get(), 200);
    assert_eq!(picked.compute_count(), before);

    b.set(300);
    assert_eq!(picked.get(), 300);
    assert_eq!(picked.compute_count(), before + 1);
}

/// N writes to N signals inside one batch run the observing effect once.
#[test]
fn batch_coalesces_effect_runs() {
    let signals: Vec<Signal<i32>> = (0..10).map(Signal::new).collect();
    let (runs, runs_clone) = counter();
    let total = Arc::new(AtomicI32::new(0));

    let (watched, total_clone) = (signals.clone(), total.clone());
    let _effect = Effect::new(move || {
        let sum: i32 = watched.iter().map(Signal::get).sum();
        total_clone.store(sum, Ordering::SeqCst);
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(total.load(Ordering::SeqCst), 45);

    batch(|| {
        for signal in &signals {
            signal.update(|v| v + 1);
        }
        // Nothing runs until the batch closes
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    });

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(total.load(Ordering::SeqCst), 55);
}

/// Only the outermost batch flushes.
#[test]
fn nested_batches_flush_on_outermost_exit() {
    let signal = Signal::new(0);
    let (runs, runs_clone) = counter();

    let signal_clone = signal.clone();
    let _effect = Effect::new(move || {
        signal_clone.get();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    let result = batch(|| {
        signal.set(1);
        batch(|| signal.set(2));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        signal.set(3);
        "done"
    });

    assert_eq!(result, "done");
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(signal.get(), 3);
}

/// Effects in one flush run in the order they were first enqueued.
#[test]
fn flush_runs_effects_in_enqueue_order() {
    let first = Signal::new(0);
    let second = Signal::new(0);
    let order = Arc::new(Mutex::new(Vec::new()));

    let (s, log) = (second.clone(), order.clone());
    let _reads_second = Effect::new(move || {
        s.get();
        log.lock().push("second");
    });
    let (s, log) = (first.clone(), order.clone());
    let _reads_first = Effect::new(move || {
        s.get();
        log.lock().push("first");
    });
    order.lock().clear();

    batch(|| {
        first.set(1);
        second.set(1);
        first.set(2);
    });

    assert_eq!(*order.lock(), vec!["first", "second"]);
}

/// An effect that stops reading a signal stops reacting to it.
#[test]
fn effect_drops_dependency_it_no_longer_reads() {
    let enabled = Signal::new(true);
    let x = Signal::new(0);
    let (runs, runs_clone) = counter();

    let (flag, x_clone) = (enabled.clone(), x.clone());
    let effect = Effect::new(move || {
        if flag.get() {
            x_clone.get();
        }
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    x.set(1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    enabled.set(false);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(x.subscriber_count(), 0);
    assert_eq!(effect.dependency_count(), 1);

    for i in 2..20 {
        x.set(i);
    }
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// A disposed effect never runs again and leaves no edges behind.
#[test]
fn disposed_effect_releases_edges() {
    let a = Signal::new(0);
    let b = Signal::new(0);
    let (runs, runs_clone) = counter();

    let (a_clone, b_clone) = (a.clone(), b.clone());
    let effect = Effect::new(move || {
        a_clone.get();
        b_clone.get();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(a.subscriber_count(), 1);
    assert_eq!(b.subscriber_count(), 1);

    effect.dispose();
    effect.dispose();

    for i in 0..100 {
        a.set(i);
        b.set(i);
    }

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(a.subscriber_count(), 0);
    assert_eq!(b.subscriber_count(), 0);
}

/// Disposing an effect inside a batch cancels its pending run.
#[test]
fn dispose_inside_batch_cancels_pending_run() {
    let signal = Signal::new(0);
    let (runs, runs_clone) = counter();

    let signal_clone = signal.clone();
    let effect = Effect::new(move || {
        signal_clone.get();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    batch(|| {
        signal.set(1);
        effect.dispose();
    });

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// A memo that reads itself reports a cycle instead of recursing.
#[test]
fn self_reading_memo_is_a_cycle() {
    let slot: Arc<Mutex<Option<Memo<i32>>>> = Arc::new(Mutex::new(None));

    let slot_clone = slot.clone();
    let memo = Memo::new_fallible(move || {
        let me = slot_clone.lock().clone();
        Ok(me.map(|m| m.try_get()).transpose()?.unwrap_or(0) + 1)
    });
    *slot.lock() = Some(memo.clone());

    assert!(memo.try_get().unwrap_err().is_cycle());
    // Still failing on retry, still no infinite loop
    assert!(memo.try_get().unwrap_err().is_cycle());

    slot.lock().take();
}

/// A cycle through two memos is caught as well.
#[test]
fn mutual_recursion_is_a_cycle() {
    let slot: Arc<Mutex<Option<Memo<i32>>>> = Arc::new(Mutex::new(None));

    let slot_clone = slot.clone();
    let a = Memo::new_fallible(move || {
        let b = slot_clone.lock().clone();
        match b {
            Some(b) => Ok(b.try_get()? + 1),
            None => Ok(0),
        }
    });

    let a_clone = a.clone();
    let b = Memo::new_fallible(move || Ok(a_clone.try_get()? + 1));
    *slot.lock() = Some(b.clone());

    let error = a.try_get().unwrap_err();
    assert_eq!(error, ReactiveError::CyclicDependency { node: a.id() });

    slot.lock().take();
}

/// The infallible read path panics on a cycle.
#[test]
#[should_panic(expected = "cyclic dependency")]
fn infallible_get_panics_on_cycle() {
    let slot: Arc<Mutex<Option<Memo<i32>>>> = Arc::new(Mutex::new(None));

    let slot_clone = slot.clone();
    let memo = Memo::new(move || {
        let me = slot_clone.lock().clone();
        me.map(|m| m.get()).unwrap_or(0)
    });
    *slot.lock() = Some(memo.clone());

    memo.get();
}

/// A 100-deep chain evaluates to source + 100 and is free to re-read.
#[test]
fn deep_chain_evaluates_once() {
    let source = Signal::new(7);
    let mut chain: Vec<Memo<i64>> = Vec::new();

    let mut prev: Arc<dyn Readable<i64> + Send + Sync> = Arc::new(source.clone());
    for _ in 0..100 {
        let current = prev.clone();
        let memo = Memo::new(move || current.get() + 1);
        chain.push(memo.clone());
        prev = Arc::new(memo);
    }

    let tail = chain.last().unwrap().clone();
    assert_eq!(tail.get(), 107);
    assert!(chain.iter().all(|m| m.compute_count() == 1));

    assert_eq!(tail.get(), 107);
    assert!(chain.iter().all(|m| m.compute_count() == 1));

    source.set(10);
    assert_eq!(tail.get(), 110);
    assert!(chain.iter().all(|m| m.compute_count() == 2));
}

/// A failing memo does not poison the rest of the graph.
#[test]
fn compute_failure_is_isolated_to_its_node() {
    let input = Signal::new(4);

    let i = input.clone();
    let checked = Memo::new_fallible(move || {
        let value = i.get();
        if value == 0 {
            Err(ReactiveError::compute("zero divisor"))
        } else {
            Ok(100 / value)
        }
    });
    let i = input.clone();
    let plain = Memo::new(move || i.get() + 1);

    assert_eq!(checked.try_get(), Ok(25));

    input.set(0);
    assert_eq!(checked.try_get(), Err(ReactiveError::compute("zero divisor")));
    assert_eq!(plain.get(), 1);

    input.set(5);
    assert_eq!(checked.try_get(), Ok(20));
}

/// Readers that fell back on an error pick up the recovered value, even
/// when it equals the value from before the failure.
#[test]
fn readers_recover_after_upstream_failure() {
    let input = Signal::new(3);

    let i = input.clone();
    let checked = Memo::new_fallible(move || {
        if i.get() < 0 {
            Err(ReactiveError::compute("negative"))
        } else {
            Ok(10)
        }
    });

    let c = checked.clone();
    let fallback = Memo::new(move || c.try_get().unwrap_or(-1));
    let seen = Arc::new(AtomicI32::new(0));
    let (c, s) = (checked.clone(), seen.clone());
    let _effect = Effect::new(move || s.store(c.try_get().unwrap_or(-1), Ordering::SeqCst));

    assert_eq!(fallback.get(), 10);
    assert_eq!(seen.load(Ordering::SeqCst), 10);

    input.set(-1);
    assert_eq!(fallback.get(), -1);
    assert_eq!(seen.load(Ordering::SeqCst), -1);

    input.set(2);
    assert_eq!(fallback.get(), 10);
    assert_eq!(seen.load(Ordering::SeqCst), 10);
}

/// One failing effect in a flush does not stop the others.
#[test]
fn failing_effect_does_not_abort_flush() {
    let signal = Signal::new(0);
    let (runs, runs_clone) = counter();

    let s = signal.clone();
    let failing = Effect::new_fallible(move || {
        if s.get() > 0 {
            return Err(ReactiveError::compute("refused"));
        }
        Ok(())
    });
    let s = signal.clone();
    let _healthy = Effect::new(move || {
        s.get();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    signal.set(1);

    assert_eq!(failing.last_error(), Some(ReactiveError::compute("refused")));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// An effect reading a memo follows it through the chain.
#[test]
fn effect_observes_memo_chain() {
    let base = Signal::new(5);

    let b = base.clone();
    let doubled = Memo::new(move || b.get() * 2);
    let d = doubled.clone();
    let plus_ten = Memo::new(move || d.get() + 10);

    let observed = Arc::new(AtomicI32::new(0));
    let (p, o) = (plus_ten.clone(), observed.clone());
    let _effect = Effect::new(move || o.store(p.get(), Ordering::SeqCst));
    assert_eq!(observed.load(Ordering::SeqCst), 20);

    base.set(10);
    assert_eq!(observed.load(Ordering::SeqCst), 30);
    assert_eq!(doubled.get(), 20);
}

/// Untracked reads inside an effect do not subscribe it.
#[test]
fn untracked_reads_do_not_subscribe() {
    let tracked = Signal::new(0);
    let ignored = Signal::new(0);
    let (runs, runs_clone) = counter();

    let (t, i) = (tracked.clone(), ignored.clone());
    let _effect = Effect::new(move || {
        t.get();
        untracked(|| i.get());
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    ignored.set(1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(ignored.subscriber_count(), 0);

    tracked.set(1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// An effect writing to another signal drives a second effect in the same flush.
#[test]
fn effects_can_write_signals_during_flush() {
    let input = Signal::new(1);
    let mirror = Signal::new(0);

    let (i, m) = (input.clone(), mirror.clone());
    let _copy = Effect::new(move || m.set(i.get()));

    let seen = Arc::new(AtomicI32::new(0));
    let (m, s) = (mirror.clone(), seen.clone());
    let _watch = Effect::new(move || s.store(m.get(), Ordering::SeqCst));
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    input.set(9);
    assert_eq!(mirror.get(), 9);
    assert_eq!(seen.load(Ordering::SeqCst), 9);
}

/// Handles can be shared across threads; operations are serialized.
#[test]
fn signals_are_usable_from_several_threads() {
    let signal = Signal::new(0u64);
    let s = signal.clone();
    let total = Memo::new(move || s.get());

    let (runs, runs_clone) = counter();
    let t = total.clone();
    let _effect = Effect::new(move || {
        t.get();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let signal = signal.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    signal.update(|v| v + 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(total.get(), 100);
    assert_eq!(runs.load(Ordering::SeqCst), 101);
    assert!(!Runtime::is_tracking());
}
