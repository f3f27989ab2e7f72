//! The cooperative scheduler: timeouts, idle handlers, and the driver wait.
//!
//! A [`MainLoop`] runs on the UI thread. Its queues live behind a cloneable
//! [`LoopHandle`] that may be moved to other threads; every mutation through
//! the handle wakes the loop so foreign work is never parked behind the next
//! unrelated input event.
//!
//! Callbacks receive `&mut C`, the context the loop is driving (the
//! [`Application`](crate::Application) in practice), and are never invoked
//! while a queue lock is held, so they may freely add or remove timeouts and
//! idle handlers.

use crate::event::InputEvent;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A thread-safe way to interrupt a blocking [`MainLoopDriver::events_pending`].
pub trait Wakeup: Send + Sync {
    fn wake(&self);
}

/// The input side of a console back-end, as consumed by the scheduler.
pub trait MainLoopDriver {
    /// Prepare the driver and return the waker other threads use to interrupt
    /// a blocking wait.
    fn setup(&mut self) -> crate::Result<Arc<dyn Wakeup>>;

    /// Wait up to `timeout` (`None` = indefinitely) for input or a wakeup.
    /// Returns `true` when input is ready to be collected by
    /// [`iteration`](MainLoopDriver::iteration).
    fn events_pending(&mut self, timeout: Option<Duration>) -> bool;

    /// Collect all input that arrived since the previous call.
    fn iteration(&mut self) -> Vec<InputEvent>;

    /// Release whatever [`setup`](MainLoopDriver::setup) acquired.
    fn tear_down(&mut self);
}

type TimeoutFn<C> = Box<dyn FnMut(&mut C) -> bool + Send>;
type IdleFn<C> = Box<dyn FnMut(&mut C) -> bool + Send>;

/// Token returned by [`LoopHandle::add_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutId(u64);

/// Token returned by [`LoopHandle::add_idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdleId(u64);

struct Timeout<C> {
    id: u64,
    period: Duration,
    callback: TimeoutFn<C>,
}

/// Callbacks currently executing are out of their queue; removals aimed at
/// them are parked in `cancelled` and honoured when they would be requeued.
struct TimeoutQueue<C> {
    entries: BTreeMap<u64, Timeout<C>>,
    firing: HashSet<u64>,
    cancelled: HashSet<u64>,
}

struct IdleQueue<C> {
    handlers: Vec<(u64, IdleFn<C>)>,
    firing: HashSet<u64>,
    cancelled: HashSet<u64>,
}

struct Queues<C> {
    epoch: Instant,
    timeouts: Mutex<TimeoutQueue<C>>,
    idles: Mutex<IdleQueue<C>>,
    next_id: AtomicU64,
    running: AtomicBool,
    closed: AtomicBool,
    waker: Mutex<Option<Arc<dyn Wakeup>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe access to a [`MainLoop`]'s queues.
///
/// `LoopHandle` is [`Clone`] and [`Send`]; clones share the same queues.
pub struct LoopHandle<C: 'static> {
    inner: Arc<Queues<C>>,
}

impl<C: 'static> Clone for LoopHandle<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: 'static> LoopHandle<C> {
    fn new() -> Self {
        Self {
            inner: Arc::new(Queues {
                epoch: Instant::now(),
                timeouts: Mutex::new(TimeoutQueue {
                    entries: BTreeMap::new(),
                    firing: HashSet::new(),
                    cancelled: HashSet::new(),
                }),
                idles: Mutex::new(IdleQueue {
                    handlers: Vec::new(),
                    firing: HashSet::new(),
                    cancelled: HashSet::new(),
                }),
                next_id: AtomicU64::new(1),
                running: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                waker: Mutex::new(None),
            }),
        }
    }

    /// Run `callback` after `period`, and again every `period` for as long as
    /// it returns `true`.
    pub fn add_timeout(
        &self,
        period: Duration,
        callback: impl FnMut(&mut C) -> bool + Send + 'static,
    ) -> TimeoutId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.schedule(Timeout {
            id,
            period,
            callback: Box::new(callback),
        });
        self.wake();
        TimeoutId(id)
    }

    /// Remove a timeout. Returns `false` if it already fired for the last time.
    pub fn remove_timeout(&self, id: TimeoutId) -> bool {
        let mut queue = lock(&self.inner.timeouts);
        let key = queue
            .entries
            .iter()
            .find(|(_, t)| t.id == id.0)
            .map(|(k, _)| *k);
        if let Some(key) = key {
            queue.entries.remove(&key);
            return true;
        }
        if queue.firing.contains(&id.0) {
            queue.cancelled.insert(id.0);
            return true;
        }
        false
    }

    /// Run `callback` once per iteration for as long as it returns `true`.
    pub fn add_idle(&self, callback: impl FnMut(&mut C) -> bool + Send + 'static) -> IdleId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.idles)
            .handlers
            .push((id, Box::new(callback)));
        self.wake();
        IdleId(id)
    }

    /// Remove an idle handler. Returns `false` if it is no longer queued.
    pub fn remove_idle(&self, id: IdleId) -> bool {
        let mut queue = lock(&self.inner.idles);
        if let Some(pos) = queue.handlers.iter().position(|(h, _)| *h == id.0) {
            queue.handlers.remove(pos);
            return true;
        }
        if queue.firing.contains(&id.0) {
            queue.cancelled.insert(id.0);
            return true;
        }
        false
    }

    /// Ask a running [`MainLoop::run`] to return after its current iteration.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.wake();
    }

    /// Interrupt a blocking wait without queueing any work.
    pub fn wake(&self) {
        if let Some(waker) = lock(&self.inner.waker).as_ref() {
            waker.wake();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Whether the loop has been torn down.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn timeout_count(&self) -> usize {
        lock(&self.inner.timeouts).entries.len()
    }

    pub fn idle_count(&self) -> usize {
        lock(&self.inner.idles).handlers.len()
    }

    fn ticks(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.inner.epoch).as_nanos() as u64
    }

    fn schedule(&self, timeout: Timeout<C>) {
        let key = self.ticks(Instant::now() + timeout.period);
        let mut queue = lock(&self.inner.timeouts);
        let key = nudge_to_unique_key(&queue.entries, key);
        queue.entries.insert(key, timeout);
    }

    /// How long the driver may block before a timer or idle handler is due.
    fn wait_budget(&self) -> Option<Duration> {
        if !lock(&self.inner.idles).handlers.is_empty() {
            return Some(Duration::ZERO);
        }
        let next = lock(&self.inner.timeouts).entries.keys().next().copied()?;
        let now = self.ticks(Instant::now());
        Some(Duration::from_nanos(next.saturating_sub(now)))
    }

    fn has_due_work(&self) -> bool {
        if !lock(&self.inner.idles).handlers.is_empty() {
            return true;
        }
        let now = self.ticks(Instant::now());
        lock(&self.inner.timeouts)
            .entries
            .keys()
            .next()
            .is_some_and(|k| *k <= now)
    }

    fn fire_timeouts(&self, ctx: &mut C) {
        let now = self.ticks(Instant::now());
        let due: Vec<Timeout<C>> = {
            let mut queue = lock(&self.inner.timeouts);
            let later = queue.entries.split_off(&now.saturating_add(1));
            let due = std::mem::replace(&mut queue.entries, later);
            queue.firing.extend(due.values().map(|t| t.id));
            due.into_values().collect()
        };

        for mut timeout in due {
            let again = (timeout.callback)(ctx);
            let cancelled = {
                let mut queue = lock(&self.inner.timeouts);
                queue.firing.remove(&timeout.id);
                queue.cancelled.remove(&timeout.id)
            };
            if again && !cancelled {
                // Rescheduled from now, so a late loop fires once, not once per missed period.
                self.schedule(timeout);
            }
        }
    }

    /// Drop every queued callback, outside the locks.
    fn clear(&self) {
        let timeouts = std::mem::take(&mut lock(&self.inner.timeouts).entries);
        let idles = std::mem::take(&mut lock(&self.inner.idles).handlers);
        drop(timeouts);
        drop(idles);
    }

    fn run_idles(&self, ctx: &mut C) {
        let batch = {
            let mut queue = lock(&self.inner.idles);
            let batch = std::mem::take(&mut queue.handlers);
            queue.firing.extend(batch.iter().map(|(id, _)| *id));
            batch
        };

        for (id, mut idle) in batch {
            let keep = idle(ctx);
            let mut queue = lock(&self.inner.idles);
            queue.firing.remove(&id);
            let cancelled = queue.cancelled.remove(&id);
            if keep && !cancelled {
                queue.handlers.push((id, idle));
            }
        }
    }
}

fn nudge_to_unique_key<T>(entries: &BTreeMap<u64, T>, mut key: u64) -> u64 {
    while entries.contains_key(&key) {
        key += 1;
    }
    key
}

/// The scheduler driving one UI thread.
///
/// Cloning a `MainLoop` is cheap and yields another reference to the same
/// loop, which lets a callback run a nested loop (e.g. a modal dialog) while
/// an outer iteration is on the stack.
pub struct MainLoop<C: 'static> {
    handle: LoopHandle<C>,
    driver: Rc<RefCell<Box<dyn MainLoopDriver>>>,
}

impl<C: 'static> Clone for MainLoop<C> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            driver: Rc::clone(&self.driver),
        }
    }
}

impl<C: 'static> MainLoop<C> {
    /// Take ownership of `driver` and run its setup.
    pub fn new(mut driver: Box<dyn MainLoopDriver>) -> crate::Result<Self> {
        let waker = driver.setup()?;
        let handle = LoopHandle::new();
        *lock(&handle.inner.waker) = Some(waker);
        Ok(Self {
            handle,
            driver: Rc::new(RefCell::new(driver)),
        })
    }

    /// A thread-safe handle to this loop's queues.
    pub fn handle(&self) -> &LoopHandle<C> {
        &self.handle
    }

    pub fn add_timeout(
        &self,
        period: Duration,
        callback: impl FnMut(&mut C) -> bool + Send + 'static,
    ) -> TimeoutId {
        self.handle.add_timeout(period, callback)
    }

    pub fn remove_timeout(&self, id: TimeoutId) -> bool {
        self.handle.remove_timeout(id)
    }

    pub fn add_idle(&self, callback: impl FnMut(&mut C) -> bool + Send + 'static) -> IdleId {
        self.handle.add_idle(callback)
    }

    pub fn remove_idle(&self, id: IdleId) -> bool {
        self.handle.remove_idle(id)
    }

    /// Check for pending work. With `wait`, block until input arrives, a timer
    /// comes due, or another thread wakes the loop; otherwise poll once.
    pub fn events_pending(&self, wait: bool) -> bool {
        let budget = if wait {
            self.handle.wait_budget()
        } else {
            Some(Duration::ZERO)
        };
        let input = self.driver.borrow_mut().events_pending(budget);
        input || self.handle.has_due_work()
    }

    /// Fire elapsed timeouts, hand collected input to `on_input`, then drain
    /// the idle queue once.
    ///
    /// Idle handlers added while the queue drains run on the next iteration.
    pub fn run_iteration(&self, ctx: &mut C, mut on_input: impl FnMut(&mut C, InputEvent)) {
        self.handle.fire_timeouts(ctx);

        let input = self.driver.borrow_mut().iteration();
        for event in input {
            on_input(ctx, event);
        }

        if self.handle.idle_count() > 0 {
            self.handle.run_idles(ctx);
        }
    }

    /// Iterate until [`stop`](MainLoop::stop) is called.
    pub fn run(&self, ctx: &mut C, mut on_input: impl FnMut(&mut C, InputEvent)) {
        self.handle.inner.running.store(true, Ordering::SeqCst);
        while self.handle.is_running() {
            if self.events_pending(true) {
                self.run_iteration(ctx, &mut on_input);
            }
        }
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.handle.inner.running.store(running, Ordering::SeqCst);
    }

    /// Tear the driver down, drop queued callbacks and mark the loop closed.
    pub fn tear_down(&self) {
        self.handle.inner.running.store(false, Ordering::SeqCst);
        self.handle.inner.closed.store(true, Ordering::SeqCst);
        self.handle.clear();
        self.driver.borrow_mut().tear_down();
        tracing::debug!("main loop torn down");
    }
}
