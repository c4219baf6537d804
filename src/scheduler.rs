//! Discrete virtual time.
//!
//! The clock only moves when [`Scheduler::run`] is called, and a run fires every
//! due timer instantly. Tests can simulate hours of activity with no real delay.
use std::{
    cell::{Cell, RefCell},
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    fmt,
    rc::Rc,
};
use tracing::{debug, trace};

/// A point in (or span of) virtual time.
pub type Tick = u64;

pub type TimerCallback = Rc<dyn Fn(&Scheduler)>;

/// Handle to a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct Timer {
    deadline: Tick,
    period: Option<Tick>,
    callback: TimerCallback,
}

/// One-shot and periodic timers over a logical clock that starts at 0.
///
/// Callbacks receive the scheduler, so they may set or cancel timers while a
/// run is in progress. Timers are ordered by deadline, then by the order in
/// which they were created.
#[derive(Default)]
pub struct Scheduler {
    now: Cell<Tick>,
    timers: RefCell<HashMap<TimerId, Timer>>,
    // entries whose deadline no longer matches the live timer are stale
    queue: RefCell<BinaryHeap<Reverse<(Tick, TimerId)>>>,
    next_id: Cell<u64>,
    running: Cell<bool>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Tick {
        self.now.get()
    }

    /// Fire `callback` once, `delay` ticks from now. Deadlines past the end
    /// of time are clamped to `Tick::MAX`.
    pub fn set_timer<F>(&self, delay: Tick, callback: F) -> TimerId
    where
        F: Fn(&Scheduler) + 'static,
    {
        self.schedule(delay, None, Rc::new(callback))
    }

    /// Fire `callback` every `period` ticks, the first time `period` ticks from now.
    ///
    /// # Panics
    ///
    /// Panics if `period` is 0, which would never let the clock advance.
    pub fn set_periodic<F>(&self, period: Tick, callback: F) -> TimerId
    where
        F: Fn(&Scheduler) + 'static,
    {
        assert!(period > 0, "periodic timers need a period of at least one tick");
        self.schedule(period, Some(period), Rc::new(callback))
    }

    fn schedule(&self, delay: Tick, period: Option<Tick>, callback: TimerCallback) -> TimerId {
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let deadline = self.now().saturating_add(delay);
        self.timers.borrow_mut().insert(
            id,
            Timer {
                deadline,
                period,
                callback,
            },
        );
        self.queue.borrow_mut().push(Reverse((deadline, id)));
        trace!(?id, deadline, ?period, "timer set");
        id
    }

    /// Remove a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        let removed = self.timers.borrow_mut().remove(&id).is_some();
        trace!(?id, removed, "timer cancelled");
        removed
    }

    /// The soonest pending deadline, if any timer is pending.
    pub fn next_timer(&self) -> Option<Tick> {
        let timers = self.timers.borrow();
        let mut queue = self.queue.borrow_mut();
        while let Some(&Reverse((deadline, id))) = queue.peek() {
            if timers.get(&id).is_some_and(|t| t.deadline == deadline) {
                return Some(deadline);
            }
            queue.pop();
        }
        None
    }

    /// Number of pending timers.
    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Advance the clock by `duration`, firing every timer that falls due.
    /// The clock stops at `Tick::MAX`.
    ///
    /// # Panics
    ///
    /// Panics when called from inside a timer callback.
    pub fn run(&self, duration: Tick) {
        assert!(!self.running.get(), "Scheduler::run is not re-entrant");
        let _running = RunningGuard::enter(&self.running);
        let end = self.now().saturating_add(duration);
        let mut fired = 0usize;
        while let Some(callback) = self.pop_due(end) {
            callback(self);
            fired += 1;
        }
        self.now.set(end);
        debug!(now = end, fired, "scheduler ran");
    }

    /// Advance the clock to the next deadline within `limit` ticks and fire
    /// everything due at that instant. Returns the new time, if anything fired.
    pub fn step(&self, limit: Tick) -> Option<Tick> {
        let next = self.next_timer()?;
        if next > self.now().saturating_add(limit) {
            return None;
        }
        self.run(next - self.now());
        Some(next)
    }

    /// Cancel every pending timer.
    pub fn stop(&self) {
        let count = self.timers.borrow().len();
        self.timers.borrow_mut().clear();
        self.queue.borrow_mut().clear();
        debug!(count, "scheduler stopped");
    }

    /// Take the next due timer, move the clock to its deadline and reschedule it
    /// when periodic. Returns its callback.
    fn pop_due(&self, end: Tick) -> Option<TimerCallback> {
        let mut timers = self.timers.borrow_mut();
        let mut queue = self.queue.borrow_mut();
        while let Some(&Reverse((deadline, id))) = queue.peek() {
            if deadline > end {
                return None;
            }
            queue.pop();
            let Some(timer) = timers.get_mut(&id) else {
                continue;
            };
            if timer.deadline != deadline {
                continue;
            }
            self.now.set(deadline);
            let callback = Rc::clone(&timer.callback);
            // a periodic timer whose next deadline is past the end of time retires
            match timer.period.and_then(|period| deadline.checked_add(period)) {
                Some(next) => {
                    timer.deadline = next;
                    queue.push(Reverse((next, id)));
                }
                None => {
                    timers.remove(&id);
                }
            }
            trace!(?id, now = deadline, "timer fired");
            return Some(callback);
        }
        None
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}

struct RunningGuard<'a>(&'a Cell<bool>);

impl<'a> RunningGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        RunningGuard(flag)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
