//! Topic based pub/sub, independent of the gadget graph.
use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    rc::Rc,
};
use tracing::trace;

use crate::{message::Message, scheduler::Tick};

pub type NotificationCallback = Rc<dyn Fn(&Message)>;

/// A registered interest in one topic.
pub struct NotificationHandler {
    id: u64,
    topic: String,
    period: Option<Tick>,
    callback: NotificationCallback,
}

impl NotificationHandler {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn period(&self) -> Option<Tick> {
        self.period
    }
}

/// Handle returned by [`Notifier::on`], used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Calls the handlers interested in a topic.
#[derive(Default)]
pub struct Notifier {
    handlers: RefCell<HashMap<String, Vec<Rc<NotificationHandler>>>>,
    next_id: Cell<u64>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic.
    pub fn on<F>(&self, topic: &str, callback: F) -> Subscription
    where
        F: Fn(&Message) + 'static,
    {
        self.subscribe(topic, None, Rc::new(callback))
    }

    /// Subscribe to a topic, recording the period at which the publisher is
    /// expected to trigger it.
    pub fn on_every<F>(&self, topic: &str, period: Tick, callback: F) -> Subscription
    where
        F: Fn(&Message) + 'static,
    {
        self.subscribe(topic, Some(period), Rc::new(callback))
    }

    fn subscribe(&self, topic: &str, period: Option<Tick>, callback: NotificationCallback) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let handler = Rc::new(NotificationHandler {
            id,
            topic: topic.to_string(),
            period,
            callback,
        });
        self.handlers
            .borrow_mut()
            .entry(topic.to_string())
            .or_default()
            .push(handler);
        Subscription {
            topic: topic.to_string(),
            id,
        }
    }

    /// Unsubscribe exactly one handler. Returns false if it was not registered.
    pub fn off(&self, subscription: &Subscription) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let Some(list) = handlers.get_mut(&subscription.topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| h.id != subscription.id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(&subscription.topic);
        }
        removed
    }

    /// Trigger a topic.
    ///
    /// The handler list is captured on entry: handlers subscribed or removed by
    /// a callback only take effect from the next call.
    pub fn notify(&self, topic: &str, args: impl Into<Message>) {
        let snapshot: Vec<Rc<NotificationHandler>> = self
            .handlers
            .borrow()
            .get(topic)
            .cloned()
            .unwrap_or_default();
        if snapshot.is_empty() {
            trace!(topic, "notify without handlers");
            return;
        }
        let args = args.into();
        trace!(topic, handlers = snapshot.len(), %args, "notify");
        for handler in snapshot {
            (handler.callback)(&args);
        }
    }

    /// Handlers currently registered for `topic`, in registration order.
    pub fn handlers(&self, topic: &str) -> Vec<Rc<NotificationHandler>> {
        self.handlers.borrow().get(topic).cloned().unwrap_or_default()
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        self.handlers.borrow().get(topic).map_or(0, Vec::len)
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.borrow().keys().cloned().collect();
        topics.sort();
        topics
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("topics", &self.topics())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg;

    #[test]
    fn test_one_notification() {
        let called = Rc::new(Cell::new(false));
        let nf = Notifier::new();
        let flag = Rc::clone(&called);
        nf.on("ping", move |_| flag.set(true));

        assert!(!called.get(), "event fired too soon");
        nf.notify("ping", Message::bang());
        assert!(called.get(), "event did not fire");
    }

    #[test]
    fn test_different_and_multiple_notifications() {
        let calls = Rc::new(Cell::new(0));
        let nf = Notifier::new();
        for (topic, amount) in [("ping", 1), ("pong", 10), ("pong", 100), ("blah", 1000)] {
            let calls = Rc::clone(&calls);
            nf.on(topic, move |_| calls.set(calls.get() + amount));
        }

        nf.notify("ping", Message::bang());
        nf.notify("pong", Message::bang());
        nf.notify("ping", Message::bang());
        nf.notify("pong", Message::bang());
        nf.notify("ping", Message::bang());

        assert_eq!(calls.get(), 223);
    }

    #[test]
    fn test_notification_with_args() {
        let seen = Rc::new(RefCell::new(Message::bang()));
        let nf = Notifier::new();
        let store = Rc::clone(&seen);
        nf.on("ping", move |m| *store.borrow_mut() = m.clone());

        nf.notify("ping", msg![1, "a", msg![]]);

        assert_eq!(seen.borrow().to_string(), "1 a []");
    }

    #[test]
    fn test_notification_off_keeps_other_handlers() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let nf = Notifier::new();
        let subs: Vec<Subscription> = (0..3)
            .map(|i| {
                let log = Rc::clone(&log);
                nf.on("ping", move |_| log.borrow_mut().push(i))
            })
            .collect();

        nf.notify("ping", Message::bang());
        assert!(nf.off(&subs[1]));
        assert!(!nf.off(&subs[1]));
        nf.notify("ping", Message::bang());

        assert_eq!(*log.borrow(), vec![0, 1, 2, 0, 2]);
        assert_eq!(nf.handler_count("ping"), 2);
    }

    #[test]
    fn test_unknown_topic_is_a_noop() {
        let nf = Notifier::new();
        nf.notify("nobody", Message::from(1));
        assert!(nf.topics().is_empty());
    }

    #[test]
    fn test_changes_during_notify_wait_for_next_call() {
        let nf = Rc::new(Notifier::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let late_sub = {
            let log = Rc::clone(&log);
            nf.on("tick", move |_| log.borrow_mut().push("second"))
        };
        let first = {
            let log = Rc::clone(&log);
            let weak = Rc::downgrade(&nf);
            nf.on("tick", move |_| {
                log.borrow_mut().push("first");
                if let Some(nf) = weak.upgrade() {
                    nf.off(&late_sub);
                    let log = Rc::clone(&log);
                    nf.on("tick", move |_| log.borrow_mut().push("added"));
                }
            })
        };

        nf.notify("tick", Message::bang());
        assert_eq!(*log.borrow(), vec!["second", "first"]);

        nf.off(&first);
        nf.notify("tick", Message::bang());
        assert_eq!(*log.borrow(), vec!["second", "first", "added"]);
    }

    #[test]
    fn test_periodic_handler_records_period() {
        let nf = Notifier::new();
        let sub = nf.on_every("clock", 250, |_| {});
        let handlers = nf.handlers(sub.topic());
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].period(), Some(250));
        assert_eq!(handlers[0].topic(), "clock");
    }
}
