//! Buffered notification fan-out.
//!
//! Tree mutations and option changes raise `(event, path)` notifications.
//! They are buffered in arrival order and delivered to registered observers
//! only when the owning thread calls [`NotificationQueue::flush`].
//!
//! # Architecture
//!
//! ```text
//! Component ──EventSink (mpsc)──┐
//!                               ├──► NotificationQueue buffer ──flush──► callbacks
//! add_notification() ───────────┘
//! ```
//!
//! Components hold a cloneable [`EventSink`] so that a tree living behind a
//! mutex on another thread can still feed the queue. The queue itself is
//! single-threaded: receivers are `Rc<RefCell<_>>` and it is not `Send`.
//!
//! # Flush contract
//!
//! 1. Every registered receiver's [`Notifier::begin_notify`] runs exactly once.
//! 2. For each buffered notification, in arrival order, every callback
//!    registered for its event name runs, in registration order.
//! 3. The buffer is cleared.
//!
//! Callbacks must not borrow their receiver elsewhere during a flush, and
//! they cannot reach the queue itself.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc;

use crate::uri::Uri;

/// One buffered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Event name, e.g. `tree_updated`.
    pub event: String,
    /// Path of the component that raised it.
    pub path: Uri,
}

/// Cloneable producer side of a [`NotificationQueue`].
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<Notification>,
}

impl EventSink {
    /// Queue a notification. Dropped silently if the queue is gone.
    pub fn raise(&self, event: &str, path: &Uri) {
        let _ = self.tx.send(Notification { event: event.to_string(), path: path.clone() });
    }
}

/// Observer registered with a [`NotificationQueue`].
pub trait Notifier {
    /// Reset per-flush state. Runs once per flush, before any callback.
    fn begin_notify(&mut self) {}
}

/// Event callback of a receiver of type `R`.
pub type NotifyCallback<R> = fn(&mut R, &Notification);

/// Handle returned by [`NotificationQueue::add_notifier`].
pub type NotifierId = u64;

struct Registration {
    id: NotifierId,
    receiver: usize,
    callback: usize,
    call: Box<dyn Fn(&Notification)>,
}

/// Single-threaded buffer of notifications and their observers.
pub struct NotificationQueue {
    buffer: Vec<Notification>,
    rx: mpsc::Receiver<Notification>,
    tx: mpsc::Sender<Notification>,
    /// Event name -> callbacks in registration order.
    notifiers: HashMap<String, Vec<Registration>>,
    /// Receivers in registration order, one entry per distinct receiver.
    receivers: Vec<(usize, Rc<RefCell<dyn Notifier>>)>,
    next_id: NotifierId,
}

impl std::fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationQueue")
            .field("buffered", &self.buffer.len())
            .field("events", &self.notifiers.len())
            .field("receivers", &self.receivers.len())
            .finish_non_exhaustive()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            buffer: Vec::new(),
            rx,
            tx,
            notifiers: HashMap::new(),
            receivers: Vec::new(),
            next_id: 1,
        }
    }

    /// Producer handle for components.
    pub fn sink(&self) -> EventSink {
        EventSink { tx: self.tx.clone() }
    }

    /// Move notifications raised through sinks into the buffer.
    fn collect(&mut self) {
        while let Ok(notification) = self.rx.try_recv() {
            self.buffer.push(notification);
        }
    }

    /// Append a notification to the buffer.
    pub fn add_notification(&mut self, event: &str, path: &Uri) {
        self.collect();
        self.buffer.push(Notification { event: event.to_string(), path: path.clone() });
    }

    /// Number of buffered notifications, only those named `event` if given.
    pub fn nb_notifications(&mut self, event: Option<&str>) -> usize {
        self.collect();
        match event {
            Some(name) => self.buffer.iter().filter(|n| n.event == name).count(),
            None => self.buffer.len(),
        }
    }

    /// Buffered notifications, oldest first.
    pub fn pending(&mut self) -> &[Notification] {
        self.collect();
        &self.buffer
    }

    /// Register `callback` on `receiver` for `event`.
    ///
    /// Registering the same callback on the same receiver for the same event
    /// twice is logged and ignored; the first registration's id is returned.
    pub fn add_notifier<R: Notifier + 'static>(
        &mut self,
        event: &str,
        callback: NotifyCallback<R>,
        receiver: &Rc<RefCell<R>>,
    ) -> NotifierId {
        let receiver_key = Rc::as_ptr(receiver) as *const () as usize;
        let callback_key = callback as usize;

        let registrations = self.notifiers.entry(event.to_string()).or_default();
        if let Some(existing) = registrations
            .iter()
            .find(|r| r.receiver == receiver_key && r.callback == callback_key)
        {
            log::warn!("Notifier already registered for '{}', ignoring", event);
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;

        let target = Rc::clone(receiver);
        registrations.push(Registration {
            id,
            receiver: receiver_key,
            callback: callback_key,
            call: Box::new(move |n: &Notification| callback(&mut target.borrow_mut(), n)),
        });

        if !self.receivers.iter().any(|(key, _)| *key == receiver_key) {
            let erased: Rc<RefCell<dyn Notifier>> = Rc::<RefCell<R>>::clone(receiver);
            self.receivers.push((receiver_key, erased));
        }

        log::debug!("Registered notifier {} for '{}'", id, event);
        id
    }

    /// Remove a registration. Unknown ids are a no-op.
    pub fn remove_notifier(&mut self, id: NotifierId) {
        let mut removed_receiver = None;
        for registrations in self.notifiers.values_mut() {
            if let Some(pos) = registrations.iter().position(|r| r.id == id) {
                removed_receiver = Some(registrations.remove(pos).receiver);
            }
        }
        self.notifiers.retain(|_, regs| !regs.is_empty());

        if let Some(receiver) = removed_receiver {
            let still_used = self
                .notifiers
                .values()
                .flatten()
                .any(|r| r.receiver == receiver);
            if !still_used {
                self.receivers.retain(|(key, _)| *key != receiver);
            }
        }
    }

    /// Number of callbacks registered for `event`.
    pub fn notifier_count(&self, event: &str) -> usize {
        self.notifiers.get(event).map_or(0, Vec::len)
    }

    /// Deliver every buffered notification and clear the buffer.
    ///
    /// Returns the number of notifications delivered.
    pub fn flush(&mut self) -> usize {
        self.collect();

        for (_, receiver) in &self.receivers {
            receiver.borrow_mut().begin_notify();
        }

        let buffer = std::mem::take(&mut self.buffer);
        for notification in &buffer {
            if let Some(registrations) = self.notifiers.get(&notification.event) {
                for registration in registrations {
                    (registration.call)(notification);
                }
            }
        }

        log::trace!("Flushed {} notification(s)", buffer.len());
        buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
    }

    impl Notifier for Recorder {
        fn begin_notify(&mut self) {
            self.log.push("begin".to_string());
        }
    }

    fn on_first(r: &mut Recorder, n: &Notification) {
        r.log.push(format!("first:{}", n.path));
    }

    fn on_second(r: &mut Recorder, n: &Notification) {
        r.log.push(format!("second:{}", n.path));
    }

    #[test]
    fn test_flush_order() {
        let mut queue = NotificationQueue::new();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        queue.add_notifier("tree_updated", on_first, &recorder);
        queue.add_notifier("tree_updated", on_second, &recorder);

        queue.add_notification("tree_updated", &Uri::parse("/Root/a"));
        queue.add_notification("options_changed", &Uri::parse("/Root/a"));
        queue.add_notification("tree_updated", &Uri::parse("/Root/b"));

        assert_eq!(queue.flush(), 3);
        assert_eq!(
            recorder.borrow().log,
            vec![
                "begin",
                "first:/Root/a",
                "second:/Root/a",
                "first:/Root/b",
                "second:/Root/b"
            ]
        );
        assert_eq!(queue.nb_notifications(None), 0);
    }

    #[test]
    fn test_duplicate_registration_is_ignored() {
        let mut queue = NotificationQueue::new();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let a = queue.add_notifier("e", on_first, &recorder);
        let b = queue.add_notifier("e", on_first, &recorder);
        assert_eq!(a, b);
        assert_eq!(queue.notifier_count("e"), 1);
    }

    #[test]
    fn test_sink_feeds_buffer_in_order() {
        let mut queue = NotificationQueue::new();
        let sink = queue.sink();
        sink.raise("a", &Uri::parse("/x"));
        queue.add_notification("b", &Uri::parse("/y"));
        let events: Vec<_> = queue.pending().iter().map(|n| n.event.clone()).collect();
        assert_eq!(events, vec!["a", "b"]);
    }

    #[derive(Default)]
    struct Counter {
        begins: usize,
        hits: usize,
    }

    impl Notifier for Counter {
        fn begin_notify(&mut self) {
            self.begins += 1;
        }
    }

    fn on_count(c: &mut Counter, _: &Notification) {
        c.hits += 1;
    }

    #[test]
    fn test_distinct_receiver_types_share_a_queue() {
        let mut queue = NotificationQueue::new();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let counter = Rc::new(RefCell::new(Counter::default()));
        queue.add_notifier("tree_updated", on_first, &recorder);
        queue.add_notifier("tree_updated", on_count, &counter);
        queue.add_notifier("options_changed", on_count, &counter);

        queue.add_notification("tree_updated", &Uri::parse("/Root/a"));
        queue.add_notification("options_changed", &Uri::parse("/Root/a"));
        queue.add_notification("tree_updated", &Uri::parse("/Root/b"));
        assert_eq!(queue.nb_notifications(Some("tree_updated")), 2);
        assert_eq!(queue.nb_notifications(Some("options_changed")), 1);
        assert_eq!(queue.nb_notifications(Some("unknown")), 0);
        assert_eq!(queue.nb_notifications(None), 3);

        queue.flush();
        assert_eq!(counter.borrow().begins, 1);
        assert_eq!(counter.borrow().hits, 3);
        assert_eq!(recorder.borrow().log, vec!["begin", "first:/Root/a", "first:/Root/b"]);
    }

    #[test]
    fn test_remove_notifier() {
        let mut queue = NotificationQueue::new();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let id = queue.add_notifier("e", on_first, &recorder);
        queue.remove_notifier(id);
        queue.add_notification("e", &Uri::parse("/x"));
        queue.flush();
        assert!(recorder.borrow().log.is_empty());
    }
}
