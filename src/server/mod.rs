//! Server side of the tree: the authoritative root and its dispatch loop.
//!
//! # Architecture
//!
//! ```text
//! transport ──inbound──► ProcessingThread ──lock──► Arc<Mutex<Component>>
//!     ▲                        │                         │ EventSink
//!     └───────outbound─────────┘                         ▼
//!     ▲                                          NotificationQueue
//!     └──── tree_updated broadcast ◄── ServerNotifier ◄──┘ (flush on owner thread)
//! ```
//!
//! [`ServerRoot`] is owned by one thread (it holds the notification queue,
//! which is not `Send`). Signal dispatch may run on the processing thread;
//! notifications raised there are buffered until the owner calls
//! [`ServerRoot::flush_notifications`].

pub mod processing;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::component::variants::ROOT_TYPE;
use crate::component::{BuilderRegistry, Component};
use crate::config::Config;
use crate::constants::EVENT_TREE_UPDATED;
use crate::error::Result;
use crate::journal::Journal;
use crate::notification::{Notification, NotificationQueue, Notifier};
use crate::uri::Uri;
use crate::xml::SignalFrame;

pub use processing::{Dispatcher, ProcessingThread};

/// Turns `tree_updated` notifications into broadcast frames.
///
/// At most one broadcast goes out per flush, however many structural
/// changes were buffered.
#[derive(Debug)]
pub struct ServerNotifier {
    outbound: mpsc::Sender<SignalFrame>,
    root_path: Uri,
    server_id: String,
    sent_this_flush: bool,
    broadcasts: usize,
}

impl ServerNotifier {
    fn on_tree_updated(&mut self, notification: &Notification) {
        if self.sent_this_flush {
            return;
        }
        self.sent_this_flush = true;
        log::debug!("Broadcasting tree update (first change at {})", notification.path);
        let frame = SignalFrame::new(EVENT_TREE_UPDATED, self.root_path.clone(), self.server_id.as_str());
        if self.outbound.send(frame).is_ok() {
            self.broadcasts += 1;
        }
    }

    /// Broadcast frames sent so far.
    pub fn broadcasts(&self) -> usize {
        self.broadcasts
    }
}

impl Notifier for ServerNotifier {
    fn begin_notify(&mut self) {
        self.sent_this_flush = false;
    }
}

/// Authoritative component tree plus its dispatch machinery.
pub struct ServerRoot {
    config: Config,
    dispatcher: Dispatcher,
    queue: NotificationQueue,
    notifier: Rc<RefCell<ServerNotifier>>,
    inbound_tx: mpsc::Sender<SignalFrame>,
    inbound_rx: Option<mpsc::Receiver<SignalFrame>>,
    outbound_rx: mpsc::Receiver<SignalFrame>,
    outbound_tx: mpsc::Sender<SignalFrame>,
    processing: Option<ProcessingThread>,
}

impl std::fmt::Debug for ServerRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerRoot")
            .field("root_name", &self.config.root_name)
            .field("journal", &self.dispatcher.journal.is_some())
            .field("processing", &self.processing)
            .finish_non_exhaustive()
    }
}

impl ServerRoot {
    /// Build the root through `registry` and wire up notifications.
    ///
    /// Fails with `TypeNotFound` if no `Root` builder is registered.
    pub fn new(config: Config, registry: BuilderRegistry) -> Result<Self> {
        let mut root = registry.create(ROOT_TYPE, &config.root_name)?;
        let mut queue = NotificationQueue::new();
        root.set_event_sink(Some(queue.sink()));

        let (inbound_tx, inbound_rx) = mpsc::channel();
        let (outbound_tx, outbound_rx) = mpsc::channel();

        let notifier = Rc::new(RefCell::new(ServerNotifier {
            outbound: outbound_tx.clone(),
            root_path: Uri::root(&config.root_name),
            server_id: config.client_id.clone(),
            sent_this_flush: false,
            broadcasts: 0,
        }));
        queue.add_notifier(EVENT_TREE_UPDATED, ServerNotifier::on_tree_updated, &notifier);

        let journal = config
            .journal_enabled
            .then(|| Arc::new(Mutex::new(Journal::new())));

        let dispatcher = Dispatcher {
            root: Arc::new(Mutex::new(root)),
            journal,
            registry: Arc::new(registry),
            delimiter: config.array_delimiter.clone(),
            server_id: config.client_id.clone(),
        };

        log::info!("Server root '{}' ready", config.root_name);
        Ok(Self {
            config,
            dispatcher,
            queue,
            notifier,
            inbound_tx,
            inbound_rx: Some(inbound_rx),
            outbound_rx,
            outbound_tx,
            processing: None,
        })
    }

    /// Mirror journal entries to a JSON-lines file.
    ///
    /// Ignored when journaling is disabled.
    pub fn set_journal_file(&mut self, path: impl Into<std::path::PathBuf>) {
        if let Some(journal) = &self.dispatcher.journal {
            let mut journal = processing::lock(journal, "Journal");
            if journal.is_empty() {
                *journal = Journal::with_file(path);
            } else {
                log::warn!("Journal already has entries, keeping it in memory only");
            }
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared root handle.
    pub fn root(&self) -> Arc<Mutex<Component>> {
        Arc::clone(&self.dispatcher.root)
    }

    /// Run `f` on the root under its lock.
    pub fn with_root<R>(&self, f: impl FnOnce(&mut Component) -> R) -> R {
        let mut root = processing::lock(&self.dispatcher.root, "Root");
        f(&mut root)
    }

    /// Shared journal handle, `None` when journaling is disabled.
    pub fn journal(&self) -> Option<Arc<Mutex<Journal>>> {
        self.dispatcher.journal.as_ref().map(Arc::clone)
    }

    /// Builder registry the root was built with.
    pub fn registry(&self) -> &BuilderRegistry {
        &self.dispatcher.registry
    }

    /// Sender a transport uses to queue inbound frames.
    pub fn inbound(&self) -> mpsc::Sender<SignalFrame> {
        self.inbound_tx.clone()
    }

    /// Queue an inbound frame for the processing thread.
    pub fn submit(&self, frame: SignalFrame) {
        let _ = self.inbound_tx.send(frame);
    }

    /// Start the processing thread. No-op if it already ran.
    pub fn start(&mut self) {
        let Some(inbound_rx) = self.inbound_rx.take() else {
            log::warn!("Processing thread already started");
            return;
        };
        self.processing = Some(ProcessingThread::spawn(
            self.dispatcher.clone(),
            inbound_rx,
            self.outbound_tx.clone(),
            self.config.poll_interval(),
        ));
    }

    /// Stop and join the processing thread.
    pub fn stop(&mut self) {
        if let Some(processing) = self.processing.take() {
            drop(processing);
            log::info!("Processing thread stopped");
        }
    }

    /// Returns `true` while the processing thread runs.
    pub fn is_running(&self) -> bool {
        self.processing.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Dispatch `frame` on the calling thread, then flush notifications.
    pub fn process_now(&mut self, frame: &SignalFrame) -> Option<SignalFrame> {
        let reply = self.dispatcher.process(frame);
        self.flush_notifications();
        reply
    }

    /// Deliver buffered notifications. Returns how many were delivered.
    pub fn flush_notifications(&mut self) -> usize {
        self.queue.flush()
    }

    /// Number of buffered notifications.
    pub fn pending_notifications(&mut self) -> usize {
        self.queue.nb_notifications(None)
    }

    /// Broadcast frames sent so far.
    pub fn broadcasts(&self) -> usize {
        self.notifier.borrow().broadcasts()
    }

    /// Next outbound frame, if any.
    pub fn try_recv(&self) -> Option<SignalFrame> {
        self.outbound_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next outbound frame.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SignalFrame> {
        self.outbound_rx.recv_timeout(timeout).ok()
    }

    /// Every outbound frame currently queued.
    pub fn drain_outbound(&self) -> Vec<SignalFrame> {
        self.outbound_rx.try_iter().collect()
    }
}

impl Drop for ServerRoot {
    fn drop(&mut self) {
        self.stop();
    }
}
