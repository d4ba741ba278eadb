//! Signal processing off the listening thread.
//!
//! A transport pushes inbound frames into a channel; the processing thread
//! pulls them, dispatches each one under the root lock and pushes the reply
//! into the outbound channel. [`Dispatcher`] is the shared dispatch path,
//! also used synchronously by [`super::ServerRoot::process_now`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::component::{BuilderRegistry, Component};
use crate::constants::PROCESSING_JOIN_TIMEOUT;
use crate::journal::Journal;
use crate::signal::dispatch;
use crate::xml::SignalFrame;

/// Lock `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("{} lock was poisoned, recovering", what);
        poisoned.into_inner()
    })
}

/// Everything needed to turn a request frame into a reply.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    /// Shared tree root.
    pub root: Arc<Mutex<Component>>,
    /// Shared journal, `None` when journaling is disabled.
    pub journal: Option<Arc<Mutex<Journal>>>,
    /// Builders for `create_component`.
    pub registry: Arc<BuilderRegistry>,
    /// Delimiter for arrays written into replies.
    pub delimiter: String,
    /// Sender id stamped on replies.
    pub server_id: String,
}

impl Dispatcher {
    /// Dispatch a request and build its reply.
    ///
    /// Replies reaching the server are not answered. Both locks are released
    /// before this returns, whatever the outcome.
    pub fn process(&self, frame: &SignalFrame) -> Option<SignalFrame> {
        if frame.is_reply() {
            log::warn!(
                "Ignoring reply frame {} for '{}' from {}",
                frame.frame_id,
                frame.target,
                frame.sender
            );
            return None;
        }

        let mut root = lock(&self.root, "Root");
        let mut journal = self.journal.as_ref().map(|j| lock(j, "Journal"));
        let outcome = dispatch::dispatch(
            &mut root,
            frame,
            &self.registry,
            &self.delimiter,
            journal.as_deref_mut(),
        );
        Some(outcome.into_reply(frame, &self.server_id))
    }
}

/// Background thread running a [`Dispatcher`] over an inbound channel.
pub struct ProcessingThread {
    /// Shutdown flag shared with the thread.
    shutdown: Arc<AtomicBool>,
    /// Set while a frame is being dispatched.
    busy: Arc<AtomicBool>,
    /// Thread handle.
    thread_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ProcessingThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingThread")
            .field("shutdown", &self.shutdown.load(Ordering::SeqCst))
            .field("busy", &self.busy.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl ProcessingThread {
    /// Start processing `inbound`, sending replies to `outbound`.
    pub fn spawn(
        dispatcher: Dispatcher,
        inbound: mpsc::Receiver<SignalFrame>,
        outbound: mpsc::Sender<SignalFrame>,
        poll_interval: Duration,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let busy = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let busy_clone = Arc::clone(&busy);

        let thread_handle = thread::spawn(move || {
            Self::processing_loop(
                &dispatcher,
                &inbound,
                &outbound,
                &shutdown_clone,
                &busy_clone,
                poll_interval,
            );
        });

        Self { shutdown, busy, thread_handle: Some(thread_handle) }
    }

    fn processing_loop(
        dispatcher: &Dispatcher,
        inbound: &mpsc::Receiver<SignalFrame>,
        outbound: &mpsc::Sender<SignalFrame>,
        shutdown: &AtomicBool,
        busy: &AtomicBool,
        poll_interval: Duration,
    ) {
        log::info!("Processing thread started");

        loop {
            if shutdown.load(Ordering::SeqCst) {
                log::info!("Processing thread shutting down");
                break;
            }

            match inbound.recv_timeout(poll_interval) {
                Ok(frame) => {
                    busy.store(true, Ordering::SeqCst);
                    let _idle = scopeguard::guard((), |()| busy.store(false, Ordering::SeqCst));

                    if let Some(reply) = dispatcher.process(&frame) {
                        if outbound.send(reply).is_err() {
                            log::info!("Processing thread: reply channel closed");
                            break;
                        }
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    log::info!("Processing thread: inbound channel disconnected");
                    break;
                }
            }
        }
    }

    /// Returns `true` while a frame is being dispatched.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Returns `true` once the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread_handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Request shutdown. The thread exits after its current frame.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl Drop for ProcessingThread {
    fn drop(&mut self) {
        self.shutdown();
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        let deadline = Instant::now() + PROCESSING_JOIN_TIMEOUT;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            log::warn!("Processing thread still busy after shutdown, detaching");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::variants;
    use crate::uri::Uri;
    use crate::xml::Map;

    fn dispatcher() -> Dispatcher {
        let mut registry = BuilderRegistry::new();
        variants::register_core_builders(&mut registry);
        Dispatcher {
            root: Arc::new(Mutex::new(variants::root("Root"))),
            journal: Some(Arc::new(Mutex::new(Journal::new()))),
            registry: Arc::new(registry),
            delimiter: ";".to_string(),
            server_id: "server".to_string(),
        }
    }

    fn create(name: &str) -> SignalFrame {
        let mut args = Map::new();
        args.set_value("name", name.to_string()).unwrap();
        args.set_value("atype", "Group".to_string()).unwrap();
        SignalFrame::new("create_component", Uri::parse("/Root"), "client").with_args(args)
    }

    #[test]
    fn test_process_replies_and_journals() {
        let dispatcher = dispatcher();
        let frame = create("mesh");
        let reply = dispatcher.process(&frame).unwrap();
        assert!(reply.is_reply());
        assert!(!reply.is_error());
        assert_eq!(reply.frame_id, frame.frame_id);
        assert_eq!(reply.sender, "server");
        assert!(dispatcher.root.lock().unwrap().child("mesh").is_some());
        assert_eq!(dispatcher.journal.as_ref().unwrap().lock().unwrap().len(), 1);
    }

    #[test]
    fn test_replies_are_not_answered() {
        let dispatcher = dispatcher();
        let reply = create("mesh").reply_to("other");
        assert!(dispatcher.process(&reply).is_none());
    }

    #[test]
    fn test_poisoned_root_is_recovered() {
        let dispatcher = dispatcher();
        let root = Arc::clone(&dispatcher.root);
        let _ = thread::spawn(move || {
            let _guard = root.lock().unwrap();
            panic!("poison");
        })
        .join();
        let reply = dispatcher.process(&create("mesh")).unwrap();
        assert!(!reply.is_error());
    }

    #[test]
    fn test_thread_processes_in_order() {
        let dispatcher = dispatcher();
        let (in_tx, in_rx) = mpsc::channel();
        let (out_tx, out_rx) = mpsc::channel();
        let worker = ProcessingThread::spawn(dispatcher.clone(), in_rx, out_tx, Duration::from_millis(10));

        let first = create("a");
        let second = create("a");
        in_tx.send(first.clone()).unwrap();
        in_tx.send(second.clone()).unwrap();

        let r1 = out_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let r2 = out_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(r1.frame_id, first.frame_id);
        assert!(!r1.is_error());
        assert_eq!(r2.frame_id, second.frame_id);
        assert_eq!(r2.error.unwrap().kind, crate::error::ErrorKind::DispatchFailure);

        drop(worker);
        assert_eq!(dispatcher.journal.unwrap().lock().unwrap().len(), 1);
    }

    #[test]
    fn test_shutdown_on_drop() {
        let (_in_tx, in_rx) = mpsc::channel();
        let (out_tx, _out_rx) = mpsc::channel();
        let worker = ProcessingThread::spawn(dispatcher(), in_rx, out_tx, Duration::from_millis(10));
        assert!(!worker.is_busy());
        worker.shutdown();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(worker.is_finished());
    }
}
