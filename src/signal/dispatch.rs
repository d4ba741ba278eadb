//! The signal dispatch boundary.
//!
//! Each invocation moves through
//! `Received -> ArgsDecoded -> Executing -> Completed | Failed`.
//!
//! - Receiver lookup, unknown signals and argument decoding fail with the
//!   codec/structural error that caused them.
//! - Anything the handler raises, including a panic, becomes
//!   [`Error::DispatchFailure`] carrying the diagnostic text. Nothing escapes
//!   this module: the caller may be a remote peer.
//! - Completed invocations are appended to the journal, if one is given.
//!   There is no cancellation once arguments are decoded.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::{Signal, SignalContext};
use crate::component::{BuilderRegistry, Component};
use crate::constants::SUBTREE_ELEMENT;
use crate::error::{Error, Result};
use crate::journal::Journal;
use crate::uri::Uri;
use crate::xml::{Map, SignalFrame};

/// Stage reached by an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Request accepted, nothing decoded yet.
    Received,
    /// Arguments decoded and type checked.
    ArgsDecoded,
    /// Handler running.
    Executing,
    /// Handler returned successfully.
    Completed,
    /// Stopped with an error at some stage.
    Failed,
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalOutcome {
    /// Signal name.
    pub signal: String,
    /// Receiver path.
    pub receiver: Uri,
    /// Final state.
    pub state: DispatchState,
    /// Reply values of a completed invocation.
    pub reply: Option<Map>,
    /// Error of a failed invocation.
    pub error: Option<Error>,
    /// Journal sequence id assigned to a completed invocation.
    pub journal_seq: Option<u64>,
}

impl SignalOutcome {
    fn new(signal: &str, receiver: &Uri) -> Self {
        Self {
            signal: signal.to_string(),
            receiver: receiver.clone(),
            state: DispatchState::Received,
            reply: None,
            error: None,
            journal_seq: None,
        }
    }

    fn fail(mut self, error: Error) -> Self {
        log::debug!(
            "{} on {} failed in state {:?}: {}",
            self.signal,
            self.receiver,
            self.state,
            error
        );
        self.state = DispatchState::Failed;
        self.error = Some(error);
        self
    }

    /// Returns `true` if the handler completed.
    pub fn is_completed(&self) -> bool {
        self.state == DispatchState::Completed
    }

    /// Reply values or the failure.
    pub fn into_result(self) -> Result<Option<Map>> {
        match self.state {
            DispatchState::Completed => Ok(self.reply),
            _ => Err(self.error.unwrap_or_else(|| Error::DispatchFailure {
                signal: self.signal,
                message: "invocation did not complete".to_string(),
            })),
        }
    }

    /// Reply frame for the request `frame`.
    pub fn into_reply(self, frame: &SignalFrame, sender: &str) -> SignalFrame {
        let mut reply = frame.reply_to(sender);
        if let Some(error) = &self.error {
            reply = reply.with_error(error);
        }
        if let Some(values) = self.reply {
            reply.args = values;
        }
        reply
    }
}

/// Run signal `name` on `target`.
pub fn call(
    target: &mut Component,
    name: &str,
    args: &Map,
    ctx: &SignalContext<'_>,
    journal: Option<&mut Journal>,
) -> SignalOutcome {
    let receiver = target.path().clone();
    let mut outcome = SignalOutcome::new(name, &receiver);
    log::trace!("[{}] {} on {}: received", ctx.frame_id, name, receiver);

    let Some(signal) = target.signals().get(name).cloned() else {
        return outcome.fail(Error::UnknownSignal {
            target: receiver.to_string(),
            signal: name.to_string(),
        });
    };

    let decoded = match decode_args(&signal, args, ctx.delimiter) {
        Ok(decoded) => decoded,
        Err(e) => return outcome.fail(e),
    };
    outcome.state = DispatchState::ArgsDecoded;
    log::trace!("[{}] {} on {}: arguments decoded", ctx.frame_id, name, receiver);

    outcome.state = DispatchState::Executing;
    let handler = signal.handler();
    let result = panic::catch_unwind(AssertUnwindSafe(|| handler(target, &decoded, ctx)));

    match result {
        Ok(Ok(reply)) => {
            outcome.state = DispatchState::Completed;
            outcome.reply = reply;
            if let Some(journal) = journal {
                outcome.journal_seq =
                    Some(journal.record(&receiver, name, ctx.sender, ctx.frame_id, &decoded));
            }
            log::debug!("[{}] {} on {}: completed", ctx.frame_id, name, receiver);
            outcome
        }
        Ok(Err(e)) => {
            log::warn!("Signal {} on {} failed: {e:#}", name, receiver);
            outcome.fail(Error::DispatchFailure { signal: name.to_string(), message: format!("{e:#}") })
        }
        Err(payload) => {
            let message = format!("handler panicked: {}", panic_message(&*payload));
            log::error!("Signal {} on {}: {}", name, receiver, message);
            outcome.fail(Error::DispatchFailure { signal: name.to_string(), message })
        }
    }
}

/// Resolve the receiver of `frame` under `root` and run its signal.
pub fn dispatch(
    root: &mut Component,
    frame: &SignalFrame,
    registry: &BuilderRegistry,
    delimiter: &str,
    journal: Option<&mut Journal>,
) -> SignalOutcome {
    let ctx = SignalContext {
        registry,
        sender: &frame.sender,
        frame_id: &frame.frame_id,
        delimiter,
    };
    match root.resolve_mut(&frame.receiver) {
        Ok(target) => call(target, &frame.target, &frame.args, &ctx, journal),
        Err(e) => SignalOutcome::new(&frame.target, &frame.receiver).fail(e),
    }
}

/// Check every declared argument and fill in defaults.
///
/// Present arguments must decode and match their declared type; absent ones
/// take their default or fail with [`Error::NotFound`]. Undeclared value and
/// array entries must still decode; they are then passed through untouched,
/// as are subtrees.
fn decode_args(signal: &Signal, args: &Map, delimiter: &str) -> Result<Map> {
    for key in args.keys() {
        let declared = signal.args().iter().any(|spec| spec.name == key);
        let is_subtree = args.find_value(key).is_some_and(|n| n.name == SUBTREE_ELEMENT);
        if !declared && !is_subtree {
            args.get_wire(key)?;
        }
    }

    let mut decoded = args.clone();
    for spec in signal.args() {
        if args.check_entry(&spec.name) {
            let value = args.get_wire(&spec.name)?;
            if value.value_type() != spec.value_type || value.is_array() != spec.is_array {
                return Err(Error::TypeMismatch {
                    key: spec.name.clone(),
                    expected: spec.type_label(),
                    found: value.type_label(),
                });
            }
        } else if let Some(default) = &spec.default {
            decoded.set_wire(&spec.name, default, delimiter)?;
        } else {
            return Err(Error::not_found(format!(
                "argument [{}] of [{}]",
                spec.name,
                signal.name()
            )));
        }
    }
    Ok(decoded)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
