//! Synchronous decision channel between the search and control contexts.
//!
//! The channel carries exactly three frame kinds: `READY:<float>` (search →
//! control: a branch decision is pending, payload is the node's normalized
//! gap), `CHOICE:<int>` (control → search: the strategy id to apply), and
//! `DONE` (search → control, sent in place of `READY` when the solve has
//! finished). Frames travel in encoded wire form so the endpoints stay
//! transport-agnostic; swapping the in-process queues for a local socket or
//! pipe changes only the carrier, never the contract.
//!
//! Both endpoints enforce strict alternation: at most one decision is in
//! flight, a second `READY` before the previous `CHOICE` was consumed is a
//! fatal protocol violation, and a disconnected peer aborts the run. There is
//! no timeout on either blocking receive.

use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::ProtocolError;

/// A single message on the decision channel, in decoded form.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Ready(f64),
    Choice(usize),
    Done,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Ready(gap) => write!(f, "READY:{gap}"),
            Frame::Choice(action) => write!(f, "CHOICE:{action}"),
            Frame::Done => write!(f, "DONE"),
        }
    }
}

impl FromStr for Frame {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "DONE" {
            return Ok(Frame::Done);
        }
        if let Some(rest) = s.strip_prefix("READY:") {
            let gap = rest
                .parse::<f64>()
                .map_err(|_| ProtocolError::Malformed(s.to_string()))?;
            return Ok(Frame::Ready(gap));
        }
        if let Some(rest) = s.strip_prefix("CHOICE:") {
            let action = rest
                .parse::<usize>()
                .map_err(|_| ProtocolError::Malformed(s.to_string()))?;
            return Ok(Frame::Choice(action));
        }
        Err(ProtocolError::Malformed(s.to_string()))
    }
}

/// What the control context observed while waiting on the channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchSignal {
    /// A decision point is blocked on a choice; payload is the node gap.
    Ready(f64),
    /// The solve finished; no decision is pending.
    Done,
}

/// Create a connected endpoint pair.
///
/// Sends never block (unbounded queues); receives block until the peer sends
/// or disconnects.
pub fn channel() -> (SearchEndpoint, ControlEndpoint) {
    let (signal_tx, signal_rx) = mpsc::channel::<String>();
    let (choice_tx, choice_rx) = mpsc::channel::<String>();
    (
        SearchEndpoint {
            tx: signal_tx,
            rx: choice_rx,
            awaiting_choice: false,
        },
        ControlEndpoint {
            tx: choice_tx,
            rx: signal_rx,
            pending_ready: false,
            finished: false,
        },
    )
}

/// Search-side endpoint: sends `READY`/`DONE`, receives `CHOICE`.
pub struct SearchEndpoint {
    tx: Sender<String>,
    rx: Receiver<String>,
    awaiting_choice: bool,
}

impl SearchEndpoint {
    /// Announce a pending branch decision and its node gap.
    pub fn send_ready(&mut self, gap: f64) -> Result<(), ProtocolError> {
        if self.awaiting_choice {
            return Err(ProtocolError::AlternationViolated(
                "READY sent while a choice is still outstanding",
            ));
        }
        self.tx
            .send(Frame::Ready(gap).to_string())
            .map_err(|_| ProtocolError::Disconnected)?;
        self.awaiting_choice = true;
        Ok(())
    }

    /// Block until the control context answers the pending `READY`.
    pub fn recv_choice(&mut self) -> Result<usize, ProtocolError> {
        if !self.awaiting_choice {
            return Err(ProtocolError::AlternationViolated(
                "waiting for a choice with no READY outstanding",
            ));
        }
        let raw = self.rx.recv().map_err(|_| ProtocolError::Disconnected)?;
        match raw.parse::<Frame>()? {
            Frame::Choice(action) => {
                self.awaiting_choice = false;
                Ok(action)
            }
            _ => Err(ProtocolError::UnexpectedFrame {
                got: raw,
                expected: "CHOICE",
            }),
        }
    }

    /// Signal overall search completion, in place of a `READY`.
    pub fn send_done(&mut self) -> Result<(), ProtocolError> {
        if self.awaiting_choice {
            return Err(ProtocolError::AlternationViolated(
                "DONE sent while a choice is still outstanding",
            ));
        }
        self.tx
            .send(Frame::Done.to_string())
            .map_err(|_| ProtocolError::Disconnected)
    }
}

/// Control-side endpoint: receives `READY`/`DONE`, sends `CHOICE`.
pub struct ControlEndpoint {
    tx: Sender<String>,
    rx: Receiver<String>,
    pending_ready: bool,
    finished: bool,
}

impl ControlEndpoint {
    /// Block until the search context signals a decision point or completion.
    pub fn recv_signal(&mut self) -> Result<SearchSignal, ProtocolError> {
        if self.pending_ready {
            return Err(ProtocolError::AlternationViolated(
                "waiting for a signal while a READY is still unanswered",
            ));
        }
        if self.finished {
            return Err(ProtocolError::Disconnected);
        }
        let raw = self.rx.recv().map_err(|_| ProtocolError::Disconnected)?;
        match raw.parse::<Frame>()? {
            Frame::Ready(gap) => {
                self.pending_ready = true;
                Ok(SearchSignal::Ready(gap))
            }
            Frame::Done => {
                self.finished = true;
                Ok(SearchSignal::Done)
            }
            Frame::Choice(_) => Err(ProtocolError::UnexpectedFrame {
                got: raw,
                expected: "READY or DONE",
            }),
        }
    }

    /// Answer the pending `READY` with a strategy id.
    pub fn send_choice(&mut self, action: usize) -> Result<(), ProtocolError> {
        if !self.pending_ready {
            return Err(ProtocolError::AlternationViolated(
                "CHOICE sent with no READY pending",
            ));
        }
        self.tx
            .send(Frame::Choice(action).to_string())
            .map_err(|_| ProtocolError::Disconnected)?;
        self.pending_ready = false;
        Ok(())
    }
}
