//! The logging sink.
//!
//! The parser reports what it is doing through a stream of [`ParseEvent`]s
//! delivered to an optional [`ParseEventHandler`]. Handlers are purely
//! observational: the parser behaves identically with or without one.

use crate::language::{StateId, Symbol};
use crate::length::Length;

/// One step of parser progress, mirroring the driver's decision points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseEvent {
    NewParse,
    ParseAfterEdit,
    Process {
        version: usize,
        version_count: usize,
        state: StateId,
        position: Length,
    },
    LexedLookahead {
        symbol: Symbol,
        size_bytes: u32,
    },
    SkipUnrecognizedCharacter,
    ReuseNode {
        symbol: Symbol,
    },
    CantReuseNode {
        symbol: Symbol,
        reason: &'static str,
    },
    Shift {
        state: StateId,
    },
    ShiftExtra,
    Reduce {
        symbol: Symbol,
        child_count: u16,
    },
    Accept,
    DetectError,
    BreakdownTopOfStack {
        symbol: Symbol,
    },
    StateMismatch {
        symbol: Symbol,
    },
    RecoverToPrevious {
        state: StateId,
        depth: u32,
    },
    RecoverWithMissing {
        symbol: Symbol,
        state: StateId,
    },
    SkipToken {
        symbol: Symbol,
    },
    RecoverEof,
    ResumeVersion {
        version: usize,
    },
    Condense,
    HaltingParse,
    Done,
}

/// Receives parse events for debugging or tracing.
pub trait ParseEventHandler {
    fn handle(&mut self, event: &ParseEvent);
}

/// A handler that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventHandler;

impl ParseEventHandler for NullEventHandler {
    fn handle(&mut self, _event: &ParseEvent) {}
}
