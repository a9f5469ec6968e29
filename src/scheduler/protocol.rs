//! Command/event protocol between a host and the execution actor.
//!
//! Commands are acknowledged asynchronously with at most one event each.
//! Malformed commands produce a [`ProtocolError`], which the actor logs and
//! otherwise ignores; CPU state is never touched by a rejected command.

use crate::assembler::Segment;
use crate::cpu::Snapshot;
use crate::memory::SharedMemory;
use serde::Serialize;
use thiserror::Error;

/// Requests sent to the scheduler.
#[derive(Debug, Clone)]
pub enum Command {
    /// Attach the engine to a memory region and reset the CPU
    Init(SharedMemory),
    Run,
    Pause,
    /// Execute exactly one instruction; only accepted while stopped
    Step,
    Reset,
    SetProgramCounter(u32),
    /// Replace the breakpoint address set
    SetBreakpoints(Vec<u32>),
    GetSnapshot,
    /// Copy assembled segments into memory
    Load(Vec<Segment>),
    SetController { port: u8, buttons: u8 },
    Shutdown,
}

impl Command {
    /// Short name for log messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Run => "run",
            Self::Pause => "pause",
            Self::Step => "step",
            Self::Reset => "reset",
            Self::SetProgramCounter(_) => "setProgramCounter",
            Self::SetBreakpoints(_) => "setBreakpoints",
            Self::GetSnapshot => "getSnapshot",
            Self::Load(_) => "load",
            Self::SetController { .. } => "setController",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Notifications emitted by the scheduler.
///
/// Serialized as `{"type": "...", "data": ...}` for UI consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Event {
    Initialized,
    Running,
    Paused,
    Stepped(Snapshot),
    #[serde(rename_all = "camelCase")]
    BreakpointHit { snapshot: Snapshot, address: u16 },
    Snapshot(Snapshot),
    /// An engine fault stopped execution
    Error(String),
    Reset,
    ProgramCounterSet,
    BreakpointsSet,
    Loaded { bytes: usize },
}

/// A command that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("scheduler has no memory attached; send init first")]
    NotInitialized,

    #[error("scheduler is already initialized")]
    AlreadyInitialized,

    #[error("step is only accepted while stopped")]
    StepWhileRunning,

    #[error("address ${0:X} is outside $0000-$FFFF")]
    AddressOutOfRange(u32),

    #[error("no controller port {0}")]
    InvalidPort(u8),

    #[error("scheduler actor is not running")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let snapshot = Snapshot {
            registers: [1, 2, 3, 4, 5, 6],
            stack_pointer: 0xB000,
            program_counter: 0x0010,
            status_register: 0x02,
            cycle_count: 7,
        };
        let json = serde_json::to_value(Event::BreakpointHit {
            snapshot,
            address: 0x0010,
        })
        .unwrap();

        assert_eq!(json["type"], "breakpointHit");
        assert_eq!(json["data"]["address"], 16);
        assert_eq!(json["data"]["snapshot"]["programCounter"], 16);
        assert_eq!(json["data"]["snapshot"]["cycleCount"], 7);

        let json = serde_json::to_value(Event::Error("boom".into())).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["data"], "boom");
    }

    #[test]
    fn test_protocol_error_messages() {
        assert_eq!(
            ProtocolError::AddressOutOfRange(0x10000).to_string(),
            "address $10000 is outside $0000-$FFFF"
        );
    }
}
