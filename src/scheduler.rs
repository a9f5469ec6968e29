//! # Execution Scheduler
//!
//! Drives the CPU at a fixed simulated clock rate with run/pause/step control
//! and breakpoint detection.
//!
//! [`Scheduler`] is the synchronous core: it owns the CPU, applies
//! [`Command`]s and converts elapsed wall-clock time into instruction steps.
//! [`SchedulerHandle`] runs that core on a dedicated thread behind bounded
//! command/event channels; the WASM binding drives it directly from the
//! browser's frame callback instead.
//!
//! ## State Machine
//!
//! ```text
//!            run
//! Stopped ---------> Running
//!    ^                  |
//!    +------------------+
//!   pause / breakpoint / fault
//! ```
//!
//! `step` is only accepted while stopped. `reset` is accepted in any state and
//! keeps a running scheduler running.
//!
//! ## Timing
//!
//! Each tick adds `elapsed * clock_hz` to a fractional cycle accumulator and
//! executes one step per whole cycle. Elapsed time is capped at
//! `max_catch_up` so a stalled host does not trigger a burst of millions of
//! steps. VBlank is latched into INT_STATUS every `clock_hz / frame_hz`
//! cycles.

mod actor;
pub mod config;
pub mod protocol;

pub use crate::cpu::Snapshot;
pub use actor::{SchedulerHandle, SpawnError};
pub use config::{ConfigError, SchedulerConfig};
pub use protocol::{Command, Event, ProtocolError};

use crate::memory::map::IRQ_VBLANK;
use crate::memory::{check_address, Memory, SharedMemory};
use crate::Cpu;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Whether the scheduler is executing instructions on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

/// Synchronous scheduler core.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use vconsole::{assemble, Command, Event, NoIncludes, Scheduler, SchedulerConfig, SharedMemory};
///
/// let output = assemble("loop: ADD R0, #1\nJMP loop", "main.asm", &NoIncludes);
///
/// let mut scheduler = Scheduler::new(SchedulerConfig::default());
/// scheduler.handle(Command::Init(SharedMemory::new())).unwrap();
/// scheduler.handle(Command::Load(output.segments)).unwrap();
/// scheduler.handle(Command::SetBreakpoints(vec![0x0003])).unwrap();
/// scheduler.handle(Command::Run).unwrap();
///
/// // 1ms at 3MHz is plenty to reach the JMP
/// match scheduler.tick(Duration::from_millis(1)) {
///     Some(Event::BreakpointHit { address, snapshot }) => {
///         assert_eq!(address, 0x0003);
///         assert_eq!(snapshot.registers[0], 1);
///     }
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub struct Scheduler {
    config: SchedulerConfig,
    cpu: Option<Cpu<Memory>>,
    state: RunState,
    breakpoints: BTreeSet<u16>,

    /// Fractional cycles owed from previous ticks
    accumulator: f64,

    /// Cycles since the last VBlank
    frame_cycles: u64,

    /// Breakpoint address to ignore for the first fetch after resuming
    resume_from: Option<u16>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            cpu: None,
            state: RunState::Stopped,
            breakpoints: BTreeSet::new(),
            accumulator: 0.0,
            frame_cycles: 0,
            resume_from: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.cpu.is_some()
    }

    /// The CPU, once initialized.
    pub fn cpu(&self) -> Option<&Cpu<Memory>> {
        self.cpu.as_ref()
    }

    /// A read handle to the attached memory region.
    pub fn memory(&self) -> Option<SharedMemory> {
        self.cpu.as_ref().map(|cpu| cpu.memory().shared())
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.cpu.as_ref().map(Cpu::snapshot)
    }

    /// Current breakpoint addresses.
    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.breakpoints.iter().copied()
    }

    /// Applies a command.
    ///
    /// Returns the acknowledging event, or `None` for commands that have no
    /// acknowledgement (`SetController`, `Shutdown`).
    ///
    /// # Errors
    ///
    /// A [`ProtocolError`] if the command is not valid in the current state.
    /// Nothing is changed in that case.
    pub fn handle(&mut self, command: Command) -> Result<Option<Event>, ProtocolError> {
        log::trace!("command {}", command.name());
        let event = match command {
            Command::Init(shared) => {
                if self.cpu.is_some() {
                    return Err(ProtocolError::AlreadyInitialized);
                }
                let mut cpu = Cpu::new(Memory::with_shared(shared));
                if let Err(fault) = cpu.reset() {
                    return Ok(Some(Event::Error(fault.to_string())));
                }
                self.cpu = Some(cpu);
                self.restart_clock();
                log::info!("scheduler initialized");
                Event::Initialized
            }
            Command::Run => {
                let pc = self.cpu_mut()?.pc();
                if self.state == RunState::Stopped {
                    self.state = RunState::Running;
                    self.accumulator = 0.0;
                    self.resume_from = Some(pc);
                    log::info!("running from ${pc:04X}");
                }
                Event::Running
            }
            Command::Pause => {
                if self.state == RunState::Running {
                    self.stop();
                    log::info!("paused");
                }
                Event::Paused
            }
            Command::Step => {
                if self.state == RunState::Running {
                    return Err(ProtocolError::StepWhileRunning);
                }
                let cpu = self.cpu_mut()?;
                match cpu.step() {
                    Ok(()) => {
                        let snapshot = cpu.snapshot();
                        self.advance_frame();
                        Event::Stepped(snapshot)
                    }
                    Err(fault) => {
                        log::error!("{fault}");
                        Event::Error(fault.to_string())
                    }
                }
            }
            Command::Reset => {
                if let Err(fault) = self.cpu_mut()?.reset() {
                    self.stop();
                    log::error!("{fault}");
                    return Ok(Some(Event::Error(fault.to_string())));
                }
                self.restart_clock();
                log::info!("reset ({:?})", self.state);
                Event::Reset
            }
            Command::SetProgramCounter(address) => {
                let address = narrow(address)?;
                self.cpu_mut()?.set_pc(address);
                Event::ProgramCounterSet
            }
            Command::SetBreakpoints(addresses) => {
                let addresses = addresses
                    .into_iter()
                    .map(narrow)
                    .collect::<Result<BTreeSet<_>, _>>()?;
                log::debug!("{} breakpoint(s) set", addresses.len());
                self.breakpoints = addresses;
                Event::BreakpointsSet
            }
            Command::GetSnapshot => {
                // Best effort while running: the actor answers between ticks
                Event::Snapshot(self.cpu_mut()?.snapshot())
            }
            Command::Load(segments) => {
                for segment in &segments {
                    if let Some(last) = segment.data.len().checked_sub(1) {
                        let end = segment.start_address as u32 + last as u32;
                        check_address(end).map_err(|_| ProtocolError::AddressOutOfRange(end))?;
                    }
                }
                let cpu = self.cpu_mut()?;
                if let Err(fault) = cpu.load_segments(&segments) {
                    return Ok(Some(Event::Error(fault.to_string())));
                }
                let bytes = segments.iter().map(|s| s.data.len()).sum();
                log::debug!("loaded {bytes} bytes in {} segment(s)", segments.len());
                Event::Loaded { bytes }
            }
            Command::SetController { port, buttons } => {
                if !self.cpu_mut()?.memory_mut().set_controller(port, buttons) {
                    return Err(ProtocolError::InvalidPort(port));
                }
                return Ok(None);
            }
            Command::Shutdown => {
                self.stop();
                return Ok(None);
            }
        };
        Ok(Some(event))
    }

    /// Advances simulated time by `elapsed`.
    ///
    /// Does nothing unless running. Returns the event that stopped execution
    /// (breakpoint hit or engine fault), if any.
    pub fn tick(&mut self, elapsed: Duration) -> Option<Event> {
        if self.state != RunState::Running {
            return None;
        }
        let elapsed = elapsed.min(self.config.max_catch_up);
        self.accumulator += elapsed.as_secs_f64() * self.config.clock_hz as f64;
        let whole = self.accumulator.floor();
        self.accumulator -= whole;
        self.run_cycles(whole as u64)
    }

    /// Executes up to `cycles` steps while running, checking breakpoints
    /// before each instruction fetch.
    ///
    /// Idle steps while halted and interrupt entries fetch nothing at PC, so
    /// they never hit a breakpoint and do not use up the resume skip.
    pub fn run_cycles(&mut self, cycles: u64) -> Option<Event> {
        for _ in 0..cycles {
            if self.state != RunState::Running {
                return None;
            }
            let cpu = self.cpu.as_mut()?;
            let pc = cpu.pc();

            if cpu.will_fetch()
                && self.resume_from.take() != Some(pc)
                && self.breakpoints.contains(&pc)
            {
                let snapshot = cpu.snapshot();
                self.stop();
                log::info!("breakpoint hit at ${pc:04X}");
                return Some(Event::BreakpointHit {
                    snapshot,
                    address: pc,
                });
            }

            if let Err(fault) = cpu.step() {
                self.stop();
                log::error!("{fault}");
                return Some(Event::Error(fault.to_string()));
            }
            self.advance_frame();
        }
        None
    }

    fn cpu_mut(&mut self) -> Result<&mut Cpu<Memory>, ProtocolError> {
        self.cpu.as_mut().ok_or(ProtocolError::NotInitialized)
    }

    fn stop(&mut self) {
        self.state = RunState::Stopped;
        self.accumulator = 0.0;
        self.resume_from = None;
    }

    fn restart_clock(&mut self) {
        self.accumulator = 0.0;
        self.frame_cycles = 0;
        self.resume_from = None;
    }

    fn advance_frame(&mut self) {
        let Some(period) = self.config.cycles_per_frame() else {
            return;
        };
        self.frame_cycles += 1;
        if self.frame_cycles >= period {
            self.frame_cycles = 0;
            if let Some(cpu) = self.cpu.as_mut() {
                log::trace!("vblank at cycle {}", cpu.cycles());
                cpu.raise_interrupt(IRQ_VBLANK);
            }
        }
    }
}

fn narrow(address: u32) -> Result<u16, ProtocolError> {
    check_address(address).map_err(|_| ProtocolError::AddressOutOfRange(address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{assemble, NoIncludes};

    fn scheduler_with(source: &str) -> Scheduler {
        let output = assemble(source, "main.asm", &NoIncludes);
        assert!(output.is_loadable(), "{:?}", output.errors);
        let mut scheduler = Scheduler::new(SchedulerConfig::default());
        scheduler.handle(Command::Init(SharedMemory::new())).unwrap();
        scheduler.handle(Command::Load(output.segments)).unwrap();
        scheduler
    }

    #[test]
    fn test_commands_require_init() {
        let mut scheduler = Scheduler::new(SchedulerConfig::default());
        assert_eq!(scheduler.handle(Command::Run), Err(ProtocolError::NotInitialized));
        assert_eq!(scheduler.handle(Command::Step), Err(ProtocolError::NotInitialized));
        assert_eq!(
            scheduler.handle(Command::SetBreakpoints(vec![1])),
            Ok(Some(Event::BreakpointsSet))
        );
    }

    #[test]
    fn test_init_twice() {
        let mut scheduler = scheduler_with("NOP");
        assert_eq!(
            scheduler.handle(Command::Init(SharedMemory::new())),
            Err(ProtocolError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_fractional_accumulator() {
        let output = assemble("loop: JMP loop", "main.asm", &NoIncludes);
        let mut scheduler = Scheduler::new(SchedulerConfig {
            clock_hz: 2,
            frame_hz: 0,
            max_catch_up: Duration::from_secs(1),
            ..SchedulerConfig::default()
        });
        scheduler.handle(Command::Init(SharedMemory::new())).unwrap();
        scheduler.handle(Command::Load(output.segments)).unwrap();
        scheduler.handle(Command::Run).unwrap();

        // 1.5 cycles owed: one step now, half a cycle carried over
        scheduler.tick(Duration::from_millis(750));
        assert_eq!(scheduler.cpu().unwrap().cycles(), 1);
        scheduler.tick(Duration::from_millis(250));
        assert_eq!(scheduler.cpu().unwrap().cycles(), 2);
    }

    #[test]
    fn test_catch_up_is_capped() {
        let mut scheduler = scheduler_with("loop: JMP loop");
        scheduler.handle(Command::Run).unwrap();
        scheduler.tick(Duration::from_secs(10));
        assert_eq!(scheduler.cpu().unwrap().cycles(), 300_000);
    }

    #[test]
    fn test_step_only_while_stopped() {
        let mut scheduler = scheduler_with("NOP\nNOP");
        let Ok(Some(Event::Stepped(snapshot))) = scheduler.handle(Command::Step) else {
            panic!("step not acknowledged");
        };
        assert_eq!(snapshot.program_counter, 1);

        scheduler.handle(Command::Run).unwrap();
        assert_eq!(scheduler.handle(Command::Step), Err(ProtocolError::StepWhileRunning));
    }

    #[test]
    fn test_resume_steps_over_breakpoint() {
        let mut scheduler = scheduler_with("loop: ADD R0, #1\nJMP loop");
        scheduler.handle(Command::SetBreakpoints(vec![0])).unwrap();
        scheduler.handle(Command::Run).unwrap();

        // Starting on the breakpoint does not stop immediately
        let event = scheduler.run_cycles(10);
        let Some(Event::BreakpointHit { snapshot, address }) = event else {
            panic!("expected breakpoint, got {event:?}");
        };
        assert_eq!(address, 0);
        assert_eq!(snapshot.registers[0], 1);
        assert_eq!(scheduler.state(), RunState::Stopped);
    }

    #[test]
    fn test_halted_cpu_does_not_hit_breakpoint() {
        let mut scheduler = scheduler_with("HLT\nloop: NOP\nJMP loop");
        scheduler.handle(Command::SetBreakpoints(vec![1])).unwrap();
        scheduler.handle(Command::Run).unwrap();

        // PC sits on the breakpoint but nothing is fetched there
        for _ in 0..4 {
            assert_eq!(scheduler.run_cycles(1000), None);
        }
        let cpu = scheduler.cpu().unwrap();
        assert!(cpu.is_halted());
        assert_eq!(cpu.pc(), 1);
        assert_eq!(cpu.cycles(), 4000);
        assert_eq!(scheduler.state(), RunState::Running);
    }

    #[test]
    fn test_fault_stops_scheduler() {
        let mut scheduler = scheduler_with(".byte $0F");
        scheduler.handle(Command::Run).unwrap();
        let event = scheduler.run_cycles(5);
        assert!(matches!(event, Some(Event::Error(_))));
        assert_eq!(scheduler.state(), RunState::Stopped);
        assert_eq!(scheduler.snapshot().unwrap().cycle_count, 0);
    }

    #[test]
    fn test_reset_keeps_running() {
        let mut scheduler = scheduler_with("loop: JMP loop");
        scheduler.handle(Command::Run).unwrap();
        scheduler.run_cycles(100);
        assert_eq!(scheduler.handle(Command::Reset), Ok(Some(Event::Reset)));
        assert_eq!(scheduler.state(), RunState::Running);
        assert_eq!(scheduler.snapshot().unwrap().cycle_count, 0);
    }

    #[test]
    fn test_out_of_range_addresses_rejected() {
        let mut scheduler = scheduler_with("NOP");
        scheduler.handle(Command::SetBreakpoints(vec![4])).unwrap();
        assert_eq!(
            scheduler.handle(Command::SetBreakpoints(vec![1, 0x1_0000])),
            Err(ProtocolError::AddressOutOfRange(0x1_0000))
        );
        assert_eq!(scheduler.breakpoints().collect::<Vec<_>>(), vec![4]);
        assert_eq!(
            scheduler.handle(Command::SetProgramCounter(0x2_0000)),
            Err(ProtocolError::AddressOutOfRange(0x2_0000))
        );
    }

    #[test]
    fn test_vblank_latched_each_frame() {
        let mut scheduler = scheduler_with("loop: JMP loop");
        scheduler.handle(Command::Run).unwrap();
        scheduler.run_cycles(49_999);
        let memory = scheduler.memory().unwrap();
        assert_eq!(memory.get(crate::memory::map::INT_STATUS), 0);
        scheduler.run_cycles(1);
        assert_eq!(memory.get(crate::memory::map::INT_STATUS), IRQ_VBLANK);
    }

    #[test]
    fn test_set_controller() {
        let mut scheduler = scheduler_with("NOP");
        assert_eq!(
            scheduler.handle(Command::SetController { port: 1, buttons: 0x0F }),
            Ok(None)
        );
        assert_eq!(
            scheduler.memory().unwrap().get(crate::memory::map::CONTROLLER_1),
            0x0F
        );
        assert_eq!(
            scheduler.handle(Command::SetController { port: 0, buttons: 1 }),
            Err(ProtocolError::InvalidPort(0))
        );
    }
}
