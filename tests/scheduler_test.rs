//! Scheduler tests driven through the command protocol.

use std::time::Duration;
use vconsole::memory::map::{INT_STATUS, IRQ_VBLANK};
use vconsole::{
    assemble, AssemblyOutput, Breakpoint, BreakpointSet, Command, Event, NoIncludes, Register, RunState,
    Scheduler, SchedulerConfig, SharedMemory,
};

const COUNTER: &str = "; counter
        .org $0000
start:
        LD R0, #0
        LD R1, #0

loop:
        ADD R0, #1
        ST R0, [$40]
        CMP R0, #200
        BNZ loop
        LD R1, #1
        HLT
";

fn loaded(source: &str, config: SchedulerConfig) -> (Scheduler, SharedMemory, AssemblyOutput) {
    let output = assemble(source, "main.asm", &NoIncludes);
    assert!(output.is_loadable(), "{:?}", output.errors);

    let memory = SharedMemory::new();
    let mut scheduler = Scheduler::new(config);
    assert_eq!(
        scheduler.handle(Command::Init(memory.clone())).unwrap(),
        Some(Event::Initialized)
    );
    let loaded = scheduler
        .handle(Command::Load(output.segments.clone()))
        .unwrap();
    assert_eq!(loaded, Some(Event::Loaded { bytes: output.byte_count() }));
    (scheduler, memory, output)
}

fn slow_clock() -> SchedulerConfig {
    SchedulerConfig {
        clock_hz: 1_000,
        frame_hz: 0,
        ..SchedulerConfig::default()
    }
}

#[test]
fn test_breakpoint_on_source_line() {
    let (mut scheduler, _, output) = loaded(COUNTER, slow_clock());

    let mut breakpoints = BreakpointSet::new();
    breakpoints.add(Breakpoint::new("main.asm", 10));
    let addresses = breakpoints.resolve(&output.source_map);
    let expected = output.source_map.address_for("main.asm", 10).unwrap();
    assert_eq!(addresses, vec![expected as u32]);

    scheduler.handle(Command::SetBreakpoints(addresses)).unwrap();
    scheduler.handle(Command::Run).unwrap();
    let event = scheduler.tick(Duration::from_millis(50));

    let Some(Event::BreakpointHit { snapshot, address }) = event else {
        panic!("expected breakpoint, got {event:?}");
    };
    assert_eq!(address, expected);
    assert_eq!(snapshot.program_counter, expected);
    assert_eq!(snapshot.registers[Register::R0.index()], 1);
    assert_eq!(scheduler.state(), RunState::Stopped);
}

#[test]
fn test_resume_stops_again_on_next_pass() {
    let (mut scheduler, memory, output) = loaded(COUNTER, slow_clock());
    let target = output.source_map.address_for("main.asm", 9).unwrap();
    scheduler
        .handle(Command::SetBreakpoints(vec![target as u32]))
        .unwrap();

    for pass in 1..=3u8 {
        scheduler.handle(Command::Run).unwrap();
        let event = scheduler.tick(Duration::from_millis(50));
        assert!(
            matches!(event, Some(Event::BreakpointHit { address, .. }) if address == target),
            "pass {pass}: {event:?}"
        );
        // ST on line 10 has not run yet for this pass
        assert_eq!(memory.get(0x40), pass - 1);
    }
}

#[test]
fn test_program_runs_to_completion() {
    let (mut scheduler, memory, _) = loaded(COUNTER, slow_clock());
    scheduler.handle(Command::Run).unwrap();
    // max_catch_up limits each tick to 100 cycles
    for _ in 0..10 {
        assert_eq!(scheduler.tick(Duration::from_millis(100)), None);
    }

    let snapshot = scheduler.snapshot().unwrap();
    assert_eq!(snapshot.registers[1], 1);
    assert_eq!(memory.get(0x40), 200);
    assert_eq!(scheduler.state(), RunState::Running, "HLT does not stop the scheduler");
}

#[test]
fn test_pause_and_step() {
    let (mut scheduler, _, _) = loaded(COUNTER, slow_clock());
    scheduler.handle(Command::Run).unwrap();
    assert_eq!(scheduler.run_cycles(5), None);
    assert_eq!(scheduler.handle(Command::Pause).unwrap(), Some(Event::Paused));

    let before = scheduler.snapshot().unwrap();
    assert_eq!(before.cycle_count, 5);
    assert_eq!(scheduler.tick(Duration::from_millis(5)), None);
    assert_eq!(scheduler.snapshot().unwrap(), before, "paused: ticks do nothing");

    let Some(Event::Stepped(after)) = scheduler.handle(Command::Step).unwrap() else {
        panic!("step should report a snapshot");
    };
    assert_eq!(after.cycle_count, 6);
}

#[test]
fn test_set_pc_then_get_snapshot() {
    let (mut scheduler, _, _) = loaded(COUNTER, slow_clock());
    assert_eq!(
        scheduler.handle(Command::SetProgramCounter(0x0006)).unwrap(),
        Some(Event::ProgramCounterSet)
    );
    let Some(Event::Snapshot(snapshot)) = scheduler.handle(Command::GetSnapshot).unwrap() else {
        panic!("expected snapshot");
    };
    assert_eq!(snapshot.program_counter, 6);
    assert_eq!(snapshot.cycle_count, 0);
}

#[test]
fn test_fault_surfaces_single_error_event() {
    let (mut scheduler, _, _) = loaded(".org $10\n.byte $0F", slow_clock());
    scheduler.handle(Command::SetProgramCounter(0x10)).unwrap();
    scheduler.handle(Command::Run).unwrap();

    let event = scheduler.tick(Duration::from_millis(100));
    let Some(Event::Error(message)) = event else {
        panic!("expected error, got {event:?}");
    };
    assert!(message.contains("$0010"), "{message}");
    assert_eq!(scheduler.state(), RunState::Stopped);
    assert_eq!(scheduler.tick(Duration::from_millis(100)), None);
    assert_eq!(scheduler.snapshot().unwrap().program_counter, 0x10);
}

#[test]
fn test_vblank_drives_interrupt_handler() {
    let source = "
        LD R0, #<handler
        ST R0, [$0130]
        LD R0, #>handler
        ST R0, [$0131]
        LD R0, #1
        ST R0, [$0115]
        SEI
wait:   HLT
        JMP wait
handler:
        ADD R5, #1
        RTI
    ";
    let config = SchedulerConfig {
        clock_hz: 6_000,
        frame_hz: 60,
        ..SchedulerConfig::default()
    };
    let (mut scheduler, memory, _) = loaded(source, config);
    scheduler.handle(Command::Run).unwrap();

    // 100 cycles per frame: VBlank after cycles 100, 200, ... 2900
    assert_eq!(scheduler.run_cycles(2950), None);
    let frames = scheduler.snapshot().unwrap().registers[5];
    assert_eq!(frames, 29);
    assert_eq!(memory.get(INT_STATUS), 0);
}

fn vblank_every_100_cycles() -> SchedulerConfig {
    SchedulerConfig {
        clock_hz: 6_000,
        frame_hz: 60,
        ..SchedulerConfig::default()
    }
}

#[test]
fn test_breakpoint_after_hlt_waits_for_interrupt() {
    let source = "
        LD R0, #<handler
        ST R0, [$0130]
        LD R0, #>handler
        ST R0, [$0131]
        LD R0, #1
        ST R0, [$0115]
        SEI
wait:   HLT
after:  JMP wait
handler:
        ADD R5, #1
        RTI
    ";
    let (mut scheduler, _, output) = loaded(source, vblank_every_100_cycles());
    let after = output.symbol_table["after"];
    scheduler
        .handle(Command::SetBreakpoints(vec![after as u32]))
        .unwrap();
    scheduler.handle(Command::Run).unwrap();

    // 7 setup steps, HLT, idle until VBlank after step 100, entry, ADD, RTI
    let event = scheduler.run_cycles(150);
    let Some(Event::BreakpointHit { snapshot, address }) = event else {
        panic!("expected breakpoint, got {event:?}");
    };
    assert_eq!(address, after);
    assert_eq!(snapshot.registers[5], 1);
    assert_eq!(snapshot.cycle_count, 103);

    // Resuming halts again on the same PC without stopping there
    scheduler.handle(Command::Run).unwrap();
    assert_eq!(scheduler.run_cycles(40), None);
    assert!(scheduler.cpu().unwrap().is_halted());
    assert_eq!(scheduler.state(), RunState::Running);

    let event = scheduler.run_cycles(100);
    let Some(Event::BreakpointHit { snapshot, .. }) = event else {
        panic!("expected second breakpoint, got {event:?}");
    };
    assert_eq!(snapshot.registers[5], 2);
    assert_eq!(snapshot.cycle_count, 203);
}

#[test]
fn test_breakpoint_with_pending_vblank_hits_after_handler() {
    let source = "
        LD R0, #<handler
        ST R0, [$0130]
        LD R0, #>handler
        ST R0, [$0131]
        LD R0, #1
        ST R0, [$0115]
        LD R5, #0
        SEI
spin:   NOP
        JMP spin
handler:
        ADD R5, #1
        RTI
    ";
    let (mut scheduler, memory, output) = loaded(source, vblank_every_100_cycles());
    let spin = output.symbol_table["spin"];
    scheduler.handle(Command::Run).unwrap();

    // Step 100 is a JMP back to spin, and VBlank latches right after it
    assert_eq!(scheduler.run_cycles(100), None);
    assert_eq!(scheduler.snapshot().unwrap().program_counter, spin);
    assert_eq!(memory.get(INT_STATUS) & IRQ_VBLANK, IRQ_VBLANK);

    scheduler
        .handle(Command::SetBreakpoints(vec![spin as u32]))
        .unwrap();
    let event = scheduler.run_cycles(10);
    let Some(Event::BreakpointHit { snapshot, address }) = event else {
        panic!("expected breakpoint, got {event:?}");
    };
    assert_eq!(address, spin);
    assert_eq!(snapshot.registers[5], 1, "handler ran before the stop");
    assert_eq!(snapshot.cycle_count, 103);
    assert_eq!(memory.get(INT_STATUS), 0);
}

#[test]
fn test_event_json_shape() {
    let (mut scheduler, _, _) = loaded("NOP", slow_clock());
    let event = scheduler.handle(Command::Step).unwrap().unwrap();
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "stepped");
    assert_eq!(json["data"]["programCounter"], 1);
    assert_eq!(json["data"]["cycleCount"], 1);
    assert_eq!(json["data"]["registers"].as_array().unwrap().len(), 6);

    let running = serde_json::to_value(scheduler.handle(Command::Run).unwrap().unwrap()).unwrap();
    assert_eq!(running["type"], "running");
}
