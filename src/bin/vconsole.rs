//! vconsole - assemble, disassemble and run programs for the virtual console

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use vconsole::assembler::FsResolver;
use vconsole::assets::Cartridge;
use vconsole::disassembler::formatter::format_listing;
use vconsole::{
    assemble, disassemble, AssemblyOutput, Breakpoint, BreakpointSet, Command, Event, Scheduler,
    SchedulerConfig, Segment, SharedMemory, Snapshot,
};

/// Virtual console devkit tools
#[derive(Parser, Debug)]
#[command(name = "vconsole")]
#[command(about = "Assembler, disassembler and runner for the virtual console", long_about = None)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Tool,
}

#[derive(Subcommand, Debug)]
enum Tool {
    /// Assemble a source file
    Asm {
        file: PathBuf,

        /// Write the flattened binary image here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the symbol table
        #[arg(long)]
        symbols: bool,

        /// Print the full assembler output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Disassemble a raw binary
    Disasm {
        file: PathBuf,

        /// Load address of the first byte
        #[arg(long, default_value = "0", value_parser = parse_address)]
        origin: u16,
    },

    /// Run a source file, cartridge (.cart) or raw binary
    Run {
        file: PathBuf,

        /// Cycles to execute before stopping
        #[arg(long, default_value = "1000000")]
        cycles: u64,

        /// Dump memory after running, as ADDR:LEN (e.g. $0010:16)
        #[arg(long)]
        dump: Vec<String>,

        /// Stop at a source line, as FILE:LINE
        #[arg(long = "break")]
        breakpoints: Vec<String>,

        /// Scheduler config JSON
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();
    logger::init(args.verbose);

    let result = match args.command {
        Tool::Asm {
            file,
            output,
            symbols,
            json,
        } => cmd_asm(&file, output.as_deref(), symbols, json),
        Tool::Disasm { file, origin } => cmd_disasm(&file, origin),
        Tool::Run {
            file,
            cycles,
            dump,
            breakpoints,
            config,
        } => cmd_run(&file, cycles, &dump, &breakpoints, config.as_deref()),
    };

    if let Err(message) = result {
        eprintln!("error: {message}");
        process::exit(1);
    }
}

fn cmd_asm(file: &Path, output: Option<&Path>, symbols: bool, json: bool) -> Result<(), String> {
    let result = assemble_file(file)?;

    if json {
        let text = serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?;
        println!("{text}");
    }
    report_errors(&result)?;

    for segment in &result.segments {
        println!(
            "segment ${:04X}-${:04X} ({} bytes)",
            segment.start_address,
            segment.end_address().saturating_sub(1),
            segment.data.len()
        );
    }
    if symbols {
        for (name, address) in &result.symbol_table {
            println!("{name:<32} ${address:04X}");
        }
        for (name, value) in &result.constants {
            println!("{name:<32} {value} (constant)");
        }
    }
    if let Some(path) = output {
        let (start, image) = result.to_image().unwrap_or((0, Vec::new()));
        fs::write(path, &image).map_err(|e| format!("{}: {e}", path.display()))?;
        println!("wrote {} bytes (origin ${start:04X}) to {}", image.len(), path.display());
    }
    Ok(())
}

fn cmd_disasm(file: &Path, origin: u16) -> Result<(), String> {
    let bytes = fs::read(file).map_err(|e| format!("{}: {e}", file.display()))?;
    print!("{}", format_listing(&disassemble(&bytes, origin)));
    Ok(())
}

fn cmd_run(
    file: &Path,
    cycles: u64,
    dumps: &[String],
    breakpoints: &[String],
    config: Option<&Path>,
) -> Result<(), String> {
    let config = match config {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
            SchedulerConfig::from_json(&text).map_err(|e| e.to_string())?
        }
        None => SchedulerConfig::default(),
    };
    let dumps = dumps
        .iter()
        .map(|arg| parse_dump(arg))
        .collect::<Result<Vec<_>, _>>()?;

    let program = load_program(file)?;
    let mut breakpoint_set = BreakpointSet::new();
    for arg in breakpoints {
        breakpoint_set.add(parse_breakpoint(arg)?);
    }
    let addresses = match &program.source_map {
        Some(map) => breakpoint_set.resolve(map),
        None if breakpoint_set.is_empty() => Vec::new(),
        None => return Err("breakpoints need an assembly source file".into()),
    };

    let memory = SharedMemory::new();
    let mut scheduler = Scheduler::new(config);
    for command in [
        Command::Init(memory.clone()),
        Command::Load(program.segments),
        Command::SetProgramCounter(program.entry as u32),
        Command::SetBreakpoints(addresses),
        Command::Run,
    ] {
        if let Some(Event::Error(message)) = scheduler.handle(command).map_err(|e| e.to_string())? {
            return Err(message);
        }
    }

    match scheduler.run_cycles(cycles) {
        Some(Event::BreakpointHit { address, snapshot }) => {
            for breakpoint in breakpoint_set.at_address(address) {
                println!("breakpoint {breakpoint} (${address:04X})");
            }
            print_snapshot(&snapshot);
        }
        Some(Event::Error(message)) => {
            if let Some(snapshot) = scheduler.snapshot() {
                print_snapshot(&snapshot);
            }
            return Err(message);
        }
        _ => {
            if let Some(snapshot) = scheduler.snapshot() {
                print_snapshot(&snapshot);
            }
        }
    }

    for (start, len) in dumps {
        let bytes = memory.copy_range(start as usize..start as usize + len);
        for (row, chunk) in bytes.chunks(16).enumerate() {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
            println!("${:04X}: {}", start as usize + row * 16, hex.join(" "));
        }
    }
    Ok(())
}

struct Program {
    segments: Vec<Segment>,
    entry: u16,
    source_map: Option<vconsole::assembler::source_map::SourceMap>,
}

fn load_program(file: &Path) -> Result<Program, String> {
    match file.extension().and_then(|ext| ext.to_str()) {
        Some("asm" | "s") => {
            let result = assemble_file(file)?;
            report_errors(&result)?;
            Ok(Program {
                entry: result.segments.first().map_or(0, |s| s.start_address),
                segments: result.segments,
                source_map: Some(result.source_map),
            })
        }
        Some("cart") => {
            let bytes = fs::read(file).map_err(|e| format!("{}: {e}", file.display()))?;
            let cart = Cartridge::from_bytes(&bytes).map_err(|e| e.to_string())?;
            log::info!("cartridge '{}' by {}", cart.metadata.title, cart.metadata.author);
            Ok(Program {
                entry: cart.metadata.entry_point,
                segments: vec![cart.code_segment()],
                source_map: None,
            })
        }
        _ => {
            let data = fs::read(file).map_err(|e| format!("{}: {e}", file.display()))?;
            Ok(Program {
                segments: vec![Segment {
                    start_address: 0,
                    data,
                }],
                entry: 0,
                source_map: None,
            })
        }
    }
}

fn assemble_file(file: &Path) -> Result<AssemblyOutput, String> {
    let source = fs::read_to_string(file).map_err(|e| format!("{}: {e}", file.display()))?;
    let root = file.parent().unwrap_or(Path::new("."));
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(assemble(&source, &name, &FsResolver::new(root)))
}

fn report_errors(result: &AssemblyOutput) -> Result<(), String> {
    if result.is_loadable() {
        return Ok(());
    }
    for error in &result.errors {
        eprintln!("{error}");
    }
    Err(format!("{} error(s)", result.errors.len()))
}

fn print_snapshot(snapshot: &Snapshot) {
    let r = &snapshot.registers;
    println!(
        "R0=${:02X} R1=${:02X} R2=${:02X} R3=${:02X} R4=${:02X} R5=${:02X}",
        r[0], r[1], r[2], r[3], r[4], r[5]
    );
    println!(
        "PC=${:04X} SP=${:04X} SR=%{:08b} cycles={}",
        snapshot.program_counter, snapshot.stack_pointer, snapshot.status_register, snapshot.cycle_count
    );
}

/// Parses `$1234`, `0x1234` or a decimal address.
fn parse_address(text: &str) -> Result<u16, String> {
    let parsed = if let Some(hex) = text.strip_prefix('$') {
        u16::from_str_radix(hex, 16)
    } else if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    parsed.map_err(|_| format!("invalid address '{text}'"))
}

fn parse_dump(arg: &str) -> Result<(u16, usize), String> {
    let (address, len) = arg
        .split_once(':')
        .ok_or_else(|| format!("dump '{arg}' should be ADDR:LEN"))?;
    let len = len.parse().map_err(|_| format!("invalid length in '{arg}'"))?;
    Ok((parse_address(address)?, len))
}

fn parse_breakpoint(arg: &str) -> Result<Breakpoint, String> {
    let (file, line) = arg
        .rsplit_once(':')
        .ok_or_else(|| format!("breakpoint '{arg}' should be FILE:LINE"))?;
    let line = line.parse().map_err(|_| format!("invalid line in '{arg}'"))?;
    Ok(Breakpoint::new(file, line))
}

mod logger {
    use log::{LevelFilter, Log, Metadata, Record};

    struct StderrLogger;

    static LOGGER: StderrLogger = StderrLogger;

    impl Log for StderrLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if self.enabled(record.metadata()) {
                eprintln!("[{:<5}] {}", record.level(), record.args());
            }
        }

        fn flush(&self) {}
    }

    pub fn init(verbosity: u8) {
        let level = match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level);
        }
    }
}
