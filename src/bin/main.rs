use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use emulator::region::Chunk;
use emulator::vm::{Config, State, Vm, MEMORY_SIZE, STACK_TOP};
use log::LevelFilter;
use simple_logger::SimpleLogger;

/// Run an LS-8 program
#[derive(Parser)]
#[command(version)]
struct Args {
  /// Program file, one binary byte per line
  program: PathBuf,

  /// Bytes of memory
  #[arg(long, default_value_t = MEMORY_SIZE)]
  memory_size: usize,

  /// Initial stack pointer
  #[arg(long, default_value_t = STACK_TOP)]
  stack_top: u8,

  /// Stop with an error after this many instructions
  #[arg(long)]
  max_steps: Option<u64>,

  /// More logging (-v debug, -vv per-instruction trace)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn main() -> anyhow::Result<ExitCode> {
  let args = Args::parse();

  let level = match args.verbose {
    0 => LevelFilter::Warn,
    1 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  };
  SimpleLogger::new().with_level(level).init()?;

  let chunk = Chunk::from_file(&args.program)
    .with_context(|| format!("could not read {}", args.program.display()))?;
  if chunk.is_empty() {
    log::warn!("{} contains no instructions", args.program.display());
  }
  log::info!("{}: {} bytes", args.program.display(), chunk.len());

  let mut vm = Vm::with_config(Config {
    memory_size: args.memory_size,
    stack_top: args.stack_top,
    step_limit: args.max_steps,
  })?;
  vm.load(&chunk)?;

  let mut stdout = io::stdout().lock();
  let state = vm
    .run(&mut stdout)
    .with_context(|| format!("machine fault at pc {:#04X}", vm.pc()))?;

  // the machine has already logged the offending address and opcode
  match state {
    State::Trapped { .. } => Ok(ExitCode::from(2)),
    _ => Ok(ExitCode::SUCCESS),
  }
}
