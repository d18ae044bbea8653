use std::fmt::Write as _;
use std::io::{self, Write};

use crate::alu::Operation;
use crate::opcode::Opcode;
use crate::region::Region;

/// The type of a single register in our machine
pub type Register = u8;

/// Number of general purpose registers
pub const REGISTERS: usize = 8;

/// Register reserved (by convention only) as the stack pointer
pub const SP: usize = 7;

/// Default size of memory, in bytes
pub const MEMORY_SIZE: usize = 256;

/// Default initial stack pointer; the stack grows down from here
pub const STACK_TOP: u8 = 0xF4;

/// Flag register layout is `00000EGL`
pub const FLAG_EQUAL: u8 = 0b0000_0100;
pub const FLAG_GREATER: u8 = 0b0000_0010;
pub const FLAG_LESS: u8 = 0b0000_0001;

const MIN_MEMORY: usize = 3;
const MAX_MEMORY: usize = 0x1_0000;

/// Where the machine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  Active,
  /// Stopped by `HLT`
  Halted,
  /// Stopped by a byte with no opcode table entry
  Trapped { address: usize, opcode: u8 },
  /// Stopped by an instruction that returned an [`Error`]
  Faulted { address: usize },
}

/// Tunables for a [`Vm`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub memory_size: usize,
  /// Initial value of `r7`, and the address at which the stack is empty
  pub stack_top: u8,
  /// Give up in [`Vm::run`] after this many instructions
  pub step_limit: Option<u64>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      memory_size: MEMORY_SIZE,
      stack_top: STACK_TOP,
      step_limit: None,
    }
  }
}

impl Config {
  fn validate(&self) -> Result<(), Error> {
    if !(MIN_MEMORY..=MAX_MEMORY).contains(&self.memory_size) {
      return Err(Error::InvalidConfig(format!(
        "memory size {} is outside {MIN_MEMORY}..={MAX_MEMORY}",
        self.memory_size
      )));
    }
    if self.stack_top as usize > self.memory_size {
      return Err(Error::InvalidConfig(format!(
        "stack top {:#04X} lies beyond {} bytes of memory",
        self.stack_top, self.memory_size
      )));
    }
    Ok(())
  }
}

/// An LS-8 machine: memory, register file, and control unit.
///
/// Every cycle fetches the opcode at `pc` along with the two bytes after it,
/// whether or not the instruction uses them, then lets the handler move `pc`.
#[derive(Debug)]
pub struct Vm {
  pc: usize,
  // instruction register and the two prefetched operand bytes
  ir: u8,
  operand_a: u8,
  operand_b: u8,
  fl: u8,
  registers: [Register; REGISTERS],
  memory: Vec<u8>,
  state: State,
  config: Config,
}

impl Vm {
  /// Create a machine with the default 256 bytes of zeroed memory
  pub fn new() -> Self {
    Self::build(Config::default())
  }

  pub fn with_config(config: Config) -> Result<Self, Error> {
    config.validate()?;
    Ok(Self::build(config))
  }

  fn build(config: Config) -> Self {
    let mut registers = [0; REGISTERS];
    registers[SP] = config.stack_top;
    Self {
      pc: 0,
      ir: 0,
      operand_a: 0,
      operand_b: 0,
      fl: 0,
      registers,
      memory: vec![0; config.memory_size],
      state: State::Active,
      config,
    }
  }

  /// Copy a program image into memory, starting at address `0`
  pub fn load<R>(&mut self, region: &R) -> Result<(), Error>
  where
    R: Region,
  {
    let program = region.instructions();
    if program.len() > self.memory.len() {
      return Err(Error::ProgramTooLarge {
        size: program.len(),
        capacity: self.memory.len(),
      });
    }
    self.memory[..program.len()].copy_from_slice(program);
    log::debug!("loaded {} bytes", program.len());
    Ok(())
  }

  /// Put the control unit and registers back to power-on state, keeping memory
  pub fn reset(&mut self) {
    self.pc = 0;
    self.ir = 0;
    self.operand_a = 0;
    self.operand_b = 0;
    self.fl = 0;
    self.registers = [0; REGISTERS];
    self.registers[SP] = self.config.stack_top;
    self.state = State::Active;
  }

  /// Execute a single instruction, writing anything it prints to `out`.
  ///
  /// An instruction that fails leaves the machine `Faulted` at its address.
  pub fn step<W>(&mut self, out: &mut W) -> Result<State, Error>
  where
    W: Write,
  {
    if self.state != State::Active {
      return Err(Error::MachineHalted);
    }
    let address = self.pc;
    let mut task = Task::new(self, out);
    if let Err(err) = task.run() {
      log::debug!("fault at {address:#04X}: {err}");
      self.state = State::Faulted { address };
      return Err(err);
    }
    Ok(self.state)
  }

  /// Step until the machine halts or traps, returning the final state.
  ///
  /// A machine that is already stopped returns immediately.
  pub fn run<W>(&mut self, out: &mut W) -> Result<State, Error>
  where
    W: Write,
  {
    let mut steps = 0;
    while self.state == State::Active {
      if let Some(limit) = self.config.step_limit {
        if steps >= limit {
          return Err(Error::StepLimitExceeded(limit));
        }
      }
      self.step(out)?;
      steps += 1;
    }
    log::debug!("stopped after {steps} instructions: {:?}", self.state);
    Ok(self.state)
  }

  pub fn read(&self, address: usize) -> Result<u8, Error> {
    self
      .memory
      .get(address)
      .copied()
      .ok_or(Error::MemoryOutOfBounds { address })
  }

  pub fn write(&mut self, address: usize, value: u8) -> Result<(), Error> {
    let cell = self
      .memory
      .get_mut(address)
      .ok_or(Error::MemoryOutOfBounds { address })?;
    *cell = value;
    Ok(())
  }

  pub fn register(&self, index: u8) -> Result<Register, Error> {
    self
      .registers
      .get(index as usize)
      .copied()
      .ok_or(Error::InvalidRegister(index))
  }

  pub fn set_register(&mut self, index: u8, value: Register) -> Result<(), Error> {
    let slot = self
      .registers
      .get_mut(index as usize)
      .ok_or(Error::InvalidRegister(index))?;
    *slot = value;
    Ok(())
  }

  /// `r[a] ← r[a] op r[b]`
  pub fn alu(&mut self, op: Operation, reg_a: u8, reg_b: u8) -> Result<(), Error> {
    let a = self.register(reg_a)?;
    let b = self.register(reg_b)?;
    self.set_register(reg_a, op.apply(a, b))
  }

  /// Like [`alu`](Self::alu), with the operation given by name (`"ADD"`)
  pub fn alu_by_name(&mut self, op: &str, reg_a: u8, reg_b: u8) -> Result<(), Error> {
    self.alu(op.parse()?, reg_a, reg_b)
  }

  // sp ← sp − 1 ; m[sp] ← value
  fn push(&mut self, value: u8) -> Result<(), Error> {
    let sp = self.registers[SP].checked_sub(1).ok_or(Error::StackOverflow)?;
    self.write(sp as usize, value)?;
    self.registers[SP] = sp;
    Ok(())
  }

  // value ← m[sp] ; sp ← sp + 1
  fn pop(&mut self) -> Result<u8, Error> {
    let sp = self.registers[SP];
    if sp >= self.config.stack_top {
      return Err(Error::StackUnderflow { sp });
    }
    let value = self.read(sp as usize)?;
    self.registers[SP] = sp + 1;
    Ok(value)
  }

  pub fn pc(&self) -> usize {
    self.pc
  }

  pub fn flags(&self) -> u8 {
    self.fl
  }

  pub fn state(&self) -> State {
    self.state
  }

  pub fn registers(&self) -> &[Register; REGISTERS] {
    &self.registers
  }

  /// One-line dump of the machine, as of the instruction at `pc`:
  ///
  /// `TRACE: pc | m[pc] m[pc+1] m[pc+2] | fl | r0 .. r7`
  pub fn trace(&self) -> String {
    let peek = |address: usize| match self.memory.get(address) {
      Some(byte) => format!("{byte:02X}"),
      None => "--".to_owned(),
    };
    let mut line = format!(
      "TRACE: {:02X} | {} {} {} | {:02X} |",
      self.pc,
      peek(self.pc),
      peek(self.pc + 1),
      peek(self.pc + 2),
      self.fl,
    );
    for value in self.registers {
      let _ = write!(line, " {value:02X}");
    }
    line
  }
}

impl Default for Vm {
  fn default() -> Self {
    Self::new()
  }
}

/// An error that stopped the machine mid-instruction
#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("unsupported ALU operation `{0}`")]
  UnsupportedOperation(String),

  #[error("address {address:#06X} is outside of memory")]
  MemoryOutOfBounds { address: usize },

  #[error("register r{0} does not exist")]
  InvalidRegister(u8),

  #[error("stack overflow")]
  StackOverflow,

  #[error("stack underflow (sp = {sp:#04X})")]
  StackUnderflow { sp: u8 },

  #[error("return address {address:#06X} does not fit in a byte")]
  AddressOverflow { address: usize },

  #[error("program of {size} bytes does not fit in {capacity} bytes of memory")]
  ProgramTooLarge { size: usize, capacity: usize },

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("machine is halted")]
  MachineHalted,

  #[error("gave up after {0} instructions")]
  StepLimitExceeded(u64),

  #[error("could not write output")]
  Io(#[from] io::Error),
}

struct Task<'vm, 'out, W> {
  vm: &'vm mut Vm,
  out: &'out mut W,
}

impl<'vm, 'out, W> Task<'vm, 'out, W>
where
  W: Write,
{
  fn new(vm: &'vm mut Vm, out: &'out mut W) -> Self {
    Self { vm, out }
  }

  fn fetch(&mut self) -> Result<(), Error> {
    let pc = self.vm.pc;
    self.vm.ir = self.vm.read(pc)?;
    self.vm.operand_a = self.vm.read(pc + 1)?;
    self.vm.operand_b = self.vm.read(pc + 2)?;
    Ok(())
  }

  #[inline]
  fn advance(&mut self, op: Opcode) {
    self.vm.pc += op.width();
  }

  fn run(&mut self) -> Result<(), Error> {
    let pc = self.vm.pc;
    log::trace!("{}", self.vm.trace());
    self.fetch()?;
    let op = match Opcode::try_from(self.vm.ir) {
      Ok(op) => op,
      Err(opcode) => {
        log::warn!("unknown instruction {opcode:#010b} at address {pc}");
        self.vm.state = State::Trapped { address: pc, opcode };
        return Ok(());
      }
    };
    log::trace!("{pc:02X}: {}", op.mnemonic());
    match op {
      Opcode::Halt => halt(self),
      Opcode::LoadImmediate => load_immediate(self)?,
      Opcode::Print => print(self)?,
      Opcode::Multiply => arithmetic(self, op, Operation::Mul)?,
      Opcode::Add => arithmetic(self, op, Operation::Add)?,
      Opcode::Push => push(self)?,
      Opcode::Pop => pop(self)?,
      Opcode::Return => ret(self)?,
      Opcode::Call => call(self)?,
      Opcode::Compare => compare(self)?,
      Opcode::JumpIfNotEqual => jump_if(self, op, |fl| fl & FLAG_EQUAL == 0)?,
      Opcode::JumpIfEqual => jump_if(self, op, |fl| fl & FLAG_EQUAL != 0)?,
      Opcode::Jump => jump(self)?,
    }
    Ok(())
  }
}

// (stop execution)
fn halt<W>(task: &mut Task<'_, '_, W>)
where
  W: Write,
{
  task.vm.state = State::Halted;
}

// r[a] ← b
fn load_immediate<W>(task: &mut Task<'_, '_, W>) -> Result<(), Error>
where
  W: Write,
{
  task.vm.set_register(task.vm.operand_a, task.vm.operand_b)?;
  task.advance(Opcode::LoadImmediate);
  Ok(())
}

// out ← r[a]
fn print<W>(task: &mut Task<'_, '_, W>) -> Result<(), Error>
where
  W: Write,
{
  let value = task.vm.register(task.vm.operand_a)?;
  writeln!(task.out, "{value}")?;
  task.advance(Opcode::Print);
  Ok(())
}

// r[a] ← r[a] op r[b]
fn arithmetic<W>(task: &mut Task<'_, '_, W>, op: Opcode, alu: Operation) -> Result<(), Error>
where
  W: Write,
{
  task.vm.alu(alu, task.vm.operand_a, task.vm.operand_b)?;
  task.advance(op);
  Ok(())
}

// sp ← sp − 1 ; m[sp] ← r[a]
fn push<W>(task: &mut Task<'_, '_, W>) -> Result<(), Error>
where
  W: Write,
{
  let value = task.vm.register(task.vm.operand_a)?;
  task.vm.push(value)?;
  task.advance(Opcode::Push);
  Ok(())
}

// r[a] ← m[sp] ; sp ← sp + 1
fn pop<W>(task: &mut Task<'_, '_, W>) -> Result<(), Error>
where
  W: Write,
{
  // validate the destination before touching the stack
  task.vm.register(task.vm.operand_a)?;
  let value = task.vm.pop()?;
  task.vm.set_register(task.vm.operand_a, value)?;
  task.advance(Opcode::Pop);
  Ok(())
}

// pc ← m[sp] ; sp ← sp + 1
fn ret<W>(task: &mut Task<'_, '_, W>) -> Result<(), Error>
where
  W: Write,
{
  task.vm.pc = task.vm.pop()? as usize;
  Ok(())
}

// push(pc + 2) ; pc ← r[a]
fn call<W>(task: &mut Task<'_, '_, W>) -> Result<(), Error>
where
  W: Write,
{
  let next = task.vm.pc + Opcode::Call.width();
  let address = u8::try_from(next).map_err(|_| Error::AddressOverflow { address: next })?;
  task.vm.register(task.vm.operand_a)?;
  task.vm.push(address)?;
  // read the target after the push, so `CALL r7` sees the new sp
  task.vm.pc = task.vm.register(task.vm.operand_a)? as usize;
  Ok(())
}

// fl ← L | G | E
fn compare<W>(task: &mut Task<'_, '_, W>) -> Result<(), Error>
where
  W: Write,
{
  let a = task.vm.register(task.vm.operand_a)?;
  let b = task.vm.register(task.vm.operand_b)?;
  task.vm.fl = match a.cmp(&b) {
    std::cmp::Ordering::Equal => FLAG_EQUAL,
    std::cmp::Ordering::Greater => FLAG_GREATER,
    std::cmp::Ordering::Less => FLAG_LESS,
  };
  log::trace!("CMP {a} {b} -> {:#05b}", task.vm.fl);
  task.advance(Opcode::Compare);
  Ok(())
}

// if cond(fl) : pc ← r[a]
fn jump_if<W>(task: &mut Task<'_, '_, W>, op: Opcode, cond: fn(u8) -> bool) -> Result<(), Error>
where
  W: Write,
{
  let target = task.vm.register(task.vm.operand_a)?;
  if cond(task.vm.fl) {
    task.vm.pc = target as usize;
  } else {
    task.advance(op);
  }
  Ok(())
}

// pc ← r[a]
fn jump<W>(task: &mut Task<'_, '_, W>) -> Result<(), Error>
where
  W: Write,
{
  task.vm.pc = task.vm.register(task.vm.operand_a)? as usize;
  Ok(())
}
