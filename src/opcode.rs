/// An instruction byte, laid out as `AABCDDDD`.
///
/// `AA` is the number of operand bytes that follow the opcode, so the width of
/// every instruction can be read straight off the opcode itself.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
  /// Stops the machine.
  ///
  /// | Operation | Semantics/RTL      | Assembly |
  /// |-----------|--------------------|----------|
  /// | Halt      | `(stop execution)` | `HLT`    |
  Halt = 0b0000_0001,

  /// Loads an immediate value into a register.
  ///
  /// | Operation      | Semantics/RTL | Assembly       |
  /// |----------------|---------------|----------------|
  /// | Load Immediate | `r[a] ← b`    | `LDI ra, b`    |
  LoadImmediate = 0b1000_0010,

  /// Prints the decimal value of a register.
  ///
  /// | Operation | Semantics/RTL    | Assembly |
  /// |-----------|------------------|----------|
  /// | Print     | `out ← r[a]`     | `PRN ra` |
  Print = 0b0100_0111,

  /// | Operation | Semantics/RTL           | Assembly      |
  /// |-----------|-------------------------|---------------|
  /// | Multiply  | `r[a] ← r[a] × r[b]`    | `MUL ra, rb`  |
  Multiply = 0b1010_0010,

  /// | Operation | Semantics/RTL           | Assembly      |
  /// |-----------|-------------------------|---------------|
  /// | Add       | `r[a] ← r[a] + r[b]`    | `ADD ra, rb`  |
  Add = 0b1010_0000,

  /// | Operation | Semantics/RTL                    | Assembly  |
  /// |-----------|----------------------------------|-----------|
  /// | Push      | `sp ← sp − 1 ; m[sp] ← r[a]`     | `PUSH ra` |
  Push = 0b0100_0101,

  /// | Operation | Semantics/RTL                    | Assembly |
  /// |-----------|----------------------------------|----------|
  /// | Pop       | `r[a] ← m[sp] ; sp ← sp + 1`     | `POP ra` |
  Pop = 0b0100_0110,

  /// | Operation | Semantics/RTL                 | Assembly |
  /// |-----------|-------------------------------|----------|
  /// | Return    | `pc ← m[sp] ; sp ← sp + 1`    | `RET`    |
  Return = 0b0001_0001,

  /// | Operation | Semantics/RTL                                   | Assembly  |
  /// |-----------|-------------------------------------------------|-----------|
  /// | Call      | `sp ← sp − 1 ; m[sp] ← pc + 2 ; pc ← r[a]`      | `CALL ra` |
  Call = 0b0101_0000,

  /// Compares two registers and sets exactly one of the `E` (bit 2), `G`
  /// (bit 1) and `L` (bit 0) flags.
  ///
  /// | Operation | Semantics/RTL          | Assembly     |
  /// |-----------|------------------------|--------------|
  /// | Compare   | `fl ← cmp(r[a], r[b])` | `CMP ra, rb` |
  Compare = 0b1010_0111,

  /// | Operation        | Semantics/RTL          | Assembly |
  /// |------------------|------------------------|----------|
  /// | Jump If Not Equal| `if !E : pc ← r[a]`    | `JNE ra` |
  JumpIfNotEqual = 0b0101_0110,

  /// | Operation     | Semantics/RTL         | Assembly |
  /// |---------------|-----------------------|----------|
  /// | Jump If Equal | `if E : pc ← r[a]`    | `JEQ ra` |
  JumpIfEqual = 0b0101_0101,

  /// | Operation | Semantics/RTL | Assembly |
  /// |-----------|---------------|----------|
  /// | Jump      | `pc ← r[a]`   | `JMP ra` |
  Jump = 0b0101_0100,
}

impl Opcode {
  /// Number of operand bytes following the opcode.
  pub fn operands(self) -> usize {
    ((self as u8) >> 6) as usize
  }

  /// Bytes consumed by the instruction when it falls through.
  pub fn width(self) -> usize {
    1 + self.operands()
  }

  pub fn mnemonic(self) -> &'static str {
    match self {
      Self::Halt => "HLT",
      Self::LoadImmediate => "LDI",
      Self::Print => "PRN",
      Self::Multiply => "MUL",
      Self::Add => "ADD",
      Self::Push => "PUSH",
      Self::Pop => "POP",
      Self::Return => "RET",
      Self::Call => "CALL",
      Self::Compare => "CMP",
      Self::JumpIfNotEqual => "JNE",
      Self::JumpIfEqual => "JEQ",
      Self::Jump => "JMP",
    }
  }
}

impl TryFrom<u8> for Opcode {
  /// the byte that has no table entry
  type Error = u8;

  fn try_from(byte: u8) -> Result<Self, Self::Error> {
    let op = match byte {
      0b0000_0001 => Self::Halt,
      0b1000_0010 => Self::LoadImmediate,
      0b0100_0111 => Self::Print,
      0b1010_0010 => Self::Multiply,
      0b1010_0000 => Self::Add,
      0b0100_0101 => Self::Push,
      0b0100_0110 => Self::Pop,
      0b0001_0001 => Self::Return,
      0b0101_0000 => Self::Call,
      0b1010_0111 => Self::Compare,
      0b0101_0110 => Self::JumpIfNotEqual,
      0b0101_0101 => Self::JumpIfEqual,
      0b0101_0100 => Self::Jump,
      other => return Err(other),
    };
    Ok(op)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL: [Opcode; 13] = [
    Opcode::Halt,
    Opcode::LoadImmediate,
    Opcode::Print,
    Opcode::Multiply,
    Opcode::Add,
    Opcode::Push,
    Opcode::Pop,
    Opcode::Return,
    Opcode::Call,
    Opcode::Compare,
    Opcode::JumpIfNotEqual,
    Opcode::JumpIfEqual,
    Opcode::Jump,
  ];

  #[test]
  fn decodes_every_table_entry() {
    for op in ALL {
      assert_eq!(Opcode::try_from(op as u8), Ok(op));
    }
  }

  #[test]
  fn rejects_unknown_bytes() {
    assert_eq!(Opcode::try_from(0b0000_0000u8), Err(0));
    assert_eq!(Opcode::try_from(0xFFu8), Err(0xFF));
    let known = (0..=u8::MAX).filter(|b| Opcode::try_from(*b).is_ok()).count();
    assert_eq!(known, ALL.len());
  }

  #[test]
  fn widths() {
    assert_eq!(Opcode::Halt.width(), 1);
    assert_eq!(Opcode::Return.width(), 1);
    assert_eq!(Opcode::Print.width(), 2);
    assert_eq!(Opcode::Call.width(), 2);
    assert_eq!(Opcode::Jump.width(), 2);
    assert_eq!(Opcode::LoadImmediate.width(), 3);
    assert_eq!(Opcode::Compare.width(), 3);
  }

  #[test]
  fn mnemonics() {
    assert_eq!(Opcode::JumpIfNotEqual.mnemonic(), "JNE");
    assert_eq!(Opcode::LoadImmediate.mnemonic(), "LDI");
  }
}
