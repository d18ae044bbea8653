use std::fs;
use std::io;
use std::path::Path;

/// A region of program bytes, loaded at address `0`
pub trait Region {
  fn instructions(&self) -> &[u8];
}

/// A `Chunk` is a single program image that our machine may load and execute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
  instructions: Vec<u8>,
}

impl Chunk {
  /// Parse the textual program format: one 8-bit binary literal per line,
  /// with anything after a `#` ignored.
  ///
  /// Lines that are not a binary byte (blank, comment only, garbage) are
  /// skipped, never reported as errors.
  pub fn parse(source: &str) -> Self {
    let mut instructions = Vec::new();
    for (number, line) in source.lines().enumerate() {
      let code = line.split('#').next().unwrap_or_default().trim();
      match u8::from_str_radix(code, 2) {
        Ok(byte) => instructions.push(byte),
        Err(_) => {
          if !code.is_empty() {
            log::debug!("skipping line {}: {:?}", number + 1, code);
          }
        }
      }
    }
    Self { instructions }
  }

  /// Read and [`parse`](Self::parse) a program file
  pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
    let source = fs::read_to_string(path)?;
    Ok(Self::parse(&source))
  }

  pub fn len(&self) -> usize {
    self.instructions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty()
  }
}

impl From<Vec<u8>> for Chunk {
  fn from(instructions: Vec<u8>) -> Self {
    Self { instructions }
  }
}

impl Region for Chunk {
  fn instructions(&self) -> &[u8] {
    &self.instructions
  }
}
