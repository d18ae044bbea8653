use std::fmt;
use std::str::FromStr;

use crate::vm::Error;

/// An arithmetic operation the ALU knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Add,
  Mul,
}

impl Operation {
  /// Apply the operation to two byte values, wrapping modulo 256
  pub fn apply(self, a: u8, b: u8) -> u8 {
    match self {
      Self::Add => a.wrapping_add(b),
      Self::Mul => a.wrapping_mul(b),
    }
  }
}

impl FromStr for Operation {
  type Err = Error;

  fn from_str(name: &str) -> Result<Self, Self::Err> {
    match name {
      "ADD" => Ok(Self::Add),
      "MUL" => Ok(Self::Mul),
      other => Err(Error::UnsupportedOperation(other.to_owned())),
    }
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Add => f.write_str("ADD"),
      Self::Mul => f.write_str("MUL"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn add_wraps() {
    assert_eq!(Operation::Add.apply(8, 9), 17);
    assert_eq!(Operation::Add.apply(200, 100), 44);
  }

  #[test]
  fn mul_wraps() {
    assert_eq!(Operation::Mul.apply(8, 9), 72);
    assert_eq!(Operation::Mul.apply(16, 16), 0);
    assert_eq!(Operation::Mul.apply(20, 13), 4); // 260 mod 256
  }

  #[test]
  fn commutative() {
    for (a, b) in [(0, 0), (1, 255), (17, 99), (128, 2), (250, 250)] {
      assert_eq!(Operation::Add.apply(a, b), Operation::Add.apply(b, a));
      assert_eq!(Operation::Mul.apply(a, b), Operation::Mul.apply(b, a));
    }
  }

  #[test]
  fn parse_names() {
    assert_eq!("ADD".parse::<Operation>().unwrap(), Operation::Add);
    assert_eq!("MUL".parse::<Operation>().unwrap(), Operation::Mul);
    assert_eq!(Operation::Mul.to_string(), "MUL");
  }

  #[test]
  fn parse_unsupported() {
    let err = "SUB".parse::<Operation>().unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperation(ref name) if name == "SUB"));
    assert_eq!(err.to_string(), "unsupported ALU operation `SUB`");
  }
}
