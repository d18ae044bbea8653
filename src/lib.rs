//! Bare-bones simulator for the LS-8, an 8-bit stored-program machine
//!
//! 256 bytes of memory, eight byte-wide registers (with `r7` doubling as the
//! stack pointer), a program counter and a tiny `LGE` flag register.

pub mod alu;
pub mod opcode;
pub mod region;
pub mod vm;
