//! Structured vector instructions and their mnemonic rendering.
//!
//! The dispatcher decodes these variants directly; the `Display` impl
//! renders the C-macro / inline-assembly form used in generated test
//! kernels and logs. The text is a view, never the decode input.

use std::fmt;

use super::{Lmul, Sew};

/// One instruction of the generated stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `vsetvli`-style CSR update: vector length, element width, group
    /// multiplier.
    SetLength { vl: u64, sew: Sew, lmul: Lmul },

    /// CSR write of the resume element index.
    SetStart { vstart: u64 },

    /// Unit-stride vector load into `vd` from `address`.
    Load { sew: Sew, vd: usize, address: u64 },

    /// Unit-stride vector store of `vs` to `address`.
    Store { sew: Sew, vs: usize, address: u64 },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::SetLength { vl, sew, lmul } => {
                write!(f, "VSET({vl}, {sew}, {lmul});")
            }
            Instruction::SetStart { vstart } => {
                write!(f, "write_csr(vstart, {vstart});")
            }
            Instruction::Load { sew, vd, address } => {
                write!(
                    f,
                    "asm volatile(\"vle{bits}.v v{vd}, (%0)\" ::\"r\"((uint{bits}_t*){address}));",
                    bits = sew.bits()
                )
            }
            Instruction::Store { sew, vs, address } => {
                write!(
                    f,
                    "asm volatile(\"vse{bits}.v v{vs}, (%0)\" ::\"r\"((uint{bits}_t*){address}));",
                    bits = sew.bits()
                )
            }
        }
    }
}
