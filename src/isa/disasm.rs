//! Reference decoder for raw RV32 vector instruction words.
//!
//! Classifies a 32-bit V-extension word into its fields: the `vset*`
//! configuration forms, unit-stride/strided/indexed loads and stores, and
//! the arithmetic funct3 categories. This exists for cross-checking
//! assembled test kernels against the structured stream; nothing in the
//! execution path depends on it.

use std::fmt;

use super::DecodeError;

const OPCODE_MASK: u32 = 0x7F;
const OPCODE_VECTOR: u32 = 0b101_0111;
const OPCODE_LOAD_FP: u32 = 0b000_0111;
const OPCODE_STORE_FP: u32 = 0b010_0111;

/// Raw `vtype` immediate fields of a `vsetvli`/`vsetivli`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VtypeFields {
    /// `vlmul` encoding, bits [2:0].
    pub vlmul: u8,
    /// `vsew` encoding, bits [5:3].
    pub vsew: u8,
    /// Tail-agnostic flag.
    pub vta: bool,
    /// Mask-agnostic flag.
    pub vma: bool,
}

impl VtypeFields {
    fn from_zimm(zimm: u32) -> Self {
        Self {
            vlmul: (zimm & 0b111) as u8,
            vsew: ((zimm >> 3) & 0b111) as u8,
            vta: (zimm >> 6) & 1 != 0,
            vma: (zimm >> 7) & 1 != 0,
        }
    }
}

/// Memory addressing mode (`mop` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    UnitStride,
    IndexedUnordered,
    Strided,
    IndexedOrdered,
}

impl AddressMode {
    fn from_mop(mop: u32) -> Self {
        match mop & 0b11 {
            0b00 => AddressMode::UnitStride,
            0b01 => AddressMode::IndexedUnordered,
            0b10 => AddressMode::Strided,
            _ => AddressMode::IndexedOrdered,
        }
    }
}

/// Arithmetic operand category (`funct3` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCategory {
    Opivv,
    Opfvv,
    Opmvv,
    Opivi,
    Opivx,
    Opfvf,
    Opmvx,
}

/// A classified vector instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInstruction {
    /// `vsetvli rd, rs1, vtypei`
    Vsetvli { rd: u8, rs1: u8, vtype: VtypeFields },
    /// `vsetivli rd, uimm, vtypei`
    Vsetivli { rd: u8, uimm: u8, vtype: VtypeFields },
    /// `vsetvl rd, rs1, rs2`
    Vsetvl { rd: u8, rs1: u8, rs2: u8 },
    /// Vector load (`vle*`, `vlse*`, `vluxei*`, ...).
    VectorLoad {
        eew: u32,
        mode: AddressMode,
        vm: bool,
        nf: u8,
        rs2: u8,
        rs1: u8,
        vd: u8,
    },
    /// Vector store (`vse*`, `vsse*`, `vsuxei*`, ...).
    VectorStore {
        eew: u32,
        mode: AddressMode,
        vm: bool,
        nf: u8,
        rs2: u8,
        rs1: u8,
        vs3: u8,
    },
    /// Vector arithmetic under opcode `1010111`.
    VectorArith {
        category: OpCategory,
        funct6: u8,
        vm: bool,
        vs2: u8,
        vs1: u8,
        vd: u8,
    },
}

/// Decode one 32-bit instruction word.
pub fn decode(word: u32) -> Result<RawInstruction, DecodeError> {
    match word & OPCODE_MASK {
        OPCODE_VECTOR => decode_vector(word),
        OPCODE_LOAD_FP => decode_memory(word, false),
        OPCODE_STORE_FP => decode_memory(word, true),
        _ => Err(DecodeError::UnsupportedInstruction { word }),
    }
}

fn decode_vector(word: u32) -> Result<RawInstruction, DecodeError> {
    let funct3 = (word >> 12) & 0b111;
    let rd = ((word >> 7) & 0x1F) as u8;
    let rs1 = ((word >> 15) & 0x1F) as u8;

    if funct3 == 0b111 {
        // Configuration forms, distinguished by the top bits
        return Ok(if word >> 31 == 0 {
            RawInstruction::Vsetvli {
                rd,
                rs1,
                vtype: VtypeFields::from_zimm((word >> 20) & 0x7FF),
            }
        } else if (word >> 30) & 1 == 1 {
            RawInstruction::Vsetivli {
                rd,
                uimm: rs1,
                vtype: VtypeFields::from_zimm((word >> 20) & 0x3FF),
            }
        } else {
            RawInstruction::Vsetvl {
                rd,
                rs1,
                rs2: ((word >> 20) & 0x1F) as u8,
            }
        });
    }

    let category = match funct3 {
        0 => OpCategory::Opivv,
        1 => OpCategory::Opfvv,
        2 => OpCategory::Opmvv,
        3 => OpCategory::Opivi,
        4 => OpCategory::Opivx,
        5 => OpCategory::Opfvf,
        6 => OpCategory::Opmvx,
        _ => unreachable!("funct3 == 7 handled above"),
    };
    Ok(RawInstruction::VectorArith {
        category,
        funct6: ((word >> 26) & 0x3F) as u8,
        vm: (word >> 25) & 1 != 0,
        vs2: ((word >> 20) & 0x1F) as u8,
        vs1: rs1,
        vd: rd,
    })
}

fn decode_memory(word: u32, store: bool) -> Result<RawInstruction, DecodeError> {
    let eew = match (word >> 12) & 0b111 {
        0b000 => 8,
        0b101 => 16,
        0b110 => 32,
        0b111 => 64,
        _ => return Err(DecodeError::UnsupportedInstruction { word }),
    };
    let mode = AddressMode::from_mop(word >> 26);
    let vm = (word >> 25) & 1 != 0;
    let nf = ((word >> 29) & 0b111) as u8;
    let rs2 = ((word >> 20) & 0x1F) as u8;
    let rs1 = ((word >> 15) & 0x1F) as u8;
    let reg = ((word >> 7) & 0x1F) as u8;

    Ok(if store {
        RawInstruction::VectorStore {
            eew,
            mode,
            vm,
            nf,
            rs2,
            rs1,
            vs3: reg,
        }
    } else {
        RawInstruction::VectorLoad {
            eew,
            mode,
            vm,
            nf,
            rs2,
            rs1,
            vd: reg,
        }
    })
}

impl fmt::Display for RawInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawInstruction::Vsetvli { rd, rs1, vtype } => write!(
                f,
                "vsetvli x{rd}, x{rs1}, vsew={} vlmul={} vta={} vma={}",
                vtype.vsew, vtype.vlmul, vtype.vta as u8, vtype.vma as u8
            ),
            RawInstruction::Vsetivli { rd, uimm, vtype } => write!(
                f,
                "vsetivli x{rd}, {uimm}, vsew={} vlmul={} vta={} vma={}",
                vtype.vsew, vtype.vlmul, vtype.vta as u8, vtype.vma as u8
            ),
            RawInstruction::Vsetvl { rd, rs1, rs2 } => {
                write!(f, "vsetvl x{rd}, x{rs1}, x{rs2}")
            }
            RawInstruction::VectorLoad { eew, mode, vm, rs1, vd, .. } => write!(
                f,
                "vload e{eew} {mode:?} v{vd}, (x{rs1}){}",
                if *vm { "" } else { ", v0.t" }
            ),
            RawInstruction::VectorStore { eew, mode, vm, rs1, vs3, .. } => write!(
                f,
                "vstore e{eew} {mode:?} v{vs3}, (x{rs1}){}",
                if *vm { "" } else { ", v0.t" }
            ),
            RawInstruction::VectorArith { category, funct6, vd, vs2, vs1, .. } => {
                write!(f, "varith {category:?} funct6=0x{funct6:02X} v{vd}, v{vs2}, {vs1}")
            }
        }
    }
}
