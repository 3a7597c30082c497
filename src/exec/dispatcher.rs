//! CSR state machine and instruction decode.
//!
//! The dispatcher owns the CSR-like state the memory pipeline consumes:
//! `vl`, `vstart`, the current element width and group multiplier, the
//! active register number and the scalar base address. Decoding an
//! instruction updates this state and yields an operation tag; the engine
//! then drives the LSU and register file from the updated state.
//!
//! Reserved `vtype` encodings model a malformed CSR write in the hardware,
//! not a tool failure: they clamp to the safe defaults (SEW=8, LMUL=1) with
//! a warning and the run continues.

use crate::isa::{Instruction, Lmul, Sew};

/// Operation selected by a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// CSR update only: vector length / width / multiplier.
    SetLength,
    /// CSR update only: resume element index.
    SetStart,
    /// Memory -> register file transfer.
    Load,
    /// Register file -> memory transfer.
    Store,
}

/// CSR-holding decoder for the generated instruction stream.
pub struct Dispatcher {
    vlen: u64,

    sew: Sew,
    lmul: Lmul,
    vl: u64,
    vstart: u64,
    register: usize,
    scalar_address: u64,

    vtype: u16,
    vta: bool,
    vma: bool,
}

impl Dispatcher {
    /// Create a dispatcher for a machine with `vlen`-bit registers, with
    /// CSRs at their reset values.
    pub fn new(vlen: u64) -> Self {
        let mut dispatcher = Self {
            vlen,
            sew: Sew::E8,
            lmul: Lmul::M1,
            vl: 0,
            vstart: 0,
            register: 0,
            scalar_address: 0,
            vtype: 0,
            vta: false,
            vma: false,
        };
        dispatcher.vtype = dispatcher.pack_vtype();
        dispatcher
    }

    /// Decode one instruction, updating CSR state, and return the operation
    /// it selects.
    pub fn decode(&mut self, instruction: &Instruction) -> Operation {
        match *instruction {
            Instruction::SetLength { vl, sew, lmul } => {
                self.vl = vl;
                self.set_vtype(lmul.encoding(), sew.encoding(), false, false);
                Operation::SetLength
            }
            Instruction::SetStart { vstart } => {
                self.vstart = vstart;
                Operation::SetStart
            }
            Instruction::Load { sew, vd, address } => {
                self.sew = sew;
                self.register = vd;
                self.scalar_address = address;
                Operation::Load
            }
            Instruction::Store { sew, vs, address } => {
                self.sew = sew;
                self.register = vs;
                self.scalar_address = address;
                Operation::Store
            }
        }
    }

    /// Write the `vtype` CSR from its raw field encodings, returning the
    /// packed register value.
    ///
    /// Reserved encodings (vlmul 4, vsew above 3) clamp to LMUL=1 / SEW=8
    /// and log a warning; the modeled hardware marks such writes ill-formed
    /// but this tool keeps running on the safe default.
    pub fn set_vtype(&mut self, vlmul: u8, vsew: u8, vta: bool, vma: bool) -> u16 {
        self.lmul = match Lmul::from_encoding(vlmul) {
            Ok(lmul) => lmul,
            Err(err) => {
                log::warn!("{err}; clamping to m1");
                Lmul::M1
            }
        };
        self.sew = match Sew::from_encoding(vsew) {
            Ok(sew) => sew,
            Err(err) => {
                log::warn!("{err}; clamping to e8");
                Sew::E8
            }
        };
        self.vta = vta;
        self.vma = vma;
        self.vtype = self.pack_vtype();
        self.vtype
    }

    fn pack_vtype(&self) -> u16 {
        (self.lmul.encoding() as u16)
            | ((self.sew.encoding() as u16) << 3)
            | ((self.vta as u16) << 6)
            | ((self.vma as u16) << 7)
    }

    /// Maximum elements addressable under the current `vtype`.
    pub fn vlmax(&self) -> u64 {
        self.lmul.vlmax(self.vlen, self.sew)
    }

    /// Current vector length.
    pub fn vl(&self) -> u64 {
        self.vl
    }

    /// Current resume element index.
    pub fn vstart(&self) -> u64 {
        self.vstart
    }

    /// Current element width.
    pub fn sew(&self) -> Sew {
        self.sew
    }

    /// Current group multiplier.
    pub fn lmul(&self) -> Lmul {
        self.lmul
    }

    /// Register number of the last decoded load/store.
    pub fn register(&self) -> usize {
        self.register
    }

    /// Scalar base address of the last decoded load/store.
    pub fn scalar_address(&self) -> u64 {
        self.scalar_address
    }

    /// Packed `vtype` CSR value.
    pub fn vtype(&self) -> u16 {
        self.vtype
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_length_updates_csrs() {
        let mut dispatcher = Dispatcher::new(4096);
        let op = dispatcher.decode(&Instruction::SetLength {
            vl: 160,
            sew: Sew::E8,
            lmul: Lmul::M8,
        });

        assert_eq!(op, Operation::SetLength);
        assert_eq!(dispatcher.vl(), 160);
        assert_eq!(dispatcher.sew(), Sew::E8);
        assert_eq!(dispatcher.lmul(), Lmul::M8);
        assert_eq!(dispatcher.vlmax(), 4096);
        // vlmul=3 in bits [2:0], vsew=0 in bits [5:3]
        assert_eq!(dispatcher.vtype(), 0b0000_0011);
    }

    #[test]
    fn test_set_start() {
        let mut dispatcher = Dispatcher::new(4096);
        let op = dispatcher.decode(&Instruction::SetStart { vstart: 8 });
        assert_eq!(op, Operation::SetStart);
        assert_eq!(dispatcher.vstart(), 8);
    }

    #[test]
    fn test_load_operands() {
        let mut dispatcher = Dispatcher::new(4096);
        let op = dispatcher.decode(&Instruction::Load {
            sew: Sew::E8,
            vd: 2,
            address: 0xE000_0000,
        });

        assert_eq!(op, Operation::Load);
        assert_eq!(dispatcher.sew(), Sew::E8);
        assert_eq!(dispatcher.register(), 2);
        assert_eq!(dispatcher.scalar_address(), 0xE000_0000);
    }

    #[test]
    fn test_store_operands() {
        let mut dispatcher = Dispatcher::new(4096);
        let op = dispatcher.decode(&Instruction::Store {
            sew: Sew::E16,
            vs: 5,
            address: 0x1000,
        });

        assert_eq!(op, Operation::Store);
        assert_eq!(dispatcher.register(), 5);
        assert_eq!(dispatcher.scalar_address(), 0x1000);
    }

    #[test]
    fn test_vtype_packing() {
        let mut dispatcher = Dispatcher::new(4096);
        // e32 (vsew=2), m2 (vlmul=1), vta, vma
        let vtype = dispatcher.set_vtype(1, 2, true, true);
        assert_eq!(vtype, 0b1101_0001);
        assert_eq!(dispatcher.sew(), Sew::E32);
        assert_eq!(dispatcher.lmul(), Lmul::M2);
    }

    #[test]
    fn test_reserved_encodings_clamp() {
        let mut dispatcher = Dispatcher::new(4096);
        dispatcher.set_vtype(3, 3, false, false);
        assert_eq!(dispatcher.lmul(), Lmul::M8);

        // vlmul=4 and vsew=5 are reserved: clamp to m1/e8, keep running
        dispatcher.set_vtype(4, 5, false, false);
        assert_eq!(dispatcher.lmul(), Lmul::M1);
        assert_eq!(dispatcher.sew(), Sew::E8);
        assert_eq!(dispatcher.vtype(), 0);
    }

    #[test]
    fn test_state_persists_between_instructions() {
        let mut dispatcher = Dispatcher::new(4096);
        dispatcher.decode(&Instruction::SetLength {
            vl: 16,
            sew: Sew::E8,
            lmul: Lmul::M1,
        });
        dispatcher.decode(&Instruction::SetStart { vstart: 4 });
        dispatcher.decode(&Instruction::Load {
            sew: Sew::E8,
            vd: 1,
            address: 0x100,
        });

        // vl and vstart survive the load decode
        assert_eq!(dispatcher.vl(), 16);
        assert_eq!(dispatcher.vstart(), 4);
    }
}
