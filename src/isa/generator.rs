//! Strip-mining instruction generator.
//!
//! Given a segment descriptor (equal-length byte runs strided through main
//! memory, packed back to back in register-file byte space), the generator
//! emits the minimal CSR-accurate instruction stream that moves every
//! segment: `SetLength` when the vector length changes, `SetStart` when the
//! resume index changes, and one load/store per register/address transition.
//!
//! Each segment is split into operations bounded by VLMAX. An operation that
//! consumes its register group exactly up to the boundary advances the
//! register number by LMUL and resets vstart; otherwise vstart advances
//! within the same group.

use thiserror::Error;

use super::{Instruction, Lmul, Sew};

/// A set of equal-length memory runs mapped into register-file byte space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Number of runs.
    pub count: u64,
    /// Byte distance between consecutive run starts in main memory.
    pub stride_bytes: u64,
    /// Length of each run in bytes.
    pub length_bytes: u64,
    /// Main-memory byte address of the first run.
    pub mem_base: u64,
    /// Register-file byte address where the first run lands; runs are
    /// packed contiguously from here.
    pub vrf_base: u64,
}

/// Direction of the generated data movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Memory to register file.
    Load,
    /// Register file to memory.
    Store,
}

/// Error type for instruction generation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    /// Strip-mining advances registers in whole-group steps; fractional
    /// multipliers have no register step.
    #[error("strip-mining requires an integer group multiplier, got {lmul}")]
    FractionalLmul {
        /// The rejected multiplier.
        lmul: Lmul,
    },

    /// Segment length that does not divide into whole elements.
    #[error("segment length {length_bytes} B is not a multiple of the element size ({sew})")]
    UnalignedLength {
        /// Segment length in bytes.
        length_bytes: u64,
        /// Selected element width.
        sew: Sew,
    },

    /// A register-file placement whose start offset leaves no room in the
    /// group (only element offsets below VLMAX can resume).
    #[error("segment start index {vstart} leaves no room below VLMAX {vlmax}")]
    StartBeyondCapacity {
        /// Derived start element index.
        vstart: u64,
        /// Maximum elements per group.
        vlmax: u64,
    },

    /// The start-index back-off would move the target address below zero.
    #[error("target address 0x{address:08X} underflows when backed off by {backoff} bytes")]
    AddressUnderflow {
        /// Segment base address.
        address: u64,
        /// vstart back-off in bytes.
        backoff: u64,
    },
}

/// Strip-miner for segment load/store streams.
pub struct InstructionGenerator {
    vlen: u64,
    sew: Sew,
    lmul: Lmul,
    vlmax: u64,
}

impl InstructionGenerator {
    /// Create a generator for a machine with `vlen`-bit registers.
    /// Defaults to 8-bit elements, LMUL=1.
    pub fn new(vlen: u64) -> Self {
        let sew = Sew::E8;
        let lmul = Lmul::M1;
        Self {
            vlen,
            sew,
            lmul,
            vlmax: lmul.vlmax(vlen, sew),
        }
    }

    /// Select element width and group multiplier for subsequent streams.
    pub fn vset(&mut self, sew: Sew, lmul: Lmul) -> Result<(), GeneratorError> {
        if lmul.is_fractional() {
            return Err(GeneratorError::FractionalLmul { lmul });
        }
        self.sew = sew;
        self.lmul = lmul;
        self.vlmax = lmul.vlmax(self.vlen, sew);
        Ok(())
    }

    /// Maximum elements one operation can cover.
    pub fn vlmax(&self) -> u64 {
        self.vlmax
    }

    /// Generate the instruction stream moving every run of `segments` in the
    /// given direction.
    pub fn generate(
        &self,
        segments: &SegmentDescriptor,
        direction: Direction,
    ) -> Result<Vec<Instruction>, GeneratorError> {
        if segments.length_bytes % self.sew.bytes() != 0 {
            return Err(GeneratorError::UnalignedLength {
                length_bytes: segments.length_bytes,
                sew: self.sew,
            });
        }
        let sew_bytes = self.sew.bytes();
        let vlen_bytes = self.vlen / 8;
        let lmul_step = self
            .lmul
            .register_count()
            .ok_or(GeneratorError::FractionalLmul { lmul: self.lmul })?;

        let mut stream = Vec::new();

        // CSR reset values: an initial vstart of 0 needs no write, but the
        // first length and first operation always emit.
        let mut last_vl: u64 = 0;
        let mut last_vstart: u64 = 0;
        let mut last_op: Option<(u64, u64)> = None; // (register, address)

        for seg in 0..segments.count {
            let vrf_addr = segments.vrf_base + seg * segments.length_bytes;
            let mut register = vrf_addr / vlen_bytes / lmul_step * lmul_step;
            let mut vstart = vrf_addr % vlen_bytes;
            if vstart >= self.vlmax {
                // A start at or past capacity can never make progress; this
                // arises when a byte placement is combined with SEW > 8
                return Err(GeneratorError::StartBeyondCapacity {
                    vstart,
                    vlmax: self.vlmax,
                });
            }

            // The emitted address is backed off so element index vstart
            // lands on the run's first byte.
            let seg_base = segments.mem_base + seg * segments.stride_bytes;
            let mut target = seg_base.checked_sub(vstart * sew_bytes).ok_or(
                GeneratorError::AddressUnderflow {
                    address: seg_base,
                    backoff: vstart * sew_bytes,
                },
            )?;

            let mut avl = segments.length_bytes / sew_bytes;
            let mut processed = 0;

            while processed < segments.length_bytes {
                let vstart0 = vstart;
                let register0 = register;
                let target0 = target;

                let room = self.vlmax - vstart0;
                let elen = avl.min(room);

                if elen == room {
                    // Consumed exactly up to the group boundary
                    register += lmul_step;
                    vstart = 0;
                } else {
                    vstart += elen;
                }
                processed += elen * sew_bytes;
                avl -= elen;

                // vl counts from element 0, so the skipped region
                // [0, vstart0) is included
                let vl = vstart0 + elen;
                if vl != last_vl {
                    stream.push(Instruction::SetLength {
                        vl,
                        sew: self.sew,
                        lmul: self.lmul,
                    });
                    last_vl = vl;
                }
                if vstart0 != last_vstart {
                    stream.push(Instruction::SetStart { vstart: vstart0 });
                    last_vstart = vstart0;
                }
                if last_op != Some((register0, target0)) {
                    stream.push(match direction {
                        Direction::Load => Instruction::Load {
                            sew: self.sew,
                            vd: register0 as usize,
                            address: target0,
                        },
                        Direction::Store => Instruction::Store {
                            sew: self.sew,
                            vs: register0 as usize,
                            address: target0,
                        },
                    });
                    last_op = Some((register0, target0));
                }

                target += elen * sew_bytes;
            }
        }
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_segment(length_bytes: u64) -> SegmentDescriptor {
        SegmentDescriptor {
            count: 1,
            stride_bytes: 0,
            length_bytes,
            mem_base: 0x1000,
            vrf_base: 0,
        }
    }

    #[test]
    fn test_single_register_fit() {
        // VLEN=128, SEW=8, LMUL=1 -> VLMAX=16; a 10-byte run fits one op
        let generator = InstructionGenerator::new(128);
        let stream = generator
            .generate(&single_segment(10), Direction::Load)
            .unwrap();

        assert_eq!(
            stream,
            vec![
                Instruction::SetLength { vl: 10, sew: Sew::E8, lmul: Lmul::M1 },
                Instruction::Load { sew: Sew::E8, vd: 0, address: 0x1000 },
            ]
        );
    }

    #[test]
    fn test_register_boundary_crossing() {
        // A 20-byte run splits 16 + 4 across v0 and v1
        let generator = InstructionGenerator::new(128);
        let stream = generator
            .generate(&single_segment(20), Direction::Load)
            .unwrap();

        assert_eq!(
            stream,
            vec![
                Instruction::SetLength { vl: 16, sew: Sew::E8, lmul: Lmul::M1 },
                Instruction::Load { sew: Sew::E8, vd: 0, address: 0x1000 },
                Instruction::SetLength { vl: 4, sew: Sew::E8, lmul: Lmul::M1 },
                Instruction::Load { sew: Sew::E8, vd: 1, address: 0x1010 },
            ]
        );
    }

    #[test]
    fn test_store_direction_emits_stores() {
        let generator = InstructionGenerator::new(128);
        let stream = generator
            .generate(&single_segment(10), Direction::Store)
            .unwrap();

        assert_eq!(
            stream,
            vec![
                Instruction::SetLength { vl: 10, sew: Sew::E8, lmul: Lmul::M1 },
                Instruction::Store { sew: Sew::E8, vs: 0, address: 0x1000 },
            ]
        );
    }

    #[test]
    fn test_three_way_split_addresses() {
        // 40 bytes at VLMAX=16: 16 + 16 + 8, addresses advance per step
        let generator = InstructionGenerator::new(128);
        let stream = generator
            .generate(&single_segment(40), Direction::Load)
            .unwrap();

        assert_eq!(
            stream,
            vec![
                Instruction::SetLength { vl: 16, sew: Sew::E8, lmul: Lmul::M1 },
                Instruction::Load { sew: Sew::E8, vd: 0, address: 0x1000 },
                Instruction::Load { sew: Sew::E8, vd: 1, address: 0x1010 },
                Instruction::SetLength { vl: 8, sew: Sew::E8, lmul: Lmul::M1 },
                Instruction::Load { sew: Sew::E8, vd: 2, address: 0x1020 },
            ]
        );
    }

    #[test]
    fn test_vrf_offset_emits_set_start() {
        // VLENB=16: a run landing at register-file byte 4 resumes at
        // element 4 of v0, and the address backs off by the skip
        let generator = InstructionGenerator::new(128);
        let segments = SegmentDescriptor {
            count: 1,
            stride_bytes: 0,
            length_bytes: 8,
            mem_base: 0x1000,
            vrf_base: 4,
        };
        let stream = generator.generate(&segments, Direction::Store).unwrap();

        assert_eq!(
            stream,
            vec![
                Instruction::SetLength { vl: 12, sew: Sew::E8, lmul: Lmul::M1 },
                Instruction::SetStart { vstart: 4 },
                Instruction::Store { sew: Sew::E8, vs: 0, address: 0x1000 - 4 },
            ]
        );
    }

    #[test]
    fn test_segment_straddles_register_boundary() {
        // Second run starts at register-file byte 10: v0 elements [10,16)
        // then v1 elements [0,4)
        let generator = InstructionGenerator::new(128);
        let segments = SegmentDescriptor {
            count: 2,
            stride_bytes: 0x100,
            length_bytes: 10,
            mem_base: 0x1000,
            vrf_base: 0,
        };
        let stream = generator.generate(&segments, Direction::Store).unwrap();

        assert_eq!(
            stream,
            vec![
                // Run 0: elements [0,10) of v0
                Instruction::SetLength { vl: 10, sew: Sew::E8, lmul: Lmul::M1 },
                Instruction::Store { sew: Sew::E8, vs: 0, address: 0x1000 },
                // Run 1 part 1: elements [10,16) of v0, address backed off 10
                Instruction::SetLength { vl: 16, sew: Sew::E8, lmul: Lmul::M1 },
                Instruction::SetStart { vstart: 10 },
                Instruction::Store { sew: Sew::E8, vs: 0, address: 0x1100 - 10 },
                // Run 1 part 2: elements [0,4) of v1; the address advances
                // by the 6 bytes consumed in part 1
                Instruction::SetLength { vl: 4, sew: Sew::E8, lmul: Lmul::M1 },
                Instruction::SetStart { vstart: 0 },
                Instruction::Store { sew: Sew::E8, vs: 1, address: 0x1100 - 10 + 6 },
            ]
        );
    }

    #[test]
    fn test_lmul_group_register_step() {
        // LMUL=2 -> VLMAX=32; registers advance in steps of 2
        let mut generator = InstructionGenerator::new(128);
        generator.vset(Sew::E8, Lmul::M2).unwrap();
        let stream = generator
            .generate(&single_segment(48), Direction::Load)
            .unwrap();

        assert_eq!(
            stream,
            vec![
                Instruction::SetLength { vl: 32, sew: Sew::E8, lmul: Lmul::M2 },
                Instruction::Load { sew: Sew::E8, vd: 0, address: 0x1000 },
                Instruction::SetLength { vl: 16, sew: Sew::E8, lmul: Lmul::M2 },
                Instruction::Load { sew: Sew::E8, vd: 2, address: 0x1020 },
            ]
        );
    }

    #[test]
    fn test_element_conservation() {
        // Sum of per-operation element counts equals length / element size,
        // tracked through the CSR semantics of the emitted stream
        let mut generator = InstructionGenerator::new(128);
        for (sew, length) in [
            (Sew::E8, 10u64),
            (Sew::E8, 160),
            (Sew::E8, 17),
            (Sew::E16, 64),
            (Sew::E32, 256),
            (Sew::E64, 400),
        ] {
            generator.vset(sew, Lmul::M1).unwrap();
            let stream = generator
                .generate(&single_segment(length), Direction::Load)
                .unwrap();

            let mut vl = 0;
            let mut vstart = 0;
            let mut elements = 0;
            for inst in &stream {
                match *inst {
                    Instruction::SetLength { vl: new_vl, .. } => vl = new_vl,
                    Instruction::SetStart { vstart: new_vstart } => vstart = new_vstart,
                    Instruction::Load { .. } | Instruction::Store { .. } => {
                        elements += vl - vstart;
                    }
                }
            }
            assert_eq!(elements, length / sew.bytes(), "{sew} length {length}");
        }
    }

    #[test]
    fn test_fractional_lmul_rejected() {
        let mut generator = InstructionGenerator::new(128);
        assert!(matches!(
            generator.vset(Sew::E8, Lmul::F2),
            Err(GeneratorError::FractionalLmul { .. })
        ));
    }

    #[test]
    fn test_unaligned_length_rejected() {
        let mut generator = InstructionGenerator::new(128);
        generator.vset(Sew::E32, Lmul::M1).unwrap();
        assert!(matches!(
            generator.generate(&single_segment(10), Direction::Load),
            Err(GeneratorError::UnalignedLength { .. })
        ));
    }

    #[test]
    fn test_address_underflow_rejected() {
        let generator = InstructionGenerator::new(128);
        let segments = SegmentDescriptor {
            count: 1,
            stride_bytes: 0,
            length_bytes: 8,
            mem_base: 2,
            vrf_base: 4, // backs the address off by 4 bytes, below zero
        };
        assert!(matches!(
            generator.generate(&segments, Direction::Load),
            Err(GeneratorError::AddressUnderflow { .. })
        ));
    }
}
