//! Load/store unit: element address generation against word-organized memory.
//!
//! The LSU operates on a CSR window `(vl, vstart, SEW)` set before each
//! memory operation. It turns the window plus a stride into a sequence of
//! byte addresses and aggregates the sub-word element traffic into aligned
//! 64-bit word accesses: loads fetch a memory word only when the word index
//! changes, stores accumulate a byte strobe and packed data for the current
//! word and flush it on every word-index change and once more at the end.

use thiserror::Error;

use crate::device::{MainMemory, MemoryError};
use crate::isa::Sew;

/// Stride selection for a vector memory operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stride {
    /// Consecutive elements, `SEW/8` bytes apart.
    Unit,
    /// Literal byte stride between consecutive elements.
    Bytes(u64),
}

impl Stride {
    /// Distance between consecutive element addresses in bytes.
    #[inline]
    pub fn element_bytes(self, sew: Sew) -> u64 {
        match self {
            Stride::Unit => sew.bytes(),
            Stride::Bytes(bytes) => bytes,
        }
    }
}

/// Error type for LSU operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LsuError {
    /// Window with `vl < vstart` (negative element count).
    #[error("invalid window: vl {vl} < vstart {vstart}")]
    InvalidWindow {
        /// Requested vector length.
        vl: u64,
        /// Requested start index.
        vstart: u64,
    },

    /// An element that straddles a 64-bit word boundary. Element accesses
    /// are assembled within one memory word; the base address must be
    /// aligned to the element size.
    #[error("element at 0x{address:08X} straddles a word boundary (SEW {sew_bits})")]
    UnalignedElement {
        /// The element's byte address.
        address: u64,
        /// Element width in bits.
        sew_bits: u32,
    },

    /// Underlying memory access failure.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// One pending store word: strobe and data accumulated for a word index.
struct StoreWindow {
    word_index: u64,
    strobe: u8,
    data: u64,
}

/// Address-generation unit for vector loads and stores.
pub struct LoadStoreUnit {
    vl: u64,
    vstart: u64,
    sew: Sew,
}

impl Default for LoadStoreUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStoreUnit {
    /// Create an LSU with an empty window.
    pub fn new() -> Self {
        Self {
            vl: 0,
            vstart: 0,
            sew: Sew::E8,
        }
    }

    /// Set the CSR window for the next operation.
    pub fn set_window(&mut self, vl: u64, vstart: u64, sew: Sew) -> Result<(), LsuError> {
        if vl < vstart {
            return Err(LsuError::InvalidWindow { vl, vstart });
        }
        self.vl = vl;
        self.vstart = vstart;
        self.sew = sew;
        Ok(())
    }

    /// Number of elements the current window covers.
    pub fn element_count(&self) -> u64 {
        self.vl - self.vstart
    }

    /// Byte address of element `vstart + offset`.
    #[inline]
    fn element_address(&self, base: u64, stride: Stride, offset: u64) -> u64 {
        base + (self.vstart + offset) * stride.element_bytes(self.sew)
    }

    /// Bit offset of an element within its 64-bit word, checking that the
    /// element does not straddle the word boundary.
    fn bit_offset(&self, address: u64) -> Result<u32, LsuError> {
        let offset = ((address & 0b111) * 8) as u32;
        if offset + self.sew.bits() > 64 {
            return Err(LsuError::UnalignedElement {
                address,
                sew_bits: self.sew.bits(),
            });
        }
        Ok(offset)
    }

    /// Load the window's elements from memory, in element order.
    ///
    /// A memory word is fetched only when the 8-byte-aligned word index
    /// changes between consecutive elements.
    pub fn load(
        &self,
        memory: &MainMemory,
        base: u64,
        stride: Stride,
    ) -> Result<Vec<u64>, LsuError> {
        let count = self.element_count();
        let mask = self.sew.element_mask();
        let mut current: Option<(u64, u64)> = None; // (word index, word)
        let mut out = Vec::with_capacity(count as usize);

        for offset in 0..count {
            let address = self.element_address(base, stride, offset);
            let word_index = address >> 3;
            let word = match current {
                Some((index, word)) if index == word_index => word,
                _ => {
                    let word = memory.read_word(address)?;
                    current = Some((word_index, word));
                    word
                }
            };
            let shift = self.bit_offset(address)?;
            out.push((word >> shift) & mask);
        }
        Ok(out)
    }

    /// Store `values` to memory at the window's element addresses.
    ///
    /// Elements targeting the same 64-bit word are merged into a single
    /// strobed write; the pending word is flushed whenever the word index
    /// changes, and the final partial word is flushed unconditionally before
    /// returning.
    pub fn store(
        &self,
        memory: &mut MainMemory,
        base: u64,
        stride: Stride,
        values: &[u64],
    ) -> Result<(), LsuError> {
        let mask = self.sew.element_mask();
        let element_bytes = self.sew.bytes() as u32;
        let mut pending: Option<StoreWindow> = None;

        for (offset, &value) in values.iter().enumerate() {
            let address = self.element_address(base, stride, offset as u64);
            let word_index = address >> 3;

            if pending.as_ref().is_some_and(|w| w.word_index != word_index) {
                if let Some(window) = pending.take() {
                    memory.write_word(window.word_index << 3, window.strobe, window.data)?;
                }
            }

            let shift = self.bit_offset(address)?;
            let byte_lane = (address & 0b111) as u32;
            let strobe = (((1u16 << element_bytes) - 1) << byte_lane) as u8;

            let window = pending.get_or_insert(StoreWindow {
                word_index,
                strobe: 0,
                data: 0,
            });
            window.strobe |= strobe;
            window.data |= (value & mask) << shift;
        }

        if let Some(window) = pending {
            memory.write_word(window.word_index << 3, window.strobe, window.data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with_pattern() -> MainMemory {
        let mut mem = MainMemory::new(0x1000, 16);
        let bytes: Vec<u8> = (0u16..128).map(|b| b as u8).collect();
        mem.bulk_load(&bytes).unwrap();
        mem
    }

    #[test]
    fn test_invalid_window() {
        let mut lsu = LoadStoreUnit::new();
        assert!(matches!(
            lsu.set_window(3, 5, Sew::E8),
            Err(LsuError::InvalidWindow { vl: 3, vstart: 5 })
        ));
        lsu.set_window(5, 5, Sew::E8).unwrap();
        assert_eq!(lsu.element_count(), 0);
    }

    #[test]
    fn test_unit_stride_load_bytes() {
        let mem = memory_with_pattern();
        let mut lsu = LoadStoreUnit::new();
        lsu.set_window(12, 0, Sew::E8).unwrap();

        let values = lsu.load(&mem, 0x1000, Stride::Unit).unwrap();
        assert_eq!(values, (0..12).collect::<Vec<u64>>());
    }

    #[test]
    fn test_vstart_skips_elements() {
        let mem = memory_with_pattern();
        let mut lsu = LoadStoreUnit::new();
        // Window [5, 20) at SEW=16: element k sits at base + k*2
        lsu.set_window(20, 5, Sew::E16).unwrap();

        let values = lsu.load(&mem, 0x1000, Stride::Unit).unwrap();
        assert_eq!(values.len(), 15);
        assert_eq!(values[0], 0x0B0A);
        assert_eq!(values[14], 0x2726);
    }

    #[test]
    fn test_strided_load() {
        let mem = memory_with_pattern();
        let mut lsu = LoadStoreUnit::new();
        lsu.set_window(4, 0, Sew::E8).unwrap();

        // Every 16th byte
        let values = lsu.load(&mem, 0x1000, Stride::Bytes(16)).unwrap();
        assert_eq!(values, vec![0x00, 0x10, 0x20, 0x30]);
    }

    #[test]
    fn test_literal_one_byte_stride() {
        let mem = memory_with_pattern();
        let mut lsu = LoadStoreUnit::new();
        lsu.set_window(4, 0, Sew::E16).unwrap();

        // Overlapping 16-bit reads one byte apart
        let values = lsu.load(&mem, 0x1000, Stride::Bytes(1)).unwrap();
        assert_eq!(values, vec![0x0100, 0x0201, 0x0302, 0x0403]);
    }

    #[test]
    fn test_load_word_zero() {
        // A base in the very first memory word must still fetch it
        let mut mem = MainMemory::new(0, 2);
        mem.bulk_load(&[0xAA, 0xBB, 0xCC]).unwrap();
        let mut lsu = LoadStoreUnit::new();
        lsu.set_window(3, 0, Sew::E8).unwrap();

        assert_eq!(lsu.load(&mem, 0, Stride::Unit).unwrap(), vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_unaligned_element_rejected() {
        let mem = memory_with_pattern();
        let mut lsu = LoadStoreUnit::new();
        lsu.set_window(2, 0, Sew::E32).unwrap();

        // 32-bit elements 3 bytes apart: the second one straddles a word
        let err = lsu.load(&mem, 0x1003, Stride::Bytes(3)).unwrap_err();
        assert!(matches!(err, LsuError::UnalignedElement { sew_bits: 32, .. }));
    }

    #[test]
    fn test_store_flushes_trailing_partial_word() {
        let mut mem = MainMemory::new(0x1000, 4);
        let mut lsu = LoadStoreUnit::new();
        lsu.set_window(3, 0, Sew::E8).unwrap();

        // Three bytes never cross a word boundary, so the only write is the
        // final flush
        lsu.store(&mut mem, 0x1000, Stride::Unit, &[0x11, 0x22, 0x33])
            .unwrap();
        assert_eq!(mem.read_word(0x1000).unwrap(), 0x0000000000332211);
    }

    #[test]
    fn test_store_preserves_unstrobed_bytes() {
        let mut mem = MainMemory::new(0x1000, 4);
        mem.bulk_load(&[0xFF; 16]).unwrap();
        let mut lsu = LoadStoreUnit::new();
        lsu.set_window(2, 0, Sew::E8).unwrap();

        // Write two bytes in the middle of the word
        lsu.store(&mut mem, 0x1003, Stride::Unit, &[0x11, 0x22]).unwrap();
        assert_eq!(mem.read_word(0x1000).unwrap(), 0xFFFF_FF22_11FF_FFFF);
    }

    #[test]
    fn test_store_across_word_boundary() {
        let mut mem = MainMemory::new(0x1000, 4);
        let mut lsu = LoadStoreUnit::new();
        lsu.set_window(6, 0, Sew::E16).unwrap();

        // 12 bytes of 16-bit elements: fills word 0, half of word 1
        lsu.store(
            &mut mem,
            0x1000,
            Stride::Unit,
            &[0x1111, 0x2222, 0x3333, 0x4444, 0x5555, 0x6666],
        )
        .unwrap();
        assert_eq!(mem.read_word(0x1000).unwrap(), 0x4444333322221111);
        assert_eq!(mem.read_word(0x1008).unwrap(), 0x0000000066665555);
    }

    #[test]
    fn test_store_respects_vstart_offset() {
        let mut mem = MainMemory::new(0x1000, 4);
        let mut lsu = LoadStoreUnit::new();
        // vstart=8 at SEW=8: element addresses start at base + 8
        lsu.set_window(10, 8, Sew::E8).unwrap();

        lsu.store(&mut mem, 0x1000, Stride::Unit, &[0xAA, 0xBB]).unwrap();
        assert_eq!(mem.read_word(0x1000).unwrap(), 0);
        assert_eq!(mem.read_word(0x1008).unwrap(), 0x000000000000BBAA);
    }

    #[test]
    fn test_strided_store_one_write_per_word() {
        let mut mem = MainMemory::new(0x1000, 4);
        let mut lsu = LoadStoreUnit::new();
        lsu.set_window(3, 0, Sew::E8).unwrap();

        lsu.store(&mut mem, 0x1004, Stride::Bytes(8), &[0xAA, 0xBB, 0xCC])
            .unwrap();
        assert_eq!(mem.read_word(0x1000).unwrap(), 0x000000AA_00000000);
        assert_eq!(mem.read_word(0x1008).unwrap(), 0x000000BB_00000000);
        assert_eq!(mem.read_word(0x1010).unwrap(), 0x000000CC_00000000);
    }

    #[test]
    fn test_store_out_of_range_propagates() {
        let mut mem = MainMemory::new(0x1000, 1);
        let mut lsu = LoadStoreUnit::new();
        lsu.set_window(4, 0, Sew::E64).unwrap();

        let err = lsu
            .store(&mut mem, 0x1000, Stride::Unit, &[1, 2, 3, 4])
            .unwrap_err();
        assert!(matches!(err, LsuError::Memory(MemoryError::OutOfRange { .. })));
    }
}
