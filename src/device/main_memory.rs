//! Byte-addressable main memory, backed by 64-bit words.
//!
//! The store models an AXI-style memory port: reads return the aligned
//! 64-bit word containing a byte address, writes are read-modify-write with
//! an 8-bit byte strobe selecting which lanes of the word are updated.
//! Sub-word element traffic is assembled into these word accesses by the
//! load/store unit.
//!
//! Addresses are absolute; the configured base address is subtracted before
//! indexing the backing array. Any access outside the array is an error:
//! this is a validation model, so out-of-range traffic means the generated
//! program is wrong and the run must stop.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Width of one memory word in bytes.
pub const WORD_BYTES: usize = 8;

/// Error type for main memory accesses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Byte address falls outside the backing store.
    #[error("address 0x{address:08X} outside memory (base 0x{base:08X}, {depth} words)")]
    OutOfRange {
        /// The offending byte address.
        address: u64,
        /// Configured base address.
        base: u64,
        /// Number of 64-bit words in the store.
        depth: usize,
    },

    /// A preload pattern larger than the backing store.
    #[error("preload pattern of {bytes} bytes exceeds memory capacity of {capacity} bytes")]
    PatternTooLarge {
        /// Pattern size in bytes.
        bytes: usize,
        /// Store capacity in bytes.
        capacity: usize,
    },
}

/// Word-organized main memory with a configurable base address.
pub struct MainMemory {
    base: u64,
    words: Vec<u64>,
}

impl MainMemory {
    /// Create a zeroed memory of `depth` 64-bit words starting at `base`.
    pub fn new(base: u64, depth: usize) -> Self {
        Self {
            base,
            words: vec![0; depth],
        }
    }

    /// Base byte address of the store.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Number of 64-bit words in the store.
    pub fn depth(&self) -> usize {
        self.words.len()
    }

    /// Map a byte address to a word index, checking bounds.
    fn word_index(&self, address: u64) -> Result<usize, MemoryError> {
        let out_of_range = || MemoryError::OutOfRange {
            address,
            base: self.base,
            depth: self.words.len(),
        };
        let relative = address.checked_sub(self.base).ok_or_else(out_of_range)?;
        let index = (relative >> 3) as usize;
        if index >= self.words.len() {
            return Err(out_of_range());
        }
        Ok(index)
    }

    /// Read the aligned 64-bit word containing `address`.
    pub fn read_word(&self, address: u64) -> Result<u64, MemoryError> {
        Ok(self.words[self.word_index(address)?])
    }

    /// Read-modify-write the aligned word containing `address`.
    ///
    /// For each bit `i` set in `byte_strobe`, byte lane `i` of the stored
    /// word is replaced by byte `i` of `data`; all other lanes keep their
    /// previous value.
    pub fn write_word(&mut self, address: u64, byte_strobe: u8, data: u64) -> Result<(), MemoryError> {
        let index = self.word_index(address)?;

        let mut mask = 0u64;
        for byte in 0..WORD_BYTES {
            if byte_strobe & (1 << byte) != 0 {
                mask |= 0xFFu64 << (byte * 8);
            }
        }

        self.words[index] = (self.words[index] & !mask) | (data & mask);
        Ok(())
    }

    /// Initialize the store from a flat byte pattern, packing 8 bytes
    /// (little-endian) per word. A trailing partial chunk is zero-padded.
    pub fn bulk_load(&mut self, bytes: &[u8]) -> Result<(), MemoryError> {
        let capacity = self.words.len() * WORD_BYTES;
        if bytes.len() > capacity {
            return Err(MemoryError::PatternTooLarge {
                bytes: bytes.len(),
                capacity,
            });
        }

        for (index, chunk) in bytes.chunks(WORD_BYTES).enumerate() {
            if chunk.len() == WORD_BYTES {
                self.words[index] = LittleEndian::read_u64(chunk);
            } else {
                let mut padded = [0u8; WORD_BYTES];
                padded[..chunk.len()].copy_from_slice(chunk);
                self.words[index] = LittleEndian::read_u64(&padded);
            }
        }
        Ok(())
    }

    /// Render the store as indexed 64-bit hex words, one per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str("----- Memory data -----\n");
        out.push_str(&format!(
            "Size: {} words, DataWidth: {} b\n",
            self.words.len(),
            WORD_BYTES * 8
        ));
        for (index, value) in self.words.iter().enumerate() {
            out.push_str(&format!("[{index:6}] 0x{value:016X} -> {value}\n"));
        }
        out
    }

    /// Render the store as one hex byte per line (`readmemh` format),
    /// lowest-addressed byte first.
    pub fn dump_rtl_hex(&self) -> String {
        let mut out = String::new();
        for value in &self.words {
            for byte in 0..WORD_BYTES {
                out.push_str(&format!("{:02X}\n", (value >> (byte * 8)) & 0xFF));
            }
        }
        out
    }
}
