//! vpu-emu library
//!
//! Functional model of the memory path of a RISC-V "V" vector unit:
//! strip-mined instruction generation, CSR decode, element address
//! generation, and a lane/bank-accurate register file, for validating
//! scatter/gather data movement against a hardware reference.

pub mod config;
pub mod device;
pub mod exec;
pub mod isa;

pub use config::Config;
pub use exec::Vpu;
