//! Instruction set: vtype vocabulary, the structured instruction stream,
//! the strip-mining generator, and a standalone raw-word decoder.

pub mod disasm;
pub mod generator;
pub mod instruction;
pub mod vtype;

pub use generator::{Direction, GeneratorError, InstructionGenerator, SegmentDescriptor};
pub use instruction::Instruction;
pub use vtype::{DecodeError, Lmul, Sew};
