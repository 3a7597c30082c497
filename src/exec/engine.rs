//! Execution engine: drives an instruction stream through the pipeline.
//!
//! The engine owns one memory instance, one register file, the dispatcher
//! and the LSU, and executes a stream strictly in order. `SetLength` and
//! `SetStart` only touch CSR state; a `Load` pulls the window's elements
//! from memory and merges them into the register file; a `Store` gathers
//! them from the register file and writes them back. Any subsystem error
//! aborts the run; partial results would poison the reference diff.

use thiserror::Error;

use crate::config::Config;
use crate::device::{MainMemory, MemoryError, Vrf, VrfError};
use crate::exec::{Dispatcher, LoadStoreUnit, LsuError, Operation, Stride};
use crate::isa::Instruction;

/// Error type for instruction execution.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Register file failure.
    #[error(transparent)]
    Vrf(#[from] VrfError),

    /// Load/store unit failure.
    #[error(transparent)]
    Lsu(#[from] LsuError),

    /// Direct memory access failure.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// The assembled vector memory pipeline.
pub struct Vpu {
    /// Main memory.
    pub memory: MainMemory,
    /// Vector register file.
    pub vrf: Vrf,
    /// CSR state and decode.
    pub dispatcher: Dispatcher,
    lsu: LoadStoreUnit,
}

impl Vpu {
    /// Assemble a pipeline from the architecture configuration.
    pub fn new(config: &Config) -> Result<Self, ExecError> {
        Ok(Self {
            memory: MainMemory::new(config.mem_base, config.mem_depth),
            vrf: Vrf::new(config.nr_lanes, config.vlen, config.nr_banks, config.data_width)?,
            dispatcher: Dispatcher::new(config.vlen),
            lsu: LoadStoreUnit::new(),
        })
    }

    /// Preload main memory from a flat byte pattern.
    pub fn preload(&mut self, pattern: &[u8]) -> Result<(), ExecError> {
        self.memory.bulk_load(pattern)?;
        Ok(())
    }

    /// Execute an instruction stream to completion, strictly in order.
    pub fn run(&mut self, program: &[Instruction]) -> Result<(), ExecError> {
        for (number, instruction) in program.iter().enumerate() {
            let operation = self.dispatcher.decode(instruction);
            log::debug!("[{number}] {operation:?}: {instruction}");

            match operation {
                Operation::SetLength | Operation::SetStart => {}
                Operation::Load => self.execute_load()?,
                Operation::Store => self.execute_store()?,
            }
        }
        Ok(())
    }

    fn execute_load(&mut self) -> Result<(), ExecError> {
        let vl = self.dispatcher.vl();
        let vstart = self.dispatcher.vstart();
        let sew = self.dispatcher.sew();

        self.lsu.set_window(vl, vstart, sew)?;
        let values = self
            .lsu
            .load(&self.memory, self.dispatcher.scalar_address(), Stride::Unit)?;

        self.vrf.configure(sew, self.dispatcher.lmul())?;
        self.vrf.load(self.dispatcher.register(), vstart, &values)?;
        Ok(())
    }

    fn execute_store(&mut self) -> Result<(), ExecError> {
        let vl = self.dispatcher.vl();
        let vstart = self.dispatcher.vstart();
        let sew = self.dispatcher.sew();

        self.lsu.set_window(vl, vstart, sew)?;
        self.vrf.configure(sew, self.dispatcher.lmul())?;
        let values = self
            .vrf
            .take(self.dispatcher.register(), vstart, self.lsu.element_count())?;

        self.lsu.store(
            &mut self.memory,
            self.dispatcher.scalar_address(),
            Stride::Unit,
            &values,
        )?;
        Ok(())
    }
}
