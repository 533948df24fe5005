//! Facilities for simulating a processor.

use crate::addr::Addr;
use crate::bus::{SimBus, WatchId, WatchKind};
use crate::error::DeviceError;

mod nop;

pub use nop::NopProc;

//===========================================================================//

/// A condition that pauses or halts the simulation.
#[derive(Debug)]
pub enum SimBreak {
    /// A watchpoint was triggered.
    Watchpoint(WatchKind, WatchId),
    /// The processor executed an instruction (with the given mnemonic and
    /// opcode) that halts the processor, and now the processor cannot continue
    /// until a reset and/or interrupt occurs.
    HaltOpcode(&'static str, u8),
    /// A device on the bus raised a fatal error.
    Fault(DeviceError),
}

impl From<DeviceError> for SimBreak {
    fn from(error: DeviceError) -> SimBreak {
        SimBreak::Fault(error)
    }
}

//===========================================================================//

/// A simulated processor.
pub trait SimProc {
    /// Returns a human-readable description of this simulated processor.
    fn description(&self) -> String;

    /// Returns the current address of the program counter.
    fn pc(&self) -> Addr;

    /// Sets the current address of the program counter.
    fn set_pc(&mut self, addr: Addr);

    /// Returns a list of this processor's register names.
    fn register_names(&self) -> &'static [&'static str];

    /// Returns the value of the specified register, or `None` if the name is
    /// not a valid register for this processor.
    fn get_register(&self, name: &str) -> Option<u32>;

    /// Sets the value of the specified register.  Does nothing if the name is
    /// not a valid register for this processor.
    fn set_register(&mut self, name: &str, value: u32);

    /// Returns the total number of clock cycles this processor has consumed.
    fn cycles(&self) -> u64;

    /// Advances this processor by one instruction.
    fn step(&mut self, bus: &mut dyn SimBus) -> Result<(), SimBreak>;
}

//===========================================================================//

pub(crate) fn watch(
    bus: &dyn SimBus,
    addr: Addr,
    kind: WatchKind,
) -> Result<(), SimBreak> {
    if let Some(id) = bus.watchpoint_at(addr, kind) {
        Err(SimBreak::Watchpoint(kind, id))
    } else {
        Ok(())
    }
}

//===========================================================================//
