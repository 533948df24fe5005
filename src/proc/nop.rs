use super::{SimBreak, SimProc, watch};
use crate::addr::Addr;
use crate::bus::{HALT_OPCODE, SimBus, WatchKind};

//===========================================================================//

const CYCLES_PER_INSTRUCTION: u64 = 4;

//===========================================================================//

/// A simulated processor that treats every opcode as a four-cycle NOP,
/// except for `HALT`, which stops it.  This can be used as a stub for
/// testing.
#[derive(Default)]
pub struct NopProc {
    pc: Addr,
    data: u8,
    cycles: u64,
    halted: bool,
}

impl NopProc {
    /// Returns a new `NopProc` that starts execution at address zero.
    pub fn new() -> NopProc {
        NopProc::default()
    }

    /// Returns true if the processor has executed a `HALT`.
    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

impl SimProc for NopProc {
    fn description(&self) -> String {
        "null processor".to_string()
    }

    fn pc(&self) -> Addr {
        self.pc
    }

    fn set_pc(&mut self, addr: Addr) {
        self.pc = addr;
        self.halted = false;
    }

    fn register_names(&self) -> &'static [&'static str] {
        &["DATA"]
    }

    fn get_register(&self, name: &str) -> Option<u32> {
        if name == "DATA" { Some(u32::from(self.data)) } else { None }
    }

    fn set_register(&mut self, name: &str, value: u32) {
        if name == "DATA" {
            self.data = (value & 0xff) as u8;
        }
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }

    fn step(&mut self, bus: &mut dyn SimBus) -> Result<(), SimBreak> {
        if self.halted {
            return Err(SimBreak::HaltOpcode("HALT", HALT_OPCODE));
        }
        watch(bus, self.pc, WatchKind::Read)?;
        self.data = bus.read_byte(self.pc)?;
        self.cycles += CYCLES_PER_INSTRUCTION;
        if self.data == HALT_OPCODE {
            self.halted = true;
            return Err(SimBreak::HaltOpcode("HALT", HALT_OPCODE));
        }
        self.pc = self.pc.wrapping_add(1);
        watch(bus, self.pc, WatchKind::Pc)
    }
}

//===========================================================================//


//===========================================================================//
