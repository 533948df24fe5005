use crate::addr::Addr;
use crate::bus::{
    BankedRam, BusDevice, BusPeeker, Ram, Serial6850, SimBus, StatusLeds,
    SystemBus, WatchId, WatchKind,
};
use crate::config::MachineConfig;
use crate::error::{DeviceError, Result};
use crate::proc::{SimBreak, SimProc};
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read};

//===========================================================================//

/// Why a call to [Instance::continue_for] returned.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RunOutcome {
    /// The processor reached a breakpoint at the given address.
    Breakpoint(Addr),
    /// The processor executed a halting instruction.
    Halted,
    /// The cycle budget ran out.
    BudgetExhausted,
}

//===========================================================================//

/// A complete simulated machine: one processor attached to a system bus,
/// plus the host-side state needed to drive it from a test harness.
pub struct Instance {
    name: String,
    proc: Box<dyn SimProc>,
    bus: SystemBus,
    breakpoints: HashMap<Addr, WatchId>,
    serial_input: HashMap<String, VecDeque<u8>>,
    last_outcome: Option<RunOutcome>,
}

impl Instance {
    /// Returns a new instance running `proc` on `bus`.
    pub fn new(
        name: &str,
        proc: Box<dyn SimProc>,
        bus: SystemBus,
    ) -> Instance {
        Instance {
            name: name.to_string(),
            proc,
            bus,
            breakpoints: HashMap::new(),
            serial_input: HashMap::new(),
            last_outcome: None,
        }
    }

    /// Builds the machine described by `config` and returns a new instance
    /// running `proc` on it.
    pub fn from_config(
        config: &MachineConfig,
        proc: Box<dyn SimProc>,
    ) -> Result<Instance> {
        Ok(Instance::new(&config.name, proc, config.build()?))
    }

    /// Returns a human-readable, multi-line description of this instance.
    pub fn description(&self) -> String {
        format!(
            "{}: {}, pc={}\n{}\n",
            self.name,
            self.proc.description(),
            self.proc.pc(),
            self.bus.description()
        )
    }

    /// Returns the system bus.
    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    /// Returns the system bus.
    pub fn bus_mut(&mut self) -> &mut SystemBus {
        &mut self.bus
    }

    /// Returns the named device, if it is attached and is of type `T`.
    pub fn device<T: BusDevice>(&self, name: &str) -> Option<&T> {
        self.bus.device::<T>(name)
    }

    /// Returns the named device, if it is attached and is of type `T`.
    pub fn device_mut<T: BusDevice>(
        &mut self,
        name: &str,
    ) -> Option<&mut T> {
        self.bus.device_mut::<T>(name)
    }

    /// Turns the named device's diagnostic display on or off.  Returns false
    /// if no such device is attached.
    pub fn set_display(&mut self, name: &str, enabled: bool) -> bool {
        match self.bus.device_dyn_mut(name) {
            Some(device) => {
                device.set_display(enabled);
                true
            }
            None => false,
        }
    }

    /// Sets a breakpoint that stops execution when the program counter
    /// reaches `addr`.
    pub fn break_at(&mut self, addr: Addr) {
        let id = self.bus.watch_address(addr, WatchKind::Pc);
        self.breakpoints.insert(addr, id);
    }

    /// Removes the breakpoint at `addr`.  Returns false if there was none.
    pub fn remove_break(&mut self, addr: Addr) -> bool {
        match self.breakpoints.remove(&addr) {
            Some(id) => {
                self.bus.unwatch(id);
                true
            }
            None => false,
        }
    }

    /// Runs the processor until it reaches a breakpoint, halts, or consumes
    /// at least `budget` clock cycles.  After each instruction, every device
    /// is clocked by the number of cycles that instruction took.
    pub fn continue_for(&mut self, budget: u64) -> Result<RunOutcome> {
        let start = self.proc.cycles();
        let outcome = loop {
            self.feed_serial_input();
            if self.proc.cycles() - start >= budget {
                break RunOutcome::BudgetExhausted;
            }
            let before = self.proc.cycles();
            let result = self.proc.step(&mut self.bus);
            self.bus.clock(self.proc.cycles() - before);
            match result {
                Ok(()) => {}
                Err(SimBreak::Watchpoint(_, _)) => {
                    break RunOutcome::Breakpoint(self.proc.pc());
                }
                Err(SimBreak::HaltOpcode(mnemonic, opcode)) => {
                    log::debug!(
                        "{}: halted on {mnemonic} ({opcode:#04x}) at {}",
                        self.name,
                        self.proc.pc()
                    );
                    break RunOutcome::Halted;
                }
                Err(SimBreak::Fault(error)) => {
                    self.last_outcome = None;
                    return Err(error);
                }
            }
        };
        match outcome {
            RunOutcome::Breakpoint(addr) => {
                log::debug!("{}: breakpoint at {addr}", self.name)
            }
            RunOutcome::BudgetExhausted => {
                log::debug!("{}: budget exhausted", self.name)
            }
            RunOutcome::Halted => {}
        }
        self.last_outcome = Some(outcome);
        Ok(outcome)
    }

    /// Returns true if the last run ended with the processor halting.
    pub fn is_halted(&self) -> bool {
        self.last_outcome == Some(RunOutcome::Halted)
    }

    /// Returns true if the last run ended at a breakpoint.
    pub fn hit_breakpoint(&self) -> bool {
        matches!(self.last_outcome, Some(RunOutcome::Breakpoint(_)))
    }

    /// Returns the total number of clock cycles executed so far.
    pub fn cycles(&self) -> u64 {
        self.proc.cycles()
    }

    /// Returns the current address of the program counter.
    pub fn pc(&self) -> Addr {
        self.proc.pc()
    }

    /// Sets the program counter.
    pub fn set_pc(&mut self, addr: Addr) {
        self.proc.set_pc(addr);
        self.last_outcome = None;
    }

    /// Returns the processor's register names and current values.
    pub fn registers(&self) -> Vec<(&'static str, u32)> {
        self.proc
            .register_names()
            .iter()
            .filter_map(|&name| {
                self.proc.get_register(name).map(|value| (name, value))
            })
            .collect()
    }

    /// Returns the value of the named register.
    pub fn register(&self, name: &str) -> Option<u32> {
        self.proc.get_register(name)
    }

    /// Sets the value of the named register.
    pub fn set_register(&mut self, name: &str, value: u32) {
        self.proc.set_register(name, value);
    }

    /// Returns the byte at `addr`, without side effects.
    pub fn peek(&self, addr: Addr) -> Result<u8> {
        self.bus.peek_byte(addr)
    }

    /// Writes a byte to memory.
    pub fn poke(&mut self, addr: Addr, data: u8) {
        self.bus.write_byte(addr, data);
    }

    /// Reads a little-endian 16-bit word starting at `addr`.
    pub fn read_u16(&self, addr: Addr) -> Result<u16> {
        BusPeeker::new(&self.bus, addr)
            .read_u16::<LittleEndian>()
            .map_err(from_peek_error)
    }

    /// Reads `len` consecutive bytes starting at `addr`.
    pub fn read_array(&self, addr: Addr, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        BusPeeker::new(&self.bus, addr)
            .read_exact(&mut buffer)
            .map_err(from_peek_error)?;
        Ok(buffer)
    }

    /// Reads a NUL-terminated string starting at `addr`.  Bytes that are not
    /// valid UTF-8 are replaced.  Reading stops after wrapping around the
    /// whole address space.
    pub fn read_cstring(&self, addr: Addr) -> Result<String> {
        let mut bytes = Vec::<u8>::new();
        let mut addr = addr;
        for _ in 0..=usize::from(u16::MAX) {
            let byte = self.bus.peek_byte(addr)?;
            if byte == 0 {
                break;
            }
            bytes.push(byte);
            addr = addr.wrapping_add(1);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Replaces the initial contents of the named memory device with
    /// `image`.  For banked RAM, the image is loaded into bank 0.
    pub fn load_memory(&mut self, name: &str, image: &[u8]) -> Result<()> {
        if let Some(ram) = self.bus.device_mut::<Ram>(name) {
            ram.set_contents(image)
        } else if let Some(ram) = self.bus.device_mut::<BankedRam>(name) {
            ram.set_bank_contents(0, image)
        } else {
            Err(no_such_device(name, "memory"))
        }
    }

    /// Queues bytes for the named serial device to receive.  Each byte is
    /// delivered once the CPU has read the previous one.
    pub fn serial_puts(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if self.device::<Serial6850>(name).is_none() {
            return Err(no_such_device(name, "serial"));
        }
        self.serial_input
            .entry(name.to_string())
            .or_default()
            .extend(data.iter().copied());
        self.feed_serial_input();
        Ok(())
    }

    /// Drains up to `max` bytes that the CPU has sent through the named
    /// serial device.
    pub fn serial_gets(&mut self, name: &str, max: usize) -> Result<Vec<u8>> {
        let serial = self
            .device_mut::<Serial6850>(name)
            .ok_or_else(|| no_such_device(name, "serial"))?;
        let mut output = Vec::new();
        while output.len() < max {
            match serial.read_data() {
                Some(byte) => output.push(byte),
                None => break,
            }
        }
        Ok(output)
    }

    /// Returns the value last written to the named status LED register.
    pub fn status_value(&self, name: &str) -> Result<u8> {
        self.device::<StatusLeds>(name)
            .map(StatusLeds::value)
            .ok_or_else(|| no_such_device(name, "status"))
    }

    fn feed_serial_input(&mut self) {
        for (name, queue) in self.serial_input.iter_mut() {
            if queue.is_empty() {
                continue;
            }
            if let Some(serial) = self.bus.device_mut::<Serial6850>(name) {
                if !serial.rx_full() {
                    if let Some(byte) = queue.pop_front() {
                        serial.deliver_byte(byte);
                    }
                }
            }
        }
    }
}

fn no_such_device(name: &str, kind: &str) -> DeviceError {
    DeviceError::invalid_config(name, format!("no {kind} device by this name"))
}

/// Recovers the device error that a [BusPeeker] read wrapped in an
/// `io::Error`.
fn from_peek_error(error: io::Error) -> DeviceError {
    let wraps_device_error =
        error.get_ref().is_some_and(|inner| inner.is::<DeviceError>());
    if !wraps_device_error {
        return DeviceError::Io(error);
    }
    let kind = error.kind();
    match error.into_inner().map(|inner| inner.downcast::<DeviceError>()) {
        Some(Ok(inner)) => *inner,
        _ => DeviceError::Io(io::Error::from(kind)),
    }
}

//===========================================================================//


//===========================================================================//
