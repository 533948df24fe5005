//! Facilities for simulating the devices on a memory/I/O bus.

use crate::addr::{Addr, Range};
use crate::error::Result;
use std::any::Any;
use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};

mod banked;
mod ram;
mod serial;
mod status;
mod system;
mod timer;

pub use banked::{BankedRam, BankedRamConfig};
pub use ram::{Ram, RamConfig};
pub use serial::{Serial6850, SerialConfig};
pub use status::{StatusConfig, StatusLeds, render_status};
pub use system::SystemBus;
pub use timer::{CounterMode, IntervalTimer, TimerConfig};

//===========================================================================//

/// The byte returned for reads that no device claims.
pub const OPEN_BUS: u8 = 0xff;

/// The Z80 `HALT` opcode, used to pad memory so that runaway execution stops
/// somewhere detectable.
pub const HALT_OPCODE: u8 = 0x76;

//===========================================================================//

/// Unique identifier for a watchpoint within a simulated bus.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct WatchId(u64);

impl WatchId {
    /// Creates a new [WatchId] that is different from any other created so
    /// far.
    pub fn create() -> WatchId {
        static NEXT_TAG: AtomicU64 = AtomicU64::new(0);
        WatchId(NEXT_TAG.fetch_add(1, Ordering::Relaxed))
    }
}

//===========================================================================//

/// Kinds of watchpoints that can be set on a simulated bus.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WatchKind {
    /// Watch for the PC reaching the instruction at the specified location.
    Pc,
    /// Watch for the processor fetching from the specified location.
    Read,
}

//===========================================================================//

/// A single device attached to a [SystemBus].
///
/// A device may be memory-mapped (it reports a [Range] from `mem_range`),
/// I/O-mapped (it answers `read_io`/`write_io` for its own ports), or both.
/// Accesses to addresses or ports that the device does not own must be
/// ignored: reads return `None` so the bus can try other devices, and writes
/// do nothing.
pub trait BusDevice: Any {
    /// Returns the configured name of this device.
    fn name(&self) -> &str;

    /// Returns a human-readable description of this device.
    fn description(&self) -> String;

    /// Returns the memory addresses this device claims, if it is
    /// memory-mapped.
    fn mem_range(&self) -> Option<Range> {
        None
    }

    /// Returns the byte at `addr` without any side effects, or `None` if the
    /// address is not owned by this device.
    fn peek_mem(&self, _addr: Addr) -> Result<Option<u8>> {
        Ok(None)
    }

    /// Reads the byte at `addr`, or returns `None` if the address is not
    /// owned by this device.
    fn read_mem(&mut self, addr: Addr) -> Result<Option<u8>> {
        self.peek_mem(addr)
    }

    /// Writes a byte to memory.  Addresses not owned by this device are
    /// ignored.
    fn write_mem(&mut self, _addr: Addr, _data: u8) {}

    /// Reads from an I/O port, or returns `None` if the port is not owned by
    /// this device.
    fn read_io(&mut self, _port: u8) -> Option<u8> {
        None
    }

    /// Writes to an I/O port.  Ports not owned by this device are ignored.
    fn write_io(&mut self, _port: u8, _data: u8) -> Result<()> {
        Ok(())
    }

    /// Advances this device by the given number of CPU clock cycles.
    fn clock(&mut self, _cycles: u64) {}

    /// Returns true if this device is currently asserting the interrupt
    /// line.
    fn interrupt(&self) -> bool {
        false
    }

    /// Turns the device's diagnostic display on or off.  This never affects
    /// the simulated state of the device.
    fn set_display(&mut self, _enabled: bool) {}

    /// Upcasts to `Any`, for downcasting to a concrete device type.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts to `Any`, for downcasting to a concrete device type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

//===========================================================================//

/// A simulated bus, as seen by a simulated processor.
///
/// Implementations should *not* panic when given an address or port that
/// nothing is attached to; unmapped reads return [OPEN_BUS].
pub trait SimBus {
    /// Returns a human-readable description of this simulated bus.
    fn description(&self) -> String;

    /// Returns a watchpoint for the given address, if there is one.
    fn watchpoint_at(&self, addr: Addr, kind: WatchKind) -> Option<WatchId>;

    /// Sets a watchpoint on the given address.
    fn watch_address(&mut self, addr: Addr, kind: WatchKind) -> WatchId;

    /// Removes the specified watchpoint from the bus.
    fn unwatch(&mut self, id: WatchId);

    /// Returns the value of a single byte in memory, if the processor were to
    /// read it, but without triggering any watchpoints or performing any side
    /// effects that would occur if the processor actually read the byte.
    fn peek_byte(&self, addr: Addr) -> Result<u8>;

    /// Reads a single byte from memory.
    fn read_byte(&mut self, addr: Addr) -> Result<u8>;

    /// Writes a single byte to memory.
    fn write_byte(&mut self, addr: Addr, data: u8);

    /// Reads a byte from an I/O port.
    ///
    /// Note that this is a `&mut self` method, since device registers may
    /// have side effects when read.
    fn read_port(&mut self, port: u8) -> u8;

    /// Writes a byte to an I/O port.  Fails if a device rejects the write as
    /// an unsupported configuration.
    fn write_port(&mut self, port: u8, data: u8) -> Result<()>;

    /// Returns true if any attached device is asserting the interrupt line.
    fn interrupt_line(&self) -> bool;
}

//===========================================================================//

pub(crate) struct BusPeeker<'a> {
    bus: &'a dyn SimBus,
    addr: Addr,
}

impl<'a> BusPeeker<'a> {
    pub fn new(bus: &'a dyn SimBus, start_addr: Addr) -> BusPeeker<'a> {
        BusPeeker { bus, addr: start_addr }
    }
}

impl Read for BusPeeker<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        for byte in buf.iter_mut() {
            *byte = self.bus.peek_byte(self.addr)?;
            self.addr = self.addr.wrapping_add(1);
        }
        Ok(buf.len())
    }
}

//===========================================================================//


//===========================================================================//
