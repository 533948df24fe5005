use super::{BusDevice, OPEN_BUS, SimBus, WatchId, WatchKind};
use crate::addr::Addr;
use crate::error::{DeviceError, Result};
use bimap::BiHashMap;
use rangemap::RangeMap;

//===========================================================================//

/// A simulated Z80 system bus with a set of attached devices.
///
/// Memory accesses are routed to the single device whose range contains the
/// address; ranges of attached devices may not overlap.  I/O reads are
/// offered to each device in attachment order until one claims the port,
/// and I/O writes are offered to every device.  The bus interrupt line is
/// the logical OR of every device's line.
pub struct SystemBus {
    devices: Vec<Box<dyn BusDevice>>,
    memory_map: RangeMap<u32, usize>,
    watchpoints: BiHashMap<(Addr, WatchKind), WatchId>,
}

impl SystemBus {
    /// Returns a new bus with nothing attached.
    pub fn new() -> SystemBus {
        SystemBus {
            devices: Vec::new(),
            memory_map: RangeMap::new(),
            watchpoints: BiHashMap::new(),
        }
    }

    /// Attaches a device to the bus.  Fails if the device is memory-mapped
    /// and its range overlaps a device that is already attached, or if a
    /// device with the same name is already attached.
    pub fn attach(&mut self, device: Box<dyn BusDevice>) -> Result<()> {
        if self.index_of(device.name()).is_some() {
            return Err(DeviceError::invalid_config(
                device.name(),
                "a device with this name is already attached",
            ));
        }
        let index = self.devices.len();
        if let Some(range) = device.mem_range() {
            let key = range.to_half_open();
            if let Some((_, &other)) = self.memory_map.overlapping(&key).next()
            {
                return Err(DeviceError::Overlap {
                    name: device.name().to_string(),
                    range,
                    other: self.devices[other].name().to_string(),
                });
            }
            self.memory_map.insert(key, index);
        }
        log::debug!("attached {}", device.description());
        self.devices.push(device);
        Ok(())
    }

    /// Returns the attached devices, in attachment order.
    pub fn devices(&self) -> impl Iterator<Item = &dyn BusDevice> {
        self.devices.iter().map(|device| &**device)
    }

    /// Returns the named device, if it is attached.
    pub fn device_dyn(&self, name: &str) -> Option<&dyn BusDevice> {
        self.index_of(name).map(|index| &*self.devices[index])
    }

    /// Returns the named device, if it is attached.
    pub fn device_dyn_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut dyn BusDevice> {
        let index = self.index_of(name)?;
        Some(&mut *self.devices[index])
    }

    /// Returns the named device, if it is attached and is of type `T`.
    pub fn device<T: BusDevice>(&self, name: &str) -> Option<&T> {
        self.device_dyn(name)?.as_any().downcast_ref::<T>()
    }

    /// Returns the named device, if it is attached and is of type `T`.
    pub fn device_mut<T: BusDevice>(
        &mut self,
        name: &str,
    ) -> Option<&mut T> {
        self.device_dyn_mut(name)?.as_any_mut().downcast_mut::<T>()
    }

    /// Turns the diagnostic display of every attached device on or off.
    pub fn set_display_all(&mut self, enabled: bool) {
        for device in self.devices.iter_mut() {
            device.set_display(enabled);
        }
    }

    /// Advances every attached device by the given number of CPU cycles.
    pub fn clock(&mut self, cycles: u64) {
        for device in self.devices.iter_mut() {
            device.clock(cycles);
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|device| device.name() == name)
    }

    fn memory_device(&self, addr: Addr) -> Option<usize> {
        self.memory_map.get(&addr.as_u32()).copied()
    }
}

impl Default for SystemBus {
    fn default() -> SystemBus {
        SystemBus::new()
    }
}

impl SimBus for SystemBus {
    fn description(&self) -> String {
        self.devices
            .iter()
            .map(|device| device.description())
            .collect::<Vec<String>>()
            .join("\n")
    }

    fn watchpoint_at(&self, addr: Addr, kind: WatchKind) -> Option<WatchId> {
        self.watchpoints.get_by_left(&(addr, kind)).cloned()
    }

    fn watch_address(&mut self, addr: Addr, kind: WatchKind) -> WatchId {
        match self.watchpoints.get_by_left(&(addr, kind)) {
            Some(id) => *id,
            None => {
                let id = WatchId::create();
                self.watchpoints.insert((addr, kind), id);
                id
            }
        }
    }

    fn unwatch(&mut self, id: WatchId) {
        self.watchpoints.remove_by_right(&id);
    }

    fn peek_byte(&self, addr: Addr) -> Result<u8> {
        match self.memory_device(addr) {
            Some(index) => {
                Ok(self.devices[index].peek_mem(addr)?.unwrap_or(OPEN_BUS))
            }
            None => Ok(OPEN_BUS),
        }
    }

    fn read_byte(&mut self, addr: Addr) -> Result<u8> {
        match self.memory_device(addr) {
            Some(index) => {
                Ok(self.devices[index].read_mem(addr)?.unwrap_or(OPEN_BUS))
            }
            None => Ok(OPEN_BUS),
        }
    }

    fn write_byte(&mut self, addr: Addr, data: u8) {
        if let Some(index) = self.memory_device(addr) {
            self.devices[index].write_mem(addr, data);
        }
    }

    fn read_port(&mut self, port: u8) -> u8 {
        self.devices
            .iter_mut()
            .find_map(|device| device.read_io(port))
            .unwrap_or(OPEN_BUS)
    }

    fn write_port(&mut self, port: u8, data: u8) -> Result<()> {
        for device in self.devices.iter_mut() {
            device.write_io(port, data)?;
        }
        Ok(())
    }

    fn interrupt_line(&self) -> bool {
        self.devices.iter().any(|device| device.interrupt())
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::SystemBus;
    use crate::addr::Addr;
    use crate::bus::{
        BankedRam, BankedRamConfig, IntervalTimer, OPEN_BUS, Ram, RamConfig,
        Serial6850, SerialConfig, SimBus, TimerConfig, WatchKind,
    };
    use crate::error::DeviceError;

    fn ram(name: &str, address: u16, size: u32) -> Box<Ram> {
        let config = RamConfig {
            name: name.to_string(),
            address,
            size,
            padding: 0x76,
        };
        Box::new(Ram::new(&config).unwrap())
    }

    fn serial() -> Box<Serial6850> {
        Box::new(Serial6850::new(&SerialConfig {
            name: "serial".to_string(),
            control_port: 0x00,
            data_port: 0x01,
        }))
    }

    fn timer() -> Box<IntervalTimer> {
        let config = TimerConfig {
            name: "timer".to_string(),
            base_port: 0x10,
            period: 1,
        };
        Box::new(IntervalTimer::new(&config).unwrap())
    }

    #[test]
    fn routes_memory_by_range() {
        let mut bus = SystemBus::new();
        bus.attach(ram("ram_kernel", 0x0000, 0x6000)).unwrap();
        bus.attach(ram("ram_cp", 0x6000, 0x2000)).unwrap();
        bus.write_byte(Addr::from(0x5fffu16), 0x11);
        bus.write_byte(Addr::from(0x6000u16), 0x22);
        assert_eq!(bus.read_byte(Addr::from(0x5fffu16)).unwrap(), 0x11);
        assert_eq!(bus.peek_byte(Addr::from(0x6000u16)).unwrap(), 0x22);
        let kernel = bus.device::<Ram>("ram_kernel").unwrap();
        assert_eq!(kernel.contents()[0x5fff], 0x11);
        assert_eq!(bus.read_byte(Addr::from(0x8000u16)).unwrap(), OPEN_BUS);
    }

    #[test]
    fn rejects_overlapping_ranges() {
        let mut bus = SystemBus::new();
        bus.attach(ram("ram_kernel", 0x0000, 0x6000)).unwrap();
        let result = bus.attach(ram("ram_cp", 0x5000, 0x2000));
        match result {
            Err(DeviceError::Overlap { name, other, .. }) => {
                assert_eq!(name, "ram_cp");
                assert_eq!(other, "ram_kernel");
            }
            _ => panic!("expected overlap error"),
        }
        assert!(bus.device_dyn("ram_cp").is_none());
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut bus = SystemBus::new();
        bus.attach(serial()).unwrap();
        assert!(bus.attach(serial()).is_err());
    }

    #[test]
    fn routes_ports_and_ors_interrupts() {
        let mut bus = SystemBus::new();
        bus.attach(serial()).unwrap();
        bus.attach(timer()).unwrap();
        assert_eq!(bus.read_port(0x42), OPEN_BUS);
        bus.write_port(0x00, 0x03).unwrap();
        assert_eq!(bus.read_port(0x00), 0x02);
        bus.clock(1);
        assert!(!bus.interrupt_line());

        bus.write_port(0x13, 0b0011_0000).unwrap();
        bus.write_port(0x10, 0x01).unwrap();
        bus.write_port(0x10, 0x00).unwrap();
        bus.clock(3);
        assert!(bus.interrupt_line());
        assert!(bus.device::<IntervalTimer>("timer").unwrap().out(0));

        bus.write_port(0x13, 0b0011_0000).unwrap();
        bus.clock(1);
        assert!(!bus.interrupt_line());
        bus.device_mut::<Serial6850>("serial").unwrap().deliver_byte(b'H');
        bus.clock(1);
        assert!(bus.interrupt_line());
        assert_eq!(bus.read_port(0x01), b'H');
    }

    #[test]
    fn timer_misconfiguration_propagates() {
        let mut bus = SystemBus::new();
        bus.attach(timer()).unwrap();
        assert!(matches!(
            bus.write_port(0x13, 0b0011_0001),
            Err(DeviceError::BcdNotSupported { .. })
        ));
    }

    #[test]
    fn banked_ram_on_bus() {
        let mut bus = SystemBus::new();
        let config = BankedRamConfig {
            name: "banked_ram".to_string(),
            address: 0x8000,
            size: 0x8000,
            banks: 16,
            bank_select: 0x08,
            padding: None,
        };
        bus.attach(Box::new(BankedRam::new(&config).unwrap())).unwrap();
        assert!(bus.read_byte(Addr::from(0xffffu16)).is_err());
        bus.write_port(0x08, 0x23).unwrap();
        let banked = bus.device::<BankedRam>("banked_ram").unwrap();
        assert_eq!(banked.current_bank(), 3);
        assert!(bus.device::<Ram>("banked_ram").is_none());
    }

    #[test]
    fn watchpoints() {
        let mut bus = SystemBus::new();
        let addr = Addr::from(0x8000u16);
        let id = bus.watch_address(addr, WatchKind::Pc);
        assert_eq!(bus.watch_address(addr, WatchKind::Pc), id);
        assert_eq!(bus.watchpoint_at(addr, WatchKind::Pc), Some(id));
        assert_eq!(bus.watchpoint_at(addr, WatchKind::Read), None);
        bus.unwatch(id);
        assert_eq!(bus.watchpoint_at(addr, WatchKind::Pc), None);
    }

    #[test]
    fn description_lists_devices() {
        let mut bus = SystemBus::new();
        bus.attach(ram("ram_cp", 0x6000, 0x2000)).unwrap();
        bus.attach(serial()).unwrap();
        assert_eq!(
            bus.description(),
            "ram_cp: 8kB RAM at $6000..=$7fff\n\
             serial: 6850 serial, control port 0x00, data port 0x01"
        );
    }
}

//===========================================================================//
