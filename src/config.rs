//! Declarative descriptions of simulated machines.

use crate::bus::{
    BankedRam, BankedRamConfig, HALT_OPCODE, IntervalTimer, Ram, RamConfig,
    Serial6850, SerialConfig, StatusConfig, StatusLeds, SystemBus,
    TimerConfig,
};
use crate::error::{DeviceError, Result};
use crate::image::load_image;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

//===========================================================================//

const DEFAULT_CLOCK_SPEED: u64 = 3_686_400;

const KERNEL_STATUS_LABELS: [&str; 8] =
    ["X", "X", "X", "X", "X", "SYS", "INT", "MEM"];

//===========================================================================//

/// A memory-mapped device in a [MachineConfig].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryConfig {
    /// A fixed region of RAM.
    Ram(RamRegion),
    /// A bank-switched region of RAM.
    BankedRam(BankedRegion),
}

/// A fixed RAM region, optionally seeded from a raw image file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RamRegion {
    /// The device parameters.
    #[serde(flatten)]
    pub device: RamConfig,
    /// A raw binary image loaded at the start of the region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

/// A banked RAM region, optionally seeding bank 0 from a raw image file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BankedRegion {
    /// The device parameters.
    #[serde(flatten)]
    pub device: BankedRamConfig,
    /// A raw binary image loaded at the start of bank 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

/// An I/O-mapped device in a [MachineConfig].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IoConfig {
    /// A 6850-style serial port.
    Serial(SerialConfig),
    /// An 8254-style interval timer.
    Timer(TimerConfig),
    /// A status LED register.
    Status(StatusConfig),
}

//===========================================================================//

/// The complete device layout of one simulated machine.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MachineConfig {
    /// Name of the machine.
    pub name: String,
    /// CPU clock speed in Hz.
    #[serde(default = "default_clock_speed")]
    pub clock_speed: u64,
    /// Memory-mapped devices.
    #[serde(default)]
    pub memory: Vec<MemoryConfig>,
    /// I/O-mapped devices.
    #[serde(default)]
    pub io: Vec<IoConfig>,
}

fn default_clock_speed() -> u64 {
    DEFAULT_CLOCK_SPEED
}

impl MachineConfig {
    /// Parses a machine description from JSON.
    pub fn from_json(json: &str) -> Result<MachineConfig> {
        let config: MachineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a machine description from a JSON file.  Relative image paths
    /// are taken to be relative to the directory containing the file.
    pub fn load(path: &Path) -> Result<MachineConfig> {
        let mut config = MachineConfig::from_json(&fs::read_to_string(path)?)?;
        if let Some(dir) = path.parent() {
            config.resolve_images(dir);
        }
        Ok(config)
    }

    /// Returns the machine used to test the kernel: kernel and
    /// command-processor RAM, sixteen banks of user RAM, a serial port, an
    /// interval timer and the status LEDs.  Every region is padded with
    /// `HALT`.
    pub fn kernel_test() -> MachineConfig {
        let ram = |name: &str, address: u16, size: u32| {
            MemoryConfig::Ram(RamRegion {
                device: RamConfig {
                    name: name.to_string(),
                    address,
                    size,
                    padding: HALT_OPCODE,
                },
                image: None,
            })
        };
        MachineConfig {
            name: "kernel_test".to_string(),
            clock_speed: DEFAULT_CLOCK_SPEED,
            memory: vec![
                ram("ram_kernel", 0x0000, 0x6000),
                ram("ram_cp", 0x6000, 0x2000),
                MemoryConfig::BankedRam(BankedRegion {
                    device: BankedRamConfig {
                        name: "banked_ram".to_string(),
                        address: 0x8000,
                        size: 0x8000,
                        banks: 16,
                        bank_select: 0x08,
                        padding: Some(HALT_OPCODE),
                    },
                    image: None,
                }),
            ],
            io: vec![
                IoConfig::Serial(SerialConfig {
                    name: "serial".to_string(),
                    control_port: 0x00,
                    data_port: 0x01,
                }),
                IoConfig::Timer(TimerConfig {
                    name: "timer".to_string(),
                    base_port: 0x10,
                    period: 1,
                }),
                IoConfig::Status(StatusConfig {
                    name: "status".to_string(),
                    port: 0x80,
                    labels: KERNEL_STATUS_LABELS.map(str::to_string),
                }),
            ],
        }
    }

    /// Constructs every device, loads any images, and attaches the devices
    /// to a new system bus.
    pub fn build(&self) -> Result<SystemBus> {
        self.validate()?;
        let mut bus = SystemBus::new();
        for memory in self.memory.iter() {
            match memory {
                MemoryConfig::Ram(region) => {
                    let RamRegion { device, image } = region;
                    let mut ram = Ram::new(device)?;
                    if let Some(path) = image {
                        let size = ram.contents().len();
                        let name = &device.name;
                        let contents =
                            load_image(name, path, size, device.padding)?;
                        ram.set_contents(&contents)?;
                    }
                    bus.attach(Box::new(ram))?;
                }
                MemoryConfig::BankedRam(region) => {
                    let mut ram = BankedRam::new(&region.device)?;
                    if let Some(path) = &region.image {
                        ram.set_bank_contents(0, &fs::read(path)?)?;
                    }
                    bus.attach(Box::new(ram))?;
                }
            }
        }
        for io in self.io.iter() {
            match io {
                IoConfig::Serial(config) => {
                    bus.attach(Box::new(Serial6850::new(config)))?;
                }
                IoConfig::Timer(config) => {
                    bus.attach(Box::new(IntervalTimer::new(config)?))?;
                }
                IoConfig::Status(config) => {
                    bus.attach(Box::new(StatusLeds::new(config)))?;
                }
            }
        }
        Ok(bus)
    }

    fn validate(&self) -> Result<()> {
        if self.clock_speed == 0 {
            return Err(DeviceError::invalid_config(
                &self.name,
                "clock speed must be nonzero",
            ));
        }
        Ok(())
    }

    fn resolve_images(&mut self, dir: &Path) {
        for memory in self.memory.iter_mut() {
            let image = match memory {
                MemoryConfig::Ram(region) => &mut region.image,
                MemoryConfig::BankedRam(region) => &mut region.image,
            };
            if let Some(path) = image {
                if path.is_relative() {
                    *path = dir.join(&*path);
                }
            }
        }
    }
}

//===========================================================================//


//===========================================================================//
