use super::{BusDevice, HALT_OPCODE};
use crate::addr::{Addr, Range};
use crate::error::{DeviceError, Result};
use crate::image::pad_image;
use serde::{Deserialize, Serialize};
use std::any::Any;

//===========================================================================//

/// Configuration for a fixed region of RAM.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RamConfig {
    /// Name of the device.
    pub name: String,
    /// First address of the region.
    pub address: u16,
    /// Size of the region in bytes.
    pub size: u32,
    /// The byte that fills the region wherever no image has been loaded.
    #[serde(default = "default_padding")]
    pub padding: u8,
}

fn default_padding() -> u8 {
    HALT_OPCODE
}

//===========================================================================//

/// A simulated region of RAM at a fixed address.
pub struct Ram {
    name: String,
    range: Range,
    padding: u8,
    ram: Box<[u8]>,
}

impl Ram {
    /// Returns a new simulated RAM region, filled entirely with the
    /// configured padding byte.
    pub fn new(config: &RamConfig) -> Result<Ram> {
        let range = region(&config.name, config.address, config.size)?;
        let ram = vec![config.padding; range.size() as usize];
        Ok(Ram {
            name: config.name.clone(),
            range,
            padding: config.padding,
            ram: ram.into_boxed_slice(),
        })
    }

    /// Replaces the contents of this region with `image`, padding the rest of
    /// the region.
    pub fn set_contents(&mut self, image: &[u8]) -> Result<()> {
        self.ram = pad_image(&self.name, image, self.ram.len(), self.padding)?;
        Ok(())
    }

    /// Returns the current contents of this region.
    pub fn contents(&self) -> &[u8] {
        &self.ram
    }

    fn offset(&self, addr: Addr) -> Option<usize> {
        if self.range.contains(addr) {
            addr.offset_from(self.range.start())
        } else {
            None
        }
    }
}

/// Returns the range of a region of `size` bytes starting at `address`,
/// failing if the region is empty or runs off the end of the bus.
pub(super) fn region(name: &str, address: u16, size: u32) -> Result<Range> {
    Addr::from(address).range_with_size(size).ok_or_else(|| {
        let message = format!(
            "size {size:#x} at address {address:#06x} does not fit on the bus"
        );
        DeviceError::invalid_config(name, message)
    })
}

pub(super) fn format_size(size: usize) -> String {
    if size < 1024 {
        format!("{size}B")
    } else if size < 1024 * 1024 {
        format!("{}kB", size >> 10)
    } else {
        format!("{}MB", size >> 20)
    }
}

impl BusDevice for Ram {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!(
            "{}: {} RAM at {}",
            self.name,
            format_size(self.ram.len()),
            self.range
        )
    }

    fn mem_range(&self) -> Option<Range> {
        Some(self.range)
    }

    fn peek_mem(&self, addr: Addr) -> Result<Option<u8>> {
        Ok(self.offset(addr).map(|offset| self.ram[offset]))
    }

    fn write_mem(&mut self, addr: Addr, data: u8) {
        if let Some(offset) = self.offset(addr) {
            self.ram[offset] = data;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//===========================================================================//


//===========================================================================//
