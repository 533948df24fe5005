use super::BusDevice;
use super::ram::{format_size, region};
use crate::addr::{Addr, Range};
use crate::error::{DeviceError, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;

//===========================================================================//

/// Configuration for a bank-switched RAM region.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BankedRamConfig {
    /// Name of the device.
    pub name: String,
    /// First address of the banked window.
    pub address: u16,
    /// Size of each bank in bytes.
    pub size: u32,
    /// Number of banks.
    pub banks: usize,
    /// The I/O port that selects the current bank.
    pub bank_select: u8,
    /// The byte that every cell holds until it is written.  With no padding,
    /// reading a cell that was never written is a fatal error.
    #[serde(default)]
    pub padding: Option<u8>,
}

//===========================================================================//

/// A simulated bank-switched RAM region.
///
/// Every bank is a separate, fixed-size byte array.  Only the currently
/// selected bank is visible on the bus; switching banks never copies or
/// discards data.
pub struct BankedRam {
    name: String,
    range: Range,
    bank_select: u8,
    padding: Option<u8>,
    banks: Vec<Box<[Option<u8>]>>,
    current_bank: usize,
    history: Vec<usize>,
    display: bool,
}

impl BankedRam {
    /// Returns a new simulated banked RAM region with bank 0 selected.
    pub fn new(config: &BankedRamConfig) -> Result<BankedRam> {
        if config.banks == 0 || config.banks > 256 {
            return Err(DeviceError::invalid_config(
                &config.name,
                format!("bank count {} is not in 1..=256", config.banks),
            ));
        }
        let range = region(&config.name, config.address, config.size)?;
        let bank = vec![config.padding; range.size() as usize];
        Ok(BankedRam {
            name: config.name.clone(),
            range,
            bank_select: config.bank_select,
            padding: config.padding,
            banks: vec![bank.into_boxed_slice(); config.banks],
            current_bank: 0,
            history: Vec::new(),
            display: true,
        })
    }

    /// Returns the index of the currently selected bank.
    pub fn current_bank(&self) -> usize {
        self.current_bank
    }

    /// Returns the number of banks.
    pub fn num_banks(&self) -> usize {
        self.banks.len()
    }

    /// Returns every bank selected so far, in order.
    pub fn bank_history(&self) -> &[usize] {
        &self.history
    }

    /// Replaces the contents of `bank` with `image`, starting at the first
    /// address of the bank.  Cells past the end of the image revert to the
    /// padding byte (or to uninitialized, if there is no padding).
    pub fn set_bank_contents(
        &mut self,
        bank: usize,
        image: &[u8],
    ) -> Result<()> {
        let size = self.range.size() as usize;
        if image.len() > size {
            return Err(DeviceError::ImageTooLarge {
                name: self.name.clone(),
                len: image.len(),
                size,
            });
        }
        let padding = self.padding;
        let cells = self.bank_mut(bank)?;
        for (cell, &byte) in cells.iter_mut().zip(image) {
            *cell = Some(byte);
        }
        cells[image.len()..].fill(padding);
        Ok(())
    }

    /// Returns the byte at `offset` within `bank`, regardless of which bank
    /// is selected.  Returns `None` for uninitialized cells and out-of-range
    /// offsets.
    pub fn bank_byte(&self, bank: usize, offset: usize) -> Option<u8> {
        self.banks.get(bank)?.get(offset).copied().flatten()
    }

    /// Sets the byte at `offset` within `bank`, regardless of which bank is
    /// selected.  Out-of-range offsets are ignored.
    pub fn set_bank_byte(
        &mut self,
        bank: usize,
        offset: usize,
        data: u8,
    ) -> Result<()> {
        if let Some(cell) = self.bank_mut(bank)?.get_mut(offset) {
            *cell = Some(data);
        }
        Ok(())
    }

    fn bank_mut(&mut self, bank: usize) -> Result<&mut [Option<u8>]> {
        let num_banks = self.banks.len();
        match self.banks.get_mut(bank) {
            Some(cells) => Ok(cells),
            None => Err(DeviceError::invalid_config(
                &self.name,
                format!("no bank {bank} (device has {num_banks})"),
            )),
        }
    }

    fn select_bank(&mut self, data: u8) {
        self.current_bank = usize::from(data) % self.banks.len();
        self.history.push(self.current_bank);
        if self.display {
            log::info!("{}: bank {} selected", self.name, self.current_bank);
        } else {
            log::trace!("{}: bank {} selected", self.name, self.current_bank);
        }
    }

    fn offset(&self, addr: Addr) -> Option<usize> {
        if self.range.contains(addr) {
            addr.offset_from(self.range.start())
        } else {
            None
        }
    }
}

impl BusDevice for BankedRam {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!(
            "{}: {}x{} banked RAM at {}, bank select port {:#04x}",
            self.name,
            self.banks.len(),
            format_size(self.range.size() as usize),
            self.range,
            self.bank_select
        )
    }

    fn mem_range(&self) -> Option<Range> {
        Some(self.range)
    }

    fn peek_mem(&self, addr: Addr) -> Result<Option<u8>> {
        let Some(offset) = self.offset(addr) else {
            return Ok(None);
        };
        match self.banks[self.current_bank][offset] {
            Some(byte) => Ok(Some(byte)),
            None => Err(DeviceError::UninitializedMemory {
                name: self.name.clone(),
                bank: self.current_bank,
                addr,
            }),
        }
    }

    fn write_mem(&mut self, addr: Addr, data: u8) {
        if let Some(offset) = self.offset(addr) {
            self.banks[self.current_bank][offset] = Some(data);
        }
    }

    fn write_io(&mut self, port: u8, data: u8) -> Result<()> {
        if port == self.bank_select {
            self.select_bank(data);
        }
        Ok(())
    }

    fn set_display(&mut self, enabled: bool) {
        self.display = enabled;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{BankedRam, BankedRamConfig};
    use crate::addr::Addr;
    use crate::bus::BusDevice;
    use crate::error::DeviceError;

    fn config(banks: usize, padding: Option<u8>) -> BankedRamConfig {
        BankedRamConfig {
            name: "banked_ram".to_string(),
            address: 0x8000,
            size: 0x8000,
            banks,
            bank_select: 0x08,
            padding,
        }
    }

    #[test]
    fn description() {
        let ram = BankedRam::new(&config(16, Some(0x76))).unwrap();
        assert_eq!(
            ram.description(),
            "banked_ram: 16x32kB banked RAM at $8000..=$ffff, \
             bank select port 0x08"
        );
    }

    #[test]
    fn rejects_zero_banks() {
        assert!(matches!(
            BankedRam::new(&config(0, None)),
            Err(DeviceError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn unwritten_memory_reads_padding() {
        let mut ram = BankedRam::new(&config(16, Some(0x76))).unwrap();
        for addr in [0x8000u16, 0x9234, 0xffff] {
            assert_eq!(ram.read_mem(Addr::from(addr)).unwrap(), Some(0x76));
        }
        ram.write_io(0x08, 15).unwrap();
        assert_eq!(ram.read_mem(Addr::from(0xc000u16)).unwrap(), Some(0x76));
    }

    #[test]
    fn uninitialized_read_is_fatal() {
        let mut ram = BankedRam::new(&config(2, None)).unwrap();
        let addr = Addr::from(0x8100u16);
        assert!(matches!(
            ram.read_mem(addr),
            Err(DeviceError::UninitializedMemory { bank: 0, .. })
        ));
        ram.write_mem(addr, 0x42);
        assert_eq!(ram.read_mem(addr).unwrap(), Some(0x42));
        ram.write_io(0x08, 1).unwrap();
        assert!(ram.read_mem(addr).is_err());
    }

    #[test]
    fn bank_select_wraps_and_records_history() {
        let mut ram = BankedRam::new(&config(16, Some(0))).unwrap();
        assert_eq!(ram.current_bank(), 0);
        ram.write_io(0x08, 3).unwrap();
        ram.write_io(0x08, 17).unwrap();
        ram.write_io(0x09, 5).unwrap();
        assert_eq!(ram.current_bank(), 1);
        assert_eq!(ram.bank_history(), &[3, 1]);
    }

    #[test]
    fn banks_are_independent() {
        let mut ram = BankedRam::new(&config(4, Some(0x76))).unwrap();
        let addr = Addr::from(0x8123u16);
        ram.write_mem(addr, 0xaa);
        ram.write_io(0x08, 2).unwrap();
        assert_eq!(ram.read_mem(addr).unwrap(), Some(0x76));
        ram.write_mem(addr, 0xbb);
        ram.write_io(0x08, 0).unwrap();
        assert_eq!(ram.read_mem(addr).unwrap(), Some(0xaa));
        assert_eq!(ram.bank_byte(2, 0x123), Some(0xbb));
    }

    #[test]
    fn seeding_a_bank() {
        let mut ram = BankedRam::new(&config(2, Some(0x76))).unwrap();
        ram.set_bank_contents(0, &[0xc3, 0x00, 0x80]).unwrap();
        ram.set_bank_byte(0, 0x7ffe, 0xed).unwrap();
        assert_eq!(ram.read_mem(Addr::from(0x8000u16)).unwrap(), Some(0xc3));
        assert_eq!(ram.read_mem(Addr::from(0x8003u16)).unwrap(), Some(0x76));
        assert_eq!(ram.read_mem(Addr::from(0xfffeu16)).unwrap(), Some(0xed));
        assert!(ram.set_bank_contents(2, &[]).is_err());
        assert!(ram.set_bank_contents(1, &[0; 0x8001]).is_err());
    }

    #[test]
    fn ignores_addresses_outside_window() {
        let mut ram = BankedRam::new(&config(2, None)).unwrap();
        ram.write_mem(Addr::from(0x7fffu16), 1);
        assert_eq!(ram.read_mem(Addr::from(0x7fffu16)).unwrap(), None);
        assert_eq!(ram.read_io(0x08), None);
    }
}

//===========================================================================//
