use super::BusDevice;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::any::Any;

//===========================================================================//

const STATUS_FLAG_RX_FULL: u8 = 0b0000_0001;
const STATUS_FLAG_TX_EMPTY: u8 = 0b0000_0010;
const STATUS_FLAG_IRQ: u8 = 0b1000_0000;

const CONTROL_MASK_MASTER_RESET: u8 = 0b0000_0011;
const CONTROL_FLAG_TX_IRQ_ENABLE: u8 = 0b0010_0000;

//===========================================================================//

/// Configuration for a 6850-style serial port.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SerialConfig {
    /// Name of the device.
    pub name: String,
    /// The I/O port for the status (read) and control (write) registers.
    pub control_port: u8,
    /// The I/O port for the receive (read) and transmit (write) data
    /// registers.
    pub data_port: u8,
}

//===========================================================================//

/// A simulated 6850-style serial port connecting the emulated CPU to a host
/// terminal.
///
/// Each direction holds at most one byte.  The CPU side sees the status,
/// control and data registers through I/O ports; the host side uses
/// [`deliver_byte`](Serial6850::deliver_byte) and
/// [`read_data`](Serial6850::read_data).
pub struct Serial6850 {
    name: String,
    control_port: u8,
    data_port: u8,
    status: u8,
    control: u8,
    rx: u8,
    tx: Option<u8>,
    rx_irq: bool,
    tx_irq: bool,
    irq_line: bool,
}

impl Serial6850 {
    /// Returns a new simulated serial port in its power-on state, which has
    /// every status bit clear until the CPU issues a master reset.
    pub fn new(config: &SerialConfig) -> Serial6850 {
        Serial6850 {
            name: config.name.clone(),
            control_port: config.control_port,
            data_port: config.data_port,
            status: 0,
            control: 0,
            rx: 0,
            tx: None,
            rx_irq: false,
            tx_irq: false,
            irq_line: false,
        }
    }

    /// Returns the current status register.
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Returns the last control byte that was stored (master resets are not
    /// stored).
    pub fn control(&self) -> u8 {
        self.control
    }

    /// Returns the number of bytes the CPU has sent that the host has not
    /// yet drained (zero or one).
    pub fn tx_pending(&self) -> usize {
        usize::from(self.tx.is_some())
    }

    /// Returns true if a byte delivered by the host has not yet been read by
    /// the CPU.
    pub fn rx_full(&self) -> bool {
        (self.status & STATUS_FLAG_RX_FULL) != 0
    }

    /// Delivers a byte from the host to the CPU, replacing any byte that the
    /// CPU has not read yet, and requests a receive interrupt.
    pub fn deliver_byte(&mut self, data: u8) {
        self.rx = data;
        self.status |= STATUS_FLAG_RX_FULL;
        self.rx_irq = true;
    }

    /// Drains the byte most recently sent by the CPU, if there is one, and
    /// marks the transmit buffer as empty.
    pub fn read_data(&mut self) -> Option<u8> {
        self.status |= STATUS_FLAG_TX_EMPTY;
        self.tx.take()
    }

    /// Stores a byte sent by the CPU.  An unread byte is overwritten.
    pub fn write_data(&mut self, data: u8) {
        if let Some(old) = self.tx {
            log::warn!(
                "{}: tx byte {old:#04x} overwritten before read",
                self.name
            );
        }
        self.status &= !STATUS_FLAG_TX_EMPTY;
        self.tx = Some(data);
    }

    /// Reads the receive buffer from the CPU side, clearing the receive
    /// interrupt request.
    pub fn read_data_cpu_side(&mut self) -> u8 {
        self.status &= !STATUS_FLAG_RX_FULL;
        self.rx_irq = false;
        self.rx
    }

    /// Writes the control register from the CPU side.  A value whose low two
    /// bits are both set is a master reset rather than a new control byte.
    /// A reset sets the status to tx-empty, clears both interrupt requests
    /// and discards any tx byte the host has not yet drained.  The control
    /// register keeps its value.
    pub fn write_control(&mut self, data: u8) {
        if (data & CONTROL_MASK_MASTER_RESET) == CONTROL_MASK_MASTER_RESET {
            log::debug!("{}: master reset", self.name);
            self.status = STATUS_FLAG_TX_EMPTY;
            self.tx = None;
            self.rx_irq = false;
            self.tx_irq = false;
        } else {
            self.control = data;
        }
    }
}

impl BusDevice for Serial6850 {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!(
            "{}: 6850 serial, control port {:#04x}, data port {:#04x}",
            self.name, self.control_port, self.data_port
        )
    }

    fn read_io(&mut self, port: u8) -> Option<u8> {
        if port == self.data_port {
            Some(self.read_data_cpu_side())
        } else if port == self.control_port {
            Some(self.status)
        } else {
            None
        }
    }

    fn write_io(&mut self, port: u8, data: u8) -> Result<()> {
        if port == self.data_port {
            self.write_data(data);
        } else if port == self.control_port {
            self.write_control(data);
        }
        Ok(())
    }

    fn clock(&mut self, _cycles: u64) {
        // The interrupt is level-triggered, so it is recomputed on every
        // clock call, however few cycles have passed.
        self.tx_irq = (self.control & CONTROL_FLAG_TX_IRQ_ENABLE) != 0
            && (self.status & STATUS_FLAG_TX_EMPTY) != 0;
        self.irq_line = self.rx_irq || self.tx_irq;
        if self.irq_line {
            self.status |= STATUS_FLAG_IRQ;
        } else {
            self.status &= !STATUS_FLAG_IRQ;
        }
    }

    fn interrupt(&self) -> bool {
        self.irq_line
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
    use super::{Serial6850, SerialConfig};
    use crate::bus::BusDevice;

    fn new_serial() -> Serial6850 {
        Serial6850::new(&SerialConfig {
            name: "serial".to_string(),
            control_port: 0x00,
            data_port: 0x01,
        })
    }

    #[test]
    fn master_reset_clears_status() {
        let mut serial = new_serial();
        serial.deliver_byte(b'H');
        serial.write_data(b'x');
        serial.clock(1);
        assert_eq!(serial.status(), 0b1000_0001);
        assert!(serial.interrupt());
        serial.write_control(0x03);
        assert_eq!(serial.status(), 0b0000_0010);
        assert_eq!(serial.tx_pending(), 0);
        assert_eq!(serial.read_data(), None);
        serial.clock(0);
        assert_eq!(serial.status(), 0b0000_0010);
        assert!(!serial.interrupt());
    }

    #[test]
    fn master_reset_is_not_stored_as_control() {
        let mut serial = new_serial();
        serial.write_control(0x96);
        serial.write_control(0x57);
        assert_eq!(serial.control(), 0x96);
    }

    #[test]
    fn receive_round_trip() {
        let mut serial = new_serial();
        serial.write_control(0x03);
        serial.deliver_byte(b'H');
        assert!(serial.rx_full());
        serial.clock(4);
        assert!(serial.interrupt());
        assert_eq!(serial.read_io(0x00), Some(0b1000_0011));
        assert_eq!(serial.read_io(0x01), Some(b'H'));
        assert!(!serial.rx_full());
        serial.clock(4);
        assert!(!serial.interrupt());
        assert_eq!(serial.read_io(0x00), Some(0b0000_0010));
    }

    #[test]
    fn transmit_round_trip() {
        let mut serial = new_serial();
        serial.write_control(0x03);
        serial.write_io(0x01, b'h').unwrap();
        assert_eq!(serial.status() & 0x02, 0);
        assert_eq!(serial.tx_pending(), 1);
        assert_eq!(serial.read_data(), Some(b'h'));
        assert_eq!(serial.status() & 0x02, 0x02);
        assert_eq!(serial.tx_pending(), 0);
        assert_eq!(serial.read_data(), None);
    }

    #[test]
    fn transmit_overwrites_unread_byte() {
        let mut serial = new_serial();
        serial.write_data(b'a');
        serial.write_data(b'b');
        assert_eq!(serial.read_data(), Some(b'b'));
        assert_eq!(serial.read_data(), None);
    }

    #[test]
    fn tx_interrupt_follows_control_and_buffer_state() {
        let mut serial = new_serial();
        serial.write_control(0x03);
        serial.write_control(0xb6);
        serial.clock(1);
        assert!(serial.interrupt());
        assert_eq!(serial.status() & 0x80, 0x80);
        serial.write_data(b'x');
        serial.clock(1);
        assert!(!serial.interrupt());
        serial.read_data();
        serial.clock(1);
        assert!(serial.interrupt());
        serial.write_control(0x16);
        serial.clock(1);
        assert!(!serial.interrupt());
    }

    #[test]
    fn ignores_other_ports() {
        let mut serial = new_serial();
        assert_eq!(serial.read_io(0x02), None);
        serial.write_io(0x02, 0x03).unwrap();
        assert_eq!(serial.status(), 0);
    }
}

//===========================================================================//
