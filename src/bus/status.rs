use super::BusDevice;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::io::{self, Write};

//===========================================================================//

/// Configuration for a status LED register.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StatusConfig {
    /// Name of the device.
    pub name: String,
    /// The I/O port the register is written through.
    pub port: u8,
    /// Labels for the LEDs, most significant bit first.
    #[serde(default = "default_labels")]
    pub labels: [String; 8],
}

fn default_labels() -> [String; 8] {
    ["7", "6", "5", "4", "3", "2", "1", "0"].map(str::to_string)
}

//===========================================================================//

/// Renders a status register as two lines of text: the LED labels, then one
/// digit per LED, most significant bit first.
///
/// The LEDs are active-low, so a `1` is printed for each bit that is clear
/// (a lit LED) and a `0` for each bit that is set.
pub fn render_status(labels: &[String; 8], value: u8) -> String {
    let width = labels.iter().map(String::len).max().unwrap_or(1).max(1);
    let header: Vec<String> =
        labels.iter().map(|label| format!("{label:<width$}")).collect();
    let bits: Vec<String> = (0..8)
        .rev()
        .map(|bit| {
            let lit = (value >> bit) & 1 == 0;
            format!("{:<width$}", if lit { '1' } else { '0' })
        })
        .collect();
    format!(
        "{}\n{}\n",
        header.join(" ").trim_end(),
        bits.join(" ").trim_end()
    )
}

//===========================================================================//

/// A simulated write-only status LED register.
pub struct StatusLeds {
    name: String,
    port: u8,
    labels: [String; 8],
    value: u8,
    display: bool,
    output: Box<dyn Write>,
}

impl StatusLeds {
    /// Returns a new status register, with every LED off, that renders to
    /// standard error.
    pub fn new(config: &StatusConfig) -> StatusLeds {
        StatusLeds::with_output(config, Box::new(io::stderr()))
    }

    /// Returns a new status register, with every LED off, that renders to
    /// the given output stream.
    pub fn with_output(
        config: &StatusConfig,
        output: Box<dyn Write>,
    ) -> StatusLeds {
        StatusLeds {
            name: config.name.clone(),
            port: config.port,
            labels: config.labels.clone(),
            value: 0xff,
            display: true,
            output,
        }
    }

    /// Returns the last value written to the register.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Returns true if the display is enabled.
    pub fn display_enabled(&self) -> bool {
        self.display
    }

    /// Stores a new register value, rendering it if the display is enabled.
    pub fn write(&mut self, value: u8) {
        self.value = value;
        if self.display {
            let text = render_status(&self.labels, value);
            if let Err(error) = self.output.write_all(text.as_bytes()) {
                log::warn!("{}: could not render status: {error}", self.name);
            }
        }
    }
}

impl BusDevice for StatusLeds {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("{}: status LEDs, port {:#04x}", self.name, self.port)
    }

    fn write_io(&mut self, port: u8, data: u8) -> Result<()> {
        if port == self.port {
            self.write(data);
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
    use super::{StatusConfig, StatusLeds, default_labels, render_status};
    use crate::bus::BusDevice;
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn kernel_labels() -> [String; 8] {
        ["X", "X", "X", "X", "X", "SYS", "INT", "MEM"].map(str::to_string)
    }

    #[test]
    fn render_is_active_low() {
        assert_eq!(
            render_status(&default_labels(), 0b1011_0000),
            "7 6 5 4 3 2 1 0\n0 1 0 0 1 1 1 1\n"
        );
    }

    #[test]
    fn render_pads_to_widest_label() {
        assert_eq!(
            render_status(&kernel_labels(), 0b1111_1101),
            "X   X   X   X   X   SYS INT MEM\n\
             0   0   0   0   0   0   1   0\n"
        );
    }

    #[test]
    fn write_renders_when_display_enabled() {
        let buffer = SharedBuffer::default();
        let config = StatusConfig {
            name: "status".to_string(),
            port: 0x80,
            labels: default_labels(),
        };
        let output = Box::new(buffer.clone());
        let mut leds = StatusLeds::with_output(&config, output);
        assert_eq!(leds.value(), 0xff);
        leds.write_io(0x80, 0b1011_0000).unwrap();
        assert_eq!(buffer.text(), "7 6 5 4 3 2 1 0\n0 1 0 0 1 1 1 1\n");
        leds.set_display(false);
        leds.write_io(0x80, 0x00).unwrap();
        assert_eq!(leds.value(), 0x00);
        assert_eq!(buffer.text().lines().count(), 2);
        leds.write_io(0x81, 0x55).unwrap();
        assert_eq!(leds.value(), 0x00);
        assert_eq!(leds.read_io(0x80), None);
    }
}

//===========================================================================//
