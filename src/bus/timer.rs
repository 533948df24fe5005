use super::BusDevice;
use crate::error::{DeviceError, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;

//===========================================================================//

const NUM_COUNTERS: usize = 3;
const CONTROL_PORT_OFFSET: u8 = 3;

const SELECT_READ_BACK: u8 = 0b11;
const FORMAT_LSB_THEN_MSB: u8 = 0b11;
const MODE_INTERRUPT_ON_TERMINAL_COUNT: u8 = 0;

//===========================================================================//

/// Configuration for an 8254-style interval timer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TimerConfig {
    /// Name of the device.
    pub name: String,
    /// The first of four consecutive I/O ports: counters 0-2, then the
    /// control register.
    pub base_port: u8,
    /// Number of CPU clock cycles per timer tick.
    #[serde(default = "default_period")]
    pub period: u64,
}

fn default_period() -> u64 {
    1
}

//===========================================================================//

/// Counting modes that a timer counter can be programmed with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CounterMode {
    /// Mode 0: count down once, then latch the output high until the counter
    /// is reloaded or reset.
    InterruptOnTerminalCount,
}

//===========================================================================//

#[derive(Clone, Copy, Debug, Default)]
struct Counter {
    mode: Option<CounterMode>,
    count: Option<u16>,
    next_count: Option<u16>,
    lsb: Option<u8>,
    out: bool,
}

impl Counter {
    fn reset(&mut self, mode: CounterMode) {
        *self = Counter { mode: Some(mode), ..Counter::default() };
    }

    /// Loads one byte of a new count; returns the full count once the MSB
    /// completes the pair.
    fn load_byte(&mut self, data: u8) -> Option<u16> {
        match self.lsb.take() {
            None => {
                self.lsb = Some(data);
                None
            }
            Some(lsb) => {
                let count = u16::from_le_bytes([lsb, data]);
                self.next_count = Some(count);
                self.out = false;
                Some(count)
            }
        }
    }

    /// Advances the counter by `ticks` timer ticks.  This is equivalent to
    /// ticking one at a time: the first tick adopts a pending count, each
    /// later tick decrements, and a tick at zero latches the output.
    fn advance(&mut self, mut ticks: u64) -> bool {
        if ticks == 0 {
            return false;
        }
        if let Some(count) = self.next_count.take() {
            self.count = Some(count);
            ticks -= 1;
        }
        let Some(count) = self.count else {
            return false;
        };
        let decrement = u64::from(count).min(ticks);
        let count = count - decrement as u16;
        self.count = Some(count);
        ticks -= decrement;
        if count == 0 && ticks > 0 && !self.out {
            self.out = true;
            return true;
        }
        false
    }
}

//===========================================================================//

/// A simulated 8254-style programmable interval timer.
///
/// The timer has three independent counters sharing one interrupt line,
/// which is asserted whenever any counter's output is high.  Only mode 0
/// with LSB-then-MSB loading is supported; control words asking for
/// anything else are rejected as fatal configuration errors.
pub struct IntervalTimer {
    name: String,
    base_port: u8,
    period: u64,
    phase: u64,
    counters: [Counter; NUM_COUNTERS],
    irq_line: bool,
    display: bool,
}

impl IntervalTimer {
    /// Returns a new simulated timer with every counter undefined.
    pub fn new(config: &TimerConfig) -> Result<IntervalTimer> {
        if config.period == 0 {
            return Err(DeviceError::invalid_config(
                &config.name,
                "timer period must be at least one cycle",
            ));
        }
        if config.base_port > u8::MAX - CONTROL_PORT_OFFSET {
            return Err(DeviceError::invalid_config(
                &config.name,
                format!("base port {:#04x} is too high", config.base_port),
            ));
        }
        Ok(IntervalTimer {
            name: config.name.clone(),
            base_port: config.base_port,
            period: config.period,
            phase: 0,
            counters: [Counter::default(); NUM_COUNTERS],
            irq_line: false,
            display: true,
        })
    }

    /// Returns the mode the given counter was last programmed with.
    pub fn mode(&self, channel: usize) -> Option<CounterMode> {
        self.counters.get(channel).and_then(|counter| counter.mode)
    }

    /// Returns the live count of the given counter, or `None` if it has not
    /// started counting.
    pub fn count(&self, channel: usize) -> Option<u16> {
        self.counters.get(channel).and_then(|counter| counter.count)
    }

    /// Returns the count that the given counter will adopt on its next tick,
    /// if a full LSB/MSB pair has been loaded.
    pub fn next_count(&self, channel: usize) -> Option<u16> {
        self.counters.get(channel).and_then(|counter| counter.next_count)
    }

    /// Returns true if the given counter's output is latched high.
    pub fn out(&self, channel: usize) -> bool {
        self.counters.get(channel).is_some_and(|counter| counter.out)
    }

    /// Writes a control word: selects a counter, checks the requested mode
    /// and format, and resets that counter.
    pub fn write_control(&mut self, data: u8) -> Result<()> {
        let select = data >> 6;
        let format = (data >> 4) & 0b11;
        let mode = (data >> 1) & 0b111;
        let bcd = (data & 1) != 0;
        if select == SELECT_READ_BACK {
            return Err(DeviceError::ReadBackNotSupported {
                name: self.name.clone(),
            });
        }
        if bcd {
            return Err(DeviceError::BcdNotSupported {
                name: self.name.clone(),
            });
        }
        if format != FORMAT_LSB_THEN_MSB {
            return Err(DeviceError::UnsupportedAccessFormat {
                name: self.name.clone(),
                format,
            });
        }
        if mode != MODE_INTERRUPT_ON_TERMINAL_COUNT {
            return Err(DeviceError::UnsupportedTimerMode {
                name: self.name.clone(),
                mode,
            });
        }
        let channel = usize::from(select);
        self.counters[channel].reset(CounterMode::InterruptOnTerminalCount);
        if self.display {
            log::info!("{}: counter {channel} reset to mode 0", self.name);
        } else {
            log::debug!("{}: counter {channel} reset to mode 0", self.name);
        }
        Ok(())
    }

    /// Loads one byte of a counter's next count.  Bytes alternate LSB then
    /// MSB; completing a pair clears the counter's output.
    pub fn write_counter_byte(
        &mut self,
        channel: usize,
        data: u8,
    ) -> Result<()> {
        let Some(counter) = self.counters.get_mut(channel) else {
            return Err(DeviceError::InvalidChannel {
                name: self.name.clone(),
                channel,
            });
        };
        if let Some(count) = counter.load_byte(data) {
            if self.display {
                log::info!("{}: counter {channel} loaded {count}", self.name);
            } else {
                log::debug!(
                    "{}: counter {channel} loaded {count}",
                    self.name
                );
            }
        }
        Ok(())
    }
}

impl BusDevice for IntervalTimer {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!(
            "{}: 8254 timer, ports {:#04x}-{:#04x}, {} cycle(s) per tick",
            self.name,
            self.base_port,
            self.base_port + CONTROL_PORT_OFFSET,
            self.period
        )
    }

    fn write_io(&mut self, port: u8, data: u8) -> Result<()> {
        match port.checked_sub(self.base_port) {
            Some(CONTROL_PORT_OFFSET) => self.write_control(data),
            Some(offset) if usize::from(offset) < NUM_COUNTERS => {
                self.write_counter_byte(usize::from(offset), data)
            }
            _ => Ok(()),
        }
    }

    fn clock(&mut self, cycles: u64) {
        let mut ticks = cycles / self.period;
        let leftover = cycles % self.period;
        let until_tick = self.period - self.phase;
        if leftover >= until_tick {
            ticks += 1;
            self.phase = leftover - until_tick;
        } else {
            self.phase += leftover;
        }
        for (channel, counter) in self.counters.iter_mut().enumerate() {
            if counter.advance(ticks) {
                log::debug!("{}: counter {channel} output high", self.name);
            }
        }
        self.irq_line = self.counters.iter().any(|counter| counter.out);
    }

    fn interrupt(&self) -> bool {
        self.irq_line
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


//===========================================================================//
