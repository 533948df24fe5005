//! Errors raised by simulated devices and the machines built from them.

use crate::addr::{Addr, Range};
use std::io;
use thiserror::Error;

//===========================================================================//

/// Convenience alias for results whose error type is [DeviceError].
pub type Result<T> = std::result::Result<T, DeviceError>;

/// A fatal condition raised by a simulated device.
///
/// None of these are recoverable runtime conditions: they either indicate a
/// machine configuration that the simulation refuses to approximate, or a
/// bug in how simulated memory was initialized.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Two memory-mapped devices claim some of the same addresses.
    #[error("memory range {range} of {name} overlaps {other}")]
    Overlap {
        /// The device that could not be attached.
        name: String,
        /// The range it tried to claim.
        range: Range,
        /// The device already attached there.
        other: String,
    },
    /// A timer control word selected a counting mode other than mode 0.
    #[error("{name}: timer mode {mode} is not supported")]
    UnsupportedTimerMode {
        /// The timer device.
        name: String,
        /// The requested mode (0-5).
        mode: u8,
    },
    /// A timer control word requested BCD counting.
    #[error("{name}: BCD counting is not supported")]
    BcdNotSupported {
        /// The timer device.
        name: String,
    },
    /// A timer control word requested a read/write format other than
    /// LSB-then-MSB.
    #[error("{name}: read/write format {format:#04b} is not supported")]
    UnsupportedAccessFormat {
        /// The timer device.
        name: String,
        /// The two-bit format field.
        format: u8,
    },
    /// A timer control word used the read-back command encoding.
    #[error("{name}: read-back command is not supported")]
    ReadBackNotSupported {
        /// The timer device.
        name: String,
    },
    /// A counter channel outside the device was addressed.
    #[error("{name}: no such counter {channel}")]
    InvalidChannel {
        /// The timer device.
        name: String,
        /// The requested channel.
        channel: usize,
    },
    /// A memory cell was read before anything initialized it.
    #[error("{name}: read of uninitialized memory at {addr} (bank {bank})")]
    UninitializedMemory {
        /// The memory device.
        name: String,
        /// The bank that was selected.
        bank: usize,
        /// The address that was read.
        addr: Addr,
    },
    /// A binary image does not fit in the region it is loaded into.
    #[error("{name}: image of {len} bytes does not fit in {size} bytes")]
    ImageTooLarge {
        /// The memory device.
        name: String,
        /// The image length.
        len: usize,
        /// The region size.
        size: usize,
    },
    /// A device configuration parameter is out of range.
    #[error("{name}: {message}")]
    InvalidConfig {
        /// The misconfigured device.
        name: String,
        /// What is wrong with it.
        message: String,
    },
    /// An I/O error while loading an image or a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A configuration file could not be parsed.
    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeviceError {
    pub(crate) fn invalid_config(
        name: &str,
        message: impl Into<String>,
    ) -> DeviceError {
        DeviceError::InvalidConfig {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

impl From<DeviceError> for io::Error {
    fn from(error: DeviceError) -> io::Error {
        match error {
            DeviceError::Io(error) => error,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

//===========================================================================//


//===========================================================================//
