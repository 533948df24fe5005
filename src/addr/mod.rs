//! Types for representing bus addresses.

#[allow(clippy::module_inception)]
mod addr;
mod range;

pub use addr::Addr;
pub use range::Range;

//===========================================================================//
