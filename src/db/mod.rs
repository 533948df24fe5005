//! Facilities for running and inspecting a simulated machine.

mod instance;

pub use instance::{Instance, RunOutcome};

//===========================================================================//
