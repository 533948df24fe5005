//! Banked memory and peripheral models for simulated Z80 machines.

#![warn(missing_docs)]

pub mod addr;
pub mod bus;
pub mod config;
pub mod db;
pub mod error;
pub mod image;
pub mod proc;
