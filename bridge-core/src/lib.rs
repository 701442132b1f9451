#![no_std]

// Control core for the battery-powered sensor-to-BLE bridge.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware and radio collaborators are reached through
// the traits in `peripherals` and `link`, so both state machines can be driven
// from unit tests and the emulator exactly as they are on the device.

#[macro_use]
mod log;

pub mod acquisition;
pub mod config;
pub mod discovery;
pub mod events;
pub mod link;
pub mod node;
pub mod notify;
pub mod peripherals;
pub mod thermo;
