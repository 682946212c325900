//! N-Defender front panel library: the control core of a three-receiver
//! analog video front panel.
//!
//! Tunes three RF receiver modules over a shared bit-serial register bus,
//! sweeps a channel's frequency table for the strongest signal, drives the
//! LED/buzzer alert outputs from signal thresholds, and speaks a
//! newline-delimited JSON protocol with a host over a serial link.
//!
//! Everything here is `no_std` with no allocator and no platform
//! dependencies; hardware is reached only through [`hal::PanelHal`], so the
//! whole core runs under `cargo test` on the host. The ESP32-S3 firmware
//! binary is a thin consumer that maps the hardware lines onto pins and
//! feeds the control loop.
//!
//! Layout, bottom up:
//! - `config`, `board`, `timing`, `hal`: constants, pin map, wrap-tolerant
//!   time, the hardware seam.
//! - `vrx`, `profile`, `alert`, `buzzer`, `input`: receivers, thresholds,
//!   outputs and local controls.
//! - `protocol`, `fields`, `comm`: wire types, the inbound field scanner
//!   and line framing.
//! - `display`, `panel`: screen composition and the control loop itself.

#![cfg_attr(not(test), no_std)]

pub mod alert;
pub mod board;
pub mod buzzer;
pub mod comm;
pub mod config;
pub mod display;
pub mod fields;
pub mod hal;
pub mod input;
pub mod panel;
pub mod profile;
pub mod protocol;
pub mod timing;
pub mod vrx;
