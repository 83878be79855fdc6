//! ESP32-S3 firmware-specific modules for amp-rs
//!
//! This crate contains the concrete collaborators that cannot compile on
//! desktop targets: the ADC1 oneshot reader, Wi-Fi link management through
//! `esp-radio`, SNTP time and HTTP(S) reporting over `embassy-net`, and the
//! build-time device secrets.

#![no_std]

extern crate alloc;

pub mod adc;
pub mod http;
pub mod secrets;
pub mod sntp;
pub mod wifi;
