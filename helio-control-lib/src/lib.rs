//! # Helio Control Library for Heliospectra grow lights
//!
//! `helio-control-lib` discovers Heliospectra LED grow-light fixtures on the
//! local network and controls the intensity of each of their light channels.
//!
//! Discovery broadcasts a small binary query over UDP and collects the XML
//! identity replies. Control is plain HTTP against the fixture's built-in web
//! server.
//!
//! ## Features
//!
//! - Device discovery on local networks, de-duplicated by serial number
//! - Diagnostic and status snapshots, including the per-channel wavelength list
//! - Setting channel intensities and a small demo lightshow
//!
//! ## Example
//!
//! ```no_run
//! use helio_control_lib::control_interface::Device;
//! use helio_control_lib::util::discovery::Discovery;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let devices = Discovery::find_devices(Duration::from_secs(4)).await?;
//!
//!     if let Some(info) = devices.first() {
//!         let device = Device::from_device_info(info, None)?;
//!         let diag = device.diagnostic().await?;
//!         device.set_intensities(&vec![0; diag.wavelengths.len()]).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Disclaimer
//!
//! This project is not affiliated with, authorized by, endorsed by, or in any way officially connected
//! with Heliospectra AB or its affiliates.
//!
//! ## License
//!
//! This project is dual-licensed under the MIT License and the Apache License, Version 2.0.
//! You may choose to use either license, depending on your project needs.

// The `control_interface` module talks HTTP to a single fixture: diagnostic and
// status snapshots, intensity control and the demo lightshow.
//
// Example usage:
//
// ```
// use helio_control_lib::control_interface::Device;
//
// #[tokio::main]
// async fn main() {
//     let device = Device::new("192.168.1.8".parse().unwrap(), None);
//     device.set_intensities(&[0, 100, 0, 0]).await.unwrap();
// }
// ```
pub mod control_interface;

pub mod error;

// The `util` module holds the UDP side: the command packet codec and
// broadcast discovery, plus the lenient XML field decoders shared by all
// response types.
pub mod util;

pub use error::{Error, Result};
