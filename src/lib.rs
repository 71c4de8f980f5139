#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// A typed websocket client for the bridge.
pub mod client;

/// The connection manager: owns the device lifecycle and the retry timer.
pub mod device;

/// Finds the device among the attached serial ports.
pub mod discovery;

/// Possible errors in this library.
pub mod error;

/// The broadcast hub: fans messages out to all connected clients.
pub mod hub;

/// Logging/tracing setup.
pub mod logging;

/// Messages sent to clients.
pub mod messages;

/// Serial port driver.
pub mod serial;

/// Code relating to setting up the server which accepts client connections.
pub mod server;

/// Syntactic validation of device lines.
pub mod validate;

/// Handles incoming websockets.
pub(crate) mod websocket;
