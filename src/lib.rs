//! Host-side client library for a cassette-based sample-handling "autoloader".
//!
//! The device exposes two independent TCP channels — a command channel
//! (motion commands) and a status channel (telemetry polling and `STOP`) —
//! carrying a length-framed binary protocol with a CRC-16 footer. This crate
//! speaks that protocol and exposes it as a small set of blocking,
//! timeout-bounded operations plus a set of accessors over continuously
//! polled telemetry.
//!
//! Typical use:
//!
//! ```no_run
//! use autoloader::{Loader, LoaderConfig, Axis};
//!
//! let loader = Loader::connect(LoaderConfig::default())?;
//! let _scope = loader.enter_scope(); // starts the background status poller
//! loader.home(Axis::All, true)?;
//! loader.load(1)?;
//! println!("gripped: {:?}", loader.index_loaded());
//! # Ok::<(), autoloader::AutoloaderError>(())
//! ```

mod command;
mod config;
mod connection;
mod crc;
mod error;
mod frame;
mod loader;
mod status;
mod wire;

pub use command::{CommandChannel, CommandCode};
pub use config::LoaderConfig;
pub use connection::{clear_cancel, is_cancelled, request_cancel, Connection};
pub use error::{AutoloaderError, DeviceError, FrameError, LastError};
pub use loader::{ActiveScope, LifecycleState, Loader};
pub use status::{
    AxisRegisters, AxisStatus, DeviceStatus, DeviceVariant, MainStatus, SlotState, VersionInfo,
    ABSOLUTE_POSITION_KNOWN, IN_MOTION, PHASE_DETECTED, SERVO_ENABLED,
};
pub use wire::Axis;
