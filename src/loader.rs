//! # Loader facade
//!
//! Two command channels (one per TCP port), a background status poller, and
//! the high-level operation surface built on top of them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::command::{self, CommandChannel, CommandCode};
use crate::config::LoaderConfig;
use crate::connection::Connection;
use crate::error::{AutoloaderError, LastError};
use crate::frame;
use crate::status::{DeviceStatus, DeviceVariant, SlotState, VersionInfo};
use crate::wire::{self, Axis};

struct Inner {
    command: CommandChannel,
    status: CommandChannel,
    variant: DeviceVariant,
    version: VersionInfo,
    cached: Mutex<Option<DeviceStatus>>,
}

impl Inner {
    fn refresh_from(&self, channel: &CommandChannel, timeout: Duration) -> Result<(), AutoloaderError> {
        let body = channel.command(CommandCode::GetStatus, &wire::get_status_req(), timeout)?;
        let decoded = DeviceStatus::decode(command::payload(&body), 0, self.variant)
            .map_err(AutoloaderError::Protocol)?;
        *self.cached.lock() = Some(decoded);
        Ok(())
    }
}

/// The facade's own lifetime state, independent of each `Connection`'s
/// `Disconnected ⇄ Connected` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Active,
    Dormant,
}

/// Dropping this ends the active scope, stopping the background poller —
/// the Rust equivalent of the original's `__exit__`.
pub struct ActiveScope<'a> {
    loader: &'a Loader,
}

impl Drop for ActiveScope<'_> {
    fn drop(&mut self) {
        self.loader.exit_scope();
    }
}

/// Host-side client for the autoloader device.
pub struct Loader {
    inner: Arc<Inner>,
    config: LoaderConfig,
    running: Arc<AtomicBool>,
    activated_once: AtomicBool,
    poller: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Loader {
    /// Connect both channels and read `GET_VERSION` once to establish the
    /// device variant and slot count. Does not start the background
    /// poller — call [`Loader::enter_scope`] for that.
    pub fn connect(config: LoaderConfig) -> Result<Self, AutoloaderError> {
        let terminator = Some(frame::END_MARKER.to_vec());
        let command_conn = Connection::new(config.addresses.clone(), config.command_port, terminator.clone());
        let status_conn = Connection::new(config.addresses.clone(), config.status_port, terminator);
        let command = CommandChannel::new(command_conn);
        let status = CommandChannel::new(status_conn);

        let version_body = command.command(
            CommandCode::GetVersion,
            &wire::get_version_req(),
            config.get_version_timeout,
        )?;
        let version = VersionInfo::decode(command::payload(&version_body))
            .map_err(AutoloaderError::Device)?;
        let variant = version.variant();

        Ok(Loader {
            inner: Arc::new(Inner {
                command,
                status,
                variant,
                version,
                cached: Mutex::new(None),
            }),
            config,
            running: Arc::new(AtomicBool::new(false)),
            activated_once: AtomicBool::new(false),
            poller: Mutex::new(None),
        })
    }

    pub fn version(&self) -> VersionInfo {
        self.inner.version
    }

    pub fn variant(&self) -> DeviceVariant {
        self.inner.variant
    }

    pub fn number_of_slots(&self) -> u32 {
        self.inner.version.number_of_slots
    }

    pub fn state(&self) -> LifecycleState {
        if self.poller.lock().is_some() {
            LifecycleState::Active
        } else if self.activated_once.load(Ordering::SeqCst) {
            LifecycleState::Dormant
        } else {
            LifecycleState::Constructed
        }
    }

    /// `Constructed|Dormant -> Active`: spawn the daemon status poller.
    /// Idempotent — calling it while already active is a no-op beyond
    /// returning a new guard.
    pub fn enter_scope(&self) -> ActiveScope<'_> {
        self.activated_once.store(true, Ordering::SeqCst);
        let mut poller = self.poller.lock();
        if poller.is_none() {
            self.running.store(true, Ordering::SeqCst);
            let inner = Arc::clone(&self.inner);
            let running = Arc::clone(&self.running);
            let timeout = self.config.status_timeout;
            *poller = Some(thread::spawn(move || poll_loop(inner, running, timeout)));
        }
        ActiveScope { loader: self }
    }

    /// `Active -> Dormant`: flag the poller to stop and join it.
    fn exit_scope(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.poller.lock().take() {
            let _ = handle.join();
        }
    }

    pub fn home(&self, axis: Axis, vacuum_safe: bool) -> Result<(), AutoloaderError> {
        let request = wire::home_req(axis, vacuum_safe);
        self.inner
            .command
            .command(CommandCode::Home, &request, self.config.home_timeout)?;
        self.inner
            .refresh_from(&self.inner.status, self.config.status_timeout)
    }

    pub fn load(&self, slot: u8) -> Result<(), AutoloaderError> {
        let request = wire::load_req(slot);
        self.inner
            .command
            .command(CommandCode::Load, &request, self.config.load_timeout)?;
        Ok(())
    }

    pub fn load_cassette(&self, vacuum_safe: bool) -> Result<(), AutoloaderError> {
        let request = wire::load_cassette_req(vacuum_safe);
        self.inner.command.command(
            CommandCode::LoadCassette,
            &request,
            self.config.load_cassette_timeout,
        )?;
        self.inner
            .refresh_from(&self.inner.status, self.config.status_timeout)
    }

    pub fn evac(&self) -> Result<(), AutoloaderError> {
        self.inner
            .command
            .command(CommandCode::Evac, &wire::evac_req(), self.config.evac_timeout)?;
        Ok(())
    }

    pub fn clear_last_error(&self) -> Result<(), AutoloaderError> {
        self.inner.command.command(
            CommandCode::ClearLastError,
            &wire::clear_last_error_req(),
            self.config.clear_last_error_timeout,
        )?;
        Ok(())
    }

    /// Sent on the status channel so it can preempt a long-running command
    /// in flight on the command channel.
    pub fn stop(&self) -> Result<(), AutoloaderError> {
        self.inner
            .status
            .command(CommandCode::Stop, &wire::stop_req(), self.config.stop_timeout)?;
        Ok(())
    }

    pub fn is_homed(&self) -> bool {
        self.inner
            .cached
            .lock()
            .as_ref()
            .map(DeviceStatus::is_homed)
            .unwrap_or(false)
    }

    pub fn is_gripped(&self) -> bool {
        self.inner
            .cached
            .lock()
            .as_ref()
            .map(|s| s.main_status.is_gripped())
            .unwrap_or(false)
    }

    /// `Some(slot)` if something is gripped; `None` if nothing is gripped
    /// or no telemetry has been decoded yet.
    pub fn index_loaded(&self) -> Option<u32> {
        self.inner.cached.lock().as_ref().and_then(|s| {
            let slot = s.main_status.gripped_from_slot;
            (slot != 0).then_some(slot as u32)
        })
    }

    /// `Unknown` both when the slot's bit is unknown on the device and
    /// when no telemetry has been decoded yet.
    pub fn slot_state(&self, slot: u32) -> SlotState {
        self.inner
            .cached
            .lock()
            .as_ref()
            .map(|s| s.main_status.slot_state(slot))
            .unwrap_or(SlotState::Unknown)
    }

    /// The cassette occupies a virtual slot one past the real range.
    pub fn is_cassette_present(&self) -> bool {
        matches!(self.slot_state(self.number_of_slots() + 1), SlotState::Present)
    }

    pub fn last_error(&self) -> Option<LastError> {
        self.inner
            .cached
            .lock()
            .as_ref()
            .map(|s| s.main_status.last_error())
    }
}

fn poll_loop(inner: Arc<Inner>, running: Arc<AtomicBool>, timeout: Duration) {
    while running.load(Ordering::SeqCst) {
        if let Err(err) = inner.refresh_from(&inner.status, timeout) {
            log::warn!("status poll failed, will retry next tick: {err}");
        }
        thread::sleep(crate::config::POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};

    fn fake_loader(number_of_slots: u32) -> Loader {
        let command = CommandChannel::new(Connection::new(vec!["127.0.0.1".to_string()], 0, None));
        let status = CommandChannel::new(Connection::new(vec!["127.0.0.1".to_string()], 0, None));
        Loader {
            inner: Arc::new(Inner {
                command,
                status,
                variant: DeviceVariant::Beta,
                version: VersionInfo {
                    version: 2,
                    sub_version: 1,
                    number_of_slots,
                },
                cached: Mutex::new(None),
            }),
            config: LoaderConfig::default(),
            running: Arc::new(AtomicBool::new(false)),
            activated_once: AtomicBool::new(false),
            poller: Mutex::new(None),
        }
    }

    fn beta_status_bytes(slot_known: u32, slot_state: u32, gripped: i32) -> Vec<u8> {
        let mut buf = vec![0u8; DeviceVariant::Beta.total_size()];
        // Both axes default to zeroed / not-homed; only main status matters here.
        let main_start = 46 * 2;
        LittleEndian::write_u32(&mut buf[main_start..main_start + 4], slot_known);
        LittleEndian::write_u32(&mut buf[main_start + 4..main_start + 8], slot_state);
        LittleEndian::write_i32(&mut buf[main_start + 56..main_start + 60], gripped);
        buf
    }

    #[test]
    fn lifecycle_starts_constructed() {
        let loader = fake_loader(24);
        assert_eq!(loader.state(), LifecycleState::Constructed);
    }

    #[test]
    fn cassette_slot_is_one_past_configured_range() {
        let loader = fake_loader(24);
        let body = beta_status_bytes(1 << 24, 1 << 24, 0); // slot 25 present
        let decoded = DeviceStatus::decode(&body, 0, DeviceVariant::Beta).unwrap();
        *loader.inner.cached.lock() = Some(decoded);
        assert!(loader.is_cassette_present());
        assert_eq!(loader.slot_state(1), SlotState::Unknown);
    }

    #[test]
    fn index_loaded_reflects_gripped_from_slot() {
        let loader = fake_loader(10);
        assert_eq!(loader.index_loaded(), None);
        let body = beta_status_bytes(0, 0, 5);
        let decoded = DeviceStatus::decode(&body, 0, DeviceVariant::Beta).unwrap();
        *loader.inner.cached.lock() = Some(decoded);
        assert_eq!(loader.index_loaded(), Some(5));
        assert!(loader.is_gripped());
    }

    #[test]
    fn enter_and_exit_scope_transitions_lifecycle() {
        let loader = fake_loader(10);
        {
            let _scope = loader.enter_scope();
            assert_eq!(loader.state(), LifecycleState::Active);
        }
        // Poller will fail every tick against a closed/fake connection and
        // log a warning; it still exits promptly on scope drop.
        assert_eq!(loader.state(), LifecycleState::Dormant);
    }
}
