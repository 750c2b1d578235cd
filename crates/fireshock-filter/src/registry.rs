//! Collection of attached sessions and their settings.
//!
//! One lock serializes registration, settings access, sideband queries and
//! the control-device lifecycle. The sideband control device exists exactly
//! while at least one session is registered.

use std::collections::BTreeMap;
use std::sync::Arc;

use fireshock_hid_dualshock_protocol::DeviceSettings;
use parking_lot::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::error::{FilterError, FilterResult};
use crate::session::DeviceSession;

/// Creates and deletes the sideband control device.
pub trait ControlDeviceHost: Send + Sync {
    fn create_control_device(&self) -> FilterResult<()>;

    fn delete_control_device(&self);
}

struct Entry {
    session: Arc<DeviceSession>,
    settings: DeviceSettings,
}

#[derive(Default)]
struct RegistryInner {
    sessions: BTreeMap<u32, Entry>,
    next_index: u32,
}

/// Registered sessions keyed by enumeration index.
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
    control: Arc<dyn ControlDeviceHost>,
}

impl SessionRegistry {
    pub fn new(control: Arc<dyn ControlDeviceHost>) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            control,
        }
    }

    /// Register a session built by `build` from its enumeration index.
    ///
    /// The index is the number of registered sessions at insertion.
    pub fn register<F>(&self, settings: DeviceSettings, build: F) -> Arc<DeviceSession>
    where
        F: FnOnce(u32) -> DeviceSession,
    {
        let mut inner = self.inner.lock();
        let serial = inner.next_index;
        inner.next_index = serial.wrapping_add(1);

        let session = Arc::new(build(serial));
        inner.sessions.insert(
            serial,
            Entry {
                session: Arc::clone(&session),
                settings,
            },
        );

        if inner.sessions.len() == 1 {
            match self.control.create_control_device() {
                Ok(()) => info!("Sideband control device created"),
                Err(e) => warn!(error = %e, "Failed to create sideband control device"),
            }
        }
        info!(serial, count = inner.sessions.len(), "Session registered");
        session
    }

    /// Remove a session, returning it if it was registered.
    pub fn unregister(&self, serial: u32) -> Option<Arc<DeviceSession>> {
        let mut inner = self.inner.lock();
        if !inner.sessions.contains_key(&serial) {
            return None;
        }
        if inner.sessions.len() == 1 {
            self.control.delete_control_device();
            info!("Sideband control device deleted");
        }
        let entry = inner.sessions.remove(&serial)?;
        if inner.sessions.is_empty() {
            inner.next_index = 0;
        }
        info!(serial, count = inner.sessions.len(), "Session unregistered");
        Some(entry.session)
    }

    pub fn get(&self, serial: u32) -> Option<Arc<DeviceSession>> {
        self.inner
            .lock()
            .sessions
            .get(&serial)
            .map(|entry| Arc::clone(&entry.session))
    }

    pub fn count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn settings(&self, serial: u32) -> FilterResult<DeviceSettings> {
        self.lock().settings(serial)
    }

    pub fn set_settings(&self, serial: u32, settings: DeviceSettings) -> FilterResult<()> {
        self.lock().set_settings(serial, settings)
    }

    /// Snapshot of every registered session.
    pub fn sessions(&self) -> Vec<Arc<DeviceSession>> {
        self.inner
            .lock()
            .sessions
            .values()
            .map(|entry| Arc::clone(&entry.session))
            .collect()
    }

    /// Hold the registry lock across several operations.
    pub fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            inner: self.inner.lock(),
        }
    }
}

/// Registry access under a held lock.
pub struct RegistryGuard<'a> {
    inner: MutexGuard<'a, RegistryInner>,
}

impl RegistryGuard<'_> {
    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    pub fn session(&self, serial: u32) -> FilterResult<&Arc<DeviceSession>> {
        self.inner
            .sessions
            .get(&serial)
            .map(|entry| &entry.session)
            .ok_or(FilterError::UnknownSerial(serial))
    }

    pub fn settings(&self, serial: u32) -> FilterResult<DeviceSettings> {
        self.inner
            .sessions
            .get(&serial)
            .map(|entry| entry.settings)
            .ok_or(FilterError::UnknownSerial(serial))
    }

    pub fn set_settings(&mut self, serial: u32, settings: DeviceSettings) -> FilterResult<()> {
        let entry = self
            .inner
            .sessions
            .get_mut(&serial)
            .ok_or(FilterError::UnknownSerial(serial))?;
        entry.settings = settings;
        Ok(())
    }
}
