use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::LinkSettings;
use crate::drivers::{LinkError, Port, PortDriver};
use crate::types::{ConnectionState, SignalRole};

struct OpenPort {
    name: String,
    port: Box<dyn Port>,
}

// Every open and every close bumps `generation`; a handle is live only while
// its generation matches and a port is open.
#[derive(Default)]
struct Session {
    generation: u64,
    open: Option<OpenPort>,
}

impl Session {
    fn release(&mut self) -> Option<String> {
        let closed = self.open.take()?;
        self.generation += 1;
        Some(closed.name)
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reference to one open session of a [`SerialLink`].
#[derive(Clone)]
pub struct LinkHandle {
    port_name: String,
    generation: u64,
    session: Arc<Mutex<Session>>,
}

impl LinkHandle {
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_valid(&self) -> bool {
        let session = lock(&self.session);
        session.open.is_some() && session.generation == self.generation
    }

    /// Reads whatever bytes are pending. A read timeout is reported as `Ok(0)`.
    ///
    /// The session lock is held for the duration of the read, so a concurrent
    /// close waits at most one read timeout.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let mut session = lock(&self.session);
        let generation = session.generation;
        let open = match session.open.as_mut() {
            Some(open) if generation == self.generation => open,
            _ => {
                return Err(LinkError::HandleInvalidated {
                    port: self.port_name.clone(),
                })
            }
        };
        match open.port.read(buf) {
            Ok(n) => Ok(n),
            Err(err) if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(source) => Err(LinkError::Io {
                port: self.port_name.clone(),
                source,
            }),
        }
    }
}

/// Owns at most one open serial port for a signal role.
pub struct SerialLink {
    role: SignalRole,
    driver: Arc<dyn PortDriver>,
    settings: LinkSettings,
    session: Arc<Mutex<Session>>,
}

impl SerialLink {
    pub fn new(role: SignalRole, driver: Arc<dyn PortDriver>, settings: LinkSettings) -> Self {
        Self {
            role,
            driver,
            settings,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    pub fn role(&self) -> SignalRole {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        match &lock(&self.session).open {
            Some(open) => ConnectionState::Connected(open.name.clone()),
            None => ConnectionState::Disconnected,
        }
    }

    /// Port names visible to the OS right now. Enumeration failures yield an empty list.
    pub fn list_available_ports(&self) -> Vec<String> {
        self.driver.available_ports().unwrap_or_else(|err| {
            log::warn!("failed to enumerate serial ports: {err}");
            Vec::new()
        })
    }

    pub fn open(&mut self, port_name: &str) -> Result<LinkHandle, LinkError> {
        let mut session = lock(&self.session);
        if let Some(open) = &session.open {
            log::info!("{} link already connected to {}", self.role, open.name);
            return Err(LinkError::AlreadyOpen {
                role: self.role,
                port: open.name.clone(),
            });
        }

        log::info!("connecting {} link to {port_name}", self.role);
        let port = self
            .driver
            .open(port_name, &self.settings)
            .map_err(|source| {
                log::warn!("couldn't connect to {port_name}: {source}");
                LinkError::DeviceUnavailable {
                    port: port_name.to_owned(),
                    source,
                }
            })?;
        session.generation += 1;
        session.open = Some(OpenPort {
            name: port_name.to_owned(),
            port,
        });
        Ok(LinkHandle {
            port_name: port_name.to_owned(),
            generation: session.generation,
            session: Arc::clone(&self.session),
        })
    }

    pub fn close(&mut self, handle: &LinkHandle) -> Result<(), LinkError> {
        let mut session = lock(&self.session);
        if session.open.is_none() {
            return Err(LinkError::NotConnected { role: self.role });
        }
        if !Arc::ptr_eq(&handle.session, &self.session) || handle.generation != session.generation {
            return Err(LinkError::HandleInvalidated {
                port: handle.port_name.clone(),
            });
        }
        if let Some(name) = session.release() {
            log::info!("disconnected {} link from {name}", self.role);
        }
        Ok(())
    }

    /// Probes the open port; a failed probe drops the port and disconnects.
    pub fn check_health(&mut self) -> Result<(), LinkError> {
        let mut session = lock(&self.session);
        let Some(open) = session.open.as_mut() else {
            return Err(LinkError::NotConnected { role: self.role });
        };
        let Err(source) = open.port.probe() else {
            return Ok(());
        };
        let port = session.release().unwrap_or_default();
        log::warn!("{} link on {port} failed health check: {source}", self.role);
        Err(LinkError::ConnectionLost { port, source })
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        lock(&self.session).release();
    }
}
