use std::sync::Arc;

use crate::config::{LinkSettings, PortMap};
use crate::drivers::{LinkError, LinkHandle, PortDriver, SerialLink, SystemPorts};
use crate::types::{ConnectionState, SignalRole};

/// One [`SerialLink`] per signal role.
pub struct LinkRegistry {
    eeg: SerialLink,
    ekg: SerialLink,
}

impl LinkRegistry {
    pub fn new(driver: Arc<dyn PortDriver>, settings: LinkSettings) -> Self {
        Self {
            eeg: SerialLink::new(SignalRole::Eeg, Arc::clone(&driver), settings),
            ekg: SerialLink::new(SignalRole::Ekg, driver, settings),
        }
    }

    pub fn system(settings: LinkSettings) -> Self {
        Self::new(Arc::new(SystemPorts), settings)
    }

    pub fn link(&self, role: SignalRole) -> &SerialLink {
        match role {
            SignalRole::Eeg => &self.eeg,
            SignalRole::Ekg => &self.ekg,
        }
    }

    fn link_mut(&mut self, role: SignalRole) -> &mut SerialLink {
        match role {
            SignalRole::Eeg => &mut self.eeg,
            SignalRole::Ekg => &mut self.ekg,
        }
    }

    pub fn state(&self, role: SignalRole) -> ConnectionState {
        self.link(role).state()
    }

    pub fn list_available_ports(&self) -> Vec<String> {
        self.eeg.list_available_ports()
    }

    /// Connects `role` to the port configured for it.
    pub fn connect(&mut self, role: SignalRole, ports: &PortMap) -> Result<LinkHandle, LinkError> {
        let port_name = ports.port_for(role)?.to_owned();
        self.connect_to(role, &port_name)
    }

    /// Like [`connect`](Self::connect), but when `role` has no configured port
    /// and the OS reports exactly one serial port, connects to that one.
    pub fn connect_or_detect(
        &mut self,
        role: SignalRole,
        ports: &PortMap,
    ) -> Result<LinkHandle, LinkError> {
        let missing = match ports.port_for(role) {
            Ok(port_name) => return self.connect_to(role, port_name),
            Err(err) => err,
        };
        match self.list_available_ports().as_slice() {
            [only] => {
                log::info!("no port configured for {role}, using the only one found: {only}");
                self.connect_to(role, only)
            }
            _ => Err(missing),
        }
    }

    /// Connects `role` to an explicitly chosen port.
    pub fn connect_to(&mut self, role: SignalRole, port_name: &str) -> Result<LinkHandle, LinkError> {
        if self.state(role).is_connected() {
            // let the link report AlreadyOpen
            return self.link_mut(role).open(port_name);
        }
        for other in SignalRole::ALL.into_iter().filter(|r| *r != role) {
            if let ConnectionState::Connected(held) = self.state(other) {
                if held == port_name {
                    return Err(LinkError::PortClaimed {
                        port: held,
                        holder: other,
                    });
                }
            }
        }
        self.link_mut(role).open(port_name)
    }

    pub fn disconnect(&mut self, role: SignalRole, handle: &LinkHandle) -> Result<(), LinkError> {
        self.link_mut(role).close(handle)
    }

    pub fn check_health(&mut self, role: SignalRole) -> Result<(), LinkError> {
        self.link_mut(role).check_health()
    }
}
