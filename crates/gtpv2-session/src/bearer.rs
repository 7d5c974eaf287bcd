use std::net::{IpAddr, SocketAddr};

use gtpv2_core::BearerQos;
use parking_lot::RwLock;
use serde::Serialize;

/// Surface consumed by a user-plane relay.
///
/// The relay forwards encapsulated payloads by TEID; it reads and updates
/// tunnel endpoints through this trait and never touches control-plane state.
pub trait UserPlaneBearer: Send + Sync {
    fn incoming_teid(&self) -> u32;
    fn outgoing_teid(&self) -> u32;
    fn set_outgoing_teid(&self, teid: u32);
    fn remote_address(&self) -> Option<SocketAddr>;
    fn set_remote_address(&self, addr: SocketAddr);
}

/// Point-in-time copy of a bearer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BearerInfo {
    pub ebi: u8,
    pub apn: String,
    pub qos: BearerQos,
    pub subscriber_ip: Option<IpAddr>,
    pub charging_id: u32,
    pub incoming_teid: u32,
    pub outgoing_teid: u32,
    pub remote_addr: Option<SocketAddr>,
}

/// One PDN connection's data flow within a Session
#[derive(Debug, Default)]
pub struct Bearer {
    state: RwLock<BearerInfo>,
}

impl Bearer {
    pub fn new(ebi: u8, apn: impl Into<String>, qos: BearerQos) -> Self {
        Self {
            state: RwLock::new(BearerInfo {
                ebi,
                apn: apn.into(),
                qos,
                ..Default::default()
            }),
        }
    }

    pub fn ebi(&self) -> u8 {
        self.state.read().ebi
    }

    pub fn set_ebi(&self, ebi: u8) {
        self.state.write().ebi = ebi;
    }

    pub fn apn(&self) -> String {
        self.state.read().apn.clone()
    }

    pub fn set_apn(&self, apn: impl Into<String>) {
        self.state.write().apn = apn.into();
    }

    pub fn qos(&self) -> BearerQos {
        self.state.read().qos
    }

    pub fn set_qos(&self, qos: BearerQos) {
        self.state.write().qos = qos;
    }

    pub fn subscriber_ip(&self) -> Option<IpAddr> {
        self.state.read().subscriber_ip
    }

    pub fn set_subscriber_ip(&self, ip: IpAddr) {
        self.state.write().subscriber_ip = Some(ip);
    }

    pub fn charging_id(&self) -> u32 {
        self.state.read().charging_id
    }

    pub fn set_charging_id(&self, id: u32) {
        self.state.write().charging_id = id;
    }

    pub fn set_incoming_teid(&self, teid: u32) {
        self.state.write().incoming_teid = teid;
    }

    pub fn info(&self) -> BearerInfo {
        self.state.read().clone()
    }
}

impl UserPlaneBearer for Bearer {
    fn incoming_teid(&self) -> u32 {
        self.state.read().incoming_teid
    }

    fn outgoing_teid(&self) -> u32 {
        self.state.read().outgoing_teid
    }

    fn set_outgoing_teid(&self, teid: u32) {
        self.state.write().outgoing_teid = teid;
    }

    fn remote_address(&self) -> Option<SocketAddr> {
        self.state.read().remote_addr
    }

    fn set_remote_address(&self, addr: SocketAddr) {
        self.state.write().remote_addr = Some(addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_user_plane_surface() {
        let bearer = Arc::new(Bearer::new(5, "internet", BearerQos::default()));
        bearer.set_incoming_teid(0x100);

        let relay: Arc<dyn UserPlaneBearer> = bearer.clone();
        relay.set_outgoing_teid(0x200);
        relay.set_remote_address("192.0.2.1:2152".parse().unwrap());

        assert_eq!(relay.incoming_teid(), 0x100);
        assert_eq!(bearer.outgoing_teid(), 0x200);
        assert_eq!(
            bearer.info().remote_addr,
            Some("192.0.2.1:2152".parse().unwrap())
        );
    }

    #[test]
    fn test_bearer_fields() {
        let bearer = Bearer::default();
        bearer.set_ebi(6);
        bearer.set_apn("ims");
        bearer.set_charging_id(42);
        bearer.set_subscriber_ip("10.45.0.2".parse().unwrap());

        let info = bearer.info();
        assert_eq!(info.ebi, 6);
        assert_eq!(info.apn, "ims");
        assert_eq!(info.charging_id, 42);
        assert_eq!(bearer.subscriber_ip(), Some("10.45.0.2".parse().unwrap()));
    }
}
