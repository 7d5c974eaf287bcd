use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gtpv2_core::{GtpError, Ie, Message, Result};
use gtpv2_dict::IeType;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::bearer::{Bearer, BearerInfo};
use crate::correlation::Correlator;

/// Name under which the default bearer is stored
pub const DEFAULT_BEARER: &str = "default";

/// Subscriber identity of a Session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Subscriber {
    pub imsi: String,
    pub msisdn: String,
    pub imei: String,
    pub mcc: String,
    pub mnc: String,
    pub rat_type: u8,
}

impl Subscriber {
    pub fn new(imsi: impl Into<String>) -> Self {
        Self {
            imsi: imsi.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct SessionState {
    subscriber: Subscriber,
    peer_addr: SocketAddr,
    teids: HashMap<u8, u32>,
    bearers: HashMap<String, Arc<Bearer>>,
    active: bool,
}

/// Serializable view of a Session, for logs and orchestration
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub subscriber: Subscriber,
    pub peer_addr: SocketAddr,
    pub active: bool,
    pub teids: Vec<(u8, u32)>,
    pub bearers: Vec<(String, BearerInfo)>,
}

/// Control-plane context for one subscriber attachment.
///
/// All mutable state sits behind one lock per Session, so handlers racing on
/// the same Session (a retransmitted request, say) serialize on it.
#[derive(Debug)]
pub struct Session {
    state: Mutex<SessionState>,
    correlator: Correlator,
}

impl Session {
    /// Create an inactive Session owning `default_bearer`
    pub fn new(peer_addr: SocketAddr, subscriber: Subscriber, default_bearer: Bearer) -> Self {
        let mut bearers = HashMap::new();
        bearers.insert(DEFAULT_BEARER.to_string(), Arc::new(default_bearer));
        Self {
            state: Mutex::new(SessionState {
                subscriber,
                peer_addr,
                teids: HashMap::new(),
                bearers,
                active: false,
            }),
            correlator: Correlator::new(),
        }
    }

    // ========================================
    // Identity and lifecycle
    // ========================================

    pub fn imsi(&self) -> String {
        self.state.lock().subscriber.imsi.clone()
    }

    pub fn subscriber(&self) -> Subscriber {
        self.state.lock().subscriber.clone()
    }

    pub fn set_subscriber(&self, subscriber: Subscriber) {
        self.state.lock().subscriber = subscriber;
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.state.lock().peer_addr
    }

    pub fn set_peer_addr(&self, addr: SocketAddr) {
        self.state.lock().peer_addr = addr;
    }

    /// Mark the Session active; a Session without an IMSI cannot be
    pub fn activate(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.subscriber.imsi.is_empty() {
            return Err(GtpError::RequiredIeMissing {
                name: "imsi",
                ie_type: IeType::Imsi as u8,
                instance: 0,
            });
        }
        state.active = true;
        Ok(())
    }

    pub fn deactivate(&self) {
        self.state.lock().active = false;
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    // ========================================
    // TEIDs
    // ========================================

    /// Bind `teid` to an F-TEID interface type, replacing any earlier one
    pub fn add_teid(&self, interface_type: u8, teid: u32) {
        self.state.lock().teids.insert(interface_type, teid);
    }

    pub fn get_teid(&self, interface_type: u8) -> Result<u32> {
        self.state
            .lock()
            .teids
            .get(&interface_type)
            .copied()
            .ok_or(GtpError::TeidNotFound(interface_type))
    }

    /// All `(interface type, TEID)` bindings, sorted by interface type
    pub fn teids(&self) -> Vec<(u8, u32)> {
        let mut teids: Vec<_> = self
            .state
            .lock()
            .teids
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect();
        teids.sort_unstable();
        teids
    }

    // ========================================
    // Bearers
    // ========================================

    pub fn add_bearer(&self, name: impl Into<String>, bearer: Bearer) -> Arc<Bearer> {
        let bearer = Arc::new(bearer);
        self.state.lock().bearers.insert(name.into(), bearer.clone());
        bearer
    }

    pub fn remove_bearer(&self, name: &str) -> Option<Arc<Bearer>> {
        self.state.lock().bearers.remove(name)
    }

    pub fn bearer(&self, name: &str) -> Result<Arc<Bearer>> {
        self.state
            .lock()
            .bearers
            .get(name)
            .cloned()
            .ok_or_else(|| GtpError::BearerNotFound(name.to_string()))
    }

    pub fn default_bearer(&self) -> Result<Arc<Bearer>> {
        self.bearer(DEFAULT_BEARER)
    }

    pub fn bearer_by_ebi(&self, ebi: u8) -> Result<Arc<Bearer>> {
        self.state
            .lock()
            .bearers
            .values()
            .find(|b| b.ebi() == ebi)
            .cloned()
            .ok_or_else(|| GtpError::BearerNotFound(format!("ebi {ebi}")))
    }

    pub fn bearers(&self) -> Vec<(String, Arc<Bearer>)> {
        self.state
            .lock()
            .bearers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn bearer_count(&self) -> usize {
        self.state.lock().bearers.len()
    }

    // ========================================
    // IE ingestion
    // ========================================

    /// Populate identity, TEIDs and the default bearer from received IEs.
    ///
    /// IEs the Session does not track are skipped; a tracked IE with a
    /// malformed payload aborts with `InvalidValue`.
    pub fn update_from_ies<'a>(&self, ies: impl IntoIterator<Item = &'a Ie>) -> Result<()> {
        let bearer = self.default_bearer()?;
        let mut state = self.state.lock();

        for ie in ies {
            match IeType::from_u8(ie.ie_type) {
                Some(IeType::Imsi) => state.subscriber.imsi = ie.as_digits()?,
                Some(IeType::Msisdn) => state.subscriber.msisdn = ie.as_digits()?,
                Some(IeType::Mei) => state.subscriber.imei = ie.as_digits()?,
                Some(IeType::ServingNetwork) => {
                    let (mcc, mnc) = ie.as_plmn()?;
                    state.subscriber.mcc = mcc;
                    state.subscriber.mnc = mnc;
                }
                Some(IeType::RatType) => state.subscriber.rat_type = ie.as_u8()?,
                Some(IeType::FTeid) => {
                    let fteid = ie.as_fteid()?;
                    state.teids.insert(fteid.interface_type, fteid.teid);
                }
                Some(IeType::Apn) => bearer.set_apn(ie.as_apn()?),
                Some(IeType::Paa) => bearer.set_subscriber_ip(ie.as_paa()?),
                Some(IeType::BearerContext) if ie.instance() == 0 => {
                    for child in ie.children() {
                        match IeType::from_u8(child.ie_type) {
                            Some(IeType::Ebi) => bearer.set_ebi(child.as_ebi()?),
                            Some(IeType::BearerQos) => bearer.set_qos(child.as_bearer_qos()?),
                            Some(IeType::ChargingId) => {
                                bearer.set_charging_id(child.as_charging_id()?)
                            }
                            _ => {}
                        }
                    }
                }
                _ => debug!(ie_type = ie.ie_type, "IE not tracked by session"),
            }
        }
        Ok(())
    }

    // ========================================
    // Correlation
    // ========================================

    /// Block until the message with `sequence` is passed to this Session
    pub async fn wait_message(&self, sequence: u32, timeout: Duration) -> Result<Message> {
        self.correlator.wait_message(sequence, timeout).await
    }

    /// Deliver `msg` to a unit of work waiting on its sequence number
    pub async fn pass_message(&self, msg: Message, timeout: Duration) -> Result<()> {
        self.correlator.pass_message(msg, timeout).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        let mut teids: Vec<_> = state.teids.iter().map(|(k, v)| (*k, *v)).collect();
        teids.sort_unstable();
        let mut bearers: Vec<_> = state
            .bearers
            .iter()
            .map(|(k, v)| (k.clone(), v.info()))
            .collect();
        bearers.sort_by(|a, b| a.0.cmp(&b.0));
        SessionSnapshot {
            subscriber: state.subscriber.clone(),
            peer_addr: state.peer_addr,
            active: state.active,
            teids,
            bearers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtpv2_core::BearerQos;
    use gtpv2_dict::InterfaceType;
    use std::net::Ipv4Addr;

    fn peer() -> SocketAddr {
        "127.0.0.1:2123".parse().unwrap()
    }

    fn session(imsi: &str) -> Session {
        Session::new(peer(), Subscriber::new(imsi), Bearer::new(5, "", BearerQos::default()))
    }

    #[test]
    fn test_activate_requires_imsi() {
        let s = session("");
        assert!(matches!(
            s.activate(),
            Err(GtpError::RequiredIeMissing { name: "imsi", .. })
        ));
        assert!(!s.is_active());

        let s = session("123451234567890");
        s.activate().unwrap();
        assert!(s.is_active());
        s.deactivate();
        assert!(!s.is_active());
    }

    #[test]
    fn test_teids() {
        let s = session("001");
        s.add_teid(InterfaceType::S11MmeGtpC as u8, 0x10);
        s.add_teid(InterfaceType::S11S4SgwGtpC as u8, 0x20);
        assert_eq!(s.get_teid(InterfaceType::S11MmeGtpC as u8).unwrap(), 0x10);
        assert!(matches!(
            s.get_teid(InterfaceType::S5S8PgwGtpC as u8),
            Err(GtpError::TeidNotFound(7))
        ));
        assert_eq!(s.teids(), vec![(10, 0x10), (11, 0x20)]);
    }

    #[test]
    fn test_bearers() {
        let s = session("001");
        s.add_bearer("dedicated", Bearer::new(6, "ims", BearerQos::default()));
        assert_eq!(s.bearer_count(), 2);
        assert_eq!(s.bearer_by_ebi(6).unwrap().apn(), "ims");
        assert!(s.bearer_by_ebi(9).is_err());
        assert!(s.remove_bearer("dedicated").is_some());
        assert!(matches!(s.bearer("dedicated"), Err(GtpError::BearerNotFound(_))));
    }

    #[test]
    fn test_update_from_ies() {
        let s = session("");
        let qos = BearerQos {
            qci: 9,
            priority_level: 15,
            ..Default::default()
        };
        let ies = vec![
            Ie::imsi("123451234567890").unwrap(),
            Ie::msisdn("8613900000000").unwrap(),
            Ie::serving_network("001", "01").unwrap(),
            Ie::rat_type(6),
            Ie::fteid(
                InterfaceType::S11MmeGtpC as u8,
                0xABCD,
                Some(Ipv4Addr::new(10, 0, 0, 1)),
                None,
            ),
            Ie::apn("internet"),
            Ie::bearer_context(vec![Ie::ebi(5), Ie::bearer_qos(&qos)]),
            Ie::new(200, 0, vec![0u8]),
        ];
        s.update_from_ies(&ies).unwrap();

        let sub = s.subscriber();
        assert_eq!(sub.imsi, "123451234567890");
        assert_eq!(sub.msisdn, "8613900000000");
        assert_eq!((sub.mcc.as_str(), sub.mnc.as_str()), ("001", "01"));
        assert_eq!(sub.rat_type, 6);
        assert_eq!(s.get_teid(InterfaceType::S11MmeGtpC as u8).unwrap(), 0xABCD);

        let bearer = s.default_bearer().unwrap();
        assert_eq!(bearer.apn(), "internet");
        assert_eq!(bearer.ebi(), 5);
        assert_eq!(bearer.qos(), qos);
    }

    #[test]
    fn test_update_rejects_malformed_ie() {
        let s = session("");
        let bad = Ie::new(IeType::FTeid as u8, 0, vec![0x8A]);
        assert!(s.update_from_ies([&bad]).is_err());
    }

    #[test]
    fn test_snapshot_serializes() {
        let s = session("001010000000001");
        s.add_teid(10, 1);
        let snap = s.snapshot();
        assert_eq!(snap.bearers.len(), 1);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("001010000000001"));
    }
}
