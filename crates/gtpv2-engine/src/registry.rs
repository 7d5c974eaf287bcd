use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gtpv2_core::{GtpError, Result};
use gtpv2_dict::IeType;
use gtpv2_metrics::ACTIVE_SESSIONS;
use gtpv2_session::Session;
use prometheus::IntGauge;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Slot of the TEID index
#[derive(Debug, Clone)]
enum TeidEntry {
    /// Held by an outstanding lease, no Session yet
    Reserved(u64),
    Bound(Arc<Session>),
}

/// TEID and IMSI indexes of the Sessions a Connection owns.
///
/// Both maps are only touched through these methods; every concurrently
/// dispatched datagram may read or write them.
pub struct SessionRegistry {
    /// TEID -> Session, for the configured interface types only
    by_teid: DashMap<u32, TeidEntry>,
    /// IMSI -> Session
    by_imsi: DashMap<String, Arc<Session>>,
    indexed_interface_types: Vec<u8>,
    next_token: AtomicU64,
    /// Moved up and down by this registry's own inserts and removals
    active_sessions: IntGauge,
}

impl SessionRegistry {
    pub fn new(indexed_interface_types: Vec<u8>) -> Self {
        Self::with_gauge(indexed_interface_types, ACTIVE_SESSIONS.clone())
    }

    /// Registry reporting its Session count into `active_sessions`
    pub fn with_gauge(indexed_interface_types: Vec<u8>, active_sessions: IntGauge) -> Self {
        Self {
            by_teid: DashMap::new(),
            by_imsi: DashMap::new(),
            indexed_interface_types,
            next_token: AtomicU64::new(1),
            active_sessions,
        }
    }

    pub fn indexed_interface_types(&self) -> &[u8] {
        &self.indexed_interface_types
    }

    /// Index a Session by IMSI and by its TEID of every configured interface type.
    ///
    /// A missing TEID is logged and skipped; the remaining indexes are still
    /// written. A different Session already registered under the same IMSI is
    /// replaced and its TEIDs are unindexed. A Session without IMSI is refused.
    pub fn add(&self, session: Arc<Session>) -> Result<()> {
        let imsi = session.imsi();
        if imsi.is_empty() {
            return Err(GtpError::RequiredIeMissing {
                name: "imsi",
                ie_type: IeType::Imsi as u8,
                instance: 0,
            });
        }

        for &interface_type in &self.indexed_interface_types {
            match session.get_teid(interface_type) {
                Ok(teid) => {
                    self.by_teid.insert(teid, TeidEntry::Bound(session.clone()));
                }
                Err(e) => error!(imsi = %imsi, interface_type, "Cannot index session: {}", e),
            }
        }

        match self.by_imsi.insert(imsi.clone(), session.clone()) {
            None => self.active_sessions.inc(),
            Some(previous) if !Arc::ptr_eq(&previous, &session) => {
                warn!(imsi = %imsi, "Replacing session registered under the same IMSI");
                self.unindex_teids(&previous);
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Drop every index entry pointing at `session`
    pub fn remove(&self, session: &Arc<Session>) {
        self.unindex_teids(session);
        let removed = self
            .by_imsi
            .remove_if(&session.imsi(), |_, s| Arc::ptr_eq(s, session));
        if removed.is_some() {
            self.active_sessions.dec();
        }
    }

    fn unindex_teids(&self, session: &Arc<Session>) {
        for (interface_type, teid) in session.teids() {
            if !self.indexed_interface_types.contains(&interface_type) {
                continue;
            }
            self.by_teid.remove_if(&teid, |_, entry| {
                matches!(entry, TeidEntry::Bound(s) if Arc::ptr_eq(s, session))
            });
        }
    }

    /// Session bound to `teid`, which must belong to `peer`
    pub fn get_by_teid(&self, teid: u32, peer: SocketAddr) -> Result<Arc<Session>> {
        let session = match self.by_teid.get(&teid).as_deref() {
            Some(TeidEntry::Bound(session)) => session.clone(),
            _ => return Err(GtpError::UnknownTeid(teid)),
        };
        if session.peer_addr() != peer {
            return Err(GtpError::InvalidTeid { teid, peer });
        }
        Ok(session)
    }

    pub fn get_by_imsi(&self, imsi: &str) -> Result<Arc<Session>> {
        self.by_imsi
            .get(imsi)
            .map(|s| s.clone())
            .ok_or_else(|| GtpError::UnknownImsi(imsi.to_string()))
    }

    /// Number of Sessions indexed by IMSI
    pub fn count(&self) -> usize {
        self.by_imsi.len()
    }

    pub fn bearer_count(&self) -> usize {
        self.by_imsi.iter().map(|s| s.bearer_count()).sum()
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.by_imsi.iter().map(|s| s.value().clone()).collect()
    }

    pub fn clear(&self) {
        self.active_sessions.sub(self.by_imsi.len() as i64);
        self.by_teid.clear();
        self.by_imsi.clear();
    }

    // ========================================
    // TEID reservation
    // ========================================

    /// Claim `teid` if nothing holds it, returning the reservation token
    pub(crate) fn reserve(&self, teid: u32) -> Option<u64> {
        match self.by_teid.entry(teid) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                slot.insert(TeidEntry::Reserved(token));
                Some(token)
            }
        }
    }

    /// Drop a reservation that was never overwritten by a Session
    pub(crate) fn release(&self, teid: u32, token: u64) -> bool {
        let released = self
            .by_teid
            .remove_if(&teid, |_, entry| matches!(entry, TeidEntry::Reserved(t) if *t == token))
            .is_some();
        if released {
            debug!(teid, "Released unused TEID reservation");
        }
        released
    }

    /// True once a Session is bound to `teid`
    pub fn is_bound(&self, teid: u32) -> bool {
        matches!(
            self.by_teid.get(&teid).as_deref(),
            Some(TeidEntry::Bound(_))
        )
    }

    /// True while `teid` is reserved or bound
    pub fn contains_teid(&self, teid: u32) -> bool {
        self.by_teid.contains_key(&teid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtpv2_core::BearerQos;
    use gtpv2_dict::InterfaceType;
    use gtpv2_session::{Bearer, Subscriber};

    const SGW: u8 = InterfaceType::S11S4SgwGtpC as u8;
    const PGW: u8 = InterfaceType::S5S8PgwGtpC as u8;

    fn peer() -> SocketAddr {
        "127.0.0.1:2123".parse().unwrap()
    }

    fn session(imsi: &str, teids: &[(u8, u32)]) -> Arc<Session> {
        let s = Session::new(peer(), Subscriber::new(imsi), Bearer::new(5, "", BearerQos::default()));
        for (iface, teid) in teids {
            s.add_teid(*iface, *teid);
        }
        Arc::new(s)
    }

    #[test]
    fn test_add_and_lookup() {
        let registry = SessionRegistry::new(vec![SGW, PGW]);
        let s = session("123451234567890", &[(SGW, 0x10), (PGW, 0x20)]);
        registry.add(s.clone()).unwrap();

        assert!(Arc::ptr_eq(&registry.get_by_teid(0x10, peer()).unwrap(), &s));
        assert!(Arc::ptr_eq(&registry.get_by_teid(0x20, peer()).unwrap(), &s));
        assert!(Arc::ptr_eq(&registry.get_by_imsi("123451234567890").unwrap(), &s));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.bearer_count(), 1);

        registry.remove(&s);
        assert!(matches!(registry.get_by_teid(0x10, peer()), Err(GtpError::UnknownTeid(0x10))));
        assert!(registry.get_by_teid(0x20, peer()).is_err());
        assert!(matches!(registry.get_by_imsi("123451234567890"), Err(GtpError::UnknownImsi(_))));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_missing_teid_does_not_abort() {
        let registry = SessionRegistry::new(vec![SGW, PGW]);
        let s = session("001", &[(PGW, 0x20)]);
        registry.add(s).unwrap();
        assert!(registry.get_by_teid(0x20, peer()).is_ok());
        assert!(registry.get_by_imsi("001").is_ok());
    }

    #[test]
    fn test_unindexed_interface_ignored() {
        let registry = SessionRegistry::new(vec![SGW]);
        registry.add(session("001", &[(SGW, 1), (PGW, 2)])).unwrap();
        assert!(registry.get_by_teid(1, peer()).is_ok());
        assert!(registry.get_by_teid(2, peer()).is_err());
    }

    #[test]
    fn test_peer_mismatch_rejected() {
        let registry = SessionRegistry::new(vec![SGW]);
        registry.add(session("001", &[(SGW, 0x30)])).unwrap();
        let other: SocketAddr = "127.0.0.2:2123".parse().unwrap();
        assert!(matches!(
            registry.get_by_teid(0x30, other),
            Err(GtpError::InvalidTeid { teid: 0x30, .. })
        ));
    }

    #[test]
    fn test_reservation_commit_and_release() {
        let registry = SessionRegistry::new(vec![SGW]);

        let token = registry.reserve(0x40).unwrap();
        assert!(registry.reserve(0x40).is_none());
        assert!(registry.contains_teid(0x40));
        assert!(!registry.is_bound(0x40));
        // Reserved entries do not resolve to a Session
        assert!(registry.get_by_teid(0x40, peer()).is_err());

        registry.add(session("001", &[(SGW, 0x40)])).unwrap();
        assert!(registry.is_bound(0x40));
        // Committed: releasing the stale reservation is a no-op
        assert!(!registry.release(0x40, token));
        assert!(registry.get_by_teid(0x40, peer()).is_ok());

        let token = registry.reserve(0x50).unwrap();
        assert!(registry.release(0x50, token));
        assert!(!registry.contains_teid(0x50));
    }

    #[test]
    fn test_remove_leaves_rebound_teid() {
        let registry = SessionRegistry::new(vec![SGW]);
        let old = session("001", &[(SGW, 0x60)]);
        let new = session("002", &[(SGW, 0x60)]);
        registry.add(old.clone()).unwrap();
        registry.add(new.clone()).unwrap();

        registry.remove(&old);
        assert!(Arc::ptr_eq(&registry.get_by_teid(0x60, peer()).unwrap(), &new));
    }

    #[test]
    fn test_same_imsi_replaces_and_unindexes() {
        let registry = SessionRegistry::new(vec![SGW]);
        let first = session("001", &[(SGW, 0x70)]);
        let second = session("001", &[(SGW, 0x71)]);
        registry.add(first.clone()).unwrap();
        registry.add(second.clone()).unwrap();

        assert_eq!(registry.count(), 1);
        assert!(matches!(registry.get_by_teid(0x70, peer()), Err(GtpError::UnknownTeid(0x70))));
        assert!(Arc::ptr_eq(&registry.get_by_teid(0x71, peer()).unwrap(), &second));

        // Removing the replaced Session must not disturb the current one
        registry.remove(&first);
        assert!(registry.get_by_imsi("001").is_ok());

        registry.remove(&second);
        assert!(registry.get_by_teid(0x70, peer()).is_err());
        assert!(registry.get_by_teid(0x71, peer()).is_err());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_empty_imsi_refused() {
        let registry = SessionRegistry::new(vec![SGW]);
        let result = registry.add(session("", &[(SGW, 0x80)]));
        assert!(matches!(result, Err(GtpError::RequiredIeMissing { name: "imsi", .. })));
        assert!(!registry.contains_teid(0x80));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_gauge_shared_between_registries() {
        let gauge = IntGauge::new("test_active_sessions", "Sessions in test registries").unwrap();
        let a = SessionRegistry::with_gauge(vec![SGW], gauge.clone());
        let b = SessionRegistry::with_gauge(vec![SGW], gauge.clone());

        let s1 = session("001", &[(SGW, 1)]);
        a.add(s1.clone()).unwrap();
        b.add(session("002", &[(SGW, 2)])).unwrap();
        assert_eq!(gauge.get(), 2);

        // Re-adding or replacing keeps the count
        a.add(s1.clone()).unwrap();
        a.add(session("001", &[(SGW, 3)])).unwrap();
        assert_eq!(gauge.get(), 2);

        // s1 was replaced, so removing it changes nothing
        a.remove(&s1);
        assert_eq!(gauge.get(), 2);

        b.clear();
        assert_eq!(gauge.get(), 1);
        a.remove(&a.get_by_imsi("001").unwrap());
        assert_eq!(gauge.get(), 0);
    }
}
