use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use gtpv2_core::{GtpError, Ie, Result};
use tracing::debug;

use crate::registry::SessionRegistry;

/// A TEID reserved in a Connection's registry, wrapped in its F-TEID IE.
///
/// The reservation is committed when a Session holding the TEID for an
/// indexed interface type is registered. Dropping the lease before that
/// releases the TEID again.
pub struct FTeidLease {
    registry: Arc<SessionRegistry>,
    teid: u32,
    token: u64,
    ie: Ie,
}

impl FTeidLease {
    pub fn teid(&self) -> u32 {
        self.teid
    }

    /// F-TEID IE with instance 0
    pub fn ie(&self) -> Ie {
        self.ie.clone()
    }

    pub fn interface_type(&self) -> u8 {
        self.ie.payload()[0] & 0x3F
    }

    /// True once a Session has taken over the TEID
    pub fn is_committed(&self) -> bool {
        self.registry.is_bound(self.teid)
    }
}

impl Drop for FTeidLease {
    fn drop(&mut self) {
        self.registry.release(self.teid, self.token);
    }
}

impl std::fmt::Debug for FTeidLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FTeidLease")
            .field("teid", &self.teid)
            .field("committed", &self.is_committed())
            .finish()
    }
}

/// Reserve a random nonzero TEID, retrying up to `attempts` times on collision
pub(crate) fn allocate(
    registry: &Arc<SessionRegistry>,
    interface_type: u8,
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<Ipv6Addr>,
    attempts: usize,
) -> Result<FTeidLease> {
    for _ in 0..attempts {
        let teid = rand::random::<u32>();
        if teid == 0 {
            continue;
        }
        if let Some(token) = registry.reserve(teid) {
            debug!(teid, interface_type, "Reserved TEID");
            return Ok(FTeidLease {
                registry: registry.clone(),
                teid,
                token,
                ie: Ie::fteid(interface_type, teid, ipv4, ipv6),
            });
        }
    }
    Err(GtpError::TeidExhausted(attempts))
}
