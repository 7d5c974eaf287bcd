//! Session and Bearer state of the GTPv2-C engine.
//!
//! A [`Session`] is shared between concurrently running handlers as
//! `Arc<Session>`; every accessor takes `&self` and locks internally.

pub mod bearer;
pub mod correlation;
pub mod session;

pub use bearer::{Bearer, BearerInfo, UserPlaneBearer};
pub use correlation::Correlator;
pub use session::{Session, SessionSnapshot, Subscriber, DEFAULT_BEARER};
