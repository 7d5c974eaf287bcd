//! GTPv2-C connection engine.
//!
//! A [`Connection`] owns a packet socket, a message type -> handler table
//! and the TEID/IMSI registries of the Sessions created over it. Inbound
//! datagrams are decoded and dispatched concurrently, one task each.

pub mod allocator;
pub mod connection;
pub mod handler;
pub mod hook;
pub mod reference;
pub mod registry;

pub use allocator::FTeidLease;
pub use connection::{Connection, MAX_RECV_ERRORS};
pub use handler::{default_handlers, handler, HandlerFn, HandlerTable};
pub use hook::{DispatchFailure, ErrorHook};
pub use reference::{pass_to_session, reference_handlers};
pub use registry::SessionRegistry;
