use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::BoxFuture;
use gtpv2_core::{Message, Result};
use gtpv2_dict::{IeType, MessageType};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::connection::Connection;

/// Reaction of a Connection to one inbound message type
pub type HandlerFn =
    Arc<dyn Fn(Arc<Connection>, SocketAddr, Message) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wrap an async fn or closure as a [`HandlerFn`]
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Arc<Connection>, SocketAddr, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |conn, peer, msg| Box::pin(f(conn, peer, msg)))
}

/// Handlers every Connection starts with: Echo Request, Echo Response and
/// Version Not Supported Indication
pub fn default_handlers() -> HashMap<u8, HandlerFn> {
    let mut handlers = HashMap::new();
    handlers.insert(MessageType::EchoRequest as u8, handler(handle_echo_request));
    handlers.insert(MessageType::EchoResponse as u8, handler(handle_echo_response));
    handlers.insert(
        MessageType::VersionNotSupportedIndication as u8,
        handler(handle_version_not_supported),
    );
    handlers
}

async fn handle_echo_request(conn: Arc<Connection>, peer: SocketAddr, msg: Message) -> Result<()> {
    conn.echo_response(peer, &msg).await
}

async fn handle_echo_response(_conn: Arc<Connection>, peer: SocketAddr, msg: Message) -> Result<()> {
    let recovery = msg
        .get(IeType::Recovery as u8, 0)
        .and_then(|ie| ie.as_recovery().ok());
    debug!(%peer, seq = msg.sequence(), ?recovery, "Echo Response received");
    Ok(())
}

async fn handle_version_not_supported(
    _conn: Arc<Connection>,
    peer: SocketAddr,
    msg: Message,
) -> Result<()> {
    warn!(%peer, seq = msg.sequence(), "Peer does not support GTPv2");
    Ok(())
}

/// Message type -> handler table owned by one Connection
pub struct HandlerTable {
    defaults: HashMap<u8, HandlerFn>,
    handlers: RwLock<HashMap<u8, HandlerFn>>,
}

impl HandlerTable {
    /// Table seeded with `defaults`; [`HandlerTable::reset`] returns to them
    pub fn new(defaults: HashMap<u8, HandlerFn>) -> Self {
        Self {
            handlers: RwLock::new(defaults.clone()),
            defaults,
        }
    }

    /// Register or replace the handler for a message type
    pub fn register(&self, message_type: u8, handler: HandlerFn) {
        self.handlers.write().insert(message_type, handler);
    }

    pub fn register_all(&self, handlers: impl IntoIterator<Item = (u8, HandlerFn)>) {
        self.handlers.write().extend(handlers);
    }

    pub fn get(&self, message_type: u8) -> Option<HandlerFn> {
        self.handlers.read().get(&message_type).cloned()
    }

    pub fn contains(&self, message_type: u8) -> bool {
        self.handlers.read().contains_key(&message_type)
    }

    /// Forget registrations and go back to the default set
    pub fn reset(&self) {
        *self.handlers.write() = self.defaults.clone();
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new(default_handlers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> HandlerFn {
        handler(|_conn, _peer, _msg| async { Ok(()) })
    }

    #[test]
    fn test_defaults_present() {
        let table = HandlerTable::default();
        assert_eq!(table.len(), 3);
        assert!(table.contains(MessageType::EchoRequest as u8));
        assert!(table.contains(MessageType::EchoResponse as u8));
        assert!(table.contains(MessageType::VersionNotSupportedIndication as u8));
        assert!(!table.contains(MessageType::CreateSessionRequest as u8));
    }

    #[test]
    fn test_register_and_reset() {
        let table = HandlerTable::default();
        table.register(MessageType::CreateSessionRequest as u8, noop());
        table.register_all([(250u8, noop()), (251u8, noop())]);
        assert_eq!(table.len(), 6);
        assert!(table.get(250).is_some());

        table.reset();
        assert_eq!(table.len(), 3);
        assert!(table.get(MessageType::CreateSessionRequest as u8).is_none());
    }

    #[test]
    fn test_tables_are_independent() {
        let a = HandlerTable::default();
        let b = HandlerTable::default();
        a.register(MessageType::CreateSessionRequest as u8, noop());
        assert!(!b.contains(MessageType::CreateSessionRequest as u8));
    }

    #[test]
    fn test_empty_defaults() {
        let table = HandlerTable::new(HashMap::new());
        assert!(table.is_empty());
    }
}
