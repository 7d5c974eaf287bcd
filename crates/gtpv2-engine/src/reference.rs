//! Reference handlers for the gateway side of S11/S5-S8.
//!
//! They show the intended use of the engine: decode the fields a procedure
//! needs, update Session state through the registries and answer with
//! [`Connection::respond_to`]. Nodes with different policies register their
//! own handlers instead.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use gtpv2_core::{FTeid, GtpError, Ie, Message, Result};
use gtpv2_dict::{Cause, IeType, InterfaceType, MessageType};
use gtpv2_session::{Bearer, Session, Subscriber, UserPlaneBearer};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::handler::{handler, HandlerFn};

/// GTP-U port used for bearer remote addresses
pub const GTPU_PORT: u16 = 2152;

/// Create Session, Modify Bearer and Delete Session Request handlers
pub fn reference_handlers() -> Vec<(u8, HandlerFn)> {
    vec![
        (
            MessageType::CreateSessionRequest as u8,
            handler(handle_create_session_request),
        ),
        (
            MessageType::ModifyBearerRequest as u8,
            handler(handle_modify_bearer_request),
        ),
        (
            MessageType::DeleteSessionRequest as u8,
            handler(handle_delete_session_request),
        ),
    ]
}

/// Handler handing a message to the Session waiting on its sequence number.
///
/// The Session is looked up by header TEID and peer; the hand-off gives up
/// after `timeout`.
pub fn pass_to_session(timeout: Duration) -> HandlerFn {
    handler(move |conn: Arc<Connection>, peer: SocketAddr, msg: Message| async move {
        let teid = msg.teid().unwrap_or(0);
        let session = conn.get_session_by_teid(teid, peer)?;
        debug!(imsi = %session.imsi(), seq = msg.sequence(), "Passing message to session");
        session.pass_message(msg, timeout).await
    })
}

/// Answer `request` with a response of `response_type` carrying only a Cause
async fn reject(
    conn: &Connection,
    peer: SocketAddr,
    request: &Message,
    response_type: MessageType,
    teid: u32,
    error: GtpError,
) -> Result<()> {
    let cause = error.to_cause();
    warn!(%peer, cause, msg_type = request.name(), "Rejecting request: {}", error);
    let response = Message::new(response_type, teid, request.sequence(), vec![Ie::cause(cause)]);
    conn.respond_to(peer, request, response).await?;
    Err(error)
}

/// TEID the peer asked us to use towards it: the counterpart of our own
/// interface for `local_teid`
fn peer_teid(session: &Session, local_teid: u32) -> u32 {
    session
        .teids()
        .into_iter()
        .find(|(_, teid)| *teid == local_teid)
        .and_then(|(iface, _)| InterfaceType::from_u8(iface))
        .and_then(|iface| session.get_teid(iface.counterpart() as u8).ok())
        .unwrap_or(0)
}

/// Answer a Create Session Request with Request Accepted and our F-TEID
async fn accept_create_session(
    conn: &Connection,
    peer: SocketAddr,
    request: &Message,
    session: &Session,
    sender_teid: u32,
    local_fteid: Ie,
) -> Result<()> {
    let bearer = session.default_bearer()?;
    let response = Message::create_session_response(
        sender_teid,
        request.sequence(),
        vec![
            Ie::cause(Cause::RequestAccepted as u8),
            local_fteid,
            Ie::bearer_context(vec![
                Ie::ebi(bearer.ebi()),
                Ie::cause(Cause::RequestAccepted as u8),
            ]),
        ],
    );
    conn.respond_to(peer, request, response).await
}

fn local_fteid(conn: &Connection, interface_type: u8, teid: u32) -> Ie {
    match conn.local_addr().ip() {
        IpAddr::V4(v4) => Ie::fteid(interface_type, teid, Some(v4), None),
        IpAddr::V6(v6) => Ie::fteid(interface_type, teid, None, Some(v6)),
    }
}

/// Session from the same peer and sender F-TEID as `sender`, i.e. the
/// target of a retransmitted request
fn retransmitted(conn: &Connection, peer: SocketAddr, imsi: &str, sender: &FTeid) -> Option<Arc<Session>> {
    conn.get_session_by_imsi(imsi).ok().filter(|existing| {
        existing.peer_addr() == peer
            && existing.get_teid(sender.interface_type).ok() == Some(sender.teid)
    })
}

/// Create, activate and register a Session, then answer Request Accepted.
///
/// A retransmission is answered again from the Session it created. A new
/// request for an IMSI already registered replaces the old Session.
pub async fn handle_create_session_request(
    conn: Arc<Connection>,
    peer: SocketAddr,
    msg: Message,
) -> Result<()> {
    let rsp_type = MessageType::CreateSessionResponse;

    let sender = match msg.require("sender_fteid").and_then(Ie::as_fteid) {
        Ok(fteid) => fteid,
        Err(e) => return reject(&conn, peer, &msg, rsp_type, 0, e).await,
    };
    if let Err(e) = msg.require("imsi") {
        return reject(&conn, peer, &msg, rsp_type, sender.teid, e).await;
    }

    let session = Arc::new(Session::new(peer, Subscriber::default(), Bearer::default()));
    if let Err(e) = session.update_from_ies(msg.ies()).and_then(|_| session.activate()) {
        return reject(&conn, peer, &msg, rsp_type, sender.teid, e).await;
    }

    let local_iface = InterfaceType::from_u8(sender.interface_type)
        .map(|i| i.counterpart())
        .unwrap_or(InterfaceType::S11S4SgwGtpC) as u8;

    if let Some(existing) = retransmitted(&conn, peer, &session.imsi(), &sender) {
        if let Ok(local_teid) = existing.get_teid(local_iface) {
            debug!(imsi = %existing.imsi(), teid = local_teid, %peer, "Answering retransmitted request");
            let fteid = local_fteid(&conn, local_iface, local_teid);
            return accept_create_session(&conn, peer, &msg, &existing, sender.teid, fteid).await;
        }
    }

    let lease = match conn.new_local_fteid(local_iface) {
        Ok(lease) => lease,
        Err(e) => return reject(&conn, peer, &msg, rsp_type, sender.teid, e).await,
    };
    session.add_teid(local_iface, lease.teid());
    session.default_bearer()?.set_incoming_teid(lease.teid());
    if let Err(e) = conn.add_session(session.clone()) {
        return reject(&conn, peer, &msg, rsp_type, sender.teid, e).await;
    }

    accept_create_session(&conn, peer, &msg, &session, sender.teid, lease.ie()).await?;

    info!(
        imsi = %session.imsi(),
        teid = lease.teid(),
        %peer,
        "Session created"
    );
    Ok(())
}

/// Point bearers at the user-plane endpoints in Bearer Contexts to be modified
pub async fn handle_modify_bearer_request(
    conn: Arc<Connection>,
    peer: SocketAddr,
    msg: Message,
) -> Result<()> {
    let rsp_type = MessageType::ModifyBearerResponse;
    let local_teid = msg.teid().unwrap_or(0);
    let session = match conn.get_session_by_teid(local_teid, peer) {
        Ok(session) => session,
        Err(e) => return reject(&conn, peer, &msg, rsp_type, 0, e).await,
    };
    let remote_teid = peer_teid(&session, local_teid);
    if !session.is_active() {
        let e = GtpError::InactiveSession(session.imsi());
        return reject(&conn, peer, &msg, rsp_type, remote_teid, e).await;
    }

    let mut modified = Vec::new();
    for bc in msg.find_all(IeType::BearerContext as u8, 0) {
        let Some(ebi) = bc.find(IeType::Ebi as u8, 0) else {
            continue;
        };
        let ebi = ebi.as_ebi()?;
        let bearer = match session.bearer_by_ebi(ebi) {
            Ok(bearer) => bearer,
            Err(e) => return reject(&conn, peer, &msg, rsp_type, remote_teid, e).await,
        };
        for child in bc.find_all(IeType::FTeid as u8) {
            let fteid = child.as_fteid()?;
            bearer.set_outgoing_teid(fteid.teid);
            if let Some(ip) = fteid.ip() {
                bearer.set_remote_address(SocketAddr::new(ip, GTPU_PORT));
            }
        }
        modified.push(Ie::bearer_context(vec![
            Ie::ebi(ebi),
            Ie::cause(Cause::RequestAccepted as u8),
        ]));
    }

    let mut ies = vec![Ie::cause(Cause::RequestAccepted as u8)];
    ies.extend(modified);
    let response = Message::modify_bearer_response(remote_teid, msg.sequence(), ies);
    conn.respond_to(peer, &msg, response).await?;

    debug!(imsi = %session.imsi(), "Bearers modified");
    Ok(())
}

/// Unregister and deactivate the Session, then answer Request Accepted
pub async fn handle_delete_session_request(
    conn: Arc<Connection>,
    peer: SocketAddr,
    msg: Message,
) -> Result<()> {
    let local_teid = msg.teid().unwrap_or(0);
    let session = match conn.get_session_by_teid(local_teid, peer) {
        Ok(session) => session,
        Err(e) => {
            return reject(&conn, peer, &msg, MessageType::DeleteSessionResponse, 0, e).await
        }
    };

    let response = Message::delete_session_response(
        peer_teid(&session, local_teid),
        msg.sequence(),
        vec![Ie::cause(Cause::RequestAccepted as u8)],
    );
    conn.remove_session(&session);
    session.deactivate();
    info!(imsi = %session.imsi(), %peer, "Session deleted");

    conn.respond_to(peer, &msg, response).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtpv2_core::BearerQos;

    #[test]
    fn test_peer_teid_uses_counterpart() {
        let session = Session::new(
            "127.0.0.1:2123".parse().unwrap(),
            Subscriber::new("001"),
            Bearer::new(5, "", BearerQos::default()),
        );
        session.add_teid(InterfaceType::S11MmeGtpC as u8, 0xAAAA);
        session.add_teid(InterfaceType::S11S4SgwGtpC as u8, 0xBBBB);

        assert_eq!(peer_teid(&session, 0xBBBB), 0xAAAA);
        assert_eq!(peer_teid(&session, 0xAAAA), 0xBBBB);
        assert_eq!(peer_teid(&session, 0xCCCC), 0);
    }

    #[test]
    fn test_reference_set() {
        let handlers = reference_handlers();
        let types: Vec<u8> = handlers.iter().map(|(t, _)| *t).collect();
        assert_eq!(types, vec![32, 34, 36]);
    }
}
