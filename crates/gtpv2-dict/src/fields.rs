use crate::ie_type::IeType;
use crate::message_type::MessageType;

/// Presence requirement of an IE within a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Mandatory,
    Conditional,
    Optional,
}

/// One named slot of a message: the `(IE type, instance)` pair it accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ie_type: u8,
    pub instance: u8,
    pub presence: Presence,
}

const fn field(name: &'static str, ie_type: IeType, instance: u8, presence: Presence) -> FieldSpec {
    FieldSpec {
        name,
        ie_type: ie_type as u8,
        instance,
        presence,
    }
}

use Presence::{Conditional as C, Mandatory as M, Optional as O};

// Tables are listed in TS 29.274 order; encoding follows table order.

const ECHO_REQUEST: &[FieldSpec] = &[
    field("recovery", IeType::Recovery, 0, M),
    field("sending_node_features", IeType::NodeFeatures, 0, O),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const ECHO_RESPONSE: &[FieldSpec] = &[
    field("recovery", IeType::Recovery, 0, M),
    field("sending_node_features", IeType::NodeFeatures, 0, O),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const CREATE_SESSION_REQUEST: &[FieldSpec] = &[
    field("imsi", IeType::Imsi, 0, C),
    field("msisdn", IeType::Msisdn, 0, C),
    field("mei", IeType::Mei, 0, C),
    field("uli", IeType::Uli, 0, C),
    field("serving_network", IeType::ServingNetwork, 0, C),
    field("rat_type", IeType::RatType, 0, M),
    field("indication", IeType::Indication, 0, C),
    field("sender_fteid", IeType::FTeid, 0, M),
    field("pgw_s5s8_fteid", IeType::FTeid, 1, C),
    field("apn", IeType::Apn, 0, M),
    field("selection_mode", IeType::SelectionMode, 0, C),
    field("pdn_type", IeType::PdnType, 0, C),
    field("paa", IeType::Paa, 0, C),
    field("apn_restriction", IeType::ApnRestriction, 0, C),
    field("ambr", IeType::Ambr, 0, C),
    field("linked_ebi", IeType::Ebi, 0, C),
    field("pco", IeType::Pco, 0, C),
    field("bearer_contexts_to_be_created", IeType::BearerContext, 0, M),
    field("bearer_contexts_to_be_removed", IeType::BearerContext, 1, C),
    field("recovery", IeType::Recovery, 0, C),
    field("charging_characteristics", IeType::ChargingCharacteristics, 0, C),
    field("ue_time_zone", IeType::UeTimeZone, 0, C),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const CREATE_SESSION_RESPONSE: &[FieldSpec] = &[
    field("cause", IeType::Cause, 0, M),
    field("change_reporting_action", IeType::ChangeReportingAction, 0, C),
    field("sender_fteid", IeType::FTeid, 0, C),
    field("pgw_s5s8_fteid", IeType::FTeid, 1, C),
    field("paa", IeType::Paa, 0, C),
    field("apn_restriction", IeType::ApnRestriction, 0, C),
    field("ambr", IeType::Ambr, 0, C),
    field("linked_ebi", IeType::Ebi, 0, C),
    field("pco", IeType::Pco, 0, C),
    field("bearer_contexts_created", IeType::BearerContext, 0, C),
    field("bearer_contexts_marked_for_removal", IeType::BearerContext, 1, C),
    field("recovery", IeType::Recovery, 0, C),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const MODIFY_BEARER_REQUEST: &[FieldSpec] = &[
    field("mei", IeType::Mei, 0, C),
    field("uli", IeType::Uli, 0, C),
    field("serving_network", IeType::ServingNetwork, 0, C),
    field("rat_type", IeType::RatType, 0, C),
    field("indication", IeType::Indication, 0, C),
    field("sender_fteid", IeType::FTeid, 0, C),
    field("ambr", IeType::Ambr, 0, C),
    field("delay_value", IeType::DelayValue, 0, C),
    field("bearer_contexts_to_be_modified", IeType::BearerContext, 0, C),
    field("bearer_contexts_to_be_removed", IeType::BearerContext, 1, C),
    field("recovery", IeType::Recovery, 0, C),
    field("ue_time_zone", IeType::UeTimeZone, 0, C),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const MODIFY_BEARER_RESPONSE: &[FieldSpec] = &[
    field("cause", IeType::Cause, 0, M),
    field("msisdn", IeType::Msisdn, 0, C),
    field("linked_ebi", IeType::Ebi, 0, C),
    field("apn_restriction", IeType::ApnRestriction, 0, C),
    field("pco", IeType::Pco, 0, C),
    field("bearer_contexts_modified", IeType::BearerContext, 0, C),
    field("bearer_contexts_marked_for_removal", IeType::BearerContext, 1, C),
    field("change_reporting_action", IeType::ChangeReportingAction, 0, C),
    field("recovery", IeType::Recovery, 0, C),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const DELETE_SESSION_REQUEST: &[FieldSpec] = &[
    field("cause", IeType::Cause, 0, C),
    field("linked_ebi", IeType::Ebi, 0, C),
    field("uli", IeType::Uli, 0, C),
    field("indication", IeType::Indication, 0, C),
    field("pco", IeType::Pco, 0, C),
    field("sender_fteid", IeType::FTeid, 0, C),
    field("ue_time_zone", IeType::UeTimeZone, 0, C),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const DELETE_SESSION_RESPONSE: &[FieldSpec] = &[
    field("cause", IeType::Cause, 0, M),
    field("recovery", IeType::Recovery, 0, C),
    field("pco", IeType::Pco, 0, C),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const CREATE_BEARER_REQUEST: &[FieldSpec] = &[
    field("pti", IeType::Pti, 0, C),
    field("linked_ebi", IeType::Ebi, 0, M),
    field("pco", IeType::Pco, 0, O),
    field("bearer_contexts", IeType::BearerContext, 0, M),
    field("indication", IeType::Indication, 0, C),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const CREATE_BEARER_RESPONSE: &[FieldSpec] = &[
    field("cause", IeType::Cause, 0, M),
    field("bearer_contexts", IeType::BearerContext, 0, M),
    field("recovery", IeType::Recovery, 0, C),
    field("pco", IeType::Pco, 0, C),
    field("ue_time_zone", IeType::UeTimeZone, 0, O),
    field("uli", IeType::Uli, 0, O),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const DELETE_BEARER_REQUEST: &[FieldSpec] = &[
    field("linked_ebi", IeType::Ebi, 0, C),
    field("ebis", IeType::Ebi, 1, C),
    field("failed_bearer_contexts", IeType::BearerContext, 0, O),
    field("pti", IeType::Pti, 0, C),
    field("pco", IeType::Pco, 0, C),
    field("cause", IeType::Cause, 0, O),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const DELETE_BEARER_RESPONSE: &[FieldSpec] = &[
    field("cause", IeType::Cause, 0, M),
    field("linked_ebi", IeType::Ebi, 0, C),
    field("bearer_contexts", IeType::BearerContext, 0, C),
    field("recovery", IeType::Recovery, 0, C),
    field("pco", IeType::Pco, 0, C),
    field("ue_time_zone", IeType::UeTimeZone, 0, O),
    field("uli", IeType::Uli, 0, O),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const RELEASE_ACCESS_BEARERS_REQUEST: &[FieldSpec] = &[
    field("ebis_to_be_released", IeType::Ebi, 0, C),
    field("indication", IeType::Indication, 0, O),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

const RELEASE_ACCESS_BEARERS_RESPONSE: &[FieldSpec] = &[
    field("cause", IeType::Cause, 0, M),
    field("recovery", IeType::Recovery, 0, O),
    field("indication", IeType::Indication, 0, O),
    field("private_extension", IeType::PrivateExtension, 0, O),
];

/// Field table for a message type.
///
/// Messages without named fields (Version Not Supported Indication) get an
/// empty table, so every IE they carry lands in the overflow list.
pub fn field_table(message_type: MessageType) -> &'static [FieldSpec] {
    match message_type {
        MessageType::EchoRequest => ECHO_REQUEST,
        MessageType::EchoResponse => ECHO_RESPONSE,
        MessageType::VersionNotSupportedIndication => &[],
        MessageType::CreateSessionRequest => CREATE_SESSION_REQUEST,
        MessageType::CreateSessionResponse => CREATE_SESSION_RESPONSE,
        MessageType::ModifyBearerRequest => MODIFY_BEARER_REQUEST,
        MessageType::ModifyBearerResponse => MODIFY_BEARER_RESPONSE,
        MessageType::DeleteSessionRequest => DELETE_SESSION_REQUEST,
        MessageType::DeleteSessionResponse => DELETE_SESSION_RESPONSE,
        MessageType::CreateBearerRequest => CREATE_BEARER_REQUEST,
        MessageType::CreateBearerResponse => CREATE_BEARER_RESPONSE,
        MessageType::DeleteBearerRequest => DELETE_BEARER_REQUEST,
        MessageType::DeleteBearerResponse => DELETE_BEARER_RESPONSE,
        MessageType::ReleaseAccessBearersRequest => RELEASE_ACCESS_BEARERS_REQUEST,
        MessageType::ReleaseAccessBearersResponse => RELEASE_ACCESS_BEARERS_RESPONSE,
    }
}

/// Position of the slot accepting `(ie_type, instance)` in a table
pub fn slot_of(table: &[FieldSpec], ie_type: u8, instance: u8) -> Option<usize> {
    table
        .iter()
        .position(|f| f.ie_type == ie_type && f.instance == instance)
}
