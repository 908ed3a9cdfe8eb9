//! Relay Protocol - Wire records for relay communication
//!
//! This crate provides the record types exchanged between chat clients
//! and the relay daemon, and the JSON codec that turns transport payloads
//! into records and back.

pub mod codec;
pub mod record;

pub use codec::{
    decode_client, decode_client_bytes, encode_client, encode_server, DecodeError, EncodeError,
};
pub use record::{ClientRecord, ServerRecord, JOIN_SUFFIX, LEAVE_SUFFIX, LOGIN_REJECTED};
