//! Collaborator seams.
//!
//! Every network dependency sits behind one of these traits so the
//! controller and the workflow commands never see a URL. Calls are
//! fire-and-forget: no retry, no backoff, and a failed call must leave local
//! state exactly as it was so the user can retry by hand.
//!
//! The collaborators answer in inconsistent shapes: a bare array, a
//! `{"data": ...}` wrapper, or a single object depending on the endpoint and
//! deployment. `Envelope` normalizes all of them in one untagged
//! deserialization step at the boundary, before anything enters the
//! controller.

pub mod http;

use crate::schema::{SignedStatus, WorkOrder};
use crate::signature::SignaturePayload;
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Read/write access to the persisted order snapshot.
pub trait OrderService {
    /// Fetch the full current snapshot.
    fn fetch(&self, order_id: &str) -> Result<WorkOrder>;

    /// Write the full snapshot. `close` marks the terminal transition; the
    /// collaborator treats it as an explicit flag, not a status string.
    fn store(&self, order: &WorkOrder, close: bool) -> Result<()>;
}

/// One-time-code dispatch and validation.
pub trait OtpService {
    /// Dispatch a code out of band to the client on record.
    fn generate(&self, cedula: &str, email: &str) -> Result<()>;

    /// Check a code the client read back. `Ok(false)` is a wrong code, not
    /// an error.
    fn validate(&self, cedula: &str, code: &str) -> Result<bool>;
}

/// Signature evidence storage.
pub trait SignatureService {
    fn signed_status(&self, order_id: &str) -> Result<SignedStatus>;
    fn submit(&self, payload: &SignaturePayload) -> Result<()>;
}

/// Raw hardware-report upload tied to an equipment identifier. Independent
/// of the local preview pipeline.
pub trait ReportUpload {
    fn upload(&self, equipment_id: &str, file_name: &str, bytes: &[u8]) -> Result<()>;
}

/// The response shapes collaborators actually send. Tried in order:
/// wrapped-many, wrapped-one, bare array, single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    WrappedMany { data: Vec<T> },
    WrappedOne { data: T },
    Many(Vec<T>),
    One(T),
}

impl<T: DeserializeOwned> Envelope<T> {
    /// The single record a lookup endpoint is expected to return, or `None`
    /// when the collaborator answered with an empty collection.
    pub fn into_first(self) -> Option<T> {
        match self {
            Envelope::WrappedMany { data } | Envelope::Many(data) => data.into_iter().next(),
            Envelope::WrappedOne { data } | Envelope::One(data) => Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Deserialize)]
    struct Row {
        id: String,
    }

    fn first(json: &str) -> Option<Row> {
        let envelope: Envelope<Row> = serde_json::from_str(json).expect("parse envelope");
        envelope.into_first()
    }

    #[test]
    fn bare_array_takes_the_first_element() {
        let row = first(r#"[{"id":"a"},{"id":"b"}]"#).expect("non-empty");
        assert_eq!(row.id, "a");
    }

    #[test]
    fn wrapped_array_is_unwrapped() {
        let row = first(r#"{"data":[{"id":"w"}]}"#).expect("non-empty");
        assert_eq!(row.id, "w");
    }

    #[test]
    fn wrapped_single_object_is_unwrapped() {
        let row = first(r#"{"data":{"id":"s"}}"#).expect("present");
        assert_eq!(row.id, "s");
    }

    #[test]
    fn single_object_passes_through() {
        let row = first(r#"{"id":"o"}"#).expect("present");
        assert_eq!(row.id, "o");
    }

    #[test]
    fn empty_collections_normalize_to_none() {
        assert_eq!(first("[]"), None);
        assert_eq!(first(r#"{"data":[]}"#), None);
    }
}
