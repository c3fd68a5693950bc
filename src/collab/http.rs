//! ureq implementations of the collaborator traits.
//!
//! One agent, one base URL. Every non-success response becomes an error
//! message carrying the HTTP status code; transport failures carry the
//! underlying error. No retry happens here; callers keep their local state
//! and retry manually.

use crate::collab::{Envelope, OrderService, OtpService, ReportUpload, SignatureService};
use crate::schema::{SignedStatus, WorkOrder};
use crate::signature::SignaturePayload;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for all four collaborator roles.
pub struct HttpCollaborators {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpCollaborators {
    pub fn new(base_url: &str) -> HttpCollaborators {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        HttpCollaborators {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Snapshot write body: the full order plus the explicit close flag.
#[derive(Debug, Serialize)]
struct StoreOrderBody<'a> {
    #[serde(flatten)]
    order: &'a WorkOrder,
    close: bool,
}

#[derive(Debug, Serialize)]
struct OtpGenerateBody<'a> {
    cedula: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct OtpValidateBody<'a> {
    cedula: &'a str,
    code: &'a str,
}

/// The OTP collaborator answers either a bare boolean or `{"valid": bool}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OtpValidateReply {
    Bare(bool),
    Wrapped { valid: bool },
}

impl OtpValidateReply {
    fn valid(self) -> bool {
        match self {
            OtpValidateReply::Bare(valid) | OtpValidateReply::Wrapped { valid } => valid,
        }
    }
}

/// Map a ureq error to the user-facing transport message for `what`.
fn transport_error(err: ureq::Error, what: &str) -> anyhow::Error {
    match err {
        ureq::Error::StatusCode(code) => anyhow!("{what} failed with http status {code}"),
        other => anyhow!("{what} failed in transport: {other}"),
    }
}

impl OrderService for HttpCollaborators {
    fn fetch(&self, order_id: &str) -> Result<WorkOrder> {
        let url = self.url(&format!("/orders/{order_id}"));
        tracing::debug!(url = url.as_str(), "fetching order snapshot");
        let mut response = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| transport_error(err, "order fetch"))?;
        let envelope: Envelope<WorkOrder> = response
            .body_mut()
            .read_json()
            .context("decode order snapshot response")?;
        envelope
            .into_first()
            .ok_or_else(|| anyhow!("order {order_id} was not found"))
    }

    fn store(&self, order: &WorkOrder, close: bool) -> Result<()> {
        let url = self.url(&format!("/orders/{}", order.id));
        let body = StoreOrderBody { order, close };
        tracing::debug!(url = url.as_str(), close, "storing order snapshot");
        self.agent
            .put(&url)
            .send_json(&body)
            .map_err(|err| transport_error(err, "order save"))?;
        Ok(())
    }
}

impl OtpService for HttpCollaborators {
    fn generate(&self, cedula: &str, email: &str) -> Result<()> {
        let url = self.url("/otp/generate");
        self.agent
            .post(&url)
            .send_json(OtpGenerateBody { cedula, email })
            .map_err(|err| transport_error(err, "otp generate"))?;
        Ok(())
    }

    fn validate(&self, cedula: &str, code: &str) -> Result<bool> {
        let url = self.url("/otp/validate");
        let mut response = self
            .agent
            .post(&url)
            .send_json(OtpValidateBody { cedula, code })
            .map_err(|err| transport_error(err, "otp validate"))?;
        let reply: OtpValidateReply = response
            .body_mut()
            .read_json()
            .context("decode otp validation response")?;
        Ok(reply.valid())
    }
}

impl SignatureService for HttpCollaborators {
    fn signed_status(&self, order_id: &str) -> Result<SignedStatus> {
        let url = self.url(&format!("/signatures/{order_id}/status"));
        let mut response = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| transport_error(err, "signature status fetch"))?;
        let envelope: Envelope<SignedStatus> = response
            .body_mut()
            .read_json()
            .context("decode signature status response")?;
        Ok(envelope.into_first().unwrap_or_default())
    }

    fn submit(&self, payload: &SignaturePayload) -> Result<()> {
        let url = self.url("/signatures");
        tracing::debug!(kind = payload.kind.as_str(), "submitting signature evidence");
        self.agent
            .post(&url)
            .send_json(payload)
            .map_err(|err| transport_error(err, "signature submit"))?;
        Ok(())
    }
}

impl ReportUpload for HttpCollaborators {
    fn upload(&self, equipment_id: &str, file_name: &str, bytes: &[u8]) -> Result<()> {
        let url = self.url(&format!("/equipment/{equipment_id}/report"));
        tracing::debug!(
            url = url.as_str(),
            size = bytes.len(),
            "uploading raw hardware report"
        );
        self.agent
            .post(&url)
            .header("content-type", "application/octet-stream")
            .header("x-file-name", file_name)
            .send(bytes)
            .map_err(|err| transport_error(err, "report upload"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = HttpCollaborators::new("http://localhost:9090/");
        assert_eq!(client.url("/orders/o-1"), "http://localhost:9090/orders/o-1");
    }

    #[test]
    fn otp_reply_accepts_both_shapes() {
        let bare: OtpValidateReply = serde_json::from_str("true").expect("bare");
        assert!(bare.valid());
        let wrapped: OtpValidateReply =
            serde_json::from_str(r#"{"valid":false}"#).expect("wrapped");
        assert!(!wrapped.valid());
    }

    #[test]
    fn store_body_flattens_the_order_beside_the_close_flag() {
        let order = crate::desk::tests_support::sample_order();
        let body = StoreOrderBody {
            order: &order,
            close: true,
        };
        let value = serde_json::to_value(&body).expect("serialize body");
        assert_eq!(value["close"], serde_json::Value::Bool(true));
        assert_eq!(value["id"], serde_json::json!(order.id));
        assert_eq!(value["status"], serde_json::json!("DIAGNOSIS"));
    }
}
