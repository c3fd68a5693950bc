//! Diagnostic hardware-report pipeline.
//!
//! Upload preconditions run synchronously before any read: files over the
//! configured size ceiling or with an unrecognized extension never reach the
//! parser, and the two violations produce distinct messages. The pipeline
//! itself is pure over the raw text: parse the markup tree, scan declared
//! metadata from the raw bytes, flatten properties, and build the curated
//! summary for recognized vendor roots. The preview lives only for the
//! review session; nothing here persists.

pub mod extract;
pub mod markup;

use crate::report::extract::{flatten_properties, friendly_summary, is_vendor_report, PropertyRecord};
use crate::report::markup::{parse_document, ParseError};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// One curated summary row, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub label: String,
    pub value: String,
}

/// Everything the review screen shows for one uploaded report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPreview {
    pub root: String,
    /// Declared in the XML prolog; empty when absent.
    pub version: String,
    /// Declared in the XML prolog; empty when absent.
    pub encoding: String,
    pub element_count: usize,
    pub vendor_recognized: bool,
    pub properties: Vec<PropertyRecord>,
    pub summary: Vec<SummaryEntry>,
}

/// Reject oversized or wrong-type files before any read is attempted.
pub fn check_upload(path: &Path, max_bytes: u64, allowed_extensions: &[String]) -> Result<()> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
    {
        return Err(anyhow!(
            "unsupported report file type '.{extension}' (allowed: {})",
            allowed_extensions.join(", ")
        ));
    }

    let metadata = fs::metadata(path)
        .with_context(|| format!("stat report file {}", path.display()))?;
    if metadata.len() > max_bytes {
        return Err(anyhow!(
            "report file is too large: {} bytes (limit {max_bytes})",
            metadata.len()
        ));
    }
    Ok(())
}

/// Run the full pipeline over raw report text.
pub fn parse_report(raw: &str) -> Result<ReportPreview, ParseError> {
    let root = parse_document(raw)?;
    let (version, encoding) = scan_declaration(raw);
    let element_count = root.count_elements();
    let properties = flatten_properties(&root);
    let vendor_recognized = is_vendor_report(&root);
    let summary = if vendor_recognized {
        friendly_summary(&root, &properties)
            .into_iter()
            .map(|(label, value)| SummaryEntry { label, value })
            .collect()
    } else {
        Vec::new()
    };
    Ok(ReportPreview {
        root: root.name,
        version,
        encoding,
        element_count,
        vendor_recognized,
        properties,
        summary,
    })
}

/// Scan the declared version/encoding straight from the raw text. The
/// declaration is a processing instruction the tree parser skips, so this is
/// the only place that looks at it.
fn scan_declaration(raw: &str) -> (String, String) {
    let version = scan_prolog_attr(raw, "version");
    let encoding = scan_prolog_attr(raw, "encoding");
    (version, encoding)
}

fn scan_prolog_attr(raw: &str, attr: &str) -> String {
    let pattern = format!(r#"<\?xml[^>]*\b{attr}\s*=\s*["']([^"']*)["']"#);
    match Regex::new(&pattern) {
        Ok(regex) => regex
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        // The pattern is built from a fixed attribute name; this arm is
        // unreachable for the two call sites.
        Err(_) => String::new(),
    }
}
