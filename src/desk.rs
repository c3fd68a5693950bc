//! The desk directory: local state between CLI invocations.
//!
//! A desk holds the shop config and at most one open draft. The draft is the
//! single aggregate replacing the pile of independently-mutable mirrored
//! fields the order screens would otherwise keep: the full editable snapshot
//! plus one dirty flag per field group, so a reload can never silently drop
//! a pending edit.

use crate::schema::{CostLineItem, SignedStatus, WorkOrder};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DRAFT_SCHEMA_VERSION: u32 = 1;

/// Editable field groups tracked for dirtiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Stage,
    Diagnosis,
    Costing,
    Closure,
}

impl FieldGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldGroup::Stage => "stage",
            FieldGroup::Diagnosis => "diagnosis",
            FieldGroup::Costing => "costing",
            FieldGroup::Closure => "closure",
        }
    }
}

/// The locally persisted draft for one open work order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub schema_version: u32,
    pub order: WorkOrder,
    #[serde(default)]
    pub items: Vec<CostLineItem>,
    #[serde(default)]
    pub signed: SignedStatus,
    #[serde(default)]
    pub dirty: BTreeSet<FieldGroup>,
    /// Unix seconds when the snapshot was loaded.
    pub opened_at: u64,
}

impl OrderDraft {
    /// Fresh draft around a just-fetched snapshot. Fully clean.
    pub fn from_snapshot(order: WorkOrder, signed: SignedStatus) -> OrderDraft {
        OrderDraft {
            schema_version: DRAFT_SCHEMA_VERSION,
            order,
            items: Vec::new(),
            signed,
            dirty: BTreeSet::new(),
            opened_at: unix_now(),
        }
    }

    pub fn mark_dirty(&mut self, group: FieldGroup) {
        self.dirty.insert(group);
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_labels(&self) -> Vec<&'static str> {
        self.dirty.iter().map(FieldGroup::as_str).collect()
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Well-known paths inside a desk directory.
#[derive(Debug, Clone)]
pub struct DeskPaths {
    root: PathBuf,
}

impl DeskPaths {
    pub fn new(root: PathBuf) -> DeskPaths {
        DeskPaths { root }
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn draft_path(&self) -> PathBuf {
        self.root.join("draft.json")
    }
}

pub fn ensure_desk_root(path: &Path, create: bool) -> Result<PathBuf> {
    if create {
        fs::create_dir_all(path).context("create desk root")?;
    }
    path.canonicalize()
        .with_context(|| format!("resolve desk root {}", path.display()))
}

pub fn load_draft(paths: &DeskPaths) -> Result<OrderDraft> {
    let draft_path = paths.draft_path();
    if !draft_path.is_file() {
        return Err(anyhow!(
            "no order is open in this desk (run `rdesk open` first)"
        ));
    }
    let content = fs::read_to_string(&draft_path)
        .with_context(|| format!("read draft {}", draft_path.display()))?;
    let draft: OrderDraft = serde_json::from_str(&content)
        .with_context(|| format!("parse draft {}", draft_path.display()))?;
    if draft.schema_version != DRAFT_SCHEMA_VERSION {
        return Err(anyhow!(
            "draft schema version {} is not supported (expected {DRAFT_SCHEMA_VERSION})",
            draft.schema_version
        ));
    }
    Ok(draft)
}

pub fn write_draft(paths: &DeskPaths, draft: &OrderDraft) -> Result<()> {
    let json = serde_json::to_string_pretty(draft).context("serialize draft")?;
    fs::write(paths.draft_path(), json)
        .with_context(|| format!("write draft {}", paths.draft_path().display()))?;
    Ok(())
}

pub fn draft_exists(paths: &DeskPaths) -> bool {
    paths.draft_path().is_file()
}

#[cfg(test)]
pub mod tests_support {
    use crate::schema::{OrderStatus, WorkOrder};

    /// A realistic mid-workflow order used across module tests.
    pub fn sample_order() -> WorkOrder {
        WorkOrder {
            id: "o-1001".to_string(),
            number: "WO-0042".to_string(),
            status: OrderStatus::Diagnosis,
            client_name: "Maria Paz".to_string(),
            client_cedula: "1712345678".to_string(),
            client_email: "maria@example.com".to_string(),
            equipment: "ThinkPad T14 Gen 3".to_string(),
            equipment_id: "eq-77".to_string(),
            diagnosis: "Disco con sectores defectuosos".to_string(),
            recommendation: "Cambio de disco".to_string(),
            labor_cost: 20.0,
            parts_cost: 25.5,
            other_cost: 0.0,
            discount: 0.0,
            tax: 0.0,
            subtotal: 45.5,
            total: 45.5,
            warranty: false,
            warranty_ref: String::new(),
            closure_reason: String::new(),
            closed_by: String::new(),
            otp_code: String::new(),
            otp_validated: false,
            intake_at: "2026-08-20T14:10:00Z".to_string(),
            delivered_at: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::sample_order;
    use super::*;

    fn desk() -> (tempfile::TempDir, DeskPaths) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let paths = DeskPaths::new(dir.path().to_path_buf());
        (dir, paths)
    }

    #[test]
    fn draft_round_trips_through_the_desk() {
        let (_dir, paths) = desk();
        let mut draft = OrderDraft::from_snapshot(sample_order(), SignedStatus::default());
        draft.mark_dirty(FieldGroup::Diagnosis);
        write_draft(&paths, &draft).expect("write draft");

        let loaded = load_draft(&paths).expect("load draft");
        assert_eq!(loaded, draft);
        assert!(loaded.is_dirty());
        assert_eq!(loaded.dirty_labels(), vec!["diagnosis"]);
    }

    #[test]
    fn missing_draft_is_a_clear_error() {
        let (_dir, paths) = desk();
        let err = load_draft(&paths).expect_err("no draft yet");
        assert!(err.to_string().contains("no order is open"));
    }

    #[test]
    fn fresh_snapshot_drafts_are_clean() {
        let draft = OrderDraft::from_snapshot(sample_order(), SignedStatus::default());
        assert!(!draft.is_dirty());
        assert!(draft.items.is_empty());
    }

    #[test]
    fn dirty_groups_are_ordered_and_deduplicated() {
        let mut draft = OrderDraft::from_snapshot(sample_order(), SignedStatus::default());
        draft.mark_dirty(FieldGroup::Costing);
        draft.mark_dirty(FieldGroup::Stage);
        draft.mark_dirty(FieldGroup::Costing);
        assert_eq!(draft.dirty_labels(), vec!["stage", "costing"]);
    }
}
