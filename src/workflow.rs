//! Command implementations.
//!
//! Each `run_*` wires the same pieces: resolve the desk, read config through
//! the cache, build the HTTP collaborators, load the draft, apply one
//! controller operation, and write the draft back. All user-facing output
//! happens here; the modules below never print.

use crate::cli::{
    CloseArgs, EditArgs, InitArgs, ItemsArgs, ItemsCommand, OpenArgs, OtpArgs, OtpCommand,
    ReportArgs, ReportCommand, SaveArgs, ShowArgs, SignArgs, SignKind, StageArgs, StageDirection,
};
use crate::collab::http::HttpCollaborators;
use crate::collab::{OtpService, ReportUpload, SignatureService};
use crate::config::{self, ConfigCache, ShopConfig};
use crate::controller::{self, ClosureOutcome, Controller};
use crate::desk::{self, unix_now, DeskPaths, OrderDraft};
use crate::finance;
use crate::prompt::{AutoAccept, Confirm, StdinConfirm};
use crate::report;
use crate::schema::{CostLineItem, SignatureKind, SignedStatus};
use crate::signature::{replay_strokes, CaptureSession, Point, SignatureContext};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

/// Everything a desk-bound command needs, built once per invocation. The
/// config cache lives here, at the composition root, not in a module global.
struct DeskContext {
    paths: DeskPaths,
    config: ShopConfig,
    http: HttpCollaborators,
}

impl DeskContext {
    fn load(desk: &Path) -> Result<DeskContext> {
        let root = desk::ensure_desk_root(desk, false)?;
        let paths = DeskPaths::new(root);
        let mut cache = ConfigCache::new(paths.clone());
        let config = cache.get()?.clone();
        let http = HttpCollaborators::new(&config.base_url);
        Ok(DeskContext {
            paths,
            config,
            http,
        })
    }
}

pub fn run_init(args: InitArgs) -> Result<()> {
    let root = desk::ensure_desk_root(&args.desk, true)?;
    let paths = DeskPaths::new(root);
    let mut cache = ConfigCache::new(paths.clone());
    let config_path = paths.config_path();
    if config_path.is_file() {
        if !args.force {
            return Err(anyhow!(
                "config already exists at {} (use --force to overwrite)",
                config_path.display()
            ));
        }
        // Warm the cache with the old file when it still parses; an
        // unreadable config is exactly what --force is for.
        if let Ok(previous) = cache.get() {
            tracing::info!(
                previous_base_url = previous.base_url.as_str(),
                "overwriting shop config"
            );
        }
    }
    config::write_config(&paths, &config::default_config(&args.base_url))?;
    // The cached copy is still inside its TTL; drop it so the readback
    // below reflects the file just written.
    cache.invalidate();
    let written = cache.get()?;
    println!(
        "wrote {} (base url {})",
        config_path.display(),
        written.base_url
    );
    Ok(())
}

pub fn run_open(args: OpenArgs) -> Result<()> {
    let ctx = DeskContext::load(&args.desk)?;

    if desk::draft_exists(&ctx.paths) && !args.force {
        let existing = desk::load_draft(&ctx.paths)?;
        if existing.is_dirty() {
            return Err(anyhow!(
                "draft for order {} has unsaved edits ({}); save them or rerun with --force",
                existing.order.number,
                existing.dirty_labels().join(", ")
            ));
        }
    }

    // Signature status is auxiliary: the open still succeeds when that
    // collaborator is down, the flags just start out unset.
    let signed = match ctx.http.signed_status(&args.order) {
        Ok(signed) => signed,
        Err(err) => {
            println!("note: signature status unavailable ({err})");
            SignedStatus::default()
        }
    };

    let draft = controller::load_order(&ctx.http, &args.order, signed)?;
    desk::write_draft(&ctx.paths, &draft)?;

    println!("opened order {} for {}", draft.order.number, draft.order.client_name);
    match draft.order.stage() {
        Some(stage) => println!("status {} at stage {stage}", draft.order.status),
        None => println!("status {} (terminal; read-only)", draft.order.status),
    }
    Ok(())
}

pub fn run_show(args: ShowArgs) -> Result<()> {
    let ctx = DeskContext::load(&args.desk)?;
    let draft = desk::load_draft(&ctx.paths)?;

    if args.json {
        let itemized = finance::derive_itemized(&draft.items);
        let payload = serde_json::json!({
            "order": draft.order,
            "stage": draft.order.stage().map(|stage| stage.get()),
            "items": draft.items,
            "itemized": {
                "subtotal": itemized.subtotal,
                "tax": itemized.tax,
                "total": itemized.total,
            },
            "signed": draft.signed,
            "dirty": draft.dirty_labels(),
            "opened_at": draft.opened_at,
        });
        println!("{}", serde_json::to_string_pretty(&payload).context("serialize show output")?);
        return Ok(());
    }

    let order = &draft.order;
    println!("order {} ({})", order.number, order.id);
    println!("client: {} / {}", order.client_name, order.equipment);
    match order.stage() {
        Some(stage) => println!("status: {} at stage {stage}", order.status),
        None => println!("status: {} (terminal)", order.status),
    }
    println!("diagnosis: {}", blank_as_dash(&order.diagnosis));
    println!("recommendation: {}", blank_as_dash(&order.recommendation));
    println!(
        "costs: labor {:.2} + parts {:.2} + other {:.2} - discount {:.2} = subtotal {:.2}",
        order.labor_cost, order.parts_cost, order.other_cost, order.discount, order.subtotal
    );
    println!("tax {:.2} -> total {:.2}", order.tax, order.total);
    if order.warranty {
        println!("warranty: yes ({})", blank_as_dash(&order.warranty_ref));
    }
    println!(
        "otp: {}",
        if order.otp_validated { "validated" } else { "not validated" }
    );
    println!(
        "signatures: conformity {} / receipt {}",
        signed_label(draft.signed.conformity_signed),
        signed_label(draft.signed.receipt_signed)
    );
    if draft.is_dirty() {
        println!("unsaved edits: {}", draft.dirty_labels().join(", "));
    }
    Ok(())
}

fn blank_as_dash(text: &str) -> &str {
    if text.trim().is_empty() {
        "-"
    } else {
        text
    }
}

fn signed_label(signed: bool) -> &'static str {
    if signed {
        "signed"
    } else {
        "pending"
    }
}

pub fn run_stage(args: StageArgs) -> Result<()> {
    let ctx = DeskContext::load(&args.desk)?;
    let draft = desk::load_draft(&ctx.paths)?;
    let mut ctl = Controller::new(&ctx.http, draft);

    let moved = match args.direction {
        StageDirection::Next => ctl.advance_stage()?,
        StageDirection::Back => ctl.retreat_stage()?,
    };
    if moved.clamped() {
        println!("already at stage {}; nothing to do", moved.from);
    } else {
        println!(
            "stage {} -> {} (status {} mirrored locally; run `rdesk save` to persist)",
            moved.from,
            moved.to,
            ctl.draft.order.status
        );
    }
    desk::write_draft(&ctx.paths, &ctl.into_draft())?;
    Ok(())
}

pub fn run_edit(args: EditArgs) -> Result<()> {
    let ctx = DeskContext::load(&args.desk)?;
    let draft = desk::load_draft(&ctx.paths)?;
    let mut ctl = Controller::new(&ctx.http, draft);

    if let Some(diagnosis) = &args.diagnosis {
        ctl.set_diagnosis(diagnosis);
    }
    if let Some(recommendation) = &args.recommendation {
        ctl.set_recommendation(recommendation);
    }
    if args.labor.is_some()
        || args.parts.is_some()
        || args.other.is_some()
        || args.discount.is_some()
        || args.tax.is_some()
    {
        ctl.set_costs(args.labor, args.parts, args.other, args.discount, args.tax);
    }
    if let Some(warranty) = args.warranty {
        ctl.set_warranty(warranty, args.warranty_ref.as_deref());
    }

    let order = &ctl.draft.order;
    println!(
        "subtotal {:.2} + tax {:.2} = total {:.2}",
        order.subtotal, order.tax, order.total
    );
    desk::write_draft(&ctx.paths, &ctl.into_draft())?;
    Ok(())
}

pub fn run_items(args: ItemsArgs) -> Result<()> {
    let ctx = DeskContext::load(&args.desk)?;
    let draft = desk::load_draft(&ctx.paths)?;
    let mut ctl = Controller::new(&ctx.http, draft);

    match args.command {
        ItemsCommand::Add {
            description,
            quantity,
            unit_cost,
        } => {
            let item = CostLineItem::new(&description, quantity, unit_cost)?;
            ctl.add_item(item);
            print_itemized(&ctl.draft);
            desk::write_draft(&ctx.paths, &ctl.into_draft())?;
        }
        ItemsCommand::List => {
            print_itemized(&ctl.draft);
        }
        ItemsCommand::Clear => {
            ctl.clear_items();
            println!("cleared the itemized panel");
            desk::write_draft(&ctx.paths, &ctl.into_draft())?;
        }
    }
    Ok(())
}

fn print_itemized(draft: &OrderDraft) {
    for item in &draft.items {
        println!(
            "  {} x{} @ {:.2} = {:.2}",
            item.description,
            item.quantity,
            item.unit_cost,
            item.line_total()
        );
    }
    let itemized = finance::derive_itemized(&draft.items);
    println!(
        "itemized: subtotal {:.2} + 15% tax {:.2} = total {:.2}",
        itemized.subtotal, itemized.tax, itemized.total
    );
}

pub fn run_save(args: SaveArgs) -> Result<()> {
    let ctx = DeskContext::load(&args.desk)?;
    let draft = desk::load_draft(&ctx.paths)?;
    let mut ctl = Controller::new(&ctx.http, draft);

    ctl.save_draft()?;
    println!(
        "saved order {} under status {}",
        ctl.draft.order.number, ctl.draft.order.status
    );
    desk::write_draft(&ctx.paths, &ctl.into_draft())?;
    Ok(())
}

pub fn run_close(args: CloseArgs) -> Result<()> {
    let ctx = DeskContext::load(&args.desk)?;
    let draft = desk::load_draft(&ctx.paths)?;
    let mut ctl = Controller::new(&ctx.http, draft);

    let mut auto = AutoAccept;
    let mut interactive = StdinConfirm;
    let confirm: &mut dyn Confirm = if args.yes { &mut auto } else { &mut interactive };

    let outcome = ctl.request_closure(&args.reason, &args.by, confirm);
    // Keep the locally entered closure fields for a retry even when the
    // request did not go through.
    let result = match outcome {
        Ok(ClosureOutcome::Closed) => {
            println!("order {} closed", ctl.draft.order.number);
            Ok(())
        }
        Ok(ClosureOutcome::Blocked { message }) => Err(anyhow!("closure blocked: {message}")),
        Ok(ClosureOutcome::Declined { check }) => {
            println!("closure not performed: override declined ({check})");
            Ok(())
        }
        Err(err) => Err(err),
    };
    desk::write_draft(&ctx.paths, &ctl.into_draft())?;
    result
}

pub fn run_otp(args: OtpArgs) -> Result<()> {
    let ctx = DeskContext::load(&args.desk)?;
    let draft = desk::load_draft(&ctx.paths)?;

    match args.command {
        OtpCommand::Request => {
            ctx.http
                .generate(&draft.order.client_cedula, &draft.order.client_email)?;
            println!(
                "one-time code dispatched to {} for order {}",
                draft.order.client_email, draft.order.number
            );
            Ok(())
        }
        OtpCommand::Validate { code } => {
            let valid = ctx.http.validate(&draft.order.client_cedula, &code)?;
            let mut ctl = Controller::new(&ctx.http, draft);
            ctl.set_otp(&code, valid);
            desk::write_draft(&ctx.paths, &ctl.into_draft())?;
            if valid {
                println!("code accepted; the closure gate will not prompt for OTP");
            } else {
                println!("code rejected; the closure gate will ask for an override");
            }
            Ok(())
        }
    }
}

pub fn run_sign(args: SignArgs) -> Result<()> {
    let ctx = DeskContext::load(&args.desk)?;
    let mut draft = desk::load_draft(&ctx.paths)?;

    let raw = fs::read_to_string(&args.strokes)
        .with_context(|| format!("read strokes file {}", args.strokes.display()))?;
    let strokes: Vec<Vec<Point>> = serde_json::from_str(&raw)
        .with_context(|| format!("parse strokes file {}", args.strokes.display()))?;

    let mut session = CaptureSession::new(ctx.config.raster_width, ctx.config.raster_height);
    replay_strokes(&mut session, &strokes);
    if session.is_blank() {
        println!("note: submitting a blank raster (no strokes drawn)");
    }

    let kind = signature_kind(args.kind);
    let order = &draft.order;
    let procedure = if order.recommendation.trim().is_empty() {
        &order.diagnosis
    } else {
        &order.recommendation
    };
    let payload = session.finalize(
        kind,
        &SignatureContext {
            order_id: &order.id,
            order_number: &order.number,
            client_name: &order.client_name,
            equipment: &order.equipment,
            procedure,
        },
        unix_now(),
    );
    ctx.http.submit(&payload)?;

    // Only this kind's slot flips; the other keeps its fetched state.
    match kind {
        SignatureKind::Conformity => draft.signed.conformity_signed = true,
        SignatureKind::Receipt => draft.signed.receipt_signed = true,
    }
    desk::write_draft(&ctx.paths, &draft)?;
    println!("submitted {kind} signature for order {}", draft.order.number);
    Ok(())
}

fn signature_kind(kind: SignKind) -> SignatureKind {
    match kind {
        SignKind::Conformity => SignatureKind::Conformity,
        SignKind::Receipt => SignatureKind::Receipt,
    }
}

pub fn run_report(args: ReportArgs) -> Result<()> {
    match args.command {
        ReportCommand::Parse { file, json, desk } => run_report_parse(&file, json, desk.as_deref()),
        ReportCommand::Upload { file, desk } => run_report_upload(&file, &desk),
    }
}

fn report_preconditions(config: Option<&ShopConfig>) -> (u64, Vec<String>) {
    match config {
        Some(config) => (config.report_max_bytes, config.report_extensions.clone()),
        None => {
            let defaults = config::default_config("http://unused.local");
            (defaults.report_max_bytes, defaults.report_extensions)
        }
    }
}

fn run_report_parse(file: &Path, json: bool, desk: Option<&Path>) -> Result<()> {
    let config = match desk {
        Some(desk) => Some(DeskContext::load(desk)?.config),
        None => None,
    };
    let (max_bytes, extensions) = report_preconditions(config.as_ref());
    report::check_upload(file, max_bytes, &extensions)?;

    let raw = fs::read_to_string(file)
        .with_context(|| format!("read report file {}", file.display()))?;
    let preview = report::parse_report(&raw)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview).context("serialize preview")?);
        return Ok(());
    }

    println!("root element: {}", preview.root);
    println!(
        "declared: version {} / encoding {}",
        blank_as_dash(&preview.version),
        blank_as_dash(&preview.encoding)
    );
    println!("elements: {}", preview.element_count);
    println!("properties: {}", preview.properties.len());
    if preview.vendor_recognized {
        println!("summary:");
        for entry in &preview.summary {
            println!("  {}: {}", entry.label, blank_as_dash(&entry.value));
        }
    } else {
        println!("unrecognized vendor root; no curated summary");
    }
    Ok(())
}

fn run_report_upload(file: &Path, desk: &Path) -> Result<()> {
    let ctx = DeskContext::load(desk)?;
    let draft = desk::load_draft(&ctx.paths)?;
    report::check_upload(file, ctx.config.report_max_bytes, &ctx.config.report_extensions)?;

    let bytes = fs::read(file).with_context(|| format!("read report file {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "report.xml".to_string());
    ctx.http
        .upload(&draft.order.equipment_id, &file_name, &bytes)?;
    println!(
        "uploaded {} for equipment {}",
        file_name, draft.order.equipment_id
    );
    Ok(())
}
