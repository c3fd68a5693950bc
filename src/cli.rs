//! CLI argument parsing for the work-order desk.
//!
//! The CLI is intentionally thin: it names the desk directory and the edit
//! being made, and leaves every policy decision to the workflow layer.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Root CLI entrypoint for the work-order desk.
#[derive(Parser, Debug)]
#[command(
    name = "rdesk",
    version,
    about = "Repair-shop work-order lifecycle desk",
    after_help = "Typical session:\n  rdesk init --desk ~/desks/wo42 --base-url http://shop.local/api\n  rdesk open --desk ~/desks/wo42 --order o-1001\n  rdesk edit --desk ~/desks/wo42 --diagnosis \"Disco danado\" --labor 20\n  rdesk stage --desk ~/desks/wo42 next\n  rdesk save --desk ~/desks/wo42\n  rdesk close --desk ~/desks/wo42 --reason \"Entregado conforme\" --by tech-1",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level desk commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Open(OpenArgs),
    Show(ShowArgs),
    Stage(StageArgs),
    Edit(EditArgs),
    Items(ItemsArgs),
    Save(SaveArgs),
    Close(CloseArgs),
    Otp(OtpArgs),
    Sign(SignArgs),
    Report(ReportArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Bootstrap a desk directory with its shop config")]
pub struct InitArgs {
    /// Desk directory to create
    #[arg(long, value_name = "DIR")]
    pub desk: PathBuf,

    /// Base URL of the shop's collaborator services
    #[arg(long, value_name = "URL")]
    pub base_url: String,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Load a work-order snapshot into the desk draft")]
pub struct OpenArgs {
    /// Desk directory
    #[arg(long, value_name = "DIR")]
    pub desk: PathBuf,

    /// Work-order identifier at the Order collaborator
    #[arg(long, value_name = "ID")]
    pub order: String,

    /// Discard unsaved local edits from a previously open draft
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Print the open draft, its stage, and derived totals")]
pub struct ShowArgs {
    /// Desk directory
    #[arg(long, value_name = "DIR")]
    pub desk: PathBuf,

    /// Emit machine-readable JSON instead of the text summary
    #[arg(long)]
    pub json: bool,
}

/// Direction of a stage move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StageDirection {
    /// Advance one stage (clamped at 4)
    Next,
    /// Retreat one stage (clamped at 1)
    Back,
}

#[derive(Parser, Debug)]
#[command(about = "Move the open draft one stage forward or back")]
pub struct StageArgs {
    /// Desk directory
    #[arg(long, value_name = "DIR")]
    pub desk: PathBuf,

    /// Which way to move
    #[arg(value_enum)]
    pub direction: StageDirection,
}

#[derive(Parser, Debug)]
#[command(about = "Edit draft fields; derived totals recompute immediately")]
pub struct EditArgs {
    /// Desk directory
    #[arg(long, value_name = "DIR")]
    pub desk: PathBuf,

    /// Diagnosis text
    #[arg(long, value_name = "TEXT")]
    pub diagnosis: Option<String>,

    /// Recommendation text
    #[arg(long, value_name = "TEXT")]
    pub recommendation: Option<String>,

    /// Labor cost
    #[arg(long, value_name = "AMOUNT")]
    pub labor: Option<f64>,

    /// Parts cost
    #[arg(long, value_name = "AMOUNT")]
    pub parts: Option<f64>,

    /// Other cost
    #[arg(long, value_name = "AMOUNT")]
    pub other: Option<f64>,

    /// Discount amount
    #[arg(long, value_name = "AMOUNT")]
    pub discount: Option<f64>,

    /// Tax amount (free-form, not a rate)
    #[arg(long, value_name = "AMOUNT")]
    pub tax: Option<f64>,

    /// Warranty flag
    #[arg(long, value_name = "BOOL")]
    pub warranty: Option<bool>,

    /// Warranty reference
    #[arg(long, value_name = "REF")]
    pub warranty_ref: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Manage the itemized costing panel (fixed 15% tax)")]
pub struct ItemsArgs {
    /// Desk directory
    #[arg(long, value_name = "DIR")]
    pub desk: PathBuf,

    #[command(subcommand)]
    pub command: ItemsCommand,
}

#[derive(Subcommand, Debug)]
pub enum ItemsCommand {
    /// Append one line item
    Add {
        /// Line description
        #[arg(long, value_name = "TEXT")]
        description: String,

        /// Quantity, at least 1
        #[arg(long, value_name = "N", default_value_t = 1)]
        quantity: u32,

        /// Unit cost
        #[arg(long, value_name = "AMOUNT")]
        unit_cost: f64,
    },
    /// Print the panel with its derived subtotal, tax, and total
    List,
    /// Remove every line item
    Clear,
}

#[derive(Parser, Debug)]
#[command(about = "Persist the draft under its current stage's status")]
pub struct SaveArgs {
    /// Desk directory
    #[arg(long, value_name = "DIR")]
    pub desk: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Request closure; the gate runs before anything is sent")]
pub struct CloseArgs {
    /// Desk directory
    #[arg(long, value_name = "DIR")]
    pub desk: PathBuf,

    /// Closure reason (required by the gate)
    #[arg(long, value_name = "TEXT")]
    pub reason: String,

    /// Actor closing the order
    #[arg(long, value_name = "NAME")]
    pub by: String,

    /// Accept all soft-check overrides without prompting
    #[arg(long)]
    pub yes: bool,
}

#[derive(Parser, Debug)]
#[command(about = "One-time-code flow for the delivery handover")]
pub struct OtpArgs {
    /// Desk directory
    #[arg(long, value_name = "DIR")]
    pub desk: PathBuf,

    #[command(subcommand)]
    pub command: OtpCommand,
}

#[derive(Subcommand, Debug)]
pub enum OtpCommand {
    /// Dispatch a code to the client on record
    Request,
    /// Check a code the client read back
    Validate {
        /// The code to check
        #[arg(long, value_name = "CODE")]
        code: String,
    },
}

/// Signature kinds accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SignKind {
    Conformity,
    Receipt,
}

#[derive(Parser, Debug)]
#[command(about = "Capture a signature from a strokes file and submit it")]
pub struct SignArgs {
    /// Desk directory
    #[arg(long, value_name = "DIR")]
    pub desk: PathBuf,

    /// Which evidence slot to fill
    #[arg(long, value_enum)]
    pub kind: SignKind,

    /// JSON strokes file: an array of polylines of {x, y} points; an empty
    /// polyline erases everything drawn before it
    #[arg(long, value_name = "PATH")]
    pub strokes: PathBuf,
}

#[derive(Parser, Debug)]
#[command(about = "Hardware-report tools")]
pub struct ReportArgs {
    #[command(subcommand)]
    pub command: ReportCommand,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Parse a report file and print the preview
    Parse {
        /// Report file to parse
        #[arg(value_name = "PATH")]
        file: PathBuf,

        /// Emit the preview as JSON
        #[arg(long)]
        json: bool,

        /// Desk directory; defaults to built-in preconditions when omitted
        #[arg(long, value_name = "DIR")]
        desk: Option<PathBuf>,
    },
    /// Upload the raw report tied to the open draft's equipment
    Upload {
        /// Report file to upload
        #[arg(value_name = "PATH")]
        file: PathBuf,

        /// Desk directory
        #[arg(long, value_name = "DIR")]
        desk: PathBuf,
    },
}
