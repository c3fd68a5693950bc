use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod collab;
mod config;
mod controller;
mod desk;
mod finance;
mod gate;
mod prompt;
mod report;
mod schema;
mod signature;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Init(args) => workflow::run_init(args),
        Command::Open(args) => workflow::run_open(args),
        Command::Show(args) => workflow::run_show(args),
        Command::Stage(args) => workflow::run_stage(args),
        Command::Edit(args) => workflow::run_edit(args),
        Command::Items(args) => workflow::run_items(args),
        Command::Save(args) => workflow::run_save(args),
        Command::Close(args) => workflow::run_close(args),
        Command::Otp(args) => workflow::run_otp(args),
        Command::Sign(args) => workflow::run_sign(args),
        Command::Report(args) => workflow::run_report(args),
    }
}
