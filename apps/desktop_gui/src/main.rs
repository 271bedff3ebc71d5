use std::{path::PathBuf, sync::Arc};

mod backend_bridge;
mod controller;
mod ui;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use client_core::{load_config, CommandClient, DashboardApi};
use crossbeam_channel::bounded;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use crate::{
    backend_bridge::{commands::BackendCommand, runtime},
    controller::events::UiEvent,
    ui::DashboardApp,
};

#[derive(Parser, Debug)]
#[command(about = "Live dashboard for concepts, owner and peers")]
struct Args {
    /// Backend origin for REST and WebSocket traffic.
    #[arg(long)]
    base_url: Option<String>,
    /// Config file; defaults to ./dashboard.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();
    let config = load_config(args.base_url.as_deref(), args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build backend runtime")?;

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    let api: Arc<dyn DashboardApi> = Arc::new(CommandClient::new(config.clone()));
    let _worker = runtime::launch(runtime.handle().clone(), api, cmd_rx, ui_tx)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Concept Dashboard")
            .with_inner_size([1180.0, 760.0])
            .with_min_inner_size([860.0, 560.0]),
        ..Default::default()
    };
    let handle = runtime.handle().clone();
    eframe::run_native(
        "Concept Dashboard",
        options,
        Box::new(move |_cc| Ok(Box::new(DashboardApp::new(config, handle, cmd_tx, ui_rx)))),
    )
    .map_err(|err| anyhow!("dashboard window failed: {err}"))
}
