//! Runtime bridge between UI command queue and backend event intake.

use std::{sync::Arc, thread};

use anyhow::{Context, Result};
use client_core::DashboardApi;
use crossbeam_channel::{Receiver, Sender};
use tokio::runtime::Handle;

use crate::{
    backend_bridge::commands::BackendCommand,
    controller::events::{UiError, UiErrorContext, UiEvent},
};

/// Runs the command worker on its own thread, driving requests on `runtime`.
///
/// Commands are served one at a time in queue order. The thread exits once every
/// command sender has been dropped.
pub fn launch(
    runtime: Handle,
    api: Arc<dyn DashboardApi>,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("dashboard-backend".to_string())
        .spawn(move || {
            let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));
            while let Ok(cmd) = cmd_rx.recv() {
                let event = runtime.block_on(handle_command(api.as_ref(), cmd));
                if ui_tx.send(event).is_err() {
                    tracing::debug!("ui event receiver dropped; backend worker exiting");
                    return;
                }
            }
            tracing::debug!("command queue closed; backend worker exiting");
        })
        .context("backend worker startup failure: failed to spawn worker thread")
}

pub async fn handle_command(api: &dyn DashboardApi, cmd: BackendCommand) -> UiEvent {
    match cmd {
        BackendCommand::SubmitConcept { submission, draft } => {
            match api.submit_concept(&draft).await {
                Ok(ack) => UiEvent::ConceptSubmitted { submission, ack },
                Err(err) => {
                    tracing::warn!("concept submission failed: {err}");
                    UiEvent::ConceptRejected {
                        submission,
                        error: UiError::from_command(UiErrorContext::ConceptForm, &err),
                    }
                }
            }
        }
        BackendCommand::FetchOwner => match api.fetch_owner().await {
            Ok(owner) => UiEvent::OwnerLoaded(owner),
            Err(err) => {
                tracing::warn!("owner fetch failed: {err}");
                UiEvent::Error(UiError::from_command(UiErrorContext::OwnerForm, &err))
            }
        },
        BackendCommand::UpdateOwner { submission, draft } => {
            match api.update_owner(&draft).await {
                Ok(ack) => UiEvent::OwnerUpdated { submission, ack },
                Err(err) => {
                    tracing::warn!("owner update failed: {err}");
                    UiEvent::OwnerRejected {
                        submission,
                        error: UiError::from_command(UiErrorContext::OwnerForm, &err),
                    }
                }
            }
        }
    }
}
