use std::{collections::VecDeque, time::Duration};

use arboard::Clipboard;
use client_core::{
    live::{self, CONCEPTS, PEERS},
    mirror::{ConceptPolicy, PeerPolicy},
    ClientConfig, LiveCollection, SyncEvent,
};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::protocol::{Concept, PeerInfo};
use tokio::{runtime::Handle, sync::broadcast};

use crate::{
    backend_bridge::commands::BackendCommand,
    controller::{
        events::{UiError, UiErrorContext, UiEvent},
        forms::{ConceptForm, OwnerForm},
        orchestration::dispatch_backend_command,
    },
};

const SYNC_EVENT_CAPACITY: usize = 64;
const DIAGNOSTICS_LIMIT: usize = 50;

/// Live state owned by the mounted dashboard. Dropping it releases both subscriptions.
struct LiveViews {
    concepts: LiveCollection<ConceptPolicy>,
    peers: LiveCollection<PeerPolicy>,
    events: broadcast::Receiver<SyncEvent>,
    concepts_sync: CollectionSync,
    peers_sync: CollectionSync,
}

/// Per-collection view of the sync diagnostics.
#[derive(Debug, Default)]
struct CollectionSync {
    status: CollectionStatus,
    /// Last decode error shown to the user. A backend that keeps resending the same
    /// unreadable payload is reported once, until an update applies again.
    last_decode_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum CollectionStatus {
    #[default]
    Waiting,
    Live { generation: u64 },
    Stopped(String),
}

impl CollectionStatus {
    fn label(&self) -> String {
        match self {
            Self::Waiting => "waiting for first update".to_string(),
            Self::Live { generation } => format!("live (update #{generation})"),
            Self::Stopped(reason) => format!("stopped: {reason}"),
        }
    }
}

pub struct DashboardApp {
    config: ClientConfig,
    runtime: Handle,
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    live: Option<LiveViews>,
    concept_form: ConceptForm,
    owner_form: OwnerForm,
    status: String,
    status_banner: Option<UiError>,
    diagnostics: VecDeque<String>,
}

impl DashboardApp {
    pub fn new(
        config: ClientConfig,
        runtime: Handle,
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
    ) -> Self {
        let mut app = Self {
            config,
            runtime,
            cmd_tx,
            ui_rx,
            live: None,
            concept_form: ConceptForm::default(),
            owner_form: OwnerForm::default(),
            status: "Starting".to_string(),
            status_banner: None,
            diagnostics: VecDeque::new(),
        };
        app.mount_live_views();
        app.request_owner();
        app
    }

    fn mount_live_views(&mut self) {
        // Live collections spawn their pump tasks on the backend runtime.
        let _guard = self.runtime.enter();
        let (events_tx, events) = broadcast::channel(SYNC_EVENT_CAPACITY);
        self.live = Some(LiveViews {
            concepts: live::concepts(&self.config, events_tx.clone()),
            peers: live::peers(&self.config, events_tx),
            events,
            concepts_sync: CollectionSync::default(),
            peers_sync: CollectionSync::default(),
        });
        self.status = format!("Subscribed to {}", self.config.base_url());
        tracing::info!(base_url = self.config.base_url(), "dashboard: live views mounted");
    }

    fn unmount_live_views(&mut self) {
        if self.live.take().is_some() {
            self.status = "Disconnected; live panels released".to_string();
            tracing::info!("dashboard: live views released");
        }
    }

    fn request_owner(&mut self) {
        if dispatch_backend_command(&self.cmd_tx, BackendCommand::FetchOwner, &mut self.status) {
            self.owner_form.begin_load();
        }
    }

    fn report(&mut self, err: UiError) {
        tracing::warn!(
            category = ?err.category(),
            context = ?err.context(),
            "dashboard: {}",
            err.message()
        );
        self.push_diagnostic(err.summary());
        self.status = err.summary();
        self.status_banner = Some(err);
    }

    fn push_diagnostic(&mut self, line: String) {
        if self.diagnostics.len() == DIAGNOSTICS_LIMIT {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(line);
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::ConceptSubmitted { submission, ack } => {
                    let guid = ack.guid.as_ref().map(|g| g.to_string());
                    if self.concept_form.submission_succeeded(submission, ack) {
                        self.status = match guid {
                            Some(guid) => format!("Concept submitted as {guid}"),
                            None => "Concept submitted".to_string(),
                        };
                    }
                }
                UiEvent::ConceptRejected { submission, error } => {
                    if self.concept_form.submission_failed(submission) {
                        self.report(error);
                    }
                }
                UiEvent::OwnerLoaded(owner) => {
                    self.owner_form.owner_loaded(owner);
                    self.status = "Owner loaded".to_string();
                }
                UiEvent::OwnerUpdated { submission, ack } => {
                    if self.owner_form.submission_succeeded(submission) {
                        self.status = ack
                            .message
                            .unwrap_or_else(|| "Owner updated".to_string());
                        self.request_owner();
                    }
                }
                UiEvent::OwnerRejected { submission, error } => {
                    if self.owner_form.submission_failed(submission) {
                        self.report(error);
                    }
                }
                UiEvent::Error(error) => {
                    if error.context() == UiErrorContext::OwnerForm {
                        self.owner_form.load_failed();
                    }
                    self.report(error);
                }
            }
        }
    }

    fn process_sync_events(&mut self) {
        let mut failures = Vec::new();
        if let Some(live) = self.live.as_mut() {
            loop {
                let event = match live.events.try_recv() {
                    Ok(event) => event,
                    Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "dashboard: sync diagnostics lagged");
                        continue;
                    }
                    Err(_) => break,
                };
                let collection = match &event {
                    SyncEvent::Applied { collection, .. }
                    | SyncEvent::DecodeFailed { collection, .. }
                    | SyncEvent::Ended { collection, .. } => *collection,
                };
                let slot = match collection {
                    CONCEPTS => &mut live.concepts_sync,
                    PEERS => &mut live.peers_sync,
                    _ => continue,
                };
                match &event {
                    SyncEvent::Applied { generation, .. } => {
                        slot.status = CollectionStatus::Live {
                            generation: *generation,
                        };
                        slot.last_decode_error = None;
                    }
                    SyncEvent::Ended { reason, .. } => {
                        slot.status = CollectionStatus::Stopped(reason.to_string());
                    }
                    SyncEvent::DecodeFailed { error, .. } => {
                        if slot.last_decode_error.as_deref() == Some(error.as_str()) {
                            tracing::debug!(collection, "dashboard: repeated decode failure");
                            continue;
                        }
                        slot.last_decode_error = Some(error.clone());
                    }
                }
                if let Some(err) = UiError::from_sync(&event) {
                    failures.push(err);
                }
            }
        }
        for err in failures {
            self.report(err);
        }
    }

    fn show_status_banner(&mut self, ui: &mut egui::Ui) {
        if let Some(banner) = self.status_banner.clone() {
            egui::Frame::NONE
                .fill(egui::Color32::from_rgb(111, 53, 53))
                .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(175, 96, 96)))
                .corner_radius(8.0)
                .inner_margin(egui::Margin::symmetric(10, 8))
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        ui.label(
                            egui::RichText::new(banner.summary()).color(egui::Color32::WHITE),
                        );
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.button("Dismiss").clicked() {
                                self.status_banner = None;
                            }
                        });
                    });
                });
        }
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("dashboard_top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Concept Dashboard");
                ui.separator();
                ui.weak(self.config.base_url());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if self.live.is_some() {
                        if ui.button("Disconnect").clicked() {
                            self.unmount_live_views();
                        }
                    } else if ui.button("Connect").clicked() {
                        self.mount_live_views();
                    }
                });
            });
            self.show_status_banner(ui);
        });

        egui::TopBottomPanel::bottom("dashboard_status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.small(egui::RichText::new(&self.status).weak());
                if !self.diagnostics.is_empty() {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.menu_button(format!("Diagnostics ({})", self.diagnostics.len()), |ui| {
                            egui::ScrollArea::vertical()
                                .id_salt("diagnostics_scroll")
                                .max_height(240.0)
                                .show(ui, |ui| {
                                    for line in self.diagnostics.iter().rev() {
                                        ui.label(line);
                                    }
                                });
                            if ui.button("Clear").clicked() {
                                self.diagnostics.clear();
                            }
                        });
                    });
                }
            });
        });
    }

    fn show_forms(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("dashboard_forms")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("forms_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        self.show_owner_form(ui);
                        ui.add_space(16.0);
                        self.show_concept_form(ui);
                    });
            });
    }

    fn show_owner_form(&mut self, ui: &mut egui::Ui) {
        section_title(ui, "Owner");
        if self.owner_form.is_loading() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.weak("Loading owner");
            });
        }

        if let Some(stored) = self.owner_form.stored() {
            ui.small(format!("Stored: {}", stored.name));
        }

        let busy = self.owner_form.is_submitting();
        ui.add_enabled_ui(!busy, |ui| {
            labeled_field(ui, "owner_name", "Name", "Owner name", &mut self.owner_form.draft.name);
            labeled_multiline(
                ui,
                "owner_description",
                "Description",
                "Who runs this node",
                &mut self.owner_form.draft.description,
            );
        });

        ui.horizontal(|ui| {
            let label = if busy { "Saving" } else { "Save owner" };
            if ui.add_enabled(!busy, egui::Button::new(label)).clicked() {
                self.submit_owner();
            }
            if ui
                .add_enabled(!self.owner_form.is_loading(), egui::Button::new("Reload"))
                .clicked()
            {
                self.request_owner();
            }
        });
    }

    fn submit_owner(&mut self) {
        match self.owner_form.begin_submit() {
            Ok((submission, draft)) => {
                let queued = dispatch_backend_command(
                    &self.cmd_tx,
                    BackendCommand::UpdateOwner { submission, draft },
                    &mut self.status,
                );
                if !queued {
                    self.owner_form.submission_failed(submission);
                }
            }
            Err(err) => self.report(UiError::from_validation(UiErrorContext::OwnerForm, &err)),
        }
    }

    fn show_concept_form(&mut self, ui: &mut egui::Ui) {
        section_title(ui, "New concept");
        let busy = self.concept_form.is_submitting();
        ui.add_enabled_ui(!busy, |ui| {
            let draft = &mut self.concept_form.draft;
            labeled_field(ui, "concept_name", "Name", "Concept name", &mut draft.name);
            labeled_field(ui, "concept_type", "Type", "e.g. note", &mut draft.kind);
            labeled_multiline(
                ui,
                "concept_description",
                "Description",
                "Short summary",
                &mut draft.description,
            );
            labeled_multiline(
                ui,
                "concept_content",
                "Content",
                "Payload stored by the backend",
                &mut draft.content,
            );
        });

        ui.horizontal(|ui| {
            let label = if busy { "Submitting" } else { "Submit concept" };
            if ui.add_enabled(!busy, egui::Button::new(label)).clicked() {
                self.submit_concept();
            }
            if ui.button("Clear").clicked() {
                self.concept_form.reset();
            }
        });

        if let Some(ack) = self.concept_form.last_ack() {
            let guid = ack.guid.as_ref().map(|g| g.as_str()).unwrap_or("-");
            let cid = ack.cid.as_ref().map(|c| c.as_str()).unwrap_or("pending");
            ui.small(format!("Last submission: {guid} (CID {cid})"));
        }
    }

    fn submit_concept(&mut self) {
        match self.concept_form.begin_submit() {
            Ok((submission, draft)) => {
                let queued = dispatch_backend_command(
                    &self.cmd_tx,
                    BackendCommand::SubmitConcept { submission, draft },
                    &mut self.status,
                );
                if !queued {
                    self.concept_form.submission_failed(submission);
                }
            }
            Err(err) => self.report(UiError::from_validation(UiErrorContext::ConceptForm, &err)),
        }
    }

    fn show_collections(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(live) = self.live.as_ref() else {
                ui.vertical_centered(|ui| {
                    ui.add_space(40.0);
                    ui.weak("Live panels are disconnected.");
                });
                return;
            };

            let concepts = live.concepts.current();
            let peers = live.peers.current();
            let half = ui.available_height() * 0.6;

            section_title(ui, &format!("Concepts ({})", concepts.len()));
            ui.weak(live.concepts_sync.status.label());
            egui::ScrollArea::vertical()
                .id_salt("concepts_scroll")
                .auto_shrink([false, false])
                .max_height(half)
                .show(ui, |ui| {
                    if concepts.is_empty() {
                        ui.weak("No concepts yet.");
                    }
                    for concept in concepts.values() {
                        concept_card(ui, concept);
                    }
                });

            ui.separator();
            section_title(ui, &format!("Peers ({})", peers.len()));
            ui.weak(live.peers_sync.status.label());
            egui::ScrollArea::vertical()
                .id_salt("peers_scroll")
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    if peers.is_empty() {
                        ui.weak("No peers advertising content.");
                    }
                    for (peer_id, peer) in peers.iter() {
                        peer_card(ui, peer_id.as_str(), peer);
                    }
                });
        });
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();
        self.process_sync_events();

        self.show_top_bar(ctx);
        self.show_forms(ctx);
        self.show_collections(ctx);

        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

fn section_title(ui: &mut egui::Ui, title: &str) {
    ui.label(egui::RichText::new(title).strong().size(16.0));
    ui.add_space(4.0);
}

fn labeled_field(ui: &mut egui::Ui, id: &'static str, label: &str, hint: &str, value: &mut String) {
    ui.label(egui::RichText::new(label).strong());
    ui.add(
        egui::TextEdit::singleline(value)
            .id_salt(id)
            .hint_text(hint)
            .desired_width(f32::INFINITY),
    );
}

fn labeled_multiline(
    ui: &mut egui::Ui,
    id: &'static str,
    label: &str,
    hint: &str,
    value: &mut String,
) {
    ui.label(egui::RichText::new(label).strong());
    ui.add(
        egui::TextEdit::multiline(value)
            .id_salt(id)
            .hint_text(hint)
            .desired_rows(3)
            .desired_width(f32::INFINITY),
    );
}

fn card_frame(ui: &egui::Ui) -> egui::Frame {
    egui::Frame::new()
        .fill(ui.visuals().faint_bg_color)
        .stroke(ui.visuals().widgets.noninteractive.bg_stroke)
        .corner_radius(8.0)
        .inner_margin(egui::Margin::symmetric(10, 8))
}

fn concept_card(ui: &mut egui::Ui, concept: &Concept) {
    card_frame(ui).show(ui, |ui| {
        ui.set_width(ui.available_width());
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new(&concept.name).strong());
            ui.label(egui::RichText::new(&concept.kind).small().italics());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.weak(concept.timestamp.display_local());
            });
        });
        if !concept.description.is_empty() {
            ui.label(&concept.description);
        }
        if !concept.content.is_empty() {
            ui.label(egui::RichText::new(&concept.content).monospace());
        }
        ui.horizontal(|ui| {
            ui.small(format!("GUID {}", concept.guid));
            match &concept.cid {
                Some(cid) => {
                    ui.small(format!("CID {cid}"));
                    if ui.small_button("Copy").on_hover_text("Copy CID").clicked() {
                        copy_to_clipboard(cid.as_str());
                    }
                }
                None => {
                    ui.small(egui::RichText::new("CID pending").weak());
                }
            }
        });
    });
    ui.add_space(6.0);
}

fn peer_card(ui: &mut egui::Ui, peer_id: &str, peer: &PeerInfo) {
    card_frame(ui).show(ui, |ui| {
        ui.set_width(ui.available_width());
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new(peer_id).strong().monospace());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.weak(format!("seen {}", peer.timestamp.display_local()));
            });
        });
        if let Some(owner) = &peer.owner_guid {
            ui.small(format!("owner {owner}"));
        }
        if peer.cids.is_empty() {
            ui.weak("No content advertised");
        } else {
            for cid in &peer.cids {
                ui.small(cid.as_str());
            }
        }
    });
    ui.add_space(6.0);
}

fn copy_to_clipboard(text: &str) {
    match Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(err) = clipboard.set_text(text.to_string()) {
                tracing::warn!("failed to copy to clipboard: {err}");
            }
        }
        Err(err) => tracing::warn!("clipboard unavailable: {err}"),
    }
}
