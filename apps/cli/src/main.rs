use std::fmt::Write as _;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    live, load_config,
    mirror::{ConceptSnapshot, PeerSnapshot, ReconcilePolicy, Snapshot},
    ClientConfig, CommandClient, CommandError, DashboardApi, LiveCollection, SyncEvent,
};
use serde::Serialize;
use shared::domain::Guid;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

mod args;

use args::{Cli, Collection, Command, ConceptAction, OwnerAction};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = load_config(cli.base_url.as_deref(), cli.config.as_deref())?;
    let client = CommandClient::new(config.clone());

    match cli.command {
        Command::Submit(draft) => {
            let ack = client.submit_concept(&draft.into()).await?;
            print_json(&ack)?;
        }
        Command::Owner {
            action: OwnerAction::Get,
        } => print_json(&client.fetch_owner().await?)?,
        Command::Owner {
            action: OwnerAction::Set { name, description },
        } => {
            let ack = client
                .update_owner(&args::owner_draft(name, description))
                .await?;
            if let Some(message) = ack.message {
                eprintln!("{message}");
            }
            let stored = client
                .fetch_owner()
                .await
                .context("owner was updated but re-fetching it failed")?;
            print_json(&stored)?;
        }
        Command::Concept { action } => run_concept(&client, action).await?,
        Command::Peers => print_json(&client.list_peers().await?)?,
        Command::Watch { collection } => watch(&config, collection).await?,
    }

    Ok(())
}

async fn run_concept(client: &CommandClient, action: ConceptAction) -> Result<()> {
    match action {
        ConceptAction::Get { guid } => {
            let guid = Guid::from(guid);
            let concept = client
                .fetch_concept(&guid)
                .await
                .map_err(|err| explain_missing(err, &guid))?;
            print_json(&concept)?;
        }
        ConceptAction::Query(filter) => {
            print_json(&client.query_concepts(&filter.into()).await?)?;
        }
        ConceptAction::Delete { guid } => {
            let guid = Guid::from(guid);
            client
                .delete_concept(&guid)
                .await
                .map_err(|err| explain_missing(err, &guid))?;
            println!("deleted {guid}");
        }
    }
    Ok(())
}

fn explain_missing(err: CommandError, guid: &Guid) -> anyhow::Error {
    if err.is_not_found() {
        anyhow::Error::new(err).context(format!("no concept with GUID {guid}"))
    } else {
        err.into()
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn watch(config: &ClientConfig, collection: Collection) -> Result<()> {
    let (events_tx, events) = broadcast::channel(64);
    match collection {
        Collection::Concepts => {
            follow(live::concepts(config, events_tx), events, format_concepts).await
        }
        Collection::Peers => follow(live::peers(config, events_tx), events, format_peers).await,
    }
}

/// Prints every reconciled snapshot until the collection stops updating or Ctrl-C.
/// The live handle is dropped on every return path, which releases the subscription.
async fn follow<P: ReconcilePolicy>(
    mut live: LiveCollection<P>,
    mut events: broadcast::Receiver<SyncEvent>,
    render: fn(&Snapshot<P::Key, P::Entity>) -> String,
) -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut events_open = true;

    loop {
        tokio::select! {
            changed = live.changed() => {
                if !changed {
                    break;
                }
                print!("{}", render(&live.current()));
            }
            event = events.recv(), if events_open => match event {
                Ok(SyncEvent::DecodeFailed { collection, error }) => {
                    tracing::warn!(collection, "skipped malformed update: {error}");
                }
                Ok(SyncEvent::Ended { collection, reason }) => {
                    tracing::info!(collection, "stream ended: {reason}");
                }
                Ok(SyncEvent::Applied { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "sync events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => events_open = false,
            },
            signal = &mut ctrl_c => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
        }
    }
    Ok(())
}

fn format_concepts(snapshot: &ConceptSnapshot) -> String {
    let mut out = format!("concepts: {}\n", snapshot.len());
    for concept in snapshot.values() {
        let cid = concept.cid.as_ref().map(|c| c.as_str()).unwrap_or("pending");
        let _ = writeln!(
            out,
            "  {} [{}] {} (cid {cid}, {})",
            concept.guid, concept.kind, concept.name, concept.timestamp
        );
    }
    out
}

fn format_peers(snapshot: &PeerSnapshot) -> String {
    let mut out = format!("peers: {}\n", snapshot.len());
    for (peer_id, peer) in snapshot.iter() {
        let cids: Vec<&str> = peer.cids.iter().map(|c| c.as_str()).collect();
        let _ = writeln!(
            out,
            "  {peer_id} seen {} cids [{}]",
            peer.timestamp,
            cids.join(", ")
        );
    }
    out
}
