use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use shared::protocol::{ConceptDraft, ConceptFilter, OwnerDraft};

#[derive(Parser, Debug)]
#[command(name = "concept-cli", about = "Headless client for the concept dashboard backend")]
pub struct Cli {
    /// Backend origin for REST and WebSocket traffic.
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Config file; defaults to ./dashboard.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a new concept.
    Submit(DraftArgs),
    Owner {
        #[command(subcommand)]
        action: OwnerAction,
    },
    Concept {
        #[command(subcommand)]
        action: ConceptAction,
    },
    /// One-shot listing of peers that advertise an owner.
    Peers,
    /// Follow a live collection until it ends or Ctrl-C.
    Watch {
        #[arg(value_enum)]
        collection: Collection,
    },
}

#[derive(Subcommand, Debug)]
pub enum OwnerAction {
    Get,
    /// Replace the owner record, then print the stored value.
    Set {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConceptAction {
    Get { guid: String },
    Query(FilterArgs),
    Delete { guid: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Collection {
    Concepts,
    Peers,
}

#[derive(Args, Debug)]
pub struct DraftArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub description: String,
    #[arg(long = "type")]
    pub kind: String,
    #[arg(long)]
    pub content: String,
}

impl From<DraftArgs> for ConceptDraft {
    fn from(args: DraftArgs) -> Self {
        Self {
            name: args.name,
            description: args.description,
            kind: args.kind,
            content: args.content,
        }
    }
}

pub fn owner_draft(name: String, description: String) -> OwnerDraft {
    OwnerDraft { name, description }
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub cid: Option<String>,
    #[arg(long)]
    pub guid: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long = "type")]
    pub kind: Option<String>,
    /// Only concepts stamped after this RFC 3339 instant.
    #[arg(long)]
    pub after: Option<DateTime<Utc>>,
}

impl From<FilterArgs> for ConceptFilter {
    fn from(args: FilterArgs) -> Self {
        Self {
            cid: args.cid,
            guid: args.guid,
            name: args.name,
            description: args.description,
            kind: args.kind,
            timestamp_after: args.after,
        }
    }
}
