//! `confstore` command line.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use confstore_path::{KeyTuple, PathFormat};
use serde_json::Value;
use thiserror::Error;

use crate::config::{ConfigError, DatastoreConfig};
use crate::datastore::Datastore;
use crate::engine::InsertMode;
use crate::error::DatastoreError;
use crate::rpc::Rpc;
use crate::schema::{SchemaError, SchemaTree};

#[derive(Parser, Debug)]
#[command(name = "confstore")]
#[command(about = "Read and edit a schema-governed JSON configuration document")]
#[command(version)]
pub struct Cli {
    /// Schema description (JSON, or TOML by extension)
    #[arg(long, value_name = "PATH")]
    pub schema: PathBuf,

    /// Data document; starts empty if the file does not exist
    #[arg(long, value_name = "PATH")]
    pub data: Option<PathBuf>,

    /// Datastore configuration (TOML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// User the request runs as
    #[arg(long, short)]
    pub user: Option<String>,

    /// Paths are instance identifiers instead of resource identifiers
    #[arg(long)]
    pub xpath: bool,

    /// Do not write the data document back
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the node at a path
    Get { path: String },
    /// Add one member (or list entry) under a path
    Create {
        path: String,
        /// Single-member JSON object
        value: String,
        /// first, last, before or after
        #[arg(long)]
        insert: Option<InsertMode>,
        /// Comma-separated key values of the before/after entry
        #[arg(long)]
        point: Option<String>,
    },
    /// Replace the node at a path
    Update { path: String, value: String },
    /// Remove the node at a path
    Delete { path: String },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Datastore(#[from] DatastoreError),
    #[error("invalid JSON argument: {0}")]
    Json(#[from] serde_json::Error),
}

fn parse_point(point: &str) -> KeyTuple {
    KeyTuple(point.split(',').map(str::to_string).collect())
}

/// Run one command; returns what to print on stdout.
pub fn run(cli: &Cli) -> Result<Option<String>, CliError> {
    let schema = SchemaTree::from_path(&cli.schema)?;
    let config = match &cli.config {
        Some(path) => DatastoreConfig::from_path(path)?,
        None => DatastoreConfig::default(),
    };
    let ds = Datastore::builder(Arc::new(schema)).config(config).build();

    if let Some(data) = cli.data.as_ref().filter(|p| p.exists()) {
        ds.load(data)?;
    }

    let format = if cli.xpath { PathFormat::XPath } else { PathFormat::Url };
    let rpc = |path: &str| {
        let rpc = match &cli.user {
            Some(user) => Rpc::new(user.as_str()),
            None => Rpc::anonymous(),
        };
        rpc.path(path).format(format)
    };

    match &cli.command {
        Command::Get { path } => {
            let node = ds.get_node_rpc(&rpc(path.as_str()))?;
            return Ok(Some(serde_json::to_string_pretty(&ds.schema().to_raw(&node))?));
        }
        Command::Create { path, value, insert, point } => {
            let mut request = rpc(path.as_str()).input(serde_json::from_str::<Value>(value)?);
            request.insert = *insert;
            request.point = point.as_deref().map(parse_point);
            ds.create_node_rpc(&request)?;
        }
        Command::Update { path, value } => {
            ds.update_node_rpc(&rpc(path.as_str()).input(serde_json::from_str::<Value>(value)?))?;
        }
        Command::Delete { path } => ds.delete_node_rpc(&rpc(path.as_str()))?,
    }

    match &cli.data {
        Some(data) if !cli.dry_run => ds.save(data)?,
        _ => {
            let root = ds.data_root();
            return Ok(Some(serde_json::to_string_pretty(&ds.schema().to_raw(&root))?));
        }
    }
    Ok(None)
}
