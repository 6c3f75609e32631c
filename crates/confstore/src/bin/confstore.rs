//! `confstore`: apply one request to a JSON configuration document.
//!
//! Usage:
//!   confstore --schema schema.json --data running.json get /system
//!   confstore --schema schema.json --data running.json create /zones '{"zone": {"domain": "a"}}'
//!
//! Logging goes to stderr; set `RUST_LOG` (default `warn`).

use clap::Parser;
use confstore::cli::{run, Cli};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(Some(output)) => println!("{output}"),
        Ok(None) => {}
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
