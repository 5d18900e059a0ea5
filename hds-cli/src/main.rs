//! Command-line harness that drives `hds-core` against a live HDS manifest
//! URL, printing the decoded sample stream one packet at a time.
//!
//! Analogous in spirit to the teacher's `hls-vod-lib/src/tests/playlist_dump.rs`
//! and `dts_debug.rs` debug binaries, and to `hls-vod-server`'s role of
//! exercising `hls-vod-lib` end to end.

mod b64;
mod config;
mod error;
mod fetcher;
mod xmldom;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hds_core::demux::{probe_filename, DemuxerCore};
use hds_core::error::DemuxError;

use crate::b64::StdBase64;
use crate::config::DumpConfig;
use crate::error::{CliError, Result};
use crate::fetcher::HttpFetcher;
use crate::xmldom::OwnedXmlNode;

#[derive(Parser, Debug)]
#[command(name = "hds-cli")]
#[command(author, version, about = "Adobe HDS demuxer command-line harness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a manifest and print every decoded sample until end of stream.
    Dump {
        /// Manifest URL, e.g. `https://host/path/stream.f4m?auth=...`.
        manifest_url: String,

        /// Path to a `DumpConfig` TOML file. Falls back to defaults if omitted
        /// or unreadable.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Report whether a filename would be claimed by the HDS demuxer.
    Probe { filename: String },
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Command::Dump { manifest_url, config } => dump(&manifest_url, config.as_deref()),
        Command::Probe { filename } => {
            let matched = probe_filename(&filename);
            println!("{}", if matched { "hds" } else { "no match" });
            Ok(())
        }
    }
}

fn dump(manifest_url: &str, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = DumpConfig::load(config_path);
    tracing::info!(?config, "loaded configuration");

    let http = reqwest::blocking::Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.read_timeout())
        .build()?;

    tracing::info!(url = manifest_url, "fetching manifest");
    let manifest_bytes = http.get(manifest_url).send()?.bytes()?;
    let manifest_text = String::from_utf8_lossy(&manifest_bytes);

    let doc = roxmltree::Document::parse(&manifest_text)?;
    let root = OwnedXmlNode::from_roxmltree(doc.root_element());

    let fetcher = HttpFetcher::new(config.connect_timeout(), config.read_timeout());
    let decoder = StdBase64;

    let mut core = DemuxerCore::open(manifest_url, &root, &fetcher, &decoder)?;
    tracing::info!(
        programs = core.programs.len(),
        streams = core.streams.len(),
        "session opened"
    );
    for program in &core.programs {
        tracing::info!(name = %program.name, "registered program");
    }

    let mut packets = 0usize;
    loop {
        if packets >= config.max_packets {
            tracing::info!(packets, "hit max_packets, stopping");
            break;
        }
        match core.read_packet(&fetcher) {
            Ok(Some(packet)) => {
                println!(
                    "stream={} dts_ms={} bytes={}",
                    packet.stream_index,
                    packet.dts_ms,
                    packet.data.len()
                );
                packets += 1;
            }
            Ok(None) => {
                tracing::debug!("no packet this call, retrying");
            }
            Err(DemuxError::EndOfStream) => {
                tracing::info!(packets, "end of stream");
                break;
            }
            Err(e) => return Err(CliError::Demux(e)),
        }
    }

    core.close();
    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hds_cli=info,hds_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
