#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `saltwater`: classifies California water-quality monitoring stations as
//! saltwater or freshwater.
//!
//! Running with no subcommand is the same as `saltwater classify`. Uses
//! `indicatif-log-bridge` (via [`saltwater_cli_utils::init_logger`]) so log
//! lines and progress bars never fight for the terminal.

mod config;
mod pipeline;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use saltwater_fetch::{DEFAULT_TIMEOUT, ReqwestTransport};
use saltwater_fetch::ckan::{DEFAULT_CKAN_URL, DEFAULT_PAGE_SIZE};
use saltwater_fetch::events::LogEventSink;
use saltwater_source::registry;
use saltwater_source_models::SourceDefinition;
use saltwater_station::DEFAULT_RESOURCE_IDS;

use crate::config::{BufferOverride, DEFAULT_OUTPUT_NAME, RunConfig, resolve_buffer_overrides};

#[derive(Parser)]
#[command(
    name = "saltwater",
    about = "Classify California monitoring stations as saltwater or freshwater",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    classify: ClassifyArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full classification pipeline (default)
    Classify(ClassifyArgs),
    /// List the registered saltwater sources, their layers, and buffers
    Sources,
}

#[derive(Args, Debug, Clone)]
struct ClassifyArgs {
    /// Directory for fetch caches and the manually downloaded
    /// `SalineLakeBnd.zip`
    #[arg(long, default_value = "data_cache")]
    cache_dir: PathBuf,
    /// Result CSV path (default: `<cache-dir>/site_saltwater_flags.csv`)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
    /// CKAN rows requested per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u64,
    /// CKAN `datastore_search` endpoint
    #[arg(long, default_value = DEFAULT_CKAN_URL)]
    ckan_url: String,
    /// Station resource ID (repeatable; replaces the default resources)
    #[arg(long = "resource-id")]
    resource_ids: Vec<String>,
    /// Buffer override as `layer_id=meters` (repeatable)
    #[arg(long = "buffer")]
    buffers: Vec<BufferOverride>,
}

impl ClassifyArgs {
    fn into_run_config(
        self,
        sources: &[SourceDefinition],
    ) -> Result<RunConfig, Box<dyn std::error::Error>> {
        let buffer_overrides = resolve_buffer_overrides(&self.buffers, sources)?;

        let output = self
            .output
            .unwrap_or_else(|| self.cache_dir.join(DEFAULT_OUTPUT_NAME));
        let resource_ids = if self.resource_ids.is_empty() {
            DEFAULT_RESOURCE_IDS.iter().map(ToString::to_string).collect()
        } else {
            self.resource_ids
        };

        Ok(RunConfig {
            cache_dir: self.cache_dir,
            output,
            timeout: Duration::from_secs(self.timeout_secs),
            ckan_url: self.ckan_url,
            page_size: self.page_size,
            resource_ids,
            buffer_overrides,
        })
    }
}

fn list_sources() -> Result<(), Box<dyn std::error::Error>> {
    for source in registry::all_sources()? {
        println!("{} ({})", source.name, source.category);
        for layer in &source.layers {
            println!(
                "  {:<24} buffer {:>5} m  {:?}  {}",
                layer.id,
                layer.buffer_meters,
                layer.geometry,
                layer.name
            );
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = saltwater_cli_utils::init_logger();
    let cli = Cli::parse();

    let args = match cli.command {
        Some(Commands::Sources) => return list_sources(),
        Some(Commands::Classify(args)) => args,
        None => cli.classify,
    };

    log::info!("Starting saltwater classification at {}", chrono::Local::now());

    let sources = registry::all_sources()?;
    let config = args.into_run_config(&sources)?;
    let transport = ReqwestTransport::new(config.timeout)?;
    if let Err(e) = pipeline::run(&config, &sources, &transport, &multi, &LogEventSink) {
        log::error!("Saltwater classification failed: {e}");
        return Err(e);
    }

    Ok(())
}
