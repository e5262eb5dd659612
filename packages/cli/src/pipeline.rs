//! Sequential classification pipeline.
//!
//! Loads every saltwater category, unions the extent, loads and projects
//! the monitoring stations, classifies them, and writes the result CSV.
//! Each stage reports through the shared [`EventSink`]; progress bars are
//! added to the [`MultiProgress`] registered with the log bridge.

use std::time::Instant;

use saltwater_classify::output::write_results;
use saltwater_cli_utils::{IndicatifProgress, MultiProgress};
use saltwater_fetch::Transport;
use saltwater_fetch::ckan::CkanClient;
use saltwater_fetch::events::{EventSink, PipelineEvent};
use saltwater_source::{LoadContext, load_category};
use saltwater_source_models::SourceDefinition;
use saltwater_spatial::{WorkingProjection, extent};

use crate::config::RunConfig;

/// Runs one classification pass over `sources`, fetching through
/// `transport`.
///
/// # Errors
///
/// Returns an error if a required source is missing (no network and no
/// cache, or the saline lakes archive is absent), a station resource
/// cannot be paginated, a CRS is unknown, or the output cannot be written.
pub fn run(
    config: &RunConfig,
    sources: &[SourceDefinition],
    transport: &dyn Transport,
    multi: &MultiProgress,
    events: &dyn EventSink,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let projection = WorkingProjection::default();

    std::fs::create_dir_all(&config.cache_dir)?;
    log::info!("Cache directory: {}", config.cache_dir.display());

    // --- Saltwater polygons ---
    let ctx = LoadContext {
        projection,
        buffer_overrides: &config.buffer_overrides,
        ..LoadContext::new(transport, events, &config.cache_dir)
    };

    let stages = IndicatifProgress::stages_bar(multi, "Loading saltwater sources", sources.len() as u64);
    let mut sets = Vec::with_capacity(sources.len());
    for source in sources {
        stages.set_message(format!("Loading {}", source.name));
        sets.push(load_category(source, &ctx)?);
        stages.inc(1);
    }
    stages.finish(format!("Loaded {} saltwater sources", sources.len()));

    let built = extent::build(projection, &sets)?;
    events.emit(PipelineEvent::ExtentBuilt {
        input_polygons: built.input_polygons,
        repaired: built.repaired,
        dropped: built.dropped,
        parts: built.extent.part_count(),
    });

    // --- Monitoring stations ---
    let client = CkanClient::new(transport, events, config.ckan_url.clone(), config.page_size);
    let rows_bar = IndicatifProgress::rows_bar(multi, "Fetching monitoring stations");
    let stations = saltwater_station::load(
        &client,
        &config.resource_ids,
        projection,
        events,
        rows_bar.as_ref(),
    )?;
    rows_bar.finish_and_clear();

    // --- Classify and write ---
    let results = saltwater_classify::classify(&stations, &built.extent, events)?;
    write_results(&config.output, &results, events)?;

    log::info!(
        "Saltwater classification completed in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
