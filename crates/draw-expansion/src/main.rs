//! Draw Expansion

use clap::Parser as _;
use color_eyre::eyre::{Result, WrapErr as _};
use draw_expansion::{batch, compute, config, draws};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

fn main() -> Result<()> {
    color_eyre::install()?;
    setup_logging()?;
    let config = config::Config::parse();
    tracing::info!("Initialising with config: {config:?}",);

    match &config.command {
        config::Commands::Expand(expand_config) => expand(expand_config)?,
        config::Commands::Batch(batch_config) => expand_batch(batch_config)?,
    }

    Ok(())
}

/// Setup logging.
fn setup_logging() -> Result<()> {
    let filters = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("draw_expansion=info".parse()?)
        .from_env_lossy();
    let filter_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filters);
    let tracing_setup = tracing_subscriber::registry().with(filter_layer);
    tracing_setup.init();

    Ok(())
}

/// Set up the kernel on the requested backend.
fn expander(dispatch: &config::Dispatch) -> Result<compute::Expander> {
    compute::Expander::new(dispatch.backend, dispatch.lanes, dispatch.partition)
}

/// Expand a descriptors file as-is.
fn expand(config: &config::Expand) -> Result<()> {
    let descriptors = draws::read::read(&config.input)?;
    let expander = expander(&config.dispatch)?;

    tracing::info!("Expanding {} draws", descriptors.len());
    let commands = expander.expand(&descriptors)?;
    output(&config.dispatch, &commands)
}

/// Load every descriptor's geometry into batches, then expand every batch.
fn expand_batch(config: &config::Batch) -> Result<()> {
    let descriptors = draws::read::read(&config.input)?;
    let expander = expander(&config.dispatch)?;

    let mut manager = batch::manager::BatchManager::new(config.capacity);
    for (draw_id, descriptor) in descriptors.iter().enumerate() {
        let _placed = manager
            .add(descriptor.vertex_count, descriptor.index_count)
            .wrap_err_with(|| format!("Couldn't add draw {draw_id} to a batch"))?;
    }

    tracing::info!(
        "Expanding {} draws across {} batches",
        manager.draw_count(),
        manager.len()
    );
    let all_commands = manager.update_all(&expander)?;
    let batch_count = all_commands.len();
    for (index, commands) in all_commands.into_iter().enumerate() {
        let dispatch = if batch_count > 1 {
            tracing::info!("Batch {index}");
            config::Dispatch {
                output: config
                    .dispatch
                    .output
                    .as_deref()
                    .map(|path| draws::write::numbered(path, index)),
                ..config.dispatch.clone()
            }
        } else {
            config.dispatch.clone()
        };
        output(&dispatch, commands)?;
    }
    Ok(())
}

/// Save the indirect buffer, or print it when there's nowhere to save it.
fn output(dispatch: &config::Dispatch, commands: &[kernel::command::DrawCommand]) -> Result<()> {
    match &dispatch.output {
        Some(path) => draws::write::write(path, commands),
        None => draws::table::print(commands),
    }
}
