//! Application runner logic
//!
//! Opens the backend named on the command line and runs one command
//! against it.

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::cli::{CliArgs, Command};
use crate::core::config_file::ConfigFile;
use crate::core::errors::BezyContext;
use crate::designspace::DesignspaceBackend;
use crate::logging;

/// Run the command given in `cli_args`. Handles `--new-config` first.
pub fn run_app(cli_args: CliArgs) -> Result<()> {
    if cli_args.new_config {
        return ConfigFile::initialize_config_directory();
    }

    let config = ConfigFile::load_or_default();
    let _log_guard = logging::init(&cli_args.get_log_level(&config), config.log_to_file)?;
    cli_args.validate().map_err(|message| anyhow!(message))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_command(cli_args, config))
}

async fn run_command(cli_args: CliArgs, config: ConfigFile) -> Result<()> {
    let (Some(path), Some(command)) = (cli_args.font_source.clone(), cli_args.command.clone())
    else {
        return Err(anyhow!("a font source and a command are required"));
    };
    let options = cli_args.get_backend_options(&config);
    let mut backend =
        DesignspaceBackend::open_with(&path, options).with_file_context("open", &path)?;

    match command {
        Command::Glyphs => print_json(&backend.glyph_map())?,
        Command::Glyph { name } => match backend.get_glyph(&name)? {
            Some(glyph) => print_json(&glyph)?,
            None => return Err(anyhow!("glyph '{name}' does not exist")),
        },
        Command::Axes => print_json(&backend.axes())?,
        Command::Sources => print_json(&backend.get_sources()?)?,
        Command::Kerning => print_json(&backend.get_kerning()?)?,
        Command::Uses { name } => print_json(&backend.find_glyphs_that_use_glyph(&name).await?)?,
        Command::Delete { name } => {
            backend.delete_glyph(&name)?;
            info!("Deleted '{}' from {:?}", name, path);
        }
        Command::Watch => watch(&mut backend).await?,
    }

    backend.close();
    Ok(())
}

/// Print reload patterns for external edits until Ctrl-C.
async fn watch(backend: &mut DesignspaceBackend) -> Result<()> {
    backend.watch_filesystem()?;
    backend.start_background_tasks();
    info!("Watching for external changes, press Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping");
                return Ok(());
            }
            change = backend.next_external_change() => match change {
                Ok(Some(pattern)) => print_json(&pattern)?,
                Ok(None) => return Ok(()),
                Err(e) => warn!("Could not process external change: {}", e),
            },
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
