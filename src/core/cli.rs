//! Command line interface for the Bezy backend
//!
//! Handles parsing command line arguments and provides
//! validation for user inputs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::core::config_file::ConfigFile;
use crate::core::errors::validate_source_path;
use crate::designspace::BackendOptions;

/// Bezy backend CLI arguments
///
/// Examples:
///   bezy-backend --source MyFont.designspace glyphs
///   bezy-backend --source MyFont.designspace glyph A
///   bezy-backend --source MyFont-Regular.ufo kerning
///   bezy-backend --source MyFont.designspace watch
///   bezy-backend --new-config
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "bezy-backend",
    version,
    about = "Inspect and watch designspace and UFO font sources",
    long_about = "Serves a .designspace document and its UFO sources, or a single UFO, as one variable-glyph font. Prints glyphs, axes, sources and kerning as JSON, and reports external edits to the source files."
)]
pub struct CliArgs {
    /// Path to a font source (UFO or designspace)
    #[clap(
        long = "source",
        short = 's',
        help = "Font source to open (UFO or designspace)",
        long_help = "Path to a font source. Accepts UFO directories (.ufo) for single master fonts or designspace files (.designspace) for variable fonts with multiple masters."
    )]
    pub font_source: Option<PathBuf>,

    /// Log level, overriding the config file
    #[clap(long = "log-level", help = "Log level filter (e.g. info, debug)")]
    pub log_level: Option<String>,

    /// Mark every written glyph with the overlap flag
    #[clap(
        long = "set-overlap-flag",
        help = "Mark written glyphs with public.truetype.overlap"
    )]
    pub set_overlap_simple_flag: bool,

    /// Initialize user configuration directory
    ///
    /// This creates the ~/.config/bezy directory with a backend.json
    /// holding the default settings and a logs/ directory.
    #[clap(
        long = "new-config",
        help = "Initialize user config directory with default settings"
    )]
    pub new_config: bool,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the glyph map (glyph name -> code points)
    Glyphs,
    /// Print one variable glyph
    Glyph { name: String },
    /// Print the axes and cross-axis mappings
    Axes,
    /// Print the font sources
    Sources,
    /// Print the kerning tables
    Kerning,
    /// Print the glyphs using a glyph as a component
    Uses { name: String },
    /// Delete a glyph from every source
    Delete { name: String },
    /// Report external edits until interrupted
    Watch,
}

impl CliArgs {
    /// Validate the CLI arguments after parsing
    ///
    /// This ensures that all paths exist and are valid before the backend
    /// opens them, providing clear error messages for common mistakes.
    pub fn validate(&self) -> Result<(), String> {
        if self.new_config {
            return Ok(());
        }
        let Some(path) = &self.font_source else {
            return Err("No font source given.\nUse --source <path> to pick a UFO or designspace.".into());
        };
        if self.command.is_none() {
            return Err("No command given.\nTry running with --help for usage information.".into());
        }
        validate_source_path(path)
    }

    /// Get the font source path if provided
    pub fn get_font_source(&self) -> Option<&PathBuf> {
        self.font_source.as_ref()
    }

    /// Log level from CLI args, config file, or default
    ///
    /// Priority order:
    /// 1. CLI argument (--log-level)
    /// 2. Config file setting (~/.config/bezy/backend.json)
    /// 3. Built-in default (info)
    pub fn get_log_level(&self, config: &ConfigFile) -> String {
        match &self.log_level {
            Some(level) => level.clone(),
            None => config.log_level.clone(),
        }
    }

    /// Backend tunables from the config file, with CLI flags applied on top.
    pub fn get_backend_options(&self, config: &ConfigFile) -> BackendOptions {
        let mut options = config.backend_options();
        if self.set_overlap_simple_flag {
            debug!("Overlap flag enabled from CLI");
            options.set_overlap_simple_flag = true;
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_and_command() {
        let args =
            CliArgs::try_parse_from(["bezy-backend", "--source", "Font.designspace", "glyph", "A"])
                .unwrap();
        assert_eq!(args.get_font_source(), Some(&PathBuf::from("Font.designspace")));
        assert_eq!(args.command, Some(Command::Glyph { name: "A".into() }));
    }

    #[test]
    fn cli_flags_override_config() {
        let args = CliArgs::try_parse_from([
            "bezy-backend",
            "--log-level",
            "debug",
            "--set-overlap-flag",
            "axes",
        ])
        .unwrap();
        let config = ConfigFile::default();
        assert_eq!(args.get_log_level(&config), "debug");
        assert!(args.get_backend_options(&config).set_overlap_simple_flag);
        assert!(args.validate().is_err());
    }
}
