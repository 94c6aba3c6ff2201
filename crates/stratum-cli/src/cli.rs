//! Command-line interface for the stratum utility
//!
//! Lays out JSON graph documents and writes the resulting positions as JSON.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing::info;

use crate::document::{GraphDocument, LayoutOutput};
use stratum::core::logging::init_logging;
use stratum::core::Direction;
use stratum::layout::HierarchicalConfig;

/// Stratum - Hierarchical layout for graph documents
#[derive(Parser)]
#[command(name = "stratum")]
#[command(about = "Lay out JSON graph documents with a layered hierarchical layout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Set log level (trace|debug|info|warn|error)
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Set log format (compact|pretty|json)
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Log level options
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format options
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lay out a graph document
    Layout {
        /// Input graph document (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file for the positions (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Flow direction; overrides the document and the config file
        #[arg(short, long, value_enum)]
        direction: Option<DirectionChoice>,

        /// JSON file with hierarchical layout settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check that a graph document can be loaded
    Validate {
        /// Input graph document (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show the available layouts
    Layouts {
        /// Show in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Flow directions accepted on the command line
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum DirectionChoice {
    /// Top to bottom
    #[value(alias = "tb")]
    Td,
    /// Bottom to top
    #[value(alias = "bt")]
    Bu,
    /// Left to right
    Lr,
    /// Right to left
    Rl,
}

impl From<DirectionChoice> for Direction {
    fn from(value: DirectionChoice) -> Self {
        match value {
            DirectionChoice::Td => Direction::TopDown,
            DirectionChoice::Bu => Direction::BottomUp,
            DirectionChoice::Lr => Direction::LeftRight,
            DirectionChoice::Rl => Direction::RightLeft,
        }
    }
}

/// Main CLI application
#[derive(Default)]
pub struct StratumApp;

impl StratumApp {
    pub fn new() -> Self {
        Self
    }

    /// Run the application with the given CLI arguments
    pub fn run(&mut self, cli: Cli) -> Result<()> {
        // Environment variables take precedence over the flags
        let log_level_str = std::env::var("STRATUM_LOG_LEVEL")
            .ok()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .or_else(|| Some(cli.log_level.as_str().to_string()));

        let log_format_str = std::env::var("STRATUM_LOG_FORMAT")
            .ok()
            .or_else(|| Some(cli.log_format.as_str().to_string()));

        if let Err(e) = init_logging(log_level_str.as_deref(), log_format_str.as_deref()) {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        if cli.verbose {
            eprintln!("Stratum v{}", env!("CARGO_PKG_VERSION"));
        }

        match cli.command {
            Commands::Layout {
                input,
                output,
                direction,
                config,
            } => self.layout_command(input, output, direction, config, cli.verbose),
            Commands::Validate { input } => self.validate_command(input, cli.verbose),
            Commands::Layouts { json } => self.layouts_command(json, cli.verbose),
        }
    }

    /// Handle the layout command
    fn layout_command(
        &self,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
        direction: Option<DirectionChoice>,
        config: Option<PathBuf>,
        verbose: bool,
    ) -> Result<()> {
        let content = self.read_input(input)?;
        if verbose {
            eprintln!("Read {} bytes of input", content.len());
        }

        let document = GraphDocument::from_json(&content)?;
        let config = self.resolve_config(&document, direction, config)?;
        let direction = config.direction;

        let loaded = document.layout(config)?;
        let positions = LayoutOutput::collect(&loaded, direction);
        info!(
            vertices = positions.vertices.len(),
            edges = positions.edges.len(),
            "Layout complete"
        );
        if verbose {
            eprintln!(
                "Laid out {} vertices and {} edges",
                positions.vertices.len(),
                positions.edges.len()
            );
        }

        let json = serde_json::to_string_pretty(&positions)?;
        self.write_output(output, &json)
    }

    /// Config file first, then the document direction, then the flag
    pub fn resolve_config(
        &self,
        document: &GraphDocument,
        direction: Option<DirectionChoice>,
        config: Option<PathBuf>,
    ) -> Result<HierarchicalConfig> {
        let mut resolved = match config {
            Some(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    anyhow!("Failed to read config file '{}': {}", path.display(), e)
                })?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid layout config '{}'", path.display()))?
            }
            None => HierarchicalConfig::default(),
        };
        if let Some(doc_direction) = document.direction {
            resolved.direction = doc_direction;
        }
        if let Some(flag) = direction {
            resolved.direction = flag.into();
        }
        Ok(resolved)
    }

    /// Handle the validate command
    fn validate_command(&self, input: Option<PathBuf>, verbose: bool) -> Result<()> {
        let content = self.read_input(input)?;
        if verbose {
            eprintln!("Read {} bytes of input", content.len());
        }

        match GraphDocument::from_json(&content).and_then(|doc| doc.load()) {
            Ok(loaded) => {
                println!(
                    "✓ Valid graph document: {} vertices, {} edges",
                    loaded.vertex_count(),
                    loaded.edge_count()
                );
                Ok(())
            }
            Err(e) => {
                println!("✗ Invalid graph document: {:#}", e);
                Err(e)
            }
        }
    }

    /// Handle the layouts command
    fn layouts_command(&self, json: bool, verbose: bool) -> Result<()> {
        if verbose {
            eprintln!("Listing available layouts");
        }

        if json {
            let layouts = serde_json::json!({
                "layouts": [
                    {
                        "name": "hierarchical",
                        "description": "Layered layout: cycle removal, ranking, crossing reduction, placement",
                        "config": HierarchicalConfig::default(),
                    },
                    {
                        "name": "stack",
                        "description": "Children side by side or on top of each other",
                        "config": stratum::layout::StackConfig::default(),
                    }
                ],
                "total": 2
            });
            println!("{}", serde_json::to_string_pretty(&layouts)?);
        } else {
            println!("Available layouts:");
            println!("  hierarchical  - Layered layout: cycle removal, ranking, crossing reduction, placement");
            println!("  stack         - Children side by side or on top of each other");
            println!();
            println!("Total: 2 layouts available");
        }

        Ok(())
    }

    /// Read input from file or stdin
    pub fn read_input(&self, input: Option<PathBuf>) -> Result<String> {
        match input {
            Some(path) if path.to_string_lossy() != "-" => fs::read_to_string(&path)
                .map_err(|e| anyhow!("Failed to read input file '{}': {}", path.display(), e)),
            _ => {
                let mut content = String::new();
                io::stdin().read_to_string(&mut content)?;
                Ok(content)
            }
        }
    }

    /// Write output to file or stdout
    pub fn write_output(&self, output: Option<PathBuf>, content: &str) -> Result<()> {
        match output {
            Some(path) if path.to_string_lossy() != "-" => {
                fs::write(&path, content).map_err(|e| {
                    anyhow!("Failed to write output file '{}': {}", path.display(), e)
                })?;
            }
            _ => {
                let mut stdout = io::stdout();
                if content.ends_with('\n') {
                    write!(stdout, "{}", content)?;
                } else {
                    writeln!(stdout, "{}", content)?;
                }
                stdout.flush()?;
            }
        }
        Ok(())
    }
}
