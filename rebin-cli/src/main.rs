use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rebin_axis::config::BinningConfig;
use rebin_axis::{Axis, CutSet, DescribeOptions};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Hierarchical axis rebinning: validate binning configurations and print
/// the resulting variable-width bin edges
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the flattened bin edges of every dimension as JSON
    Edges {
        /// Path to the binning configuration (.json)
        config: PathBuf,
    },

    /// Print the rebinning tree of every dimension
    Describe {
        /// Path to the binning configuration (.json)
        config: PathBuf,

        /// Describe flags, e.g. "base" or "noranges"
        #[arg(short, long, default_value = "")]
        flags: String,
    },

    /// Check that every dimension is tiled without gaps or overlaps
    Validate {
        /// Path to the binning configuration (.json)
        config: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: &Path) -> Result<BinningConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read binning configuration {}", path.display()))?;
    BinningConfig::from_json(&json)
        .with_context(|| format!("Failed to parse binning configuration {}", path.display()))
}

fn build<'a>(config: &BinningConfig, axes: &'a [Axis]) -> Result<CutSet<'a>> {
    let cuts = config.build_cut_set(axes)?;
    info!(dimensions = cuts.len(), "Built cut set");
    Ok(cuts)
}

/// Execute `cli`, writing command output to `out`.
///
/// Returns whether every dimension passed validation.
fn run(cli: Cli, out: &mut impl Write) -> Result<bool> {
    match cli.command {
        Commands::Edges { config } => {
            let config = load_config(&config)?;
            let axes = config.build_axes()?;
            let cuts = build(&config, &axes)?;
            if !cuts.validate() {
                anyhow::bail!("Binning configuration does not tile its axes");
            }
            let edges: serde_json::Map<String, serde_json::Value> = config
                .dimensions
                .iter()
                .enumerate()
                .zip(cuts.flattened_edges())
                .map(|((index, dim), edges)| (dim.display_name(index), edges.into()))
                .collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&edges)?)?;
            Ok(true)
        }
        Commands::Describe { config, flags } => {
            let options: DescribeOptions = flags.parse()?;
            let config = load_config(&config)?;
            let axes = config.build_axes()?;
            let cuts = build(&config, &axes)?;
            write!(out, "{}", cuts.describe(&options))?;
            Ok(true)
        }
        Commands::Validate { config } => {
            let config = load_config(&config)?;
            let axes = config.build_axes()?;
            let cuts = build(&config, &axes)?;
            let mut valid = true;
            for (index, (dim, node)) in config.dimensions.iter().zip(&cuts).enumerate() {
                let ok = node.validate_contiguity();
                writeln!(
                    out,
                    "{}: {}",
                    dim.display_name(index),
                    if ok { "ok" } else { "not contiguous" }
                )?;
                valid &= ok;
            }
            Ok(valid)
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let valid = run(cli, &mut io::stdout().lock())?;
    Ok(if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use tempfile::NamedTempFile;

    use super::*;

    const DEMO: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../demos/two_dimensions.json");

    /// Configuration whose second dimension has no ranges
    const UNTILED: &str = r#"{
        "dimensions": [
            {
                "name": "x",
                "axis": {"kind": "uniform", "bins": 4, "min": 0.0, "max": 4.0},
                "ranges": [{"group_size": 1}]
            },
            {
                "name": "y",
                "axis": {"kind": "uniform", "bins": 2, "min": 0.0, "max": 1.0}
            }
        ]
    }"#;

    fn run_args(args: &[&str]) -> Result<(bool, String)> {
        let cli = Cli::try_parse_from(std::iter::once("rebin").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        let valid = run(cli, &mut out)?;
        Ok((valid, String::from_utf8(out)?))
    }

    fn untiled_config() -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(UNTILED.as_bytes())?;
        Ok(file)
    }

    #[test]
    fn test_edges_of_demo() -> Result<()> {
        let (valid, out) = run_args(&["edges", DEMO])?;
        assert!(valid);
        let edges: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&out)?;
        assert_eq!(
            edges["pt"],
            serde_json::json!([
                0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 60.0, 70.0, 80.0,
                100.0
            ])
        );
        assert_eq!(
            edges["eta"],
            serde_json::json!([-2.5, -1.5, -0.8, 0.8, 1.5, 2.5])
        );
        Ok(())
    }

    #[test]
    fn test_validate_and_describe_demo() -> Result<()> {
        let (valid, out) = run_args(&["validate", DEMO])?;
        assert!(valid);
        assert_eq!(out, "pt: ok\neta: ok\n");

        let (_, out) = run_args(&["describe", DEMO, "--flags", "base"])?;
        assert!(out.starts_with("Dimension 0:\n"), "{out}");
        assert!(out.contains("Dimension 1:\n"), "{out}");
        Ok(())
    }

    #[test]
    fn test_untiled_config() -> Result<()> {
        let file = untiled_config()?;
        let path = file.path().to_str().context("Non UTF-8 temp path")?;

        let (valid, out) = run_args(&["validate", path])?;
        assert!(!valid);
        assert_eq!(out, "x: ok\ny: not contiguous\n");

        let err = run_args(&["edges", path]).unwrap_err();
        assert!(err.to_string().contains("does not tile"), "{err}");
        Ok(())
    }

    #[test]
    fn test_missing_config_is_reported() {
        let err = run_args(&["validate", "/nonexistent/cuts.json"]).unwrap_err();
        assert!(
            err.to_string().starts_with("Failed to read binning configuration"),
            "{err}"
        );
    }

    #[test]
    fn test_unknown_describe_flag() {
        assert!(run_args(&["describe", DEMO, "--flags", "verbose"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_describe_flags() {
        let cli = Cli::parse_from(["rebin", "describe", "cuts.json", "--flags", "base"]);
        match cli.command {
            Commands::Describe { config, flags } => {
                assert_eq!(config, PathBuf::from("cuts.json"));
                assert_eq!(flags, "base");
            }
            _ => panic!("Expected describe command"),
        }
    }
}
