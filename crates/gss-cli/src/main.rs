mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use gss_core::{load_sources, CompileConfig, CompileError, Compiler};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build {
            inputs,
            config,
            output,
            lenient,
            expression,
        } => build(&inputs, config, output, lenient, expression),
        Commands::Conditions { inputs } => conditions(&inputs),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build(
    inputs: &[PathBuf],
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    lenient: bool,
    expression: bool,
) -> Result<()> {
    let mut config = match config {
        Some(path) => CompileConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CompileConfig::default(),
    };
    config.lenient |= lenient;

    let source = load_sources(inputs).context("Failed to load stylesheets")?;
    let compiler = Compiler::new(config);
    let compiled = match compiler.compile_source(&source.name, &source.text) {
        Ok(compiled) => compiled,
        Err(CompileError::Failed { errors }) => {
            for error in &errors {
                eprintln!("{}: {}", source.name, error);
            }
            anyhow::bail!("{} failed with {} error(s)", source.name, errors.len());
        }
        Err(err) => return Err(err).context("Failed to compile"),
    };

    info!(
        external = ?compiled.external_classes,
        axes = ?compiled.permutation_axes,
        conditions = ?compiled.boolean_conditions,
        flipped = compiled.flipped(),
        "compiled {}",
        source.name
    );

    let text = if expression || compiled.flipped() || compiled.ltr.is_expression() {
        compiled.to_expression()
    } else {
        compiled.ltr.as_str().to_string()
    };

    match output {
        Some(path) => fs::write(&path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", text),
    }
    Ok(())
}

fn conditions(inputs: &[PathBuf]) -> Result<()> {
    let source = load_sources(inputs).context("Failed to load stylesheets")?;
    let prepared = Compiler::new(CompileConfig::default())
        .prepare_source(&source.name, &source.text)
        .context("Failed to parse stylesheets")?;

    let report = serde_json::json!({
        "permutation_axes": prepared.permutation_axes(),
        "boolean_conditions": prepared.boolean_conditions(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
