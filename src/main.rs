use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use checkengine::{
    load_autochecks, load_plugins, read_agent_output, save_autochecks, Engine, EngineConfig,
    HostKey, ParsedSectionsBroker, ServiceReport, SourceType,
};

#[derive(Parser, Debug)]
#[command(name = "checkengine")]
#[command(about = "Discover and check services from agent output")]
struct Args {
    /// Path to the engine configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover the services of a host and optionally store them
    Discover {
        #[command(flatten)]
        input: HostInput,

        /// Write the discovered services to the host's autochecks file
        #[arg(short, long)]
        write: bool,
    },

    /// Check the discovered services of a host
    Check {
        #[command(flatten)]
        input: HostInput,

        /// Export the service results to a JSON file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// List the registered check plugins
    Plugins,
}

#[derive(ClapArgs, Debug)]
struct HostInput {
    /// Host name
    #[arg(long)]
    host: String,

    /// Agent output of the host
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Agent output of the host's management board
    #[arg(long)]
    mgmt_file: Option<PathBuf>,

    /// Agent output of a cluster node, as NODE=PATH (repeatable)
    #[arg(long = "node", value_name = "NODE=PATH")]
    nodes: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let (sections, plugins) = load_plugins(
        checkengine_plugins::agent_sections(),
        checkengine_plugins::check_plugins(),
    )?;
    let mut engine = Engine::new(sections, plugins, config)?;

    match args.command {
        Command::Discover { input, write } => run_discover(&engine, &input, write),
        Command::Check { input, export } => run_check(&mut engine, &input, export.as_deref()),
        Command::Plugins => {
            list_plugins(&engine);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read one agent output file.
fn read_sections(path: &Path) -> Result<checkengine::RawSections> {
    Ok(read_agent_output(path)?)
}

/// Feed all agent output named on the command line into a broker.
fn fill_broker(broker: &mut ParsedSectionsBroker<'_>, input: &HostInput) -> Result<()> {
    if let Some(path) = &input.file {
        broker.add_raw_sections(HostKey::new(&input.host, SourceType::Host), read_sections(path)?);
    }
    if let Some(path) = &input.mgmt_file {
        broker.add_raw_sections(
            HostKey::new(&input.host, SourceType::Management),
            read_sections(path)?,
        );
    }
    for node in &input.nodes {
        let (name, path) = node
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid node {node:?}, expected NODE=PATH"))?;
        broker.add_raw_sections(
            HostKey::new(name, SourceType::Host),
            read_sections(Path::new(path))?,
        );
    }
    Ok(())
}

fn run_discover(engine: &Engine, input: &HostInput, write: bool) -> Result<()> {
    let mut broker = engine.broker();
    fill_broker(&mut broker, input)?;

    let entries = engine.discover(&input.host, &mut broker)?;
    for entry in &entries {
        let description = engine
            .plugins()
            .get_check_plugin(&entry.check_plugin_name)
            .map(|plugin| plugin.service_description(entry.item.as_deref()))
            .unwrap_or_else(|| entry.check_plugin_name.to_string());
        println!("{:<24} {}", entry.check_plugin_name, description);
    }

    if write {
        let path = engine.config().autochecks_path(&input.host);
        save_autochecks(&path, &entries)?;
        println!("Wrote {} services to {}", entries.len(), path.display());
    }
    Ok(())
}

fn run_check(engine: &mut Engine, input: &HostInput, export: Option<&Path>) -> Result<()> {
    let value_store = engine.config().value_store.clone();
    engine
        .load_value_store(&value_store)
        .with_context(|| format!("Failed to load value store {}", value_store.display()))?;

    let services = load_autochecks(&engine.config().autochecks_path(&input.host))?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?
        .as_secs_f64();

    let mut broker = engine.broker();
    fill_broker(&mut broker, input)?;
    let reports = engine.check(&input.host, &services, &mut broker, now)?;
    drop(broker);

    for report in &reports {
        print_report(report);
    }

    engine
        .save_value_store(&value_store)
        .with_context(|| format!("Failed to save value store {}", value_store.display()))?;

    if let Some(export_path) = export {
        let json = serde_json::to_string_pretty(&reports)?;
        std::fs::write(export_path, json)?;
        println!("Exported {} service results to: {}", reports.len(), export_path.display());
    }
    Ok(())
}

fn print_report(report: &ServiceReport) {
    let marker = if report.submit { "" } else { " (not submitted)" };
    println!("{:<32} {}{}", report.description, report.result, marker);
}

fn list_plugins(engine: &Engine) {
    for plugin in engine.plugins().iter() {
        let sections: Vec<&str> = plugin.sections.iter().map(|s| s.as_str()).collect();
        println!(
            "{:<24} {:<32} [{}]",
            plugin.name,
            plugin.service_name,
            sections.join(", ")
        );
    }
}
