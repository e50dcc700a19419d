//! Binary entrypoint: load configuration, run one batch cycle, emit
//! notification JSON lines to stdout.
//!
//! Config files live in --config-dir (all optional except fault_types.txt):
//! fault_types.txt, static_mutes.txt, disablements.txt, revenue_hours.txt,
//! hostnames.txt, reassignments.txt, canonical_names.txt, log_sources.txt.
//! Durable state (stores, resume markers, export logs) lives in --data-dir.

use std::fs;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fault_engine::catalog::FaultTypeCatalog;
use fault_engine::config::Config;
use fault_engine::engine::Engine;
use fault_engine::ingest::LogSource;
use fault_engine::lookup::{CanonicalPairs, HostnameTable, Lookups, ReassignTable};
use fault_engine::router::JsonLineRouter;
use fault_engine::suppress::{Disablement, RevenueSchedule, StaticMute, SuppressionFilter};

#[derive(Parser, Debug)]
#[command(name = "fault-engine", about = "Batch fault alerting over rotating equipment logs")]
struct Args {
  /// Directory holding the configuration files.
  #[arg(long, default_value = "config")]
  config_dir: PathBuf,

  /// Directory for durable state (stores, markers, export logs).
  #[arg(long, default_value = "data")]
  data_dir: PathBuf,
}

fn read_optional(path: &Path) -> anyhow::Result<String> {
  match fs::read_to_string(path) {
    Ok(text) => Ok(text),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
    Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
  }
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let args = Args::parse();
  let cfg_dir = &args.config_dir;

  let types_path = cfg_dir.join("fault_types.txt");
  let types_text = fs::read_to_string(&types_path)
    .with_context(|| format!("reading {}", types_path.display()))?;
  let catalog = FaultTypeCatalog::parse(&types_text, &types_path.display().to_string());
  if catalog.is_empty() {
    bail!("no fault types configured in {}", types_path.display());
  }

  let mutes = StaticMute::parse_all(&read_optional(&cfg_dir.join("static_mutes.txt"))?, "static_mutes.txt");
  let canonical = CanonicalPairs::parse(
    &read_optional(&cfg_dir.join("canonical_names.txt"))?,
    "canonical_names.txt",
  );
  let disablements = Disablement::parse_all(
    &read_optional(&cfg_dir.join("disablements.txt"))?,
    "disablements.txt",
    &canonical,
  );
  let schedule = RevenueSchedule::parse(
    &read_optional(&cfg_dir.join("revenue_hours.txt"))?,
    "revenue_hours.txt",
  );
  let lookups = Lookups {
    hostnames: HostnameTable::parse(&read_optional(&cfg_dir.join("hostnames.txt"))?, "hostnames.txt"),
    reassign: ReassignTable::parse(
      &read_optional(&cfg_dir.join("reassignments.txt"))?,
      "reassignments.txt",
    ),
    canonical,
  };
  let sources = LogSource::parse_all(
    &read_optional(&cfg_dir.join("log_sources.txt"))?,
    "log_sources.txt",
  );
  if sources.is_empty() {
    bail!("no log sources configured in {}", cfg_dir.join("log_sources.txt").display());
  }

  let config = Config {
    store_dir: args.data_dir.join("stores"),
    marker_path: args.data_dir.join("markers.txt"),
    export_dir: args.data_dir.join("export"),
    ..Config::default()
  };

  let mut engine = Engine::new(
    config,
    catalog,
    SuppressionFilter::new(mutes, disablements, schedule),
    lookups,
    sources,
  );

  let stdout = io::stdout();
  let mut router = JsonLineRouter::new(BufWriter::new(stdout.lock()));
  let report = engine.run(&mut router, Utc::now())?;

  let failed: Vec<&str> = report
    .outcomes
    .iter()
    .filter(|o| o.error.is_some())
    .map(|o| o.type_code.as_str())
    .collect();
  if !failed.is_empty() {
    bail!("run finished with failed fault types: {}", failed.join(", "));
  }
  Ok(())
}
