use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::{info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use veml_loader::{
    load_loader_config_from_env, CancelToken, Collaborators, DocumentLoader, FileFetcher,
    LogEnvelope, LogForwardLayer, MemoryStore,
};
use veml_runtime::{
    assign_and_flatten, document_url, load_document, validate, walk_breadth_first,
};

mod host;

use host::DryRunHost;

#[derive(Parser, Debug)]
#[command(author, version, about = "VEML document inspector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect, migrate and validate a document, then summarize its contents.
    Inspect { path: PathBuf },
    /// Print (or write) the document migrated to the current revision.
    Migrate {
        path: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Run the full loader against a host that instantiates nothing.
    Load {
        /// Document path or URL.
        location: String,
        /// Entity wait timeout in seconds; overrides the loader config.
        #[arg(long)]
        timeout: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (forward, warnings) = LogForwardLayer::channel();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env()),
        )
        .with(forward.with_min_level(Level::WARN))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Inspect { path } => inspect(&path)?,
        Command::Migrate { path, output } => migrate(&path, output)?,
        Command::Load { location, timeout } => load(&location, timeout).await?,
    }

    let warnings: Vec<LogEnvelope> = warnings.try_iter().collect();
    if !warnings.is_empty() {
        eprintln!("{} warning(s):", warnings.len());
        for warning in &warnings {
            eprintln!("  [{}] {}", warning.target, warning.message);
        }
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)?;
    let mut migration = load_document(&bytes)?;
    for warning in &migration.warnings {
        tracing::warn!(target: "veml::migration", "{warning}");
    }
    let graph = assign_and_flatten(&mut migration.document.environment.entities)?;
    validate(&migration.document, &graph)?;

    let document = &migration.document;
    println!("title:    {}", document.metadata.title.as_deref().unwrap_or("(untitled)"));
    println!(
        "revision: {} ({} step(s) to current)",
        migration.source_version,
        migration.steps_applied()
    );
    println!("entities: {}", graph.len());

    let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
    let mut max_depth = 0;
    for entry in &graph {
        *kinds.entry(entry.entity.kind.tag()).or_default() += 1;
        max_depth = max_depth.max(entry.depth);
    }
    for (kind, count) in &kinds {
        println!("  {kind:<16} {count}");
    }
    println!("depth:    {max_depth}");

    let untagged = walk_breadth_first(&document.environment.entities)
        .filter(|(entity, _)| entity.tag.is_empty())
        .count();
    if untagged > 0 {
        println!("untagged: {untagged}");
    }
    Ok(())
}

fn migrate(path: &Path, output: Option<PathBuf>) -> Result<()> {
    let bytes = std::fs::read(path)?;
    let migration = load_document(&bytes)?;
    let json = serde_json::to_string_pretty(&migration.document)?;
    match output {
        Some(output) => {
            std::fs::write(&output, json)?;
            info!(
                from = %migration.source_version,
                output = %output.display(),
                "migrate.written"
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn load(location: &str, timeout: Option<f64>) -> Result<()> {
    let uri = document_url(location)?;
    let (config, metadata) = load_loader_config_from_env();
    if let Some(path) = metadata.path() {
        info!(path = %path.display(), "loader_config.path");
    }
    let config = match timeout {
        Some(secs) => {
            let timeout = Duration::try_from_secs_f64(secs)
                .map_err(|err| eyre!("invalid timeout {secs}: {err}"))?;
            Arc::new((*config).clone().with_timeout(timeout))
        }
        None => config,
    };

    let host = Arc::new(DryRunHost::new());
    let collaborators = Collaborators {
        fetcher: Arc::new(FileFetcher),
        store: Arc::new(MemoryStore::new()),
        runtime: host.clone(),
        scripts: host.clone(),
        input: host.clone(),
        sync: host,
    };
    let loader = DocumentLoader::new(config, collaborators);
    let report = loader.load(&uri, &CancelToken::new()).await?;

    println!("loaded:   {}", report.uri);
    println!("title:    {}", report.title);
    println!("revision: {}", report.source_version);
    let states: Vec<&str> = report.states.iter().map(|state| state.as_str()).collect();
    println!("states:   {}", states.join(" -> "));
    println!("{}", serde_json::to_string_pretty(&report.metrics)?);
    Ok(())
}
