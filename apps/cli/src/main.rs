//! `modpack-publish`: publish a modpack version to the object store
//!
//! Values come from `MODPACK_*` variables (a `.env` file is loaded first);
//! flags override them.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use publisher::{
    HttpObjectStore, IntoProgressCallback, LogProgressReporter, MemoryObjectStore, ObjectStore,
    PublishConfig, PublishError, Publisher, config::parse_libraries,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "modpack-publish", version, about = "Publish a modpack version")]
struct Cli {
    /// Project identifier, the first key segment under `stable/`
    #[arg(long)]
    project_id: Option<String>,

    /// Version name to publish; must not exist yet
    #[arg(long = "version-name")]
    version_name: Option<String>,

    /// Public URL the bucket is served from
    #[arg(long)]
    base_url: Option<String>,

    /// Directory holding `common/`, `server/` and `client/`
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// Library versions as `name=version,name=version`
    #[arg(long)]
    libraries: Option<String>,

    /// Markdown changelog uploaded next to the descriptor
    #[arg(long)]
    changelog: Option<PathBuf>,

    /// Number of concurrent upload workers
    #[arg(long)]
    workers: Option<usize>,

    /// Run the whole pipeline against an in-memory store
    #[arg(long)]
    dry_run: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, config: &mut PublishConfig) -> publisher::Result<bool> {
        if let Some(project_id) = self.project_id {
            config.project_id = Some(project_id);
        }
        if let Some(version_name) = self.version_name {
            config.version_name = Some(version_name);
        }
        if let Some(base_url) = self.base_url {
            config.base_download_url = Some(base_url);
        }
        if let Some(source_dir) = self.source_dir {
            config.source_dir = Some(source_dir);
        }
        if let Some(libraries) = self.libraries {
            config.libraries = parse_libraries(&libraries)?;
        }
        if let Some(changelog) = self.changelog {
            config.changelog = Some(changelog);
        }
        if let Some(workers) = self.workers {
            config.worker_count = Some(workers);
        }
        Ok(self.dry_run)
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(env_filter).init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = PublishConfig::from_env().map_err(report)?;
    let dry_run = cli.apply(&mut config).map_err(report)?;

    let upload = config.upload_config().map_err(report)?;
    let request = config.publish_request().map_err(report)?;

    let store: Arc<dyn ObjectStore> = if dry_run {
        info!("Dry run: nothing will leave this machine");
        Arc::new(MemoryObjectStore::new())
    } else {
        let settings = config.storage_settings(&upload).map_err(report)?;
        Arc::new(HttpObjectStore::new(settings).map_err(|e| report(PublishError::from(e)))?)
    };

    let summary = Publisher::new(store, upload)
        .with_progress_callback(LogProgressReporter::new().into_callback())
        .publish(request)
        .await
        .map_err(report)?;

    println!(
        "Published {}: {} uploaded, {} skipped ({} bytes) in {:.2?}",
        summary.version_name, summary.uploaded, summary.skipped, summary.bytes_uploaded, summary.elapsed
    );
    Ok(())
}

/// Log the full report before the error reaches the exit path
fn report(error: PublishError) -> anyhow::Error {
    error!("{}", error.detailed_report());
    anyhow::Error::new(error)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
