use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use docintel::collection::process_manifest;
use docintel::config::{collection_paths, Config};
use docintel::{AnalysisEngine, PdfEngine, SimulatedEngine};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} [--simulate] <input_json_path> <output_json_path>");
    eprintln!("       {program} [--simulate] --collections [collections_dir]");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.log_level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args: Vec<String> = std::env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "docintel".to_string());
    let simulate = args.iter().any(|a| a == "--simulate");
    args.retain(|a| a != "--simulate");

    let engine: Arc<dyn AnalysisEngine> = if simulate {
        Arc::new(SimulatedEngine::new(config.engine.simulated_step))
    } else {
        Arc::new(PdfEngine::new(config.engine.clone()))
    };
    info!(engine = engine.name(), "docintel v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling analysis");
            on_interrupt.cancel();
        }
    });

    match args.get(1).map(String::as_str) {
        Some("--collections") => {
            let root = args
                .get(2)
                .map(PathBuf::from)
                .unwrap_or_else(|| config.collections_dir.clone());
            run_collections(engine.as_ref(), &config, &root, cancel).await
        }
        Some(input) if args.len() == 3 => {
            process_manifest(
                engine.as_ref(),
                Path::new(input),
                Path::new(&args[2]),
                config.engine.timeout,
                cancel,
            )
            .await?;
            Ok(())
        }
        _ => usage(&program),
    }
}

async fn run_collections(
    engine: &dyn AnalysisEngine,
    config: &Config,
    root: &Path,
    cancel: CancellationToken,
) -> Result<()> {
    let collections = collection_paths(root)?;
    if collections.is_empty() {
        anyhow::bail!("No collections with an input manifest under {}", root.display());
    }

    let mut failed = 0;
    for (name, input, output) in &collections {
        if cancel.is_cancelled() {
            break;
        }
        info!(collection = %name, "processing collection");
        if let Err(e) =
            process_manifest(engine, input, output, config.engine.timeout, cancel.clone()).await
        {
            error!(collection = %name, "{e:#}");
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} collections failed", collections.len());
    }
    Ok(())
}
