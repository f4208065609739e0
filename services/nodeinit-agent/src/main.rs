use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use nodeinit_core::{logging, Config};
use nodeinit_identity::{ActivationLoop, AmiRegistry};

mod exporter;

use exporter::RecordExporter;

#[derive(Debug, PartialEq)]
struct Options {
    config_path: PathBuf,
    record_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let options = parse_options(&args)?;

    let config = Config::from_file(&options.config_path)
        .with_context(|| format!("loading {}", options.config_path.display()))?;
    logging::init(&config.logger)?;

    info!(
        config = %options.config_path.display(),
        engine = %config.engine.kind,
        proofs = config.init.activate.fingerprints.len(),
        "nodeinit agent starting"
    );

    let exporter = Arc::new(RecordExporter::new(options.record_path));
    let activation = ActivationLoop::new(&config, &AmiRegistry::with_native(), exporter)?;
    activation.start()?;

    let mut activated = activation.activated();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
            info!("shutdown requested");
        }
        _ = activated.wait_for(|done| *done) => {
            info!("node activated; exiting");
        }
    }

    activation.close().await;
    Ok(())
}

fn parse_options(args: &[String]) -> anyhow::Result<Options> {
    let mut config_path = None;
    let mut record_path = None;

    let mut args_iter = args.iter().skip(1);
    while let Some(arg) = args_iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = args_iter
                    .next()
                    .context("--config was provided without a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "--record" => {
                let path = args_iter
                    .next()
                    .context("--record was provided without a path")?;
                record_path = Some(PathBuf::from(path));
            }
            other => anyhow::bail!("unrecognized argument: {}", other),
        }
    }

    Ok(Options {
        config_path: config_path.context("missing required --config <path> argument")?,
        record_path,
    })
}
