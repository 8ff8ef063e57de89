use anyhow::{Context, Result};
use clap::Parser;
use main_dex_list::classpath::ClassPath;
use main_dex_list::cli::Cli;
use main_dex_list::closure;
use main_dex_list::config::{RunConfig, resolve_log_filter};
use main_dex_list::report::{MainDexReport, render, write_output};
use main_dex_list::roots::{KeepList, read_roots};
use std::time::Instant;
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = RunConfig::from_cli(&cli)?;
    run(&config).context("A fatal error occurred")
}

fn init_logging(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_new(resolve_log_filter(cli)).unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(config: &RunConfig) -> Result<()> {
    let start = Instant::now();
    debug!(
        keep_annotated = config.keep_annotated,
        roots = %config.roots.display(),
        "starting main dex computation"
    );
    if config.keep_annotated {
        debug!("runtime-annotated classes are not forced into the main dex");
    }

    let keep = config
        .keep_list
        .as_deref()
        .map(KeepList::read)
        .transpose()?;
    if let Some(keep) = &keep {
        if keep.is_empty() {
            warn!("keep list is empty, no roots will be kept");
        }
        debug!(entries = keep.len(), "keep list loaded");
    }

    let roots = read_roots(&config.roots, keep.as_ref())?;

    let mut classpath = ClassPath::open(&config.classpath)?;
    let definition = classpath.to_string();
    let result = closure::build(&roots, &mut classpath);
    classpath.close();
    let classes = result?;

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        roots = roots.len(),
        classes = classes.len(),
        duration_ms,
        "main dex list computed"
    );

    let report = MainDexReport::new(&config.roots, definition, roots.len(), &classes, duration_ms);
    let content = render(&report, config.format)?;
    write_output(&content, config.output.as_deref())
}
