use anyhow::{Result, bail};
use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;

use crate::cli::{Cli, OutputFormat};

pub const LOG_ENV: &str = "MAIN_DEX_LOG";

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub roots: PathBuf,
    pub classpath: Vec<PathBuf>,
    pub keep_annotated: bool,
    pub keep_list: Option<PathBuf>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Ok(Self {
            roots: cli.roots.clone(),
            classpath: split_classpath(&cli.classpath)?,
            keep_annotated: !cli.disable_annotation_resolution_workaround,
            keep_list: cli.keep_list.clone(),
            format: cli.format,
            output: cli.output.clone(),
        })
    }
}

pub fn split_classpath(definition: &OsStr) -> Result<Vec<PathBuf>> {
    let elements: Vec<PathBuf> = env::split_paths(definition)
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    if elements.is_empty() {
        bail!("Wrong classpath: {:?} names no archive or directory", definition);
    }
    Ok(elements)
}

/// `MAIN_DEX_LOG` wins over the verbosity flags.
pub fn resolve_log_filter(cli: &Cli) -> String {
    if let Ok(filter) = env::var(LOG_ENV)
        && !filter.trim().is_empty()
    {
        return filter;
    }

    if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        "warn".to_string()
    }
}
