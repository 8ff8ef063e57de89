use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::classfile::ClassName;
use crate::cli::OutputFormat;

#[derive(Debug, Serialize)]
pub struct MainDexReport<'a> {
    pub roots: String,
    pub classpath: String,
    pub root_count: usize,
    pub class_count: usize,
    pub duration_ms: u64,
    pub list_hash: String,
    pub classes: &'a [ClassName],
}

impl<'a> MainDexReport<'a> {
    pub fn new(
        roots: &Path,
        classpath: String,
        root_count: usize,
        classes: &'a [ClassName],
        duration_ms: u64,
    ) -> Self {
        Self {
            roots: roots.to_string_lossy().to_string(),
            classpath,
            root_count,
            class_count: classes.len(),
            duration_ms,
            list_hash: hash_list(classes),
            classes,
        }
    }
}

/// One entry name per line, as consumed by `--main-dex-list`.
pub fn render_text(classes: &[ClassName]) -> String {
    let mut out = String::new();
    for class in classes {
        out.push_str(class.as_entry());
        out.push('\n');
    }
    out
}

pub fn hash_list(classes: &[ClassName]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(render_text(classes).as_bytes());
    hex::encode(hasher.finalize())
}

pub fn render(report: &MainDexReport<'_>, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => render_text(report.classes),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(report)?;
            json.push('\n');
            json
        }
    })
}

pub fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write main dex list: {}", path.display()))?;
    } else {
        print!("{content}");
    }
    Ok(())
}
