use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::classfile::ClassName;
use crate::classpath::ClassPathElement;

/// Top-level classes allowed to seed the main dex, one per line.
#[derive(Debug, Clone, Default)]
pub struct KeepList {
    classes: HashSet<String>,
}

impl KeepList {
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read keep list: {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let classes = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| {
                let l = l.strip_suffix(".class").unwrap_or(l);
                l.replace('.', "/")
            })
            .collect();
        Self { classes }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains(&self, name: &ClassName) -> bool {
        self.classes.contains(name.outer_class())
    }
}

/// Root names from the entries of the roots container, in entry order.
pub fn collect_roots(container: &mut ClassPathElement, keep: Option<&KeepList>) -> Result<Vec<ClassName>> {
    let entries = container.list()?;
    let mut roots = Vec::new();
    for entry in entries {
        let Some(name) = ClassName::from_entry(&entry) else {
            continue;
        };
        if keep.is_some_and(|k| !k.contains(&name)) {
            continue;
        }
        roots.push(name);
    }

    debug!(
        container = %container.path().display(),
        roots = roots.len(),
        "collected roots"
    );
    Ok(roots)
}

pub fn read_roots(path: &Path, keep: Option<&KeepList>) -> Result<Vec<ClassName>> {
    let mut container = ClassPathElement::open(path)
        .with_context(|| format!("Failed to open roots container: {}", path.display()))?;
    let roots = collect_roots(&mut container, keep);
    container.close();
    roots
}
