//! Fixed-point closure of classes reachable from the main dex roots.
//!
//! Two kinds of discovery feed one pending queue:
//!
//! - hierarchy expansion pushes to the front, depth first, so that a class's
//!   superclass and interfaces are queued ahead of it;
//! - roots are processed one at a time, each draining the queue completely.
//!
//! A class is finalized once its constant pool has been scanned. Finalized and
//! pending names are never enqueued again, which bounds the work on cyclic
//! class graphs.

use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use tracing::{debug, trace};

use crate::classfile::{ClassDescriptor, ClassName};
use crate::classpath::ClassSource;
use crate::descriptor::DecodeError;
use crate::scan::referenced_class_names;

#[derive(Debug, Error)]
pub enum ClosureError {
    #[error("Class {name} is missing from original class path {classpath}")]
    MissingRoot { name: ClassName, classpath: String },
    #[error("Failed to load class {name}")]
    Unreadable {
        name: ClassName,
        #[source]
        source: anyhow::Error,
    },
    #[error("Invalid descriptor referenced from {name}")]
    Descriptor {
        name: ClassName,
        #[source]
        source: DecodeError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    /// A root: absence means the roots and the classpath disagree.
    Required,
    /// Reached through expansion: absence means it lives in the platform libraries.
    Optional,
}

#[derive(Debug, Default)]
pub struct ClosureBuilder {
    pending: VecDeque<ClassName>,
    queued: HashSet<ClassName>,
    finalized: Vec<ClassName>,
    done: HashSet<ClassName>,
}

impl ClosureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `root` and everything it transitively requires.
    pub fn add_root<S>(&mut self, root: &ClassName, source: &mut S) -> Result<(), ClosureError>
    where
        S: ClassSource + std::fmt::Display + ?Sized,
    {
        debug!(root = %root, "expanding root");
        self.visit(root.clone(), Lookup::Required, source)?;
        while let Some(name) = self.pop_pending() {
            self.visit(name, Lookup::Optional, source)?;
        }
        Ok(())
    }

    pub fn into_class_names(self) -> Vec<ClassName> {
        self.finalized
    }

    fn visit<S>(&mut self, name: ClassName, lookup: Lookup, source: &mut S) -> Result<(), ClosureError>
    where
        S: ClassSource + std::fmt::Display + ?Sized,
    {
        if self.done.contains(&name) {
            return Ok(());
        }

        let Some(class) = load(&name, source)? else {
            return match lookup {
                Lookup::Required => Err(ClosureError::MissingRoot {
                    classpath: source.to_string(),
                    name,
                }),
                Lookup::Optional => {
                    trace!(class = %name, "dropped, not on classpath");
                    Ok(())
                }
            };
        };

        let references =
            referenced_class_names(&class).map_err(|source| ClosureError::Descriptor {
                name: name.clone(),
                source,
            })?;
        for referenced in references {
            self.add_with_hierarchy(referenced, source)?;
        }

        self.done.insert(name.clone());
        self.finalized.push(name);
        Ok(())
    }

    fn add_with_hierarchy<S>(&mut self, name: ClassName, source: &mut S) -> Result<(), ClosureError>
    where
        S: ClassSource + ?Sized,
    {
        if self.done.contains(&name) || self.queued.contains(&name) {
            return Ok(());
        }

        let Some(class) = load(&name, source)? else {
            // Not on the classpath: provided by the platform libraries.
            trace!(class = %name, "assumed platform class");
            return Ok(());
        };

        self.push_front(name);

        if let Some(superclass) = &class.superclass {
            self.add_with_hierarchy(ClassName::from_internal(superclass), source)?;
        }
        for interface in &class.interfaces {
            self.add_with_hierarchy(ClassName::from_internal(interface), source)?;
        }
        Ok(())
    }

    fn push_front(&mut self, name: ClassName) {
        self.queued.insert(name.clone());
        self.pending.push_front(name);
    }

    fn pop_pending(&mut self) -> Option<ClassName> {
        let name = self.pending.pop_front()?;
        self.queued.remove(&name);
        Some(name)
    }
}

fn load<S>(name: &ClassName, source: &mut S) -> Result<Option<ClassDescriptor>, ClosureError>
where
    S: ClassSource + ?Sized,
{
    source
        .find_class(name)
        .map_err(|source| ClosureError::Unreadable {
            name: name.clone(),
            source,
        })
}

/// Computes the main dex class list for `roots`, in finalization order.
pub fn build<S>(roots: &[ClassName], source: &mut S) -> Result<Vec<ClassName>, ClosureError>
where
    S: ClassSource + std::fmt::Display + ?Sized,
{
    let mut builder = ClosureBuilder::new();
    for root in roots {
        builder.add_root(root, source)?;
    }
    Ok(builder.into_class_names())
}
