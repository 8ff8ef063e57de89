//! Class lookup over an ordered list of archives and directories.

use anyhow::{Context, Result, bail};
use ignore::WalkBuilder;
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::classfile::{ClassDescriptor, ClassName};

/// Anything the closure builder can look classes up in.
pub trait ClassSource {
    /// `Ok(None)` when no element has the class.
    fn find_class(&mut self, name: &ClassName) -> Result<Option<ClassDescriptor>>;
}

pub enum ClassPathElement {
    Archive {
        path: PathBuf,
        archive: ZipArchive<Cursor<Mmap>>,
    },
    Folder {
        root: PathBuf,
    },
}

impl ClassPathElement {
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self::Folder {
                root: path.to_path_buf(),
            });
        }
        if path.is_file() {
            let file =
                File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            let mmap = unsafe { Mmap::map(&file) }
                .with_context(|| format!("Failed to mmap {}", path.display()))?;
            let archive = ZipArchive::new(Cursor::new(mmap)).with_context(|| {
                format!("\"{}\" can not be read as a zip archive", path.display())
            })?;
            return Ok(Self::Archive {
                path: path.to_path_buf(),
                archive,
            });
        }
        if path.exists() {
            bail!("\"{}\" is not a directory neither a zip file", path.display());
        }
        bail!("File \"{}\" not found", path.display())
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Archive { path, .. } => path,
            Self::Folder { root } => root,
        }
    }

    /// Reads the `/`-separated relative `entry`, `Ok(None)` if absent.
    pub fn read(&mut self, entry: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Archive { path, archive } => {
                let mut file = match archive.by_name(entry) {
                    Ok(file) => file,
                    Err(ZipError::FileNotFound) => return Ok(None),
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("Failed to read {entry} from {}", path.display())
                        });
                    }
                };
                if file.is_dir() {
                    return Ok(None);
                }
                let mut bytes = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut bytes)
                    .with_context(|| format!("Failed to inflate {entry} from {}", path.display()))?;
                Ok(Some(bytes))
            }
            Self::Folder { root } => {
                // Names come from constant pools and must stay below `root`.
                if entry.split('/').any(|s| s == "..") {
                    trace!(entry, "rejected entry outside classpath directory");
                    return Ok(None);
                }
                let file_path = entry
                    .split('/')
                    .filter(|s| !s.is_empty() && *s != ".")
                    .fold(root.clone(), |p, s| p.join(s));
                if file_path.is_dir() {
                    return Ok(None);
                }
                match std::fs::read(&file_path) {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                    Err(e) => {
                        Err(e).with_context(|| format!("Failed to read {}", file_path.display()))
                    }
                }
            }
        }
    }

    /// Relative `/`-separated names of every file in the element.
    pub fn list(&mut self) -> Result<Vec<String>> {
        match self {
            Self::Archive { path, archive } => {
                let mut names = Vec::with_capacity(archive.len());
                for i in 0..archive.len() {
                    let entry = archive
                        .by_index(i)
                        .with_context(|| format!("Failed to list {}", path.display()))?;
                    if entry.is_dir() {
                        continue;
                    }
                    names.push(entry.name().to_string());
                }
                Ok(names)
            }
            Self::Folder { root } => {
                let walker = WalkBuilder::new(&*root)
                    .standard_filters(false)
                    .build();

                let mut names = Vec::new();
                for entry in walker {
                    let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
                    if !entry.file_type().is_some_and(|t| t.is_file()) {
                        continue;
                    }
                    let Ok(relative) = entry.path().strip_prefix(&*root) else {
                        continue;
                    };
                    let name = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    names.push(name);
                }
                names.sort();
                Ok(names)
            }
        }
    }

    pub fn close(self) {
        trace!(element = %self.path().display(), "closing classpath element");
    }
}

impl fmt::Debug for ClassPathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive { path, .. } => f.debug_tuple("Archive").field(path).finish(),
            Self::Folder { root } => f.debug_tuple("Folder").field(root).finish(),
        }
    }
}

#[derive(Debug)]
pub struct ClassPath {
    definition: String,
    elements: Vec<ClassPathElement>,
}

impl ClassPath {
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        let mut elements = Vec::with_capacity(paths.len());
        for path in paths {
            let element = ClassPathElement::open(path).context("Wrong classpath")?;
            debug!(element = %path.display(), "opened classpath element");
            elements.push(element);
        }

        let definition = std::env::join_paths(paths)
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|_| {
                paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            });

        Ok(Self {
            definition,
            elements,
        })
    }

    /// Releases every element; failures cannot occur past this point.
    pub fn close(self) {
        let count = self.elements.len();
        for element in self.elements {
            element.close();
        }
        debug!(elements = count, "classpath released");
    }
}

impl fmt::Display for ClassPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.definition)
    }
}

impl ClassSource for ClassPath {
    fn find_class(&mut self, name: &ClassName) -> Result<Option<ClassDescriptor>> {
        for element in self.elements.iter_mut() {
            let bytes = match element.read(name.as_entry()) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    debug!(class = %name, error = %format!("{e:#}"), "lookup failed, trying next element");
                    continue;
                }
            };
            let class = ClassDescriptor::parse(&bytes).with_context(|| {
                format!("Malformed class file {} in {}", name, element.path().display())
            })?;
            return Ok(Some(class));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ClassFileBuilder;
    use std::io::Write;
    use std::time::{SystemTime, UNIX_EPOCH};
    use zip::write::FileOptions;

    fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "main_dex_list_test_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ))
    }

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
        let file = File::create(path)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for (name, content) in entries {
            zip.start_file(*name, options)?;
            zip.write_all(content)?;
        }

        zip.finish()?;
        Ok(())
    }

    #[test]
    fn archive_element_reads_and_lists_entries() -> Result<()> {
        let jar = temp_path("element.jar");
        let class = ClassFileBuilder::new("a/A").build();
        write_jar(
            &jar,
            &[("a/A.class", class.as_slice()), ("META-INF/MANIFEST.MF", b"")],
        )?;

        let mut element = ClassPathElement::open(&jar)?;
        assert!(matches!(element, ClassPathElement::Archive { .. }));
        assert_eq!(element.read("a/A.class")?, Some(class));
        assert_eq!(element.read("a/Missing.class")?, None);
        assert_eq!(element.list()?, vec!["a/A.class", "META-INF/MANIFEST.MF"]);

        element.close();
        std::fs::remove_file(jar)?;
        Ok(())
    }

    #[test]
    fn folder_element_reads_and_lists_files() -> Result<()> {
        let dir = temp_path("folder");
        std::fs::create_dir_all(dir.join("a/b"))?;
        std::fs::write(dir.join("a/b/C.class"), b"c")?;
        std::fs::write(dir.join("a/A.class"), b"a")?;

        let mut element = ClassPathElement::open(&dir)?;
        assert_eq!(element.read("a/b/C.class")?, Some(b"c".to_vec()));
        assert_eq!(element.read("a/b")?, None);
        assert_eq!(element.read("a/Nope.class")?, None);
        assert_eq!(element.list()?, vec!["a/A.class", "a/b/C.class"]);

        std::fs::remove_dir_all(dir)?;
        Ok(())
    }

    #[test]
    fn folder_element_stays_inside_its_root() -> Result<()> {
        let base = temp_path("escape");
        let root = base.join("classes");
        std::fs::create_dir_all(root.join("a"))?;
        std::fs::write(base.join("Outside.class"), b"outside")?;
        std::fs::write(root.join("a/A.class"), b"a")?;

        let mut element = ClassPathElement::open(&root)?;
        assert_eq!(element.read("../Outside.class")?, None);
        assert_eq!(element.read("a/../../Outside.class")?, None);
        assert_eq!(element.read("./a/A.class")?, Some(b"a".to_vec()));

        let mut classpath = ClassPath::open(&[root])?;
        assert!(classpath
            .find_class(&ClassName::from_internal("../Outside"))?
            .is_none());

        classpath.close();
        std::fs::remove_dir_all(base)?;
        Ok(())
    }

    #[test]
    fn open_rejects_missing_and_non_zip_paths() -> Result<()> {
        let missing = temp_path("missing.jar");
        let err = ClassPath::open(&[missing]).unwrap_err();
        assert!(format!("{err:#}").contains("Wrong classpath"));
        assert!(format!("{err:#}").contains("not found"));

        let bogus = temp_path("bogus.jar");
        std::fs::write(&bogus, b"not a zip")?;
        let err = ClassPathElement::open(&bogus).unwrap_err();
        assert!(format!("{err:#}").contains("can not be read as a zip archive"));
        std::fs::remove_file(bogus)?;
        Ok(())
    }

    #[test]
    fn earlier_elements_take_precedence() -> Result<()> {
        let first = temp_path("first.jar");
        let second = temp_path("second.jar");
        let from_first = ClassFileBuilder::new("a/A").extends("a/First").build();
        let from_second = ClassFileBuilder::new("a/A").extends("a/Second").build();
        let only_second = ClassFileBuilder::new("a/B").build();
        write_jar(&first, &[("a/A.class", from_first.as_slice())])?;
        write_jar(
            &second,
            &[
                ("a/A.class", from_second.as_slice()),
                ("a/B.class", only_second.as_slice()),
            ],
        )?;

        let mut classpath = ClassPath::open(&[first.clone(), second.clone()])?;
        let a = classpath
            .find_class(&ClassName::from_internal("a/A"))?
            .unwrap();
        assert_eq!(a.superclass.as_deref(), Some("a/First"));
        assert!(classpath.find_class(&ClassName::from_internal("a/B"))?.is_some());
        assert!(classpath.find_class(&ClassName::from_internal("a/C"))?.is_none());

        classpath.close();
        std::fs::remove_file(first)?;
        std::fs::remove_file(second)?;
        Ok(())
    }

    #[test]
    fn malformed_class_is_an_error() -> Result<()> {
        let jar = temp_path("malformed.jar");
        write_jar(&jar, &[("a/A.class", b"garbage")])?;

        let mut classpath = ClassPath::open(&[jar.clone()])?;
        let err = classpath
            .find_class(&ClassName::from_internal("a/A"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("Malformed class file a/A.class"));

        classpath.close();
        std::fs::remove_file(jar)?;
        Ok(())
    }
}
