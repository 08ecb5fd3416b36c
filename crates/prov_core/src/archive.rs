//! Named-byte-stream access over a result archive.
//!
//! The parser never assumes a container format. Anything that can list its
//! members and hand back their bytes can be parsed: an extracted archive on
//! disk, an in-memory fixture, or a caller-supplied zip reader.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ArchiveError;

/// Container-agnostic view of one archive.
///
/// Entry names use `/` separators and start with the archive's root
/// directory (`<root-uuid>/...`).
pub trait ArchiveSource: Send + Sync {
    /// Human label used in advisories and logs (usually the path).
    fn label(&self) -> String;

    /// All member names, sorted.
    fn list_entries(&self) -> Result<Vec<String>, ArchiveError>;

    /// Bytes of a member, or `None` when the member does not exist.
    fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError>;
}

impl<T: ArchiveSource + ?Sized> ArchiveSource for Box<T> {
    fn label(&self) -> String {
        (**self).label()
    }

    fn list_entries(&self) -> Result<Vec<String>, ArchiveError> {
        (**self).list_entries()
    }

    fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        (**self).read_entry(name)
    }
}

/// First path segment of the first entry. Every member of a well-formed
/// archive lives under this directory.
pub fn root_dir(entries: &[String]) -> Option<String> {
    entries
        .first()
        .and_then(|name| name.split('/').next())
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
}

/// In-memory archive, used for fixtures and for callers that have already
/// unpacked a container into memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    label: String,
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), bytes.into());
    }

    pub fn with_entry(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(|b| b.as_slice())
    }

    /// Member names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ArchiveSource for MemoryArchive {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn list_entries(&self) -> Result<Vec<String>, ArchiveError> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        Ok(self.entries.get(name).cloned())
    }
}

/// An archive that has been extracted to disk. `base` is the directory that
/// contains the `<root-uuid>/` folder.
#[derive(Debug, Clone)]
pub struct DirArchive {
    base: PathBuf,
}

impl DirArchive {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl ArchiveSource for DirArchive {
    fn label(&self) -> String {
        self.base.display().to_string()
    }

    fn list_entries(&self) -> Result<Vec<String>, ArchiveError> {
        let mut out = Vec::new();
        collect_files(&self.base, &self.base, &mut out)?;
        out.sort();
        Ok(out)
    }

    fn read_entry(&self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        let path = name
            .split('/')
            .fold(self.base.clone(), |acc, segment| acc.join(segment));
        if !path.is_file() {
            return Ok(None);
        }
        fs::read(&path).map(Some).map_err(|err| ArchiveError::Io {
            path: path.display().to_string(),
            detail: err.to_string(),
        })
    }
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), ArchiveError> {
    let read_dir = fs::read_dir(dir).map_err(|err| ArchiveError::Io {
        path: dir.display().to_string(),
        detail: err.to_string(),
    })?;
    for entry in read_dir {
        let entry = entry.map_err(|err| ArchiveError::Io {
            path: dir.display().to_string(),
            detail: err.to_string(),
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(base, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            out.push(name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_dir_is_first_segment() {
        let entries = vec![
            "abc/VERSION".to_string(),
            "abc/metadata.yaml".to_string(),
        ];
        assert_eq!(root_dir(&entries).as_deref(), Some("abc"));
        assert_eq!(root_dir(&[]), None);
    }

    #[test]
    fn memory_archive_lists_sorted_entries() {
        let archive = MemoryArchive::new("mem")
            .with_entry("r/b", "2")
            .with_entry("r/a", "1");
        assert_eq!(archive.list_entries().unwrap(), vec!["r/a", "r/b"]);
        assert_eq!(archive.read_entry("r/a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(archive.read_entry("r/zzz").unwrap(), None);
    }

    #[test]
    fn dir_archive_walks_nested_files() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("root").join("provenance").join("action");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join("root").join("VERSION"), "v").unwrap();
        fs::write(nested.join("action.yaml"), "a").unwrap();

        let archive = DirArchive::new(tmp.path());
        let entries = archive.list_entries().unwrap();
        assert_eq!(
            entries,
            vec!["root/VERSION", "root/provenance/action/action.yaml"]
        );
        assert_eq!(
            archive.read_entry("root/VERSION").unwrap(),
            Some(b"v".to_vec())
        );
        assert_eq!(archive.read_entry("root/missing").unwrap(), None);
    }
}
