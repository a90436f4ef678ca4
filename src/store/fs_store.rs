use crate::error::{Error, Result};
use crate::store::{Backend, Namespace, SharedStore};

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static TMP_ID: AtomicUsize = AtomicUsize::new(0);

/// A store kept in a directory that every node can reach.
///
/// Layout: `<root>/<job_id>/<namespace>/<key>.bin`. A value is first written to
/// a private temporary file and then moved into place, so readers never see a
/// partially written entry. `put_if_absent` uses a hard link, which fails if
/// the target already exists, giving compare-and-set semantics per key.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    #[tracing::instrument(skip_all, fields(root = %root.as_ref().display(), job_id = %job_id))]
    pub fn open(root: impl AsRef<Path>, job_id: &str) -> Result<FsStore> {
        if job_id.is_empty() || job_id.contains(['/', '\\']) || job_id == "." || job_id == ".." {
            return Err(Error::config(format!("invalid job id '{}'", job_id)));
        }
        let dir = root.as_ref().join(job_id);
        fs::create_dir_all(&dir)
            .map_err(|e| Error::dependency_with_source(format!("create {}", dir.display()), e))?;
        tracing::debug!(dir = %dir.display(), "opened fs store");
        Ok(FsStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, namespace: Namespace, key: usize) -> PathBuf {
        self.dir.join(namespace.as_str()).join(format!("{}.bin", key))
    }

    /// Write `value` to a fresh temporary file next to the final entry
    fn stage(&self, namespace: Namespace, key: usize, value: &[u8]) -> Result<PathBuf> {
        let ns_dir = self.dir.join(namespace.as_str());
        fs::create_dir_all(&ns_dir)
            .map_err(|e| Error::dependency_with_source(format!("create {}", ns_dir.display()), e))?;
        let tmp = ns_dir.join(format!(
            ".{}.{}.{}.tmp",
            key,
            std::process::id(),
            TMP_ID.fetch_add(1, Ordering::Relaxed)
        ));
        let mut file = fs::File::create(&tmp)
            .map_err(|e| Error::dependency_with_source(format!("create {}", tmp.display()), e))?;
        file.write_all(value)
            .and_then(|_| file.sync_all())
            .map_err(|e| Error::dependency_with_source(format!("write {}", tmp.display()), e))?;
        Ok(tmp)
    }
}

impl SharedStore for FsStore {
    #[tracing::instrument(skip(self, value), level = "trace")]
    fn put(&self, namespace: Namespace, key: usize, value: Vec<u8>) -> Result<()> {
        let tmp = self.stage(namespace, key, &value)?;
        let path = self.entry_path(namespace, key);
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::dependency_with_source(format!("put {}[{}]", namespace, key), e)
        })
    }

    #[tracing::instrument(skip(self, value), level = "trace")]
    fn put_if_absent(&self, namespace: Namespace, key: usize, value: Vec<u8>) -> Result<bool> {
        let tmp = self.stage(namespace, key, &value)?;
        let path = self.entry_path(namespace, key);
        let linked = fs::hard_link(&tmp, &path);
        let _ = fs::remove_file(&tmp);
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(Error::dependency_with_source(
                format!("put_if_absent {}[{}]", namespace, key),
                e,
            )),
        }
    }

    fn get(&self, namespace: Namespace, key: usize) -> Result<Option<Vec<u8>>> {
        match fs::read(self.entry_path(namespace, key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::dependency_with_source(
                format!("get {}[{}]", namespace, key),
                e,
            )),
        }
    }

    fn contains_key(&self, namespace: Namespace, key: usize) -> Result<bool> {
        self.entry_path(namespace, key)
            .try_exists()
            .map_err(|e| Error::dependency_with_source(format!("contains_key {}[{}]", namespace, key), e))
    }

    fn backend(&self) -> Backend {
        Backend::Fs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_visible_across_handles() {
        let root = tempfile::tempdir().unwrap();
        let a = FsStore::open(root.path(), "job-1").unwrap();
        let b = FsStore::open(root.path(), "job-1").unwrap();
        let other_job = FsStore::open(root.path(), "job-2").unwrap();

        a.put(Namespace::OperandB, 0, vec![1, 2, 3]).unwrap();
        assert!(b.contains_key(Namespace::OperandB, 0).unwrap());
        assert_eq!(b.get(Namespace::OperandB, 0).unwrap(), Some(vec![1, 2, 3]));
        assert!(!other_job.contains_key(Namespace::OperandB, 0).unwrap());
        assert_eq!(other_job.get(Namespace::OperandB, 0).unwrap(), None);
    }

    #[test]
    fn put_if_absent_is_exclusive() {
        let root = tempfile::tempdir().unwrap();
        let store = FsStore::open(root.path(), "claims").unwrap();
        assert!(store.put_if_absent(Namespace::ClaimTable, 5, b"n0".to_vec()).unwrap());
        assert!(!store.put_if_absent(Namespace::ClaimTable, 5, b"n1".to_vec()).unwrap());
        assert_eq!(store.get(Namespace::ClaimTable, 5).unwrap(), Some(b"n0".to_vec()));

        store.put(Namespace::ClaimTable, 5, b"n2".to_vec()).unwrap();
        assert_eq!(store.get(Namespace::ClaimTable, 5).unwrap(), Some(b"n2".to_vec()));
    }

    #[test]
    fn no_temporaries_left_behind() {
        let root = tempfile::tempdir().unwrap();
        let store = FsStore::open(root.path(), "tmp").unwrap();
        store.put(Namespace::ChunkTable, 0, vec![0]).unwrap();
        store.put_if_absent(Namespace::ChunkTable, 0, vec![1]).unwrap();
        let names = fs::read_dir(store.dir().join("chunk-table"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["0.bin".to_string()]);
    }

    #[test]
    fn bad_job_id() {
        let root = tempfile::tempdir().unwrap();
        assert!(FsStore::open(root.path(), "../escape").is_err());
        assert!(FsStore::open(root.path(), "").is_err());
    }

    #[test]
    fn unusable_root_is_dependency_error() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FsStore::open(&file, "job").unwrap_err(),
            Error::Dependency { .. }
        ));
    }
}
