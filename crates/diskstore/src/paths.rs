//! Entry path derivation from key digests
//!
//! Every file the store owns sits under the reserved `diskstore-` prefix so
//! the reset scanner can tell cache files apart from unrelated files sharing
//! the same root directory.

use std::path::{Path, PathBuf};

/// Reserved filename prefix for files owned by the store
pub const FILE_PREFIX: &str = "diskstore-";

/// Leading digest characters used as the shard directory name
pub const SHARD_PREFIX_LEN: usize = 3;

/// Base path (no format suffix) for the entry with the given digest
///
/// With `subdirs` the digest is split into a short shard directory and the
/// remainder as the file name; otherwise the full digest is the file name.
pub fn entry_base_path(root: &Path, digest: &str, subdirs: bool) -> PathBuf {
    if subdirs {
        root.join(format!("{FILE_PREFIX}{}", &digest[..SHARD_PREFIX_LEN]))
            .join(&digest[SHARD_PREFIX_LEN..])
    } else {
        root.join(format!("{FILE_PREFIX}{digest}"))
    }
}

/// Path of the primary document for an entry base path
pub fn document_path(base: &Path, zip: bool) -> PathBuf {
    append_suffix(base, if zip { ".json.gz" } else { ".json" })
}

/// Path of the Nth external blob for an entry base path
pub fn blob_path(base: &Path, index: u64, zip: bool) -> PathBuf {
    let zip_extension = if zip { ".gz" } else { "" };
    append_suffix(base, &format!("-{index}.bin{zip_extension}"))
}

/// Path of the transient lock marker for an entry base path
pub fn lock_path(base: &Path) -> PathBuf {
    append_suffix(base, ".lock")
}

// Path::with_extension would eat everything after the last dot in the
// digest-derived name, so suffixes are appended to the raw OsString.
fn append_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut joined = base.as_os_str().to_os_string();
    joined.push(suffix);
    PathBuf::from(joined)
}
