//! Allocates a new, monotonically numbered case directory under the
//! configured output root (§4.7 step 1, §3 "Directory names are
//! monotonically numbered and include a time-ordered unique tag").

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Process-wide sequence backing case directory numbers, so concurrent
/// workers never collide even without talking to each other (§5 mirrors
/// this pattern for `globalDBSeq`).
static CASE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Allocates the next `case_<NNNN>_<uuid>` directory name, without
/// touching the filesystem.
pub fn next_case_dir_name() -> String {
    let n = CASE_SEQ.fetch_add(1, Ordering::SeqCst);
    format!("case_{n:04}_{}", Uuid::new_v4())
}

/// Creates `<root>/<case_<NNNN>_<uuid>>` and its `min/` subdirectory,
/// returning the allocated path.
pub fn allocate(root: &Path) -> std::io::Result<PathBuf> {
    let dir = root.join(next_case_dir_name());
    std::fs::create_dir_all(&dir)?;
    std::fs::create_dir_all(dir.join("min"))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successive_names_have_increasing_sequence_numbers() {
        let a = next_case_dir_name();
        let b = next_case_dir_name();
        let seq = |s: &str| -> u64 { s.split('_').nth(1).unwrap().parse().unwrap() };
        assert!(seq(&b) > seq(&a));
    }

    #[test]
    fn allocate_creates_the_directory_and_a_min_subdirectory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = allocate(tmp.path()).unwrap();
        assert!(dir.is_dir());
        assert!(dir.join("min").is_dir());
    }
}
