//! Per-job scratch directory, released on every exit path.

use std::path::{Path, PathBuf};

use crate::error::{WorkerError, WorkerResult};

/// Wraps a `tempfile::TempDir` rooted under the worker's configured work
/// directory. Dropped — and so removed — on every exit path: success, any
/// error, or a panic unwinding through the call stack.
pub struct ScratchDir {
    dir: tempfile::TempDir,
}

impl ScratchDir {
    pub fn new(base_dir: &Path, job_id: &str) -> WorkerResult<Self> {
        std::fs::create_dir_all(base_dir)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("job-{job_id}-"))
            .tempdir_in(base_dir)
            .map_err(WorkerError::Io)?;
        Ok(Self { dir })
    }

    pub fn input_path(&self) -> PathBuf {
        self.dir.path().join("input")
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join("output")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let base = std::env::temp_dir().join("transcoder-worker-test-scratch");
        let path = {
            let scratch = ScratchDir::new(&base, "job-1").unwrap();
            let input = scratch.input_path();
            std::fs::write(&input, b"x").unwrap();
            input.parent().unwrap().to_path_buf()
        };
        assert!(!path.exists());
    }
}
