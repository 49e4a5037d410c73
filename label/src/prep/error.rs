//! 运行时错误.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 读取、变换或写入标签体数据时的错误。
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("failed to read NIfTI `{path}`")]
    NiftiRead {
        path: PathBuf,
        #[source]
        source: nifti::NiftiError,
    },
    #[error("failed to write NIfTI `{path}`")]
    NiftiWrite {
        path: PathBuf,
        #[source]
        source: nifti::NiftiError,
    },
    #[error("I/O error on `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("`{path}`: expected a 3D volume, got shape {shape:?}")]
    Shape { path: PathBuf, shape: Vec<usize> },
    #[error("volume shapes differ: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),
    #[error("`{path}` line {line}: {reason}")]
    Lut {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("invalid orientation code `{0}`")]
    Orientation(String),
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("`{program}` failed: {reason}")]
    External { program: String, reason: String },
    #[error("failed to write `{path}`")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("worker pool lost {0} result(s)")]
    PoolDisconnected(usize),
}

impl PrepError {
    #[inline]
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PrepError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_cause_is_reported_once() {
        let e = PrepError::io("a/seg.nii", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(e.to_string(), "I/O error on `a/seg.nii`");
        assert_eq!(e.source().map(|s| s.to_string()).as_deref(), Some("gone"));
    }
}
