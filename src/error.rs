use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
	#[error("EmptyPath: path is empty")]
	EmptyPath,
	#[error("NullByte: path contains a null byte")]
	NullByte,
	#[error("NormalizationFailure: {0}")]
	Normalization(String),
	#[error("PathOutsideAllowed: {} is outside the allowed directories", .0.display())]
	PathOutsideAllowed(PathBuf),
	#[error("SymlinkOperationDenied: {} is a symlink", .0.display())]
	SymlinkOperationDenied(PathBuf),
	#[error("NoValidAncestor: no existing ancestor directory for {}", .0.display())]
	NoValidAncestor(PathBuf),
	#[error("NotFound: {} does not exist", .0.display())]
	NotFound(PathBuf),
	#[error("NotADirectory: {} is not a directory", .0.display())]
	NotADirectory(PathBuf),
	#[error("IsADirectory: {} is a directory", .0.display())]
	IsADirectory(PathBuf),
	#[error("AmbiguousMatch: oldText matches multiple locations")]
	AmbiguousMatch,
	#[error("NoMatch: oldText not found in file")]
	NoMatch,
	#[error("LineTooLong: line exceeds {0} bytes")]
	LineTooLong(usize),
	#[error("UnsupportedMediaType: {0}")]
	UnsupportedMediaType(String),
	#[error("InvalidArgument: {0}")]
	InvalidArgument(String),
	#[error("IOFailure: {0}")]
	Io(#[from] std::io::Error),
}

impl FsError {
	pub fn invalid(message: impl Into<String>) -> Self {
		FsError::InvalidArgument(message.into())
	}
}
