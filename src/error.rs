//! Typed error domains for the install / inspect / compare / remove state machine.
//!
//! Three kinds, per the design: construction errors fail before any state
//! exists, mutation errors may leave a platform slot partially written, and
//! verification errors never mutate anything. Programmer errors (wrong
//! access mode, unknown platform passed where a checked one is expected) are
//! `assert!`/`unreachable!`, not variants here.

use std::path::PathBuf;

use thiserror::Error;

/// Failures constructing a [`crate::source::Source`].
#[derive(Debug, Error)]
pub enum SourceError {
	#[error("source lib root {0:?} does not exist")]
	MissingLibRoot(PathBuf),

	#[error("source share root {0:?} does not exist")]
	MissingShareRoot(PathBuf),

	#[error("{0:?} is not a known platform identifier")]
	UnknownPlatform(String),

	#[error("platform {0} has no directory under this source")]
	PlatformNotPresent(String),
}

/// Failures constructing a [`crate::target::Target`].
#[derive(Debug, Error)]
pub enum TargetError {
	#[error("boot directory {0:?} does not exist")]
	MissingBootDir(PathBuf),

	#[error("could not probe the mount containing {0:?}")]
	ProbeFailed(PathBuf),
}

/// Failures during `install_platform` / `remove_platform` / the rest of the
/// write path. May leave the target partially mutated; callers should treat
/// these as fatal for that slot and re-run the whole install.
#[derive(Debug, Error)]
pub enum InstallError {
	#[error("no filesystem UUID found for {0:?}")]
	NoFsUuid(PathBuf),

	#[error("platform {0} has no directory in the source")]
	PlatformNotInSource(String),

	#[error("EFI platform {platform} requires a fat boot filesystem, found {found:?}")]
	NotFat { platform: String, found: Option<String> },

	#[error("mkimage failed for platform {platform}: {reason}")]
	MkimageFailed { platform: String, reason: String },

	#[error("boot.img for {platform} must be exactly 512 bytes, found {found}")]
	BadBootImgSize { platform: String, found: usize },

	#[error("core image for {platform} must be between 512 and {max} bytes, found {found}")]
	BadCoreImgSize { platform: String, found: usize, max: usize },

	#[error("core.img version mismatch (no_rs_length field reads 0xffff)")]
	CoreImageVersionMismatch,

	#[error("disk precondition failed: {0}")]
	DiskPrecondition(String),

	#[error("{0}")]
	Io(#[from] std::io::Error),
}

/// Failures during `compare_source`. Read-only: never mutates the target.
#[derive(Debug, Error)]
pub enum CompareSourceError {
	#[error("{path:?} differs between source and target")]
	ByteMismatch { path: PathBuf },

	#[error("{path:?} exists on target but is not traceable to the source")]
	RedundantFile { path: PathBuf },

	#[error("{path:?} is required by the source but missing on target")]
	Missing { path: PathBuf },

	#[error("failed to recompute core image for platform {platform} while comparing: {reason}")]
	CoreImageRecompute { platform: String, reason: String },

	#[error("{0}")]
	Io(#[from] std::io::Error),
}

impl CompareSourceError {
	/// True for the subset of failures that indicate on-disk tampering or
	/// drift rather than a plain filesystem error.
	#[must_use]
	pub const fn is_content_mismatch(&self) -> bool {
		matches!(self, Self::ByteMismatch { .. } | Self::RedundantFile { .. } | Self::Missing { .. })
	}
}
