//! Content Codec Utilities (C8): byte-equal comparison, all-zero detection,
//! safe directory create/clear, relative-path helpers, and a
//! `color_eyre`-flavored external-command wrapper for the ambient CLI layer
//! (`main.rs`). Library-side process spawns (mkimage, grub-probe) use their
//! own typed errors instead, per the error-handling design's boundary rule.

use std::{
	io::Read,
	path::{Path, PathBuf},
	process::Command,
};

use color_eyre::{eyre::eyre, Result, Section};

/// Run an external command, attaching its stdout/stderr to the error report
/// on failure instead of swallowing it.
#[macro_export]
macro_rules! run {
	($cmd:expr $(, $arg:expr)* $(,)?) => {{
		let mut c = ::std::process::Command::new($cmd);
		$(c.arg($arg);)*
		$crate::util::run_command(c)
	}};
}

/// Shared implementation behind the [`run!`] macro: spawn, wait, and turn a
/// non-zero exit into a report carrying both output streams.
///
/// # Errors
/// Returns an error if the process could not be spawned or exited non-zero.
pub fn run_command(mut cmd: Command) -> Result<std::process::Output> {
	tracing::trace!(?cmd, "running external command");
	let output = cmd.output().map_err(|e| eyre!("failed to spawn {:?}: {e}", cmd.get_program()))?;
	if !output.status.success() {
		return Err(eyre!("{:?} exited with {}", cmd.get_program(), output.status)
			.with_note(|| String::from_utf8_lossy(&output.stdout).into_owned())
			.with_note(|| String::from_utf8_lossy(&output.stderr).into_owned()));
	}
	Ok(output)
}

/// True iff every byte in `buf` is zero. Used both for the MBR-gap padding
/// check and for detecting an all-zero boot buffer during inspect.
#[must_use]
pub fn is_all_zero(buf: &[u8]) -> bool {
	buf.iter().all(|&b| b == 0)
}

/// Byte-equal comparison of two files. Short-circuits on length mismatch
/// before reading either file fully.
///
/// # Errors
/// Propagates I/O errors opening or reading either path.
pub fn files_byte_equal(a: &Path, b: &Path) -> std::io::Result<bool> {
	let meta_a = std::fs::metadata(a)?;
	let meta_b = std::fs::metadata(b)?;
	if meta_a.len() != meta_b.len() {
		return Ok(false);
	}
	let mut fa = std::fs::File::open(a)?;
	let mut fb = std::fs::File::open(b)?;
	let mut buf_a = vec![0u8; 64 * 1024];
	let mut buf_b = vec![0u8; 64 * 1024];
	loop {
		let na = fa.read(&mut buf_a)?;
		let nb = fb.read(&mut buf_b)?;
		if na != nb {
			return Ok(false);
		}
		if na == 0 {
			return Ok(true);
		}
		if buf_a[..na] != buf_b[..nb] {
			return Ok(false);
		}
	}
}

/// Bytes of `path` compared against an in-memory buffer.
///
/// # Errors
/// Propagates I/O errors opening or reading `path`.
pub fn file_equals_bytes(path: &Path, expected: &[u8]) -> std::io::Result<bool> {
	let actual = std::fs::read(path)?;
	Ok(actual == expected)
}

/// Recursively create `dir`, clearing it first if it already exists.
/// `install_platform` relies on this to guarantee a platform directory
/// contains exactly what the current install copied into it.
///
/// # Errors
/// Propagates I/O errors removing or creating the directory.
pub fn recreate_dir(dir: &Path) -> std::io::Result<()> {
	if dir.exists() {
		std::fs::remove_dir_all(dir)?;
	}
	std::fs::create_dir_all(dir)
}

/// Create `dir` (and its parents) if absent; a no-op if it already exists.
/// Unlike [`recreate_dir`], never clears existing contents.
///
/// # Errors
/// Propagates I/O errors creating the directory.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
	std::fs::create_dir_all(dir)
}

/// Remove `dir` only if it exists and is empty; leaves non-empty
/// directories untouched rather than erroring.
///
/// # Errors
/// Propagates I/O errors other than the directory being non-empty.
pub fn remove_dir_if_empty(dir: &Path) -> std::io::Result<()> {
	if !dir.exists() {
		return Ok(());
	}
	match std::fs::remove_dir(dir) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty => Ok(()),
		Err(e) => Err(e),
	}
}

/// Recursively copy `src` into `dst`, creating `dst` if absent. Plain
/// directory-tree copy — this is the "simple recursive copy" the design
/// explicitly keeps out of the core's interesting surface.
///
/// # Errors
/// Propagates I/O errors reading `src` or writing `dst`.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
	ensure_dir(dst)?;
	for entry in std::fs::read_dir(src)? {
		let entry = entry?;
		let ty = entry.file_type()?;
		let target = dst.join(entry.file_name());
		if ty.is_dir() {
			copy_dir_recursive(&entry.path(), &target)?;
		} else {
			std::fs::copy(entry.path(), &target)?;
		}
	}
	Ok(())
}

/// `path` relative to `root`, for embedding in `load.cfg`'s `set prefix=`.
#[must_use]
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
	path.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

/// Single-quote-escape a string for embedding inside GRUB script's
/// single-quoted literals: every `'` becomes `'\''`.
#[must_use]
pub fn shell_single_quote_escape(s: &str) -> String {
	s.replace('\'', r"'\''")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn all_zero_detects_any_nonzero_byte() {
		assert!(is_all_zero(&[0, 0, 0]));
		assert!(is_all_zero(&[]));
		assert!(!is_all_zero(&[0, 1, 0]));
	}

	#[test]
	fn files_byte_equal_detects_length_and_content_mismatch() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("a");
		let b = dir.path().join("b");
		std::fs::write(&a, b"hello").unwrap();
		std::fs::write(&b, b"hello").unwrap();
		assert!(files_byte_equal(&a, &b).unwrap());

		std::fs::write(&b, b"hellO").unwrap();
		assert!(!files_byte_equal(&a, &b).unwrap());

		std::fs::write(&b, b"hello!").unwrap();
		assert!(!files_byte_equal(&a, &b).unwrap());
	}

	#[test]
	fn recreate_dir_clears_existing_contents() {
		let dir = tempfile::tempdir().unwrap();
		let target = dir.path().join("platform");
		std::fs::create_dir_all(&target).unwrap();
		std::fs::write(target.join("stale.mod"), b"old").unwrap();

		recreate_dir(&target).unwrap();
		assert!(target.exists());
		assert!(!target.join("stale.mod").exists());
	}

	#[test]
	fn shell_single_quote_escape_matches_grub_convention() {
		assert_eq!(shell_single_quote_escape("it's"), r"it'\''s");
		assert_eq!(shell_single_quote_escape("plain"), "plain");
	}
}
