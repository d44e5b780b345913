//! Core-Image Builder (C4): renders `load.cfg` and invokes the external
//! `mkimage` utility to produce a platform's binary core image.

use std::path::Path;

use crate::{error::InstallError, platform::Platform, source::Source, util::shell_single_quote_escape};

/// Everything `mkimage` needs for one platform's core image.
pub struct CoreImageSpec<'a> {
	pub platform: Platform,
	pub modules: &'a [&'a str],
	pub fs_uuid: &'a str,
	pub hints: Option<&'a str>,
	/// Target-relative path of the boot's `grub/` directory, e.g. `/grub`.
	pub prefix: &'a str,
	pub debug_image: Option<&'a str>,
	pub mkimage_target: &'a str,
}

/// Build `spec`'s core image from `source` and return its raw bytes.
///
/// In a scoped temporary directory: write `load.cfg`, invoke `mkimage -c
/// <cfg> -O <target> -d <platform dir> -o <out> <modules...>`, read back
/// `<out>`. The directory (and everything in it) is removed on every exit
/// path, success or failure, via `tempfile::TempDir`'s destructor.
///
/// # Errors
/// Returns [`InstallError::MkimageFailed`] if the external tool fails, or
/// an I/O error building the scratch directory / reading its output.
#[tracing::instrument(skip(source), fields(platform = %spec.platform))]
pub fn build(source: &Source, spec: &CoreImageSpec<'_>) -> Result<Vec<u8>, InstallError> {
	let scratch = tempfile::Builder::new().prefix("grubctl-mkimage").tempdir()?;
	let cfg_path = scratch.path().join("load.cfg");
	std::fs::write(&cfg_path, render_load_cfg(spec))?;

	let platform_dir = source
		.platform_directory(spec.platform)
		.map_err(|_| InstallError::MkimageFailed {
			platform: spec.platform.id().to_owned(),
			reason: "no source directory for platform".to_owned(),
		})?;

	let out_path = scratch.path().join(spec.platform.core_artifact().0);

	let mut cmd = std::process::Command::new("grub-mkimage");
	cmd.arg("-c").arg(&cfg_path);
	cmd.arg("-O").arg(spec.mkimage_target);
	cmd.arg("-d").arg(platform_dir);
	cmd.arg("-o").arg(&out_path);
	cmd.args(spec.modules);

	tracing::debug!(?cmd, "invoking mkimage");
	let output = cmd.output()?;
	if !output.status.success() {
		return Err(InstallError::MkimageFailed {
			platform: spec.platform.id().to_owned(),
			reason: String::from_utf8_lossy(&output.stderr).into_owned(),
		});
	}

	let bytes = std::fs::read(&out_path)?;
	// `scratch` drops here regardless of the path taken above, releasing the
	// temporary directory.
	Ok(bytes)
}

/// Render `load.cfg`'s contents for `spec`, without touching the
/// filesystem. Split out from [`build`] so both the installer and
/// `compare_source` (which must recompute the core image to compare it
/// against the on-disk copy) go through one rendering path.
#[must_use]
pub fn render_load_cfg(spec: &CoreImageSpec<'_>) -> String {
	let debug_image = spec.debug_image;
	let fs_uuid = spec.fs_uuid;
	let hints = spec.hints.filter(|h| !h.is_empty());
	let prefix = shell_single_quote_escape(spec.prefix);
	crate::tpl!("templates/load.cfg.tera" => { debug_image, fs_uuid, hints, prefix })
		.expect("load.cfg template is a fixed asset shipped with the crate")
}

/// Absolute path a finished core image should be written to under the boot
/// directory: `<boot>/grub/<platform-id>/<core filename>`.
#[must_use]
pub fn core_image_path(boot_dir: &Path, platform: Platform) -> std::path::PathBuf {
	boot_dir.join("grub").join(platform.id()).join(platform.core_artifact().0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_debug_line_only_when_present() {
		let spec = CoreImageSpec {
			platform: Platform::I386Pc,
			modules: &["biosdisk", "fat"],
			fs_uuid: "1234-ABCD",
			hints: Some("hd0,msdos1"),
			prefix: "/grub",
			debug_image: None,
			mkimage_target: "i386-pc",
		};
		let rendered = render_load_cfg(&spec);
		assert!(!rendered.contains("set debug"));
		assert!(rendered.contains("search.fs_uuid 1234-ABCD root hd0,msdos1"));
		assert!(rendered.contains("set prefix=($root)'/grub'"));

		let spec = CoreImageSpec { debug_image: Some("all"), ..spec };
		let rendered = render_load_cfg(&spec);
		assert!(rendered.contains("set debug='all'"));
	}

	#[test]
	fn escapes_single_quotes_in_prefix() {
		let spec = CoreImageSpec {
			platform: Platform::X86_64Efi,
			modules: &[],
			fs_uuid: "uuid",
			hints: None,
			prefix: "/it's/grub",
			debug_image: None,
			mkimage_target: "x86_64-efi",
		};
		let rendered = render_load_cfg(&spec);
		assert!(rendered.contains(r"/it'\''s/grub"));
	}

	#[test]
	fn omits_hints_clause_when_absent() {
		let spec = CoreImageSpec {
			platform: Platform::X86_64Efi,
			modules: &[],
			fs_uuid: "uuid",
			hints: None,
			prefix: "/grub",
			debug_image: None,
			mkimage_target: "x86_64-efi",
		};
		let rendered = render_load_cfg(&spec);
		assert!(rendered.contains("search.fs_uuid uuid root\n"));
	}
}
