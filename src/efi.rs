//! EFI Placement (C6): the removable-media copy under `EFI/BOOT/<arch>.EFI`.

use std::path::{Path, PathBuf};

use crate::{error::InstallError, platform::Platform, util};

/// Flags recorded for an installed EFI slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EfiFlags {
	pub removable: bool,
	pub nvram: bool,
}

/// `<boot>/EFI/BOOT/`.
#[must_use]
pub fn efi_boot_dir(boot_dir: &Path) -> PathBuf {
	boot_dir.join("EFI").join("BOOT")
}

/// `<boot>/EFI/BOOT/<removable-name>`.
#[must_use]
pub fn removable_path(boot_dir: &Path, platform: Platform) -> PathBuf {
	efi_boot_dir(boot_dir).join(platform.removable_efi_name())
}

/// Ensure `<boot>/EFI/BOOT/` exists and copy `core_image_path` into it as
/// `platform`'s removable-media filename. Never touches NVRAM (a Non-goal).
///
/// # Errors
/// Propagates I/O errors creating the directory or copying the file.
pub fn install(boot_dir: &Path, platform: Platform, core_image_path: &Path) -> Result<EfiFlags, InstallError> {
	let dir = efi_boot_dir(boot_dir);
	util::ensure_dir(&dir)?;
	std::fs::copy(core_image_path, removable_path(boot_dir, platform))?;
	tracing::debug!(%platform, "placed removable EFI copy");
	Ok(EfiFlags { removable: true, nvram: false })
}

/// Outcome of [`inspect`].
#[derive(Debug)]
pub enum InspectOutcome {
	Consistent(EfiFlags),
	Flawed(String),
}

/// Both the per-platform core image and its removable-media copy must exist
/// and be byte-equal.
///
/// # Errors
/// Propagates I/O errors other than the files simply not existing.
pub fn inspect(boot_dir: &Path, platform: Platform, core_image_path: &Path) -> Result<InspectOutcome, InstallError> {
	let removable = removable_path(boot_dir, platform);
	if !core_image_path.is_file() {
		return Ok(InspectOutcome::Flawed(format!("{core_image_path:?} is missing")));
	}
	if !removable.is_file() {
		return Ok(InspectOutcome::Flawed(format!("{removable:?} is missing")));
	}
	if !util::files_byte_equal(core_image_path, &removable)? {
		return Ok(InspectOutcome::Flawed(format!("{removable:?} does not match {core_image_path:?}")));
	}
	Ok(InspectOutcome::Consistent(EfiFlags { removable: true, nvram: false }))
}

/// Delete the removable-media file, then the `EFI/BOOT/` and `EFI/`
/// directories if they're left empty.
///
/// # Errors
/// Propagates I/O errors other than the file simply not existing.
pub fn remove(boot_dir: &Path, platform: Platform) -> Result<(), InstallError> {
	let removable = removable_path(boot_dir, platform);
	if removable.is_file() {
		std::fs::remove_file(&removable)?;
	}
	util::remove_dir_if_empty(&efi_boot_dir(boot_dir))?;
	util::remove_dir_if_empty(&boot_dir.join("EFI"))?;
	tracing::debug!(%platform, "removed removable EFI copy");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn core_image(dir: &Path, bytes: &[u8]) -> PathBuf {
		let path = dir.join("core.efi");
		std::fs::write(&path, bytes).unwrap();
		path
	}

	#[test]
	fn install_copies_core_image_to_removable_name() {
		let dir = tempfile::tempdir().unwrap();
		let core = core_image(dir.path(), b"fake efi payload");
		let flags = install(dir.path(), Platform::X86_64Efi, &core).unwrap();
		assert!(flags.removable);
		assert!(!flags.nvram);

		let removable = removable_path(dir.path(), Platform::X86_64Efi);
		assert_eq!(removable.file_name().unwrap(), "BOOTX64.EFI");
		assert_eq!(std::fs::read(removable).unwrap(), b"fake efi payload");
	}

	#[test]
	fn inspect_flags_byte_mismatch() {
		let dir = tempfile::tempdir().unwrap();
		let core = core_image(dir.path(), b"version one");
		install(dir.path(), Platform::Arm64Efi, &core).unwrap();

		std::fs::write(&core, b"version two, drifted").unwrap();
		match inspect(dir.path(), Platform::Arm64Efi, &core).unwrap() {
			InspectOutcome::Flawed(_) => {},
			InspectOutcome::Consistent(_) => panic!("byte drift should have been detected"),
		}
	}

	#[test]
	fn inspect_flags_missing_removable_copy() {
		let dir = tempfile::tempdir().unwrap();
		let core = core_image(dir.path(), b"payload");
		match inspect(dir.path(), Platform::I386Efi, &core).unwrap() {
			InspectOutcome::Flawed(reason) => assert!(reason.contains("missing")),
			InspectOutcome::Consistent(_) => panic!("no install happened yet"),
		}
	}

	#[test]
	fn remove_deletes_file_and_empty_directories() {
		let dir = tempfile::tempdir().unwrap();
		let core = core_image(dir.path(), b"payload");
		install(dir.path(), Platform::Riscv64Efi, &core).unwrap();

		remove(dir.path(), Platform::Riscv64Efi).unwrap();

		assert!(!removable_path(dir.path(), Platform::Riscv64Efi).exists());
		assert!(!efi_boot_dir(dir.path()).exists());
		assert!(!dir.path().join("EFI").exists());
	}

	#[test]
	fn remove_leaves_efi_boot_dir_if_other_platform_still_present() {
		let dir = tempfile::tempdir().unwrap();
		let core = core_image(dir.path(), b"payload");
		install(dir.path(), Platform::X86_64Efi, &core).unwrap();
		install(dir.path(), Platform::Arm64Efi, &core).unwrap();

		remove(dir.path(), Platform::X86_64Efi).unwrap();

		assert!(efi_boot_dir(dir.path()).is_dir());
		assert!(removable_path(dir.path(), Platform::Arm64Efi).is_file());
	}
}
