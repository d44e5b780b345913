//! Target (C7): the central state machine tying the platform registry,
//! source, mount probe, core-image builder and the BIOS/EFI codecs
//! together.

use std::{
	collections::{BTreeMap, HashMap},
	path::{Path, PathBuf},
};

use crate::{
	bios, blockdev::FileBlockDevice, efi, error::{CompareSourceError, InstallError, TargetError},
	image::{self, CoreImageSpec}, mount::{self, MountInfo}, platform::{canonical_fs_module, HintKind, Platform},
	source::{Capability, Source, OPTIONAL_ADDONS, REQUIRED_ADDONS}, util,
};

/// What kind of thing a Target wraps. Only `MountedDisk` is implemented;
/// ISO target kinds are an explicit non-goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
	MountedDisk,
}

/// Access mode a Target was opened with, gating which operations are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
	R,
	W,
	Rw,
}

impl AccessMode {
	const fn can_read(self) -> bool {
		matches!(self, Self::R | Self::Rw)
	}

	const fn can_write(self) -> bool {
		matches!(self, Self::W | Self::Rw)
	}
}

/// Per-platform flags recorded for a `Perfect` slot.
#[derive(Debug, Clone, Copy)]
pub enum PlatformFlags {
	Bios(bios::BiosFlags),
	Efi(efi::EfiFlags),
}

/// Three-valued installation status of a single platform slot.
#[derive(Debug, Clone)]
pub enum PlatformInstallInfo {
	NotExist,
	Perfect(PlatformFlags),
	WithFlaws(String),
}

/// Options controlling `install_platform`'s BIOS codec behavior; ignored for
/// non-i386-pc platforms.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
	pub debug_image: Option<String>,
	pub allow_floppy: bool,
	pub bpb: bool,
	pub rs_codes: bool,
}

/// The central state machine: a boot directory (and, for i386-pc, a disk
/// device), the mount it lives on, and the per-platform install registry.
#[derive(Debug)]
pub struct Target {
	#[allow(dead_code)]
	kind: Kind,
	mode: AccessMode,
	boot_dir: PathBuf,
	disk: Option<PathBuf>,
	mount: MountInfo,
	platforms: HashMap<Platform, PlatformInstallInfo>,
}

impl Target {
	/// Open a Target rooted at `boot_dir`. In `R`/`Rw` mode, the platform
	/// registry is populated immediately by inspecting every recognized
	/// subdirectory of `<boot_dir>/grub/`; in `W` mode it starts empty.
	///
	/// # Errors
	/// Returns [`TargetError::MissingBootDir`] if `boot_dir` doesn't exist.
	pub fn open(boot_dir: impl Into<PathBuf>, disk: Option<PathBuf>, mode: AccessMode) -> Result<Self, TargetError> {
		let boot_dir = boot_dir.into();
		if !boot_dir.is_dir() {
			return Err(TargetError::MissingBootDir(boot_dir));
		}
		let mount = mount::probe(&boot_dir);

		let mut platforms = HashMap::new();
		if mode.can_read() {
			let grub_dir = boot_dir.join("grub");
			if grub_dir.is_dir() {
				for entry in std::fs::read_dir(&grub_dir).map_err(|_| TargetError::ProbeFailed(grub_dir.clone()))? {
					let Ok(entry) = entry else { continue };
					if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
						continue;
					}
					let name = entry.file_name();
					let Some(platform) = Platform::parse(&name.to_string_lossy()) else { continue };
					let status = inspect_platform_status(&boot_dir, disk.as_deref(), platform)
						.unwrap_or_else(|e| PlatformInstallInfo::WithFlaws(e.to_string()));
					platforms.insert(platform, status);
				}
			}
		}

		tracing::debug!(?boot_dir, platforms = platforms.len(), "opened target");
		Ok(Self { kind: Kind::MountedDisk, mode, boot_dir, disk, mount, platforms })
	}

	/// Current status of `platform`'s slot. Requires read access.
	#[must_use]
	pub fn get_platform_install_info(&self, platform: Platform) -> &PlatformInstallInfo {
		assert!(self.mode.can_read(), "get_platform_install_info requires R or Rw mode");
		self.platforms.get(&platform).unwrap_or(&PlatformInstallInfo::NotExist)
	}

	/// Every platform currently recorded as installed (`Perfect` or
	/// `WithFlaws`), in no particular order.
	pub fn installed_platforms(&self) -> impl Iterator<Item = Platform> + '_ {
		self.platforms.keys().copied()
	}

	/// Install `platform` from `source`, per §4.7's nine-step protocol.
	///
	/// # Errors
	/// See [`InstallError`]'s variants.
	#[tracing::instrument(skip(self, source, opts), fields(platform = %platform))]
	pub fn install_platform(
		&mut self, platform: Platform, source: &Source, opts: &InstallOptions,
	) -> Result<(), InstallError> {
		assert!(self.mode.can_write(), "install_platform requires W or Rw mode");

		if platform.family() == crate::platform::Family::Efi {
			let fs_name = self.mount.fs_name.as_deref();
			if fs_name != Some("fat") && fs_name != Some("vfat") {
				return Err(InstallError::NotFat { platform: platform.id().to_owned(), found: self.mount.fs_name.clone() });
			}
		}
		let fs_uuid =
			self.mount.fs_uuid.clone().ok_or_else(|| InstallError::NoFsUuid(self.boot_dir.clone()))?;

		let platform_dir = self.boot_dir.join("grub").join(platform.id());
		util::recreate_dir(&platform_dir)?;
		let src_dir =
			source.platform_directory(platform).map_err(|_| InstallError::PlatformNotInSource(platform.id().to_owned()))?;
		copy_platform_modules(src_dir, &platform_dir)?;

		let (modules, prefix, hints) = self.module_spec(platform);
		let modules: Vec<&str> = modules.iter().map(String::as_str).collect();

		let spec = CoreImageSpec {
			platform,
			modules: &modules,
			fs_uuid: &fs_uuid,
			hints: hints.as_deref(),
			prefix: &prefix,
			debug_image: opts.debug_image.as_deref(),
			mkimage_target: &platform.core_artifact().1,
		};
		let core_bytes = image::build(source, &spec)?;
		let core_path = image::core_image_path(&self.boot_dir, platform);
		util::ensure_dir(core_path.parent().expect("core path always has a parent"))?;
		std::fs::write(&core_path, &core_bytes)?;

		let flags = if platform.has_boot_sector() {
			let boot_img = std::fs::read(src_dir.join("boot.img"))?;
			bios::validate_sizes(platform.id(), &boot_img, &core_bytes)?;
			std::fs::write(platform_dir.join("boot.img"), &boot_img)?;

			if let Some(disk) = &self.disk {
				let mut device = FileBlockDevice::open_rw(disk)?;
				let install_opts = bios::InstallOptions {
					bpb: opts.bpb,
					allow_floppy: opts.allow_floppy,
					rs_codes: opts.rs_codes,
					hard_disk: true,
				};
				bios::install_into_mbr(&mut device, &boot_img, &core_bytes, install_opts, platform.endianness())?;
			}
			PlatformFlags::Bios(bios::BiosFlags {
				mbr_installed: self.disk.is_some(),
				allow_floppy: opts.allow_floppy,
				bpb: opts.bpb,
				rs_codes: opts.rs_codes,
			})
		} else if platform.has_efi_file() {
			PlatformFlags::Efi(efi::install(&self.boot_dir, platform, &core_path)?)
		} else {
			PlatformFlags::Efi(efi::EfiFlags { removable: false, nvram: false })
		};

		self.platforms.insert(platform, PlatformInstallInfo::Perfect(flags));
		tracing::info!(%platform, "installed platform");
		Ok(())
	}

	/// The module list, `load.cfg` prefix, and hints string `platform`'s core
	/// image is built with, derived from this target's mount — shared by
	/// `install_platform` and `compare_source`'s recompute step so both stay
	/// in lockstep.
	fn module_spec(&self, platform: Platform) -> (Vec<String>, String, Option<String>) {
		let (natives, hint_kind) = platform.native_modules_and_hint_kind();
		let fs_module = canonical_fs_module(self.mount.fs_name.as_deref().unwrap_or(""));
		let mut modules: Vec<String> = natives.iter().map(|m| (*m).to_owned()).collect();
		modules.push(fs_module.to_owned());
		modules.push("search_fs_uuid".to_owned());

		let hints = match hint_kind {
			HintKind::Bios => self.mount.bios_hints.clone(),
			HintKind::Efi => self.mount.efi_hints.clone(),
			HintKind::None => None,
		};
		let grub_dir = self.boot_dir.join("grub");
		let mount_point = self.mount.mount_point.clone().unwrap_or_else(|| self.boot_dir.clone());
		let prefix = format!("/{}", util::relative_to(&mount_point, &grub_dir).display());
		(modules, prefix, hints)
	}

	/// Remove `platform`'s slot: BIOS sector or EFI copy, then the platform
	/// directory, then drop it from the registry.
	///
	/// # Errors
	/// See [`InstallError`]'s variants.
	#[tracing::instrument(skip(self), fields(platform = %platform))]
	pub fn remove_platform(&mut self, platform: Platform) -> Result<(), InstallError> {
		assert!(self.mode.can_write(), "remove_platform requires W or Rw mode");

		if platform.has_boot_sector() {
			if let Some(disk) = &self.disk {
				let mut device = FileBlockDevice::open_rw(disk)?;
				bios::remove_from_mbr(&mut device)?;
			}
		} else if platform.has_efi_file() {
			efi::remove(&self.boot_dir, platform)?;
		}

		let platform_dir = self.boot_dir.join("grub").join(platform.id());
		if platform_dir.is_dir() {
			std::fs::remove_dir_all(&platform_dir)?;
		}
		self.platforms.remove(&platform);
		tracing::info!(%platform, "removed platform");
		Ok(())
	}

	/// Byte-compare every registered platform's on-disk artifacts — including
	/// a recomputed core image — against `source`, then the shared
	/// `locale`/`fonts`/`themes` trees. Read-only; never mutates the target.
	///
	/// `debug_image` is the second of the two core-image recompute attempts
	/// per §4.7 ("once with `debug_image` absent, once present"); pass the
	/// value the platform was actually installed with, if known.
	///
	/// # Errors
	/// Returns the first [`CompareSourceError`] encountered.
	pub fn compare_source(&self, source: &Source, debug_image: Option<&str>) -> Result<(), CompareSourceError> {
		assert!(self.mode.can_read(), "compare_source requires R or Rw mode");

		for platform in self.platforms.keys().copied() {
			let platform_dir = self.boot_dir.join("grub").join(platform.id());
			let Ok(src_dir) = source.platform_directory(platform) else { continue };
			self.compare_platform_files(platform, src_dir, &platform_dir, source, debug_image)?;
		}

		if let Ok(locales) = source.locale_files() {
			compare_named_files(&locales, &self.boot_dir.join("grub").join("locale"), ".mo")?;
		}
		if let Ok(fonts) = source.font_files() {
			compare_named_files(&fonts, &self.boot_dir.join("grub").join("fonts"), ".pf2")?;
		}
		if let Ok(themes) = source.theme_directories() {
			compare_theme_dirs(&themes, &self.boot_dir.join("grub").join("themes"))?;
		}
		Ok(())
	}

	/// Diff one platform slot's module list and addons byte-for-byte against
	/// `src_dir`, recompute its core image (and `boot.img`, for i386-pc) and
	/// compare against the on-disk copy, then flag any file in `platform_dir`
	/// not traceable back to the source.
	fn compare_platform_files(
		&self, platform: Platform, src_dir: &Path, platform_dir: &Path, source: &Source, debug_image: Option<&str>,
	) -> Result<(), CompareSourceError> {
		let mut expected_names = std::collections::HashSet::new();

		for entry in std::fs::read_dir(src_dir)? {
			let entry = entry?;
			if entry.path().extension().and_then(|e| e.to_str()) != Some("mod") {
				continue;
			}
			let name = entry.file_name();
			expected_names.insert(name.clone());
			check_byte_equal(&entry.path(), &platform_dir.join(&name))?;
		}
		for addon in REQUIRED_ADDONS.iter().chain(OPTIONAL_ADDONS) {
			let src_path = src_dir.join(addon);
			if !src_path.is_file() {
				continue;
			}
			expected_names.insert(std::ffi::OsString::from(addon));
			check_byte_equal(&src_path, &platform_dir.join(addon))?;
		}

		if platform.has_boot_sector() {
			expected_names.insert(std::ffi::OsString::from("boot.img"));
			check_byte_equal(&src_dir.join("boot.img"), &platform_dir.join("boot.img"))?;
		}

		let core_name = platform.core_artifact().0;
		expected_names.insert(std::ffi::OsString::from(core_name));
		self.check_core_image(platform, source, &platform_dir.join(core_name), debug_image)?;

		for entry in std::fs::read_dir(platform_dir)? {
			let entry = entry?;
			if !expected_names.contains(&entry.file_name()) {
				return Err(CompareSourceError::RedundantFile { path: entry.path() });
			}
		}
		Ok(())
	}

	/// Recompute `platform`'s core image twice — once with no debug image,
	/// once with `debug_image` (when given) — and succeed as soon as either
	/// byte-matches `core_path`. A build failure on both attempts is
	/// reported; a clean mismatch on both is [`CompareSourceError::ByteMismatch`].
	fn check_core_image(
		&self, platform: Platform, source: &Source, core_path: &Path, debug_image: Option<&str>,
	) -> Result<(), CompareSourceError> {
		if !core_path.is_file() {
			return Err(CompareSourceError::Missing { path: core_path.to_path_buf() });
		}
		let on_disk = std::fs::read(core_path)?;

		let (modules, prefix, hints) = self.module_spec(platform);
		let modules: Vec<&str> = modules.iter().map(String::as_str).collect();
		let fs_uuid = self.mount.fs_uuid.as_deref().unwrap_or_default();

		let mut last_err = None;
		for candidate in [None, debug_image] {
			let spec = CoreImageSpec {
				platform,
				modules: &modules,
				fs_uuid,
				hints: hints.as_deref(),
				prefix: &prefix,
				debug_image: candidate,
				mkimage_target: &platform.core_artifact().1,
			};
			match image::build(source, &spec) {
				Ok(bytes) if bytes == on_disk => return Ok(()),
				Ok(_) => {}
				Err(e) => last_err = Some(e),
			}
		}
		match last_err {
			Some(e) => {
				Err(CompareSourceError::CoreImageRecompute { platform: platform.id().to_owned(), reason: e.to_string() })
			}
			None => Err(CompareSourceError::ByteMismatch { path: core_path.to_path_buf() }),
		}
	}

	/// Copy requested locales/fonts/themes from `source` into
	/// `<boot>/grub/{locale,fonts,themes}/`. Unsupported or absent names are
	/// a no-op, never an error.
	///
	/// # Errors
	/// Propagates I/O errors from the underlying copy.
	pub fn install_data(&self, source: &Source, locales: &[&str], fonts: &[&str], themes: &[&str]) -> std::io::Result<()> {
		assert!(self.mode.can_write(), "install_data requires W or Rw mode");

		if source.supports(Capability::Nls) {
			if let Ok(available) = source.locale_files() {
				install_named(&available, locales, &self.boot_dir.join("grub").join("locale"), ".mo")?;
			}
		}
		if source.supports(Capability::Fonts) {
			if let Ok(available) = source.font_files() {
				install_named(&available, fonts, &self.boot_dir.join("grub").join("fonts"), ".pf2")?;
			}
		}
		if source.supports(Capability::Themes) {
			if let Ok(available) = source.theme_directories() {
				for name in themes {
					if let Some(dir) = available.get(*name) {
						util::copy_dir_recursive(dir, &self.boot_dir.join("grub").join("themes").join(name))?;
					}
				}
			}
		}
		Ok(())
	}

	/// Write the fixed 1024-byte `grubenv` block at `<boot>/grub/grubenv`,
	/// via an atomic temp-file-then-rename.
	///
	/// # Errors
	/// Propagates I/O errors.
	pub fn touch_env_file(&self) -> std::io::Result<()> {
		assert!(self.mode.can_write(), "touch_env_file requires W or Rw mode");

		const SIZE: usize = 1024;
		const HEADER: &[u8] = b"# GRUB Environment Block\n# WARNING: Do not edit this file by tools other than grub-editenv!!!\n";
		let mut buf = vec![b'#'; SIZE];
		buf[..HEADER.len()].copy_from_slice(HEADER);

		let grub_dir = self.boot_dir.join("grub");
		util::ensure_dir(&grub_dir)?;
		let final_path = grub_dir.join("grubenv");
		let tmp_path = grub_dir.join("grubenv.tmp");
		std::fs::write(&tmp_path, &buf)?;
		std::fs::rename(&tmp_path, &final_path)
	}

	/// Delete `<boot>/grub/grubenv` if present.
	///
	/// # Errors
	/// Propagates I/O errors other than the file simply not existing.
	pub fn remove_env_file(&self) -> std::io::Result<()> {
		assert!(self.mode.can_write(), "remove_env_file requires W or Rw mode");
		let path = self.boot_dir.join("grub").join("grubenv");
		match std::fs::remove_file(path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e),
		}
	}

	/// Remove every currently-registered platform, the env file, and any
	/// now-empty `locale`/`fonts`/`themes` directories.
	///
	/// # Errors
	/// See [`InstallError`]'s variants.
	pub fn remove_all(&mut self) -> Result<(), InstallError> {
		assert!(self.mode.can_write(), "remove_all requires W or Rw mode");
		for platform in self.platforms.keys().copied().collect::<Vec<_>>() {
			self.remove_platform(platform)?;
		}
		self.remove_env_file()?;
		for sub in ["locale", "fonts", "themes"] {
			util::remove_dir_if_empty(&self.boot_dir.join("grub").join(sub))?;
		}
		Ok(())
	}
}

fn install_named(
	available: &BTreeMap<String, PathBuf>, requested: &[&str], dest_root: &Path, suffix: &str,
) -> std::io::Result<()> {
	util::ensure_dir(dest_root)?;
	for name in requested {
		if let Some(path) = available.get(*name) {
			if path.is_dir() {
				util::copy_dir_recursive(path, &dest_root.join(name))?;
			} else {
				std::fs::copy(path, dest_root.join(format!("{name}{suffix}")))?;
			}
		}
	}
	Ok(())
}

/// Copy every `*.mod`, each required addon, and each present optional addon
/// from `src_dir` into `platform_dir` (already recreated by the caller).
fn copy_platform_modules(src_dir: &Path, platform_dir: &Path) -> Result<(), InstallError> {
	for entry in std::fs::read_dir(src_dir)? {
		let entry = entry?;
		if entry.path().extension().and_then(|e| e.to_str()) == Some("mod") {
			std::fs::copy(entry.path(), platform_dir.join(entry.file_name()))?;
		}
	}
	for addon in REQUIRED_ADDONS {
		std::fs::copy(src_dir.join(addon), platform_dir.join(addon))?;
	}
	for addon in OPTIONAL_ADDONS {
		let src = src_dir.join(addon);
		if src.is_file() {
			std::fs::copy(&src, platform_dir.join(addon))?;
		}
	}
	Ok(())
}

fn check_byte_equal(src: &Path, target: &Path) -> Result<(), CompareSourceError> {
	if !target.is_file() {
		return Err(CompareSourceError::Missing { path: target.to_path_buf() });
	}
	if !util::files_byte_equal(src, target)? {
		return Err(CompareSourceError::ByteMismatch { path: target.to_path_buf() });
	}
	Ok(())
}

/// Like [`check_byte_equal`] but in the opposite direction: `target` is
/// known to exist (the caller is iterating its directory), so a missing
/// `src` means `target` isn't traceable back to the source at all.
fn check_target_traceable(src: &Path, target: &Path) -> Result<(), CompareSourceError> {
	if !src.is_file() {
		return Err(CompareSourceError::RedundantFile { path: target.to_path_buf() });
	}
	if !util::files_byte_equal(src, target)? {
		return Err(CompareSourceError::ByteMismatch { path: target.to_path_buf() });
	}
	Ok(())
}

/// Compare a flat directory of `<name><suffix>` files (locale `.mo`s, font
/// `.pf2`s) against `available`. A no-op if `target_dir` doesn't exist —
/// nothing was ever installed, so there's nothing to drift.
fn compare_named_files(
	available: &BTreeMap<String, PathBuf>, target_dir: &Path, suffix: &str,
) -> Result<(), CompareSourceError> {
	if !target_dir.is_dir() {
		return Ok(());
	}
	for entry in std::fs::read_dir(target_dir)? {
		let entry = entry?;
		let file_name = entry.file_name();
		let name = file_name.to_string_lossy();
		let stem = name.strip_suffix(suffix).unwrap_or(&name);
		match available.get(stem) {
			Some(src_path) => check_target_traceable(src_path, &entry.path())?,
			None => return Err(CompareSourceError::RedundantFile { path: entry.path() }),
		}
	}
	Ok(())
}

/// Compare `<boot>/grub/themes/<name>/` subdirectories against `available`,
/// recursively byte-comparing every file. A no-op if `target_dir` doesn't
/// exist.
fn compare_theme_dirs(available: &BTreeMap<String, PathBuf>, target_dir: &Path) -> Result<(), CompareSourceError> {
	if !target_dir.is_dir() {
		return Ok(());
	}
	for entry in std::fs::read_dir(target_dir)? {
		let entry = entry?;
		let name = entry.file_name().to_string_lossy().into_owned();
		match available.get(&name) {
			Some(src_dir) if entry.file_type()?.is_dir() => compare_dir_tree(src_dir, &entry.path())?,
			_ => return Err(CompareSourceError::RedundantFile { path: entry.path() }),
		}
	}
	Ok(())
}

fn compare_dir_tree(src_dir: &Path, target_dir: &Path) -> Result<(), CompareSourceError> {
	for entry in std::fs::read_dir(target_dir)? {
		let entry = entry?;
		let name = entry.file_name();
		let src_path = src_dir.join(&name);
		if entry.file_type()?.is_dir() {
			compare_dir_tree(&src_path, &entry.path())?;
		} else {
			check_target_traceable(&src_path, &entry.path())?;
		}
	}
	Ok(())
}

/// Inspect an on-disk platform slot, dispatching to the BIOS or EFI codec.
fn inspect_platform_status(
	boot_dir: &Path, disk: Option<&Path>, platform: Platform,
) -> std::io::Result<PlatformInstallInfo> {
	let platform_dir = boot_dir.join("grub").join(platform.id());
	let core_path = image::core_image_path(boot_dir, platform);

	if platform.has_boot_sector() {
		let Some(disk) = disk else {
			return Ok(PlatformInstallInfo::WithFlaws("i386-pc slot present but no disk device supplied".to_owned()));
		};
		let boot_img = std::fs::read(platform_dir.join("boot.img"))?;
		let core = std::fs::read(&core_path)?;
		let mut device = FileBlockDevice::open_ro(disk)?;
		return Ok(match bios::inspect_mbr(&mut device, &boot_img, &core, platform.endianness()) {
			Ok(bios::InspectOutcome::Consistent(flags)) => PlatformInstallInfo::Perfect(PlatformFlags::Bios(flags)),
			Ok(bios::InspectOutcome::Flawed(reason)) => PlatformInstallInfo::WithFlaws(reason),
			Err(e) => PlatformInstallInfo::WithFlaws(e.to_string()),
		});
	}

	if platform.has_efi_file() {
		return Ok(match efi::inspect(boot_dir, platform, &core_path) {
			Ok(efi::InspectOutcome::Consistent(flags)) => PlatformInstallInfo::Perfect(PlatformFlags::Efi(flags)),
			Ok(efi::InspectOutcome::Flawed(reason)) => PlatformInstallInfo::WithFlaws(reason),
			Err(e) => PlatformInstallInfo::WithFlaws(e.to_string()),
		});
	}

	Ok(PlatformInstallInfo::WithFlaws("platform has neither a boot sector nor an EFI file".to_owned()))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn make_module_file(dir: &Path, name: &str) {
		std::fs::write(dir.join(name), format!("fake module {name}")).unwrap();
	}

	fn make_source(tmp: &Path) -> Source {
		let lib = tmp.join("lib/grub");
		let share = tmp.join("share/grub");
		let efi_dir = lib.join("x86_64-efi");
		std::fs::create_dir_all(&efi_dir).unwrap();
		std::fs::create_dir_all(&share).unwrap();
		make_module_file(&efi_dir, "normal.mod");
		for addon in REQUIRED_ADDONS {
			std::fs::write(efi_dir.join(addon), b"addon").unwrap();
		}
		Source::open(lib, share).unwrap()
	}

	#[test]
	fn install_then_remove_efi_platform_round_trips() {
		let tmp = tempfile::tempdir().unwrap();
		let source = make_source(tmp.path());
		let boot = tmp.path().join("boot");
		std::fs::create_dir_all(&boot).unwrap();

		let mut target = Target::open(&boot, None, AccessMode::Rw).unwrap();
		target.mount.fs_uuid = Some("1234-ABCD".to_owned());
		target.mount.fs_name = Some("vfat".to_owned());
		target.mount.mount_point = Some(boot.clone());

		// mkimage isn't actually available in this test environment; assert
		// the precondition failures short-circuit before ever invoking it
		// rather than asserting a full install (which needs a real
		// grub-mkimage binary on PATH).
		let err = target
			.install_platform(Platform::X86_64Efi, &source, &InstallOptions::default())
			.unwrap_err();
		assert!(matches!(err, InstallError::MkimageFailed { .. } | InstallError::Io(_)));
	}

	#[test]
	fn env_file_round_trips() {
		let tmp = tempfile::tempdir().unwrap();
		let boot = tmp.path().join("boot");
		std::fs::create_dir_all(&boot).unwrap();
		let target = Target::open(&boot, None, AccessMode::Rw).unwrap();

		target.touch_env_file().unwrap();
		let bytes = std::fs::read(boot.join("grub/grubenv")).unwrap();
		assert_eq!(bytes.len(), 1024);
		assert!(bytes.starts_with(b"# GRUB Environment Block\n"));

		target.remove_env_file().unwrap();
		assert!(!boot.join("grub/grubenv").exists());
	}

	#[test]
	fn get_platform_install_info_defaults_to_not_exist() {
		let tmp = tempfile::tempdir().unwrap();
		let boot = tmp.path().join("boot");
		std::fs::create_dir_all(&boot).unwrap();
		let target = Target::open(&boot, None, AccessMode::R).unwrap();
		assert!(matches!(
			target.get_platform_install_info(Platform::X86_64Efi),
			PlatformInstallInfo::NotExist
		));
	}

	#[test]
	#[should_panic(expected = "requires W or Rw mode")]
	fn install_in_read_only_mode_asserts() {
		let tmp = tempfile::tempdir().unwrap();
		let source = make_source(tmp.path());
		let boot = tmp.path().join("boot");
		std::fs::create_dir_all(&boot).unwrap();
		let mut target = Target::open(&boot, None, AccessMode::R).unwrap();
		let _ = target.install_platform(Platform::X86_64Efi, &source, &InstallOptions::default());
	}

	fn make_source_with_locale(tmp: &Path) -> Source {
		let lib = tmp.join("lib/grub");
		let share = tmp.join("share/grub");
		std::fs::create_dir_all(lib.join("x86_64-efi")).unwrap();
		let msgs = share.join("locale").join("zh_CN").join("LC_MESSAGES");
		std::fs::create_dir_all(&msgs).unwrap();
		std::fs::write(msgs.join("grub.mo"), vec![0xABu8; 42000]).unwrap();
		Source::open(lib, share).unwrap()
	}

	#[test]
	fn compare_source_sees_locale_install_round_trip() {
		let tmp = tempfile::tempdir().unwrap();
		let source = make_source_with_locale(tmp.path());
		let boot = tmp.path().join("boot");
		std::fs::create_dir_all(&boot).unwrap();
		let target = Target::open(&boot, None, AccessMode::Rw).unwrap();

		target.install_data(&source, &["zh_CN"], &[], &[]).unwrap();
		target.compare_source(&source, None).unwrap();

		let installed = boot.join("grub/locale/zh_CN.mo");
		let mut bytes = std::fs::read(&installed).unwrap();
		bytes[0] ^= 0xFF;
		std::fs::write(&installed, bytes).unwrap();

		let err = target.compare_source(&source, None).unwrap_err();
		assert!(matches!(err, CompareSourceError::ByteMismatch { .. }));
	}

	#[test]
	fn compare_source_flags_redundant_locale_file() {
		let tmp = tempfile::tempdir().unwrap();
		let source = make_source_with_locale(tmp.path());
		let boot = tmp.path().join("boot");
		let locale_dir = boot.join("grub/locale");
		std::fs::create_dir_all(&locale_dir).unwrap();
		std::fs::write(locale_dir.join("stray.mo"), b"not from source").unwrap();
		let target = Target::open(&boot, None, AccessMode::R).unwrap();

		let err = target.compare_source(&source, None).unwrap_err();
		assert!(matches!(err, CompareSourceError::RedundantFile { .. }));
	}
}
