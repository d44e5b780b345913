//! Source (C2): a read-only view of a GRUB module tree.
//!
//! Layout follows the concrete directory scheme used by the upstream
//! installer this crate's design is distilled from (`usr/lib/grub`,
//! `usr/share/locale`, `usr/share/grub/themes`), since the design only
//! describes the shape abstractly.

use std::{
	collections::BTreeMap,
	path::{Path, PathBuf},
};

use indexmap::IndexMap;

use crate::{error::SourceError, platform::Platform};

/// Fixed addon filenames required inside every platform directory.
pub const REQUIRED_ADDONS: &[&str] = &[
	"moddep.lst",
	"command.lst",
	"fs.lst",
	"partmap.lst",
	"parttool.lst",
	"video.lst",
	"crypto.lst",
	"terminal.lst",
	"modinfo.sh",
];

/// Addon filenames copied/checked only when present.
pub const OPTIONAL_ADDONS: &[&str] = &["efiemu32.o", "efiemu64.o"];

/// Default font and theme name used whenever the caller doesn't specify one.
pub const DEFAULT_FONT: &str = "unicode";
pub const DEFAULT_THEME: &str = "starfield";

/// Capability bits a Source may or may not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
	Nls,
	Fonts,
	Themes,
}

/// Immutable reference to a filesystem layout providing per-platform
/// module files, locales, fonts and themes.
#[derive(Debug)]
pub struct Source {
	lib_root: PathBuf,
	share_root: PathBuf,
	locale_root: Option<PathBuf>,
	themes_root: Option<PathBuf>,
	/// Cached at construction so `platform_directory` is a lookup, not a
	/// re-walk of the filesystem on every call (the upstream installer this
	/// design traces back to keeps a `self._platforms` field that its
	/// constructor never actually populates; this cache is that field,
	/// built for real).
	platforms: IndexMap<Platform, PathBuf>,
}

impl Source {
	/// Open a Source rooted at `lib_root`/`share_root`. Fails if either root
	/// is missing, or if any subdirectory of `lib_root` doesn't name a
	/// known platform.
	///
	/// # Errors
	/// Returns [`SourceError::MissingLibRoot`], [`SourceError::MissingShareRoot`]
	/// or [`SourceError::UnknownPlatform`].
	pub fn open(lib_root: impl Into<PathBuf>, share_root: impl Into<PathBuf>) -> Result<Self, SourceError> {
		let lib_root = lib_root.into();
		let share_root = share_root.into();
		if !lib_root.is_dir() {
			return Err(SourceError::MissingLibRoot(lib_root));
		}
		if !share_root.is_dir() {
			return Err(SourceError::MissingShareRoot(share_root));
		}

		let mut platforms = IndexMap::new();
		for entry in std::fs::read_dir(&lib_root).map_err(|_| SourceError::MissingLibRoot(lib_root.clone()))? {
			let Ok(entry) = entry else { continue };
			if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
				continue;
			}
			let name = entry.file_name();
			let name = name.to_string_lossy();
			let platform = Platform::parse(&name).ok_or_else(|| SourceError::UnknownPlatform(name.into_owned()))?;
			platforms.insert(platform, entry.path());
		}

		let locale_root = {
			let p = share_root.join("locale");
			p.is_dir().then_some(p)
		};
		let themes_root = {
			let p = share_root.join("grub").join("themes");
			p.is_dir().then_some(p)
		};

		tracing::debug!(platforms = platforms.len(), "opened grub source");
		Ok(Self { lib_root, share_root, locale_root, themes_root, platforms })
	}

	/// Whether this Source can provide NLS/fonts/themes at all.
	#[must_use]
	pub fn supports(&self, cap: Capability) -> bool {
		match cap {
			Capability::Nls => self.locale_root.is_some(),
			Capability::Fonts => self.share_root.join("grub").join("fonts").is_dir(),
			Capability::Themes => self.themes_root.is_some(),
		}
	}

	/// Absolute path of `platform`'s module directory.
	///
	/// # Errors
	/// Returns [`SourceError::PlatformNotPresent`] if the platform has no
	/// directory under this source.
	pub fn platform_directory(&self, platform: Platform) -> Result<&Path, SourceError> {
		self.platforms.get(&platform).map(PathBuf::as_path).ok_or(SourceError::PlatformNotPresent(platform.id().to_owned()))
	}

	/// Same as [`Self::platform_directory`] but returns `None` on absence
	/// instead of an error.
	#[must_use]
	pub fn try_platform_directory(&self, platform: Platform) -> Option<&Path> {
		self.platforms.get(&platform).map(PathBuf::as_path)
	}

	/// Every platform this source has a directory for.
	pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
		self.platforms.keys().copied()
	}

	/// `locale name -> absolute path of its grub.mo`, by scanning
	/// `<locale>/LC_MESSAGES/grub.mo` under the locale root.
	///
	/// # Errors
	/// Returns an I/O error if `!supports(Capability::Nls)` or the scan
	/// fails.
	pub fn locale_files(&self) -> std::io::Result<BTreeMap<String, PathBuf>> {
		let Some(root) = &self.locale_root else {
			return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "source has no locale root"));
		};
		let mut out = BTreeMap::new();
		for entry in std::fs::read_dir(root)? {
			let entry = entry?;
			if !entry.file_type()?.is_dir() {
				continue;
			}
			let mo = entry.path().join("LC_MESSAGES").join("grub.mo");
			if mo.is_file() {
				out.insert(entry.file_name().to_string_lossy().into_owned(), mo);
			}
		}
		Ok(out)
	}

	/// `font name -> absolute path`, from `*.pf2` files under the fonts dir.
	///
	/// # Errors
	/// Returns an I/O error if the fonts directory is missing or unreadable.
	pub fn font_files(&self) -> std::io::Result<BTreeMap<String, PathBuf>> {
		let dir = self.share_root.join("grub").join("fonts");
		let mut out = BTreeMap::new();
		for entry in std::fs::read_dir(dir)? {
			let entry = entry?;
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) == Some("pf2") {
				if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
					out.insert(stem.to_owned(), path);
				}
			}
		}
		Ok(out)
	}

	/// `theme name -> absolute directory path`.
	///
	/// # Errors
	/// Returns an I/O error if `!supports(Capability::Themes)` or the scan
	/// fails.
	pub fn theme_directories(&self) -> std::io::Result<BTreeMap<String, PathBuf>> {
		let Some(root) = &self.themes_root else {
			return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "source has no themes root"));
		};
		let mut out = BTreeMap::new();
		for entry in std::fs::read_dir(root)? {
			let entry = entry?;
			if entry.file_type()?.is_dir() {
				out.insert(entry.file_name().to_string_lossy().into_owned(), entry.path());
			}
		}
		Ok(out)
	}

	/// The lib root this source was opened with.
	#[must_use]
	pub fn lib_root(&self) -> &Path {
		&self.lib_root
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn make_source(platforms: &[&str]) -> (tempfile::TempDir, Source) {
		let dir = tempfile::tempdir().unwrap();
		let lib = dir.path().join("usr/lib/grub");
		let share = dir.path().join("usr/share/grub");
		std::fs::create_dir_all(&lib).unwrap();
		std::fs::create_dir_all(&share).unwrap();
		for p in platforms {
			std::fs::create_dir_all(lib.join(p)).unwrap();
		}
		let lib = dir.path().join("usr/lib/grub");
		let share = dir.path().join("usr/share/grub");
		let source = Source::open(lib, share).unwrap();
		(dir, source)
	}

	#[test]
	fn rejects_unknown_platform_subdirectory() {
		let dir = tempfile::tempdir().unwrap();
		let lib = dir.path().join("lib");
		let share = dir.path().join("share");
		std::fs::create_dir_all(lib.join("not-a-real-platform")).unwrap();
		std::fs::create_dir_all(&share).unwrap();
		let err = Source::open(lib, share).unwrap_err();
		assert!(matches!(err, SourceError::UnknownPlatform(_)));
	}

	#[test]
	fn caches_platform_directories_at_open() {
		let (_dir, source) = make_source(&["i386-pc", "x86_64-efi"]);
		assert!(source.platform_directory(Platform::I386Pc).is_ok());
		assert!(source.platform_directory(Platform::Arm64Efi).is_err());
		assert_eq!(source.platforms().count(), 2);
	}

	#[test]
	fn supports_reflects_root_presence() {
		let (_dir, source) = make_source(&["i386-pc"]);
		assert!(!source.supports(Capability::Nls));
		assert!(!source.supports(Capability::Themes));
	}
}
