//! Configuration/manifest layer (A4): describes one CLI invocation and is
//! merged with whatever flags the user passed on top of it.

use std::path::PathBuf;

use serde_derive::{Deserialize, Serialize};

/// One CLI invocation's worth of configuration: where the Source and Target
/// live, which platform to act on, and the BIOS codec's flags. `platform ==
/// None` means "every platform present in the Source".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Manifest {
	pub source_dir: Option<PathBuf>,
	pub boot_dir: Option<PathBuf>,
	pub disk: Option<PathBuf>,
	pub platform: Option<String>,
	pub debug_image: Option<String>,
	#[serde(default)]
	pub allow_floppy: bool,
	#[serde(default = "default_true")]
	pub bpb: bool,
	#[serde(default)]
	pub rs_codes: bool,
}

const fn default_true() -> bool {
	true
}

impl Manifest {
	/// Load a Manifest from a TOML file.
	///
	/// # Errors
	/// Returns an I/O error reading `path`, or a TOML parse error.
	pub fn load(path: &std::path::Path) -> color_eyre::Result<Self> {
		let text = std::fs::read_to_string(path)?;
		Ok(toml::from_str(&text)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bpb_defaults_to_true_when_absent() {
		let m: Manifest = toml::from_str("").unwrap();
		assert!(m.bpb);
		assert!(!m.allow_floppy);
		assert!(!m.rs_codes);
	}

	#[test]
	fn round_trips_through_toml() {
		let m = Manifest {
			source_dir: Some(PathBuf::from("/usr/lib/grub")),
			boot_dir: Some(PathBuf::from("/boot")),
			disk: Some(PathBuf::from("/dev/sda")),
			platform: Some("x86_64-efi".to_owned()),
			debug_image: None,
			allow_floppy: false,
			bpb: true,
			rs_codes: true,
		};
		let text = toml::to_string(&m).unwrap();
		let back: Manifest = toml::from_str(&text).unwrap();
		assert_eq!(back.platform, m.platform);
		assert_eq!(back.rs_codes, m.rs_codes);
	}
}
