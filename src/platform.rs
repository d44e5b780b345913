//! Platform Registry (C1): the closed set of firmware platforms and the pure
//! functions derived from it.
//!
//! Kept as table lookups off a single [`Platform::caps`] call rather than
//! scattered per-family `match` blocks, the way `PartitionType::uuid` in a
//! partition-table layer is one table instead of four.

use std::fmt;

/// A (CPU architecture, firmware family) pair this crate knows how to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum Platform {
	I386Pc,
	I386Efi,
	I386Qemu,
	I386Coreboot,
	I386Multiboot,
	I386Ieee1275,
	I386Xen,
	I386XenPvh,
	X86_64Efi,
	X86_64Xen,
	ArmUboot,
	ArmCoreboot,
	ArmEfi,
	Arm64Efi,
	Ia64Efi,
	PowerpcIeee1275,
	Sparc64Ieee1275,
	MipsArc,
	MipselArc,
	MipselLoongson,
	MipsQemuMips,
	MipselQemuMips,
	Riscv32Efi,
	Riscv64Efi,
}

/// Firmware family a platform belongs to; drives most registry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
	Pc,
	Efi,
	Coreboot,
	Xen,
	Qemu,
	Ieee1275,
	Multiboot,
	MipsElf,
	Uboot,
}

/// Byte order the platform's firmware expects header fields in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
	Little,
	Big,
}

/// Table-lookup payload backing every pure function in this module.
struct Caps {
	id: &'static str,
	family: Family,
	endianness: Endianness,
}

impl Platform {
	/// All platforms this registry knows, in declaration order.
	pub const ALL: [Self; 24] = [
		Self::I386Pc,
		Self::I386Efi,
		Self::I386Qemu,
		Self::I386Coreboot,
		Self::I386Multiboot,
		Self::I386Ieee1275,
		Self::I386Xen,
		Self::I386XenPvh,
		Self::X86_64Efi,
		Self::X86_64Xen,
		Self::ArmUboot,
		Self::ArmCoreboot,
		Self::ArmEfi,
		Self::Arm64Efi,
		Self::Ia64Efi,
		Self::PowerpcIeee1275,
		Self::Sparc64Ieee1275,
		Self::MipsArc,
		Self::MipselArc,
		Self::MipselLoongson,
		Self::MipsQemuMips,
		Self::MipselQemuMips,
		Self::Riscv32Efi,
		Self::Riscv64Efi,
	];

	fn caps(self) -> Caps {
		match self {
			Self::I386Pc => Caps { id: "i386-pc", family: Family::Pc, endianness: Endianness::Little },
			Self::I386Efi => Caps { id: "i386-efi", family: Family::Efi, endianness: Endianness::Little },
			Self::I386Qemu => Caps { id: "i386-qemu", family: Family::Qemu, endianness: Endianness::Little },
			Self::I386Coreboot => {
				Caps { id: "i386-coreboot", family: Family::Coreboot, endianness: Endianness::Little }
			},
			Self::I386Multiboot => {
				Caps { id: "i386-multiboot", family: Family::Multiboot, endianness: Endianness::Little }
			},
			Self::I386Ieee1275 => {
				Caps { id: "i386-ieee1275", family: Family::Ieee1275, endianness: Endianness::Little }
			},
			Self::I386Xen => Caps { id: "i386-xen", family: Family::Xen, endianness: Endianness::Little },
			Self::I386XenPvh => {
				Caps { id: "i386-xen_pvh", family: Family::Xen, endianness: Endianness::Little }
			},
			Self::X86_64Efi => Caps { id: "x86_64-efi", family: Family::Efi, endianness: Endianness::Little },
			Self::X86_64Xen => Caps { id: "x86_64-xen", family: Family::Xen, endianness: Endianness::Little },
			Self::ArmUboot => Caps { id: "arm-uboot", family: Family::Uboot, endianness: Endianness::Little },
			Self::ArmCoreboot => {
				Caps { id: "arm-coreboot", family: Family::Coreboot, endianness: Endianness::Little }
			},
			Self::ArmEfi => Caps { id: "arm-efi", family: Family::Efi, endianness: Endianness::Little },
			Self::Arm64Efi => Caps { id: "arm64-efi", family: Family::Efi, endianness: Endianness::Little },
			Self::Ia64Efi => Caps { id: "ia64-efi", family: Family::Efi, endianness: Endianness::Little },
			Self::PowerpcIeee1275 => {
				Caps { id: "powerpc-ieee1275", family: Family::Ieee1275, endianness: Endianness::Big }
			},
			Self::Sparc64Ieee1275 => {
				Caps { id: "sparc64-ieee1275", family: Family::Ieee1275, endianness: Endianness::Big }
			},
			Self::MipsArc => Caps { id: "mips-arc", family: Family::MipsElf, endianness: Endianness::Big },
			Self::MipselArc => {
				Caps { id: "mipsel-arc", family: Family::MipsElf, endianness: Endianness::Little }
			},
			Self::MipselLoongson => {
				Caps { id: "mipsel-loongson", family: Family::MipsElf, endianness: Endianness::Little }
			},
			Self::MipsQemuMips => {
				Caps { id: "mips-qemu_mips", family: Family::MipsElf, endianness: Endianness::Big }
			},
			Self::MipselQemuMips => {
				Caps { id: "mipsel-qemu_mips", family: Family::MipsElf, endianness: Endianness::Little }
			},
			Self::Riscv32Efi => Caps { id: "riscv32-efi", family: Family::Efi, endianness: Endianness::Little },
			Self::Riscv64Efi => Caps { id: "riscv64-efi", family: Family::Efi, endianness: Endianness::Little },
		}
	}

	/// Canonical hyphenated identifier string, e.g. `"x86_64-efi"`.
	#[must_use]
	pub fn id(self) -> &'static str {
		self.caps().id
	}

	/// Firmware family this platform belongs to.
	#[must_use]
	pub fn family(self) -> Family {
		self.caps().family
	}

	/// Byte order the firmware expects header fields to be encoded in.
	#[must_use]
	pub fn endianness(self) -> Endianness {
		self.caps().endianness
	}

	/// Parse a canonical identifier string. Unknown identifiers are a
	/// `Source`-construction error, never a programmer error, since they
	/// can arrive from an untrusted directory listing.
	#[must_use]
	pub fn parse(id: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|p| p.id() == id)
	}

	/// `(core image filename, mkimage `-O` target string)`.
	///
	/// Any platform outside [`Platform::ALL`] is a programmer error — this
	/// function is total over the closed set, not over arbitrary strings.
	#[must_use]
	pub fn core_artifact(self) -> (&'static str, String) {
		match self {
			Self::I386Pc => ("core.img", "i386-pc".to_owned()),
			Self::I386Qemu => ("core.img", "i386-qemu".to_owned()),
			Self::Sparc64Ieee1275 => ("core.img", "sparc64-ieee1275-raw".to_owned()),
			Self::MipselArc | Self::MipsArc | Self::ArmUboot => ("core.img", self.id().to_owned()),
			Self::MipselLoongson | Self::MipsQemuMips | Self::MipselQemuMips => {
				("core.elf", format!("{}-elf", self.id()))
			},
			Self::I386Multiboot => ("core.elf", "i386-multiboot".to_owned()),
			Self::I386Ieee1275 | Self::PowerpcIeee1275 => ("core.elf", self.id().to_owned()),
			_ if self.family() == Family::Efi => ("core.efi", self.id().to_owned()),
			_ if matches!(self.family(), Family::Coreboot | Family::Xen) => ("core.elf", self.id().to_owned()),
			_ => unreachable!("platform {self:?} has no core-artifact rule; registry is incomplete"),
		}
	}

	/// Initial module list (disk drivers first) and the embedding-hint
	/// prefix to bake into `load.cfg`, before the filesystem driver module
	/// and `search_fs_uuid` are appended by the caller.
	#[must_use]
	pub fn native_modules_and_hint_kind(self) -> (Vec<&'static str>, HintKind) {
		match self {
			Self::I386Pc => (vec!["biosdisk"], HintKind::Bios),
			_ if self.family() == Family::Efi => (vec![], HintKind::Efi),
			Self::I386Multiboot | Self::I386Coreboot | Self::ArmCoreboot | Self::I386Qemu | Self::MipsQemuMips
			| Self::MipselQemuMips | Self::MipselLoongson => {
				(vec!["pata", "ahci", "ohci", "uhci", "ehci", "ubms"], HintKind::None)
			},
			_ => (vec![], HintKind::None),
		}
	}

	/// `BOOT<ARCH>.EFI` removable-media filename. Asserts EFI family: this
	/// is a programmer error to call on a non-EFI platform, per the design.
	#[must_use]
	pub fn removable_efi_name(self) -> &'static str {
		assert_eq!(self.family(), Family::Efi, "removable_efi_name called on non-EFI platform {self:?}");
		match self {
			Self::I386Efi => "BOOTIA32.EFI",
			Self::X86_64Efi => "BOOTX64.EFI",
			Self::Ia64Efi => "BOOTIA64.EFI",
			Self::ArmEfi => "BOOTARM.EFI",
			Self::Arm64Efi => "BOOTAA64.EFI",
			Self::Riscv32Efi => "BOOTRISCV32.EFI",
			Self::Riscv64Efi => "BOOTRISCV64.EFI",
			_ => unreachable!("non-EFI platform passed the family assertion"),
		}
	}

	/// Whether this platform gets a BIOS boot sector and MBR-gap core image.
	#[must_use]
	pub fn has_boot_sector(self) -> bool {
		matches!(self, Self::I386Pc)
	}

	/// Whether this platform gets an `EFI/BOOT/<name>.EFI` removable copy.
	#[must_use]
	pub fn has_efi_file(self) -> bool {
		self.family() == Family::Efi
	}
}

impl fmt::Display for Platform {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.id())
	}
}

/// Which embedding-hint probe a platform's `load.cfg` hint string is sourced
/// from, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintKind {
	Bios,
	Efi,
	None,
}

/// Canonicalises a filesystem driver name the way GRUB's module namer does:
/// `vfat` is always addressed as `fat`.
#[must_use]
pub fn canonical_fs_module(fsname: &str) -> &str {
	if fsname == "vfat" {
		"fat"
	} else {
		fsname
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn core_artifact_is_total_and_well_suffixed() {
		for p in Platform::ALL {
			let (name, _target) = p.core_artifact();
			assert!(
				name.ends_with(".img") || name.ends_with(".efi") || name.ends_with(".elf"),
				"unexpected core filename {name} for {p}"
			);
		}
	}

	#[test]
	fn endianness_partition_matches_the_closed_set() {
		for p in Platform::ALL {
			let big = matches!(
				p,
				Platform::Sparc64Ieee1275
					| Platform::PowerpcIeee1275
					| Platform::MipsArc | Platform::MipsQemuMips
			);
			assert_eq!(p.endianness() == Endianness::Big, big, "wrong endianness for {p}");
		}
	}

	#[test]
	fn sparc64_ieee1275_maps_to_raw_target() {
		assert_eq!(Platform::Sparc64Ieee1275.core_artifact(), ("core.img", "sparc64-ieee1275-raw".to_owned()));
	}

	#[test]
	fn mips_variants_append_elf_target() {
		assert_eq!(
			Platform::MipselLoongson.core_artifact(),
			("core.elf", "mipsel-loongson-elf".to_owned())
		);
	}

	#[test]
	fn round_trips_through_id_string() {
		for p in Platform::ALL {
			assert_eq!(Platform::parse(p.id()), Some(p));
		}
		assert_eq!(Platform::parse("bogus-arch"), None);
	}

	#[test]
	fn removable_efi_name_covers_every_efi_platform() {
		for p in Platform::ALL {
			if p.family() == Family::Efi {
				assert!(p.removable_efi_name().starts_with("BOOT"));
			}
		}
	}

	#[test]
	fn canonicalises_vfat_to_fat() {
		assert_eq!(canonical_fs_module("vfat"), "fat");
		assert_eq!(canonical_fs_module("ext4"), "ext4");
	}
}
