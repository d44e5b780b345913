//! Mount Probe (C3): given an absolute path, find the mount that contains
//! it and the device/filesystem/UUID/hint information the installer needs.
//!
//! Each of the four probes is an independent external call; failure of any
//! one yields an empty/absent field, never an error. This corrects a bug in
//! the installer this design traces back to, whose probe helper calls the
//! filesystem-type probe twice and never actually queries the UUID probe.

use std::{
	path::{Path, PathBuf},
	process::Command,
};

/// Everything the installer needs to know about the mount containing a
/// directory: its device, filesystem, UUID, and embedding hints for BIOS
/// and EFI firmware.
#[derive(Debug, Clone, Default)]
pub struct MountInfo {
	pub device: Option<PathBuf>,
	pub mount_point: Option<PathBuf>,
	pub fs_name: Option<String>,
	pub fs_uuid: Option<String>,
	pub bios_hints: Option<String>,
	pub efi_hints: Option<String>,
	/// The whole-disk device backing `device`, once partition suffixes are
	/// stripped (e.g. `/dev/sda1` -> `/dev/sda`).
	pub disk: Option<PathBuf>,
}

/// Find the mount containing `path` by selecting the `/proc/mounts` entry
/// whose mount-point is the longest prefix of `path`, then query the four
/// independent `grub-probe`-shaped probes for that device.
#[must_use]
pub fn probe(path: &Path) -> MountInfo {
	let Some((device, mount_point)) = find_containing_mount(path) else {
		return MountInfo::default();
	};
	let fs_name = probe_one("fs", &device);
	let fs_uuid = probe_one("fs_uuid", &device);
	let bios_hints = probe_one("bios_hints", &device);
	let efi_hints = probe_one("efi_hints", &device);
	let disk = whole_disk_of(&device);

	MountInfo {
		device: Some(device),
		mount_point: Some(mount_point),
		fs_name,
		fs_uuid,
		bios_hints,
		efi_hints,
		disk,
	}
}

/// Scan `/proc/mounts` (or `mounts_text` in tests) for the entry whose
/// mount-point is the longest prefix of `path`.
fn find_containing_mount(path: &Path) -> Option<(PathBuf, PathBuf)> {
	let text = std::fs::read_to_string("/proc/mounts").ok()?;
	find_containing_mount_in(&text, path)
}

fn find_containing_mount_in(mounts_text: &str, path: &Path) -> Option<(PathBuf, PathBuf)> {
	let mut best: Option<(PathBuf, PathBuf)> = None;
	for line in mounts_text.lines() {
		let mut fields = line.split_whitespace();
		let Some(device) = fields.next() else { continue };
		let Some(mount_point) = fields.next() else { continue };
		let mp = PathBuf::from(mount_point);
		if !path.starts_with(&mp) {
			continue;
		}
		let better = best.as_ref().map_or(true, |(_, cur)| mp.as_os_str().len() > cur.as_os_str().len());
		if better {
			best = Some((PathBuf::from(device), mp));
		}
	}
	best
}

/// A single `grub-probe -t <kind> -d <device>` call. Total: any failure
/// (missing binary, non-zero exit, non-utf8 output) yields `None`, never
/// propagates an error, per the design's "total function" requirement.
fn probe_one(kind: &str, device: &Path) -> Option<String> {
	let output = Command::new("grub-probe").arg("-t").arg(kind).arg("-d").arg(device).output().ok()?;
	if !output.status.success() {
		return None;
	}
	let text = String::from_utf8(output.stdout).ok()?;
	let trimmed = text.trim();
	(!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Strip a partition suffix off a block-device path to recover the whole
/// disk: `sdX`/`vdX`/`xvdX` partitions end in digits directly, `nvmeXnY`
/// partitions and mmcblk/loop devices use a `p<N>` separator.
#[must_use]
pub fn whole_disk_of(device: &Path) -> Option<PathBuf> {
	let name = device.file_name()?.to_str()?;
	let parent = device.parent()?;

	if let Some(stripped) = strip_p_partition(name) {
		return Some(parent.join(stripped));
	}
	if name.starts_with("sd") || name.starts_with("vd") || name.starts_with("xvd") {
		let stripped = name.trim_end_matches(|c: char| c.is_ascii_digit());
		return Some(parent.join(stripped));
	}
	None
}

/// `nvme0n1p1` -> `nvme0n1`, `mmcblk0p1` -> `mmcblk0`, `loop0p1` -> `loop0`.
fn strip_p_partition(name: &str) -> Option<&str> {
	if !(name.starts_with("nvme") || name.starts_with("mmcblk") || name.starts_with("loop")) {
		return None;
	}
	let p_pos = name.rfind('p')?;
	let (base, suffix) = name.split_at(p_pos);
	let digits = &suffix[1..];
	(!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(base)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn finds_longest_prefix_mount() {
		let mounts = "/dev/sda1 / ext4 rw 0 0\n/dev/sda2 /boot vfat rw 0 0\n";
		let (dev, mp) = find_containing_mount_in(mounts, Path::new("/boot/grub")).unwrap();
		assert_eq!(dev, PathBuf::from("/dev/sda2"));
		assert_eq!(mp, PathBuf::from("/boot"));
	}

	#[test]
	fn falls_back_to_root_mount() {
		let mounts = "/dev/sda1 / ext4 rw 0 0\n/dev/sda2 /boot vfat rw 0 0\n";
		let (dev, _mp) = find_containing_mount_in(mounts, Path::new("/etc")).unwrap();
		assert_eq!(dev, PathBuf::from("/dev/sda1"));
	}

	#[test]
	fn whole_disk_strips_sd_partition_suffix() {
		assert_eq!(whole_disk_of(Path::new("/dev/sda1")), Some(PathBuf::from("/dev/sda")));
		assert_eq!(whole_disk_of(Path::new("/dev/sda")), Some(PathBuf::from("/dev/sda")));
	}

	#[test]
	fn whole_disk_strips_nvme_and_mmcblk_partition_suffix() {
		assert_eq!(whole_disk_of(Path::new("/dev/nvme0n1p1")), Some(PathBuf::from("/dev/nvme0n1")));
		assert_eq!(whole_disk_of(Path::new("/dev/mmcblk0p2")), Some(PathBuf::from("/dev/mmcblk0")));
		assert_eq!(whole_disk_of(Path::new("/dev/loop0p1")), Some(PathBuf::from("/dev/loop0")));
	}
}
