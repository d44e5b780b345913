//! Boot-Sector Codec (C5), BIOS/i386-PC — the central invariant of this
//! crate. Pure over byte buffers via the injected [`BlockDevice`]
//! interface; no module here touches `std::fs` directly except the disk
//! precondition check, which genuinely needs a real partition table.

use std::path::Path;

use crate::{blockdev::BlockDevice, error::InstallError, platform::Endianness, reedsolomon, util::is_all_zero};

pub const SECTOR_SIZE: usize = 512;
pub const MAX_CORE_BUFFER: usize = 512 * 1024;

const BPB_START: usize = 0x03;
const BPB_END: usize = 0x5a;
const DRIVE_CHECK: usize = 0x66;
const WINDOWS_NT_MAGIC: usize = 0x1b8;
const PART_END: usize = 0x1fe;

/// Offset, within the post-sector-0 region (i.e. `+0x200` into the full
/// disk buffer), of the 32-bit Reed–Solomon redundancy length field.
const RS_REDUNDANCY_OFFSET: usize = 0x200 + 0x10;
/// Offset of the 16-bit "no Reed–Solomon" length field, and its version
/// sentinel.
const RS_NO_REDUNDANCY_LENGTH_OFFSET: usize = 0x200 + 0x14;
const RS_VERSION_MISMATCH_SENTINEL: u16 = 0xFFFF;

/// Flags recorded for an installed (or inspected) `i386-pc` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiosFlags {
	pub mbr_installed: bool,
	pub allow_floppy: bool,
	pub bpb: bool,
	pub rs_codes: bool,
}

/// Parameters for [`install_into_mbr`].
#[derive(Debug, Clone, Copy)]
pub struct InstallOptions {
	pub bpb: bool,
	pub allow_floppy: bool,
	pub rs_codes: bool,
	/// Whether the target device is a hard disk (as opposed to a floppy).
	/// Floppy targets are a non-goal of this crate; this is always `true`
	/// in practice and kept as a parameter only to mirror the conditional
	/// language of the design.
	pub hard_disk: bool,
}

fn read_u16(buf: &[u8], offset: usize, endianness: Endianness) -> u16 {
	let bytes = [buf[offset], buf[offset + 1]];
	match endianness {
		Endianness::Little => u16::from_le_bytes(bytes),
		Endianness::Big => u16::from_be_bytes(bytes),
	}
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32, endianness: Endianness) {
	let bytes = match endianness {
		Endianness::Little => value.to_le_bytes(),
		Endianness::Big => value.to_be_bytes(),
	};
	buf[offset..offset + 4].copy_from_slice(&bytes);
}

/// Round `len` up to the next sector boundary, then double it — the
/// possible Reed–Solomon-encoded size of a raw core image of length `len`.
#[must_use]
pub fn possible_size(len: usize) -> usize {
	let rounded = len.div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
	rounded * 2
}

/// Reed–Solomon-encode `core`'s tail (from `no_rs_len` bytes into the
/// post-sector-0 region onward) to reach exactly `possible_size(core.len())`
/// total bytes, writing the new length back into the header. Fails if the
/// no-RS-length field reads the version-mismatch sentinel.
fn rs_encode_core(core: &[u8], endianness: Endianness) -> Result<Vec<u8>, InstallError> {
	let no_rs_len = read_u16(core, RS_NO_REDUNDANCY_LENGTH_OFFSET, endianness);
	if no_rs_len == RS_VERSION_MISMATCH_SENTINEL {
		return Err(InstallError::CoreImageVersionMismatch);
	}
	let new_len = possible_size(core.len());
	let mut buf = core.to_vec();
	write_u32(&mut buf, RS_REDUNDANCY_OFFSET, new_len as u32, endianness);

	let message_start = usize::from(no_rs_len) + 0x200;
	let message = buf.get(message_start..).unwrap_or(&[]);
	let parity_len = new_len - buf.len();
	let parity = reedsolomon::encode(message, parity_len);
	buf.extend_from_slice(&parity);
	Ok(buf)
}

/// Validate `boot.img`'s and the core image's sizes against the fixed
/// bounds the codec requires.
///
/// # Errors
/// Returns [`InstallError::BadBootImgSize`] / [`InstallError::BadCoreImgSize`].
pub fn validate_sizes(platform: &str, boot_img: &[u8], core: &[u8]) -> Result<(), InstallError> {
	if boot_img.len() != SECTOR_SIZE {
		return Err(InstallError::BadBootImgSize { platform: platform.to_owned(), found: boot_img.len() });
	}
	if !(SECTOR_SIZE..=MAX_CORE_BUFFER).contains(&core.len()) {
		return Err(InstallError::BadCoreImgSize {
			platform: platform.to_owned(),
			found: core.len(),
			max: MAX_CORE_BUFFER,
		});
	}
	Ok(())
}

/// Install `boot_img` + `core` into the first `512*1024` bytes of `device`,
/// per §4.5.2. `boot_img` must be exactly 512 bytes, `core` between 512 and
/// `512*1024` bytes — call [`validate_sizes`] first.
///
/// # Errors
/// Propagates I/O errors from the device, or
/// [`InstallError::CoreImageVersionMismatch`] if RS encoding is requested
/// against a core image whose no-RS-length field is the version sentinel.
#[tracing::instrument(skip(device, boot_img, core))]
pub fn install_into_mbr(
	device: &mut impl BlockDevice, boot_img: &[u8], core: &[u8], opts: InstallOptions, endianness: Endianness,
) -> Result<(), InstallError> {
	let mut existing = [0u8; SECTOR_SIZE];
	device.read_at(0, &mut existing)?;

	let mut w = boot_img.to_vec();
	if opts.bpb {
		w[BPB_START..BPB_END].copy_from_slice(&existing[BPB_START..BPB_END]);
	}
	let overwrite_drive_check = !opts.allow_floppy && opts.hard_disk;
	if overwrite_drive_check {
		w[DRIVE_CHECK..DRIVE_CHECK + 2].copy_from_slice(&[0x90, 0x90]);
	}
	if overwrite_drive_check {
		w[WINDOWS_NT_MAGIC..PART_END].copy_from_slice(&existing[WINDOWS_NT_MAGIC..PART_END]);
	}

	let core_buf = if opts.rs_codes { rs_encode_core(core, endianness)? } else { core.to_vec() };

	device.write_at(0, &w)?;
	device.write_at(SECTOR_SIZE as u64, &core_buf)?;

	let written_so_far = SECTOR_SIZE + core_buf.len();
	if written_so_far < MAX_CORE_BUFFER {
		let padding = vec![0u8; MAX_CORE_BUFFER - written_so_far];
		device.write_at(written_so_far as u64, &padding)?;
	}
	tracing::debug!(rs_codes = opts.rs_codes, core_len = core_buf.len(), "wrote MBR boot sector and core image");
	Ok(())
}

/// Outcome of [`inspect_mbr`]: either a fully-consistent install with its
/// recovered flags, or a reason the on-disk state doesn't validate.
#[derive(Debug)]
pub enum InspectOutcome {
	Consistent(BiosFlags),
	Flawed(String),
}

/// Reconstruct the expected sector from local `boot_img` plus the disk's
/// protected regions, per §4.5.3, and compare the post-sector-0 region
/// against both the raw and the RS-encoded form of `core`.
///
/// # Errors
/// Propagates I/O errors reading from `device`.
pub fn inspect_mbr(
	device: &mut impl BlockDevice, boot_img: &[u8], core: &[u8], endianness: Endianness,
) -> Result<InspectOutcome, InstallError> {
	let mut on_disk = [0u8; SECTOR_SIZE];
	device.read_at(0, &mut on_disk)?;

	let bpb = !is_all_zero(&on_disk[BPB_START..BPB_END]);
	let allow_floppy = on_disk[DRIVE_CHECK..DRIVE_CHECK + 2] != [0x90, 0x90];

	let mut expected = boot_img.to_vec();
	expected[BPB_START..BPB_END].copy_from_slice(&on_disk[BPB_START..BPB_END]);
	expected[DRIVE_CHECK..DRIVE_CHECK + 2].copy_from_slice(&on_disk[DRIVE_CHECK..DRIVE_CHECK + 2]);
	expected[WINDOWS_NT_MAGIC..PART_END].copy_from_slice(&on_disk[WINDOWS_NT_MAGIC..PART_END]);

	if expected != on_disk {
		return Ok(InspectOutcome::Flawed("invalid MBR record content".to_owned()));
	}

	let mut region = vec![0u8; MAX_CORE_BUFFER - SECTOR_SIZE];
	device.read_at(SECTOR_SIZE as u64, &mut region)?;

	let rs_codes = if region.starts_with(core) {
		false
	} else {
		match rs_encode_core(core, endianness) {
			Ok(encoded) if region.starts_with(&encoded) => true,
			_ => return Ok(InspectOutcome::Flawed("core.img content does not match disk".to_owned())),
		}
	};

	let consumed = if rs_codes { possible_size(core.len()) } else { core.len() };
	if !is_all_zero(&region[consumed..]) {
		return Ok(InspectOutcome::Flawed("disk content after core.img should be all zero".to_owned()));
	}

	Ok(InspectOutcome::Consistent(BiosFlags { mbr_installed: true, allow_floppy, bpb, rs_codes }))
}

/// Write the zeroed boot sector per §4.5.4: 510 zero bytes then `55 AA`,
/// with the three protected regions preserved from the disk's current
/// sector, followed by zero padding to `512*1024`.
///
/// # Errors
/// Propagates I/O errors from the device.
pub fn remove_from_mbr(device: &mut impl BlockDevice) -> Result<(), InstallError> {
	let mut existing = [0u8; SECTOR_SIZE];
	device.read_at(0, &mut existing)?;

	let mut sector = vec![0u8; SECTOR_SIZE];
	sector[SECTOR_SIZE - 2..].copy_from_slice(&[0x55, 0xAA]);
	sector[BPB_START..BPB_END].copy_from_slice(&existing[BPB_START..BPB_END]);
	sector[WINDOWS_NT_MAGIC..PART_END].copy_from_slice(&existing[WINDOWS_NT_MAGIC..PART_END]);

	device.write_at(0, &sector)?;
	let padding = vec![0u8; MAX_CORE_BUFFER - SECTOR_SIZE];
	device.write_at(SECTOR_SIZE as u64, &padding)?;
	tracing::debug!("removed i386-pc MBR install, partition table preserved");
	Ok(())
}

/// Verify a whole-disk device is eligible for an MBR install per §4.5.5:
/// not a partition, MBR-style partition table, at least one primary
/// partition, and the first partition starts at or after the `512*1024`
/// MBR gap.
///
/// # Errors
/// Returns [`InstallError::DiskPrecondition`] on any violation, or
/// [`InstallError::Io`] if the device can't be opened/read.
pub fn check_disk_precondition(disk: &Path) -> Result<(), InstallError> {
	if let Some(whole) = crate::mount::whole_disk_of(disk) {
		if whole != disk {
			return Err(InstallError::DiskPrecondition(format!(
				"{disk:?} looks like a partition (whole disk is {whole:?}), pass the whole disk device"
			)));
		}
	}

	let mut file = std::fs::File::open(disk)?;
	if gptman::GPT::find_from(&mut file).is_ok() {
		return Err(InstallError::DiskPrecondition(format!("{disk:?} has a GPT partition table, not MBR")));
	}

	let mut file = std::fs::File::open(disk)?;
	let mbr = mbrman::MBR::read_from(&mut file, SECTOR_SIZE as u32).map_err(|e| {
		InstallError::DiskPrecondition(format!("{disk:?} has no valid MBR partition table: {e}"))
	})?;

	let mut partitions = mbr.iter().filter(|(_, p)| p.is_used());
	let Some((_, first)) = partitions.next() else {
		return Err(InstallError::DiskPrecondition(format!("{disk:?} has no primary partitions")));
	};

	let first_byte_offset = u64::from(first.starting_lba) * u64::from(mbr.sector_size);
	if first_byte_offset < MAX_CORE_BUFFER as u64 {
		return Err(InstallError::DiskPrecondition(format!(
			"{disk:?} first partition starts at byte {first_byte_offset}, MBR gap needs at least {MAX_CORE_BUFFER}"
		)));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::blockdev::MemBlockDevice;

	fn sample_boot_img() -> Vec<u8> {
		let mut b = vec![0u8; SECTOR_SIZE];
		b[SECTOR_SIZE - 2..].copy_from_slice(&[0x55, 0xAA]);
		b[BPB_START..BPB_END].fill(0xAB);
		b[WINDOWS_NT_MAGIC..PART_END].fill(0xCD);
		b
	}

	fn sample_core() -> Vec<u8> {
		let mut c = vec![0x42u8; 1500];
		// Leave the no-RS-length field at a harmless, non-sentinel value.
		write_u32(&mut c, RS_REDUNDANCY_OFFSET, 0, Endianness::Little);
		c[RS_NO_REDUNDANCY_LENGTH_OFFSET..RS_NO_REDUNDANCY_LENGTH_OFFSET + 2].copy_from_slice(&0u16.to_le_bytes());
		c
	}

	#[test]
	fn round_trip_without_rs_recovers_install_flags() {
		let mut dev = MemBlockDevice::zeroed(MAX_CORE_BUFFER);
		let boot = sample_boot_img();
		let core = sample_core();
		let opts = InstallOptions { bpb: true, allow_floppy: false, rs_codes: false, hard_disk: true };

		install_into_mbr(&mut dev, &boot, &core, opts, Endianness::Little).unwrap();

		assert_eq!(dev.bytes[DRIVE_CHECK], 0x90);
		assert_eq!(dev.bytes[DRIVE_CHECK + 1], 0x90);
		assert_eq!(&dev.bytes[SECTOR_SIZE..SECTOR_SIZE + core.len()], core.as_slice());

		match inspect_mbr(&mut dev, &boot, &core, Endianness::Little).unwrap() {
			InspectOutcome::Consistent(flags) => {
				assert!(flags.bpb);
				assert!(!flags.allow_floppy);
				assert!(!flags.rs_codes);
			},
			InspectOutcome::Flawed(reason) => panic!("expected consistent install, got {reason}"),
		}
	}

	#[test]
	fn round_trip_with_rs_codes_zero_pads_the_tail() {
		let mut dev = MemBlockDevice::zeroed(MAX_CORE_BUFFER);
		let boot = sample_boot_img();
		let core = sample_core();
		let opts = InstallOptions { bpb: true, allow_floppy: false, rs_codes: true, hard_disk: true };

		install_into_mbr(&mut dev, &boot, &core, opts, Endianness::Little).unwrap();

		match inspect_mbr(&mut dev, &boot, &core, Endianness::Little).unwrap() {
			InspectOutcome::Consistent(flags) => assert!(flags.rs_codes),
			InspectOutcome::Flawed(reason) => panic!("expected consistent RS install, got {reason}"),
		}

		let encoded_len = possible_size(core.len());
		let tail_start = SECTOR_SIZE + encoded_len;
		assert!(is_all_zero(&dev.bytes[tail_start..]));
	}

	#[test]
	fn tampering_with_partition_table_is_detected() {
		let mut dev = MemBlockDevice::zeroed(MAX_CORE_BUFFER);
		let boot = sample_boot_img();
		let core = sample_core();
		let opts = InstallOptions { bpb: true, allow_floppy: false, rs_codes: false, hard_disk: true };
		install_into_mbr(&mut dev, &boot, &core, opts, Endianness::Little).unwrap();

		dev.bytes[DRIVE_CHECK + 1] = 0xEB;

		match inspect_mbr(&mut dev, &boot, &core, Endianness::Little).unwrap() {
			InspectOutcome::Flawed(reason) => assert_eq!(reason, "invalid MBR record content"),
			InspectOutcome::Consistent(_) => panic!("tampering should have been detected"),
		}
	}

	#[test]
	fn remove_preserves_partition_table_and_bpb() {
		let mut dev = MemBlockDevice::zeroed(MAX_CORE_BUFFER);
		let boot = sample_boot_img();
		let core = sample_core();
		let opts = InstallOptions { bpb: true, allow_floppy: false, rs_codes: false, hard_disk: true };
		install_into_mbr(&mut dev, &boot, &core, opts, Endianness::Little).unwrap();

		remove_from_mbr(&mut dev).unwrap();

		assert_eq!(&dev.bytes[SECTOR_SIZE - 2..SECTOR_SIZE], &[0x55, 0xAA]);
		assert_eq!(&dev.bytes[WINDOWS_NT_MAGIC..PART_END], &boot[WINDOWS_NT_MAGIC..PART_END]);
		assert_eq!(&dev.bytes[BPB_START..BPB_END], &boot[BPB_START..BPB_END]);
		assert!(is_all_zero(&dev.bytes[BPB_END..WINDOWS_NT_MAGIC]));
		assert!(is_all_zero(&dev.bytes[SECTOR_SIZE..]));
	}

	#[test]
	fn possible_size_rounds_up_then_doubles() {
		assert_eq!(possible_size(1), SECTOR_SIZE * 2);
		assert_eq!(possible_size(SECTOR_SIZE), SECTOR_SIZE * 2);
		assert_eq!(possible_size(SECTOR_SIZE + 1), SECTOR_SIZE * 4);
	}

	#[test]
	fn rs_version_mismatch_sentinel_is_rejected() {
		let mut core = sample_core();
		core[RS_NO_REDUNDANCY_LENGTH_OFFSET..RS_NO_REDUNDANCY_LENGTH_OFFSET + 2]
			.copy_from_slice(&RS_VERSION_MISMATCH_SENTINEL.to_le_bytes());
		let err = rs_encode_core(&core, Endianness::Little).unwrap_err();
		assert!(matches!(err, InstallError::CoreImageVersionMismatch));
	}
}
