//! The injected block-device interface the codec (C5) is built against, so
//! it can be unit-tested without a real disk or loop device.

use std::{
	fs::File,
	io::{self, Read, Seek, SeekFrom, Write},
};

/// Minimal read-at-offset / write-at-offset / length interface. The codec
/// in [`crate::bios`] is written purely against this trait; `install`,
/// `inspect` and `remove` never touch `std::fs` directly.
pub trait BlockDevice {
	/// Total addressable length in bytes.
	fn len(&self) -> io::Result<u64>;

	/// True when the device has zero length.
	///
	/// # Errors
	/// Propagates any error from computing the device's length.
	fn is_empty(&self) -> io::Result<bool> {
		Ok(self.len()? == 0)
	}

	/// Read exactly `buf.len()` bytes starting at `offset`.
	fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

	/// Write `buf` starting at `offset`.
	fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;
}

/// A real disk device or disk image file.
pub struct FileBlockDevice {
	file: File,
}

impl FileBlockDevice {
	/// Open `path` for reading and writing.
	///
	/// # Errors
	/// Propagates `std::fs::OpenOptions::open` failures.
	pub fn open_rw(path: &std::path::Path) -> io::Result<Self> {
		let file = std::fs::OpenOptions::new().read(true).write(true).open(path)?;
		Ok(Self { file })
	}

	/// Open `path` for reading only.
	///
	/// # Errors
	/// Propagates `std::fs::File::open` failures.
	pub fn open_ro(path: &std::path::Path) -> io::Result<Self> {
		let file = std::fs::OpenOptions::new().read(true).open(path)?;
		Ok(Self { file })
	}
}

impl BlockDevice for FileBlockDevice {
	fn len(&self) -> io::Result<u64> {
		Ok(self.file.metadata()?.len())
	}

	fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(offset))?;
		self.file.read_exact(buf)
	}

	fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(offset))?;
		self.file.write_all(buf)
	}
}

/// An in-memory fake used by codec tests, per the design's call to keep the
/// codec pure over byte buffers and test it without real hardware.
#[derive(Debug, Clone, Default)]
pub struct MemBlockDevice {
	pub bytes: Vec<u8>,
}

impl MemBlockDevice {
	/// A device of `len` zero bytes.
	#[must_use]
	pub fn zeroed(len: usize) -> Self {
		Self { bytes: vec![0u8; len] }
	}
}

impl BlockDevice for MemBlockDevice {
	fn len(&self) -> io::Result<u64> {
		Ok(self.bytes.len() as u64)
	}

	fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
		let offset = offset as usize;
		let end = offset.checked_add(buf.len()).ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
		let Some(src) = self.bytes.get(offset..end) else {
			return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of device"));
		};
		buf.copy_from_slice(src);
		Ok(())
	}

	fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
		let offset = offset as usize;
		let end = offset.checked_add(buf.len()).ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
		if end > self.bytes.len() {
			self.bytes.resize(end, 0);
		}
		self.bytes[offset..end].copy_from_slice(buf);
		Ok(())
	}
}
