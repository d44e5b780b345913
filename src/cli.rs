//! CLI front-end (A1): the `grubctl` subcommands, mirroring `Target`'s
//! operations one-to-one.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Install, inspect, compare and remove a multi-platform GRUB boot loader")]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,

	/// Optional TOML manifest; flags below override whatever it sets.
	#[arg(long, global = true)]
	pub manifest: Option<PathBuf>,

	/// Raise the tracing filter level by one step per occurrence.
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Install a platform's module set and core image, optionally embedding
	/// a BIOS boot sector or an EFI removable-media copy.
	Install(InstallArgs),
	/// Report each platform's installation status (NotExist/Perfect/WithFlaws).
	Inspect(InspectArgs),
	/// Byte-compare an installed target against a Source.
	Compare(CompareArgs),
	/// Remove one platform, or every installed platform with `--all`.
	Remove(RemoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
	/// Root of the GRUB module tree (`usr/lib/grub`'s parent).
	#[arg(long)]
	pub source: Option<PathBuf>,
	/// Boot filesystem root (contains, or will contain, `grub/`).
	#[arg(long)]
	pub boot_dir: Option<PathBuf>,
	/// Raw disk device, required for i386-pc's MBR embedding.
	#[arg(long)]
	pub disk: Option<PathBuf>,
	/// Platform identifier, e.g. `x86_64-efi`. Omit to install every
	/// platform present in the Source.
	#[arg(long)]
	pub platform: Option<String>,
	#[arg(long)]
	pub debug_image: Option<String>,
	#[arg(long)]
	pub allow_floppy: bool,
	#[arg(long)]
	pub no_bpb: bool,
	#[arg(long)]
	pub rs_codes: bool,
}

#[derive(clap::Args, Debug)]
pub struct InspectArgs {
	#[arg(long)]
	pub boot_dir: Option<PathBuf>,
	#[arg(long)]
	pub disk: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct CompareArgs {
	#[arg(long)]
	pub source: Option<PathBuf>,
	#[arg(long)]
	pub boot_dir: Option<PathBuf>,
	/// The debug image the target is expected to have been installed with,
	/// for the core image's second recompute attempt.
	#[arg(long)]
	pub debug_image: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
	#[arg(long)]
	pub boot_dir: Option<PathBuf>,
	#[arg(long)]
	pub disk: Option<PathBuf>,
	#[arg(long)]
	pub platform: Option<String>,
	#[arg(long)]
	pub all: bool,
}
