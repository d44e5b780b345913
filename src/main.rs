#![warn(clippy::complexity)]
#![warn(clippy::correctness)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![warn(clippy::perf)]
#![warn(clippy::style)]
#![warn(clippy::suspicious)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::missing_panics_doc)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::format_push_string)]
#![warn(clippy::get_unwrap)]
#![allow(clippy::missing_inline_in_public_items)]
#![allow(clippy::implicit_return)]
#![allow(clippy::blanket_clippy_restriction_lints)]
#![allow(clippy::pattern_type_mismatch)]

mod bios;
mod blockdev;
mod cli;
mod efi;
mod error;
mod image;
#[macro_use]
mod macros;
mod manifest;
mod mount;
mod platform;
mod reedsolomon;
mod source;
mod target;
#[macro_use]
mod util;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::{
	eyre::{eyre, Context},
	Result, Section,
};
use manifest::Manifest;
use platform::Platform;
use source::Source;
use target::{AccessMode, InstallOptions, Target};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

fn main() -> Result<()> {
	if let Err(e) = dotenvy::dotenv() {
		if !e.not_found() {
			return Err(e.into());
		}
	}

	color_eyre::install()?;

	let cli = Cli::parse();
	let default_level = match cli.verbose {
		0 => "info",
		1 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_env("GRUBCTL_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
	let fmtlyr = fmt::layer().pretty().with_filter(filter);
	let subscriber = Registry::default().with(tracing_error::ErrorLayer::default()).with(fmtlyr);
	tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

	let manifest = match &cli.manifest {
		Some(path) => Manifest::load(path).wrap_err("loading manifest")?,
		None => Manifest::default(),
	};

	match cli.command {
		Command::Install(args) => run_install(&manifest, &args),
		Command::Inspect(args) => run_inspect(&manifest, &args),
		Command::Compare(args) => run_compare(&manifest, &args),
		Command::Remove(args) => run_remove(&manifest, &args),
	}
}

fn open_source(source_dir: &std::path::Path) -> Result<Source> {
	let lib_root = source_dir.join("lib/grub");
	let share_root = source_dir.join("share/grub");
	Source::open(lib_root, share_root)
		.map_err(|e| eyre!(e))
		.with_suggestion(|| "pass --source pointing at a directory laid out as lib/grub/<platform>, share/grub".to_owned())
}

fn resolve_platform(id: &str) -> Result<Platform> {
	Platform::parse(id).ok_or_else(|| eyre!("{id:?} is not a known platform identifier"))
}

fn run_install(manifest: &Manifest, args: &cli::InstallArgs) -> Result<()> {
	sudo::escalate_if_needed().map_err(|e| eyre!("failed to escalate privileges: {e}"))?;

	let source_dir = args
		.source
		.clone()
		.or_else(|| manifest.source_dir.clone())
		.ok_or_else(|| eyre!("--source is required (or set source_dir in the manifest)"))?;
	let boot_dir = args
		.boot_dir
		.clone()
		.or_else(|| manifest.boot_dir.clone())
		.ok_or_else(|| eyre!("--boot-dir is required (or set boot_dir in the manifest)"))?;
	let disk = args.disk.clone().or_else(|| manifest.disk.clone());
	let platform_id = args.platform.clone().or_else(|| manifest.platform.clone());

	let source = open_source(&source_dir)?;
	let mut target = Target::open(&boot_dir, disk, AccessMode::Rw).wrap_err("opening target")?;

	let opts = InstallOptions {
		debug_image: args.debug_image.clone().or_else(|| manifest.debug_image.clone()),
		allow_floppy: args.allow_floppy || manifest.allow_floppy,
		bpb: !args.no_bpb && manifest.bpb,
		rs_codes: args.rs_codes || manifest.rs_codes,
	};

	let platforms = match platform_id {
		Some(id) => vec![resolve_platform(&id)?],
		None => source.platforms().collect::<Vec<_>>(),
	};
	if platforms.is_empty() {
		return Err(eyre!("no platforms to install: Source has no platform directories"));
	}

	for platform in platforms {
		target
			.install_platform(platform, &source, &opts)
			.map_err(|e| eyre!(e))
			.with_note(|| format!("installing platform {platform}"))?;
		tracing::info!(%platform, "install complete");
	}
	Ok(())
}

fn run_inspect(manifest: &Manifest, args: &cli::InspectArgs) -> Result<()> {
	let boot_dir = args
		.boot_dir
		.clone()
		.or_else(|| manifest.boot_dir.clone())
		.ok_or_else(|| eyre!("--boot-dir is required (or set boot_dir in the manifest)"))?;
	let disk = args.disk.clone().or_else(|| manifest.disk.clone());

	let target = Target::open(&boot_dir, disk, AccessMode::R).wrap_err("opening target")?;
	let mut any = false;
	for platform in target.installed_platforms() {
		any = true;
		println!("{platform}: {:?}", target.get_platform_install_info(platform));
	}
	if !any {
		println!("no platforms installed under {}", boot_dir.join("grub").display());
	}
	Ok(())
}

fn run_compare(manifest: &Manifest, args: &cli::CompareArgs) -> Result<()> {
	let source_dir = args
		.source
		.clone()
		.or_else(|| manifest.source_dir.clone())
		.ok_or_else(|| eyre!("--source is required (or set source_dir in the manifest)"))?;
	let boot_dir = args
		.boot_dir
		.clone()
		.or_else(|| manifest.boot_dir.clone())
		.ok_or_else(|| eyre!("--boot-dir is required (or set boot_dir in the manifest)"))?;

	let debug_image = args.debug_image.clone().or_else(|| manifest.debug_image.clone());

	let source = open_source(&source_dir)?;
	let target = Target::open(&boot_dir, None, AccessMode::R).wrap_err("opening target")?;
	target
		.compare_source(&source, debug_image.as_deref())
		.map_err(|e| eyre!(e))
		.with_note(|| "target drifted from source".to_owned())?;
	println!("target matches source");
	Ok(())
}

fn run_remove(manifest: &Manifest, args: &cli::RemoveArgs) -> Result<()> {
	sudo::escalate_if_needed().map_err(|e| eyre!("failed to escalate privileges: {e}"))?;

	let boot_dir = args
		.boot_dir
		.clone()
		.or_else(|| manifest.boot_dir.clone())
		.ok_or_else(|| eyre!("--boot-dir is required (or set boot_dir in the manifest)"))?;
	let disk = args.disk.clone().or_else(|| manifest.disk.clone());
	let mut target = Target::open(&boot_dir, disk, AccessMode::Rw).wrap_err("opening target")?;

	if args.all {
		target.remove_all().map_err(|e| eyre!(e))?;
		tracing::info!("removed every installed platform");
		return Ok(());
	}

	let platform_id = args
		.platform
		.clone()
		.or_else(|| manifest.platform.clone())
		.ok_or_else(|| eyre!("--platform or --all is required"))?;
	let platform = resolve_platform(&platform_id)?;
	target.remove_platform(platform).map_err(|e| eyre!(e))?;
	tracing::info!(%platform, "removed platform");
	Ok(())
}
