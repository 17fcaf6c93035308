use std::path::PathBuf;

use chunkvault_core::parity::{Par2Cli, ReedSolomonBackend};
use chunkvault_core::read::verify::ChunkStatus;
use chunkvault_core::{
    ChunkBounds, ChunkSet, CipherKey, ParityBackend, ParityManager, RepairPolicy, Result,
    SplitOptions, VaultError, combine_set, split_file, verify_chunks,
};
use tracing::warn;

use crate::presentation::cli::{BackendArg, BoundsArgs, KeyArgs, RepairArg};

fn key_from_args(args: KeyArgs) -> Result<Option<CipherKey>> {
    match (args.key_b64, args.key_hex) {
        (Some(b64), _) => CipherKey::from_base64(&b64).map(Some),
        (None, Some(hex)) => CipherKey::from_hex(&hex).map(Some),
        (None, None) => Ok(None),
    }
}

fn bounds_from_args(args: BoundsArgs) -> Result<ChunkBounds> {
    ChunkBounds::new(args.min, args.target, args.max)
}

fn backend_from_arg(arg: BackendArg) -> Option<Box<dyn ParityBackend>> {
    match arg {
        BackendArg::Auto => {
            let backend: Box<dyn ParityBackend> = match Par2Cli::from_path() {
                Some(cli) => Box::new(cli),
                None => Box::new(ReedSolomonBackend::new()),
            };
            Some(backend)
        }
        BackendArg::Par2 => match Par2Cli::from_path() {
            Some(cli) => Some(Box::new(cli)),
            None => {
                warn!("par2 not found on PATH");
                None
            }
        },
        BackendArg::Rs => Some(Box::new(ReedSolomonBackend::new())),
        BackendArg::None => None,
    }
}

/// `auto` follows the backend recorded for an existing parity set, so
/// parity files always go back to the tool that wrote them.
fn backend_for_set(arg: BackendArg, recorded: Option<&str>) -> Option<Box<dyn ParityBackend>> {
    match (arg, recorded) {
        (BackendArg::Auto, Some("reed-solomon")) => backend_from_arg(BackendArg::Rs),
        (BackendArg::Auto, Some("par2")) => backend_from_arg(BackendArg::Par2),
        _ => backend_from_arg(arg),
    }
}

fn repair_from_arg(arg: RepairArg) -> RepairPolicy {
    match arg {
        RepairArg::Always => RepairPolicy::Always,
        RepairArg::OnFailure => RepairPolicy::OnChecksumFailure,
        RepairArg::Never => RepairPolicy::Never,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn handle_split(
    src: PathBuf,
    out_dir: PathBuf,
    compress: bool,
    key: KeyArgs,
    bounds: BoundsArgs,
    prefix: String,
    parity: BackendArg,
    parity_ratio: f64,
) -> Result<()> {
    let key = key_from_args(key)?;
    let opts = SplitOptions {
        compress,
        encrypt: key.is_some(),
        key,
        bounds: bounds_from_args(bounds)?,
        prefix,
    };
    let mut set = split_file(&src, &out_dir, &opts)?;
    if let Some(backend) = backend_from_arg(parity) {
        ParityManager::new(backend.as_ref())
            .with_ratio(parity_ratio)
            .add_parity(&mut set)?;
    }
    let stats = set.stats();
    println!(
        "{} data + {} parity chunks, {} -> {} bytes (ratio {:.3})",
        set.data.len(),
        set.parity.len(),
        stats.source_size,
        stats.transformed_size,
        stats.compression_ratio
    );
    Ok(())
}

pub fn handle_combine(
    dir: PathBuf,
    out: PathBuf,
    prefix: String,
    key: KeyArgs,
    repair: RepairArg,
    parity: BackendArg,
) -> Result<()> {
    let set = ChunkSet::load(&dir, &prefix)?;
    let key = key_from_args(key)?;
    let backend = backend_for_set(parity, set.parity_backend.as_deref());
    let manager = backend.as_deref().map(ParityManager::new);
    let report = combine_set(
        &set,
        &out,
        key.as_ref(),
        repair_from_arg(repair),
        manager.as_ref(),
    )?;
    println!(
        "{} bytes from {} chunks, blake3 {}{}",
        report.bytes_written,
        report.data_chunks,
        report.blake3,
        if report.repaired { " (after repair)" } else { "" }
    );
    Ok(())
}

pub fn handle_verify(dir: PathBuf, prefix: String) -> Result<()> {
    let set = ChunkSet::load(&dir, &prefix)?;
    let report = verify_chunks(&set.chunks())?;
    for (chunk, status) in &report.entries {
        let name = chunk.file_name()?;
        match status {
            ChunkStatus::Ok => println!("ok       {name}"),
            ChunkStatus::Corrupt { stored, computed } => {
                println!("corrupt  {name} stored={stored:08x} computed={computed:08x}")
            }
            ChunkStatus::Missing => println!("missing  {name}"),
        }
    }
    let damaged = report.damaged().count();
    if damaged > 0 {
        return Err(VaultError::Format(format!(
            "{damaged} of {} chunks damaged",
            report.entries.len()
        )));
    }
    eprintln!("verify: OK");
    Ok(())
}

pub fn handle_parity(dir: PathBuf, prefix: String, backend: BackendArg, ratio: f64) -> Result<()> {
    let mut set = ChunkSet::load(&dir, &prefix)?;
    let Some(backend) = backend_for_set(backend, set.parity_backend.as_deref()) else {
        return Err(VaultError::ExternalTool {
            tool: "parity".into(),
            reason: "no backend selected".into(),
        });
    };
    let added = ParityManager::new(backend.as_ref())
        .with_ratio(ratio)
        .add_parity(&mut set)?;
    println!("{} parity chunks added via {}", added.len(), backend.name());
    Ok(())
}

pub fn handle_plan(size: u64, bounds: BoundsArgs) -> Result<()> {
    let plan = bounds_from_args(bounds)?.plan(size);
    for (i, s) in plan.sizes().iter().enumerate() {
        println!("#{:<5} {s}", i + 1);
    }
    println!("{} chunks, {} bytes", plan.len(), plan.total());
    Ok(())
}

pub fn handle_info(dir: PathBuf, prefix: String) -> Result<()> {
    let set = ChunkSet::load(&dir, &prefix)?;
    let stats = set.stats();
    println!("source      {} ({} bytes)", set.source.name, set.source.size);
    println!("blake3      {}", set.source.blake3);
    println!("compressed  {}", set.compressed);
    println!("encrypted   {}", set.encrypted);
    println!(
        "bounds      min={} target={} max={}",
        set.bounds.min, set.bounds.target, set.bounds.max
    );
    println!("ratio       {:.3}", stats.compression_ratio);
    for c in set.chunks() {
        println!(
            "#{:<5} {:<20} {:?} len={} crc={:08x}",
            c.sequence,
            c.file_name()?,
            c.kind,
            c.payload_len,
            c.crc32
        );
    }
    Ok(())
}
