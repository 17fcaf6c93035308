use super::{PARITY_FILE_SUFFIX, ParityBackend, ParityLayout};
use crate::error::{Result, VaultError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Basename par2 writes its recovery set under during `create`.
const RECOVERY_BASENAME: &str = "recovery";

/// External `par2` (par2cmdline) binary.
#[derive(Clone, Debug)]
pub struct Par2Cli {
    binary: PathBuf,
}

impl Par2Cli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Locate `par2` on `PATH`.
    pub fn from_path() -> Option<Self> {
        let path = env::var_os("PATH")?;
        env::split_paths(&path)
            .map(|dir| dir.join("par2"))
            .find(|p| p.is_file())
            .map(Self::new)
    }

    fn run(&self, dir: &Path, args: &[String]) -> Result<()> {
        debug!(binary = %self.binary.display(), ?args, "running par2");
        let out = Command::new(&self.binary)
            .current_dir(dir)
            .args(args)
            .output()
            .map_err(|e| self.failure(format!("spawn: {e}")))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(self.failure(format!("{}: {}", out.status, stderr.trim())));
        }
        Ok(())
    }

    fn failure(&self, reason: String) -> VaultError {
        VaultError::ExternalTool {
            tool: self.binary.display().to_string(),
            reason,
        }
    }
}

fn file_names(paths: &[PathBuf]) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| VaultError::Format(format!("bad file name {}", p.display())))
        })
        .collect()
}

impl ParityBackend for Par2Cli {
    fn name(&self) -> &str {
        "par2"
    }

    fn is_available(&self) -> bool {
        self.binary.is_file()
    }

    fn create(&self, dir: &Path, data: &[PathBuf], layout: &ParityLayout) -> Result<Vec<PathBuf>> {
        let index = format!("{RECOVERY_BASENAME}.{PARITY_FILE_SUFFIX}");
        let mut args = vec![
            "create".to_string(),
            "-q".to_string(),
            format!("-s{}", layout.block_size),
            format!("-c{}", layout.block_count),
            format!("-n{}", layout.file_count),
            index.clone(),
        ];
        args.extend(file_names(data)?);
        self.run(dir, &args)?;

        // keep only the volume files; the index is small metadata par2 can do without
        fs::remove_file(dir.join(&index))?;
        let mut produced = Vec::new();
        for e in fs::read_dir(dir)? {
            let e = e?;
            let name = e.file_name().to_string_lossy().to_string();
            if name.starts_with(&format!("{RECOVERY_BASENAME}.vol"))
                && name.ends_with(&format!(".{PARITY_FILE_SUFFIX}"))
            {
                produced.push(e.path());
            }
        }
        produced.sort();
        if produced.is_empty() {
            return Err(self.failure("no recovery volumes produced".into()));
        }
        Ok(produced)
    }

    fn repair(&self, dir: &Path, data: &[PathBuf], parity: &[PathBuf]) -> Result<()> {
        let mut args = vec!["repair".to_string(), "-q".to_string()];
        args.extend(file_names(parity)?);
        // missing data files are found through the recovery packets
        let present: Vec<PathBuf> = data.iter().filter(|p| p.exists()).cloned().collect();
        args.extend(file_names(&present)?);
        self.run(dir, &args)
    }
}
