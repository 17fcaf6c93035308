use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "chunkvault: split, protect and reassemble files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// par2 when found on PATH, otherwise in-process Reed-Solomon
    Auto,
    Par2,
    Rs,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RepairArg {
    Always,
    OnFailure,
    Never,
}

/// Key material; at most one form may be given.
#[derive(Args, Debug, Default)]
pub struct KeyArgs {
    /// Base64 AES key (16, 24 or 32 bytes once decoded)
    #[arg(long = "key", conflicts_with = "key_hex")]
    pub key_b64: Option<String>,

    /// Same key, hex encoded
    #[arg(long = "key-hex")]
    pub key_hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct BoundsArgs {
    #[arg(long, default_value_t = 999_996)]
    pub min: u64,
    #[arg(long, default_value_t = 1_499_996)]
    pub target: u64,
    #[arg(long, default_value_t = 1_999_996)]
    pub max: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split a file into checksummed chunks
    Split {
        src: PathBuf,
        out_dir: PathBuf,

        /// Deflate before chunking
        #[arg(long)]
        compress: bool,

        #[command(flatten)]
        key: KeyArgs,

        #[command(flatten)]
        bounds: BoundsArgs,

        #[arg(long, default_value = "chunk")]
        prefix: String,

        /// Parity backend to protect the new chunk set with
        #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
        parity: BackendArg,

        #[arg(long, default_value_t = 0.07)]
        parity_ratio: f64,
    },

    /// Reassemble a chunk set into one file
    Combine {
        dir: PathBuf,
        out: PathBuf,

        #[arg(long, default_value = "chunk")]
        prefix: String,

        #[command(flatten)]
        key: KeyArgs,

        #[arg(long, value_enum, default_value_t = RepairArg::Always)]
        repair: RepairArg,

        #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
        parity: BackendArg,
    },

    /// Check every chunk's CRC32 trailer
    Verify {
        dir: PathBuf,
        #[arg(long, default_value = "chunk")]
        prefix: String,
    },

    /// Add parity chunks to an existing chunk set
    Parity {
        dir: PathBuf,
        #[arg(long, default_value = "chunk")]
        prefix: String,
        #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
        backend: BackendArg,
        #[arg(long, default_value_t = 0.07)]
        ratio: f64,
    },

    /// Print the chunk sizes planned for a payload size
    Plan {
        size: u64,
        #[command(flatten)]
        bounds: BoundsArgs,
    },

    /// Show a chunk set's manifest
    Info {
        dir: PathBuf,
        #[arg(long, default_value = "chunk")]
        prefix: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_defaults() {
        let cli = Cli::try_parse_from(["chunkvault", "split", "in.bin", "out"]).unwrap();
        let Commands::Split {
            compress,
            bounds,
            prefix,
            parity,
            key,
            ..
        } = cli.command
        else {
            panic!("expected split");
        };
        assert!(!compress);
        assert_eq!((bounds.min, bounds.target, bounds.max), (999_996, 1_499_996, 1_999_996));
        assert_eq!(prefix, "chunk");
        assert_eq!(parity, BackendArg::Auto);
        assert!(key.key_b64.is_none() && key.key_hex.is_none());
    }

    #[test]
    fn key_forms_conflict() {
        let res = Cli::try_parse_from([
            "chunkvault", "combine", "d", "o", "--key", "AAAA", "--key-hex", "00",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn repair_policy_parses() {
        let cli =
            Cli::try_parse_from(["chunkvault", "combine", "d", "o", "--repair", "on-failure"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Combine {
                repair: RepairArg::OnFailure,
                ..
            }
        ));
    }
}
