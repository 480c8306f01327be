mod decrypt;
mod encrypt;

pub use decrypt::Decrypt;
pub use encrypt::Encrypt;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Encrypt or decrypt the media payload of a webm file while leaving the
/// container structure intact.
#[derive(Debug, Clone, Parser)]
#[command(about, version, disable_version_flag = true)]
pub struct Args {
    /// Path of the webm file to read.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path where the processed webm file is written.
    /// Must differ from the input path.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Binary key file to use for the AES cipher. Must be exactly 16 bytes.
    /// Required for decryption; generated and stored next to the output
    /// when omitted during encryption.
    #[arg(short, long)]
    pub keyfile: Option<PathBuf>,

    /// Decrypt the input file (encrypt is the default).
    #[arg(short, long)]
    pub decrypt: bool,

    /// Verbose output.
    #[arg(long)]
    pub verbose: bool,

    /// Print version.
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,
}

/// Reads a raw 16-byte key file, with no framing or encoding around it.
pub(crate) fn read_key(path: &Path) -> Result<[u8; 16]> {
    let bytes = fs::read(path)
        .with_context(|| format!("could not read key file '{}'", path.display()))?;

    if bytes.len() != 16 {
        bail!("Key file must be exactly 16 bytes! Length was {}.", bytes.len());
    }

    let mut key = [0u8; 16];
    key.copy_from_slice(&bytes);
    Ok(key)
}
