//! # Checksum CLI — Print the content checksum of files.
//!
//! Output matches `sha256sum`: `<hex>  <path>`. The value is exactly the
//! checksum `process --raw` submits, so it can be pasted into a JSON
//! submission.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use govpipe_core::{content_checksum, Checksum};

use crate::exit;

/// Arguments for `govpipe checksum`.
#[derive(Args, Debug)]
pub struct ChecksumArgs {
    /// Files to fingerprint.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Execute the checksum subcommand.
pub fn run_checksum(args: &ChecksumArgs) -> Result<u8> {
    for path in &args.files {
        let checksum = file_checksum(path)?;
        println!("{checksum}  {}", path.display());
    }
    Ok(exit::APPROVED)
}

/// Checksum of a UTF-8 file's content.
pub fn file_checksum(path: &std::path::Path) -> Result<Checksum> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {} as UTF-8 text", path.display()))?;
    Ok(content_checksum(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();
        assert_eq!(
            file_checksum(&path).unwrap().as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_checksum(&dir.path().join("absent.txt")).is_err());
    }
}
