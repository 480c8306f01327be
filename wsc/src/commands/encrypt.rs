use anyhow::{Result, bail};
use rand::{RngCore, rngs::OsRng};
use std::{
    fs,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use webm_crypt::{Mode, WebmCryptor};

/// Encrypt a webm file, generating a key file when none is supplied.
#[derive(Debug, Clone)]
pub struct Encrypt {
    pub input: PathBuf,
    pub output: PathBuf,
    pub keyfile: Option<PathBuf>,
}

impl Encrypt {
    pub fn execute(self) -> Result<()> {
        if self.input == self.output {
            bail!("Input and output paths cannot be the same.");
        }

        log::debug!(
            "Encrypting file '{}'. Output will be stored at '{}'.",
            self.input.display(),
            self.output.display()
        );

        let key = match &self.keyfile {
            Some(path) => {
                log::debug!("Reading encryption key from '{}'.", path.display());
                super::read_key(path)?
            }
            None => {
                let path = keyfile_path(&self.output);
                log::debug!(
                    "Generating random encryption key. Storing at '{}'.",
                    path.display()
                );

                let mut key = [0u8; 16];
                OsRng.fill_bytes(&mut key);
                fs::write(&path, key)?;
                key
            }
        };

        let cryptor = WebmCryptor::new(Mode::Encrypt, &key)?;
        log::debug!("Encrypting file with key <{}>.", hex::encode(key));

        let source = BufReader::new(File::open(&self.input)?);
        let mut sink = BufWriter::new(File::create(&self.output)?);
        cryptor.process(source, &mut sink)?;
        sink.flush()?;

        log::debug!("Finished!");
        Ok(())
    }
}

/// Key file path for a generated key: the output path with a trailing
/// `.webm` stripped and `_keyfile.key` appended.
fn keyfile_path(output: &Path) -> PathBuf {
    let base = output.to_string_lossy();
    let base = base.strip_suffix(".webm").unwrap_or(&base);
    PathBuf::from(format!("{base}_keyfile.key"))
}
