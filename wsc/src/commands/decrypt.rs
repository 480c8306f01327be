use anyhow::{Result, bail};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::PathBuf,
};
use webm_crypt::{Mode, WebmCryptor};

/// Decrypt a webm file with the key it was encrypted with.
#[derive(Debug, Clone)]
pub struct Decrypt {
    pub input: PathBuf,
    pub output: PathBuf,
    pub keyfile: Option<PathBuf>,
}

impl Decrypt {
    pub fn execute(self) -> Result<()> {
        if self.input == self.output {
            bail!("Input and output paths cannot be the same.");
        }

        let Some(keyfile) = &self.keyfile else {
            bail!("A key file must be provided for decryption.");
        };

        log::debug!(
            "Decrypting file '{}'. Output will be stored at '{}'.",
            self.input.display(),
            self.output.display()
        );
        log::debug!("Reading decryption key from '{}'.", keyfile.display());

        let key = super::read_key(keyfile)?;
        let cryptor = WebmCryptor::new(Mode::Decrypt, &key)?;
        log::debug!("Decrypting file with key <{}>.", hex::encode(key));

        let source = BufReader::new(File::open(&self.input)?);
        let mut sink = BufWriter::new(File::create(&self.output)?);
        cryptor.process(source, &mut sink)?;
        sink.flush()?;

        log::debug!("Finished!");
        Ok(())
    }
}
