//! レビューJSONファイルの読み書き。
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::review::Review;

/// Reads parsed reviews and writes processed ones for a single app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewStore {
    input: PathBuf,
    output: PathBuf,
}

impl ReviewStore {
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// # Errors
    /// Returns [`PipelineError::Io`] when the file is missing or not a JSON review array.
    pub fn load(&self) -> PipelineResult<Vec<Review>> {
        let file = File::open(&self.input).map_err(|source| PipelineError::io(&self.input, source))?;
        let reviews: Vec<Review> = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| PipelineError::io(&self.input, err.into()))?;
        debug!(path = %self.input.display(), reviews = reviews.len(), "loaded reviews");
        Ok(reviews)
    }

    /// 一時ファイルに書き出してからリネームする。失敗時に既存の出力は残る。
    ///
    /// # Errors
    /// Returns [`PipelineError::Io`] on any filesystem failure.
    pub fn save(&self, reviews: &[Review]) -> PipelineResult<()> {
        if let Some(parent) = self.output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PipelineError::io(parent, source))?;
        }

        let staging = self.output.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(&staging)?);
            serde_json::to_writer_pretty(&mut writer, reviews)?;
            writer.flush()?;
            Ok(())
        };
        if let Err(source) = write() {
            let _ = fs::remove_file(&staging);
            return Err(PipelineError::io(&staging, source));
        }
        fs::rename(&staging, &self.output).map_err(|source| PipelineError::io(&self.output, source))?;

        debug!(path = %self.output.display(), reviews = reviews.len(), "saved reviews");
        Ok(())
    }
}
