// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! An append-only text file of direction estimates, one per line.

use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, trace};
use thiserror::Error;

use crate::finder::DirectionEstimate;

pub struct ResultLog {
    path: PathBuf,
    writer: BufWriter<File>,
    num_written: usize,
}

impl ResultLog {
    /// Open a result log for appending, creating it if it doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ResultLog, ResultLogError> {
        let path = path.as_ref().to_path_buf();
        debug!("Appending direction estimates to {}", path.display());
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| ResultLogError::Open {
                file: path.display().to_string(),
                err,
            })?;
        Ok(ResultLog {
            path,
            writer: BufWriter::new(file),
            num_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The number of estimates appended by this handle.
    pub fn num_written(&self) -> usize {
        self.num_written
    }

    /// Append an estimate. Each line is flushed, so the file is complete even
    /// if the program is stopped between estimates.
    pub fn append(&mut self, estimate: &DirectionEstimate) -> Result<(), ResultLogError> {
        trace!("Logging estimate {estimate}");
        writeln!(self.writer, "{estimate}")?;
        self.writer.flush()?;
        self.num_written += 1;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ResultLogError {
    #[error("Couldn't open result log '{file}': {err}")]
    Open {
        file: String,
        err: std::io::Error,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
