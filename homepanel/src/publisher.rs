/*
 *     Copyright 2025 The Homepanel Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use crate::report::Report;
use homepanel_core::{Error, Result};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// LOCK_RETRY_INTERVAL is the interval between two attempts to lock the report.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// JSON_INDENT is the indentation of the published json.
const JSON_INDENT: &[u8] = b"    ";

/// Publisher replaces the report file with the latest report.
#[derive(Debug, Clone)]
pub struct Publisher {
    /// path is the path of the report file.
    path: PathBuf,

    /// lock_timeout bounds the wait for the exclusive lock.
    lock_timeout: Duration,
}

/// Publisher implements the report publisher.
impl Publisher {
    /// new creates a new Publisher.
    pub fn new(path: PathBuf, lock_timeout: Duration) -> Self {
        Self { path, lock_timeout }
    }

    /// path returns the path of the report file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// publish writes the report while holding an exclusive lock of the file,
    /// readers never observe a partially written report. The file is opened
    /// without truncation and only truncated once the lock is held.
    #[instrument(skip_all)]
    pub fn publish(&self, report: &Report) -> Result<()> {
        let content = serialize(report)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        self.lock_exclusive(&file)?;

        // Release the lock on every exit path.
        let result = replace_content(&mut file, &content);
        let unlocked = fs2::FileExt::unlock(&file);
        result?;
        unlocked?;

        debug!("published report to {}", self.path.display());
        Ok(())
    }

    /// lock_exclusive polls the exclusive lock until the lock timeout.
    fn lock_exclusive(&self, file: &File) -> Result<()> {
        let started = Instant::now();
        loop {
            match fs2::FileExt::try_lock_exclusive(file) {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                    if started.elapsed() >= self.lock_timeout {
                        return Err(Error::LockTimeout(self.path.display().to_string()));
                    }

                    sleep(LOCK_RETRY_INTERVAL);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// serialize renders the report as 4-space indented json.
fn serialize(report: &Report) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut content, formatter);
    report.serialize(&mut serializer)?;
    Ok(content)
}

/// replace_content truncates the locked file and writes the content.
fn replace_content(file: &mut File, content: &[u8]) -> Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(content)?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}

/// read returns the published report, holding a shared lock during the read.
/// A missing, empty or unparseable file means no data is available.
pub fn read(path: &Path) -> Option<Report> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            debug!("open report {} failed: {}", path.display(), err);
            return None;
        }
    };

    if let Err(err) = fs2::FileExt::lock_shared(&file) {
        debug!("lock report {} failed: {}", path.display(), err);
        return None;
    }

    let mut content = String::new();
    let result = file.read_to_string(&mut content);
    let _ = fs2::FileExt::unlock(&file);
    if let Err(err) = result {
        debug!("read report {} failed: {}", path.display(), err);
        return None;
    }

    match serde_json::from_str(&content) {
        Ok(report) => Some(report),
        Err(err) => {
            debug!("parse report {} failed: {}", path.display(), err);
            None
        }
    }
}
