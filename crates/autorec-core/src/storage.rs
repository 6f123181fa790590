//! Macro persistence - one JSON document per macro
//!
//! The locator is the sanitized file name derived from the display name;
//! writing a macro whose sanitized name collides overwrites the previous
//! artifact.

use crate::error::{CoreError, Result};
use crate::events::Macro;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroSummary {
    pub name: String,
    pub created: String,
    pub locator: String,
}

pub trait MacroStore: Send + Sync {
    /// No ordering guarantee beyond what the underlying store returns.
    fn list(&self) -> Result<Vec<MacroSummary>>;
    fn read(&self, locator: &str) -> Result<Macro>;
    fn write(&self, artifact: &Macro) -> Result<String>;
    /// Returns whether anything was removed.
    fn delete(&self, locator: &str) -> Result<bool>;
}

pub struct FsMacroStore {
    dir: PathBuf,
}

impl FsMacroStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, locator: &str) -> PathBuf {
        self.dir.join(locator)
    }
}

impl MacroStore for FsMacroStore {
    fn list(&self) -> Result<Vec<MacroSummary>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(locator) = file_name.to_str() else {
                continue;
            };
            if !locator.ends_with(".json") {
                continue;
            }
            // A single corrupt artifact only costs its own listing.
            match self.read(locator) {
                Ok(m) => out.push(MacroSummary {
                    name: m.name,
                    created: m.created,
                    locator: locator.to_string(),
                }),
                Err(e) => tracing::warn!("skipping unreadable macro {}: {}", locator, e),
            }
        }
        Ok(out)
    }

    fn read(&self, locator: &str) -> Result<Macro> {
        let file = File::open(self.path_for(locator))
            .map_err(|e| CoreError::Storage(format!("{}: {}", locator, e)))?;
        let artifact = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CoreError::Storage(format!("{}: {}", locator, e)))?;
        Ok(artifact)
    }

    fn write(&self, artifact: &Macro) -> Result<String> {
        let locator = format!("{}.json", sanitize(&artifact.name));
        let file = File::create(self.path_for(&locator))?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, artifact)?;
        use std::io::Write;
        w.flush()?;
        Ok(locator)
    }

    fn delete(&self, locator: &str) -> Result<bool> {
        let path = self.path_for(locator);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }
}

/// Whitespace in display names becomes underscores in the locator.
pub(crate) fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}
