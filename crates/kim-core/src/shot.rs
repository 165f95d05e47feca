//! Shot-file reader.
//!
//! A shot file is the per-cycle run configuration: a TOML document whose
//! `[globals]` table holds one named scalar attribute per configured
//! variable. The server reads it once per cycle; nothing is written back.
//!
//! ```toml
//! [globals]
//! Kinesis_Ch1 = 100
//! Kinesis_Ch2 = 0
//! Kinesis_MaxMove = 3000
//! ```

use std::path::{Path, PathBuf};

use crate::error::{KimError, KimResult};

/// One loaded shot file, exposing typed access to its `[globals]` table.
#[derive(Debug, Clone)]
pub struct ShotFile {
    path: PathBuf,
    globals: toml::value::Table,
}

impl ShotFile {
    /// Read and parse a shot file.
    ///
    /// Fails on I/O errors, TOML syntax errors, or a missing `[globals]`
    /// table.
    pub fn load(path: &Path) -> KimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let doc: toml::value::Table = text.parse().map_err(|e: toml::de::Error| KimError::Shot {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let globals = doc
            .get("globals")
            .and_then(toml::Value::as_table)
            .cloned()
            .ok_or_else(|| KimError::Shot {
                path: path.to_path_buf(),
                message: "missing [globals] table".into(),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            globals,
        })
    }

    /// Path this shot was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read an integer global attribute.
    pub fn global_i64(&self, name: &str) -> KimResult<i64> {
        match self.globals.get(name) {
            Some(toml::Value::Integer(v)) => Ok(*v),
            Some(other) => Err(self.shot_error(format!(
                "global '{name}' is not an integer (found {})",
                other.type_str()
            ))),
            None => Err(self.shot_error(format!("missing global '{name}'"))),
        }
    }

    /// Read a numeric global attribute as a float. Integers are widened.
    pub fn global_f64(&self, name: &str) -> KimResult<f64> {
        match self.globals.get(name) {
            Some(toml::Value::Float(v)) => Ok(*v),
            Some(toml::Value::Integer(v)) => Ok(*v as f64),
            Some(other) => Err(self.shot_error(format!(
                "global '{name}' is not numeric (found {})",
                other.type_str()
            ))),
            None => Err(self.shot_error(format!("missing global '{name}'"))),
        }
    }

    /// Read an integer global that must fit a device position counter.
    pub fn global_position(&self, name: &str) -> KimResult<i32> {
        let raw = self.global_i64(name)?;
        i32::try_from(raw).map_err(|_| {
            self.shot_error(format!("global '{name}' = {raw} is out of position range"))
        })
    }

    fn shot_error(&self, message: String) -> KimError {
        KimError::Shot {
            path: self.path.clone(),
            message,
        }
    }
}
