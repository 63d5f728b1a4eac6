//! Layer environment files
//!
//! Each modification is one file named `NAME.<action>` whose content is
//! the value. Three actions are written:
//!
//! | Action | Meaning |
//! |--------|---------|
//! | `override` | always replaces any existing value |
//! | `default` | applies only when the variable is unset |
//! | `append` | appended to an existing value, joined by `NAME.delim` |

use crate::error::{JvmError, JvmResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Environment modifications for one scope (build, launch or both)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment(BTreeMap<String, String>);

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always wins over any value set elsewhere
    pub fn override_value(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(format!("{}.override", name), value.into());
    }

    /// Applies only when the variable is otherwise unset
    pub fn default_value(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(format!("{}.default", name), value.into());
    }

    /// Appended to the existing value, separated by `delimiter`
    pub fn append(&mut self, name: &str, delimiter: &str, value: impl Into<String>) {
        self.0.insert(format!("{}.delim", name), delimiter.to_string());
        self.0.insert(format!("{}.append", name), value.into());
    }

    /// Look up a raw entry such as `JAVA_HOME.override`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Write one file per entry into `dir`, replacing its previous contents
    pub fn write(&self, dir: &Path) -> JvmResult<()> {
        if dir.exists() {
            fs::remove_dir_all(dir)
                .map_err(|e| JvmError::io(format!("clearing {}", dir.display()), e))?;
        }
        if self.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(dir)
            .map_err(|e| JvmError::io(format!("creating {}", dir.display()), e))?;
        for (key, value) in &self.0 {
            let path = dir.join(key);
            fs::write(&path, value)
                .map_err(|e| JvmError::io(format!("writing {}", path.display()), e))?;
        }
        Ok(())
    }

    /// Read entries previously written with [`Environment::write`]
    pub fn read(dir: &Path) -> JvmResult<Self> {
        let mut env = Self::new();
        if !dir.is_dir() {
            return Ok(env);
        }

        let entries =
            fs::read_dir(dir).map_err(|e| JvmError::io(format!("reading {}", dir.display()), e))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| JvmError::io(format!("reading {}", dir.display()), e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let value = fs::read_to_string(&path)
                .map_err(|e| JvmError::io(format!("reading {}", path.display()), e))?;
            env.0
                .insert(entry.file_name().to_string_lossy().into_owned(), value);
        }
        Ok(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn records_actions() {
        let mut env = Environment::new();
        env.override_value("JAVA_HOME", "/layers/jdk");
        env.default_value("MALLOC_ARENA_MAX", "2");
        env.append("JAVA_TOOL_OPTIONS", " ", "-XX:+ExitOnOutOfMemoryError");

        assert_eq!(env.get("JAVA_HOME.override"), Some("/layers/jdk"));
        assert_eq!(env.get("MALLOC_ARENA_MAX.default"), Some("2"));
        assert_eq!(env.get("JAVA_TOOL_OPTIONS.delim"), Some(" "));
        assert_eq!(
            env.get("JAVA_TOOL_OPTIONS.append"),
            Some("-XX:+ExitOnOutOfMemoryError")
        );
        assert_eq!(env.len(), 4);
    }

    #[test]
    fn write_then_read() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("env.launch");

        let mut env = Environment::new();
        env.default_value("JAVA_HOME", "/layers/jre");
        env.append("JAVA_TOOL_OPTIONS", " ", "-Xss1m");
        env.write(&dir).unwrap();

        assert_eq!(
            fs::read_to_string(dir.join("JAVA_HOME.default")).unwrap(),
            "/layers/jre"
        );
        assert_eq!(Environment::read(&dir).unwrap(), env);
    }

    #[test]
    fn write_replaces_stale_entries() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("env.build");

        let mut first = Environment::new();
        first.override_value("JDK_HOME", "/old");
        first.write(&dir).unwrap();

        Environment::new().write(&dir).unwrap();
        assert!(!dir.exists());
    }
}
