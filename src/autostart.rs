//! Login-item registration boundary.
//!
//! Outside the guard core: a host toggles "start at login" through this
//! module. User login items are managed by scripting System Events via
//! `osascript`, which needs no helper bundle. Unsupported off macOS.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// A user login item identified by its application path and display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginItem {
    path: PathBuf,
    name: String,
}

impl LoginItem {
    /// Describe a login item.
    ///
    /// `name` is the display name System Events lists (the application
    /// name without extension); `path` is the bundle or executable path
    /// that gets registered.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    /// The registered path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register or remove this login item.
    ///
    /// # Errors
    ///
    /// [`Error::AutoStart`] when scripting fails, when the path or name
    /// cannot be embedded in a script, or on non-macOS platforms.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        let script = if enabled {
            add_script(&self.path)?
        } else {
            delete_script(&self.name)?
        };
        debug!(name = %self.name, enabled, "updating login item");
        run_osascript(&script).map(|_| ())
    }

    /// Whether this login item is currently registered.
    ///
    /// # Errors
    ///
    /// [`Error::AutoStart`] when the login item list cannot be queried.
    pub fn is_enabled(&self) -> Result<bool> {
        let output = run_osascript(LIST_NAMES_SCRIPT)?;
        Ok(parse_names(&output).iter().any(|name| name == &self.name))
    }
}

const LIST_NAMES_SCRIPT: &str =
    "tell application \"System Events\" to get the name of every login item";

fn add_script(path: &Path) -> Result<String> {
    let path = path.to_string_lossy();
    let path = script_literal(&path)?;
    Ok(format!(
        "tell application \"System Events\" to make login item at end \
         with properties {{path:\"{path}\", hidden:false}}"
    ))
}

fn delete_script(name: &str) -> Result<String> {
    let name = script_literal(name)?;
    Ok(format!(
        "tell application \"System Events\" to delete login item \"{name}\""
    ))
}

/// Validate a value before embedding it in an AppleScript string literal.
fn script_literal(value: &str) -> Result<&str> {
    if value.contains('"') || value.contains('\\') {
        return Err(Error::auto_start(format!(
            "value cannot be embedded in a script: {value}"
        )));
    }
    Ok(value)
}

/// System Events returns the list as comma-separated names.
fn parse_names(output: &str) -> Vec<String> {
    output
        .trim()
        .split(", ")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(target_os = "macos")]
fn run_osascript(script: &str) -> Result<String> {
    let output = std::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .map_err(|err| Error::auto_start(format!("failed to run osascript: {err}")))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(Error::auto_start(
            String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        ))
    }
}

#[cfg(not(target_os = "macos"))]
fn run_osascript(_script: &str) -> Result<String> {
    Err(Error::auto_start("login items require macOS"))
}
