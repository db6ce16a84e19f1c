// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform access check
//!
//! Whether the platform will deliver notifications to us at all is decided
//! outside this process. The daemon consults an `AccessCheck` once at startup
//! and refuses to set up ingestion when it says no.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading the platform setting
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("failed to read listener settings at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Answers whether the platform permits notification ingestion
pub trait AccessCheck: Send + Sync {
    fn is_ingestion_permitted(&self) -> bool;
}

/// Fixed answer, for tests and explicit operator override
#[derive(Clone, Copy, Debug)]
pub struct StaticAccessCheck(pub bool);

impl AccessCheck for StaticAccessCheck {
    fn is_ingestion_permitted(&self) -> bool {
        self.0
    }
}

/// Checks the platform's enabled-listeners setting for our package
///
/// The setting is a `:`-separated list of listener components in
/// `package/ClassName` form, read from a file that mirrors the platform value.
#[derive(Clone, Debug)]
pub struct EnabledListenersCheck {
    settings_path: PathBuf,
    package_name: String,
}

impl EnabledListenersCheck {
    pub fn new(settings_path: impl Into<PathBuf>, package_name: impl Into<String>) -> Self {
        Self {
            settings_path: settings_path.into(),
            package_name: package_name.into(),
        }
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Read the setting and look for our package
    pub fn check(&self) -> Result<bool, AccessError> {
        let setting = match std::fs::read_to_string(&self.settings_path) {
            Ok(s) => s,
            // No setting at all means no listener was ever enabled
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(source) => {
                return Err(AccessError::Read {
                    path: self.settings_path.clone(),
                    source,
                })
            }
        };
        Ok(setting_enables(&setting, &self.package_name))
    }
}

impl AccessCheck for EnabledListenersCheck {
    fn is_ingestion_permitted(&self) -> bool {
        match self.check() {
            Ok(enabled) => {
                tracing::debug!(
                    package = %self.package_name,
                    enabled,
                    "notification access checked"
                );
                enabled
            }
            Err(e) => {
                tracing::error!(error = %e, "error checking notification access");
                false
            }
        }
    }
}

/// True when any listener component in the setting belongs to `package`
fn setting_enables(setting: &str, package: &str) -> bool {
    if package.is_empty() {
        return false;
    }
    setting
        .split(':')
        .map(str::trim)
        .filter(|component| !component.is_empty())
        .any(|component| {
            let owner = component.split('/').next().unwrap_or(component);
            owner == package
        })
}

#[cfg(test)]
#[path = "access_tests.rs"]
mod tests;
