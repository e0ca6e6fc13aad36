//! Surface preferences.
//!
//! Preferences are plain serde data. The host persists them through
//! [`crate::Surface::get_state`] and restores them with
//! [`crate::Surface::set_state`]; the document carries a version so older
//! hosts refuse state written by newer ones.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;
use crate::feedback::FeedbackMap;
use crate::transport::Port;

/// Version written into preference documents.
pub const PREFERENCES_VERSION: u32 = 1;

/// Allowed display refresh rates.
pub const FPS_RANGE: (u32, u32) = (10, 60);

/// Allowed frame transfer timeouts in milliseconds.
pub const TRANSFER_TIMEOUT_RANGE: (u64, u64) = (100, 5000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Display refresh rate
    pub fps: u32,
    /// Bound on a single frame transfer
    pub transfer_timeout_ms: u64,
    /// Port pair LED messages are written to
    pub led_port: Port,
    pub feedback: FeedbackMap,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            fps: 25,
            transfer_timeout_ms: 1000,
            led_port: Port::Live,
            feedback: FeedbackMap::default(),
        }
    }
}

impl Preferences {
    /// Check every field, collecting all problems.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let (min, max) = FPS_RANGE;
        if self.fps < min || self.fps > max {
            errors.push(format!("fps must be between {} and {}", min, max));
        }

        let (min, max) = TRANSFER_TIMEOUT_RANGE;
        if self.transfer_timeout_ms < min || self.transfer_timeout_ms > max {
            errors.push(format!(
                "transfer_timeout_ms must be between {} and {}",
                min, max
            ));
        }

        errors.extend(self.feedback.invalid_colors());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.fps.max(1)))
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    /// Serialize into a versioned preferences document.
    pub fn to_document(&self) -> Result<String, SurfaceError> {
        let document = PreferencesDocument {
            version: PREFERENCES_VERSION,
            preferences: self.clone(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Restore from a document written by [`Preferences::to_document`].
    ///
    /// `version` is the version the host recorded alongside the document.
    /// Documents newer than [`PREFERENCES_VERSION`] are refused.
    pub fn from_document(document: &str, version: u32) -> Result<Self, SurfaceError> {
        if version > PREFERENCES_VERSION {
            return Err(SurfaceError::UnsupportedVersion(version));
        }
        let document: PreferencesDocument = serde_json::from_str(document)?;
        if document.version > PREFERENCES_VERSION {
            return Err(SurfaceError::UnsupportedVersion(document.version));
        }
        document
            .preferences
            .validate()
            .map_err(SurfaceError::InvalidPreferences)?;
        Ok(document.preferences)
    }
}

/// On-disk form of [`Preferences`].
#[derive(Debug, Serialize, Deserialize)]
pub struct PreferencesDocument {
    pub version: u32,
    pub preferences: Preferences,
}
