//! Dosing profiles and the controller's active-profile handle.
//!
//! A [`DosingProfile`] is an immutable value. Profiles are published as
//! `Arc<DosingProfile>` snapshots: the application keeps its own handles and
//! the controller only ever holds clones, so no party owns a profile
//! exclusively and a snapshot stays alive while anyone still reads it.
//!
//! [`ActiveProfile`] is the single-writer / many-reader slot the controller
//! worker reads once per tick. Swapping it replaces the pointer only; the
//! profile contents are never mutated after publication.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the profile seeded at startup.
pub const DEFAULT_PROFILE_NAME: &str = "Default";

/// Patient-specific dosing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosingProfile {
    pub name: String,
    /// Nominal background delivery (U/h).
    pub basal_rate_per_hour: f64,
    /// Grams of carbohydrate covered by one unit.
    pub carb_ratio: f64,
    /// Glucose drop (mmol/L) per correction unit.
    pub correction_factor: f64,
    /// Glucose the controller corrects towards (mmol/L).
    pub target_glucose: f64,
}

impl DosingProfile {
    pub fn new(
        name: impl Into<String>,
        basal_rate_per_hour: f64,
        carb_ratio: f64,
        correction_factor: f64,
        target_glucose: f64,
    ) -> Self {
        Self {
            name: name.into(),
            basal_rate_per_hour,
            carb_ratio,
            correction_factor,
            target_glucose,
        }
    }

    /// Flag parameters that would make dosing meaningless. Publishing an
    /// invalid profile is still allowed; this is advisory for the supplier.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Profile("name must not be empty"));
        }
        if !(self.basal_rate_per_hour >= 0.0) {
            return Err(Error::Profile("basal rate must be non-negative"));
        }
        if !(self.carb_ratio > 0.0) {
            return Err(Error::Profile("carb ratio must be positive"));
        }
        if !(self.correction_factor > 0.0) {
            return Err(Error::Profile("correction factor must be positive"));
        }
        if !self.target_glucose.is_finite() {
            return Err(Error::Profile("target glucose must be finite"));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|_| Error::Profile("serialization failed"))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|_| Error::Profile("malformed JSON"))
    }
}

impl Default for DosingProfile {
    /// The profile the reference device ships with.
    fn default() -> Self {
        Self::new(DEFAULT_PROFILE_NAME, 5.0, 1.0, 1.0, 6.0)
    }
}

// ───────────────────────────────────────────────────────────────
// Active profile slot
// ───────────────────────────────────────────────────────────────

/// Hot-swappable handle to the profile in force.
pub struct ActiveProfile {
    current: RwLock<Arc<DosingProfile>>,
}

impl ActiveProfile {
    pub fn new(profile: Arc<DosingProfile>) -> Self {
        Self {
            current: RwLock::new(profile),
        }
    }

    /// Snapshot of the profile in force. The read lock covers only the
    /// pointer clone.
    pub fn load(&self) -> Arc<DosingProfile> {
        Arc::clone(&self.current.read())
    }

    /// Publish `profile`; returns the snapshot it replaced.
    pub fn swap(&self, profile: Arc<DosingProfile>) -> Arc<DosingProfile> {
        let mut slot = self.current.write();
        info!("Active profile: '{}' -> '{}'", slot.name, profile.name);
        std::mem::replace(&mut *slot, profile)
    }
}

// ───────────────────────────────────────────────────────────────
// Profile book
// ───────────────────────────────────────────────────────────────

/// Named profiles kept by the host, seeded with [`DosingProfile::default`].
#[derive(Debug, Clone)]
pub struct ProfileBook {
    profiles: BTreeMap<String, Arc<DosingProfile>>,
}

impl Default for ProfileBook {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileBook {
    pub fn new() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            DEFAULT_PROFILE_NAME.to_string(),
            Arc::new(DosingProfile::default()),
        );
        Self { profiles }
    }

    /// Insert or replace by name. Replacing never touches snapshots already
    /// handed out.
    pub fn save(&mut self, profile: DosingProfile) -> Arc<DosingProfile> {
        let profile = Arc::new(profile);
        self.profiles
            .insert(profile.name.clone(), Arc::clone(&profile));
        profile
    }

    pub fn get(&self, name: &str) -> Option<Arc<DosingProfile>> {
        self.profiles.get(name).cloned()
    }

    pub fn default_profile(&self) -> Option<Arc<DosingProfile>> {
        self.get(DEFAULT_PROFILE_NAME)
    }

    /// Sorted names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
