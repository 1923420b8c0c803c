use crate::error::Result;
use crate::filter::SortKey;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Defaults mirror the clinic template workbook.
const DEFAULT_WORKBOOK: &str = "OphtaTrack_Template.xlsx";
const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_CACHE_TTL: u64 = 5 * 60; // 5 minutes in seconds

/// Application settings
///
/// Read from a JSON file; every key is optional. Environment variables
/// override the file, and command line flags override both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Workbook or CSV file holding the patients sheet
    pub patients_path: PathBuf,
    pub patients_sheet: String,

    /// Menu sheet location; the patients workbook when absent
    pub menu_path: Option<PathBuf>,
    pub menu_sheet: String,

    /// Parameters sheet location; the patients workbook when absent
    pub params_path: Option<PathBuf>,
    pub params_sheet: String,

    /// Address the web server listens on
    pub bind: String,

    /// How long fetched sheets are reused before reloading
    pub cache_ttl_secs: u64,

    pub default_sort: SortKey,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            patients_path: PathBuf::from(DEFAULT_WORKBOOK),
            patients_sheet: "Patients".to_string(),
            menu_path: None,
            menu_sheet: "Menu".to_string(),
            params_path: None,
            params_sheet: "Paramètres".to_string(),
            bind: DEFAULT_BIND.to_string(),
            cache_ttl_secs: DEFAULT_CACHE_TTL,
            default_sort: SortKey::RecentDate,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// # Examples
    /// ```no_run
    /// use ophtatrack::config::Settings;
    ///
    /// let settings = Settings::load("ophtatrack.json").unwrap_or_default();
    /// println!("serving on {}", settings.bind);
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Settings> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let settings = serde_json::from_str(&text)?;
        debug!("settings loaded from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Apply `OPHTATRACK_*` overrides from the process environment.
    pub fn with_env(self) -> Settings {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// Recognised keys: `OPHTATRACK_DATA`, `OPHTATRACK_BIND` and
    /// `OPHTATRACK_CACHE_TTL` (seconds). Unparseable values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Settings
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("OPHTATRACK_DATA").filter(|v| !v.trim().is_empty()) {
            self.patients_path = PathBuf::from(path);
        }
        if let Some(bind) = lookup("OPHTATRACK_BIND").filter(|v| !v.trim().is_empty()) {
            self.bind = bind;
        }
        if let Some(ttl) = lookup("OPHTATRACK_CACHE_TTL").and_then(|v| v.trim().parse().ok()) {
            self.cache_ttl_secs = ttl;
        }
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn menu_location(&self) -> &Path {
        self.menu_path.as_deref().unwrap_or(&self.patients_path)
    }

    pub fn params_location(&self) -> &Path {
        self.params_path.as_deref().unwrap_or(&self.patients_path)
    }
}
