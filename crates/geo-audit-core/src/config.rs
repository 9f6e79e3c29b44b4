use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::LlmSettings;
use crate::search::SearchSettings;

const DEFAULT_AGENCY_NAME: &str = "The GEO Agency";

/// Size past which `agency.log` is moved aside when the log is opened.
pub const LOG_ROTATE_BYTES: u64 = 1024 * 1024;

/// Where the agency keeps client lists, rendered reports and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub base_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            data_dir: None,
            reports_dir: None,
            logs_dir: None,
        }
    }
}

impl PathSettings {
    fn resolve(&self, explicit: &Option<PathBuf>, default: &str) -> PathBuf {
        match explicit {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.base_dir.join(path),
            None => self.base_dir.join(default),
        }
    }
}

/// Full runtime configuration, passed explicitly to every component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgencyConfig {
    pub agency_name: String,
    pub llm: LlmSettings,
    /// Provider for competitor research; falls back to `llm` when unset.
    pub research: Option<LlmSettings>,
    pub search: SearchSettings,
    pub paths: PathSettings,
}

impl Default for AgencyConfig {
    fn default() -> Self {
        Self {
            agency_name: DEFAULT_AGENCY_NAME.to_string(),
            llm: LlmSettings::default(),
            research: None,
            search: SearchSettings::default(),
            paths: PathSettings::default(),
        }
    }
}

impl AgencyConfig {
    const HOME_ENV: &'static str = "GEO_AUDIT_HOME";
    const AGENCY_NAME_ENV: &'static str = "GEO_AUDIT_AGENCY_NAME";

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(&std::env::vars().collect());
        config
    }

    /// Overlay environment variables onto values loaded from defaults or a file.
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) {
        self.llm.apply_env(vars, LlmSettings::PREFIX);

        let research_prefix = format!("{}_", LlmSettings::RESEARCH_PREFIX);
        if self.research.is_some() || vars.keys().any(|key| key.starts_with(&research_prefix)) {
            let mut research = self.research.take().unwrap_or_default();
            research.apply_env(vars, LlmSettings::RESEARCH_PREFIX);
            self.research = Some(research);
        }

        self.search.apply_env(vars);

        if let Some(home) = vars.get(Self::HOME_ENV).filter(|v| !v.trim().is_empty()) {
            self.paths.base_dir = PathBuf::from(home.trim());
        }
        if let Some(name) = vars
            .get(Self::AGENCY_NAME_ENV)
            .filter(|v| !v.trim().is_empty())
        {
            self.agency_name = name.trim().to_string();
        }
    }

    pub fn research_settings(&self) -> &LlmSettings {
        self.research.as_ref().unwrap_or(&self.llm)
    }

    /// Create the data, reports and logs directories. Must run before any
    /// component that touches the filesystem.
    pub fn initialize(&self) -> Result<AgencyWorkspace> {
        let workspace = AgencyWorkspace {
            agency_name: self.agency_name.clone(),
            data_dir: self.paths.resolve(&self.paths.data_dir, "data"),
            reports_dir: self.paths.resolve(&self.paths.reports_dir, "reports"),
            logs_dir: self.paths.resolve(&self.paths.logs_dir, "logs"),
            created: Vec::new(),
        };
        let mut created = Vec::new();
        for dir in [
            &workspace.data_dir,
            &workspace.reports_dir,
            &workspace.logs_dir,
        ] {
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create directory {}", dir.display()))?;
                created.push(dir.clone());
            }
        }
        Ok(AgencyWorkspace {
            created,
            ..workspace
        })
    }
}

/// Proof that the agency directories exist; handed to I/O-performing components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyWorkspace {
    agency_name: String,
    data_dir: PathBuf,
    reports_dir: PathBuf,
    logs_dir: PathBuf,
    created: Vec<PathBuf>,
}

impl AgencyWorkspace {
    pub fn agency_name(&self) -> &str {
        &self.agency_name
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs_dir.join("agency.log")
    }

    /// Open the log for appending. A log already larger than `max_bytes`
    /// becomes `agency.log.1`, replacing the previous generation.
    pub fn open_log_file(&self, max_bytes: u64) -> Result<File> {
        let path = self.log_file();
        if let Ok(meta) = fs::metadata(&path) {
            if meta.len() > max_bytes {
                let rotated = path.with_extension("log.1");
                fs::rename(&path, &rotated).with_context(|| {
                    format!("failed to rotate log file {}", path.display())
                })?;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))
    }

    /// Directories that did not exist before [`AgencyConfig::initialize`].
    pub fn created_dirs(&self) -> &[PathBuf] {
        &self.created
    }
}
