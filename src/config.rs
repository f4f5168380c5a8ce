use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::action::Side;
use crate::file::FileKind;
use crate::matching::MatchSettings;

/// Contents of the TOML settings files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub matching: MatchingSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// [matching] section
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSection {
    #[serde(default)]
    pub similarity_threshold: f64,
    /// -1 for unlimited
    #[serde(default = "default_max_entries")]
    pub max_entries: i64,
    #[serde(default)]
    pub ignore_suffix: Vec<String>,
}

/// [logging] section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_max_entries() -> i64 {
    -1
}

fn default_log_file() -> PathBuf {
    PathBuf::from("qctool.log")
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for MatchingSection {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.0,
            max_entries: default_max_entries(),
            ignore_suffix: Vec::new(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

/// Command-line values that win over the settings files.
#[derive(Debug, Clone, Default)]
pub struct MatchOverrides {
    pub similarity_threshold: Option<f64>,
    pub max_entries: Option<i64>,
    pub ignore_suffix: Option<Vec<String>>,
    pub a_only: bool,
    pub b_only: bool,
}

impl Settings {
    pub fn matching_with(&self, overrides: MatchOverrides) -> Result<MatchSettings> {
        let threshold = overrides
            .similarity_threshold
            .unwrap_or(self.matching.similarity_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            bail!("similarity threshold must be between 0 and 1, got {threshold}");
        }
        let max_entries = match overrides.max_entries.unwrap_or(self.matching.max_entries) {
            -1 => None,
            n if n >= 0 => Some(n as usize),
            n => bail!("number of entries must be -1 or at least 0, got {n}"),
        };
        if overrides.a_only && overrides.b_only {
            bail!("--a-only and --b-only cannot be combined");
        }
        Ok(MatchSettings {
            similarity_threshold: threshold,
            max_entries,
            ignore_suffix: overrides
                .ignore_suffix
                .unwrap_or_else(|| self.matching.ignore_suffix.clone()),
            a_only: overrides.a_only,
            b_only: overrides.b_only,
        })
    }
}

/// Settings plus the problems met while reading them. Logging is configured
/// from the settings, so warnings are reported once it is up.
#[derive(Debug, Default)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub warnings: Vec<String>,
}

fn read_table(path: &Path, warnings: &mut Vec<String>) -> Option<toml::Table> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<toml::Table>(&content) {
        Ok(t) => Some(t),
        Err(e) => {
            warnings.push(format!("ignoring {}: {e}", path.display()));
            None
        }
    }
}

/// Load settings by merging the global file with a local (or explicit) one.
/// Priority: `explicit` or `./.qctool.toml` > `~/.config/qctool/config.toml` >
/// built-in defaults. Merging is deep: keys inside a section override
/// independently.
pub fn load_settings(explicit: Option<&Path>) -> Result<LoadedSettings> {
    let mut warnings = Vec::new();
    let global_path = dirs::config_dir().map(|d| d.join("qctool/config.toml"));
    let global_table = global_path.and_then(|p| read_table(&p, &mut warnings));

    let local_table = match explicit {
        Some(path) => {
            std::fs::metadata(path)
                .with_context(|| format!("cannot read settings file {}", path.display()))?;
            read_table(path, &mut warnings)
        }
        None => read_table(Path::new(".qctool.toml"), &mut warnings),
    };

    let merged = match (global_table, local_table) {
        (Some(mut global), Some(local)) => {
            deep_merge(&mut global, local);
            toml::Value::Table(global)
        }
        (Some(global), None) => toml::Value::Table(global),
        (None, Some(local)) => toml::Value::Table(local),
        (None, None) => {
            return Ok(LoadedSettings {
                settings: Settings::default(),
                warnings,
            })
        }
    };

    let settings: Settings = merged.try_into().unwrap_or_else(|e| {
        warnings.push(format!("ignoring settings: {e}"));
        Settings::default()
    });
    Ok(LoadedSettings { settings, warnings })
}

/// Recursively merge `overlay` into `base`. Overlay values win; nested tables are merged recursively.
fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), &value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table.clone());
            }
            _ => {
                base.insert(key, value);
            }
        }
    }
}

/// One input file and where (if anywhere) it may be written.
#[derive(Debug, Clone)]
pub struct SideConfig {
    pub path: PathBuf,
    pub kind: FileKind,
    /// `None` makes this side read-only.
    pub output: Option<PathBuf>,
}

/// Run parameters, fixed for the whole session.
#[derive(Debug, Clone)]
pub struct Config {
    pub a: SideConfig,
    pub b: SideConfig,
    pub tables: Vec<String>,
    pub matching: MatchSettings,
}

impl Config {
    pub fn side(&self, side: Side) -> &SideConfig {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(s: &str) -> toml::Table {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn deep_merge_overrides_individual_keys() {
        let mut base = table("[matching]\nsimilarity_threshold = 0.5\nmax_entries = 10\n");
        deep_merge(&mut base, table("[matching]\nmax_entries = 20\n"));
        let settings: Settings = toml::Value::Table(base).try_into().unwrap();
        assert_eq!(settings.matching.similarity_threshold, 0.5);
        assert_eq!(settings.matching.max_entries, 20);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn cli_values_win() {
        let settings: Settings = toml::Value::Table(table(
            "[matching]\nsimilarity_threshold = 0.5\nignore_suffix = [\"_visit\"]\n",
        ))
        .try_into()
        .unwrap();
        let m = settings
            .matching_with(MatchOverrides {
                similarity_threshold: Some(0.8),
                ..MatchOverrides::default()
            })
            .unwrap();
        assert_eq!(m.similarity_threshold, 0.8);
        assert_eq!(m.max_entries, None);
        assert_eq!(m.ignore_suffix, vec!["_visit".to_string()]);

        let m = settings
            .matching_with(MatchOverrides {
                max_entries: Some(5),
                ignore_suffix: Some(Vec::new()),
                ..MatchOverrides::default()
            })
            .unwrap();
        assert_eq!(m.similarity_threshold, 0.5);
        assert_eq!(m.max_entries, Some(5));
        assert!(m.ignore_suffix.is_empty());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let settings = Settings::default();
        let bad = |o: MatchOverrides| settings.matching_with(o).is_err();
        assert!(bad(MatchOverrides {
            similarity_threshold: Some(1.5),
            ..MatchOverrides::default()
        }));
        assert!(bad(MatchOverrides {
            max_entries: Some(-2),
            ..MatchOverrides::default()
        }));
        assert!(bad(MatchOverrides {
            a_only: true,
            b_only: true,
            ..MatchOverrides::default()
        }));
    }

    #[test]
    fn explicit_file_is_loaded_and_bad_toml_warns() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[logging]\nlevel = \"debug\"\n").unwrap();
        let loaded = load_settings(Some(&good)).unwrap();
        assert_eq!(loaded.settings.logging.level, "debug");

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[logging\n").unwrap();
        let loaded = load_settings(Some(&bad)).unwrap();
        assert!(loaded.warnings.iter().any(|w| w.contains("bad.toml")));

        assert!(load_settings(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
