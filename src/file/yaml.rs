use serde_yaml::Mapping;
use std::fs;
use std::path::Path;

use super::{import, FileError, FileKind, SchemaFile, Value};

/// Section holding the shared FHIR mapping; `mapping` files ignore the table.
const MAPPING_SECTION: &str = "FHIR";

const FEATURE_TYPES: &[&str] = &["integer", "string", "number"];

/// A YAML document kept as an order-preserving mapping so that a dump after
/// renames leaves every other entry where it was.
#[derive(Debug, Clone)]
pub struct YamlFile {
    kind: FileKind,
    root: Mapping,
}

fn key_name(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn find<'a>(map: &'a Mapping, name: &str) -> Option<(&'a Value, &'a Value)> {
    map.iter().find(|(k, _)| key_name(k).as_deref() == Some(name))
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

impl YamlFile {
    pub fn load(kind: FileKind, path: &Path) -> Result<Self, FileError> {
        let content = fs::read_to_string(path).map_err(|source| FileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_yaml::from_str(&content).map_err(|source| FileError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let root = match value {
            Value::Mapping(m) => m,
            Value::Null => Mapping::new(),
            _ => {
                return Err(FileError::NotAMapping {
                    path: path.to_path_buf(),
                })
            }
        };
        Ok(YamlFile { kind, root })
    }

    pub fn from_yaml(kind: FileKind, content: &str) -> Result<Self, FileError> {
        let root = match serde_yaml::from_str::<Value>(content)? {
            Value::Mapping(m) => m,
            _ => Mapping::new(),
        };
        Ok(YamlFile { kind, root })
    }

    fn section_name<'a>(&self, table: &'a str) -> &'a str {
        match self.kind {
            FileKind::Mapping => MAPPING_SECTION,
            FileKind::Features | FileKind::Identifiers => table,
        }
    }

    fn section(&self, table: &str) -> Option<&Mapping> {
        find(&self.root, self.section_name(table)).and_then(|(_, v)| v.as_mapping())
    }

    fn section_mut(&mut self, table: &str) -> Result<&mut Mapping, FileError> {
        let section = self.section_name(table);
        self.root
            .iter_mut()
            .find(|(k, _)| key_name(k).as_deref() == Some(section))
            .and_then(|(_, v)| v.as_mapping_mut())
            .ok_or_else(|| FileError::UnknownTable(section.to_string()))
    }

    fn invalid(&self, reason: impl Into<String>) -> FileError {
        FileError::InvalidValue {
            kind: self.kind,
            reason: reason.into(),
        }
    }

    fn validate(&self, value: &Value) -> Result<(), FileError> {
        match self.kind {
            FileKind::Features => {
                let map = value
                    .as_mapping()
                    .ok_or_else(|| self.invalid("expected a mapping"))?;
                let ty = find(map, "type")
                    .map(|(_, v)| v)
                    .ok_or_else(|| self.invalid("missing `type`"))?;
                match ty.as_str() {
                    Some(t) if FEATURE_TYPES.contains(&t) => Ok(()),
                    _ => Err(self.invalid(format!(
                        "`type` must be one of {}",
                        FEATURE_TYPES.join(", ")
                    ))),
                }
            }
            FileKind::Identifiers => {
                let items = value
                    .as_sequence()
                    .ok_or_else(|| self.invalid("expected a list of identifiers"))?;
                if items.iter().all(is_scalar) {
                    Ok(())
                } else {
                    Err(self.invalid("identifiers must be scalars"))
                }
            }
            FileKind::Mapping => {
                if value.is_mapping() {
                    Ok(())
                } else {
                    Err(self.invalid("expected a mapping of resources"))
                }
            }
        }
    }
}

impl SchemaFile for YamlFile {
    fn keys(&self, table: &str) -> Vec<String> {
        self.section(table)
            .map(|m| m.keys().filter_map(key_name).collect())
            .unwrap_or_default()
    }

    fn dump_get(&self, table: &str, name: &str) -> Result<String, FileError> {
        let (_, value) = self
            .section(table)
            .and_then(|m| find(m, name))
            .ok_or_else(|| FileError::UnknownName {
                table: table.to_string(),
                name: name.to_string(),
            })?;
        let text = serde_yaml::to_string(value)?;
        Ok(text.trim_end().to_string())
    }

    fn update_key(&mut self, table: &str, old: &str, new: &str) -> Result<(), FileError> {
        if old == new {
            return Ok(());
        }
        let section = self.section_mut(table)?;
        let unknown = || FileError::UnknownName {
            table: table.to_string(),
            name: old.to_string(),
        };
        find(section, old).ok_or_else(unknown)?;
        if find(section, new).is_some() {
            return Err(FileError::DuplicateName {
                table: table.to_string(),
                name: new.to_string(),
            });
        }
        let renamed: Mapping = std::mem::take(section)
            .into_iter()
            .map(|(k, v)| {
                if key_name(&k).as_deref() == Some(old) {
                    (Value::String(new.to_string()), v)
                } else {
                    (k, v)
                }
            })
            .collect();
        *section = renamed;
        tracing::debug!(table, old, new, "renamed");
        Ok(())
    }

    fn update_value(&mut self, table: &str, name: &str, value: Value) -> Result<(), FileError> {
        let section = self.section_mut(table)?;
        let slot = section
            .iter_mut()
            .find(|(k, _)| key_name(k).as_deref() == Some(name))
            .map(|(_, v)| v)
            .ok_or_else(|| FileError::UnknownName {
                table: table.to_string(),
                name: name.to_string(),
            })?;
        *slot = value;
        tracing::debug!(table, name, "value replaced");
        Ok(())
    }

    fn dump(&self, path: &Path) -> Result<(), FileError> {
        let text = serde_yaml::to_string(&self.root)?;
        fs::write(path, text).map_err(|source| FileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "written");
        Ok(())
    }

    fn parse_value(&self, raw: &str) -> Result<Value, FileError> {
        let value: Value = serde_yaml::from_str(raw)?;
        self.validate(&value)?;
        Ok(value)
    }

    fn import_codes(&self, csv_path: &Path) -> Result<Value, FileError> {
        match self.kind {
            FileKind::Mapping => import::read_codes(csv_path),
            kind => Err(FileError::UnsupportedImport(kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FEATURES: &str = "\
patient:
  age:
    type: integer
  sex:
    type: string
  race:
    type: string
visit:
  bmi:
    type: number
";

    const MAPPING: &str = "\
FHIR:
  age:
    Observation:
    - system: http://loinc.org
      code: '30525-0'
  asthma:
    Condition: []
";

    fn features() -> YamlFile {
        YamlFile::from_yaml(FileKind::Features, FEATURES).unwrap()
    }

    #[test]
    fn keys_follow_file_order() {
        let f = features();
        assert_eq!(f.keys("patient"), vec!["age", "sex", "race"]);
        assert_eq!(f.keys("visit"), vec!["bmi"]);
        assert!(f.keys("missing").is_empty());
    }

    #[test]
    fn mapping_ignores_table() {
        let m = YamlFile::from_yaml(FileKind::Mapping, MAPPING).unwrap();
        assert_eq!(m.keys("patient"), vec!["age", "asthma"]);
        assert_eq!(m.keys("visit"), m.keys("patient"));
        assert_eq!(m.dump_get("anything", "asthma").unwrap(), "Condition: []");
    }

    #[test]
    fn rename_keeps_position() {
        let mut f = features();
        f.update_key("patient", "sex", "gender").unwrap();
        assert_eq!(f.keys("patient"), vec!["age", "gender", "race"]);
        assert_eq!(f.dump_get("patient", "gender").unwrap(), "type: string");
    }

    #[test]
    fn rename_edge_cases() {
        let mut f = features();
        f.update_key("patient", "age", "age").unwrap();
        assert!(matches!(
            f.update_key("patient", "age", "sex"),
            Err(FileError::DuplicateName { .. })
        ));
        assert!(matches!(
            f.update_key("patient", "weight", "mass"),
            Err(FileError::UnknownName { .. })
        ));
        assert!(matches!(
            f.update_key("nope", "age", "x"),
            Err(FileError::UnknownTable(_))
        ));
        assert_eq!(f.keys("patient"), vec!["age", "sex", "race"]);
    }

    #[test]
    fn parse_value_checks_entry_shape() {
        let f = features();
        assert!(f.parse_value("type: integer\nminimum: 0").is_ok());
        assert!(matches!(
            f.parse_value("type: date"),
            Err(FileError::InvalidValue { .. })
        ));
        assert!(matches!(f.parse_value("- a"), Err(FileError::InvalidValue { .. })));
        assert!(matches!(f.parse_value("type: [unclosed"), Err(FileError::Yaml(_))));

        let ids = YamlFile::from_yaml(FileKind::Identifiers, "patient:\n  age: [A1]\n").unwrap();
        assert!(ids.parse_value("- LOINC:1\n- 42").is_ok());
        assert!(ids.parse_value("- {a: 1}").is_err());
    }

    #[test]
    fn update_value_then_dump_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.yaml");
        let mut f = features();
        let value = f.parse_value("type: number").unwrap();
        f.update_value("patient", "age", value).unwrap();
        f.dump(&path).unwrap();

        let back = YamlFile::load(FileKind::Features, &path).unwrap();
        assert_eq!(back.keys("patient"), vec!["age", "sex", "race"]);
        assert_eq!(back.dump_get("patient", "age").unwrap(), "type: number");
    }

    #[test]
    fn load_reports_bad_documents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.yaml");
        fs::write(&path, "- a\n- b\n").unwrap();
        assert!(matches!(
            YamlFile::load(FileKind::Features, &path),
            Err(FileError::NotAMapping { .. })
        ));
        assert!(matches!(
            YamlFile::load(FileKind::Features, &dir.path().join("absent.yaml")),
            Err(FileError::Io { .. })
        ));
    }

    #[test]
    fn import_only_for_mapping_files() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("codes.csv");
        fs::write(&csv, "Code,Vocab\n1191,RxNorm\n").unwrap();
        assert!(matches!(
            features().import_codes(&csv),
            Err(FileError::UnsupportedImport(FileKind::Features))
        ));
        let m = YamlFile::from_yaml(FileKind::Mapping, MAPPING).unwrap();
        let value = m.import_codes(&csv).unwrap();
        assert!(value.get("MedicationRequest").is_some());
    }
}
