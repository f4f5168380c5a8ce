//! Backing files: feature schemas, FHIR mappings and identifier lists.
//!
//! All three are YAML documents keyed by table and then by variable name; the
//! controller only sees them through [`SchemaFile`].

mod import;
mod yaml;

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use yaml::YamlFile;

pub type Value = serde_yaml::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FileKind {
    /// `table -> name -> {type: ...}`
    Features,
    /// `FHIR -> name -> {resource: [...]}`, shared by every table
    Mapping,
    /// `table -> name -> [identifier, ...]`
    Identifiers,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileKind::Features => "features",
            FileKind::Mapping => "mapping",
            FileKind::Identifiers => "identifiers",
        })
    }
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{}: top level must be a mapping", path.display())]
    NotAMapping { path: PathBuf },
    #[error("no table {0}")]
    UnknownTable(String),
    #[error("no variable {name} in table {table}")]
    UnknownName { table: String, name: String },
    #[error("variable {name} already exists in table {table}")]
    DuplicateName { table: String, name: String },
    #[error("invalid {kind} entry: {reason}")]
    InvalidValue { kind: FileKind, reason: String },
    #[error("unsupported file type {0} for code import")]
    UnsupportedImport(FileKind),
    #[error("{}: missing column {column}", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("cannot read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// What the controller needs from a backing file.
pub trait SchemaFile {
    /// Variable names of `table` in file order; empty when the table is absent.
    fn keys(&self, table: &str) -> Vec<String>;

    /// The entry for `name`, rendered as YAML for display and editing.
    fn dump_get(&self, table: &str, name: &str) -> Result<String, FileError>;

    /// Rename in place, keeping the entry's position.
    fn update_key(&mut self, table: &str, old: &str, new: &str) -> Result<(), FileError>;

    fn update_value(&mut self, table: &str, name: &str, value: Value) -> Result<(), FileError>;

    fn dump(&self, path: &Path) -> Result<(), FileError>;

    /// Parse operator-edited text and check it has this file type's entry shape.
    fn parse_value(&self, raw: &str) -> Result<Value, FileError>;

    /// Build an entry value from a delimited code table.
    fn import_codes(&self, csv_path: &Path) -> Result<Value, FileError>;
}

pub fn open(kind: FileKind, path: &Path) -> Result<Box<dyn SchemaFile>, FileError> {
    let file = YamlFile::load(kind, path)?;
    tracing::info!(path = %path.display(), %kind, "loaded");
    Ok(Box::new(file))
}
