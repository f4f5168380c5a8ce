//! Pending resolutions for table rows and how they rewrite the backing files.

use std::fmt;
use thiserror::Error;

use crate::file::{FileError, SchemaFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::A => "a",
            Side::B => "b",
        })
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("row has no {0} variable")]
    MissingName(Side),
    #[error("file {0} is not open")]
    MissingSide(Side),
    #[error(transparent)]
    File(#[from] FileError),
}

/// What to do with a row on commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Action {
    #[default]
    NoOp,
    /// Rename b's variable to a's name.
    UseA,
    /// Rename a's variable to b's name.
    UseB,
    /// Rename both variables.
    Customize(String),
    CustomizeA(String),
    CustomizeB(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NoOp => Ok(()),
            Action::UseA => f.write_str("use a"),
            Action::UseB => f.write_str("use b"),
            Action::Customize(name) => write!(f, "customize: {name}"),
            Action::CustomizeA(name) => write!(f, "customize a: {name}"),
            Action::CustomizeB(name) => write!(f, "customize b: {name}"),
        }
    }
}

/// One side of a row: the variable name it shows (if any) and the file it
/// lives in.
pub struct Entry<'a> {
    pub name: Option<&'a str>,
    pub file: &'a mut dyn SchemaFile,
}

impl<'a> Entry<'a> {
    pub fn new(name: Option<&'a str>, file: &'a mut dyn SchemaFile) -> Self {
        Entry { name, file }
    }
}

fn need<'e, 'a>(entry: &'e mut Option<Entry<'a>>, side: Side) -> Result<&'e mut Entry<'a>, ActionError> {
    entry.as_mut().ok_or(ActionError::MissingSide(side))
}

fn name_of<'a>(entry: &Entry<'a>, side: Side) -> Result<&'a str, ActionError> {
    entry.name.ok_or(ActionError::MissingName(side))
}

fn rename(table: &str, entry: &mut Entry<'_>, side: Side, new: &str) -> Result<(), ActionError> {
    let old = name_of(entry, side)?;
    entry.file.update_key(table, old, new)?;
    Ok(())
}

impl Action {
    /// Rewrite the files for one row of `table`. Focused mode passes its only
    /// file as `a` and no `b`.
    pub fn apply(
        &self,
        table: &str,
        mut a: Option<Entry<'_>>,
        mut b: Option<Entry<'_>>,
    ) -> Result<(), ActionError> {
        match self {
            Action::NoOp => Ok(()),
            Action::UseA => {
                let name = name_of(need(&mut a, Side::A)?, Side::A)?;
                rename(table, need(&mut b, Side::B)?, Side::B, name)
            }
            Action::UseB => {
                let name = name_of(need(&mut b, Side::B)?, Side::B)?;
                rename(table, need(&mut a, Side::A)?, Side::A, name)
            }
            Action::Customize(name) => {
                // check both sides before touching either file
                name_of(need(&mut a, Side::A)?, Side::A)?;
                name_of(need(&mut b, Side::B)?, Side::B)?;
                rename(table, need(&mut a, Side::A)?, Side::A, name)?;
                rename(table, need(&mut b, Side::B)?, Side::B, name)
            }
            Action::CustomizeA(name) => rename(table, need(&mut a, Side::A)?, Side::A, name),
            Action::CustomizeB(name) => rename(table, need(&mut b, Side::B)?, Side::B, name),
        }
    }
}
