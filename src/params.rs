//! Typed extraction of command arguments from a heterogeneous attribute map.
//!
//! Downcasts an `AttrValue` to the concrete shape a handler expects and
//! reports mismatches as a typed `EngineError` rather than panicking or
//! returning `Option`, since params errors are part of the closed,
//! coordinator-facing error set.

use crate::command::{AttrValue, Command};
use crate::error::EngineError;

/// Borrowing view over a [`Command`]'s attribute map.
pub struct Params<'a> {
    cmd: &'a Command,
}

impl<'a> Params<'a> {
    #[must_use]
    pub fn new(cmd: &'a Command) -> Self {
        Self { cmd }
    }

    fn raw(&self, key: &str) -> Result<&'a AttrValue, EngineError> {
        self.cmd
            .attrs
            .get(key)
            .ok_or_else(|| EngineError::MissingKey(key.to_string()))
    }

    /// Fetch a required string argument.
    pub fn str(&self, key: &str) -> Result<&'a str, EngineError> {
        match self.raw(key)? {
            AttrValue::Str(s) => Ok(s.as_str()),
            other => Err(invalid(key, other)),
        }
    }

    /// Fetch an optional string argument.
    pub fn str_opt(&self, key: &str) -> Result<Option<&'a str>, EngineError> {
        match self.cmd.attrs.get(key) {
            None => Ok(None),
            Some(AttrValue::Str(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(invalid(key, other)),
        }
    }

    /// Fetch a required boolean argument.
    pub fn boolean(&self, key: &str) -> Result<bool, EngineError> {
        match self.raw(key)? {
            AttrValue::Bool(b) => Ok(*b),
            other => Err(invalid(key, other)),
        }
    }

    /// Fetch an optional boolean argument, defaulting when absent.
    pub fn boolean_or(&self, key: &str, default: bool) -> Result<bool, EngineError> {
        match self.cmd.attrs.get(key) {
            None => Ok(default),
            Some(AttrValue::Bool(b)) => Ok(*b),
            Some(other) => Err(invalid(key, other)),
        }
    }

    /// Fetch a required signed integer argument.
    pub fn int(&self, key: &str) -> Result<i64, EngineError> {
        match self.raw(key)? {
            AttrValue::Int(v) => Ok(*v),
            AttrValue::UInt(v) => Ok(*v as i64),
            other => Err(invalid(key, other)),
        }
    }

    /// Fetch an optional signed integer argument.
    pub fn int_opt(&self, key: &str) -> Result<Option<i64>, EngineError> {
        match self.cmd.attrs.get(key) {
            None => Ok(None),
            Some(AttrValue::Int(v)) => Ok(Some(*v)),
            Some(AttrValue::UInt(v)) => Ok(Some(*v as i64)),
            Some(other) => Err(invalid(key, other)),
        }
    }

    /// Fetch a required string-list argument.
    pub fn str_list(&self, key: &str) -> Result<&'a [String], EngineError> {
        match self.raw(key)? {
            AttrValue::StrList(v) => Ok(v.as_slice()),
            other => Err(invalid(key, other)),
        }
    }

    /// Fetch an optional string-list argument, defaulting to empty.
    pub fn str_list_or_empty(&self, key: &str) -> Result<&'a [String], EngineError> {
        match self.cmd.attrs.get(key) {
            None => Ok(&[]),
            Some(AttrValue::StrList(v)) => Ok(v.as_slice()),
            Some(other) => Err(invalid(key, other)),
        }
    }

    /// Fetch a required nested string-list argument (per-label property id
    /// lists in `PROJECT_GRAPH`, e.g.).
    pub fn nested_str_list(&self, key: &str) -> Result<&'a [Vec<String>], EngineError> {
        match self.raw(key)? {
            AttrValue::NestedStrList(v) => Ok(v.as_slice()),
            other => Err(invalid(key, other)),
        }
    }

    /// True if the key is present at all, regardless of type.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.cmd.attrs.contains_key(key)
    }
}

fn invalid(key: &str, value: &AttrValue) -> EngineError {
    EngineError::InvalidValue {
        key: key.to_string(),
        message: format!("unexpected attribute shape: {value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;

    #[test]
    fn missing_key_is_missing_key_error() {
        let cmd = Command::new(CommandKind::CreateGraph);
        let p = Params::new(&cmd);
        let err = p.str("graph_name").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MissingKey);
    }

    #[test]
    fn wrong_shape_is_invalid_value_error() {
        let cmd = Command::new(CommandKind::CreateGraph).with("directed", "not-a-bool");
        let p = Params::new(&cmd);
        let err = p.boolean("directed").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn str_list_or_empty_defaults_when_absent() {
        let cmd = Command::new(CommandKind::ProjectGraph);
        let p = Params::new(&cmd);
        assert!(p.str_list_or_empty("vertex_collections").unwrap().is_empty());
    }

    #[test]
    fn int_accepts_uint_attr() {
        let cmd = Command::new(CommandKind::UnloadGraph).with("vineyard_id", 42u64);
        let p = Params::new(&cmd);
        assert_eq!(p.int("vineyard_id").unwrap(), 42);
    }
}
