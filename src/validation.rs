use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

pub const IS_REQUIRED: &str = "is_required";
pub const MIN_LENGTH: &str = "min_length";
pub const INVALID: &str = "invalid";
pub const NOT_FOUND: &str = "not_found";

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Field-keyed validation errors, serialized as `{"field": ["code", ...]}`.
/// Payloads build one in their `validate` and hand it back on failure.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PayloadErrors(BTreeMap<&'static str, Vec<&'static str>>);

impl PayloadErrors {
    pub fn add(&mut self, field: &'static str, code: &'static str) {
        self.0.entry(field).or_default().push(code);
    }

    pub fn require(&mut self, field: &'static str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, IS_REQUIRED);
            return false;
        }
        true
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn codes(&self, field: &str) -> &[&'static str] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), PayloadErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}
