use std::{
    collections::{BTreeMap, HashSet},
    hash::Hash,
    sync::LazyLock,
};

use regex::Regex;
use serde::Serialize;

pub type FieldErrors = BTreeMap<String, String>;

pub static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+\\/?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email regex is valid")
});

/// Collects validation errors, at most one message per field.
///
/// The first error recorded for a field wins, later ones are ignored,
/// so checks should be ordered from the most basic to the most specific.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(key.into())
            .or_insert_with(|| message.into());
    }

    pub fn check(&mut self, ok: bool, key: impl Into<String>, message: impl Into<String>) {
        if !ok {
            self.add_error(key, message);
        }
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }
}

pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let distinct: HashSet<&T> = values.iter().collect();
    distinct.len() == values.len()
}
