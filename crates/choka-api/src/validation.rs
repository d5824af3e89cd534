//! Field validation. Every check appends to a [`FieldErrors`] list so a
//! request reports all of its problems at once.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use choka_types::Prefecture;

use crate::error::ApiError;

pub const TITLE_MAX: usize = 30;
pub const TRIP_CONTENT_MAX: usize = 1000;
pub const FISH_NAME_MAX: usize = 20;
pub const IMAGE_REF_MAX: usize = 100;
pub const COMMENT_MAX: usize = 200;
pub const MESSAGE_MAX: usize = 600;
pub const INTRODUCE_MAX: usize = 300;
pub const USERNAME_MAX: usize = 150;
pub const PASSWORD_MIN: usize = 8;

/// Full-width katakana (ァ..ン) and the long vowel mark.
static FISH_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([ァ-ン]|ー)+$").expect("valid regex"));
static USERNAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid regex"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.is_empty() { Ok(()) } else { Err(ApiError::Validation(self)) }
    }

    /// Non-empty (after trimming) and at most `max` characters.
    pub fn required(&mut self, field: &str, value: &str, max: usize) {
        if value.trim().is_empty() {
            self.add(field, "this field is required");
        } else if value.chars().count() > max {
            self.add(field, format!("at most {max} characters"));
        }
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("at most {max} characters"));
        }
    }

    /// A stored fish name: the katakana pattern plus the column limit.
    pub fn fish_name(&mut self, field: &str, value: &str) {
        if self.fish_name_pattern(field, value) && value.chars().count() > FISH_NAME_MAX {
            self.add(field, format!("at most {FISH_NAME_MAX} characters"));
        }
    }

    /// Non-empty katakana, with no length limit. Returns whether it passed.
    pub fn fish_name_pattern(&mut self, field: &str, value: &str) -> bool {
        if value.is_empty() {
            self.add(field, "this field is required");
            false
        } else if !is_fish_name(value) {
            self.add(field, "enter the name in full-width katakana");
            false
        } else {
            true
        }
    }

    /// Required prefecture; returns it when valid.
    pub fn prefecture(&mut self, field: &str, value: &str) -> Option<Prefecture> {
        if value.is_empty() {
            self.add(field, "this field is required");
            return None;
        }
        match value.parse() {
            Ok(p) => Some(p),
            Err(e) => {
                self.add(field, e.to_string());
                None
            }
        }
    }

    pub fn username(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            self.add(field, "this field is required");
        } else if value.chars().count() > USERNAME_MAX {
            self.add(field, format!("at most {USERNAME_MAX} characters"));
        } else if !USERNAME.is_match(value) {
            self.add(field, "letters, digits and @/./+/-/_ only");
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if !EMAIL.is_match(value) {
            self.add(field, "enter a valid email address");
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "{}", fields.join(", "))
    }
}

pub fn is_fish_name(value: &str) -> bool {
    FISH_NAME.is_match(value)
}

/// Lowercases the domain part, leaving the local part as typed.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}
