use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{AppError, AppResult};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// At least ten digits once formatting is stripped.
pub fn is_valid_phone(phone: &str) -> bool {
    phone.chars().filter(|c| c.is_ascii_digit()).count() >= 10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordCheck {
    pub length: bool,
    pub uppercase: bool,
    pub lowercase: bool,
    pub digit: bool,
    pub special: bool,
}

impl PasswordCheck {
    pub fn of(password: &str) -> Self {
        Self {
            length: password.chars().count() >= 8,
            uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
            lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
            digit: password.chars().any(|c| c.is_ascii_digit()),
            special: password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)),
        }
    }

    pub fn passed(&self) -> usize {
        [
            self.length,
            self.uppercase,
            self.lowercase,
            self.digit,
            self.special,
        ]
        .into_iter()
        .filter(|ok| *ok)
        .count()
    }

    /// Fewer than three criteria is weak, all five is strong.
    pub fn strength(&self) -> Strength {
        match self.passed() {
            0..=2 => Strength::Weak,
            3 | 4 => Strength::Medium,
            _ => Strength::Strong,
        }
    }
}

pub fn require_non_empty(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("Please enter {field}")));
    }
    Ok(())
}
