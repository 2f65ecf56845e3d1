//! Trusted contact records and validation
//!
//! A contact is reachable through at least one of phone, email, or push
//! token; validation enforces that invariant before a contact enters the
//! user's profile.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// A person pre-registered to be notified during an emergency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Ulid,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
}

/// Validation failure listing every issue found
#[derive(Debug, Error)]
#[error("invalid contact: {}", issues.join("; "))]
pub struct ContactInvalid {
    pub issues: Vec<String>,
}

impl Contact {
    /// Create a contact with a fresh identifier and no addresses
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            name: name.into(),
            phone: None,
            email: None,
            push_token: None,
        }
    }

    /// Builder: set phone number
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Builder: set email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Builder: set push token
    pub fn with_push_token(mut self, token: impl Into<String>) -> Self {
        self.push_token = Some(token.into());
        self
    }

    /// Whether any delivery address is present
    pub fn has_address(&self) -> bool {
        self.phone.is_some() || self.email.is_some() || self.push_token.is_some()
    }

    /// Check the contact invariants, collecting every violation
    pub fn validate(&self) -> Result<(), ContactInvalid> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push("name is required".to_string());
        }

        if !self.has_address() {
            issues.push("at least one of phone, email, or push token is required".to_string());
        }

        if let Some(email) = &self.email {
            if !is_valid_email(email) {
                issues.push(format!("invalid email address: {}", email));
            }
        }

        if let Some(phone) = &self.phone {
            if !is_valid_phone(phone) {
                issues.push(format!("invalid phone number: {}", phone));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ContactInvalid { issues })
        }
    }
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain
fn is_valid_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");

    !local.is_empty()
        && !domain.is_empty()
        && !local.contains(char::is_whitespace)
        && !domain.contains(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Accepts an optional leading `+`, separators, and at least 10 digits
fn is_valid_phone(phone: &str) -> bool {
    let trimmed = phone.trim();
    let rest = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let mut digits = 0usize;
    for c in rest.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '(' | ')' => {}
            _ => return false,
        }
    }

    digits >= 10
}
