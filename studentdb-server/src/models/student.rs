//! Student insert payload validation
//!
//! Only the minimal shape is checked: a non-blank name and something that
//! looks like an email address. Both are bound as statement parameters.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

/// Column width of `name` and `email` in the student table
const MAX_FIELD_LEN: usize = 255;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("invalid email regex"));

/// Validated student name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentName(String);

impl StudentName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }

        if trimmed.chars().count() > MAX_FIELD_LEN {
            return Err(ValidationError::TooLong {
                field: "name",
                max: MAX_FIELD_LEN,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated email address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email(String);

impl Email {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }

        if trimmed.chars().count() > MAX_FIELD_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_FIELD_LEN,
            });
        }

        if !EMAIL_RE.is_match(trimmed) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "must look like local@domain",
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A row ready to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub name: StudentName,
    pub email: Email,
}

impl NewStudent {
    pub fn new(name: &str, email: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            name: StudentName::new(name)?,
            email: Email::new(email)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_student() {
        let student = NewStudent::new("Ada Lovelace", "ada@example.com").unwrap();
        assert_eq!(student.name.as_str(), "Ada Lovelace");
        assert_eq!(student.email.as_str(), "ada@example.com");
    }

    #[test]
    fn trims_whitespace() {
        let student = NewStudent::new("  A ", " a@x.com ").unwrap();
        assert_eq!(student.name.as_str(), "A");
        assert_eq!(student.email.as_str(), "a@x.com");
    }

    #[test]
    fn rejects_blank_name() {
        let err = NewStudent::new("   ", "a@x.com").unwrap_err();
        assert_eq!(err, ValidationError::Empty { field: "name" });
    }

    #[test]
    fn rejects_email_without_at() {
        let err = Email::new("not-an-email").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFormat { field: "email", .. }));
    }

    #[test]
    fn rejects_email_with_spaces() {
        assert!(Email::new("a b@x.com").is_err());
    }

    #[test]
    fn name_length_counts_chars_not_bytes() {
        assert!(StudentName::new(&"é".repeat(255)).is_ok());
        let err = StudentName::new(&"é".repeat(256)).unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { max: 255, .. }));
    }
}
