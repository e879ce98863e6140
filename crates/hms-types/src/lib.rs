//! Validated value types shared across the HMS crates.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input text exceeded the permitted length
    #[error("Text exceeds maximum length of {max} bytes")]
    TooLong { max: usize },
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Turns optional free text into `Some` only when it has content.
    pub fn optional(input: Option<impl AsRef<str>>) -> Option<Self> {
        input.and_then(|s| Self::new(s).ok())
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Free text kept exactly as supplied, leading and trailing whitespace included.
///
/// It must contain at least one non-whitespace character and fit within a byte limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerbatimText(String);

impl VerbatimText {
    pub fn new(input: impl Into<String>, max: usize) -> Result<Self, TextError> {
        let input = input.into();
        if input.trim().is_empty() {
            return Err(TextError::Empty);
        }
        if input.len() > max {
            return Err(TextError::TooLong { max });
        }
        Ok(Self(input))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Capability attached to an authenticated actor by the identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    LabTechnician,
    Patient,
    Cashier,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Doctor => "doctor",
            Self::Nurse => "nurse",
            Self::LabTechnician => "lab_technician",
            Self::Patient => "patient",
            Self::Cashier => "cashier",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Case-insensitive; accepts the identity provider's upper-case names as well.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "doctor" => Ok(Self::Doctor),
            "nurse" => Ok(Self::Nurse),
            "lab_technician" => Ok(Self::LabTechnician),
            "patient" => Ok(Self::Patient),
            "cashier" => Ok(Self::Cashier),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  stable  ").unwrap();
        assert_eq!(text.as_str(), "stable");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        assert!(matches!(NonEmptyText::new(" \n\t"), Err(TextError::Empty)));
        assert!(matches!(NonEmptyText::new(""), Err(TextError::Empty)));
    }

    #[test]
    fn verbatim_text_keeps_surrounding_whitespace() {
        let text = VerbatimText::new("  - BP 120/80\n  - HR 70\n", 64).unwrap();
        assert_eq!(text.as_str(), "  - BP 120/80\n  - HR 70\n");
    }

    #[test]
    fn verbatim_text_rejects_blank_and_oversized_input() {
        assert!(matches!(VerbatimText::new(" \n\t", 64), Err(TextError::Empty)));
        assert!(matches!(
            VerbatimText::new("abcd", 3),
            Err(TextError::TooLong { max: 3 })
        ));
        assert!(VerbatimText::new(" abc", 4).is_ok());
    }

    #[test]
    fn optional_drops_blank_values() {
        assert!(NonEmptyText::optional(Some("   ")).is_none());
        assert!(NonEmptyText::optional(None::<&str>).is_none());
        assert_eq!(
            NonEmptyText::optional(Some("follow-up")).unwrap().as_str(),
            "follow-up"
        );
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("DOCTOR".parse::<Role>().unwrap(), Role::Doctor);
        assert_eq!("lab_technician".parse::<Role>().unwrap(), Role::LabTechnician);
        assert!("surgeon".parse::<Role>().is_err());
    }

    #[test]
    fn role_round_trips_through_display() {
        for role in [Role::Admin, Role::Doctor, Role::Cashier] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }
}
