//! Caller identity, roles and profiles.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Role held by an identity on the remote service.
///
/// Exactly one role per identity; `Admin` is granted at most once through
/// the admin claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Manages products, categories and inquiries.
    Admin,
    /// Authenticated, no write access to the catalog.
    User,
    /// Anonymous visitor.
    #[default]
    Guest,
}

impl UserRole {
    /// Whether this role grants catalog write access.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::User => write!(f, "user"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            "guest" => Ok(Self::Guest),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Errors that can occur when parsing a [`Principal`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("principal cannot be empty")]
    Empty,
    #[error("principal cannot contain whitespace")]
    Whitespace,
}

/// Opaque textual identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Parse a principal.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or contains whitespace.
    pub fn parse(s: &str) -> Result<Self, PrincipalError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PrincipalError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(PrincipalError::Whitespace);
        }
        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Profile stored per authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [UserRole::Admin, UserRole::User, UserRole::Guest] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&UserRole::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_principal_parse() {
        assert_eq!(Principal::parse(" abc-123 ").unwrap().as_str(), "abc-123");
        assert_eq!(Principal::parse(""), Err(PrincipalError::Empty));
        assert_eq!(Principal::parse("a b"), Err(PrincipalError::Whitespace));
    }
}
