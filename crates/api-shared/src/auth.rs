//! Caller identity supplied by the upstream authentication provider.
//!
//! The gateway in front of the API authenticates users and forwards three values:
//! a shared API key proving the request came through the gateway, the actor's user id, and the
//! actor's role. This module validates them; it never provisions identities.

use hms_types::Role;

/// Header carrying the gateway's shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying the authenticated user id. For doctors this is also the doctor id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated user's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing x-api-key header")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("missing caller identity")]
    MissingIdentity,
    #[error("unrecognised caller role")]
    UnknownRole,
    #[error("caller lacks the {0} capability")]
    Forbidden(&'static str),
}

impl AuthError {
    /// True when the caller is authenticated but not allowed to perform the operation.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    /// Builds an actor from raw header values.
    ///
    /// `provided_key` is compared with `expected_key`; the identity headers must be present and
    /// the role must be one the system knows.
    pub fn authenticate(
        expected_key: &str,
        provided_key: Option<&str>,
        user_id: Option<&str>,
        role: Option<&str>,
    ) -> Result<Self, AuthError> {
        let provided_key = provided_key.ok_or(AuthError::MissingApiKey)?;
        validate_api_key(expected_key, provided_key)?;

        let user_id = user_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingIdentity)?;
        let role = role
            .ok_or(AuthError::MissingIdentity)?
            .parse::<Role>()
            .map_err(|_| AuthError::UnknownRole)?;

        Ok(Self {
            user_id: user_id.to_string(),
            role,
        })
    }

    /// Committing clinical notes requires the doctor capability.
    pub fn require_doctor(&self) -> Result<(), AuthError> {
        self.require_any(&[Role::Doctor], "doctor")
    }

    pub fn require_admin(&self) -> Result<(), AuthError> {
        self.require_any(&[Role::Admin], "admin")
    }

    /// Medical records are opened by the treating doctor or by administrators.
    pub fn require_record_author(&self) -> Result<(), AuthError> {
        self.require_any(&[Role::Doctor, Role::Admin], "doctor or admin")
    }

    fn require_any(&self, roles: &[Role], capability: &'static str) -> Result<(), AuthError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(
                "caller {} with role {} lacks the {} capability",
                self.user_id,
                self.role,
                capability
            );
            Err(AuthError::Forbidden(capability))
        }
    }
}

/// Validates the provided API key against the key configured at startup.
pub fn validate_api_key(expected_key: &str, provided_key: &str) -> Result<(), AuthError> {
    if !expected_key.is_empty() && provided_key == expected_key {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticates_doctor() {
        let actor =
            Actor::authenticate("secret", Some("secret"), Some("doctor-a"), Some("DOCTOR"))
                .unwrap();
        assert_eq!(actor.user_id, "doctor-a");
        assert_eq!(actor.role, Role::Doctor);
        assert!(actor.require_doctor().is_ok());
        assert!(actor.require_record_author().is_ok());
        assert!(actor.require_admin().unwrap_err().is_forbidden());
    }

    #[test]
    fn rejects_missing_or_wrong_key() {
        assert_eq!(
            Actor::authenticate("secret", None, Some("u"), Some("admin")),
            Err(AuthError::MissingApiKey)
        );
        assert_eq!(
            Actor::authenticate("secret", Some("guess"), Some("u"), Some("admin")),
            Err(AuthError::InvalidApiKey)
        );
    }

    #[test]
    fn empty_configured_key_never_matches() {
        assert_eq!(validate_api_key("", ""), Err(AuthError::InvalidApiKey));
    }

    #[test]
    fn rejects_missing_identity_and_unknown_role() {
        assert_eq!(
            Actor::authenticate("secret", Some("secret"), Some("  "), Some("doctor")),
            Err(AuthError::MissingIdentity)
        );
        assert_eq!(
            Actor::authenticate("secret", Some("secret"), Some("u"), None),
            Err(AuthError::MissingIdentity)
        );
        assert_eq!(
            Actor::authenticate("secret", Some("secret"), Some("u"), Some("janitor")),
            Err(AuthError::UnknownRole)
        );
    }

    #[test]
    fn nurse_cannot_commit_notes() {
        let nurse = Actor {
            user_id: "nurse-1".into(),
            role: Role::Nurse,
        };
        assert_eq!(nurse.require_doctor(), Err(AuthError::Forbidden("doctor")));
    }
}
