//! Read-only projection of the authenticated user.

use serde::{Deserialize, Serialize};

use crate::vendor::{BasicProfile, GoogleUser};

/// Basic profile of a signed-in user.
///
/// Computed from the vendor's user object on every request; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable account identifier.
    pub id: String,
    /// Full display name.
    pub name: String,
    /// Given name.
    #[serde(rename = "firstname")]
    pub first_name: String,
    /// Family name.
    #[serde(rename = "lastname")]
    pub last_name: String,
    /// Avatar URL.
    #[serde(rename = "image")]
    pub image_url: String,
    /// Primary email address.
    pub email: String,
}

impl UserProfile {
    /// Projects a vendor user into a profile.
    ///
    /// Returns `None` if the user has no profile accessors or if any field
    /// cannot be read. A partially filled profile is never produced.
    pub fn from_user<U: GoogleUser>(user: &U) -> Option<Self> {
        let profile = user.basic_profile()?;
        Some(Self {
            id: profile.id()?,
            name: profile.name()?,
            first_name: profile.given_name()?,
            last_name: profile.family_name()?,
            image_url: profile.image_url()?,
            email: profile.email()?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockProfile, MockUser};

    #[test]
    fn test_projection() {
        let user = MockUser::signed_in(MockProfile::new("42", "Ada", "Lovelace", "ada@example.com"));
        let profile = UserProfile::from_user(&user).unwrap();
        assert_eq!(profile.id, "42");
        assert_eq!(profile.name, "Ada Lovelace");
        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.last_name, "Lovelace");
        assert_eq!(profile.email, "ada@example.com");
    }

    #[test]
    fn test_user_without_profile_projects_to_none() {
        assert!(UserProfile::from_user(&MockUser::anonymous()).is_none());
    }

    #[test]
    fn test_missing_field_projects_to_none() {
        let mut profile = MockProfile::new("42", "Ada", "Lovelace", "ada@example.com");
        profile.email = None;
        assert!(UserProfile::from_user(&MockUser::signed_in(profile)).is_none());
    }

    #[test]
    fn test_serializes_short_field_names() {
        let user = MockUser::signed_in(MockProfile::new("1", "Grace", "Hopper", "g@example.com"));
        let json = serde_json::to_value(UserProfile::from_user(&user).unwrap()).unwrap();
        assert_eq!(json["firstname"], "Grace");
        assert_eq!(json["lastname"], "Hopper");
        assert!(json.get("image").is_some());
    }
}
