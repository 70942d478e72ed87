//! Role claim normalization.
//!
//! The `roles` launch parameter is a comma-separated list mixing short names
//! (`Instructor`) and full URNs (`urn:lti:role:ims/lis/Instructor`). Short
//! names are promoted into the LIS context role namespace.

use std::collections::BTreeSet;
use std::fmt;

/// Namespace short role names are promoted into.
pub const LIS_ROLE_PREFIX: &str = "urn:lti:role:ims/lis/";

/// Canonical Instructor role URN.
pub const INSTRUCTOR: &str = "urn:lti:role:ims/lis/Instructor";

/// Canonical Learner role URN.
pub const LEARNER: &str = "urn:lti:role:ims/lis/Learner";

/// A role in canonical URN form.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Normalize one role token.
    ///
    /// Returns `None` for a blank token. Tokens already starting with `urn:`
    /// are kept as they are; anything else is prefixed with
    /// [`LIS_ROLE_PREFIX`].
    ///
    /// # Examples
    ///
    /// ```
    /// use ltigate_launch::Role;
    ///
    /// assert_eq!(Role::parse(" Learner ").unwrap().as_str(), "urn:lti:role:ims/lis/Learner");
    /// assert_eq!(Role::parse("urn:custom:role").unwrap().as_str(), "urn:custom:role");
    /// assert!(Role::parse("  ").is_none());
    /// ```
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            None
        } else if token.starts_with("urn:") {
            Some(Self(token.to_owned()))
        } else {
            Some(Self(format!("{LIS_ROLE_PREFIX}{token}")))
        }
    }

    /// The role URN.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the Instructor role.
    #[must_use]
    pub fn is_instructor(&self) -> bool {
        self.0 == INSTRUCTOR
    }

    /// Whether this is the Learner role.
    #[must_use]
    pub fn is_learner(&self) -> bool {
        self.0 == LEARNER
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A deduplicated set of roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    /// Normalize a raw comma-separated role claim.
    ///
    /// Never fails: blank tokens are dropped and an empty claim yields an
    /// empty set. Two tokens collapse only when they are identical after
    /// normalization.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.split(',').filter_map(Role::parse).collect()
    }

    /// Whether the Instructor role is present.
    #[must_use]
    pub fn has_instructor(&self) -> bool {
        self.0.iter().any(Role::is_instructor)
    }

    /// Whether the Learner role is present.
    #[must_use]
    pub fn has_learner(&self) -> bool {
        self.0.iter().any(Role::is_learner)
    }

    /// Number of distinct roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no role was claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the roles in URN order.
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
