//! Approver and creator identities

use serde::{Deserialize, Serialize};

use crate::error::Entity;

/// Which identity table a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityRole {
    /// Casts approvals
    SuperAdmin,
    /// Creates proposals
    Admin,
}

impl IdentityRole {
    pub fn table(&self) -> &'static str {
        match self {
            IdentityRole::SuperAdmin => "SuperAdmin",
            IdentityRole::Admin => "Admin",
        }
    }

    pub fn entity(&self) -> Entity {
        match self {
            IdentityRole::SuperAdmin => Entity::SuperAdmin,
            IdentityRole::Admin => Entity::Admin,
        }
    }
}

/// Activation status. Older records store the short forms `A`/`I`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityStatus {
    #[serde(alias = "A")]
    Active,
    #[serde(alias = "I")]
    Inactive,
}

impl IdentityStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, IdentityStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    /// PEM-encoded SubjectPublicKeyInfo, ECDSA P-256
    pub public_key: String,
    pub status: IdentityStatus,
}

impl Identity {
    pub fn active(id: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            public_key: public_key.into(),
            status: IdentityStatus::Active,
        }
    }
}

/// Administrative partial update of an identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IdentityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<IdentityStatus>,
}

impl IdentityPatch {
    pub fn is_empty(&self) -> bool {
        self.public_key.is_none() && self.status.is_none()
    }

    pub fn apply(&self, identity: &mut Identity) {
        if let Some(public_key) = &self.public_key {
            identity.public_key = public_key.clone();
        }
        if let Some(status) = self.status {
            identity.status = status;
        }
    }
}
