use anyhow::Error;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    EditOwnProfile,

    ManageSettings,
    WriteSessionNotes,
    ManageChildren,
    ManageAiPreferences,
    ViewParentProfiles,
    SearchProfiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Therapist,
    Parent,
}

static PARENT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::EditOwnProfile);

    permissions
});

static THERAPIST_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(PARENT_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ManageSettings);
    permissions.insert(Permission::WriteSessionNotes);
    permissions.insert(Permission::ManageChildren);
    permissions.insert(Permission::ManageAiPreferences);
    permissions.insert(Permission::ViewParentProfiles);
    permissions.insert(Permission::SearchProfiles);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Therapist => &THERAPIST_PERMISSIONS,
            Role::Parent => &PARENT_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Therapist => "therapist",
            Role::Parent => "parent",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "therapist" => Ok(Role::Therapist),
            "parent" => Ok(Role::Parent),
            _ => Err(Error::msg(format!(
                "Invalid role '{}'. Must be 'therapist' or 'parent'",
                s
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
