use serde::{Deserialize, Serialize};

/// How a user's primary group is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimaryGroupCalculation {
    /// The group stored on the user
    Stored,
    /// Highest weighted direct parent, falling back to the stored group
    #[default]
    ParentsByWeight,
    /// Highest weighted group anywhere in the inheritance tree
    AllParentsByWeight,
}
