use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved name prefix of ARM server types.
pub const ARM_TYPE_PREFIX: &str = "cax";

/// CPU architecture family of a server type.
///
/// Derived from the type name only. Every caller (alternative listing, bulk validation,
/// compatibility warnings) goes through [`Architecture::of`] so they never disagree.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X86,
    Arm,
}

impl Architecture {
    /// Case-insensitive prefix check on the server type name.
    pub fn of(server_type_name: &str) -> Self {
        let is_arm = server_type_name
            .get(..ARM_TYPE_PREFIX.len())
            .map(|prefix| prefix.eq_ignore_ascii_case(ARM_TYPE_PREFIX))
            .unwrap_or(false);
        if is_arm {
            Architecture::Arm
        } else {
            Architecture::X86
        }
    }

    pub fn is_arm(&self) -> bool {
        matches!(self, Architecture::Arm)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X86 => "x86",
            Architecture::Arm => "arm",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86 => f.write_str("x86"),
            Architecture::Arm => f.write_str("ARM"),
        }
    }
}
