use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Account role stored in the `user.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperUser,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperUser => "super_user",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Teachers and super users may author Masala posts.
    pub fn can_author(&self) -> bool {
        matches!(self, Role::Teacher | Role::SuperUser)
    }

    pub fn is_super_user(&self) -> bool {
        matches!(self, Role::SuperUser)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_user" => Ok(Role::SuperUser),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(Error::Validation(format!("unknown role: {other}"))),
        }
    }
}
