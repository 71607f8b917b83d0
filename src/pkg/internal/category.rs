use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pkg::internal::failure::Failure;

/// Marketplace listing kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Jobs,
    Internships,
    Courses,
    Scholarships,
    Projects,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Jobs,
        Category::Internships,
        Category::Courses,
        Category::Scholarships,
        Category::Projects,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Jobs => "jobs",
            Category::Internships => "internships",
            Category::Courses => "courses",
            Category::Scholarships => "scholarships",
            Category::Projects => "projects",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Failure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Failure::InvalidArgument(format!("unknown category {:?}", s)))
    }
}
