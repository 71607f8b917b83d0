use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pkg::internal::category::Category;

pub const TABLE: &str = "posts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    Remote,
    Onsite,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Active,
    Closed,
    Draft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostEntry {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub organization: String,
    pub description: String,
    pub requirements: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub category: Category,
    pub work_type: Option<WorkType>,
    pub duration: Option<String>,
    pub compensation: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
