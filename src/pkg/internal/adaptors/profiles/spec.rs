use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::pkg::internal::failure::{Failure, Outcome};

pub const TABLE: &str = "profiles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkEnvironment {
    #[default]
    Remote,
    Hybrid,
    InOffice,
}

impl WorkEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkEnvironment::Remote => "remote",
            WorkEnvironment::Hybrid => "hybrid",
            WorkEnvironment::InOffice => "in-office",
        }
    }

    /// The form `createProfile` records on chain.
    pub fn on_chain_label(&self) -> &'static str {
        match self {
            WorkEnvironment::Remote => "Remote",
            WorkEnvironment::Hybrid => "Hybrid",
            WorkEnvironment::InOffice => "In-office",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    pub year: String,
    pub specialization: String,
    pub gpa: Option<f64>,
    pub certifications: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Freelance,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub title: String,
    pub company: String,
    pub industry: String,
    pub duration: String,
    pub description: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(rename = "type")]
    pub kind: EmploymentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Individual,
    Team,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ProjectKind,
    pub description: String,
    pub outcome: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    pub year: String,
    pub url: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Skills {
    #[serde(default)]
    pub technical: Vec<String>,
    #[serde(default)]
    pub soft: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

/// A sequence item with an identifier that survives reordering. Rows written
/// before identifiers existed get one on first read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<T> {
    #[serde(default = "Uuid::new_v4")]
    pub entry_id: Uuid,
    #[serde(flatten)]
    pub item: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub points: i64,
    pub title: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub about: Option<String>,
    #[serde(default)]
    pub verified: bool,
    pub age: Option<u32>,
    pub gender: Option<String>,
    #[serde(default)]
    pub work_environment: WorkEnvironment,
    #[serde(default)]
    pub education: Vec<Entry<Education>>,
    #[serde(default)]
    pub experience: Vec<Entry<WorkExperience>>,
    #[serde(default)]
    pub skills: Skills,
    #[serde(default)]
    pub projects: Vec<Entry<Project>>,
    #[serde(default)]
    pub certifications: Vec<Entry<Certification>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The entry sequences of a profile that are addressed by `entry_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Education,
    Experience,
    Projects,
    Certifications,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Education,
        Section::Experience,
        Section::Projects,
        Section::Certifications,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Section::Education => "education",
            Section::Experience => "experience",
            Section::Projects => "projects",
            Section::Certifications => "certifications",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Section {
    type Err = Failure;

    fn from_str(s: &str) -> Outcome<Self> {
        match s {
            "education" => Ok(Section::Education),
            "experience" => Ok(Section::Experience),
            "projects" => Ok(Section::Projects),
            "certifications" => Ok(Section::Certifications),
            other => Err(Failure::InvalidArgument(format!(
                "unknown profile section {}",
                other
            ))),
        }
    }
}

pub fn parse_row(row: Value) -> Outcome<ProfileEntry> {
    serde_json::from_value(row).map_err(|e| Failure::Backend(format!("profile row: {}", e)))
}

/// Whether a stored row holds section entries written before `entry_id`
/// existed. Such rows get fresh ids on every parse until written back.
pub fn lacks_entry_ids(row: &Value) -> bool {
    Section::ALL.iter().any(|section| {
        row.get(section.column())
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().any(|item| item.get("entry_id").is_none()))
    })
}

fn parse_item<T: DeserializeOwned>(section: Section, item: Value) -> Outcome<T> {
    serde_json::from_value(item)
        .map_err(|e| Failure::InvalidArgument(format!("{} entry: {}", section, e)))
}

fn entry_missing(section: Section, entry_id: Uuid) -> Failure {
    Failure::NotFound(format!("{} entry {}", section, entry_id))
}

fn push<T: DeserializeOwned>(
    entries: &mut Vec<Entry<T>>,
    section: Section,
    item: Value,
) -> Outcome<Uuid> {
    let entry = Entry {
        entry_id: Uuid::new_v4(),
        item: parse_item(section, item)?,
    };
    let entry_id = entry.entry_id;
    entries.push(entry);
    Ok(entry_id)
}

fn replace<T: DeserializeOwned>(
    entries: &mut [Entry<T>],
    section: Section,
    entry_id: Uuid,
    item: Value,
) -> Outcome<()> {
    let entry = entries
        .iter_mut()
        .find(|e| e.entry_id == entry_id)
        .ok_or_else(|| entry_missing(section, entry_id))?;
    entry.item = parse_item(section, item)?;
    Ok(())
}

fn remove<T>(entries: &mut Vec<Entry<T>>, section: Section, entry_id: Uuid) -> Outcome<()> {
    let at = entries
        .iter()
        .position(|e| e.entry_id == entry_id)
        .ok_or_else(|| entry_missing(section, entry_id))?;
    entries.remove(at);
    Ok(())
}

fn column<T: Serialize>(entries: &[Entry<T>]) -> Outcome<Value> {
    serde_json::to_value(entries).map_err(|e| Failure::Backend(format!("profile entries: {}", e)))
}

impl ProfileEntry {
    pub fn entry_count(&self, section: Section) -> usize {
        match section {
            Section::Education => self.education.len(),
            Section::Experience => self.experience.len(),
            Section::Projects => self.projects.len(),
            Section::Certifications => self.certifications.len(),
        }
    }

    /// Appends a new entry to `section` and returns its identifier.
    pub fn add_entry(&mut self, section: Section, item: Value) -> Outcome<Uuid> {
        match section {
            Section::Education => push(&mut self.education, section, item),
            Section::Experience => push(&mut self.experience, section, item),
            Section::Projects => push(&mut self.projects, section, item),
            Section::Certifications => push(&mut self.certifications, section, item),
        }
    }

    pub fn replace_entry(&mut self, section: Section, entry_id: Uuid, item: Value) -> Outcome<()> {
        match section {
            Section::Education => replace(&mut self.education, section, entry_id, item),
            Section::Experience => replace(&mut self.experience, section, entry_id, item),
            Section::Projects => replace(&mut self.projects, section, entry_id, item),
            Section::Certifications => replace(&mut self.certifications, section, entry_id, item),
        }
    }

    pub fn remove_entry(&mut self, section: Section, entry_id: Uuid) -> Outcome<()> {
        match section {
            Section::Education => remove(&mut self.education, section, entry_id),
            Section::Experience => remove(&mut self.experience, section, entry_id),
            Section::Projects => remove(&mut self.projects, section, entry_id),
            Section::Certifications => remove(&mut self.certifications, section, entry_id),
        }
    }

    /// The stored form of one section, ready to be written back as a column.
    pub fn section_column(&self, section: Section) -> Outcome<Value> {
        match section {
            Section::Education => column(&self.education),
            Section::Experience => column(&self.experience),
            Section::Projects => column(&self.projects),
            Section::Certifications => column(&self.certifications),
        }
    }

    /// Current position of a project; the contract addresses projects by index.
    pub fn project_index(&self, entry_id: Uuid) -> Outcome<usize> {
        self.projects
            .iter()
            .position(|p| p.entry_id == entry_id)
            .ok_or_else(|| entry_missing(Section::Projects, entry_id))
    }
}
