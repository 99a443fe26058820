//! People: students and employees, and collections of them.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// A person whose schedule can be fetched.
///
/// "Nobody selected" is expressed as `Option<Person>` / `Option<&Person>`
/// rather than a sentinel value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Role {
    Student { specialty: String, profile: String },
    Employee { group: String },
}

impl Person {
    pub fn student(
        id: impl Into<String>,
        name: impl Into<String>,
        specialty: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        Person {
            id: id.into(),
            name: name.into(),
            start_date: None,
            end_date: None,
            role: Role::Student {
                specialty: specialty.into(),
                profile: profile.into(),
            },
        }
    }

    pub fn employee(id: impl Into<String>, name: impl Into<String>, group: impl Into<String>) -> Self {
        Person {
            id: id.into(),
            name: name.into(),
            start_date: None,
            end_date: None,
            role: Role::Employee {
                group: group.into(),
            },
        }
    }

    pub fn is_student(&self) -> bool {
        matches!(self.role, Role::Student { .. })
    }

    pub fn is_employee(&self) -> bool {
        matches!(self.role, Role::Employee { .. })
    }

    /// Whether the person studies/works on `date`. Missing bounds are open.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|start| start <= date)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

impl PartialEq for Person {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Person {}

impl Hash for Person {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.role {
            Role::Student { specialty, profile } => {
                write!(f, "{}: {}, {}", self.name, specialty, profile)?
            }
            Role::Employee { group } if group.is_empty() => write!(f, "{}", self.name)?,
            Role::Employee { group } => write!(f, "{}: {}", self.name, group)?,
        }
        if let Some(start) = self.start_date {
            write!(f, " (from {}", start)?;
            match self.end_date {
                Some(end) => write!(f, " to {})", end)?,
                None => write!(f, ")")?,
            }
        }
        Ok(())
    }
}

/// Ordered, duplicate-free (by id) collection of people, with an optional
/// designated "current" person.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonSet {
    #[serde(default)]
    current: Option<String>,
    #[serde(default)]
    people: Vec<Person>,
}

impl PersonSet {
    /// Build a set keeping insertion order and the first occurrence of each id.
    pub fn new(people: impl IntoIterator<Item = Person>) -> Self {
        let mut set = PersonSet::default();
        for person in people {
            set.insert(person);
        }
        set
    }

    /// Add a person unless one with the same id is already present.
    /// Returns whether the person was added.
    pub fn insert(&mut self, person: Person) -> bool {
        if self.get(&person.id).is_some() {
            return false;
        }
        self.people.push(person);
        true
    }

    /// Replace the entry with the same id, or append.
    pub fn upsert(&mut self, person: Person) {
        match self.people.iter_mut().find(|p| p.id == person.id) {
            Some(existing) => *existing = person,
            None => self.people.push(person),
        }
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Person> {
        self.people.iter()
    }

    pub fn first(&self) -> Option<&Person> {
        self.people.first()
    }

    pub fn get(&self, id: &str) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    pub fn current(&self) -> Option<&Person> {
        self.current.as_deref().and_then(|id| self.get(id))
    }

    /// Designate the current person. The id must be in the set.
    pub fn set_current(&mut self, id: &str) -> SyncResult<()> {
        if self.get(id).is_none() {
            return Err(SyncError::UnknownPerson(id.to_string()));
        }
        self.current = Some(id.to_string());
        Ok(())
    }

    /// Case-insensitive substring search on names.
    ///
    /// When nothing matches, the search is retried with "ё" folded to "е" on
    /// both sides, so "Федоров" finds "Фёдоров" and the other way round.
    pub fn search(&self, term: &str) -> PersonSet {
        let term = term.to_lowercase();
        let found = self.filtered(|p| p.name.to_lowercase().contains(&term));
        if !found.is_empty() {
            return found;
        }

        let folded = fold_yo(&term);
        self.filtered(|p| fold_yo(&p.name.to_lowercase()).contains(&folded))
    }

    pub fn students(&self) -> PersonSet {
        self.filtered(Person::is_student)
    }

    pub fn employees(&self) -> PersonSet {
        self.filtered(Person::is_employee)
    }

    pub fn employees_in_group(&self, group: &str) -> PersonSet {
        let group = group.to_lowercase();
        self.filtered(|p| matches!(&p.role, Role::Employee { group: g } if g.to_lowercase().contains(&group)))
    }

    pub fn students_by_specialty(&self, specialty: &str) -> PersonSet {
        let specialty = specialty.to_lowercase();
        self.filtered(|p| matches!(&p.role, Role::Student { specialty: s, .. } if s.to_lowercase().contains(&specialty)))
    }

    pub fn students_by_profile(&self, profile: &str) -> PersonSet {
        let profile = profile.to_lowercase();
        self.filtered(|p| matches!(&p.role, Role::Student { profile: s, .. } if s.to_lowercase().contains(&profile)))
    }

    /// People studying or working on `date`.
    pub fn active_on(&self, date: NaiveDate) -> PersonSet {
        self.filtered(|p| p.is_active_on(date))
    }

    /// Union with `other`; entries already present are kept as-is.
    pub fn merge(&mut self, other: PersonSet) {
        for person in other.people {
            self.insert(person);
        }
    }

    /// Load `people.json`. A missing file is an empty set.
    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Ok(PersonSet::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        let temp = path.with_extension("json.tmp");
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, path)?;
        Ok(())
    }

    fn filtered(&self, predicate: impl Fn(&Person) -> bool) -> PersonSet {
        PersonSet {
            current: None,
            people: self.people.iter().filter(|p| predicate(p)).cloned().collect(),
        }
    }
}

fn fold_yo(s: &str) -> String {
    s.replace('ё', "е")
}

impl FromIterator<Person> for PersonSet {
    fn from_iter<I: IntoIterator<Item = Person>>(iter: I) -> Self {
        PersonSet::new(iter)
    }
}

impl IntoIterator for PersonSet {
    type Item = Person;
    type IntoIter = std::vec::IntoIter<Person>;

    fn into_iter(self) -> Self::IntoIter {
        self.people.into_iter()
    }
}

impl<'a> IntoIterator for &'a PersonSet {
    type Item = &'a Person;
    type IntoIter = std::slice::Iter<'a, Person>;

    fn into_iter(self) -> Self::IntoIter {
        self.people.iter()
    }
}
