// src/models/entity.rs

//! Portal entities: courses, folders and file entries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable portal-assigned identifier of a course, folder or file.
///
/// Identifiers are the diff key: the portal reuses the same id for the
/// same object across requests, while display names may change or collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A course as listed on the my-courses page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Portal-assigned course identifier
    pub id: EntityId,

    /// Course display name (without the trailing type suffix)
    pub name: String,

    /// Course type extracted from the title, e.g. "Vorlesung"
    pub course_type: Option<String>,

    /// Course number from the listing table
    pub number: Option<String>,

    /// Semester tag the course was listed under
    pub semester: String,

    /// Root folder id, filled in once the course file index was crawled
    pub root_folder: Option<EntityId>,
}

/// A folder inside a course's file area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Portal-assigned folder identifier
    pub id: EntityId,

    /// Course this folder belongs to
    pub course: EntityId,

    /// Parent folder; `None` for a course root folder
    pub parent: Option<EntityId>,

    /// Folder display name
    pub name: String,

    /// Child folder/file ids in listing order
    pub children: Vec<EntityId>,

    /// Change marker taken from the listing page
    pub changed: Option<DateTime<Utc>>,
}

/// A file leaf inside a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Portal-assigned file identifier
    pub id: EntityId,

    /// Course this file belongs to
    pub course: EntityId,

    /// Containing folder
    pub parent: EntityId,

    /// File display name
    pub name: String,

    /// Uploader as shown in the listing
    pub author: Option<String>,

    /// Size in bytes; unknown until the listing or detail page reports it
    pub size: Option<u64>,

    /// Content change marker taken from the listing page
    pub changed: Option<DateTime<Utc>>,

    /// Download locator, resolved lazily on first content access
    pub download: Option<DownloadInfo>,
}

/// Where and how to download a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadInfo {
    /// Absolute download URL
    pub url: String,

    /// Content length reported by the detail page, if any
    pub size: Option<u64>,
}

/// Any entity a snapshot can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Course(Course),
    Folder(Folder),
    File(FileEntry),
}

impl Entity {
    /// The entity's stable identifier.
    pub fn id(&self) -> &EntityId {
        match self {
            Entity::Course(c) => &c.id,
            Entity::Folder(f) => &f.id,
            Entity::File(f) => &f.id,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        match self {
            Entity::Course(c) => &c.name,
            Entity::Folder(f) => &f.name,
            Entity::File(f) => &f.name,
        }
    }

    /// Structural children, in listing order.
    ///
    /// A course's only structural child is its root folder; files are leaves.
    pub fn child_ids(&self) -> &[EntityId] {
        match self {
            Entity::Course(c) => c.root_folder.as_slice(),
            Entity::Folder(f) => &f.children,
            Entity::File(_) => &[],
        }
    }

    /// Whether two observations of the same identifier carry the same
    /// modification marker.
    ///
    /// Structural membership (a folder's child list) is deliberately not
    /// part of the marker: added or removed children produce their own
    /// events. Lazily resolved download locators are ignored for the same
    /// reason.
    pub fn same_version(&self, other: &Entity) -> bool {
        match (self, other) {
            (Entity::Course(a), Entity::Course(b)) => {
                a.name == b.name
                    && a.course_type == b.course_type
                    && a.number == b.number
                    && a.semester == b.semester
            }
            (Entity::Folder(a), Entity::Folder(b)) => a.name == b.name && a.changed == b.changed,
            (Entity::File(a), Entity::File(b)) => {
                a.name == b.name && a.size == b.size && a.changed == b.changed
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(name: &str) -> Folder {
        Folder {
            id: "f1".into(),
            course: "c1".into(),
            parent: None,
            name: name.to_string(),
            children: Vec::new(),
            changed: None,
        }
    }

    #[test]
    fn test_rename_changes_version() {
        let a = Entity::Folder(folder("Slides"));
        let b = Entity::Folder(folder("Slides (old)"));
        assert!(!a.same_version(&b));
        assert!(a.same_version(&a.clone()));
    }

    #[test]
    fn test_child_list_not_part_of_version() {
        let mut with_child = folder("Slides");
        with_child.children.push("file1".into());
        let a = Entity::Folder(folder("Slides"));
        let b = Entity::Folder(with_child);
        assert!(a.same_version(&b));
    }

    #[test]
    fn test_course_child_is_root_folder() {
        let course = Entity::Course(Course {
            id: "c1".into(),
            name: "Algorithms".into(),
            course_type: Some("Vorlesung".into()),
            number: Some("12345".into()),
            semester: "WS 25/26".into(),
            root_folder: Some("root".into()),
        });
        assert_eq!(course.child_ids(), &[EntityId::from("root")]);
    }
}
