//! Projection row and partial updates.

use common::AggregateId;

/// Derived state for one active todo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionRecord {
    pub entity_id: AggregateId,
    pub title: Option<String>,
    pub contact_address: Option<String>,
}

impl ProjectionRecord {
    pub fn new(
        entity_id: AggregateId,
        title: Option<String>,
        contact_address: Option<String>,
    ) -> Self {
        Self {
            entity_id,
            title,
            contact_address,
        }
    }

    /// The contact address with surrounding whitespace removed, unless it
    /// is absent or blank.
    pub fn contact(&self) -> Option<&str> {
        self.contact_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    pub fn has_contact(&self) -> bool {
        self.contact().is_some()
    }

    /// Merges `changes` into this record, leaving unmentioned fields alone.
    pub fn apply(&mut self, changes: &RecordChanges) {
        if let Some(title) = &changes.title {
            self.title = title.clone();
        }
        if let Some(contact_address) = &changes.contact_address {
            self.contact_address = contact_address.clone();
        }
    }
}

/// A partial update. `None` means "leave this field as it is".
///
/// Both fields are doubly optional: `Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordChanges {
    pub title: Option<Option<String>>,
    pub contact_address: Option<Option<String>>,
}

impl RecordChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: Option<String>) -> Self {
        self.title = Some(title);
        self
    }

    pub fn contact_address(mut self, contact_address: Option<String>) -> Self {
        self.contact_address = Some(contact_address);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.contact_address.is_none()
    }
}
