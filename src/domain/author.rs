use serde::{Deserialize, Serialize};

/// Represents a book author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
}

/// Payload for creating or replacing an author.
#[derive(Debug, Clone)]
pub struct NewAuthor {
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
}

impl NewAuthor {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        bio: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            bio: bio.into(),
        }
    }
}

impl Author {
    pub(crate) fn from_new(id: u64, new: NewAuthor) -> Self {
        Self {
            id,
            first_name: new.first_name,
            last_name: new.last_name,
            bio: new.bio,
        }
    }
}
