//! Tags

use chrono::naive::NaiveDateTime;
use uuid::Uuid;

/// A tag that can be attached to any number of links
#[derive(Clone, Debug)]
pub struct Tag {
    /// Tag ID
    pub id: Uuid,

    /// The tag name, unique
    pub name: String,

    /// Creation date
    pub created_at: NaiveDateTime,
}
