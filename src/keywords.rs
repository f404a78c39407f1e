//! Keywords
//!
//! Admin-managed hostname aliases with their own URL template, resolved
//! before any slug lookup

use chrono::naive::NaiveDateTime;
use uuid::Uuid;

/// The marker a keyword template substitutes with the request path
pub const SLUG_MARKER: &str = "{slug}";

/// A keyword shortcut
#[derive(Clone, Debug)]
pub struct Keyword {
    /// Keyword ID
    pub id: Uuid,

    /// The keyword itself, doubles as a hostname alias
    pub keyword: String,

    /// Template containing the literal `{slug}`
    pub url_template: String,

    /// Optional description shown in the admin listing
    pub description: Option<String>,

    /// Creation date
    pub created_at: NaiveDateTime,
}

impl Keyword {
    /// Build the redirect target by substituting `{slug}` with the given value
    pub fn apply(&self, slug: &str) -> String {
        self.url_template.replace(SLUG_MARKER, slug)
    }
}
