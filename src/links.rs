//! Links
//!
//! A link maps a memorable slug to a destination URL template

use chrono::naive::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Slugs that collide with application routes and can never be links
///
/// The wildcard handler is registered after all named routes, but a link
/// with one of these slugs would still be unreachable -- reject it early.
pub const RESERVED_SLUGS: &[&str] = &["auth", "static", "dashboard", "admin", "api", "u", "links"];

/// Who gets to follow a link
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    /// Redirects for everybody, listed everywhere
    #[default]
    Public,

    /// Redirects for everybody who knows the slug, unlisted
    Private,

    /// Redirects only for admins, owners and users with a share grant
    Secure,
}

impl Visibility {
    /// Parse a stored visibility value
    ///
    /// Unrecognized values fall open to `Public`; this is the single place
    /// where that default is applied.
    pub fn parse(value: &str) -> Self {
        match value {
            "private" => Self::Private,
            "secure" => Self::Secure,
            _ => Self::Public,
        }
    }

    /// The stored representation of this visibility
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Secure => "secure",
        }
    }
}

/// A short link
#[derive(Clone, Debug)]
pub struct Link {
    /// Link ID
    pub id: Uuid,

    /// External identifier, immutable after creation
    pub slug: String,

    /// Where the link goes; may embed `$name` placeholders
    pub url_template: String,

    /// Optional human readable title
    pub title: Option<String>,

    /// Optional longer description
    pub description: Option<String>,

    /// Who gets to follow the link
    pub visibility: Visibility,

    /// Creation date
    pub created_at: NaiveDateTime,

    /// Last updated at
    pub updated_at: NaiveDateTime,
}
