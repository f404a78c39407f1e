//! All things related to the storage of links, keywords and their relations

use core::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use crate::clicks::ClickEvent;
use crate::keywords::Keyword;
use crate::links::Link;
use crate::links::Visibility;
use crate::owners::Owner;
use crate::owners::Share;
use crate::tags::Tag;
use crate::users::Role;
use crate::users::User;

#[cfg(not(feature = "postgres"))]
pub use memory::Memory;
#[cfg(feature = "postgres")]
pub use postgres::Postgres;

#[cfg(not(feature = "postgres"))]
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

/// Setup the storage
#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
pub async fn setup() -> Memory {
    Memory::new()
}

/// Setup the storage
#[cfg(feature = "postgres")]
pub async fn setup() -> Postgres {
    Postgres::new().await
}

/// Storage errors
#[derive(Debug)]
pub enum Error {
    /// A connection error with the storage
    Connection(String),

    /// Transient lock contention (deadlock, serialization failure, busy
    /// database); distinguishable from real faults, but never retried here
    Contention(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Connection(error) => write!(f, "Connection error: {error}"),
            Error::Contention(error) => write!(f, "Lock contention: {error}"),
        }
    }
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Values to create a User
pub struct CreateUserValues<'a> {
    /// The initial session ID for the user
    pub session_id: &'a Uuid,

    /// The role of the user
    pub role: Role,

    /// The username
    pub username: &'a str,

    /// The hashed password
    pub hashed_password: &'a str,
}

/// Values to create a Link
///
/// The creating user becomes the primary owner, in the same transaction.
pub struct CreateLinkValues<'a> {
    /// The user creating the link
    pub user: &'a User,

    /// The slug of the link
    pub slug: &'a str,

    /// The URL template the link redirects to
    pub url_template: &'a str,

    /// Optional title
    pub title: Option<&'a str>,

    /// Optional description
    pub description: Option<&'a str>,

    /// Who gets to follow the link
    pub visibility: Visibility,
}

/// Values to update a Link
///
/// The slug is immutable and deliberately absent here.
pub struct UpdateLinkValues<'a> {
    /// New (optional) URL template
    pub url_template: Option<&'a str>,

    /// New (optional) title
    pub title: Option<&'a str>,

    /// New (optional) description
    pub description: Option<&'a str>,

    /// New (optional) visibility
    pub visibility: Option<Visibility>,
}

/// Values to create a Keyword
pub struct CreateKeywordValues<'a> {
    /// The keyword itself
    pub keyword: &'a str,

    /// Template containing the literal `{slug}`
    pub url_template: &'a str,

    /// Optional description
    pub description: Option<&'a str>,
}

/// Storage with all supported operations
///
/// The resolution hot path only uses the point lookups: by slug, by keyword
/// and the owner/share membership checks.
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    /// Find any single user
    async fn find_any_single_user(&self) -> Result<Option<User>>;

    /// Finds a single user by its username
    async fn find_single_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Finds a single user by its ID
    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>>;

    /// Create a single user
    async fn create_user(&self, values: &CreateUserValues) -> Result<User>;

    /// Find all links
    async fn find_all_links(&self) -> Result<Vec<Link>>;

    /// Find a single link by its slug
    async fn find_single_link_by_slug(&self, slug: &str) -> Result<Option<Link>>;

    /// Find a single link by its ID
    async fn find_single_link_by_id(&self, id: &Uuid) -> Result<Option<Link>>;

    /// Create a link together with its primary owner row
    async fn create_link(&self, values: &CreateLinkValues) -> Result<Link>;

    /// Update a single link
    async fn update_link(&self, link: &Link, values: &UpdateLinkValues) -> Result<Link>;

    /// Delete a link and its owner, share and tag relations
    async fn delete_link(&self, link: &Link) -> Result<()>;

    /// Find all owner rows of a link
    async fn find_owners_by_link(&self, link: &Link) -> Result<Vec<Owner>>;

    /// Is the user an owner (primary or co-owner) of the link?
    async fn is_owner(&self, link_id: &Uuid, user_id: &Uuid) -> Result<bool>;

    /// Add a co-owner row; adding an existing owner is a no-op
    async fn add_owner(&self, link: &Link, user: &User) -> Result<()>;

    /// Remove a co-owner row
    ///
    /// Primary owner rows are never removed; returns whether a row was
    /// actually deleted.
    async fn remove_owner(&self, link: &Link, user_id: &Uuid) -> Result<bool>;

    /// Find all share grants of a link
    async fn find_shares_by_link(&self, link: &Link) -> Result<Vec<Share>>;

    /// Does the user hold a share grant for the link?
    async fn has_share(&self, link_id: &Uuid, user_id: &Uuid) -> Result<bool>;

    /// Add a share grant; re-sharing to the same user is a no-op
    async fn add_share(&self, link: &Link, user_id: &Uuid, shared_by: &User) -> Result<()>;

    /// Remove a share grant; returns whether a row was actually deleted
    async fn remove_share(&self, link: &Link, user_id: &Uuid) -> Result<bool>;

    /// Find all keywords
    async fn find_all_keywords(&self) -> Result<Vec<Keyword>>;

    /// Find a single keyword by its keyword string
    async fn find_single_keyword_by_keyword(&self, keyword: &str) -> Result<Option<Keyword>>;

    /// Create a keyword
    async fn create_keyword(&self, values: &CreateKeywordValues) -> Result<Keyword>;

    /// Delete a keyword
    async fn delete_keyword(&self, keyword: &Keyword) -> Result<()>;

    /// Find the tags attached to a link
    async fn find_tags_by_link(&self, link: &Link) -> Result<Vec<Tag>>;

    /// Replace the tags attached to a link, creating unknown tag names
    async fn set_link_tags(&self, link: &Link, names: &[String]) -> Result<Vec<Tag>>;

    /// Append a click event
    ///
    /// Only ever called from the background drain task, never from a
    /// request handler.
    async fn record_click(&self, event: &ClickEvent) -> Result<()>;
}
