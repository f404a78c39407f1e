//! Ownership and share grants
//!
//! Both are plain relation rows between links and users; a link always has
//! exactly one primary owner, created together with the link itself.

use chrono::naive::NaiveDateTime;
use uuid::Uuid;

/// An owner row for a link
///
/// The primary owner is set at creation and can never be removed while the
/// link exists; co-owner rows come and go freely.
#[derive(Clone, Debug)]
pub struct Owner {
    /// The link being owned
    pub link_id: Uuid,

    /// The owning user
    pub user_id: Uuid,

    /// Whether this is the one non-removable primary owner
    pub is_primary: bool,

    /// Creation date
    pub created_at: NaiveDateTime,
}

/// A share grant for a secure link
///
/// Grants redirect/view access to one user. Rows persist harmlessly when the
/// link's visibility later changes away from secure.
#[derive(Clone, Debug)]
pub struct Share {
    /// The link being shared
    pub link_id: Uuid,

    /// The user receiving access
    pub user_id: Uuid,

    /// Who handed out the grant, kept for audit
    pub shared_by: Uuid,

    /// Creation date
    pub created_at: NaiveDateTime,
}
