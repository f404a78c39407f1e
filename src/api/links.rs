//! Links API endpoints
//!
//! Everything related to the links management: the links themselves plus
//! their owner, share and tag relations

use axum::Extension;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::links::Link;
use crate::links::Visibility;
use crate::owners::Owner;
use crate::owners::Share;
use crate::storage::CreateLinkValues;
use crate::storage::Storage;
use crate::storage::UpdateLinkValues;
use crate::tags::Tag;
use crate::users::User;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::parse_slug;
use super::parse_url_template;

/// Link response going to the user
///
/// Basically filtering which fields are shown to the user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    /// Link ID
    pub id: Uuid,

    /// Slug used to identify the link by the root
    pub slug: String,

    /// Url template where root will redirect to
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

impl LinkResponse {
    /// Create a response from a [`Link`](Link)
    fn from_link(link: Link) -> Self {
        Self {
            id: link.id,
            slug: link.slug,
            url_template: link.url_template,
            title: link.title,
            description: link.description,
            visibility: link.visibility,
            created_at: link.created_at,
            updated_at: link.updated_at,
        }
    }

    /// Create a response from multiple [`Link`](Link)s
    fn from_link_multiple(mut links: Vec<Link>) -> Vec<Self> {
        links.drain(..).map(Self::from_link).collect::<Vec<Self>>()
    }
}

/// Owner row response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerResponse {
    /// The owning user
    pub user_id: Uuid,

    /// Primary owners are set at creation and can not be removed
    pub is_primary: bool,

    /// When the ownership was granted
    pub created_at: NaiveDateTime,
}

impl OwnerResponse {
    fn from_owner(owner: Owner) -> Self {
        Self {
            user_id: owner.user_id,
            is_primary: owner.is_primary,
            created_at: owner.created_at,
        }
    }
}

/// Share grant response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    /// The user the link is shared with
    pub user_id: Uuid,

    /// The user who handed out the grant
    pub shared_by: Uuid,

    /// When the grant was handed out
    pub created_at: NaiveDateTime,
}

impl ShareResponse {
    fn from_share(share: Share) -> Self {
        Self {
            user_id: share.user_id,
            shared_by: share.shared_by,
            created_at: share.created_at,
        }
    }
}

/// Tag response
#[derive(Debug, Serialize)]
pub struct TagResponse {
    /// Tag ID
    pub id: Uuid,

    /// The tag name
    pub name: String,
}

impl TagResponse {
    fn from_tag(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
        }
    }

    fn from_tag_multiple(mut tags: Vec<Tag>) -> Vec<Self> {
        tags.drain(..).map(Self::from_tag).collect::<Vec<Self>>()
    }
}

/// List all links
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/api/links
/// ```
///
/// Response:
/// ```json
/// { "data": [ { "id": "<uuid>", "slug": "some-easy-name" ... } ] }
/// ```
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    _current_user: CurrentUser<S>,
) -> Result<Success<Vec<LinkResponse>>, Error> {
    let links = storage
        .find_all_links()
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(LinkResponse::from_link_multiple(links)))
}

/// Get a single link
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/api/links/<uuid>
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": "<uuid>", "slug": "some-easy-name" ... } }
/// ```
pub async fn single<S: Storage>(
    Extension(storage): Extension<S>,
    _current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
) -> Result<Success<LinkResponse>, Error> {
    fetch_link(&storage, &link_id)
        .await
        .map(|link| Success::ok(LinkResponse::from_link(link)))
}

/// Create link form
///
/// Fields to create a link with
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkForm {
    /// Slug to create a link with
    ///
    /// Leading and trailing slashes are removed; every segment must be
    /// lowercase alphanumeric with inner dashes
    slug: String,

    /// Url template to create a link with, may embed `$name` placeholders
    url_template: String,

    /// Optional human readable title
    title: Option<String>,

    /// Optional longer description
    description: Option<String>,

    /// Who gets to follow the link, defaults to public
    visibility: Option<Visibility>,
}

/// Create a link based on the [`CreateLinkForm`](CreateLinkForm) form
///
/// The creating user becomes the primary owner
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "slug": "some-easy-name", "urlTemplate": "https://www.example.com/" }' \
///     http://localhost:6000/api/links
/// ```
///
/// Response
/// ```json
/// { "data": { "id": "<uuid>", "slug": "some-easy-name" ... } }
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<CreateLinkForm>,
) -> Result<Success<LinkResponse>, Error> {
    let slug = parse_slug(&form.slug)?;
    let url_template = parse_url_template(&form.url_template)?;

    let link = storage
        .find_single_link_by_slug(&slug)
        .await
        .map_err(Error::internal_server_error)?;

    if link.is_some() {
        Err(Error::bad_request("Slug already exists"))
    } else {
        let values = CreateLinkValues {
            user: &current_user,
            slug: &slug,
            url_template: &url_template,
            title: form.title.as_deref(),
            description: form.description.as_deref(),
            visibility: form.visibility.unwrap_or_default(),
        };

        let link = storage
            .create_link(&values)
            .await
            .map_err(Error::internal_server_error)?;

        Ok(Success::created(LinkResponse::from_link(link)))
    }
}

/// Update link form
///
/// Fields to update a link with, all fields are optional and are not touched
/// when not provided. The slug is immutable.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLinkForm {
    /// New url template to update the link with
    url_template: Option<String>,

    /// New title to update the link with
    title: Option<String>,

    /// New description to update the link with
    description: Option<String>,

    /// New visibility to update the link with
    visibility: Option<Visibility>,
}

/// Update a link based on the [`UpdateLinkForm`](UpdateLinkForm) form
///
/// Only provided values are processed, the other fields of the link will not
/// be touched
///
/// Request:
/// ```sh
/// curl -v -XPATCH -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "urlTemplate": "https://www.example.com/", "visibility": "private" }' \
///     http://localhost:6000/api/links/<uuid>
/// ```
///
/// Response
/// ```json
/// { "data": { "id": "<uuid>", "slug": "some-easy-name" ... } }
/// ```
pub async fn update<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
    Form(form): Form<UpdateLinkForm>,
) -> Result<Success<LinkResponse>, Error> {
    let link = fetch_link(&storage, &link_id).await?;

    require_owner(&storage, &link, &current_user).await?;

    let url_template = if let Some(ref url_template) = form.url_template {
        Some(parse_url_template(url_template)?)
    } else {
        None
    };

    let values = UpdateLinkValues {
        url_template: url_template.as_deref(),
        title: form.title.as_deref(),
        description: form.description.as_deref(),
        visibility: form.visibility,
    };

    let updated_link = storage
        .update_link(&link, &values)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(LinkResponse::from_link(updated_link)))
}

/// Delete a link
///
/// Request:
/// ```sh
/// curl -v -XDELETE \
///     -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/api/links/<uuid>
/// ```
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    let link = fetch_link(&storage, &link_id).await?;

    require_owner(&storage, &link, &current_user).await?;

    storage
        .delete_link(&link)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}

/// List the owners of a link
pub async fn list_owners<S: Storage>(
    Extension(storage): Extension<S>,
    _current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
) -> Result<Success<Vec<OwnerResponse>>, Error> {
    let link = fetch_link(&storage, &link_id).await?;

    let owners = storage
        .find_owners_by_link(&link)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(
        owners.into_iter().map(OwnerResponse::from_owner).collect(),
    ))
}

/// Owner/share mutation form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantForm {
    /// The user receiving the grant
    user_id: Uuid,
}

/// Add a co-owner to a link
///
/// Adding a user who already owns the link is a no-op
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "userId": "<uuid>" }' \
///     http://localhost:6000/api/links/<uuid>/owners
/// ```
pub async fn add_owner<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
    Form(form): Form<GrantForm>,
) -> Result<Success<&'static str>, Error> {
    let link = fetch_link(&storage, &link_id).await?;

    require_owner(&storage, &link, &current_user).await?;

    let user = fetch_user(&storage, &form.user_id).await?;

    storage
        .add_owner(&link, &user)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}

/// Remove a co-owner from a link
///
/// The primary owner can not be removed
///
/// Request:
/// ```sh
/// curl -v -XDELETE \
///     -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/api/links/<uuid>/owners/<uuid>
/// ```
pub async fn remove_owner<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters((link_id, user_id)): PathParameters<(Uuid, Uuid)>,
) -> Result<Success<&'static str>, Error> {
    let link = fetch_link(&storage, &link_id).await?;

    require_owner(&storage, &link, &current_user).await?;

    let removed = storage
        .remove_owner(&link, &user_id)
        .await
        .map_err(Error::internal_server_error)?;

    if removed {
        Ok(Success::<&'static str>::no_content())
    } else {
        Err(Error::bad_request(
            "User is not a removable owner of this link",
        ))
    }
}

/// List the share grants of a link
pub async fn list_shares<S: Storage>(
    Extension(storage): Extension<S>,
    _current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
) -> Result<Success<Vec<ShareResponse>>, Error> {
    let link = fetch_link(&storage, &link_id).await?;

    let shares = storage
        .find_shares_by_link(&link)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(
        shares.into_iter().map(ShareResponse::from_share).collect(),
    ))
}

/// Share a link with a user
///
/// Share grants only matter for secure links; re-sharing is a no-op
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "userId": "<uuid>" }' \
///     http://localhost:6000/api/links/<uuid>/shares
/// ```
pub async fn add_share<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
    Form(form): Form<GrantForm>,
) -> Result<Success<&'static str>, Error> {
    let link = fetch_link(&storage, &link_id).await?;

    require_owner(&storage, &link, &current_user).await?;

    let user = fetch_user(&storage, &form.user_id).await?;

    storage
        .add_share(&link, &user.id, &current_user)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}

/// Revoke a share grant
///
/// Request:
/// ```sh
/// curl -v -XDELETE \
///     -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/api/links/<uuid>/shares/<uuid>
/// ```
pub async fn remove_share<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters((link_id, user_id)): PathParameters<(Uuid, Uuid)>,
) -> Result<Success<&'static str>, Error> {
    let link = fetch_link(&storage, &link_id).await?;

    require_owner(&storage, &link, &current_user).await?;

    let removed = storage
        .remove_share(&link, &user_id)
        .await
        .map_err(Error::internal_server_error)?;

    if removed {
        Ok(Success::<&'static str>::no_content())
    } else {
        Err(Error::not_found("No share grant for this user"))
    }
}

/// List the tags of a link
pub async fn list_tags<S: Storage>(
    Extension(storage): Extension<S>,
    _current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
) -> Result<Success<Vec<TagResponse>>, Error> {
    let link = fetch_link(&storage, &link_id).await?;

    let tags = storage
        .find_tags_by_link(&link)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(TagResponse::from_tag_multiple(tags)))
}

/// Tags replacement form
#[derive(Debug, Deserialize)]
pub struct TagsForm {
    /// The full new set of tag names for the link
    tags: Vec<String>,
}

/// Replace the tags of a link
///
/// Unknown tag names are created on the fly
///
/// Request:
/// ```sh
/// curl -v -XPUT -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "tags": ["docs", "internal"] }' \
///     http://localhost:6000/api/links/<uuid>/tags
/// ```
pub async fn set_tags<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(link_id): PathParameters<Uuid>,
    Form(form): Form<TagsForm>,
) -> Result<Success<Vec<TagResponse>>, Error> {
    let link = fetch_link(&storage, &link_id).await?;

    require_owner(&storage, &link, &current_user).await?;

    let tags = storage
        .set_link_tags(&link, &form.tags)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(TagResponse::from_tag_multiple(tags)))
}

/// Require the current user to own the link, admins always pass
async fn require_owner<S: Storage>(
    storage: &S,
    link: &Link,
    current_user: &CurrentUser<S>,
) -> Result<(), Error> {
    if current_user.is_admin() {
        return Ok(());
    }

    let is_owner = storage
        .is_owner(&link.id, &current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    if is_owner {
        Ok(())
    } else {
        Err(Error::forbidden("Not an owner of this link"))
    }
}

/// Fetch a link from storage
async fn fetch_link<S: Storage>(storage: &S, link_id: &Uuid) -> Result<Link, Error> {
    storage
        .find_single_link_by_id(link_id)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("Link not found")), Ok)
}

/// Fetch a user from storage
async fn fetch_user<S: Storage>(storage: &S, user_id: &Uuid) -> Result<User, Error> {
    storage
        .find_single_user_by_id(user_id)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("User not found")), Ok)
}
