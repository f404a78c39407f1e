//! Keywords API endpoints
//!
//! Keywords are instance-wide search shortcuts and only admins manage them

use axum::Extension;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::keywords::Keyword;
use crate::storage::CreateKeywordValues;
use crate::storage::Storage;
use crate::users::Role;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::parse_keyword;
use super::parse_keyword_template;

/// Keyword response going to the user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordResponse {
    /// Keyword ID
    pub id: Uuid,

    /// The keyword itself
    pub keyword: String,

    /// Template the remainder of the path is spliced into
    pub url_template: String,

    /// Optional longer description
    pub description: Option<String>,

    /// Creation date
    pub created_at: NaiveDateTime,
}

impl KeywordResponse {
    /// Create a response from a [`Keyword`](Keyword)
    fn from_keyword(keyword: Keyword) -> Self {
        Self {
            id: keyword.id,
            keyword: keyword.keyword,
            url_template: keyword.url_template,
            description: keyword.description,
            created_at: keyword.created_at,
        }
    }

    /// Create a response from multiple [`Keyword`](Keyword)s
    fn from_keyword_multiple(mut keywords: Vec<Keyword>) -> Vec<Self> {
        keywords
            .drain(..)
            .map(Self::from_keyword)
            .collect::<Vec<Self>>()
    }
}

/// List all keywords
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/api/keywords
/// ```
///
/// Response:
/// ```json
/// { "data": [ { "id": "<uuid>", "keyword": "wtf" ... } ] }
/// ```
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<KeywordResponse>>, Error> {
    current_user.role.is_allowed(Role::Admin)?;

    let keywords = storage
        .find_all_keywords()
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(KeywordResponse::from_keyword_multiple(
        keywords,
    )))
}

/// Create keyword form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeywordForm {
    /// The keyword itself: `[a-z][a-z0-9-]*`
    keyword: String,

    /// Template containing the literal `{slug}` marker
    url_template: String,

    /// Optional longer description
    description: Option<String>,
}

/// Create a keyword based on the [`CreateKeywordForm`](CreateKeywordForm) form
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "keyword": "wtf", "urlTemplate": "https://wtf.example.com/?q={slug}" }' \
///     http://localhost:6000/api/keywords
/// ```
///
/// Response
/// ```json
/// { "data": { "id": "<uuid>", "keyword": "wtf" ... } }
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<CreateKeywordForm>,
) -> Result<Success<KeywordResponse>, Error> {
    current_user.role.is_allowed(Role::Admin)?;

    let keyword = parse_keyword(&form.keyword)?;
    let url_template = parse_keyword_template(&form.url_template)?;

    let existing = storage
        .find_single_keyword_by_keyword(&keyword)
        .await
        .map_err(Error::internal_server_error)?;

    if existing.is_some() {
        Err(Error::bad_request("Keyword already exists"))
    } else {
        let values = CreateKeywordValues {
            keyword: &keyword,
            url_template: &url_template,
            description: form.description.as_deref(),
        };

        let keyword = storage
            .create_keyword(&values)
            .await
            .map_err(Error::internal_server_error)?;

        Ok(Success::created(KeywordResponse::from_keyword(keyword)))
    }
}

/// Delete a keyword
///
/// Request:
/// ```sh
/// curl -v -XDELETE \
///     -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/api/keywords/<keyword>
/// ```
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(keyword): PathParameters<String>,
) -> Result<Success<&'static str>, Error> {
    current_user.role.is_allowed(Role::Admin)?;

    let keyword = storage
        .find_single_keyword_by_keyword(&keyword)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("Keyword not found")), Ok)?;

    storage
        .delete_keyword(&keyword)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}
