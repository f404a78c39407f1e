//! Postgres implementation of the storage

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
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

use super::CreateKeywordValues;
use super::CreateLinkValues;
use super::CreateUserValues;
use super::Error;
use super::Result;
use super::Storage;
use super::UpdateLinkValues;

/// Migrator to run migrations on startup
static MIGRATOR: Migrator = sqlx::migrate!();

/// Postgres storage
#[derive(Clone)]
pub struct Postgres {
    /// Pool of connections
    connection_pool: PgPool,
}

impl Postgres {
    /// Create Postgres storage
    ///
    /// Use the `DATABASE_URL` environment variable
    ///
    /// Migrations will be run
    pub async fn new() -> Self {
        let database_connection_string = std::env::var("DATABASE_URL").expect("Valid DATABASE_URL");

        let connection_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_connection_string)
            .await
            .expect("Valid connection");

        Self::new_with_pool(connection_pool).await
    }

    /// Create Postgres storage with existing pool
    ///
    /// Migrations will be run
    pub async fn new_with_pool(connection_pool: PgPool) -> Self {
        let migration_result = MIGRATOR.run(&connection_pool).await;

        if let Err(err) = migration_result {
            panic!("Migrations could not run: {err}");
        }

        Self { connection_pool }
    }
}

/// Row version of a user, role still a string
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    session_id: Uuid,
    username: String,
    hashed_password: String,
    role: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            session_id: self.session_id,
            username: self.username,
            hashed_password: self.hashed_password,
            role: parse_role(&self.role),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Row version of a link, visibility still a string
#[derive(sqlx::FromRow)]
struct LinkRow {
    id: Uuid,
    slug: String,
    url_template: String,
    title: Option<String>,
    description: Option<String>,
    visibility: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl LinkRow {
    fn into_link(self) -> Link {
        Link {
            id: self.id,
            slug: self.slug,
            url_template: self.url_template,
            title: self.title,
            description: self.description,
            visibility: Visibility::parse(&self.visibility),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OwnerRow {
    link_id: Uuid,
    user_id: Uuid,
    is_primary: bool,
    created_at: NaiveDateTime,
}

impl OwnerRow {
    fn into_owner(self) -> Owner {
        Owner {
            link_id: self.link_id,
            user_id: self.user_id,
            is_primary: self.is_primary,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ShareRow {
    link_id: Uuid,
    user_id: Uuid,
    shared_by: Uuid,
    created_at: NaiveDateTime,
}

impl ShareRow {
    fn into_share(self) -> Share {
        Share {
            link_id: self.link_id,
            user_id: self.user_id,
            shared_by: self.shared_by,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: Uuid,
    name: String,
    created_at: NaiveDateTime,
}

impl TagRow {
    fn into_tag(self) -> Tag {
        Tag {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
        }
    }
}

/// Parse a stored role, unknown values get the least privilege
fn parse_role(role: &str) -> Role {
    if role == "admin" { Role::Admin } else { Role::Member }
}

/// The stored representation of a role
fn role_as_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Member => "member",
    }
}

#[async_trait]
impl Storage for Postgres {
    async fn find_any_single_user(&self) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users LIMIT 1")
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(classify_error)?;

        Ok(user.map(UserRow::into_user))
    }

    async fn find_single_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(classify_error)?;

        Ok(user.map(UserRow::into_user))
    }

    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(classify_error)?;

        Ok(user.map(UserRow::into_user))
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let user = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (id, session_id, username, hashed_password, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(Uuid::new_v4())
        .bind(values.session_id)
        .bind(values.username)
        .bind(values.hashed_password)
        .bind(role_as_str(values.role))
        .fetch_one(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(user.into_user())
    }

    async fn find_all_links(&self) -> Result<Vec<Link>> {
        let links = sqlx::query_as::<_, LinkRow>("SELECT * FROM links ORDER BY slug")
            .fetch_all(&self.connection_pool)
            .await
            .map_err(classify_error)?;

        Ok(links.into_iter().map(LinkRow::into_link).collect())
    }

    async fn find_single_link_by_slug(&self, slug: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, LinkRow>("SELECT * FROM links WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(classify_error)?;

        Ok(link.map(LinkRow::into_link))
    }

    async fn find_single_link_by_id(&self, id: &Uuid) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, LinkRow>("SELECT * FROM links WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(classify_error)?;

        Ok(link.map(LinkRow::into_link))
    }

    async fn create_link(&self, values: &CreateLinkValues) -> Result<Link> {
        // the link and its primary owner appear together or not at all
        let mut transaction = self.connection_pool.begin().await.map_err(classify_error)?;

        let link = sqlx::query_as::<_, LinkRow>(
            r"
            INSERT INTO links (id, slug, url_template, title, description, visibility)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(Uuid::new_v4())
        .bind(values.slug)
        .bind(values.url_template)
        .bind(values.title)
        .bind(values.description)
        .bind(values.visibility.as_str())
        .fetch_one(&mut *transaction)
        .await
        .map_err(classify_error)?;

        sqlx::query(
            r"
            INSERT INTO link_owners (link_id, user_id, is_primary)
            VALUES ($1, $2, TRUE)
            ",
        )
        .bind(link.id)
        .bind(values.user.id)
        .execute(&mut *transaction)
        .await
        .map_err(classify_error)?;

        transaction.commit().await.map_err(classify_error)?;

        Ok(link.into_link())
    }

    async fn update_link(&self, link: &Link, values: &UpdateLinkValues) -> Result<Link> {
        let updated = sqlx::query_as::<_, LinkRow>(
            r"
            UPDATE links
            SET url_template = COALESCE($2, url_template),
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                visibility = COALESCE($5, visibility),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(link.id)
        .bind(values.url_template)
        .bind(values.title)
        .bind(values.description)
        .bind(values.visibility.map(Visibility::as_str))
        .fetch_one(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(updated.into_link())
    }

    async fn delete_link(&self, link: &Link) -> Result<()> {
        // relation tables cascade on delete
        sqlx::query("DELETE FROM links WHERE id = $1")
            .bind(link.id)
            .execute(&self.connection_pool)
            .await
            .map_err(classify_error)?;

        Ok(())
    }

    async fn find_owners_by_link(&self, link: &Link) -> Result<Vec<Owner>> {
        let owners = sqlx::query_as::<_, OwnerRow>(
            "SELECT * FROM link_owners WHERE link_id = $1 ORDER BY created_at",
        )
        .bind(link.id)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(owners.into_iter().map(OwnerRow::into_owner).collect())
    }

    async fn is_owner(&self, link_id: &Uuid, user_id: &Uuid) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM link_owners WHERE link_id = $1 AND user_id = $2)",
        )
        .bind(link_id)
        .bind(user_id)
        .fetch_one(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(row.0)
    }

    async fn add_owner(&self, link: &Link, user: &User) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO link_owners (link_id, user_id, is_primary)
            VALUES ($1, $2, FALSE)
            ON CONFLICT (link_id, user_id) DO NOTHING
            ",
        )
        .bind(link.id)
        .bind(user.id)
        .execute(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(())
    }

    async fn remove_owner(&self, link: &Link, user_id: &Uuid) -> Result<bool> {
        let result = sqlx::query(
            r"
            DELETE FROM link_owners
            WHERE link_id = $1 AND user_id = $2 AND is_primary = FALSE
            ",
        )
        .bind(link.id)
        .bind(user_id)
        .execute(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_shares_by_link(&self, link: &Link) -> Result<Vec<Share>> {
        let shares = sqlx::query_as::<_, ShareRow>(
            "SELECT * FROM link_shares WHERE link_id = $1 ORDER BY created_at",
        )
        .bind(link.id)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(shares.into_iter().map(ShareRow::into_share).collect())
    }

    async fn has_share(&self, link_id: &Uuid, user_id: &Uuid) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM link_shares WHERE link_id = $1 AND user_id = $2)",
        )
        .bind(link_id)
        .bind(user_id)
        .fetch_one(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(row.0)
    }

    async fn add_share(&self, link: &Link, user_id: &Uuid, shared_by: &User) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO link_shares (link_id, user_id, shared_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (link_id, user_id) DO NOTHING
            ",
        )
        .bind(link.id)
        .bind(user_id)
        .bind(shared_by.id)
        .execute(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(())
    }

    async fn remove_share(&self, link: &Link, user_id: &Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM link_shares WHERE link_id = $1 AND user_id = $2")
            .bind(link.id)
            .bind(user_id)
            .execute(&self.connection_pool)
            .await
            .map_err(classify_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_all_keywords(&self) -> Result<Vec<Keyword>> {
        let keywords =
            sqlx::query_as::<_, KeywordRow>("SELECT * FROM keywords ORDER BY keyword")
                .fetch_all(&self.connection_pool)
                .await
                .map_err(classify_error)?;

        Ok(keywords.into_iter().map(KeywordRow::into_keyword).collect())
    }

    async fn find_single_keyword_by_keyword(&self, keyword: &str) -> Result<Option<Keyword>> {
        let keyword = sqlx::query_as::<_, KeywordRow>("SELECT * FROM keywords WHERE keyword = $1")
            .bind(keyword)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(classify_error)?;

        Ok(keyword.map(KeywordRow::into_keyword))
    }

    async fn create_keyword(&self, values: &CreateKeywordValues) -> Result<Keyword> {
        let keyword = sqlx::query_as::<_, KeywordRow>(
            r"
            INSERT INTO keywords (id, keyword, url_template, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(Uuid::new_v4())
        .bind(values.keyword)
        .bind(values.url_template)
        .bind(values.description)
        .fetch_one(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(keyword.into_keyword())
    }

    async fn delete_keyword(&self, keyword: &Keyword) -> Result<()> {
        sqlx::query("DELETE FROM keywords WHERE id = $1")
            .bind(keyword.id)
            .execute(&self.connection_pool)
            .await
            .map_err(classify_error)?;

        Ok(())
    }

    async fn find_tags_by_link(&self, link: &Link) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, TagRow>(
            r"
            SELECT tags.*
            FROM tags
            JOIN link_tags ON link_tags.tag_id = tags.id
            WHERE link_tags.link_id = $1
            ORDER BY tags.name
            ",
        )
        .bind(link.id)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(tags.into_iter().map(TagRow::into_tag).collect())
    }

    async fn set_link_tags(&self, link: &Link, names: &[String]) -> Result<Vec<Tag>> {
        let mut transaction = self.connection_pool.begin().await.map_err(classify_error)?;

        sqlx::query("DELETE FROM link_tags WHERE link_id = $1")
            .bind(link.id)
            .execute(&mut *transaction)
            .await
            .map_err(classify_error)?;

        let mut tags = Vec::with_capacity(names.len());

        for name in names {
            let tag = sqlx::query_as::<_, TagRow>(
                r"
                INSERT INTO tags (id, name)
                VALUES ($1, $2)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING *
                ",
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(&mut *transaction)
            .await
            .map_err(classify_error)?;

            sqlx::query(
                r"
                INSERT INTO link_tags (link_id, tag_id)
                VALUES ($1, $2)
                ON CONFLICT (link_id, tag_id) DO NOTHING
                ",
            )
            .bind(link.id)
            .bind(tag.id)
            .execute(&mut *transaction)
            .await
            .map_err(classify_error)?;

            tags.push(tag.into_tag());
        }

        transaction.commit().await.map_err(classify_error)?;

        Ok(tags)
    }

    async fn record_click(&self, event: &ClickEvent) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO clicks (id, link_id, user_id, ip_hash, user_agent, referrer)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(Uuid::new_v4())
        .bind(event.link_id)
        .bind(event.user_id)
        .bind(event.ip_hash.as_deref())
        .bind(event.user_agent.as_deref())
        .bind(event.referrer.as_deref())
        .execute(&self.connection_pool)
        .await
        .map_err(classify_error)?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct KeywordRow {
    id: Uuid,
    keyword: String,
    url_template: String,
    description: Option<String>,
    created_at: NaiveDateTime,
}

impl KeywordRow {
    fn into_keyword(self) -> Keyword {
        Keyword {
            id: self.id,
            keyword: self.keyword,
            url_template: self.url_template,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

/// Codes and messages that mark transient lock contention
const CONTENTION_CODES: &[&str] = &["40001", "40P01", "1213", "1205"];

/// Split transient contention from real connection faults
///
/// Contention is surfaced as its own variant so callers can decide to retry;
/// nothing in here retries by itself.
fn classify_error(error: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref database_error) = error {
        let is_contention = database_error
            .code()
            .is_some_and(|code| CONTENTION_CODES.contains(&code.as_ref()));

        let message = database_error.message().to_lowercase();

        if is_contention
            || message.contains("deadlock")
            || message.contains("serialization failure")
            || message.contains("database is locked")
        {
            return Error::Contention(error.to_string());
        }
    }

    Error::Connection(error.to_string())
}
