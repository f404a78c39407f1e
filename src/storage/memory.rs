//! Memory storage
//!
//! Will be destroyed on system shutdown

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use tokio::sync::Mutex;

use crate::clicks::ClickEvent;
use crate::keywords::Keyword;
use crate::links::Link;
use crate::owners::Owner;
use crate::owners::Share;
use crate::tags::Tag;
use crate::users::User;

use super::CreateKeywordValues;
use super::CreateLinkValues;
use super::CreateUserValues;
use super::Result;
use super::Storage;
use super::UpdateLinkValues;

/// An in-memory storage
///
/// Will be destroyed on system shutdown
#[derive(Clone, Default)]
pub struct Memory {
    /// All users in storage
    users: Arc<Mutex<HashMap<Uuid, User>>>,

    /// All links in storage
    links: Arc<Mutex<HashMap<Uuid, Link>>>,

    /// Owner rows, keyed by (link, user)
    owners: Arc<Mutex<HashMap<(Uuid, Uuid), Owner>>>,

    /// Share grants, keyed by (link, user)
    shares: Arc<Mutex<HashMap<(Uuid, Uuid), Share>>>,

    /// All keywords in storage
    keywords: Arc<Mutex<HashMap<Uuid, Keyword>>>,

    /// All tags in storage
    tags: Arc<Mutex<HashMap<Uuid, Tag>>>,

    /// Tag attachments, as (link, tag) pairs
    link_tags: Arc<Mutex<HashSet<(Uuid, Uuid)>>>,

    /// Recorded clicks, append-only
    clicks: Arc<Mutex<Vec<ClickEvent>>>,
}

impl Memory {
    /// Create a new empty Memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded clicks, for tests
    #[cfg(test)]
    pub async fn click_count(&self) -> usize {
        self.clicks.lock().await.len()
    }
}

#[async_trait]
impl Storage for Memory {
    async fn find_any_single_user(&self) -> Result<Option<User>> {
        Ok(self.users.lock().await.values().next().cloned())
    }

    async fn find_single_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_single_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(id).cloned())
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            session_id: *values.session_id,
            username: values.username.to_string(),
            hashed_password: values.hashed_password.to_string(),
            role: values.role,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        };

        self.users.lock().await.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_all_links(&self) -> Result<Vec<Link>> {
        let mut links = self
            .links
            .lock()
            .await
            .values()
            .cloned()
            .collect::<Vec<Link>>();

        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(links)
    }

    async fn find_single_link_by_slug(&self, slug: &str) -> Result<Option<Link>> {
        Ok(self
            .links
            .lock()
            .await
            .values()
            .find(|link| link.slug == slug)
            .cloned())
    }

    async fn find_single_link_by_id(&self, id: &Uuid) -> Result<Option<Link>> {
        Ok(self.links.lock().await.get(id).cloned())
    }

    async fn create_link(&self, values: &CreateLinkValues) -> Result<Link> {
        let link = Link {
            id: Uuid::new_v4(),
            slug: values.slug.to_string(),
            url_template: values.url_template.to_string(),
            title: values.title.map(ToString::to_string),
            description: values.description.map(ToString::to_string),
            visibility: values.visibility,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        };

        let owner = Owner {
            link_id: link.id,
            user_id: values.user.id,
            is_primary: true,
            created_at: Utc::now().naive_utc(),
        };

        // both locks held so the link never exists without its primary owner
        let mut links = self.links.lock().await;
        let mut owners = self.owners.lock().await;

        links.insert(link.id, link.clone());
        owners.insert((link.id, owner.user_id), owner);

        Ok(link)
    }

    async fn update_link(&self, link: &Link, values: &UpdateLinkValues) -> Result<Link> {
        Ok(self
            .links
            .lock()
            .await
            .get_mut(&link.id)
            .map(|link| {
                if let Some(url_template) = values.url_template {
                    link.url_template = url_template.to_string();
                }

                if let Some(title) = values.title {
                    link.title = Some(title.to_string());
                }

                if let Some(description) = values.description {
                    link.description = Some(description.to_string());
                }

                if let Some(visibility) = values.visibility {
                    link.visibility = visibility;
                }

                link.updated_at = Utc::now().naive_utc();

                link.clone()
            })
            .expect("HashMap is the source of the link"))
    }

    async fn delete_link(&self, link: &Link) -> Result<()> {
        self.links.lock().await.remove(&link.id);

        self.owners
            .lock()
            .await
            .retain(|(link_id, _), _| link_id != &link.id);

        self.shares
            .lock()
            .await
            .retain(|(link_id, _), _| link_id != &link.id);

        self.link_tags
            .lock()
            .await
            .retain(|(link_id, _)| link_id != &link.id);

        Ok(())
    }

    async fn find_owners_by_link(&self, link: &Link) -> Result<Vec<Owner>> {
        let mut owners = self
            .owners
            .lock()
            .await
            .values()
            .filter(|owner| owner.link_id == link.id)
            .cloned()
            .collect::<Vec<Owner>>();

        owners.sort_by(|a, b| b.is_primary.cmp(&a.is_primary));

        Ok(owners)
    }

    async fn is_owner(&self, link_id: &Uuid, user_id: &Uuid) -> Result<bool> {
        Ok(self
            .owners
            .lock()
            .await
            .contains_key(&(*link_id, *user_id)))
    }

    async fn add_owner(&self, link: &Link, user: &User) -> Result<()> {
        self.owners
            .lock()
            .await
            .entry((link.id, user.id))
            .or_insert_with(|| Owner {
                link_id: link.id,
                user_id: user.id,
                is_primary: false,
                created_at: Utc::now().naive_utc(),
            });

        Ok(())
    }

    async fn remove_owner(&self, link: &Link, user_id: &Uuid) -> Result<bool> {
        let mut owners = self.owners.lock().await;

        match owners.get(&(link.id, *user_id)) {
            Some(owner) if !owner.is_primary => {
                owners.remove(&(link.id, *user_id));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_shares_by_link(&self, link: &Link) -> Result<Vec<Share>> {
        Ok(self
            .shares
            .lock()
            .await
            .values()
            .filter(|share| share.link_id == link.id)
            .cloned()
            .collect())
    }

    async fn has_share(&self, link_id: &Uuid, user_id: &Uuid) -> Result<bool> {
        Ok(self
            .shares
            .lock()
            .await
            .contains_key(&(*link_id, *user_id)))
    }

    async fn add_share(&self, link: &Link, user_id: &Uuid, shared_by: &User) -> Result<()> {
        self.shares
            .lock()
            .await
            .entry((link.id, *user_id))
            .or_insert_with(|| Share {
                link_id: link.id,
                user_id: *user_id,
                shared_by: shared_by.id,
                created_at: Utc::now().naive_utc(),
            });

        Ok(())
    }

    async fn remove_share(&self, link: &Link, user_id: &Uuid) -> Result<bool> {
        Ok(self.shares.lock().await.remove(&(link.id, *user_id)).is_some())
    }

    async fn find_all_keywords(&self) -> Result<Vec<Keyword>> {
        let mut keywords = self
            .keywords
            .lock()
            .await
            .values()
            .cloned()
            .collect::<Vec<Keyword>>();

        keywords.sort_by(|a, b| a.keyword.cmp(&b.keyword));

        Ok(keywords)
    }

    async fn find_single_keyword_by_keyword(&self, keyword: &str) -> Result<Option<Keyword>> {
        Ok(self
            .keywords
            .lock()
            .await
            .values()
            .find(|candidate| candidate.keyword == keyword)
            .cloned())
    }

    async fn create_keyword(&self, values: &CreateKeywordValues) -> Result<Keyword> {
        let keyword = Keyword {
            id: Uuid::new_v4(),
            keyword: values.keyword.to_string(),
            url_template: values.url_template.to_string(),
            description: values.description.map(ToString::to_string),
            created_at: Utc::now().naive_utc(),
        };

        self.keywords.lock().await.insert(keyword.id, keyword.clone());

        Ok(keyword)
    }

    async fn delete_keyword(&self, keyword: &Keyword) -> Result<()> {
        self.keywords.lock().await.remove(&keyword.id);

        Ok(())
    }

    async fn find_tags_by_link(&self, link: &Link) -> Result<Vec<Tag>> {
        // lock order: always tags before link_tags
        let tags = self.tags.lock().await;
        let link_tags = self.link_tags.lock().await;

        let mut tags = tags
            .values()
            .filter(|tag| link_tags.contains(&(link.id, tag.id)))
            .cloned()
            .collect::<Vec<Tag>>();

        tags.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(tags)
    }

    async fn set_link_tags(&self, link: &Link, names: &[String]) -> Result<Vec<Tag>> {
        // lock order: always tags before link_tags
        let mut tags = self.tags.lock().await;
        let mut link_tags = self.link_tags.lock().await;

        link_tags.retain(|(link_id, _)| link_id != &link.id);

        let mut attached = Vec::with_capacity(names.len());

        for name in names {
            let tag = tags
                .values()
                .find(|tag| &tag.name == name)
                .cloned()
                .unwrap_or_else(|| {
                    let tag = Tag {
                        id: Uuid::new_v4(),
                        name: name.clone(),
                        created_at: Utc::now().naive_utc(),
                    };

                    tags.insert(tag.id, tag.clone());

                    tag
                });

            link_tags.insert((link.id, tag.id));
            attached.push(tag);
        }

        Ok(attached)
    }

    async fn record_click(&self, event: &ClickEvent) -> Result<()> {
        self.clicks.lock().await.push(event.clone());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use crate::links::Visibility;
    use crate::users::Role;

    use super::*;

    async fn seeded_link(storage: &Memory) -> Link {
        let session_id = Uuid::new_v4();

        let user = storage
            .create_user(&CreateUserValues {
                session_id: &session_id,
                role: Role::Member,
                username: "joe",
                hashed_password: "unused",
            })
            .await
            .unwrap();

        storage
            .create_link(&CreateLinkValues {
                user: &user,
                slug: "wiki",
                url_template: "https://wiki.example.com/",
                title: None,
                description: None,
                visibility: Visibility::Public,
            })
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tag_reads_and_writes_make_progress() {
        let storage = Memory::new();
        let link = seeded_link(&storage).await;

        let writer = {
            let storage = storage.clone();
            let link = link.clone();

            tokio::spawn(async move {
                for round in 0..500 {
                    let names = vec![format!("tag-{}", round % 5)];

                    storage.set_link_tags(&link, &names).await.unwrap();
                }
            })
        };

        let reader = {
            let storage = storage.clone();
            let link = link.clone();

            tokio::spawn(async move {
                for _ in 0..500 {
                    storage.find_tags_by_link(&link).await.unwrap();
                }
            })
        };

        timeout(Duration::from_secs(10), async {
            writer.await.unwrap();
            reader.await.unwrap();
        })
        .await
        .expect("tag reads and writes should never block each other");
    }

    #[tokio::test]
    async fn test_set_link_tags_replaces_the_whole_set() {
        let storage = Memory::new();
        let link = seeded_link(&storage).await;

        storage
            .set_link_tags(&link, &["docs".to_string(), "internal".to_string()])
            .await
            .unwrap();

        storage
            .set_link_tags(&link, &["docs".to_string()])
            .await
            .unwrap();

        let tags = storage.find_tags_by_link(&link).await.unwrap();

        assert_eq!(1, tags.len());
        assert_eq!("docs", tags[0].name);
    }
}
