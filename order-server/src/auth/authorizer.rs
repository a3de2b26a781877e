//! Staff authorization: "may this caller act on restaurant X?"

use async_trait::async_trait;
use std::sync::Arc;

use super::CurrentUser;
use crate::directory::Directory;

#[async_trait]
pub trait StaffAuthorizer: Send + Sync {
    /// True when `user` is a platform admin or staff of `restaurant_id`
    async fn is_staff(&self, user: &CurrentUser, restaurant_id: &str) -> bool;
}

/// Resolves ownership through the [`Directory`]
///
/// Admins pass for every restaurant. Otherwise the caller must be the
/// restaurant owner or appear in its staff list; unknown restaurants deny.
pub struct DirectoryAuthorizer {
    directory: Arc<dyn Directory>,
}

impl DirectoryAuthorizer {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl StaffAuthorizer for DirectoryAuthorizer {
    async fn is_staff(&self, user: &CurrentUser, restaurant_id: &str) -> bool {
        if user.is_admin() {
            return true;
        }
        self.directory
            .restaurant(restaurant_id)
            .is_some_and(|r| r.is_staff(&user.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{ROLE_ADMIN, ROLE_STAFF};
    use crate::directory::{InMemoryDirectory, Restaurant};

    fn user(id: &str, role: &str) -> CurrentUser {
        CurrentUser {
            id: id.to_string(),
            username: id.to_string(),
            role: role.to_string(),
        }
    }

    fn authorizer() -> DirectoryAuthorizer {
        let directory = InMemoryDirectory::new();
        directory.upsert_restaurant(Restaurant {
            id: "r1".to_string(),
            name: "Bistro".to_string(),
            address: String::new(),
            owner_id: "owner".to_string(),
            staff_ids: vec!["waiter".to_string()],
        });
        DirectoryAuthorizer::new(Arc::new(directory))
    }

    #[tokio::test]
    async fn test_owner_and_staff_pass() {
        let auth = authorizer();
        assert!(auth.is_staff(&user("owner", ROLE_STAFF), "r1").await);
        assert!(auth.is_staff(&user("waiter", ROLE_STAFF), "r1").await);
    }

    #[tokio::test]
    async fn test_stranger_and_unknown_restaurant_denied() {
        let auth = authorizer();
        assert!(!auth.is_staff(&user("stranger", ROLE_STAFF), "r1").await);
        assert!(!auth.is_staff(&user("owner", ROLE_STAFF), "r2").await);
    }

    #[tokio::test]
    async fn test_admin_passes_everywhere() {
        let auth = authorizer();
        assert!(auth.is_staff(&user("root", ROLE_ADMIN), "r1").await);
        assert!(auth.is_staff(&user("root", ROLE_ADMIN), "unknown").await);
    }
}
