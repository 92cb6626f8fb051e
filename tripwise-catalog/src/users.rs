use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use tripwise_core::{CoreError, CoreResult};
use tripwise_shared::{Collection, Masked, User};
use tripwise_store::PersistenceGateway;

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    /// Caller-supplied id, generated if absent
    pub id: Option<String>,
    pub name: String,
    pub email: String,
}

#[derive(Clone)]
pub struct UserDirectory {
    gateway: PersistenceGateway,
}

impl UserDirectory {
    pub fn new(gateway: PersistenceGateway) -> Self {
        Self { gateway }
    }

    pub async fn register_user(&self, input: NewUser) -> CoreResult<User> {
        if input.name.trim().is_empty() || !input.email.contains('@') {
            return Err(CoreError::ValidationError("name and a valid email are required".to_string()));
        }
        let user = User {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: input.name,
            email: Masked(input.email),
            created_at: Utc::now(),
        };
        self.gateway
            .insert(Collection::Users, PersistenceGateway::to_record(&user)?)
            .await?;
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> CoreResult<User> {
        self.gateway
            .get_as::<User>(Collection::Users, user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {}", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tripwise_store::MemoryStore;

    #[tokio::test]
    async fn test_register_and_fetch() {
        let users = UserDirectory::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let user = users
            .register_user(NewUser { id: None, name: "Ana".into(), email: "ana@example.com".into() })
            .await
            .unwrap();

        let fetched = users.get_user(&user.id).await.unwrap();
        assert_eq!(fetched.email.expose(), "ana@example.com");
        assert_eq!(users.get_user("missing").await.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn test_rejects_bad_email() {
        let users = UserDirectory::new(PersistenceGateway::new(Arc::new(MemoryStore::new())));
        let err = users
            .register_user(NewUser { id: Some("u".into()), name: "Bo".into(), email: "nope".into() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation_failed");
    }
}
