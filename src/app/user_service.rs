//! User management use cases.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, ChangePasswordRequest, CreateUserRequest, DatabaseError, ListQuery,
    MutationOutcome, NewUser, PageResult, PasswordHasher, UpdateUserRequest, User,
    UserRepository, UserResponse,
};

use super::listing::{self, ListParams};

fn project(user: &User) -> UserResponse {
    UserResponse::from(user)
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { users, hasher }
    }

    /// Lists users through the filter → sort → paginate pipeline.
    ///
    /// # Errors
    /// `Validation` for malformed or unknown `search`/`sort` fields.
    #[instrument(skip(self))]
    pub async fn get_users(&self, query: &ListQuery) -> Result<PageResult<UserResponse>, AppError> {
        let params = ListParams::try_from(query)?;
        let users = self.users.find_all().await?;
        Ok(listing::list(users, &params, project)?)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: &str) -> Result<Option<UserResponse>, AppError> {
        Ok(self.users.find_by_id(id).await?.as_ref().map(project))
    }

    /// Creates a user. `Ok(None)` means the store refused the write.
    ///
    /// # Errors
    /// `Validation` for a malformed request, `Duplicate` when the email is taken.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_user(
        &self,
        request: &CreateUserRequest,
    ) -> Result<Option<UserResponse>, AppError> {
        request.validate()?;

        if self.email_is_registered(&request.email).await? {
            return Err(email_taken(&request.email));
        }

        let new_user = NewUser {
            name: request.name.clone(),
            email: request.email.clone(),
            password_hash: self.hasher.hash(&request.password)?,
        };

        match self.users.create(&new_user).await {
            Ok(user) => {
                info!(user_id = %user.id, "User created");
                Ok(Some(project(&user)))
            }
            Err(AppError::Database(DatabaseError::Duplicate(_))) => {
                Err(email_taken(&request.email))
            }
            Err(e) => {
                warn!(error = %e, "Failed to create user");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, request))]
    pub async fn update_user(
        &self,
        id: &str,
        request: &UpdateUserRequest,
    ) -> Result<MutationOutcome, AppError> {
        request.validate()?;

        if self.users.find_by_id(id).await?.is_none() {
            return Ok(MutationOutcome::NotFound);
        }
        if let Some(owner) = self.users.find_by_email(&request.email).await?
            && owner.id != id
        {
            return Err(email_taken(&request.email));
        }

        match self
            .users
            .update_fields(id, &request.name, &request.email)
            .await
        {
            Ok(true) => Ok(MutationOutcome::Done),
            Ok(false) => Ok(MutationOutcome::Failed),
            Err(e) => {
                warn!(user_id = %id, error = %e, "Failed to update user");
                Ok(MutationOutcome::Failed)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: &str) -> Result<MutationOutcome, AppError> {
        if self.users.find_by_id(id).await?.is_none() {
            return Ok(MutationOutcome::NotFound);
        }

        match self.users.delete(id).await {
            Ok(true) => {
                info!(user_id = %id, "User deleted");
                Ok(MutationOutcome::Done)
            }
            Ok(false) => Ok(MutationOutcome::Failed),
            Err(e) => {
                warn!(user_id = %id, error = %e, "Failed to delete user");
                Ok(MutationOutcome::Failed)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn email_is_registered(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.users.find_by_email(email).await?.is_some())
    }

    /// Whether `password` matches the stored digest. Store errors propagate.
    #[instrument(skip(self, password))]
    pub async fn check_password(&self, id: &str, password: &str) -> Result<bool, AppError> {
        let user = self.users.find_by_id(id).await?;
        Ok(user.is_some_and(|u| self.hasher.matches(password, &u.password)))
    }

    /// Replaces the password after verifying the old one.
    ///
    /// # Errors
    /// `InvalidCredentials` when `password_old` is wrong. Store errors propagate.
    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        id: &str,
        request: &ChangePasswordRequest,
    ) -> Result<MutationOutcome, AppError> {
        request.validate()?;

        if self.users.find_by_id(id).await?.is_none() {
            return Ok(MutationOutcome::NotFound);
        }
        if !self.check_password(id, &request.password_old).await? {
            return Err(AppError::InvalidCredentials("Wrong password".to_string()));
        }

        let digest = self.hasher.hash(&request.password_new)?;
        if !self.users.update_password(id, &digest).await? {
            return Ok(MutationOutcome::Failed);
        }

        info!(user_id = %id, "Password changed");
        Ok(MutationOutcome::Done)
    }
}

fn email_taken(email: &str) -> AppError {
    AppError::Database(DatabaseError::Duplicate(format!(
        "Email {email} is already registered"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockConfig, MockPasswordHasher, MockUserRepository};

    fn service(users: &Arc<MockUserRepository>) -> UserService {
        UserService::new(users.clone(), Arc::new(MockPasswordHasher::new()))
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let users = Arc::new(MockUserRepository::new());
        let service = service(&users);

        let created = service
            .create_user(&CreateUserRequest::new("Anna", "anna@example.com", "secret123"))
            .await
            .unwrap()
            .unwrap();
        let fetched = service.get_user(&created.id).await.unwrap().unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.name, "Anna");
        assert_eq!(fetched.email, "anna@example.com");
        let json = serde_json::to_value(&fetched).unwrap();
        assert!(json.get("password").is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_registered_email() {
        let users = Arc::new(MockUserRepository::new());
        users.seed("Anna", "anna@example.com", "secret123");

        let err = service(&users)
            .create_user(&CreateUserRequest::new("Other", "ANNA@example.com", "secret123"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Database(DatabaseError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_create_store_failure_is_sentinel() {
        let users = Arc::new(MockUserRepository::with_config(MockConfig::failing_writes()));

        let result = service(&users)
            .create_user(&CreateUserRequest::new("Anna", "anna@example.com", "secret123"))
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_password_mismatch() {
        let users = Arc::new(MockUserRepository::new());
        let mut request = CreateUserRequest::new("Anna", "anna@example.com", "secret123");
        request.password_confirm = "secret124".to_string();

        let err = service(&users).create_user(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_mutations_on_missing_user_report_not_found() {
        let users = Arc::new(MockUserRepository::new());
        let service = service(&users);
        let update = UpdateUserRequest {
            name: "X".to_string(),
            email: "x@example.com".to_string(),
        };
        let change = ChangePasswordRequest {
            password_old: "secret123".to_string(),
            password_new: "secret456".to_string(),
            password_confirm: "secret456".to_string(),
        };

        assert_eq!(
            service.update_user("missing", &update).await.unwrap(),
            MutationOutcome::NotFound
        );
        assert_eq!(
            service.delete_user("missing").await.unwrap(),
            MutationOutcome::NotFound
        );
        assert_eq!(
            service.change_password("missing", &change).await.unwrap(),
            MutationOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_update_and_delete_store_failures_are_sentinels() {
        let users = Arc::new(MockUserRepository::with_config(MockConfig::failing_writes()));
        let id = users.seed("Anna", "anna@example.com", "secret123");
        let service = service(&users);
        let update = UpdateUserRequest {
            name: "Anne".to_string(),
            email: "anna@example.com".to_string(),
        };

        assert_eq!(
            service.update_user(&id, &update).await.unwrap(),
            MutationOutcome::Failed
        );
        assert_eq!(
            service.delete_user(&id).await.unwrap(),
            MutationOutcome::Failed
        );
    }

    #[tokio::test]
    async fn test_update_rejects_email_of_another_user() {
        let users = Arc::new(MockUserRepository::new());
        let anna = users.seed("Anna", "anna@example.com", "secret123");
        users.seed("Bob", "bob@example.com", "secret123");

        let err = service(&users)
            .update_user(
                &anna,
                &UpdateUserRequest {
                    name: "Anna".to_string(),
                    email: "bob@example.com".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Database(DatabaseError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password_flow() {
        let users = Arc::new(MockUserRepository::new());
        let id = users.seed("Anna", "anna@example.com", "secret123");
        let service = service(&users);

        let wrong_old = ChangePasswordRequest {
            password_old: "nope-nope".to_string(),
            password_new: "secret456".to_string(),
            password_confirm: "secret456".to_string(),
        };
        assert!(matches!(
            service.change_password(&id, &wrong_old).await,
            Err(AppError::InvalidCredentials(_))
        ));

        let ok = ChangePasswordRequest {
            password_old: "secret123".to_string(),
            ..wrong_old
        };
        assert_eq!(
            service.change_password(&id, &ok).await.unwrap(),
            MutationOutcome::Done
        );
        assert!(service.check_password(&id, "secret456").await.unwrap());
        assert!(!service.check_password(&id, "secret123").await.unwrap());
    }

    #[tokio::test]
    async fn test_check_password_propagates_store_errors() {
        let users = Arc::new(MockUserRepository::with_config(MockConfig::failure(
            "connection reset",
        )));

        let result = service(&users).check_password("any", "secret123").await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_get_users_filters_sorts_and_paginates() {
        let users = Arc::new(MockUserRepository::new());
        users.seed("Dave", "dave@test.io", "secret123");
        users.seed("alice", "alice@test.io", "secret123");
        users.seed("Eve", "eve@example.com", "secret123");
        users.seed("Carol", "carol@test.io", "secret123");
        users.seed("bob", "bob@example.com", "secret123");

        let query = ListQuery {
            page_number: 1,
            page_size: 2,
            search: Some("email:test".to_string()),
            sort: Some("name:asc".to_string()),
        };
        let page = service(&users).get_users(&query).await.unwrap();

        assert_eq!(page.page_number, 1);
        assert_eq!(page.page_size, 2);
        assert_eq!(page.count, 3);
        assert_eq!(page.total_pages, 2);
        assert!(page.has_next_page);
        assert!(!page.has_previous_page);
        let names: Vec<_> = page.data.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "Carol"]);
    }

    #[tokio::test]
    async fn test_get_users_unknown_field_is_validation_error() {
        let users = Arc::new(MockUserRepository::new());
        let query = ListQuery {
            search: Some("password:x".to_string()),
            ..ListQuery::default()
        };

        let err = service(&users).get_users(&query).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
