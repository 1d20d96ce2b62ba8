/// Registration, tokens and notification inbox
use crate::auth::generate_token;
use crate::error::{AppError, AppResult};
use crate::jobs::Mail;
use crate::marketplace::{Notification, NotificationKind, Project, User, UserRole};
use crate::quota::QuotaOverrides;
use crate::services::Marketplace;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub email: String,
}

/// A freshly registered user and the only copy of their plaintext token
#[derive(Debug, Clone, Serialize)]
pub struct Registered {
    pub user: User,
    pub token: String,
}

fn validate_username(username: &str) -> AppResult<()> {
    let length = username.chars().count();
    if !(3..=32).contains(&length) {
        return Err(AppError::validation("username must be 3 to 32 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::validation(
            "username may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> AppResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && email.len() <= 254 => Ok(()),
        _ => Err(AppError::validation("email address is invalid")),
    }
}

impl Marketplace {
    /// Create an account; the very first account becomes an administrator
    pub async fn register(&self, request: RegisterUser) -> AppResult<Registered> {
        let username = request.username.trim().to_string();
        let email = request.email.trim().to_lowercase();
        validate_username(&username)?;
        validate_email(&email)?;

        if self.users.identity_taken(&username, &email).await? {
            return Err(AppError::conflict("username or email already registered"));
        }

        let role = if self.users.count().await? == 0 {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let (token, token_hash) = generate_token();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            email,
            role,
            token_hash,
            banned_at: None,
            ban_reason: None,
            quota: QuotaOverrides::default(),
            created_at: Utc::now(),
        };
        self.users.insert(&user).await?;

        tracing::info!("👤 Registered user {} ({:?})", user.username, user.role);

        self.notify_users(
            vec![user.id.clone()],
            None,
            NotificationKind::Welcome,
            json!({ "message": format!("Welcome, {}!", user.username) }),
        )
        .await;

        Ok(Registered { user, token })
    }

    /// Replace the user's token; the old one stops working immediately
    pub async fn rotate_token(&self, user: &User) -> AppResult<String> {
        let (token, token_hash) = generate_token();
        self.users.set_token_hash(&user.id, &token_hash).await?;
        tracing::info!("🔑 Rotated API token of {}", user.username);

        self.jobs
            .mail(Mail {
                to: user.email.clone(),
                subject: "Your modvault API token was replaced".to_string(),
                body: format!(
                    "Hi {},\n\nA new API token was issued for your account and the previous one no longer works.\n\
                     If you did not do this, rotate your token again and contact an administrator.\n",
                    user.username
                ),
            })
            .await;

        Ok(token)
    }

    /// Live projects the user is an accepted member of
    pub async fn my_projects(&self, user: &User) -> AppResult<Vec<Project>> {
        Ok(self.projects.for_member(&user.id).await?)
    }

    pub async fn notifications(&self, user: &User, unread_only: bool) -> AppResult<Vec<Notification>> {
        Ok(self.notifications.list(&user.id, unread_only).await?)
    }

    pub async fn mark_notification_read(&self, user: &User, id: &str) -> AppResult<()> {
        if !self.notifications.mark_read(&user.id, id, Utc::now()).await? {
            return Err(AppError::not_found(format!("notification '{}'", id)));
        }
        Ok(())
    }

    pub async fn mark_all_notifications_read(&self, user: &User) -> AppResult<u64> {
        Ok(self.notifications.mark_all_read(&user.id, Utc::now()).await?)
    }

    pub(crate) async fn user_by_name(&self, username: &str) -> AppResult<User> {
        self.users
            .by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user '{}'", username)))
    }
}
