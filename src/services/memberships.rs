/// Project membership management
///
/// Invitations create a pending membership that the invitee accepts or declines.
/// Every live project keeps exactly one primary member, always an accepted owner;
/// the primary can only change hands through a transfer.

use crate::error::{AppError, AppResult};
use crate::marketplace::{MemberRole, MemberView, Membership, NotificationKind, Project, User};
use crate::services::Marketplace;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
pub struct InviteRequest {
    pub username: String,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleChange {
    pub role: MemberRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub username: String,
}

impl Marketplace {
    pub async fn members(&self, slug: &str, viewer: Option<&User>) -> AppResult<Vec<MemberView>> {
        let (project, _) = self.visible_project(slug, viewer).await?;
        Ok(self.memberships.list(&project.id).await?)
    }

    pub async fn invite_member(&self, actor: &User, slug: &str, request: InviteRequest) -> AppResult<MemberView> {
        let (project, _) = self.project_with_role(slug, actor, MemberRole::Owner).await?;
        let invitee = self.user_by_name(&request.username).await?;

        if invitee.is_banned() {
            return Err(AppError::validation(format!("'{}' is suspended", invitee.username)));
        }
        if self.memberships.get(&project.id, &invitee.id).await?.is_some() {
            return Err(AppError::conflict(format!(
                "'{}' is already a member of '{}'",
                invitee.username, project.slug
            )));
        }

        let now = Utc::now();
        self.memberships
            .insert(&Membership {
                project_id: project.id.clone(),
                user_id: invitee.id.clone(),
                role: request.role,
                is_primary: false,
                accepted_at: None,
                invited_by: Some(actor.id.clone()),
                created_at: now,
            })
            .await?;

        tracing::info!(
            "✉️ {} invited {} to {} as {:?}",
            actor.username,
            invitee.username,
            project.slug,
            request.role
        );

        self.notify_users(
            vec![invitee.id.clone()],
            Some(actor),
            NotificationKind::MembershipInvite,
            json!({
                "project": project.slug,
                "role": request.role,
                "message": format!("{} invited you to join '{}'", actor.username, project.name),
            }),
        )
        .await;

        Ok(MemberView {
            user_id: invitee.id,
            username: invitee.username,
            role: request.role,
            is_primary: false,
            accepted_at: None,
        })
    }

    /// The actor's pending invitation to a live project
    async fn pending_invitation(&self, actor: &User, slug: &str) -> AppResult<(Project, Membership)> {
        let (project, membership) = self.visible_project(slug, Some(actor)).await?;
        match membership {
            Some(m) if !m.is_active() && !project.is_deleted() => Ok((project, m)),
            _ => Err(AppError::not_found(format!("invitation to '{}'", slug))),
        }
    }

    pub async fn accept_invitation(&self, actor: &User, slug: &str) -> AppResult<()> {
        let (project, _) = self.pending_invitation(actor, slug).await?;
        self.memberships.accept(&project.id, &actor.id, Utc::now()).await?;
        tracing::info!("🤝 {} joined {}", actor.username, project.slug);

        self.notify_maintainers(
            &project,
            Some(actor),
            NotificationKind::MembershipChanged,
            json!({
                "project": project.slug,
                "message": format!("{} joined '{}'", actor.username, project.name),
            }),
        )
        .await
    }

    pub async fn decline_invitation(&self, actor: &User, slug: &str) -> AppResult<()> {
        let (project, _) = self.pending_invitation(actor, slug).await?;
        self.memberships.delete(&project.id, &actor.id).await?;
        tracing::info!("🚫 {} declined the invitation to {}", actor.username, project.slug);
        Ok(())
    }

    /// Membership of `username` in the project, rejecting the primary member
    async fn non_primary_member(&self, project: &Project, username: &str) -> AppResult<(User, Membership)> {
        let user = self.user_by_name(username).await?;
        let membership = self
            .memberships
            .get(&project.id, &user.id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("member '{}' of '{}'", username, project.slug)))?;

        if membership.is_primary {
            return Err(AppError::conflict(
                "the primary owner cannot be changed this way; transfer the project first",
            ));
        }
        Ok((user, membership))
    }

    pub async fn change_member_role(
        &self,
        actor: &User,
        slug: &str,
        username: &str,
        role: MemberRole,
    ) -> AppResult<()> {
        let (project, _) = self.project_with_role(slug, actor, MemberRole::Owner).await?;
        let (member, membership) = self.non_primary_member(&project, username).await?;

        if membership.role == role {
            return Ok(());
        }
        self.memberships.set_role(&project.id, &member.id, role).await?;
        tracing::info!("🔧 {} set {} to {:?} on {}", actor.username, member.username, role, project.slug);

        self.notify_users(
            vec![member.id],
            Some(actor),
            NotificationKind::MembershipChanged,
            json!({
                "project": project.slug,
                "role": role,
                "message": format!("Your role on '{}' is now {:?}", project.name, role),
            }),
        )
        .await;
        Ok(())
    }

    pub async fn remove_member(&self, actor: &User, slug: &str, username: &str) -> AppResult<()> {
        let (project, _) = self.project_with_role(slug, actor, MemberRole::Owner).await?;
        let (member, _) = self.non_primary_member(&project, username).await?;

        self.memberships.delete(&project.id, &member.id).await?;
        tracing::info!("👋 {} removed {} from {}", actor.username, member.username, project.slug);

        self.notify_users(
            vec![member.id],
            Some(actor),
            NotificationKind::MembershipChanged,
            json!({
                "project": project.slug,
                "message": format!("You were removed from '{}'", project.name),
            }),
        )
        .await;
        Ok(())
    }

    pub async fn leave_project(&self, actor: &User, slug: &str) -> AppResult<()> {
        let (project, membership) = self.visible_project(slug, Some(actor)).await?;
        let membership = membership
            .filter(|m| m.is_active())
            .ok_or_else(|| AppError::not_found(format!("membership in '{}'", slug)))?;

        if membership.is_primary {
            return Err(AppError::conflict("the primary owner must transfer the project before leaving"));
        }

        self.memberships.delete(&project.id, &actor.id).await?;
        tracing::info!("👋 {} left {}", actor.username, project.slug);

        self.notify_maintainers(
            &project,
            Some(actor),
            NotificationKind::MembershipChanged,
            json!({
                "project": project.slug,
                "message": format!("{} left '{}'", actor.username, project.name),
            }),
        )
        .await
    }

    /// Hand the primary role to another accepted member; the previous primary stays an owner
    pub async fn transfer_project(&self, actor: &User, slug: &str, username: &str) -> AppResult<()> {
        let (project, membership) = self.project_with_role(slug, actor, MemberRole::Owner).await?;
        let is_primary = membership.as_ref().is_some_and(|m| m.is_primary);
        if !is_primary && !actor.is_admin() {
            return Err(AppError::forbidden("only the primary owner can transfer a project"));
        }

        let target = self.user_by_name(username).await?;
        let target_membership = self
            .memberships
            .get(&project.id, &target.id)
            .await?
            .filter(|m| m.is_active())
            .ok_or_else(|| AppError::validation(format!("'{}' is not an accepted member", username)))?;
        if target_membership.is_primary {
            return Ok(());
        }

        self.memberships.transfer_primary(&project.id, &target.id).await?;
        tracing::info!("🔁 {} transferred {} to {}", actor.username, project.slug, target.username);

        self.notify_users(
            vec![target.id],
            Some(actor),
            NotificationKind::MembershipChanged,
            json!({
                "project": project.slug,
                "message": format!("You are now the primary owner of '{}'", project.name),
            }),
        )
        .await;
        Ok(())
    }
}
