/// Background job queue
///
/// Handlers enqueue notification fan-out and mail sends and return immediately.
/// A single worker task drains a bounded channel; when the channel is full the job
/// is dropped and logged. The inline mode runs jobs on the caller's task instead.

use crate::jobs::mailer::{Mail, Mailer};
use crate::marketplace::{NotificationKind, NotificationStorage, UserStorage};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum Job {
    /// Store a notification for each user and mail them about it
    Notify {
        user_ids: Vec<String>,
        kind: NotificationKind,
        payload: Value,
    },
    /// Send one mail
    Mail(Mail),
}

impl Job {
    fn describe(&self) -> String {
        match self {
            Job::Notify { user_ids, kind, .. } => {
                format!("notify {:?} to {} user(s)", kind, user_ids.len())
            }
            Job::Mail(mail) => format!("mail '{}' to {}", mail.subject, mail.to),
        }
    }
}

/// Executes jobs against storage and the mail transport
#[derive(Debug)]
pub struct JobProcessor {
    notifications: NotificationStorage,
    users: UserStorage,
    mailer: Arc<dyn Mailer>,
}

impl JobProcessor {
    pub fn new(notifications: NotificationStorage, users: UserStorage, mailer: Arc<dyn Mailer>) -> Self {
        Self { notifications, users, mailer }
    }

    pub async fn process(&self, job: Job) -> Result<()> {
        tracing::debug!("⚙️ Processing job: {}", job.describe());

        match job {
            Job::Notify { mut user_ids, kind, payload } => {
                user_ids.sort();
                user_ids.dedup();

                let mut recipients = Vec::with_capacity(user_ids.len());
                for user_id in &user_ids {
                    match self.users.get(user_id).await? {
                        Some(user) => recipients.push(user),
                        None => tracing::warn!("⚠️ Skipping notification for unknown user {}", user_id),
                    }
                }
                if recipients.is_empty() {
                    return Ok(());
                }

                let ids: Vec<String> = recipients.iter().map(|u| u.id.clone()).collect();
                self.notifications
                    .insert_for(&ids, kind, &payload, chrono::Utc::now())
                    .await?;

                let body = render_body(kind, &payload);
                for user in recipients {
                    let mail = Mail {
                        to: user.email,
                        subject: kind.subject().to_string(),
                        body: body.clone(),
                    };
                    // One failed recipient must not stop the others
                    if let Err(e) = self.mailer.send(&mail).await {
                        tracing::warn!("⚠️ Failed to mail {} about {:?}: {}", mail.to, kind, e);
                    }
                }
            }
            Job::Mail(mail) => self.mailer.send(&mail).await?,
        }

        Ok(())
    }
}

fn render_body(kind: NotificationKind, payload: &Value) -> String {
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_else(|| kind.subject());

    match payload.get("project").and_then(Value::as_str) {
        Some(project) => format!("{}\n\nProject: {}\n", message, project),
        None => format!("{}\n", message),
    }
}

#[derive(Debug, Clone)]
enum Dispatch {
    Channel(mpsc::Sender<Job>),
    Inline(Arc<JobProcessor>),
}

/// Fire-and-forget entry point for background work
#[derive(Debug, Clone)]
pub struct JobQueue {
    dispatch: Dispatch,
}

impl JobQueue {
    pub const CAPACITY: usize = 1024;

    /// Start a worker task and return a queue feeding it
    pub fn spawn(processor: JobProcessor) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(Self::CAPACITY);

        tokio::spawn(async move {
            tracing::info!("🚀 Job worker started");
            while let Some(job) = rx.recv().await {
                let description = job.describe();
                if let Err(e) = processor.process(job).await {
                    tracing::error!("❌ Job failed ({}): {}", description, e);
                }
            }
            tracing::info!("⏹️ Job worker stopped");
        });

        Self { dispatch: Dispatch::Channel(tx) }
    }

    /// Run every job to completion on the caller's task
    pub fn inline(processor: JobProcessor) -> Self {
        Self { dispatch: Dispatch::Inline(Arc::new(processor)) }
    }

    pub async fn dispatch(&self, job: Job) {
        match &self.dispatch {
            Dispatch::Channel(tx) => {
                if let Err(e) = tx.try_send(job) {
                    let job = match e {
                        mpsc::error::TrySendError::Full(job) | mpsc::error::TrySendError::Closed(job) => job,
                    };
                    tracing::error!("❌ Job queue unavailable, dropping job: {}", job.describe());
                }
            }
            Dispatch::Inline(processor) => {
                let description = job.describe();
                if let Err(e) = processor.process(job).await {
                    tracing::error!("❌ Job failed ({}): {}", description, e);
                }
            }
        }
    }

    pub async fn notify(&self, user_ids: Vec<String>, kind: NotificationKind, payload: Value) {
        self.dispatch(Job::Notify { user_ids, kind, payload }).await;
    }

    pub async fn mail(&self, mail: Mail) {
        self.dispatch(Job::Mail(mail)).await;
    }
}
