/// Outgoing mail transports
use crate::config::{MailConfig, MailTransport};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// A plain-text mail message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    async fn send(&self, mail: &Mail) -> Result<()>;
}

/// Writes mail to the tracing log
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &Mail) -> Result<()> {
        tracing::info!(
            from = %self.from,
            to = %mail.to,
            subject = %mail.subject,
            "📧 Mail sent"
        );
        tracing::debug!("📧 Mail body:\n{}", mail.body);
        Ok(())
    }
}

/// Drops each mail as an .eml file into a directory
#[derive(Debug, Clone)]
pub struct FileMailer {
    dir: PathBuf,
    from: String,
}

impl FileMailer {
    pub fn new(dir: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        Self { dir: dir.into(), from: from.into() }
    }

    fn render(&self, mail: &Mail) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
            self.from,
            mail.to,
            mail.subject,
            chrono::Utc::now().to_rfc2822(),
            mail.body
        )
    }
}

#[async_trait]
impl Mailer for FileMailer {
    async fn send(&self, mail: &Mail) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = format!(
            "{}-{}.eml",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f"),
            uuid::Uuid::new_v4()
        );
        let path = self.dir.join(name);
        tokio::fs::write(&path, self.render(mail)).await?;

        tracing::info!("📧 Mail to {} written to {}", mail.to, path.display());
        Ok(())
    }
}

/// Build the configured transport
pub fn mailer_from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match config.transport {
        MailTransport::Log => Arc::new(LogMailer::new(config.from.clone())),
        MailTransport::File => Arc::new(FileMailer::new(config.dir.clone(), config.from.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_mailer_writes_eml() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = FileMailer::new(dir.path().join("out"), "vault <noreply@test>");

        let mail = Mail {
            to: "ada@example.com".to_string(),
            subject: "Hello".to_string(),
            body: "Welcome aboard".to_string(),
        };
        mailer.send(&mail).await.unwrap();

        let mut entries = std::fs::read_dir(dir.path().join("out")).unwrap();
        let path = entries.next().unwrap().unwrap().path();
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("To: ada@example.com"));
        assert!(contents.contains("Subject: Hello"));
        assert!(contents.ends_with("Welcome aboard\r\n"));
    }
}
