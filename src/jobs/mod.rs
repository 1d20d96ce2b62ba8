/// Background work
///
/// - Job queue for notification fan-out and mail sends (fire-and-forget)
/// - Mail transports
/// - Cron-driven maintenance that purges expired soft-deleted records

pub mod mailer;
pub mod queue;
pub mod scheduler;

pub use mailer::{mailer_from_config, FileMailer, LogMailer, Mail, Mailer};
pub use queue::{Job, JobProcessor, JobQueue};
pub use scheduler::{prune_deleted, MaintenanceScheduler, PruneReport};
