//! Outbound notifications: mailer abstraction, provider credentials, and
//! the status email sweep

pub mod credentials;
pub mod mailer;
pub mod scheduler;

pub use credentials::{
    CachedCredentialProvider, CredentialProvider, HttpTokenFetcher, StaticCredentials,
};
pub use mailer::{EmailMessage, HttpMailer, Mailer, MailerError, NoopMailer};
pub use scheduler::{SchedulerConfig, StatusEmailScheduler, SweepStats};
