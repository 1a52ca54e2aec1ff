// ============================
// taskvault-backend/src/notify.rs
// ============================
//! Outbound notifications.
//!
//! Rendering lives here; delivery is behind [`Notifier`] so the transport
//! (SMTP relay, HTTP API, log) can be swapped without touching handlers.
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use tracing::{info, warn};

use crate::metrics::{MAIL_DELIVERED, MAIL_FAILED};
use crate::models::User;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Delivery abstraction used by the handlers.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message or return an error so the caller may retry.
    async fn deliver(&self, message: &Message) -> Result<()>;
}

/// Sender that logs the message instead of sending real email.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, message: &Message) -> Result<()> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            body = %message.text_body,
            "notification delivered to log"
        );
        Ok(())
    }
}

/// Try up to `attempts` times, returning the last error if all fail.
pub async fn deliver_with_retry(notifier: &dyn Notifier, message: &Message, attempts: u32) -> Result<()> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match notifier.deliver(message).await {
            Ok(()) => {
                counter!(MAIL_DELIVERED).increment(1);
                return Ok(());
            },
            Err(e) if attempt < attempts => {
                warn!(to = %message.to, attempt, error = %e, "delivery failed, retrying");
                attempt += 1;
            },
            Err(e) => {
                counter!(MAIL_FAILED).increment(1);
                warn!(to = %message.to, attempts, error = %e, "delivery failed");
                return Err(e);
            },
        }
    }
}

/// The activation email for `user`.
pub fn activation_message(from: &str, user: &User, code: u16, ttl: Duration) -> Message {
    let minutes = ttl.as_secs().div_ceil(60).max(1);
    let unit = if minutes == 1 { "minute" } else { "minutes" };
    let subject = "Activate your taskvault account".to_string();
    let text_body = format!(
        "Hi {name},\n\n\
         Your activation code is {code}.\n\n\
         Send it with PUT /v1/users/{id}/activation as {{\"code\": {code}}}.\n\
         The code expires in {minutes} {unit}.\n",
        name = user.name,
        id = user.id,
    );
    let html_body = format!(
        "<!doctype html>\n<html>\n<body>\n\
         <p>Hi {name},</p>\n\
         <p>Your activation code is <strong>{code}</strong>.</p>\n\
         <p>Send it with <code>PUT /v1/users/{id}/activation</code> as \
         <code>{{\"code\": {code}}}</code>.</p>\n\
         <p>The code expires in {minutes} {unit}.</p>\n\
         </body>\n</html>\n",
        name = escape_html(&user.name),
        id = user.id,
    );

    Message {
        from: from.to_string(),
        to: user.email.clone(),
        subject,
        text_body,
        html_body,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Notifier for Flaky {
        async fn deliver(&self, _message: &Message) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                anyhow::bail!("relay unavailable");
            }
            Ok(())
        }
    }

    fn user() -> User {
        User {
            id: 7,
            created_at: Utc::now(),
            name: "Ada <admin>".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            is_activated: false,
            version: 1,
        }
    }

    #[test]
    fn test_activation_message_contents() {
        let msg = activation_message("no-reply@taskvault.local", &user(), 4821, Duration::from_secs(60));
        assert_eq!(msg.to, "ada@example.com");
        assert!(msg.text_body.contains("4821"));
        assert!(msg.text_body.contains("/v1/users/7/activation"));
        assert!(msg.text_body.contains("1 minute."));
        assert!(msg.html_body.contains("<strong>4821</strong>"));
        assert!(msg.html_body.contains("Ada &lt;admin&gt;"));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let notifier = Flaky {
            failures_left: AtomicU32::new(2),
            calls: AtomicU32::new(0),
        };
        let msg = activation_message("a@b", &user(), 1, Duration::from_secs(60));
        deliver_with_retry(&notifier, &msg, 3).await.unwrap();
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_attempts() {
        let notifier = Flaky {
            failures_left: AtomicU32::new(10),
            calls: AtomicU32::new(0),
        };
        let msg = activation_message("a@b", &user(), 1, Duration::from_secs(60));
        let err = deliver_with_retry(&notifier, &msg, 3).await.unwrap_err();
        assert!(err.to_string().contains("relay unavailable"));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        let msg = activation_message("a@b", &user(), 1, Duration::from_secs(120));
        assert!(msg.text_body.contains("2 minutes"));
        assert!(LogNotifier.deliver(&msg).await.is_ok());
    }
}
