//! Notification and translation hooks injected into a chat session

use std::sync::Arc;

use tracing::{error, info};

/// Translation keys the chat core looks up
pub mod keys {
    pub const TIMED_OUT: &str = "assistant.chat.timedout";
    pub const ABORTED: &str = "assistant.chat.aborted";
}

/// Where user-facing notices go
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sends notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}

/// Looks up the display string for a translation key
pub type Translate = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// English strings; unknown keys come back unchanged.
pub fn default_translate() -> Translate {
    Arc::new(|key: &str| match key {
        keys::TIMED_OUT => "Response timed out. Please try again.".to_string(),
        keys::ABORTED => "Response stopped.".to_string(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_translate() {
        let t = default_translate();
        assert_eq!(t(keys::TIMED_OUT), "Response timed out. Please try again.");
        assert_eq!(t("some.missing.key"), "some.missing.key");
    }
}
