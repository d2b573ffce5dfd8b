use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    expires_at: Instant,
}

/// Toasts currently on screen; each one expires on its own.
#[derive(Debug, Clone)]
pub struct Notifications {
    toasts: Vec<Toast>,
    next_id: u64,
    duration: Duration,
}

impl Notifications {
    pub fn new(duration: Duration) -> Self {
        Notifications {
            toasts: Vec::new(),
            next_id: 0,
            duration,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>, severity: Severity) -> u64 {
        self.notify_at(message, severity, Instant::now())
    }

    pub fn notify_at(&mut self, message: impl Into<String>, severity: Severity, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let message = message.into();
        match severity {
            Severity::Error => tracing::warn!(%message, "error notification"),
            _ => tracing::debug!(?severity, %message, "notification"),
        }

        self.toasts.push(Toast {
            id,
            message,
            severity,
            expires_at: now + self.duration,
        });
        id
    }

    pub fn dismiss(&mut self, id: u64) {
        self.toasts.retain(|t| t.id != id);
    }

    pub fn expire(&mut self, now: Instant) {
        self.toasts.retain(|t| t.expires_at > now);
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    #[allow(dead_code)]
    pub fn count(&self, severity: Severity) -> usize {
        self.toasts.iter().filter(|t| t.severity == severity).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toasts_coexist_and_expire_independently() {
        let start = Instant::now();
        let mut notifications = Notifications::new(Duration::from_millis(100));

        notifications.notify_at("first", Severity::Info, start);
        notifications.notify_at("second", Severity::Error, start + Duration::from_millis(50));
        assert_eq!(notifications.toasts().len(), 2);

        notifications.expire(start + Duration::from_millis(120));
        assert_eq!(notifications.toasts().len(), 1);
        assert_eq!(notifications.toasts()[0].message, "second");

        notifications.expire(start + Duration::from_millis(200));
        assert!(notifications.is_empty());
    }

    #[test]
    fn test_dismiss_removes_only_that_toast() {
        let mut notifications = Notifications::new(Duration::from_secs(5));
        let a = notifications.notify("a", Severity::Warning);
        let b = notifications.notify("b", Severity::Success);
        assert_ne!(a, b);

        notifications.dismiss(a);
        assert_eq!(notifications.toasts().len(), 1);
        assert_eq!(notifications.toasts()[0].id, b);
        assert_eq!(notifications.count(Severity::Success), 1);
        assert_eq!(notifications.count(Severity::Warning), 0);
    }
}
