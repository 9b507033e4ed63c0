//! Send-eligibility policy.
//!
//! Decides whether a due notification may fire at a given instant. Pure and
//! synchronous so the scheduler can evaluate it for a whole batch before
//! touching the store.

use chrono::{DateTime, Timelike, Utc};

use crate::db::models::{NotificationStatus, ReleaseNotification};

/// Why an entry is not sent right now. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    NotScheduled,
    Disabled,
    NotDue,
    QuietHours,
}

impl Ineligible {
    pub fn as_str(self) -> &'static str {
        match self {
            Ineligible::NotScheduled => "not scheduled",
            Ineligible::Disabled => "notifications disabled by user",
            Ineligible::NotDue => "not due yet",
            Ineligible::QuietHours => "inside quiet hours",
        }
    }
}

/// Evaluate the policy, returning the first rule that blocks the send.
pub fn check(entry: &ReleaseNotification, now: DateTime<Utc>) -> Result<(), Ineligible> {
    if entry.status != NotificationStatus::Scheduled {
        return Err(Ineligible::NotScheduled);
    }

    let prefs = &entry.user_preferences;
    if !prefs.enabled {
        return Err(Ineligible::Disabled);
    }

    if now < entry.scheduled_time {
        return Err(Ineligible::NotDue);
    }

    if let Some(quiet) = prefs.quiet_hours {
        if quiet.contains(now.hour()) {
            return Err(Ineligible::QuietHours);
        }
    }

    Ok(())
}

pub fn should_send(entry: &ReleaseNotification, now: DateTime<Utc>) -> bool {
    check(entry, now).is_ok()
}
