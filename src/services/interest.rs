//! Who should hear about a release.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db::models::InterestedUserRow;
use crate::db::InterestRepository;
use crate::error::AppResult;
use crate::services::fanout::{InterestedUser, PreferencesInput, QuietHoursInput};

/// Resolves the users interested in an event.
#[async_trait]
pub trait InterestSource: Send + Sync + 'static {
    async fn interested_users(&self, event_id: &str) -> AppResult<Vec<InterestedUser>>;
}

/// Users who marked themselves `going` or `interested` for the event.
#[derive(Clone)]
pub struct AttendanceInterestSource {
    pool: SqlitePool,
}

impl AttendanceInterestSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InterestSource for AttendanceInterestSource {
    async fn interested_users(&self, event_id: &str) -> AppResult<Vec<InterestedUser>> {
        let rows = InterestRepository::find_interested_users(&self.pool, event_id).await?;
        Ok(rows.into_iter().map(InterestedUser::from).collect())
    }
}

impl From<InterestedUserRow> for InterestedUser {
    fn from(row: InterestedUserRow) -> Self {
        let quiet_hours = match (row.quiet_start, row.quiet_end) {
            (Some(start), Some(end)) => Some(QuietHoursInput { start, end }),
            _ => None,
        };

        // Unreadable stored channels fall back to the subject defaults.
        let channels = row.channels_json.as_deref().and_then(|raw| {
            serde_json::from_str::<Vec<String>>(raw)
                .map_err(|e| {
                    tracing::warn!(
                        "Ignoring unreadable channel preferences of user {}: {}",
                        row.user_id,
                        e
                    );
                })
                .ok()
        });

        InterestedUser {
            preferences: PreferencesInput {
                enabled: row.enabled,
                advance_notice_hours: row.advance_notice_hours,
                quiet_hours,
                channels,
                calendar_sync: row.calendar_sync,
            },
            user_id: row.user_id,
        }
    }
}
