//! Fixed daily trigger times in UTC.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Days, TimeZone, Utc};

/// Export hours, UTC.
pub const EXPORT_HOURS: [u32; 2] = [6, 18];

/// Fires on the hour at a fixed set of UTC hours every day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    hours: Vec<u32>,
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            hours: EXPORT_HOURS.to_vec(),
        }
    }
}

impl DailySchedule {
    /// `None` when `hours` is empty or holds a value outside `0..24`.
    pub fn at_hours(hours: impl IntoIterator<Item = u32>) -> Option<Self> {
        let mut hours: Vec<u32> = hours.into_iter().collect();
        if hours.is_empty() || hours.iter().any(|h| *h > 23) {
            return None;
        }
        hours.sort_unstable();
        hours.dedup();
        Some(Self { hours })
    }

    /// Cron form, for logs.
    pub fn crontab(&self) -> String {
        let hours: Vec<String> = self.hours.iter().map(|h| h.to_string()).collect();
        format!("0 {} * * *", hours.join(","))
    }

    /// First trigger strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        [Some(today), today.checked_add_days(Days::new(1))]
            .into_iter()
            .flatten()
            .flat_map(|day| self.hours.iter().filter_map(move |h| day.and_hms_opt(*h, 0, 0)))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .find(|at| *at > now)
    }

    /// Sleep until each trigger and run `job`, forever.
    pub async fn run<F, Fut>(&self, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        tracing::info!("started export schedule, crontab: {}", self.crontab());
        loop {
            let now = Utc::now();
            let Some(next) = self.next_after(now) else {
                tracing::error!("no next trigger time after {now}, stopping schedule");
                return;
            };
            tracing::info!("next export at {}", next.to_rfc3339());
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
            job().await;
        }
    }
}
