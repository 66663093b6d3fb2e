use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Hands out wall-clock timestamps in the archive's configured time zone.
/// All folder, bucket and filename math works on these local times.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveClock {
    tz: Tz,
}

impl ArchiveClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> NaiveDateTime {
        self.localize(Utc::now())
    }

    pub fn localize(&self, instant: chrono::DateTime<Utc>) -> NaiveDateTime {
        self.tz.from_utc_datetime(&instant.naive_utc()).naive_local()
    }
}

impl Default for ArchiveClock {
    fn default() -> Self {
        Self::new(chrono_tz::UTC)
    }
}
