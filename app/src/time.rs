use jiff::{Timestamp, tz::TimeZone};
use payloads::DateKey;
#[cfg(feature = "mock-time")]
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct TimeSource {
    #[cfg(feature = "mock-time")]
    time: Arc<Mutex<Timestamp>>,
}

impl TimeSource {
    #[allow(clippy::new_without_default)]
    #[cfg(not(feature = "mock-time"))]
    pub fn new() -> Self {
        Self {}
    }

    #[cfg(feature = "mock-time")]
    pub fn new(initial_time: Timestamp) -> Self {
        Self {
            time: Arc::new(Mutex::new(initial_time)),
        }
    }

    #[cfg(not(feature = "mock-time"))]
    pub fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    #[cfg(feature = "mock-time")]
    pub fn now(&self) -> Timestamp {
        match self.time.lock() {
            Ok(time) => *time,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    #[cfg(feature = "mock-time")]
    pub fn set(&self, time: Timestamp) {
        match self.time.lock() {
            Ok(mut guard) => *guard = time,
            Err(poisoned) => *poisoned.into_inner() = time,
        }
    }

    /// Today's date key in the car's time zone, or the device zone when the
    /// car has none (or an unknown one).
    pub fn today(&self, timezone: Option<&str>) -> DateKey {
        let now = self.now();
        let zoned = match timezone.map(|name| now.in_tz(name)) {
            Some(Ok(zoned)) => zoned,
            _ => now.to_zoned(TimeZone::system()),
        };
        DateKey::new(zoned.date())
    }
}
