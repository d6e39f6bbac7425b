use time::OffsetDateTime;

/// Source du temps serveur (epoch secondes)
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Horloge réelle, UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// Horloge réglable pour les tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FixedClock(std::sync::atomic::AtomicI64);

#[cfg(test)]
impl FixedClock {
    pub fn at(ts: i64) -> Self {
        Self(std::sync::atomic::AtomicI64::new(ts))
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
