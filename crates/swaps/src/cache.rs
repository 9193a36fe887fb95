use {
    std::time::Duration,
    tokio::{sync::Mutex, time::Instant},
};

/// A single-value cache refreshed only when its content is older than the
/// configured max age.
///
/// The async mutex is held across the refresh so concurrent triggers
/// collapse into one upstream call and every caller observes the refreshed
/// value.
pub struct StalenessCache<T> {
    max_age: Duration,
    slot: Mutex<Option<(T, Instant)>>,
}

impl<T: Clone> StalenessCache<T> {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached value, refreshing it through `fetch` if it is
    /// missing or stale. A failed refresh keeps the previous (stale) value
    /// in place for the next attempt and propagates the error.
    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some((value, fetched_at)) = slot.as_ref() {
            if fetched_at.elapsed() < self.max_age {
                return Ok(value.clone());
            }
        }
        let value = fetch().await?;
        *slot = Some((value.clone(), Instant::now()));
        Ok(value)
    }
}
