use std::time::Duration;
use tokio::time::Instant;

/// Tracks the requests made to one domain during this session
///
/// Counts are not persisted; every process starts with fresh domain state.
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Number of requests made to this domain in the current session
    pub request_count: u32,

    /// Timestamp of the last request to this domain
    pub last_request_time: Option<Instant>,
}

impl DomainState {
    /// Creates a new DomainState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a request was made to this domain
    ///
    /// Updates the request count and last request time.
    pub fn record_request(&mut self, now: Instant) {
        self.request_count = self.request_count.saturating_add(1);
        self.last_request_time = Some(now);
    }

    /// Whether the domain was never requested or has been quiet for longer than `idle`
    pub fn is_idle(&self, now: Instant, idle: Duration) -> bool {
        match self.last_request_time {
            Some(last) => now.saturating_duration_since(last) > idle,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_domain_state() {
        let state = DomainState::new();
        assert_eq!(state.request_count, 0);
        assert!(state.last_request_time.is_none());
    }

    #[test]
    fn test_record_request() {
        let mut state = DomainState::new();
        let now = Instant::now();

        state.record_request(now);
        assert_eq!(state.request_count, 1);
        assert_eq!(state.last_request_time, Some(now));

        state.record_request(now);
        assert_eq!(state.request_count, 2);
    }

    #[test]
    fn test_is_idle() {
        let mut state = DomainState::new();
        let now = Instant::now();
        let idle = Duration::from_secs(300);

        assert!(state.is_idle(now, idle));

        state.record_request(now);
        assert!(!state.is_idle(now + Duration::from_secs(300), idle));
        assert!(state.is_idle(now + Duration::from_secs(301), idle));
    }
}
