use std::time::Duration;

/// Tuning knobs for the order saga.
#[derive(Debug, Clone)]
pub struct SagaConfig {
    /// How long a single availability check may take before the coordinator
    /// gives up and treats the item as available.
    pub availability_timeout: Duration,

    /// Attempts at a conditional write before reporting a concurrent
    /// modification.
    pub max_update_attempts: u32,

    /// Page size used when a caller asks for 0.
    pub default_page_size: usize,

    /// Upper bound on the page size a caller may ask for.
    pub max_page_size: usize,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            availability_timeout: Duration::from_secs(2),
            max_update_attempts: 3,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl SagaConfig {
    /// Resolves a requested page size against the defaults and the cap.
    pub fn page_size(&self, requested: usize) -> usize {
        match requested {
            0 => self.default_page_size,
            n => n.min(self.max_page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_defaults_and_caps() {
        let config = SagaConfig::default();
        assert_eq!(config.page_size(0), 20);
        assert_eq!(config.page_size(5), 5);
        assert_eq!(config.page_size(1_000), 100);
    }
}
