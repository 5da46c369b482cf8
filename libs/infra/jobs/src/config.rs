// [libs/infra/jobs/src/config.rs]

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub stalled_interval_seconds: i64,
    pub max_stalled_count: u32,
    pub retention_completed: i64,
    pub retention_failed: i64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            stalled_interval_seconds: 30,
            max_stalled_count: 3,
            retention_completed: 50,
            retention_failed: 100,
        }
    }
}
