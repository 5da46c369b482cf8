//! Three-queue durable job broker (discovery / risk-assessment /
//! notifications): atomic claim, exponential backoff, stall recovery,
//! and retention trimming over the shared `jobs` table.

pub mod backoff;
pub mod broker;
pub mod config;
pub mod reaper;
pub mod repository;

pub use backoff::compute_backoff;
pub use broker::JobBroker;
pub use config::BrokerConfig;
pub use reaper::spawn_reaper;
pub use repository::JobRepository;
