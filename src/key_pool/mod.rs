//! # API密钥池模块
//!
//! 上游密钥池、可用密钥选择与基于失败率的熔断

pub mod algorithms;
pub mod api_key_health;
pub mod types;

pub use algorithms::{KeySelector, RandomSource, SeededRandom, ThreadRandom};
pub use api_key_health::{ApiKeyHealthTracker, HealthPolicy, RecordOutcome, tracked_field};
pub use types::{Credential, CredentialHealth, KeyPool};
