pub mod batch;
pub mod browser;
pub mod config;
pub mod error;
pub mod geo;
pub mod mailbox;
pub mod proxy;
pub mod record;
pub mod region;
pub mod worker;

pub use batch::BatchScheduler;
pub use browser::{ProfileDir, ProvisionContext, SignupFlow};
pub use config::{load_config, load_config_from_str, Config};
pub use error::{ConfigError, ProvisorError, ProxyError, RecordError, Result, WorkerError};
pub use mailbox::{MailError, MailSession, MailboxSpec};
pub use proxy::{ProxyHandle, ProxyProvider};
pub use record::{AccountRecord, Outcome, RecordWriter};
pub use region::{DeviceType, RegionProfile, RegionProfiles};
