mod settings;

pub use settings::{DaemonConfig, DomainConfig, Settings, DEFAULT_IP_MIRRORS};
