//! Machine status sources
//!
//! Every source implements [`MachineGetter`]; the configured one is built by
//! [`build_getter`].

pub mod esuds;
pub mod fallback;
pub mod simulated;
pub mod status_api;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, MachineSource};
use crate::models::machine::Machine;

pub use esuds::EsudsMachineGetter;
pub use fallback::FallbackMachineGetter;
pub use simulated::{DescendingMachineGetter, RandomMachineGetter};
pub use status_api::StatusApiMachineGetter;

/// Errors fetching machine readings
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Status provider returned {status} for room {room_id}")]
    Status { room_id: i64, status: u16 },

    #[error("Unexpected status page format for room {room_id}: {message}")]
    Format { room_id: i64, message: String },

    #[error("Invalid provider URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("No machine sources configured")]
    NoSources,
}

/// Source of machine readings for a room
#[async_trait]
pub trait MachineGetter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn get_machines(&self, room_id: i64) -> Result<Vec<Machine>, FetchError>;
}

/// Shared HTTP client for the network sources
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("washercheck/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Build the machine source selected in the configuration
pub fn build_getter(config: &Config) -> Result<Arc<dyn MachineGetter>, FetchError> {
    let timeout = Duration::from_secs(config.request_timeout);
    let getter: Arc<dyn MachineGetter> = match config.machine_source {
        MachineSource::Esuds => Arc::new(EsudsMachineGetter::new(
            http_client(timeout)?,
            &config.esuds_base_url,
        )?),
        MachineSource::StatusApi => Arc::new(StatusApiMachineGetter::new(
            http_client(timeout)?,
            &config.status_api_base_url,
        )?),
        MachineSource::Fallback => {
            let client = http_client(timeout)?;
            Arc::new(FallbackMachineGetter::new(vec![
                Arc::new(StatusApiMachineGetter::new(client.clone(), &config.status_api_base_url)?)
                    as Arc<dyn MachineGetter>,
                Arc::new(EsudsMachineGetter::new(client, &config.esuds_base_url)?),
            ]))
        }
        MachineSource::Random => Arc::new(RandomMachineGetter::new()),
        MachineSource::Descending => Arc::new(DescendingMachineGetter::new()),
    };
    Ok(getter)
}
