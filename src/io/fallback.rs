//! Ordered fallback between machine sources

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::{FetchError, MachineGetter};
use crate::models::machine::Machine;

/// Tries each source in order and returns the first success
pub struct FallbackMachineGetter {
    getters: Vec<Arc<dyn MachineGetter>>,
}

impl FallbackMachineGetter {
    pub fn new(getters: Vec<Arc<dyn MachineGetter>>) -> Self {
        Self { getters }
    }
}

#[async_trait]
impl MachineGetter for FallbackMachineGetter {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn get_machines(&self, room_id: i64) -> Result<Vec<Machine>, FetchError> {
        let mut last_error = None;
        for getter in &self.getters {
            match getter.get_machines(room_id).await {
                Ok(machines) => return Ok(machines),
                Err(e) => {
                    warn!(room_id, source = getter.name(), error = %e, "Machine source failed, trying next");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(FetchError::NoSources))
    }
}
