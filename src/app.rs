//! Defines the application state for a single run and the run
//! itself.

use crate::conf::Settings;
use crate::export::export;
use crate::report::{RunTimestamp, REPORTS};
use crate::storage::Storage;
use crate::trigger::Trigger;
use crate::warehouse::Warehouse;
use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

/// An App is the state of one invocation, derived from settings read
/// at the start of that invocation.
#[derive(Debug)]
pub struct App {
    /// The original settings.
    pub settings: Settings,
}

impl App {
    /// Initialize an App instance given a settings struct. Consumes
    /// the settings struct.
    pub fn new(settings: Settings) -> Self {
        App { settings }
    }

    /// Initialize an App instance from the process environment.
    pub fn from_env() -> Result<Self> {
        Ok(App::new(Settings::from_env()?))
    }

    /// Handle an invocation trigger: export every report, one after
    /// the other, under a timestamp taken now.
    pub async fn handle(
        &self,
        trigger: &Trigger,
        warehouse: &dyn Warehouse,
        storage: &dyn Storage,
    ) -> Result<()> {
        self.run(trigger, RunTimestamp::now(), warehouse, storage)
            .await
    }

    /// Export every report under the given timestamp. Stops at the
    /// first failure; objects already uploaded are left in place.
    #[instrument(skip(self, timestamp, warehouse, storage), fields(timestamp = %timestamp))]
    pub async fn run(
        &self,
        trigger: &Trigger,
        timestamp: RunTimestamp,
        warehouse: &dyn Warehouse,
        storage: &dyn Storage,
    ) -> Result<()> {
        info!("Starting run");
        let bucket = &self.settings.bucket_name;
        for report in &REPORTS {
            let query = report.query(&self.settings.project);
            let key = report.object_name(&timestamp);
            export(warehouse, storage, &query, bucket, &key)
                .await
                .map_err(|e| {
                    warn!("Report {:03} failed: {}", report.sequence, e);
                    e
                })
                .with_context(|| {
                    format!(
                        "Failed to export report {:03} to object {:?} in bucket {:?}",
                        report.sequence, key, bucket
                    )
                })?;
            info!("Exported report {:03} to {:?}", report.sequence, key);
        }
        Ok(())
    }
}
