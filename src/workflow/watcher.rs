use super::{DiscoveryReport, WorkflowDiscovery, WorkflowRegistry};
use eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// Polls the workflows directory and reloads the registry on change
pub struct WorkflowWatcher {
    discovery: WorkflowDiscovery,
    registry: Arc<RwLock<WorkflowRegistry>>,
    interval: Duration,
    cooldown: Duration,
}

impl WorkflowWatcher {
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

    pub fn new(
        discovery: WorkflowDiscovery,
        registry: Arc<RwLock<WorkflowRegistry>>,
        interval: Duration,
    ) -> Self {
        Self {
            discovery,
            registry,
            interval,
            cooldown: Self::DEFAULT_COOLDOWN,
        }
    }

    /// Minimum time between two reloads
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Poll until `shutdown` becomes true or its sender is dropped
    pub async fn run<F>(mut self, mut shutdown: watch::Receiver<bool>, mut on_reload: F) -> Result<()>
    where
        F: FnMut(&DiscoveryReport) + Send,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_reload: Option<Instant> = None;

        log::info!(
            "Watching {} every {:?}",
            self.discovery.root().display(),
            self.interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let changed = match self.discovery.has_changes() {
                        Ok(changed) => changed,
                        Err(e) => {
                            log::warn!("Workflow scan failed: {:#}", e);
                            continue;
                        }
                    };
                    if !changed {
                        continue;
                    }
                    if last_reload.is_some_and(|at| at.elapsed() < self.cooldown) {
                        log::debug!("Change detected, waiting for cooldown");
                        continue;
                    }

                    let report = {
                        let mut registry = self.registry.write().await;
                        self.discovery.discover(&mut registry)
                    };
                    last_reload = Some(Instant::now());
                    match report {
                        Ok(report) => {
                            log::info!(
                                "Reloaded workflows: {} registered, {} removed",
                                report.registered.len(),
                                report.removed.len()
                            );
                            on_reload(&report);
                        }
                        Err(e) => log::warn!("Workflow reload failed: {:#}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("Workflow watcher stopped");
        Ok(())
    }
}
