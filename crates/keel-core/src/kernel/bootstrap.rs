use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::boundary::{ErrorBoundary, GuardedComponent};
use crate::config::KernelConfig;
use crate::event::EventChannel;
use crate::kernel::component::Component;
use crate::kernel::constants;
use crate::kernel::coordinator::{DestroyReport, LifecycleCoordinator};
use crate::kernel::error::{Error, Result};

/// One self-contained kernel: an event channel, a lifecycle coordinator and
/// an error boundary wired together.
///
/// Any number of kernels may coexist in a process; nothing is global.
pub struct Kernel {
    config: KernelConfig,
    channel: EventChannel,
    coordinator: LifecycleCoordinator,
    boundary: ErrorBoundary,
    started: AtomicBool,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        log::info!("Creating {} kernel v{}", constants::KERNEL_NAME, constants::KERNEL_VERSION);
        let channel = EventChannel::with_config(config.channel.clone());
        let coordinator = LifecycleCoordinator::new(channel.clone(), config.lifecycle.clone());
        let boundary = ErrorBoundary::with_coordinator(coordinator.clone(), config.boundary.clone());
        Self {
            config,
            channel,
            coordinator,
            boundary,
            started: AtomicBool::new(false),
        }
    }

    /// Validate the configuration and build a kernel from it
    pub fn from_config(config: KernelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator {
        &self.coordinator
    }

    pub fn boundary(&self) -> &ErrorBoundary {
        &self.boundary
    }

    /// Wrap the component in the error boundary and register it.
    ///
    /// Returns the guarded handle, or `None` if the id was already taken.
    pub async fn register(&self, component: Arc<dyn Component>) -> Result<Option<Arc<GuardedComponent>>> {
        let guarded = self.boundary.wrap(Arc::clone(&component));
        if !self.coordinator.register(guarded.clone()).await? {
            return Ok(None);
        }
        self.boundary.track(&component);
        Ok(Some(guarded))
    }

    /// Initialize every registered component and start health monitoring.
    pub async fn start(&self) -> Result<Vec<String>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Other("kernel already started".to_string()));
        }
        match self.coordinator.initialize_all().await {
            Ok(initialized) => {
                self.coordinator.start_health_monitoring();
                log::info!("Kernel started with {} component(s)", initialized.len());
                Ok(initialized)
            }
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Stop health monitoring and destroy every component.
    pub async fn shutdown(&self) -> DestroyReport {
        let report = self.coordinator.destroy_all().await;
        self.started.store(false, Ordering::SeqCst);
        log::info!(
            "Kernel shut down: {} destroyed, {} cleanup failure(s)",
            report.destroyed.len(),
            report.failure_count()
        );
        report
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}
