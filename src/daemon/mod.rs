//! Daemon assembly: configuration, the id registry, and one task per watch
//!
//! Each configured watch gets its own task running a [`WatchRunner`]. A
//! misconfigured watch is skipped with an error; the others keep running.

pub mod config;
#[cfg(target_os = "linux")]
pub mod drivers;
pub mod providers;
pub mod registry;
pub mod runner;
pub mod watchlets;

pub use self::config::{DaemonConfig, ProviderConfig, WatchConfig};
pub use self::registry::{Driver, NotificationProvider, Registry};
pub use self::runner::{WatchCommand, WatchRunner, WatchStatus};

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::core::{BdAddr, Error, Result};
use crate::network::{Connector, Link};
use crate::protocol::{DeviceSession, SessionConfig};
use crate::server::{NotificationSink, WatchServer};

const COMMAND_QUEUE: usize = 16;

/// Control side of a running watch task
pub struct WatchHandle {
    address: BdAddr,
    commands: mpsc::Sender<WatchCommand>,
    sink: NotificationSink,
    task: JoinHandle<()>,
}

fn task_gone() -> Error {
    Error::invalid_state("watch task has stopped")
}

impl WatchHandle {
    pub fn address(&self) -> BdAddr {
        self.address
    }

    /// Sink feeding this watch's scheduler, for sources outside the registry
    pub fn notifications(&self) -> NotificationSink {
        self.sink.clone()
    }

    async fn send(&self, command: WatchCommand) -> Result<()> {
        self.commands.send(command).await.map_err(|_| task_gone())
    }

    pub async fn run_watchlet(&self, id: &str) -> Result<()> {
        let (reply, result) = oneshot::channel();
        self.send(WatchCommand::RunWatchlet(id.to_string(), reply)).await?;
        result.await.map_err(|_| task_gone())?
    }

    pub async fn close_watchlet(&self) -> Result<()> {
        self.send(WatchCommand::CloseWatchlet).await
    }

    pub async fn next_watchlet(&self) -> Result<()> {
        self.send(WatchCommand::NextWatchlet).await
    }

    /// Re-enables a watch that gave up reconnecting
    pub async fn restart(&self) -> Result<()> {
        self.send(WatchCommand::Restart).await
    }

    pub async fn status(&self) -> Result<WatchStatus> {
        let (reply, status) = oneshot::channel();
        self.send(WatchCommand::Status(reply)).await?;
        status.await.map_err(|_| task_gone())
    }

    /// Closes the link and waits for the task to finish
    pub async fn shutdown(self) {
        let _ = self.commands.send(WatchCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            error!(address = %self.address, error = %e, "watch task failed");
        }
    }
}

/// Starts a task driving the watch described by `config` over `connector`.
///
/// Unknown buttons, watchlets and providers are logged and skipped.
pub fn spawn_watch<C: Connector>(
    connector: C,
    session: SessionConfig,
    config: &WatchConfig,
    stale_threshold: Duration,
    registry: &Registry,
) -> Result<WatchHandle> {
    let address = config.bd_addr()?;
    let mut server = WatchServer::new(DeviceSession::new(session));
    server.set_stale_threshold(config.stale_threshold_or(stale_threshold));

    if let Err(e) = server.set_next_watchlet_button(config.next_watchlet_button.as_deref()) {
        warn!(%address, error = %e, "next watchlet button not bound");
    }
    for id in &config.watchlets {
        let registered = registry
            .create_watchlet(id)
            .and_then(|watchlet| server.register_watchlet(watchlet));
        if let Err(e) = registered {
            warn!(%address, watchlet = %id, error = %e, "skipping watchlet");
        }
    }

    let (sink, notifications) = NotificationSink::channel();
    let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
    let link = Link::new(connector, address);
    let mut runner = WatchRunner::new(link, server, notifications, rx);

    let span = info_span!("watch", %address);
    for provider_config in &config.notifications {
        match registry.create_provider(provider_config) {
            Ok(provider) => {
                info!(%address, provider = provider.id(), "starting notification provider");
                let task = tokio::spawn(provider.run(sink.clone()).instrument(span.clone()));
                runner.attach_provider(task);
            }
            Err(e) => warn!(%address, error = %e, "skipping notification provider"),
        }
    }

    let task = tokio::spawn(runner.run().instrument(span));
    Ok(WatchHandle {
        address,
        commands,
        sink,
        task,
    })
}

/// Starts a watch through the driver its configuration names
pub fn init_watch(
    config: &WatchConfig,
    stale_threshold: Duration,
    registry: &Registry,
) -> Result<WatchHandle> {
    let driver = registry.create_driver(config)?;
    spawn_watch(driver.connector, driver.session, config, stale_threshold, registry)
}

/// Checks a configuration against a registry without starting anything
pub fn check_config(config: &DaemonConfig, registry: &Registry) -> Vec<Error> {
    let mut problems = Vec::new();
    for watch in &config.watches {
        if let Err(e) = watch.bd_addr() {
            problems.push(e);
        }
        if let Err(e) = registry.create_driver(watch) {
            problems.push(e);
        }
        if let Some(button) = &watch.next_watchlet_button {
            if !crate::core::BUTTON_NAMES.contains(&button.as_str()) {
                problems.push(Error::config(format!("unknown button {:?}", button)));
            }
        }
        for id in &watch.watchlets {
            if let Err(e) = registry.create_watchlet(id) {
                problems.push(e);
            }
        }
        for provider in &watch.notifications {
            if let Err(e) = registry.create_provider(provider) {
                problems.push(e);
            }
        }
    }
    problems
}

/// All running watches
pub struct Daemon {
    watches: Vec<WatchHandle>,
}

impl Daemon {
    /// Starts every watch that can be started; must run inside a runtime
    pub fn start(config: &DaemonConfig, registry: &Registry) -> Self {
        let mut watches = Vec::new();
        for watch in &config.watches {
            match init_watch(watch, config.stale_threshold, registry) {
                Ok(handle) => watches.push(handle),
                Err(e) => error!(address = %watch.address, error = %e, "watch not started"),
            }
        }
        info!(running = watches.len(), configured = config.watches.len(), "daemon started");
        Daemon { watches }
    }

    pub fn watches(&self) -> &[WatchHandle] {
        &self.watches
    }

    pub fn watch(&self, address: BdAddr) -> Option<&WatchHandle> {
        self.watches.iter().find(|w| w.address == address)
    }

    /// Shuts every watch down
    pub async fn shutdown(self) {
        futures::future::join_all(self.watches.into_iter().map(WatchHandle::shutdown)).await;
        info!("daemon stopped");
    }
}
