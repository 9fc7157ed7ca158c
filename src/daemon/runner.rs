use std::io;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::{BdAddr, Error, Result};
use crate::network::{Connector, Link, LinkEvent};
use crate::protocol::{DeviceSession, SessionAction, SessionStatus};
use crate::server::{NotificationEvent, WatchServer};
use crate::time::earliest;

/// Requests a [`super::WatchHandle`] sends to its watch task
#[derive(Debug)]
pub enum WatchCommand {
    RunWatchlet(String, oneshot::Sender<Result<()>>),
    CloseWatchlet,
    NextWatchlet,
    /// Re-enables a watch whose reconnection attempts ran out
    Restart,
    Status(oneshot::Sender<WatchStatus>),
    Shutdown,
}

/// Point-in-time view of one watch
#[derive(Debug, Clone, PartialEq)]
pub struct WatchStatus {
    pub address: BdAddr,
    pub session: SessionStatus,
    pub current_watchlet: Option<String>,
    pub watchlet_active: bool,
    pub pending: usize,
    pub dropped_frames: u64,
}

/// Event loop of one watch.
///
/// Everything belonging to the watch (link, session, scheduler) lives on this
/// task; notification sources and handles reach it only through channels.
pub struct WatchRunner<C: Connector> {
    link: Link<C>,
    server: WatchServer<DeviceSession>,
    notifications: mpsc::UnboundedReceiver<NotificationEvent>,
    commands: mpsc::Receiver<WatchCommand>,
    providers: Vec<JoinHandle<()>>,
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}

impl<C: Connector> WatchRunner<C> {
    pub fn new(
        link: Link<C>,
        server: WatchServer<DeviceSession>,
        notifications: mpsc::UnboundedReceiver<NotificationEvent>,
        commands: mpsc::Receiver<WatchCommand>,
    ) -> Self {
        WatchRunner {
            link,
            server,
            notifications,
            commands,
            providers: Vec::new(),
        }
    }

    /// Ties a provider task to the lifetime of this watch
    pub fn attach_provider(&mut self, task: JoinHandle<()>) {
        self.providers.push(task);
    }

    /// Runs until shut down or every handle is dropped
    pub async fn run(mut self) {
        info!(address = %self.link.address(), "watch task started");
        self.server.watch_mut().start();

        loop {
            self.flush().await;
            let deadline = earliest([
                self.server.watch().next_deadline(),
                self.server.next_deadline(),
            ]);

            tokio::select! {
                event = self.link.next_event() => self.on_link_event(event),
                Some(event) = self.notifications.recv() => {
                    self.server.handle_notification_event(event);
                }
                command = self.commands.recv() => match command {
                    Some(WatchCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                _ = sleep_until(deadline) => {
                    self.server.watch_mut().poll_timers();
                    self.server.poll_timers();
                }
            }
        }

        self.server.watch_mut().shutdown();
        self.flush().await;
        for task in self.providers.drain(..) {
            task.abort();
        }
        info!(address = %self.link.address(), "watch task stopped");
    }

    /// Performs queued session actions and delivers queued watch events
    /// until neither side produces more
    async fn flush(&mut self) {
        loop {
            let mut progressed = false;
            while let Some(action) = self.server.watch_mut().take_action() {
                progressed = true;
                self.perform(action).await;
            }
            while let Some(event) = self.server.watch_mut().take_event() {
                progressed = true;
                self.server.on_watch_event(event);
            }
            if !progressed {
                break;
            }
        }
    }

    async fn perform(&mut self, action: SessionAction) {
        match action {
            SessionAction::Connect => self.link.connect(),
            SessionAction::Disconnect => self.link.disconnect(),
            SessionAction::Transmit(message) => match self.link.send(message).await {
                Ok(()) => {}
                Err(Error::NotConnected) => debug!("link down, message dropped"),
                Err(e) => {
                    self.link.disconnect();
                    let error = match e {
                        Error::Io(e) => e,
                        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
                    };
                    self.server.watch_mut().on_link_error(&error);
                }
            },
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        let session = self.server.watch_mut();
        match event {
            LinkEvent::Connected => session.on_link_connected(),
            LinkEvent::Message(message) => session.on_message(message),
            LinkEvent::Error(error) => session.on_link_error(&error),
            LinkEvent::Closed => session.on_link_closed(),
        }
    }

    fn on_command(&mut self, command: WatchCommand) {
        match command {
            WatchCommand::RunWatchlet(id, reply) => {
                let result = self.server.run_watchlet(&id);
                if let Err(e) = &result {
                    warn!(watchlet = %id, error = %e, "cannot run watchlet");
                }
                let _ = reply.send(result);
            }
            WatchCommand::CloseWatchlet => self.server.close_watchlet(),
            WatchCommand::NextWatchlet => self.server.next_watchlet(),
            WatchCommand::Restart => self.server.watch_mut().restart(),
            WatchCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            WatchCommand::Shutdown => {}
        }
    }

    pub fn status(&self) -> WatchStatus {
        WatchStatus {
            address: self.link.address(),
            session: self.server.watch().status(),
            current_watchlet: self.server.current_watchlet().map(str::to_string),
            watchlet_active: self.server.is_current_watchlet_active(),
            pending: self.server.pending().len(),
            dropped_frames: self.link.dropped_frames(),
        }
    }
}
