//! Network orchestrator.
//!
//! A single actor task owns the network state and both process supervisors.
//! Callers hold a cloneable [`NetworkOrchestrator`] handle: `start`/`stop`
//! go over an mpsc channel and are answered on a oneshot, and status is read
//! from a watch channel without touching the actor.
//!
//! Commands are handled one at a time, so a stop sent while a start is in
//! flight waits in the channel until the start has resolved.

use std::path::Path;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use ltesim_common::models::{
    Component, NetworkConfig, NetworkParams, NetworkState, NetworkStatus, ProcessState,
};
use ltesim_common::{Error, Failure, Result};

use crate::settings::Settings;
use crate::supervisor::ProcessSupervisor;
use crate::{generator, health, render};

const COMMAND_QUEUE: usize = 16;

enum Command {
    Start {
        params: NetworkParams,
        reply: oneshot::Sender<Result<NetworkConfig>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the orchestrator actor.
#[derive(Clone)]
pub struct NetworkOrchestrator {
    tx: mpsc::Sender<Command>,
    status: watch::Receiver<NetworkStatus>,
}

impl NetworkOrchestrator {
    /// Spawn the actor. The task ends after [`shutdown`](Self::shutdown) or
    /// once every handle is dropped, stopping the network either way.
    pub fn spawn(settings: Settings) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let (status_tx, status_rx) = watch::channel(NetworkStatus::default());
        let actor = Actor {
            core: ProcessSupervisor::new(settings.network.core_bin.clone()),
            base_station: ProcessSupervisor::new(settings.network.base_station_bin.clone()),
            settings,
            state: NetworkState::Stopped,
            config: None,
            last_error: None,
            status_tx,
        };
        let handle = tokio::spawn(actor.run(rx));
        (
            Self {
                tx,
                status: status_rx,
            },
            handle,
        )
    }

    /// Generate, render and bring up the network.
    ///
    /// Fails with `AlreadyRunning` unless the network is stopped. Any other
    /// failure rolls back whatever was started before returning.
    pub async fn start(&self, params: NetworkParams) -> Result<NetworkConfig> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Start { params, reply })
            .await
            .map_err(|_| Error::OrchestratorGone)?;
        rx.await.map_err(|_| Error::OrchestratorGone)?
    }

    /// Stop both processes. Succeeds immediately when already stopped.
    pub async fn stop(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Stop { reply })
            .await
            .map_err(|_| Error::OrchestratorGone)?;
        rx.await.map_err(|_| Error::OrchestratorGone)
    }

    /// Stop the network and end the actor task.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown { reply })
            .await
            .map_err(|_| Error::OrchestratorGone)?;
        rx.await.map_err(|_| Error::OrchestratorGone)
    }

    /// Latest status snapshot. Never waits on the actor.
    pub fn status(&self) -> NetworkStatus {
        self.status.borrow().clone()
    }

    /// Watch every status change.
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.status.clone()
    }
}

struct Actor {
    settings: Settings,
    core: ProcessSupervisor,
    base_station: ProcessSupervisor,
    state: NetworkState,
    config: Option<NetworkConfig>,
    last_error: Option<Failure>,
    status_tx: watch::Sender<NetworkStatus>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let mut monitor = tokio::time::interval(self.settings.network.monitor_interval);
        monitor.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Start { params, reply }) => {
                        let result = self.start(params).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Stop { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                    }
                    Some(Command::Shutdown { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        tracing::info!("all orchestrator handles dropped, stopping network");
                        self.stop().await;
                        break;
                    }
                },
                _ = monitor.tick() => {
                    if self.state == NetworkState::Running {
                        self.check_processes().await;
                    }
                }
            }
        }

        tracing::info!("orchestrator stopped");
    }

    fn publish(&self) {
        let alive = |s: &ProcessSupervisor| s.state() == ProcessState::Running;
        self.status_tx.send_replace(NetworkStatus {
            state: self.state,
            core_alive: alive(&self.core),
            base_station_alive: alive(&self.base_station),
            core_pid: self.core.pid(),
            base_station_pid: self.base_station.pid(),
            config: self.config.clone(),
            last_error: self.last_error.clone(),
        });
    }

    fn set_state(&mut self, state: NetworkState) {
        if self.state != state {
            tracing::info!(from = %self.state, to = %state, "network state change");
        }
        self.state = state;
        self.publish();
    }

    async fn start(&mut self, params: NetworkParams) -> Result<NetworkConfig> {
        if self.state != NetworkState::Stopped {
            tracing::warn!(state = %self.state, "start rejected, network not stopped");
            return Err(Error::AlreadyRunning(self.state));
        }

        self.last_error = None;
        self.set_state(NetworkState::Starting);

        match self.bring_up(&params).await {
            Ok(config) => {
                self.set_state(NetworkState::Running);
                tracing::info!(
                    plmn = %config.plmn_id,
                    core_pid = ?self.core.pid(),
                    base_station_pid = ?self.base_station.pid(),
                    "network running"
                );
                Ok(config)
            }
            Err(e) => {
                tracing::error!(error = %e, "network start failed, rolling back");
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    async fn bring_up(&mut self, params: &NetworkParams) -> Result<NetworkConfig> {
        let config = generator::generate(params)?;
        self.config = Some(config.clone());
        self.publish();

        let paths = self.settings.paths.clone();
        render::write_all(&config, &paths, &self.settings.device.device_args).await?;

        let settle = self.settings.network.settle_delay;

        let core_bin = self.settings.network.core_bin.clone();
        self.core
            .start(&core_bin, &[path_arg(&paths.epc_conf())], &paths.core_process_log())?;
        self.publish();
        tokio::time::sleep(settle).await;

        let enb_bin = self.settings.network.base_station_bin.clone();
        self.base_station.start(
            &enb_bin,
            &[path_arg(&paths.enb_conf())],
            &paths.base_station_process_log(),
        )?;
        self.publish();
        tokio::time::sleep(settle).await;

        let report = health::verify(&mut self.core, &mut self.base_station).await;
        if let Some(failure) = report.failure {
            return Err(Error::Verification {
                component: failure.component.to_string(),
                reason: failure.reason,
            });
        }
        if !report.warnings.is_empty() {
            tracing::warn!(
                count = report.warnings.len(),
                "network started with errors in process logs"
            );
        }

        Ok(config)
    }

    /// `Failed`, forced cleanup, then `Stopped` with the error recorded.
    async fn fail(&mut self, err: &Error) {
        self.last_error = Some(err.to_failure());
        self.set_state(NetworkState::Failed);
        self.stop_processes().await;
        self.config = None;
        self.set_state(NetworkState::Stopped);
    }

    async fn stop(&mut self) {
        if self.state == NetworkState::Stopped {
            return;
        }
        self.set_state(NetworkState::Stopping);
        self.stop_processes().await;
        self.config = None;
        self.set_state(NetworkState::Stopped);
    }

    /// Base station first, then core.
    async fn stop_processes(&mut self) {
        let grace = self.settings.network.grace_period;
        let outcome = self.base_station.stop(grace).await;
        tracing::debug!(component = %Component::BaseStation, ?outcome, "stopped");
        self.publish();
        let outcome = self.core.stop(grace).await;
        tracing::debug!(component = %Component::CoreNetwork, ?outcome, "stopped");
        self.publish();
    }

    async fn check_processes(&mut self) {
        let core_alive = self.core.is_alive();
        let base_station_alive = self.base_station.is_alive();
        if core_alive && base_station_alive {
            return;
        }

        let (component, sup) = if !core_alive {
            (Component::CoreNetwork, &self.core)
        } else {
            (Component::BaseStation, &self.base_station)
        };
        let err = Error::Verification {
            component: component.to_string(),
            reason: format!("crashed while running ({})", health::exit_reason(sup)),
        };
        tracing::error!(component = %component, error = %err, "network process died");
        self.fail(&err).await;
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
