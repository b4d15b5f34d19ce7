use std::future::Future;
use std::sync::Arc;
use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::spawn;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::device::codec::{self, to_hex};
use crate::device::constants::{CONNECTION_POLL_DELAY, DISCOVERY_INTERVAL, IS_CONNECTED_DEADLINE, LIVENESS_INTERVAL, WRITE_DEADLINE};
use crate::device::discovery::{discover_device, DeviceFilter};
use crate::device::transport::{Connection, NotificationStream, Transport};
use crate::device::types::{Characteristic, CommandIntent, RawNotification, SessionState, TerminationReason};
use crate::error::{CommandError, DeviceError};
use crate::sink::TelemetrySink;

const COMMAND_QUEUE_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub discovery_interval: Duration,
    pub connection_poll: Duration,
    pub liveness_interval: Duration,
    pub is_connected_deadline: Duration,
    pub write_deadline: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        SessionTimings {
            discovery_interval: Duration::from_millis(DISCOVERY_INTERVAL),
            connection_poll: Duration::from_millis(CONNECTION_POLL_DELAY),
            liveness_interval: Duration::from_millis(LIVENESS_INTERVAL),
            is_connected_deadline: Duration::from_millis(IS_CONNECTED_DEADLINE),
            write_deadline: Duration::from_millis(WRITE_DEADLINE),
        }
    }
}

#[derive(Debug)]
pub struct CommandRequest {
    pub intent: CommandIntent,
    pub reply: oneshot::Sender<Result<(), CommandError>>,
}

/// Submits intents to a running session. Every submission waits for its own write to finish, so
/// there is never more than one write outstanding per sender.
#[derive(Debug, Clone)]
pub struct CommandSender {
    sender: mpsc::Sender<CommandRequest>,
}

impl CommandSender {
    pub async fn submit(&self, intent: CommandIntent) -> Result<(), CommandError> {
        let (reply, response) = oneshot::channel();

        self.sender.send(CommandRequest { intent, reply }).await
            .map_err(|_| CommandError::SessionClosed)?;

        response.await.map_err(|_| CommandError::SessionClosed)?
    }
}

pub fn command_channel() -> (CommandSender, mpsc::Receiver<CommandRequest>) {
    let (sender, receiver) = mpsc::channel(COMMAND_QUEUE_SIZE);
    (CommandSender { sender }, receiver)
}

impl SessionState {
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        match (self, next) {
            (SessionState::Terminated(_), _) => false,
            (_, SessionState::Terminated(_)) => true,
            (SessionState::Discovering, SessionState::Connecting) => true,
            (SessionState::Connecting, SessionState::AwaitingConnection) => true,
            (SessionState::AwaitingConnection, SessionState::Subscribing) => true,
            (SessionState::Subscribing, SessionState::Active) => true,
            _ => false,
        }
    }
}

/// Owns the connection lifecycle: discovery, connecting, subscribing, and the two concurrent
/// activities (telemetry dispatch and command dispatch) once active.
pub struct DeviceSession<T: Transport> {
    transport: T,
    sink: Arc<dyn TelemetrySink>,
    filter: DeviceFilter,
    timings: SessionTimings,
    // cancelling this token shuts the session down
    cancel: CancellationToken,
    state: watch::Sender<SessionState>,
}

impl<T: Transport> DeviceSession<T> {
    pub fn new(
        transport: T,
        sink: Arc<dyn TelemetrySink>,
        filter: DeviceFilter,
        timings: SessionTimings,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Discovering);

        DeviceSession { transport, sink, filter, timings, cancel, state }
    }

    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SessionState) {
        let current = self.state.borrow().clone();

        if !current.can_transition_to(&next) {
            error!("Invalid session transition {:?} -> {:?}", current, next);
            return;
        }

        info!("Session state {:?} -> {:?}", current, next);
        self.state.send_replace(next);
    }

    /// Runs the session until it terminates, and returns the reason.
    pub async fn run(self, commands: mpsc::Receiver<CommandRequest>) -> TerminationReason {
        let reason = self.run_until_terminated(commands).await;

        match &reason {
            TerminationReason::Shutdown => info!("Session terminated: {}", reason),
            _ => error!("Session terminated: {}", reason),
        }

        self.transition(SessionState::Terminated(reason.clone()));
        reason
    }

    async fn run_until_terminated(&self, mut commands: mpsc::Receiver<CommandRequest>) -> TerminationReason {
        let mut pending = Vec::new();

        let discovery = discover_device(&self.transport, &self.filter, self.timings.discovery_interval, &self.cancel);
        let device = match until_queue_closed(discovery, &mut commands, &mut pending).await {
            Some(Some(device)) => device,
            _ => return TerminationReason::Shutdown,
        };

        self.transition(SessionState::Connecting);
        let connect = async {
            tokio::select! {
                _ = self.cancel.cancelled() => None,
                result = self.transport.connect(&device) => Some(result),
            }
        };
        let connection = match until_queue_closed(connect, &mut commands, &mut pending).await.flatten() {
            Some(Ok(connection)) => Arc::new(connection),
            Some(Err(err)) => return TerminationReason::ConnectFailed(err.to_string()),
            None => return TerminationReason::Shutdown,
        };
        self.transition(SessionState::AwaitingConnection);

        let reason = self.run_connected(&connection, commands, pending).await;

        // every activity has stopped, this is the only place the connection is released
        info!("Disconnecting");
        if let Err(err) = connection.disconnect().await {
            warn!("Failed to disconnect: {}", err);
        }

        reason
    }

    async fn run_connected(
        &self,
        connection: &Arc<T::Connection>,
        mut commands: mpsc::Receiver<CommandRequest>,
        mut pending: Vec<CommandRequest>,
    ) -> TerminationReason {
        let awaiting = self.await_connection(connection.as_ref());
        if until_queue_closed(awaiting, &mut commands, &mut pending).await != Some(true) {
            return TerminationReason::Shutdown;
        }

        self.transition(SessionState::Subscribing);
        let subscribing = subscribe_all(connection.as_ref());
        let notifications = match until_queue_closed(subscribing, &mut commands, &mut pending).await {
            Some(Ok(notifications)) => notifications,
            Some(Err(err)) => return TerminationReason::from(&err),
            None => return TerminationReason::Shutdown,
        };

        self.transition(SessionState::Active);
        let activity_cancel = self.cancel.child_token();

        let mut telemetry = spawn(dispatch_telemetry(
            activity_cancel.clone(),
            connection.clone(),
            notifications,
            self.sink.clone(),
            self.timings,
        ));
        let mut command = spawn(dispatch_commands(
            activity_cancel.clone(),
            connection.clone(),
            commands,
            pending,
            self.timings,
        ));

        // the first activity to stop decides the reason, the other one is cancelled
        let (first, other) = tokio::select! {
            result = &mut telemetry => (result, command),
            result = &mut command => (result, telemetry),
        };
        activity_cancel.cancel();

        let reason = match first {
            Ok(Ok(())) => TerminationReason::Shutdown,
            Ok(Err(err)) => TerminationReason::from(&err),
            Err(err) => TerminationReason::TransportError(format!("activity failed: {}", err)),
        };

        match other.await {
            Ok(Ok(())) => {},
            Ok(Err(err)) => debug!("Second activity also stopped with: {}", err),
            Err(err) => warn!("Failed to join activity: {}", err),
        }

        reason
    }

    /// Polls until the connection reports itself as connected. Returns false if cancelled.
    async fn await_connection(&self, connection: &T::Connection) -> bool {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                result = connection.is_connected() => match result {
                    Ok(true) => return true,
                    Ok(false) => debug!("Not connected yet"),
                    Err(err) => warn!("Error checking for connection state: {:?}", err),
                },
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = sleep(self.timings.connection_poll) => {},
            }
        }
    }
}

/// Drives one setup phase to completion. Commands submitted meanwhile are kept in `pending` until
/// the session is active. Returns `None` once every command sender is gone.
async fn until_queue_closed<F: Future>(
    phase: F,
    commands: &mut mpsc::Receiver<CommandRequest>,
    pending: &mut Vec<CommandRequest>,
) -> Option<F::Output> {
    tokio::pin!(phase);

    loop {
        tokio::select! {
            output = &mut phase => return Some(output),
            request = commands.recv() => match request {
                Some(request) => pending.push(request),
                None => {
                    info!("Command queue closed before the session was active");
                    return None;
                },
            },
        }
    }
}

async fn subscribe_all<C: Connection>(connection: &C) -> Result<NotificationStream, DeviceError> {
    let notifications = connection.notifications().await?;

    for characteristic in Characteristic::ALL {
        connection.subscribe(characteristic).await
            .map_err(|source| DeviceError::SubscriptionFailed { characteristic, source: Box::new(source) })?;
    }

    Ok(notifications)
}

async fn check_liveness<C: Connection>(connection: &C, deadline: Duration) -> Result<(), DeviceError> {
    tokio::select! {
        _ = sleep(deadline) => {
            warn!("Checking for connection status took too long");
            Err(DeviceError::TransportDisconnected)
        }
        result = connection.is_connected() => match result {
            Err(err) => {
                warn!("Error checking for connection state: {:?}", err);
                Err(DeviceError::TransportDisconnected)
            },
            Ok(false) => {
                warn!("Connection lost");
                Err(DeviceError::TransportDisconnected)
            },
            Ok(true) => Ok(()),
        }
    }
}

async fn dispatch_notification(notification: &RawNotification, sink: &dyn TelemetrySink) {
    let characteristic = match Characteristic::from_uuid(&notification.uuid) {
        Some(characteristic) => characteristic,
        None => {
            debug!("Ignoring notification from unknown characteristic {}", notification.uuid);
            return;
        },
    };

    match codec::decode(characteristic, notification.uuid, &notification.value) {
        Err(err) => warn!("Dropping notification: {}", err),
        Ok(None) => debug!("Ignoring partial {} frame {}", characteristic, to_hex(&notification.value)),
        Ok(Some(event)) => {
            debug!("{}", event);
            if let Err(err) = sink.append(&event).await {
                warn!("{}", err);
            }
        },
    }
}

async fn dispatch_telemetry<C: Connection>(
    cancel: CancellationToken,
    connection: Arc<C>,
    mut notifications: NotificationStream,
    sink: Arc<dyn TelemetrySink>,
    timings: SessionTimings,
) -> Result<(), DeviceError> {
    let mut liveness = interval(timings.liveness_interval);
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    liveness.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Ok(()),
            notification = notifications.next() => match notification {
                Some(notification) => dispatch_notification(&notification, sink.as_ref()).await,
                None => {
                    warn!("Notification stream ended");
                    return Err(DeviceError::TransportDisconnected);
                },
            },
            _ = liveness.tick() => check_liveness(connection.as_ref(), timings.is_connected_deadline).await?,
        }
    }
}

async fn write_command<C: Connection>(
    connection: &C,
    intent: &CommandIntent,
    deadline: Duration,
) -> Result<(), CommandError> {
    let characteristic = intent.characteristic();
    let payload = codec::encode_command(intent);
    info!("Writing {} to {} characteristic", to_hex(&payload), characteristic);

    tokio::select! {
        _ = sleep(deadline) => {
            warn!("Writing to {} characteristic took too long", characteristic);
            Err(CommandError::WriteTimeout)
        }
        result = connection.write(characteristic, &payload) => result.map_err(|err| {
            warn!("Failed to write to {} characteristic: {:?}", characteristic, err);
            CommandError::from(err)
        }),
    }
}

async fn dispatch_commands<C: Connection>(
    cancel: CancellationToken,
    connection: Arc<C>,
    mut commands: mpsc::Receiver<CommandRequest>,
    pending: Vec<CommandRequest>,
    timings: SessionTimings,
) -> Result<(), DeviceError> {
    let mut pending = pending.into_iter();

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let request = match pending.next() {
            Some(request) => request,
            None => tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),
                request = commands.recv() => match request {
                    Some(request) => request,
                    None => {
                        info!("Command queue closed");
                        return Ok(());
                    },
                },
            },
        };

        let result = write_command(connection.as_ref(), &request.intent, timings.write_deadline).await;

        // a failed write only ends the session if the connection itself is gone
        let lost = match &result {
            Ok(()) => None,
            Err(_) => check_liveness(connection.as_ref(), timings.is_connected_deadline).await.err(),
        };

        if request.reply.send(result).is_err() {
            debug!("Command submitter went away before the reply");
        }

        if let Some(err) = lost {
            return Err(err);
        }
    }
}
