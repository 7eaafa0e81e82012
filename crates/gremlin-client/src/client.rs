//! Async client handle.
//!
//! [`GremlinClient`] is a cloneable front for one driver task. The task owns
//! the [`Dispatcher`] and its [`Connection`], and processes commands from
//! handles and events from the socket one at a time.

use gremlin_settings::{GremlinSettings, RequestSettings};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::connection::{Connection, ConnectionEvent, ConnectionState};
use crate::dispatcher::{Dispatcher, SubmitOutcome};
use crate::error::{GremlinError, Result};
use crate::query::{Query, QueryEvent, ScriptQuery};

const COMMAND_BUFFER: usize = 64;

/// Messages from handles to the driver task.
enum Command {
    Submit {
        query: Box<dyn Query>,
        reply: oneshot::Sender<Result<SubmitOutcome>>,
    },
    Open,
    Close,
    Status(oneshot::Sender<DriverStatus>),
}

/// Snapshot of the driver's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverStatus {
    /// Connection lifecycle state.
    pub state: ConnectionState,
    /// Queries waiting for the connection to open.
    pub queued: usize,
    /// Queries awaiting a terminal response.
    pub in_flight: usize,
    /// Why the last connection attempt or socket failed, until the next open.
    pub last_error: Option<String>,
}

/// Handle to a Gremlin Server driver.
///
/// Dropping the last handle closes the connection and stops the driver.
#[derive(Clone)]
pub struct GremlinClient {
    cmd_tx: mpsc::Sender<Command>,
    request: RequestSettings,
}

impl GremlinClient {
    /// Start a driver without connecting. Must be called inside a Tokio runtime.
    pub fn new(settings: &GremlinSettings) -> Result<Self> {
        let url = settings.connection.url()?;
        let (event_tx, event_rx) = mpsc::channel(settings.connection.event_buffer.max(1));
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

        let connection = Connection::new(url, event_tx);
        let dispatcher = Dispatcher::new(connection, settings.request.clone(), settings.auth.clone());
        let _ = tokio::spawn(driver_loop(dispatcher, cmd_rx, event_rx));

        Ok(Self {
            cmd_tx,
            request: settings.request.clone(),
        })
    }

    /// Start a driver and begin connecting.
    pub async fn connect(settings: &GremlinSettings) -> Result<Self> {
        let client = Self::new(settings)?;
        client.open().await?;
        Ok(client)
    }

    async fn command(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| GremlinError::DriverClosed)
    }

    /// Begin connecting (no-op while open or connecting).
    pub async fn open(&self) -> Result<()> {
        self.command(Command::Open).await
    }

    /// Close the connection. In-flight queries fail with `ConnectionClosed`.
    pub async fn close(&self) -> Result<()> {
        self.command(Command::Close).await
    }

    /// Current driver state.
    pub async fn status(&self) -> Result<DriverStatus> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Status(tx)).await?;
        rx.await.map_err(|_| GremlinError::DriverClosed)
    }

    /// Connection lifecycle state.
    pub async fn state(&self) -> Result<ConnectionState> {
        Ok(self.status().await?.state)
    }

    /// Whether the connection is open.
    pub async fn is_open(&self) -> Result<bool> {
        Ok(self.state().await? == ConnectionState::Open)
    }

    /// Whether the handshake is in progress.
    pub async fn is_connecting(&self) -> Result<bool> {
        Ok(self.state().await? == ConnectionState::Connecting)
    }

    /// The most recent transport failure, if the connection hasn't reopened since.
    ///
    /// Reconnecting is left to the caller: check this after the state drops
    /// to `Closed` and call [`open`](Self::open) again if appropriate.
    pub async fn last_error(&self) -> Result<Option<GremlinError>> {
        Ok(self.status().await?.last_error.map(GremlinError::Transport))
    }

    /// Hand a query to the dispatcher. Returns once it's sent or queued.
    pub async fn submit(&self, query: impl Query + 'static) -> Result<SubmitOutcome> {
        self.submit_boxed(Box::new(query)).await
    }

    /// [`submit`](Self::submit) for an already-boxed query.
    pub async fn submit_boxed(&self, query: Box<dyn Query>) -> Result<SubmitOutcome> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Submit { query, reply }).await?;
        rx.await.map_err(|_| GremlinError::DriverClosed)?
    }

    /// Evaluate a script and collect every result.
    ///
    /// Waits for the terminal response; a query queued on a connection that
    /// never opens waits until the driver shuts down.
    pub async fn execute(&self, script: impl Into<String>) -> Result<Vec<Value>> {
        let query = ScriptQuery::new(script).with_request_settings(self.request.clone());
        self.execute_query(query).await
    }

    /// Submit `query` and collect its results. Replaces any callback it had.
    pub async fn execute_query(&self, query: ScriptQuery) -> Result<Vec<Value>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let query = query.on_result(move |event| {
            let _ = tx.send(event);
        });
        debug!(request_id = %query.id(), script = query.script(), "executing script");
        let _ = self.submit(query).await?;

        let mut results = Vec::new();
        while let Some(event) = rx.recv().await {
            if event.is_terminal() {
                return match event {
                    QueryEvent::Error(e) => Err(e.into()),
                    _ => Ok(results),
                };
            }
            if let QueryEvent::Data(response) = event {
                response.collect_into(&mut results);
            }
        }
        Err(GremlinError::DriverClosed)
    }
}

/// The single task that owns the dispatcher.
async fn driver_loop(
    mut dispatcher: Dispatcher<Connection>,
    mut cmd_rx: mpsc::Receiver<Command>,
    mut event_rx: mpsc::Receiver<ConnectionEvent>,
) {
    debug!(url = %dispatcher.transport().url(), "driver started");
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                handle_command(&mut dispatcher, cmd);
            }
            Some(event) = event_rx.recv() => dispatcher.handle_event(event),
        }
    }
    info!(
        queued = dispatcher.queued_len(),
        in_flight = dispatcher.in_flight_len(),
        "all client handles dropped, shutting down driver"
    );
    dispatcher.close();
}

fn handle_command(dispatcher: &mut Dispatcher<Connection>, cmd: Command) {
    match cmd {
        Command::Submit { query, reply } => {
            let _ = reply.send(dispatcher.submit_query(query));
        }
        Command::Open => dispatcher.open(),
        Command::Close => dispatcher.close(),
        Command::Status(reply) => {
            let _ = reply.send(DriverStatus {
                state: dispatcher.state(),
                queued: dispatcher.queued_len(),
                in_flight: dispatcher.in_flight_len(),
                last_error: dispatcher.last_error().map(str::to_owned),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use gremlin_settings::{ConnectionSettings, SettingsError};

    use super::*;

    fn settings(port: u16) -> GremlinSettings {
        GremlinSettings {
            connection: ConnectionSettings {
                host: "127.0.0.1".into(),
                port,
                ..ConnectionSettings::default()
            },
            ..GremlinSettings::default()
        }
    }

    #[tokio::test]
    async fn new_client_is_not_connected() {
        let client = GremlinClient::new(&settings(1)).unwrap();
        let status = client.status().await.unwrap();
        assert_eq!(
            status,
            DriverStatus {
                state: ConnectionState::Closed,
                queued: 0,
                in_flight: 0,
                last_error: None,
            }
        );
        assert!(client.last_error().await.unwrap().is_none());
        assert!(!client.is_open().await.unwrap());
        assert!(!client.is_connecting().await.unwrap());
    }

    #[tokio::test]
    async fn submit_before_open_queues() {
        let client = GremlinClient::new(&settings(1)).unwrap();
        let outcome = client.submit(ScriptQuery::new("g.V()")).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Queued);
        assert_eq!(client.status().await.unwrap().queued, 1);
    }

    #[tokio::test]
    async fn clones_share_one_driver() {
        let client = GremlinClient::new(&settings(1)).unwrap();
        let other = client.clone();
        let _ = other.submit(ScriptQuery::new("g.V()")).await.unwrap();
        assert_eq!(client.status().await.unwrap().queued, 1);
    }

    #[tokio::test]
    async fn close_on_never_opened_client_is_noop() {
        let client = GremlinClient::new(&settings(1)).unwrap();
        client.close().await.unwrap();
        client.close().await.unwrap();
        assert_eq!(client.state().await.unwrap(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn invalid_host_is_rejected() {
        let mut bad = settings(8182);
        bad.connection.host = "bad host".into();
        let err = GremlinClient::new(&bad).err().unwrap();
        assert_matches!(err, GremlinError::Settings(SettingsError::InvalidValue(_)));
    }
}
