use std::sync::Arc;
use std::time::Duration;

use thiserror::Error as ThisError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::response::{DecodeError, Decoding, Response};
use crate::Error;

#[derive(Debug, ThisError)]
pub enum ClientError {
    /// The store could not be reached or refused the handshake.
    #[error("failed to connect to {addr}: {source}")]
    Connection { addr: String, source: Error },
    /// A single round trip failed on the wire.
    #[error("{0}")]
    Transport(Error),
    /// The store answered with an error reply.
    #[error("{0}")]
    Server(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("connection is closed")]
    Closed,
}

const MIN_HEARTBEAT: Duration = Duration::from_millis(1);

// The foreground session and the heartbeat take turns on the same connection. `None` once
// the client has been closed.
type SharedConnection = Arc<Mutex<Option<Connection>>>;

/// Connection to the store plus the background task that keeps it alive.
pub struct Client {
    config: ConnectionConfig,
    connection: SharedConnection,
    shutdown: CancellationToken,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Connects, authenticates, selects the database and pings the store before returning, so an
    /// unreachable store is reported here rather than on the first command.
    pub async fn connect(config: ConnectionConfig) -> Result<Client, ClientError> {
        let addr = config.address();
        let connection_error = |source: Error| ClientError::Connection {
            addr: addr.clone(),
            source,
        };

        let mut connection = Connection::connect(&config.host, config.port)
            .await
            .map_err(connection_error)?;
        handshake(&mut connection, &config)
            .await
            .map_err(connection_error)?;

        info!(connection_id = %connection.id, "Connected to {}", addr);

        let connection = Arc::new(Mutex::new(Some(connection)));
        let shutdown = CancellationToken::new();
        let heartbeat = tokio::spawn(heartbeat(
            connection.clone(),
            config.heartbeat,
            shutdown.clone(),
        ));

        Ok(Client {
            config,
            connection,
            shutdown,
            heartbeat: Mutex::new(Some(heartbeat)),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Sends `command args...` and decodes the reply according to the command name.
    #[instrument(skip(self, args))]
    pub async fn execute<S: AsRef<str>>(
        &self,
        command: &str,
        args: &[S],
    ) -> Result<Response, ClientError> {
        let reply = round_trip(&self.connection, Frame::command(command, args)).await?;
        let response = Decoding::for_command(command, args).decode(command, reply)?;

        Ok(response)
    }

    /// Stops the heartbeat, waits for it to finish and closes the connection.
    ///
    /// Calling it again is a no-op.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.shutdown.cancel();

        let heartbeat = self.heartbeat.lock().await.take();
        if let Some(heartbeat) = heartbeat {
            if let Err(e) = heartbeat.await {
                warn!("Heartbeat task ended abnormally: {}", e);
            }
        }

        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            let id = connection.id;
            connection.shutdown().await.map_err(ClientError::Transport)?;
            info!(connection_id = %id, "Connection closed");
        }

        Ok(())
    }
}

async fn handshake(connection: &mut Connection, config: &ConnectionConfig) -> Result<(), Error> {
    if !config.password.is_empty() {
        // Written directly so the password never reaches the request log.
        connection
            .write_frame(Frame::command("AUTH", &[config.password.as_str()]))
            .await?;
        match connection.read_frame().await? {
            Some(Frame::Error(msg)) => return Err(msg.into()),
            Some(_) => {}
            None => return Err("connection closed by server".into()),
        }
    }

    if config.database != 0 {
        let select = Frame::command("SELECT", &[config.database.to_string()]);
        if let Frame::Error(msg) = connection.round_trip(select).await? {
            return Err(msg.into());
        }
    }

    match connection.round_trip(ping()).await? {
        Frame::Error(msg) => Err(msg.into()),
        _ => Ok(()),
    }
}

async fn round_trip(connection: &SharedConnection, frame: Frame) -> Result<Frame, ClientError> {
    let mut connection = connection.lock().await;
    let connection = connection.as_mut().ok_or(ClientError::Closed)?;

    match connection
        .round_trip(frame)
        .await
        .map_err(ClientError::Transport)?
    {
        Frame::Error(msg) => Err(ClientError::Server(msg)),
        reply => Ok(reply),
    }
}

async fn heartbeat(connection: SharedConnection, every: Duration, shutdown: CancellationToken) {
    // A zero period would panic the ticker.
    let every = every.max(MIN_HEARTBEAT);
    let mut ticker = time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                match round_trip(&connection, ping()).await {
                    Ok(_) => debug!("Heartbeat ok"),
                    Err(e) => warn!("Heartbeat failed: {}", e),
                }
            }
        }
    }

    debug!("Heartbeat stopped");
}

fn ping() -> Frame {
    Frame::command::<&str>("PING", &[])
}
