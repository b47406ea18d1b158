#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use redcli::codec::FrameCodec;
use redcli::config::ConnectionConfig;
use redcli::frame::Frame;
use tokio::net::TcpListener;
use tokio::time::{sleep, Instant};
use tokio_util::codec::Framed;

type Reply = dyn Fn(&[String]) -> Option<Frame> + Send + Sync;

/// An in-process server speaking RESP that records every command it receives.
pub struct FakeStore {
    pub port: u16,
    received: Arc<Mutex<Vec<Vec<String>>>>,
    closed: Arc<AtomicUsize>,
}

impl FakeStore {
    pub async fn start() -> FakeStore {
        FakeStore::with_replies(default_reply).await
    }

    pub async fn with_replies<F>(reply: F) -> FakeStore
    where
        F: Fn(&[String]) -> Frame + Send + Sync + 'static,
    {
        FakeStore::answering(move |parts: &[String]| Some(reply(parts))).await
    }

    /// Like `with_replies`, but a `None` leaves the command unanswered.
    pub async fn answering<F>(reply: F) -> FakeStore
    where
        F: Fn(&[String]) -> Option<Frame> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicUsize::new(0));
        let reply: Arc<Reply> = Arc::new(reply);

        tokio::spawn({
            let received = received.clone();
            let closed = closed.clone();
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let received = received.clone();
                    let closed = closed.clone();
                    let reply = reply.clone();

                    tokio::spawn(async move {
                        let mut framed = Framed::new(socket, FrameCodec::new());
                        while let Some(Ok(frame)) = framed.next().await {
                            let parts = strings(frame);
                            received.lock().unwrap().push(parts.clone());
                            let Some(frame) = reply(&parts) else {
                                continue;
                            };
                            if framed.send(frame).await.is_err() {
                                break;
                            }
                        }
                        closed.fetch_add(1, Ordering::SeqCst);
                    });
                }
            }
        });

        FakeStore {
            port,
            received,
            closed,
        }
    }

    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: "127.0.0.1".to_string(),
            port: self.port,
            ..ConnectionConfig::default()
        }
    }

    pub fn received(&self) -> Vec<Vec<String>> {
        self.received.lock().unwrap().clone()
    }

    pub fn command_names(&self) -> Vec<String> {
        self.received().into_iter().map(|parts| parts[0].clone()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.command_names().iter().filter(|n| *n == name).count()
    }

    /// Connections the client has closed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Answers `PING` with `PONG` and everything else with a null reply.
pub fn default_reply(parts: &[String]) -> Frame {
    match parts[0].as_str() {
        "PING" => Frame::Simple("PONG".to_string()),
        _ => Frame::Null,
    }
}

pub fn bulk(s: &str) -> Frame {
    Frame::Bulk(Bytes::copy_from_slice(s.as_bytes()))
}

pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        sleep(Duration::from_millis(10)).await;
    }
}

fn strings(frame: Frame) -> Vec<String> {
    match frame {
        Frame::Array(parts) => parts
            .into_iter()
            .map(|part| match part {
                Frame::Bulk(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Frame::Simple(s) => s,
                other => other.to_string(),
            })
            .collect(),
        other => vec![other.to_string()],
    }
}
