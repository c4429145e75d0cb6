//! In-memory [`Transport`] for tests.
//!
//! GET routes are matched on the exact URL. Pushes always succeed unless a
//! number of failures has been queued with [`StubTransport::fail_next_sends`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use eventhub_core::error::AppError;
use eventhub_core::source::UpdateMethod;
use tokio::sync::Notify;

use crate::transport::Transport;

#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Status(u16),
    Fail(String),
}

#[derive(Default)]
pub struct StubTransport {
    routes: Mutex<HashMap<String, Reply>>,
    gets: Mutex<Vec<String>>,
    sends: Mutex<Vec<(UpdateMethod, String)>>,
    failing_sends: AtomicUsize,
    entered: Notify,
    gate: Option<Notify>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every GET waits for [`release`](Self::release) before answering.
    pub fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::default()
        }
    }

    pub fn route(&self, url: &str, body: impl Into<String>) {
        self.route_reply(url, Reply::Body(body.into()));
    }

    pub fn route_reply(&self, url: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), reply);
    }

    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    /// URLs read so far, in order.
    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }

    /// Push calls so far, in order, failed ones included.
    pub fn sends(&self) -> Vec<(UpdateMethod, String)> {
        self.sends.lock().unwrap().clone()
    }

    /// Resolves once a GET has started.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Lets one gated GET answer.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get(&self, url: &str) -> Result<String, AppError> {
        self.gets.lock().unwrap().push(url.to_string());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = self.routes.lock().unwrap().get(url).cloned();
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Status(code)) => Err(AppError::ClientError(format!(
                "HTTP {} from {}",
                code, url
            ))),
            Some(Reply::Fail(msg)) => Err(AppError::NetworkError(msg)),
            None => Err(AppError::NetworkError(format!("no route for {}", url))),
        }
    }

    async fn send(&self, method: UpdateMethod, url: &str) -> Result<(), AppError> {
        self.sends.lock().unwrap().push((method, url.to_string()));
        let failed = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(AppError::NetworkError("stub push failure".to_string()))
        } else {
            Ok(())
        }
    }
}
