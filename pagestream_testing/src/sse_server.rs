//! Scripted event-stream server for HTTP transport tests.
//!
//! [`SseServer`] binds an ephemeral local port and answers each accepted
//! connection with the next script in its queue: a response head followed by
//! a sequence of [`ScriptStep`]s. Request heads are recorded for inspection.

use std::{collections::VecDeque, net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
    sync::{Mutex, mpsc},
    task::JoinHandle,
};

/// One action performed while serving a response body.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// Write raw bytes.
    Write(String),
    /// Pause before the next step.
    Sleep(Duration),
    /// Keep the connection open until the client goes away.
    Hold,
}

struct Script {
    head: String,
    steps: Vec<ScriptStep>,
}

/// Local server replaying scripted event-stream responses.
pub struct SseServer {
    addr: SocketAddr,
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: mpsc::UnboundedReceiver<String>,
    task: JoinHandle<()>,
}

impl SseServer {
    /// Bind to `127.0.0.1` on an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let scripts: Arc<Mutex<VecDeque<Script>>> = Arc::default();
        let (req_tx, requests) = mpsc::unbounded_channel();

        let queue = Arc::clone(&scripts);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Some(script) = queue.lock().await.pop_front() else {
                    continue;
                };
                let req_tx = req_tx.clone();
                tokio::spawn(async move {
                    let mut reader = BufReader::new(stream);
                    let mut request = String::new();
                    loop {
                        let mut line = String::new();
                        match reader.read_line(&mut line).await {
                            Ok(0) | Err(_) => return,
                            Ok(_) if line == "\r\n" || line == "\n" => break,
                            Ok(_) => request.push_str(&line),
                        }
                    }
                    let _ = req_tx.send(request);

                    if reader.get_mut().write_all(script.head.as_bytes()).await.is_err() {
                        return;
                    }
                    for step in script.steps {
                        match step {
                            ScriptStep::Write(bytes) => {
                                let stream = reader.get_mut();
                                if stream.write_all(bytes.as_bytes()).await.is_err() {
                                    return;
                                }
                                let _ = stream.flush().await;
                            }
                            ScriptStep::Sleep(delay) => tokio::time::sleep(delay).await,
                            ScriptStep::Hold => {
                                let mut sink = Vec::new();
                                let _ = reader.read_to_end(&mut sink).await;
                                return;
                            }
                        }
                    }
                    let _ = reader.get_mut().shutdown().await;
                });
            }
        });

        Self {
            addr,
            scripts,
            requests,
            task,
        }
    }

    /// Queue a `200 OK` event-stream response made of `steps`.
    pub async fn respond(&self, steps: Vec<ScriptStep>) {
        self.respond_with_head(
            "HTTP/1.0 200 OK\r\ncontent-type: text/event-stream\r\ncache-control: no-cache\r\n\r\n",
            steps,
        )
        .await;
    }

    /// Queue a response with a custom head.
    pub async fn respond_with_head(&self, head: &str, steps: Vec<ScriptStep>) {
        self.scripts.lock().await.push_back(Script {
            head: head.to_owned(),
            steps,
        });
    }

    /// URL of `path` on this server.
    #[must_use]
    pub fn url(&self, path: &str) -> String { format!("http://{}{path}", self.addr) }

    /// Wait for the next recorded request head.
    pub async fn next_request(&mut self) -> Option<String> { self.requests.recv().await }
}

impl Drop for SseServer {
    fn drop(&mut self) { self.task.abort(); }
}
