//! Background activities, at most one per render slot
//!
//! A slot is a UI region (usually the main view) that one activity writes
//! into. Starting an activity for a slot first cancels the activity that
//! owns it, waits for it to exit, and only then spawns the new one.
//! Requests that are overtaken by a newer request for the same slot while
//! waiting are dropped.

use std::collections::HashMap;
use std::future::Future;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Sending side of a cancellation signal
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Receiving side of a cancellation signal, passed into activities
///
/// A token whose handle was dropped counts as cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Create a linked handle and token
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once cancellation is signalled
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Where an activity writes its output
pub trait RenderTarget: Send + Sync {
    fn clear(&self);
    fn write_line(&self, line: &str);
    /// Replace everything with `content`
    fn set_content(&self, content: String);
}

struct RunningTask {
    cancel: CancelHandle,
    handle: JoinHandle<()>,
    cache_key: Option<String>,
}

#[derive(Default)]
struct Slot {
    /// Number of the latest request for this slot
    generation: AtomicU64,
    task: tokio::sync::Mutex<Option<RunningTask>>,
}

/// Schedules background activities per render slot
pub struct TaskManager {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    /// How long a cancelled activity may take to exit before it is aborted
    stop_timeout: Duration,
}

impl TaskManager {
    pub fn new(stop_timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            stop_timeout,
        }
    }

    fn slot(&self, name: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(name.to_string()).or_default().clone()
    }

    /// Run `activity` in `slot`, replacing whatever runs there
    pub async fn run<F, Fut>(&self, slot: &str, activity: F)
    where
        F: FnOnce(CancelToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.start(slot, None, activity).await;
    }

    /// Like [`run`](Self::run), but a no-op while the slot's active
    /// activity was started with the same cache key
    pub async fn run_keyed<F, Fut>(&self, slot: &str, cache_key: &str, activity: F)
    where
        F: FnOnce(CancelToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.start(slot, Some(cache_key.to_string()), activity).await;
    }

    /// Compute a string and show it, unless the slot moved on meanwhile
    pub async fn run_render<F, Fut>(
        &self,
        slot: &str,
        cache_key: Option<&str>,
        target: Arc<dyn RenderTarget>,
        render: F,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        self.start(slot, cache_key.map(String::from), move |cancel| async move {
            let content = tokio::select! {
                _ = cancel.cancelled() => return,
                content = render() => content,
            };
            if !cancel.is_cancelled() {
                target.set_content(content);
            }
        })
        .await;
    }

    /// Run a child process, streaming its output lines into `target`
    ///
    /// The process is killed when the activity is cancelled.
    pub async fn run_process(
        &self,
        slot: &str,
        cache_key: Option<&str>,
        command: Command,
        target: Arc<dyn RenderTarget>,
    ) {
        self.start(slot, cache_key.map(String::from), move |cancel| {
            attach_process(command, target, cancel)
        })
        .await;
    }

    /// Cancel and wait for the activity in `slot`, if any
    pub async fn stop(&self, slot: &str) {
        let slot_state = self.slot(slot);
        slot_state.generation.fetch_add(1, Ordering::SeqCst);
        let task = slot_state.task.lock().await.take();
        if let Some(task) = task {
            self.stop_task(slot, task).await;
        }
    }

    pub async fn stop_all(&self) {
        let names: Vec<String> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        for name in names {
            self.stop(&name).await;
        }
    }

    /// Whether an activity is currently running in `slot`
    pub async fn is_active(&self, slot: &str) -> bool {
        let slot = self.slot(slot);
        let task = slot.task.lock().await;
        task.as_ref().is_some_and(|t| !t.handle.is_finished())
    }

    async fn start<F, Fut>(&self, slot_name: &str, cache_key: Option<String>, activity: F)
    where
        F: FnOnce(CancelToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let slot = self.slot(slot_name);
        let generation = slot.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let is_latest = || slot.generation.load(Ordering::SeqCst) == generation;

        let mut current = slot.task.lock().await;
        if !is_latest() {
            tracing::debug!("Task request for {} superseded", slot_name);
            return;
        }

        if let (Some(key), Some(task)) = (&cache_key, current.as_ref())
            && task.cache_key.as_ref() == Some(key)
            && !task.handle.is_finished()
        {
            tracing::debug!("Task {} already active in {}", key, slot_name);
            return;
        }

        if let Some(task) = current.take() {
            self.stop_task(slot_name, task).await;
        }

        // A newer request may have arrived while the old task was stopping
        if !is_latest() {
            tracing::debug!("Task request for {} superseded", slot_name);
            return;
        }

        let (cancel, token) = cancel_pair();
        let handle = tokio::spawn(activity(token));
        *current = Some(RunningTask {
            cancel,
            handle,
            cache_key,
        });
    }

    async fn stop_task(&self, slot: &str, task: RunningTask) {
        task.cancel.cancel();
        let mut handle = task.handle;
        match tokio::time::timeout(self.stop_timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_panic() => {
                tracing::warn!("Task in {} panicked: {}", slot, e);
            }
            Ok(Err(_)) => {}
            Err(_) => {
                tracing::warn!(
                    "Task in {} did not stop within {:?}, aborting",
                    slot,
                    self.stop_timeout
                );
                handle.abort();
            }
        }
    }
}

async fn attach_process(mut command: Command, target: Arc<dyn RenderTarget>, cancel: CancelToken) {
    target.clear();

    let mut child = match command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            tracing::error!("Failed to start process: {}", e);
            target.write_line(&format!("Failed to start process: {e}"));
            return;
        }
    };

    let mut forwarders = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        forwarders.push(tokio::spawn(forward_lines(stdout, target.clone(), cancel.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        forwarders.push(tokio::spawn(forward_lines(stderr, target.clone(), cancel.clone())));
    }

    tokio::select! {
        _ = cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                tracing::error!("Failed to kill process: {}", e);
            }
        }
        status = child.wait() => {
            match status {
                Ok(status) => tracing::debug!("Process exited with {}", status),
                Err(e) => tracing::error!("Failed to wait for process: {}", e),
            }
        }
    }

    for forwarder in forwarders {
        let _ = forwarder.await;
    }
}

async fn forward_lines<R>(reader: R, target: Arc<dyn RenderTarget>, cancel: CancelToken)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => target.write_line(&line),
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Output stream error: {}", e);
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::RenderTarget;
    use std::sync::Mutex;

    /// Render target that records everything written to it
    #[derive(Default)]
    pub struct BufferTarget {
        pub content: Mutex<String>,
        pub clears: Mutex<usize>,
    }

    impl BufferTarget {
        pub fn text(&self) -> String {
            self.content.lock().unwrap().clone()
        }
    }

    impl RenderTarget for BufferTarget {
        fn clear(&self) {
            self.content.lock().unwrap().clear();
            *self.clears.lock().unwrap() += 1;
        }

        fn write_line(&self, line: &str) {
            let mut content = self.content.lock().unwrap();
            content.push_str(line);
            content.push('\n');
        }

        fn set_content(&self, content: String) {
            *self.content.lock().unwrap() = content;
        }
    }
}
