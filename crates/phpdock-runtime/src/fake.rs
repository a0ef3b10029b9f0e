//! In-memory runtime for tests.
//!
//! [`FakeRuntime`] implements [`ContainerRuntime`] against process-local
//! state and records every call it receives, so tests can assert not only
//! on outcomes but on which runtime mutations were (or were not) issued.
//! Failures are injected per operation name; helper-container exit codes
//! are configured by container-name prefix.

use crate::error::{Result, RuntimeError};
use crate::gateway::{
    ContainerRuntime, ContainerSpec, ContainerStatus, ExecOutput, LogStream, PullProgress,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    spec: ContainerSpec,
    running: bool,
}

#[derive(Default)]
struct FakeState {
    ping_error: Option<String>,
    containers: HashMap<String, FakeContainer>,
    volumes: BTreeSet<String>,
    calls: Vec<String>,
    fail: HashMap<String, String>,
    default_wait_code: i64,
    wait_codes: Vec<(String, i64)>,
    wait_delay: Option<std::time::Duration>,
    exec_results: VecDeque<ExecOutput>,
    log_text: String,
    log_lines: Vec<String>,
    next_id: u64,
}

/// In-memory [`ContainerRuntime`] with call recording and failure injection.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRuntime {
    /// Creates a healthy, empty fake runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `ping` (and everything gated on it) fail with the message.
    pub fn set_ping_error(&self, message: impl Into<String>) {
        self.state.lock().unwrap().ping_error = Some(message.into());
    }

    /// Makes every future call to `op` fail with the message
    /// (`op` is the trait method name, e.g. `"create_volume"`).
    pub fn fail_on(&self, op: &str, message: impl Into<String>) {
        self.state.lock().unwrap().fail.insert(op.to_string(), message.into());
    }

    /// Sets the exit code reported by `wait_container` for containers whose
    /// name starts with `prefix`.
    pub fn set_wait_code(&self, prefix: &str, code: i64) {
        self.state.lock().unwrap().wait_codes.push((prefix.to_string(), code));
    }

    /// Makes `wait_container` sleep before returning, to exercise deadline
    /// handling in callers.
    pub fn set_wait_delay(&self, delay: std::time::Duration) {
        self.state.lock().unwrap().wait_delay = Some(delay);
    }

    /// Queues an exec result; dequeued in order, default success after.
    pub fn push_exec_result(&self, result: ExecOutput) {
        self.state.lock().unwrap().exec_results.push_back(result);
    }

    /// Sets the text returned by `container_logs`.
    pub fn set_logs(&self, text: impl Into<String>) {
        self.state.lock().unwrap().log_text = text.into();
    }

    /// Sets the lines yielded by `attach_logs`.
    pub fn set_log_stream(&self, lines: Vec<String>) {
        self.state.lock().unwrap().log_lines = lines;
    }

    /// Seeds an existing container.
    pub fn add_container(&self, spec: ContainerSpec, running: bool) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let container = FakeContainer {
            id: format!("fake-{:08x}", state.next_id),
            spec: spec.clone(),
            running,
        };
        state.containers.insert(spec.name, container);
    }

    /// Seeds an existing volume.
    pub fn add_volume(&self, name: &str) {
        self.state.lock().unwrap().volumes.insert(name.to_string());
    }

    /// Every call received so far, in order, as `"op:target"` strings.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that mutate runtime state (creates, starts, stops, removals,
    /// pulls, execs), the set the idempotence tests assert on.
    pub fn mutation_calls(&self) -> Vec<String> {
        const MUTATIONS: &[&str] = &[
            "create_container",
            "start_container",
            "stop_container",
            "restart_container",
            "remove_container",
            "create_volume",
            "remove_volume",
            "pull_image",
            "exec",
        ];
        self.calls()
            .into_iter()
            .filter(|call| {
                MUTATIONS.iter().any(|m| call.starts_with(&format!("{m}:")))
            })
            .collect()
    }

    /// Whether a container with this exact name exists.
    pub fn has_container(&self, name: &str) -> bool {
        self.state.lock().unwrap().containers.contains_key(name)
    }

    /// Whether the named container exists and is running.
    pub fn container_running(&self, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(name)
            .map(|c| c.running)
            .unwrap_or(false)
    }

    /// Names of containers whose name starts with `prefix`.
    pub fn containers_with_prefix(&self, prefix: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .containers
            .keys()
            .filter(|n| n.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Whether the named volume exists.
    pub fn has_volume(&self, name: &str) -> bool {
        self.state.lock().unwrap().volumes.contains(name)
    }

    fn record(&self, op: &str, target: &str) {
        self.state.lock().unwrap().calls.push(format!("{op}:{target}"));
    }

    fn injected(&self, op: &str) -> Option<RuntimeError> {
        self.state
            .lock()
            .unwrap()
            .fail
            .get(op)
            .map(|msg| RuntimeError::unavailable(msg.clone()))
    }

    fn status_of(container: &FakeContainer) -> ContainerStatus {
        ContainerStatus {
            id: container.id.clone(),
            name: container.spec.name.clone(),
            running: container.running,
            state: if container.running { "running" } else { "exited" }.to_string(),
            health: None,
            ports: container.spec.ports.clone(),
            binds: container.spec.binds.clone(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<()> {
        self.record("ping", "");
        let error = self.state.lock().unwrap().ping_error.clone();
        match error {
            Some(msg) => Err(RuntimeError::unavailable(msg)),
            None => Ok(()),
        }
    }

    async fn pull_image(
        &self,
        reference: &str,
        on_progress: &(dyn Fn(PullProgress) + Send + Sync),
    ) -> Result<()> {
        self.record("pull_image", reference);
        if let Some(e) = self.injected("pull_image") {
            return Err(e);
        }
        on_progress(PullProgress {
            status: format!("Pulling from {reference}"),
            current: Some(0),
            total: Some(100),
        });
        on_progress(PullProgress {
            status: "Download complete".to_string(),
            current: Some(100),
            total: Some(100),
        });
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        self.record("create_container", &spec.name);
        if let Some(e) = self.injected("create_container") {
            return Err(e);
        }

        let mut state = self.state.lock().unwrap();
        if state.containers.contains_key(&spec.name) {
            // The runtime's own name-uniqueness constraint.
            return Err(RuntimeError::unavailable(format!(
                "container name {} already in use",
                spec.name
            )));
        }
        state.next_id += 1;
        let id = format!("fake-{:08x}", state.next_id);
        state.containers.insert(
            spec.name.clone(),
            FakeContainer { id: id.clone(), spec: spec.clone(), running: false },
        );
        Ok(id)
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.record("start_container", name);
        if let Some(e) = self.injected("start_container") {
            return Err(e);
        }
        let mut state = self.state.lock().unwrap();
        match state.containers.get_mut(name) {
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(RuntimeError::container_not_found(name)),
        }
    }

    async fn stop_container(&self, name: &str, _timeout_secs: i64) -> Result<()> {
        self.record("stop_container", name);
        if let Some(e) = self.injected("stop_container") {
            return Err(e);
        }
        let mut state = self.state.lock().unwrap();
        match state.containers.get_mut(name) {
            Some(container) => {
                container.running = false;
                Ok(())
            }
            None => Err(RuntimeError::container_not_found(name)),
        }
    }

    async fn restart_container(&self, name: &str) -> Result<()> {
        self.record("restart_container", name);
        let mut state = self.state.lock().unwrap();
        match state.containers.get_mut(name) {
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(RuntimeError::container_not_found(name)),
        }
    }

    async fn remove_container(&self, name: &str, _force: bool) -> Result<()> {
        self.record("remove_container", name);
        if let Some(e) = self.injected("remove_container") {
            return Err(e);
        }
        self.state.lock().unwrap().containers.remove(name);
        Ok(())
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerStatus>> {
        self.record("inspect_container", name);
        let state = self.state.lock().unwrap();
        Ok(state.containers.get(name).map(Self::status_of))
    }

    async fn list_containers(&self, label_filter: Option<&str>) -> Result<Vec<ContainerStatus>> {
        self.record("list_containers", label_filter.unwrap_or(""));
        let state = self.state.lock().unwrap();
        let mut statuses: Vec<ContainerStatus> = state
            .containers
            .values()
            .filter(|c| match label_filter {
                Some(filter) => match filter.split_once('=') {
                    Some((k, v)) => c.spec.labels.get(k).map(String::as_str) == Some(v),
                    None => c.spec.labels.contains_key(filter),
                },
                None => true,
            })
            .map(Self::status_of)
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(statuses)
    }

    async fn create_volume(&self, name: &str) -> Result<()> {
        self.record("create_volume", name);
        if let Some(e) = self.injected("create_volume") {
            return Err(e);
        }
        self.state.lock().unwrap().volumes.insert(name.to_string());
        Ok(())
    }

    async fn remove_volume(&self, name: &str, _force: bool) -> Result<()> {
        self.record("remove_volume", name);
        if let Some(e) = self.injected("remove_volume") {
            return Err(e);
        }
        self.state.lock().unwrap().volumes.remove(name);
        Ok(())
    }

    async fn list_volumes(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        self.record("list_volumes", prefix.unwrap_or(""));
        let state = self.state.lock().unwrap();
        Ok(state
            .volumes
            .iter()
            .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
            .cloned()
            .collect())
    }

    async fn exec(&self, container: &str, argv: &[&str]) -> Result<ExecOutput> {
        let label = format!("{container}:{}", argv.first().unwrap_or(&""));
        self.record("exec", &label);
        if let Some(e) = self.injected("exec") {
            return Err(e);
        }
        let mut state = self.state.lock().unwrap();
        Ok(state.exec_results.pop_front().unwrap_or_default())
    }

    async fn container_logs(&self, name: &str, _tail: usize) -> Result<String> {
        self.record("container_logs", name);
        Ok(self.state.lock().unwrap().log_text.clone())
    }

    async fn attach_logs(&self, name: &str) -> Result<LogStream> {
        self.record("attach_logs", name);
        let lines = self.state.lock().unwrap().log_lines.clone();
        Ok(futures::stream::iter(lines.into_iter().map(Ok)).boxed())
    }

    async fn wait_container(&self, name: &str) -> Result<i64> {
        self.record("wait_container", name);
        let (delay, code) = {
            let state = self.state.lock().unwrap();
            let code = state
                .wait_codes
                .iter()
                .rev()
                .find(|(prefix, _)| name.starts_with(prefix.as_str()))
                .map(|(_, code)| *code)
                .unwrap_or(state.default_wait_code);
            (state.wait_delay, code)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(code)
    }
}
