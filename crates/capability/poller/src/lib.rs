//! 后台轮询器。
//!
//! 在专用线程上按固定间隔重复执行调用方提供的动作，不阻塞调用方。
//!
//! ## 状态机
//!
//! ```text
//! Unstarted → Running ⇄ (PauseRequested → Paused) → StopRequested → Stopped
//! ```
//!
//! - 暂停与停止只在间隔边界生效，不会打断正在执行的动作
//! - 动作返回错误或 panic 时记录日志并继续下一轮
//! - 所有状态迁移在同一把互斥锁内完成；工作线程在两个条件变量上等待：
//!   `stop_signal`（间隔等待，可被停止唤醒）与 `pause_release`（暂停释放）

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// 动作执行结果。
pub type PollResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Action = Box<dyn FnMut() -> PollResult + Send>;

/// 轮询器状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Unstarted,
    Running,
    PauseRequested,
    Paused,
    StopRequested,
    Stopped,
}

/// 轮询器错误。
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    #[error("poller {0} already started")]
    AlreadyStarted(String),
    #[error("failed to spawn poller thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("poller worker panicked")]
    WorkerPanicked,
}

struct Shared {
    state: Mutex<PollerState>,
    stop_signal: Condvar,
    pause_release: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PollerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 后台轮询器。
pub struct Poller {
    name: String,
    interval: Duration,
    shared: Arc<Shared>,
    action: Mutex<Option<Action>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    pub fn new<F>(name: impl Into<String>, interval: Duration, action: F) -> Self
    where
        F: FnMut() -> PollResult + Send + 'static,
    {
        Self {
            name: name.into(),
            interval,
            shared: Arc::new(Shared {
                state: Mutex::new(PollerState::Unstarted),
                stop_signal: Condvar::new(),
                pause_release: Condvar::new(),
            }),
            action: Mutex::new(Some(Box::new(action))),
            worker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PollerState {
        *self.shared.lock()
    }

    /// Unstarted → Running，立即开始循环。
    pub fn start(&self) -> Result<(), PollerError> {
        self.spawn(None)
    }

    /// 延迟 `due` 后进入 Running；延迟期间可被 `stop` 取消。
    pub fn start_after(&self, due: Duration) -> Result<(), PollerError> {
        self.spawn(Some(due))
    }

    fn spawn(&self, due: Option<Duration>) -> Result<(), PollerError> {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let action = self
            .action
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(action) = action else {
            return Err(PollerError::AlreadyStarted(self.name.clone()));
        };
        {
            let mut state = self.shared.lock();
            if *state != PollerState::Unstarted {
                warn!(target: "fabric.poller", poller = %self.name, state = ?*state, "start requested on started poller");
                return Err(PollerError::AlreadyStarted(self.name.clone()));
            }
            if due.is_none() {
                *state = PollerState::Running;
            }
        }

        let shared = self.shared.clone();
        let name = self.name.clone();
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_worker(name, interval, due, shared, action));
        match handle {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                *self.shared.lock() = PollerState::Stopped;
                Err(PollerError::Spawn(err))
            }
        }
    }

    /// 请求暂停，在下一个间隔边界生效。
    pub fn pause(&self) {
        let mut state = self.shared.lock();
        match *state {
            PollerState::Running => *state = PollerState::PauseRequested,
            PollerState::PauseRequested | PollerState::Paused => {
                debug!(target: "fabric.poller", poller = %self.name, "pause already pending");
            }
            other => {
                warn!(target: "fabric.poller", poller = %self.name, state = ?other, "requested PAUSE on poller state");
            }
        }
    }

    /// 清除挂起或生效中的暂停，恢复 Running。
    pub fn resume(&self) {
        let mut state = self.shared.lock();
        match *state {
            PollerState::PauseRequested => *state = PollerState::Running,
            PollerState::Paused => {
                *state = PollerState::Running;
                self.shared.pause_release.notify_all();
            }
            other => {
                warn!(target: "fabric.poller", poller = %self.name, state = ?other, "requested CONTINUE on poller state");
            }
        }
    }

    /// 请求停止；正在执行的动作完成后在间隔边界退出。
    pub fn stop(&self) {
        let has_worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some();
        let mut state = self.shared.lock();
        match *state {
            PollerState::Running | PollerState::PauseRequested | PollerState::Paused => {
                *state = PollerState::StopRequested;
            }
            PollerState::Unstarted if has_worker => {
                warn!(target: "fabric.poller", poller = %self.name, "requested STOP before delayed start");
                *state = PollerState::StopRequested;
            }
            PollerState::Unstarted => {
                warn!(target: "fabric.poller", poller = %self.name, "requested STOP on unstarted poller");
                *state = PollerState::Stopped;
            }
            other => {
                warn!(target: "fabric.poller", poller = %self.name, state = ?other, "requested STOP on poller state");
            }
        }
        self.shared.stop_signal.notify_all();
        self.shared.pause_release.notify_all();
    }

    /// 等待工作线程退出（需先调用 `stop`）。
    pub fn join(&self) -> Result<(), PollerError> {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match handle {
            Some(handle) => handle.join().map_err(|_| PollerError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

/// 丢弃只请求停止，不等待工作线程；需要确认线程已退出时先 `stop` 再 `join`。
impl Drop for Poller {
    fn drop(&mut self) {
        let pending = self
            .worker
            .get_mut()
            .map(|worker| worker.is_some())
            .unwrap_or(false);
        let mut state = self.shared.lock();
        let live = matches!(
            *state,
            PollerState::Running | PollerState::PauseRequested | PollerState::Paused
        );
        if live || (pending && *state == PollerState::Unstarted) {
            *state = PollerState::StopRequested;
            self.shared.stop_signal.notify_all();
            self.shared.pause_release.notify_all();
        }
    }
}

fn run_worker(
    name: String,
    interval: Duration,
    due: Option<Duration>,
    shared: Arc<Shared>,
    mut action: Action,
) {
    if let Some(due) = due {
        let state = shared.lock();
        let (mut state, _) = shared
            .stop_signal
            .wait_timeout_while(state, due, |s| *s != PollerState::StopRequested)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *state == PollerState::StopRequested {
            *state = PollerState::Stopped;
            debug!(target: "fabric.poller", poller = %name, "stopped before delayed start");
            return;
        }
        *state = PollerState::Running;
    }

    loop {
        match catch_unwind(AssertUnwindSafe(|| action())) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(target: "fabric.poller", poller = %name, error = %err, "poll action failed");
            }
            Err(_) => {
                error!(target: "fabric.poller", poller = %name, "poll action panicked");
            }
        }

        let state = shared.lock();
        let (mut state, _) = shared
            .stop_signal
            .wait_timeout_while(state, interval, |s| *s != PollerState::StopRequested)
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if *state == PollerState::PauseRequested {
            *state = PollerState::Paused;
            state = shared
                .pause_release
                .wait_while(state, |s| *s == PollerState::Paused)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        if *state == PollerState::StopRequested {
            *state = PollerState::Stopped;
            break;
        }
    }
    debug!(target: "fabric.poller", poller = %name, "poller exiting");
}
