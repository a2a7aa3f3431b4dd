//! 外部状态控制信号。
//!
//! 命令经 mpsc 通道送达，由 [`run_state_loop`] 逐条串行执行。

use crate::error::OrchestratorError;
use crate::orchestrator::Orchestrator;
use domain::StateCommand;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

struct StateRequest {
    command: StateCommand,
    reply: Option<oneshot::Sender<Result<(), OrchestratorError>>>,
}

/// 状态控制端（可克隆）。
#[derive(Clone)]
pub struct StateController {
    sender: mpsc::Sender<StateRequest>,
}

/// 状态控制接收端，交给 [`run_state_loop`]。
pub struct StateReceiver {
    receiver: mpsc::Receiver<StateRequest>,
}

/// 创建状态控制通道。
pub fn state_channel(capacity: usize) -> (StateController, StateReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (StateController { sender }, StateReceiver { receiver })
}

impl StateController {
    /// 发送命令并等待执行结果。
    pub async fn send(&self, command: StateCommand) -> Result<(), OrchestratorError> {
        let (reply, result) = oneshot::channel();
        self.sender
            .send(StateRequest {
                command,
                reply: Some(reply),
            })
            .await
            .map_err(|_| OrchestratorError::ControlClosed)?;
        result.await.map_err(|_| OrchestratorError::ControlClosed)?
    }

    /// 只投递命令，不等待结果。
    pub fn signal(&self, command: StateCommand) -> Result<(), OrchestratorError> {
        self.sender
            .try_send(StateRequest {
                command,
                reply: None,
            })
            .map_err(|_| OrchestratorError::ControlClosed)
    }
}

/// 串行执行状态命令；所有控制端关闭后停止拓扑并返回。
pub async fn run_state_loop(orchestrator: Orchestrator, mut receiver: StateReceiver) {
    while let Some(request) = receiver.receiver.recv().await {
        let result = orchestrator.apply(request.command).await;
        if let Err(err) = &result {
            warn!(target: "fabric.orchestrator", command = %request.command, error = %err, "state command failed");
        }
        if let Some(reply) = request.reply {
            let _ = reply.send(result);
        }
    }
    info!(target: "fabric.orchestrator", "state control closed, stopping topology");
    orchestrator.stop().await;
}
