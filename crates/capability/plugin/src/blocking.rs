//! 同步变体的运行时桥接。

use crate::error::PluginError;
use std::future::Future;
use tokio::runtime::{Builder, Handle, RuntimeFlavor};

/// 在同步上下文中驱动一个插件 future 直至完成。
///
/// - 多线程运行时内：`block_in_place` + 当前 handle，复用同一个 reactor
/// - 运行时外：临时构建 current-thread 运行时
/// - current-thread 运行时内：返回错误（阻塞唯一的工作线程会使传输 I/O 无法推进）
pub fn block_on<F>(future: F) -> Result<F::Output, PluginError>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::MultiThread => {
                Ok(tokio::task::block_in_place(|| handle.block_on(future)))
            }
            _ => Err(PluginError::Runtime(
                "blocking call inside a current-thread runtime".to_string(),
            )),
        },
        Err(_) => {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| PluginError::Runtime(e.to_string()))?;
            Ok(runtime.block_on(future))
        }
    }
}
