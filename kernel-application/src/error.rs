use kernel_domain::error::KernelError;

/// 命令处理错误
///
/// - `NotAuthorizedToRunCommand`：终态，原样暴露给调用方；
/// - `UnableToHandleCommand`：包装存储与并发失败，调用方不与存储细节耦合；
///   其中并发冲突可由调用方重试（内核不自动重试）；
/// - `Domain`：聚合自身声明的领域错误，终态。
#[derive(thiserror::Error, Debug)]
pub enum CommandError<E> {
    #[error("not authorized to run command: {command}")]
    NotAuthorizedToRunCommand { command: &'static str },

    #[error("unable to handle command: {0}")]
    UnableToHandleCommand(#[source] KernelError),

    #[error(transparent)]
    Domain(E),
}

impl<E> CommandError<E> {
    /// 仅并发冲突可重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UnableToHandleCommand(err) if err.is_concurrency_conflict())
    }

    pub fn domain(&self) -> Option<&E> {
        match self {
            Self::Domain(e) => Some(e),
            _ => None,
        }
    }
}
