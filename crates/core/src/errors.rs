use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("键值存储错误: {0}")]
    Store(String),

    #[error("消息通道错误: {0}")]
    Channel(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("摘要生成错误: {0}")]
    Generation(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// 基础设施类错误（存储、通道、数据库不可达）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SchedulerError::Database(_) | SchedulerError::Store(_) | SchedulerError::Channel(_)
        )
    }

    /// 用于指标标签的错误分类
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerError::Database(_) => "database",
            SchedulerError::Store(_) => "store",
            SchedulerError::Channel(_) => "channel",
            SchedulerError::Serialization(_) => "serialization",
            SchedulerError::Generation(_) => "generation",
            SchedulerError::Configuration(_) => "configuration",
            SchedulerError::InvalidArgument(_) => "invalid_argument",
            SchedulerError::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SchedulerError::Store("down".to_string()).is_transient());
        assert!(SchedulerError::Channel("closed".to_string()).is_transient());
        assert!(!SchedulerError::Serialization("bad".to_string()).is_transient());
        assert!(!SchedulerError::Generation("boom".to_string()).is_transient());
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err: SchedulerError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert_eq!(err.kind(), "serialization");
    }
}
