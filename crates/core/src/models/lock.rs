use std::time::Duration;

/// 生成128位随机持有者令牌（32位十六进制）
pub fn generate_owner_token() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// 一次成功获取的锁
///
/// `owner` 是本次获取时新生成的随机令牌，释放和续期都必须出示该令牌。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub key: String,
    pub owner: String,
    pub ttl: Duration,
}

impl LockLease {
    pub fn new(key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            owner: generate_owner_token(),
            ttl,
        }
    }
}
