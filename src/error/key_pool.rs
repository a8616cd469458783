use thiserror::Error;

/// 密钥选择相关错误
#[derive(Debug, Error)]
pub enum KeyPoolError {
    #[error("密钥池为空，未配置任何上游密钥")]
    PoolEmpty,

    #[error("所有密钥均处于禁用状态 (共 {pool_size} 个)")]
    AllCredentialsDisabled { pool_size: usize },
}
