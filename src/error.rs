//! 错误类型：配置存储、校验、应用
//!
//! 所有错误都可恢复，界面负责展示并允许用户重试

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// 校验失败对应的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Address,
    SubnetMask,
    Gateway,
    Dns,
}

impl Field {
    /// 字段在 profiles.json 中的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Address => "address",
            Self::SubnetMask => "subnet_mask",
            Self::Gateway => "gateway",
            Self::Dns => "dns",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 配置中第一个不合法的字段
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("profile name must not be empty")]
    EmptyName,

    #[error("{field} is required for a static profile")]
    Missing { field: Field },

    #[error("{field} is not a valid IPv4 address: {value:?}")]
    InvalidIpv4 { field: Field, value: String },
}

impl ValidationError {
    pub fn field(&self) -> Field {
        match self {
            Self::EmptyName => Field::Name,
            Self::Missing { field } | Self::InvalidIpv4 { field, .. } => *field,
        }
    }
}

/// 读写配置文件失败
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode profiles: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 应用配置到网卡失败
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("no adapter selected")]
    NoAdapter,

    #[error("profile is invalid: {0}")]
    Invalid(#[from] ValidationError),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// 命令返回非零；output 为命令原样输出的错误信息
    #[error("`{command}` exited with {}: {output}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Failed {
        command: String,
        code: Option<i32>,
        output: String,
    },
}

/// 配置列表操作错误（重名、不存在）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("a profile named {0:?} already exists")]
    Duplicate(String),

    #[error("no profile named {0:?}")]
    NotFound(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
