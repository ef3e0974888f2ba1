mod store;

pub use store::ProfileStore;

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ProfileError, StoreError};
use crate::validate;

/// 覆盖配置文件路径的环境变量
pub const PROFILES_ENV: &str = "IP_RANGE_CHANGER_PROFILES";
/// 默认配置文件（工作目录下）
pub const DEFAULT_PROFILES_FILE: &str = "profiles.json";
/// "添加 DHCP" 未填写名称时的默认名
pub const DEFAULT_DHCP_NAME: &str = "DHCP";

/// 地址获取方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Static,
    #[default]
    Dhcp,
}

/// 单个 IP 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Profile {
    /// 配置名称（唯一）
    pub name: String,
    /// 目标网卡名称，可为空（应用时以界面选择为准）
    #[serde(default)]
    pub adapter: String,
    /// 必填：缺失时视为文件损坏，避免静态配置被当作 DHCP
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
}

impl Profile {
    pub fn dhcp(name: impl Into<String>, adapter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adapter: adapter.into(),
            mode: Mode::Dhcp,
            ..Self::default()
        }
    }

    /// 列表中显示的摘要
    pub fn summary(&self) -> String {
        match self.mode {
            Mode::Dhcp => "DHCP".to_string(),
            Mode::Static => {
                let addr = self.address.as_deref().unwrap_or("?");
                let mask = self.subnet_mask.as_deref().unwrap_or("?");
                match self.gateway.as_deref() {
                    Some(gw) => format!("{} / {} via {}", addr, mask, gw),
                    None => format!("{} / {}", addr, mask),
                }
            }
        }
    }
}

/// 内存中的配置列表，保持插入顺序，保证名称唯一
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileBook {
    profiles: Vec<Profile>,
}

impl ProfileBook {
    /// 从已加载的列表构建，重名的后者被丢弃
    pub fn from_profiles(profiles: Vec<Profile>) -> Self {
        let mut book = Self::default();
        for profile in profiles {
            if book.contains(&profile.name) {
                warn!("Dropping duplicate profile {:?}", profile.name);
                continue;
            }
            book.profiles.push(profile);
        }
        book
    }

    pub fn as_slice(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn add(&mut self, profile: Profile) -> Result<(), ProfileError> {
        validate::validate(&profile)?;
        if self.contains(&profile.name) {
            return Err(ProfileError::Duplicate(profile.name));
        }
        debug!("Adding profile {:?}", profile.name);
        self.profiles.push(profile);
        Ok(())
    }

    /// 用新内容替换名为 `original` 的配置，允许改名但不能与其他配置重名
    pub fn update(&mut self, original: &str, profile: Profile) -> Result<(), ProfileError> {
        validate::validate(&profile)?;
        let idx = self
            .profiles
            .iter()
            .position(|p| p.name == original)
            .ok_or_else(|| ProfileError::NotFound(original.to_string()))?;

        if profile.name != original && self.contains(&profile.name) {
            return Err(ProfileError::Duplicate(profile.name));
        }

        debug!("Updating profile {:?}", original);
        self.profiles[idx] = profile;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Profile, ProfileError> {
        let idx = self
            .profiles
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;
        debug!("Removing profile {:?}", name);
        Ok(self.profiles.remove(idx))
    }
}

/// "添加 DHCP" 使用的名称
pub fn dhcp_name(requested: &str) -> String {
    let name = requested.trim();
    if name.is_empty() {
        DEFAULT_DHCP_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// 应用设置（上次选择的网卡、配置文件位置）
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppSettings {
    #[serde(default)]
    pub last_adapter: Option<String>,
    #[serde(default)]
    pub profiles_path: Option<PathBuf>,
}

impl AppSettings {
    pub fn settings_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ip-range-changer")
            .join("settings.json")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::settings_path())
    }

    /// 读取失败或内容无效时使用默认设置
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring unreadable settings {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("Cannot read settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.save_to(&Self::settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 配置文件路径：环境变量 > 设置 > 工作目录下的 profiles.json
    pub fn profiles_path(&self) -> PathBuf {
        resolve_profiles_path(env::var_os(PROFILES_ENV).map(PathBuf::from), self)
    }
}

fn resolve_profiles_path(from_env: Option<PathBuf>, settings: &AppSettings) -> PathBuf {
    from_env
        .filter(|p| !p.as_os_str().is_empty())
        .or_else(|| settings.profiles_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROFILES_FILE))
}
