use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{Mode, Profile};
use crate::error::StoreError;

/// profiles.json 的读写
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

/// 旧版文件：{ 名称: "dhcp" | {ip, mask, gateway, dns} }
type LegacyDocument = BTreeMap<String, LegacyEntry>;

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyEntry {
    Keyword(String),
    Static(LegacyStatic),
}

#[derive(Deserialize)]
struct LegacyStatic {
    #[serde(default)]
    ip: String,
    #[serde(default)]
    mask: String,
    #[serde(default)]
    gateway: String,
    #[serde(default)]
    dns: String,
}

impl LegacyEntry {
    fn into_profile(self, name: String) -> Result<Profile, String> {
        match self {
            Self::Keyword(k) if k.eq_ignore_ascii_case("dhcp") => Ok(Profile::dhcp(name, "")),
            Self::Keyword(k) => Err(format!("unknown profile kind {:?} for {:?}", k, name)),
            Self::Static(s) => Ok(Profile {
                name,
                adapter: String::new(),
                mode: Mode::Static,
                address: non_empty(s.ip),
                subnet_mask: non_empty(s.mask),
                gateway: non_empty(s.gateway),
                dns: non_empty(s.dns),
            }),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取全部配置；文件不存在时返回空列表
    pub fn load(&self) -> Result<Vec<Profile>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No profile file at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        // 当前格式为数组，直接解析以保留出错的行列和字段
        let profiles = if content.trim_start().starts_with('{') {
            let entries: LegacyDocument =
                serde_json::from_str(&content).map_err(|source| self.corrupt(source))?;
            warn!(
                "Converting {} legacy profiles from {}",
                entries.len(),
                self.path.display()
            );
            entries
                .into_iter()
                .map(|(name, entry)| entry.into_profile(name))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|msg| self.corrupt(<serde_json::Error as serde::de::Error>::custom(msg)))?
        } else {
            serde_json::from_str::<Vec<Profile>>(&content).map_err(|source| self.corrupt(source))?
        };

        info!("Loaded {} profiles from {}", profiles.len(), self.path.display());
        Ok(profiles)
    }

    /// 整体覆盖写入：先写临时文件再重命名
    pub fn save(&self, profiles: &[Profile]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.write_error(source))?;
        }

        let content = serde_json::to_string_pretty(profiles)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, content).map_err(|source| self.write_error(source))?;

        if let Err(source) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.write_error(source));
        }

        info!("Saved {} profiles to {}", profiles.len(), self.path.display());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn corrupt(&self, source: serde_json::Error) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            source,
        }
    }

    fn write_error(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}
