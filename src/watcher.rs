//! 监视 profiles.json 的外部修改

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
}

impl StoreWatcher {
    /// 监视配置文件所在目录，文件本身有变动时调用 `on_change`
    pub fn new<F>(profiles_path: &Path, on_change: F) -> notify::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let target = absolute(profiles_path);
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = target.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let touches_store = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if touches_store && (event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
                    on_change();
                }
            }
            Err(e) => warn!("Watch error: {:?}", e),
        })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Watching {} for profile changes", target.display());

        Ok(Self { _watcher: watcher })
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
