//! JSON 文件存储的公共读写逻辑

use crate::error::{MemoryError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 读取整个 JSON 文件；文件不存在视为空表
pub(crate) async fn read_table<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(MemoryError::ReadFailed(format!("{}: {e}", path.display())).into());
        }
    };
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&raw)
        .map_err(|e| MemoryError::ReadFailed(format!("{}: {e}", path.display())).into())
}

/// 先写临时文件再 rename，避免写到一半的文件被读到
pub(crate) async fn write_table<T: Serialize>(path: &Path, table: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(table)
        .map_err(|e| MemoryError::Serialization(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| MemoryError::Io(format!("写入 {} 失败: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| MemoryError::Io(format!("替换 {} 失败: {e}", path.display())))?;
    debug!(path = %path.display(), "💾 已持久化");
    Ok(())
}

/// 展开 `~/`，并创建父目录
pub(crate) fn prepare_path(path: &Path) -> Result<PathBuf> {
    let path = expand_tilde(path);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| MemoryError::Io(format!("创建目录失败: {e}")))?;
    }
    Ok(path)
}

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/")
        && let Some(home) = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())
    {
        return PathBuf::from(home).join(rest);
    }
    path.to_path_buf()
}
