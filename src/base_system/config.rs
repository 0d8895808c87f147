//! 配置文件读写与带注释生成。

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    pub name: &'static str,
    pub description: &'static str,
}

pub trait ConfigSpec: Serialize + DeserializeOwned + Default {
    const FILE_NAME: &'static str;
    fn fields() -> &'static [FieldMeta];

    /// 反序列化之后的语义校验，默认全部通过。
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// 读取配置；文件不存在时写入带注释的默认配置。
///
/// 已有文件会覆盖在默认值之上合并，缺失字段补全后回写。
pub fn load_or_create<T: ConfigSpec>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        let default_config = T::default();
        write_with_comments(&default_config, path)?;
        info!(target: "startup", "已生成默认配置文件: {}", path.display());
        return Ok(default_config);
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: T = parse_merged(&raw, path)?;
    config.validate().map_err(ConfigError::Validation)?;

    if has_missing_fields::<T>(&raw, path)? {
        write_with_comments(&config, path)?;
        info!(target: "startup", "配置文件缺少字段，已补全: {}", path.display());
    }

    Ok(config)
}

/// 在 `base_dir` 下按 `T::FILE_NAME` 定位配置。
pub fn load_or_create_in<T: ConfigSpec>(base_dir: &Path) -> Result<T, ConfigError> {
    load_or_create(&base_dir.join(T::FILE_NAME))
}

fn parse_merged<T: ConfigSpec>(raw: &str, path: &Path) -> Result<T, ConfigError> {
    let user_yaml: Value = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut merged = serde_yaml::to_value(T::default())
        .map_err(|err| ConfigError::Validation(err.to_string()))?;
    // 空文件解析为 Null，按全默认处理
    if !user_yaml.is_null() {
        merge_values(&mut merged, user_yaml);
    }

    serde_yaml::from_value(merged).map_err(|err| ConfigError::Validation(err.to_string()))
}

/// 写入临时文件后原子替换，避免中途退出留下半截配置。
pub fn write_with_comments<T: ConfigSpec>(config: &T, path: &Path) -> Result<(), ConfigError> {
    let yaml = generate_yaml_with_comments(config)?;
    write_atomic(path, yaml.as_bytes()).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn generate_yaml_with_comments<T: ConfigSpec>(config: &T) -> Result<String, ConfigError> {
    let value =
        serde_yaml::to_value(config).map_err(|err| ConfigError::Validation(err.to_string()))?;
    let mapping = match value {
        Value::Mapping(map) => map,
        _ => {
            return Err(ConfigError::Validation(
                "config must serialize to a mapping".to_string(),
            ));
        }
    };

    let mut lines = Vec::new();
    for field in T::fields() {
        if !field.description.is_empty() {
            lines.push(format!("# {}", field.description.replace('\n', "\n# ")));
        }
        let key = Value::String(field.name.to_string());
        let val = mapping.get(&key).cloned().unwrap_or(Value::Null);
        let yaml_line = serde_yaml::to_string(&serde_yaml::Mapping::from_iter([(key, val)]))
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        lines.push(yaml_line.trim().to_string());
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

/// 原子写文件：同目录临时文件 + rename。
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn has_missing_fields<T: ConfigSpec>(raw: &str, path: &Path) -> Result<bool, ConfigError> {
    let user_yaml: Value = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let Value::Mapping(map) = user_yaml else {
        return Ok(true);
    };
    Ok(T::fields()
        .iter()
        .any(|field| !map.contains_key(Value::String(field.name.to_string()))))
}

fn merge_values(default: &mut Value, user: Value) {
    match (default, user) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            for (key, user_val) in src {
                if let Some(dest_val) = dest.get_mut(&key) {
                    merge_values(dest_val, user_val);
                } else {
                    dest.insert(key, user_val);
                }
            }
        }
        (dest, other) => {
            *dest = other;
        }
    }
}
