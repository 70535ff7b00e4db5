//! 应用运行配置与映射配置加载。

mod mapping;
mod validate;

pub use mapping::{
    ActivityMapping, CustomPropertyMapping, DeviceMapping, FORMAT_PLACEHOLDER, FeedbackMode,
    FeedbackSettings, PropertyMapping, RoomStateActions, StandardPropertiesConfig,
    UdmCwsConfiguration,
};

use std::env;
use std::path::Path;

/// 配置加载错误；启动期致命。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("duplicate device key: {0}")]
    DuplicateDeviceKey(String),
    #[error("duplicate device index: {0}")]
    DuplicateDeviceIndex(usize),
    #[error("device index {index} for {key} outside 1..={slots}")]
    DeviceIndexOutOfRange {
        key: String,
        index: usize,
        slots: usize,
    },
    #[error("unknown device key in {context}: {key}")]
    UnknownDeviceKey { context: String, key: String },
    #[error("unknown property path in {context}: {path}")]
    UnknownPropertyPath { context: String, path: String },
    #[error("invalid custom property key: {0}")]
    InvalidPropertyKey(String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub config_path: Option<String>,
    pub app_number: u8,
    pub input_capacity: usize,
    pub event_capacity: usize,
    pub feedback_mode: Option<FeedbackMode>,
    pub api_version: Option<String>,
    pub psk: Option<String>,
    pub route_prefix: Option<String>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("UDM_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let config_path = read_optional("UDM_CONFIG_PATH");
        let app_number = read_u8_with_default("UDM_APP_NUMBER", 1)?;
        if app_number == 0 || app_number > 99 {
            return Err(ConfigError::Invalid(
                "UDM_APP_NUMBER".to_string(),
                app_number.to_string(),
            ));
        }
        let input_capacity = read_usize_with_default("UDM_INPUT_CAPACITY", 1024)?;
        let event_capacity = read_usize_with_default("UDM_EVENT_CAPACITY", 256)?;
        let feedback_mode = match read_optional("UDM_FEEDBACK_MODE") {
            Some(value) => Some(
                value
                    .parse::<FeedbackMode>()
                    .map_err(|_| ConfigError::Invalid("UDM_FEEDBACK_MODE".to_string(), value))?,
            ),
            None => None,
        };
        let api_version = read_optional("UDM_API_VERSION");
        let psk = read_optional("UDM_PSK");
        let route_prefix = read_optional("UDM_ROUTE_PREFIX");

        Ok(Self {
            http_addr,
            config_path,
            app_number,
            input_capacity,
            event_capacity,
            feedback_mode,
            api_version,
            psk,
            route_prefix,
        })
    }

    /// 读取映射配置（未配置文件时使用默认配置），叠加环境变量覆盖后校验。
    pub fn load_configuration(&self) -> Result<UdmCwsConfiguration, ConfigError> {
        let mut configuration = match self.config_path.as_deref() {
            Some(path) => read_configuration(path)?,
            None => UdmCwsConfiguration::default(),
        };
        self.apply_overrides(&mut configuration);
        configuration.validate()?;
        Ok(configuration)
    }

    /// 环境变量覆盖配置文件中的同名项。
    pub fn apply_overrides(&self, configuration: &mut UdmCwsConfiguration) {
        if let Some(mode) = self.feedback_mode {
            configuration.feedback_mode = mode;
        }
        if let Some(version) = &self.api_version {
            configuration.api_version = version.clone();
        }
        if let Some(psk) = &self.psk {
            configuration.psk = psk.clone();
        }
        if let Some(prefix) = &self.route_prefix {
            configuration.route_prefix = prefix.clone();
        }
    }

    /// 路由基础路径，例如 `/app01/udmcws`。
    pub fn base_path(&self) -> String {
        format!("/app{:02}/udmcws", self.app_number)
    }
}

/// 读取、解析并校验映射配置文件。
pub fn load_configuration(path: impl AsRef<Path>) -> Result<UdmCwsConfiguration, ConfigError> {
    let configuration = read_configuration(path)?;
    configuration.validate()?;
    Ok(configuration)
}

fn read_configuration(path: impl AsRef<Path>) -> Result<UdmCwsConfiguration, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    match value.parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
