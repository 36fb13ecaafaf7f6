//! 应用配置
//!
//! 加载顺序：内置默认值 → waldo.toml / config/waldo.toml（存在则读）
//! → 环境变量 `WALDO__*` 覆盖（双下划线表示嵌套，如
//! `WALDO__SUPERVISOR__TICK_MS=100`）。
//!
//! 核心库本身只吃注入的参数结构，这里是宿主把文件 / 环境变量
//! 折算成那些结构的地方。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::supervisor::SupervisorConfig;
use crate::net::channel::ChannelOptions;
use crate::processes::{CalibrationConfig, ChargingConfig};
use crate::recovery::RecoveryConfig;

/// 应用配置根
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub channel: ChannelSection,
    pub supervisor: SupervisorSection,
    pub charging: ChargingSection,
    pub calibration: CalibrationSection,
    pub execution: ExecutionSection,
    pub recovery: RecoverySection,
}

/// [channel] 段：作业通道的建连与停机参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelSection {
    pub connect_timeout_secs: u64,
    pub stop_grace_secs: u64,
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            stop_grace_secs: 5,
        }
    }
}

impl ChannelSection {
    pub fn to_options(&self) -> ChannelOptions {
        ChannelOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            stop_grace: Duration::from_secs(self.stop_grace_secs),
        }
    }
}

/// [supervisor] 段：轮询周期
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    pub tick_ms: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self { tick_ms: 200 }
    }
}

impl SupervisorSection {
    pub fn to_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            tick: Duration::from_millis(self.tick_ms),
        }
    }
}

/// [charging] 段：自动充电
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChargingSection {
    pub settle_delay_secs: u64,
    pub ack_timeout_secs: u64,
}

impl Default for ChargingSection {
    fn default() -> Self {
        Self {
            settle_delay_secs: 30,
            ack_timeout_secs: 120,
        }
    }
}

impl ChargingSection {
    pub fn to_config(&self) -> ChargingConfig {
        ChargingConfig {
            settle_delay: Duration::from_secs(self.settle_delay_secs),
            ack_timeout: Duration::from_secs(self.ack_timeout_secs),
        }
    }
}

/// [calibration] 段：自动标定
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalibrationSection {
    /// 两次标定之间允许的最长间隔（分钟）
    pub interval_minutes: u64,
    pub ack_timeout_secs: u64,
}

impl Default for CalibrationSection {
    fn default() -> Self {
        Self {
            interval_minutes: 240,
            ack_timeout_secs: 120,
        }
    }
}

impl CalibrationSection {
    pub fn to_config(&self) -> CalibrationConfig {
        CalibrationConfig {
            interval: Duration::from_secs(self.interval_minutes * 60),
            ack_timeout: Duration::from_secs(self.ack_timeout_secs),
        }
    }
}

/// [execution] 段：任务执行
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// 恢复请求无确认时的重发间隔（秒）
    pub resume_resend_secs: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            resume_resend_secs: 120,
        }
    }
}

impl ExecutionSection {
    pub fn resume_resend(&self) -> Duration {
        Duration::from_secs(self.resume_resend_secs)
    }
}

/// [recovery] 段：恢复与升级控制器
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecoverySection {
    pub max_retries: u32,
    pub check_interval_secs: u64,
    pub human_wait_secs: u64,
    pub probe_settle_ms: u64,
    pub retry_pause_ms: u64,
}

impl Default for RecoverySection {
    fn default() -> Self {
        Self {
            max_retries: 10,
            check_interval_secs: 60,
            human_wait_secs: 300,
            probe_settle_ms: 1000,
            retry_pause_ms: 2000,
        }
    }
}

impl RecoverySection {
    pub fn to_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            max_retries: self.max_retries,
            check_interval: Duration::from_secs(self.check_interval_secs),
            human_wait: Duration::from_secs(self.human_wait_secs),
            probe_settle: Duration::from_millis(self.probe_settle_ms),
            retry_pause: Duration::from_millis(self.retry_pause_ms),
        }
    }
}

/// 从文件与环境变量加载配置
///
/// 1. 按顺序查找 waldo.toml、config/waldo.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WALDO__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["waldo", "config/waldo"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WALDO")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_builtin_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.charging.to_config().settle_delay, Duration::from_secs(30));
        assert_eq!(cfg.charging.to_config().ack_timeout, Duration::from_secs(120));
        assert_eq!(cfg.calibration.to_config().interval, Duration::from_secs(240 * 60));
        assert_eq!(cfg.recovery.max_retries, 10);
        assert_eq!(cfg.recovery.to_config().check_interval, Duration::from_secs(60));
        assert_eq!(cfg.recovery.to_config().human_wait, Duration::from_secs(300));
        assert_eq!(cfg.channel.to_options().connect_timeout, Duration::from_secs(10));
        assert_eq!(cfg.supervisor.to_config().tick, Duration::from_millis(200));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[supervisor]\ntick_ms = 50\n\n[charging]\nsettle_delay_secs = 2\n"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.supervisor.tick_ms, 50);
        assert_eq!(cfg.charging.settle_delay_secs, 2);
        // 没写的键保持默认
        assert_eq!(cfg.charging.ack_timeout_secs, 120);
        assert_eq!(cfg.recovery.max_retries, 10);
    }
}
