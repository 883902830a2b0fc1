//! 설정 관리 — rampart.toml 파싱 및 런타임 설정
//!
//! [`RampartConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`RAMPART_PIPELINE_BATCH_LIMIT=200` 형식)
//! 3. 설정 파일 (`rampart.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), rampart_core::error::RampartError> {
//! use rampart_core::config::RampartConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = RampartConfig::load("rampart.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = RampartConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, RampartError};

/// Rampart 통합 설정
///
/// `rampart.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RampartConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 분석 파이프라인 설정
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl RampartConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RampartError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RampartError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RampartError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RampartError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, RampartError> {
        toml::from_str(toml_str).map_err(|e| {
            RampartError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `RAMPART_{SECTION}_{FIELD}`
    /// 예: `RAMPART_PIPELINE_BATCH_LIMIT=200`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "RAMPART_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "RAMPART_GENERAL_LOG_FORMAT");

        // Pipeline
        override_bool(&mut self.pipeline.enabled, "RAMPART_PIPELINE_ENABLED");
        override_usize(
            &mut self.pipeline.batch_limit,
            "RAMPART_PIPELINE_BATCH_LIMIT",
        );
        override_usize(
            &mut self.pipeline.parallelism,
            "RAMPART_PIPELINE_PARALLELISM",
        );
        override_u64(
            &mut self.pipeline.delivery_timeout_secs,
            "RAMPART_PIPELINE_DELIVERY_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.pipeline.campaign_max_age_secs,
            "RAMPART_PIPELINE_CAMPAIGN_MAX_AGE_SECS",
        );
        override_opt_string(&mut self.pipeline.rule_dir, "RAMPART_PIPELINE_RULE_DIR");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), RampartError> {
        self.general.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }
}

/// 일반 설정 — 로깅 등 프로세스 전역 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), RampartError> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.as_str()) {
            return Err(RampartError::Config(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("'{}' is not one of {:?}", self.log_level, LEVELS),
            }));
        }

        const FORMATS: &[&str] = &["json", "pretty"];
        if !FORMATS.contains(&self.log_format.as_str()) {
            return Err(RampartError::Config(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("'{}' is not one of {:?}", self.log_format, FORMATS),
            }));
        }

        Ok(())
    }
}

/// 분석 파이프라인 설정 — `[pipeline]` 섹션
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// 활성화 여부
    pub enabled: bool,
    /// 배치 분석 모드의 1회 호출당 최대 이벤트 수
    pub batch_limit: usize,
    /// 호출 내 이벤트 처리 병렬도 상한
    pub parallelism: usize,
    /// 채널별 전달 타임아웃 (초)
    pub delivery_timeout_secs: u64,
    /// 캠페인 상태 보존 최대 기간 (초)
    pub campaign_max_age_secs: u64,
    /// 분류 규칙 디렉토리 (없으면 내장 규칙 테이블만 사용)
    #[serde(default)]
    pub rule_dir: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_limit: 500,
            parallelism: 16,
            delivery_timeout_secs: 5,
            campaign_max_age_secs: 86_400,
            rule_dir: None,
        }
    }
}

impl PipelineSettings {
    fn validate(&self) -> Result<(), RampartError> {
        const MAX_BATCH_LIMIT: usize = 10_000;
        const MAX_PARALLELISM: usize = 256;
        const MAX_DELIVERY_TIMEOUT_SECS: u64 = 120;

        if self.batch_limit == 0 || self.batch_limit > MAX_BATCH_LIMIT {
            return Err(RampartError::Config(ConfigError::InvalidValue {
                field: "pipeline.batch_limit".to_owned(),
                reason: format!("must be 1-{MAX_BATCH_LIMIT}"),
            }));
        }

        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(RampartError::Config(ConfigError::InvalidValue {
                field: "pipeline.parallelism".to_owned(),
                reason: format!("must be 1-{MAX_PARALLELISM}"),
            }));
        }

        if self.delivery_timeout_secs == 0 || self.delivery_timeout_secs > MAX_DELIVERY_TIMEOUT_SECS
        {
            return Err(RampartError::Config(ConfigError::InvalidValue {
                field: "pipeline.delivery_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_DELIVERY_TIMEOUT_SECS}"),
            }));
        }

        if self.campaign_max_age_secs == 0 {
            return Err(RampartError::Config(ConfigError::InvalidValue {
                field: "pipeline.campaign_max_age_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }));
        }

        Ok(())
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *target = value;
    }
}

fn override_opt_string(target: &mut Option<String>, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *target = Some(value);
    }
}

fn override_bool(target: &mut bool, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(var, value, "ignoring invalid bool env override"),
        }
    }
}

fn override_usize(target: &mut usize, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(var, value, "ignoring invalid integer env override"),
        }
    }
}

fn override_u64(target: &mut u64, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(var, value, "ignoring invalid integer env override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RampartConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn parse_minimal_toml() {
        let config = RampartConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.pipeline.batch_limit, 500);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[general]
log_level = "debug"
log_format = "json"

[pipeline]
enabled = true
batch_limit = 200
parallelism = 8
delivery_timeout_secs = 3
campaign_max_age_secs = 3600
rule_dir = "/etc/rampart/rules"
"#;
        let config = RampartConfig::parse(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.pipeline.batch_limit, 200);
        assert_eq!(config.pipeline.parallelism, 8);
        assert_eq!(
            config.pipeline.rule_dir.as_deref(),
            Some("/etc/rampart/rules")
        );
    }

    #[test]
    fn parse_invalid_toml_fails() {
        assert!(RampartConfig::parse("not [valid toml").is_err());
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let mut config = RampartConfig::default();
        config.general.log_level = "verbose".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_log_format() {
        let mut config = RampartConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_batch_limit() {
        let mut config = RampartConfig::default();
        config.pipeline.batch_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_huge_batch_limit() {
        let mut config = RampartConfig::default();
        config.pipeline.batch_limit = 1_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_parallelism() {
        let mut config = RampartConfig::default();
        config.pipeline.parallelism = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_delivery_timeout() {
        let mut config = RampartConfig::default();
        config.pipeline.delivery_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = RampartConfig::from_file("/nonexistent/rampart.toml").await;
        assert!(matches!(
            result,
            Err(RampartError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn from_file_loads_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rampart.toml");
        tokio::fs::write(&path, "[pipeline]\nbatch_limit = 50\n")
            .await
            .unwrap();

        let config = RampartConfig::from_file(&path).await.unwrap();
        assert_eq!(config.pipeline.batch_limit, 50);
    }
}
