//! WAF 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의
//! [`PipelineSettings`](rampart_core::config::PipelineSettings)를 기반으로
//! 파이프라인 전용 확장 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use rampart_core::config::RampartConfig;
//! use rampart_waf_pipeline::config::PipelineConfig;
//!
//! let core_config = RampartConfig::default();
//! let config = PipelineConfig::from_core(&core_config.pipeline);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::WafPipelineError;

/// WAF 파이프라인 설정
///
/// core의 `PipelineSettings`에서 파생되며, 파이프라인 내부에서
/// 사용하는 추가 설정을 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
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
    pub rule_dir: Option<String>,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 추적하는 (조직, IP) 키 최대 수 (메모리 성장 제한)
    pub max_tracked_keys: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_limit: 500,
            parallelism: 16,
            delivery_timeout_secs: 5,
            campaign_max_age_secs: 86_400,
            rule_dir: None,
            max_tracked_keys: 100_000,
        }
    }
}

impl PipelineConfig {
    /// core의 `PipelineSettings`에서 파이프라인 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &rampart_core::config::PipelineSettings) -> Self {
        Self {
            enabled: core.enabled,
            batch_limit: core.batch_limit,
            parallelism: core.parallelism,
            delivery_timeout_secs: core.delivery_timeout_secs,
            campaign_max_age_secs: core.campaign_max_age_secs,
            rule_dir: core.rule_dir.clone(),
            ..Self::default()
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WafPipelineError> {
        const MAX_BATCH_LIMIT: usize = 10_000;
        const MAX_PARALLELISM: usize = 256;
        const MAX_DELIVERY_TIMEOUT_SECS: u64 = 120;
        const MAX_TRACKED_KEYS: usize = 10_000_000;

        if self.batch_limit == 0 || self.batch_limit > MAX_BATCH_LIMIT {
            return Err(WafPipelineError::Config {
                field: "batch_limit".to_owned(),
                reason: format!("must be 1-{MAX_BATCH_LIMIT}"),
            });
        }

        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(WafPipelineError::Config {
                field: "parallelism".to_owned(),
                reason: format!("must be 1-{MAX_PARALLELISM}"),
            });
        }

        if self.delivery_timeout_secs == 0 || self.delivery_timeout_secs > MAX_DELIVERY_TIMEOUT_SECS
        {
            return Err(WafPipelineError::Config {
                field: "delivery_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_DELIVERY_TIMEOUT_SECS}"),
            });
        }

        if self.campaign_max_age_secs == 0 {
            return Err(WafPipelineError::Config {
                field: "campaign_max_age_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_tracked_keys == 0 || self.max_tracked_keys > MAX_TRACKED_KEYS {
            return Err(WafPipelineError::Config {
                field: "max_tracked_keys".to_owned(),
                reason: format!("must be 1-{MAX_TRACKED_KEYS}"),
            });
        }

        Ok(())
    }

    /// 전달 타임아웃을 `Duration`으로 반환합니다.
    pub fn delivery_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.delivery_timeout_secs)
    }

    /// 캠페인 상태 보존 기간을 `Duration`으로 반환합니다.
    pub fn campaign_max_age(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.campaign_max_age_secs)
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 활성화 여부를 설정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 배치 크기 상한을 설정합니다.
    pub fn batch_limit(mut self, limit: usize) -> Self {
        self.config.batch_limit = limit;
        self
    }

    /// 병렬도를 설정합니다.
    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.config.parallelism = parallelism;
        self
    }

    /// 전달 타임아웃(초)을 설정합니다.
    pub fn delivery_timeout_secs(mut self, secs: u64) -> Self {
        self.config.delivery_timeout_secs = secs;
        self
    }

    /// 캠페인 상태 보존 기간(초)을 설정합니다.
    pub fn campaign_max_age_secs(mut self, secs: u64) -> Self {
        self.config.campaign_max_age_secs = secs;
        self
    }

    /// 분류 규칙 디렉토리를 설정합니다.
    pub fn rule_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.rule_dir = Some(dir.into());
        self
    }

    /// 추적 키 상한을 설정합니다.
    pub fn max_tracked_keys(mut self, max: usize) -> Self {
        self.config.max_tracked_keys = max;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, WafPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
