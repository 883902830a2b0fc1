#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`parser`]: 원시 WAF 로그 레코드 파싱 및 타임스탬프 정규화
//! - [`classifier`]: 주입 가능한 규칙 테이블 기반 위협 분류
//! - [`campaign`]: (조직, IP)별 슬라이딩 윈도우 캠페인 탐지
//! - [`alert`]: 알림 생성, 억제 판정, 다채널 동시 전달
//! - [`orchestrator`]: 세 가지 호출 모드의 진입점 및 실행 요약
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! RawLogRecord -> Parser -> Classifier -> CampaignDetector -> AlertEngine -> channels
//!                   |           |               |                 |
//!              drop+count   rule table    shared store      pubsub/webhook/in-app
//! ```

pub mod alert;
pub mod campaign;
pub mod classifier;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod parser;

// --- 주요 타입 re-export ---

// 오케스트레이터
pub use orchestrator::{AnalysisRequest, AnalysisSummary, Orchestrator, OrchestratorBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::WafPipelineError;

// 파서
pub use parser::{ParsedBatch, WafLogParser};

// 분류기
pub use classifier::{ClassificationRule, ClassificationRuleSet, ThreatClassifier};

// 캠페인 탐지
pub use campaign::{
    CAMPAIGN_MILESTONES, CampaignDecision, CampaignDetector, MemoryCampaignStore,
};

// 알림
pub use alert::{AlertEngine, DeliveryResult};
