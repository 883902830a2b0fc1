//! 에러 타입 — 도메인별 에러 정의

/// Rampart 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RampartError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 분석 파이프라인 에러
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// 공유 저장소 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 알림 전달 에러
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 분석 파이프라인 에러
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// 레코드 파싱 실패 (배치 수준에서는 드롭으로 처리)
    #[error("parse failed: {reason}")]
    Parse { reason: String },

    /// 분류 규칙 테이블 에러
    #[error("classification rule error: {0}")]
    Rule(String),

    /// 파이프라인 조립/실행 에러
    #[error("pipeline failed: {0}")]
    Pipeline(String),
}

/// 공유 저장소 에러
///
/// 캠페인 카운터 저장소, 이벤트 저장소, 알림 설정 저장소의
/// 공통 실패 유형입니다.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 저장소 접근 불가
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// 조회 실패
    #[error("query failed: {0}")]
    Query(String),

    /// 직렬화/역직렬화 실패
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// 알림 전달 에러 — 채널 단위, 배치에 치명적이지 않음
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// 채널 전달 실패
    #[error("channel '{channel}' delivery failed: {reason}")]
    Channel { channel: String, reason: String },

    /// 채널 전달 타임아웃
    #[error("channel '{channel}' timed out after {secs}s")]
    Timeout { channel: String, secs: u64 },

    /// 채널 설정 불완전 (대상 식별자 누락 등)
    #[error("channel '{channel}' misconfigured: {reason}")]
    Misconfigured { channel: String, reason: String },
}
