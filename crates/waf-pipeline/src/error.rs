//! WAF 파이프라인 에러 타입
//!
//! [`WafPipelineError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<WafPipelineError> for RampartError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use rampart_core::error::{AnalysisError, RampartError, StoreError};

/// WAF 파이프라인 도메인 에러
///
/// 파싱, 분류 규칙 로딩, 캠페인 저장소 접근, 알림 전달 등
/// 파이프라인 내부의 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum WafPipelineError {
    /// 레코드 파싱 실패
    #[error("parse error: {field}: {reason}")]
    Parse {
        /// 문제가 된 필드명
        field: String,
        /// 실패 사유
        reason: String,
    },

    /// 분류 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 분류 규칙 유효성 검증 실패
    #[error("rule validation error: rule '{rule_id}': {reason}")]
    RuleValidation {
        /// 문제가 된 규칙 ID
        rule_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 캠페인 저장소 에러
    ///
    /// 캠페인 과소 집계는 보안 관련 실패이므로 호출자에게
    /// 이벤트 단위로 표면화되어야 합니다.
    #[error("campaign store error: {0}")]
    Store(#[from] StoreError),

    /// 알림 전달 에러 (채널 단위)
    #[error("delivery error: {channel}: {reason}")]
    Delivery {
        /// 채널 이름
        channel: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// HTTP 클라이언트 에러
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<WafPipelineError> for RampartError {
    fn from(err: WafPipelineError) -> Self {
        match err {
            WafPipelineError::Store(store) => RampartError::Store(store),
            other => RampartError::Analysis(AnalysisError::Pipeline(other.to_string())),
        }
    }
}
