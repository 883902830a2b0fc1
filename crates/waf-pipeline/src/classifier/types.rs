//! 분류 규칙 데이터 타입
//!
//! 위협 분류 규칙은 하드코딩된 로직이 아니라 주입 가능한 데이터입니다.
//! YAML 규칙 세트 파일에서 역직렬화되는 구조체들을 정의합니다.

use rampart_core::types::{RecommendedAction, Severity, ThreatType};
use serde::{Deserialize, Serialize};

use crate::error::WafPipelineError;

/// 분류 규칙 세트 -- 하나의 YAML 규칙 파일에 대응합니다.
///
/// # YAML 스키마
/// ```yaml
/// version: "2026.08"
/// rules:
///   - id: sqli_rule_hit
///     title: SQL injection attempt
///     threat_type: sql_injection
///     severity: high
///     recommended_action: block
///     conditions:
///       - field: rule
///         modifier: contains
///         value: SQLi
///       - field: action
///         value: BLOCK
///     indicators:
///       - "terminating rule flagged SQL injection"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRuleSet {
    /// 규칙 테이블 버전
    pub version: String,
    /// 규칙 목록
    #[serde(default)]
    pub rules: Vec<ClassificationRule>,
}

/// 분류 규칙 -- 이벤트 패턴을 위협 판정으로 매핑합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// 규칙 고유 ID (테이블 내에서 유일해야 함)
    pub id: String,
    /// 규칙 제목 (알림에 표시)
    pub title: String,
    /// 규칙 설명
    #[serde(default)]
    pub description: String,
    /// 판정할 위협 유형
    pub threat_type: ThreatType,
    /// 판정할 심각도
    pub severity: Severity,
    /// 권장 대응
    #[serde(default)]
    pub recommended_action: RecommendedAction,
    /// 매칭 조건 목록 (AND 결합)
    pub conditions: Vec<FieldCondition>,
    /// 매칭 시 알림에 실릴 지표 문자열
    #[serde(default)]
    pub indicators: Vec<String>,
}

impl ClassificationRule {
    /// 규칙의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WafPipelineError> {
        if self.id.is_empty() {
            return Err(WafPipelineError::RuleValidation {
                rule_id: "(empty)".to_owned(),
                reason: "rule id must not be empty".to_owned(),
            });
        }

        if self.id.len() > 256 {
            return Err(WafPipelineError::RuleValidation {
                rule_id: self.id.clone(),
                reason: "rule id must not exceed 256 characters".to_owned(),
            });
        }

        if self.title.is_empty() {
            return Err(WafPipelineError::RuleValidation {
                rule_id: self.id.clone(),
                reason: "rule title must not be empty".to_owned(),
            });
        }

        // 조건 없는 규칙은 모든 이벤트에 매칭되므로 금지합니다
        if self.conditions.is_empty() {
            return Err(WafPipelineError::RuleValidation {
                rule_id: self.id.clone(),
                reason: "rule must have at least one condition".to_owned(),
            });
        }

        for (idx, condition) in self.conditions.iter().enumerate() {
            if condition.value.is_empty() {
                return Err(WafPipelineError::RuleValidation {
                    rule_id: self.id.clone(),
                    reason: format!("condition[{idx}] value must not be empty"),
                });
            }
        }

        Ok(())
    }
}

/// 필드 매칭 조건
///
/// 하나의 이벤트 필드에 대한 매칭 조건을 나타냅니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCondition {
    /// 대상 필드
    pub field: MatchField,
    /// 매칭 수정자
    #[serde(default)]
    pub modifier: ConditionModifier,
    /// 매칭할 값
    pub value: String,
}

/// 매칭 대상 필드 -- 분류에 쓰이는 이벤트 필드의 닫힌 집합
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    /// 요청 URI
    Uri,
    /// User-Agent 헤더
    UserAgent,
    /// 매칭된 종결 규칙 식별자
    Rule,
    /// WAF 액션
    Action,
    /// 출발지 국가 코드
    Country,
    /// HTTP 메서드
    Method,
}

/// 조건 수정자 -- 매칭 방식을 결정합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionModifier {
    /// 정확히 일치
    #[default]
    Exact,
    /// 부분 문자열 포함
    Contains,
    /// 접두사 일치
    StartsWith,
    /// 접미사 일치
    EndsWith,
    /// 정규식 매칭
    Regex,
}
