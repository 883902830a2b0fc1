//! 위협 분류기 -- 규칙 테이블 기반 이벤트 분류
//!
//! 주입 가능한 규칙 테이블을 이벤트의 URI, User-Agent, 매칭 규칙 식별자,
//! 액션, 국가에 대해 평가합니다. 정규식 패턴은 규칙 설치 시 한 번만
//! 컴파일하여 캐싱합니다.
//!
//! `classify`는 전역 함수(total function)입니다. 어떤 규칙에도 매칭되지
//! 않는 이벤트는 `{unknown, low, monitor}`로 강등되며, 절대 실패하지
//! 않습니다.
//!
//! # 아키텍처
//! - [`ThreatClassifier`]: 규칙 관리 및 분류 코디네이터
//! - [`loader`]: 내장 기본 테이블 + YAML 파일 로딩
//! - [`types`]: 규칙 데이터 구조 정의

pub mod loader;
pub mod types;

pub use loader::{DEFAULT_RULES_VERSION, RuleLoader, default_rule_set};
pub use types::{
    ClassificationRule, ClassificationRuleSet, ConditionModifier, FieldCondition, MatchField,
};

use std::collections::HashMap;

use regex::Regex;

use rampart_core::types::{ParsedEvent, ThreatAssessment};

use crate::error::WafPipelineError;

/// 위협 분류기 -- 규칙 테이블 관리 및 이벤트 분류
///
/// # 사용 예시
/// ```ignore
/// let mut classifier = ThreatClassifier::with_default_rules()?;
/// classifier.load_rules_from_dir("/etc/rampart/rules").await?;
///
/// let assessment = classifier.classify(&event);
/// ```
pub struct ThreatClassifier {
    /// 설치된 규칙 목록 (설치 순서 유지)
    rules: Vec<ClassificationRule>,
    /// 규칙 테이블 버전
    version: String,
    /// 컴파일된 정규식 캐시: (rule_id, condition_index) -> Regex
    regex_cache: HashMap<(String, usize), Regex>,
}

impl ThreatClassifier {
    /// 규칙 없는 빈 분류기를 생성합니다.
    ///
    /// 빈 분류기는 모든 이벤트를 `unknown`으로 분류합니다.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            version: "empty".to_owned(),
            regex_cache: HashMap::new(),
        }
    }

    /// 내장 기본 규칙 테이블이 설치된 분류기를 생성합니다.
    pub fn with_default_rules() -> Result<Self, WafPipelineError> {
        let mut classifier = Self::new();
        classifier.install(default_rule_set())?;
        Ok(classifier)
    }

    /// 규칙 세트를 설치합니다.
    ///
    /// 같은 ID의 기존 규칙은 교체되고 새 규칙은 추가됩니다.
    /// 설치된 규칙 수를 반환합니다.
    pub fn install(&mut self, set: ClassificationRuleSet) -> Result<usize, WafPipelineError> {
        let count = set.rules.len();

        for rule in set.rules {
            rule.validate()?;
            self.compile_rule(&rule)?;

            if let Some(existing) = self.rules.iter_mut().find(|r| r.id == rule.id) {
                *existing = rule;
            } else {
                self.rules.push(rule);
            }
        }

        self.version = set.version;
        Ok(count)
    }

    /// 디렉토리에서 YAML 규칙 세트를 로드하여 설치합니다.
    ///
    /// 설치된 규칙 수를 반환합니다.
    pub async fn load_rules_from_dir(
        &mut self,
        dir: impl AsRef<std::path::Path>,
    ) -> Result<usize, WafPipelineError> {
        let sets = RuleLoader::load_directory(dir).await?;
        let mut count = 0;
        for set in sets {
            count += self.install(set)?;
        }
        Ok(count)
    }

    /// 설치된 규칙 수를 반환합니다.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 규칙 테이블 버전을 반환합니다.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// 이벤트를 분류합니다. 항상 결과를 생성합니다.
    ///
    /// 여러 규칙이 매칭되면 가장 높은 심각도의 규칙이 위협 유형과
    /// 권장 대응을 결정하고 (동률이면 먼저 설치된 규칙),
    /// 지표는 매칭된 모든 규칙의 합집합입니다.
    pub fn classify(&self, event: &ParsedEvent) -> ThreatAssessment {
        let mut best: Option<&ClassificationRule> = None;
        let mut indicators: Vec<String> = Vec::new();

        for rule in &self.rules {
            if !self.matches(rule, event) {
                continue;
            }

            for indicator in &rule.indicators {
                if !indicators.contains(indicator) {
                    indicators.push(indicator.clone());
                }
            }

            match best {
                Some(current) if current.severity >= rule.severity => {}
                _ => best = Some(rule),
            }
        }

        match best {
            Some(rule) => {
                tracing::debug!(
                    rule_id = %rule.id,
                    threat_type = %rule.threat_type,
                    severity = %rule.severity,
                    source_ip = %event.source_ip,
                    "event matched classification rule"
                );
                ThreatAssessment {
                    threat_type: rule.threat_type,
                    severity: rule.severity,
                    indicators,
                    recommended_action: rule.recommended_action,
                }
            }
            None => ThreatAssessment::unclassified(),
        }
    }

    /// 규칙의 모든 조건이 이벤트에 매칭되는지 평가합니다 (AND 결합).
    fn matches(&self, rule: &ClassificationRule, event: &ParsedEvent) -> bool {
        rule.conditions.iter().enumerate().all(|(idx, condition)| {
            match Self::field_value(event, condition.field) {
                Some(value) => self.evaluate_condition(condition, value, &rule.id, idx),
                None => false, // 필드가 없으면 매칭 실패
            }
        })
    }

    /// 이벤트에서 조건 대상 필드 값을 추출합니다.
    fn field_value(event: &ParsedEvent, field: MatchField) -> Option<&str> {
        match field {
            MatchField::Uri => Some(&event.uri),
            MatchField::UserAgent => event.user_agent.as_deref(),
            MatchField::Rule => event.rule_matched.as_deref(),
            MatchField::Action => Some(event.action.as_str()),
            MatchField::Country => event.country.as_deref(),
            MatchField::Method => Some(&event.http_method),
        }
    }

    /// 단일 조건을 평가합니다.
    ///
    /// 분류는 전역 함수여야 하므로 캐시 누락 같은 내부 이상은
    /// 에러 대신 불일치로 처리합니다.
    fn evaluate_condition(
        &self,
        condition: &FieldCondition,
        field_value: &str,
        rule_id: &str,
        condition_idx: usize,
    ) -> bool {
        match condition.modifier {
            ConditionModifier::Exact => field_value == condition.value,
            ConditionModifier::Contains => field_value.contains(&condition.value),
            ConditionModifier::StartsWith => field_value.starts_with(&condition.value),
            ConditionModifier::EndsWith => field_value.ends_with(&condition.value),
            ConditionModifier::Regex => {
                match self.regex_cache.get(&(rule_id.to_owned(), condition_idx)) {
                    Some(regex) => regex.is_match(field_value),
                    None => {
                        tracing::debug!(
                            rule_id,
                            condition_idx,
                            "regex not compiled for rule condition, treating as non-match"
                        );
                        false
                    }
                }
            }
        }
    }

    /// 규칙의 정규식 조건을 미리 컴파일합니다.
    fn compile_rule(&mut self, rule: &ClassificationRule) -> Result<(), WafPipelineError> {
        for (idx, condition) in rule.conditions.iter().enumerate() {
            if condition.modifier == ConditionModifier::Regex {
                let regex =
                    Regex::new(&condition.value).map_err(|e| WafPipelineError::RuleValidation {
                        rule_id: rule.id.clone(),
                        reason: format!(
                            "invalid regex in condition[{idx}] for field {:?}: {e}",
                            condition.field
                        ),
                    })?;
                self.regex_cache.insert((rule.id.clone(), idx), regex);
            }
        }
        Ok(())
    }
}

impl Default for ThreatClassifier {
    fn default() -> Self {
        Self::new()
    }
}
