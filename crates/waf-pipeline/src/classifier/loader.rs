//! 분류 규칙 로더 -- 내장 기본 테이블과 YAML 파일 로딩
//!
//! 규칙 디렉토리 내의 `.yml`/`.yaml` 파일을 스캔하고 파싱합니다.
//! 개별 파일 파싱 실패는 경고 로그를 남기고 건너뜁니다.

use std::path::Path;

use rampart_core::types::{RecommendedAction, Severity, ThreatType};

use super::types::{
    ClassificationRule, ClassificationRuleSet, ConditionModifier, FieldCondition, MatchField,
};
use crate::error::WafPipelineError;

/// 규칙 파일 최대 크기
const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
/// 전체 규칙 수 상한
const MAX_RULES_COUNT: usize = 10_000;

/// 내장 기본 규칙 테이블 버전
pub const DEFAULT_RULES_VERSION: &str = "2026.08";

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 디렉토리에서 모든 YAML 규칙 세트 파일을 로드합니다.
    ///
    /// `.yml` 또는 `.yaml` 확장자를 가진 파일만 처리합니다.
    /// 개별 파일 로딩 실패는 경고 로그를 남기고 건너뜁니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 규칙 수가 `MAX_RULES_COUNT`를 초과하는 경우
    pub async fn load_directory(
        dir: impl AsRef<Path>,
    ) -> Result<Vec<ClassificationRuleSet>, WafPipelineError> {
        let dir = dir.as_ref();

        let mut entries =
            tokio::fs::read_dir(dir)
                .await
                .map_err(|e| WafPipelineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory: {e}"),
                })?;

        let mut sets = Vec::new();
        let mut total_rules = 0usize;

        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| WafPipelineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory entry: {e}"),
                })?
        {
            let path = entry.path();

            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");

            if !is_yaml {
                continue;
            }

            match Self::load_file(&path).await {
                Ok(set) => {
                    total_rules += set.rules.len();
                    sets.push(set);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load classification rule file, skipping"
                    );
                }
            }

            if total_rules > MAX_RULES_COUNT {
                return Err(WafPipelineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("too many rules: max {MAX_RULES_COUNT}"),
                });
            }
        }

        tracing::info!(
            dir = %dir.display(),
            sets = sets.len(),
            rules = total_rules,
            "loaded classification rule sets"
        );

        Ok(sets)
    }

    /// 단일 YAML 파일에서 규칙 세트를 로드합니다.
    pub async fn load_file(
        path: impl AsRef<Path>,
    ) -> Result<ClassificationRuleSet, WafPipelineError> {
        let path = path.as_ref();

        let metadata =
            tokio::fs::metadata(path)
                .await
                .map_err(|e| WafPipelineError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file metadata: {e}"),
                })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(WafPipelineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| WafPipelineError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하여 규칙 세트를 생성합니다.
    pub fn parse_yaml(
        yaml_str: &str,
        source: &str,
    ) -> Result<ClassificationRuleSet, WafPipelineError> {
        let set: ClassificationRuleSet =
            serde_yaml::from_str(yaml_str).map_err(|e| WafPipelineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        for rule in &set.rules {
            rule.validate()?;
        }

        Ok(set)
    }
}

/// 내장 기본 분류 규칙 테이블을 반환합니다.
///
/// 권위 있는 규칙 목록이 확정될 때까지의 기본 시그니처 집합입니다.
/// 로직이 아니라 데이터이므로, 디렉토리에서 로드한 규칙 세트로
/// 덮어쓰거나 확장할 수 있습니다.
pub fn default_rule_set() -> ClassificationRuleSet {
    let contains = |field, value: &str| FieldCondition {
        field,
        modifier: ConditionModifier::Contains,
        value: value.to_owned(),
    };
    let regex = |field, value: &str| FieldCondition {
        field,
        modifier: ConditionModifier::Regex,
        value: value.to_owned(),
    };

    ClassificationRuleSet {
        version: DEFAULT_RULES_VERSION.to_owned(),
        rules: vec![
            ClassificationRule {
                id: "sqli_rule_hit".to_owned(),
                title: "SQL injection attempt".to_owned(),
                description: "Terminating rule from the SQLi managed rule group".to_owned(),
                threat_type: ThreatType::SqlInjection,
                severity: Severity::High,
                recommended_action: RecommendedAction::Block,
                conditions: vec![contains(MatchField::Rule, "SQLi")],
                indicators: vec!["terminating rule flagged SQL injection".to_owned()],
            },
            ClassificationRule {
                id: "sqli_uri".to_owned(),
                title: "SQL injection attempt".to_owned(),
                description: "SQL keywords in the request URI".to_owned(),
                threat_type: ThreatType::SqlInjection,
                severity: Severity::High,
                recommended_action: RecommendedAction::Block,
                conditions: vec![regex(
                    MatchField::Uri,
                    r"(?i)(union[\s+%20]+select|select[\s+%20]+.+[\s+%20]+from|or[\s+%20]+1=1|';--|sleep\()",
                )],
                indicators: vec!["SQL keywords in request URI".to_owned()],
            },
            ClassificationRule {
                id: "xss_rule_hit".to_owned(),
                title: "Cross-site scripting attempt".to_owned(),
                description: "Terminating rule from the XSS managed rule group".to_owned(),
                threat_type: ThreatType::Xss,
                severity: Severity::High,
                recommended_action: RecommendedAction::Block,
                conditions: vec![contains(MatchField::Rule, "XSS")],
                indicators: vec!["terminating rule flagged cross-site scripting".to_owned()],
            },
            ClassificationRule {
                id: "xss_uri".to_owned(),
                title: "Cross-site scripting attempt".to_owned(),
                description: "Script injection markers in the request URI".to_owned(),
                threat_type: ThreatType::Xss,
                severity: Severity::High,
                recommended_action: RecommendedAction::Block,
                conditions: vec![regex(
                    MatchField::Uri,
                    r"(?i)(<script|%3cscript|javascript:|onerror=|onload=)",
                )],
                indicators: vec!["script injection markers in request URI".to_owned()],
            },
            ClassificationRule {
                id: "path_traversal_uri".to_owned(),
                title: "Path traversal attempt".to_owned(),
                description: "Directory escape sequences in the request URI".to_owned(),
                threat_type: ThreatType::PathTraversal,
                severity: Severity::High,
                recommended_action: RecommendedAction::Block,
                conditions: vec![regex(
                    MatchField::Uri,
                    r"(?i)(\.\./|\.\.%2f|%2e%2e%2f|%2e%2e/|/etc/passwd|/windows/system32)",
                )],
                indicators: vec!["directory escape sequence in request URI".to_owned()],
            },
            ClassificationRule {
                id: "command_injection_uri".to_owned(),
                title: "Command injection attempt".to_owned(),
                description: "Shell metacharacters and command names in the request URI"
                    .to_owned(),
                threat_type: ThreatType::CommandInjection,
                severity: Severity::Critical,
                recommended_action: RecommendedAction::Block,
                conditions: vec![regex(
                    MatchField::Uri,
                    r"(?i)(;\s*(cat|wget|curl|sh|bash|nc)\b|%60|\$\(|\|\s*(sh|bash)\b)",
                )],
                indicators: vec!["shell command markers in request URI".to_owned()],
            },
            ClassificationRule {
                id: "scanner_user_agent".to_owned(),
                title: "Automated scanner".to_owned(),
                description: "Known vulnerability scanner user agent".to_owned(),
                threat_type: ThreatType::Scanner,
                severity: Severity::Medium,
                recommended_action: RecommendedAction::Alert,
                conditions: vec![regex(
                    MatchField::UserAgent,
                    r"(?i)(sqlmap|nikto|nessus|masscan|zgrab|nuclei|dirbuster|gobuster|wpscan|acunetix)",
                )],
                indicators: vec!["known scanner user agent".to_owned()],
            },
            ClassificationRule {
                id: "bot_control_rule_hit".to_owned(),
                title: "Malicious bot".to_owned(),
                description: "Terminating rule from the bot control rule group".to_owned(),
                threat_type: ThreatType::Scanner,
                severity: Severity::Medium,
                recommended_action: RecommendedAction::Alert,
                conditions: vec![contains(MatchField::Rule, "BotControl")],
                indicators: vec!["bot control rule matched".to_owned()],
            },
            ClassificationRule {
                id: "rate_based_rule_hit".to_owned(),
                title: "Request flood".to_owned(),
                description: "Rate-based rule tripped by request volume".to_owned(),
                threat_type: ThreatType::RateLimitAbuse,
                severity: Severity::Medium,
                recommended_action: RecommendedAction::Alert,
                conditions: vec![contains(MatchField::Rule, "RateBased")],
                indicators: vec!["rate-based rule threshold exceeded".to_owned()],
            },
        ],
    }
}
