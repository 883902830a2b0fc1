//! 도메인 타입 — WAF 이벤트 분석 전반에서 공유되는 공통 타입
//!
//! 파서, 분류기, 캠페인 탐지기, 알림 엔진이 주고받는 데이터 구조를 정의합니다.
//! 외부로 노출되는 타입(`ParsedEvent`, `Alert` 등)은 camelCase JSON으로
//! 직렬화됩니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 심각도 레벨
///
/// 위협 및 캠페인의 심각도를 나타냅니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 낮은 심각도 (기본값)
    #[default]
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// 위협 유형 — 닫힌 열거형
///
/// 분류 규칙 테이블이 어떤 문자열을 쓰든 최종 판정은 이 열거형으로 수렴합니다.
/// 매칭되는 시그니처가 없으면 [`ThreatType::Unknown`]입니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ThreatType {
    /// SQL 인젝션 시도
    SqlInjection,
    /// 크로스 사이트 스크립팅
    Xss,
    /// 경로 순회 (디렉토리 탈출)
    PathTraversal,
    /// 명령어 인젝션
    CommandInjection,
    /// 자동화 스캐너 / 악성 봇
    Scanner,
    /// 속도 제한 규칙 위반 (요청 폭주)
    RateLimitAbuse,
    /// 식별되지 않은 패턴 (기본값)
    #[default]
    Unknown,
}

impl ThreatType {
    /// 영속 저장 시 사용하는 snake_case 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlInjection => "sql_injection",
            Self::Xss => "xss",
            Self::PathTraversal => "path_traversal",
            Self::CommandInjection => "command_injection",
            Self::Scanner => "scanner",
            Self::RateLimitAbuse => "rate_limit_abuse",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ThreatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// WAF 액션 — 방화벽이 요청에 취한 조치
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WafAction {
    /// 허용
    Allow,
    /// 차단
    Block,
    /// 카운트만 수행 (모니터링 모드)
    Count,
    /// CAPTCHA 요구
    Captcha,
    /// 브라우저 챌린지 요구
    Challenge,
}

impl WafAction {
    /// 문자열에서 액션을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다. 알 수 없는 값은 `None`입니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ALLOW" => Some(Self::Allow),
            "BLOCK" => Some(Self::Block),
            "COUNT" => Some(Self::Count),
            "CAPTCHA" => Some(Self::Captcha),
            "CHALLENGE" => Some(Self::Challenge),
            _ => None,
        }
    }

    /// 로그 출력용 대문자 표기를 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Block => "BLOCK",
            Self::Count => "COUNT",
            Self::Captcha => "CAPTCHA",
            Self::Challenge => "CHALLENGE",
        }
    }
}

impl fmt::Display for WafAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 권장 대응 조치
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    /// 관찰만 수행 (기본값)
    #[default]
    Monitor,
    /// 운영자 알림
    Alert,
    /// 소스 차단 권장
    Block,
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monitor => write!(f, "monitor"),
            Self::Alert => write!(f, "alert"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// 파싱된 WAF 이벤트 — 원시 로그 레코드의 정규 형식
///
/// `sourceIp`/`uri`/`httpMethod`가 비어있지 않고 `action`이 유효한 레코드에서만
/// 생성됩니다. 생성 이후 불변으로 취급합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEvent {
    /// 이벤트 발생 시각 (정규화 완료)
    pub timestamp: DateTime<Utc>,
    /// WAF가 취한 액션
    pub action: WafAction,
    /// 요청 출발지 IP
    pub source_ip: String,
    /// 출발지 국가 코드 (알 수 없으면 None)
    #[serde(default)]
    pub country: Option<String>,
    /// 국가 코드에서 파생된 지역명
    #[serde(default)]
    pub region: Option<String>,
    /// User-Agent 헤더 값
    #[serde(default)]
    pub user_agent: Option<String>,
    /// 요청 URI
    pub uri: String,
    /// HTTP 메서드
    pub http_method: String,
    /// 종결 규칙 식별자 (규칙 그룹 내 규칙은 `groupId:ruleId`)
    #[serde(default)]
    pub rule_matched: Option<String>,
    /// 소유 웹 ACL 식별자
    #[serde(default)]
    pub webacl_id: String,
    /// 감사/디버깅용 원본 레코드
    #[serde(default)]
    pub raw_log: serde_json::Value,
}

impl fmt::Display for ParsedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {}",
            self.action, self.source_ip, self.http_method, self.uri,
        )
    }
}

/// 위협 평가 결과 — 이벤트당 하나
///
/// 분류는 전역 함수(total function)입니다. 시그니처에 매칭되지 않는 이벤트는
/// `{unknown, low, monitor}`로 강등되며, 절대 실패하지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatAssessment {
    /// 판정된 위협 유형
    pub threat_type: ThreatType,
    /// 심각도
    pub severity: Severity,
    /// 판정 근거 지표 목록
    pub indicators: Vec<String>,
    /// 권장 대응
    pub recommended_action: RecommendedAction,
}

impl ThreatAssessment {
    /// 시그니처 미매칭 이벤트에 대한 기본 평가를 반환합니다.
    pub fn unclassified() -> Self {
        Self {
            threat_type: ThreatType::Unknown,
            severity: Severity::Low,
            indicators: Vec::new(),
            recommended_action: RecommendedAction::Monitor,
        }
    }
}

impl fmt::Display for ThreatAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] -> {}",
            self.threat_type, self.severity, self.recommended_action,
        )
    }
}

/// 캠페인 상태 키 — (조직, 출발지 IP) 쌍
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignKey {
    /// 조직 식별자
    pub organization_id: String,
    /// 출발지 IP
    pub source_ip: String,
}

impl CampaignKey {
    /// 새 키를 생성합니다.
    pub fn new(organization_id: impl Into<String>, source_ip: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            source_ip: source_ip.into(),
        }
    }
}

impl fmt::Display for CampaignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization_id, self.source_ip)
    }
}

/// 윈도우 카운터 스냅샷
///
/// [`CampaignStore::increment`](crate::pipeline::CampaignStore::increment)의
/// 반환값으로, 원자적 증가 직후의 카운터 값을 담습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// 현재 윈도우 내 이벤트 수
    pub count: u64,
    /// 현재 윈도우 시작 시각
    pub window_start: DateTime<Utc>,
}

/// 캠페인 상태 — (조직, IP)별 누적 관측치
///
/// 소유권은 캠페인 탐지기에 있으며 다른 컴포넌트는 읽기만 합니다.
/// `severity`는 캠페인 수명 동안 단조 증가합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignState {
    /// 조직 식별자
    pub organization_id: String,
    /// 출발지 IP
    pub source_ip: String,
    /// 현재 윈도우 내 이벤트 수
    pub event_count: u64,
    /// 캠페인 선언 시점의 윈도우 시작 시각
    pub window_start: DateTime<Utc>,
    /// 이 IP의 첫 관측 시각
    pub first_seen: DateTime<Utc>,
    /// 마지막 관측 시각
    pub last_seen: DateTime<Utc>,
    /// 관측된 위협 유형 누적 집합 (중복 제거, 관측 순서 유지)
    pub attack_types: Vec<ThreatType>,
    /// 관측된 최고 심각도
    pub severity: Severity,
    /// 캠페인 선언 여부
    pub is_campaign: bool,
    /// 결정적 캠페인 ID — (조직, IP, 윈도우 시작)에 대해 안정적
    #[serde(default)]
    pub campaign_id: Option<String>,
}

/// 캠페인 상태 병합 요청
///
/// 저장소가 한 번의 원자적 연산으로 적용합니다. read-modify-write를
/// 호출자에게 노출하지 않아 동시 증가 시 갱신 유실을 방지합니다.
#[derive(Debug, Clone)]
pub struct CampaignUpdate {
    /// 이번 이벤트의 위협 유형
    pub threat_type: ThreatType,
    /// 이번 이벤트의 심각도
    pub severity: Severity,
    /// 이번 이벤트의 관측 시각
    pub seen_at: DateTime<Utc>,
    /// 카운터 스냅샷의 이벤트 수 (카운터가 단일 기준)
    pub event_count: u64,
    /// 임계값 도달 시 캠페인 선언 요청
    pub declare: Option<CampaignDeclare>,
}

/// 캠페인 선언 파라미터
#[derive(Debug, Clone)]
pub struct CampaignDeclare {
    /// 결정적 캠페인 ID
    pub campaign_id: String,
    /// 선언 시점의 윈도우 시작 시각
    pub window_start: DateTime<Utc>,
}

/// 캠페인 상태 병합 결과
#[derive(Debug, Clone)]
pub struct CampaignMergeOutcome {
    /// 병합 이후의 상태
    pub state: CampaignState,
    /// 이번 병합에서 비캠페인 -> 캠페인 전환이 일어났는지
    ///
    /// 동시 호출 중 정확히 하나만 true를 받습니다.
    pub newly_declared: bool,
}

/// 조직별 알림 채널 설정
///
/// 외부 저장소에서 읽어오며 코어에는 읽기 전용입니다.
/// 자동 차단 파라미터는 전달만 하고 이 서브시스템에서 집행하지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertConfig {
    /// pub/sub 토픽 발행 활성화
    #[serde(default)]
    pub pubsub_enabled: bool,
    /// pub/sub 토픽 식별자 (ARN 상당)
    #[serde(default)]
    pub pubsub_topic: Option<String>,
    /// 채팅 웹훅 활성화
    #[serde(default)]
    pub webhook_enabled: bool,
    /// 웹훅 URL
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// 인앱 알림 저장 활성화
    pub in_app_enabled: bool,
    /// 캠페인 선언 임계값 (윈도우 내 이벤트 수)
    pub campaign_threshold: u64,
    /// 캠페인 윈도우 길이 (분)
    pub campaign_window_mins: u64,
    /// 자동 차단 활성화 (전달 전용)
    #[serde(default)]
    pub auto_block_enabled: bool,
    /// 자동 차단 임계값 (전달 전용)
    #[serde(default = "default_auto_block_threshold")]
    pub auto_block_threshold: u64,
    /// 차단 지속 시간 (분, 전달 전용)
    #[serde(default = "default_block_duration_mins")]
    pub block_duration_mins: u64,
}

fn default_auto_block_threshold() -> u64 {
    100
}

fn default_block_duration_mins() -> u64 {
    60
}

impl Default for AlertConfig {
    /// 설정 행이 없는 조직의 안전한 기본값입니다.
    ///
    /// 인앱 알림만 켜고 외부 채널은 모두 끕니다. 알림 미설정만으로
    /// 분석 실행이 실패해서는 안 됩니다.
    fn default() -> Self {
        Self {
            pubsub_enabled: false,
            pubsub_topic: None,
            webhook_enabled: false,
            webhook_url: None,
            in_app_enabled: true,
            campaign_threshold: 10,
            campaign_window_mins: 5,
            auto_block_enabled: false,
            auto_block_threshold: default_auto_block_threshold(),
            block_duration_mins: default_block_duration_mins(),
        }
    }
}

impl AlertConfig {
    /// 하나 이상의 채널이 활성화되어 있는지 확인합니다.
    pub fn any_channel_enabled(&self) -> bool {
        self.pubsub_enabled || self.webhook_enabled || self.in_app_enabled
    }

    /// 캠페인 윈도우 길이를 `Duration`으로 반환합니다.
    pub fn campaign_window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.campaign_window_mins * 60)
    }
}

/// 보안 알림 — 채널 중립 형식
///
/// 위협 평가와 캠페인 상태에서 생성되며, 생성 이후 불변입니다.
/// 한 번 영속되고 0..N개 채널로 전달됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// 알림 고유 ID
    pub id: String,
    /// 조직 식별자
    pub organization_id: String,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 위협 유형
    pub threat_type: ThreatType,
    /// 심각도
    pub severity: Severity,
    /// 출발지 IP
    pub source_ip: String,
    /// 대상 URI
    pub uri: String,
    /// 출발지 국가 (알 수 없으면 None)
    #[serde(default)]
    pub country: Option<String>,
    /// 윈도우 내 이벤트 수
    pub event_count: u64,
    /// 캠페인 연관 여부
    pub is_campaign: bool,
    /// 캠페인 ID (캠페인인 경우)
    #[serde(default)]
    pub campaign_id: Option<String>,
    /// 권장 대응
    pub recommended_action: RecommendedAction,
    /// 판정 근거 지표
    pub indicators: Vec<String>,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} from {} (campaign: {})",
            self.severity, self.threat_type, self.source_ip, self.is_campaign,
        )
    }
}

/// 알림 저장소 리소스 타입 상수
pub const RESOURCE_TYPE_IP: &str = "ip_address";

/// 영속용 알림 레코드
///
/// 인앱 알림 저장소에 기록되는 형식입니다. `alert_type`은
/// `waf_<threatType>` 규약을 따르고, 구조화 필드는 `metadata`에 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    /// 조직 식별자
    pub organization_id: String,
    /// 알림 유형 문자열 (`waf_sql_injection` 등)
    pub alert_type: String,
    /// 심각도
    pub severity: Severity,
    /// 알림 제목
    pub title: String,
    /// 사람이 읽는 설명 (채널 전달 메시지와 동일한 텍스트)
    pub description: String,
    /// 관련 리소스 식별자 (출발지 IP)
    pub resource_id: String,
    /// 리소스 유형 (`ip_address`)
    pub resource_type: String,
    /// 구조화 필드 블롭 (URI, 국가, 이벤트 수, 캠페인, 지표, 권장 대응)
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_default_is_low() {
        assert_eq!(Severity::default(), Severity::Low);
    }

    #[test]
    fn severity_from_str_loose() {
        assert_eq!(Severity::from_str_loose("low"), Some(Severity::Low));
        assert_eq!(Severity::from_str_loose("MEDIUM"), Some(Severity::Medium));
        assert_eq!(Severity::from_str_loose("Crit"), Some(Severity::Critical));
        assert_eq!(Severity::from_str_loose("nope"), None);
    }

    #[test]
    fn severity_serde_lowercase() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"high\"");
        let back: Severity = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(back, Severity::Critical);
    }

    #[test]
    fn threat_type_default_is_unknown() {
        assert_eq!(ThreatType::default(), ThreatType::Unknown);
    }

    #[test]
    fn threat_type_serde_snake_case() {
        let json = serde_json::to_string(&ThreatType::SqlInjection).unwrap();
        assert_eq!(json, "\"sql_injection\"");
        let back: ThreatType = serde_json::from_str("\"path_traversal\"").unwrap();
        assert_eq!(back, ThreatType::PathTraversal);
    }

    #[test]
    fn threat_type_display_matches_as_str() {
        for t in [
            ThreatType::SqlInjection,
            ThreatType::Xss,
            ThreatType::PathTraversal,
            ThreatType::CommandInjection,
            ThreatType::Scanner,
            ThreatType::RateLimitAbuse,
            ThreatType::Unknown,
        ] {
            assert_eq!(t.to_string(), t.as_str());
        }
    }

    #[test]
    fn waf_action_from_str_loose() {
        assert_eq!(WafAction::from_str_loose("BLOCK"), Some(WafAction::Block));
        assert_eq!(WafAction::from_str_loose("allow"), Some(WafAction::Allow));
        assert_eq!(
            WafAction::from_str_loose("Captcha"),
            Some(WafAction::Captcha)
        );
        assert_eq!(WafAction::from_str_loose("DROP"), None);
        assert_eq!(WafAction::from_str_loose(""), None);
    }

    #[test]
    fn waf_action_serde_uppercase() {
        let json = serde_json::to_string(&WafAction::Challenge).unwrap();
        assert_eq!(json, "\"CHALLENGE\"");
        let back: WafAction = serde_json::from_str("\"COUNT\"").unwrap();
        assert_eq!(back, WafAction::Count);
    }

    #[test]
    fn recommended_action_default_is_monitor() {
        assert_eq!(RecommendedAction::default(), RecommendedAction::Monitor);
    }

    #[test]
    fn unclassified_assessment_is_lowest() {
        let assessment = ThreatAssessment::unclassified();
        assert_eq!(assessment.threat_type, ThreatType::Unknown);
        assert_eq!(assessment.severity, Severity::Low);
        assert_eq!(assessment.recommended_action, RecommendedAction::Monitor);
        assert!(assessment.indicators.is_empty());
    }

    #[test]
    fn campaign_key_display() {
        let key = CampaignKey::new("org-1", "1.2.3.4");
        assert_eq!(key.to_string(), "org-1/1.2.3.4");
    }

    #[test]
    fn campaign_keys_hash_equal() {
        let a = CampaignKey::new("org-1", "1.2.3.4");
        let b = CampaignKey::new("org-1", "1.2.3.4");
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn alert_config_default_is_in_app_only() {
        let config = AlertConfig::default();
        assert!(config.in_app_enabled);
        assert!(!config.pubsub_enabled);
        assert!(!config.webhook_enabled);
        assert!(!config.auto_block_enabled);
        assert_eq!(config.campaign_threshold, 10);
        assert_eq!(config.campaign_window_mins, 5);
        assert!(config.any_channel_enabled());
    }

    #[test]
    fn alert_config_window_duration() {
        let config = AlertConfig::default();
        assert_eq!(
            config.campaign_window(),
            std::time::Duration::from_secs(300)
        );
    }

    #[test]
    fn alert_config_deserializes_partial_row() {
        // 저장소 행에 선택 필드가 빠져 있어도 역직렬화가 성공해야 합니다
        let json = r#"{"inAppEnabled":true,"campaignThreshold":5,"campaignWindowMins":10}"#;
        let config: AlertConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.campaign_threshold, 5);
        assert_eq!(config.campaign_window_mins, 10);
        assert!(!config.webhook_enabled);
        assert_eq!(config.auto_block_threshold, 100);
    }

    #[test]
    fn parsed_event_serde_camel_case() {
        let event = ParsedEvent {
            timestamp: Utc::now(),
            action: WafAction::Block,
            source_ip: "1.2.3.4".to_owned(),
            country: Some("US".to_owned()),
            region: Some("North America".to_owned()),
            user_agent: None,
            uri: "/login".to_owned(),
            http_method: "POST".to_owned(),
            rule_matched: None,
            webacl_id: "acl-1".to_owned(),
            raw_log: serde_json::Value::Null,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"sourceIp\""));
        assert!(json.contains("\"httpMethod\""));
        assert!(json.contains("\"webaclId\""));
        let back: ParsedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.source_ip, "1.2.3.4");
        assert_eq!(back.action, WafAction::Block);
    }

    #[test]
    fn parsed_event_display() {
        let event = ParsedEvent {
            timestamp: Utc::now(),
            action: WafAction::Block,
            source_ip: "10.0.0.1".to_owned(),
            country: None,
            region: None,
            user_agent: None,
            uri: "/admin".to_owned(),
            http_method: "GET".to_owned(),
            rule_matched: None,
            webacl_id: String::new(),
            raw_log: serde_json::Value::Null,
        };
        let display = event.to_string();
        assert!(display.contains("BLOCK"));
        assert!(display.contains("10.0.0.1"));
        assert!(display.contains("/admin"));
    }

    #[test]
    fn alert_display() {
        let alert = Alert {
            id: "a-1".to_owned(),
            organization_id: "org-1".to_owned(),
            created_at: Utc::now(),
            threat_type: ThreatType::Xss,
            severity: Severity::High,
            source_ip: "1.2.3.4".to_owned(),
            uri: "/search".to_owned(),
            country: None,
            event_count: 3,
            is_campaign: false,
            campaign_id: None,
            recommended_action: RecommendedAction::Block,
            indicators: vec![],
        };
        let display = alert.to_string();
        assert!(display.contains("high"));
        assert!(display.contains("xss"));
        assert!(display.contains("1.2.3.4"));
    }

    #[test]
    fn alert_serde_roundtrip() {
        let alert = Alert {
            id: "a-2".to_owned(),
            organization_id: "org-1".to_owned(),
            created_at: Utc::now(),
            threat_type: ThreatType::SqlInjection,
            severity: Severity::Critical,
            source_ip: "5.6.7.8".to_owned(),
            uri: "/api".to_owned(),
            country: Some("BR".to_owned()),
            event_count: 42,
            is_campaign: true,
            campaign_id: Some("waf-org-1-5.6.7.8-1700000000".to_owned()),
            recommended_action: RecommendedAction::Block,
            indicators: vec!["union select in query string".to_owned()],
        };
        let json = serde_json::to_string(&alert).unwrap();
        assert!(json.contains("\"isCampaign\":true"));
        assert!(json.contains("\"eventCount\":42"));
        let back: Alert = serde_json::from_str(&json).unwrap();
        assert_eq!(back.campaign_id, alert.campaign_id);
        assert_eq!(back.severity, Severity::Critical);
    }

    #[test]
    fn campaign_state_serde_roundtrip() {
        let now = Utc::now();
        let state = CampaignState {
            organization_id: "org-1".to_owned(),
            source_ip: "1.2.3.4".to_owned(),
            event_count: 12,
            window_start: now,
            first_seen: now,
            last_seen: now,
            attack_types: vec![ThreatType::SqlInjection, ThreatType::Scanner],
            severity: Severity::High,
            is_campaign: true,
            campaign_id: Some("waf-org-1-1.2.3.4-1700000000".to_owned()),
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: CampaignState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_count, 12);
        assert_eq!(back.attack_types.len(), 2);
        assert!(back.is_campaign);
    }
}
