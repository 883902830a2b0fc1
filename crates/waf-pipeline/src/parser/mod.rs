//! WAF 로그 파서 -- 원시 레코드를 정규 이벤트로 변환합니다.
//!
//! 업스트림 로그 스키마는 버전이 바뀌며 이 시스템이 통제하지 않으므로
//! 모든 필드 접근은 방어적으로 수행합니다. 불완전한 레코드는 warn 로그를
//! 남기고 드롭되며, 절대 배치 수준 에러로 표면화되지 않습니다.
//!
//! # 타임스탬프 정규화
//! 동일한 물리적 시각이 업스트림 버전에 따라 밀리초, 초, (잘못된) 마이크로초로
//! 기록되어 왔습니다. [`normalize_timestamp`]는 2020~2030년 범위 휴리스틱으로
//! 세 인코딩을 모두 수용하고, 범위 밖 값은 처리 시점 시각으로 대체합니다.

pub mod region;

pub use region::{REGION_UNKNOWN, region_for_country};

use chrono::{DateTime, Utc};
use serde_json::Value;

use rampart_core::types::{ParsedEvent, WafAction};

/// 2020-01-01T00:00:00Z (epoch 밀리초) — 그럴듯한 밀리초 범위 하한
const PLAUSIBLE_MILLIS_MIN: i64 = 1_577_836_800_000;
/// 2030-01-01T00:00:00Z (epoch 밀리초) — 그럴듯한 밀리초 범위 상한
const PLAUSIBLE_MILLIS_MAX: i64 = 1_893_456_000_000;
/// 그럴듯한 초 범위 하한
const PLAUSIBLE_SECS_MIN: i64 = PLAUSIBLE_MILLIS_MIN / 1000;
/// 그럴듯한 초 범위 상한
const PLAUSIBLE_SECS_MAX: i64 = PLAUSIBLE_MILLIS_MAX / 1000;

/// 기본 액션을 나타내는 종결 규칙 ID — 규칙 매칭으로 취급하지 않습니다
const DEFAULT_ACTION_RULE: &str = "Default_Action";

/// 배치 파싱 결과
///
/// 드롭 수를 명시적으로 노출하여 호출자가 로그를 파싱하지 않고도
/// 드롭을 검증할 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    /// 파싱에 성공한 이벤트
    pub events: Vec<ParsedEvent>,
    /// 드롭된 레코드 수
    pub dropped: usize,
}

impl ParsedBatch {
    /// 입력 전체가 파싱되었는지 확인합니다.
    pub fn is_complete(&self) -> bool {
        self.dropped == 0
    }
}

/// 타임스탬프 숫자 값을 UTC 시각으로 정규화합니다.
///
/// - 그럴듯한 밀리초 범위(약 2020~2030년)면 그대로 사용
/// - 그럴듯한 초 범위면 1000을 곱해 밀리초로 변환
/// - 1000으로 나눈 값이 그럴듯한 범위에 들면 마이크로초로 간주하고 축소
/// - 그 외는 `None` — 호출자가 처리 시점 시각으로 대체합니다
pub fn normalize_timestamp(value: i64) -> Option<DateTime<Utc>> {
    let millis = if (PLAUSIBLE_MILLIS_MIN..=PLAUSIBLE_MILLIS_MAX).contains(&value) {
        value
    } else if (PLAUSIBLE_SECS_MIN..=PLAUSIBLE_SECS_MAX).contains(&value) {
        value * 1000
    } else if (PLAUSIBLE_MILLIS_MIN..=PLAUSIBLE_MILLIS_MAX).contains(&(value / 1000)) {
        value / 1000
    } else {
        return None;
    };

    DateTime::from_timestamp_millis(millis)
}

/// WAF 로그 파서
///
/// `parse`는 레코드당 `Option`을 반환하며 절대 실패를 전파하지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct WafLogParser;

impl WafLogParser {
    /// 새 파서를 생성합니다.
    pub fn new() -> Self {
        Self
    }

    /// 원시 레코드 하나를 정규 이벤트로 파싱합니다.
    ///
    /// `sourceIp`/`uri`/`httpMethod`가 비어있거나 `action`이 유효하지 않으면
    /// warn 로그를 남기고 `None`을 반환합니다.
    pub fn parse(&self, raw: &Value) -> Option<ParsedEvent> {
        let Some(action) = raw
            .get("action")
            .and_then(Value::as_str)
            .and_then(WafAction::from_str_loose)
        else {
            Self::log_drop(raw, "action");
            return None;
        };

        let Some(http) = raw.get("httpRequest") else {
            Self::log_drop(raw, "httpRequest");
            return None;
        };

        let Some(source_ip) = Self::nonempty_string(http, "clientIp") else {
            Self::log_drop(raw, "httpRequest.clientIp");
            return None;
        };

        let Some(uri) = Self::nonempty_string(http, "uri") else {
            Self::log_drop(raw, "httpRequest.uri");
            return None;
        };

        let Some(http_method) = Self::nonempty_string(http, "httpMethod") else {
            Self::log_drop(raw, "httpRequest.httpMethod");
            return None;
        };

        let timestamp = Self::timestamp_or_now(raw);

        let country = Self::nonempty_string(http, "country");
        let region = country
            .as_deref()
            .map(|code| region_for_country(code).to_owned());

        let user_agent = Self::extract_user_agent(http);
        let rule_matched = Self::extract_rule_matched(raw);
        let webacl_id = raw
            .get("webaclId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        Some(ParsedEvent {
            timestamp,
            action,
            source_ip,
            country,
            region,
            user_agent,
            uri,
            http_method,
            rule_matched,
            webacl_id,
            raw_log: raw.clone(),
        })
    }

    /// 레코드 목록을 파싱하고 실패를 드롭합니다.
    ///
    /// 드롭 수는 [`ParsedBatch::dropped`]로 반환되며 warn 레벨로도 기록됩니다.
    pub fn parse_batch(&self, raws: &[Value]) -> ParsedBatch {
        let mut batch = ParsedBatch::default();

        for raw in raws {
            match self.parse(raw) {
                Some(event) => batch.events.push(event),
                None => batch.dropped += 1,
            }
        }

        if batch.dropped > 0 {
            tracing::warn!(
                total = raws.len(),
                dropped = batch.dropped,
                "dropped malformed waf records from batch"
            );
        }

        batch
    }

    /// 레코드의 타임스탬프를 정규화하거나 처리 시점 시각으로 대체합니다.
    fn timestamp_or_now(raw: &Value) -> DateTime<Utc> {
        let numeric = raw
            .get("timestamp")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)));

        match numeric {
            Some(value) => normalize_timestamp(value).unwrap_or_else(|| {
                tracing::warn!(
                    timestamp = value,
                    "waf record timestamp out of plausible range, substituting now"
                );
                Utc::now()
            }),
            None => {
                tracing::warn!("waf record missing numeric timestamp, substituting now");
                Utc::now()
            }
        }
    }

    /// 종결 규칙 식별자를 추출합니다.
    ///
    /// 이벤트의 종결 규칙 ID가 있고 기본 액션이 아니면 그대로 사용하고,
    /// 아니면 중첩 규칙 그룹에서 첫 종결 규칙을 `groupId:ruleId`로 반환합니다.
    fn extract_rule_matched(raw: &Value) -> Option<String> {
        if let Some(rule) = raw.get("terminatingRuleId").and_then(Value::as_str)
            && !rule.is_empty()
            && rule != DEFAULT_ACTION_RULE
        {
            return Some(rule.to_owned());
        }

        let groups = raw.get("ruleGroupList").and_then(Value::as_array)?;
        for group in groups {
            if let Some(rule_id) = group
                .get("terminatingRule")
                .and_then(|r| r.get("ruleId"))
                .and_then(Value::as_str)
                && !rule_id.is_empty()
            {
                let group_id = group
                    .get("ruleGroupId")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                return Some(format!("{group_id}:{rule_id}"));
            }
        }

        None
    }

    /// 헤더 목록에서 User-Agent 값을 추출합니다.
    fn extract_user_agent(http: &Value) -> Option<String> {
        let headers = http.get("headers").and_then(Value::as_array)?;
        for header in headers {
            if let Some(name) = header.get("name").and_then(Value::as_str)
                && name.eq_ignore_ascii_case("user-agent")
            {
                return header
                    .get("value")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
            }
        }
        None
    }

    /// 비어있지 않은 문자열 필드를 추출합니다.
    fn nonempty_string(obj: &Value, key: &str) -> Option<String> {
        obj.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    }

    fn log_drop(raw: &Value, field: &str) {
        metrics::counter!("rampart_parse_dropped_total").increment(1);
        tracing::warn!(
            field,
            webacl_id = raw.get("webaclId").and_then(|v| v.as_str()).unwrap_or(""),
            "dropping waf record with missing or invalid field"
        );
    }
}
