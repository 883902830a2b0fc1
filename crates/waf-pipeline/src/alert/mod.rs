//! 알림 엔진 -- 알림 생성, 억제 판정, 다채널 동시 전달
//!
//! [`AlertEngine`]은 위협 평가와 캠페인 판정에서 채널 중립 [`Alert`]를
//! 만들고, 활성화된 채널 전부에 독립적으로 팬아웃 전달합니다.
//! 한 채널의 실패는 다른 채널 전달을 막지 않으며, 전체 성공 여부는
//! "활성 채널 중 하나 이상 성공" 계약입니다 — 채널들은 독립 실패
//! 도메인이고, 어느 한 채널이라도 수신했으면 알림은 유실되지 않은
//! 것이기 때문입니다.

pub mod channel;

pub use channel::{InAppChannel, PubSubChannel, WebhookChannel};

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;

use rampart_core::error::DeliveryError;
use rampart_core::pipeline::{AlertChannel, AlertSink, TopicPublisher};
use rampart_core::types::{
    Alert, AlertConfig, AlertRecord, ParsedEvent, RESOURCE_TYPE_IP, Severity, ThreatAssessment,
};

use crate::campaign::{CAMPAIGN_MILESTONES, CampaignDecision};
use crate::error::WafPipelineError;

/// 채널별 전달 결과 집계
#[derive(Debug, Clone, Default)]
pub struct DeliveryResult {
    /// 하나 이상의 활성 채널이 성공했는지
    pub success: bool,
    /// 성공한 채널 이름
    pub delivered: Vec<String>,
    /// 실패한 채널 이름
    pub failed: Vec<String>,
    /// 채널별 실패 사유 (배치에는 권고성 문자열로만 전파)
    pub errors: Vec<String>,
}

impl DeliveryResult {
    /// 시도된 채널 수를 반환합니다.
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// 알림을 평문 텍스트로 렌더링합니다 (pub/sub 채널용).
///
/// 심각도, 위협 유형, 출발지 IP(+국가), 대상 URI, 시각, 캠페인 플래그와
/// 이벤트 수, 지표 목록, 권장 대응을 모두 담습니다.
pub fn render_text(alert: &Alert) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "[{}] WAF threat detected: {}",
        alert.severity.to_string().to_uppercase(),
        alert.threat_type
    );

    match &alert.country {
        Some(country) => {
            let _ = writeln!(out, "Source: {} ({country})", alert.source_ip);
        }
        None => {
            let _ = writeln!(out, "Source: {}", alert.source_ip);
        }
    }

    let _ = writeln!(out, "Target: {}", alert.uri);
    let _ = writeln!(out, "Time: {}", alert.created_at.to_rfc3339());

    if alert.is_campaign {
        let _ = writeln!(
            out,
            "Campaign: yes ({} events, id {})",
            alert.event_count,
            alert.campaign_id.as_deref().unwrap_or("unknown")
        );
    } else {
        let _ = writeln!(out, "Campaign: no ({} events)", alert.event_count);
    }

    if !alert.indicators.is_empty() {
        let _ = writeln!(out, "Indicators: {}", alert.indicators.join("; "));
    }

    let _ = write!(out, "Recommended action: {}", alert.recommended_action);

    out
}

/// 알림을 채팅 웹훅용 구조화 블록으로 렌더링합니다.
pub fn render_chat_blocks(alert: &Alert) -> serde_json::Value {
    let mut fields = vec![
        serde_json::json!({
            "type": "mrkdwn",
            "text": format!("*Severity:*\n{}", alert.severity.to_string().to_uppercase())
        }),
        serde_json::json!({
            "type": "mrkdwn",
            "text": format!("*Threat:*\n{}", alert.threat_type)
        }),
        serde_json::json!({
            "type": "mrkdwn",
            "text": match &alert.country {
                Some(country) => format!("*Source:*\n{} ({country})", alert.source_ip),
                None => format!("*Source:*\n{}", alert.source_ip),
            }
        }),
        serde_json::json!({
            "type": "mrkdwn",
            "text": format!("*Target:*\n{}", alert.uri)
        }),
        serde_json::json!({
            "type": "mrkdwn",
            "text": format!("*Time:*\n{}", alert.created_at.to_rfc3339())
        }),
        serde_json::json!({
            "type": "mrkdwn",
            "text": format!("*Recommended:*\n{}", alert.recommended_action)
        }),
    ];

    if alert.is_campaign {
        fields.push(serde_json::json!({
            "type": "mrkdwn",
            "text": format!(
                "*Campaign:*\n{} events (id {})",
                alert.event_count,
                alert.campaign_id.as_deref().unwrap_or("unknown")
            )
        }));
    }

    let mut blocks = vec![
        serde_json::json!({
            "type": "header",
            "text": {
                "type": "plain_text",
                "text": format!("WAF threat detected: {}", alert.threat_type)
            }
        }),
        serde_json::json!({ "type": "section", "fields": fields }),
    ];

    if !alert.indicators.is_empty() {
        blocks.push(serde_json::json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!("*Indicators:* {}", alert.indicators.join("; "))
            }
        }));
    }

    serde_json::json!({ "blocks": blocks })
}

/// 알림을 영속용 레코드로 변환합니다.
pub fn alert_record(alert: &Alert) -> AlertRecord {
    AlertRecord {
        organization_id: alert.organization_id.clone(),
        alert_type: format!("waf_{}", alert.threat_type.as_str()),
        severity: alert.severity,
        title: format!("WAF threat detected: {}", alert.threat_type),
        description: render_text(alert),
        resource_id: alert.source_ip.clone(),
        resource_type: RESOURCE_TYPE_IP.to_owned(),
        metadata: serde_json::json!({
            "uri": alert.uri,
            "country": alert.country,
            "eventCount": alert.event_count,
            "isCampaign": alert.is_campaign,
            "campaignId": alert.campaign_id,
            "indicators": alert.indicators,
            "recommendedAction": alert.recommended_action,
            "alertId": alert.id,
        }),
    }
}

/// 알림 엔진
pub struct AlertEngine {
    /// pub/sub 발행자 (없으면 pubsub 채널 비가용)
    publisher: Option<Arc<dyn TopicPublisher>>,
    /// 인앱 알림 싱크 (없으면 in_app 채널 비가용)
    sink: Option<Arc<dyn AlertSink>>,
    /// 웹훅용 HTTP 클라이언트 (요청 타임아웃 포함)
    http: reqwest::Client,
    /// 채널별 전달 타임아웃
    delivery_timeout: Duration,
    /// 전달 성공 채널 수
    delivered_total: AtomicU64,
    /// 전달 실패 채널 수
    failed_total: AtomicU64,
}

impl AlertEngine {
    /// 새 엔진 빌더를 반환합니다.
    pub fn builder() -> AlertEngineBuilder {
        AlertEngineBuilder::default()
    }

    /// 위협 평가와 캠페인 판정에서 알림을 생성합니다 (순수 생성자).
    ///
    /// 심각도는 캠페인의 누적(상승된) 심각도를 사용합니다.
    pub fn create_alert(
        organization_id: &str,
        event: &ParsedEvent,
        assessment: &ThreatAssessment,
        decision: &CampaignDecision,
    ) -> Alert {
        Alert {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: organization_id.to_owned(),
            created_at: Utc::now(),
            threat_type: assessment.threat_type,
            severity: decision.severity.max(assessment.severity),
            source_ip: event.source_ip.clone(),
            uri: event.uri.clone(),
            country: event.country.clone(),
            event_count: decision.event_count,
            is_campaign: decision.is_campaign,
            campaign_id: decision.campaign_id.clone(),
            recommended_action: assessment.recommended_action,
            indicators: assessment.indicators.clone(),
        }
    }

    /// 알림 전송 여부를 판정합니다.
    ///
    /// - high/critical 심각도는 항상 전송
    /// - 캠페인이 막 임계값을 넘었으면 전송
    /// - 캠페인 이벤트 수가 마일스톤에 도달했으면 전송
    /// - 그 외 (medium/low 단발 이벤트)는 억제
    /// - 활성 채널이 하나도 없으면 전송하지 않음
    pub fn should_send(
        severity: Severity,
        is_campaign: bool,
        is_new_campaign: bool,
        event_count: u64,
        config: &AlertConfig,
    ) -> bool {
        if !config.any_channel_enabled() {
            return false;
        }

        if severity >= Severity::High {
            return true;
        }

        if is_new_campaign {
            return true;
        }

        is_campaign && CAMPAIGN_MILESTONES.contains(&event_count)
    }

    /// 알림을 활성 채널 전부에 전달합니다.
    ///
    /// 채널들은 동시에, 각자의 타임아웃 아래에서 실행됩니다.
    /// 느린 채널은 해당 채널의 기록된 실패로 강등될 뿐
    /// 파이프라인을 멈추지 않습니다.
    pub async fn deliver(&self, alert: &Alert, config: &AlertConfig) -> DeliveryResult {
        let mut result = DeliveryResult::default();
        let mut channels: Vec<Box<dyn AlertChannel>> = Vec::new();

        if config.pubsub_enabled {
            match (&self.publisher, &config.pubsub_topic) {
                (Some(publisher), Some(topic)) => {
                    channels.push(Box::new(PubSubChannel::new(
                        Arc::clone(publisher),
                        topic.clone(),
                    )));
                }
                _ => {
                    result.failed.push("pubsub".to_owned());
                    result.errors.push(
                        DeliveryError::Misconfigured {
                            channel: "pubsub".to_owned(),
                            reason: "enabled without topic or publisher".to_owned(),
                        }
                        .to_string(),
                    );
                }
            }
        }

        if config.webhook_enabled {
            match &config.webhook_url {
                Some(url) => {
                    channels.push(Box::new(WebhookChannel::new(self.http.clone(), url.clone())));
                }
                None => {
                    result.failed.push("webhook".to_owned());
                    result.errors.push(
                        DeliveryError::Misconfigured {
                            channel: "webhook".to_owned(),
                            reason: "enabled without url".to_owned(),
                        }
                        .to_string(),
                    );
                }
            }
        }

        if config.in_app_enabled {
            match &self.sink {
                Some(sink) => channels.push(Box::new(InAppChannel::new(Arc::clone(sink)))),
                None => {
                    result.failed.push("in_app".to_owned());
                    result.errors.push(
                        DeliveryError::Misconfigured {
                            channel: "in_app".to_owned(),
                            reason: "enabled without alert sink".to_owned(),
                        }
                        .to_string(),
                    );
                }
            }
        }

        if channels.is_empty() && result.failed.is_empty() {
            result
                .errors
                .push("no alert channel enabled for organization".to_owned());
            return result;
        }

        let mut tasks = tokio::task::JoinSet::new();
        for channel in channels {
            let alert = alert.clone();
            let timeout = self.delivery_timeout;
            tasks.spawn(async move {
                let name = channel.name();
                let outcome = match tokio::time::timeout(timeout, channel.deliver(&alert)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(DeliveryError::Timeout {
                        channel: name.to_owned(),
                        secs: timeout.as_secs(),
                    }),
                };
                (name, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    self.delivered_total.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("rampart_alerts_delivered_total").increment(1);
                    result.delivered.push(name.to_owned());
                }
                Ok((name, Err(e))) => {
                    self.failed_total.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("rampart_alerts_failed_total").increment(1);
                    tracing::warn!(channel = name, error = %e, alert_id = %alert.id, "alert channel delivery failed");
                    result.failed.push(name.to_owned());
                    result.errors.push(e.to_string());
                }
                Err(e) => {
                    result.errors.push(format!("delivery task failed: {e}"));
                }
            }
        }

        result.success = !result.delivered.is_empty();
        result
    }

    /// 전달에 성공한 채널 누적 수를 반환합니다.
    pub fn delivered_total(&self) -> u64 {
        self.delivered_total.load(Ordering::Relaxed)
    }

    /// 전달에 실패한 채널 누적 수를 반환합니다.
    pub fn failed_total(&self) -> u64 {
        self.failed_total.load(Ordering::Relaxed)
    }
}

/// 알림 엔진 빌더
#[derive(Default)]
pub struct AlertEngineBuilder {
    publisher: Option<Arc<dyn TopicPublisher>>,
    sink: Option<Arc<dyn AlertSink>>,
    delivery_timeout: Option<Duration>,
}

impl AlertEngineBuilder {
    /// pub/sub 발행자를 설정합니다.
    pub fn publisher(mut self, publisher: Arc<dyn TopicPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// 인앱 알림 싱크를 설정합니다.
    pub fn sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 채널별 전달 타임아웃을 설정합니다 (기본 5초).
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = Some(timeout);
        self
    }

    /// 엔진을 빌드합니다.
    ///
    /// 웹훅 HTTP 클라이언트는 전달 타임아웃으로 구성됩니다.
    pub fn build(self) -> Result<AlertEngine, WafPipelineError> {
        let delivery_timeout = self.delivery_timeout.unwrap_or(Duration::from_secs(5));

        let http = reqwest::Client::builder()
            .timeout(delivery_timeout)
            .build()?;

        Ok(AlertEngine {
            publisher: self.publisher,
            sink: self.sink,
            http,
            delivery_timeout,
            delivered_total: AtomicU64::new(0),
            failed_total: AtomicU64::new(0),
        })
    }
}
