//! 알림 채널 구현 -- pub/sub, 웹훅, 인앱
//!
//! 세 채널 모두 [`AlertChannel`] trait의 변형으로 구현되어,
//! 채널 추가가 분기 추가가 아니라 구현 추가가 됩니다.
//! 각 채널은 독립 실패 도메인이며 서로의 전달을 막지 않습니다.

use std::sync::Arc;

use rampart_core::error::DeliveryError;
use rampart_core::pipeline::{AlertChannel, AlertSink, BoxFuture, TopicPublisher};
use rampart_core::types::Alert;

use super::{alert_record, render_chat_blocks, render_text};

/// pub/sub 토픽 채널 — 평문 텍스트로 발행합니다.
pub struct PubSubChannel {
    publisher: Arc<dyn TopicPublisher>,
    topic: String,
}

impl PubSubChannel {
    /// 새 pub/sub 채널을 생성합니다.
    pub fn new(publisher: Arc<dyn TopicPublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }
}

impl AlertChannel for PubSubChannel {
    fn name(&self) -> &'static str {
        "pubsub"
    }

    fn deliver<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            let subject = format!(
                "[{}] WAF threat from {}",
                alert.severity.to_string().to_uppercase(),
                alert.source_ip
            );
            let message = render_text(alert);
            self.publisher
                .publish(&self.topic, &subject, &message)
                .await
        })
    }
}

/// 채팅 웹훅 채널 — 구조화 블록을 POST합니다.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    /// 새 웹훅 채널을 생성합니다.
    ///
    /// 요청 타임아웃은 전달된 클라이언트에 설정되어 있어야 합니다.
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl AlertChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn deliver<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            let body = render_chat_blocks(alert);
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| DeliveryError::Channel {
                    channel: "webhook".to_owned(),
                    reason: e.to_string(),
                })?;

            if !response.status().is_success() {
                return Err(DeliveryError::Channel {
                    channel: "webhook".to_owned(),
                    reason: format!("unexpected status {}", response.status()),
                });
            }

            Ok(())
        })
    }
}

/// 인앱 채널 — 알림 레코드를 알림 저장소에 삽입합니다.
pub struct InAppChannel {
    sink: Arc<dyn AlertSink>,
}

impl InAppChannel {
    /// 새 인앱 채널을 생성합니다.
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self { sink }
    }
}

impl AlertChannel for InAppChannel {
    fn name(&self) -> &'static str {
        "in_app"
    }

    fn deliver<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            let record = alert_record(alert);
            self.sink
                .insert(&record)
                .await
                .map_err(|e| DeliveryError::Channel {
                    channel: "in_app".to_owned(),
                    reason: e.to_string(),
                })
        })
    }
}
