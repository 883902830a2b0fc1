//! 파이프라인 오케스트레이터 -- 분석 요청의 진입점
//!
//! 세 가지 호출 모드(실시간 이벤트 목록, 저장소 시간 범위 배치, 캠페인
//! 재평가)를 받아 분류 -> 캠페인 탐지 -> 조건부 알림의 흐름을 이벤트마다
//! 구동하고, 균일한 실행 요약을 반환합니다.
//!
//! # 부분 실패 정책
//! - 이벤트 단위 실패는 요약의 `errors`에 기록되고 배치는 계속됩니다
//! - 조직 설정 행이 없으면 기본값으로 대체합니다 (에러 아님)
//! - 이벤트를 하나도 처리하기 전의 실패(설정 로드, 배치 로드)만
//!   `success: false`가 됩니다

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use rampart_core::pipeline::{AlertConfigSource, AlertSink, CampaignStore, EventStore, TopicPublisher};
use rampart_core::types::{AlertConfig, ParsedEvent, ThreatType};

use crate::alert::AlertEngine;
use crate::campaign::{CampaignDetector, MemoryCampaignStore};
use crate::classifier::ThreatClassifier;
use crate::config::PipelineConfig;
use crate::error::WafPipelineError;
use crate::parser::{ParsedBatch, WafLogParser};

/// 분석 요청 — `type` 필드로 구분되는 세 가지 호출 모드
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisRequest {
    /// 실시간: 이미 파싱된 이벤트 목록을 직접 분석
    #[serde(rename_all = "camelCase")]
    AnalyzeEvents {
        /// 조직 식별자
        organization_id: String,
        /// 분석할 이벤트
        events: Vec<ParsedEvent>,
    },
    /// 배치: 이벤트 저장소에서 시간 범위의 미분석 이벤트를 로드해 분석
    #[serde(rename_all = "camelCase")]
    AnalyzeBatch {
        /// 조직 식별자
        organization_id: String,
        /// 범위 시작 (ISO-8601)
        start_time: DateTime<Utc>,
        /// 범위 끝 (ISO-8601)
        end_time: DateTime<Utc>,
    },
    /// 재평가: 정체된 캠페인 상태를 해소/만료 (새 이벤트 처리 없음)
    #[serde(rename_all = "camelCase")]
    AnalyzeCampaigns {
        /// 조직 식별자
        organization_id: String,
    },
}

impl AnalysisRequest {
    /// 요청 대상 조직을 반환합니다.
    pub fn organization_id(&self) -> &str {
        match self {
            Self::AnalyzeEvents {
                organization_id, ..
            }
            | Self::AnalyzeBatch {
                organization_id, ..
            }
            | Self::AnalyzeCampaigns { organization_id } => organization_id,
        }
    }
}

/// 분석 실행 요약 — 세 모드가 모두 같은 형태를 반환합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    /// 호출 전체의 성공 여부
    ///
    /// 이벤트 단위 실패가 있어도 true입니다. 이벤트를 하나도 처리하기
    /// 전의 실패만 false가 됩니다.
    pub success: bool,
    /// 시도된 이벤트 수 (이벤트별 결과와 무관)
    pub events_analyzed: u64,
    /// 위협으로 분류된 이벤트 수 (`threat_type != unknown`)
    pub threats_detected: u64,
    /// 새로 선언된 캠페인 수 (재평가 모드에서는 해소된 캠페인 수)
    pub campaigns_detected: u64,
    /// 하나 이상의 채널에 전달된 알림 수
    pub alerts_sent: u64,
    /// 이벤트/채널 단위 에러 (비어있지 않으면 성능 저하 신호)
    pub errors: Vec<String>,
}

impl AnalysisSummary {
    fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![reason.into()],
            ..Default::default()
        }
    }
}

/// 이벤트 하나의 처리 결과 (내부 집계용)
#[derive(Debug, Default)]
struct EventOutcome {
    threat_detected: bool,
    new_campaign: bool,
    alert_sent: bool,
    errors: Vec<String>,
}

struct OrchestratorInner {
    parser: WafLogParser,
    classifier: ThreatClassifier,
    detector: CampaignDetector,
    engine: AlertEngine,
    event_store: Option<Arc<dyn EventStore>>,
    config_source: Option<Arc<dyn AlertConfigSource>>,
    config: PipelineConfig,
}

/// 파이프라인 오케스트레이터
///
/// 내부 상태는 전부 `Arc` 뒤에 있으므로 복제가 저렴합니다.
///
/// # 사용 예시
/// ```ignore
/// let orchestrator = Orchestrator::builder()
///     .config(config)
///     .campaign_store(store)
///     .alert_sink(sink)
///     .build()?;
///
/// let summary = orchestrator.run(request).await;
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl Orchestrator {
    /// 새 오케스트레이터 빌더를 반환합니다.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// 원시 레코드 목록을 정규 이벤트로 파싱합니다.
    ///
    /// 스트리밍 트리거 앞단에서 실시간 요청을 만들 때 사용합니다.
    pub fn parse_records(&self, raws: &[serde_json::Value]) -> ParsedBatch {
        self.inner.parser.parse_batch(raws)
    }

    /// 설치된 분류 규칙 수를 반환합니다.
    pub fn rule_count(&self) -> usize {
        self.inner.classifier.rule_count()
    }

    /// 분석 요청을 실행하고 요약을 반환합니다.
    ///
    /// 절대 에러를 반환하지 않습니다 — 치명적 실패는
    /// `success: false` 요약으로 표현됩니다.
    pub async fn run(&self, request: AnalysisRequest) -> AnalysisSummary {
        if !self.inner.config.enabled {
            return AnalysisSummary::failed("pipeline is disabled by configuration");
        }

        let organization_id = request.organization_id().to_owned();

        // 조직 설정은 호출당 한 번만 조회합니다
        let alert_config = match self.alert_config_for(&organization_id).await {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(organization_id, error = %e, "failed to load alert config");
                return AnalysisSummary::failed(format!("failed to load alert config: {e}"));
            }
        };

        match request {
            AnalysisRequest::AnalyzeEvents { events, .. } => {
                self.analyze_events(&organization_id, events, &alert_config)
                    .await
            }
            AnalysisRequest::AnalyzeBatch {
                start_time,
                end_time,
                ..
            } => {
                self.analyze_batch(&organization_id, start_time, end_time, &alert_config)
                    .await
            }
            AnalysisRequest::AnalyzeCampaigns { .. } => {
                self.analyze_campaigns(&organization_id, &alert_config).await
            }
        }
    }

    /// 실시간 모드: 제공된 이벤트 목록을 분석합니다.
    async fn analyze_events(
        &self,
        organization_id: &str,
        events: Vec<ParsedEvent>,
        alert_config: &AlertConfig,
    ) -> AnalysisSummary {
        let mut summary = AnalysisSummary {
            success: true,
            events_analyzed: events.len() as u64,
            ..Default::default()
        };

        let organization_id: Arc<str> = Arc::from(organization_id);
        let alert_config = Arc::new(alert_config.clone());
        let parallelism = self.inner.config.parallelism.max(1);

        // 배치 내 동시 처리는 병렬도 상한까지만 허용합니다.
        // 같은 IP에 대한 증가는 저장소가 선형화합니다.
        for chunk in events.chunks(parallelism) {
            let mut tasks = JoinSet::new();

            for event in chunk.iter().cloned() {
                let inner = Arc::clone(&self.inner);
                let organization_id = Arc::clone(&organization_id);
                let alert_config = Arc::clone(&alert_config);
                tasks.spawn(async move {
                    Self::process_event(&inner, &organization_id, event, &alert_config).await
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(outcome) => {
                        if outcome.threat_detected {
                            summary.threats_detected += 1;
                        }
                        if outcome.new_campaign {
                            summary.campaigns_detected += 1;
                        }
                        if outcome.alert_sent {
                            summary.alerts_sent += 1;
                        }
                        summary.errors.extend(outcome.errors);
                    }
                    Err(e) => summary.errors.push(format!("event task failed: {e}")),
                }
            }
        }

        metrics::counter!("rampart_events_analyzed_total").increment(summary.events_analyzed);
        tracing::info!(
            organization_id = %organization_id,
            events = summary.events_analyzed,
            threats = summary.threats_detected,
            campaigns = summary.campaigns_detected,
            alerts = summary.alerts_sent,
            errors = summary.errors.len(),
            "analysis run complete"
        );

        summary
    }

    /// 배치 모드: 저장소에서 시간 범위의 이벤트를 로드해 분석합니다.
    async fn analyze_batch(
        &self,
        organization_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        alert_config: &AlertConfig,
    ) -> AnalysisSummary {
        let Some(event_store) = &self.inner.event_store else {
            return AnalysisSummary::failed("event store is not configured");
        };

        let events = match event_store
            .fetch_batch(
                organization_id,
                start_time,
                end_time,
                self.inner.config.batch_limit,
            )
            .await
        {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(organization_id, error = %e, "failed to load event batch");
                return AnalysisSummary::failed(format!("failed to load event batch: {e}"));
            }
        };

        tracing::debug!(
            organization_id,
            count = events.len(),
            limit = self.inner.config.batch_limit,
            "loaded event batch"
        );

        self.analyze_events(organization_id, events, alert_config)
            .await
    }

    /// 재평가 모드: 정체된 캠페인을 해소하고 오래된 상태를 정리합니다.
    async fn analyze_campaigns(
        &self,
        organization_id: &str,
        alert_config: &AlertConfig,
    ) -> AnalysisSummary {
        let mut summary = AnalysisSummary {
            success: true,
            ..Default::default()
        };

        match self
            .inner
            .detector
            .reevaluate(organization_id, alert_config)
            .await
        {
            Ok(outcome) => {
                summary.campaigns_detected = outcome.resolved as u64;
                tracing::info!(
                    organization_id,
                    resolved = outcome.resolved,
                    active = outcome.active,
                    "campaign reevaluation complete"
                );
            }
            Err(e) => {
                return AnalysisSummary::failed(format!("campaign reevaluation failed: {e}"));
            }
        }

        if let Err(e) = self
            .inner
            .detector
            .cleanup(self.inner.config.campaign_max_age())
            .await
        {
            summary
                .errors
                .push(format!("campaign state cleanup failed: {e}"));
        }

        summary
    }

    /// 이벤트 하나를 분류 -> 탐지 -> 조건부 알림으로 처리합니다.
    async fn process_event(
        inner: &OrchestratorInner,
        organization_id: &str,
        event: ParsedEvent,
        alert_config: &AlertConfig,
    ) -> EventOutcome {
        let mut outcome = EventOutcome::default();

        let assessment = inner.classifier.classify(&event);
        if assessment.threat_type != ThreatType::Unknown {
            outcome.threat_detected = true;
        }

        let decision = match inner
            .detector
            .detect(
                organization_id,
                &event.source_ip,
                assessment.threat_type,
                assessment.severity,
                alert_config,
            )
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                // 캠페인 과소 집계는 조용히 넘기지 않습니다
                outcome.errors.push(format!(
                    "campaign detection failed for {}: {e}",
                    event.source_ip
                ));
                return outcome;
            }
        };

        outcome.new_campaign = decision.is_new_campaign;

        let severity = decision.severity.max(assessment.severity);
        if AlertEngine::should_send(
            severity,
            decision.is_campaign,
            decision.is_new_campaign,
            decision.event_count,
            alert_config,
        ) {
            let alert =
                AlertEngine::create_alert(organization_id, &event, &assessment, &decision);
            let delivery = inner.engine.deliver(&alert, alert_config).await;
            outcome.alert_sent = delivery.success;
            outcome.errors.extend(delivery.errors);
        }

        outcome
    }

    /// 조직 알림 설정을 조회하거나 기본값으로 대체합니다.
    async fn alert_config_for(
        &self,
        organization_id: &str,
    ) -> Result<AlertConfig, WafPipelineError> {
        let Some(source) = &self.inner.config_source else {
            return Ok(AlertConfig::default());
        };

        match source.fetch(organization_id).await {
            Ok(Some(config)) => Ok(config),
            Ok(None) => {
                tracing::info!(organization_id, "no alert config found, using defaults");
                Ok(AlertConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// 오케스트레이터 빌더
///
/// 외부 협력자(저장소, 설정 소스, 전송자)를 주입하고 파이프라인을
/// 조립합니다.
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<PipelineConfig>,
    classifier: Option<ThreatClassifier>,
    campaign_store: Option<Arc<dyn CampaignStore>>,
    event_store: Option<Arc<dyn EventStore>>,
    config_source: Option<Arc<dyn AlertConfigSource>>,
    publisher: Option<Arc<dyn TopicPublisher>>,
    alert_sink: Option<Arc<dyn AlertSink>>,
}

impl OrchestratorBuilder {
    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 분류기를 지정합니다 (기본: 내장 규칙 테이블).
    pub fn classifier(mut self, classifier: ThreatClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// 캠페인 저장소를 지정합니다 (기본: 인메모리).
    ///
    /// 동시 호출이 있는 운영 환경에서는 공유 저장소 구현을 주입해야 합니다.
    pub fn campaign_store(mut self, store: Arc<dyn CampaignStore>) -> Self {
        self.campaign_store = Some(store);
        self
    }

    /// 배치 모드용 이벤트 저장소를 지정합니다.
    pub fn event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.event_store = Some(store);
        self
    }

    /// 조직 알림 설정 소스를 지정합니다.
    pub fn config_source(mut self, source: Arc<dyn AlertConfigSource>) -> Self {
        self.config_source = Some(source);
        self
    }

    /// pub/sub 발행자를 지정합니다.
    pub fn publisher(mut self, publisher: Arc<dyn TopicPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// 인앱 알림 싱크를 지정합니다.
    pub fn alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sink = Some(sink);
        self
    }

    /// 오케스트레이터를 빌드합니다.
    pub fn build(self) -> Result<Orchestrator, WafPipelineError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let classifier = match self.classifier {
            Some(classifier) => classifier,
            None => ThreatClassifier::with_default_rules()?,
        };

        let campaign_store = self.campaign_store.unwrap_or_else(|| {
            Arc::new(MemoryCampaignStore::with_max_entries(
                config.max_tracked_keys,
            ))
        });
        let detector = CampaignDetector::new(campaign_store);

        let mut engine_builder = AlertEngine::builder().delivery_timeout(config.delivery_timeout());
        if let Some(publisher) = self.publisher {
            engine_builder = engine_builder.publisher(publisher);
        }
        if let Some(sink) = self.alert_sink {
            engine_builder = engine_builder.sink(sink);
        }
        let engine = engine_builder.build()?;

        Ok(Orchestrator {
            inner: Arc::new(OrchestratorInner {
                parser: WafLogParser::new(),
                classifier,
                detector,
                engine,
                event_store: self.event_store,
                config_source: self.config_source,
                config,
            }),
        })
    }
}
