mod cli;
mod logging;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use rampart_core::config::RampartConfig;
use rampart_core::error::DeliveryError;
use rampart_core::pipeline::{AlertConfigSource, AlertSink, BoxFuture, TopicPublisher};
use rampart_core::types::{AlertConfig, AlertRecord};
use rampart_waf_pipeline::config::PipelineConfig;
use rampart_waf_pipeline::{AnalysisRequest, Orchestrator, ThreatClassifier};

use crate::cli::RampartCli;

/// 발행 대신 로그만 남기는 pub/sub 전송자 (로컬 실행용)
struct LogTopicPublisher;

impl TopicPublisher for LogTopicPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        subject: &'a str,
        message: &'a str,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        tracing::info!(topic, subject, %message, "pubsub publish (local mode)");
        Box::pin(std::future::ready(Ok(())))
    }
}

/// 알림 레코드를 구조화 로그로 남기는 싱크 (로컬 실행용)
struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn insert<'a>(
        &'a self,
        record: &'a AlertRecord,
    ) -> BoxFuture<'a, Result<(), rampart_core::error::StoreError>> {
        tracing::info!(
            organization_id = %record.organization_id,
            alert_type = %record.alert_type,
            severity = %record.severity,
            resource = %record.resource_id,
            "alert persisted (local mode)"
        );
        Box::pin(std::future::ready(Ok(())))
    }
}

/// 파일에서 읽은 고정 알림 설정을 돌려주는 소스
struct FileConfigSource {
    config: AlertConfig,
}

impl AlertConfigSource for FileConfigSource {
    fn fetch<'a>(
        &'a self,
        _organization_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<AlertConfig>, rampart_core::error::StoreError>> {
        Box::pin(std::future::ready(Ok(Some(self.config.clone()))))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = RampartCli::parse();

    // 설정 로드 (파일이 지정되지 않으면 기본값)
    let mut config = match &cli.config {
        Some(path) => RampartConfig::load(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RampartConfig::default(),
    };

    // CLI 인자가 최고 우선순위
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    config.validate().context("invalid configuration")?;

    logging::init_tracing(&config.general)?;

    if cli.validate {
        println!("configuration ok");
        return Ok(());
    }

    let request = load_request(&cli).await?;

    let orchestrator = build_orchestrator(&cli, &config).await?;
    tracing::info!(
        organization_id = request.organization_id(),
        rules = orchestrator.rule_count(),
        "rampart analysis starting"
    );

    let summary = orchestrator.run(request).await;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.success {
        std::process::exit(1);
    }
    Ok(())
}

/// CLI 인자에서 분석 요청을 구성합니다.
async fn load_request(cli: &RampartCli) -> Result<AnalysisRequest> {
    if let Some(path) = &cli.request {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read request file {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("invalid analysis request in {}", path.display()));
    }

    if let Some(path) = &cli.records {
        let organization_id = cli
            .organization
            .clone()
            .context("--records requires --organization")?;

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read records file {}", path.display()))?;
        let raws: Vec<serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("expected a JSON array of records in {}", path.display()))?;

        // 파싱은 요청 구성 단계에서 수행합니다 — 드롭 수를 바로 보고할 수 있습니다
        let parser = rampart_waf_pipeline::WafLogParser::new();
        let batch = parser.parse_batch(&raws);
        tracing::info!(
            total = raws.len(),
            parsed = batch.events.len(),
            dropped = batch.dropped,
            "parsed raw records"
        );

        return Ok(AnalysisRequest::AnalyzeEvents {
            organization_id,
            events: batch.events,
        });
    }

    anyhow::bail!("either --request or --records must be provided")
}

/// 오케스트레이터를 조립합니다.
///
/// 로컬 실행이므로 캠페인 저장소는 인메모리, pub/sub과 인앱 싱크는
/// 로그 기반 구현을 사용합니다.
async fn build_orchestrator(cli: &RampartCli, config: &RampartConfig) -> Result<Orchestrator> {
    let pipeline_config = PipelineConfig::from_core(&config.pipeline);

    let mut classifier =
        ThreatClassifier::with_default_rules().context("failed to install default rule table")?;
    if let Some(rule_dir) = &config.pipeline.rule_dir
        && Path::new(rule_dir).is_dir()
    {
        let count = classifier
            .load_rules_from_dir(rule_dir)
            .await
            .with_context(|| format!("failed to load rules from {rule_dir}"))?;
        tracing::info!(rule_dir, count, "loaded classification rules");
    }

    let mut builder = Orchestrator::builder()
        .config(pipeline_config)
        .classifier(classifier)
        .publisher(Arc::new(LogTopicPublisher))
        .alert_sink(Arc::new(LogAlertSink));

    if let Some(path) = &cli.alert_config {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read alert config {}", path.display()))?;
        let alert_config: AlertConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid alert config in {}", path.display()))?;
        builder = builder.config_source(Arc::new(FileConfigSource {
            config: alert_config,
        }));
    }

    builder.build().context("failed to build orchestrator")
}
