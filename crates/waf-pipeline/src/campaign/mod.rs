//! 캠페인 탐지기 -- (조직, IP)별 슬라이딩 윈도우 공격 탐지
//!
//! 같은 출발지 IP에서 윈도우 내 이벤트가 임계값에 도달하면 공격 캠페인을
//! 선언합니다. 카운터와 상태는 주입된 [`CampaignStore`]에 보관되며,
//! 프로세스 로컬 전역 맵은 사용하지 않습니다 — 호출 간 프로세스 친화성이
//! 없는 환경에서 과소 집계는 보안 관련 실패이기 때문입니다.
//!
//! # 알림 케이던스
//! 캠페인 선언 시점에 한 번, 이후에는 이벤트 수가
//! [`CAMPAIGN_MILESTONES`]에 정확히 도달할 때만 재알림하여
//! 장기 캠페인의 알림 폭주를 막습니다.

pub mod store;

pub use store::MemoryCampaignStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use rampart_core::pipeline::CampaignStore;
use rampart_core::types::{
    AlertConfig, CampaignDeclare, CampaignKey, CampaignUpdate, Severity, ThreatType,
};

use crate::error::WafPipelineError;

/// 재알림 마일스톤 — 캠페인 이벤트 수가 이 값에 정확히 도달하면 재알림합니다.
pub const CAMPAIGN_MILESTONES: [u64; 6] = [25, 50, 100, 250, 500, 1000];

/// 캠페인 탐지 결과 — 이벤트 하나에 대한 판정
#[derive(Debug, Clone)]
pub struct CampaignDecision {
    /// 현재 캠페인 활성 여부
    pub is_campaign: bool,
    /// 이번 이벤트로 캠페인이 처음 선언되었는지
    pub is_new_campaign: bool,
    /// 캠페인 ID (캠페인인 경우)
    pub campaign_id: Option<String>,
    /// 현재 윈도우 내 이벤트 수
    pub event_count: u64,
    /// 누적 위협 유형 집합
    pub attack_types: Vec<ThreatType>,
    /// 누적 최고 심각도
    pub severity: Severity,
    /// 이번 이벤트에 대해 알림을 보내야 하는지 (케이던스 판정)
    pub should_alert: bool,
}

/// 캠페인 재평가 결과
#[derive(Debug, Clone, Copy, Default)]
pub struct ReevaluationOutcome {
    /// 이번 스윕에서 해소된 캠페인 수
    pub resolved: usize,
    /// 스윕 후에도 활성인 캠페인 수
    pub active: usize,
}

/// 캠페인 탐지기
///
/// 상태는 전부 주입된 저장소에 있으므로 탐지기 자체는 공유/복제가
/// 자유롭습니다.
#[derive(Clone)]
pub struct CampaignDetector {
    store: Arc<dyn CampaignStore>,
}

impl CampaignDetector {
    /// 주입된 저장소로 탐지기를 생성합니다.
    pub fn new(store: Arc<dyn CampaignStore>) -> Self {
        Self { store }
    }

    /// (조직, IP, 윈도우 시작)에 대해 결정적인 캠페인 ID를 생성합니다.
    pub fn campaign_id_for(key: &CampaignKey, window_start: DateTime<Utc>) -> String {
        format!(
            "waf-{}-{}-{}",
            key.organization_id,
            key.source_ip,
            window_start.timestamp()
        )
    }

    /// 분류된 이벤트 하나를 반영하고 캠페인 판정을 반환합니다.
    ///
    /// 저장소 에러는 호출자에게 전파됩니다 — 캠페인 과소 집계는
    /// 조용히 넘어가서는 안 되는 실패입니다.
    pub async fn detect(
        &self,
        organization_id: &str,
        source_ip: &str,
        threat_type: ThreatType,
        severity: Severity,
        config: &AlertConfig,
    ) -> Result<CampaignDecision, WafPipelineError> {
        let key = CampaignKey::new(organization_id, source_ip);
        let now = Utc::now();

        let snapshot = self
            .store
            .increment(&key, config.campaign_window(), now)
            .await?;

        // 임계값 도달 시 선언을 요청합니다. 이미 캠페인이면 저장소가
        // 무시하므로 선언은 정확히 한 번만 적용됩니다.
        let declare = (snapshot.count >= config.campaign_threshold).then(|| CampaignDeclare {
            campaign_id: Self::campaign_id_for(&key, snapshot.window_start),
            window_start: snapshot.window_start,
        });

        let outcome = self
            .store
            .merge(
                &key,
                CampaignUpdate {
                    threat_type,
                    severity,
                    seen_at: now,
                    event_count: snapshot.count,
                    declare,
                },
            )
            .await?;

        let state = outcome.state;
        let is_new_campaign = outcome.newly_declared;

        if is_new_campaign {
            metrics::counter!("rampart_campaigns_detected_total").increment(1);
            tracing::warn!(
                organization_id,
                source_ip,
                count = snapshot.count,
                threshold = config.campaign_threshold,
                threat_type = %threat_type,
                severity = %state.severity,
                campaign_id = state.campaign_id.as_deref().unwrap_or(""),
                "attack campaign detected"
            );
        }

        let milestone = state.is_campaign && CAMPAIGN_MILESTONES.contains(&snapshot.count);
        let should_alert = is_new_campaign || milestone;

        Ok(CampaignDecision {
            is_campaign: state.is_campaign,
            is_new_campaign,
            campaign_id: state.campaign_id,
            event_count: snapshot.count,
            attack_types: state.attack_types,
            severity: state.severity,
            should_alert,
        })
    }

    /// 캠페인을 명시적으로 해소합니다 (운영자 액션).
    ///
    /// 상태는 삭제하지 않으므로 이후 버스트는 처음부터 다시 탐지됩니다.
    pub async fn resolve(
        &self,
        organization_id: &str,
        source_ip: &str,
    ) -> Result<bool, WafPipelineError> {
        let key = CampaignKey::new(organization_id, source_ip);
        let resolved = self.store.resolve(&key).await?;
        if resolved {
            tracing::info!(organization_id, source_ip, "campaign resolved");
        }
        Ok(resolved)
    }

    /// 조직의 캠페인 상태를 재평가합니다.
    ///
    /// 윈도우가 경과하도록 새 이벤트가 없는 활성 캠페인을 해소합니다.
    /// 새 이벤트는 처리하지 않습니다.
    pub async fn reevaluate(
        &self,
        organization_id: &str,
        config: &AlertConfig,
    ) -> Result<ReevaluationOutcome, WafPipelineError> {
        let now = Utc::now();
        let window_ms = config.campaign_window().as_millis().min(i64::MAX as u128) as i64;
        let states = self.store.list_org(organization_id).await?;

        let mut outcome = ReevaluationOutcome::default();

        for state in states {
            if !state.is_campaign {
                continue;
            }

            let idle_ms = (now - state.last_seen).num_milliseconds();
            if idle_ms > window_ms {
                let key = CampaignKey::new(state.organization_id.as_str(), state.source_ip.as_str());
                if self.store.resolve(&key).await? {
                    outcome.resolved += 1;
                    tracing::info!(
                        organization_id,
                        source_ip = %state.source_ip,
                        idle_ms,
                        "stale campaign expired"
                    );
                }
            } else {
                outcome.active += 1;
            }
        }

        Ok(outcome)
    }

    /// 오래된 캠페인 상태 항목을 제거합니다.
    ///
    /// 탐지 호출과 독립적으로 주기 실행됩니다. 제거 수를 반환합니다.
    pub async fn cleanup(&self, max_age: std::time::Duration) -> Result<usize, WafPipelineError> {
        let removed = self.store.cleanup(max_age, Utc::now()).await?;
        if removed > 0 {
            tracing::debug!(removed, "cleaned up expired campaign state");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> CampaignDetector {
        CampaignDetector::new(Arc::new(MemoryCampaignStore::new()))
    }

    fn config(threshold: u64, window_mins: u64) -> AlertConfig {
        AlertConfig {
            campaign_threshold: threshold,
            campaign_window_mins: window_mins,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn below_threshold_is_not_a_campaign() {
        let detector = detector();
        let config = config(10, 5);

        for i in 1..10 {
            let decision = detector
                .detect("org-1", "1.2.3.4", ThreatType::Unknown, Severity::Low, &config)
                .await
                .unwrap();
            assert_eq!(decision.event_count, i);
            assert!(!decision.is_campaign, "event #{i} must not be a campaign");
            assert!(!decision.is_new_campaign);
        }
    }

    #[tokio::test]
    async fn threshold_boundary_declares_campaign() {
        let detector = detector();
        let config = config(10, 5);

        for _ in 1..10 {
            detector
                .detect("org-1", "1.2.3.4", ThreatType::Unknown, Severity::Low, &config)
                .await
                .unwrap();
        }

        // N번째 이벤트에서 선언
        let decision = detector
            .detect("org-1", "1.2.3.4", ThreatType::Unknown, Severity::Low, &config)
            .await
            .unwrap();
        assert_eq!(decision.event_count, 10);
        assert!(decision.is_campaign);
        assert!(decision.is_new_campaign);
        assert!(decision.should_alert);
        assert!(decision.campaign_id.is_some());
    }

    #[tokio::test]
    async fn twelve_event_scenario() {
        // 12개 BLOCK 이벤트, threshold=10, window=5분:
        // #10에서 신규 캠페인, #11~12는 활성 캠페인 (신규 아님)
        let detector = detector();
        let config = config(10, 5);

        let mut decisions = Vec::new();
        for _ in 0..12 {
            decisions.push(
                detector
                    .detect("org-1", "1.2.3.4", ThreatType::Unknown, Severity::Low, &config)
                    .await
                    .unwrap(),
            );
        }

        assert!(decisions[9].is_new_campaign);
        assert_eq!(decisions[9].event_count, 10);

        assert!(decisions[10].is_campaign);
        assert!(!decisions[10].is_new_campaign);
        assert_eq!(decisions[10].event_count, 11);

        assert!(decisions[11].is_campaign);
        assert!(!decisions[11].is_new_campaign);
        assert_eq!(decisions[11].event_count, 12);
    }

    #[tokio::test]
    async fn milestone_cadence() {
        let detector = detector();
        let config = config(10, 5);

        let mut alerted_at = Vec::new();
        for i in 1..=60u64 {
            let decision = detector
                .detect("org-1", "1.2.3.4", ThreatType::Unknown, Severity::Low, &config)
                .await
                .unwrap();
            if decision.should_alert {
                alerted_at.push(i);
            }
        }

        // 선언 시점(10) + 마일스톤(25, 50)
        assert_eq!(alerted_at, vec![10, 25, 50]);
    }

    #[tokio::test]
    async fn severity_escalates_monotonically() {
        let detector = detector();
        let config = config(3, 5);

        let sequence = [
            Severity::Low,
            Severity::High,
            Severity::Medium,
            Severity::Critical,
            Severity::Low,
        ];

        let mut last = Severity::Low;
        for severity in sequence {
            let decision = detector
                .detect("org-1", "1.2.3.4", ThreatType::Unknown, severity, &config)
                .await
                .unwrap();
            assert!(decision.severity >= last, "severity must never decrease");
            last = decision.severity;
        }
        assert_eq!(last, Severity::Critical);
    }

    #[tokio::test]
    async fn attack_types_accumulate() {
        let detector = detector();
        let config = config(2, 5);

        detector
            .detect(
                "org-1",
                "1.2.3.4",
                ThreatType::SqlInjection,
                Severity::High,
                &config,
            )
            .await
            .unwrap();
        detector
            .detect("org-1", "1.2.3.4", ThreatType::Xss, Severity::High, &config)
            .await
            .unwrap();
        let decision = detector
            .detect(
                "org-1",
                "1.2.3.4",
                ThreatType::SqlInjection,
                Severity::High,
                &config,
            )
            .await
            .unwrap();

        assert_eq!(
            decision.attack_types,
            vec![ThreatType::SqlInjection, ThreatType::Xss]
        );
    }

    #[tokio::test]
    async fn campaign_id_is_deterministic() {
        let key = CampaignKey::new("org-1", "1.2.3.4");
        let window_start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let a = CampaignDetector::campaign_id_for(&key, window_start);
        let b = CampaignDetector::campaign_id_for(&key, window_start);
        assert_eq!(a, b);
        assert_eq!(a, "waf-org-1-1.2.3.4-1700000000");
    }

    #[tokio::test]
    async fn independent_ips_have_independent_windows() {
        let detector = detector();
        let config = config(3, 5);

        for _ in 0..3 {
            detector
                .detect("org-1", "1.1.1.1", ThreatType::Unknown, Severity::Low, &config)
                .await
                .unwrap();
        }
        // 다른 IP는 영향을 받지 않습니다
        let decision = detector
            .detect("org-1", "2.2.2.2", ThreatType::Unknown, Severity::Low, &config)
            .await
            .unwrap();
        assert_eq!(decision.event_count, 1);
        assert!(!decision.is_campaign);
    }

    #[tokio::test]
    async fn resolve_allows_redetection() {
        let detector = detector();
        let config = config(3, 5);

        for _ in 0..3 {
            detector
                .detect("org-1", "1.2.3.4", ThreatType::Unknown, Severity::Low, &config)
                .await
                .unwrap();
        }
        assert!(detector.resolve("org-1", "1.2.3.4").await.unwrap());

        // 해소 후 새 버스트는 다시 임계값부터 탐지됩니다
        for i in 1..3 {
            let decision = detector
                .detect("org-1", "1.2.3.4", ThreatType::Unknown, Severity::Low, &config)
                .await
                .unwrap();
            assert_eq!(decision.event_count, i);
            assert!(!decision.is_campaign);
        }
        let decision = detector
            .detect("org-1", "1.2.3.4", ThreatType::Unknown, Severity::Low, &config)
            .await
            .unwrap();
        assert!(decision.is_new_campaign);
    }

    #[tokio::test]
    async fn reevaluate_counts_active_campaigns() {
        let detector = detector();
        let config = config(2, 5);

        for _ in 0..2 {
            detector
                .detect("org-1", "1.2.3.4", ThreatType::Unknown, Severity::Low, &config)
                .await
                .unwrap();
        }

        // 방금 활동한 캠페인은 해소되지 않습니다
        let outcome = detector.reevaluate("org-1", &config).await.unwrap();
        assert_eq!(outcome.resolved, 0);
        assert_eq!(outcome.active, 1);
    }

    #[tokio::test]
    async fn reevaluate_expires_stale_campaigns() {
        use rampart_core::pipeline::CampaignStore as _;

        let store = Arc::new(MemoryCampaignStore::new());
        let detector = CampaignDetector::new(Arc::clone(&store) as Arc<dyn CampaignStore>);
        let config = config(2, 5);

        // 오래전에 멈춘 캠페인 상태를 직접 심습니다
        let stale_time = Utc::now() - chrono::TimeDelta::minutes(30);
        let key = CampaignKey::new("org-1", "9.9.9.9");
        store
            .merge(
                &key,
                CampaignUpdate {
                    threat_type: ThreatType::Scanner,
                    severity: Severity::Medium,
                    seen_at: stale_time,
                    event_count: 5,
                    declare: Some(CampaignDeclare {
                        campaign_id: "waf-org-1-9.9.9.9-1".to_owned(),
                        window_start: stale_time,
                    }),
                },
            )
            .await
            .unwrap();

        let outcome = detector.reevaluate("org-1", &config).await.unwrap();
        assert_eq!(outcome.resolved, 1);
        assert_eq!(outcome.active, 0);

        let state = store.load(&key).await.unwrap().unwrap();
        assert!(!state.is_campaign);
    }

    #[tokio::test]
    async fn cleanup_delegates_to_store() {
        let detector = detector();
        let removed = detector
            .cleanup(std::time::Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }
}
