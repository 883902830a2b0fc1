//! 인메모리 캠페인 저장소
//!
//! [`MemoryCampaignStore`]는 테스트와 단일 프로세스 실행용
//! [`CampaignStore`] 구현입니다. 뮤텍스 한 번의 잠금 안에서 카운터 증가와
//! 상태 병합을 수행하므로 같은 키에 대한 동시 증가가 선형화됩니다.
//!
//! 호출 간 프로세스 친화성이 없는 운영 환경에서는 공유 저지연 저장소
//! (TTL 지원 원자적 증가 연산을 가진) 기반 구현을 대신 주입해야 합니다.

use std::collections::HashMap;
use std::future::ready;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use rampart_core::error::StoreError;
use rampart_core::pipeline::{BoxFuture, CampaignStore};
use rampart_core::types::{
    CampaignKey, CampaignMergeOutcome, CampaignState, CampaignUpdate, CounterSnapshot,
};

/// 키별 저장 항목 — 윈도우 카운터와 캠페인 상태를 함께 보관합니다.
#[derive(Debug)]
struct Entry {
    /// 현재 윈도우 내 카운트
    count: u64,
    /// 현재 윈도우 시작 시각
    window_start: DateTime<Utc>,
    /// 마지막 활동 시각 (cleanup 기준)
    last_activity: DateTime<Utc>,
    /// 캠페인 상태 (첫 병합 시 생성)
    state: Option<CampaignState>,
}

/// 인메모리 캠페인 저장소
pub struct MemoryCampaignStore {
    inner: Mutex<HashMap<CampaignKey, Entry>>,
    /// 추적 키 상한 (메모리 성장 제한)
    max_entries: usize,
}

impl MemoryCampaignStore {
    /// 기본 상한(100,000 키)으로 새 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::with_max_entries(100_000)
    }

    /// 추적 키 상한을 지정하여 저장소를 생성합니다.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            max_entries,
        }
    }

    /// 현재 추적 중인 키 수를 반환합니다.
    pub fn tracked_keys(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    fn locked(&self) -> Result<MutexGuard<'_, HashMap<CampaignKey, Entry>>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("campaign store mutex poisoned".to_owned()))
    }

    fn increment_sync(
        &self,
        key: &CampaignKey,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<CounterSnapshot, StoreError> {
        let mut map = self.locked()?;

        let entry = map.entry(key.clone()).or_insert_with(|| Entry {
            count: 0,
            window_start: now,
            last_activity: now,
            state: None,
        });

        let window_ms = window.as_millis().min(i64::MAX as u128) as i64;
        let elapsed_ms = (now - entry.window_start).num_milliseconds();

        if elapsed_ms > window_ms {
            // 윈도우 만료: 새 윈도우에서 다시 시작
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        entry.last_activity = now;

        let snapshot = CounterSnapshot {
            count: entry.count,
            window_start: entry.window_start,
        };

        Self::enforce_capacity(&mut map, self.max_entries, now);

        Ok(snapshot)
    }

    fn merge_sync(
        &self,
        key: &CampaignKey,
        update: CampaignUpdate,
    ) -> Result<CampaignMergeOutcome, StoreError> {
        let mut map = self.locked()?;

        let entry = map.entry(key.clone()).or_insert_with(|| Entry {
            count: update.event_count,
            window_start: update.seen_at,
            last_activity: update.seen_at,
            state: None,
        });

        let state = entry.state.get_or_insert_with(|| CampaignState {
            organization_id: key.organization_id.clone(),
            source_ip: key.source_ip.clone(),
            event_count: 0,
            window_start: update.seen_at,
            first_seen: update.seen_at,
            last_seen: update.seen_at,
            attack_types: Vec::new(),
            severity: update.severity,
            is_campaign: false,
            campaign_id: None,
        });

        state.event_count = update.event_count;
        if update.seen_at > state.last_seen {
            state.last_seen = update.seen_at;
        }
        if !state.attack_types.contains(&update.threat_type) {
            state.attack_types.push(update.threat_type);
        }
        // 심각도는 단조 증가만 허용
        state.severity = state.severity.max(update.severity);

        let mut newly_declared = false;
        if let Some(declare) = update.declare
            && !state.is_campaign
        {
            state.is_campaign = true;
            state.campaign_id = Some(declare.campaign_id);
            state.window_start = declare.window_start;
            newly_declared = true;
        }

        if update.seen_at > entry.last_activity {
            entry.last_activity = update.seen_at;
        }

        Ok(CampaignMergeOutcome {
            state: state.clone(),
            newly_declared,
        })
    }

    fn load_sync(&self, key: &CampaignKey) -> Result<Option<CampaignState>, StoreError> {
        let map = self.locked()?;
        Ok(map.get(key).and_then(|entry| entry.state.clone()))
    }

    fn resolve_sync(&self, key: &CampaignKey) -> Result<bool, StoreError> {
        let mut map = self.locked()?;

        let Some(entry) = map.get_mut(key) else {
            return Ok(false);
        };

        // 이후 버스트가 처음부터 다시 탐지되도록 카운터도 리셋합니다
        entry.count = 0;

        match entry.state.as_mut() {
            Some(state) if state.is_campaign => {
                state.is_campaign = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn list_org_sync(&self, organization_id: &str) -> Result<Vec<CampaignState>, StoreError> {
        let map = self.locked()?;
        Ok(map
            .values()
            .filter_map(|entry| entry.state.clone())
            .filter(|state| state.organization_id == organization_id)
            .collect())
    }

    fn cleanup_sync(&self, max_age: Duration, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut map = self.locked()?;
        let before = map.len();
        let max_age_ms = max_age.as_millis().min(i64::MAX as u128) as i64;

        map.retain(|_, entry| (now - entry.last_activity).num_milliseconds() <= max_age_ms);

        Ok(before - map.len())
    }

    /// 추적 키 수가 상한을 넘으면 오래된 항목부터 정리합니다.
    fn enforce_capacity(map: &mut HashMap<CampaignKey, Entry>, max_entries: usize, now: DateTime<Utc>) {
        if map.len() <= max_entries {
            return;
        }

        // 1시간 이상 조용한 키를 먼저 제거
        map.retain(|_, entry| (now - entry.last_activity).num_seconds() < 3600);

        if map.len() > max_entries {
            tracing::warn!(
                count = map.len(),
                max = max_entries,
                "campaign store key limit exceeded after cleanup, clearing all"
            );
            map.clear();
        }
    }
}

impl Default for MemoryCampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CampaignStore for MemoryCampaignStore {
    fn increment<'a>(
        &'a self,
        key: &'a CampaignKey,
        window: Duration,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<CounterSnapshot, StoreError>> {
        Box::pin(ready(self.increment_sync(key, window, now)))
    }

    fn merge<'a>(
        &'a self,
        key: &'a CampaignKey,
        update: CampaignUpdate,
    ) -> BoxFuture<'a, Result<CampaignMergeOutcome, StoreError>> {
        Box::pin(ready(self.merge_sync(key, update)))
    }

    fn load<'a>(
        &'a self,
        key: &'a CampaignKey,
    ) -> BoxFuture<'a, Result<Option<CampaignState>, StoreError>> {
        Box::pin(ready(self.load_sync(key)))
    }

    fn resolve<'a>(&'a self, key: &'a CampaignKey) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(ready(self.resolve_sync(key)))
    }

    fn list_org<'a>(
        &'a self,
        organization_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<CampaignState>, StoreError>> {
        Box::pin(ready(self.list_org_sync(organization_id)))
    }

    fn cleanup<'a>(
        &'a self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<usize, StoreError>> {
        Box::pin(ready(self.cleanup_sync(max_age, now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rampart_core::types::{Severity, ThreatType};

    const WINDOW: Duration = Duration::from_secs(300);

    fn key() -> CampaignKey {
        CampaignKey::new("org-1", "1.2.3.4")
    }

    fn update(count: u64, now: DateTime<Utc>) -> CampaignUpdate {
        CampaignUpdate {
            threat_type: ThreatType::SqlInjection,
            severity: Severity::High,
            seen_at: now,
            event_count: count,
            declare: None,
        }
    }

    #[tokio::test]
    async fn increments_within_window() {
        let store = MemoryCampaignStore::new();
        let now = Utc::now();
        let key = key();

        let first = store.increment(&key, WINDOW, now).await.unwrap();
        assert_eq!(first.count, 1);

        let second = store.increment(&key, WINDOW, now).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.window_start, first.window_start);
    }

    #[tokio::test]
    async fn window_expiry_resets_counter() {
        let store = MemoryCampaignStore::new();
        let start = Utc::now();
        let key = key();

        for _ in 0..5 {
            store.increment(&key, WINDOW, start).await.unwrap();
        }

        // 윈도우 경과 후 첫 이벤트는 새 윈도우의 1번째
        let later = start + TimeDelta::seconds(301);
        let snapshot = store.increment(&key, WINDOW, later).await.unwrap();
        assert_eq!(snapshot.count, 1);
        assert_eq!(snapshot.window_start, later);
    }

    #[tokio::test]
    async fn windows_are_per_key() {
        let store = MemoryCampaignStore::new();
        let now = Utc::now();
        let key_a = CampaignKey::new("org-1", "1.1.1.1");
        let key_b = CampaignKey::new("org-1", "2.2.2.2");

        for _ in 0..3 {
            store.increment(&key_a, WINDOW, now).await.unwrap();
        }
        let snapshot = store.increment(&key_b, WINDOW, now).await.unwrap();
        assert_eq!(snapshot.count, 1);
    }

    #[tokio::test]
    async fn same_ip_different_org_is_independent() {
        let store = MemoryCampaignStore::new();
        let now = Utc::now();
        let key_a = CampaignKey::new("org-1", "1.2.3.4");
        let key_b = CampaignKey::new("org-2", "1.2.3.4");

        store.increment(&key_a, WINDOW, now).await.unwrap();
        let snapshot = store.increment(&key_b, WINDOW, now).await.unwrap();
        assert_eq!(snapshot.count, 1);
    }

    #[tokio::test]
    async fn merge_creates_state_on_first_event() {
        let store = MemoryCampaignStore::new();
        let now = Utc::now();
        let key = key();

        let outcome = store.merge(&key, update(1, now)).await.unwrap();
        assert!(!outcome.newly_declared);
        assert!(!outcome.state.is_campaign);
        assert_eq!(outcome.state.event_count, 1);
        assert_eq!(outcome.state.attack_types, vec![ThreatType::SqlInjection]);
        assert_eq!(outcome.state.first_seen, now);
    }

    #[tokio::test]
    async fn merge_accumulates_attack_types_deduplicated() {
        let store = MemoryCampaignStore::new();
        let now = Utc::now();
        let key = key();

        store.merge(&key, update(1, now)).await.unwrap();

        let mut second = update(2, now);
        second.threat_type = ThreatType::Xss;
        store.merge(&key, second).await.unwrap();

        let third = update(3, now); // SqlInjection again
        let outcome = store.merge(&key, third).await.unwrap();

        assert_eq!(
            outcome.state.attack_types,
            vec![ThreatType::SqlInjection, ThreatType::Xss]
        );
    }

    #[tokio::test]
    async fn merge_severity_is_monotone() {
        let store = MemoryCampaignStore::new();
        let now = Utc::now();
        let key = key();

        let mut first = update(1, now);
        first.severity = Severity::High;
        store.merge(&key, first).await.unwrap();

        // 낮은 심각도 이벤트가 와도 내려가지 않습니다
        let mut second = update(2, now);
        second.severity = Severity::Low;
        let outcome = store.merge(&key, second).await.unwrap();
        assert_eq!(outcome.state.severity, Severity::High);

        let mut third = update(3, now);
        third.severity = Severity::Critical;
        let outcome = store.merge(&key, third).await.unwrap();
        assert_eq!(outcome.state.severity, Severity::Critical);
    }

    #[tokio::test]
    async fn declare_applies_exactly_once() {
        let store = MemoryCampaignStore::new();
        let now = Utc::now();
        let key = key();

        let declare = rampart_core::types::CampaignDeclare {
            campaign_id: "waf-org-1-1.2.3.4-100".to_owned(),
            window_start: now,
        };

        let mut first = update(10, now);
        first.declare = Some(declare.clone());
        let outcome = store.merge(&key, first).await.unwrap();
        assert!(outcome.newly_declared);
        assert!(outcome.state.is_campaign);

        let mut second = update(11, now);
        second.declare = Some(declare);
        let outcome = store.merge(&key, second).await.unwrap();
        assert!(!outcome.newly_declared);
        assert!(outcome.state.is_campaign);
    }

    #[tokio::test]
    async fn resolve_keeps_state_and_resets_counter() {
        let store = MemoryCampaignStore::new();
        let now = Utc::now();
        let key = key();

        for _ in 0..10 {
            store.increment(&key, WINDOW, now).await.unwrap();
        }
        let mut declared = update(10, now);
        declared.declare = Some(rampart_core::types::CampaignDeclare {
            campaign_id: "c-1".to_owned(),
            window_start: now,
        });
        store.merge(&key, declared).await.unwrap();

        let resolved = store.resolve(&key).await.unwrap();
        assert!(resolved);

        // 상태는 남아있되 캠페인 플래그는 내려갑니다
        let state = store.load(&key).await.unwrap().unwrap();
        assert!(!state.is_campaign);

        // 카운터는 리셋되어 다음 버스트는 1부터 시작합니다
        let snapshot = store.increment(&key, WINDOW, now).await.unwrap();
        assert_eq!(snapshot.count, 1);
    }

    #[tokio::test]
    async fn resolve_unknown_key_is_false() {
        let store = MemoryCampaignStore::new();
        assert!(!store.resolve(&key()).await.unwrap());
    }

    #[tokio::test]
    async fn list_org_filters_by_organization() {
        let store = MemoryCampaignStore::new();
        let now = Utc::now();

        store
            .merge(&CampaignKey::new("org-1", "1.1.1.1"), update(1, now))
            .await
            .unwrap();
        store
            .merge(&CampaignKey::new("org-1", "2.2.2.2"), update(1, now))
            .await
            .unwrap();
        store
            .merge(&CampaignKey::new("org-2", "3.3.3.3"), update(1, now))
            .await
            .unwrap();

        let states = store.list_org("org-1").await.unwrap();
        assert_eq!(states.len(), 2);
        assert!(states.iter().all(|s| s.organization_id == "org-1"));
    }

    #[tokio::test]
    async fn cleanup_removes_stale_entries() {
        let store = MemoryCampaignStore::new();
        let old = Utc::now() - TimeDelta::hours(48);
        let now = Utc::now();

        store
            .merge(&CampaignKey::new("org-1", "9.9.9.9"), update(1, old))
            .await
            .unwrap();
        store
            .merge(&CampaignKey::new("org-1", "8.8.8.8"), update(1, now))
            .await
            .unwrap();

        let removed = store
            .cleanup(Duration::from_secs(86_400), now)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn cleanup_on_empty_store() {
        let store = MemoryCampaignStore::new();
        let removed = store
            .cleanup(Duration::from_secs(60), Utc::now())
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn capacity_enforcement_clears_quiet_keys() {
        let store = MemoryCampaignStore::with_max_entries(3);
        let old = Utc::now() - TimeDelta::hours(2);
        let now = Utc::now();

        for i in 0..3 {
            let key = CampaignKey::new("org-1", format!("10.0.0.{i}"));
            store.increment(&key, WINDOW, old).await.unwrap();
        }

        // 상한 초과를 유발하는 4번째 키 — 오래된 키들이 정리됩니다
        let fresh = CampaignKey::new("org-1", "10.0.1.1");
        store.increment(&fresh, WINDOW, now).await.unwrap();
        assert!(store.tracked_keys() <= 3);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        use std::sync::Arc;

        let store = Arc::new(MemoryCampaignStore::new());
        let now = Utc::now();
        let mut handles = Vec::new();

        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let key = CampaignKey::new("org-1", "1.2.3.4");
                for _ in 0..25 {
                    store.increment(&key, WINDOW, now).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = store
            .increment(&CampaignKey::new("org-1", "1.2.3.4"), WINDOW, now)
            .await
            .unwrap();
        assert_eq!(snapshot.count, 201);
    }
}
