//! 정규 시계열 병합.
//!
//! 자연 키 `(date, sector)`당 레코드가 최대 하나라는 불변식을 보장하는 유일한
//! 지점입니다. 다른 단계는 중복이나 겹침을 자유롭게 만들어도 됩니다.
//!
//! # 병합 순서
//!
//! 1. 기존 레코드 뒤에 새 레코드를 이어 붙임
//! 2. 날짜 정규화, 해석 불가 날짜는 `InvalidDate`로 보고하고 제외
//! 3. 자연 키로 그룹화
//! 4. 그룹마다 [`MergePolicy`]로 하나만 남김 (기본: 나중 배치 우선)
//! 5. 날짜 오름차순 정렬, 같은 날짜는 섹터 이름순
//!
//! 같은 입력으로 다시 병합해도 결과가 바뀌지 않습니다.

use crate::storage::csv_store::CsvStore;
use fpi_core::{
    format_date, parse_date, IngestError, NaturalKey, RawRecord, Record, SeriesValues,
};
use std::collections::{BTreeMap, BTreeSet};

/// 같은 자연 키를 가진 두 레코드 중 남길 것을 정합니다.
pub trait MergePolicy: Send + Sync {
    /// `earlier`는 먼저 들어온 레코드, `later`는 나중에 들어온 레코드입니다.
    fn resolve<V: SeriesValues>(&self, earlier: Record<V>, later: Record<V>) -> Record<V>;
}

/// 레코드 단위 최종 기록 우선 (필드 단위 병합 없음).
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchReplace;

impl MergePolicy for BatchReplace {
    fn resolve<V: SeriesValues>(&self, _earlier: Record<V>, later: Record<V>) -> Record<V> {
        later
    }
}

/// 병합 결과.
#[derive(Debug, Clone)]
pub struct MergeOutcome<V> {
    /// 중복 제거 후 정렬된 레코드
    pub records: Vec<Record<V>>,
    /// 새 키
    pub inserted: usize,
    /// 기존 키의 값이 바뀜
    pub replaced: usize,
    /// 기존 키와 값이 같음
    pub unchanged: usize,
    /// 기존 저장소에서 제외된 행 (잘못된 값, 키 중복)
    pub existing_dropped: usize,
    /// 날짜 해석 실패 등 복구된 오류
    pub issues: Vec<IngestError>,
    /// 기존 레코드가 이미 정규 형식(ISO 날짜, 정렬됨)이었는지
    existing_canonical: bool,
}

impl<V> MergeOutcome<V> {
    /// 새로 들어오거나 바뀐 레코드 수
    pub fn changed(&self) -> usize {
        self.inserted + self.replaced
    }

    /// 저장소를 다시 써야 하는지
    pub fn requires_write(&self) -> bool {
        self.changed() > 0 || self.existing_dropped > 0 || !self.existing_canonical
    }

    pub fn invalid_dates(&self) -> usize {
        self.issues
            .iter()
            .filter(|e| matches!(e, IngestError::InvalidDate { .. }))
            .count()
    }
}

/// 병합기.
#[derive(Debug, Clone, Default)]
pub struct Reconciler<P = BatchReplace> {
    policy: P,
}

impl Reconciler<BatchReplace> {
    pub fn new() -> Self {
        Self {
            policy: BatchReplace,
        }
    }
}

impl<P: MergePolicy> Reconciler<P> {
    pub fn with_policy(policy: P) -> Self {
        Self { policy }
    }

    /// 기존 레코드와 새 레코드를 병합합니다.
    pub fn merge<V: SeriesValues>(
        &self,
        existing: Vec<RawRecord<V>>,
        incoming: Vec<RawRecord<V>>,
    ) -> MergeOutcome<V> {
        let mut merged: BTreeMap<NaturalKey, Record<V>> = BTreeMap::new();
        let mut issues = Vec::new();
        let mut existing_dropped = 0;
        let mut existing_canonical = true;
        let mut previous_key: Option<NaturalKey> = None;

        for raw in existing {
            let record = match normalize(raw) {
                Ok((record, was_iso)) => {
                    existing_canonical &= was_iso;
                    record
                }
                Err(e) => {
                    existing_dropped += 1;
                    issues.push(e);
                    continue;
                }
            };

            let key = record.key();
            if previous_key.as_ref().is_some_and(|prev| *prev >= key) {
                existing_canonical = false;
            }
            previous_key = Some(key.clone());

            if self.absorb(&mut merged, key, record) {
                existing_dropped += 1;
            }
        }

        let baseline = merged.clone();
        let mut touched = BTreeSet::new();

        for raw in incoming {
            match normalize(raw) {
                Ok((record, _)) => {
                    let key = record.key();
                    touched.insert(key.clone());
                    self.absorb(&mut merged, key, record);
                }
                Err(e) => issues.push(e),
            }
        }

        let (mut inserted, mut replaced, mut unchanged) = (0, 0, 0);
        for key in &touched {
            match (baseline.get(key), merged.get(key)) {
                (None, _) => inserted += 1,
                (Some(before), Some(after)) if before == after => unchanged += 1,
                _ => replaced += 1,
            }
        }

        MergeOutcome {
            records: merged.into_values().collect(),
            inserted,
            replaced,
            unchanged,
            existing_dropped,
            issues,
            existing_canonical,
        }
    }

    /// 저장소를 읽어 병합하고, 바뀐 것이 있으면 다시 씁니다.
    ///
    /// `&mut CsvStore`를 요구하므로 한 저장소에는 한 번에 하나의 병합만 진행됩니다.
    pub fn reconcile<V: SeriesValues>(
        &self,
        store: &mut CsvStore<V>,
        incoming: Vec<RawRecord<V>>,
    ) -> Result<MergeOutcome<V>, IngestError> {
        let snapshot = store.load()?;
        let mut outcome = self.merge(snapshot.records, incoming);
        outcome.existing_dropped += snapshot.issues.len();
        outcome.issues.splice(0..0, snapshot.issues);

        if outcome.requires_write() {
            store.save(&outcome.records)?;
            tracing::info!(
                series = %V::KIND,
                path = %store.path().display(),
                records = outcome.records.len(),
                inserted = outcome.inserted,
                replaced = outcome.replaced,
                "정규 저장소 갱신"
            );
        } else {
            tracing::debug!(series = %V::KIND, records = outcome.records.len(), "변경 없음, 저장 생략");
        }

        Ok(outcome)
    }

    /// 레코드를 반영합니다. 같은 키가 이미 있었으면 `true`.
    fn absorb<V: SeriesValues>(
        &self,
        merged: &mut BTreeMap<NaturalKey, Record<V>>,
        key: NaturalKey,
        record: Record<V>,
    ) -> bool {
        match merged.remove(&key) {
            Some(earlier) => {
                merged.insert(key, self.policy.resolve(earlier, record));
                true
            }
            None => {
                merged.insert(key, record);
                false
            }
        }
    }
}

/// 날짜를 해석합니다. 원래 문자열이 ISO 형식이었는지도 함께 반환합니다.
fn normalize<V>(raw: RawRecord<V>) -> Result<(Record<V>, bool), IngestError> {
    let Some(date) = parse_date(&raw.date) else {
        return Err(IngestError::InvalidDate {
            value: raw.date,
            origin: raw.origin,
        });
    };

    let was_iso = raw.date == format_date(date);
    Ok((Record::new(date, raw.sector, raw.values), was_iso))
}
