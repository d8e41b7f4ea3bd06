//! 1회 수집 실행 모듈.
//!
//! 목록 조회 → 신선도 필터 → 다운로드 → 분류 → 병합 순서로 진행합니다.
//! 병합 입력은 이번 실행에서 새로 내려받은 파일뿐이며, 이미 스테이징되어 있던
//! 파일은 다시 병합하지 않습니다. 스테이징 영역 전체를 다시 병합하려면
//! [`reconcile_staging`]을 사용합니다.
//!
//! 목록 페이지 접근 불가와 저장소 사용 불가만 실행을 중단시키고, 나머지 에러는
//! 실행 요약에 집계됩니다.

use crate::{CollectorConfig, Result, RunSummary};
use fpi_core::{
    HighWaterMarks, IngestError, NetFlow, PriceBar, RawRecord, SeriesKind, StagedFile,
};
use fpi_data::{
    classify_and_extract, select_new, Classified, CsvStore, FetchOutcome, Fetcher, Reconciler,
    ReportDirectory,
};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::time::Instant;

/// 두 정규 저장소의 현재 하이워터마크
pub fn current_marks(config: &CollectorConfig) -> Result<HighWaterMarks> {
    Ok(HighWaterMarks {
        price: CsvStore::<PriceBar>::open(&config.storage.price_store).high_water_mark()?,
        flow: CsvStore::<NetFlow>::open(&config.storage.flow_store).high_water_mark()?,
    })
}

/// 전체 파이프라인 1회 실행
pub async fn run_once(config: &CollectorConfig) -> Result<RunSummary> {
    let start = Instant::now();
    let mut summary = RunSummary::new();
    let client = config.http_client()?;

    tracing::info!(listing_url = %config.source.listing_url, "수집 실행 시작");

    // 1. 하이워터마크 (매 실행마다 저장소에서 다시 계산)
    let marks = current_marks(config)?;
    tracing::info!(price = ?marks.price, flow = ?marks.flow, "하이워터마크 확인");

    // 2. 리포트 목록
    let directory = ReportDirectory::new(client.clone(), config.source.listing_url.clone());
    let links = directory.list_reports().await.map_err(|e| {
        tracing::error!(error = %e, "리포트 목록 조회 실패");
        e
    })?;
    summary.listed = links.len();

    // 3. 신선도 필터
    let selected = select_new(&links, &marks);
    summary.stale_skipped = links.len() - selected.len();

    // 4. 다운로드
    let fetcher = Fetcher::new(client, &config.storage.staging_dir)
        .with_concurrency(config.source.fetch_concurrency);
    let mut downloaded: Vec<StagedFile> = Vec::new();
    for (_, result) in fetcher.fetch_all(&selected).await {
        match result {
            Ok(FetchOutcome::Downloaded(file)) => downloaded.push(file),
            Ok(FetchOutcome::AlreadyStaged(_)) => summary.already_staged += 1,
            Err(e) => summary.record_error(&e),
        }
    }
    summary.downloaded = downloaded.len();
    summary.staged_files = downloaded.len();

    // 한 배치 안에서는 리포트 날짜가 늦은 파일이 이김
    downloaded.sort_by(|a, b| {
        (a.discovered_date, &a.filename).cmp(&(b.discovered_date, &b.filename))
    });

    // 5. 분류 + 병합 (이번 실행의 다운로드만)
    reconcile_into(config, downloaded, &mut summary).await?;

    summary.elapsed = start.elapsed();
    Ok(summary)
}

/// 스테이징 영역만 병합 (네트워크 요청 없음)
pub async fn reconcile_staging(config: &CollectorConfig) -> Result<RunSummary> {
    let start = Instant::now();
    let mut summary = RunSummary::new();
    let fetcher = Fetcher::new(config.http_client()?, &config.storage.staging_dir);

    let files = load_staging(&fetcher, &mut summary).await?;
    reconcile_into(config, files, &mut summary).await?;

    summary.elapsed = start.elapsed();
    Ok(summary)
}

/// 스테이징 영역의 파일을 스테이징된 순서대로 읽습니다.
///
/// 같은 키가 여러 파일에 있으면 가장 나중에 스테이징된 파일의 값이 남습니다.
async fn load_staging(fetcher: &Fetcher, summary: &mut RunSummary) -> Result<Vec<StagedFile>> {
    let paths = fetcher.staged_files().await?;
    summary.staged_files = paths.len();

    let mut files: Vec<StagedFile> = Vec::with_capacity(paths.len());
    for path in &paths {
        match fetcher.load(path).await {
            Ok(file) => files.push(file),
            Err(e) => {
                summary.unparsable_files += 1;
                summary.record_error(&e);
            }
        }
    }
    Ok(files)
}

/// 파일을 분류하고 두 저장소에 병합합니다. `files`의 순서가 병합 순서입니다.
async fn reconcile_into(
    config: &CollectorConfig,
    files: Vec<StagedFile>,
    summary: &mut RunSummary,
) -> Result<()> {
    // 파일별 분류 (병렬, 순서 유지)
    let classified: Vec<std::result::Result<Classified, IngestError>> = stream::iter(files)
        .map(|file| async move {
            tokio::task::spawn_blocking(move || classify_and_extract(&file))
                .await
                .unwrap_or_else(|e| Err(IngestError::unparsable("classifier task", e)))
        })
        .buffered(config.source.fetch_concurrency.max(1))
        .collect()
        .await;

    let mut price_batch: Vec<RawRecord<PriceBar>> = Vec::new();
    let mut flow_batch: Vec<RawRecord<NetFlow>> = Vec::new();

    for result in classified {
        match result {
            Ok(Classified::Price(extraction)) => {
                summary.price_files += 1;
                extraction.issues.iter().for_each(|e| summary.record_error(e));
                price_batch.extend(extraction.records);
            }
            Ok(Classified::Flow(extraction)) => {
                summary.flow_files += 1;
                extraction.issues.iter().for_each(|e| summary.record_error(e));
                flow_batch.extend(extraction.records);
            }
            Err(e) => {
                if matches!(e, IngestError::AmbiguousSchema { .. }) {
                    summary.unknown_files += 1;
                } else {
                    summary.unparsable_files += 1;
                }
                summary.record_error(&e);
            }
        }
    }

    tracing::info!(
        price_records = price_batch.len(),
        flow_records = flow_batch.len(),
        "분류 완료, 병합 시작"
    );

    // 가격/자금 흐름 저장소 동시 병합
    let price_task = spawn_reconcile(config.storage.price_store.clone(), price_batch);
    let flow_task = spawn_reconcile(config.storage.flow_store.clone(), flow_batch);
    let (price_outcome, flow_outcome) = tokio::try_join!(price_task, flow_task)?;

    summary.record_merge(SeriesKind::Price, &price_outcome?);
    summary.record_merge(SeriesKind::Flow, &flow_outcome?);

    Ok(())
}

fn spawn_reconcile<V: fpi_core::SeriesValues>(
    path: PathBuf,
    batch: Vec<RawRecord<V>>,
) -> tokio::task::JoinHandle<std::result::Result<fpi_data::MergeOutcome<V>, IngestError>> {
    tokio::task::spawn_blocking(move || {
        let mut store = CsvStore::<V>::open(path);
        Reconciler::new().reconcile(&mut store, batch)
    })
}
