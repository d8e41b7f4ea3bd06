//! FPI 리포트 수집기 CLI.
//!
//! 종료 코드:
//! - `0`: 새 데이터 없음
//! - `3`: 새 레코드 수집 완료
//! - `1`: 치명적 에러 (목록 페이지 접근 불가, 저장소 사용 불가, 설정 오류)

use clap::{Parser, Subcommand};
use fpi_collector::stats::EXIT_FATAL;
use fpi_collector::{modules, CollectorConfig, Result, RunSummary};
use fpi_core::logging::{init_logging, LogConfig, LogFormat};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "fpi-collector")]
#[command(about = "FPI fortnightly report collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, default_value = "pretty", global = true)]
    log_format: LogFormat,

    /// 실행 요약을 JSON으로 표준 출력에 출력
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 1회 실행: 목록 조회 → 다운로드 → 분류 → 병합 (기본 명령)
    Run,

    /// 스테이징 영역만 다시 병합 (네트워크 요청 없음)
    Reconcile,

    /// 정규 저장소 상태 출력
    Status,

    /// 가격/자금 흐름 조인 뷰를 CSV로 내보내기
    Export {
        /// 출력 파일 경로
        #[arg(long, short)]
        output: PathBuf,
    },

    /// 데몬 모드: 주기적으로 1회 실행 반복
    Daemon,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 로깅 초기화
    let log_config = LogConfig::new(format!(
        "fpi_collector={0},fpi_data={0},fpi_core={0}",
        cli.log_level
    ))
    .with_format(cli.log_format);
    if let Err(e) = init_logging(log_config) {
        eprintln!("로깅 초기화 실패: {}", e);
    }

    // 설정 로드
    let config = match CollectorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "설정 로드 실패");
            return ExitCode::from(EXIT_FATAL);
        }
    };
    tracing::debug!(
        listing_url = %config.source.listing_url,
        staging_dir = %config.storage.staging_dir.display(),
        "설정 로드 완료"
    );

    match execute(cli.command.unwrap_or(Commands::Run), &config, cli.json).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "실행 중단");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn execute(command: Commands, config: &CollectorConfig, json: bool) -> Result<u8> {
    match command {
        Commands::Run => {
            let summary = modules::run_once(config).await?;
            report(&summary, "수집 실행", json)
        }
        Commands::Reconcile => {
            let summary = modules::reconcile_staging(config).await?;
            report(&summary, "스테이징 병합", json)
        }
        Commands::Status => {
            let status = modules::dataset_status(config).await?;
            status.log();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            Ok(0)
        }
        Commands::Export { output } => {
            let rows = modules::export_joined(config, &output)?;
            if json {
                println!("{}", serde_json::json!({ "output": output, "rows": rows }));
            }
            Ok(0)
        }
        Commands::Daemon => {
            run_daemon(config).await;
            Ok(0)
        }
    }
}

fn report(summary: &RunSummary, operation: &str, json: bool) -> Result<u8> {
    summary.log_summary(operation);
    if json {
        println!("{}", summary.to_json()?);
    }

    let outcome = summary.outcome();
    tracing::info!(outcome = ?outcome, errors = summary.error_count(), "실행 결과");
    Ok(outcome.exit_code())
}

async fn run_daemon(config: &CollectorConfig) {
    tracing::info!(
        "=== 데몬 모드 시작 (주기: {}분) ===",
        config.daemon.interval_minutes
    );

    let mut interval = tokio::time::interval(config.daemon.interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("종료 신호 수신, 데몬 종료 중...");
                break;
            }
            _ = interval.tick() => {
                match modules::run_once(config).await {
                    Ok(summary) => summary.log_summary("수집 실행"),
                    Err(e) => tracing::error!("수집 실행 실패: {}", e),
                }

                tracing::info!(
                    "=== 실행 완료, 다음 실행: {}분 후 ===",
                    config.daemon.interval_minutes
                );
            }
        }
    }
}
