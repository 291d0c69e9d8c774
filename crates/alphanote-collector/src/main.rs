//! AlphaNote collector CLI.
//!
//! 수집/태깅/시세 작업을 직접 실행하거나, 작업 제어 API 서버를 띄웁니다.

use std::net::SocketAddr;
use std::sync::Arc;

use alphanote_collector::api::{self, ApiState};
use alphanote_collector::config::JobStateBackend;
use alphanote_collector::modules::{self, CrawlOptions, CreatorSelection, TimeWindow};
use alphanote_collector::orchestrator::{
    CrawlArgs, JobOrchestrator, JobTask, ProcessRunner, StartOutcome,
};
use alphanote_collector::CollectorConfig;
use alphanote_core::{init_logging, time, LogConfig, LogFormat};
use alphanote_data::{
    CreatorStore, DatabaseConfig, FileJobStateStore, JobStateStore, PgJobStateStore, PgStore,
};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "alphanote-collector")]
#[command(about = "AlphaNote content collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// ANSI 색상 끄기
    #[arg(long, global = true)]
    no_color: bool,

    /// 작업 프로세스 출력 모드 (오케스트레이터가 사용)
    #[arg(long, global = true, hide = true)]
    job_output: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Zhihu 콘텐츠 수집
    Crawl {
        /// 프로필 링크 또는 url_token (쉼표 구분)
        #[arg(long)]
        creators: Option<String>,
        /// 등록된 크리에이터 user_id (쉼표 구분)
        #[arg(long)]
        creator_ids: Option<String>,
        /// 시작 날짜 (YYYY-MM-DD, 포함)
        #[arg(long)]
        start_date: Option<String>,
        /// 종료 날짜 (YYYY-MM-DD, 포함)
        #[arg(long)]
        end_date: Option<String>,
        /// 워터마크를 무시하고 전체 수집
        #[arg(long)]
        full: bool,
    },

    /// 미태깅 콘텐츠 종목 태깅
    Tag {
        /// 기존 태깅을 지우고 전체 재태깅
        #[arg(long)]
        all: bool,
    },

    /// 콘텐츠 하나의 종목 연관을 직접 지정
    TagManual {
        content_id: String,
        /// 종목 코드 (쉼표 구분, 비우면 연관 삭제)
        #[arg(long, default_value = "")]
        symbols: String,
    },

    /// 일봉 시세 증분 갱신
    UpdateMarket {
        /// 특정 종목만 갱신 (쉼표 구분)
        #[arg(long)]
        symbols: Option<String>,
    },

    /// 프로필 링크로 크리에이터 등록
    AddCreator { link: String },

    /// 크리에이터 활성 상태 전환
    ToggleCreator { url_token: String },

    /// 크리에이터 목록
    ListCreators {
        /// 비활성 크리에이터 포함
        #[arg(long)]
        all: bool,
    },

    /// 스키마 마이그레이션 적용
    InitDb,

    /// 작업 제어 API 서버
    Serve {
        /// 바인드 주소 (기본값: API_BIND)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// 작업 상태를 거쳐 작업 하나를 실행 (다른 작업이 실행 중이면 실패)
    RunJob {
        /// crawl_zhihu, tag_articles, tag_articles_all, update_market
        task: String,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
        #[arg(long)]
        creator_ids: Option<String>,
        #[arg(long)]
        full: bool,
    },
}

fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

async fn connect_store(config: &CollectorConfig) -> anyhow::Result<Arc<PgStore>> {
    let url = config.require_database_url()?;
    let store = PgStore::connect(&DatabaseConfig::new(url))
        .await
        .context("데이터베이스 연결 실패")?;
    info!("데이터베이스 연결 성공");
    Ok(Arc::new(store))
}

async fn open_job_store(
    config: &CollectorConfig,
    store: Option<&PgStore>,
) -> anyhow::Result<Arc<dyn JobStateStore>> {
    let job_store: Arc<dyn JobStateStore> = match config.job.backend {
        JobStateBackend::File => Arc::new(FileJobStateStore::new(config.job.state_path.clone())),
        JobStateBackend::Postgres => {
            let pool = match store {
                Some(store) => store.pool().clone(),
                None => connect_store(config).await?.pool().clone(),
            };
            Arc::new(PgJobStateStore::new(pool))
        }
    };
    Ok(job_store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.job_output {
        LogConfig::job_output(cli.log_level.clone())
    } else {
        let mut config = LogConfig::new(cli.log_level.clone())
            .with_env_format()
            .with_ansi(!cli.no_color);
        if let Some(format) = cli.log_format {
            config = config.with_format(format);
        }
        config
    };
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    let config = CollectorConfig::from_env()?;
    let tz = config.timezone;

    match cli.command {
        Commands::Crawl {
            creators,
            creator_ids,
            start_date,
            end_date,
            full,
        } => {
            let store = connect_store(&config).await?;

            let selection = if let Some(links) = creators {
                CreatorSelection::Links(split_list(&links))
            } else if let Some(ids) = creator_ids {
                CreatorSelection::UserIds(split_list(&ids))
            } else {
                CreatorSelection::AllActive
            };
            let start = start_date.as_deref().map(time::parse_date).transpose()?;
            let end = end_date.as_deref().map(time::parse_date).transpose()?;

            let options = CrawlOptions {
                selection,
                window: TimeWindow::from_dates(start, end, tz),
                full,
                max_page_failures: config.crawl.max_page_failures,
            };

            let cookies = modules::resolve_cookies(config.zhihu_cookies.clone(), store.as_ref()).await?;
            let client = modules::build_client(&config, cookies)?;
            let report = modules::crawl_zhihu(&client, store.as_ref(), &options).await?;
            for creator in &report.creators {
                info!(
                    url_token = %creator.url_token,
                    nickname = %creator.nickname,
                    inserted = creator.inserted,
                    updated = creator.updated,
                    skipped = creator.skipped,
                    failed_pages = creator.failed_pages,
                    "크리에이터 수집 결과"
                );
            }
            report.summary.log_summary("Zhihu 수집");
        }
        Commands::Tag { all } => {
            let store = connect_store(&config).await?;
            let summary = modules::tag_articles(store, all, tz).await?;
            summary.log_summary(if all { "전체 재태깅" } else { "태깅" });
        }
        Commands::TagManual { content_id, symbols } => {
            let store = connect_store(&config).await?;
            let associations =
                modules::tag_manual(store, &content_id, &split_list(&symbols), tz).await?;
            info!(content_id = %content_id, count = associations.len(), "수동 연관 저장");
        }
        Commands::UpdateMarket { symbols } => {
            let store = connect_store(&config).await?;
            let symbols = symbols.map(|s| split_list(&s));
            let summary = modules::update_market(store, config.market.update_config(tz), symbols).await?;
            summary.log_summary("시세 갱신");
        }
        Commands::AddCreator { link } => {
            let store = connect_store(&config).await?;
            let creator = modules::add_creator(store.as_ref(), &link).await?;
            info!(url_token = %creator.url_token, "크리에이터 등록 완료");
        }
        Commands::ToggleCreator { url_token } => {
            let store = connect_store(&config).await?;
            let Some(creator) = store.get_creator(&url_token).await? else {
                bail!("등록되지 않은 크리에이터: {}", url_token);
            };
            modules::set_creator_active(store.as_ref(), &url_token, !creator.is_active).await?;
        }
        Commands::ListCreators { all } => {
            let store = connect_store(&config).await?;
            for creator in modules::list_creators(store.as_ref(), !all).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    creator.url_token,
                    creator.nickname,
                    if creator.is_active { "active" } else { "inactive" },
                    creator
                        .last_crawled_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        Commands::InitDb => {
            let store = connect_store(&config).await?;
            store.migrate().await?;
            info!("스키마 마이그레이션 완료");
        }
        Commands::Serve { bind } => {
            let store = connect_store(&config).await?;
            let job_store = open_job_store(&config, Some(store.as_ref())).await?;
            let runner = Arc::new(ProcessRunner::current_exe()?);
            let orchestrator = JobOrchestrator::new(job_store, runner, config.job.log_flush_lines);

            let state = Arc::new(ApiState {
                orchestrator,
                store,
                timezone: tz,
            });
            let app = api::create_router(state);

            let addr = bind.unwrap_or(config.api_bind);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(addr = %addr, "작업 제어 API 시작");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            info!("Server stopped gracefully");
        }
        Commands::RunJob {
            task,
            start_date,
            end_date,
            creator_ids,
            full,
        } => {
            let crawl = CrawlArgs {
                start_date,
                end_date,
                creator_ids: creator_ids.as_deref().map(split_list).unwrap_or_default(),
                full,
            };
            crawl.validate()?;
            let Some(task) = JobTask::from_name(&task, crawl) else {
                bail!("알 수 없는 작업: {}", task);
            };

            let job_store = open_job_store(&config, None).await?;
            let runner = Arc::new(ProcessRunner::current_exe()?);
            let orchestrator = JobOrchestrator::new(job_store, runner, config.job.log_flush_lines);

            match orchestrator.run(task).await? {
                StartOutcome::Accepted { .. } => {
                    let state = orchestrator.status().await?;
                    print!("{}", state.log_output);
                    println!();
                }
                StartOutcome::Rejected { current_task } => {
                    bail!(
                        "다른 작업이 실행 중입니다: {}",
                        current_task.unwrap_or_else(|| "unknown".to_string())
                    );
                }
            }
        }
    }

    Ok(())
}

/// Ctrl+C 또는 SIGTERM을 기다립니다.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
