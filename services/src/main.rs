use std::sync::Arc;
use std::time::Duration;

use common::config::AppConfig;
use common::logger::init_logger;
use migration::Migrator;
use sea_orm_migration::MigratorTrait;

use services::case_service::CaseService;
use services::cache::PlagiarismCache;
use services::cleanup::CleanupQueue;
use services::engine::LogObserver;
use services::notify::LogNotifier;
use services::programming::{ProgrammingCheckSettings, ProgrammingDetectionService};
use services::scheduler::ContinuousControlScheduler;
use services::sources::FsSubmissionSource;
use services::structural::MossComparator;
use services::token_detection::TokenDetectionService;
use services::vcs::FsWorkingCopyProvider;

#[tokio::main]
async fn main() {
    let config = AppConfig::global();
    init_logger(&config.log_level, &config.log_file);

    let db = db::connect().await;
    Migrator::up(&db, None).await.expect("Migration failed");

    log::info!(
        "Starting {} continuous control (every {}h)",
        config.project_name,
        config.check_interval_hours
    );

    let cache = PlagiarismCache::new();
    let cleanup = CleanupQueue::start();
    let observer = Arc::new(LogObserver);
    let notifier = Arc::new(LogNotifier);

    let provider = Arc::new(FsWorkingCopyProvider::new(&config.storage_root));
    let comparator = Arc::new(MossComparator::new(
        &config.moss_user_id,
        &config.moss_server,
        config.moss_port,
        std::path::Path::new(&config.clone_root).join("reports"),
    ));

    let programming = ProgrammingDetectionService::new(
        db.clone(),
        cache.clone(),
        provider.clone(),
        provider.clone(),
        comparator,
        observer.clone(),
        cleanup.clone(),
        ProgrammingCheckSettings {
            clone_root: config.clone_root.clone().into(),
            download_concurrency: config.download_concurrency,
            tool_timeout: Duration::from_secs(config.tool_timeout_secs),
            repo_cleanup_delay: Duration::from_secs(config.repo_cleanup_delay_secs),
            report_cleanup_delay: Duration::from_secs(config.report_cleanup_delay_secs),
            max_comparisons: config.max_comparisons,
        },
    );

    let token = TokenDetectionService::new(
        db.clone(),
        cache.clone(),
        observer,
        config.max_comparisons,
    );

    let scheduler = ContinuousControlScheduler::new(
        db.clone(),
        CaseService::new(db, notifier),
        programming,
        token,
        Arc::new(FsSubmissionSource::new(&config.storage_root)),
        config.conduct_policy_url.clone(),
    );

    scheduler
        .run_forever(Duration::from_secs(config.check_interval_hours * 3600))
        .await;
}
