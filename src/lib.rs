use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;

use config::Config;
use services::{
    channels::ChannelRegistry, dispatcher::Dispatcher, fanout::FanoutBuilder,
    interest::AttendanceInterestSource, notifications::ReleaseNotificationService,
    scheduler::Scheduler,
};

pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub releases: ReleaseNotificationService,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    /// Wire services over an open pool with the given channel senders.
    pub fn new(db: SqlitePool, config: Config, registry: ChannelRegistry) -> Arc<Self> {
        let dispatcher = Dispatcher::new(
            db.clone(),
            registry,
            Duration::from_secs(config.scheduler.channel_send_timeout_seconds),
        );
        let scheduler = Scheduler::new(db.clone(), Arc::new(dispatcher), config.scheduler.clone());
        let mut fanout = FanoutBuilder::new(config.fanout.default_advance_notice_hours);
        if let Some(calendar) = services::init::build_calendar(&config) {
            fanout = fanout.with_calendar(calendar);
        }
        let releases = ReleaseNotificationService::new(
            db.clone(),
            fanout,
            Arc::new(AttendanceInterestSource::new(db.clone())),
        );

        Arc::new(AppState {
            db,
            config,
            releases,
            scheduler: Arc::new(scheduler),
        })
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/releases", routes::releases::router())
        .nest("/api/notifications", routes::notifications::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
