use sentry_tracing::EventFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Env};

/// Keeps the background log writer and the sentry client alive, drop it on shutdown.
pub struct LoggingGuard {
    _writer: Option<WorkerGuard>,
    _sentry: Option<sentry::ClientInitGuard>,
}

pub fn init_tracing(config: &Config) -> LoggingGuard {
    if let Env::Test = config.env {
        return LoggingGuard {
            _writer: None,
            _sentry: None,
        };
    }

    let file_appender = tracing_appender::rolling::daily(&config.logs_directory, "evently.log");
    let (non_blocking, writer_guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,evently=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .log_internal_errors(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_span_list(true)
                .with_target(true),
        );

    let sentry_guard = match config.sentry_dsn() {
        Some(dsn) => {
            let guard = sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    environment: Some(config.env.to_string().into()),
                    debug: config.env == Env::Development,
                    ..Default::default()
                },
            ));

            let sentry_layer = sentry_tracing::layer().event_filter(|md| match *md.level() {
                tracing::Level::ERROR | tracing::Level::WARN => EventFilter::Event,
                _ => EventFilter::Ignore,
            });

            registry.with(sentry_layer).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    };

    tracing::info!(env = %config.env, "logging initialized");

    LoggingGuard {
        _writer: Some(writer_guard),
        _sentry: sentry_guard,
    }
}
