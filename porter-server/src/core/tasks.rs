//! Background tasks
//!
//! Every long-running task is registered here so shutdown can cancel and
//! join all of them.
//!
//! - `session_sweeper` - drops expired import sessions and stray working dirs
//! - `log_cleanup` - deletes application logs past retention

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::ServerState;
use crate::import::Importer;

const LOG_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

struct RegisteredTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Registry of spawned background tasks sharing one cancellation token
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Registry whose tasks stop when `shutdown` is cancelled
    pub fn with_token(shutdown: CancellationToken) -> Self {
        Self {
            tasks: Vec::new(),
            shutdown,
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn a task. Panics inside it are caught and logged.
    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.shutdown.clone();
        let wrapped = async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) => {
                    if !token.is_cancelled() {
                        tracing::warn!(task = %name, "Background task completed unexpectedly");
                    }
                }
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        (*s).to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    tracing::error!(task = %name, panic = %panic_msg, "Background task panicked");
                }
            }
        };

        let handle = tokio::spawn(wrapped);
        tracing::debug!(task = %name, "Registered background task");
        self.tasks.push(RegisteredTask { name, handle });
    }

    /// Run `tick` every `period` until shutdown. The first tick fires after
    /// one full period.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.shutdown.clone();
        tracing::debug!(task = %name, period_secs = period.as_secs(), "Periodic task scheduled");
        self.spawn(name, async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => tick().await,
                }
            }
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn log_summary(&self) {
        let names: Vec<&str> = self.tasks.iter().map(|t| t.name).collect();
        tracing::info!(total = names.len(), tasks = ?names, "Background tasks registered");
    }

    /// Cancel every task and wait for it to finish
    pub async fn shutdown(self) {
        tracing::info!("Shutting down {} background tasks...", self.tasks.len());
        self.shutdown.cancel();

        for task in self.tasks {
            match task.handle.await {
                Ok(()) => tracing::debug!(task = %task.name, "Task completed"),
                Err(e) if e.is_cancelled() => tracing::debug!(task = %task.name, "Task cancelled"),
                Err(e) => tracing::error!(task = %task.name, error = ?e, "Task panicked"),
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

/// One sweep pass; errors are logged, never propagated
pub async fn sweep_sessions(importer: &Importer) {
    match importer.sweep_expired().await {
        Ok(report) if report.expired_sessions > 0 || report.orphan_dirs > 0 => {
            tracing::info!(
                expired_sessions = report.expired_sessions,
                orphan_dirs = report.orphan_dirs,
                "Import session sweep removed stale imports"
            );
        }
        Ok(_) => tracing::debug!("Import session sweep found nothing to remove"),
        Err(e) => tracing::warn!(error = %e, "Import session sweep failed"),
    }
}

/// Register the server's periodic tasks
pub fn register(tasks: &mut BackgroundTasks, state: &ServerState) {
    let importer: Arc<Importer> = state.importer.clone();
    tasks.spawn_periodic(
        "session_sweeper",
        Duration::from_secs(state.config.session_sweep_interval_secs),
        move || {
            let importer = importer.clone();
            async move { sweep_sessions(&importer).await }
        },
    );

    let logs_dir: PathBuf = state.config.logs_dir();
    tasks.spawn_periodic("log_cleanup", LOG_CLEANUP_INTERVAL, move || {
        let logs_dir = logs_dir.clone();
        async move {
            let result =
                tokio::task::spawn_blocking(move || crate::utils::logger::cleanup_old_logs(&logs_dir)).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Log cleanup failed"),
                Err(e) => tracing::warn!(error = %e, "Log cleanup task failed"),
            }
        }
    });
}
