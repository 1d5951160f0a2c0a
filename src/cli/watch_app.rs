//! Watch mode runner
//!
//! Keeps the periodic subscription sync alive in the foreground until the
//! process is told to stop.

use std::sync::Arc;

use tracing::warn;

use crate::application::ports::{AuthProvider, EntitlementStore, PaymentProvider};
use crate::application::{SubscriptionReconciler, SyncScheduler};
use crate::domain::error::ConfigError;
use crate::domain::schedule::Interval;

use super::app::{AppContext, CommandError, Reconciler, EXIT_SUCCESS};
use super::presenter::Presenter;
use super::signals::{WatchSignal, WatchSignalHandler};

/// Parse the `--interval` override, falling back to the configured interval
fn resolve_interval(ctx: &AppContext, interval: Option<&str>) -> Result<Interval, ConfigError> {
    match interval {
        Some(s) => s.parse::<Interval>().map_err(|e| ConfigError::ValidationError {
            key: "interval".to_string(),
            message: e.to_string(),
        }),
        None => Ok(ctx.config().sync_interval_or_default()),
    }
}

/// Run watch mode
pub async fn run_watch(
    ctx: &AppContext,
    interval: Option<String>,
    presenter: &Presenter,
) -> Result<u8, CommandError> {
    let interval = resolve_interval(ctx, interval.as_deref())?;
    let reconciler = Arc::new(ctx.reconciler()?);

    let (mut signals, _signal_tx) =
        WatchSignalHandler::new().map_err(|e| CommandError::Signal(e.to_string()))?;

    let mut scheduler = SyncScheduler::new(Arc::clone(&reconciler), interval);

    start_watching(&*reconciler, &mut scheduler, presenter).await;

    presenter.info(&format!(
        "Watching every {} | PID: {} | SIGHUP: sync now | SIGINT: exit",
        interval,
        std::process::id()
    ));

    watch_loop(&reconciler, &mut signals, presenter).await;

    scheduler.stop().await;
    presenter.success("Stopped watching");
    Ok(EXIT_SUCCESS)
}

/// Show the cached entitlement, fire the startup sync and start ticking.
/// An unreadable cache is reported but does not stop the scheduler.
async fn start_watching<A, P, S>(
    reconciler: &SubscriptionReconciler<A, P, S>,
    scheduler: &mut SyncScheduler<A, P, S>,
    presenter: &Presenter,
) where
    A: AuthProvider + 'static,
    P: PaymentProvider + 'static,
    S: EntitlementStore + 'static,
{
    match reconciler.cached().await {
        Ok(cached) => {
            presenter.entitlement(cached.as_ref());
            if scheduler.observe(cached.as_ref()).is_none() && cached.is_none() {
                scheduler.on_sign_in();
            }
        }
        Err(e) => {
            // The periodic loop retries on its own schedule.
            warn!(error = %e, "could not read cached entitlement");
            presenter.warn(&format!("Could not read cached subscription: {}", e));
        }
    }
    scheduler.start();
}

async fn watch_loop(
    reconciler: &Reconciler,
    signals: &mut WatchSignalHandler,
    presenter: &Presenter,
) {
    loop {
        match signals.recv().await {
            Some(WatchSignal::SyncNow) => match reconciler.sync().await {
                Ok(outcome) => {
                    presenter.success(&outcome.summary());
                    presenter.entitlement(outcome.entitlement());
                }
                Err(e) => presenter.error(&format!("Sync failed: {}", e)),
            },
            Some(WatchSignal::Shutdown) => {
                presenter.info("Shutting down...");
                return;
            }
            // Channel closed
            None => return,
        }
    }
}
