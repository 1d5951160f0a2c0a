//! Handlers for the session, usage, assistant, sync and webhook commands

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;

use crate::application::ports::{AuthProvider, UsageStore};
use crate::application::{
    AssistError, SyncScheduler, UsageLimiter, WebhookOutcome, WebhookProcessor,
};
use crate::domain::auth::Session;
use crate::domain::usage::UsageKind;
use crate::domain::voice::{AudioClip, AudioFormat};
use crate::infrastructure::{parse_event, SessionFile};

use super::app::{AppContext, CommandError, EXIT_ERROR, EXIT_SUCCESS, EXIT_UNAVAILABLE};
use super::args::{SessionAction, UsageAction};
use super::presenter::Presenter;

/// Extension marking a file that holds base64 audio instead of raw bytes
const BASE64_EXTENSION: &str = "b64";

/// Handle session subcommand
pub async fn handle_session_command(
    action: SessionAction,
    ctx: &AppContext,
    presenter: &Presenter,
) -> Result<u8, CommandError> {
    match action {
        SessionAction::Set {
            user_id,
            email,
            access_token,
            refresh_token,
            expires_in,
        } => {
            let session = Session {
                user_id,
                email,
                access_token,
                refresh_token,
                expires_at: Utc::now() + Duration::seconds(expires_in),
            };
            let email = session.email.clone();
            ctx.auth().sign_in_with(session).await?;
            presenter.success(&format!("Signed in as {}", email));
            sign_in_sync(ctx).await;
            Ok(EXIT_SUCCESS)
        }
        SessionAction::Show => {
            let session = ctx.auth().session().await?;
            presenter.key_value("user_id", &session.user_id);
            presenter.key_value("email", &session.email);
            presenter.key_value("expires_at", &session.expires_at.to_rfc3339());
            if session.is_expired(Utc::now()) {
                presenter.warn("Access token expired; it will be refreshed on next use");
            }
            presenter.key_value("file", &SessionFile::new().path().to_string_lossy());
            Ok(EXIT_SUCCESS)
        }
        SessionAction::Clear => {
            ctx.auth().sign_out().await?;
            forget_quota_hints(ctx).await;
            presenter.success("Signed out");
            Ok(EXIT_SUCCESS)
        }
    }
}

/// Post-sign-in sync. Runs in the background like any other trigger; the
/// command only waits for it because the process is about to exit.
async fn sign_in_sync(ctx: &AppContext) {
    let reconciler = match ctx.reconciler() {
        Ok(r) => Arc::new(r),
        Err(e) => {
            debug!(error = %e, "skipping sign-in sync");
            return;
        }
    };
    let scheduler = SyncScheduler::new(
        Arc::clone(&reconciler),
        ctx.config().sync_interval_or_default(),
    );
    if let Err(e) = scheduler.on_sign_in().await {
        debug!(error = %e, "sign-in sync task ended abnormally");
    }
    if let Ok(Some(entitlement)) = reconciler.cached().await {
        if entitlement.has_active_access() {
            forget_quota_hints(ctx).await;
        }
    }
}

/// Drop locally remembered quota denials, e.g. once a plan grants
/// unlimited use or the user signs out
async fn forget_quota_hints(ctx: &AppContext) {
    match ctx.limiter() {
        Ok(limiter) => limiter.clear_local_hints().await,
        Err(e) => debug!(error = %e, "could not clear quota hints"),
    }
}

/// Notice for an AI action that was denied earlier today. The server is
/// still asked; the hint may be stale.
async fn exhausted_notice<S: UsageStore>(
    limiter: &UsageLimiter<S>,
    user_id: &str,
    kind: UsageKind,
) -> Option<String> {
    limiter.appears_exhausted(user_id, kind).await.then(|| {
        format!(
            "{} were used up earlier today; checking again.",
            kind.label()
        )
    })
}

async fn current_user(ctx: &AppContext) -> Result<Session, CommandError> {
    Ok(ctx.auth().valid_session(Utc::now()).await?)
}

/// Handle usage subcommand
pub async fn handle_usage(
    action: Option<UsageAction>,
    ctx: &AppContext,
    presenter: &Presenter,
) -> Result<u8, CommandError> {
    let session = current_user(ctx).await?;
    let limiter = ctx.limiter()?;

    match action {
        None => {
            let snapshot = limiter.snapshot(&session.user_id).await?;
            presenter.usage(&snapshot);
            Ok(EXIT_SUCCESS)
        }
        Some(UsageAction::Check { kind }) => {
            let kind = UsageKind::from(kind);
            if limiter.can_use(&session.user_id, kind).await {
                presenter.output("available");
                Ok(EXIT_SUCCESS)
            } else {
                presenter.output("exhausted");
                Ok(EXIT_UNAVAILABLE)
            }
        }
    }
}

/// A quota denial is reported with the manual-entry fallback, not as a failure
fn report_assist_error(e: AssistError, presenter: &Presenter) -> Result<u8, CommandError> {
    if e.is_quota_exceeded() {
        presenter.warn(&e.to_string());
        presenter.info("You can still add the transaction manually.");
        return Ok(EXIT_SUCCESS);
    }
    Err(e.into())
}

/// Handle parse command
pub async fn handle_parse(
    text: &str,
    ctx: &AppContext,
    presenter: &Presenter,
) -> Result<u8, CommandError> {
    let session = current_user(ctx).await?;
    let assistant = ctx.assistant()?;

    if let Some(notice) =
        exhausted_notice(assistant.limiter(), &session.user_id, UsageKind::NaturalInput).await
    {
        presenter.info(&notice);
    }

    match assistant.parse_natural_input(&session.user_id, text).await {
        Ok(Some(draft)) => {
            presenter.draft(&draft);
            Ok(EXIT_SUCCESS)
        }
        Ok(None) => {
            presenter.warn("Could not recognise a transaction. Please add it manually.");
            Ok(EXIT_SUCCESS)
        }
        Err(e) => report_assist_error(e, presenter),
    }
}

/// Load an audio file; `*.b64` files hold a base64 payload
pub async fn load_audio(path: &Path) -> Result<AudioClip, CommandError> {
    let read_err = |e: std::io::Error| CommandError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let is_base64 = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(BASE64_EXTENSION));

    if is_base64 {
        let encoded = tokio::fs::read_to_string(path).await.map_err(read_err)?;
        let inner = path.file_stem().map(Path::new).unwrap_or(path);
        return Ok(AudioClip::from_base64(&encoded, AudioFormat::from_path(inner))?);
    }

    let data = tokio::fs::read(path).await.map_err(read_err)?;
    Ok(AudioClip::new(data, AudioFormat::from_path(path))?)
}

/// Handle transcribe command
pub async fn handle_transcribe(
    file: &Path,
    ctx: &AppContext,
    presenter: &mut Presenter,
) -> Result<u8, CommandError> {
    let audio = load_audio(file).await?;
    let session = current_user(ctx).await?;
    let assistant = ctx.assistant()?;

    if let Some(notice) =
        exhausted_notice(assistant.limiter(), &session.user_id, UsageKind::Transcription).await
    {
        presenter.info(&notice);
    }

    presenter.start_spinner(&format!("Transcribing ({})...", audio.human_readable_size()));
    match assistant.transcribe_and_analyze(&session.user_id, &audio).await {
        Ok(entry) => {
            presenter.spinner_success("Transcription complete");
            presenter.output(&entry.transcript);
            match entry.draft {
                Some(draft) => presenter.draft(&draft),
                None => presenter.warn("Could not recognise a transaction. Please add it manually."),
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.spinner_fail("Transcription not completed");
            report_assist_error(e, presenter)
        }
    }
}

/// Handle sync command (awaited manual sync)
pub async fn handle_sync(ctx: &AppContext, presenter: &mut Presenter) -> Result<u8, CommandError> {
    let reconciler = ctx.reconciler()?;

    presenter.start_spinner("Syncing subscription...");
    match reconciler.sync().await {
        Ok(outcome) => {
            presenter.spinner_success(&outcome.summary());
            if outcome.entitlement().is_some_and(|e| e.has_active_access()) {
                forget_quota_hints(ctx).await;
            }
            match outcome.entitlement() {
                Some(e) => presenter.entitlement(Some(e)),
                None => presenter.entitlement(reconciler.cached().await?.as_ref()),
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.spinner_fail(&format!("Sync failed: {}", e));
            // Last known state stays authoritative until a sync succeeds.
            if let Ok(cached) = reconciler.cached().await {
                presenter.info("Last known subscription state:");
                presenter.entitlement(cached.as_ref());
            }
            Ok(EXIT_ERROR)
        }
    }
}

/// Handle webhook command
pub async fn handle_webhook(
    file: &Path,
    ctx: &AppContext,
    presenter: &Presenter,
) -> Result<u8, CommandError> {
    let payload = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| CommandError::Read {
            path: file.display().to_string(),
            message: e.to_string(),
        })?;
    let event = parse_event(&payload)?;

    let processor = WebhookProcessor::new(ctx.payments()?, ctx.service_store()?);
    match processor.apply(&event).await? {
        WebhookOutcome::Upserted(e) => presenter.success(&format!(
            "Entitlement for {} set to {}",
            e.user_id, e.status
        )),
        WebhookOutcome::Updated {
            subscription_id,
            status,
            found: true,
        } => presenter.success(&format!("Subscription {} is now {}", subscription_id, status)),
        WebhookOutcome::Updated {
            subscription_id,
            found: false,
            ..
        } => presenter.warn(&format!(
            "No entitlement references subscription {}",
            subscription_id
        )),
        WebhookOutcome::Ignored(reason) => presenter.info(&format!("Ignored: {}", reason)),
    }

    Ok(EXIT_SUCCESS)
}
