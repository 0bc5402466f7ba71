//! Per-entry transfer: resume, stream to a part file, verify, rename.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, warn};

use super::orchestrator::RunContext;
use super::state::{TransferState, TransferStatus};
use super::transport::Transport;
use crate::integrity::{verify_file, StreamingVerifier};
use crate::manifest::normalize_path;
use crate::selection::DownloadEntry;
use crate::tree::RemoteObjectRef;

/// Suffix of in-progress files.
pub const PART_SUFFIX: &str = ".part";

enum AttemptError {
    /// Worth retrying; bytes on disk are kept for resume.
    Transient(String),
    /// Content did not verify; the part file must be discarded.
    Mismatch(String),
    /// Retrying cannot help.
    Permanent(String),
    Cancelled,
}

fn io_permanent(context: &str, err: io::Error) -> AttemptError {
    AttemptError::Permanent(format!("{}: {}", context, err))
}

/// Pull entries from the intake queue until it is empty or the run is cancelled.
pub(super) async fn run_worker<T: Transport>(ctx: Arc<RunContext<T>>) {
    while let Some(index) = ctx.next_index() {
        let Some(entry) = ctx.set.get(index) else {
            continue;
        };
        transfer_entry(&ctx, entry).await;
    }
}

async fn transfer_entry<T: Transport>(ctx: &RunContext<T>, entry: &DownloadEntry) {
    let mut state = TransferState::pending(entry);

    let destination = match resolve_destination(&ctx.dest_root, &entry.destination) {
        Ok(path) => path,
        Err(reason) => return fail(ctx, &mut state, reason).await,
    };
    let part = part_path(&destination);

    match reuse_existing(&destination, &part, &entry.object).await {
        Ok(true) => {
            debug!(destination = %entry.destination, "Already present and verified");
            state.status = TransferStatus::Done;
            state.bytes_transferred = entry.object.size_bytes;
            ctx.publish(&state).await;
            return;
        }
        Ok(false) => {}
        Err(e) => {
            let reason = format!("cannot inspect {}: {}", destination.display(), e);
            return fail(ctx, &mut state, reason).await;
        }
    }

    loop {
        state.attempt_count += 1;
        let reason = match attempt(ctx, entry, &destination, &part, &mut state).await {
            Ok(()) => {
                debug!(
                    destination = %entry.destination,
                    attempts = state.attempt_count,
                    "Transfer verified"
                );
                state.status = TransferStatus::Done;
                state.error = None;
                ctx.publish(&state).await;
                return;
            }
            Err(AttemptError::Cancelled) => {
                state.status = TransferStatus::Pending;
                ctx.publish(&state).await;
                return;
            }
            Err(AttemptError::Permanent(reason)) => return fail(ctx, &mut state, reason).await,
            Err(AttemptError::Mismatch(reason)) => {
                if let Err(e) = remove_if_exists(&part).await {
                    let reason = format!("cannot discard {}: {}", part.display(), e);
                    return fail(ctx, &mut state, reason).await;
                }
                state.bytes_transferred = 0;
                reason
            }
            Err(AttemptError::Transient(reason)) => reason,
        };

        let Some(delay) = ctx.config.retry.delay_for_attempt(state.attempt_count) else {
            let reason = format!("gave up after {} attempts: {}", state.attempt_count, reason);
            return fail(ctx, &mut state, reason).await;
        };
        warn!(
            destination = %entry.destination,
            attempt = state.attempt_count,
            delay_ms = delay.as_millis() as u64,
            error = %reason,
            "Transfer attempt failed, retrying"
        );
        state.status = TransferStatus::Pending;
        state.error = Some(reason);
        ctx.publish(&state).await;

        tokio::select! {
            _ = ctx.cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn attempt<T: Transport>(
    ctx: &RunContext<T>,
    entry: &DownloadEntry,
    destination: &Path,
    part: &Path,
    state: &mut TransferState,
) -> Result<(), AttemptError> {
    let object = &entry.object;
    let expected = object.size_bytes;

    if let Some(parent) = part.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_permanent("cannot create directory", e))?;
    }

    let mut offset = match fs::metadata(part).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(io_permanent("cannot stat part file", e)),
    };
    if offset > expected {
        debug!(destination = %entry.destination, offset, expected, "Discarding oversized part file");
        remove_if_exists(part)
            .await
            .map_err(|e| io_permanent("cannot discard part file", e))?;
        offset = 0;
    }

    let mut verifier = if offset > 0 {
        seed_verifier(part, offset, object).await?
    } else {
        StreamingVerifier::new(object)
    };
    state.bytes_transferred = offset;

    if offset < expected {
        state.status = TransferStatus::InFlight;
        ctx.publish(state).await;

        let mut response = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(AttemptError::Cancelled),
            opened = ctx.transport.open(&object.url, offset) => opened.map_err(|e| {
                if e.is_transient() {
                    AttemptError::Transient(e.to_string())
                } else {
                    AttemptError::Permanent(e.to_string())
                }
            })?,
        };
        if offset > 0 && !response.resumed {
            debug!(destination = %entry.destination, "Server ignored range request, restarting");
            offset = 0;
            verifier = StreamingVerifier::new(object);
            state.bytes_transferred = 0;
        }

        let mut file = open_part(part, offset > 0)
            .await
            .map_err(|e| io_permanent("cannot open part file", e))?;
        let mut last_published = state.bytes_transferred;

        loop {
            let next = tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    flush_part(&mut file, &entry.destination).await;
                    return Err(AttemptError::Cancelled);
                }
                next = tokio::time::timeout(ctx.config.idle_timeout, response.body.next()) => next,
            };

            let chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    flush_part(&mut file, &entry.destination).await;
                    return Err(if e.is_transient() {
                        AttemptError::Transient(e.to_string())
                    } else {
                        AttemptError::Permanent(e.to_string())
                    });
                }
                Err(_) => {
                    flush_part(&mut file, &entry.destination).await;
                    return Err(AttemptError::Transient(format!(
                        "no data received for {}s",
                        ctx.config.idle_timeout.as_secs()
                    )));
                }
            };

            if state.bytes_transferred + chunk.len() as u64 > expected {
                flush_part(&mut file, &entry.destination).await;
                return Err(AttemptError::Mismatch(format!(
                    "server sent more than the declared {} bytes",
                    expected
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| io_permanent("cannot write part file", e))?;
            verifier.update(&chunk);
            state.bytes_transferred += chunk.len() as u64;

            if state.bytes_transferred - last_published >= ctx.config.progress_step_bytes {
                last_published = state.bytes_transferred;
                ctx.publish(state).await;
            }
        }
        file.flush()
            .await
            .map_err(|e| io_permanent("cannot flush part file", e))?;
    } else if expected == 0 {
        File::create(part)
            .await
            .map_err(|e| io_permanent("cannot create part file", e))?;
    }

    if state.bytes_transferred < expected {
        return Err(AttemptError::Transient(format!(
            "body ended after {} of {} bytes",
            state.bytes_transferred, expected
        )));
    }

    state.status = TransferStatus::Verifying;
    ctx.publish(state).await;

    let actual = verifier.finalize_hex();
    if !object.checksum.matches(&actual) {
        return Err(AttemptError::Mismatch(format!(
            "checksum mismatch: expected {}, got {}",
            object.checksum.digest(),
            actual
        )));
    }

    fs::rename(part, destination)
        .await
        .map_err(|e| io_permanent("cannot move verified file into place", e))
}

async fn fail<T: Transport>(ctx: &RunContext<T>, state: &mut TransferState, reason: String) {
    error!(destination = %state.destination, error = %reason, "Transfer failed");
    state.status = TransferStatus::Failed;
    state.error = Some(reason);
    ctx.publish(state).await;
}

/// Check a final file left by an earlier run.
///
/// Returns true if it verifies. An unverified file no larger than expected
/// becomes the part file so its bytes can be resumed; a larger one is removed.
async fn reuse_existing(destination: &Path, part: &Path, object: &RemoteObjectRef) -> io::Result<bool> {
    let meta = match fs::metadata(destination).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "destination exists and is not a regular file",
        ));
    }

    let path = destination.to_path_buf();
    let expected = object.clone();
    let verified = tokio::task::spawn_blocking(move || verify_file(&path, &expected))
        .await
        .map_err(io::Error::other)??;
    if verified {
        return Ok(true);
    }

    if meta.len() <= object.size_bytes {
        remove_if_exists(part).await?;
        fs::rename(destination, part).await?;
    } else {
        fs::remove_file(destination).await?;
    }
    Ok(false)
}

async fn seed_verifier(
    part: &Path,
    len: u64,
    object: &RemoteObjectRef,
) -> Result<StreamingVerifier, AttemptError> {
    let path = part.to_path_buf();
    let mut verifier = StreamingVerifier::new(object);
    tokio::task::spawn_blocking(move || verifier.seed_from_file(&path, len).map(|_| verifier))
        .await
        .map_err(|e| AttemptError::Permanent(format!("hashing task failed: {}", e)))?
        .map_err(|e| io_permanent("cannot read part file", e))
}

async fn open_part(part: &Path, append: bool) -> io::Result<File> {
    if append {
        OpenOptions::new().append(true).open(part).await
    } else {
        File::create(part).await
    }
}

/// Flush what was written so far before leaving an attempt early.
///
/// Returns false if the flush failed; the part is then re-verified on the next
/// attempt like any other partial file.
async fn flush_part<W: AsyncWrite + Unpin>(file: &mut W, destination: &str) -> bool {
    match file.flush().await {
        Ok(()) => true,
        Err(e) => {
            warn!(destination = %destination, error = %e, "Failed to flush part file");
            false
        }
    }
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Map a relative destination onto `root`, refusing anything that could escape it.
pub(crate) fn resolve_destination(root: &Path, relative: &str) -> Result<PathBuf, String> {
    let normalized = normalize_path(relative)
        .map_err(|reason| format!("refusing destination `{}`: {}", relative, reason))?;
    let mut path = root.to_path_buf();
    for segment in normalized.split('/') {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => path.push(segment),
            _ => {
                return Err(format!(
                    "refusing destination `{}`: segment `{}` is not a plain name",
                    relative, segment
                ))
            }
        }
    }
    Ok(path)
}

/// `<destination>.part`
pub(crate) fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(PART_SUFFIX);
    destination.with_file_name(name)
}
