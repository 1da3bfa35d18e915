// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use tokio_util::sync::CancellationToken;

use crate::engine::{Engine, check_cancelled, now_millis};
use crate::error::SyncError;
use crate::isolate::isolate;
use crate::pull;
use crate::types::SyncResult;

/// Outcome of one subscription in a scheduled run.
#[derive(Debug)]
pub struct SubscriptionRun {
    /// The subscription that was pulled.
    pub subscription_id: String,
    /// Its tally, or why the run failed.
    pub outcome: Result<SyncResult, SyncError>,
}

/// Pulls every due subscription, one after another, oldest first.
///
/// Cancellation is honored between subscriptions and between the remote
/// operations of a run.
#[tracing::instrument(skip_all)]
pub(crate) async fn sync_all_due(
    engine: &Engine,
    cancel: &CancellationToken,
) -> Result<Vec<SubscriptionRun>, SyncError> {
    let due = engine.db.subscriptions.list_due(now_millis()).await?;
    tracing::info!(count = due.len(), "syncing due subscriptions");

    let mut runs = Vec::with_capacity(due.len());
    for sub in &due {
        check_cancelled(cancel)?;

        let label = format!("pull:{}", sub.id);
        let outcome = isolate(&label, pull::pull(engine, sub, cancel)).await;
        if matches!(outcome, Err(SyncError::Cancelled)) {
            return Err(SyncError::Cancelled);
        }
        runs.push(SubscriptionRun {
            subscription_id: sub.id.clone(),
            outcome,
        });
    }
    Ok(runs)
}
