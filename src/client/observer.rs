//! Observer loop: local redraw plus adaptive sync against a state source

use chrono::Utc;
use tokio::{
    sync::watch,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info};

use super::{
    reconciler::ClientReconciler,
    schedule::{Visibility, REDRAW_INTERVAL, SYNC_CHECK_INTERVAL},
};
use crate::{state::TimerSnapshot, sync::StateSource};

/// Drive `reconciler` against `source` until `shutdown` flips to true or its
/// sender goes away.
///
/// `on_frame` is called on every redraw tick while the view is not hidden.
/// Visibility changes arrive on `visibility`; coming back into view fetches
/// immediately and restarts the sync phase.
pub async fn run_observer<S, F>(
    source: &S,
    reconciler: &mut ClientReconciler,
    mut visibility: watch::Receiver<Visibility>,
    mut shutdown: watch::Receiver<bool>,
    mut on_frame: F,
) where
    S: StateSource,
    F: FnMut(&TimerSnapshot, &ClientReconciler),
{
    info!("Observing timer at {}", source.describe());

    let mut redraw = interval(REDRAW_INTERVAL);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sync_check = interval(SYNC_CHECK_INTERVAL);
    sync_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut visibility_open = true;

    reconciler.set_visibility(*visibility.borrow_and_update());
    sync_once(source, reconciler).await;

    loop {
        let drawing = reconciler.visibility() != Visibility::Hidden;
        tokio::select! {
            _ = redraw.tick(), if drawing => {
                let frame = reconciler.redraw(Utc::now());
                on_frame(&frame, reconciler);
            }

            _ = sync_check.tick(), if drawing => {
                if reconciler.should_sync(Utc::now()) {
                    sync_once(source, reconciler).await;
                }
            }

            changed = visibility.changed(), if visibility_open => {
                match changed {
                    Ok(()) => {
                        let next = *visibility.borrow_and_update();
                        if reconciler.set_visibility(next) {
                            sync_once(source, reconciler).await;
                            sync_check.reset();
                        }
                    }
                    Err(_) => {
                        debug!("Visibility source closed, staying {:?}", reconciler.visibility());
                        visibility_open = false;
                    }
                }
            }

            _ = shutdown.changed() => {
                info!("Observer stopping");
                break;
            }
        }
    }
}

/// One fetch attempt; failures are handed to the reconciler's backoff.
pub async fn sync_once<S: StateSource>(source: &S, reconciler: &mut ClientReconciler) {
    let result = source.fetch().await;
    // Fetch time, not request time: the response is as fresh as its arrival.
    let now = Utc::now();
    match result {
        Ok(Some(remote)) => {
            reconciler.merge(remote, now);
        }
        Ok(None) => reconciler.mark_synced(now),
        Err(e) => {
            debug!("Fetch from {} failed", source.describe());
            reconciler.record_failure(&e, now);
        }
    }
}
