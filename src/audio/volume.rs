//! Temporary volume normalisation
//!
//! At most one normalise → restore cycle runs at a time. Entering the cycle
//! hands out a [`NormalizationPermit`]; the lock is released when the permit
//! is dropped, which happens after the deferred restore or on any early exit.
//!
//! Pending restores are tracked so [`VolumeGuard::shutdown`] can run them
//! right away instead of losing them with the runtime.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::audio::command::CommandRunner;
use crate::audio::sinks::SinkDescriptor;
use crate::error::AudioError;

/// Proof of holding the normalisation lock
///
/// Dropping it releases the lock. It is not `Clone`, so release happens
/// exactly once per successful [`VolumeGuard::try_enter`].
#[derive(Debug)]
pub struct NormalizationPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for NormalizationPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        tracing::trace!("Normalisation lock released");
    }
}

/// Raw mixer readings captured before normalisation
///
/// Values are kept as the mixer printed them (`"Volume: 0.53"`); the number
/// is extracted at restore time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeSnapshot {
    readings: BTreeMap<String, String>,
}

impl VolumeSnapshot {
    pub fn insert(&mut self, sink_id: impl Into<String>, reading: impl Into<String>) {
        self.readings.insert(sink_id.into(), reading.into());
    }

    pub fn get(&self, sink_id: &str) -> Option<&str> {
        self.readings.get(sink_id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.readings.iter().map(|(id, r)| (id.as_str(), r.as_str()))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Normalisation lock plus the mixer operations it protects
pub struct VolumeGuard<R> {
    busy: Arc<AtomicBool>,
    runner: Arc<R>,
    mixer: String,
    restores: TaskTracker,
    cancel: CancellationToken,
}

impl<R> Clone for VolumeGuard<R> {
    fn clone(&self) -> Self {
        Self {
            busy: self.busy.clone(),
            runner: self.runner.clone(),
            mixer: self.mixer.clone(),
            restores: self.restores.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<R: CommandRunner> VolumeGuard<R> {
    pub fn new(runner: Arc<R>, mixer: impl Into<String>) -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            runner,
            mixer: mixer.into(),
            restores: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Take the lock if it is free
    ///
    /// Check and set happen in a single atomic step, so two requests racing
    /// between await points can never both win.
    pub fn try_enter(&self) -> Option<NormalizationPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| NormalizationPermit {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Read the current volume of each sink
    ///
    /// Sinks whose reading fails are left out.
    pub async fn snapshot(&self, sinks: &[SinkDescriptor]) -> VolumeSnapshot {
        let mut snapshot = VolumeSnapshot::default();
        for sink in sinks {
            let args = vec!["get-volume".to_string(), sink.id.clone()];
            match self.runner.run(&self.mixer, &args).await {
                Ok(reading) if !reading.is_empty() => snapshot.insert(sink.id.clone(), reading),
                Ok(_) => tracing::warn!("Empty volume reading for sink {}", sink.id),
                Err(e) => tracing::warn!("Cannot read volume of sink {}: {}", sink.id, e),
            }
        }
        snapshot
    }

    /// Set every sink to `level`, one after another
    pub async fn apply(&self, sinks: &[SinkDescriptor], level: f64) {
        let level = level.to_string();
        for sink in sinks {
            self.set_volume(&sink.id, &level).await;
        }
    }

    /// Put back the recorded volumes; returns how many sinks were restored
    pub async fn restore(&self, snapshot: &VolumeSnapshot) -> usize {
        let mut restored = 0;
        for (sink_id, reading) in snapshot.iter() {
            match numeric_portion(reading) {
                Some(level) => {
                    if self.set_volume(sink_id, level).await {
                        restored += 1;
                    }
                }
                None => {
                    let e = AudioError::UnparsableVolume {
                        sink: sink_id.to_string(),
                        reading: reading.to_string(),
                    };
                    tracing::warn!("Skipping restore: {}", e);
                }
            }
        }
        restored
    }

    /// Restore `snapshot` after `delay` on a detached task, then release
    /// the lock whatever the outcome
    ///
    /// After [`shutdown`](Self::shutdown) the delay is skipped.
    pub fn schedule_restore(
        &self,
        permit: NormalizationPermit,
        snapshot: VolumeSnapshot,
        delay: Duration,
    ) -> JoinHandle<()> {
        let guard = self.clone();
        self.restores.spawn(async move {
            // held until the task finishes or is aborted
            let _permit = permit;
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = guard.cancel.cancelled() => {
                    tracing::debug!("Shutting down, restoring volumes now");
                }
            }
            let restored = guard.restore(&snapshot).await;
            tracing::debug!(
                "Restored {}/{} sink volume(s) after {:?}",
                restored,
                snapshot.len(),
                delay
            );
        })
    }

    /// Run every pending restore immediately and wait for them
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.restores.close();
        if !self.restores.is_empty() {
            tracing::info!("Waiting for {} pending volume restore(s)", self.restores.len());
        }
        self.restores.wait().await;
    }

    async fn set_volume(&self, sink_id: &str, level: &str) -> bool {
        let args = vec![
            "set-volume".to_string(),
            sink_id.to_string(),
            level.to_string(),
        ];
        match self.runner.run(&self.mixer, &args).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Cannot set volume of sink {} to {}: {}", sink_id, level, e);
                false
            }
        }
    }
}

/// First numeric token of a mixer reading, e.g. `0.53` in `Volume: 0.53 [MUTED]`
pub fn numeric_portion(reading: &str) -> Option<&str> {
    reading
        .split_whitespace()
        .find(|token| token.parse::<f64>().is_ok_and(|v| v.is_finite()))
}
