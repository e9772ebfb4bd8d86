//! Playback orchestration
//!
//! Resolves the sound, picks target sinks, optionally normalises their
//! volume, launches the players and schedules the volume restore. Player
//! processes run on a detached task so the caller can answer the client as
//! soon as they are launched.

use futures_util::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::audio::command::CommandRunner;
use crate::audio::sinks::{SinkDescriptor, SinkInventory};
use crate::audio::volume::VolumeGuard;
use crate::config::{SoundTable, ToolConfig};
use crate::constants::TIMEOUT_EXIT_CODE;
use crate::error::{AudioError, CommandError};
use crate::protocol::{EffectiveRequest, EmittingSpeaker, RuntimeSettings};

/// Outcome of one playback launch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Player processes started
    pub players: usize,
    /// Players that exited with an error
    pub failed: usize,
    /// Players stopped by the duration cap
    pub capped: usize,
}

/// Handles to the work a request left running
///
/// Dropping this detaches both tasks; they keep running to completion.
pub struct PlaybackTask {
    pub playback: JoinHandle<PlaybackReport>,
    /// Present when this request normalised volumes
    pub restore: Option<JoinHandle<()>>,
}

impl PlaybackTask {
    /// Wait for the players and the restore to finish
    pub async fn wait(self) -> PlaybackReport {
        let report = match self.playback.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Playback task failed: {}", e);
                PlaybackReport::default()
            }
        };
        if let Some(restore) = self.restore {
            if let Err(e) = restore.await {
                tracing::error!("Volume restore task failed: {}", e);
            }
        }
        report
    }
}

/// A single player invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Sink node name, `None` for the player's default target
    pub target: Option<String>,
    /// Wrapped in the timeout tool
    pub capped: bool,
}

/// Plays sounds from the sound table on the active sinks
pub struct SoundPlayer<R> {
    sounds: SoundTable,
    tools: ToolConfig,
    runner: Arc<R>,
    inventory: SinkInventory<R>,
    guard: VolumeGuard<R>,
}

impl<R: CommandRunner> SoundPlayer<R> {
    pub fn new(sounds: SoundTable, tools: ToolConfig, runner: Arc<R>) -> Self {
        let inventory = SinkInventory::new(runner.clone(), tools.sink_dump.clone());
        let guard = VolumeGuard::new(runner.clone(), tools.mixer.clone());
        Self {
            sounds,
            tools,
            runner,
            inventory,
            guard,
        }
    }

    pub fn sounds(&self) -> &SoundTable {
        &self.sounds
    }

    pub fn volume_guard(&self) -> &VolumeGuard<R> {
        &self.guard
    }

    /// Launch playback for a validated request
    ///
    /// Returns once the players are started (and volumes normalised, if
    /// requested), not when the audio ends. Returns `None` when there is
    /// nothing to play; a missing sound file is logged, not reported.
    pub async fn play(&self, request: &EffectiveRequest) -> Option<PlaybackTask> {
        let settings = &request.settings;

        let path = match self.sounds.path(request.sound.as_str()) {
            Some(path) => path.to_path_buf(),
            None => {
                tracing::warn!("Sound {} is not in the sound table", request.sound);
                return None;
            }
        };
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::warn!("{}", AudioError::SoundFileMissing(path));
            return None;
        }

        let sinks = self.inventory.list_sinks().await;
        if sinks.is_empty() {
            tracing::warn!("No sinks found, falling back to the player's default target");
        }
        let targets = select_targets(sinks, settings.emitting_speaker);

        // The permit lives in this binding until it moves into the restore
        // task; any early exit drops it and frees the lock.
        let mut normalised = None;
        if settings.normalise_volume && !targets.is_empty() {
            match self.guard.try_enter() {
                Some(permit) => {
                    let snapshot = self.guard.snapshot(&targets).await;
                    self.guard
                        .apply(&targets, settings.normalise_volume_level)
                        .await;
                    normalised = Some((permit, snapshot));
                }
                None => {
                    tracing::debug!("Normalisation already in progress, playing at current volume");
                }
            }
        }

        let commands = self.player_commands(&path, &targets, settings);
        tracing::info!(
            "Playing {} on {} player(s){}",
            request.sound,
            commands.len(),
            if normalised.is_some() { " with normalised volume" } else { "" }
        );
        let playback = tokio::spawn(run_players(self.runner.clone(), commands));

        // measured from launch, so long sounds may be restored mid-playback
        let restore = normalised.map(|(permit, snapshot)| {
            self.guard.schedule_restore(
                permit,
                snapshot,
                Duration::from_millis(settings.volume_restore_delay_ms),
            )
        });

        Some(PlaybackTask { playback, restore })
    }

    /// One command per sink for fan-out, a single command otherwise
    pub fn player_commands(
        &self,
        path: &Path,
        targets: &[SinkDescriptor],
        settings: &RuntimeSettings,
    ) -> Vec<PlayerCommand> {
        if settings.emitting_speaker == EmittingSpeaker::All && targets.len() > 1 {
            targets
                .iter()
                .map(|sink| self.player_command(path, Some(sink.name.as_str()), settings.duration))
                .collect()
        } else {
            let target = targets.first().map(|sink| sink.name.as_str());
            vec![self.player_command(path, target, settings.duration)]
        }
    }

    fn player_command(&self, path: &Path, target: Option<&str>, duration: f64) -> PlayerCommand {
        let mut player_args = Vec::new();
        if let Some(target) = target {
            player_args.push("--target".to_string());
            player_args.push(target.to_string());
        }
        player_args.push(path_arg(path));

        let capped = duration > 0.0;
        let (program, args) = if capped {
            let mut args = vec![format!("{}s", duration), self.tools.player.clone()];
            args.extend(player_args);
            (self.tools.timeout.clone(), args)
        } else {
            (self.tools.player.clone(), player_args)
        };

        PlayerCommand {
            program,
            args,
            target: target.map(str::to_string),
            capped,
        }
    }
}

/// Narrow the discovered sinks according to the speaker policy
pub fn select_targets(
    mut sinks: Vec<SinkDescriptor>,
    speaker: EmittingSpeaker,
) -> Vec<SinkDescriptor> {
    if speaker == EmittingSpeaker::Default {
        sinks.truncate(1);
    }
    sinks
}

/// Run all players concurrently and tally the results
async fn run_players<R: CommandRunner>(
    runner: Arc<R>,
    commands: Vec<PlayerCommand>,
) -> PlaybackReport {
    let results = join_all(
        commands
            .iter()
            .map(|command| runner.run(&command.program, &command.args)),
    )
    .await;

    let mut report = PlaybackReport {
        players: commands.len(),
        ..Default::default()
    };
    for (command, result) in commands.iter().zip(results) {
        let target = command.target.as_deref().unwrap_or("default");
        match result {
            Ok(_) => {}
            Err(CommandError::Failed { code: Some(TIMEOUT_EXIT_CODE), .. }) if command.capped => {
                tracing::debug!("Playback on {} stopped by duration cap", target);
                report.capped += 1;
            }
            Err(e) => {
                tracing::error!("Player for sink {} failed: {}", target, e);
                report.failed += 1;
            }
        }
    }
    report
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::command::fake::FakeRunner;
    use crate::protocol::SoundName;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        runner: Arc<FakeRunner>,
        player: SoundPlayer<FakeRunner>,
        sound_path: String,
    }

    fn fixture(runner: FakeRunner) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let sound_path = dir.path().join("warning.wav");
        std::fs::write(&sound_path, b"RIFF").unwrap();

        let mut sounds = SoundTable::new();
        sounds.insert("warning", sound_path.clone());
        sounds.insert("missing", dir.path().join("missing.wav"));

        let runner = Arc::new(runner);
        let player = SoundPlayer::new(sounds, ToolConfig::default(), runner.clone());
        Fixture {
            _dir: dir,
            runner,
            player,
            sound_path: sound_path.to_string_lossy().into_owned(),
        }
    }

    fn two_sinks() -> FakeRunner {
        FakeRunner::with_sinks(&[(40, "speakers", "0.40"), (41, "headset", "0.85")])
    }

    fn request(name: &str, settings: RuntimeSettings) -> EffectiveRequest {
        EffectiveRequest {
            sound: SoundName::new(name),
            settings,
        }
    }

    #[tokio::test]
    async fn test_fan_out_with_normalisation() {
        let fx = fixture(two_sinks());
        let task = fx
            .player
            .play(&request("warning", RuntimeSettings::default()))
            .await
            .unwrap();
        assert!(task.restore.is_some());

        let report = task.wait().await;
        assert_eq!(
            report,
            PlaybackReport {
                players: 2,
                failed: 0,
                capped: 0,
            }
        );

        let players = fx.runner.calls_matching(&["timeout", "2s", "pw-play"]);
        assert_eq!(
            players,
            vec![
                vec!["timeout", "2s", "pw-play", "--target", "speakers", fx.sound_path.as_str()],
                vec!["timeout", "2s", "pw-play", "--target", "headset", fx.sound_path.as_str()],
            ]
        );

        // snapshot, normalise to 1.0, restore
        assert_eq!(fx.runner.calls_matching(&["wpctl", "get-volume"]).len(), 2);
        assert_eq!(fx.runner.calls_matching(&["wpctl", "set-volume", "40", "1"]).len(), 1);
        assert_eq!(fx.runner.volume("40").as_deref(), Some("0.40"));
        assert_eq!(fx.runner.volume("41").as_deref(), Some("0.85"));
        assert!(!fx.player.volume_guard().is_busy());
    }

    #[tokio::test]
    async fn test_default_speaker_uses_first_sink_only() {
        let fx = fixture(two_sinks());
        let settings = RuntimeSettings {
            emitting_speaker: EmittingSpeaker::Default,
            duration: 0.0,
            normalise_volume_level: 0.3,
            ..Default::default()
        };
        fx.player.play(&request("warning", settings)).await.unwrap().wait().await;

        assert_eq!(
            fx.runner.calls_matching(&["pw-play"]),
            vec![vec!["pw-play", "--target", "speakers", fx.sound_path.as_str()]]
        );
        assert!(fx.runner.calls_matching(&["timeout"]).is_empty());
        // only the first sink is normalised
        assert_eq!(fx.runner.calls_matching(&["wpctl", "set-volume", "40", "0.3"]).len(), 1);
        assert!(fx.runner.calls_matching(&["wpctl", "set-volume", "41"]).is_empty());
    }

    #[tokio::test]
    async fn test_no_sinks_plays_untargeted_without_normalising() {
        let fx = fixture(FakeRunner::new());
        let settings = RuntimeSettings {
            duration: 1.5,
            ..Default::default()
        };
        let task = fx.player.play(&request("warning", settings)).await.unwrap();
        assert!(task.restore.is_none());
        task.wait().await;

        assert_eq!(
            fx.runner.calls_matching(&["timeout"]),
            vec![vec!["timeout", "1.5s", "pw-play", fx.sound_path.as_str()]]
        );
        assert!(fx.runner.calls_matching(&["wpctl"]).is_empty());
        assert!(!fx.player.volume_guard().is_busy());
    }

    #[tokio::test]
    async fn test_missing_file_is_silent_noop() {
        let fx = fixture(two_sinks());
        let task = fx
            .player
            .play(&request("missing", RuntimeSettings::default()))
            .await;
        assert!(task.is_none());
        assert!(fx.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_normalise_disabled() {
        let fx = fixture(two_sinks());
        let settings = RuntimeSettings {
            normalise_volume: false,
            ..Default::default()
        };
        let task = fx.player.play(&request("warning", settings)).await.unwrap();
        assert!(task.restore.is_none());
        task.wait().await;
        assert!(fx.runner.calls_matching(&["wpctl"]).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_requests_normalise_once() {
        let fx = fixture(two_sinks());
        let settings = RuntimeSettings {
            volume_restore_delay_ms: 50,
            ..Default::default()
        };

        let first = fx.player.play(&request("warning", settings.clone())).await.unwrap();
        assert!(fx.player.volume_guard().is_busy());
        let second = fx.player.play(&request("warning", settings)).await.unwrap();
        assert!(second.restore.is_none());

        first.wait().await;
        second.wait().await;

        assert_eq!(fx.runner.calls_matching(&["wpctl", "get-volume"]).len(), 2);
        // normalise 2 sinks + restore 2 sinks, all from the first request
        assert_eq!(fx.runner.calls_matching(&["wpctl", "set-volume"]).len(), 4);
        assert_eq!(fx.runner.calls_matching(&["timeout"]).len(), 4);
        assert!(!fx.player.volume_guard().is_busy());
    }

    #[tokio::test]
    async fn test_restore_runs_while_players_still_play() {
        let runner = two_sinks();
        runner.set_player_delay(Duration::from_millis(300));
        let fx = fixture(runner);
        let settings = RuntimeSettings {
            volume_restore_delay_ms: 10,
            ..Default::default()
        };

        let task = fx.player.play(&request("warning", settings)).await.unwrap();
        let PlaybackTask { playback, restore } = task;
        restore.unwrap().await.unwrap();

        assert!(!playback.is_finished());
        assert_eq!(fx.runner.volume("40").as_deref(), Some("0.40"));
        assert!(!fx.player.volume_guard().is_busy());
        playback.await.unwrap();
    }

    #[tokio::test]
    async fn test_one_failing_player_does_not_stop_the_others() {
        let runner = two_sinks();
        runner.fail_player_for("speakers");
        let fx = fixture(runner);

        let report = fx
            .player
            .play(&request("warning", RuntimeSettings::default()))
            .await
            .unwrap()
            .wait()
            .await;

        assert_eq!(
            report,
            PlaybackReport {
                players: 2,
                failed: 1,
                capped: 0,
            }
        );
        assert_eq!(fx.runner.calls_matching(&["timeout"]).len(), 2);
        assert_eq!(fx.runner.volume("41").as_deref(), Some("0.85"));
        assert!(!fx.player.volume_guard().is_busy());
    }

    #[test]
    fn test_select_targets() {
        let sinks = vec![
            SinkDescriptor::new("1", "a"),
            SinkDescriptor::new("2", "b"),
        ];
        assert_eq!(select_targets(sinks.clone(), EmittingSpeaker::All).len(), 2);
        assert_eq!(select_targets(sinks, EmittingSpeaker::Default)[0].name, "a");
        assert!(select_targets(Vec::new(), EmittingSpeaker::Default).is_empty());
    }
}
