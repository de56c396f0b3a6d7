//! Game session
//!
//! `Game` is driven from three places:
//!
//! - **UI thread**: `start`, `tick`, `tap`, `stop`
//! - **Loader thread**: opens the stream, decodes the assets, wires the
//!   players and starts the stream (`load`, runs once)
//! - **Audio thread**: `SessionRenderer::on_audio_ready`, the render half of
//!   the session, owned by the stream
//!
//! The UI half and the render half never share a lock. Players travel to the
//! renderer through the command queue before the stream starts; afterwards
//! the UI only touches the clap's atomic flags and reads the song clock.

use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use basedrop::Shared;
use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;

use super::clock::{monotonic_ms, BeatGrid, SongClock};
use super::event::{GameEvent, EVENT_CAPACITY};
use super::feedback::{ScreenColor, VisualFeedback};
use super::judge::{judge, TapVerdict};
use super::state::{AtomicGameState, GameState};
use crate::audio::{
    AudioError, AudioHost, AudioStream, AudioStreamCallback, DataCallbackResult,
    SampleRateConversionQuality,
};
use crate::config::GameConfig;
use crate::engine::{command_channel, gc_handle, Mixer, Player, PlayerHandle, RenderCommand};
use crate::source::{SourceDecoder, SourceError};
use crate::types::{AudioProperties, Sample};

/// Why loading ended in `FailedToLoad`
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open stream: {0}")]
    StreamOpen(#[source] AudioError),

    #[error("Could not load source data for {asset}: {source}")]
    SourceDecode {
        asset: String,
        #[source]
        source: SourceError,
    },

    #[error("Failed to start stream: {0}")]
    StreamStart(#[source] AudioError),

    #[error("Render command queue is full")]
    QueueFull,
}

/// State visible to the UI, the loader and (via the clock) the renderer
struct SessionShared {
    state: AtomicGameState,
    clock: Arc<SongClock>,
    clap: OnceLock<PlayerHandle>,
    events: Sender<GameEvent>,
}

impl SessionShared {
    fn finish(&self, next: GameState) {
        if self.state.finish(next) {
            log::info!("Game state: {}", next);
            let _ = self.events.try_send(GameEvent::StateChanged(next));
        }
    }
}

/// The rhythm game session
pub struct Game {
    config: GameConfig,
    host: Arc<dyn AudioHost>,
    decoder: Arc<dyn SourceDecoder>,
    shared: Arc<SessionShared>,
    grid: BeatGrid,
    events: Receiver<GameEvent>,
    loader: Option<JoinHandle<Option<Box<dyn AudioStream>>>>,
    stream: Option<Box<dyn AudioStream>>,
    started: bool,
}

impl Game {
    pub fn new(
        config: GameConfig,
        host: Arc<dyn AudioHost>,
        decoder: Arc<dyn SourceDecoder>,
    ) -> Self {
        let (events_tx, events_rx) = channel::bounded(EVENT_CAPACITY);
        let grid = BeatGrid::from(&config.timing);
        Self {
            config,
            host,
            decoder,
            shared: Arc::new(SessionShared {
                state: AtomicGameState::new(),
                clock: Arc::new(SongClock::new()),
                clap: OnceLock::new(),
                events: events_tx,
            }),
            grid,
            events: events_rx,
            loader: None,
            stream: None,
            started: false,
        }
    }

    /// Begin loading on a background thread and return immediately
    ///
    /// Only the first call has any effect.
    pub fn start(&mut self) {
        if self.started {
            log::warn!("Game already started");
            return;
        }
        self.started = true;

        let ctx = LoadContext {
            config: self.config.clone(),
            host: Arc::clone(&self.host),
            decoder: Arc::clone(&self.decoder),
            shared: Arc::clone(&self.shared),
        };

        match thread::Builder::new()
            .name("game-loader".to_string())
            .spawn(move || load(ctx))
        {
            Ok(handle) => self.loader = Some(handle),
            Err(e) => {
                log::error!("Failed to spawn loader thread: {}", e);
                self.shared.finish(GameState::FailedToLoad);
            }
        }
    }

    /// Block until loading has finished, then return the final state
    ///
    /// Returns `Loading` only if `start` was never called.
    pub fn wait_for_load(&mut self) -> GameState {
        if let Some(loader) = self.loader.take() {
            match loader.join() {
                Ok(stream) => self.stream = stream,
                Err(_) => {
                    log::error!("Loader thread panicked");
                    self.shared.finish(GameState::FailedToLoad);
                }
            }
        }
        self.state()
    }

    /// Tear the session down
    ///
    /// A load in progress is not interrupted: this waits for it, then stops
    /// and closes the stream. Players and sources are released only after
    /// the stream has stopped calling back.
    pub fn stop(&mut self) {
        self.wait_for_load();
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.request_stop() {
                log::warn!("Failed to stop stream: {}", e);
            }
            drop(stream);
            log::info!("Audio stream closed");
        }
    }

    pub fn state(&self) -> GameState {
        self.shared.state.load()
    }

    /// Receiver for state changes and tap verdicts
    pub fn events(&self) -> Receiver<GameEvent> {
        self.events.clone()
    }

    pub fn clock(&self) -> &SongClock {
        &self.shared.clock
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Negotiated stream format, once loading finished and was collected
    pub fn stream_properties(&self) -> Option<AudioProperties> {
        self.stream.as_ref().map(|s| s.properties())
    }

    /// Per-frame update: show the colour for the current state
    pub fn tick(&self, feedback: &mut dyn VisualFeedback) {
        feedback.set_screen_color(ScreenColor::for_state(self.state()));
    }

    /// Handle a tap at monotonic time `timestamp_ms` (see `monotonic_ms`)
    ///
    /// Triggers the clap and queues a `TapJudged` event. Never blocks;
    /// ignored unless the game is playing.
    pub fn tap(&self, timestamp_ms: i64) {
        if self.state() != GameState::Playing {
            log::debug!("Tap ignored while {}", self.state());
            return;
        }

        if let Some(clap) = self.shared.clap.get() {
            clap.set_playing(true);
        }

        if let Some(verdict) = self.judge_tap(timestamp_ms) {
            log::debug!(
                "Tap at {}ms, beat {}ms: {:?}",
                verdict.song_position_ms,
                verdict.expected_ms,
                verdict.result
            );
            let _ = self.shared.events.try_send(GameEvent::TapJudged(verdict));
        }
    }

    fn judge_tap(&self, timestamp_ms: i64) -> Option<TapVerdict> {
        let position = self.shared.clock.song_position_ms(timestamp_ms)?;
        let expected = self.grid.nearest_beat(position);
        Some(TapVerdict {
            song_position_ms: position,
            expected_ms: expected,
            result: judge(position, expected, self.config.timing.tap_window_ms),
        })
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the loader thread needs, moved into it
struct LoadContext {
    config: GameConfig,
    host: Arc<dyn AudioHost>,
    decoder: Arc<dyn SourceDecoder>,
    shared: Arc<SessionShared>,
}

fn load(ctx: LoadContext) -> Option<Box<dyn AudioStream>> {
    let started = Instant::now();
    match open_and_wire(&ctx) {
        Ok(stream) => {
            log::info!("Game loaded in {:?}", started.elapsed());
            ctx.shared.finish(GameState::Playing);
            Some(stream)
        }
        Err(e) => {
            // Any stream opened along the way has already been closed
            log::error!("{}", e);
            ctx.shared.finish(GameState::FailedToLoad);
            None
        }
    }
}

fn open_and_wire(ctx: &LoadContext) -> Result<Box<dyn AudioStream>, LoadError> {
    let (mut commands, consumer) = command_channel();
    let renderer = SessionRenderer::new(consumer, Arc::clone(&ctx.shared.clock));

    let mut stream = ctx
        .config
        .stream
        .open_stream(ctx.host.as_ref(), Box::new(renderer))
        .map_err(LoadError::StreamOpen)?;

    let properties = stream.properties();
    log::info!(
        "Stream open on {}: {} ch @ {}Hz, {} frames ({:.1}ms)",
        ctx.host.name(),
        properties.channel_count,
        properties.sample_rate,
        stream.buffer_size(),
        stream.latency_ms()
    );

    let quality = ctx.config.stream.conversion_quality;
    let assets = &ctx.config.assets;
    let clap = decode_player(ctx.decoder.as_ref(), &assets.clap, properties, quality)?;
    let backing = decode_player(ctx.decoder.as_ref(), &assets.backing_track, properties, quality)?;
    backing.set_playing(true);
    backing.set_looping(true);

    let clap_handle = clap.handle();
    for command in [
        RenderCommand::AddTrack(clap),
        RenderCommand::AddTrack(backing),
        RenderCommand::SetChannelCount(properties.channel_count),
    ] {
        commands.push(command).map_err(|_| LoadError::QueueFull)?;
    }

    ctx.shared
        .clock
        .configure(properties.sample_rate, stream.latency_ms());
    let _ = ctx.shared.clap.set(clap_handle);

    stream.request_start().map_err(LoadError::StreamStart)?;
    Ok(stream)
}

fn decode_player(
    decoder: &dyn SourceDecoder,
    asset: &str,
    properties: AudioProperties,
    quality: SampleRateConversionQuality,
) -> Result<Player, LoadError> {
    let source = decoder
        .decode(asset, properties, quality)
        .map_err(|source| LoadError::SourceDecode {
            asset: asset.to_string(),
            source,
        })?;
    Ok(Player::new(Shared::new(&gc_handle(), source)))
}

/// Render half of the session, owned by the audio stream
pub struct SessionRenderer {
    mixer: Mixer,
    commands: rtrb::Consumer<RenderCommand>,
    clock: Arc<SongClock>,
}

impl SessionRenderer {
    pub fn new(commands: rtrb::Consumer<RenderCommand>, clock: Arc<SongClock>) -> Self {
        Self {
            mixer: Mixer::new(),
            commands,
            clock,
        }
    }
}

impl AudioStreamCallback for SessionRenderer {
    fn on_audio_ready(&mut self, audio_data: &mut [Sample], num_frames: usize) -> DataCallbackResult {
        self.mixer.process_commands(&mut self.commands);
        self.mixer.render_audio(audio_data, num_frames);
        if self.mixer.track_count() > 0 {
            self.clock.advance(monotonic_ms(), num_frames);
        }
        DataCallbackResult::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioResult, AudioStreamBuilder};
    use crate::game::judge::TapResult;
    use crate::source::{AudioSource, SourceResult};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const CLAP_LEVEL: f32 = 0.5;
    const BACKING_LEVEL: f32 = 0.25;

    /// Stands in for the audio device; tests pump the callback by hand
    #[derive(Default)]
    struct FakeDevice {
        callback: Mutex<Option<Box<dyn AudioStreamCallback>>>,
        started: AtomicBool,
        closed: AtomicBool,
    }

    impl FakeDevice {
        fn pump(&self, num_frames: usize) -> Vec<Sample> {
            let mut buffer = vec![0.0; num_frames * 2];
            if let Some(callback) = self.callback.lock().unwrap().as_mut() {
                let result = callback.on_audio_ready(&mut buffer, num_frames);
                assert_eq!(result, DataCallbackResult::Continue);
            }
            buffer
        }
    }

    struct FakeHost {
        device: Arc<FakeDevice>,
        fail_open: bool,
        fail_start: bool,
    }

    impl AudioHost for FakeHost {
        fn name(&self) -> &str {
            "fake"
        }

        fn open_stream(
            &self,
            builder: &AudioStreamBuilder,
            callback: Box<dyn AudioStreamCallback>,
        ) -> AudioResult<Box<dyn AudioStream>> {
            if self.fail_open {
                return Err(AudioError::DeviceNotFound("fake".to_string()));
            }
            *self.device.callback.lock().unwrap() = Some(callback);
            Ok(Box::new(FakeStream {
                device: Arc::clone(&self.device),
                properties: AudioProperties::new(builder.channel_count, builder.sample_rate),
                fail_start: self.fail_start,
            }))
        }
    }

    struct FakeStream {
        device: Arc<FakeDevice>,
        properties: AudioProperties,
        fail_start: bool,
    }

    impl AudioStream for FakeStream {
        fn properties(&self) -> AudioProperties {
            self.properties
        }

        fn buffer_size(&self) -> u32 {
            256
        }

        fn request_start(&mut self) -> AudioResult<()> {
            if self.fail_start {
                return Err(AudioError::StreamPlayError("device busy".to_string()));
            }
            self.device.started.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn request_stop(&mut self) -> AudioResult<()> {
            self.device.started.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Drop for FakeStream {
        fn drop(&mut self) {
            self.device.started.store(false, Ordering::SeqCst);
            self.device.closed.store(true, Ordering::SeqCst);
            self.device.callback.lock().unwrap().take();
        }
    }

    /// Produces constant-level sources; can fail or be slow
    #[derive(Default)]
    struct FakeDecoder {
        fail_asset: Option<&'static str>,
        delay: Duration,
        decoded: Mutex<Vec<String>>,
    }

    impl SourceDecoder for FakeDecoder {
        fn decode(
            &self,
            asset: &str,
            target: AudioProperties,
            _quality: SampleRateConversionQuality,
        ) -> SourceResult<AudioSource> {
            thread::sleep(self.delay);
            if self.fail_asset == Some(asset) {
                return Err(SourceError::Empty(asset.to_string()));
            }
            self.decoded.lock().unwrap().push(asset.to_string());
            let level = if asset == "CLAP.mp3" { CLAP_LEVEL } else { BACKING_LEVEL };
            AudioSource::from_interleaved(asset, vec![level; target.samples_for(48000)], target)
        }
    }

    #[derive(Default)]
    struct RecordingFeedback {
        colors: Vec<ScreenColor>,
    }

    impl VisualFeedback for RecordingFeedback {
        fn set_screen_color(&mut self, color: ScreenColor) {
            self.colors.push(color);
        }
    }

    fn game_with(host: FakeHost, decoder: Arc<FakeDecoder>) -> Game {
        Game::new(GameConfig::default(), Arc::new(host), decoder)
    }

    fn working_host(device: &Arc<FakeDevice>) -> FakeHost {
        FakeHost {
            device: Arc::clone(device),
            fail_open: false,
            fail_start: false,
        }
    }

    fn drain(events: &Receiver<GameEvent>) -> Vec<GameEvent> {
        events.try_iter().collect()
    }

    #[test]
    fn test_successful_load() {
        let device = Arc::new(FakeDevice::default());
        let decoder = Arc::new(FakeDecoder::default());
        let mut game = game_with(working_host(&device), Arc::clone(&decoder));
        let events = game.events();

        assert_eq!(game.state(), GameState::Loading);
        game.start();
        assert_eq!(game.wait_for_load(), GameState::Playing);

        assert!(device.started.load(Ordering::SeqCst));
        assert_eq!(
            *decoder.decoded.lock().unwrap(),
            vec!["CLAP.mp3".to_string(), "FUNKY_HOUSE.mp3".to_string()]
        );
        assert_eq!(game.stream_properties(), Some(AudioProperties::new(2, 48000)));

        // Exactly one transition
        assert_eq!(drain(&events), vec![GameEvent::StateChanged(GameState::Playing)]);
    }

    #[test]
    fn test_backing_track_plays_and_tap_triggers_clap() {
        let device = Arc::new(FakeDevice::default());
        let mut game = game_with(working_host(&device), Arc::new(FakeDecoder::default()));
        game.start();
        game.wait_for_load();

        let out = device.pump(64);
        assert!(out.iter().all(|&s| s == BACKING_LEVEL));

        game.tap(monotonic_ms());
        let out = device.pump(64);
        assert!(out.iter().all(|&s| s == BACKING_LEVEL + CLAP_LEVEL));
    }

    #[test]
    fn test_open_failure() {
        let device = Arc::new(FakeDevice::default());
        let decoder = Arc::new(FakeDecoder::default());
        let host = FakeHost {
            device: Arc::clone(&device),
            fail_open: true,
            fail_start: false,
        };
        let mut game = game_with(host, Arc::clone(&decoder));
        let events = game.events();

        game.start();
        assert_eq!(game.wait_for_load(), GameState::FailedToLoad);
        assert!(decoder.decoded.lock().unwrap().is_empty());
        assert_eq!(drain(&events), vec![GameEvent::StateChanged(GameState::FailedToLoad)]);
    }

    #[test]
    fn test_decode_failure_closes_stream() {
        let device = Arc::new(FakeDevice::default());
        let decoder = Arc::new(FakeDecoder {
            fail_asset: Some("FUNKY_HOUSE.mp3"),
            ..Default::default()
        });
        let mut game = game_with(working_host(&device), decoder);
        let events = game.events();

        game.start();
        assert_eq!(game.wait_for_load(), GameState::FailedToLoad);
        assert!(device.closed.load(Ordering::SeqCst));
        assert!(!device.started.load(Ordering::SeqCst));
        assert!(device.callback.lock().unwrap().is_none());
        assert_eq!(drain(&events), vec![GameEvent::StateChanged(GameState::FailedToLoad)]);
    }

    #[test]
    fn test_start_failure() {
        let device = Arc::new(FakeDevice::default());
        let host = FakeHost {
            device: Arc::clone(&device),
            fail_open: false,
            fail_start: true,
        };
        let mut game = game_with(host, Arc::new(FakeDecoder::default()));

        game.start();
        assert_eq!(game.wait_for_load(), GameState::FailedToLoad);
        assert!(device.closed.load(Ordering::SeqCst));

        // Terminal: nothing moves it afterwards
        game.start();
        assert_eq!(game.wait_for_load(), GameState::FailedToLoad);
    }

    #[test]
    fn test_stop_waits_for_load() {
        let device = Arc::new(FakeDevice::default());
        let decoder = Arc::new(FakeDecoder {
            delay: Duration::from_millis(30),
            ..Default::default()
        });
        let mut game = game_with(working_host(&device), Arc::clone(&decoder));

        game.start();
        game.stop();

        // The load ran to completion before teardown
        assert_eq!(decoder.decoded.lock().unwrap().len(), 2);
        assert_eq!(game.state(), GameState::Playing);
        assert!(device.closed.load(Ordering::SeqCst));
        assert!(device.callback.lock().unwrap().is_none());
    }

    #[test]
    fn test_drop_closes_stream() {
        let device = Arc::new(FakeDevice::default());
        let mut game = game_with(working_host(&device), Arc::new(FakeDecoder::default()));
        game.start();
        game.wait_for_load();
        assert!(!device.closed.load(Ordering::SeqCst));

        drop(game);
        assert!(device.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_tap_ignored_while_loading() {
        let device = Arc::new(FakeDevice::default());
        let game = game_with(working_host(&device), Arc::new(FakeDecoder::default()));
        let events = game.events();

        game.tap(monotonic_ms());
        assert!(drain(&events).is_empty());
        assert_eq!(game.state(), GameState::Loading);
    }

    #[test]
    fn test_taps_are_judged_against_beat_grid() {
        let device = Arc::new(FakeDevice::default());
        let mut game = game_with(working_host(&device), Arc::new(FakeDecoder::default()));
        let events = game.events();
        game.start();
        game.wait_for_load();
        drain(&events);

        // No audio rendered yet: the clap fires but nothing can be judged
        game.tap(monotonic_ms());
        assert!(drain(&events).is_empty());

        device.pump(256);
        let anchor = game.clock().anchor_ms().unwrap();
        let latency = game.clock().output_latency_ms();
        assert_eq!(latency, 5);

        let heard_at = |position: i64| anchor + latency + position;
        game.tap(heard_at(510));
        game.tap(heard_at(620));
        game.tap(heard_at(880));
        game.tap(heard_at(1100));

        let verdicts: Vec<(i64, TapResult)> = drain(&events)
            .into_iter()
            .filter_map(|event| match event {
                GameEvent::TapJudged(v) => Some((v.expected_ms, v.result)),
                _ => None,
            })
            .collect();
        assert_eq!(
            verdicts,
            vec![
                (500, TapResult::Success),
                (500, TapResult::Late),
                (1000, TapResult::Early),
                (1000, TapResult::Success),
            ]
        );
    }

    #[test]
    fn test_tick_colour_follows_state() {
        let device = Arc::new(FakeDevice::default());
        let mut game = game_with(working_host(&device), Arc::new(FakeDecoder::default()));
        let mut feedback = RecordingFeedback::default();

        game.tick(&mut feedback);
        game.start();
        game.wait_for_load();
        game.tick(&mut feedback);

        let host = FakeHost {
            device: Arc::new(FakeDevice::default()),
            fail_open: true,
            fail_start: false,
        };
        let mut failed = game_with(host, Arc::new(FakeDecoder::default()));
        failed.start();
        failed.wait_for_load();
        failed.tick(&mut feedback);

        assert_eq!(
            feedback.colors,
            vec![ScreenColor::YELLOW, ScreenColor::GREY, ScreenColor::RED]
        );
    }

    #[test]
    fn test_renderer_drains_commands_before_rendering() {
        let (mut tx, rx) = command_channel();
        let clock = Arc::new(SongClock::new());
        clock.configure(48000, 0.0);
        let mut renderer = SessionRenderer::new(rx, Arc::clone(&clock));

        // Nothing wired: silence and the song hasn't started
        let mut out = vec![1.0; 32];
        assert_eq!(renderer.on_audio_ready(&mut out, 16), DataCallbackResult::Continue);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(clock.anchor_ms(), None);

        let source = AudioSource::from_interleaved(
            "tone",
            vec![0.1; 64],
            AudioProperties::new(2, 48000),
        )
        .unwrap();
        let player = Player::new(Shared::new(&gc_handle(), source));
        player.set_playing(true);
        tx.push(RenderCommand::AddTrack(player)).unwrap();
        tx.push(RenderCommand::SetChannelCount(2)).unwrap();

        renderer.on_audio_ready(&mut out, 16);
        assert!(out.iter().all(|&s| s == 0.1));
        assert!(clock.anchor_ms().is_some());
        assert_eq!(clock.frames_rendered(), 16);
    }
}
