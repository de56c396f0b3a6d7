//! Mixer - sums players into the stream buffer
//!
//! Players render one after another into a scratch buffer which is added to
//! the output sample by sample. There is no gain stage, clipping or
//! normalization: the sum is written as is.

use super::command::RenderCommand;
use super::player::Player;
use crate::types::{fill_silence, Sample, MAX_BUFFER_FRAMES, MAX_CHANNELS, MAX_TRACKS};

/// Ordered set of players mixed to one interleaved output
pub struct Mixer {
    tracks: Vec<Player>,
    channel_count: u16,
    /// Pre-allocated per-player render target
    scratch: Vec<Sample>,
}

impl Mixer {
    /// Create an empty mixer
    ///
    /// All storage is reserved here so nothing is allocated once the stream
    /// is running.
    pub fn new() -> Self {
        Self {
            tracks: Vec::with_capacity(MAX_TRACKS),
            channel_count: 0,
            scratch: vec![0.0; MAX_BUFFER_FRAMES * MAX_CHANNELS],
        }
    }

    /// Append a player
    ///
    /// Gives the player back when the mixer already holds `MAX_TRACKS`.
    pub fn add_track(&mut self, player: Player) -> Result<(), Player> {
        if self.tracks.len() >= MAX_TRACKS {
            return Err(player);
        }
        self.tracks.push(player);
        Ok(())
    }

    /// Set the output channel count
    ///
    /// Must match the stream: the mixer interleaves at this width.
    pub fn set_channel_count(&mut self, channel_count: u16) {
        self.channel_count = channel_count;
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> &[Player] {
        &self.tracks
    }

    /// Apply all pending commands (call at the top of each callback)
    ///
    /// Never blocks. The loader never queues more than `MAX_TRACKS` players;
    /// one past the limit is dropped here, its source freed by the collector.
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<RenderCommand>) {
        while let Ok(command) = rx.pop() {
            match command {
                RenderCommand::AddTrack(player) => {
                    let rejected = self.add_track(player);
                    debug_assert!(rejected.is_ok(), "track queued past MAX_TRACKS");
                }
                RenderCommand::SetChannelCount(n) => self.set_channel_count(n),
            }
        }
    }

    /// Render `num_frames` frames of every player, summed, into `output`
    ///
    /// The whole output is zeroed first. With no channel count set the
    /// result is silence. Buffers larger than the scratch space are rendered
    /// in several passes.
    pub fn render_audio(&mut self, output: &mut [Sample], num_frames: usize) {
        fill_silence(output);

        let channels = self.channel_count as usize;
        if channels == 0 || num_frames == 0 {
            return;
        }
        let num_frames = num_frames.min(output.len() / channels);
        // At least one frame even for very wide devices
        let chunk_frames = self.scratch.len() / channels;

        let mut start = 0;
        while start < num_frames {
            let frames = chunk_frames.min(num_frames - start);
            let samples = frames * channels;
            let out = &mut output[start * channels..start * channels + samples];
            let scratch = &mut self.scratch[..samples];

            for track in self.tracks.iter_mut() {
                track.render_audio(scratch, frames);
                for (o, s) in out.iter_mut().zip(scratch.iter()) {
                    *o += *s;
                }
            }

            start += frames;
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{command_channel, gc_handle};
    use crate::source::AudioSource;
    use crate::types::AudioProperties;
    use basedrop::Shared;

    fn constant_player(value: f32, frames: usize) -> Player {
        let source = AudioSource::from_interleaved(
            "constant",
            vec![value; frames * 2],
            AudioProperties::new(2, 48000),
        )
        .unwrap();
        Player::new(Shared::new(&gc_handle(), source))
    }

    #[test]
    fn test_silent_players_give_silence() {
        let mut mixer = Mixer::new();
        mixer.set_channel_count(2);
        for _ in 0..4 {
            mixer.add_track(constant_player(0.5, 64)).unwrap();
        }
        mixer.add_track(Player::empty()).unwrap();

        let mut out = vec![1.0; 128];
        mixer.render_audio(&mut out, 64);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_single_player_passes_through() {
        let mut mixer = Mixer::new();
        mixer.set_channel_count(2);
        mixer.add_track(constant_player(0.5, 64)).unwrap();
        let active = constant_player(0.25, 64);
        active.set_playing(true);
        let mut reference = constant_player(0.25, 64);
        reference.set_playing(true);
        mixer.add_track(active).unwrap();

        let mut out = vec![0.0; 200];
        let mut expected = vec![0.0; 200];
        mixer.render_audio(&mut out, 100);
        reference.render_audio(&mut expected, 100);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_players_are_summed_without_clipping() {
        let mut mixer = Mixer::new();
        mixer.set_channel_count(2);
        for _ in 0..3 {
            let player = constant_player(0.5, 16);
            player.set_playing(true);
            player.set_looping(true);
            mixer.add_track(player).unwrap();
        }

        let mut out = vec![0.0; 32];
        mixer.render_audio(&mut out, 16);
        assert!(out.iter().all(|&s| (s - 1.5).abs() < 1e-6));
    }

    #[test]
    fn test_no_channel_count_is_silent() {
        let mut mixer = Mixer::new();
        let player = constant_player(0.5, 16);
        player.set_playing(true);
        mixer.add_track(player).unwrap();

        let mut out = vec![1.0; 32];
        mixer.render_audio(&mut out, 16);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_large_buffer_renders_in_passes() {
        let frames = MAX_BUFFER_FRAMES * MAX_CHANNELS / 2 + 100;
        let mut mixer = Mixer::new();
        mixer.set_channel_count(2);
        let player = constant_player(0.5, frames * 2);
        player.set_playing(true);
        mixer.add_track(player).unwrap();

        let mut out = vec![0.0; frames * 2];
        mixer.render_audio(&mut out, frames);
        assert!(out.iter().all(|&s| s == 0.5));
        assert_eq!(mixer.tracks()[0].cursor(), frames);
    }

    #[test]
    fn test_wide_output_stays_interleaved() {
        let mut mixer = Mixer::new();
        mixer.set_channel_count(16);
        let mut out = vec![1.0; 16 * 4];
        mixer.render_audio(&mut out, 4);
        assert_eq!(mixer.channel_count(), 16);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_track_limit() {
        let mut mixer = Mixer::new();
        for _ in 0..MAX_TRACKS {
            mixer.add_track(Player::empty()).unwrap();
        }
        assert!(mixer.add_track(Player::empty()).is_err());
        assert_eq!(mixer.track_count(), MAX_TRACKS);
    }

    #[test]
    fn test_process_commands() {
        let (mut tx, mut rx) = command_channel();
        tx.push(RenderCommand::AddTrack(constant_player(0.1, 8))).unwrap();
        tx.push(RenderCommand::AddTrack(Player::empty())).unwrap();
        tx.push(RenderCommand::SetChannelCount(2)).unwrap();

        let mut mixer = Mixer::new();
        mixer.process_commands(&mut rx);
        assert_eq!(mixer.track_count(), 2);
        assert_eq!(mixer.channel_count(), 2);
        assert_eq!(mixer.tracks()[0].source().map(|s| s.name()), Some("constant"));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "track queued past MAX_TRACKS")]
    fn test_queued_track_past_limit_is_flagged() {
        let (mut tx, mut rx) = command_channel();
        let mut mixer = Mixer::new();
        for _ in 0..MAX_TRACKS {
            mixer.add_track(Player::empty()).unwrap();
        }
        tx.push(RenderCommand::AddTrack(Player::empty())).unwrap();
        mixer.process_commands(&mut rx);
    }

    #[test]
    fn test_render_is_deterministic() {
        let build = || {
            let mut mixer = Mixer::new();
            mixer.set_channel_count(2);
            let a = constant_player(0.3, 10);
            a.set_playing(true);
            let b = constant_player(-0.1, 7);
            b.set_playing(true);
            b.set_looping(true);
            mixer.add_track(a).unwrap();
            mixer.add_track(b).unwrap();
            mixer
        };
        let (mut m1, mut m2) = (build(), build());
        let mut o1 = vec![0.0; 48];
        let mut o2 = vec![0.0; 48];
        for _ in 0..3 {
            m1.render_audio(&mut o1, 24);
            m2.render_audio(&mut o2, 24);
            assert_eq!(o1, o2);
        }
    }
}
