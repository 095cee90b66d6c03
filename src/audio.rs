//! Audio cues. Playback is fire-and-forget: the game never waits on a sink
//! and never fails because of one.

use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::{
    io::Write,
    path::Path,
};
use tracing::debug;

pub const DEFAULT_SOUNDS_DIR: &str = "assets/sounds";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cue {
    /// background engine loop, started on the first key press
    Ambient,
    /// plays while the reels are spinning
    SpinLoop,
    /// two matching reels
    WinSmall,
    /// every reel matches
    WinBig,
}

impl Cue {
    pub fn file_name(self) -> &'static str {
        match self {
            Cue::Ambient => "bg_engine_loop.mp3",
            Cue::SpinLoop => "spin_loop.mp3",
            Cue::WinSmall => "win_small.mp3",
            Cue::WinBig => "win_big.mp3",
        }
    }

    pub fn volume(self) -> f32 {
        match self {
            Cue::Ambient => 0.25,
            Cue::SpinLoop => 0.6,
            Cue::WinSmall => 0.8,
            Cue::WinBig => 0.9,
        }
    }

    pub fn is_loop(self) -> bool {
        matches!(self, Cue::Ambient | Cue::SpinLoop)
    }
}

pub trait AudioSink {
    /// start the cue from the beginning
    fn play(&mut self, cue: Cue) -> Result<()>;

    /// stop the cue if it is playing; a no-op otherwise
    fn stop(&mut self, cue: Cue) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct SilentSink;

impl AudioSink for SilentSink {
    fn play(&mut self, _cue: Cue) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self, _cue: Cue) -> Result<()> {
        Ok(())
    }
}

/// Rings the terminal bell for win cues. Loops have no terminal rendition.
pub struct BellSink<W> {
    out: W,
}

impl<W: Write> BellSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> AudioSink for BellSink<W> {
    fn play(&mut self, cue: Cue) -> Result<()> {
        let rings = match cue {
            Cue::WinSmall => 1,
            Cue::WinBig => 2,
            Cue::Ambient | Cue::SpinLoop => return Ok(()),
        };
        for _ in 0..rings {
            self.out.write_all(b"\x07").wrap_err("failed to ring bell")?;
        }
        self.out.flush().wrap_err("failed to flush bell")?;
        Ok(())
    }

    fn stop(&mut self, _cue: Cue) -> Result<()> {
        Ok(())
    }
}

/// Front for whatever sink is configured. Swallows every sink error and
/// starts the ambient loop at most once per session.
pub struct Jukebox {
    sink: Box<dyn AudioSink>,
    ambient_started: bool,
}

impl Jukebox {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            ambient_started: false,
        }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(SilentSink))
    }

    pub fn ambient_started(&self) -> bool {
        self.ambient_started
    }

    pub fn start_ambient(&mut self) {
        if self.ambient_started {
            return;
        }
        self.ambient_started = true;
        self.play(Cue::Ambient);
    }

    pub fn play(&mut self, cue: Cue) {
        if let Err(err) = self.sink.play(cue) {
            debug!(?cue, ?err, "audio cue failed to play");
        }
    }

    pub fn stop(&mut self, cue: Cue) {
        if let Err(err) = self.sink.stop(cue) {
            debug!(?cue, ?err, "audio cue failed to stop");
        }
    }
}

/// Picks the best sink available for this build.
pub fn open_sink(mute: bool, sounds_dir: &Path) -> Box<dyn AudioSink> {
    if mute {
        return Box::new(SilentSink);
    }
    #[cfg(feature = "audio")]
    match playback::RodioSink::open(sounds_dir) {
        Ok(sink) => return Box::new(sink),
        Err(err) => {
            tracing::warn!(?err, "audio output unavailable, using terminal bell");
        }
    }
    #[cfg(not(feature = "audio"))]
    debug!(
        sounds_dir = %sounds_dir.display(),
        "built without the audio feature, using terminal bell"
    );
    Box::new(BellSink::new(std::io::stdout()))
}

#[cfg(feature = "audio")]
pub mod playback {
    use super::{
        AudioSink,
        Cue,
    };
    use color_eyre::eyre::{
        Result,
        WrapErr,
    };
    use rodio::{
        Decoder,
        OutputStream,
        OutputStreamBuilder,
        Sink,
        Source,
    };
    use std::{
        collections::HashMap,
        fs::File,
        io::BufReader,
        path::{
            Path,
            PathBuf,
        },
    };

    pub struct RodioSink {
        stream: OutputStream,
        sounds_dir: PathBuf,
        loops: HashMap<Cue, Sink>,
    }

    impl RodioSink {
        pub fn open(sounds_dir: &Path) -> Result<Self> {
            let stream = OutputStreamBuilder::open_default_stream()
                .wrap_err("failed to open default audio output")?;
            Ok(Self {
                stream,
                sounds_dir: sounds_dir.to_path_buf(),
                loops: HashMap::new(),
            })
        }
    }

    impl AudioSink for RodioSink {
        fn play(&mut self, cue: Cue) -> Result<()> {
            let path = self.sounds_dir.join(cue.file_name());
            let file = File::open(&path)
                .wrap_err_with(|| format!("missing sound file {}", path.display()))?;
            let source = Decoder::new(BufReader::new(file))
                .wrap_err_with(|| format!("failed to decode {}", path.display()))?;
            let sink = Sink::connect_new(self.stream.mixer());
            sink.set_volume(cue.volume());
            if cue.is_loop() {
                sink.append(source.repeat_infinite());
                if let Some(previous) = self.loops.insert(cue, sink) {
                    previous.stop();
                }
            } else {
                sink.append(source);
                sink.detach();
            }
            Ok(())
        }

        fn stop(&mut self, cue: Cue) -> Result<()> {
            if let Some(sink) = self.loops.remove(&cue) {
                sink.stop();
            }
            Ok(())
        }
    }
}
