use std::error::Error;
use std::io::Cursor;

use rodio::decoder::DecoderError;
use rodio::stream::{OutputStream, OutputStreamBuilder};
use rodio::{Decoder, Sink};

pub fn decode(bytes: &[u8]) -> Result<Decoder<Cursor<Vec<u8>>>, DecoderError> {
    Decoder::new(Cursor::new(bytes.to_vec()))
}

/// One clip at a time: starting a new clip stops the current one.
#[derive(Default)]
pub struct AudioPlayer {
    stream: Option<OutputStream>,
    sink: Option<Sink>,
}

impl AudioPlayer {
    pub fn play(&mut self, bytes: &[u8]) -> Result<(), Box<dyn Error>> {
        self.stop();
        let source = decode(bytes)?;

        if self.stream.is_none() {
            let mut stream = OutputStreamBuilder::open_default_stream()?;
            stream.log_on_drop(false);
            self.stream = Some(stream);
        }
        let Some(stream) = self.stream.as_ref() else {
            return Ok(());
        };

        let sink = Sink::connect_new(stream.mixer());
        sink.append(source);
        self.sink = Some(sink);
        tracing::debug!(bytes = bytes.len(), "playing clip");
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| !s.empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_not_audio() {
        assert!(decode(b"definitely not an mp3").is_err());
    }

    #[test]
    fn idle_player_is_silent() {
        let mut player = AudioPlayer::default();
        assert!(!player.is_playing());
        player.stop();
        assert!(!player.is_playing());
    }
}
