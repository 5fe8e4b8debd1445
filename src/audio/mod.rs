//! Audio I/O boundaries.
//!
//! Decoding and playback live outside the crate. [`AudioDecoder`] and
//! [`AudioSink`] are the seams; [`PcmReader`] and [`PcmWriter`] implement
//! them for raw little-endian `f32` mono PCM over any reader or writer,
//! which is what the CLI uses on stdin/stdout.

use std::io::{ErrorKind, Read, Write};

use crate::error::{Result, WdfError};

/// Block size for streaming audio processing (in samples).
pub const BLOCK_SIZE: usize = 256;

/// A source of decoded mono samples.
pub trait AudioDecoder {
    /// Sample rate of the decoded stream in Hz.
    fn sample_rate(&self) -> f64;

    /// Read up to `samples.len()` samples. Returns 0 at end of stream.
    fn read_block(&mut self, samples: &mut [f32]) -> Result<usize>;

    /// Read the whole stream.
    fn decode_all(&mut self) -> Result<Vec<f32>> {
        let mut all = Vec::new();
        let mut block = [0.0f32; BLOCK_SIZE];
        loop {
            let n = self.read_block(&mut block)?;
            if n == 0 {
                return Ok(all);
            }
            all.extend_from_slice(&block[..n]);
        }
    }
}

/// A consumer of filtered samples.
pub trait AudioSink {
    fn write_block(&mut self, samples: &[f32]) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Raw `f32le` PCM reader.
pub struct PcmReader<R> {
    reader: R,
    sample_rate: f64,
    buffer: Vec<u8>,
    /// Bytes of a sample split across two reads
    pending: usize,
}

impl<R: Read> PcmReader<R> {
    pub fn new(reader: R, sample_rate: f64) -> Self {
        Self {
            reader,
            sample_rate,
            buffer: vec![0u8; BLOCK_SIZE * 4],
            pending: 0,
        }
    }
}

impl<R: Read> AudioDecoder for PcmReader<R> {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn read_block(&mut self, samples: &mut [f32]) -> Result<usize> {
        if samples.is_empty() {
            return Ok(0);
        }
        let bytes_wanted = samples.len() * 4;
        if self.buffer.len() < bytes_wanted {
            self.buffer.resize(bytes_wanted, 0);
        }

        // Fill until at least one whole sample is available or EOF
        let mut filled = self.pending;
        while filled < 4 || filled % 4 != 0 {
            let read = match self.reader.read(&mut self.buffer[filled..bytes_wanted]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(WdfError::AudioInputError {
                        message: e.to_string(),
                    })
                }
            };
            if read == 0 {
                break;
            }
            filled += read;
            if filled == bytes_wanted {
                break;
            }
        }

        let count = filled / 4;
        for (i, sample) in samples.iter_mut().take(count).enumerate() {
            let bytes = [
                self.buffer[i * 4],
                self.buffer[i * 4 + 1],
                self.buffer[i * 4 + 2],
                self.buffer[i * 4 + 3],
            ];
            *sample = f32::from_le_bytes(bytes);
        }

        // Keep a trailing partial sample for the next call
        let used = count * 4;
        self.buffer.copy_within(used..filled, 0);
        self.pending = filled - used;
        if count == 0 && self.pending > 0 {
            tracing::warn!(bytes = self.pending, "dropping truncated trailing sample");
            self.pending = 0;
        }
        Ok(count)
    }
}

/// Raw `f32le` PCM writer.
pub struct PcmWriter<W> {
    writer: W,
    buffer: Vec<u8>,
}

impl<W: Write> PcmWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: Vec::with_capacity(BLOCK_SIZE * 4),
        }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> AudioSink for PcmWriter<W> {
    fn write_block(&mut self, samples: &[f32]) -> Result<()> {
        self.buffer.clear();
        for sample in samples {
            self.buffer.extend_from_slice(&sample.to_le_bytes());
        }
        self.writer
            .write_all(&self.buffer)
            .map_err(|e| WdfError::AudioOutputError {
                message: e.to_string(),
            })
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| WdfError::AudioOutputError {
            message: e.to_string(),
        })
    }
}

/// Sink that collects samples in memory.
impl AudioSink for Vec<f32> {
    fn write_block(&mut self, samples: &[f32]) -> Result<()> {
        self.extend_from_slice(samples);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_write_then_read() {
        let samples = [0.5f32, -0.25, 1.0, 0.0, 3.5];
        let mut writer = PcmWriter::new(Vec::new());
        writer.write_block(&samples).unwrap();
        writer.flush().unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes, encode(&samples));

        let mut reader = PcmReader::new(Cursor::new(bytes), 48000.0);
        assert_eq!(reader.decode_all().unwrap(), samples.to_vec());
    }

    /// Reader that returns at most `chunk` bytes per call.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_split_samples_are_reassembled() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32 * 0.1).collect();
        let reader = Trickle {
            data: encode(&samples),
            pos: 0,
            chunk: 3,
        };
        let mut pcm = PcmReader::new(reader, 44100.0);
        assert_eq!(pcm.decode_all().unwrap(), samples);
    }
}
