pub mod transcode;
pub mod wav;

pub use transcode::{canonical_args, FfmpegTranscoder, Transcoder};
pub use wav::{decode_wav, load_wav_file, SampleBuffer, WavError};
