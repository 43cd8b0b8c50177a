// Transcoder backends

pub mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;
