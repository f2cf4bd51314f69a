//! Local media plumbing for the generation pipeline.
//!
//! This crate provides:
//! - Streaming retrieval of remote sources into a job workspace
//! - Collision-free, self-cleaning job workspaces
//! - Synchronous invocation of the external generator with captured output
//! - Output artifact discovery (directory search or frame assembly)
//! - FFmpeg command building for frame encoding

pub mod artifact;
pub mod command;
pub mod error;
pub mod fetch;
pub mod frames;
pub mod fs_utils;
pub mod runner;
pub mod workspace;

pub use artifact::{ArtifactLocator, ArtifactStrategy, FrameAssembly, SearchLocations};
pub use command::{check_ffmpeg, FfmpegCommand};
pub use error::{MediaError, MediaResult};
pub use fetch::{Fetcher, StagedInput, FETCH_CHUNK_SIZE};
pub use frames::{init_frame_environment, FrameEnvironment};
pub use runner::{GeneratorCommand, ProcessOutput, ProcessRunner};
pub use workspace::Workspace;
