//! Frame assembly: encode an ordered directory of frame images into one file.
//!
//! Temporal order is taken from lexicographic filename order, and every
//! filename stem must end in a sequence number that increases along that
//! order. Unpadded names such as `frame_2.png` / `frame_10.png` are rejected
//! rather than encoded out of order.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::search::has_extension;
use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::frames::{init_frame_environment, FrameEnvironment};

/// Image extensions recognized as frames.
pub const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Frame assembly settings.
#[derive(Debug, Clone)]
pub struct FrameAssembly {
    frames_dir: PathBuf,
    default_fps: u32,
    cache_dir: PathBuf,
}

impl FrameAssembly {
    pub fn new(frames_dir: impl Into<PathBuf>, default_fps: u32, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            frames_dir: frames_dir.into(),
            default_fps: default_fps.max(1),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn frames_dir(&self) -> &Path {
        &self.frames_dir
    }

    pub fn default_fps(&self) -> u32 {
        self.default_fps
    }

    /// All frame files in lexicographic order.
    pub async fn collect(&self) -> MediaResult<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(&self.frames_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MediaError::artifact_not_found(format!(
                    "frame directory {} does not exist",
                    self.frames_dir.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let mut frames = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file()
                && FRAME_EXTENSIONS.iter().any(|ext| has_extension(&path, ext))
            {
                frames.push(path);
            }
        }

        if frames.is_empty() {
            return Err(MediaError::artifact_not_found(format!(
                "no frames in {}",
                self.frames_dir.display()
            )));
        }

        frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(frames)
    }

    /// Encode the frames into a file in the encoder cache directory.
    ///
    /// The collected frames are consumed: they are deleted once the attempt
    /// finishes, whether or not encoding succeeded, so a later job never sees
    /// them.
    pub async fn assemble(&self, fps: Option<u32>, extension: &str) -> MediaResult<PathBuf> {
        let frames = self.collect().await?;
        let result = self.encode_frames(&frames, fps, extension).await;
        consume_frames(&frames).await;
        result
    }

    async fn encode_frames(
        &self,
        frames: &[PathBuf],
        fps: Option<u32>,
        extension: &str,
    ) -> MediaResult<PathBuf> {
        validate_frame_order(frames)?;
        let (width, height) = uniform_dimensions(frames.to_vec()).await?;

        let env = init_frame_environment(&self.cache_dir)?;
        let fps = fps.unwrap_or(self.default_fps).max(1);
        let output = env.cache_dir.join(format!("{}.{}", Uuid::new_v4(), extension));

        info!(
            frames = frames.len(),
            width,
            height,
            fps,
            "Encoding frames"
        );

        if let Err(e) = encode(env, frames, width, height, fps, &output).await {
            let _ = fs::remove_file(&output).await;
            return Err(e);
        }
        Ok(output)
    }
}

async fn consume_frames(frames: &[PathBuf]) {
    for frame in frames {
        match fs::remove_file(frame).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %frame.display(), error = %e, "Failed to remove consumed frame"),
        }
    }
    debug!(frames = frames.len(), "Consumed frames");
}

/// Check that lexicographic order matches the trailing sequence numbers.
pub fn validate_frame_order(frames: &[PathBuf]) -> MediaResult<()> {
    let mut previous: Option<(u64, &Path)> = None;

    for frame in frames {
        let index = sequence_number(frame).ok_or_else(|| {
            MediaError::encoding(format!(
                "frame {} has no trailing sequence number",
                frame.display()
            ))
        })?;

        if let Some((last, last_path)) = previous {
            if index <= last {
                return Err(MediaError::encoding(format!(
                    "frame names do not encode temporal order: {} sorts before {}",
                    last_path.display(),
                    frame.display()
                )));
            }
        }
        previous = Some((index, frame));
    }

    Ok(())
}

fn sequence_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    stem[stem.len() - digits..].parse().ok()
}

/// Read every frame header and require one size for all of them.
async fn uniform_dimensions(frames: Vec<PathBuf>) -> MediaResult<(u32, u32)> {
    tokio::task::spawn_blocking(move || {
        let mut expected: Option<(u32, u32)> = None;
        for frame in &frames {
            let dims = image::image_dimensions(frame).map_err(|e| {
                MediaError::encoding(format!("cannot read frame {}: {}", frame.display(), e))
            })?;
            match expected {
                None => expected = Some(dims),
                Some(first) if first != dims => {
                    return Err(MediaError::encoding(format!(
                        "frame {} is {}x{}, expected {}x{}",
                        frame.display(),
                        dims.0,
                        dims.1,
                        first.0,
                        first.1
                    )))
                }
                Some(_) => {}
            }
        }
        expected.ok_or_else(|| MediaError::artifact_not_found("no frames"))
    })
    .await
    .map_err(|e| MediaError::encoding(format!("frame inspection task failed: {}", e)))?
}

async fn encode(
    env: &FrameEnvironment,
    frames: &[PathBuf],
    width: u32,
    height: u32,
    fps: u32,
    output: &Path,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::raw_frames(width, height, fps, output);
    let args = cmd.build_args();
    debug!("Running FFmpeg: {} {}", env.ffmpeg.display(), args.join(" "));

    let mut child = Command::new(&env.ffmpeg)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| MediaError::encoding(format!("failed to start ffmpeg: {}", e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| MediaError::encoding("ffmpeg stdin not captured"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| MediaError::encoding("ffmpeg stderr not captured"))?;

    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    let fed = feed_frames(&mut stdin, frames, width, height).await;
    drop(stdin);

    let status = child.wait().await?;
    let stderr = stderr_task.await.unwrap_or_default();

    if !status.success() {
        warn!(exit_code = ?status.code(), "FFmpeg frame encoding failed");
        return Err(MediaError::encoding(format!(
            "ffmpeg exited with status {:?}: {}",
            status.code(),
            stderr.trim()
        )));
    }
    fed
}

async fn feed_frames(
    stdin: &mut ChildStdin,
    frames: &[PathBuf],
    width: u32,
    height: u32,
) -> MediaResult<()> {
    for frame in frames {
        let path = frame.clone();
        let raw = tokio::task::spawn_blocking(move || decode_rgb(&path, width, height))
            .await
            .map_err(|e| MediaError::encoding(format!("frame decode task failed: {}", e)))??;
        stdin
            .write_all(&raw)
            .await
            .map_err(|e| MediaError::encoding(format!("writing frame to ffmpeg: {}", e)))?;
    }
    stdin
        .flush()
        .await
        .map_err(|e| MediaError::encoding(format!("flushing ffmpeg input: {}", e)))
}

fn decode_rgb(path: &Path, width: u32, height: u32) -> MediaResult<Vec<u8>> {
    let rgb = image::open(path)
        .map_err(|e| MediaError::encoding(format!("cannot decode frame {}: {}", path.display(), e)))?
        .to_rgb8();
    if rgb.dimensions() != (width, height) {
        return Err(MediaError::encoding(format!(
            "frame {} changed size during encoding",
            path.display()
        )));
    }
    Ok(rgb.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("/frames").join(n)).collect()
    }

    fn write_frame(dir: &Path, name: &str, width: u32, height: u32) {
        image::RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_sequence_number() {
        assert_eq!(sequence_number(Path::new("/f/frame_00012.png")), Some(12));
        assert_eq!(sequence_number(Path::new("/f/000.jpg")), Some(0));
        assert_eq!(sequence_number(Path::new("/f/cover.png")), None);
    }

    #[test]
    fn test_padded_frames_are_ordered() {
        let frames = paths(&["frame_0001.png", "frame_0002.png", "frame_0010.png"]);
        validate_frame_order(&frames).unwrap();
    }

    #[test]
    fn test_unpadded_frames_are_rejected() {
        let frames = paths(&["frame_1.png", "frame_10.png", "frame_2.png"]);
        let err = validate_frame_order(&frames).unwrap_err();
        assert!(matches!(err, MediaError::Encoding(_)));
    }

    #[test]
    fn test_unnumbered_and_duplicate_frames_are_rejected() {
        assert!(validate_frame_order(&paths(&["0001.png", "cover.png"])).is_err());
        assert!(validate_frame_order(&paths(&["a_01.png", "b_01.png"])).is_err());
    }

    #[tokio::test]
    async fn test_collect_sorts_and_filters() {
        let dir = TempDir::new().unwrap();
        for name in ["0003.png", "0001.jpg", "0002.JPEG", "notes.txt"] {
            fs::write(dir.path().join(name), b"").await.unwrap();
        }

        let assembly = FrameAssembly::new(dir.path(), 25, dir.path().join("cache"));
        let frames = assembly.collect().await.unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["0001.jpg", "0002.JPEG", "0003.png"]);
    }

    #[tokio::test]
    async fn test_zero_frames_is_not_found() {
        let dir = TempDir::new().unwrap();
        let assembly = FrameAssembly::new(dir.path(), 25, dir.path().join("cache"));
        let err = assembly.assemble(None, "mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::ArtifactNotFound(_)));

        let missing = FrameAssembly::new(dir.path().join("nope"), 25, dir.path().join("cache"));
        let err = missing.assemble(None, "mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::ArtifactNotFound(_)));
    }

    #[tokio::test]
    async fn test_inconsistent_dimensions_fail_before_encoding() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "0001.png", 4, 4);
        write_frame(dir.path(), "0002.png", 8, 4);

        let assembly = FrameAssembly::new(dir.path(), 25, dir.path().join("cache"));
        let err = assembly.assemble(Some(10), "mp4").await.unwrap_err();
        match err {
            MediaError::Encoding(message) => assert!(message.contains("8x4"), "{}", message),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_frame_is_encoding_error() {
        let dir = TempDir::new().unwrap();
        write_frame(dir.path(), "0001.png", 4, 4);
        fs::write(dir.path().join("0002.png"), b"not a png").await.unwrap();

        let assembly = FrameAssembly::new(dir.path(), 25, dir.path().join("cache"));
        let err = assembly.assemble(None, "mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::Encoding(_)));
    }

    #[tokio::test]
    async fn test_failed_run_leaves_no_frames_for_the_next() {
        let dir = TempDir::new().unwrap();
        let assembly = FrameAssembly::new(dir.path(), 25, dir.path().join("cache"));

        for name in ["0001.png", "0002.png", "0003.png"] {
            write_frame(dir.path(), name, 4, 4);
        }
        fs::write(dir.path().join("notes.txt"), b"keep").await.unwrap();
        write_frame(dir.path(), "0004.png", 8, 8);
        let err = assembly.assemble(None, "mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::Encoding(_)));

        assert!(!dir.path().join("0003.png").exists());
        assert!(dir.path().join("notes.txt").exists());

        write_frame(dir.path(), "0001.png", 8, 8);
        write_frame(dir.path(), "0002.png", 8, 6);
        let err = assembly.assemble(None, "mp4").await.unwrap_err();
        match err {
            MediaError::Encoding(message) => {
                assert!(message.contains("0002.png is 8x6, expected 8x8"), "{}", message)
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = assembly.assemble(None, "mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::ArtifactNotFound(_)));
    }

    #[tokio::test]
    async fn test_misordered_frames_are_consumed() {
        let dir = TempDir::new().unwrap();
        for name in ["frame_1.png", "frame_10.png", "frame_2.png"] {
            write_frame(dir.path(), name, 4, 4);
        }

        let assembly = FrameAssembly::new(dir.path(), 25, dir.path().join("cache"));
        let err = assembly.assemble(None, "mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::Encoding(_)));
        assert!(matches!(
            assembly.collect().await.unwrap_err(),
            MediaError::ArtifactNotFound(_)
        ));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_consecutive_runs_encode_only_their_own_frames() {
        let dir = TempDir::new().unwrap();
        let assembly = FrameAssembly::new(dir.path(), 25, dir.path().join("cache"));

        for i in 0..3 {
            write_frame(dir.path(), &format!("{:04}.png", i), 4, 4);
        }
        assembly.assemble(Some(5), "mp4").await.unwrap();

        for i in 0..2 {
            write_frame(dir.path(), &format!("{:04}.png", i), 8, 8);
        }
        let output = assembly.assemble(Some(5), "mp4").await.unwrap();
        assert!(fs::metadata(&output).await.unwrap().len() > 0);
        assert!(!dir.path().join("0002.png").exists());
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_assemble_encodes_frames() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            write_frame(dir.path(), &format!("{:04}.png", i), 33, 17);
        }

        let assembly = FrameAssembly::new(dir.path(), 25, dir.path().join("cache"));
        let output = assembly.assemble(Some(5), "mp4").await.unwrap();
        assert!(fs::metadata(&output).await.unwrap().len() > 0);
    }
}
