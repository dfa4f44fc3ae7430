use image::RgbaImage;
use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    sync::mpsc,
};
use tracing::debug;

pub type FrameResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// One rendered density frame on its way to disk
#[derive(Clone)]
pub struct FramePacket {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub i: usize,
}

pub fn frame_path(frames_dir: &Path, i: usize) -> PathBuf {
    frames_dir.join(format!("Frame{i:05}.png"))
}

/// Encode one frame as a PNG inside `frames_dir`.
pub fn image_save(packet: FramePacket, frames_dir: &Path) -> FrameResult<()> {
    let filename = frame_path(frames_dir, packet.i);

    let image = RgbaImage::from_raw(packet.width, packet.height, packet.rgba)
        .ok_or("Frame buffer does not match its dimensions")?;
    image.save(&filename)?;

    debug!("Wrote {}", filename.display());

    Ok(())
}

/// Write every inbound frame until the sending side hangs up. Frames left
/// over from a previous run are removed first.
///
/// Returns
/// - The number of frames written
pub fn image_io_loop(
    inbound_frames: mpsc::Receiver<FramePacket>,
    frames_dir: &Path,
) -> FrameResult<usize> {
    fs::create_dir_all(frames_dir)?;
    for entry in fs::read_dir(frames_dir)? {
        let path = entry?.path();
        let stale = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("Frame") && name.ends_with(".png"));

        if stale {
            fs::remove_file(path)?;
        }
    }

    let mut written = 0;
    for packet in inbound_frames {
        image_save(packet, frames_dir)?;
        written += 1;
    }

    Ok(written)
}
