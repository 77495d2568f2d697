use anyhow::{Context, Result};
use image::RgbImage;
use log::info;
use minimp4::Mp4Muxer;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate};
use openh264::formats::YUVBuffer;
use rayon::prelude::*;
use std::fs;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Rounds a dimension down to the even value H.264 4:2:0 needs (minimum 2).
pub fn even(dimension: u32) -> u32 {
    (dimension & !1).max(2)
}

/// RGB to YUV 4:2:0 conversion for video encoding. Width and height must be even.
pub fn rgb_to_yuv420(image: &RgbImage) -> Vec<u8> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let y_plane_size = width * height;
    let mut yuv = vec![0u8; y_plane_size + y_plane_size / 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_plane_size);
    y_plane.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let p = image.get_pixel(x as u32, y as u32);
            let (r, g, b) = (p[0] as f32, p[1] as f32, p[2] as f32);
            // BT.601
            *out = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
        }
    });

    // U and V planes are downsampled by 2 in each dimension
    let uv_width = width / 2;
    let (u_plane, v_plane) = uv_planes.split_at_mut(y_plane_size / 4);
    u_plane
        .par_chunks_mut(uv_width)
        .zip(v_plane.par_chunks_mut(uv_width))
        .enumerate()
        .for_each(|(uv_y, (u_row, v_row))| {
            for uv_x in 0..uv_width {
                let mut sum_u = 0f32;
                let mut sum_v = 0f32;
                for dy in 0..2 {
                    for dx in 0..2 {
                        let p = image.get_pixel((2 * uv_x + dx) as u32, (2 * uv_y + dy) as u32);
                        let (r, g, b) = (p[0] as f32, p[1] as f32, p[2] as f32);
                        sum_u += -0.169 * r - 0.331 * g + 0.5 * b + 128.0;
                        sum_v += 0.5 * r - 0.419 * g - 0.081 * b + 128.0;
                    }
                }
                u_row[uv_x] = (sum_u / 4.0).round().clamp(0.0, 255.0) as u8;
                v_row[uv_x] = (sum_v / 4.0).round().clamp(0.0, 255.0) as u8;
            }
        });

    yuv
}

/// Encodes rendered frames to H.264 and muxes them into an MP4 file on [`VideoWriter::finish`].
pub struct VideoWriter {
    encoder: Encoder,
    h264_data: Vec<u8>,
    width: u32,
    height: u32,
    frame_count: usize,
    output: PathBuf,
}

impl VideoWriter {
    pub fn new(output: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        let encoder = Encoder::with_api_config(
            openh264::OpenH264API::from_source(),
            EncoderConfig::new()
                .max_frame_rate(FrameRate::from_hz(fps as f32))
                .bitrate(BitRate::from_bps(5_000_000)),
        )
        .context("Failed to initialize H.264 encoder")?;

        Ok(VideoWriter {
            encoder,
            h264_data: Vec::new(),
            width,
            height,
            frame_count: 0,
            output: output.to_path_buf(),
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn push(&mut self, image: &RgbImage) -> Result<()> {
        anyhow::ensure!(
            image.dimensions() == (self.width, self.height),
            "frame is {}x{}, video is {}x{}",
            image.width(),
            image.height(),
            self.width,
            self.height
        );
        let yuv = rgb_to_yuv420(image);
        let yuv_source = YUVBuffer::from_vec(yuv, self.width as usize, self.height as usize);
        let bitstream = self
            .encoder
            .encode(&yuv_source)
            .with_context(|| format!("Error encoding video frame {}", self.frame_count))?;
        bitstream.write_vec(&mut self.h264_data);
        self.frame_count += 1;
        Ok(())
    }

    /// Muxes the encoded stream into the output file.
    pub fn finish(self, description: &str) -> Result<()> {
        info!("Creating MP4 file with {} frames...", self.frame_count);
        let mut video_buffer = Cursor::new(Vec::new());
        let mut mp4muxer = Mp4Muxer::new(&mut video_buffer);
        mp4muxer.init_video(self.width as i32, self.height as i32, false, description);
        mp4muxer.write_video(&self.h264_data);
        mp4muxer.close();

        video_buffer.seek(SeekFrom::Start(0))?;
        let mut video_bytes = Vec::new();
        video_buffer.read_to_end(&mut video_bytes)?;

        fs::write(&self.output, &video_bytes)
            .with_context(|| format!("Failed to write video file to {}", self.output.display()))?;
        info!("Video saved to: {}", self.output.display());
        Ok(())
    }
}
