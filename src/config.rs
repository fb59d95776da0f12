use clap::Parser;
use image::ImageFormat;
use std::path::PathBuf;
use std::str::FromStr;

use crate::interaction::{Offset, Point};

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Base URL of the inference endpoint
    #[arg(short, long, default_value = "http://127.0.0.1:5000")]
    pub server: String,

    /// Image to upload and segment
    #[arg(short, long)]
    pub image: PathBuf,

    /// Model path forwarded to the endpoint; the server picks its default when empty
    #[arg(short, long)]
    pub model_path: Option<String>,

    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(short, long, default_value = "png", value_parser = check_format)]
    pub format: String,

    /// Drag gesture `x,y:dx,dy`: press at image pixel (x, y), move by (dx, dy), release
    #[arg(short, long = "drag")]
    pub drags: Vec<DragGesture>,

    /// Reset all piece positions after the drags have been applied
    #[arg(long)]
    pub reset: bool,

    /// Also write every piece, overlay and normalized mask
    #[arg(long)]
    pub export_layers: bool,

    /// Seed for overlay tint colors
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,
}

impl Config {
    pub fn new() -> Self {
        Self::parse()
    }

    pub const fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// A scripted press-move-release sequence in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragGesture {
    pub start: Point,
    pub delta: Offset,
}

impl FromStr for DragGesture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, delta) = s
            .split_once(':')
            .ok_or_else(|| format!("`{}` is not of the form x,y:dx,dy", s))?;
        let (x, y) = parse_pair(start)?;
        let (dx, dy) = parse_pair(delta)?;
        Ok(Self {
            start: Point::new(x, y),
            delta: Offset::new(dx, dy),
        })
    }
}

fn parse_pair(s: &str) -> Result<(i32, i32), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("`{}` is not a pair of integers", s))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<i32>()
            .map_err(|e| format!("`{}`: {}", v.trim(), e))
    };
    Ok((parse(a)?, parse(b)?))
}

fn check_format(s: &str) -> Result<String, String> {
    let supported: Vec<_> = ImageFormat::all()
        .filter(|f| f.writing_enabled())
        .flat_map(|f| f.extensions_str())
        .map(|s| format!("`{}`", s))
        .collect();
    let supported_message = format!("Supported formats: {}", supported.join(", "));

    let format = ImageFormat::from_extension(s)
        .ok_or(format!("{} is not supported. {}", s, supported_message))?;
    if !format.writing_enabled() {
        return Err(format!("{} is not supported. {}", s, supported_message));
    }

    Ok(s.to_string())
}
