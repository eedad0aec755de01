use super::convert::{apply_to_image, label_map_to_mask};
use super::fbmask::write_fbmask;
use super::{ResultSink, BACKGROUND_VALUE, FOREGROUND_VALUE};
use crate::segmentation::LabelMap;
use anyhow::{Context, Result};
use image::{DynamicImage, Rgba};
use std::path::PathBuf;

/// Writes the labeling as a grayscale mask image
pub struct MaskImageSink {
    path: PathBuf,
}

impl MaskImageSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl ResultSink for MaskImageSink {
    fn write_result(&mut self, _image: &DynamicImage, labels: &LabelMap) -> Result<()> {
        label_map_to_mask(labels, FOREGROUND_VALUE, BACKGROUND_VALUE)
            .save(&self.path)
            .with_context(|| format!("Failed to write mask {}", self.path.display()))
    }

    fn destination(&self) -> String {
        format!("mask {}", self.path.display())
    }
}

/// Writes the source image with the background filled in
pub struct CompositeSink {
    path: PathBuf,
    background: Rgba<u8>,
}

impl CompositeSink {
    pub fn new<P: Into<PathBuf>>(path: P, background: Rgba<u8>) -> Self {
        Self {
            path: path.into(),
            background,
        }
    }
}

impl ResultSink for CompositeSink {
    fn write_result(&mut self, image: &DynamicImage, labels: &LabelMap) -> Result<()> {
        apply_to_image(image, labels, self.background)?
            .save(&self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    fn destination(&self) -> String {
        format!("composite {}", self.path.display())
    }
}

/// Writes a `.fbmask` descriptor and its mask image
pub struct FbMaskSink {
    path: PathBuf,
}

impl FbMaskSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl ResultSink for FbMaskSink {
    fn write_result(&mut self, _image: &DynamicImage, labels: &LabelMap) -> Result<()> {
        write_fbmask(&self.path, labels, FOREGROUND_VALUE, BACKGROUND_VALUE)
    }

    fn destination(&self) -> String {
        format!("fbmask {}", self.path.display())
    }
}
