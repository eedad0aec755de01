use super::convert::label_map_to_mask;
use crate::segmentation::{Label, LabelMap};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Contents of a `.fbmask` descriptor
///
/// ```text
/// foreground 0
/// background 255
/// Mask.png
/// ```
///
/// The two value lines may come in either order. The image name is
/// relative to the descriptor's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FbMaskHeader {
    pub foreground_value: u8,
    pub background_value: u8,
    pub image_file: String,
}

fn parse_value_line(line: Option<&str>) -> Result<(String, u8)> {
    let line = line.context("Invalid .fbmask file: missing value line")?;
    let mut fields = line.split_whitespace();
    let keyword = fields.next().unwrap_or_default().to_string();
    let value = fields
        .next()
        .with_context(|| format!("Invalid .fbmask file: no value on line '{line}'"))?
        .parse::<u8>()
        .with_context(|| format!("Invalid .fbmask file: bad value on line '{line}'"))?;
    Ok((keyword, value))
}

pub fn parse_fbmask(text: &str) -> Result<FbMaskHeader> {
    let mut lines = text.lines();
    let (first, first_value) = parse_value_line(lines.next())?;
    let (second, second_value) = parse_value_line(lines.next())?;

    if first == second {
        bail!("Invalid .fbmask file! Foreground or background value listed twice!");
    }

    let mut foreground_value = None;
    let mut background_value = None;
    for (keyword, value) in [(first, first_value), (second, second_value)] {
        match keyword.as_str() {
            "foreground" => foreground_value = Some(value),
            "background" => background_value = Some(value),
            other => bail!("Invalid .fbmask file: unknown keyword '{other}'"),
        }
    }

    let image_file = lines.next().map(str::trim).unwrap_or_default();
    if image_file.is_empty() {
        bail!("Image file name was empty!");
    }

    // both keywords are known and distinct, so both values are set
    match (foreground_value, background_value) {
        (Some(foreground_value), Some(background_value)) => Ok(FbMaskHeader {
            foreground_value,
            background_value,
            image_file: image_file.to_string(),
        }),
        _ => bail!("Invalid .fbmask file!"),
    }
}

fn check_extension(path: &Path, action: &str) -> Result<()> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    if extension != "fbmask" {
        bail!(
            "Cannot {action} files with extension other than .fbmask! Specified file had extension .{extension}"
        );
    }
    Ok(())
}

/// Load a labeling stored as a `.fbmask` descriptor plus mask image
pub fn read_fbmask<P: AsRef<Path>>(path: P) -> Result<LabelMap> {
    let path = path.as_ref();
    check_extension(path, "read")?;

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let header = parse_fbmask(&text)?;
    tracing::info!(
        "Read {}: foreground value {}, background value {}",
        path.display(),
        header.foreground_value,
        header.background_value
    );

    let image_path = path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(&header.image_file);
    let mask = image::open(&image_path)
        .with_context(|| format!("Failed to read mask image {}", image_path.display()))?
        .to_luma8();

    let mut labels = Vec::with_capacity(mask.len());
    for (x, y, value) in mask.enumerate_pixels() {
        let label = if value[0] == header.foreground_value {
            Label::Foreground
        } else if value[0] == header.background_value {
            Label::Background
        } else {
            bail!(
                "Pixel ({x}, {y}) of {} has value {}, which is neither foreground nor background",
                image_path.display(),
                value[0]
            );
        };
        labels.push(label);
    }

    LabelMap::new(mask.width(), mask.height(), labels)
        .context("Mask image size does not match its pixel count")
}

/// Write `labels` as `<path>` plus a PNG named after it
pub fn write_fbmask<P: AsRef<Path>>(
    path: P,
    labels: &LabelMap,
    foreground_value: u8,
    background_value: u8,
) -> Result<()> {
    let path = path.as_ref();
    // the mask image is saved next to the descriptor as <stem>.png
    check_extension(path, "write")?;
    if foreground_value == background_value {
        bail!("Foreground and background values must differ");
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("No file name in {}", path.display()))?;
    let image_file = format!("{stem}.png");
    let image_path = path.with_file_name(&image_file);

    label_map_to_mask(labels, foreground_value, background_value)
        .save(&image_path)
        .with_context(|| format!("Failed to write mask image {}", image_path.display()))?;

    let descriptor = format!(
        "foreground {foreground_value}\nbackground {background_value}\n{image_file}\n"
    );
    fs::write(path, descriptor).with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Wrote {} and {}", path.display(), image_path.display());
    Ok(())
}
