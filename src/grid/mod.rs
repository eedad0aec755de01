mod load;
mod neighborhood;
mod vector_image;

pub use load::load_image;
pub use neighborhood::Connectivity;
pub use vector_image::VectorImage;

use ndarray::ArrayView1;

/// A pixel coordinate, `x` along the row and `y` down the columns
///
/// Pixels order row-major, like node ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pixel {
    pub x: u32,
    pub y: u32,
}

impl Pixel {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl Ord for Pixel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Pixel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Pixel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Trait for pixel grids the segmentation core can read
/// Every pixel has the same number of channels
pub trait PixelSource: Sync {
    /// Returns (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Number of channels per pixel
    fn channels(&self) -> usize;

    /// Color vector of an in-bounds pixel
    fn color(&self, pixel: Pixel) -> ArrayView1<'_, f32>;

    fn pixel_count(&self) -> usize {
        let (width, height) = self.dimensions();
        width as usize * height as usize
    }

    fn contains(&self, pixel: Pixel) -> bool {
        let (width, height) = self.dimensions();
        pixel.x < width && pixel.y < height
    }

    /// Row-major node id of a pixel
    fn index_of(&self, pixel: Pixel) -> usize {
        let (width, _) = self.dimensions();
        pixel.y as usize * width as usize + pixel.x as usize
    }

    /// Smallest and largest sample of one channel, `None` for an empty grid
    fn channel_range(&self, channel: usize) -> Option<(f32, f32)> {
        (0..self.pixel_count())
            .map(|index| self.color(self.pixel_at(index))[channel])
            .fold(None, |range, v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Inverse of `index_of`
    fn pixel_at(&self, index: usize) -> Pixel {
        let (width, _) = self.dimensions();
        let width = width as usize;
        Pixel::new((index % width) as u32, (index / width) as u32)
    }
}
