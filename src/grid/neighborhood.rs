use super::Pixel;

/// Which pixels count as neighbors of each other
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Connectivity {
    /// Left, right, up, down
    #[default]
    Four,
    /// Four plus the diagonals
    Eight,
}

const FORWARD_FOUR: [(i64, i64); 2] = [(1, 0), (0, 1)];
const FORWARD_EIGHT: [(i64, i64); 4] = [(1, 0), (0, 1), (1, 1), (-1, 1)];

impl Connectivity {
    /// Offsets that visit every neighbor pair exactly once when applied to
    /// each pixel in row-major order
    fn forward_offsets(self) -> &'static [(i64, i64)] {
        match self {
            Self::Four => &FORWARD_FOUR,
            Self::Eight => &FORWARD_EIGHT,
        }
    }

    /// Every unordered neighbor pair of a `width` x `height` grid with the
    /// Euclidean distance between the two pixels
    ///
    /// Pairs come out in row-major order of their first pixel, which the
    /// flow network relies on for reproducible arc order.
    pub fn neighbor_pairs(
        self,
        width: u32,
        height: u32,
    ) -> impl Iterator<Item = (Pixel, Pixel, f64)> {
        let offsets = self.forward_offsets();
        (0..height).flat_map(move |y| {
            (0..width).flat_map(move |x| {
                offsets.iter().filter_map(move |&(dx, dy)| {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        return None;
                    }
                    let distance = ((dx * dx + dy * dy) as f64).sqrt();
                    Some((Pixel::new(x, y), Pixel::new(nx as u32, ny as u32), distance))
                })
            })
        })
    }

    /// In-bounds neighbors of one pixel
    pub fn neighbors(self, pixel: Pixel, width: u32, height: u32) -> Vec<Pixel> {
        let mut out = Vec::with_capacity(8);
        for &(dx, dy) in self.forward_offsets() {
            for (sx, sy) in [(dx, dy), (-dx, -dy)] {
                let nx = pixel.x as i64 + sx;
                let ny = pixel.y as i64 + sy;
                if nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64 {
                    out.push(Pixel::new(nx as u32, ny as u32));
                }
            }
        }
        out
    }
}
