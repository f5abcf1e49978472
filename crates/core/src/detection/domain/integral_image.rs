/// Summed-area tables over an 8-bit grayscale image.
///
/// Both tables are `(width + 1) x (height + 1)` with a zero first row and
/// column, so any rectangle sum costs four lookups.
pub struct IntegralImage {
    width: usize,
    height: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    pub fn new(gray: &[u8], width: usize, height: usize) -> Self {
        debug_assert_eq!(gray.len(), width * height);
        let stride = width + 1;
        let mut sum = vec![0u64; stride * (height + 1)];
        let mut sq_sum = vec![0u64; stride * (height + 1)];

        for y in 0..height {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..width {
                let v = gray[y * width + x] as u64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                sq_sum[idx] = sq_sum[idx - stride] + row_sq;
            }
        }

        Self {
            width,
            height,
            sum,
            sq_sum,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Sum of pixels in `[x, x + w) x [y, y + h)`. The rectangle must lie
    /// inside the image.
    pub fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> u64 {
        Self::lookup(&self.sum, self.width + 1, x, y, w, h)
    }

    pub fn rect_sq_sum(&self, x: usize, y: usize, w: usize, h: usize) -> u64 {
        Self::lookup(&self.sq_sum, self.width + 1, x, y, w, h)
    }

    fn lookup(table: &[u64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> u64 {
        let a = table[y * stride + x];
        let b = table[y * stride + x + w];
        let c = table[(y + h) * stride + x];
        let d = table[(y + h) * stride + x + w];
        d + a - b - c
    }
}
