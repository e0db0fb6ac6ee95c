use rayon::prelude::*;
use thiserror::Error;

pub const DEFAULT_BACKGROUND: [u8; 4] = [0x20, 0x20, 0x20, 0xFF];

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Invalid resolution scale {0}, expected one of 1, 2, 4, 8 or 16")]
pub struct ScaleError(pub u32);

// Ratio between display and render resolution along each axis
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ResolutionScale {
    #[default]
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl ResolutionScale {
    pub const ALL: [ResolutionScale; 5] = [
        ResolutionScale::X1,
        ResolutionScale::X2,
        ResolutionScale::X4,
        ResolutionScale::X8,
        ResolutionScale::X16,
    ];

    pub fn factor(self) -> usize {
        match self {
            ResolutionScale::X1 => 1,
            ResolutionScale::X2 => 2,
            ResolutionScale::X4 => 4,
            ResolutionScale::X8 => 8,
            ResolutionScale::X16 => 16,
        }
    }
}

impl TryFrom<u32> for ResolutionScale {
    type Error = ScaleError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ResolutionScale::X1),
            2 => Ok(ResolutionScale::X2),
            4 => Ok(ResolutionScale::X4),
            8 => Ok(ResolutionScale::X8),
            16 => Ok(ResolutionScale::X16),
            _ => Err(ScaleError(value)),
        }
    }
}

// Color (BGRA8) and depth targets at render resolution
pub struct Framebuffer {
    width: usize,
    height: usize,
    background: [u8; 4],
    color: Vec<u8>,
    depth: Vec<f64>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize, background: [u8; 4]) -> Self {
        let mut framebuffer = Self {
            width,
            height,
            background,
            color: vec![0; width * height * 4],
            depth: vec![f64::INFINITY; width * height],
        };
        framebuffer.clear();
        framebuffer
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn background(&self) -> [u8; 4] {
        self.background
    }

    pub fn color(&self) -> &[u8] {
        &self.color
    }

    pub fn depth(&self) -> &[f64] {
        &self.depth
    }

    pub fn color_and_depth_mut(&mut self) -> (&mut [u8], &mut [f64]) {
        (&mut self.color, &mut self.depth)
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = (y * self.width + x) * 4;
        let mut pixel = [0; 4];
        pixel.copy_from_slice(&self.color[index..index + 4]);
        Some(pixel)
    }

    pub fn depth_at(&self, x: usize, y: usize) -> Option<f64> {
        if x < self.width && y < self.height {
            Some(self.depth[y * self.width + x])
        } else {
            None
        }
    }

    // Writes are dropped outside the buffer
    pub fn set_pixel(&mut self, x: usize, y: usize, color: [u8; 4], depth: f64) {
        if x < self.width && y < self.height {
            let index = y * self.width + x;
            self.color[index * 4..index * 4 + 4].copy_from_slice(&color);
            self.depth[index] = depth;
        }
    }

    pub fn clear(&mut self) {
        fill_background(&mut self.color, self.background);
        self.depth.fill(f64::INFINITY);
    }

    // Replicates each pixel into a scale x scale block of `out` (BGRA8, out_width x out_height).
    // Output not covered by the scaled image gets the background color.
    pub fn expand(
        &self,
        scale: ResolutionScale,
        out: &mut [u8],
        out_width: usize,
        out_height: usize,
        parallel: bool,
    ) {
        let s = scale.factor();
        let row_bytes = out_width * 4;
        if row_bytes == 0 || out_height == 0 {
            return;
        }
        if out.len() != row_bytes * out_height {
            log::warn!(
                "Expand target is {} bytes, expected {}x{}",
                out.len(),
                out_width,
                out_height
            );
            return;
        }

        // Each chunk is the s destination rows fed by one source row
        let block_bytes = row_bytes * s;
        if parallel {
            out.par_chunks_mut(block_bytes)
                .enumerate()
                .for_each(|(src_y, block)| self.expand_row(src_y, s, block, row_bytes));
        } else {
            out.chunks_mut(block_bytes)
                .enumerate()
                .for_each(|(src_y, block)| self.expand_row(src_y, s, block, row_bytes));
        }
    }

    fn expand_row(&self, src_y: usize, s: usize, block: &mut [u8], row_bytes: usize) {
        let (first, rest) = block.split_at_mut(row_bytes);

        if src_y < self.height {
            let src_row = &self.color[src_y * self.width * 4..(src_y + 1) * self.width * 4];
            let covered = (self.width * s).min(row_bytes / 4) * 4;
            let (image, margin) = first.split_at_mut(covered);
            for (dst, src) in image.chunks_mut(4 * s).zip(src_row.chunks_exact(4)) {
                for pixel in dst.chunks_exact_mut(4) {
                    pixel.copy_from_slice(src);
                }
            }
            fill_background(margin, self.background);
        } else {
            fill_background(first, self.background);
        }

        for row in rest.chunks_exact_mut(row_bytes) {
            row.copy_from_slice(first);
        }
    }
}

fn fill_background(bytes: &mut [u8], background: [u8; 4]) {
    for pixel in bytes.chunks_exact_mut(4) {
        pixel.copy_from_slice(&background);
    }
}

// Owns the render target and the display sized output it is expanded into
pub struct Compositor {
    display_width: usize,
    display_height: usize,
    scale: ResolutionScale,
    parallel: bool,
    framebuffer: Framebuffer,
    display: Vec<u8>,
}

impl Compositor {
    pub fn new(
        display_width: usize,
        display_height: usize,
        scale: ResolutionScale,
        background: [u8; 4],
        parallel: bool,
    ) -> Self {
        let (width, height) = render_size(display_width, display_height, scale);
        Self {
            display_width,
            display_height,
            scale,
            parallel,
            framebuffer: Framebuffer::new(width, height, background),
            display: vec![0; display_width * display_height * 4],
        }
    }

    pub fn scale(&self) -> ResolutionScale {
        self.scale
    }

    // Reallocates the render target. Takes effect from the next frame.
    pub fn set_scale(&mut self, scale: ResolutionScale) {
        if scale == self.scale {
            return;
        }
        let (width, height) = render_size(self.display_width, self.display_height, scale);
        log::info!(
            "Resolution scale {} ({}x{} render target)",
            scale.factor(),
            width,
            height
        );
        self.framebuffer = Framebuffer::new(width, height, self.framebuffer.background());
        self.scale = scale;
    }

    pub fn display_size(&self) -> (usize, usize) {
        (self.display_width, self.display_height)
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        &mut self.framebuffer
    }

    // Display resolution BGRA8 bytes for the frame drawn so far
    pub fn present(&mut self) -> &[u8] {
        if self.scale == ResolutionScale::X1 && self.framebuffer.color.len() == self.display.len() {
            return self.framebuffer.color();
        }
        self.framebuffer.expand(
            self.scale,
            &mut self.display,
            self.display_width,
            self.display_height,
            self.parallel,
        );
        &self.display
    }

    pub fn clear(&mut self) {
        self.framebuffer.clear();
    }
}

fn render_size(display_width: usize, display_height: usize, scale: ResolutionScale) -> (usize, usize) {
    let s = scale.factor();
    ((display_width / s).max(1), (display_height / s).max(1))
}
