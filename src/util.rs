use rayon::prelude::*;

// Minimum pixels per rayon task when swizzling a frame
const SWIZZLE_MIN_PIXELS: usize = 4096;

pub fn rgb_to_bgra(rgb: [u8; 3]) -> [u8; 4] {
    [rgb[2], rgb[1], rgb[0], 0xFF]
}

// Scales an RGB color by a light intensity, saturating at both ends
pub fn modulate(rgb: [u8; 3], intensity: f64) -> [u8; 3] {
    let scale = |c: u8| (c as f64 * intensity).clamp(0.0, 255.0) as u8;
    [scale(rgb[0]), scale(rgb[1]), scale(rgb[2])]
}

// Packs a lit RGB color as a BGRA8 pixel with full alpha
pub fn shade_bgra(rgb: [u8; 3], intensity: f64) -> [u8; 4] {
    rgb_to_bgra(modulate(rgb, intensity))
}

// Converts BGRA8 pixels to RGBA8. Extra trailing bytes in either slice are ignored.
pub fn bgra_to_rgba(src: &[u8], dst: &mut [u8]) {
    dst.par_chunks_exact_mut(4)
        .with_min_len(SWIZZLE_MIN_PIXELS)
        .zip(src.par_chunks_exact(4))
        .for_each(|(out, pixel)| {
            out[0] = pixel[2];
            out[1] = pixel[1];
            out[2] = pixel[0];
            out[3] = pixel[3];
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_packing() {
        assert_eq!(rgb_to_bgra([1, 2, 3]), [3, 2, 1, 255]);
        assert_eq!(shade_bgra([200, 100, 50], 0.5), [25, 50, 100, 255]);
    }

    #[test]
    fn modulate_saturates() {
        assert_eq!(modulate([255, 128, 0], 2.0), [255, 255, 0]);
        assert_eq!(modulate([255, 128, 10], -1.0), [0, 0, 0]);
        assert_eq!(modulate([255, 128, 10], 1.0), [255, 128, 10]);
    }

    #[test]
    fn swizzles_whole_frames() {
        let src: Vec<u8> = (0..64).collect();
        let mut dst = vec![0; 64];
        bgra_to_rgba(&src, &mut dst);
        for (out, pixel) in dst.chunks_exact(4).zip(src.chunks_exact(4)) {
            assert_eq!(out, [pixel[2], pixel[1], pixel[0], pixel[3]]);
        }
    }
}
