// Colour ramp from trail intensity to display pixels

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::field::TrailField;

pub type Rgb = [f32; 3];

/// Maps clamped intensity onto a line from `background` to the (optionally
/// hue-cycling) `trail` colour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub background: Rgb,
    pub trail: Rgb,
    /// Radians of hue rotation per second of simulated time. 0 disables cycling.
    pub cycle_speed: f32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: [0.0, 0.0, 0.0],
            trail: [1.0, 1.0, 1.0],
            cycle_speed: 0.0,
        }
    }
}

impl Palette {
    /// Trail colour at simulated time `time`.
    pub fn tint(&self, time: f64) -> Rgb {
        if self.cycle_speed == 0.0 {
            return self.trail;
        }
        // Reduced in f64 so long runs keep cycling smoothly.
        let phase = (time * self.cycle_speed as f64).rem_euclid(std::f64::consts::TAU) as f32;
        let mut out = [0.0; 3];
        for (i, (o, t)) in out.iter_mut().zip(self.trail).enumerate() {
            let wave = 0.5 + 0.5 * (phase + i as f32 * TAU / 3.0).cos();
            *o = t * wave;
        }
        out
    }

    pub fn color(&self, intensity: f32, tint: Rgb) -> [u8; 3] {
        let v = if intensity.is_nan() {
            0.0
        } else {
            intensity.clamp(0.0, 1.0)
        };
        let mut px = [0u8; 3];
        for ((p, b), t) in px.iter_mut().zip(self.background).zip(tint) {
            *p = to_byte(b + (t - b) * v);
        }
        px
    }

    /// Colour every cell of `field` into `frame`.
    pub fn render_into(&self, field: &TrailField, time: f64, frame: &mut Frame) {
        debug_assert_eq!((frame.width, frame.height), (field.width(), field.height()));
        let tint = self.tint(time);
        let width = frame.width;
        frame
            .rgb
            .par_chunks_mut(width * 3)
            .zip(field.cells().par_chunks(width))
            .for_each(|(out, cells)| {
                for (px, &v) in out.chunks_exact_mut(3).zip(cells) {
                    px.copy_from_slice(&self.color(v, tint));
                }
            });
    }
}

fn to_byte(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// One displayable image: RGB8, row-major, one pixel per field cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: usize,
    pub height: usize,
    pub rgb: Vec<u8>,
}

impl Frame {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rgb: vec![0; width * height * 3],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.rgb[i], self.rgb[i + 1], self.rgb[i + 2]]
    }

    /// Expand into an opaque RGBA8 buffer of `width * height * 4` bytes.
    pub fn write_rgba(&self, out: &mut [u8]) {
        for (dst, src) in out.chunks_exact_mut(4).zip(self.rgb.chunks_exact(3)) {
            dst[..3].copy_from_slice(src);
            dst[3] = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_endpoints() {
        let palette = Palette {
            background: [0.0, 0.0, 0.2],
            trail: [1.0, 0.5, 0.0],
            cycle_speed: 0.0,
        };
        let tint = palette.tint(12.0);
        assert_eq!(tint, palette.trail);
        assert_eq!(palette.color(0.0, tint), [0, 0, 51]);
        assert_eq!(palette.color(1.0, tint), [255, 128, 0]);
        assert_eq!(palette.color(50.0, tint), [255, 128, 0]);
        assert_eq!(palette.color(-1.0, tint), [0, 0, 51]);
        assert_eq!(palette.color(f32::NAN, tint), [0, 0, 51]);
    }

    #[test]
    fn test_tint_cycles_with_time() {
        let palette = Palette {
            cycle_speed: 1.0,
            ..Palette::default()
        };
        let a = palette.tint(0.0);
        let b = palette.tint(1.0);
        assert_ne!(a, b);
        let c = palette.tint(std::f64::consts::TAU);
        for (x, y) in a.iter().zip(c) {
            assert!((x - y).abs() < 1e-4);
        }
        assert!(a.iter().all(|&v| (0.0..=1.0).contains(&v)));

        // Days into a run the hue still moves between frames.
        let late = 1.0e6;
        assert_ne!(palette.tint(late), palette.tint(late + 0.25));
    }

    #[test]
    fn test_render_into_frame() {
        let mut field = TrailField::new(3, 2).unwrap();
        field.set(2, 1, 1.0);
        field.set(0, 0, 0.5);
        let mut frame = Frame::new(3, 2);
        Palette::default().render_into(&field, 0.0, &mut frame);
        assert_eq!(frame.pixel(2, 1), [255, 255, 255]);
        assert_eq!(frame.pixel(0, 0), [128, 128, 128]);
        assert_eq!(frame.pixel(1, 0), [0, 0, 0]);

        let mut rgba = vec![0u8; 3 * 2 * 4];
        frame.write_rgba(&mut rgba);
        assert_eq!(&rgba[20..24], &[255, 255, 255, 255]);
        assert_eq!(&rgba[0..4], &[128, 128, 128, 255]);
    }
}
