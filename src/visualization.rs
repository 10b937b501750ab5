use macroquad::prelude::*;
use std::convert::Infallible;

use physarust::{ConfigError, Frame, Presenter, SimulationConfig};

/// Blits each frame as one texture, letterboxed to the world aspect ratio.
pub struct WindowPresenter {
    image: Image,
    texture: Texture2D,
    aspect: f32,
}

impl WindowPresenter {
    /// Fails when the grid does not fit in a texture.
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        let (width, height) = config.texture_size()?;
        let image = Image::gen_image_color(width, height, BLACK);
        let texture = Texture2D::from_image(&image);
        texture.set_filter(FilterMode::Linear);
        Ok(Self {
            image,
            texture,
            aspect: config.aspect_ratio(),
        })
    }
}

/// Largest `aspect`-shaped rectangle centred in the screen: (x, y, w, h).
fn letterbox(screen_w: f32, screen_h: f32, aspect: f32) -> (f32, f32, f32, f32) {
    let (w, h) = if screen_w / screen_h > aspect {
        (screen_h * aspect, screen_h)
    } else {
        (screen_w, screen_w / aspect)
    };
    ((screen_w - w) / 2.0, (screen_h - h) / 2.0, w, h)
}

impl Presenter for WindowPresenter {
    type Error = Infallible;

    fn present(&mut self, frame: &Frame) -> Result<(), Infallible> {
        frame.write_rgba(&mut self.image.bytes);
        self.texture.update(&self.image);

        clear_background(BLACK);
        let (x, y, w, h) = letterbox(screen_width(), screen_height(), self.aspect);
        draw_texture_ex(
            &self.texture,
            x,
            y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(w, h)),
                ..Default::default()
            },
        );
        Ok(())
    }
}
