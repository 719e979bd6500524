//! Image frames, texture sampling and the full-screen quad.

use anyhow::{anyhow, Result};
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};

/// Supported pixel formats for frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// RGB with 8 bits per channel (24 bits per pixel)
    Rgb,
    /// RGBA with 8 bits per channel (32 bits per pixel)
    Rgba,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// An 8-bit image frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format of the frame data
    pub format: PixelFormat,
    /// Raw pixel data, rows top to bottom
    pub data: Vec<u8>,
}

impl Frame {
    /// Creates a zeroed frame with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let size = (width as usize) * (height as usize) * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            data: vec![0; size],
        }
    }

    /// Creates a frame from existing data.
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(anyhow!(
                "{}x{} {:?} frame needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Creates an RGBA frame from a decoded image.
    pub fn from_image(image: &image::DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        Self {
            width: rgba.width(),
            height: rgba.height(),
            format: PixelFormat::Rgba,
            data: rgba.into_raw(),
        }
    }

    /// Converts this frame into an `image` buffer for encoding.
    pub fn into_image(self) -> Result<image::RgbaImage> {
        let rgba = self.to_rgba();
        image::RgbaImage::from_raw(rgba.width, rgba.height, rgba.data)
            .ok_or_else(|| anyhow!("frame data does not match its dimensions"))
    }

    /// Converts this frame to RGBA format.
    pub fn to_rgba(&self) -> Frame {
        if self.format == PixelFormat::Rgba {
            return self.clone();
        }

        let pixel_count = (self.width as usize) * (self.height as usize);
        let mut rgba_data = vec![0u8; pixel_count * 4];
        for i in 0..pixel_count {
            rgba_data[i * 4] = self.data[i * 3];
            rgba_data[i * 4 + 1] = self.data[i * 3 + 1];
            rgba_data[i * 4 + 2] = self.data[i * 3 + 2];
            rgba_data[i * 4 + 3] = 255;
        }
        Frame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgba,
            data: rgba_data,
        }
    }

    /// Normalized colour of the texel at `(x, y)`.
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        let bpp = self.format.bytes_per_pixel();
        let i = ((y as usize) * (self.width as usize) + x as usize) * bpp;
        let channel = |c: usize| self.data[i + c] as f32 / 255.0;
        let alpha = if bpp == 4 { channel(3) } else { 1.0 };
        Vec4::new(channel(0), channel(1), channel(2), alpha)
    }

    /// Stores a normalized colour, clamping and rounding to 8 bits.
    pub fn set_texel(&mut self, x: u32, y: u32, color: Vec4) {
        let bpp = self.format.bytes_per_pixel();
        let i = ((y as usize) * (self.width as usize) + x as usize) * bpp;
        let components = color.to_array();
        for (c, value) in components.iter().take(bpp).enumerate() {
            self.data[i + c] = to_unorm8(*value);
        }
    }

    /// Texture coordinate of the centre of texel `(x, y)`.
    pub fn texel_center(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        )
    }
}

/// GLSL-style unorm conversion; NaN maps to 0.
fn to_unorm8(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Anything a fragment shader can read colours from.
pub trait TextureSampler {
    /// Colour at a normalized texture coordinate, `(0, 0)` being the top-left.
    fn sample(&self, coord: Vec2) -> Vec4;
}

impl TextureSampler for Frame {
    /// Nearest-texel lookup with clamp-to-edge addressing.
    fn sample(&self, coord: Vec2) -> Vec4 {
        if self.width == 0 || self.height == 0 {
            return Vec4::ZERO;
        }
        let index = |c: f32, size: u32| -> u32 {
            if c.is_nan() {
                return 0;
            }
            ((c * size as f32).floor() as i64).clamp(0, size as i64 - 1) as u32
        };
        self.texel(index(coord.x, self.width), index(coord.y, self.height))
    }
}

/// Vertex for the full-screen quad.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
}

impl QuadVertex {
    /// Vertices for a full-screen quad.
    pub const VERTICES: &'static [QuadVertex] = &[
        QuadVertex { position: [-1.0, -1.0], tex_coords: [0.0, 1.0] },
        QuadVertex { position: [1.0, -1.0], tex_coords: [1.0, 1.0] },
        QuadVertex { position: [1.0, 1.0], tex_coords: [1.0, 0.0] },
        QuadVertex { position: [-1.0, 1.0], tex_coords: [0.0, 0.0] },
    ];

    /// Indices for the quad (two triangles).
    pub const INDICES: &'static [u16] = &[0, 1, 2, 2, 3, 0];

    /// Returns the vertex buffer layout.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_rgba_conversion() {
        let rgb_data = vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];
        let frame = Frame::from_data(2, 2, PixelFormat::Rgb, rgb_data).unwrap();
        let rgba_frame = frame.to_rgba();

        assert_eq!(rgba_frame.format, PixelFormat::Rgba);
        assert_eq!(rgba_frame.data.len(), 16);
        assert_eq!(&rgba_frame.data[0..4], &[255, 0, 0, 255]);
        assert_eq!(&rgba_frame.data[4..8], &[0, 255, 0, 255]);
    }

    #[test]
    fn test_from_data_checks_length() {
        assert!(Frame::from_data(2, 2, PixelFormat::Rgba, vec![0; 15]).is_err());
    }

    #[test]
    fn test_sample_clamps_to_edge() {
        let mut frame = Frame::new(2, 1, PixelFormat::Rgba);
        frame.set_texel(0, 0, Vec4::new(1.0, 0.0, 0.0, 1.0));
        frame.set_texel(1, 0, Vec4::new(0.0, 0.0, 1.0, 1.0));

        assert_eq!(frame.sample(Vec2::new(-3.0, 0.5)), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(frame.sample(Vec2::new(0.75, 0.5)), Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(frame.sample(Vec2::new(4.0, 9.0)), Vec4::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_set_texel_clamps_and_rounds() {
        let mut frame = Frame::new(1, 1, PixelFormat::Rgba);
        frame.set_texel(0, 0, Vec4::new(1.5, -0.2, f32::NAN, 0.5));
        assert_eq!(frame.data, vec![255, 0, 0, 128]);
    }
}
