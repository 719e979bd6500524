//! std140 staging buffer for a program's uniform block.

use super::{RenderContext, UniformLocation};
use crate::error::FilterError;

/// Host copy of a uniform block, written by offset and uploaded whole.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    data: Vec<u8>,
}

impl UniformBlock {
    /// Creates a zeroed block of `size` bytes.
    pub fn new(size: u32) -> Self {
        Self {
            data: vec![0; size as usize],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn write(&mut self, location: UniformLocation, values: &[f32]) -> Result<(), FilterError> {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let start = location.offset as usize;
        let end = start + bytes.len();
        if end > self.data.len() {
            return Err(FilterError::OutOfBounds {
                offset: location.offset,
                len: bytes.len() as u32,
                size: self.size(),
            });
        }
        self.data[start..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl RenderContext for UniformBlock {
    fn uniform1f(&mut self, location: UniformLocation, x: f32) -> Result<(), FilterError> {
        self.write(location, &[x])
    }

    fn uniform2f(&mut self, location: UniformLocation, x: f32, y: f32) -> Result<(), FilterError> {
        self.write(location, &[x, y])
    }

    fn uniform3f(&mut self, location: UniformLocation, x: f32, y: f32, z: f32) -> Result<(), FilterError> {
        self.write(location, &[x, y, z])
    }

    fn uniform4f(&mut self, location: UniformLocation, x: f32, y: f32, z: f32, w: f32) -> Result<(), FilterError> {
        self.write(location, &[x, y, z, w])
    }
}
