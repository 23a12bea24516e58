//! Memory image loading
//!
//! A memory image is a flat binary blob: the first KiB populates
//! instruction memory and the second KiB populates data memory. Each
//! region must receive at least one byte; a shorter image leaves the
//! rest of the region zero, and anything past 2 KiB is ignored.

use std::fs;
use std::io;

use thiserror::Error;

use crate::platform::pma::{DATA_MEM_SIZE, DATA_MEM_START, INST_MEM_SIZE};

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("error reading image file {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("memory image has no instruction bytes")]
    EmptyInstructions,
    #[error("memory image has no data bytes")]
    EmptyData,
    #[error("address 0x{0:x} is outside the memory image")]
    NonWritable(u32),
}

/// Implemented by targets that can be populated from a memory image
pub trait ImageLoadable {
    /// Write one byte of the image (instruction or data region).
    /// Returns an error on an attempt to write outside those regions.
    fn write_byte(&mut self, addr: u32, data: u8) -> Result<(), ImageError>;
}

/// Read a memory image file and load it into the target
pub fn load_image<T: ImageLoadable>(
    target: &mut T,
    path: &str,
) -> Result<(), ImageError> {
    let image = fs::read(path).map_err(|source| ImageError::Read {
        path: path.to_string(),
        source,
    })?;
    load_image_bytes(target, &image)
}

/// Load a memory image already in memory into the target
pub fn load_image_bytes<T: ImageLoadable>(
    target: &mut T,
    image: &[u8],
) -> Result<(), ImageError> {
    let split = image.len().min(INST_MEM_SIZE as usize);
    let (inst, rest) = image.split_at(split);
    if inst.is_empty() {
        return Err(ImageError::EmptyInstructions);
    }
    let data = &rest[..rest.len().min(DATA_MEM_SIZE as usize)];
    if data.is_empty() {
        return Err(ImageError::EmptyData);
    }

    for (n, byte) in inst.iter().enumerate() {
        target.write_byte(n as u32, *byte)?;
    }
    for (n, byte) in data.iter().enumerate() {
        target.write_byte(DATA_MEM_START + n as u32, *byte)?;
    }
    Ok(())
}
