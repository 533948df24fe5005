//! Loading raw binary images into simulated memory.

use crate::error::{DeviceError, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

//===========================================================================//

/// Returns `image` extended to exactly `size` bytes, with every byte past
/// the end of the image set to `fill`.  Fails if the image is longer than
/// `size`.
pub fn pad_image(
    name: &str,
    image: &[u8],
    size: usize,
    fill: u8,
) -> Result<Box<[u8]>> {
    if image.len() > size {
        return Err(DeviceError::ImageTooLarge {
            name: name.to_string(),
            len: image.len(),
            size,
        });
    }
    let mut contents = vec![fill; size];
    contents[..image.len()].copy_from_slice(image);
    Ok(contents.into_boxed_slice())
}

/// Reads a raw binary image and pads it to `size` bytes with `fill`.
pub fn read_image<R: Read>(
    name: &str,
    mut reader: R,
    size: usize,
    fill: u8,
) -> Result<Box<[u8]>> {
    let mut image = Vec::<u8>::new();
    reader.read_to_end(&mut image)?;
    pad_image(name, &image, size, fill)
}

/// Reads a raw binary image file and pads it to `size` bytes with `fill`.
pub fn load_image(
    name: &str,
    path: &Path,
    size: usize,
    fill: u8,
) -> Result<Box<[u8]>> {
    let file = File::open(path)?;
    read_image(name, io::BufReader::new(file), size, fill)
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{pad_image, read_image};
    use crate::error::DeviceError;
    use std::io;

    #[test]
    fn pads_with_fill_byte() {
        let contents = pad_image("ram", &[1, 2, 3], 6, 0x76).unwrap();
        assert_eq!(&*contents, &[1, 2, 3, 0x76, 0x76, 0x76]);
    }

    #[test]
    fn exact_fit_is_not_padded() {
        let contents = pad_image("ram", &[1, 2], 2, 0x76).unwrap();
        assert_eq!(&*contents, &[1, 2]);
    }

    #[test]
    fn rejects_oversized_image() {
        let result = read_image("ram_cp", io::Cursor::new(vec![0; 5]), 4, 0);
        assert!(matches!(
            result,
            Err(DeviceError::ImageTooLarge { len: 5, size: 4, .. })
        ));
    }
}

//===========================================================================//
