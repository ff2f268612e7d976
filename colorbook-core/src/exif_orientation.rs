//! Upright decoding for camera photos.
//!
//! Phones store pixels in sensor order and record the intended rotation in
//! the EXIF Orientation tag (1 = as stored, 2..=8 = flips and quarter turns).

use std::io::Cursor;

use image::DynamicImage;

/// Orientation tag of an encoded image, if it has a readable one.
pub fn exif_orientation(encoded: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(encoded))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0)
}

/// Rotate/flip a decoded image according to an orientation tag value.
/// Unknown values leave the image as is.
pub fn orient(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Decode an encoded photo and turn it upright.
pub fn decode_upright(encoded: &[u8]) -> image::ImageResult<DynamicImage> {
    let img = image::load_from_memory(encoded)?;
    Ok(match exif_orientation(encoded) {
        Some(o) => orient(img, o),
        None => img,
    })
}
