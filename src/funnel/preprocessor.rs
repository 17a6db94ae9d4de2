//! Upload preprocessor: turns the user's picked files into a validated,
//! size-bounded, compressed set before anything touches the network.
//!
//! Mirrors what the browser funnel does with canvas re-encoding, expressed as
//! pure functions over in-memory bytes so the bounds are unit-testable.

use crate::util::validate::{MAX_PHOTOS, MAX_PHOTO_BYTES, MAX_TOTAL_PHOTO_BYTES};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

/// Longest edge after downscaling. Images are never upscaled.
pub const MAX_EDGE_PX: u32 = 1600;

/// Fixed JPEG re-encode quality (~0.78).
pub const JPEG_QUALITY: u8 = 78;

/// A file as picked by the user, before upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PickedFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Result of a preprocessing pass: the final file set plus an optional notice
/// describing what was dropped and why.
#[derive(Debug, Default)]
pub struct PreprocessOutcome {
    pub files: Vec<PickedFile>,
    pub notice: Option<String>,
}

/// Merge newly picked files into the accumulated set, enforcing every bound,
/// then compress best-effort. Never fails; a file that cannot be decoded is
/// kept as-is.
pub fn prepare_photos(existing: Vec<PickedFile>, picked: Vec<PickedFile>) -> PreprocessOutcome {
    let mut wrong_type = 0usize;
    let mut too_heavy = 0usize;

    let accepted: Vec<PickedFile> = picked
        .into_iter()
        .filter(|file| {
            if !file.is_image() {
                wrong_type += 1;
                return false;
            }
            if file.size() > MAX_PHOTO_BYTES {
                too_heavy += 1;
                return false;
            }
            true
        })
        .collect();

    let mut merged = existing;
    merged.extend(accepted);

    let count_truncated = merged.len() > MAX_PHOTOS;
    merged.truncate(MAX_PHOTOS);

    let mut size_truncated = false;
    while total_size(&merged) > MAX_TOTAL_PHOTO_BYTES && !merged.is_empty() {
        merged.pop();
        size_truncated = true;
    }

    let files = merged.into_iter().map(compress_best_effort).collect();

    let mut reasons = Vec::new();
    if wrong_type > 0 {
        reasons.push(format!(
            "{wrong_type} fichier(s) ignoré(s) (format non pris en charge)"
        ));
    }
    if too_heavy > 0 {
        reasons.push(format!("{too_heavy} photo(s) trop lourde(s) (max 8 Mo)"));
    }
    if count_truncated {
        reasons.push(format!("maximum {MAX_PHOTOS} photos"));
    }
    if size_truncated {
        reasons.push("taille totale limitée à 25 Mo".to_string());
    }

    PreprocessOutcome {
        files,
        notice: if reasons.is_empty() {
            None
        } else {
            Some(reasons.join(" ; "))
        },
    }
}

fn total_size(files: &[PickedFile]) -> usize {
    files.iter().map(PickedFile::size).sum()
}

/// Re-encode one image to a bounded JPEG. Returns the original file untouched
/// when decoding or encoding fails.
fn compress_best_effort(file: PickedFile) -> PickedFile {
    match compress(&file) {
        Some(compressed) => compressed,
        None => {
            debug!("Keeping '{}' uncompressed", file.filename);
            file
        }
    }
}

fn compress(file: &PickedFile) -> Option<PickedFile> {
    let img = image::load_from_memory(&file.bytes).ok()?;

    let longest = img.width().max(img.height());
    let img = if longest > MAX_EDGE_PX {
        img.resize(MAX_EDGE_PX, MAX_EDGE_PX, FilterType::Triangle)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    rgb.write_with_encoder(encoder).ok()?;

    Some(PickedFile {
        filename: rename_to_jpg(&file.filename),
        content_type: "image/jpeg".to_string(),
        bytes: out,
    })
}

fn rename_to_jpg(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => format!("{}.jpg", &filename[..idx]),
        _ => format!("{filename}.jpg"),
    }
}
