//! Small utility helpers used across modules.

use base64::{prelude::BASE64_STANDARD, Engine as _};
use mime_guess::mime::{self, Mime};

/// MIME type and file extension of an uploaded picture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFormat {
  pub mime: String,
  pub extension: &'static str,
}

impl ImageFormat {
  fn jpeg() -> Self {
    Self { mime: mime::IMAGE_JPEG.to_string(), extension: "jpg" }
  }
}

/// Identify an image by its magic bytes, then by the declared content type.
/// Anything that is not `image/*` (e.g. `application/octet-stream`) is treated as JPEG.
pub fn image_format(bytes: &[u8], declared: Option<&str>) -> ImageFormat {
  if let Some(kind) = infer::get(bytes).filter(|k| k.matcher_type() == infer::MatcherType::Image) {
    return ImageFormat { mime: kind.mime_type().to_string(), extension: kind.extension() };
  }
  let Some(declared) = declared
    .and_then(|d| d.parse::<Mime>().ok())
    .filter(|m| m.type_() == mime::IMAGE)
  else {
    return ImageFormat::jpeg();
  };
  let extension = mime_guess::get_mime_extensions(&declared).and_then(|exts| {
    // mime_guess lists "jpe" first for image/jpeg
    if exts.contains(&"jpg") { Some("jpg") } else { exts.first().copied() }
  });
  match extension {
    Some(extension) => ImageFormat { mime: declared.essence_str().to_string(), extension },
    None => ImageFormat::jpeg(),
  }
}

/// Encode binary data as a `data:` URL (how images are attached to chat requests).
pub fn data_url(mime_type: &str, data: &[u8]) -> String {
  format!("data:{};base64,{}", mime_type, BASE64_STANDARD.encode(data))
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge model responses; never splits a UTF-8 char.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) { end -= 1; }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}
