use std::fs;
use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::errors::{FacadeError, Result};

/// An image carried as a base64 payload plus its MIME type.
///
/// Assets are immutable: every transformation produces a new asset. A
/// clone is an independent logical copy, so history slots, request
/// payloads and the current result never share one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub name: String,
    pub mime_type: String,
    pub data: String,
}

impl ImageAsset {
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Reads an image file the way the upload widget hands one over.
    pub fn from_path(path: &Path) -> Result<Self> {
        let Some(mime) = mime_for_path(path) else {
            return Err(FacadeError::input(format!(
                "{} is not an image file",
                path.display()
            )));
        };
        let bytes = fs::read(path)
            .map_err(|err| FacadeError::FileRead(format!("{}: {err}", path.display())))?;
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("image")
            .to_string();
        Ok(Self::from_bytes(name, mime, &bytes))
    }

    pub fn from_data_url(name: impl Into<String>, url: &str) -> Result<Self> {
        let Some(rest) = url.trim().strip_prefix("data:") else {
            return Err(FacadeError::input("data url must start with 'data:'"));
        };
        let Some((header, payload)) = rest.split_once(',') else {
            return Err(FacadeError::input("data url is missing its payload"));
        };
        let Some(mime_type) = header.strip_suffix(";base64") else {
            return Err(FacadeError::input("data url must be base64 encoded"));
        };
        if !mime_type.starts_with("image/") {
            return Err(FacadeError::input(format!(
                "data url carries {mime_type}, not an image"
            )));
        }
        BASE64
            .decode(payload.as_bytes())
            .map_err(|err| FacadeError::Decode(format!("invalid base64 payload: {err}")))?;
        Ok(Self {
            name: name.into(),
            mime_type: mime_type.to_string(),
            data: payload.to_string(),
        })
    }

    /// Encodes an RGBA buffer as a PNG asset.
    pub fn from_rgba(name: impl Into<String>, pixels: &RgbaImage) -> Result<Self> {
        let mut bytes = Vec::new();
        pixels
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|err| FacadeError::Decode(format!("png encode failed: {err}")))?;
        Ok(Self::from_bytes(name, "image/png", &bytes))
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(self.data.as_bytes())
            .map_err(|err| FacadeError::Decode(format!("{}: invalid base64: {err}", self.name)))
    }

    pub fn decode_rgba(&self) -> Result<RgbaImage> {
        let bytes = self.decode_bytes()?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| FacadeError::Decode(format!("{}: {err}", self.name)))?;
        Ok(decoded.to_rgba8())
    }

    /// Native pixel dimensions, read from the encoded header.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let bytes = self.decode_bytes()?;
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|err| FacadeError::Decode(format!("{}: {err}", self.name)))?;
        reader
            .into_dimensions()
            .map_err(|err| FacadeError::Decode(format!("{}: {err}", self.name)))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn byte_len(&self) -> usize {
        // Padding makes the encoded length a multiple of four.
        let padding = self.data.bytes().rev().take_while(|ch| *ch == b'=').count();
        (self.data.len() / 4 * 3).saturating_sub(padding)
    }

    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let bytes = self.decode_bytes()?;
        fs::write(path, bytes)
            .map_err(|err| FacadeError::FileRead(format!("{}: {err}", path.display())))
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    let lowered = mime.trim().to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::{Rgba, RgbaImage};

    use super::{extension_for_mime, ImageAsset};
    use crate::errors::FacadeError;

    fn checker(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn png_asset_reports_native_dimensions() -> anyhow::Result<()> {
        let asset = ImageAsset::from_rgba("checker.png", &checker(7, 3))?;
        assert_eq!(asset.mime_type, "image/png");
        assert_eq!(asset.dimensions()?, (7, 3));
        assert_eq!(asset.decode_rgba()?.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
        Ok(())
    }

    #[test]
    fn from_path_rejects_non_image_files() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("notes.txt");
        fs::write(&path, b"plain text")?;
        let err = ImageAsset::from_path(&path).err();
        assert!(matches!(err, Some(FacadeError::InputValidation(_))));
        Ok(())
    }

    #[test]
    fn from_path_reports_missing_file_as_read_error() {
        let err = ImageAsset::from_path(std::path::Path::new("/nonexistent/facade/base.png")).err();
        assert!(matches!(err, Some(FacadeError::FileRead(_))));
    }

    #[test]
    fn from_path_reads_name_and_mime() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("Villa.JPG");
        fs::write(&path, b"jpeg-bytes")?;
        let asset = ImageAsset::from_path(&path)?;
        assert_eq!(asset.name, "Villa.JPG");
        assert_eq!(asset.mime_type, "image/jpeg");
        assert_eq!(asset.decode_bytes()?, b"jpeg-bytes");
        assert_eq!(asset.byte_len(), 10);
        Ok(())
    }

    #[test]
    fn data_url_parsing_validates_header() -> anyhow::Result<()> {
        let asset = ImageAsset::from_bytes("a.png", "image/png", b"abc");
        let parsed = ImageAsset::from_data_url("a.png", &asset.to_data_url())?;
        assert_eq!(parsed, asset);

        assert!(ImageAsset::from_data_url("x", "data:text/plain;base64,YWJj").is_err());
        assert!(ImageAsset::from_data_url("x", "data:image/png,abc").is_err());
        assert!(ImageAsset::from_data_url("x", "image/png;base64,YWJj").is_err());
        Ok(())
    }

    #[test]
    fn extension_follows_mime() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/webp"), "webp");
        assert_eq!(extension_for_mime("application/octet-stream"), "png");
    }
}
