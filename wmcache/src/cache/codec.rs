//! Raster codec with an embedded expiration field.
//!
//! Every cached tile is a self-describing entry: the raster file carries a
//! text field `expiration` holding the decimal epoch-millisecond timestamp
//! after which the tile must be refreshed. The cache store only talks to the
//! [`TileCodec`] trait so the raster format can be swapped without touching
//! cache logic.

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};
use thiserror::Error;

/// Keyword of the embedded expiration text field.
pub const EXPIRATION_KEYWORD: &str = "expiration";

/// Errors raised while encoding or decoding a cached raster.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The file could not be decoded (truncated, corrupt or wrong format).
    #[error("Failed to decode tile raster: {0}")]
    Decode(String),

    /// The raster could not be encoded.
    #[error("Failed to encode tile raster: {0}")]
    Encode(String),
}

/// A decoded raster plus what the file said about its alpha channel.
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    /// Pixels, always expanded to RGBA.
    pub image: RgbaImage,
    /// Whether the stored colour type carried an alpha channel.
    pub has_alpha: bool,
}

/// Value of the embedded expiration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpirationField {
    /// The file has no expiration field.
    Missing,
    /// The field exists but is not a decimal integer.
    Unparseable(String),
    /// Expiration in milliseconds since the Unix epoch.
    At(i64),
}

/// Encoding and decoding of cached tile files.
pub trait TileCodec: Send + Sync {
    /// File extension (without the dot) used for cached tiles.
    fn extension(&self) -> &'static str;

    /// Encodes a raster, embedding `expiration` as a text field.
    fn encode(&self, raster: &RgbaImage, expiration: i64) -> Result<Vec<u8>, CodecError>;

    /// Decodes the full raster.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedRaster, CodecError>;

    /// Reads only the embedded expiration field.
    fn read_expiration(&self, bytes: &[u8]) -> Result<ExpirationField, CodecError>;
}

/// PNG codec storing the expiration in a `tEXt` chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl PngCodec {
    pub fn new() -> Self {
        Self
    }
}

impl TileCodec for PngCodec {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn encode(&self, raster: &RgbaImage, expiration: i64) -> Result<Vec<u8>, CodecError> {
        let encode_err = |e: png::EncodingError| CodecError::Encode(e.to_string());

        // Opaque rasters are written without alpha so a reload does not look
        // like a transparent tile.
        let opaque = is_opaque(raster);
        let data: Vec<u8> = if opaque {
            raster
                .pixels()
                .flat_map(|p| [p[0], p[1], p[2]])
                .collect()
        } else {
            raster.as_raw().clone()
        };

        let mut out = Vec::with_capacity(data.len() / 2);
        {
            let mut encoder = png::Encoder::new(&mut out, raster.width(), raster.height());
            encoder.set_color(if opaque {
                png::ColorType::Rgb
            } else {
                png::ColorType::Rgba
            });
            encoder.set_depth(png::BitDepth::Eight);
            encoder
                .add_text_chunk(EXPIRATION_KEYWORD.to_string(), expiration.to_string())
                .map_err(encode_err)?;

            let mut writer = encoder.write_header().map_err(encode_err)?;
            writer.write_image_data(&data).map_err(encode_err)?;
            writer.finish().map_err(encode_err)?;
        }
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedRaster, CodecError> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        let has_alpha = image.color().has_alpha();
        Ok(DecodedRaster {
            image: image.to_rgba8(),
            has_alpha,
        })
    }

    fn read_expiration(&self, bytes: &[u8]) -> Result<ExpirationField, CodecError> {
        let decoder = png::Decoder::new(Cursor::new(bytes));
        let reader = decoder
            .read_info()
            .map_err(|e| CodecError::Decode(e.to_string()))?;

        let field = reader
            .info()
            .uncompressed_latin1_text
            .iter()
            .find(|chunk| chunk.keyword == EXPIRATION_KEYWORD)
            .map(|chunk| match chunk.text.trim().parse::<i64>() {
                Ok(value) => ExpirationField::At(value),
                Err(_) => ExpirationField::Unparseable(chunk.text.clone()),
            });

        Ok(field.unwrap_or(ExpirationField::Missing))
    }
}

/// Returns true if every pixel is fully opaque.
pub fn is_opaque(raster: &RgbaImage) -> bool {
    raster.pixels().all(|p| p[3] == u8::MAX)
}
