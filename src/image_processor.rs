//! # Image Processing Module
//!
//! Questo modulo gestisce la compressione in-process dei formati immagine supportati.
//!
//! ## Formati Supportati
//!
//! | Formato  | Strategia                                                   |
//! |----------|-------------------------------------------------------------|
//! | PNG      | Quantizzazione a ≤ 256 colori + deflate massimo (`png`)     |
//! | JPEG/JPG | Flatten su bianco se c'è alpha, qualità 85 + Huffman ottimizzato (`jpeg-encoder`) |
//!
//! ## Pipeline PNG
//!
//! 1. **Header**: se il PNG è già indicizzato viene solo ricodificato, palette invariata
//! 2. **Decodifica**: `image` con rilevamento formato dal contenuto
//! 3. **Quantizzazione**: NeuQuant se l'immagine ha alpha, median cut altrimenti
//! 4. **Scrittura**: PNG indicizzato, bit depth minimo, `tRNS` se serve, `Compression::Best`
//!
//! ## Pipeline JPEG
//!
//! 1. **Decodifica**: `image`
//! 2. **Conversione**: alpha composto su sfondo bianco, altrimenti RGB a 8 bit
//! 3. **Encoding**: `jpeg-encoder` con qualità configurata e tabelle Huffman ottimizzate
//!
//! ## Sicurezza
//!
//! L'output va sempre in un `TempArtifact` accanto all'originale; l'originale
//! viene toccato solo dalla rename atomica finale. Qualsiasi errore lascia
//! l'originale byte per byte identico e nessun `.tmp` residuo.
//!
//! ## Esempio
//!
//! ```rust,ignore
//! let processor = ImageProcessor::new(config);
//! let outcome = processor.compress(&media).await?;
//! ```

use crate::atomic::{CommitOutcome, TempArtifact};
use crate::config::Config;
use crate::error::CompressionError;
use crate::file_manager::MediaFile;
use crate::quantize::{quantize, QuantizeMethod, MAX_PALETTE_COLORS};
use image::{DynamicImage, RgbImage};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

type CodecResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Image formats the in-process backend can write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
        }
    }
}

/// Compresses PNG and JPEG files in place
pub struct ImageProcessor {
    config: Config,
}

impl ImageProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Compress `media` into a temp artifact and swap it in for the original.
    ///
    /// On error the original is untouched and the temp artifact is gone.
    pub async fn compress(&self, media: &MediaFile) -> Result<CommitOutcome, CompressionError> {
        let extension = media.extension().unwrap_or_default();
        let format = ImageFormat::from_extension(&extension).ok_or_else(|| {
            CompressionError::UnsupportedFormat {
                kind: "image",
                extension: format!(".{}", extension),
            }
        })?;

        let temp = TempArtifact::for_image(&media.path)?;
        debug!(
            "Compressing {} as {} into {}",
            media.path.display(),
            format.name(),
            temp.path().display()
        );

        let input = media.path.clone();
        let output = temp.path().to_path_buf();
        let quality = self.config.jpeg_quality;
        let start_time = Instant::now();

        tokio::task::spawn_blocking(move || match format {
            ImageFormat::Png => compress_png(&input, &output),
            ImageFormat::Jpeg => compress_jpeg(&input, &output, quality),
        })
        .await??;

        debug!(
            "{} encoded {} in {:?}",
            format.name(),
            media.path.display(),
            start_time.elapsed()
        );

        Ok(temp.commit(&media.path, &self.config).await?)
    }
}

/// Quantize (or re-encode an already indexed) PNG into `output`.
pub fn compress_png(input: &Path, output: &Path) -> Result<(), CompressionError> {
    encode_png(input, output).map_err(|e| CompressionError::image("PNG", input, e))
}

/// Re-encode a JPEG (or anything `image` can decode) as baseline JPEG into `output`.
pub fn compress_jpeg(input: &Path, output: &Path, quality: u8) -> Result<(), CompressionError> {
    encode_jpeg(input, output, quality).map_err(|e| CompressionError::image("JPEG", input, e))
}

fn decode(input: &Path) -> image::ImageResult<DynamicImage> {
    image::io::Reader::open(input)?.with_guessed_format()?.decode()
}

fn encode_png(input: &Path, output: &Path) -> CodecResult<()> {
    let mut decoder = png::Decoder::new(BufReader::new(File::open(input)?));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let reader = decoder.read_info()?;

    if reader.info().color_type == png::ColorType::Indexed {
        debug!("{} is already palette-indexed, re-encoding only", input.display());
        return reencode_indexed(reader, output);
    }
    drop(reader);

    let image = decode(input)?;
    let has_alpha = image.color().has_alpha();
    let method = QuantizeMethod::for_image(has_alpha);
    debug!("Quantizing {} with {:?}", input.display(), method);

    let indexed = quantize(&image.to_rgba8(), MAX_PALETTE_COLORS, method);
    let depth = png::BitDepth::from_u8(indexed.bit_depth()).ok_or("invalid palette bit depth")?;

    write_indexed_png(
        output,
        IndexedPng {
            width: indexed.width,
            height: indexed.height,
            depth,
            palette: indexed.plte(),
            trns: indexed.trns(),
            data: indexed.packed_rows(),
        },
    )
}

fn reencode_indexed<R: Read>(mut reader: png::Reader<R>, output: &Path) -> CodecResult<()> {
    let mut buffer = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buffer)?;
    buffer.truncate(frame.buffer_size());

    let info = reader.info();
    let palette = info
        .palette
        .as_ref()
        .ok_or("indexed PNG without a palette")?
        .to_vec();
    let trns = info.trns.as_ref().map(|trns| trns.to_vec());

    write_indexed_png(
        output,
        IndexedPng {
            width: frame.width,
            height: frame.height,
            depth: frame.bit_depth,
            palette,
            trns,
            data: buffer,
        },
    )
}

struct IndexedPng {
    width: u32,
    height: u32,
    depth: png::BitDepth,
    palette: Vec<u8>,
    trns: Option<Vec<u8>>,
    /// Packed rows at `depth`
    data: Vec<u8>,
}

fn write_indexed_png(output: &Path, image: IndexedPng) -> CodecResult<()> {
    let mut writer = BufWriter::new(File::create(output)?);

    let mut encoder = png::Encoder::new(&mut writer, image.width, image.height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(image.depth);
    encoder.set_palette(image.palette);
    if let Some(trns) = image.trns {
        encoder.set_trns(trns);
    }
    encoder.set_compression(png::Compression::Best);
    // Palette images compress best unfiltered
    encoder.set_filter(png::FilterType::NoFilter);
    encoder.set_adaptive_filter(png::AdaptiveFilterType::NonAdaptive);

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&image.data)?;
    png_writer.finish()?;

    writer.flush()?;
    Ok(())
}

fn encode_jpeg(input: &Path, output: &Path, quality: u8) -> CodecResult<()> {
    let image = decode(input)?;
    let rgb = flatten_to_rgb(&image);

    let (width, height) = rgb.dimensions();
    let (width, height) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(format!("{}x{} exceeds the JPEG size limit", width, height).into()),
    };

    let mut writer = BufWriter::new(File::create(output)?);
    let mut encoder = jpeg_encoder::Encoder::new(&mut writer, quality);
    encoder.set_optimized_huffman_tables(true);
    encoder.encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)?;

    writer.flush()?;
    Ok(())
}

/// JPEG has no alpha channel: composite transparent pixels over white.
fn flatten_to_rgb(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
        let alpha = src[3] as u32;
        for channel in 0..3 {
            let blended = src[channel] as u32 * alpha + 255 * (255 - alpha);
            dst[channel] = ((blended + 127) / 255) as u8;
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::KeepReason;
    use crate::file_manager::{FileManager, MediaKind};
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::fs;
    use tempfile::TempDir;

    fn noise(width: u32, height: u32) -> RgbImage {
        let mut seed: u32 = 42;
        RgbImage::from_fn(width, height, |_, _| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let [r, g, b, _] = seed.to_be_bytes();
            Rgb([r, g, b])
        })
    }

    fn leftover_temp_files(dir: &TempDir) -> Vec<String> {
        fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".tmp"))
            .collect()
    }

    fn media(path: &Path) -> MediaFile {
        FileManager::validate(&path).unwrap()
    }

    fn png_color_type(path: &Path) -> png::ColorType {
        let decoder = png::Decoder::new(File::open(path).unwrap());
        let reader = decoder.read_info().unwrap();
        reader.info().color_type
    }

    #[tokio::test]
    async fn test_rgb_png_is_quantized_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.png");
        noise(100, 100).save(&path).unwrap();
        let original_size = fs::metadata(&path).unwrap().len();

        let processor = ImageProcessor::new(Config::default());
        let outcome = processor.compress(&media(&path)).await.unwrap();

        assert!(matches!(outcome, CommitOutcome::Replaced { .. }));
        let compressed = image::open(&path).unwrap();
        assert_eq!((compressed.width(), compressed.height()), (100, 100));
        assert!(fs::metadata(&path).unwrap().len() <= original_size);
        assert_eq!(png_color_type(&path), png::ColorType::Indexed);
        assert!(leftover_temp_files(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_rgba_png_keeps_transparency() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("icon.png");
        RgbaImage::from_fn(32, 32, |x, y| {
            if x < 16 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([(x * 8) as u8, (y * 8) as u8, 200, 255])
            }
        })
        .save(&path)
        .unwrap();

        let processor = ImageProcessor::new(Config::default());
        processor.compress(&media(&path)).await.unwrap();

        assert_eq!(png_color_type(&path), png::ColorType::Indexed);
        let decoded = image::open(&path).unwrap().to_rgba8();
        // NeuQuant learns its palette, so allow a little slack on alpha
        assert!(decoded.get_pixel(0, 0)[3] < 16);
        assert!(decoded.get_pixel(31, 31)[3] > 239);
    }

    #[tokio::test]
    async fn test_indexed_png_is_reencoded_losslessly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("palette.png");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = png::Encoder::new(file, 4, 2);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_palette(vec![255, 0, 0, 0, 255, 0, 0, 0, 255]);
            encoder.set_compression(png::Compression::Fast);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0, 1, 2, 0, 2, 1, 0, 1]).unwrap();
        }
        let before = image::open(&path).unwrap().to_rgba8();

        let processor = ImageProcessor::new(Config::default());
        processor.compress(&media(&path)).await.unwrap();

        assert_eq!(png_color_type(&path), png::ColorType::Indexed);
        assert_eq!(image::open(&path).unwrap().to_rgba8(), before);
    }

    #[tokio::test]
    async fn test_jpeg_is_recompressed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jpg");
        RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 128]))
            .save(&path)
            .unwrap();

        let processor = ImageProcessor::new(Config::default());
        processor.compress(&media(&path)).await.unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
        assert!(leftover_temp_files(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_transparent_pixels_become_white_in_jpeg() {
        let dir = TempDir::new().unwrap();
        // PNG content under a .jpg name: decoded by content, alpha flattened
        let png_path = dir.path().join("source.png");
        RgbaImage::from_fn(32, 32, |x, _| {
            if x < 16 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
        .save(&png_path)
        .unwrap();
        let path = dir.path().join("sticker.jpg");
        fs::rename(&png_path, &path).unwrap();

        let processor = ImageProcessor::new(Config::default());
        processor.compress(&media(&path)).await.unwrap();

        let decoded = image::open(&path).unwrap().to_rgb8();
        let corner = decoded.get_pixel(2, 2);
        assert!(corner.0.iter().all(|&c| c > 240), "expected white, got {:?}", corner);
        let inside = decoded.get_pixel(28, 28);
        assert!(inside.0.iter().all(|&c| c < 16), "expected black, got {:?}", inside);
    }

    #[tokio::test]
    async fn test_corrupt_image_preserves_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"definitely not a png").unwrap();

        let processor = ImageProcessor::new(Config::default());
        let err = processor.compress(&media(&path)).await.unwrap_err();

        assert!(matches!(err, CompressionError::Image { format: "PNG", .. }));
        assert!(err.to_string().starts_with("Failed to compress PNG"));
        assert_eq!(fs::read(&path).unwrap(), b"definitely not a png");
        assert!(leftover_temp_files(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anim.gif");
        fs::write(&path, b"GIF89a").unwrap();
        let media = MediaFile {
            path: path.clone(),
            kind: MediaKind::Image,
        };

        let err = ImageProcessor::new(Config::default())
            .compress(&media)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Unsupported image format: .gif");
        assert!(leftover_temp_files(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_leaves_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.png");
        noise(40, 40).save(&path).unwrap();
        let before = fs::read(&path).unwrap();

        let config = Config {
            dry_run: true,
            ..Default::default()
        };
        let outcome = ImageProcessor::new(config)
            .compress(&media(&path))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            CommitOutcome::Kept {
                reason: KeepReason::DryRun,
                ..
            }
        ));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(leftover_temp_files(&dir).is_empty());
    }

    #[test]
    fn test_flatten_opaque_is_plain_rgb() {
        let image = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(2, 2, image::Luma([77])));
        let rgb = flatten_to_rgb(&image);
        assert_eq!(rgb.get_pixel(1, 1), &Rgb([77, 77, 77]));
    }
}
