//! # Palette Quantization Module
//!
//! Riduzione dei colori di un'immagine a una palette di al massimo 256 voci,
//! usata dal backend PNG prima della scrittura in modalità indicizzata.
//!
//! ## Metodi:
//! - **Palette esatta**: se l'immagine ha già ≤ 256 colori distinti, nessuna perdita
//! - **MaxCoverage** (median cut): per immagini opache, massimizza la copertura dello spazio colore
//! - **NeuQuant** (`color_quant`): per immagini con alpha, rete neurale percettiva su RGBA
//!
//! ## Output:
//! `IndexedImage` con palette RGBA ordinata per alpha crescente (così il chunk
//! `tRNS` resta il più corto possibile) e indici impacchettabili a 1/2/4/8 bit.

use color_quant::NeuQuant;
use image::RgbaImage;
use std::collections::HashMap;

/// Upper bound of a PNG palette
pub const MAX_PALETTE_COLORS: usize = 256;

// 1 = best quality, 30 = fastest; 10 is the usual compromise
const NEUQUANT_SAMPLE_FACTOR: i32 = 10;

/// Palette construction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizeMethod {
    /// Median cut over RGB, for opaque images
    MaxCoverage,
    /// Alpha-aware neural quantizer
    NeuQuant,
}

impl QuantizeMethod {
    /// Alpha-aware methods are required as soon as the image carries alpha
    pub fn for_image(has_alpha: bool) -> Self {
        if has_alpha {
            Self::NeuQuant
        } else {
            Self::MaxCoverage
        }
    }
}

/// A palette image ready for PNG encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    pub width: u32,
    pub height: u32,
    pub palette: Vec<[u8; 4]>,
    /// One palette index per pixel, row-major
    pub indices: Vec<u8>,
}

impl IndexedImage {
    /// Smallest PNG bit depth able to address the palette
    pub fn bit_depth(&self) -> u8 {
        match self.palette.len() {
            0..=2 => 1,
            3..=4 => 2,
            5..=16 => 4,
            _ => 8,
        }
    }

    /// Contents of the PLTE chunk
    pub fn plte(&self) -> Vec<u8> {
        self.palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect()
    }

    /// Contents of the tRNS chunk, if any entry is not fully opaque
    pub fn trns(&self) -> Option<Vec<u8>> {
        let last_translucent = self.palette.iter().rposition(|c| c[3] != u8::MAX)?;
        Some(self.palette[..=last_translucent].iter().map(|c| c[3]).collect())
    }

    /// Indices packed MSB-first at `bit_depth()`, each row padded to a byte
    pub fn packed_rows(&self) -> Vec<u8> {
        let depth = self.bit_depth() as usize;
        if depth == 8 {
            return self.indices.clone();
        }

        let width = self.width as usize;
        let per_byte = 8 / depth;
        let row_bytes = (width + per_byte - 1) / per_byte;
        let mut out = vec![0u8; row_bytes * self.height as usize];

        for (y, row) in self.indices.chunks(width.max(1)).enumerate() {
            for (x, &index) in row.iter().enumerate() {
                let byte = y * row_bytes + x / per_byte;
                let shift = 8 - depth * (x % per_byte + 1);
                out[byte] |= index << shift;
            }
        }
        out
    }
}

/// Reduce `image` to at most `max_colors` palette entries.
pub fn quantize(image: &RgbaImage, max_colors: usize, method: QuantizeMethod) -> IndexedImage {
    let max_colors = max_colors.clamp(2, MAX_PALETTE_COLORS);

    let (palette, indices) = match exact_palette(image, max_colors) {
        Some(exact) => exact,
        None => match method {
            QuantizeMethod::MaxCoverage => median_cut(image, max_colors),
            QuantizeMethod::NeuQuant => neuquant(image, max_colors),
        },
    };

    let (palette, indices) = sort_by_alpha(palette, indices);

    IndexedImage {
        width: image.width(),
        height: image.height(),
        palette,
        indices,
    }
}

fn exact_palette(image: &RgbaImage, max_colors: usize) -> Option<(Vec<[u8; 4]>, Vec<u8>)> {
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::new();
    let mut palette = Vec::new();
    let mut indices = Vec::with_capacity(image.as_raw().len() / 4);

    for pixel in image.pixels() {
        let index = match lookup.get(&pixel.0) {
            Some(&index) => index,
            None => {
                if palette.len() == max_colors {
                    return None;
                }
                let index = palette.len() as u8;
                palette.push(pixel.0);
                lookup.insert(pixel.0, index);
                index
            }
        };
        indices.push(index);
    }

    if palette.is_empty() {
        palette.push([0, 0, 0, u8::MAX]);
    }
    Some((palette, indices))
}

fn neuquant(image: &RgbaImage, max_colors: usize) -> (Vec<[u8; 4]>, Vec<u8>) {
    let quantizer = NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, max_colors, image.as_raw());
    let palette = quantizer
        .color_map_rgba()
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect();
    let indices = image
        .pixels()
        .map(|pixel| quantizer.index_of(&pixel.0) as u8)
        .collect();
    (palette, indices)
}

/// A set of distinct colors with their pixel counts
struct ColorBox {
    colors: Vec<([u8; 3], u32)>,
}

impl ColorBox {
    fn population(&self) -> u64 {
        self.colors.iter().map(|&(_, count)| count as u64).sum()
    }

    /// (channel, range) of the widest channel
    fn widest_channel(&self) -> (usize, u8) {
        (0..3)
            .map(|channel| {
                let (min, max) = self.colors.iter().fold((u8::MAX, u8::MIN), |(lo, hi), (c, _)| {
                    (lo.min(c[channel]), hi.max(c[channel]))
                });
                (channel, max.saturating_sub(min))
            })
            .max_by_key(|&(_, range)| range)
            .unwrap_or((0, 0))
    }

    fn split_priority(&self) -> u64 {
        self.widest_channel().1 as u64 * self.population()
    }

    /// Split at the weighted median of the widest channel
    fn split(mut self) -> (ColorBox, ColorBox) {
        let (channel, _) = self.widest_channel();
        self.colors.sort_unstable_by_key(|(c, _)| c[channel]);

        let half = self.population() / 2;
        let mut running = 0u64;
        let mut cut = self.colors.len() / 2;
        for (i, &(_, count)) in self.colors.iter().enumerate() {
            running += count as u64;
            if running >= half {
                cut = i + 1;
                break;
            }
        }
        let cut = cut.clamp(1, self.colors.len() - 1);

        let upper = self.colors.split_off(cut);
        (self, ColorBox { colors: upper })
    }

    fn average(&self) -> [u8; 4] {
        let population = self.population().max(1);
        let mut sums = [0u64; 3];
        for &(color, count) in &self.colors {
            for channel in 0..3 {
                sums[channel] += color[channel] as u64 * count as u64;
            }
        }
        [
            (sums[0] / population) as u8,
            (sums[1] / population) as u8,
            (sums[2] / population) as u8,
            u8::MAX,
        ]
    }
}

fn median_cut(image: &RgbaImage, max_colors: usize) -> (Vec<[u8; 4]>, Vec<u8>) {
    let mut histogram: HashMap<[u8; 3], u32> = HashMap::new();
    for pixel in image.pixels() {
        *histogram.entry([pixel[0], pixel[1], pixel[2]]).or_insert(0) += 1;
    }

    let mut boxes = vec![ColorBox {
        colors: histogram.into_iter().collect(),
    }];

    while boxes.len() < max_colors {
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.colors.len() > 1)
            .max_by_key(|(_, b)| b.split_priority())
            .map(|(i, _)| i);
        let Some(index) = candidate else { break };

        let (lower, upper) = boxes.swap_remove(index).split();
        boxes.push(lower);
        boxes.push(upper);
    }

    let mut lookup: HashMap<[u8; 3], u8> = HashMap::new();
    let mut palette = Vec::with_capacity(boxes.len());
    for (index, color_box) in boxes.iter().enumerate() {
        for &(color, _) in &color_box.colors {
            lookup.insert(color, index as u8);
        }
        palette.push(color_box.average());
    }

    let indices = image
        .pixels()
        .map(|pixel| lookup.get(&[pixel[0], pixel[1], pixel[2]]).copied().unwrap_or(0))
        .collect();
    (palette, indices)
}

fn sort_by_alpha(palette: Vec<[u8; 4]>, indices: Vec<u8>) -> (Vec<[u8; 4]>, Vec<u8>) {
    let mut order: Vec<usize> = (0..palette.len()).collect();
    order.sort_by_key(|&i| (palette[i][3], palette[i]));

    let mut remap = vec![0u8; palette.len()];
    for (new_index, &old_index) in order.iter().enumerate() {
        remap[old_index] = new_index as u8;
    }

    let sorted = order.iter().map(|&i| palette[i]).collect();
    let indices = indices.into_iter().map(|i| remap[i as usize]).collect();
    (sorted, indices)
}
