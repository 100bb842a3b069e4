use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

/// Arithmetic mean and population variance of all samples
pub fn mean_and_variance(samples: &[u8]) -> Option<(f64, f64)> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|&s| {
            let d = s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some((mean, variance))
}

/// tan(22.5°), splits gradient directions into horizontal, vertical and
/// the two diagonals
const TAN_22_5: f32 = 0.414_213_56;

/// Detect edges using Canny on the unsmoothed image.
///
/// Gradients come from 3x3 Sobel filters and the magnitude is
/// `|gx| + |gy|`. A pixel survives non-maximum suppression when it beats
/// its neighbours across the edge; survivors above `high_threshold` seed
/// edges that grow through 8-connected survivors above `low_threshold`.
/// Edge pixels are 255, everything else 0.
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut edges = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return edges;
    }

    let gx = horizontal_sobel(img);
    let gy = vertical_sobel(img);
    let (w, h) = (width as i64, height as i64);
    let magnitude: Vec<f32> = gx
        .as_raw()
        .iter()
        .zip(gy.as_raw())
        .map(|(&dx, &dy)| (dx as f32).abs() + (dy as f32).abs())
        .collect();
    // Outside the image the magnitude is zero.
    let mag = |x: i64, y: i64| -> f32 {
        if x < 0 || y < 0 || x >= w || y >= h {
            0.0
        } else {
            magnitude[(y * w + x) as usize]
        }
    };

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        None,
        Weak,
        Strong,
    }

    let mut marks = vec![Mark::None; magnitude.len()];
    let mut stack = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) as usize;
            let m = magnitude[i];
            if m <= low_threshold {
                continue;
            }
            let dx = gx.as_raw()[i] as f32;
            let dy = gy.as_raw()[i] as f32;
            let (ax, ay) = (dx.abs(), dy.abs());
            let tg22 = ax * TAN_22_5;

            let is_max = if ay < tg22 {
                m > mag(x - 1, y) && m >= mag(x + 1, y)
            } else if ay > tg22 + 2.0 * ax {
                m > mag(x, y - 1) && m >= mag(x, y + 1)
            } else {
                let s = if (dx < 0.0) != (dy < 0.0) { -1 } else { 1 };
                m > mag(x - s, y - 1) && m > mag(x + s, y + 1)
            };
            if !is_max {
                continue;
            }

            if m > high_threshold {
                marks[i] = Mark::Strong;
                stack.push((x, y));
            } else {
                marks[i] = Mark::Weak;
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        for ny in (y - 1)..=(y + 1) {
            for nx in (x - 1)..=(x + 1) {
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let j = (ny * w + nx) as usize;
                if marks[j] == Mark::Weak {
                    marks[j] = Mark::Strong;
                    stack.push((nx, ny));
                }
            }
        }
    }

    for (pixel, mark) in edges.pixels_mut().zip(&marks) {
        if *mark == Mark::Strong {
            *pixel = Luma([255]);
        }
    }
    edges
}

/// Fraction of non-zero pixels
pub fn foreground_ratio(img: &GrayImage) -> Option<f64> {
    let total = img.as_raw().len();
    if total == 0 {
        return None;
    }
    let on = img.as_raw().iter().filter(|&&p| p > 0).count();
    Some(on as f64 / total as f64)
}

/// Fraction of pixels strictly above the Otsu level
pub fn otsu_foreground_ratio(img: &GrayImage) -> Option<f64> {
    let total = img.as_raw().len();
    if total == 0 {
        return None;
    }
    let level = otsu_level(img);
    let above = img.as_raw().iter().filter(|&&p| p > level).count();
    Some(above as f64 / total as f64)
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `tiles x tiles` grid. When the size is not a
/// whole number of tiles, the bottom and right are extended by mirroring
/// (edge pixel not repeated) so every tile has the same size. Each tile
/// gets a clipped equalization table and every pixel is bilinearly
/// blended between the four nearest tables.
pub fn clahe(img: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 || tiles == 0 {
        return img.clone();
    }

    let (ext_w, ext_h) = if width % tiles == 0 && height % tiles == 0 {
        (width, height)
    } else {
        (width + tiles - width % tiles, height + tiles - height % tiles)
    };
    let tile_w = ext_w / tiles;
    let tile_h = ext_h / tiles;
    let area = (tile_w * tile_h) as usize;

    let mut luts = Vec::with_capacity((tiles * tiles) as usize);
    for ty in 0..tiles {
        for tx in 0..tiles {
            let mut hist = [0usize; 256];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let sy = reflect_101(y, height);
                for x in tx * tile_w..(tx + 1) * tile_w {
                    hist[img.get_pixel(reflect_101(x, width), sy)[0] as usize] += 1;
                }
            }
            luts.push(clipped_equalization(&mut hist, area, clip_limit));
        }
    }

    let neighbours = |pos: u32, tile: u32| {
        let f = pos as f32 / tile as f32 - 0.5;
        let lo = f.floor();
        let frac = f - lo;
        let lo = lo as i64;
        let a = lo.max(0) as usize;
        let b = (lo + 1).min(tiles as i64 - 1) as usize;
        (a, b, frac)
    };

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let (ty1, ty2, ya) = neighbours(y, tile_h);
        for x in 0..width {
            let (tx1, tx2, xa) = neighbours(x, tile_w);
            let v = img.get_pixel(x, y)[0] as usize;
            let lut = |ty: usize, tx: usize| luts[ty * tiles as usize + tx][v] as f32;

            let top = lut(ty1, tx1) * (1.0 - xa) + lut(ty1, tx2) * xa;
            let bottom = lut(ty2, tx1) * (1.0 - xa) + lut(ty2, tx2) * xa;
            let blended = top * (1.0 - ya) + bottom * ya;
            out.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Mirror an index past the end of `0..len` back inside, without
/// repeating the edge: `.. c b | a b c | b a ..`
fn reflect_101(i: u32, len: u32) -> u32 {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let i = i % period;
    if i < len { i } else { period - i }
}

fn clipped_equalization(hist: &mut [usize; 256], area: usize, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as usize).max(1);
        let mut clipped = 0usize;
        for bin in hist.iter_mut() {
            if *bin > limit {
                clipped += *bin - limit;
                *bin = limit;
            }
        }

        let batch = clipped / 256;
        let mut residual = clipped - batch * 256;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (256 / residual).max(1);
            let mut i = 0;
            while i < 256 && residual > 0 {
                hist[i] += 1;
                residual -= 1;
                i += step;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut cumulative = 0usize;
    for (i, &count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Histogram of rotation-invariant uniform local binary patterns.
///
/// `points` neighbours are sampled on a circle of `radius` with bilinear
/// interpolation (zero outside the image). A pattern with at most two
/// bit transitions scores its number of set bits, anything else scores
/// `points + 1`. Codes `0..=bins` are counted into `bins` equal-width bins
/// over `[0, bins]`, the last bin closed on both ends, and normalised.
/// `None` when no code lands in range.
pub fn uniform_lbp_histogram(
    img: &GrayImage,
    points: usize,
    radius: f64,
    bins: usize,
) -> Option<Vec<f64>> {
    let (width, height) = img.dimensions();
    let offsets: Vec<(f64, f64)> = (0..points)
        .map(|p| {
            let angle = 2.0 * std::f64::consts::PI * p as f64 / points as f64;
            let round5 = |v: f64| (v * 1e5).round() / 1e5;
            (round5(-radius * angle.sin()), round5(radius * angle.cos()))
        })
        .collect();

    let sample = |r: i64, c: i64| -> f64 {
        if r < 0 || c < 0 || r >= height as i64 || c >= width as i64 {
            0.0
        } else {
            img.get_pixel(c as u32, r as u32)[0] as f64
        }
    };

    let mut hist = vec![0usize; bins];
    let mut bits = vec![false; points];
    for row in 0..height as i64 {
        for col in 0..width as i64 {
            let center = sample(row, col);
            for (bit, &(dr, dc)) in bits.iter_mut().zip(&offsets) {
                let r = row as f64 + dr;
                let c = col as f64 + dc;
                let (r0, c0) = (r.floor(), c.floor());
                let (r1, c1) = (r.ceil(), c.ceil());
                let (fr, fc) = (r - r0, c - c0);
                let top = (1.0 - fc) * sample(r0 as i64, c0 as i64) + fc * sample(r0 as i64, c1 as i64);
                let bottom = (1.0 - fc) * sample(r1 as i64, c0 as i64) + fc * sample(r1 as i64, c1 as i64);
                *bit = (1.0 - fr) * top + fr * bottom - center >= 0.0;
            }

            if let Some(bin) = histogram_bin(uniform_pattern(&bits), bins) {
                hist[bin] += 1;
            }
        }
    }

    let total: usize = hist.iter().sum();
    if total == 0 {
        return None;
    }
    Some(hist.into_iter().map(|c| c as f64 / total as f64).collect())
}

/// Set-bit count for patterns with at most two transitions (not counting
/// the wrap from last to first), `bits.len() + 1` otherwise
fn uniform_pattern(bits: &[bool]) -> usize {
    let transitions = bits.windows(2).filter(|w| w[0] != w[1]).count();
    if transitions <= 2 {
        bits.iter().filter(|&&b| b).count()
    } else {
        bits.len() + 1
    }
}

/// Unit-width bins over `[0, bins]`; code `bins` joins the last bin
fn histogram_bin(code: usize, bins: usize) -> Option<usize> {
    match code {
        c if c < bins => Some(c),
        c if c == bins && bins > 0 => Some(bins - 1),
        _ => None,
    }
}
