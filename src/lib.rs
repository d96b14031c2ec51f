//! Automatic color balancing library
//!
//! This library shifts each RGB channel's mean toward a neutral gray target
//! and stretches the histogram so the result uses the full tonal range.
//!
//! # Overview
//!
//! The image is split into its red, green and blue channels. Each channel's
//! mean intensity is measured on a 0–100 scale, and a target is chosen: either
//! a user-supplied neutral gray or the mean of the luminance image
//!
//! ```text
//! Y = 0.2126 R + 0.7152 G + 0.0722 B
//! ```
//!
//! # Methods
//!
//! ## Gamma
//! A power law per channel that maps the channel mean onto the target:
//! ```text
//! gamma = log(mean / 100) / log(target / 100)
//! v'    = v ^ (1 / gamma)
//! ```
//!
//! ## Recolor
//! A diagonal color matrix that scales each channel linearly:
//! ```text
//! ratio = target / mean        (mean = 0 is replaced by 100)
//! [R' G' B'] = diag(ratio_r, ratio_g, ratio_b) · [R G B]
//! ```
//!
//! ## None
//! Leaves channel means alone; only the contrast stretch runs.
//!
//! # Contrast Stretch
//!
//! After correction, a percentile stretch maps the `clip_low` percentile to
//! black and the `100 - clip_high` percentile to white, either with one pair
//! of bounds shared by all channels ([`ClipMode::Together`]) or per channel
//! ([`ClipMode::Separate`]).
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use autocolor::{auto_color, ClipMode, Method, Options};
//!
//! let image = image::open("images/beach.jpg").unwrap();
//! let options = Options::new(Method::Recolor, ClipMode::Together, 0.5, None, None).unwrap();
//! let balanced = auto_color(&image, &options).unwrap();
//! balanced.save("balanced.png").unwrap();
//! ```
//!
//! # Value Ranges
//!
//! - Input images are converted to `Rgb32FImage` with values in [0, 1]
//! - Means, targets and clip percentages are on the 0–100 scale
//! - Output keeps the input's alpha channel and is 8-bit for 8-bit inputs,
//!   16-bit otherwise

pub mod options;
pub mod output;

pub use options::{ClipMode, DEFAULT_CLIP_LOW, Method, Options, parse_percent};
pub use output::{
    ScratchFiles, check_input, load_image, output_format, write_channel_extracts, write_image,
};

use image::{
    ColorType, DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, Rgb32FImage, RgbImage, Rgba,
    RgbaImage,
};
use imageproc::map::{blue_channel, green_channel, map_colors, red_channel};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

const EPSILON: f32 = 1e-6;

/// Smallest fraction allowed into a logarithm when deriving gamma exponents
const MIN_FRACTION: f32 = 1e-4;

/// Rec. 709 luma weights, applied to the encoded RGB values
pub const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Errors that can occur while balancing an image
#[derive(Debug, Error)]
pub enum AutocolorError {
    /// An option value was malformed or out of its domain
    #[error("invalid {option} '{value}': {reason}")]
    InvalidOption {
        option: &'static str,
        value: String,
        reason: String,
    },
    #[error("input file {} does not exist", .0.display())]
    MissingInput(PathBuf),
    #[error("input {} is not a regular file", .0.display())]
    NotAFile(PathBuf),
    #[error("input file {} is empty", .0.display())]
    EmptyInput(PathBuf),
    /// The output extension does not name a format that can be written
    #[error("cannot write {}: unknown or unsupported image format", .0.display())]
    UnsupportedOutput(PathBuf),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl AutocolorError {
    pub(crate) fn invalid_option(
        option: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        AutocolorError::InvalidOption {
            option,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for color balancing operations
pub type AutocolorResult<T> = Result<T, AutocolorError>;

/// A single-channel extract with values in [0, 1]
pub type ChannelImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Black and white points of a contrast stretch, in [0, 1]
pub type StretchBounds = (f32, f32);

/// Mean intensities on the 0–100 scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMeans {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub luminance: f32,
}

impl ChannelMeans {
    /// Measure the means of already separated channels
    pub fn from_channels(channels: &[ChannelImage; 3], luminance: &ChannelImage) -> Self {
        ChannelMeans {
            red: channel_mean(&channels[0]),
            green: channel_mean(&channels[1]),
            blue: channel_mean(&channels[2]),
            luminance: channel_mean(luminance),
        }
    }

    pub fn rgb(&self) -> [f32; 3] {
        [self.red, self.green, self.blue]
    }
}

/// The correction that was applied, with its per-channel factors
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Gamma exponents for R, G, B
    Gamma([f32; 3]),
    /// Linear ratios for R, G, B
    Recolor([f32; 3]),
    None,
}

/// Output from color balancing with the statistics that drove it
///
/// `image` holds the balanced result in [0, 1]; use [`auto_color`] for a
/// `DynamicImage` in the input's bit depth.
#[derive(Debug, Clone)]
pub struct AutocolorOutput {
    pub image: Rgb32FImage,
    /// Means of the input image
    pub means: ChannelMeans,
    /// Neutral gray target on the 0–100 scale
    pub target: f32,
    pub correction: Correction,
    /// Stretch bounds per channel; `None` where the channel had no usable range
    pub bounds: [Option<StretchBounds>; 3],
}

/// Balance an image and return the result in the input's bit depth
///
/// 8-bit inputs produce 8-bit RGB(A) output, everything else produces 16-bit.
/// An alpha channel is carried over untouched.
///
/// # Errors
///
/// Returns [`AutocolorError::InvalidOption`] if `options` holds a percentage
/// outside `[0, 100]`.
pub fn auto_color(image: &DynamicImage, options: &Options) -> AutocolorResult<DynamicImage> {
    let output = auto_color_full(image, options)?;
    Ok(restore_layout(&output.image, image))
}

/// Balance an image, returning the float result together with the statistics
///
/// # Errors
///
/// Returns [`AutocolorError::InvalidOption`] if `options` holds a percentage
/// outside `[0, 100]`.
///
/// # Example
///
/// ```rust,no_run
/// use autocolor::{auto_color_full, Options};
///
/// let image = image::open("images/beach.jpg").unwrap();
/// let output = auto_color_full(&image, &Options::default()).unwrap();
/// println!("target gray {:.2}", output.target);
/// ```
pub fn auto_color_full(image: &DynamicImage, options: &Options) -> AutocolorResult<AutocolorOutput> {
    options.validate()?;

    let rgb = image.to_rgb32f();
    let mut channels = split_channels(&rgb);
    let means = ChannelMeans::from_channels(&channels, &luminance(&rgb));
    let target = neutral_gray_target(options, &means);
    debug!(
        red = means.red,
        green = means.green,
        blue = means.blue,
        luminance = means.luminance,
        "channel means"
    );
    info!(neutral_gray = target, method = %options.method, "balancing channels");

    let correction = match options.method {
        Method::Gamma => {
            let exponents = gamma_exponents(means.rgb(), target);
            apply_gamma_channels(&mut channels, exponents);
            Correction::Gamma(exponents)
        }
        Method::Recolor => {
            let ratios = recolor_ratios(means.rgb(), target);
            let recolored = apply_color_matrix(&rgb, &diagonal_matrix(ratios));
            channels = split_channels(&recolored);
            Correction::Recolor(ratios)
        }
        Method::None => Correction::None,
    };
    debug!(?correction, "correction factors");

    let bounds = match options.clip_mode {
        ClipMode::Separate => {
            stretch_channels_separate(&mut channels, options.clip_low, options.clip_high)
        }
        ClipMode::Together => {
            let shared =
                stretch_channels_together(&mut channels, options.clip_low, options.clip_high);
            [shared; 3]
        }
    };
    debug!(?bounds, clip_mode = %options.clip_mode, "contrast stretch");

    Ok(AutocolorOutput {
        image: merge_channels(&channels),
        means,
        target,
        correction,
        bounds,
    })
}

/// Convert a float result back to the bit depth and alpha layout of `source`
///
/// 8-bit sources give `Rgb8`/`Rgba8`, all others `Rgb16`/`Rgba16`. Alpha is
/// copied from `source` unchanged.
pub fn restore_layout(rgb: &Rgb32FImage, source: &DynamicImage) -> DynamicImage {
    let eight_bit = matches!(
        source.color(),
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8
    );
    let alpha = source.color().has_alpha().then(|| alpha_channel(source));
    let (width, height) = rgb.dimensions();

    match (eight_bit, alpha) {
        (true, None) => DynamicImage::ImageRgb8(float_to_rgb8(rgb)),
        (true, Some(alpha)) => DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            let [r, g, b] = rgb.get_pixel(x, y).0;
            Rgba([r, g, b, alpha.get_pixel(x, y)[0]].map(to_u8))
        })),
        (false, None) => DynamicImage::ImageRgb16(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb(rgb.get_pixel(x, y).0.map(to_u16))
        })),
        (false, Some(alpha)) => {
            DynamicImage::ImageRgba16(ImageBuffer::from_fn(width, height, |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Rgba([r, g, b, alpha.get_pixel(x, y)[0]].map(to_u16))
            }))
        }
    }
}

/// Separate an image into its red, green and blue extracts
pub fn split_channels(image: &Rgb32FImage) -> [ChannelImage; 3] {
    [red_channel(image), green_channel(image), blue_channel(image)]
}

/// Recombine three channel extracts of equal size into an RGB image
pub fn merge_channels(channels: &[ChannelImage; 3]) -> Rgb32FImage {
    let (width, height) = channels[0].dimensions();
    Rgb32FImage::from_fn(width, height, |x, y| {
        Rgb([
            channels[0].get_pixel(x, y)[0],
            channels[1].get_pixel(x, y)[0],
            channels[2].get_pixel(x, y)[0],
        ])
    })
}

/// Rec. 709 luminance of the encoded RGB values
pub fn luminance(image: &Rgb32FImage) -> ChannelImage {
    map_colors(image, |p| {
        Luma([LUMA_WEIGHTS[0] * p[0] + LUMA_WEIGHTS[1] * p[1] + LUMA_WEIGHTS[2] * p[2]])
    })
}

/// Mean intensity of a channel on the 0–100 scale
///
/// An empty image has mean 0.
pub fn channel_mean(channel: &ChannelImage) -> f32 {
    let samples = channel.as_raw();
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f64 = samples.iter().map(|&v| f64::from(v)).sum();
    (sum / samples.len() as f64 * 100.0) as f32
}

/// The user's neutral gray if set, otherwise the luminance mean
pub fn neutral_gray_target(options: &Options, means: &ChannelMeans) -> f32 {
    options.neutral_gray.unwrap_or(means.luminance)
}

/// Gamma exponent that maps a channel mean onto the target
///
/// Both values are on the 0–100 scale. They are kept a small distance away
/// from 0 and 100 so that both logarithms are finite and negative, which
/// keeps the exponent finite and positive.
pub fn gamma_exponent(mean: f32, target: f32) -> f32 {
    let mean = (mean / 100.0).clamp(MIN_FRACTION, 1.0 - MIN_FRACTION);
    let target = (target / 100.0).clamp(MIN_FRACTION, 1.0 - MIN_FRACTION);
    mean.ln() / target.ln()
}

pub fn gamma_exponents(means: [f32; 3], target: f32) -> [f32; 3] {
    means.map(|mean| gamma_exponent(mean, target))
}

/// Linear ratio that scales a channel mean onto the target
///
/// A zero mean is replaced by 100.
pub fn recolor_ratio(mean: f32, target: f32) -> f32 {
    let mean = if mean > 0.0 { mean } else { 100.0 };
    target / mean
}

pub fn recolor_ratios(means: [f32; 3], target: f32) -> [f32; 3] {
    means.map(|mean| recolor_ratio(mean, target))
}

/// 3×3 matrix with `ratios` on the diagonal
pub fn diagonal_matrix(ratios: [f32; 3]) -> [[f32; 3]; 3] {
    [
        [ratios[0], 0.0, 0.0],
        [0.0, ratios[1], 0.0],
        [0.0, 0.0, ratios[2]],
    ]
}

/// Apply `v' = v^(1/gamma)` to a channel
pub fn apply_gamma(channel: &ChannelImage, gamma: f32) -> ChannelImage {
    let inverse = 1.0 / gamma.max(EPSILON);
    map_colors(channel, |p| Luma([p[0].max(0.0).powf(inverse)]))
}

/// Multiply every pixel by a 3×3 color matrix, clamping the result to [0, 1]
pub fn apply_color_matrix(image: &Rgb32FImage, matrix: &[[f32; 3]; 3]) -> Rgb32FImage {
    map_colors(image, |p| {
        Rgb(matrix.map(|row| (row[0] * p[0] + row[1] * p[1] + row[2] * p[2]).clamp(0.0, 1.0)))
    })
}

/// Percentile bounds of a contrast stretch
///
/// Returns the sample at the `clip_low` percentile and the sample at the
/// `100 - clip_high` percentile. With both percentages at zero these are the
/// minimum and maximum. Returns `None` if there are no samples or the bounds
/// collapse onto each other.
pub fn stretch_bounds(
    mut samples: Vec<f32>,
    clip_low: f32,
    clip_high: f32,
) -> Option<StretchBounds> {
    if samples.is_empty() {
        return None;
    }

    #[cfg(feature = "rayon")]
    {
        samples.par_sort_unstable_by(f32::total_cmp);
    }
    #[cfg(not(feature = "rayon"))]
    {
        samples.sort_unstable_by(f32::total_cmp);
    }

    let n = samples.len();
    let low_idx = ((n as f64 * f64::from(clip_low) / 100.0) as usize).min(n - 1);
    let high_clipped = (n as f64 * f64::from(clip_high) / 100.0) as usize;
    let high_idx = (n - 1).saturating_sub(high_clipped);

    let low_val = samples[low_idx];
    let high_val = samples[high_idx];
    if high_val - low_val < EPSILON {
        None
    } else {
        Some((low_val, high_val))
    }
}

/// Linearly map `bounds` onto [0, 1], clipping everything outside
pub fn stretch_channel(channel: &mut ChannelImage, bounds: StretchBounds) {
    let (low_val, high_val) = bounds;
    let range = (high_val - low_val).max(EPSILON);
    for value in channel.iter_mut() {
        *value = ((*value - low_val) / range).clamp(0.0, 1.0);
    }
}

/// Contrast stretch of a whole RGB image
///
/// [`ClipMode::Together`] uses one pair of bounds for all channels,
/// [`ClipMode::Separate`] computes them per channel.
pub fn contrast_stretch(
    image: &Rgb32FImage,
    clip_low: f32,
    clip_high: f32,
    mode: ClipMode,
) -> Rgb32FImage {
    let mut channels = split_channels(image);
    match mode {
        ClipMode::Together => {
            stretch_channels_together(&mut channels, clip_low, clip_high);
        }
        ClipMode::Separate => {
            stretch_channels_separate(&mut channels, clip_low, clip_high);
        }
    }
    merge_channels(&channels)
}

// Internal helper functions

fn apply_gamma_channels(channels: &mut [ChannelImage; 3], exponents: [f32; 3]) {
    #[cfg(feature = "rayon")]
    {
        channels
            .par_iter_mut()
            .zip(exponents.par_iter())
            .for_each(|(channel, &gamma)| *channel = apply_gamma(channel, gamma));
    }

    #[cfg(not(feature = "rayon"))]
    {
        for (channel, &gamma) in channels.iter_mut().zip(exponents.iter()) {
            *channel = apply_gamma(channel, gamma);
        }
    }
}

fn stretch_one(channel: &mut ChannelImage, clip_low: f32, clip_high: f32) -> Option<StretchBounds> {
    let bounds = stretch_bounds(channel.as_raw().clone(), clip_low, clip_high)?;
    stretch_channel(channel, bounds);
    Some(bounds)
}

fn stretch_channels_separate(
    channels: &mut [ChannelImage; 3],
    clip_low: f32,
    clip_high: f32,
) -> [Option<StretchBounds>; 3] {
    #[cfg(feature = "rayon")]
    let bounds: Vec<_> = channels
        .par_iter_mut()
        .map(|channel| stretch_one(channel, clip_low, clip_high))
        .collect();

    #[cfg(not(feature = "rayon"))]
    let bounds: Vec<_> = channels
        .iter_mut()
        .map(|channel| stretch_one(channel, clip_low, clip_high))
        .collect();

    [bounds[0], bounds[1], bounds[2]]
}

fn stretch_channels_together(
    channels: &mut [ChannelImage; 3],
    clip_low: f32,
    clip_high: f32,
) -> Option<StretchBounds> {
    let pooled: Vec<f32> = channels
        .iter()
        .flat_map(|channel| channel.as_raw().iter().copied())
        .collect();
    let bounds = stretch_bounds(pooled, clip_low, clip_high)?;

    #[cfg(feature = "rayon")]
    {
        channels
            .par_iter_mut()
            .for_each(|channel| stretch_channel(channel, bounds));
    }

    #[cfg(not(feature = "rayon"))]
    {
        for channel in channels.iter_mut() {
            stretch_channel(channel, bounds);
        }
    }

    Some(bounds)
}

fn alpha_channel(image: &DynamicImage) -> ChannelImage {
    map_colors(&image.to_rgba32f(), |p| Luma([p[3]]))
}

fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

fn to_u16(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * 65535.0 + 0.5) as u16
}

fn float_to_rgb8(image: &Rgb32FImage) -> RgbImage {
    let (width, height) = image.dimensions();
    RgbImage::from_fn(width, height, |x, y| Rgb(image.get_pixel(x, y).0.map(to_u8)))
}

pub(crate) fn channel_to_gray8(channel: &ChannelImage) -> GrayImage {
    let (width, height) = channel.dimensions();
    GrayImage::from_fn(width, height, |x, y| Luma([to_u8(channel.get_pixel(x, y)[0])]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::GenericImageView;

    /// A 16×16 image whose channels ramp at different rates, with a warm cast
    pub(crate) fn color_cast_image() -> DynamicImage {
        let image = RgbImage::from_fn(16, 16, |x, y| {
            let t = (y * 16 + x) as f32 / 255.0;
            Rgb([
                (40.0 + 180.0 * t) as u8,
                (30.0 + 120.0 * t) as u8,
                (10.0 + 80.0 * t) as u8,
            ])
        });
        DynamicImage::ImageRgb8(image)
    }

    fn constant_channel(value: f32) -> ChannelImage {
        ChannelImage::from_pixel(8, 8, Luma([value]))
    }

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32 / (n - 1) as f32).collect()
    }

    fn min_max(samples: &[f32]) -> (f32, f32) {
        samples
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    #[test]
    fn test_channel_mean_scale() {
        assert!((channel_mean(&constant_channel(0.5)) - 50.0).abs() < 1e-4);
        assert_eq!(channel_mean(&ChannelImage::new(0, 0)), 0.0);
    }

    #[test]
    fn test_split_merge_preserves_pixels() {
        let rgb = color_cast_image().to_rgb32f();
        let merged = merge_channels(&split_channels(&rgb));
        assert_eq!(merged, rgb);
    }

    #[test]
    fn test_luminance_of_gray_is_gray() {
        let rgb = Rgb32FImage::from_pixel(4, 4, Rgb([0.4, 0.4, 0.4]));
        let luma = luminance(&rgb);
        for pixel in luma.pixels() {
            assert!((pixel[0] - 0.4).abs() < 1e-5);
        }
    }

    #[test]
    fn test_gamma_maps_mean_onto_target() {
        let channel = constant_channel(0.3);
        let gamma = gamma_exponent(channel_mean(&channel), 50.0);
        let corrected = apply_gamma(&channel, gamma);
        assert!((channel_mean(&corrected) - 50.0).abs() < 1e-2);
    }

    #[test]
    fn test_gamma_exponent_is_finite_at_extremes() {
        for (mean, target) in [(0.0, 50.0), (100.0, 50.0), (40.0, 0.0), (40.0, 100.0)] {
            let gamma = gamma_exponent(mean, target);
            assert!(gamma.is_finite() && gamma > 0.0, "{mean} {target} -> {gamma}");
        }
    }

    #[test]
    fn test_recolor_ratio_guards_zero_mean() {
        assert_eq!(recolor_ratio(0.0, 40.0), 0.4);
        assert_eq!(recolor_ratio(20.0, 40.0), 2.0);
    }

    #[test]
    fn test_recolor_matches_target_mean() {
        let image = color_cast_image();
        let options = Options {
            method: Method::Recolor,
            clip_mode: ClipMode::Together,
            clip_low: 0.0,
            clip_high: 0.0,
            neutral_gray: Some(30.0),
        };
        let means = ChannelMeans::from_channels(
            &split_channels(&image.to_rgb32f()),
            &luminance(&image.to_rgb32f()),
        );
        let ratios = recolor_ratios(means.rgb(), 30.0);
        let recolored = apply_color_matrix(&image.to_rgb32f(), &diagonal_matrix(ratios));

        for channel in split_channels(&recolored) {
            assert!((channel_mean(&channel) - 30.0).abs() < 0.05);
        }

        let output = auto_color_full(&image, &options).unwrap();
        assert_eq!(output.correction, Correction::Recolor(ratios));
        assert_eq!(output.target, 30.0);
    }

    #[test]
    fn test_stretch_bounds_percentiles() {
        let bounds = stretch_bounds(ramp(100), 10.0, 10.0).unwrap();
        assert!((bounds.0 - 10.0 / 99.0).abs() < 1e-6);
        assert!((bounds.1 - 89.0 / 99.0).abs() < 1e-6);

        let bounds = stretch_bounds(ramp(100), 0.0, 0.0).unwrap();
        assert_eq!(bounds, (0.0, 1.0));
    }

    #[test]
    fn test_stretch_bounds_collapse() {
        assert_eq!(stretch_bounds(vec![0.5; 50], 0.0, 0.0), None);
        assert_eq!(stretch_bounds(ramp(100), 60.0, 60.0), None);
        assert_eq!(stretch_bounds(Vec::new(), 0.0, 0.0), None);
    }

    #[test]
    fn test_together_stretch_spans_full_range() {
        let image = color_cast_image();
        for (clip_low, clip_high) in [(0.0, 0.0), (1.0, 1.0), (5.0, 0.5), (0.0, 20.0)] {
            let options = Options {
                method: Method::Gamma,
                clip_low,
                clip_high,
                ..Options::default()
            };
            let output = auto_color_full(&image, &options).unwrap();
            let (lo, hi) = min_max(output.image.as_raw());
            assert!(lo.abs() < 1e-6, "{clip_low},{clip_high}: min {lo}");
            assert!((hi - 1.0).abs() < 1e-6, "{clip_low},{clip_high}: max {hi}");
        }
    }

    #[test]
    fn test_separate_stretch_spans_each_channel() {
        let image = color_cast_image();
        let options = Options {
            method: Method::None,
            clip_mode: ClipMode::Separate,
            clip_low: 0.5,
            clip_high: 0.5,
            neutral_gray: None,
        };
        let output = auto_color_full(&image, &options).unwrap();
        for channel in split_channels(&output.image) {
            let (lo, hi) = min_max(channel.as_raw());
            assert!(lo.abs() < 1e-6);
            assert!((hi - 1.0).abs() < 1e-6);
        }
        assert!(output.bounds.iter().all(Option::is_some));
    }

    #[test]
    fn test_none_together_is_pure_contrast_stretch() {
        let image = color_cast_image();
        let options = Options {
            method: Method::None,
            clip_mode: ClipMode::Together,
            clip_low: 2.0,
            clip_high: 3.0,
            neutral_gray: None,
        };
        let output = auto_color_full(&image, &options).unwrap();
        let expected = contrast_stretch(&image.to_rgb32f(), 2.0, 3.0, ClipMode::Together);
        assert_eq!(output.image, expected);
        assert_eq!(output.correction, Correction::None);

        // one shared transfer curve: gray stays gray
        let gray = Rgb32FImage::from_fn(8, 8, |x, _| {
            let v = x as f32 / 7.0;
            Rgb([v, v, v])
        });
        let stretched = contrast_stretch(&gray, 10.0, 10.0, ClipMode::Together);
        for pixel in stretched.pixels() {
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
        }
    }

    #[test]
    fn test_gamma_method_neutralizes_cast() {
        let image = color_cast_image();
        let options = Options {
            method: Method::Gamma,
            clip_low: 0.0,
            clip_high: 0.0,
            ..Options::default()
        };
        let output = auto_color_full(&image, &options).unwrap();
        let Correction::Gamma(exponents) = output.correction else {
            panic!("expected gamma correction, got {:?}", output.correction);
        };
        // red is brighter than the target, blue darker
        assert!(exponents[0] < 1.0);
        assert!(exponents[2] > 1.0);

        let spread = |means: [f32; 3]| {
            let (lo, hi) = min_max(&means);
            hi - lo
        };
        let after = ChannelMeans::from_channels(
            &split_channels(&output.image),
            &luminance(&output.image),
        );
        assert!(spread(after.rgb()) < spread(output.means.rgb()));
    }

    #[test]
    fn test_default_target_is_luminance_mean() {
        let image = color_cast_image();
        let output = auto_color_full(&image, &Options::default()).unwrap();
        assert_eq!(output.target, output.means.luminance);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let image = color_cast_image();
        let options = Options {
            clip_low: 150.0,
            ..Options::default()
        };
        let result = auto_color(&image, &options);
        assert!(matches!(
            result,
            Err(AutocolorError::InvalidOption { option: "cliplow", .. })
        ));
    }

    #[test]
    fn test_output_is_reproducible() {
        let image = color_cast_image();
        let options = Options {
            method: Method::Recolor,
            clip_mode: ClipMode::Separate,
            ..Options::default()
        };
        let first = auto_color(&image, &options).unwrap();
        let second = auto_color(&image, &options).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_output_keeps_depth_and_alpha() {
        let image = color_cast_image();
        let output = auto_color(&image, &Options::default()).unwrap();
        assert_eq!(output.color(), ColorType::Rgb8);
        assert_eq!(output.dimensions(), image.dimensions());

        let sixteen = DynamicImage::ImageRgb16(image.to_rgb16());
        let output = auto_color(&sixteen, &Options::default()).unwrap();
        assert_eq!(output.color(), ColorType::Rgb16);

        let mut rgba = image.to_rgba8();
        for (i, pixel) in rgba.pixels_mut().enumerate() {
            pixel[3] = (i % 256) as u8;
        }
        let output = auto_color(&DynamicImage::ImageRgba8(rgba.clone()), &Options::default())
            .unwrap()
            .to_rgba8();
        for (before, after) in rgba.pixels().zip(output.pixels()) {
            assert_eq!(before[3], after[3]);
        }
    }
}
