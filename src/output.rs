//! Reading the input image and writing results
//!
//! The result is encoded into a uniquely named scratch file next to the
//! output path and renamed onto it once encoding succeeded. Scratch files are
//! tracked in a [`ScratchFiles`] registry so a termination signal can remove
//! them before the process exits.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageFormat, ImageReader, Rgb32FImage};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{AutocolorError, AutocolorResult, channel_to_gray8, luminance, split_channels};

const SCRATCH_PREFIX: &str = ".autocolor-";

/// Registry of scratch files that must not outlive the process
#[derive(Debug, Clone, Default)]
pub struct ScratchFiles {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScratchFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all registered files and exit with status 1 on SIGINT, SIGTERM
    /// or SIGHUP
    ///
    /// Only one handler can be installed per process.
    pub fn install_signal_handler(&self) -> AutocolorResult<()> {
        let scratch = self.clone();
        ctrlc::set_handler(move || {
            scratch.remove_all();
            std::process::exit(1);
        })?;
        Ok(())
    }

    /// Delete every registered file that still exists
    pub fn remove_all(&self) {
        let mut paths = self.lock();
        for path in paths.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed scratch file"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(path = %path.display(), %err, "cannot remove scratch file"),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Create a scratch file in `dir`, registered before the registry lock is
    /// released
    fn create_in(&self, builder: &tempfile::Builder<'_, '_>, dir: &Path) -> io::Result<NamedTempFile> {
        let mut paths = self.lock();
        let file = builder.tempfile_in(dir)?;
        paths.push(file.path().to_path_buf());
        Ok(file)
    }

    #[cfg(test)]
    fn register(&self, path: &Path) {
        self.lock().push(path.to_path_buf());
    }

    fn release(&self, path: &Path) {
        self.lock().retain(|registered| registered != path);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
        self.paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Check that the input exists, is a regular file and is not empty
///
/// # Errors
///
/// - [`AutocolorError::MissingInput`] if nothing exists at `path`
/// - [`AutocolorError::NotAFile`] for directories and other non-files
/// - [`AutocolorError::EmptyInput`] for zero-length files
pub fn check_input(path: &Path) -> AutocolorResult<()> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(AutocolorError::MissingInput(path.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };

    if !metadata.is_file() {
        return Err(AutocolorError::NotAFile(path.to_path_buf()));
    }
    if metadata.len() == 0 {
        return Err(AutocolorError::EmptyInput(path.to_path_buf()));
    }
    Ok(())
}

/// Check and decode the input image, guessing the format from its content
pub fn load_image(path: &Path) -> AutocolorResult<DynamicImage> {
    check_input(path)?;
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "decoded input"
    );
    Ok(image)
}

/// Output format implied by the file extension
///
/// # Errors
///
/// Returns [`AutocolorError::UnsupportedOutput`] if the extension is missing,
/// unknown, or names a format without encoder support.
pub fn output_format(path: &Path) -> AutocolorResult<ImageFormat> {
    match ImageFormat::from_path(path) {
        Ok(format) if format.writing_enabled() => Ok(format),
        _ => Err(AutocolorError::UnsupportedOutput(path.to_path_buf())),
    }
}

/// Write `image` to `path` through a scratch file that is renamed into place
///
/// The scratch file is registered with `scratch` while it exists. On any
/// error it is removed and `path` is left untouched.
pub fn write_image(image: &DynamicImage, path: &Path, scratch: &ScratchFiles) -> AutocolorResult<()> {
    let format = output_format(path)?;
    let image = fit_to_format(image, format);

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let suffix = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX).suffix(&suffix);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o644));
    }
    let mut scratch_file = scratch.create_in(&builder, dir)?;
    let scratch_path = scratch_file.path().to_path_buf();

    let result = match encode(&image, format, scratch_file.as_file_mut()) {
        Ok(()) => scratch_file
            .persist(path)
            .map(|_| ())
            .map_err(|err| AutocolorError::from(err.error)),
        Err(err) => {
            drop(scratch_file);
            Err(err)
        }
    };
    scratch.release(&scratch_path);

    if result.is_ok() {
        debug!(path = %path.display(), ?format, "wrote output");
    }
    result
}

/// Save the red, green, blue and luminance extracts of `image` as PNG files
///
/// Returns the written paths in that order.
pub fn write_channel_extracts(image: &Rgb32FImage, dir: &Path) -> AutocolorResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let [red, green, blue] = split_channels(image);
    let extracts = [
        ("red", red),
        ("green", green),
        ("blue", blue),
        ("luminance", luminance(image)),
    ];

    let mut written = Vec::with_capacity(extracts.len());
    for (name, channel) in extracts {
        let path = dir.join(format!("{name}.png"));
        channel_to_gray8(&channel).save(&path)?;
        debug!(path = %path.display(), "wrote channel extract");
        written.push(path);
    }
    Ok(written)
}

fn encode(image: &DynamicImage, format: ImageFormat, file: &mut File) -> AutocolorResult<()> {
    let mut writer = BufWriter::new(file);
    image.write_to(&mut writer, format)?;
    writer.flush()?;
    Ok(())
}

/// Convert to a pixel layout the target format's encoder accepts
///
/// OpenEXR and Radiance HDR only take float pixels and Farbfeld only takes
/// 16-bit RGBA. Everything else except PNG and TIFF is written as 8-bit.
fn fit_to_format(image: &DynamicImage, format: ImageFormat) -> DynamicImage {
    match format {
        ImageFormat::Png | ImageFormat::Tiff => image.clone(),
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        ImageFormat::OpenExr if image.color().has_alpha() => {
            DynamicImage::ImageRgba32F(image.to_rgba32f())
        }
        ImageFormat::OpenExr | ImageFormat::Hdr => DynamicImage::ImageRgb32F(image.to_rgb32f()),
        ImageFormat::Farbfeld => DynamicImage::ImageRgba16(image.to_rgba16()),
        _ if image.color().has_alpha() => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}
