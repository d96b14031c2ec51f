use autocolor::{
    AutocolorResult, ClipMode, Method, Options, ScratchFiles, auto_color_full, load_image,
    output_format, parse_percent, restore_layout, write_channel_extracts, write_image,
};
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "autocolor", version, disable_help_flag = true)]
#[command(
    about = "Balance colors by moving each channel mean toward neutral gray and stretching the histogram",
    long_about = None
)]
struct Cli {
    #[arg(help = "Input image file path")]
    input: PathBuf,

    #[arg(help = "Output image file path (format chosen from the extension)")]
    output: PathBuf,

    /// Correction method: gamma, recolor or none
    #[arg(short, long, value_name = "METHOD", default_value = "gamma")]
    method: Method,

    /// Stretch the channels together or separately
    #[arg(short, long = "clipmode", value_name = "MODE", default_value = "together")]
    clip_mode: ClipMode,

    /// Percent of samples clipped to black (0-100)
    #[arg(short = 'l', long = "cliplow", value_name = "PERCENT", default_value = "0.1", value_parser = parse_clip_low)]
    clip_low: f32,

    /// Percent of samples clipped to white (0-100, defaults to cliplow)
    #[arg(short = 'h', long = "cliphigh", value_name = "PERCENT", value_parser = parse_clip_high)]
    clip_high: Option<f32>,

    /// Target gray for the channel means (0-100, defaults to the luminance mean)
    #[arg(short = 'n', long = "neutralgray", value_name = "PERCENT", value_parser = parse_neutral_gray)]
    neutral_gray: Option<f32>,

    /// Also save the red, green, blue and luminance extracts of the input to this directory
    #[arg(long, value_name = "DIR")]
    channels: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

fn parse_clip_low(text: &str) -> AutocolorResult<f32> {
    parse_percent("cliplow", text)
}

fn parse_clip_high(text: &str) -> AutocolorResult<f32> {
    parse_percent("cliphigh", text)
}

fn parse_neutral_gray(text: &str) -> AutocolorResult<f32> {
    parse_percent("neutralgray", text)
}

/// Accept the single-dash `-help` spelling as well
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| if arg == "-help" { OsString::from("--help") } else { arg })
        .collect()
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });

    // only fails if a global subscriber is already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("autocolor: {message}");
    eprintln!("{}", Cli::command().render_usage());
    std::process::exit(1);
}

fn main() {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = err.print();
                std::process::exit(0);
            }
            _ => {
                let _ = err.print();
                std::process::exit(1);
            }
        },
    };

    init_tracing(cli.verbose);

    let options = match Options::new(
        cli.method,
        cli.clip_mode,
        cli.clip_low,
        cli.clip_high,
        cli.neutral_gray,
    ) {
        Ok(options) => options,
        Err(err) => fail(err),
    };

    if let Err(err) = output_format(&cli.output) {
        fail(err);
    }

    let scratch = ScratchFiles::new();
    if let Err(err) = scratch.install_signal_handler() {
        fail(err);
    }

    let image = match load_image(&cli.input) {
        Ok(img) => img,
        Err(err) => fail(err),
    };

    // Save channel extracts if requested
    if let Some(dir) = &cli.channels {
        match write_channel_extracts(&image.to_rgb32f(), dir) {
            Ok(_) => println!("Saved channel extracts to {}", dir.display()),
            Err(err) => fail(format!("failed to save channel extracts: {err}")),
        }
    }

    let result = auto_color_full(&image, &options);
    let output = match result {
        Ok(output) => output,
        Err(err) => fail(format!("processing failed: {err}")),
    };
    info!(
        target_gray = output.target,
        correction = ?output.correction,
        bounds = ?output.bounds,
        "balanced"
    );

    let balanced = restore_layout(&output.image, &image);
    if let Err(err) = write_image(&balanced, &cli.output, &scratch) {
        scratch.remove_all();
        fail(format!("failed to save {}: {err}", cli.output.display()));
    }
    println!("Saved result to {}", cli.output.display());
}
