//! The `convert` command: transcode a single activity file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use console::style;
use fitsync::FileFormat;
use fitsync::transcode::Transcoder;

use crate::config::AppConfig;

#[derive(Debug, Clone, clap::Args)]
pub struct ConvertArgs {
    /// Input activity file (.fit, .tcx, .gpx)
    pub input: PathBuf,

    /// Target format (fit, tcx, gpx)
    pub format: String,

    /// Output path; defaults to the input with the target extension
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print file information before converting
    #[arg(short, long)]
    pub interactive: bool,

    /// Convert every activity file in the input directory
    #[arg(short, long)]
    pub batch: bool,

    /// Only print file information, do not convert
    #[arg(long)]
    pub info: bool,
}

pub async fn handle_convert(args: ConvertArgs, config: &AppConfig) -> ExitCode {
    let target: FileFormat = match args.format.parse() {
        Ok(format) => format,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let transcoder = config.transcoder();

    if args.batch {
        return convert_directory(&args.input, target, transcoder.as_ref()).await;
    }

    if args.info || args.interactive {
        if let Err(e) = print_info(&args.input) {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
        if args.info {
            return ExitCode::SUCCESS;
        }
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension(target.extension()));

    match convert_one(&args.input, &output, target, transcoder.as_ref()).await {
        Ok(()) => {
            println!("{} {}", style("Converted to").green(), output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

fn source_format(path: &Path) -> Result<FileFormat, String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(FileFormat::from_extension)
        .ok_or_else(|| format!("cannot determine format of {}", path.display()))
}

async fn convert_one(
    input: &Path,
    output: &Path,
    target: FileFormat,
    transcoder: &dyn Transcoder,
) -> Result<(), String> {
    let from = source_format(input)?;
    if from == target {
        return Err(format!("{} is already {target}", input.display()));
    }
    if !transcoder.supports(from, target) {
        return Err(format!(
            "conversion {from} -> {target} is not available; configure a converter binary in .app_config.json"
        ));
    }

    let bytes = tokio::fs::read(input)
        .await
        .map_err(|e| format!("cannot read {}: {e}", input.display()))?;
    let converted = transcoder
        .transcode(&bytes, from, target)
        .await
        .map_err(|e| e.to_string())?;
    tokio::fs::write(output, converted)
        .await
        .map_err(|e| format!("cannot write {}: {e}", output.display()))?;

    Ok(())
}

async fn convert_directory(
    dir: &Path,
    target: FileFormat,
    transcoder: &dyn Transcoder,
) -> ExitCode {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("cannot read {}: {e}", dir.display());
            return ExitCode::from(1);
        }
    };

    let mut converted = 0usize;
    let mut failed = 0usize;

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(from) = source_format(&path) else {
            continue;
        };
        if from == target {
            continue;
        }

        let output = path.with_extension(target.extension());
        match convert_one(&path, &output, target, transcoder).await {
            Ok(()) => {
                println!("{} -> {}", path.display(), output.display());
                converted += 1;
            }
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                failed += 1;
            }
        }
    }

    println!("{converted} converted, {failed} failed");
    if failed > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_info(path: &Path) -> Result<(), String> {
    let metadata =
        std::fs::metadata(path).map_err(|e| format!("cannot stat {}: {e}", path.display()))?;
    let format = source_format(path)?;

    println!("{}", style(path.display()).bold());
    println!("  format: {format}");
    println!("  size:   {} bytes", metadata.len());
    Ok(())
}
