//! Command-line arguments.

use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments; set values override `config.toml`.
#[derive(Debug, Parser)]
#[command(
    name = "imgloader",
    version,
    about = "Load images through a memory and disk cache",
    long_about = None
)]
pub struct CliArgs {
    /// Image URLs to load.
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Disk cache directory.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Directory to write loaded images into.
    #[arg(short, long, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Fit images inside a WIDTHxHEIGHT box.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub resize: Option<(u32, u32)>,

    /// Apply a circular mask.
    #[arg(long)]
    pub circle: bool,

    /// Convert to grayscale.
    #[arg(long)]
    pub grayscale: bool,

    /// Maximum concurrent disk and network tasks.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Seconds to wait for all images.
    #[arg(long)]
    pub wait_secs: Option<u64>,
}

/// Parses `WIDTHxHEIGHT`.
fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    if w == 0 || h == 0 {
        return Err("width and height must be non-zero".to_string());
    }
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("64x64" => Ok((64, 64)) ; "square")]
    #[test_case("120X80" => Ok((120, 80)) ; "upper case separator")]
    #[test_case("0x10" => matches Err(_) ; "zero width")]
    #[test_case("64" => matches Err(_) ; "missing height")]
    #[test_case("axb" => matches Err(_) ; "not numbers")]
    fn test_parse_size(value: &str) -> Result<(u32, u32), String> {
        parse_size(value)
    }

    #[test]
    fn test_flags() {
        let args = CliArgs::parse_from([
            "imgloader",
            "--resize",
            "32x32",
            "--circle",
            "https://example.com/a.png",
            "https://example.com/b.png",
        ]);

        assert_eq!(args.resize, Some((32, 32)));
        assert!(args.circle);
        assert!(!args.grayscale);
        assert_eq!(args.urls.len(), 2);
    }
}
