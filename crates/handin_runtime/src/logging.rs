//! Logging setup for embedding applications. The host shell owns the
//! filesystem layout, so it hands over the directory its logs live in.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Destination for log output.
pub enum LogDestination {
    /// Write `handin.log` under the given directory.
    File(PathBuf),
    /// Write to terminal (stdout).
    Terminal,
    /// Write `handin.log` under the given directory and to the terminal.
    Both(PathBuf),
}

/// Initialize the logger for the chosen destination. A log file that
/// cannot be created is reported on stderr and skipped.
pub fn initialize(destination: LogDestination) {
    let level = LevelFilter::Info;

    let config = build_config();

    let loggers: Vec<Box<dyn SharedLogger>> = match destination {
        LogDestination::File(dir) => {
            if let Some(file_logger) = create_file_logger(level, config, &dir) {
                vec![file_logger]
            } else {
                return;
            }
        }
        LogDestination::Terminal => {
            vec![TermLogger::new(
                level,
                config,
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )]
        }
        LogDestination::Both(dir) => {
            let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
                level,
                config.clone(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )];
            if let Some(file_logger) = create_file_logger(level, config, &dir) {
                loggers.push(file_logger);
            }
            loggers
        }
    };

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(
    level: LevelFilter,
    config: Config,
    dir: &Path,
) -> Option<Box<WriteLogger<File>>> {
    let log_path = dir.join("handin.log");
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;
    use tempfile::TempDir;

    use super::{build_config, create_file_logger};

    #[test]
    fn file_logger_lands_in_the_handed_in_directory() {
        let temp = TempDir::new().unwrap();
        let logger = create_file_logger(LevelFilter::Info, build_config(), temp.path());
        assert!(logger.is_some());
        assert!(temp.path().join("handin.log").exists());
    }

    #[test]
    fn unwritable_directories_are_reported_not_fatal() {
        let logger = create_file_logger(
            LevelFilter::Info,
            build_config(),
            "/definitely/not/here".as_ref(),
        );
        assert!(logger.is_none());
    }
}
