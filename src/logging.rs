//! Log output. The TUI owns the terminal, so it logs to a file next to the
//! saved chats; the one-shot commands log to stderr.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::Config;

/// Open `<data_dir>/hr-chat.log` for appending, if the directory allows it
pub fn open_log_file(config: &Config) -> Option<File> {
    if let Err(e) = fs::create_dir_all(&config.data_dir) {
        eprintln!(
            "hr-chat: cannot create {} ({}), logging disabled",
            config.data_dir.display(),
            e
        );
        return None;
    }

    match OpenOptions::new().create(true).append(true).open(config.log_path()) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!(
                "hr-chat: cannot open {} ({}), logging disabled",
                config.log_path().display(),
                e
            );
            None
        }
    }
}

/// Pick where logs go. An unusable log file silences logging rather than
/// stopping the app.
pub fn writer_for(config: &Config, to_file: bool) -> BoxMakeWriter {
    if !to_file {
        return BoxMakeWriter::new(std::io::stderr);
    }
    match open_log_file(config) {
        Some(file) => BoxMakeWriter::new(Mutex::new(file)),
        None => BoxMakeWriter::new(std::io::sink),
    }
}

/// Install the global subscriber. INFO for the TUI log, WARN on stderr,
/// DEBUG everywhere with `verbose`.
pub fn init(config: &Config, verbose: bool, to_file: bool) -> Result<()> {
    let level = match (verbose, to_file) {
        (true, _) => Level::DEBUG,
        (false, true) => Level::INFO,
        (false, false) => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_ansi(!to_file)
        .with_writer(writer_for(config, to_file))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_created_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().join("data");

        assert!(open_log_file(&config).is_some());
        assert!(config.log_path().exists());
    }

    #[test]
    fn unusable_data_dir_disables_file_logging() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();

        let mut config = Config::default();
        config.data_dir = blocker.join("data");

        assert!(open_log_file(&config).is_none());
        // Still yields a writer instead of failing
        let _writer = writer_for(&config, true);
    }
}
