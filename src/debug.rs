//! Diagnostics for MixBoard.
//!
//! Plugin hosts rarely surface stderr, so the `debug` feature installs a
//! plain file backend for the `log` facade at `/tmp/mixboard.log`. Without
//! the feature every `log` call falls through the facade as a no-op. All
//! logging call sites are non-real-time (`initialize`, `reset`); the audio
//! thread never logs.

use log::{info, warn};

/// Serialize an engine snapshot through the logging facade. Serialization
/// allocates, so this is for non-real-time call sites only.
pub(crate) fn log_engine_dump<D: serde::Serialize>(context: &str, dump: &D) {
    match serde_json::to_string(dump) {
        Ok(json) => info!("{context}: {json}"),
        Err(e) => warn!("{context}: state dump failed: {e}"),
    }
}

#[cfg(feature = "debug")]
pub mod logger {
    use std::fs::{File, OpenOptions};
    use std::io::Write;
    use std::sync::Mutex;

    use log::{LevelFilter, Log, Metadata, Record};

    const LOG_PATH: &str = "/tmp/mixboard.log";

    /// File-backed `log::Log` implementation. A mutex is fine here: only
    /// non-real-time plugin callbacks log.
    struct FileLogger {
        file: Mutex<Option<File>>,
    }

    impl Log for FileLogger {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            let mut guard = match self.file.lock() {
                Ok(g) => g,
                Err(_) => return,
            };
            if let Some(file) = guard.as_mut() {
                let _ = writeln!(file, "[{}] {}", record.level(), record.args());
            }
        }

        fn flush(&self) {
            if let Ok(mut guard) = self.file.lock() {
                if let Some(file) = guard.as_mut() {
                    let _ = file.flush();
                }
            }
        }
    }

    static LOGGER: FileLogger = FileLogger {
        file: Mutex::new(None),
    };

    /// Open the log file and register with the `log` facade. A second
    /// `initialize` reopens the file but registers only once.
    pub fn init_logger() {
        let file = match OpenOptions::new().create(true).append(true).open(LOG_PATH) {
            Ok(f) => f,
            Err(_) => return,
        };
        if let Ok(mut guard) = LOGGER.file.lock() {
            *guard = Some(file);
        }
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Info);
        }
    }
}
