use std::{fs, path::Path};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;
pub mod writer;

pub use formatter::NodeFormatter;
pub use writer::CircularFileWriter;

use crate::configs::LoggingConfig;

/// Builds the `EnvFilter` directive string from config.
///
/// `RUST_LOG` wins over anything configured here.
pub fn filter_directives(logging: Option<&LoggingConfig>) -> String {
    let level = logging.and_then(|l| l.level.as_deref()).unwrap_or("info");
    let extra = logging.and_then(|l| l.filters.as_deref()).unwrap_or("");

    // hyper and reqwest are far too chatty at debug
    if extra.is_empty() {
        format!("{level},hyper=warn,reqwest=warn")
    } else {
        format!("{level},hyper=warn,reqwest=warn,{extra}")
    }
}

pub fn init(logging: Option<&LoggingConfig>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(logging)));

    let stdout_layer = fmt::layer()
        .event_format(NodeFormatter::new(true))
        .with_ansi(true);

    let file_layer = logging.and_then(|l| l.file.as_ref()).map(|file| {
        if let Some(parent) = Path::new(&file.path).parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Failed to create log directory: {}", e);
            }
        }

        fmt::layer()
            .with_writer(CircularFileWriter::new(file.path.clone(), file.max_lines))
            .event_format(NodeFormatter::new(false))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}
