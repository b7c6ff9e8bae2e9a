use std::panic::{self, PanicHookInfo};

use tracing::error;

/// Route panics through `tracing` instead of stderr.
///
/// Tokio already confines a panic to the task that raised it; the hook only makes sure it is
/// logged with its location before the task is torn down.
pub fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        error!(
            thread = std::thread::current().name().unwrap_or("unnamed"),
            location,
            payload = payload_of(info),
            "panic captured"
        );
    }));
}

fn payload_of<'a>(info: &'a PanicHookInfo<'_>) -> &'a str {
    let payload = info.payload();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
