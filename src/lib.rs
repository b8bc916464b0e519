pub mod align;
pub mod api;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod init;
pub mod job;
pub mod pipeline;
pub mod platform;
pub mod prompts;
pub mod reconcile;
pub mod scenes;
pub mod srt;

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!("{}", message),
        "OK" => tracing::info!(status = "ok", "{}", message),
        _ => tracing::info!("{}", message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
