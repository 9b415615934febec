use sanitize_filename::{Options, sanitize_with_options};

use crate::source::SourceItem;

/// The chapter title doubles as the join key against the device and as the
/// cache filename stem, so it has to be filename-safe on every platform.
///
/// Two distinct tracks that sanitize to the same title are conflated into
/// one chapter; the first one wins.
pub fn chapter_title(item: &SourceItem) -> String {
    clean_title(&item.display_title())
}

/// Filename stem plus the mp3 extension the transcoder produces
pub fn cache_filename(title: &str) -> String {
    format!("{title}.mp3")
}

fn clean_title(title: &str) -> String {
    sanitize_with_options(
        title,
        Options {
            windows: true,
            truncate: true,
            replacement: "_",
        },
    )
}
