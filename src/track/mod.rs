pub mod download;
pub mod filename;
pub mod transcode;

pub use download::{Throttle, download_audio};
pub use filename::{cache_filename, chapter_title};
pub use transcode::{embed_artwork, finalize_file, transcode_to_mp3, write_tags};
