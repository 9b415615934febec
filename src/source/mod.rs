pub mod catalog;
pub mod link;
pub mod session;

pub use catalog::{SourceItem, fetch_catalog};
pub use link::SourceLink;
pub use session::{AudioSource, AudioStream, SpotifySession};
