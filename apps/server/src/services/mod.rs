//! Domain services built on the query layer

pub mod catalog;

pub use catalog::{AudioCatalog, NewAudio, AUDIO_CACHE_NAMESPACE};
