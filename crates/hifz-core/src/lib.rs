//! Playback and synchronization engine for verse recitation.
//!
//! Verse records and a playback scope are assembled into a [`queue::Queue`];
//! the [`engine::RecitationEngine`] drives one main audio output across that
//! queue, keeps verse and word highlighting in step with the playback
//! position, and plays word pronunciations on a separate output.

pub mod bindings;
pub mod config;
pub mod continuation;
pub mod engine;
pub mod entry;
pub mod error;
pub mod media;
pub mod pagination;
pub mod queue;
pub mod runtime;
pub mod scrub;
pub mod segment;
pub mod text_utils;
pub mod timeline;
pub mod transport;
pub mod word_shot;
