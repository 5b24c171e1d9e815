//! Imaging Module
//!
//! Decoded image type and the decoder collaborator used by the load pipeline.

mod decoded;
mod decoder;

pub use decoded::{DecodedImage, PLACEHOLDER_SIZE};
pub use decoder::{sample_size, Decoder, SampledDecoder};
