// Codec implementations often use patterns that trigger clippy warnings
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]

//! ProRes Intra-Frame Decoder
//!
//! This crate provides a pure Rust decoder for single Apple ProRes video
//! frames. Every frame is independently coded, so the decoder takes one
//! frame blob and produces a planar 8-bit Y'CbCr picture.
//!
//! # Features
//!
//! - Frame and picture header parsing
//! - 4:2:2 and 4:4:4 chroma formats
//! - Progressive and interlaced (first field) frames
//! - Adaptive Golomb-Rice / Exp-Golomb coefficient decoding
//! - Slice-parallel decoding across a fixed worker pool
//!
//! Alpha channels are not supported; frames carrying one are rejected.
//!
//! # Example
//!
//! ```no_run
//! let data = std::fs::read("frame.prores").unwrap();
//! let picture = prores_decode::decode_frame(&data).unwrap();
//!
//! println!(
//!     "{}x{} {:?}",
//!     picture.width, picture.height, picture.chroma_format
//! );
//! let top_left = picture.y_row(0)[0];
//! # let _ = top_left;
//! ```

mod codebook;
mod decoder;
mod error;
mod frame;
mod idct;
mod slice;
mod tables;
mod types;

/// Bitstream reading module (public for testing)
pub mod bitstream;

pub use decoder::{
    decode_frame, decode_frame_file, DecoderConfig, PictureHeader, ProResDecoder,
    DEFAULT_NUM_WORKERS,
};
pub use error::{ProResError, Result};
pub use frame::{FrameHeader, Picture};
pub use slice::{clamp_10bit, quantization_scale, SliceHeader};
pub use tables::{INTERLACED_SCAN_ORDER, PROGRESSIVE_SCAN_ORDER};
pub use types::{ChromaFormat, InterlaceMode};
