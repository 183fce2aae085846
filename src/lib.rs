
//! Composable byte-stream pipelines.
//!
//! The crate provides a small set of stream capabilities
//! (size/position/end/seek, read, write, optional direct buffer access)
//! together with the sources, sinks, buffering adapters and transforming
//! nodes that implement them, plus the primitives the transformers plug in:
//! an AES core (ECB/CBC/CFB and a CTR helper), zlib/gzip compression around
//! a deflate engine, and base16/base64/base85 text codecs over a resizable
//! memory block.
//!
//! A typical pipeline is assembled by nesting nodes, for example
//! "file → gzip-decompress → aes-cfb-decrypt → base64-decode":
//! each transformer either borrows its inner stream (`&mut inner`) or owns
//! it (pass by value), and owning transformers release the inner stream
//! when dropped.

#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,
    unused,

    missing_copy_implementations,
    missing_debug_implementations,
)]

#![deny(
    unused_variables,
    unused_assignments,
    dead_code,
    unused_must_use,
    trivial_numeric_casts,
)]

#![forbid(unsafe_code)]

pub mod error;
pub mod memory;
pub mod encoding;
pub mod crypto;
pub mod compress;
pub mod stream;


/// Re-exports of the types commonly required to assemble a pipeline.
pub mod prelude {

    // main exports
    pub use crate::stream::{BaseStream, InputStream, OutputStream};
    pub use crate::stream::{copy_stream, copy_stream_with_callback, clone_stream};

    // secondary data types
    pub use crate::memory::MemoryBlock;
    pub use crate::crypto::{SymCipher, OperationMode};
    pub use crate::compress::Compressor;

    pub use crate::error::{Result, Error};
}
