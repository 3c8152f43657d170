// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! ## How it works
//!
//! Data is written to and read from reusable chunks of memory called *segments*.
//! When a segment is consumed, it's returned to a *pool*. To write data, segments
//! are claimed from this pool. When the pool is exhausted, segments are created.
//! The default pool has two tiers: a single-segment slot on each thread, and a
//! process-wide array of independent shards safe for concurrent claim and recycle.
//!
//! ### Segments
//!
//! Segments are fixed-size chunks of memory arranged in a ring buffer. Memory
//! within segments can either be owned by or shared between segments, avoiding
//! expensive mem-copy operations as much as possible. Shared memory is
//! copy-on-write; it can be read by multiple segments, only copying when written.
//! Small amounts of data under a set threshold (1024B by default) are not shared,
//! as a tradeoff between memory allocation performance and speed.
//!
//! The ring buffer behaves as a continuous byte deque. Bytes are read from one end
//! and written to the other, claiming new segments from the pool as it fills. Data
//! can have gaps where segments were partially read, called *voids*. Compacting
//! these on every write would be costly, but keeping them is less space efficient.
//! As void size reaches a threshold, 4096B by default, segments are compacted.
//! This can also be triggered manually with the `compact` function.
//!
//! ### Streams
//!
//! Raw streams implement [`Source`](streams::Source) (readable) or
//! [`Sink`](streams::Sink) (writable), a minimal single-method contract moving
//! bytes into or out of a [`Buffer`]. Wrapping a raw stream in a
//! [`BufferedSource`](streams::BufferedSource) or
//! [`BufferedSink`](streams::BufferedSink) amortizes raw IO through an internal
//! buffer and unlocks the full read/write surface: primitive integers and floats
//! in either byte order, decimal and hexadecimal text numbers, UTF-8 strings and
//! lines, byte strings, and non-consuming peeks.
//!
//! Streaming compression is layered the same way: a
//! [`CompressingSink`](streams::CompressingSink) or
//! [`DecompressingSource`](streams::DecompressingSource) threads a stateful
//! [`Codec`](streams::Codec) (DEFLATE or gzip) between two buffers.

mod buffer;
mod byte_str;
pub mod encoding;
mod error;
pub mod pool;
mod segment;
pub mod streams;

pub use buffer::{Buffer, BufferOptions};
pub use byte_str::{ByteStr, ByteString};
pub use error::{Context, Error, ErrorKind, ParseNumError, Result, ResultExt};
pub use segment::Segment;

/// The fixed segment size.
pub const SIZE: usize = 8192;
