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

//! Streaming compression. A [`Codec`] builds fresh [`Compressor`]/
//! [`Decompressor`] pairs for raw DEFLATE (RFC 1951) and gzip (RFC 1952)
//! streams; [`CompressingSink`] and [`DecompressingSource`] thread one between
//! two buffers over any raw stream. The bit-level DEFLATE algorithm itself is
//! flate2's; this module owns the streaming state, the gzip framing, and its
//! validation.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use log::trace;
use crate::{Buffer, SIZE};
use crate::error::{Context, Error, Result, ResultExt};
use crate::error::Context::{Close, Drain, Fill, Flush};
use crate::pool::Pool;
use crate::streams::{Sink, Source, Stream};

/// A compression level from 0 (store only) to 9 (best compression).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Level(u32);

impl Level {
	pub const NONE: Self = Self(0);
	pub const FASTEST: Self = Self(1);
	pub const DEFAULT: Self = Self(6);
	pub const BEST: Self = Self(9);

	/// Creates a level, failing with an invalid-input error for values over 9.
	pub fn new(level: u32) -> Result<Self> {
		if level <= 9 {
			Ok(Self(level))
		} else {
			Err(Error::invalid_input(
				Context::Compress,
				"compression level must be in range [0, 9]",
			))
		}
	}

	pub fn get(self) -> u32 { self.0 }
}

impl Default for Level {
	fn default() -> Self { Self::DEFAULT }
}

impl From<Level> for Compression {
	fn from(value: Level) -> Self {
		Compression::new(value.0)
	}
}

/// A stateful streaming compressor. Instances are single-stream; make one per
/// stream from a [`Codec`].
pub trait Compressor {
	/// Consumes some (not necessarily all) bytes from `src`, appending compressed
	/// output to `sink`; input may be buffered internally. Returns the number of
	/// bytes appended.
	fn compress(&mut self, src: &mut Buffer<impl Pool>, sink: &mut Buffer<impl Pool>) -> Result<usize>;

	/// Flushes residual state and trailers into `sink`, ending the stream.
	fn finish(&mut self, sink: &mut Buffer<impl Pool>) -> Result;

	/// Releases resources.
	fn close(&mut self) -> Result { Ok(()) }
}

/// A stateful streaming decompressor. Instances are single-stream; make one per
/// stream from a [`Codec`].
pub trait Decompressor {
	/// Consumes compressed bytes from `src`, appending decompressed output to
	/// `sink`. Returns the number of bytes appended; zero means more input is
	/// needed, or the stream has [finished](Self::is_finished).
	fn decompress(&mut self, src: &mut Buffer<impl Pool>, sink: &mut Buffer<impl Pool>) -> Result<usize>;

	/// Returns `true` once the stream has reached its logical end.
	fn is_finished(&self) -> bool;

	/// Releases resources.
	fn close(&mut self) -> Result { Ok(()) }
}

/// A factory of compressor/decompressor pairs for one wire format.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Codec {
	/// Raw DEFLATE per RFC 1951, no framing.
	Deflate,
	/// gzip per RFC 1952: a 10-byte header, a DEFLATE payload, and a CRC-32 +
	/// size trailer.
	Gzip,
}

impl Codec {
	pub fn compressor(self, level: Level) -> CodecCompressor {
		match self {
			Self::Deflate => CodecCompressor::Deflate(DeflateCompressor::new(level)),
			Self::Gzip => CodecCompressor::Gzip(GzipCompressor::new(level)),
		}
	}

	pub fn decompressor(self) -> CodecDecompressor {
		match self {
			Self::Deflate => CodecDecompressor::Deflate(DeflateDecompressor::new()),
			Self::Gzip => CodecDecompressor::Gzip(GzipDecompressor::new()),
		}
	}
}

/// A [`Compressor`] built by [`Codec::compressor`].
pub enum CodecCompressor {
	Deflate(DeflateCompressor),
	Gzip(GzipCompressor),
}

impl Compressor for CodecCompressor {
	fn compress(&mut self, src: &mut Buffer<impl Pool>, sink: &mut Buffer<impl Pool>) -> Result<usize> {
		match self {
			Self::Deflate(inner) => inner.compress(src, sink),
			Self::Gzip(inner) => inner.compress(src, sink),
		}
	}

	fn finish(&mut self, sink: &mut Buffer<impl Pool>) -> Result {
		match self {
			Self::Deflate(inner) => inner.finish(sink),
			Self::Gzip(inner) => inner.finish(sink),
		}
	}

	fn close(&mut self) -> Result {
		match self {
			Self::Deflate(inner) => inner.close(),
			Self::Gzip(inner) => inner.close(),
		}
	}
}

/// A [`Decompressor`] built by [`Codec::decompressor`].
pub enum CodecDecompressor {
	Deflate(DeflateDecompressor),
	Gzip(GzipDecompressor),
}

impl Decompressor for CodecDecompressor {
	fn decompress(&mut self, src: &mut Buffer<impl Pool>, sink: &mut Buffer<impl Pool>) -> Result<usize> {
		match self {
			Self::Deflate(inner) => inner.decompress(src, sink),
			Self::Gzip(inner) => inner.decompress(src, sink),
		}
	}

	fn is_finished(&self) -> bool {
		match self {
			Self::Deflate(inner) => inner.is_finished(),
			Self::Gzip(inner) => inner.is_finished(),
		}
	}

	fn close(&mut self) -> Result {
		match self {
			Self::Deflate(inner) => inner.close(),
			Self::Gzip(inner) => inner.close(),
		}
	}
}

// Deflate

/// Compresses a raw DEFLATE stream.
pub struct DeflateCompressor {
	raw: Compress,
}

impl DeflateCompressor {
	pub fn new(level: Level) -> Self {
		Self {
			raw: Compress::new(level.into(), false),
		}
	}
}

impl Compressor for DeflateCompressor {
	fn compress(&mut self, src: &mut Buffer<impl Pool>, sink: &mut Buffer<impl Pool>) -> Result<usize> {
		deflate_step(&mut self.raw, src, sink, |_| { })
	}

	fn finish(&mut self, sink: &mut Buffer<impl Pool>) -> Result {
		deflate_finish(&mut self.raw, sink)
	}
}

/// Decompresses a raw DEFLATE stream.
pub struct DeflateDecompressor {
	raw: Decompress,
	finished: bool,
}

impl DeflateDecompressor {
	#[allow(clippy::new_without_default)]
	pub fn new() -> Self {
		Self {
			raw: Decompress::new(false),
			finished: false,
		}
	}
}

impl Decompressor for DeflateDecompressor {
	fn decompress(&mut self, src: &mut Buffer<impl Pool>, sink: &mut Buffer<impl Pool>) -> Result<usize> {
		if self.finished {
			return Ok(0)
		}

		let Self { raw, finished } = self;
		inflate_step(raw, finished, src, sink, |_| { })
	}

	fn is_finished(&self) -> bool { self.finished }
}

/// Runs one compression pass moving as much of `src` as the compressor will
/// take, claiming output windows in `sink` as needed. `observe` sees each chunk
/// of consumed input.
fn deflate_step(
	raw: &mut Compress,
	src: &mut Buffer<impl Pool>,
	sink: &mut Buffer<impl Pool>,
	mut observe: impl FnMut(&[u8]),
) -> Result<usize> {
	let mut produced = 0;
	src.read_segments(usize::MAX, |input| {
		let mut consumed = 0;
		sink.write_segments(usize::MAX, |output| {
			let before_in = raw.total_in();
			let before_out = raw.total_out();
			raw.compress(&input[consumed..], output, FlushCompress::None)
			   .map_err(|err| Error::compression_source(Context::Compress, err))?;

			let taken = (raw.total_in() - before_in) as usize;
			observe(&input[consumed..consumed + taken]);
			consumed += taken;
			let out = (raw.total_out() - before_out) as usize;
			produced += out;
			Ok(out)
		})?;
		Ok(consumed)
	})?;
	Ok(produced)
}

/// Flushes the compressor until it reports the end of stream.
fn deflate_finish(raw: &mut Compress, sink: &mut Buffer<impl Pool>) -> Result {
	let mut done = false;
	while !done {
		let mut out_this_pass = 0;
		sink.write_segments(usize::MAX, |output| {
			let before_out = raw.total_out();
			let status = raw.compress(&[], output, FlushCompress::Finish)
				.map_err(|err| Error::compression_source(Context::Compress, err))?;
			done = matches!(status, Status::StreamEnd);
			let out = (raw.total_out() - before_out) as usize;
			out_this_pass += out;
			Ok(out)
		})?;

		if !done && out_this_pass == 0 {
			return Err(Error::compression(Context::Compress, "compressor stalled before end of stream"))
		}
	}
	Ok(())
}

/// Runs one decompression pass. `observe` sees each chunk of produced output.
fn inflate_step(
	raw: &mut Decompress,
	finished: &mut bool,
	src: &mut Buffer<impl Pool>,
	sink: &mut Buffer<impl Pool>,
	mut observe: impl FnMut(&[u8]),
) -> Result<usize> {
	let mut produced = 0;
	src.read_segments(usize::MAX, |input| {
		let mut consumed = 0;
		sink.write_segments(usize::MAX, |output| {
			if *finished {
				return Ok(0)
			}

			let before_in = raw.total_in();
			let before_out = raw.total_out();
			let status = raw.decompress(&input[consumed..], output, FlushDecompress::None)
				.map_err(|err| Error::compression_source(Context::Decompress, err))?;
			*finished = matches!(status, Status::StreamEnd);

			consumed += (raw.total_in() - before_in) as usize;
			let out = (raw.total_out() - before_out) as usize;
			observe(&output[..out]);
			produced += out;
			Ok(out)
		})?;
		Ok(consumed)
	})?;
	Ok(produced)
}

// Gzip

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const GZIP_METHOD_DEFLATE: u8 = 8;
const FTEXT: u8 = 1;
const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
const FRESERVED: u8 = 0xE0;

/// Compresses a gzip stream: fixed header, DEFLATE payload, CRC-32 + size
/// trailer. MTIME is written as zero and OS as unknown (`0xFF`), keeping output
/// deterministic.
pub struct GzipCompressor {
	deflate: Compress,
	crc: crc32fast::Hasher,
	level: Level,
	header_written: bool,
}

impl GzipCompressor {
	pub fn new(level: Level) -> Self {
		Self {
			deflate: Compress::new(level.into(), false),
			crc: crc32fast::Hasher::new(),
			level,
			header_written: false,
		}
	}

	fn write_header(&mut self, sink: &mut Buffer<impl Pool>) -> Result {
		if self.header_written {
			return Ok(())
		}

		let xfl = match self.level {
			Level::BEST => 2,
			Level::FASTEST => 4,
			_ => 0,
		};
		let [m0, m1] = GZIP_MAGIC;
		sink.write_from_slice(&[
			m0, m1, GZIP_METHOD_DEFLATE,
			0,          // FLG
			0, 0, 0, 0, // MTIME
			xfl, 0xFF,  // XFL, OS
		])?;
		self.header_written = true;
		Ok(())
	}
}

impl Compressor for GzipCompressor {
	fn compress(&mut self, src: &mut Buffer<impl Pool>, sink: &mut Buffer<impl Pool>) -> Result<usize> {
		self.write_header(sink)?;
		let Self { deflate, crc, .. } = self;
		deflate_step(deflate, src, sink, |input| crc.update(input))
	}

	fn finish(&mut self, sink: &mut Buffer<impl Pool>) -> Result {
		self.write_header(sink)?;
		deflate_finish(&mut self.deflate, sink)?;
		sink.write_u32_le(self.crc.clone().finalize())?;
		sink.write_u32_le(self.deflate.total_in() as u32)
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum GzipState {
	Header,
	/// Skipping FEXTRA, holding the remaining length once its prefix is read.
	Extra(Option<usize>),
	Name,
	Comment,
	HeaderCrc,
	Body,
	Trailer,
	Done,
}

/// Decompresses a gzip stream, validating the header, the payload CRC-32, and
/// the size trailer. Optional header fields are skipped.
pub struct GzipDecompressor {
	inflate: Decompress,
	crc: crc32fast::Hasher,
	state: GzipState,
	flags: u8,
}

impl GzipDecompressor {
	#[allow(clippy::new_without_default)]
	pub fn new() -> Self {
		Self {
			inflate: Decompress::new(false),
			crc: crc32fast::Hasher::new(),
			state: GzipState::Header,
			flags: 0,
		}
	}

	/// The next state after an optional header field, in FLG bit order.
	fn next_field(&self, current: GzipState) -> GzipState {
		let flags = self.flags;
		let order = [
			(GzipState::Extra(None), FEXTRA),
			(GzipState::Name, FNAME),
			(GzipState::Comment, FCOMMENT),
			(GzipState::HeaderCrc, FHCRC),
		];
		let position = order
			.iter()
			.position(|&(state, _)| state == current)
			.map_or(0, |i| i + 1);
		for &(state, flag) in &order[position..] {
			if flags & flag != 0 {
				return state
			}
		}
		GzipState::Body
	}
}

impl Decompressor for GzipDecompressor {
	fn decompress(&mut self, src: &mut Buffer<impl Pool>, sink: &mut Buffer<impl Pool>) -> Result<usize> {
		let mut produced = 0;
		loop {
			match self.state {
				GzipState::Header => {
					if src.count() < 10 {
						return Ok(produced)
					}

					let header: [u8; 10] = src.read_array()?;
					if header[..2] != GZIP_MAGIC {
						return Err(Error::compression(Context::Decompress, "bad gzip magic"))
					}
					if header[2] != GZIP_METHOD_DEFLATE {
						return Err(Error::compression(Context::Decompress, "unsupported gzip compression method"))
					}
					let flags = header[3];
					if flags & FRESERVED != 0 {
						return Err(Error::compression(Context::Decompress, "reserved gzip header flags set"))
					}
					if flags & FTEXT != 0 {
						trace!("ignoring gzip FTEXT hint");
					}
					self.flags = flags;
					self.state = self.next_field(GzipState::Header);
				}
				GzipState::Extra(None) => {
					if src.count() < 2 {
						return Ok(produced)
					}
					let len = src.read_u16_le()? as usize;
					self.state = GzipState::Extra(Some(len));
				}
				GzipState::Extra(Some(remaining)) => {
					let skipped = src.skip(remaining)?;
					if skipped < remaining {
						self.state = GzipState::Extra(Some(remaining - skipped));
						return Ok(produced)
					}
					trace!("skipped gzip extra field");
					self.state = self.next_field(GzipState::Extra(None));
				}
				state @ (GzipState::Name | GzipState::Comment) => {
					match src.find_byte(0, 0, usize::MAX) {
						Some(end) => {
							src.skip(end + 1)?;
							trace!("skipped gzip {} field", if state == GzipState::Name {
								"file name"
							} else {
								"comment"
							});
							self.state = self.next_field(state);
						}
						None => {
							src.skip_all()?;
							return Ok(produced)
						}
					}
				}
				GzipState::HeaderCrc => {
					if src.count() < 2 {
						return Ok(produced)
					}
					src.skip(2)?;
					trace!("skipped gzip header checksum");
					self.state = GzipState::Body;
				}
				GzipState::Body => {
					let done = {
						let Self { inflate, crc, .. } = self;
						let mut done = false;
						produced += inflate_step(inflate, &mut done, src, sink, |output| {
							crc.update(output)
						})?;
						done
					};
					if !done {
						return Ok(produced)
					}
					self.state = GzipState::Trailer;
				}
				GzipState::Trailer => {
					if src.count() < 8 {
						return Ok(produced)
					}

					let crc = src.read_u32_le()?;
					let size = src.read_u32_le()?;
					if crc != self.crc.clone().finalize() {
						return Err(Error::compression(Context::Decompress, "gzip checksum mismatch"))
					}
					if size != self.inflate.total_out() as u32 {
						return Err(Error::compression(Context::Decompress, "gzip size mismatch"))
					}
					self.state = GzipState::Done;
				}
				GzipState::Done => return Ok(produced),
			}
		}
	}

	fn is_finished(&self) -> bool {
		self.state == GzipState::Done
	}
}

// Streams

/// A [`Sink`] compressing everything written to it before forwarding downstream.
/// Closing finishes the stream: residual state and trailers are drained, then
/// the downstream sink is closed.
pub struct CompressingSink<S: Sink, C: Compressor = CodecCompressor> {
	sink: S,
	compressor: C,
	input: Buffer,
	output: Buffer,
	closed: bool,
}

impl<S: Sink> CompressingSink<S> {
	/// A sink writing a raw DEFLATE stream into `sink`.
	pub fn deflate(sink: S, level: Level) -> Self {
		Self::new(sink, Codec::Deflate.compressor(level))
	}

	/// A sink writing a gzip stream into `sink`.
	pub fn gzip(sink: S, level: Level) -> Self {
		Self::new(sink, Codec::Gzip.compressor(level))
	}
}

impl<S: Sink, C: Compressor> CompressingSink<S, C> {
	pub fn new(sink: S, compressor: C) -> Self {
		Self {
			sink,
			compressor,
			input: Buffer::default(),
			output: Buffer::default(),
			closed: false,
		}
	}
}

impl<S: Sink, C: Compressor> Stream for CompressingSink<S, C> {
	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(())
		}
		self.closed = true;

		// Every step runs; the first error is propagated.
		let finish = self.compressor
			.finish(&mut self.output)
			.context(Context::Compress);
		let drain = if self.output.exhausted() {
			Ok(0)
		} else {
			self.sink.drain_all(&mut self.output).context(Drain)
		};
		let codec = self.compressor.close().context(Context::Compress);
		let sink = self.sink.close();
		let clear = self.input.clear().and(self.output.clear()).context(Close);
		finish?;
		drain?;
		codec?;
		sink?;
		clear
	}
}

impl<S: Sink, C: Compressor> Sink for CompressingSink<S, C> {
	fn drain(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if self.closed {
			return Err(Error::closed(Drain))
		}

		self.input.drain(source, count)?;
		self.compressor
			.compress(&mut self.input, &mut self.output)
			.context(Context::Compress)?;
		if !self.output.exhausted() {
			self.sink.drain_all(&mut self.output).context(Drain)?;
		}
		Ok(count)
	}

	fn flush(&mut self) -> Result {
		if self.closed {
			return Err(Error::closed(Flush))
		}

		if !self.output.exhausted() {
			self.sink.drain_all(&mut self.output).context(Drain)?;
		}
		self.sink.flush()
	}
}

impl<S: Sink, C: Compressor> Drop for CompressingSink<S, C> {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

/// A [`Source`] decompressing everything read from an upstream source. Reaching
/// upstream end-of-stream before the compressed stream's logical end fails with
/// a truncated-stream error.
pub struct DecompressingSource<S: Source, D: Decompressor = CodecDecompressor> {
	source: S,
	decompressor: D,
	input: Buffer,
	output: Buffer,
	closed: bool,
}

impl<S: Source> DecompressingSource<S> {
	/// A source reading a raw DEFLATE stream from `source`.
	pub fn deflate(source: S) -> Self {
		Self::new(source, Codec::Deflate.decompressor())
	}

	/// A source reading a gzip stream from `source`.
	pub fn gzip(source: S) -> Self {
		Self::new(source, Codec::Gzip.decompressor())
	}
}

impl<S: Source, D: Decompressor> DecompressingSource<S, D> {
	pub fn new(source: S, decompressor: D) -> Self {
		Self {
			source,
			decompressor,
			input: Buffer::default(),
			output: Buffer::default(),
			closed: false,
		}
	}
}

impl<S: Source, D: Decompressor> Stream for DecompressingSource<S, D> {
	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(())
		}
		self.closed = true;

		let codec = self.decompressor.close().context(Context::Decompress);
		let source = self.source.close();
		let clear = self.input.clear().and(self.output.clear()).context(Close);
		codec?;
		source?;
		clear
	}
}

impl<S: Source, D: Decompressor> Source for DecompressingSource<S, D> {
	fn fill(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if self.closed {
			return Err(Error::closed(Fill))
		}
		if count == 0 {
			return Ok(0)
		}

		loop {
			if !self.output.exhausted() {
				return self.output.fill(sink, count)
			}

			let produced = self.decompressor
				.decompress(&mut self.input, &mut self.output)
				.context(Context::Decompress)?;
			if produced > 0 {
				continue
			}
			if self.decompressor.is_finished() {
				return Ok(0)
			}

			let read = match self.source.fill(&mut self.input, SIZE) {
				Ok(n) => n,
				Err(err) if err.is_eos() => 0,
				Err(err) => return Err(err.with_context(Fill)),
			};
			if read == 0 {
				return Err(Error::compression(Context::Decompress, "compressed stream truncated"))
			}
		}
	}
}

impl<S: Source, D: Decompressor> Drop for DecompressingSource<S, D> {
	fn drop(&mut self) {
		let _ = self.close();
	}
}
