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

//! Stream traits. [`Source`] and [`Sink`] are the minimal raw contracts: one
//! method moving bytes out of or into a [`Buffer`]. [`BufSource`] and
//! [`BufSink`] are the full-featured layers on top, implemented by [`Buffer`]
//! itself and by the buffered wrappers around raw streams.

mod buffered;
mod codec;
mod std_io;

pub use buffered::*;
pub use codec::*;
pub use std_io::*;

pub use crate::error::{Error, ErrorKind, Result};

use std::cmp::{max, min};
use std::mem;
use crate::{Buffer, ByteStr, ByteString, SIZE};
use crate::error::Context::{BufRead, Drain, Fill};
use crate::error::ResultExt;
use crate::pool::Pool;

/// A stream of bytes. Closing is idempotent; default streams also close when
/// dropped.
pub trait Stream {
	fn close(&mut self) -> Result { Ok(()) }
}

/// A readable stream of bytes.
pub trait Source: Stream {
	/// Reads at most `count` bytes into `sink`, returning the number of bytes
	/// read. Returns `Ok(0)` only when `count` is zero or the stream has reached
	/// its end.
	fn fill(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize>;

	/// Reads all bytes into `sink` until end-of-stream, returning the number of
	/// bytes read.
	fn fill_all(&mut self, sink: &mut Buffer<impl Pool>) -> Result<usize> {
		let mut total = 0;
		loop {
			match self.fill(sink, SIZE) {
				Ok(0) => break,
				Ok(n) => total += n,
				Err(err) if err.is_eos() => break,
				Err(err) => return Err(err),
			}
		}
		Ok(total)
	}
}

/// A writable stream of bytes.
pub trait Sink: Stream {
	/// Removes exactly `count` bytes from the head of `source` and delivers them.
	fn drain(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result<usize>;

	/// Removes all bytes from `source` and delivers them.
	fn drain_all(&mut self, source: &mut Buffer<impl Pool>) -> Result<usize> {
		let count = source.count();
		self.drain(source, count)
	}

	/// Writes all buffered data to its final target.
	fn flush(&mut self) -> Result { Ok(()) }
}

/// Wraps the source in a [`BufferedSource`].
pub trait SourceExt: Source + Sized {
	fn buffered(self) -> BufferedSource<Self> {
		BufferedSource::new(self)
	}
}

impl<S: Source> SourceExt for S { }

/// Wraps the sink in a [`BufferedSink`].
pub trait SinkExt: Sink + Sized {
	fn buffered(self) -> BufferedSink<Self> {
		BufferedSink::new(self)
	}
}

impl<S: Sink> SinkExt for S { }

/// A stream backed by a [`Buffer`].
pub trait BufStream {
	type Pool: Pool;
	fn buf(&self) -> &Buffer<Self::Pool>;
	fn buf_mut(&mut self) -> &mut Buffer<Self::Pool>;
}

macro_rules! gen_int_reads {
	($($be_name:ident$($le_name:ident)?->$ty:ident,)+) => {
		$(gen_int_reads! { $be_name$($le_name)?->$ty })+
	};
	($be_name:ident$le_name:ident->$ty:ident) => {
		gen_int_reads! { $be_name->$ty "big-endian " }
		gen_int_reads! { $le_name->$ty "little-endian " }
	};
	($name:ident->$ty:ident$($endian:literal)?) => {
		#[doc = concat!(" Reads one ",$($endian,)?"[`",stringify!($ty),"`] from the source.")]
		fn $name(&mut self) -> Result<$ty> {
			self.require(mem::size_of::<$ty>())?;
			self.buf_mut().$name()
		}
	}
}

/// A source with a full buffered read surface.
pub trait BufSource: BufStream + Source {
	/// Reads up to `byte_count` bytes into the buffer, returning whether the
	/// requested count is available. To return an end-of-stream error instead,
	/// use [`require`](Self::require).
	fn request(&mut self, byte_count: usize) -> Result<bool>;

	/// Reads at least `byte_count` bytes into the buffer, returning an
	/// end-of-stream error if not successful.
	fn require(&mut self, byte_count: usize) -> Result {
		if self.request(byte_count)? {
			Ok(())
		} else {
			Err(Error::eos(BufRead))
		}
	}

	/// Scans for `byte` in `[from, to)`, extending the buffer from the underlying
	/// stream and probing after each refill until the byte is found, the window is
	/// exhausted, or end-of-stream.
	fn find_byte_within(&mut self, byte: u8, from: usize, to: usize) -> Result<Option<usize>> {
		let mut start = from;
		loop {
			if let Some(i) = self.buf().find_byte(byte, start, to) {
				return Ok(Some(i))
			}

			let buffered = self.buf().count();
			if buffered >= to || !self.request(buffered + 1)? {
				return Ok(None)
			}
			start = max(from, buffered);
		}
	}

	/// Removes up to `byte_count` bytes from the source, returning the number
	/// removed.
	fn skip(&mut self, mut byte_count: usize) -> Result<usize> {
		let mut n = 0;
		while byte_count > 0 && self.request(1)? {
			let skipped = self.buf_mut().skip(byte_count)?;
			if skipped == 0 {
				break
			}
			n += skipped;
			byte_count -= skipped;
		}
		Ok(n)
	}

	/// Removes all remaining bytes from the source.
	fn skip_all(&mut self) -> Result<usize> {
		let mut n = 0;
		while self.request(1)? {
			n += self.buf_mut().skip_all()?;
		}
		Ok(n)
	}

	/// Reads bytes into a slice, returning the number of bytes read.
	fn read_slice(&mut self, dst: &mut [u8]) -> Result<usize> {
		self.request(dst.len())?;
		self.buf_mut().read_slice(dst)
	}

	/// Reads the exact length of bytes into a slice, returning an end-of-stream
	/// error if the slice could not be filled. Bytes are not consumed from the
	/// buffer on end-of-stream.
	fn read_slice_exact(&mut self, dst: &mut [u8]) -> Result {
		self.require(dst.len())?;
		self.buf_mut().read_slice_exact(dst)
	}

	fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
		self.require(N)?;
		self.buf_mut().read_array()
	}

	gen_int_reads! {
		read_i8 -> i8,
		read_u8 -> u8,
		read_i16 read_i16_le -> i16,
		read_u16 read_u16_le -> u16,
		read_i32 read_i32_le -> i32,
		read_u32 read_u32_le -> u32,
		read_i64 read_i64_le -> i64,
		read_u64 read_u64_le -> u64,
		read_f32 read_f32_le -> f32,
		read_f64 read_f64_le -> f64,
	}

	/// Reads up to `byte_count` bytes into a [`ByteString`].
	fn read_byte_str(&mut self, byte_count: usize) -> Result<ByteString> {
		self.request(byte_count)?;
		self.buf_mut().read_byte_str(byte_count)
	}

	/// Reads a signed decimal integer: an optional `+`/`-` sign, then ASCII
	/// digits up to the first non-digit, which is not consumed. Fails with a
	/// format error on empty input, a leading non-digit, or 64-bit overflow.
	fn read_decimal_i64(&mut self) -> Result<i64> {
		// Buffer the sign and every contiguous digit before parsing.
		let mut seen = 0;
		while self.request(seen + 1)? {
			let Some(b) = self.buf().get(seen) else { break };
			let numeric = b.is_ascii_digit() || (seen == 0 && matches!(b, b'+' | b'-'));
			if !numeric {
				break
			}
			seen += 1;
		}
		self.buf_mut().read_decimal_i64()
	}

	/// Reads an unsigned hexadecimal integer from digits `0-9 a-f A-F`, stopping
	/// at the first non-hex digit, which is not consumed. Fails with a format
	/// error on empty input, a leading non-digit, or 64-bit overflow.
	fn read_hex_u64(&mut self) -> Result<u64> {
		let mut seen = 0;
		while self.request(seen + 1)? {
			let Some(b) = self.buf().get(seen) else { break };
			if !b.is_ascii_hexdigit() {
				break
			}
			seen += 1;
		}
		self.buf_mut().read_hex_u64()
	}

	/// Decodes exactly `byte_count` bytes as UTF-8.
	fn read_utf8(&mut self, byte_count: usize) -> Result<String> {
		self.require(byte_count)?;
		self.buf_mut().read_utf8(byte_count)
	}

	/// Decodes all remaining bytes as UTF-8.
	fn read_utf8_to_end(&mut self) -> Result<String> {
		while self.request(self.buf().count() + 1)? { }
		let count = self.buf().count();
		self.buf_mut().read_utf8(count)
	}

	/// Reads a line of UTF-8 text, without its terminator. A line ends with `\n`
	/// or `\r\n`, or at the last byte of the stream. Returns `None` at
	/// end-of-stream.
	fn read_utf8_line(&mut self) -> Result<Option<String>> {
		self.find_byte_within(b'\n', 0, usize::MAX)?;
		self.buf_mut().read_utf8_line()
	}

	/// Reads a line of UTF-8 text, failing with a format error if no line
	/// terminator is found within `limit` bytes.
	fn read_utf8_line_strict(&mut self, limit: usize) -> Result<String> {
		self.find_byte_within(b'\n', 0, limit.saturating_add(1))?;
		self.buf_mut().read_utf8_line_strict(limit)
	}

	/// Reads one UTF-8-encoded scalar value. Malformed sequences fail with a
	/// format error.
	fn read_utf8_char(&mut self) -> Result<char> {
		self.request(4)?;
		self.buf_mut().read_utf8_char()
	}

	/// Reads all bytes from the source into `sink`.
	fn read_all(&mut self, sink: &mut impl Sink) -> Result<usize> {
		let mut total = 0;
		loop {
			if self.buf().exhausted() && !self.request(1)? {
				break
			}
			total += sink.drain_all(self.buf_mut()).context(BufRead)?;
		}
		Ok(total)
	}
}

macro_rules! gen_int_writes {
	($($be_name:ident$($le_name:ident)?->$ty:ident,)+) => {
		$(gen_int_writes! { $be_name$($le_name)?->$ty })+
	};
	($be_name:ident$le_name:ident->$ty:ident) => {
		gen_int_writes! { $be_name->$ty "big-endian " }
		gen_int_writes! { $le_name->$ty "little-endian " }
	};
	($name:ident->$ty:ident$($endian:literal)?) => {
		#[doc = concat!(" Writes one ",$($endian,)?"[`",stringify!($ty),"`] to the sink.")]
		fn $name(&mut self, value: $ty) -> Result {
			self.buf_mut().$name(value)?;
			self.hint_emit()
		}
	}
}

/// A sink with a full buffered write surface.
pub trait BufSink: BufStream + Sink {
	/// Moves any buffered bytes held in writable-to-capacity segments downstream,
	/// leaving a partial tail in place. A no-op for plain buffers.
	fn hint_emit(&mut self) -> Result { Ok(()) }

	/// Moves all buffered bytes downstream without flushing. A no-op for plain
	/// buffers.
	fn emit(&mut self) -> Result { Ok(()) }

	fn write_from_slice(&mut self, value: &[u8]) -> Result {
		self.buf_mut().write_from_slice(value)?;
		self.hint_emit()
	}

	fn write_utf8(&mut self, value: &str) -> Result {
		self.buf_mut().write_utf8(value)?;
		self.hint_emit()
	}

	fn write_char(&mut self, value: char) -> Result {
		self.buf_mut().write_char(value)?;
		self.hint_emit()
	}

	gen_int_writes! {
		write_i8 -> i8,
		write_u8 -> u8,
		write_i16 write_i16_le -> i16,
		write_u16 write_u16_le -> u16,
		write_i32 write_i32_le -> i32,
		write_u32 write_u32_le -> u32,
		write_i64 write_i64_le -> i64,
		write_u64 write_u64_le -> u64,
		write_f32 write_f32_le -> f32,
		write_f64 write_f64_le -> f64,
	}

	/// Writes the ASCII decimal representation of `value`, with a `-` sign for
	/// negative values and the minimum number of digits.
	fn write_decimal_i64(&mut self, value: i64) -> Result {
		self.buf_mut().write_decimal_i64(value)?;
		self.hint_emit()
	}

	/// Writes the lowercase hexadecimal representation of `value` without leading
	/// zeros.
	fn write_hex_u64(&mut self, value: u64) -> Result {
		self.buf_mut().write_hex_u64(value)?;
		self.hint_emit()
	}

	fn write_byte_str(&mut self, value: &ByteStr) -> Result {
		self.buf_mut().write_byte_str(value)?;
		self.hint_emit()
	}

	fn write_byte_string(&mut self, value: &ByteString) -> Result {
		self.write_from_slice(value.as_slice())
	}

	/// Writes all bytes from `source` into the sink.
	fn write_all(&mut self, source: &mut impl Source) -> Result<usize> {
		let mut total = 0;
		loop {
			let n = match source.fill(self.buf_mut(), SIZE) {
				Ok(0) => break,
				Ok(n) => n,
				Err(err) if err.is_eos() => break,
				Err(err) => return Err(err),
			};
			total += n;
			self.hint_emit()?;
		}
		Ok(total)
	}
}

// Impls

impl Stream for &[u8] { }

impl Source for &[u8] {
	fn fill(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		let data = *self;
		let n = min(count, data.len());
		sink.write_from_slice(&data[..n]).context(Fill)?;
		*self = &data[n..];
		Ok(n)
	}
}

impl Stream for Vec<u8> { }

impl Sink for Vec<u8> {
	fn drain(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if source.count() < count {
			return Err(Error::invalid_input(Drain, "source holds fewer bytes than requested"))
		}

		source.read_segments(count, |data| {
			self.extend_from_slice(data);
			Ok(data.len())
		})
	}
}

impl<S: Stream> Stream for &mut S {
	fn close(&mut self) -> Result { (**self).close() }
}

impl<S: Source> Source for &mut S {
	fn fill(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		(**self).fill(sink, count)
	}

	fn fill_all(&mut self, sink: &mut Buffer<impl Pool>) -> Result<usize> {
		(**self).fill_all(sink)
	}
}

impl<S: Sink> Sink for &mut S {
	fn drain(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		(**self).drain(source, count)
	}

	fn drain_all(&mut self, source: &mut Buffer<impl Pool>) -> Result<usize> {
		(**self).drain_all(source)
	}

	fn flush(&mut self) -> Result { (**self).flush() }
}
