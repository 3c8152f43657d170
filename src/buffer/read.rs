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

use std::cmp::min;
use std::io::Write;
use simdutf8::compat::from_utf8;
use crate::{Buffer, ByteString};
use crate::error::{Context::BufRead, Error, ParseNumError, Result, ResultExt};
use crate::pool::Pool;
use crate::segment::Segment;
use crate::streams::{BufSource, BufStream, Source};

#[derive(Debug, thiserror::Error)]
#[error("no line terminator found within {limit} bytes ({buffered} buffered)")]
struct LineTermNotFound {
	limit: usize,
	buffered: usize,
}

#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("invalid UTF-8 lead byte `{0:#04X}`")]
struct InvalidLeadByte(u8);

impl<P: Pool> Buffer<P> {
	/// Reads up to `max_count` bytes through `consume`, called with successive
	/// readable segment slices and returning the number of bytes it consumed. A
	/// count above the given window fails with an invalid-input error. Reading
	/// stops when `consume` leaves part of its window unread.
	///
	/// This is the raw read surface backing the `std::io` bridges; most callers
	/// want the typed read operations instead.
	pub fn read_segments(
		&mut self,
		mut max_count: usize,
		mut consume: impl FnMut(&[u8]) -> Result<usize>,
	) -> Result<usize> {
		let mut count = 0;
		while max_count > 0 {
			while self.segments.front().is_some_and(Segment::is_empty) {
				let Some(seg) = self.segments.pop_front() else { break };
				self.pool.recycle_one(seg).context(BufRead)?;
			}

			let (read, window) = {
				let Some(seg) = self.segments.front_mut() else { break };
				let window = min(max_count, seg.len());
				let read = consume(&seg.data()[..window])?;
				if read > window {
					return Err(Error::invalid_input(
						BufRead,
						"callback consumed more bytes than its window",
					))
				}
				seg.consume(read);
				(read, window)
			};

			self.segments.consumed(read);
			count += read;
			max_count -= read;
			if read < window || read == 0 {
				break
			}
		}

		self.tidy().context(BufRead)?;
		Ok(count)
	}

	pub(crate) fn read_std<W: Write>(&mut self, writer: &mut W, count: usize) -> Result<usize> {
		self.read_segments(count, |data|
			writer.write(data).map_err(|err| Error::io(BufRead, err))
		)
	}

	/// Discards up to `count` bytes from the head, returning the number skipped.
	pub fn skip(&mut self, mut count: usize) -> Result<usize> {
		count = min(count, self.count());
		let skipped = count;
		while count > 0 {
			let Some(mut seg) = self.segments.pop_front() else { break };
			let n = min(count, seg.len());
			seg.consume(n);
			count -= n;
			if seg.is_empty() {
				self.pool.recycle_one(seg).context(BufRead)?;
			} else {
				self.segments.push_front(seg);
			}
		}
		Ok(skipped - count)
	}

	/// Discards all readable bytes.
	pub fn skip_all(&mut self) -> Result<usize> {
		let count = self.count();
		self.skip(count)
	}

	/// Reads bytes into a slice, returning the number of bytes read.
	pub fn read_slice(&mut self, dst: &mut [u8]) -> Result<usize> {
		let n = min(dst.len(), self.count());
		self.read_slice_exact(&mut dst[..n])?;
		Ok(n)
	}

	/// Fills `dst` exactly, or fails with an end-of-stream error consuming
	/// nothing.
	pub fn read_slice_exact(&mut self, dst: &mut [u8]) -> Result {
		if self.count() < dst.len() {
			return Err(Error::eos(BufRead))
		}

		let mut off = 0;
		self.read_segments(dst.len(), |data| {
			dst[off..off + data.len()].copy_from_slice(data);
			off += data.len();
			Ok(data.len())
		})?;
		debug_assert_eq!(off, dst.len(), "exact slice length should have been read");
		Ok(())
	}

	pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
		let mut array = [0; N];
		self.read_slice_exact(&mut array)?;
		Ok(array)
	}

	pub fn read_i8(&mut self) -> Result<i8> {
		self.read_u8().map(|n| n as i8)
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		if self.exhausted() {
			return Err(Error::eos(BufRead))
		}

		let (byte, emptied) = {
			let seg = self.segments
				.front_mut()
				.expect("non-exhausted buffer should have a front segment");
			let byte = seg.pop()
				.expect("front segment of a non-exhausted buffer should have data");
			(byte, seg.is_empty())
		};
		self.segments.consumed(1);
		if emptied {
			self.tidy().context(BufRead)?;
		}
		Ok(byte)
	}

	/// Reads up to `byte_count` bytes into an owned, contiguous [`ByteString`].
	pub fn read_byte_str(&mut self, byte_count: usize) -> Result<ByteString> {
		let len = min(byte_count, self.count());
		let mut dst = ByteString::with_capacity(len);
		self.read_segments(len, |data| {
			dst.extend_from_slice(data);
			Ok(data.len())
		})?;
		Ok(dst)
	}

	/// Reads a signed decimal integer. See
	/// [`BufSource::read_decimal_i64`](crate::streams::BufSource::read_decimal_i64).
	pub fn read_decimal_i64(&mut self) -> Result<i64> {
		let first = self.get(0).ok_or(ParseNumError::Empty)?;
		let (negative, sign_len) = match first {
			b'-' => (true, 1),
			b'+' => (false, 1),
			_ => (false, 0),
		};

		// Accumulate negated so i64::MIN parses without overflow.
		let mut value = 0i64;
		let mut digits = 0;
		while let Some(b @ b'0'..=b'9') = self.get(sign_len + digits) {
			let digit = (b - b'0') as i64;
			value = value
				.checked_mul(10)
				.and_then(|v| v.checked_sub(digit))
				.ok_or(if negative {
					ParseNumError::NegOverflow
				} else {
					ParseNumError::PosOverflow
				})?;
			digits += 1;
		}

		if digits == 0 {
			return Err(match self.get(sign_len) {
				Some(b) => ParseNumError::InvalidDigit(b),
				None if sign_len > 0 => ParseNumError::InvalidDigit(first),
				None => ParseNumError::Empty,
			}.into())
		}

		self.skip(sign_len + digits)?;
		if negative {
			Ok(value)
		} else {
			value.checked_neg().ok_or(ParseNumError::PosOverflow.into())
		}
	}

	/// Reads an unsigned hexadecimal integer. See
	/// [`BufSource::read_hex_u64`](crate::streams::BufSource::read_hex_u64).
	pub fn read_hex_u64(&mut self) -> Result<u64> {
		let mut value = 0u64;
		let mut digits = 0;
		while let Some(b) = self.get(digits) {
			let digit = match b {
				b'0'..=b'9' => b - b'0',
				b'a'..=b'f' => b - b'a' + 10,
				b'A'..=b'F' => b - b'A' + 10,
				_ => break,
			} as u64;
			if value.leading_zeros() < 4 {
				return Err(ParseNumError::PosOverflow.into())
			}
			value = value << 4 | digit;
			digits += 1;
		}

		if digits == 0 {
			return Err(match self.get(0) {
				Some(b) => ParseNumError::InvalidDigit(b),
				None => ParseNumError::Empty,
			}.into())
		}

		self.skip(digits)?;
		Ok(value)
	}

	/// Decodes exactly `byte_count` bytes as UTF-8.
	pub fn read_utf8(&mut self, byte_count: usize) -> Result<String> {
		if self.count() < byte_count {
			return Err(Error::eos(BufRead))
		}

		let mut bytes = vec![0; byte_count];
		self.read_slice_exact(&mut bytes)?;
		let str = from_utf8(&bytes).map_err(|err| Error::format(BufRead, err))?;
		Ok(str.to_owned())
	}

	/// Decodes all readable bytes as UTF-8.
	pub fn read_utf8_to_end(&mut self) -> Result<String> {
		let count = self.count();
		self.read_utf8(count)
	}

	/// Reads a line of UTF-8 text without its `\n` or `\r\n` terminator, which is
	/// consumed. The last line of a buffer may end without a terminator; `None`
	/// is returned once no bytes remain.
	pub fn read_utf8_line(&mut self) -> Result<Option<String>> {
		match self.find_byte(b'\n', 0, usize::MAX) {
			Some(terminator) => {
				let mut line = self.read_utf8(terminator)?;
				self.skip(1)?;
				if line.ends_with('\r') {
					line.pop();
				}
				Ok(Some(line))
			}
			None if self.exhausted() => Ok(None),
			None => Ok(Some(self.read_utf8_to_end()?)),
		}
	}

	/// Reads a line of UTF-8 text, failing with a format error if no terminator
	/// is found within `limit` bytes.
	pub fn read_utf8_line_strict(&mut self, limit: usize) -> Result<String> {
		match self.find_byte(b'\n', 0, limit.saturating_add(1)) {
			Some(terminator) => {
				let mut line = self.read_utf8(terminator)?;
				self.skip(1)?;
				if line.ends_with('\r') {
					line.pop();
				}
				Ok(line)
			}
			None => Err(Error::format(BufRead, LineTermNotFound {
				limit,
				buffered: min(self.count(), limit),
			})),
		}
	}

	/// Reads one UTF-8-encoded scalar value.
	pub fn read_utf8_char(&mut self) -> Result<char> {
		let lead = self.get(0).ok_or_else(|| Error::eos(BufRead))?;
		let width = match lead {
			0x00..=0x7F => 1,
			0xC2..=0xDF => 2,
			0xE0..=0xEF => 3,
			0xF0..=0xF4 => 4,
			_ => return Err(Error::format(BufRead, InvalidLeadByte(lead))),
		};
		if self.count() < width {
			return Err(Error::eos(BufRead))
		}

		let mut bytes = [0; 4];
		for (i, byte) in bytes[..width].iter_mut().enumerate() {
			*byte = self.get(i).expect("checked length above");
		}
		let str = from_utf8(&bytes[..width])
			.map_err(|err| Error::format(BufRead, err))?;
		let scalar = str.chars()
			.next()
			.expect("validated UTF-8 of nonzero width should hold a scalar");
		self.skip(width)?;
		Ok(scalar)
	}
}

macro_rules! gen_int_reads {
	($($name:ident$le_name:ident$ty:ident),+) => {
		$(
		pub fn $name(&mut self) -> Result<$ty> {
			Ok($ty::from_be_bytes(self.read_array()?))
		}

		pub fn $le_name(&mut self) -> Result<$ty> {
			Ok($ty::from_le_bytes(self.read_array()?))
		}
		)+
	};
}

impl<P: Pool> Buffer<P> {
	gen_int_reads! {
		read_u16 read_u16_le u16,
		read_u32 read_u32_le u32,
		read_u64 read_u64_le u64
	}

	pub fn read_i16(&mut self) -> Result<i16> {
		self.read_u16().map(|n| n as i16)
	}

	pub fn read_i16_le(&mut self) -> Result<i16> {
		self.read_u16_le().map(|n| n as i16)
	}

	pub fn read_i32(&mut self) -> Result<i32> {
		self.read_u32().map(|n| n as i32)
	}

	pub fn read_i32_le(&mut self) -> Result<i32> {
		self.read_u32_le().map(|n| n as i32)
	}

	pub fn read_i64(&mut self) -> Result<i64> {
		self.read_u64().map(|n| n as i64)
	}

	pub fn read_i64_le(&mut self) -> Result<i64> {
		self.read_u64_le().map(|n| n as i64)
	}

	/// Reads one big-endian `f32` by bit pattern; NaN payloads round-trip
	/// unchanged.
	pub fn read_f32(&mut self) -> Result<f32> {
		self.read_u32().map(f32::from_bits)
	}

	pub fn read_f32_le(&mut self) -> Result<f32> {
		self.read_u32_le().map(f32::from_bits)
	}

	/// Reads one big-endian `f64` by bit pattern; NaN payloads round-trip
	/// unchanged.
	pub fn read_f64(&mut self) -> Result<f64> {
		self.read_u64().map(f64::from_bits)
	}

	pub fn read_f64_le(&mut self) -> Result<f64> {
		self.read_u64_le().map(f64::from_bits)
	}
}

impl<P: Pool> Source for Buffer<P> {
	fn fill(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		self.transfer(sink, count).context(BufRead)
	}

	fn fill_all(&mut self, sink: &mut Buffer<impl Pool>) -> Result<usize> {
		let count = self.count();
		self.transfer(sink, count).context(BufRead)
	}
}

impl<P: Pool> BufStream for Buffer<P> {
	type Pool = P;
	fn buf(&self) -> &Buffer<P> { self }
	fn buf_mut(&mut self) -> &mut Buffer<P> { self }
}

impl<P: Pool> BufSource for Buffer<P> {
	fn request(&mut self, byte_count: usize) -> Result<bool> {
		Ok(self.count() >= byte_count)
	}
}
