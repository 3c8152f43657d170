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
use std::io::Read;
use arrayvec::ArrayVec;
use crate::{Buffer, ByteStr, ByteString};
use crate::error::{Context::BufWrite, Error, Result, ResultExt};
use crate::pool::Pool;
use crate::segment::ring::SegmentRing;
use crate::streams::{BufSink, Sink};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

impl<P: Pool> Buffer<P> {
	/// Writes up to `max_count` bytes through `write`, called with successive
	/// writable segment windows and returning the number of bytes it produced. A
	/// count above the given window fails with an invalid-input error. Writing
	/// stops when `write` leaves part of its window unfilled.
	///
	/// This is the raw write surface backing the `std::io` bridges; most callers
	/// want the typed write operations instead.
	pub fn write_segments(
		&mut self,
		mut max_count: usize,
		mut write: impl FnMut(&mut [u8]) -> Result<usize>,
	) -> Result<usize> {
		let mut count = 0;
		while max_count > 0 {
			let (written, window) = {
				let seg = self.writable(1)?;
				let window = min(max_count, seg.limit());
				let written = write(&mut seg.data_mut()[..window])?;
				if written > window {
					return Err(Error::invalid_input(
						BufWrite,
						"callback produced more bytes than its window",
					))
				}
				seg.add(written);
				(written, window)
			};

			self.segments.added(written);
			count += written;
			max_count -= written;
			if written < window || written == 0 {
				break
			}
		}

		self.tidy().context(BufWrite)?;
		Ok(count)
	}

	pub(crate) fn write_std<R: Read>(&mut self, reader: &mut R, count: usize) -> Result<usize> {
		self.write_segments(count, |data|
			reader.read(data).map_err(|err| Error::io(BufWrite, err))
		)
	}

	/// Writes all bytes of `value`, reserving the segments it needs beyond the
	/// tail's capacity in one bulk claim.
	pub fn write_from_slice(&mut self, value: &[u8]) -> Result {
		let mut staged = SegmentRing::default();
		let shortfall = value.len().saturating_sub(self.tail_limit());
		if shortfall > 0 {
			self.pool
				.claim_size(&mut staged, shortfall)
				.context(BufWrite)?;
		}

		let mut off = 0;
		while off < value.len() {
			if self.tail_limit() == 0 {
				self.segments.push_back(staged.pop_front().unwrap_or_default());
			}
			let n = {
				let seg = self.segments
					.back_mut()
					.expect("buffer should have a writable tail");
				seg.push_slice(&value[off..])
			};
			self.segments.added(n);
			off += n;
		}

		self.pool.recycle(staged.drain_all()).context(BufWrite)
	}

	/// Writes `value` UTF-8 encoded.
	pub fn write_utf8(&mut self, value: &str) -> Result {
		self.write_from_slice(value.as_bytes())
	}

	/// Writes one UTF-8-encoded scalar value, one to four bytes.
	pub fn write_char(&mut self, value: char) -> Result {
		let mut bytes = [0; 4];
		self.write_from_slice(value.encode_utf8(&mut bytes).as_bytes())
	}

	pub fn write_i8(&mut self, value: i8) -> Result {
		self.write_u8(value as u8)
	}

	pub fn write_u8(&mut self, value: u8) -> Result {
		self.write_from_slice(&[value])
	}

	/// Writes the ASCII decimal representation of `value`: a `-` sign for
	/// negative values, then the minimum number of digits.
	pub fn write_decimal_i64(&mut self, value: i64) -> Result {
		let mut digits = ArrayVec::<u8, 20>::new();
		let mut magnitude = value.unsigned_abs();
		loop {
			digits.push(HEX_DIGITS[(magnitude % 10) as usize]);
			magnitude /= 10;
			if magnitude == 0 {
				break
			}
		}
		if value < 0 {
			digits.push(b'-');
		}
		digits.reverse();
		self.write_from_slice(&digits)
	}

	/// Writes the lowercase hexadecimal representation of `value`, without
	/// leading zeros (`0` writes as `"0"`).
	pub fn write_hex_u64(&mut self, value: u64) -> Result {
		let mut digits = ArrayVec::<u8, 16>::new();
		let mut rest = value;
		loop {
			digits.push(HEX_DIGITS[(rest & 0xF) as usize]);
			rest >>= 4;
			if rest == 0 {
				break
			}
		}
		digits.reverse();
		self.write_from_slice(&digits)
	}

	/// Writes a [`ByteStr`] by sharing its segments, copy-on-write; no payload
	/// bytes are copied.
	pub fn write_byte_str(&mut self, value: &ByteStr) -> Result {
		for seg in value.segments() {
			if !seg.is_empty() {
				self.segments.push_back(seg.share_all());
			}
		}

		if self.segments.fragment_len() > self.options.compact_threshold() {
			self.compact()?;
		}
		Ok(())
	}

	/// Writes the bytes of a contiguous [`ByteString`].
	pub fn write_byte_string(&mut self, value: &ByteString) -> Result {
		self.write_from_slice(value.as_slice())
	}
}

macro_rules! gen_int_writes {
	($($name:ident$le_name:ident$ty:ident),+) => {
		$(
		pub fn $name(&mut self, value: $ty) -> Result {
			self.write_from_slice(&value.to_be_bytes())
		}

		pub fn $le_name(&mut self, value: $ty) -> Result {
			self.write_from_slice(&value.to_le_bytes())
		}
		)+
	};
}

impl<P: Pool> Buffer<P> {
	gen_int_writes! {
		write_i16 write_i16_le i16,
		write_u16 write_u16_le u16,
		write_i32 write_i32_le i32,
		write_u32 write_u32_le u32,
		write_i64 write_i64_le i64,
		write_u64 write_u64_le u64
	}

	/// Writes one big-endian `f32` by bit pattern; NaN payloads round-trip
	/// unchanged.
	pub fn write_f32(&mut self, value: f32) -> Result {
		self.write_u32(value.to_bits())
	}

	pub fn write_f32_le(&mut self, value: f32) -> Result {
		self.write_u32_le(value.to_bits())
	}

	/// Writes one big-endian `f64` by bit pattern; NaN payloads round-trip
	/// unchanged.
	pub fn write_f64(&mut self, value: f64) -> Result {
		self.write_u64(value.to_bits())
	}

	pub fn write_f64_le(&mut self, value: f64) -> Result {
		self.write_u64_le(value.to_bits())
	}
}

impl<P: Pool> Sink for Buffer<P> {
	fn drain(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if source.count() < count {
			return Err(Error::invalid_input(
				BufWrite,
				"source holds fewer bytes than requested",
			))
		}
		source.transfer(self, count).context(BufWrite)
	}

	fn drain_all(&mut self, source: &mut Buffer<impl Pool>) -> Result<usize> {
		let count = source.count();
		source.transfer(self, count).context(BufWrite)
	}
}

impl<P: Pool> BufSink for Buffer<P> { }
