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

use std::fmt;
use std::result;
use std::ops::Deref;
use base64::Engine;
use base64::prelude::{BASE64_STANDARD_NO_PAD, BASE64_URL_SAFE_NO_PAD};
use num_traits::{CheckedAdd, CheckedMul, CheckedSub, PrimInt};
use simdutf8::compat::from_utf8;
use crate::error::{Context::Decode, Error, ParseNumError, Result};
use crate::segment::Segment;

/// An immutable, segmented string of bytes sharing its memory copy-on-write with
/// the [`Buffer`](crate::Buffer) it was [snapshot](crate::Buffer::snapshot) from.
/// The snapshot stays stable when the buffer is later mutated; writers detach
/// shared segments before touching them.
#[derive(Default)]
pub struct ByteStr {
	segments: Vec<Segment>,
	len: usize,
}

impl ByteStr {
	/// Creates an empty byte string.
	pub fn empty() -> Self { Self::default() }

	pub(crate) fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
		let segments: Vec<_> = segments.into_iter().collect();
		let len = segments.iter().map(Segment::len).sum();
		Self { segments, len }
	}

	pub(crate) fn segments(&self) -> &[Segment] { &self.segments }

	/// Returns the length in bytes.
	pub fn len(&self) -> usize { self.len }

	pub fn is_empty(&self) -> bool { self.len == 0 }

	/// Returns the byte at `index`, or `None` if out of bounds.
	pub fn get(&self, mut index: usize) -> Option<u8> {
		for seg in &self.segments {
			let data = seg.data();
			if index < data.len() {
				return Some(data[index])
			}
			index -= data.len();
		}
		None
	}

	/// Iterates over the bytes.
	pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
		self.slices().flatten().copied()
	}

	/// Iterates over the contiguous byte slices.
	pub fn slices(&self) -> impl Iterator<Item = &[u8]> + '_ {
		self.segments.iter().map(Segment::data)
	}

	/// Copies the bytes into an owned, contiguous [`ByteString`].
	pub fn to_byte_string(&self) -> ByteString {
		let mut data = Vec::with_capacity(self.len);
		for slice in self.slices() {
			data.extend_from_slice(slice);
		}
		data.into()
	}

	/// Decodes the bytes as UTF-8.
	pub fn utf8(&self) -> Result<String> {
		self.to_byte_string().into_utf8()
	}

	/// Encodes the data into a lowercase hex string.
	pub fn hex_lower(&self) -> String {
		base16ct::lower::encode_string(&self.to_byte_string())
	}

	/// Encodes the data into an uppercase hex string.
	pub fn hex_upper(&self) -> String {
		base16ct::upper::encode_string(&self.to_byte_string())
	}

	/// Encodes the data into a Base64 string.
	pub fn base64(&self) -> String {
		BASE64_STANDARD_NO_PAD.encode(&*self.to_byte_string())
	}

	/// Encodes the data into a URL-safe Base64 string.
	pub fn base64_url(&self) -> String {
		BASE64_URL_SAFE_NO_PAD.encode(&*self.to_byte_string())
	}

	/// Parses an integer from decimal digits `0-9` with an optional leading
	/// sign.
	pub fn parse_decimal_int<N>(&self) -> result::Result<N, ParseNumError>
	where N: PrimInt + CheckedAdd + CheckedMul + CheckedSub {
		parse_int(self.iter(), 10)
	}

	/// Parses an integer from hexadecimal digits `0-9`, `a-f`, `A-F` with an
	/// optional leading sign.
	pub fn parse_hex_int<N>(&self) -> result::Result<N, ParseNumError>
	where N: PrimInt + CheckedAdd + CheckedMul + CheckedSub {
		parse_int(self.iter(), 16)
	}
}

impl Clone for ByteStr {
	fn clone(&self) -> Self {
		Self::from_segments(self.segments.iter().map(Segment::share_all))
	}
}

impl PartialEq for ByteStr {
	fn eq(&self, other: &Self) -> bool {
		self.len == other.len && self.iter().eq(other.iter())
	}
}

impl Eq for ByteStr { }

impl PartialEq<[u8]> for ByteStr {
	fn eq(&self, other: &[u8]) -> bool {
		self.len == other.len() && self.iter().eq(other.iter().copied())
	}
}

impl PartialEq<&[u8]> for ByteStr {
	fn eq(&self, other: &&[u8]) -> bool { self == *other }
}

impl fmt::Debug for ByteStr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ByteStr({})", self.hex_lower())
	}
}

/// An owned, contiguous string of bytes.
#[derive(Clone, Default, Eq, PartialEq, Hash)]
pub struct ByteString {
	data: Vec<u8>,
}

impl ByteString {
	pub fn with_capacity(capacity: usize) -> Self {
		Vec::with_capacity(capacity).into()
	}

	pub fn len(&self) -> usize { self.data.len() }

	pub fn is_empty(&self) -> bool { self.data.is_empty() }

	pub fn as_slice(&self) -> &[u8] { &self.data }

	pub fn into_vec(self) -> Vec<u8> { self.data }

	pub(crate) fn extend_from_slice(&mut self, bytes: &[u8]) {
		self.data.extend_from_slice(bytes);
	}

	/// Decodes the bytes as UTF-8, reusing the allocation.
	pub fn into_utf8(self) -> Result<String> {
		if let Err(err) = from_utf8(&self.data) {
			return Err(Error::format(Decode, err))
		}

		String::from_utf8(self.data)
			.map_err(|err| Error::format(Decode, err.utf8_error()))
	}

	/// Decodes the bytes as UTF-8.
	pub fn utf8(&self) -> Result<String> {
		self.clone().into_utf8()
	}

	/// Encodes the data into a lowercase hex string.
	pub fn hex_lower(&self) -> String {
		base16ct::lower::encode_string(&self.data)
	}

	/// Encodes the data into an uppercase hex string.
	pub fn hex_upper(&self) -> String {
		base16ct::upper::encode_string(&self.data)
	}

	/// Encodes the data into a Base64 string.
	pub fn base64(&self) -> String {
		BASE64_STANDARD_NO_PAD.encode(&self.data)
	}

	/// Encodes the data into a URL-safe Base64 string.
	pub fn base64_url(&self) -> String {
		BASE64_URL_SAFE_NO_PAD.encode(&self.data)
	}

	/// Parses an integer from decimal digits `0-9` with an optional leading
	/// sign.
	pub fn parse_decimal_int<N>(&self) -> result::Result<N, ParseNumError>
	where N: PrimInt + CheckedAdd + CheckedMul + CheckedSub {
		parse_int(self.data.iter().copied(), 10)
	}

	/// Parses an integer from hexadecimal digits `0-9`, `a-f`, `A-F` with an
	/// optional leading sign.
	pub fn parse_hex_int<N>(&self) -> result::Result<N, ParseNumError>
	where N: PrimInt + CheckedAdd + CheckedMul + CheckedSub {
		parse_int(self.data.iter().copied(), 16)
	}
}

impl From<Vec<u8>> for ByteString {
	fn from(data: Vec<u8>) -> Self { Self { data } }
}

impl From<&[u8]> for ByteString {
	fn from(data: &[u8]) -> Self { data.to_vec().into() }
}

impl From<String> for ByteString {
	fn from(data: String) -> Self { data.into_bytes().into() }
}

impl Deref for ByteString {
	type Target = [u8];
	fn deref(&self) -> &[u8] { &self.data }
}

impl AsRef<[u8]> for ByteString {
	fn as_ref(&self) -> &[u8] { &self.data }
}

impl PartialEq<[u8]> for ByteString {
	fn eq(&self, other: &[u8]) -> bool { self.data == other }
}

impl PartialEq<&[u8]> for ByteString {
	fn eq(&self, other: &&[u8]) -> bool { self.data == *other }
}

impl PartialEq<ByteStr> for ByteString {
	fn eq(&self, other: &ByteStr) -> bool { other == self.as_slice() }
}

impl PartialEq<ByteString> for ByteStr {
	fn eq(&self, other: &ByteString) -> bool { self == other.as_slice() }
}

impl fmt::Debug for ByteString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ByteString({})", self.hex_lower())
	}
}

/// Parses an integer of any primitive width from a byte iterator. Negative
/// values accumulate downward so the minimum of signed types parses without
/// overflow.
fn parse_int<N>(mut bytes: impl Iterator<Item = u8>, radix: u32) -> result::Result<N, ParseNumError>
where N: PrimInt + CheckedAdd + CheckedMul + CheckedSub {
	debug_assert!((2..=36).contains(&radix), "radix out of range");

	let first = bytes.next().ok_or(ParseNumError::Empty)?;
	let (negative, mut pending) = match first {
		b'-' => (true, None),
		b'+' => (false, None),
		_ => (false, Some(first)),
	};

	let radix_n = N::from(radix)
		.expect("a radix of at most 36 should fit in any integer type");
	let mut value = N::zero();
	let mut digits = 0;
	loop {
		let Some(byte) = pending.take().or_else(|| bytes.next()) else { break };
		let digit = (byte as char)
			.to_digit(radix)
			.and_then(N::from)
			.ok_or(ParseNumError::InvalidDigit(byte))?;
		value = if negative {
			value.checked_mul(&radix_n)
				 .and_then(|v| v.checked_sub(&digit))
				 .ok_or(ParseNumError::NegOverflow)?
		} else {
			value.checked_mul(&radix_n)
				 .and_then(|v| v.checked_add(&digit))
				 .ok_or(ParseNumError::PosOverflow)?
		};
		digits += 1;
	}

	if digits == 0 {
		return Err(ParseNumError::Empty)
	}

	Ok(value)
}
