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

use paste::paste;
use pretty_assertions::assert_eq;
use quickcheck_macros::quickcheck;
use segio::{Buffer, ErrorKind, Result, SIZE};
use segio::pool::DefaultPool;
use segio::streams::{Sink, Source};

macro_rules! round_trip {
	($($ty:ident: $write:ident $read:ident $write_le:ident $read_le:ident),+ $(,)?) => {
		$(paste! {
			#[quickcheck]
			fn [<round_trip_ $ty>](value: $ty) -> bool {
				let mut buf = Buffer::<DefaultPool>::default();
				buf.$write(value).unwrap();
				let be = buf.$read().unwrap() == value;
				buf.$write_le(value).unwrap();
				let le = buf.$read_le().unwrap() == value;
				be && le && buf.exhausted()
			}
		})+
	};
}

round_trip! {
	i16: write_i16 read_i16 write_i16_le read_i16_le,
	u16: write_u16 read_u16 write_u16_le read_u16_le,
	i32: write_i32 read_i32 write_i32_le read_i32_le,
	u32: write_u32 read_u32 write_u32_le read_u32_le,
	i64: write_i64 read_i64 write_i64_le read_i64_le,
	u64: write_u64 read_u64 write_u64_le read_u64_le,
}

#[quickcheck]
fn round_trip_f32_bit_exact(bits: u32) -> bool {
	let value = f32::from_bits(bits);
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_f32(value).unwrap();
	let be = buf.read_f32().unwrap().to_bits() == value.to_bits();
	buf.write_f32_le(value).unwrap();
	let le = buf.read_f32_le().unwrap().to_bits() == value.to_bits();
	be && le
}

#[quickcheck]
fn round_trip_f64_bit_exact(bits: u64) -> bool {
	let value = f64::from_bits(bits);
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_f64(value).unwrap();
	let be = buf.read_f64().unwrap().to_bits() == value.to_bits();
	buf.write_f64_le(value).unwrap();
	let le = buf.read_f64_le().unwrap().to_bits() == value.to_bits();
	be && le
}

#[test]
fn nan_payload_round_trips() -> Result {
	let bits = 0x7FF8_0000_0000_1234u64;
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_f64(f64::from_bits(bits))?;
	assert_eq!(buf.read_f64()?.to_bits(), bits);
	Ok(())
}

#[quickcheck]
fn round_trip_decimal(value: i64) -> bool {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_decimal_i64(value).unwrap();
	buf.read_decimal_i64().unwrap() == value
}

#[quickcheck]
fn round_trip_hex(value: u64) -> bool {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_hex_u64(value).unwrap();
	buf.read_hex_u64().unwrap() == value
}

#[test]
fn decimal_text() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_decimal_i64(0)?;
	buf.write_utf8(" ")?;
	buf.write_decimal_i64(-42)?;
	assert_eq!(buf.read_utf8_to_end()?, "0 -42");

	buf.write_utf8("+123!")?;
	assert_eq!(buf.read_decimal_i64()?, 123);
	// The terminating non-digit is left in place.
	assert_eq!(buf.read_u8()?, b'!');
	Ok(())
}

#[test]
fn decimal_overflow() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_utf8("9223372036854775808")?;
	let err = buf.read_decimal_i64().unwrap_err();
	assert_eq!(err.kind, ErrorKind::Format);

	buf.skip_all()?;
	buf.write_utf8("-9223372036854775808")?;
	assert_eq!(buf.read_decimal_i64()?, i64::MIN);

	buf.skip_all()?;
	buf.write_utf8("9223372036854775807")?;
	assert_eq!(buf.read_decimal_i64()?, i64::MAX);
	Ok(())
}

#[test]
fn decimal_rejects_non_digits() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_utf8("x1")?;
	assert_eq!(buf.read_decimal_i64().unwrap_err().kind, ErrorKind::Format);

	buf.skip_all()?;
	buf.write_utf8("-")?;
	assert_eq!(buf.read_decimal_i64().unwrap_err().kind, ErrorKind::Format);

	let mut empty = Buffer::<DefaultPool>::default();
	assert_eq!(empty.read_decimal_i64().unwrap_err().kind, ErrorKind::Format);
	Ok(())
}

#[test]
fn hex_text() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_hex_u64(0)?;
	assert_eq!(buf.read_utf8_to_end()?, "0");

	buf.write_hex_u64(0xDEAD_BEEF)?;
	assert_eq!(buf.read_utf8_to_end()?, "deadbeef");

	buf.write_utf8("Ff:")?;
	assert_eq!(buf.read_hex_u64()?, 0xFF);
	assert_eq!(buf.read_u8()?, b':');
	Ok(())
}

#[test]
fn hex_overflow() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_utf8("ffffffffffffffff0")?;
	assert_eq!(buf.read_hex_u64().unwrap_err().kind, ErrorKind::Format);
	Ok(())
}

#[quickcheck]
fn round_trip_utf8(value: String) -> bool {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_utf8(&value).unwrap();
	assert_eq!(buf.count(), value.len());
	buf.read_utf8(value.len()).unwrap() == value
}

#[test]
fn utf8_char() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_char('$')?;
	buf.write_char('é')?;
	buf.write_char('€')?;
	buf.write_char('𐍈')?;
	assert_eq!(buf.read_utf8_char()?, '$');
	assert_eq!(buf.read_utf8_char()?, 'é');
	assert_eq!(buf.read_utf8_char()?, '€');
	assert_eq!(buf.read_utf8_char()?, '𐍈');
	assert!(buf.exhausted());

	buf.write_from_slice(&[0xFF])?;
	assert_eq!(buf.read_utf8_char().unwrap_err().kind, ErrorKind::Format);
	Ok(())
}

#[test]
fn line_terminator_across_segment_boundary() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	let filler = vec![b'.'; SIZE - 4];
	buf.write_from_slice(&filler)?;
	// "foo\r" ends the first segment exactly; "\nbar" begins the next.
	buf.write_utf8("foo\r\nbar")?;
	buf.skip(filler.len())?;

	assert_eq!(buf.read_utf8_line()?.as_deref(), Some("foo"));
	assert_eq!(buf.read_utf8_line()?.as_deref(), Some("bar"));
	assert_eq!(buf.read_utf8_line()?, None);
	Ok(())
}

#[test]
fn line_strict_needs_terminator() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_utf8("no newline here")?;
	let err = buf.read_utf8_line_strict(8).unwrap_err();
	assert_eq!(err.kind, ErrorKind::Format);

	buf.skip_all()?;
	buf.write_utf8("12345678\nrest")?;
	assert_eq!(buf.read_utf8_line_strict(8)?, "12345678");
	assert_eq!(buf.read_utf8_to_end()?, "rest");
	Ok(())
}

#[test]
fn primitive_spanning_segments_matches_contained() -> Result {
	let value = 0xDEAD_BEEF_CAFE_F00Du64;

	let mut spanning = Buffer::<DefaultPool>::default();
	spanning.write_from_slice(&vec![0; SIZE - 3])?;
	spanning.write_u64(value)?;
	spanning.skip(SIZE - 3)?;
	assert_eq!(spanning.read_u64()?, value);

	let mut contained = Buffer::<DefaultPool>::default();
	contained.write_u64(value)?;
	assert_eq!(contained.read_u64()?, value);
	Ok(())
}

#[test]
fn reads_past_end_fail_without_consuming() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_u16(0x0102)?;
	let err = buf.read_u32().unwrap_err();
	assert_eq!(err.kind, ErrorKind::Eos);
	assert_eq!(buf.count(), 2);
	assert_eq!(buf.read_u16()?, 0x0102);
	Ok(())
}

#[test]
fn zero_byte_operations_are_no_ops() -> Result {
	let mut a = Buffer::<DefaultPool>::default();
	let mut b = Buffer::<DefaultPool>::default();
	a.write_utf8("data")?;

	assert_eq!(a.fill(&mut b, 0)?, 0);
	assert_eq!(b.drain(&mut a, 0)?, 0);
	a.write_from_slice(&[])?;
	assert_eq!(a.count(), 4);
	assert_eq!(b.count(), 0);
	Ok(())
}

#[test]
fn drain_conserves_bytes() -> Result {
	let mut src = Buffer::<DefaultPool>::default();
	let mut dst = Buffer::<DefaultPool>::default();
	let data: Vec<u8> = (0..100_000u32).map(|i| (i * 31) as u8).collect();
	src.write_from_slice(&data)?;

	dst.drain(&mut src, 70_000)?;
	assert_eq!(src.count(), 30_000);
	assert_eq!(dst.count(), 70_000);

	let head = dst.read_byte_str(70_000)?;
	assert_eq!(head.as_slice(), &data[..70_000]);
	let tail = src.read_byte_str(30_000)?;
	assert_eq!(tail.as_slice(), &data[70_000..]);
	Ok(())
}

#[test]
fn drain_more_than_available_fails() -> Result {
	let mut src = Buffer::<DefaultPool>::default();
	let mut dst = Buffer::<DefaultPool>::default();
	src.write_utf8("abc")?;
	let err = dst.drain(&mut src, 4).unwrap_err();
	assert_eq!(err.kind, ErrorKind::InvalidInput);
	Ok(())
}

#[test]
fn fill_signals_exhaustion() -> Result {
	let mut src = Buffer::<DefaultPool>::default();
	let mut dst = Buffer::<DefaultPool>::default();
	assert_eq!(src.fill(&mut dst, 10)?, 0);

	src.write_utf8("ab")?;
	assert_eq!(src.fill(&mut dst, 10)?, 2);
	assert_eq!(src.fill(&mut dst, 10)?, 0);
	Ok(())
}

#[test]
fn copy_is_independent() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_utf8("hello")?;
	let mut copy = buf.copy();

	buf.write_utf8(" world")?;
	assert_eq!(copy.count(), 5);
	copy.write_utf8(", elephants")?;

	assert_eq!(buf.read_utf8_to_end()?, "hello world");
	assert_eq!(copy.read_utf8_to_end()?, "hello, elephants");
	Ok(())
}

#[test]
fn copy_of_large_buffers_shares_segments() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	let data = vec![0xAB; SIZE * 3];
	buf.write_from_slice(&data)?;
	let mut copy = buf.copy();

	assert_eq!(copy.count(), data.len());
	let copied = copy.read_byte_str(data.len())?;
	assert_eq!(copied.as_slice(), &data[..]);
	assert_eq!(buf.count(), data.len());
	Ok(())
}

#[test]
fn snapshot_survives_later_writes() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_utf8("stable")?;
	let snapshot = buf.snapshot();

	buf.write_utf8(" and growing")?;
	assert_eq!(snapshot.len(), 6);
	assert_eq!(snapshot, b"stable".as_slice());
	assert_eq!(snapshot.utf8()?, "stable");

	buf.clear()?;
	assert_eq!(snapshot.utf8()?, "stable");
	Ok(())
}

#[test]
fn get_and_find_byte() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_from_slice(&vec![b'-'; SIZE])?;
	buf.write_utf8("needle")?;

	assert_eq!(buf.get(SIZE), Some(b'n'));
	assert_eq!(buf.get(SIZE + 6), None);
	assert_eq!(buf.find_byte(b'n', 0, usize::MAX), Some(SIZE));
	assert_eq!(buf.find_byte(b'n', SIZE + 1, usize::MAX), None);
	assert_eq!(buf.find_byte(b'e', 0, SIZE), None);
	Ok(())
}

#[test]
fn skip_across_segments() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_from_slice(&vec![1; SIZE + 100])?;
	assert_eq!(buf.skip(SIZE + 50)?, SIZE + 50);
	assert_eq!(buf.count(), 50);
	assert_eq!(buf.skip(100)?, 50);
	assert!(buf.exhausted());
	Ok(())
}

#[test]
fn byte_str_reads_and_encodes() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_from_slice(b"\x01\x02\xFF")?;
	let str = buf.read_byte_str(3)?;
	assert_eq!(str.hex_lower(), "0102ff");
	assert!(buf.exhausted());
	Ok(())
}

#[test]
fn clear_resets() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	buf.write_from_slice(&vec![7; SIZE * 2 + 17])?;
	buf.clear()?;
	assert!(buf.exhausted());
	assert_eq!(buf.count(), 0);
	// Buffers stay usable after clearing.
	buf.write_u8(1)?;
	assert_eq!(buf.read_u8()?, 1);
	Ok(())
}

#[test]
fn lean_buffers_share_and_compact() -> Result {
	let mut src = Buffer::<DefaultPool>::lean();
	let data: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
	src.write_from_slice(&data)?;

	let mut dst = Buffer::<DefaultPool>::lean();
	dst.drain(&mut src, 5_000)?;
	assert_eq!(dst.read_byte_str(5_000)?.as_slice(), &data[..5_000]);
	assert_eq!(src.read_byte_str(5_000)?.as_slice(), &data[5_000..]);
	Ok(())
}

#[test]
fn compact_preserves_content() -> Result {
	let mut buf = Buffer::with_options(
		segio::pool::DefaultPool::default(),
		segio::BufferOptions::default().set_compact_threshold(usize::MAX),
	);
	let data: Vec<u8> = (0..(SIZE * 2) as u32).map(|i| (i % 251) as u8).collect();
	buf.write_from_slice(&data)?;
	buf.skip(99)?;
	buf.compact()?;
	let rest = buf.read_byte_str(usize::MAX)?;
	assert_eq!(rest.as_slice(), &data[99..]);
	Ok(())
}
