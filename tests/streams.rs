// SPDX-License-Identifier: Apache-2.0

use std::io::{Read, Seek, SeekFrom, Write};
use pretty_assertions::{assert_eq, assert_str_eq};
use segio::{Buffer, ErrorKind, Result, SIZE};
use segio::pool::{DefaultPool, Pool};
use segio::streams::{
	BufSink, BufSource, ReaderSource, Sink, SinkExt, Source, SourceExt, Stream,
	WriterSink,
};

/// A source handing out its data a few bytes per fill, exercising refills.
struct ChunkedSource {
	data: Vec<u8>,
	pos: usize,
	chunk: usize,
}

impl ChunkedSource {
	fn new(data: impl Into<Vec<u8>>, chunk: usize) -> Self {
		Self {
			data: data.into(),
			pos: 0,
			chunk,
		}
	}
}

impl Stream for ChunkedSource { }

impl Source for ChunkedSource {
	fn fill(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		let n = count
			.min(self.chunk)
			.min(self.data.len() - self.pos);
		if n == 0 && count > 0 {
			return Ok(0)
		}

		sink.write_from_slice(&self.data[self.pos..self.pos + n])?;
		self.pos += n;
		Ok(n)
	}
}

/// A sink recording the size of every drain.
#[derive(Default)]
struct RecordingSink {
	bytes: Vec<u8>,
	drains: Vec<usize>,
	flushes: usize,
}

impl Stream for RecordingSink { }

impl Sink for RecordingSink {
	fn drain(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		self.drains.push(count);
		Sink::drain(&mut self.bytes, source, count)
	}

	fn flush(&mut self) -> Result {
		self.flushes += 1;
		Ok(())
	}
}

#[test]
fn request_and_require() -> Result {
	let mut source = ChunkedSource::new(*b"0123456789", 3).buffered();
	assert!(source.request(1)?);
	assert!(source.request(10)?);
	assert!(!source.request(11)?);
	source.require(10)?;
	assert_eq!(source.require(11).unwrap_err().kind, ErrorKind::Eos);
	assert_str_eq!(source.read_utf8(10)?, "0123456789");
	Ok(())
}

#[test]
fn primitive_reads_refill() -> Result {
	let mut source = ChunkedSource::new(vec![0xAB; 12], 5).buffered();
	assert_eq!(source.read_u64()?, 0xABAB_ABAB_ABAB_ABAB);
	assert_eq!(source.read_u32()?, 0xABAB_ABAB);
	assert_eq!(source.read_u8().unwrap_err().kind, ErrorKind::Eos);
	Ok(())
}

#[test]
fn find_byte_probes_past_refills() -> Result {
	let mut data = vec![b'x'; 40];
	data.push(b'!');
	let mut source = ChunkedSource::new(data, 7).buffered();
	assert_eq!(source.find_byte_within(b'!', 0, usize::MAX)?, Some(40));
	assert_eq!(source.find_byte_within(b'?', 0, usize::MAX)?, None);
	Ok(())
}

#[test]
fn decimal_across_refills() -> Result {
	let mut source = ChunkedSource::new(*b"-9223372036854775808 tail", 4).buffered();
	assert_eq!(source.read_decimal_i64()?, i64::MIN);
	assert_eq!(source.read_u8()?, b' ');
	assert_str_eq!(source.read_utf8_to_end()?, "tail");
	Ok(())
}

#[test]
fn hex_across_refills() -> Result {
	let mut source = ChunkedSource::new(*b"cafef00dZ", 2).buffered();
	assert_eq!(source.read_hex_u64()?, 0xCAFE_F00D);
	assert_eq!(source.read_u8()?, b'Z');
	Ok(())
}

#[test]
fn lines_across_refills() -> Result {
	let mut source = ChunkedSource::new(*b"one\r\ntwo\nthree", 4).buffered();
	assert_eq!(source.read_utf8_line()?.as_deref(), Some("one"));
	assert_eq!(source.read_utf8_line_strict(3)?, "two");
	assert_eq!(source.read_utf8_line()?.as_deref(), Some("three"));
	assert_eq!(source.read_utf8_line()?, None);
	Ok(())
}

#[test]
fn skip_discards_upstream() -> Result {
	let mut source = ChunkedSource::new((0..=255u8).collect::<Vec<_>>(), 9).buffered();
	assert_eq!(source.skip(200)?, 200);
	assert_eq!(source.read_u8()?, 200);
	assert_eq!(source.skip(100)?, 55);
	Ok(())
}

#[test]
fn peek_does_not_consume() -> Result {
	let mut source = ChunkedSource::new(*b"peekable bytes", 4).buffered();
	source.require(4)?;

	{
		let mut peek = source.peek().buffered();
		assert_str_eq!(peek.read_utf8(8)?, "peekable");
	}
	// A peek past the buffered window refills upstream, still without consuming.
	{
		let mut peek = source.peek().buffered();
		assert_str_eq!(peek.read_utf8(14)?, "peekable bytes");
	}

	assert_str_eq!(source.read_utf8_to_end()?, "peekable bytes");
	Ok(())
}

#[test]
fn closed_source_fails() -> Result {
	let mut source = ChunkedSource::new(*b"bytes", 5).buffered();
	source.close()?;
	source.close()?;
	assert_eq!(source.request(1).unwrap_err().kind, ErrorKind::Closed);

	let mut sink = Buffer::<DefaultPool>::default();
	assert_eq!(source.fill(&mut sink, 1).unwrap_err().kind, ErrorKind::Closed);
	Ok(())
}

#[test]
fn sink_emits_only_complete_segments() -> Result {
	let mut inner = RecordingSink::default();
	{
		let mut sink = (&mut inner).buffered();
		sink.write_from_slice(&vec![1; 100])?;
		sink.write_from_slice(&vec![2; SIZE])?;
		sink.flush()?;
		sink.close()?;
	}

	// The first write leaves a partial tail buffered; the second fills a
	// segment, emitting it; flush pushes the rest.
	assert_eq!(inner.drains, vec![SIZE, 100]);
	assert_eq!(inner.bytes.len(), SIZE + 100);
	assert!(inner.flushes >= 1);
	Ok(())
}

#[test]
fn closed_sink_fails() -> Result {
	let mut sink = Vec::new().buffered();
	sink.write_utf8("bytes")?;
	sink.close()?;
	sink.close()?;
	assert_eq!(sink.write_utf8("more").unwrap_err().kind, ErrorKind::Closed);
	assert_eq!(sink.flush().unwrap_err().kind, ErrorKind::Closed);
	Ok(())
}

#[test]
fn write_all_and_read_all() -> Result {
	let data: Vec<u8> = (0..50_000u32).map(|i| (i % 241) as u8).collect();

	let mut sink = Vec::new().buffered();
	assert_eq!(sink.write_all(&mut ChunkedSource::new(data.clone(), 1000))?, data.len());
	sink.emit()?;
	assert_eq!(sink.get_ref().len(), data.len());

	let mut source = ChunkedSource::new(data.clone(), 1000).buffered();
	let mut out = Vec::new();
	assert_eq!(source.read_all(&mut out)?, data.len());
	assert_eq!(out, data);
	Ok(())
}

#[test]
fn slice_source_and_vec_sink() -> Result {
	let mut source = b"from a slice".as_slice().buffered();
	let mut sink = Vec::new();
	source.read_all(&mut sink)?;
	assert_eq!(sink, b"from a slice");
	Ok(())
}

#[test]
fn std_io_bridges_round_trip() -> Result {
	let mut file = tempfile::tempfile().map_err(segio::Error::from)?;

	let data: Vec<u8> = (0..30_000u32).map(|i| (i % 199) as u8).collect();
	{
		let mut sink = WriterSink::new(&mut file).buffered();
		sink.write_from_slice(&data)?;
		sink.close()?;
	}

	file.seek(SeekFrom::Start(0)).map_err(segio::Error::from)?;
	let mut source = ReaderSource::new(&mut file).buffered();
	let mut out = Buffer::<DefaultPool>::default();
	let read = source.read_all(&mut out)?;
	assert_eq!(read, data.len());
	assert_eq!(out.read_byte_str(data.len())?.as_slice(), &data[..]);
	Ok(())
}

#[test]
fn buffer_implements_std_io() -> Result {
	let mut buf = Buffer::<DefaultPool>::default();
	// Disambiguated from `BufSink::write_all`, which is also in scope.
	Write::write_all(&mut buf, b"written through std::io")
		.map_err(segio::Error::from)?;

	let mut out = String::new();
	buf.read_to_string(&mut out).map_err(segio::Error::from)?;
	assert_str_eq!(out, "written through std::io");
	Ok(())
}

#[test]
fn read_slice_and_exact() -> Result {
	let mut source = ChunkedSource::new(*b"abcdefgh", 3).buffered();
	let mut four = [0; 4];
	source.read_slice_exact(&mut four)?;
	assert_eq!(&four, b"abcd");

	let mut eight = [0; 8];
	assert_eq!(source.read_slice(&mut eight)?, 4);
	assert_eq!(&eight[..4], b"efgh");

	assert_eq!(source.read_slice_exact(&mut four).unwrap_err().kind, ErrorKind::Eos);
	Ok(())
}
