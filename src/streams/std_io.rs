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

//! Bridges between this crate's streams and `std::io`. Raw readers and writers
//! become [`Source`]s and [`Sink`]s through the segment windows, without
//! per-byte loops; [`Buffer`] itself implements [`Read`], [`Write`] and
//! [`BufRead`].

use std::io;
use std::io::{BufRead, Read, Write};
use crate::Buffer;
use crate::error::{Context::{Drain, Fill, Flush}, Error, Result};
use crate::pool::Pool;
use crate::streams::{Sink, Source, Stream};

/// Adapts any [`Read`] into a [`Source`].
pub struct ReaderSource<R: Read>(R);

impl<R: Read> ReaderSource<R> {
	pub fn new(reader: R) -> Self { Self(reader) }

	pub fn into_inner(self) -> R { self.0 }
}

impl<R: Read> From<R> for ReaderSource<R> {
	fn from(value: R) -> Self { Self::new(value) }
}

impl<R: Read> Stream for ReaderSource<R> { }

impl<R: Read> Source for ReaderSource<R> {
	fn fill(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		let Self(reader) = self;
		sink.write_std(reader, count)
			.map_err(|err| err.with_context(Fill))
	}
}

/// Adapts any [`Write`] into a [`Sink`].
pub struct WriterSink<W: Write>(W);

impl<W: Write> WriterSink<W> {
	pub fn new(writer: W) -> Self { Self(writer) }

	pub fn into_inner(self) -> W { self.0 }
}

impl<W: Write> From<W> for WriterSink<W> {
	fn from(value: W) -> Self { Self::new(value) }
}

impl<W: Write> Stream for WriterSink<W> { }

impl<W: Write> Sink for WriterSink<W> {
	fn drain(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if source.count() < count {
			return Err(Error::invalid_input(Drain, "source holds fewer bytes than requested"))
		}

		let Self(writer) = self;
		let mut remaining = count;
		while remaining > 0 {
			// Short writes are legal for std writers; keep going until the
			// requested count has left the buffer.
			let written = source.read_std(writer, remaining)
				.map_err(|err| err.with_context(Drain))?;
			if written == 0 {
				return Err(Error::io(
					Drain,
					io::Error::new(io::ErrorKind::WriteZero, "writer stopped accepting bytes"),
				))
			}
			remaining -= written;
		}
		Ok(count)
	}

	fn flush(&mut self) -> Result {
		self.0.flush().map_err(|err| Error::io(Flush, err))
	}
}

impl<P: Pool> Read for Buffer<P> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.read_slice(buf).map_err(Error::into_io)
	}
}

impl<P: Pool> Write for Buffer<P> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.write_from_slice(buf).map_err(Error::into_io)?;
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl<P: Pool> BufRead for Buffer<P> {
	fn fill_buf(&mut self) -> io::Result<&[u8]> {
		self.tidy().map_err(Error::into_io)?;
		Ok(self.front_data())
	}

	fn consume(&mut self, amt: usize) {
		let _ = self.skip(amt);
	}
}
