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
use crate::{Buffer, SIZE};
use crate::error::{Context::*, Error, Result, ResultExt};
use crate::pool::{DefaultPool, Pool};
use crate::streams::{BufSink, BufSource, BufStream, Sink, Source, Stream};

/// A [`Source`] wrapper amortizing raw reads through an internal [`Buffer`],
/// unlocking the full [`BufSource`] read surface.
pub struct BufferedSource<S: Source> {
	buffer: Buffer,
	source: S,
	closed: bool,
}

impl<S: Source> BufferedSource<S> {
	pub(crate) fn new(source: S) -> Self {
		Self {
			buffer: Buffer::default(),
			source,
			closed: false,
		}
	}

	/// Returns a source reading this source's bytes without consuming them. The
	/// peeked source may read past the currently buffered bytes; it refills from
	/// the underlying stream, and refilled bytes stay visible here.
	pub fn peek(&mut self) -> PeekSource<'_, S> {
		PeekSource {
			source: self,
			offset: 0,
		}
	}

	pub fn get_ref(&self) -> &S { &self.source }

	/// Fills the buffer from the underlying source, rounding the request up to
	/// the nearest segment size. Returns `false` once the source is exhausted.
	fn fill_buf(&mut self, byte_count: usize) -> Result<bool> {
		let count = self.buffer.count();
		let seg_count = count.saturating_add(byte_count).div_ceil(SIZE);
		let byte_count = seg_count.saturating_mul(SIZE) - count;

		match self.source.fill(&mut self.buffer, byte_count) {
			Ok(n) => Ok(n > 0),
			Err(err) if err.is_eos() => Ok(false),
			Err(err) => Err(err.with_context(Fill)),
		}
	}
}

impl<S: Source> Stream for BufferedSource<S> {
	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(())
		}
		self.closed = true;

		// Both need a chance to run before returning an error.
		let buf = self.buffer.clear().context(Close);
		let source = self.source.close();
		buf?;
		source
	}
}

impl<S: Source> Source for BufferedSource<S> {
	fn fill(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if self.closed {
			return Err(Error::closed(Fill))
		}
		if count == 0 {
			return Ok(0)
		}

		if self.buffer.exhausted() && !self.fill_buf(min(count, SIZE))? {
			return Ok(0)
		}
		self.buffer.fill(sink, count)
	}
}

impl<S: Source> BufStream for BufferedSource<S> {
	type Pool = DefaultPool;
	fn buf(&self) -> &Buffer { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer { &mut self.buffer }
}

impl<S: Source> BufSource for BufferedSource<S> {
	fn request(&mut self, byte_count: usize) -> Result<bool> {
		if self.closed {
			return Err(Error::closed(BufRead))
		}

		while self.buffer.count() < byte_count {
			if !self.fill_buf(byte_count - self.buffer.count())? {
				return Ok(false)
			}
		}
		Ok(true)
	}
}

impl<S: Source> Drop for BufferedSource<S> {
	fn drop(&mut self) {
		let _ = self.close();
	}
}

/// A non-consuming [`Source`] over a [`BufferedSource`]'s bytes. Output is
/// shared with the underlying buffer copy-on-write; no payload bytes are
/// copied.
pub struct PeekSource<'a, S: Source> {
	source: &'a mut BufferedSource<S>,
	offset: usize,
}

impl<S: Source> Stream for PeekSource<'_, S> { }

impl<S: Source> Source for PeekSource<'_, S> {
	fn fill(&mut self, sink: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if count == 0 {
			return Ok(0)
		}

		self.source.request(self.offset.saturating_add(min(count, SIZE)))?;
		let available = self.source.buffer.count().saturating_sub(self.offset);
		if available == 0 {
			return Ok(0)
		}

		let n = min(count, available);
		self.source.buffer.copy_to(sink, self.offset, n).context(BufRead)?;
		self.offset += n;
		Ok(n)
	}
}

/// A [`Sink`] wrapper amortizing raw writes through an internal [`Buffer`],
/// unlocking the full [`BufSink`] write surface. Writes move segments
/// downstream as they fill; [`flush`](Sink::flush) forces the partial tail out
/// too.
pub struct BufferedSink<S: Sink> {
	buffer: Buffer,
	sink: S,
	closed: bool,
}

impl<S: Sink> BufferedSink<S> {
	pub(crate) fn new(sink: S) -> Self {
		Self {
			buffer: Buffer::default(),
			sink,
			closed: false,
		}
	}

	pub fn get_ref(&self) -> &S { &self.sink }
}

impl<S: Sink> Stream for BufferedSink<S> {
	/// Closes the sink once: flushes buffered bytes if possible, closes the
	/// downstream sink, and clears the buffer. All three run; the first error
	/// wins.
	fn close(&mut self) -> Result {
		if self.closed {
			return Ok(())
		}

		let flush = self.flush();
		self.closed = true;
		let sink = self.sink.close();
		let buf = self.buffer.clear().context(Close);
		flush?;
		sink?;
		buf
	}
}

impl<S: Sink> Sink for BufferedSink<S> {
	fn drain(&mut self, source: &mut Buffer<impl Pool>, count: usize) -> Result<usize> {
		if self.closed {
			return Err(Error::closed(Drain))
		}

		let n = self.buffer.drain(source, count)?;
		self.hint_emit()?;
		Ok(n)
	}

	fn flush(&mut self) -> Result {
		if self.closed {
			return Err(Error::closed(Flush))
		}

		// Both need a chance to run before returning an error.
		let emit = self.emit();
		let flush = self.sink.flush().context(Flush);
		emit?;
		flush
	}
}

impl<S: Sink> BufStream for BufferedSink<S> {
	type Pool = DefaultPool;
	fn buf(&self) -> &Buffer { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer { &mut self.buffer }
}

impl<S: Sink> BufSink for BufferedSink<S> {
	/// Drains segments written to capacity downstream, leaving the partial tail
	/// buffered for future appends.
	fn hint_emit(&mut self) -> Result {
		if self.closed {
			return Err(Error::closed(Drain))
		}

		let complete = self.buffer.complete_segment_bytes();
		if complete > 0 {
			self.sink
				.drain(&mut self.buffer, complete)
				.context(Drain)?;
		}
		Ok(())
	}

	/// Drains the entire internal buffer downstream without flushing.
	fn emit(&mut self) -> Result {
		if self.closed {
			return Err(Error::closed(Drain))
		}

		if !self.buffer.exhausted() {
			self.sink
				.drain_all(&mut self.buffer)
				.context(Drain)?;
		}
		Ok(())
	}
}

impl<S: Sink> Drop for BufferedSink<S> {
	fn drop(&mut self) {
		let _ = self.close();
	}
}
