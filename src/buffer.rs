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

mod options;
mod read;
mod write;

pub use options::BufferOptions;

use std::cmp::min;
use std::fmt;
use crate::{ByteStr, SIZE};
use crate::error::{Context::*, Error, Result, ResultExt};
use crate::pool::{DefaultPool, Pool};
use crate::segment::Segment;
use crate::segment::ring::SegmentRing;
use crate::streams::Stream;

/// An ordered deque of segments, the only stream that is simultaneously a
/// [`Source`](crate::streams::Source) and a [`Sink`](crate::streams::Sink). The
/// head segment holds the oldest bytes, the tail the newest; moving data between
/// buffers relinks or shares segments rather than copying payloads wherever the
/// [`BufferOptions`] thresholds allow.
pub struct Buffer<P: Pool = DefaultPool> {
	pool: P,
	segments: SegmentRing,
	options: BufferOptions,
}

impl<P: Pool + Default> Default for Buffer<P> {
	fn default() -> Self { Self::new(P::default()) }
}

impl<P: Pool + Default> Buffer<P> {
	/// Creates a buffer that always shares and compacts.
	pub fn lean() -> Self {
		Self::with_options(P::default(), BufferOptions::lean())
	}
}

impl<P: Pool> Buffer<P> {
	pub fn new(pool: P) -> Self {
		Self::with_options(pool, BufferOptions::default())
	}

	pub fn with_options(pool: P, options: BufferOptions) -> Self {
		Self {
			pool,
			segments: SegmentRing::default(),
			options,
		}
	}

	/// Returns the number of readable bytes in the buffer.
	pub fn count(&self) -> usize {
		self.segments.count()
	}

	/// Returns `true` if no bytes remain to be read.
	pub fn exhausted(&self) -> bool {
		self.segments.is_empty()
	}

	pub fn is_empty(&self) -> bool { self.exhausted() }

	/// Recycles all segments, resetting the count to zero.
	pub fn clear(&mut self) -> Result {
		let Self { pool, segments, .. } = self;
		pool.recycle(segments.drain_all()).context(BufClear)
	}

	/// Returns the byte at `pos`, or `None` if `pos` is at or past the end.
	pub fn get(&self, mut pos: usize) -> Option<u8> {
		for seg in self.segments.iter() {
			let data = seg.data();
			if pos < data.len() {
				return Some(data[pos])
			}
			pos -= data.len();
		}
		None
	}

	/// Scans for `byte` in `[from, to)`, returning its position. The scan is
	/// linear across segments and stops at the first match, at `to`, or at the
	/// end of the buffer.
	pub fn find_byte(&self, byte: u8, from: usize, to: usize) -> Option<usize> {
		let to = min(to, self.count());
		if from >= to {
			return None
		}

		let mut base = 0;
		for seg in self.segments.iter() {
			let data = seg.data();
			let start = from.saturating_sub(base);
			if start < data.len() && base < to {
				let end = min(data.len(), to - base);
				if let Some(i) = data[start..end].iter().position(|&b| b == byte) {
					return Some(base + start + i)
				}
			}
			base += data.len();
			if base >= to {
				break
			}
		}
		None
	}

	/// Returns an independent buffer sharing this buffer's segments copy-on-write.
	/// Writes to either buffer detach the written segment, leaving the other
	/// buffer's bytes unaffected.
	pub fn copy(&self) -> Self where P: Clone {
		let mut copy = Self::with_options(self.pool.clone(), self.options);
		for seg in self.segments.iter() {
			if !seg.is_empty() {
				copy.segments.push_back(seg.share_all());
			}
		}
		copy
	}

	/// Shares `count` bytes starting at `offset` into `dest` without consuming
	/// them, copy-on-write.
	pub fn copy_to(
		&self,
		dest: &mut Buffer<impl Pool>,
		mut offset: usize,
		mut count: usize,
	) -> Result {
		if offset.checked_add(count).map_or(true, |end| end > self.count()) {
			return Err(Error::invalid_input(BufCopy, "copy range out of bounds"))
		}

		for seg in self.segments.iter() {
			if count == 0 {
				break
			}
			let len = seg.len();
			if offset >= len {
				offset -= len;
				continue
			}
			let take = min(len - offset, count);
			dest.segments.push_back(seg.share_slice(offset, take));
			offset = 0;
			count -= take;
		}
		Ok(())
	}

	/// Returns an immutable byte string of the whole buffer without copying. The
	/// snapshot stays valid when the buffer is later written: writers detach
	/// shared segments, preserving the snapshot's bytes.
	pub fn snapshot(&self) -> ByteStr {
		ByteStr::from_segments(
			self.segments
				.iter()
				.filter(|seg| !seg.is_empty())
				.map(Segment::share_all)
		)
	}

	/// Rewrites fragmented segments into the fewest possible, copying shared
	/// memory. Triggered automatically when fragmentation passes the
	/// [compact threshold](BufferOptions), or manually here.
	pub fn compact(&mut self) -> Result {
		if self.segments.fragment_len() == 0 {
			return Ok(())
		}

		let Self { pool, segments, .. } = self;
		let mut staged = SegmentRing::default();
		pool.claim_size(&mut staged, segments.count()).context(BufCompact)?;

		let mut compacted = SegmentRing::default();
		while let Some(mut seg) = segments.pop_front() {
			while !seg.is_empty() {
				if compacted.back().map_or(true, Segment::is_full) {
					compacted.push_back(staged.pop_front().unwrap_or_default());
				}
				let n = {
					let tail = compacted.back_mut()
						.expect("compacted ring should have a writable tail");
					seg.move_into(tail, seg.len())
				};
				compacted.added(n);
			}
			pool.recycle_one(seg).context(BufCompact)?;
		}
		pool.recycle(staged.drain_all()).context(BufCompact)?;
		*segments = compacted;
		Ok(())
	}

	/// Moves up to `count` bytes from the head of this buffer to the tail of
	/// `dest`, relinking whole segments, sharing large partial heads, and copying
	/// small ones. Returns the number of bytes moved.
	pub(crate) fn transfer(
		&mut self,
		dest: &mut Buffer<impl Pool>,
		mut count: usize,
	) -> Result<usize> {
		count = min(count, self.count());
		let moved = count;

		while count > 0 {
			let Some(mut seg) = self.segments.pop_front() else { break };
			if seg.is_empty() {
				self.pool.recycle_one(seg).context(BufRead)?;
				continue
			}

			if seg.len() <= count {
				count -= seg.len();
				if seg.len() <= dest.options.share_threshold() &&
					dest.tail_limit() >= seg.len() {
					// Fold small segments into the destination tail.
					let len = seg.len();
					let folded = {
						let tail = dest.segments.back_mut()
							.expect("destination tail should exist with a nonzero limit");
						seg.move_into(tail, len)
					};
					dest.segments.added(folded);
					self.pool.recycle_one(seg).context(BufRead)?;
				} else {
					dest.segments.push_back(seg);
				}
			} else {
				// Split the head: share above the threshold, copy below it to
				// avoid long-lived slivers.
				if count >= self.options.share_threshold() {
					dest.segments.push_back(seg.share(count));
					seg.consume(count);
				} else {
					let mut remaining = count;
					while remaining > 0 {
						let n = {
							let tail = dest.writable(1)?;
							seg.move_into(tail, remaining)
						};
						dest.segments.added(n);
						remaining -= n;
					}
				}
				count = 0;
				self.segments.push_front(seg);
			}
		}

		if dest.segments.fragment_len() > dest.options.compact_threshold() {
			dest.compact()?;
		}
		Ok(moved)
	}

	/// Returns the tail segment if it has at least `min_capacity` writable bytes,
	/// otherwise appends a fresh segment from the pool and returns that.
	pub(crate) fn writable(&mut self, min_capacity: usize) -> Result<&mut Segment> {
		debug_assert!(min_capacity <= SIZE, "min_capacity exceeds the segment size");
		if self.tail_limit() < min_capacity {
			let seg = self.pool.claim_one().context(BufWrite)?;
			self.segments.push_back(seg);
		}

		Ok(
			self.segments
				.back_mut()
				.expect("buffer should have a writable segment after claiming")
		)
	}

	/// Recycles empty segments from both ends of the ring.
	pub(crate) fn tidy(&mut self) -> Result {
		while self.segments.front().is_some_and(Segment::is_empty) {
			let Some(seg) = self.segments.pop_front() else { break };
			self.pool.recycle_one(seg)?;
		}
		while self.segments.back().is_some_and(Segment::is_empty) {
			let Some(seg) = self.segments.pop_back() else { break };
			self.pool.recycle_one(seg)?;
		}
		Ok(())
	}

	/// Bytes held in segments that can take no further writes; a partial tail is
	/// left in place for future appends.
	pub(crate) fn complete_segment_bytes(&self) -> usize {
		let partial_tail = self.segments
			.back()
			.map_or(0, |tail| if tail.limit() > 0 { tail.len() } else { 0 });
		self.count() - partial_tail
	}

	pub(crate) fn front_data(&self) -> &[u8] {
		self.segments.front().map_or(&[], Segment::data)
	}

	fn tail_limit(&self) -> usize {
		self.segments.back().map_or(0, Segment::limit)
	}
}

impl Buffer {
	/// Creates a default-pooled buffer holding a copy of `value`.
	pub fn from_slice(value: &[u8]) -> Result<Self> {
		let mut buf = Self::default();
		buf.write_from_slice(value)?;
		Ok(buf)
	}
}

impl<P: Pool> Stream for Buffer<P> {
	/// Closing a buffer is a no-op. A buffer used as the far end of a stream
	/// chain keeps its bytes readable after the chain closes; segments are
	/// released by [`clear`](Buffer::clear) or on drop.
	fn close(&mut self) -> Result { Ok(()) }
}

impl<P: Pool> Drop for Buffer<P> {
	fn drop(&mut self) {
		let _ = self.clear();
	}
}

impl<P: Pool> fmt::Debug for Buffer<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Buffer")
		 .field("count", &self.count())
		 .field("segments", &self.segments.len())
		 .finish_non_exhaustive()
	}
}

