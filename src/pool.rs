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

//! Segment recycling. The default pool has two tiers: a one-segment slot on each
//! thread, and a process-wide array of independent shards. Shards are selected by
//! hashing the current thread's id; no ordering is promised across shards. Each
//! shard holds at most [`SHARD_BUDGET`] bytes of segments; recycled segments over
//! budget are dropped. Shared segments are never recycled, their memory is still
//! viewed by another segment.

use std::cell::RefCell;
use std::cmp::min;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Mutex;
use std::thread;
use cfg_if::cfg_if;
use log::trace;
use once_cell::sync::Lazy;
use crate::{Segment, SIZE};
use crate::error::{PoolError, Result};

/// The byte budget of each shard in the process-wide tier, eight segments.
pub const SHARD_BUDGET: usize = SIZE * 8;

const MAX_SHARDS: usize = 64;

cfg_if! {
	if #[cfg(feature = "local-pool")] {
		pub type DefaultPool = LocalPool;
	} else {
		pub type DefaultPool = SharedPool;
	}
}

pub trait Pool {
	/// Claims a single segment.
	fn claim_one(&self) -> Result<Segment>;

	/// Claims segments into `target` with at least `min_size` bytes of capacity
	/// in total. Buffers reserve bulk writes through this instead of claiming
	/// one segment per fill.
	fn claim_size(&self, target: &mut impl Extend<Segment>, min_size: usize) -> Result {
		for _ in 0..min_size.div_ceil(SIZE) {
			target.extend([self.claim_one()?]);
		}
		Ok(())
	}

	/// Recycles a single segment back into the pool.
	fn recycle_one(&self, segment: Segment) -> Result;

	/// Recycles many segments back into the pool.
	fn recycle(&self, segments: impl IntoIterator<Item = Segment>) -> Result {
		for seg in segments {
			self.recycle_one(seg)?;
		}

		Ok(())
	}
}

// Shared pool

thread_local! {
	static CLAIM_SLOT: RefCell<Option<Segment>> = const { RefCell::new(None) };
}

static SHARDS: Lazy<Box<[Mutex<Vec<Segment>>]>> = Lazy::new(|| {
	let count = thread::available_parallelism()
		.map_or(4, usize::from)
		.next_power_of_two()
		.clamp(1, MAX_SHARDS);
	(0..count).map(|_| Mutex::new(Vec::new())).collect()
});

fn shard() -> &'static Mutex<Vec<Segment>> {
	let mut hasher = DefaultHasher::new();
	thread::current().id().hash(&mut hasher);
	let shards = &*SHARDS;
	&shards[hasher.finish() as usize & (shards.len() - 1)]
}

/// The default two-tier pool. All handles recycle into the same thread slot and
/// process-wide shards; claim and recycle are safe to call from any thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct SharedPool;

impl Pool for SharedPool {
	fn claim_one(&self) -> Result<Segment> {
		if let Some(seg) = CLAIM_SLOT.with(|slot| slot.borrow_mut().take()) {
			return Ok(seg)
		}

		let mut shard = shard().lock().map_err(|_| PoolError::Poisoned)?;
		Ok(shard.pop().unwrap_or_else(Segment::new))
	}

	/// Batch claim taking the thread slot and as much of one shard as a single
	/// lock yields, allocating the rest.
	fn claim_size(&self, target: &mut impl Extend<Segment>, min_size: usize) -> Result {
		let mut count = min_size.div_ceil(SIZE);
		if count == 0 {
			return Ok(())
		}

		if let Some(seg) = CLAIM_SLOT.with(|slot| slot.borrow_mut().take()) {
			target.extend([seg]);
			count -= 1;
		}

		{
			let mut shard = shard().lock().map_err(|_| PoolError::Poisoned)?;
			let pooled = min(count, shard.len());
			let from = shard.len() - pooled;
			target.extend(shard.drain(from..));
			count -= pooled;
		}

		target.extend((0..count).map(|_| Segment::new()));
		Ok(())
	}

	fn recycle_one(&self, mut segment: Segment) -> Result {
		if segment.is_shared() {
			trace!("dropped shared segment instead of recycling");
			return Ok(())
		}

		segment.clear();
		let Some(segment) = CLAIM_SLOT.with(|slot| {
			let mut slot = slot.borrow_mut();
			if slot.is_none() {
				*slot = Some(segment);
				None
			} else {
				Some(segment)
			}
		}) else {
			return Ok(())
		};

		let mut shard = shard().lock().map_err(|_| PoolError::Poisoned)?;
		if (shard.len() + 1) * SIZE <= SHARD_BUDGET {
			shard.push(segment);
		} else {
			trace!("segment pool shard over budget, dropped segment");
		}
		Ok(())
	}
}

/// Empties the thread slot and every shard, restoring the pool to its pristine
/// state. Intended for tests that assert pool neutrality.
pub fn reset() {
	CLAIM_SLOT.with(|slot| slot.borrow_mut().take());
	for shard in SHARDS.iter() {
		if let Ok(mut shard) = shard.lock() {
			shard.clear();
		}
	}
}

/// Counts the segments currently held by the calling thread's slot and all
/// shards.
pub fn pooled_segments() -> usize {
	let held = CLAIM_SLOT.with(|slot| slot.borrow().is_some()) as usize;
	SHARDS.iter()
		  .map(|shard| shard.lock().map_or(0, |shard| shard.len()))
		  .sum::<usize>() + held
}

// Local pool

thread_local! {
	static LOCAL_POOL: LocalPool = LocalPool {
		segments: Rc::default(),
	};
}

/// A single-threaded pool with no process-wide tier. Faster than [`SharedPool`],
/// but each thread recycles into its own free list.
#[derive(Clone)]
pub struct LocalPool {
	segments: Rc<RefCell<Vec<Segment>>>,
}

impl LocalPool {
	pub fn get() -> Self {
		LOCAL_POOL.with(Clone::clone)
	}
}

impl Default for LocalPool {
	fn default() -> Self { Self::get() }
}

impl Pool for LocalPool {
	fn claim_one(&self) -> Result<Segment> {
		let mut segments = self.segments
			.try_borrow_mut()
			.map_err(|_| PoolError::Borrowed)?;
		Ok(segments.pop().unwrap_or_else(Segment::new))
	}

	/// Batch claim under a single borrow of the free list.
	fn claim_size(&self, target: &mut impl Extend<Segment>, min_size: usize) -> Result {
		let count = min_size.div_ceil(SIZE);
		let mut segments = self.segments
			.try_borrow_mut()
			.map_err(|_| PoolError::Borrowed)?;
		let pooled = min(count, segments.len());
		let from = segments.len() - pooled;
		target.extend(segments.drain(from..));
		target.extend((0..count - pooled).map(|_| Segment::new()));
		Ok(())
	}

	fn recycle_one(&self, mut segment: Segment) -> Result {
		if segment.is_shared() {
			trace!("dropped shared segment instead of recycling");
			return Ok(())
		}

		segment.clear();
		self.segments
			.try_borrow_mut()
			.map_err(|_| PoolError::Borrowed)?
			.push(segment);
		Ok(())
	}
}
