// SPDX-License-Identifier: Apache-2.0

//! Pool behavior is asserted from a single test function: the pool is process
//! state, and parallel test threads would race its counters.

use std::thread;
use segio::{Buffer, Result, SIZE};
use segio::pool::{self, Pool, SharedPool};
use segio::streams::Source;

#[test]
fn pool_lifecycle() -> Result {
	pool::reset();
	assert_eq!(pool::pooled_segments(), 0);

	// Cleared buffers hand their segments back.
	let mut buf = Buffer::<SharedPool>::default();
	buf.write_from_slice(&vec![0x5A; SIZE * 3])?;
	buf.clear()?;
	assert!(pool::pooled_segments() >= 1);

	pool::reset();
	assert_eq!(pool::pooled_segments(), 0);

	// Claimed segments come back cleared, whatever they previously held.
	let mut buf = Buffer::<SharedPool>::default();
	buf.write_from_slice(&vec![0xFF; SIZE])?;
	buf.clear()?;
	let seg = SharedPool.claim_one()?;
	assert_eq!(seg.len(), 0);
	assert_eq!(seg.limit(), SIZE);
	SharedPool.recycle_one(seg)?;

	// Bulk claims cover the requested size, pooled segments first.
	let mut claimed = Vec::new();
	SharedPool.claim_size(&mut claimed, SIZE * 2 + 1)?;
	assert_eq!(claimed.len(), 3);
	assert!(claimed.iter().all(|seg| seg.len() == 0 && seg.limit() == SIZE));
	SharedPool.recycle(claimed)?;

	// Shared segments are dropped rather than recycled; the snapshot keeps its
	// bytes though its segments never re-enter the pool.
	let mut buf = Buffer::<SharedPool>::default();
	buf.write_from_slice(&vec![1; SIZE * 2])?;
	let snapshot = buf.snapshot();
	buf.clear()?;
	assert_eq!(snapshot.len(), SIZE * 2);
	assert!(snapshot.iter().all(|byte| byte == 1));

	// Recycling far more than the budget drops the excess: one slot on this
	// thread plus at most eight segments in its shard.
	pool::reset();
	for _ in 0..4 {
		let mut buf = Buffer::<SharedPool>::default();
		buf.write_from_slice(&vec![9; SIZE * 40])?;
		buf.clear()?;
	}
	assert!(pool::pooled_segments() <= 9);
	pool::reset();

	// Concurrent claim and recycle from several threads.
	let threads: Vec<_> = (0..4)
		.map(|t| thread::spawn(move || -> Result {
			for i in 0..200 {
				let mut buf = Buffer::<SharedPool>::default();
				let len = (t * 1000 + i) % (SIZE * 2) + 1;
				buf.write_from_slice(&vec![t as u8; len])?;
				let mut out = Buffer::<SharedPool>::default();
				buf.fill_all(&mut out)?;
				out.clear()?;
			}
			Ok(())
		}))
		.collect();
	for thread in threads {
		thread.join().expect("pool worker should not panic")?;
	}

	pool::reset();
	Ok(())
}
