/*
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
 */

//!
//! A bounded lock-free queue for exactly one producer and one consumer.
//!
//! Never blocks: `push` fails on a full queue, `pop` fails on an
//! empty queue. Head and tail indices are cache-line padded so the
//! producer and consumer never share a cache line.
//!

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,
}

struct Shared<T> {
    slots: Box<[Slot<T>]>,
    capacity_plus_one: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Sync for Shared<T> {}

/// Creates a bounded SPSC queue with room for `capacity` elements,
/// returning its producer and consumer halves. `capacity` must be at
/// least 2.
pub fn spsc<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity >= 2, "SPSC queue capacity must be >= 2");
    log::debug!(
        "creating SPSC queue of {} for capacity {}",
        std::any::type_name::<T>(),
        capacity
    );
    let capacity_plus_one = capacity + 1;
    let mut slots = Vec::with_capacity(capacity_plus_one);
    for _ in 0..capacity_plus_one {
        slots.push(Slot {
            value: UnsafeCell::new(MaybeUninit::uninit()),
        });
    }
    let shared = Arc::new(Shared {
        slots: slots.into_boxed_slice(),
        capacity_plus_one,
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
    });
    (
        Producer {
            shared: shared.clone(),
        },
        Consumer { shared },
    )
}

/// The producer half of an SPSC queue. Not `Clone`: construction
/// guarantees exactly one producer.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

/// The consumer half of an SPSC queue. Not `Clone`: construction
/// guarantees exactly one consumer.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

unsafe impl<T: Send> Send for Producer<T> {}
unsafe impl<T: Send> Send for Consumer<T> {}

impl<T> Producer<T> {
    /// Attempts to push `value`. Returns `Err(value)` if the queue is
    /// full, handing the value back without overwriting anything.
    pub fn push(&self, value: T) -> Result<(), T> {
        let shared = &*self.shared;
        let tail = shared.tail.load(Ordering::Relaxed);
        let next_tail = (tail + 1) % shared.capacity_plus_one;
        let head = shared.head.load(Ordering::Acquire);
        if next_tail == head {
            return Err(value);
        }
        unsafe {
            let slot = &shared.slots[tail];
            (*slot.value.get()).write(value);
        }
        shared.tail.store(next_tail, Ordering::Release);
        Ok(())
    }

    /// Number of elements currently queued, for diagnostics.
    pub fn len(&self) -> usize {
        queue_len(&self.shared)
    }

    /// True if the queue currently holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Consumer<T> {
    /// Attempts to pop the oldest queued value. Returns `None` if the
    /// queue is empty.
    pub fn pop(&self) -> Option<T> {
        let shared = &*self.shared;
        let head = shared.head.load(Ordering::Relaxed);
        let tail = shared.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let value = unsafe {
            let slot = &shared.slots[head];
            (*slot.value.get()).assume_init_read()
        };
        let next_head = (head + 1) % shared.capacity_plus_one;
        shared.head.store(next_head, Ordering::Release);
        Some(value)
    }

    /// Number of elements currently queued, for diagnostics.
    pub fn len(&self) -> usize {
        queue_len(&self.shared)
    }

    /// True if the queue currently holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn queue_len<T>(shared: &Shared<T>) -> usize {
    let head = shared.head.load(Ordering::Acquire);
    let tail = shared.tail.load(Ordering::Acquire);
    if tail >= head {
        tail - head
    } else {
        shared.capacity_plus_one - head + tail
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Drain any values still queued so their destructors run.
        let mut head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        while head != tail {
            unsafe {
                let slot = &self.slots[head];
                (*slot.value.get()).assume_init_drop();
            }
            head = (head + 1) % self.capacity_plus_one;
        }
    }
}
