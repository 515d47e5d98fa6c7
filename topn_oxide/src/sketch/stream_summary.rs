//! Stream-Summary: the Space-Saving sketch with per-item error accounting
//!
//! The Space-Saving algorithm (Metwally et al., 2005) finds the most frequent
//! items in a data stream using a fixed number of counters. This implementation
//! uses the original Stream-Summary layout: items with identical counts share a
//! bucket, and the buckets form a doubly linked list sorted ascending by count.
//! Incrementing an item moves it to the neighbouring bucket in O(1); the
//! minimum bucket is always the list head, so victim selection on overflow is
//! also O(1).
//!
//! # Algorithm
//!
//! The sketch tracks at most `capacity` items. When an item arrives:
//! 1. If the item is tracked, move it one bucket up (count + 1).
//! 2. Else if a slot is free, admit it with count 1 and overestimation 0.
//! 3. Else replace the first-inserted item of the minimum bucket: the new item
//!    enters with count `min_count + 1` and overestimation `min_count`.
//!
//! The overestimation records how much of a tracked count may belong to evicted
//! predecessors: the true count always lies in `[count - overestimation, count]`.
//!
//! Unlike the plain algorithm, every element carries its own overestimation so
//! that sketches built on disjoint partitions of a stream can later be merged
//! with exact error accounting (see [`aggregate_summaries`](crate::sketch::aggregate_summaries)).
//!
//! # Ownership layout
//!
//! Buckets and elements live in two arena `Vec`s and reference each other by
//! index, which avoids reference cycles between an element and its parent
//! bucket. Element slots are never freed: an eviction overwrites the victim's
//! slot in place, so the element arena length always equals the number of
//! tracked items. Bucket slots are recycled through a free list.
//!
//! # Determinism
//!
//! Each bucket keeps its elements in arrival order (the order in which they
//! entered that bucket). The eviction victim is the first-inserted element of
//! the minimum bucket, and [`StreamSummary::topk`] reports equal-count items in
//! bucket arrival order. Both orders are stable across runs.
//!
//! # References
//!
//! - Metwally, A., Agrawal, D., & El Abbadi, A. (2005). "Efficient computation
//!   of frequent and top-k elements in data streams"
//!
//! # Examples
//!
//! ```
//! use topn_oxide::sketch::StreamSummary;
//!
//! let mut sketch: StreamSummary<&str> = StreamSummary::new(2).unwrap();
//! for item in ["a", "b", "c"] {
//!     sketch.insert(item);
//! }
//!
//! // "c" replaced "a" (the first-inserted item of the minimum bucket) and
//! // inherited its count as overestimation.
//! assert_eq!(sketch.len(), 2);
//! assert_eq!(sketch.count(&"c"), Some(2));
//! assert_eq!(sketch.overestimation(&"c"), 1);
//! assert_eq!(sketch.count(&"b"), Some(1));
//! assert!(!sketch.contains(&"a"));
//! ```

use crate::common::validation::validate_capacity;
use crate::common::{Result, SketchError};
use std::collections::HashMap;
use std::hash::Hash;

/// Metadata for one tracked item
#[derive(Debug, Clone)]
struct Element<T> {
    /// The tracked item
    item: T,
    /// Arena index of the parent bucket
    bucket: usize,
    /// Amount by which this item's count may exceed its true count
    overestimation: u64,
    /// Previous element in the same bucket (towards the first-inserted)
    prev: Option<usize>,
    /// Next element in the same bucket (towards the last-inserted)
    next: Option<usize>,
}

/// A node of the count-sorted bucket list; holds all items sharing one count
#[derive(Debug, Clone)]
struct Bucket {
    /// The count shared by every element in this bucket
    count: u64,
    /// First-inserted element (eviction victim when this is the minimum bucket)
    head: Option<usize>,
    /// Last-inserted element
    tail: Option<usize>,
    /// Number of elements in this bucket
    len: usize,
    /// Bucket with the next smaller count
    prev: Option<usize>,
    /// Bucket with the next larger count
    next: Option<usize>,
}

/// Space-Saving sketch over a bounded set of counters
///
/// Tracks at most `capacity` items together with estimated counts and per-item
/// overestimation values. Single-writer: a sketch is owned by one stream
/// partition for the duration of a window, then read by the aggregator.
///
/// # Type Parameters
///
/// - `T`: The item type, must implement `Hash`, `Eq`, and `Clone`
///
/// # Space Complexity
///
/// O(capacity) — one element slot per tracked item plus at most one bucket per
/// distinct count value.
///
/// # Time Complexity
///
/// - `insert`: O(1) amortized
/// - `merge_element`: O(buckets crossed) for the bucket-list splice
/// - `topk`: O(tracked items)
#[derive(Debug, Clone)]
pub struct StreamSummary<T> {
    /// Maximum number of items tracked by `insert`
    capacity: usize,
    /// Item -> element arena index
    index: HashMap<T, usize>,
    /// Element arena; slots are reused in place on eviction, never freed
    elements: Vec<Element<T>>,
    /// Bucket arena; freed slots are recycled through `free_buckets`
    buckets: Vec<Bucket>,
    /// Count -> bucket arena index
    bucket_index: HashMap<u64, usize>,
    /// Recycled bucket slots
    free_buckets: Vec<usize>,
    /// Head of the bucket list (smallest count)
    min_bucket: Option<usize>,
    /// Tail of the bucket list (largest count)
    max_bucket: Option<usize>,
    /// Running sum of counts, equal to `sum(bucket.count * bucket.len)`
    total: u64,
    /// Cached maximum overestimation across tracked elements
    max_overestimation: u64,
    /// Items ever admitted; not decremented on eviction
    total_distinct: u64,
}

impl<T: Hash + Eq + Clone> StreamSummary<T> {
    /// Creates a new Stream-Summary sketch
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of items to track (must be >= 1)
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `capacity` is 0 or unreasonably large.
    ///
    /// # Examples
    ///
    /// ```
    /// use topn_oxide::sketch::StreamSummary;
    ///
    /// let sketch: StreamSummary<u64> = StreamSummary::new(100).unwrap();
    /// assert!(sketch.is_empty());
    /// ```
    pub fn new(capacity: usize) -> Result<Self> {
        validate_capacity(capacity as u64)?;
        Ok(Self {
            capacity,
            index: HashMap::with_capacity(capacity),
            elements: Vec::with_capacity(capacity),
            buckets: Vec::new(),
            bucket_index: HashMap::new(),
            free_buckets: Vec::new(),
            min_bucket: None,
            max_bucket: None,
            total: 0,
            max_overestimation: 0,
            total_distinct: 0,
        })
    }

    /// Inserts one occurrence of `item`
    ///
    /// If `item` is tracked, its count increases by one. Otherwise, if a slot
    /// is free, `item` is admitted with count 1 and overestimation 0. If the
    /// sketch is full, the first-inserted element of the minimum bucket is
    /// replaced: `item` takes over its slot with count `min_count + 1` and
    /// overestimation `min_count`.
    pub fn insert(&mut self, item: T) {
        if let Some(&elem) = self.index.get(&item) {
            let new_count = self.buckets[self.elements[elem].bucket].count + 1;
            self.move_element(elem, new_count);
            self.total += 1;
            return;
        }

        if self.index.len() < self.capacity {
            let bucket = match self.bucket_index.get(&1) {
                Some(&b) => b,
                None => {
                    let b = self.alloc_bucket(1);
                    self.link_bucket_after(b, None);
                    b
                }
            };
            let elem = self.elements.len();
            self.elements.push(Element {
                item: item.clone(),
                bucket,
                overestimation: 0,
                prev: None,
                next: None,
            });
            self.attach_element(elem, bucket);
            self.index.insert(item, elem);
            self.total_distinct += 1;
            self.total += 1;
            return;
        }

        let Some(min_bucket) = self.min_bucket else {
            return;
        };
        let min_count = self.buckets[min_bucket].count;
        let Some(victim) = self.buckets[min_bucket].head else {
            return;
        };

        // Reuse the victim's slot in place.
        self.detach_element(victim);
        let old_item = std::mem::replace(&mut self.elements[victim].item, item.clone());
        self.index.remove(&old_item);
        self.index.insert(item, victim);
        self.elements[victim].overestimation = min_count;
        self.max_overestimation = self.max_overestimation.max(min_count);
        self.total_distinct += 1;

        let new_count = min_count + 1;
        let target = match self.bucket_index.get(&new_count) {
            Some(&b) => b,
            None => {
                let b = self.alloc_bucket(new_count);
                self.link_bucket_after(b, Some(min_bucket));
                b
            }
        };
        self.attach_element(victim, target);
        if self.buckets[min_bucket].len == 0 {
            self.unlink_bucket(min_bucket);
        }
        self.total += 1;
    }

    /// Inserts a **new** item with an explicit count and overestimation
    ///
    /// Used when merging partial sketches, where counts and overestimations
    /// come from another sketch rather than from raw stream occurrences. This
    /// operation never evicts, so a merge target may exceed its nominal
    /// capacity; the aggregator is responsible for sizing it.
    ///
    /// # Errors
    ///
    /// - `DuplicateItem` if `item` is already tracked
    /// - `InvalidParameter` if `count` is 0 or `overestimation > count`
    pub fn insert_with_estimate(&mut self, item: T, count: u64, overestimation: u64) -> Result<()> {
        if count == 0 {
            return Err(SketchError::InvalidParameter {
                param: "count".to_string(),
                value: count.to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        if overestimation > count {
            return Err(SketchError::InvalidParameter {
                param: "overestimation".to_string(),
                value: overestimation.to_string(),
                constraint: format!("must not exceed count {}", count),
            });
        }
        if self.index.contains_key(&item) {
            return Err(SketchError::DuplicateItem);
        }

        let bucket = match self.bucket_index.get(&count) {
            Some(&b) => b,
            None => {
                let after = self.splice_point(count);
                let b = self.alloc_bucket(count);
                self.link_bucket_after(b, after);
                b
            }
        };
        let elem = self.elements.len();
        self.elements.push(Element {
            item: item.clone(),
            bucket,
            overestimation,
            prev: None,
            next: None,
        });
        self.attach_element(elem, bucket);
        self.index.insert(item, elem);
        self.max_overestimation = self.max_overestimation.max(overestimation);
        self.total_distinct += 1;
        self.total += count;
        Ok(())
    }

    /// Merges a single external element into the sketch
    ///
    /// If `item` is tracked, its count and overestimation grow by the deltas;
    /// otherwise it is inserted via [`StreamSummary::insert_with_estimate`].
    /// Merging never evicts.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `delta_count` is 0 or `delta_overestimation`
    /// exceeds `delta_count`; `DuplicateItem` cannot occur here.
    pub fn merge_element(
        &mut self,
        item: T,
        delta_count: u64,
        delta_overestimation: u64,
    ) -> Result<()> {
        let Some(&elem) = self.index.get(&item) else {
            return self.insert_with_estimate(item, delta_count, delta_overestimation);
        };
        if delta_count == 0 {
            return Err(SketchError::InvalidParameter {
                param: "delta_count".to_string(),
                value: delta_count.to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        if delta_overestimation > delta_count {
            return Err(SketchError::InvalidParameter {
                param: "delta_overestimation".to_string(),
                value: delta_overestimation.to_string(),
                constraint: format!("must not exceed delta_count {}", delta_count),
            });
        }

        let new_count = self.buckets[self.elements[elem].bucket].count + delta_count;
        self.move_element(elem, new_count);
        let overestimation = self.elements[elem].overestimation + delta_overestimation;
        self.elements[elem].overestimation = overestimation;
        self.max_overestimation = self.max_overestimation.max(overestimation);
        self.total += delta_count;
        Ok(())
    }

    /// Returns the estimated count of `item`, or `None` if it is not tracked
    pub fn count(&self, item: &T) -> Option<u64> {
        self.index
            .get(item)
            .map(|&elem| self.buckets[self.elements[elem].bucket].count)
    }

    /// Returns the overestimation associated with `item` (0 if not tracked)
    pub fn overestimation(&self, item: &T) -> u64 {
        self.index
            .get(item)
            .map_or(0, |&elem| self.elements[elem].overestimation)
    }

    /// Returns the maximum overestimation across all tracked items
    pub fn max_overestimation(&self) -> u64 {
        self.max_overestimation
    }

    /// Returns `true` if `item` is currently tracked
    pub fn contains(&self, item: &T) -> bool {
        self.index.contains_key(item)
    }

    /// Returns the sum of counts represented by the sketch
    ///
    /// Equal to `sum(bucket.count * bucket.len)` over all buckets; for a
    /// sketch fed only through [`StreamSummary::insert`] this is exactly the
    /// number of insertions.
    pub fn total_count(&self) -> u64 {
        self.total
    }

    /// Returns the number of distinct items ever admitted
    ///
    /// Grows when a new item is first admitted and is not decremented when an
    /// item is later evicted.
    pub fn distinct_count(&self) -> u64 {
        self.total_distinct
    }

    /// Returns the number of currently tracked items
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no items are tracked
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the smallest tracked count
    ///
    /// # Errors
    ///
    /// `EmptySketch` if no items are tracked.
    pub fn min_count(&self) -> Result<u64> {
        self.min_bucket
            .map(|b| self.buckets[b].count)
            .ok_or_else(|| SketchError::EmptySketch {
                operation: "min_count".to_string(),
            })
    }

    /// Returns the largest tracked count
    ///
    /// # Errors
    ///
    /// `EmptySketch` if no items are tracked.
    pub fn max_count(&self) -> Result<u64> {
        self.max_bucket
            .map(|b| self.buckets[b].count)
            .ok_or_else(|| SketchError::EmptySketch {
                operation: "max_count".to_string(),
            })
    }

    /// Iterates over `(item, count, overestimation)` for every tracked item
    ///
    /// Iteration order is the element arena order (admission order, with
    /// evicted slots reused in place); it is deterministic but not sorted.
    pub fn iter(&self) -> impl Iterator<Item = (&T, u64, u64)> + '_ {
        self.elements
            .iter()
            .map(|e| (&e.item, self.buckets[e.bucket].count, e.overestimation))
    }

    /// Iterates over `(item, count)` in descending count order
    ///
    /// Walks the bucket list from the maximum bucket backwards; equal-count
    /// items are reported in the order they entered their bucket.
    pub fn iter_descending(&self) -> DescendingIter<'_, T> {
        DescendingIter {
            summary: self,
            bucket: self.max_bucket,
            element: None,
        }
    }

    /// Returns up to `k` items in descending count order
    ///
    /// # Examples
    ///
    /// ```
    /// use topn_oxide::sketch::StreamSummary;
    ///
    /// let mut sketch = StreamSummary::new(3).unwrap();
    /// for item in ["a", "b", "a", "c", "a"] {
    ///     sketch.insert(item);
    /// }
    /// assert_eq!(sketch.topk(2), vec![("a", 3), ("b", 1)]);
    /// ```
    pub fn topk(&self, k: usize) -> Vec<(T, u64)> {
        self.iter_descending()
            .take(k)
            .map(|(item, count)| (item.clone(), count))
            .collect()
    }

    /// Moves an element to the bucket for `new_count`, creating it if needed
    ///
    /// `new_count` is always greater than the element's current count, so the
    /// splice scan starts from the old bucket and walks forward. The old
    /// bucket is unlinked if the move left it empty.
    fn move_element(&mut self, elem: usize, new_count: u64) {
        let old_bucket = self.elements[elem].bucket;
        self.detach_element(elem);

        let target = match self.bucket_index.get(&new_count) {
            Some(&b) => b,
            None => {
                let mut after = old_bucket;
                let mut cursor = self.buckets[old_bucket].next;
                while let Some(b) = cursor {
                    if self.buckets[b].count >= new_count {
                        break;
                    }
                    after = b;
                    cursor = self.buckets[b].next;
                }
                let b = self.alloc_bucket(new_count);
                self.link_bucket_after(b, Some(after));
                b
            }
        };
        self.attach_element(elem, target);
        if self.buckets[old_bucket].len == 0 {
            self.unlink_bucket(old_bucket);
        }
    }

    /// Finds the bucket after which a new bucket with `count` belongs,
    /// scanning the whole list from the minimum bucket
    fn splice_point(&self, count: u64) -> Option<usize> {
        let mut after = None;
        let mut cursor = self.min_bucket;
        while let Some(b) = cursor {
            if self.buckets[b].count >= count {
                break;
            }
            after = Some(b);
            cursor = self.buckets[b].next;
        }
        after
    }

    /// Allocates a bucket slot for `count` and registers it in the count index
    fn alloc_bucket(&mut self, count: u64) -> usize {
        let bucket = Bucket {
            count,
            head: None,
            tail: None,
            len: 0,
            prev: None,
            next: None,
        };
        let idx = match self.free_buckets.pop() {
            Some(idx) => {
                self.buckets[idx] = bucket;
                idx
            }
            None => {
                self.buckets.push(bucket);
                self.buckets.len() - 1
            }
        };
        self.bucket_index.insert(count, idx);
        idx
    }

    /// Splices `bucket` into the linked list right after `after`
    ///
    /// `None` means insert at the head. Head and tail pointers are adjusted.
    fn link_bucket_after(&mut self, bucket: usize, after: Option<usize>) {
        match after {
            None => {
                self.buckets[bucket].next = self.min_bucket;
                if let Some(head) = self.min_bucket {
                    self.buckets[head].prev = Some(bucket);
                }
                self.min_bucket = Some(bucket);
                if self.max_bucket.is_none() {
                    self.max_bucket = Some(bucket);
                }
            }
            Some(prev) => {
                let next = self.buckets[prev].next;
                self.buckets[bucket].prev = Some(prev);
                self.buckets[bucket].next = next;
                if let Some(next) = next {
                    self.buckets[next].prev = Some(bucket);
                }
                self.buckets[prev].next = Some(bucket);
                if self.max_bucket == Some(prev) {
                    self.max_bucket = Some(bucket);
                }
            }
        }
    }

    /// Removes `bucket` from the linked list, the count index, and recycles it
    fn unlink_bucket(&mut self, bucket: usize) {
        let (prev, next) = (self.buckets[bucket].prev, self.buckets[bucket].next);
        match prev {
            Some(prev) => self.buckets[prev].next = next,
            None => self.min_bucket = next,
        }
        match next {
            Some(next) => self.buckets[next].prev = prev,
            None => self.max_bucket = prev,
        }
        self.bucket_index.remove(&self.buckets[bucket].count);
        self.free_buckets.push(bucket);
    }

    /// Unlinks an element from its bucket's element list
    fn detach_element(&mut self, elem: usize) {
        let bucket = self.elements[elem].bucket;
        let (prev, next) = (self.elements[elem].prev, self.elements[elem].next);
        match prev {
            Some(prev) => self.elements[prev].next = next,
            None => self.buckets[bucket].head = next,
        }
        match next {
            Some(next) => self.elements[next].prev = prev,
            None => self.buckets[bucket].tail = prev,
        }
        self.buckets[bucket].len -= 1;
        self.elements[elem].prev = None;
        self.elements[elem].next = None;
    }

    /// Appends an element at the tail of a bucket's element list
    fn attach_element(&mut self, elem: usize, bucket: usize) {
        match self.buckets[bucket].tail {
            Some(tail) => {
                self.elements[tail].next = Some(elem);
                self.elements[elem].prev = Some(tail);
            }
            None => {
                self.buckets[bucket].head = Some(elem);
                self.elements[elem].prev = None;
            }
        }
        self.elements[elem].next = None;
        self.buckets[bucket].tail = Some(elem);
        self.buckets[bucket].len += 1;
        self.elements[elem].bucket = bucket;
    }

    /// Walks every structural invariant; test-only
    #[cfg(test)]
    fn assert_well_formed(&self) {
        let mut seen_elements = 0;
        let mut seen_buckets = 0;
        let mut total = 0u64;
        let mut last_count = None;
        let mut cursor = self.min_bucket;
        let mut prev_bucket = None;

        while let Some(b) = cursor {
            let bucket = &self.buckets[b];
            assert!(bucket.len > 0, "bucket {} with count {} is empty", b, bucket.count);
            if let Some(last) = last_count {
                assert!(bucket.count > last, "bucket counts not strictly ascending");
            }
            assert_eq!(bucket.prev, prev_bucket, "bucket back-link broken");
            assert_eq!(
                self.bucket_index.get(&bucket.count),
                Some(&b),
                "bucket index out of sync"
            );

            let mut walked = 0;
            let mut elem_cursor = bucket.head;
            let mut prev_elem = None;
            while let Some(e) = elem_cursor {
                let element = &self.elements[e];
                assert_eq!(element.bucket, b, "element parent-bucket broken");
                assert_eq!(element.prev, prev_elem, "element back-link broken");
                assert!(
                    element.overestimation <= bucket.count,
                    "overestimation exceeds count"
                );
                assert_eq!(
                    self.index.get(&element.item),
                    Some(&e),
                    "item index out of sync"
                );
                walked += 1;
                prev_elem = Some(e);
                elem_cursor = element.next;
            }
            assert_eq!(walked, bucket.len, "bucket length out of sync");
            assert_eq!(bucket.tail, prev_elem, "bucket tail out of sync");

            seen_elements += bucket.len;
            seen_buckets += 1;
            total += bucket.count * bucket.len as u64;
            last_count = Some(bucket.count);
            prev_bucket = Some(b);
            cursor = bucket.next;
        }

        assert_eq!(self.max_bucket, prev_bucket, "max bucket out of sync");
        assert_eq!(seen_buckets, self.bucket_index.len());
        assert_eq!(seen_elements, self.index.len());
        assert_eq!(seen_elements, self.elements.len());
        assert_eq!(total, self.total, "running total out of sync");
        let max_over = self
            .elements
            .iter()
            .map(|e| e.overestimation)
            .max()
            .unwrap_or(0);
        assert!(self.max_overestimation >= max_over, "max overestimation stale");
    }
}

/// Iterator over tracked items in descending count order
///
/// Created by [`StreamSummary::iter_descending`].
#[derive(Debug)]
pub struct DescendingIter<'a, T> {
    summary: &'a StreamSummary<T>,
    bucket: Option<usize>,
    element: Option<usize>,
}

impl<'a, T> Iterator for DescendingIter<'a, T> {
    type Item = (&'a T, u64);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(e) = self.element {
                let element = &self.summary.elements[e];
                self.element = element.next;
                return Some((&element.item, self.summary.buckets[element.bucket].count));
            }
            let b = self.bucket?;
            self.element = self.summary.buckets[b].head;
            self.bucket = self.summary.buckets[b].prev;
        }
    }
}
