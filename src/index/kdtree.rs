use super::Positioned;
use crate::math::Vec3;

/// Packed 2-bit flags: split axis 0/1/2 per node, 3 marks a leaf.
struct BitfieldVector {
    data: Vec<u64>,
}

const FLAG_BITS: usize = 2;
const FLAGS_PER_WORD: usize = 64 / FLAG_BITS;
const FLAG_MASK: u64 = 0b11;
const LEAF: u64 = 3;

impl BitfieldVector {
    fn new(size: usize) -> Self {
        BitfieldVector {
            data: vec![0; (size + FLAGS_PER_WORD - 1) / FLAGS_PER_WORD],
        }
    }

    fn set(&mut self, index: usize, value: u64) {
        let word = index / FLAGS_PER_WORD;
        let shift = index % FLAGS_PER_WORD * FLAG_BITS;
        self.data[word] = (self.data[word] & !(FLAG_MASK << shift)) | (value << shift);
    }

    fn get(&self, index: usize) -> u64 {
        let word = index / FLAGS_PER_WORD;
        let shift = index % FLAGS_PER_WORD * FLAG_BITS;
        (self.data[word] >> shift) & FLAG_MASK
    }
}

fn max_axis(lower: Vec3, upper: Vec3) -> usize {
    let diff = (upper - lower).abs();
    if diff.x < diff.y {
        if diff.y < diff.z {
            2
        } else {
            1
        }
    } else if diff.x < diff.z {
        2
    } else {
        0
    }
}

/// Balanced 3-d k-d tree stored implicitly in an array: the median of each
/// range is the node, halves recurse. Built by median split along the
/// widest bounding-box axis with in-place partitioning of three pre-sorted
/// index arrays through a scratch buffer; ties break on insertion index so
/// builds are deterministic.
pub struct KdTree3D<T> {
    data: Vec<T>,
    flags: BitfieldVector,
}

impl<T: Positioned + Clone> KdTree3D<T> {
    pub fn new(items: Vec<T>) -> Self {
        let size = items.len();
        let mut flags = BitfieldVector::new(size);
        if size == 0 {
            return KdTree3D { data: items, flags };
        }

        let mut lower = items[0].position();
        let mut upper = lower;
        for item in &items {
            let p = item.position();
            lower = lower.min(p);
            upper = upper.max(p);
        }

        let mut x: Vec<u32> = (0..size as u32).collect();
        let mut y = x.clone();
        let mut z = x.clone();
        let mut scratch = vec![0u32; size];

        for (axis, range) in [&mut x, &mut y, &mut z].into_iter().enumerate() {
            range.sort_unstable_by(|&a, &b| {
                let pa = items[a as usize].position().axis(axis);
                let pb = items[b as usize].position().axis(axis);
                pa.partial_cmp(&pb).unwrap().then(a.cmp(&b))
            });
        }

        {
            let mut builder = Builder {
                items: &items,
                flags: &mut flags,
                scratch: &mut scratch,
            };
            let mut subranges = [x, y, z];
            builder.build(0, size, (lower, upper), &mut subranges);
            x = std::mem::take(&mut subranges[0]);
        }

        // lay items out in node order (the x subrange after partitioning)
        let data = x.iter().map(|&i| items[i as usize].clone()).collect();
        KdTree3D { data, flags }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Invoke `visitor` for every stored item within `radius` of `center`.
    pub fn query_within_radius<F: FnMut(&T)>(&self, center: Vec3, radius: f32, mut visitor: F) {
        self.radius_search(0, self.data.len(), center, radius * radius, &mut visitor);
    }

    fn radius_search<F: FnMut(&T)>(
        &self,
        begin: usize,
        end: usize,
        center: Vec3,
        radius_squared: f32,
        visitor: &mut F,
    ) {
        if begin == end {
            return;
        }
        let median = begin + (end - begin) / 2;
        let point = self.data[median].position();
        if point.distance_squared(center) <= radius_squared {
            visitor(&self.data[median]);
        }
        let axis = self.flags.get(median);
        if axis == LEAF {
            return;
        }
        let split_distance = center.axis(axis as usize) - point.axis(axis as usize);
        if split_distance < 0.0 {
            self.radius_search(begin, median, center, radius_squared, visitor);
            if split_distance * split_distance <= radius_squared {
                self.radius_search(median + 1, end, center, radius_squared, visitor);
            }
        } else {
            self.radius_search(median + 1, end, center, radius_squared, visitor);
            if split_distance * split_distance <= radius_squared {
                self.radius_search(begin, median, center, radius_squared, visitor);
            }
        }
    }

    /// Collect up to `k` nearest items within `radius_max` of `center`.
    /// Maintains a max-heap on distance so the farthest candidate is
    /// evicted first once the heap is full.
    pub fn query_k(&self, center: Vec3, k: usize, radius_max: f32) -> Vec<T> {
        if k == 0 {
            return Vec::new();
        }
        let mut state = QueryKState {
            heap: Vec::with_capacity(k),
            capacity: k,
            limit: radius_max * radius_max,
            center,
        };
        self.query_k_range(&mut state, 0, self.data.len());
        state.heap.into_iter().map(|(_, item)| item).collect()
    }

    fn query_k_range(&self, state: &mut QueryKState<T>, begin: usize, end: usize) {
        if begin == end {
            return;
        }
        let median = begin + (end - begin) / 2;
        let point = self.data[median].position();
        let distance_squared = point.distance_squared(state.center);

        if distance_squared < state.limit {
            if state.heap.len() < state.capacity {
                heap_push(&mut state.heap, (distance_squared, self.data[median].clone()));
                if state.heap.len() == state.capacity {
                    state.limit = state.limit.min(state.heap[0].0);
                }
            } else {
                heap_pop(&mut state.heap);
                heap_push(&mut state.heap, (distance_squared, self.data[median].clone()));
                state.limit = state.limit.min(state.heap[0].0);
            }
        }

        let axis = self.flags.get(median);
        if axis == LEAF {
            return;
        }
        let split_distance = state.center.axis(axis as usize) - point.axis(axis as usize);
        if split_distance < 0.0 {
            self.query_k_range(state, begin, median);
            if split_distance * split_distance < state.limit {
                self.query_k_range(state, median + 1, end);
            }
        } else {
            self.query_k_range(state, median + 1, end);
            if split_distance * split_distance < state.limit {
                self.query_k_range(state, begin, median);
            }
        }
    }
}

struct QueryKState<T> {
    heap: Vec<(f32, T)>,
    capacity: usize,
    limit: f32,
    center: Vec3,
}

fn heap_push<T>(heap: &mut Vec<(f32, T)>, entry: (f32, T)) {
    heap.push(entry);
    let mut child = heap.len() - 1;
    while child > 0 {
        let parent = (child - 1) / 2;
        if heap[parent].0 >= heap[child].0 {
            break;
        }
        heap.swap(parent, child);
        child = parent;
    }
}

fn heap_pop<T>(heap: &mut Vec<(f32, T)>) {
    let last = heap.len() - 1;
    heap.swap(0, last);
    heap.pop();
    let mut parent = 0;
    loop {
        let left = 2 * parent + 1;
        if left >= heap.len() {
            break;
        }
        let right = left + 1;
        let bigger = if right < heap.len() && heap[right].0 > heap[left].0 {
            right
        } else {
            left
        };
        if heap[parent].0 >= heap[bigger].0 {
            break;
        }
        heap.swap(parent, bigger);
        parent = bigger;
    }
}

struct Builder<'a, T: Positioned> {
    items: &'a [T],
    flags: &'a mut BitfieldVector,
    scratch: &'a mut [u32],
}

impl<'a, T: Positioned> Builder<'a, T> {
    fn less(&self, axis: usize, a: u32, b: u32) -> bool {
        let pa = self.items[a as usize].position().axis(axis);
        let pb = self.items[b as usize].position().axis(axis);
        if pa == pb {
            a < b
        } else {
            pa < pb
        }
    }

    fn build(
        &mut self,
        begin: usize,
        end: usize,
        aabb: (Vec3, Vec3),
        subranges: &mut [Vec<u32>; 3],
    ) {
        let size = end - begin;
        if size > 1 {
            let axis = max_axis(aabb.0, aabb.1);
            let median = begin + size / 2;

            self.rearrange(axis, begin, end, median, subranges);
            self.flags.set(median, axis as u64);

            let split = self.items[subranges[axis][median] as usize]
                .position()
                .axis(axis);
            let mut left_aabb = aabb;
            let mut right_aabb = aabb;
            set_axis(&mut left_aabb.1, axis, split);
            set_axis(&mut right_aabb.0, axis, split);

            self.build(begin, median, left_aabb, subranges);
            self.build(median + 1, end, right_aabb, subranges);
        } else if size == 1 {
            self.flags.set(begin, LEAF);
        }
    }

    /// Move the median of the split axis into place in the other two index
    /// arrays, then stable-partition all three around it through the
    /// scratch buffer.
    fn rearrange(
        &mut self,
        axis: usize,
        begin: usize,
        end: usize,
        median: usize,
        subranges: &mut [Vec<u32>; 3],
    ) {
        let median_index = subranges[axis][median];

        for j in 0..3 {
            if axis != j {
                let subrange = &mut subranges[j];
                let mut itr = begin;
                while subrange[itr] != median_index {
                    itr += 1;
                }
                while itr < median {
                    subrange.swap(itr, itr + 1);
                    itr += 1;
                }
                while median < itr {
                    subrange.swap(itr - 1, itr);
                    itr -= 1;
                }
            }
        }

        for subrange in subranges.iter_mut() {
            self.scratch[begin..end].copy_from_slice(&subrange[begin..end]);

            let mut less_dst = begin;
            let mut geq_dst = median + 1;

            for src in (begin..median).chain(median + 1..end) {
                let candidate = self.scratch[src];
                if self.less(axis, candidate, median_index) {
                    subrange[less_dst] = candidate;
                    less_dst += 1;
                } else {
                    subrange[geq_dst] = candidate;
                    geq_dst += 1;
                }
            }
            debug_assert_eq!(less_dst, median);
            debug_assert_eq!(geq_dst, end);
            subrange[median] = median_index;
        }
    }
}

fn set_axis(v: &mut Vec3, axis: usize, value: f32) {
    match axis {
        0 => v.x = value,
        1 => v.y = value,
        2 => v.z = value,
        _ => unreachable!(),
    }
}
