use mergen::backend::block_size::{
    occupancy, select_all, KernelResources, ManualBlockSize, OccupancyBlockSize, TieBreak,
};
use mergen::backend::dispatch::{layout, pad_size, resolve_lane, resolve_lane_linear};
use mergen::backend::memory::{MemoryPlanner, MemorySpace};
use mergen::backend::Kernel;
use mergen::config::{DeviceProps, KernelBlockSizes};
use mergen::Error;

struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: u64) -> u32 {
        (self.next() % n) as u32
    }
}

fn random_groups(rng: &mut XorShift) -> Vec<Vec<u32>> {
    (0..1 + rng.below(5))
        .map(|_| (0..1 + rng.below(6)).map(|_| 1 + rng.below(300)).collect())
        .collect()
}

// ── lane resolution ──

#[test]
fn test_binary_search_matches_linear_walk() {
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
    for _ in 0..200 {
        let groups = random_groups(&mut rng);
        let block_size = 32 << rng.below(3);
        let ranges = layout(&groups, block_size);
        let end = ranges.last().map(|r| r.end()).unwrap_or(0);
        for id in 0..end + block_size {
            assert_eq!(
                resolve_lane(&ranges, id),
                resolve_lane_linear(&groups, block_size, id),
                "groups {:?}, block size {}, id {}",
                groups,
                block_size,
                id
            );
        }
    }
}

#[test]
fn test_ranges_are_padded_and_contiguous() {
    let mut rng = XorShift(42);
    for _ in 0..100 {
        let groups = random_groups(&mut rng);
        let ranges = layout(&groups, 64);
        let mut next = 0;
        for (range, sizes) in ranges.iter().zip(&groups) {
            assert_eq!(range.id_start, next);
            assert_eq!(range.start_ids[0], range.id_start);
            assert!(range.start_ids.iter().all(|s| s % 64 == 0));
            assert!(range.start_ids.windows(2).all(|w| w[0] < w[1]));
            let padded: u32 = sizes.iter().map(|&s| pad_size(s, 64)).sum();
            assert_eq!(range.padded_size, padded);
            next = range.end();
        }
    }
}

#[test]
fn test_padding_lanes_resolve_to_owner() {
    let ranges = layout(&[vec![40, 130]], 32);
    // Lane 50 is padding of the first member; the body's size guard skips it.
    assert_eq!(resolve_lane(&ranges, 50), Some((0, 0, 50)));
    assert_eq!(resolve_lane(&ranges, 64), Some((0, 1, 0)));
    assert_eq!(resolve_lane(&ranges, 224), None);
}

// ── block sizes ──

#[test]
fn test_occupancy_tie_break() {
    let device = DeviceProps::reference();
    let resources = KernelResources::estimate(Kernel::CustomUpdate);
    assert_eq!(occupancy(32, &resources, &device), 32);
    assert_eq!(occupancy(64, &resources, &device), 64);
    assert_eq!(occupancy(2048, &resources, &device), 0);

    let smallest = select_all(&OccupancyBlockSize { tie_break: TieBreak::Smallest }, &device);
    let largest = select_all(&OccupancyBlockSize { tie_break: TieBreak::Largest }, &device);
    assert_eq!(smallest.get(Kernel::CustomUpdate), 64);
    assert_eq!(largest.get(Kernel::CustomUpdate), 1024);
}

#[test]
fn test_manual_sizes_pass_through() {
    let mut sizes = KernelBlockSizes::uniform(32);
    sizes.set(Kernel::InitializeSparse, 128);
    let selected = select_all(&ManualBlockSize { sizes }, &DeviceProps::reference());
    assert_eq!(selected.get(Kernel::CustomUpdate), 32);
    assert_eq!(selected.get(Kernel::InitializeSparse), 128);
}

// ── memory placement ──

#[test]
fn test_first_fit_placement() {
    let mut planner = MemoryPlanner::new(vec![MemorySpace::new("constant", 100), MemorySpace::new("global", 1000)]);
    assert_eq!(planner.place("A", 60).unwrap(), "constant");
    assert_eq!(planner.place("B", 60).unwrap(), "global");
    assert_eq!(planner.place("C", 39).unwrap(), "constant");
    assert_eq!(planner.spaces()[0].remaining, 1);
    assert_eq!(planner.spaces()[1].remaining, 940);

    // A space must have strictly more room than requested.
    assert_eq!(planner.place("D", 940).unwrap_err().to_string(), Error::NoMemorySpace {
        name: "D".to_string(),
        bytes: 940,
    }
    .to_string());
}
