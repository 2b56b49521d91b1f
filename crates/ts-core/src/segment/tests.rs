use super::*;
use crate::test_support::{Listing, Producer};

fn refreshed(producer: &Producer, size: u64) -> SegmentSet {
    let mut set = SegmentSet::new(producer.catalog(), size);
    set.refresh().unwrap();
    set
}

fn starts(set: &SegmentSet) -> Vec<(u64, u64, u64)> {
    set.segments()
        .iter()
        .map(|s| (s.index, s.start, s.length))
        .collect()
}

#[test]
fn empty_catalog_is_empty_window() {
    let producer = Producer::new(Listing::IndexFile);
    let set = refreshed(&producer, 100);
    assert!(set.is_empty());
    assert_eq!(set.window_start(), 0);
    assert_eq!(set.logical_end(), 0);
    assert_eq!(set.locate(0), Location::BeyondTail { end: 0 });
}

#[test]
fn segments_are_laid_out_back_to_back() {
    let mut producer = Producer::new(Listing::IndexFile);
    producer.segment(100);
    producer.segment(100);
    producer.segment(40);
    let set = refreshed(&producer, 100);

    assert_eq!(starts(&set), vec![(0, 0, 100), (1, 100, 100), (2, 200, 40)]);
    assert_eq!(set.total_logical_length(), 240);
    assert_eq!(set.logical_end(), 240);
    assert!(set.is_tail(2));
    assert!(!set.is_tail(1));
}

#[test]
fn locate_maps_offsets_into_segments() {
    let mut producer = Producer::new(Listing::Directory);
    producer.segment(100);
    producer.segment(100);
    producer.segment(40);
    let set = refreshed(&producer, 100);

    assert_eq!(
        set.locate(0),
        Location::Within {
            slot: 0,
            index: 0,
            offset: 0
        }
    );
    assert_eq!(
        set.locate(99),
        Location::Within {
            slot: 0,
            index: 0,
            offset: 99
        }
    );
    assert_eq!(
        set.locate(100),
        Location::Within {
            slot: 1,
            index: 1,
            offset: 0
        }
    );
    assert_eq!(
        set.locate(239),
        Location::Within {
            slot: 2,
            index: 2,
            offset: 39
        }
    );
    assert_eq!(set.locate(240), Location::BeyondTail { end: 240 });
    assert_eq!(set.locate(10_000), Location::BeyondTail { end: 240 });
}

#[test]
fn known_segments_keep_their_start_after_rotation() {
    let mut producer = Producer::new(Listing::IndexFile);
    producer.segment(100);
    producer.segment(100);
    producer.segment(30);
    let mut set = refreshed(&producer, 100);

    producer.append(70);
    producer.rotate_out();
    producer.segment(10);
    set.refresh().unwrap();

    assert_eq!(starts(&set), vec![(1, 100, 100), (2, 200, 100), (3, 300, 10)]);
    assert_eq!(set.window_start(), 100);
    assert_eq!(set.locate(50), Location::Gap { resume_at: 100 });
}

#[test]
fn first_refresh_after_rotation_starts_at_zero() {
    let mut producer = Producer::new(Listing::IndexFile);
    producer.segment(100);
    producer.segment(100);
    producer.rotate_out();
    let set = refreshed(&producer, 100);
    assert_eq!(starts(&set), vec![(1, 0, 100)]);
}

#[test]
fn index_jump_is_estimated_with_segment_size() {
    let mut producer = Producer::new(Listing::IndexFile);
    producer.segment(100);
    let mut set = refreshed(&producer, 100);

    // Segments 1..=3 come and go between two refreshes.
    producer.segment(100);
    producer.segment(100);
    producer.segment(100);
    producer.segment(20);
    producer.rotate_out();
    producer.rotate_out();
    producer.rotate_out();
    producer.rotate_out();
    set.refresh().unwrap();

    assert_eq!(starts(&set), vec![(4, 400, 20)]);
    assert_eq!(set.locate(150), Location::Gap { resume_at: 400 });
}

#[test]
fn missing_middle_segment_leaves_a_gap() {
    let mut producer = Producer::new(Listing::Directory);
    producer.segment(100);
    producer.segment(100);
    producer.segment(100);
    std::fs::remove_file(producer.segment_path(1)).unwrap();
    let set = refreshed(&producer, 100);

    assert_eq!(starts(&set), vec![(0, 0, 100), (2, 200, 100)]);
    assert_eq!(set.locate(150), Location::Gap { resume_at: 200 });
}

#[test]
fn sequence_restart_rebases_to_zero() {
    let mut producer = Producer::new(Listing::IndexFile);
    producer.segment(100);
    producer.segment(100);
    producer.segment(100);
    producer.rotate_out();
    let mut set = refreshed(&producer, 100);
    assert_eq!(set.window_start(), 0);
    producer.segment(50);
    set.refresh().unwrap();
    assert_eq!(set.logical_end(), 250);

    producer.restart();
    producer.segment(60);
    set.refresh().unwrap();
    assert_eq!(starts(&set), vec![(0, 0, 60)]);
    assert_eq!(set.rebases(), 1);
}

#[test]
fn restart_from_the_same_first_index_is_detected() {
    let mut producer = Producer::new(Listing::IndexFile);
    producer.segment(100);
    producer.segment(100);
    producer.segment(50);
    let mut set = refreshed(&producer, 100);
    assert_eq!(set.rebases(), 0);

    producer.restart();
    producer.segment(60);
    set.refresh().unwrap();
    assert_eq!(set.rebases(), 1);
    assert_eq!(starts(&set), vec![(0, 0, 60)]);
    assert_eq!(set.logical_end(), 60);

    producer.segment(5);
    set.refresh().unwrap();
    assert_eq!(set.rebases(), 1);
    assert_eq!(starts(&set), vec![(0, 0, 60), (1, 60, 5)]);
}

#[test]
fn anchor_survives_an_empty_listing() {
    let mut producer = Producer::new(Listing::IndexFile);
    producer.segment(100);
    producer.segment(40);
    let mut set = refreshed(&producer, 100);

    producer.rotate_out();
    producer.rotate_out();
    set.refresh().unwrap();
    assert!(set.is_empty());
    assert_eq!(set.logical_end(), 140);
    assert_eq!(set.window_start(), 140);
    assert_eq!(set.locate(20), Location::Gap { resume_at: 140 });

    producer.segment(10);
    set.refresh().unwrap();
    // The tail's last length was never confirmed final, so the nominal size
    // stands in for it.
    assert_eq!(starts(&set), vec![(2, 200, 10)]);
}

#[test]
fn observe_length_moves_the_tail_end() {
    let mut producer = Producer::new(Listing::IndexFile);
    producer.segment(100);
    producer.segment(10);
    let mut set = refreshed(&producer, 100);
    set.observe_length(1, 64);
    assert_eq!(set.logical_end(), 164);
    assert_eq!(set.get(1).map(Segment::end), Some(164));
}

#[test]
fn reset_forgets_known_segments() {
    let mut producer = Producer::new(Listing::IndexFile);
    producer.segment(100);
    producer.segment(100);
    producer.rotate_out();
    let mut set = refreshed(&producer, 100);
    set.reset();
    assert!(set.is_empty());
    assert_eq!(set.logical_end(), 0);
    set.refresh().unwrap();
    assert_eq!(starts(&set), vec![(1, 0, 100)]);
    assert_eq!(set.refreshes(), 2);
}

#[test]
fn located_bytes_match_the_producer() {
    let mut producer = Producer::new(Listing::Directory);
    producer.segment(100);
    producer.segment(100);
    producer.segment(57);
    let set = refreshed(&producer, 100);

    for o in [0u64, 1, 99, 100, 150, 199, 200, 256] {
        let Location::Within { slot, offset, .. } = set.locate(o) else {
            panic!("offset {o} not within window");
        };
        let bytes = std::fs::read(&set.segments()[slot].path).unwrap();
        assert_eq!(bytes[offset as usize], crate::test_support::byte_at(o));
    }
}
