use std::time::{Duration, Instant};

use bedrock_rak::{
    connection::queue::{FragmentQueue, FragmentQueueError, SendQueue},
    protocol::frame::FragmentMeta,
};

#[test]
fn test_proper_reordering() {
    let mut queue = FragmentQueue::new();
    let now = Instant::now();

    const SLICE_ONE: &[u8] = &[1, 2, 3, 4, 5];
    const SLICE_TWO: &[u8] = &[6, 7, 8, 9, 10];
    const SLICE_THREE: &[u8] = &[11, 12, 13, 14, 15];

    // push slice 2 first, then slice 3, then slice 1
    assert_eq!(
        queue.insert(FragmentMeta::new(3, 11, 1), SLICE_TWO, now),
        Ok(None)
    );
    assert_eq!(
        queue.insert(FragmentMeta::new(3, 11, 2), SLICE_THREE, now),
        Ok(None)
    );

    let res = queue.insert(FragmentMeta::new(3, 11, 0), SLICE_ONE, now);

    assert_eq!(
        res.unwrap(),
        Some(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15])
    );
    assert!(queue.is_empty());
}

#[test]
fn test_duplicate_keeps_first_copy() {
    let mut queue = FragmentQueue::new();
    let now = Instant::now();

    queue.insert(FragmentMeta::new(2, 4, 0), b"ab", now).unwrap();
    queue.insert(FragmentMeta::new(2, 4, 0), b"zz", now).unwrap();

    assert_eq!(
        queue.insert(FragmentMeta::new(2, 4, 1), b"cd", now),
        Ok(Some(b"abcd".to_vec()))
    );
}

#[test]
fn test_invalid_metadata_is_rejected() {
    let mut queue = FragmentQueue::new();
    let now = Instant::now();

    assert_eq!(
        queue.insert(FragmentMeta::new(0, 1, 0), b"x", now),
        Err(FragmentQueueError::FragmentInvalid)
    );
    assert_eq!(
        queue.insert(FragmentMeta::new(2, 1, 2), b"x", now),
        Err(FragmentQueueError::FrameIndexOutOfBounds)
    );
    assert_eq!(
        queue.insert(FragmentMeta::new(4096, 1, 0), b"x", now),
        Err(FragmentQueueError::TooManyFragments)
    );

    queue.insert(FragmentMeta::new(2, 1, 0), b"x", now).unwrap();
    assert_eq!(
        queue.insert(FragmentMeta::new(3, 1, 1), b"y", now),
        Err(FragmentQueueError::SizeMismatch)
    );
}

#[test]
fn test_concurrent_split_limit() {
    let mut queue = FragmentQueue::with_limits(16, 2, Duration::from_secs(30));
    let now = Instant::now();

    queue.insert(FragmentMeta::new(2, 1, 0), b"a", now).unwrap();
    queue.insert(FragmentMeta::new(2, 2, 0), b"b", now).unwrap();

    assert_eq!(
        queue.insert(FragmentMeta::new(2, 3, 0), b"c", now),
        Err(FragmentQueueError::QueueFull)
    );

    // an id already in flight can still finish
    assert_eq!(
        queue.insert(FragmentMeta::new(2, 1, 1), b"!", now),
        Ok(Some(b"a!".to_vec()))
    );
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_stale_splits_are_evicted() {
    let mut queue = FragmentQueue::with_limits(16, 4, Duration::from_secs(30));
    let start = Instant::now();

    queue.insert(FragmentMeta::new(2, 9, 0), b"old", start).unwrap();
    queue
        .insert(FragmentMeta::new(2, 10, 0), b"new", start + Duration::from_secs(20))
        .unwrap();

    let dropped = queue.prune(start + Duration::from_secs(31));
    assert_eq!(dropped, vec![9]);
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_send_queue_output_reassembles() {
    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    let mut send = SendQueue::new(1492, 1400);
    let mut queue = FragmentQueue::new();
    let now = Instant::now();

    let packets = send.packets(&payload).unwrap();
    assert_eq!(packets.len(), 4);

    let mut result = None;
    // deliver in reverse to exercise reordering
    for packet in packets.iter().rev() {
        let frame = &packet.frames[0];
        let meta = frame.fragment_meta.expect("split frame");
        assert_eq!(meta.size, 4);
        if let Some(done) = queue.insert(meta, &frame.body, now).unwrap() {
            result = Some(done);
        }
    }

    assert_eq!(result, Some(payload));
}
