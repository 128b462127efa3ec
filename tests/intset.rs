use kvindex::{Encoding, IntSet, IntSetError};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn set_of(values: &[i64]) -> IntSet {
    let mut s = IntSet::new();
    for &v in values {
        s.add(v).expect("add");
    }
    s
}

#[test]
fn small_values_stay_sixteen_bit() {
    let mut s = set_of(&[5, 6, 4]);
    assert_eq!(s.iter().collect::<Vec<_>>(), vec![4, 5, 6]);
    assert_eq!(s.encoding(), Encoding::Int16);
    assert_eq!(s.add(4), Ok(false), "duplicate add is a no-op");
    assert_eq!(s.iter().collect::<Vec<_>>(), vec![4, 5, 6]);
}

#[test]
fn positive_value_upgrade_appends() {
    let mut s = set_of(&[32]);
    assert_eq!(s.encoding(), Encoding::Int16);
    assert_eq!(s.add(65535), Ok(true));
    assert_eq!(s.encoding(), Encoding::Int32);
    assert_eq!(s.iter().collect::<Vec<_>>(), vec![32, 65535]);
}

#[test]
fn negative_value_upgrade_prepends() {
    let mut s = set_of(&[32]);
    assert_eq!(s.add(-65535), Ok(true));
    assert_eq!(s.encoding(), Encoding::Int32);
    assert_eq!(s.iter().collect::<Vec<_>>(), vec![-65535, 32]);
}

#[test]
fn blob_round_trip_keeps_encoding() {
    let s = set_of(&[-3, 70_000, 1 << 40, 12]);
    assert_eq!(s.encoding(), Encoding::Int64);
    let blob = s.to_blob();
    assert_eq!(&blob[..4], &8u32.to_le_bytes());
    assert_eq!(&blob[4..8], &4u32.to_le_bytes());
    let back = IntSet::from_blob(&blob).unwrap();
    assert_eq!(back.encoding(), Encoding::Int64);
    assert_eq!(back.iter().collect::<Vec<_>>(), vec![-3, 12, 70_000, 1 << 40]);
}

#[test]
fn corrupt_blobs_are_rejected() {
    assert_eq!(IntSet::from_blob(&[2, 0]), Err(IntSetError::CorruptHeader(2)));
    let mut blob = set_of(&[1, 2]).to_blob();
    blob.pop();
    assert!(matches!(
        IntSet::from_blob(&blob),
        Err(IntSetError::CorruptLength { .. })
    ));
}

#[test]
fn random_member_and_out_of_range_get() {
    let s = set_of(&[10, 20, 30]);
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..50 {
        let v = s.random(&mut rng).unwrap();
        assert!(s.find(v));
    }
    assert_eq!(s.get(3), None);
    assert_eq!(IntSet::new().random(&mut rng), None);
}

#[test]
fn intset_crosses_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<IntSet>();
    let mut s = IntSet::new();
    s.add(7).unwrap();
    let moved = std::thread::spawn(move || s.len()).join().unwrap();
    assert_eq!(moved, 1);
}
