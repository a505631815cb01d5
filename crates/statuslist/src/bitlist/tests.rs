use crate::{BitList, Error};

#[test]
fn new_list_has_expected_capacity_and_free_count() {
    for size in [1, 2, 10, 100, 1024] {
        let list = BitList::new(size);
        assert_eq!(list.as_bytes().len(), size);
        assert_eq!(list.capacity_bits(), size * 8);
        assert_eq!(list.free(), size * 8);
        assert_eq!(list.allocated(), 0);
        assert!(list.as_bytes().iter().all(|b| *b == 0));
    }
}

#[test]
fn allocates_indices_in_ascending_order_until_exhausted() {
    let mut list = BitList::new(10);
    let capacity = list.capacity_bits();

    for expected in 0..capacity {
        assert_eq!(list.allocate_next_free_index(), Ok(expected));
    }

    assert_eq!(list.free(), 0);
    assert!(list.is_fully_allocated());
    assert_eq!(list.allocate_next_free_index(), Err(Error::FullyAllocated));
    // a failed allocation leaves the list untouched
    assert_eq!(list.free(), 0);
}

#[test]
fn revoke_sets_lsb_first_bit_layout() {
    let mut list = BitList::new(2);
    list.revoke_at_index(7).unwrap();
    assert_eq!(list.as_bytes(), &[0b1000_0000, 0]);

    list.revoke_at_index(0).unwrap();
    list.revoke_at_index(9).unwrap();
    assert_eq!(list.as_bytes(), &[0b1000_0001, 0b0000_0010]);
}

#[test]
fn revoked_bits_read_back_and_others_stay_clear() {
    let mut list = BitList::new(2);
    let index = list.allocate_next_free_index().unwrap();

    list.revoke_at_index(index).unwrap();

    assert_eq!(list.check_bit_at_index(index), Ok(true));
    for other in 1..list.capacity_bits() {
        assert_eq!(list.check_bit_at_index(other), Ok(false), "index {other}");
    }
}

#[test]
fn revocation_is_idempotent_and_independent_of_allocation() {
    let mut list = BitList::new(1);
    list.revoke_at_index(5).unwrap();
    list.revoke_at_index(5).unwrap();

    assert_eq!(list.as_bytes(), &[0b0010_0000]);
    assert_eq!(list.free(), 8);
}

#[test]
fn empty_list_reports_every_index_clear() {
    let list = BitList::from_bytes(Vec::new());
    for index in [0, 1, 7, 8, 1_000_000, usize::MAX] {
        assert_eq!(list.check_bit_at_index(index), Ok(false));
    }
}

#[test]
fn out_of_range_indices_are_rejected() {
    let mut list = BitList::new(1);
    assert_eq!(
        list.revoke_at_index(8),
        Err(Error::IndexOutOfRange {
            index: 8,
            capacity: 8
        })
    );
    assert_eq!(
        list.check_bit_at_index(usize::MAX),
        Err(Error::IndexOutOfRange {
            index: usize::MAX,
            capacity: 8
        })
    );
    assert_eq!(list.as_bytes(), &[0]);
}

#[test]
fn from_parts_rejects_free_count_above_capacity() {
    assert_eq!(
        BitList::from_parts(3, vec![0; 2], 17),
        Err(Error::InvalidFreeCount {
            free: 17,
            capacity: 16
        })
    );

    let list = BitList::from_parts(3, vec![0; 2], 10).unwrap();
    assert_eq!(list.list_id(), 3);
    assert_eq!(list.allocated(), 6);
}

#[test]
fn allocation_resumes_from_persisted_free_count() {
    let mut list = BitList::from_parts(1, vec![0; 1], 3).unwrap();
    assert_eq!(list.allocate_next_free_index(), Ok(5));
    assert_eq!(list.allocate_next_free_index(), Ok(6));
    assert_eq!(list.allocate_next_free_index(), Ok(7));
    assert_eq!(list.allocate_next_free_index(), Err(Error::FullyAllocated));
}

#[test]
fn one_byte_list_walkthrough() {
    let mut list = BitList::new(1);
    let issued: Vec<_> = (0..8)
        .map(|_| list.allocate_next_free_index().unwrap())
        .collect();
    assert_eq!(issued, (0..8).collect::<Vec<_>>());
    assert_eq!(list.allocate_next_free_index(), Err(Error::FullyAllocated));

    list.revoke_at_index(3).unwrap();
    for index in 0..8 {
        assert_eq!(list.check_bit_at_index(index), Ok(index == 3));
    }
}

#[cfg(feature = "serde")]
#[test]
fn serde_keeps_all_fields() {
    let mut list = BitList::new(2);
    list.set_list_id(4);
    list.allocate_next_free_index().unwrap();
    list.revoke_at_index(0).unwrap();

    let json = serde_json::to_string(&list).unwrap();
    let back: BitList = serde_json::from_str(&json).unwrap();
    assert_eq!(back, list);
}
