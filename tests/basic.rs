use segalloc::{
    AllocConfig, AllocError, Allocator, CorruptionPolicy, HeapCorruption, Tag, ALIGNMENT,
    HEADER_SIZE,
};
use std::collections::BTreeMap;
use std::ptr::NonNull;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn new_allocator() -> Allocator {
    init_logger();

    let config = AllocConfig {
        heap_capacity: 1 << 22,
        ..AllocConfig::checked()
    };

    Allocator::with_config(config).unwrap()
}

#[test]
fn small_request_reuses_exact_bucket() {
    let mut a = new_allocator();
    let p1 = a.allocate(10).unwrap();
    let _p2 = a.allocate(100).unwrap();

    unsafe { a.free(p1) };

    let p3 = a.allocate(10).unwrap();

    assert_eq!(p3, p1);
}

#[test]
fn live_allocations_never_overlap() {
    let mut a = new_allocator();
    let mut spans = BTreeMap::new();

    for i in 0..300 {
        let size = 1 + (i * 37) % 900;
        let ptr = a.allocate(size).unwrap();
        let start = ptr.as_ptr() as usize;

        assert_eq!(start % ALIGNMENT, 0);
        assert!(unsafe { a.usable_size(ptr) } >= size);

        spans.insert(start, start + size);
    }

    let mut prev_end = 0;

    for (start, end) in spans {
        assert!(start >= prev_end);
        prev_end = end;
    }
}

#[test]
fn merged_neighbors_serve_a_request_without_growth() {
    let mut a = new_allocator();
    let p1 = a.allocate(16).unwrap();
    let p2 = a.allocate(16).unwrap();
    let _guard = a.allocate(16).unwrap();

    assert_eq!(
        p2.as_ptr() as usize - p1.as_ptr() as usize,
        unsafe { a.block_size(p1) }
    );

    let merged = unsafe { a.block_size(p1) + a.block_size(p2) };

    unsafe {
        a.free(p1);
        a.free(p2);
    }

    let grows = a.stats().heap_grows;
    let p = a.allocate(merged - HEADER_SIZE).unwrap();

    assert_eq!(p, p1);
    assert_eq!(a.stats().heap_grows, grows);
}

#[test]
fn realloc_that_fits_returns_same_pointer() {
    let mut a = new_allocator();
    let p = a.allocate(40).unwrap();
    let usable = unsafe { a.usable_size(p) };
    let heap_size = a.heap_size();

    let q = unsafe { a.reallocate(p, usable) }.unwrap();

    assert_eq!(q, p);
    assert_eq!(a.heap_size(), heap_size);
}

#[test]
fn realloc_at_heap_top_extends_heap_by_delta() {
    let mut a = new_allocator();
    let _low = a.allocate(5000).unwrap();
    let top = a.allocate(5000).unwrap();
    let old_block = unsafe { a.block_size(top) };
    let old_hi = a.heap_hi() as usize;

    let q = unsafe { a.reallocate(top, 9000) }.unwrap();
    let new_block = unsafe { a.block_size(q) };

    assert_eq!(q, top);
    assert_eq!(a.heap_hi() as usize, old_hi + (new_block - old_block));
}

#[test]
fn free_at_heap_top_returns_memory() {
    let mut a = new_allocator();
    let _p1 = a.allocate(2000).unwrap();
    let p2 = a.allocate(3000).unwrap();
    let size = unsafe { a.block_size(p2) };
    let old_hi = a.heap_hi() as usize;

    unsafe { a.free(p2) };

    assert_eq!(a.heap_hi() as usize, old_hi - size);
    assert_eq!(a.free_block_count(), 0);
}

#[test]
fn corrupted_tail_tag_fails_check() {
    let mut a = new_allocator();
    let p = a.allocate(1000).unwrap();
    let _guard = a.allocate(1000).unwrap();
    let size = unsafe { a.block_size(p) };

    unsafe {
        a.free(p);

        let block = p.as_ptr().sub(HEADER_SIZE);
        let tail = block.add(size - 8) as *mut u64;

        tail.write(Tag::new(size * 2, false, true).encode());
    }

    assert!(matches!(
        a.check_heap(),
        Err(HeapCorruption::TagMismatch { .. })
    ));
}

#[test]
#[should_panic(expected = "heap corruption detected after free")]
fn corruption_is_caught_after_next_mutation() {
    let mut a = new_allocator();
    let p = a.allocate(100).unwrap();
    let q = a.allocate(100).unwrap();
    let _guard = a.allocate(100).unwrap();

    assert_eq!(a.config().on_corruption, CorruptionPolicy::Panic);

    unsafe {
        // overrun q's payload into the head tag of the following block
        let overrun = q.as_ptr().add(a.usable_size(q)) as *mut u64;
        overrun.write(0);

        a.free(p);
    }
}

#[cfg(unix)]
const ABORT_CHILD_ENV: &str = "SEGALLOC_ABORT_CHILD";

#[cfg(unix)]
fn corrupt_then_mutate(config: AllocConfig) {
    let mut a = Allocator::with_config(config).unwrap();
    let p = a.allocate(1000).unwrap();
    let _guard = a.allocate(1000).unwrap();
    let size = unsafe { a.block_size(p) };

    unsafe {
        a.free(p);

        let tail = p.as_ptr().sub(HEADER_SIZE).add(size - 8) as *mut u64;
        tail.write(Tag::new(64, false, true).encode());
    }

    let _ = a.allocate(2000);
}

#[cfg(unix)]
#[test]
fn abort_policy_terminates_the_process() {
    use std::os::unix::process::ExitStatusExt;
    use std::process::Command;

    if std::env::var_os(ABORT_CHILD_ENV).is_some() {
        init_logger();

        let config = AllocConfig {
            check_heap: true,
            on_corruption: CorruptionPolicy::Abort,
            heap_capacity: 1 << 20,
        };

        corrupt_then_mutate(config);
        return;
    }

    let status = Command::new(std::env::current_exe().unwrap())
        .args(["abort_policy_terminates_the_process", "--exact", "--test-threads=1"])
        .env(ABORT_CHILD_ENV, "1")
        .status()
        .unwrap();

    assert!(!status.success());
    assert_eq!(status.signal(), Some(libc::SIGABRT));
}

#[test]
fn exhausted_host_reports_out_of_memory() {
    init_logger();

    let config = AllocConfig {
        heap_capacity: 8192,
        ..AllocConfig::checked()
    };
    let mut a = Allocator::with_config(config).unwrap();
    let mut ptrs: Vec<NonNull<u8>> = vec![];

    let err = loop {
        match a.allocate(1000) {
            Ok(ptr) => ptrs.push(ptr),
            Err(err) => break err,
        }
    };

    assert!(matches!(err, AllocError::OutOfMemory { .. }));
    assert!(!ptrs.is_empty());
    assert!(a.check_heap().is_ok());

    let last = ptrs.pop().unwrap();
    unsafe { a.free(last) };

    assert!(a.allocate(1000).is_ok());
}

#[test]
fn independent_allocators_do_not_interfere() {
    let mut a = new_allocator();
    let mut b = new_allocator();
    let pa = a.allocate(64).unwrap();
    let pb = b.allocate(64).unwrap();

    unsafe {
        pa.as_ptr().write_bytes(1, 64);
        pb.as_ptr().write_bytes(2, 64);

        a.free(pa);
        assert_eq!(*pb.as_ptr(), 2);
        b.free(pb);
    }

    assert_eq!(a.heap_size(), 0);
    assert_eq!(b.heap_size(), 0);
}
