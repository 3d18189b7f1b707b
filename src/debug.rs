use std::env;
use std::sync::OnceLock;

static CHECK_HEAP_FORCED: OnceLock<bool> = OnceLock::new();

/// Whether the SEGALLOC_CHECK_HEAP environment variable is set.
/// The variable is only read on the first call.
#[inline]
pub fn check_heap_forced() -> bool {
    *CHECK_HEAP_FORCED.get_or_init(|| env::var("SEGALLOC_CHECK_HEAP").is_ok())
}
