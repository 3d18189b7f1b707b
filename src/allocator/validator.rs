use super::block::Block;
use super::constants::{ALIGNMENT, BUCKET_COUNT, MIN_BLOCK_SIZE, WORD_SIZE};
use super::heap_region::HeapRegion;
use super::mem_lib::HostHeap;
use super::size_class::SizeClassTable;
use super::tag::PREV_USED;
use crate::error::HeapCorruption;

/// Checks every heap invariant, walking blocks by size from the heap low
/// end and then every free list.
pub fn check_heap<H: HostHeap>(
    region: &HeapRegion<H>,
    table: &SizeClassTable,
) -> Result<(), HeapCorruption> {
    let walked = walk_blocks(region)?;

    walk_free_lists(region, table, walked)
}

// Returns the number of free blocks seen.
fn walk_blocks<H: HostHeap>(region: &HeapRegion<H>) -> Result<usize, HeapCorruption> {
    let mut offset = region.low();
    let mut prev_offset = offset;
    let mut prev_used = true;
    let mut free_blocks = 0;

    while offset < region.end() {
        let block = Block::at(offset);
        let tag = block.tag(region);

        if tag.size < MIN_BLOCK_SIZE || tag.size % ALIGNMENT != 0 {
            return Err(HeapCorruption::BadSize {
                offset,
                size: tag.size,
            });
        }

        if tag.size > region.end() - offset {
            return Err(HeapCorruption::WalkOverrun {
                reached: offset.saturating_add(tag.size),
                end: region.end(),
            });
        }

        if tag.prev_used != prev_used {
            return Err(HeapCorruption::PrevUsedMismatch {
                offset,
                recorded: tag.prev_used,
                actual: prev_used,
            });
        }

        if !tag.used {
            // only the head's prev_used is kept up to date
            let head = region.read_word(offset);
            let tail = block.tail_word(region);

            if (head ^ tail) & !PREV_USED != 0 {
                return Err(HeapCorruption::TagMismatch { offset, head, tail });
            }

            if !prev_used {
                return Err(HeapCorruption::AdjacentFree {
                    left: prev_offset,
                    right: offset,
                });
            }

            free_blocks += 1;
        }

        prev_used = tag.used;
        prev_offset = offset;
        offset += tag.size;
    }

    if offset != region.end() {
        return Err(HeapCorruption::WalkOverrun {
            reached: offset,
            end: region.end(),
        });
    }

    Ok(free_blocks)
}

fn walk_free_lists<H: HostHeap>(
    region: &HeapRegion<H>,
    table: &SizeClassTable,
    walked: usize,
) -> Result<(), HeapCorruption> {
    let mut listed = 0;

    for bucket in 0..BUCKET_COUNT {
        let sentinel = SizeClassTable::sentinel(bucket);
        let mut prev = sentinel.offset();
        let mut current = sentinel.links(region).next;
        let listed_before = listed;

        while current != sentinel.offset() {
            let in_heap = region.contains(current)
                && current % WORD_SIZE == 0
                && current + MIN_BLOCK_SIZE <= region.end();

            if !in_heap {
                return Err(HeapCorruption::BrokenLink {
                    bucket,
                    offset: current,
                });
            }

            // more entries than free blocks means a cycle or a stray block
            if listed == walked {
                return Err(HeapCorruption::FreeCountMismatch {
                    listed: listed + 1,
                    walked,
                });
            }

            let block = Block::at(current);
            let links = block.links(region);
            let tag = block.tag(region);

            if links.prev != prev {
                return Err(HeapCorruption::BrokenLink {
                    bucket,
                    offset: current,
                });
            }

            if tag.used {
                return Err(HeapCorruption::NotFree {
                    bucket,
                    offset: current,
                });
            }

            if SizeClassTable::bucket_for(tag.size) != bucket {
                return Err(HeapCorruption::WrongBucket {
                    bucket,
                    offset: current,
                    size: tag.size,
                });
            }

            listed += 1;
            prev = current;
            current = links.next;
        }

        if sentinel.links(region).prev != prev {
            return Err(HeapCorruption::BrokenLink {
                bucket,
                offset: sentinel.offset(),
            });
        }

        if listed - listed_before != table.len(bucket) {
            return Err(HeapCorruption::LengthMismatch {
                bucket,
                recorded: table.len(bucket),
                found: listed - listed_before,
            });
        }
    }

    if listed != walked {
        return Err(HeapCorruption::FreeCountMismatch { listed, walked });
    }

    Ok(())
}
