use super::constants::ALIGNMENT;

/// Bit layout of a tag word:
///
/// ```text
///  63                         5 4   2   1          0
/// +----------------------------+-----+----------+------+
/// |            size            | 000 | prevUsed | used |
/// +----------------------------+-----+----------+------+
/// ```
///
/// The size is stored as is; it is always a multiple of ALIGNMENT so its low
/// bits are free to hold the flags.
pub const TAG_LAYOUT_VERSION: u8 = 1;

pub const USED: u64 = 0x1;
pub const PREV_USED: u64 = 0x2;
pub const FLAG_MASK: u64 = (ALIGNMENT - 1) as u64;
pub const SIZE_MASK: u64 = !FLAG_MASK;

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Tag {
    pub size: usize,
    pub used: bool,
    pub prev_used: bool,
}

impl Tag {
    pub fn new(size: usize, used: bool, prev_used: bool) -> Self {
        Self {
            size,
            used,
            prev_used,
        }
    }

    pub fn encode(&self) -> u64 {
        debug_assert!(self.size % ALIGNMENT == 0, "unaligned block size {}", self.size);

        let mut word = self.size as u64 & SIZE_MASK;

        if self.used {
            word |= USED;
        }

        if self.prev_used {
            word |= PREV_USED;
        }

        word
    }

    pub fn decode(word: u64) -> Self {
        Self {
            size: (word & SIZE_MASK) as usize,
            used: word & USED != 0,
            prev_used: word & PREV_USED != 0,
        }
    }

    pub fn with_size(self, size: usize) -> Self {
        Self { size, ..self }
    }

    pub fn with_used(self, used: bool) -> Self {
        Self { used, ..self }
    }

    pub fn with_prev_used(self, prev_used: bool) -> Self {
        Self { prev_used, ..self }
    }
}
