// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// A bitmask over the first 64 Unicode scalar values.
///
/// The tokenizer's hot states care about a handful of low-ASCII
/// delimiters; everything else can be consumed in bulk. See
/// [`BufferQueue::pop_except_from`].
///
/// [`BufferQueue::pop_except_from`]: crate::buffer_queue::BufferQueue::pop_except_from
#[derive(Copy, Clone)]
pub struct SmallCharSet {
    pub bits: u64,
}

impl SmallCharSet {
    #[inline]
    fn contains(&self, byte: u8) -> bool {
        self.bits & (1 << byte as usize) != 0
    }

    /// How many bytes at the start of `buf` are outside the set?
    pub fn nonmember_prefix_len(&self, buf: &str) -> u32 {
        buf.bytes()
            .take_while(|&byte| byte >= 64 || !self.contains(byte))
            .count() as u32
    }
}

/// Build a [`SmallCharSet`] from character literals, e.g.
/// `small_char_set!('\n' '<' '&' '\0')`.
#[macro_export]
macro_rules! small_char_set {
    ($($e:expr)+) => {
        $crate::util::smallcharset::SmallCharSet {
            bits: $( (1 << ($e as usize)) )|+
        }
    };
}

#[cfg(test)]
mod test {
    use crate::small_char_set;

    #[test]
    fn nonmember_prefix() {
        for &c in ['&', '\0'].iter() {
            for before in 0..48u32 {
                for after in 0..48u32 {
                    let mut s = "x".repeat(before as usize);
                    s.push(c);
                    s.push_str(&"x".repeat(after as usize));
                    let set = small_char_set!('&' '\0');

                    assert_eq!(before, set.nonmember_prefix_len(&s));
                }
            }
        }
    }
}
