// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The [`BufferQueue`]: the decoded input waiting to be tokenized, as a
//! queue of owned string buffers consumed incrementally and without
//! copying.
//!
//! The queue's front doubles as the tokenizer's *insertion point*:
//! characters a script produces via `document.write` are spliced there,
//! ahead of network input that has not been tokenized yet.

use std::cell::RefCell;
use std::collections::VecDeque;

use tendril::StrTendril;

pub use self::SetResult::{FromSet, NotFromSet};
use crate::util::smallcharset::SmallCharSet;

/// What [`BufferQueue::pop_except_from`] found at the front of the
/// queue.
#[derive(PartialEq, Eq, Debug)]
pub enum SetResult {
    /// A single character that is in the [`SmallCharSet`].
    FromSet(char),
    /// A run of characters, none of which are in the set.
    NotFromSet(StrTendril),
}

/// A queue of owned string buffers, consumed from the front.
///
/// Invariant: no buffer in the queue is empty.
#[derive(Debug, Default)]
pub struct BufferQueue {
    buffers: RefCell<VecDeque<StrTendril>>,
}

impl BufferQueue {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.borrow().is_empty()
    }

    /// Throw away all buffered input.
    pub fn clear(&self) {
        self.buffers.borrow_mut().clear();
    }

    /// Take the frontmost buffer.
    #[inline]
    pub fn pop_front(&self) -> Option<StrTendril> {
        self.buffers.borrow_mut().pop_front()
    }

    /// Put a buffer at the front (the insertion point). Empty buffers
    /// are dropped to keep the invariant.
    pub fn push_front(&self, buf: StrTendril) {
        if buf.len32() > 0 {
            self.buffers.borrow_mut().push_front(buf);
        }
    }

    /// Queue a buffer at the back. Empty buffers are dropped.
    pub fn push_back(&self, buf: StrTendril) {
        if buf.len32() > 0 {
            self.buffers.borrow_mut().push_back(buf);
        }
    }

    /// The next character, left in place.
    pub fn peek(&self) -> Option<char> {
        self.buffers
            .borrow()
            .front()
            .map(|buf| buf.chars().next().expect("empty buffer in queue"))
    }

    /// Consume one character.
    pub fn next(&self) -> Option<char> {
        let mut buffers = self.buffers.borrow_mut();
        let front = buffers.front_mut()?;
        let c = front.pop_front_char().expect("empty buffer in queue");
        let drained = front.is_empty();
        if drained {
            buffers.pop_front();
        }
        Some(c)
    }

    /// Consume either one character from `set`, or a maximal run of
    /// characters not in it, whichever the front of the queue offers.
    pub fn pop_except_from(&self, set: SmallCharSet) -> Option<SetResult> {
        let mut buffers = self.buffers.borrow_mut();
        let front = buffers.front_mut()?;

        let run_len = set.nonmember_prefix_len(front);
        let result = if run_len == 0 {
            FromSet(front.pop_front_char().expect("empty buffer in queue"))
        } else {
            let run = front.subtendril(0, run_len);
            front.pop_front(run_len);
            NotFromSet(run)
        };

        let drained = front.is_empty();
        if drained {
            buffers.pop_front();
        }
        Some(result)
    }

    /// Match `pattern` against the front of the queue, byte for byte
    /// under `eq`, consuming it on success.
    ///
    /// `Some(false)` means a definite mismatch (nothing consumed);
    /// `None` means the buffered input is too short to decide.
    pub fn eat<F: Fn(&u8, &u8) -> bool>(&self, pattern: &str, eq: F) -> Option<bool> {
        let verdict = {
            let buffers = self.buffers.borrow();
            let mut stream = buffers.iter().flat_map(|buf| buf.as_bytes().iter()).copied();
            let mut verdict = Some(true);
            for expected in pattern.bytes() {
                match stream.next() {
                    None => {
                        verdict = None;
                        break;
                    },
                    Some(actual) if eq(&actual, &expected) => {},
                    Some(_) => {
                        verdict = Some(false);
                        break;
                    },
                }
            }
            verdict
        };

        if verdict == Some(true) {
            self.consume_bytes(pattern.len() as u32);
        }
        verdict
    }

    /// Drop an ASCII prefix of known byte length.
    fn consume_bytes(&self, mut count: u32) {
        let mut buffers = self.buffers.borrow_mut();
        while count > 0 {
            let front_len = buffers
                .front()
                .expect("consumed past the end of the queue")
                .len32();
            if front_len <= count {
                buffers.pop_front();
                count -= front_len;
            } else {
                buffers.front_mut().unwrap().pop_front(count);
                count = 0;
            }
        }
    }

    /// Move this queue's entire contents to the *front* of `target`,
    /// preserving order: the `document.write` splice.
    pub fn transfer_to_front_of(&self, target: &BufferQueue) {
        let mut source = self.buffers.borrow_mut();
        if source.is_empty() {
            return;
        }
        let mut dest = target.buffers.borrow_mut();
        while let Some(buf) = source.pop_back() {
            dest.push_front(buf);
        }
    }
}

#[cfg(test)]
mod test {
    use super::BufferQueue;
    use super::SetResult::{FromSet, NotFromSet};
    use crate::small_char_set;
    use tendril::StrTendril;

    #[test]
    fn smoke_test() {
        let queue = BufferQueue::default();
        assert_eq!(queue.peek(), None);
        assert_eq!(queue.next(), None);

        queue.push_back(StrTendril::from_slice("abc"));
        assert_eq!(queue.peek(), Some('a'));
        assert_eq!(queue.next(), Some('a'));
        assert_eq!(queue.peek(), Some('b'));
        assert_eq!(queue.next(), Some('b'));
        assert_eq!(queue.next(), Some('c'));
        assert_eq!(queue.peek(), None);
        assert_eq!(queue.next(), None);
    }

    #[test]
    fn can_unconsume() {
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from_slice("abc"));
        assert_eq!(queue.next(), Some('a'));

        queue.push_front(StrTendril::from_slice("xy"));
        assert_eq!(queue.next(), Some('x'));
        assert_eq!(queue.next(), Some('y'));
        assert_eq!(queue.next(), Some('b'));
        assert_eq!(queue.next(), Some('c'));
        assert_eq!(queue.next(), None);
    }

    #[test]
    fn can_pop_except_set() {
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from_slice("abc&def"));
        let step = || queue.pop_except_from(small_char_set!('&'));
        assert_eq!(step(), Some(NotFromSet(StrTendril::from_slice("abc"))));
        assert_eq!(step(), Some(FromSet('&')));
        assert_eq!(step(), Some(NotFromSet(StrTendril::from_slice("def"))));
        assert_eq!(step(), None);
    }

    #[test]
    fn eat_spans_buffer_boundaries() {
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from_slice("a"));
        queue.push_back(StrTendril::from_slice("bc"));
        assert_eq!(queue.eat("abcd", u8::eq_ignore_ascii_case), None);
        assert_eq!(queue.eat("ax", u8::eq_ignore_ascii_case), Some(false));
        assert_eq!(queue.eat("AB", u8::eq_ignore_ascii_case), Some(true));
        assert_eq!(queue.next(), Some('c'));
        assert_eq!(queue.next(), None);
    }

    #[test]
    fn transfer_preserves_order() {
        let main = BufferQueue::default();
        main.push_back(StrTendril::from_slice("rest"));
        let written = BufferQueue::default();
        written.push_back(StrTendril::from_slice("one"));
        written.push_back(StrTendril::from_slice("two"));
        written.transfer_to_front_of(&main);
        assert!(written.is_empty());
        let mut out = String::new();
        while let Some(c) = main.next() {
            out.push(c);
        }
        assert_eq!(out, "onetworest");
    }
}
