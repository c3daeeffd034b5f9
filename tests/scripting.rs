// Copyright 2025 The sapling Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The script host surface: suspension at `</script>`, `document.write`
//! at the insertion point, pause/resume, and end-of-stream finalization
//! hook ordering.

mod common;

use common::*;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use sapling::buffer_queue::BufferQueue;
use sapling::dom::{Handle, RcDom};
use sapling::driver::{parse_document, ParseOpts};
use sapling::interface::{HostHooks, ReadyState, ScriptResult};
use sapling::tendril::{StrTendril, TendrilSink};

#[derive(Default)]
struct RecordingHost {
    events: RefCell<Vec<String>>,
    write_on_execute: RefCell<Option<String>>,
    pause_on_execute: Cell<bool>,
    abort_on_execute: Cell<bool>,
    pending_spins: Cell<usize>,
}

impl RecordingHost {
    fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl HostHooks<Handle> for RecordingHost {
    fn prepare_script(&self, _element: &Handle) {
        self.events.borrow_mut().push("prepare".into());
    }

    fn execute_script(&self, _element: &Handle, write: &BufferQueue) -> ScriptResult {
        self.events.borrow_mut().push("execute".into());
        if let Some(text) = self.write_on_execute.borrow_mut().take() {
            write.push_back(StrTendril::from_slice(&text));
        }
        if self.abort_on_execute.get() {
            ScriptResult::Abort
        } else if self.pause_on_execute.get() {
            ScriptResult::Pause
        } else {
            ScriptResult::Continue
        }
    }

    fn spin_event_loop(&self) {
        self.events.borrow_mut().push("spin".into());
        let left = self.pending_spins.get();
        self.pending_spins.set(left.saturating_sub(1));
    }

    fn scripts_as_soon_as_possible(&self) -> usize {
        self.pending_spins.get()
    }

    fn dom_content_loaded(&self) {
        self.events.borrow_mut().push("dcl".into());
    }

    fn load_event(&self) {
        self.events.borrow_mut().push("load".into());
    }
}

#[test]
fn script_suspension_calls_prepare_then_execute() {
    let host = Rc::new(RecordingHost::default());
    let dom: RcDom = parse_document(RcDom::default(), ParseOpts::default())
        .with_host(host.clone())
        .one("<!DOCTYPE html><body><script>x()</script>");

    let events = host.events();
    assert_eq!(events, vec!["prepare", "execute", "dcl", "load"]);
    assert_eq!(dom.ready_state.get(), ReadyState::Complete);
}

#[test]
fn document_write_lands_at_the_insertion_point() {
    let host = Rc::new(RecordingHost {
        write_on_execute: RefCell::new(Some("<b>written</b>".to_string())),
        ..RecordingHost::default()
    });
    let dom: RcDom = parse_document(RcDom::default(), ParseOpts::default())
        .with_host(host)
        .one("<!DOCTYPE html><body><script>w()</script><p>tail");

    let body = body_of(&dom);
    let names: Vec<_> = elem_children(&body).iter().filter_map(elem_name).collect();
    // The written element appears between the script and the markup that
    // followed it in the network stream.
    assert_eq!(names, vec!["script", "b", "p"]);
    let b = child_elem(&body, "b");
    assert_eq!(text_of(&b), "written");
}

#[test]
fn pause_and_resume_preserve_the_checkpoint() {
    let host = Rc::new(RecordingHost {
        pause_on_execute: Cell::new(true),
        ..RecordingHost::default()
    });

    let mut parser = parse_document(RcDom::default(), ParseOpts::default()).with_host(host);
    parser.process(StrTendril::from_slice(
        "<!DOCTYPE html><body><script>p()</script><p>after",
    ));
    assert!(parser.is_paused());

    // Writes made while paused are held at the insertion point...
    parser.document_write(StrTendril::from_slice("<i>late</i>"));

    // ...and splice in ahead of the buffered "<p>after" on resume.
    parser.resume();
    assert!(!parser.is_paused());

    let dom = parser.finish();
    let body = body_of(&dom);
    let names: Vec<_> = elem_children(&body).iter().filter_map(elem_name).collect();
    assert_eq!(names, vec!["script", "i", "p"]);
}

#[test]
fn abort_discards_the_rest_of_the_stream() {
    let host = Rc::new(RecordingHost {
        abort_on_execute: Cell::new(true),
        ..RecordingHost::default()
    });
    let dom: RcDom = parse_document(RcDom::default(), ParseOpts::default())
        .with_host(host)
        .one("<!DOCTYPE html><body><script>q()</script><p>never parsed");

    let body = body_of(&dom);
    let names: Vec<_> = elem_children(&body).iter().filter_map(elem_name).collect();
    assert_eq!(names, vec!["script"]);
    // The tree is still finalized into a coherent, complete document.
    assert_eq!(dom.ready_state.get(), ReadyState::Complete);
}

#[test]
fn finalization_spins_until_predicates_clear() {
    let host = Rc::new(RecordingHost {
        pending_spins: Cell::new(3),
        ..RecordingHost::default()
    });
    let dom: RcDom = parse_document(RcDom::default(), ParseOpts::default())
        .with_host(host.clone())
        .one("<!DOCTYPE html><p>x");

    let events = host.events();
    assert_eq!(events, vec!["dcl", "spin", "spin", "spin", "load"]);
    assert_eq!(dom.ready_state.get(), ReadyState::Complete);
}
