//! Property tests for keyed reconciliation and priority-aware update replay.

use std::collections::HashMap;
use std::rc::Rc;

use proptest::prelude::*;

use trellis_core::element::{h, text, ElementBuilder};
use trellis_core::testing::{HostOp, TestRuntime};
use trellis_core::update_queue::{process_update_queue, Action, Update};
use trellis_core::{Lane, Lanes};

fn keyed_list(keys: &[u32]) -> ElementBuilder {
    h("ul").children(keys.iter().map(|key| {
        let key = key.to_string();
        h("li").key(key.as_str()).attr("id", key.as_str()).child(text(&key))
    }))
}

fn markup(keys: &[u32]) -> String {
    let items: String = keys.iter().map(|key| format!("<li id=\"{key}\">{key}</li>")).collect();
    format!("<ul>{items}</ul>")
}

/// A permutation of a random subset of `0..12`.
fn key_set() -> impl Strategy<Value = Vec<u32>> {
    prop::sample::subsequence((0..12).collect::<Vec<u32>>(), 0..=12).prop_shuffle()
}

#[derive(Debug, Clone)]
enum Step {
    /// `s * 3 + k`: order matters.
    Affine(i64),
    Replace(i64),
}

impl Step {
    fn action(&self) -> Action<i64> {
        match *self {
            Step::Affine(k) => Action::Apply(Rc::new(move |s: &i64| s * 3 + k)),
            Step::Replace(v) => Action::Value(v),
        }
    }

    fn apply(&self, state: i64) -> i64 {
        match *self {
            Step::Affine(k) => state * 3 + k,
            Step::Replace(v) => v,
        }
    }
}

const LANES: [Lane; 3] = [Lanes::SYNC, Lanes::DEFAULT, Lanes::TRANSITION];

fn step() -> impl Strategy<Value = (usize, Step)> {
    (
        0..LANES.len(),
        prop_oneof![(-5i64..5).prop_map(Step::Affine), (-100i64..100).prop_map(Step::Replace)],
    )
}

proptest! {
    #[test]
    fn keyed_lists_keep_identity_and_order(old in key_set(), new in key_set()) {
        let rt = TestRuntime::new();
        let root = rt.create_root();
        root.render(keyed_list(&old));
        rt.run_until_idle();

        let before: HashMap<u32, _> = old
            .iter()
            .map(|key| (*key, rt.find(&root, &key.to_string())))
            .collect();
        rt.clear_ops();

        root.render(keyed_list(&new));
        rt.run_until_idle();

        prop_assert_eq!(rt.dump(&root), markup(&new));

        let ops = rt.take_ops();
        let created = ops
            .iter()
            .filter(|op| matches!(op, HostOp::CreateInstance { tag, .. } if tag == "li"))
            .count();
        let removed = ops.iter().filter(|op| matches!(op, HostOp::Remove { .. })).count();
        prop_assert_eq!(created, new.iter().filter(|key| !old.contains(key)).count());
        prop_assert_eq!(removed, old.iter().filter(|key| !new.contains(key)).count());

        for key in new.iter().filter(|key| old.contains(key)) {
            prop_assert_eq!(rt.find(&root, &key.to_string()), before[key]);
        }
    }

    #[test]
    fn skipped_updates_replay_in_dispatch_order(
        initial in -50i64..50,
        steps in prop::collection::vec(step(), 0..16),
    ) {
        let updates: Vec<Update<i64>> = steps
            .iter()
            .map(|(lane, step)| Update::new(step.action(), LANES[*lane]))
            .collect();

        // Widen the render lanes one at a time, like successive passes do.
        let mut base_state = initial;
        let mut base_queue = updates;
        let mut render_lanes = Lanes::NONE;
        for (pass, lane) in LANES.iter().enumerate() {
            render_lanes |= *lane;

            let mut skipped = 0;
            let result = process_update_queue(base_state, base_queue, render_lanes, |_| skipped += 1);

            let expected: i64 = steps
                .iter()
                .filter(|(lane, _)| render_lanes.contains(LANES[*lane]))
                .fold(initial, |state, (_, step)| step.apply(state));
            prop_assert_eq!(result.memoized_state, expected, "pass {}", pass);
            prop_assert_eq!(
                skipped,
                steps.iter().filter(|(lane, _)| !render_lanes.contains(LANES[*lane])).count()
            );

            base_state = result.base_state;
            base_queue = result.base_queue;
        }

        let all = steps.iter().fold(initial, |state, (_, step)| step.apply(state));
        prop_assert_eq!(base_state, all);
        prop_assert!(base_queue.is_empty());
    }
}
