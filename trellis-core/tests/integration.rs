//! Integration Tests for the Reconciler
//!
//! These tests drive whole roots through the in-memory host and the manual
//! scheduler, and check the host tree and the host operation log.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::element::{el, fragment, h, memo, suspense, text, Child, Component, ElementBuilder, ElementRef, NodeRef};
use trellis_core::host::HostNodeId;
use trellis_core::scheduler::{Priority, Scheduler};
use trellis_core::testing::{HostOp, TestRuntime};
use trellis_core::{cleanup, Context, ReconcilerConfig, ReconcilerError, SetState, Thenable, ThrownError, UsageError};

type Slot<T> = Rc<RefCell<Option<SetState<T>>>>;
type Log = Rc<RefCell<Vec<String>>>;

fn slot<T>() -> Slot<T> {
    Rc::new(RefCell::new(None))
}

fn setter<T>(slot: &Slot<T>) -> SetState<T> {
    slot.borrow().clone().expect("component mounted")
}

fn runtime() -> TestRuntime {
    runtime_with(ReconcilerConfig::default())
}

fn runtime_with(config: ReconcilerConfig) -> TestRuntime {
    trellis_core::logging::init_test_tracing();
    TestRuntime::with_config(config)
}

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// A `<p>` showing a counter whose setter lands in `slot`.
fn counter(slot: &Slot<i32>, initial: i32) -> Component {
    let slot = Rc::clone(slot);
    Component::new("Counter", move |cx, _props| {
        let (count, set_count) = cx.use_state(initial)?;
        *slot.borrow_mut() = Some(set_count);
        Ok(h("p").child(text(count.to_string())).into())
    })
}

fn list(keys: &[&str]) -> ElementBuilder {
    h("ul").children(keys.iter().map(|key| h("li").key(*key).child(text(*key))))
}

fn count_ops(ops: &[HostOp], pred: impl Fn(&HostOp) -> bool) -> usize {
    ops.iter().filter(|op| pred(op)).count()
}

// ---- Mounting and keyed reconciliation ----

#[test]
fn mount_creates_each_node_once() {
    let rt = runtime();
    let root = rt.create_root();

    root.render(h("div").children([h("span").key("a").child("X"), h("span").key("b").child("Y")]));
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<div><span>X</span><span>Y</span></div>");

    let ops = rt.take_ops();
    let container = root.container().raw();
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { tag, .. } if tag == "span")),
        2
    );
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::CreateText { .. })), 2);
    // Only the outermost node touches the attached tree.
    assert_eq!(
        count_ops(&ops, |op| op.is_mutation_of_attached_tree()),
        1
    );
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::Append { parent, .. } if *parent == container)),
        1
    );
}

#[test]
fn swapping_keyed_children_moves_one_node() {
    let rt = runtime();
    let root = rt.create_root();
    root.render(h("div").children([h("span").key("a").child("X"), h("span").key("b").child("Y")]));
    rt.run_until_idle();
    rt.clear_ops();

    root.render(h("div").children([h("span").key("b").child("Y"), h("span").key("a").child("X")]));
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<div><span>Y</span><span>X</span></div>");
    let ops = rt.take_ops();
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { .. } | HostOp::CreateText { .. })),
        0
    );
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Remove { .. })), 0);
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::Append { .. } | HostOp::Insert { .. })),
        1
    );
}

#[test]
fn keyed_list_removes_and_inserts_in_place() {
    let rt = runtime();
    let root = rt.create_root();
    root.render(list(&["a", "b", "c"]));
    rt.run_until_idle();
    rt.clear_ops();

    root.render(list(&["a", "d", "c"]));
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<ul><li>a</li><li>d</li><li>c</li></ul>");
    let ops = rt.take_ops();
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Remove { .. })), 1);
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { tag, .. } if tag == "li")),
        1
    );
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Insert { .. })), 1);
}

#[test]
fn changing_the_element_type_replaces_the_node() {
    let rt = runtime();
    let root = rt.create_root();
    root.render(h("div").child(h("span").child("x")));
    rt.run_until_idle();
    rt.clear_ops();

    root.render(h("div").child(h("em").child("x")));
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<div><em>x</em></div>");
    let ops = rt.take_ops();
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Remove { .. })), 1);
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { tag, .. } if tag == "em")),
        1
    );
}

#[test]
fn fragments_flatten_into_the_host_parent() {
    let rt = runtime();
    let root = rt.create_root();
    root.render(h("div").children([
        Child::from(h("b").child("1")),
        fragment().child(h("i").child("2")).child(h("i").child("3")).into(),
        Child::from(h("b").child("4")),
    ]));
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<div><b>1</b><i>2</i><i>3</i><b>4</b></div>");
}

#[test]
fn rerendering_identical_input_mutates_nothing() {
    let rt = runtime();
    let root = rt.create_root();
    let tree = || {
        h("section")
            .attr("class", "panel")
            .child(list(&["a", "b", "c"]))
            .child(h("p").child(text("footer")))
    };
    root.render(tree());
    rt.run_until_idle();
    rt.clear_ops();

    root.render(tree());
    rt.run_until_idle();

    assert!(rt.take_ops().is_empty());
}

#[test]
fn attribute_and_text_changes_update_in_place() {
    let rt = runtime();
    let root = rt.create_root();
    root.render(h("p").attr("class", "old").child(text("before")));
    rt.run_until_idle();
    rt.clear_ops();

    root.render(h("p").attr("class", "new").child(text("after")));
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<p class=\"new\">after</p>");
    let ops = rt.take_ops();
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::UpdateInstance { .. })), 1);
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::UpdateText { content, .. } if content == "after")),
        1
    );
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { .. })), 0);
}

#[test]
fn work_nodes_reach_a_steady_count() {
    let rt = runtime();
    let root = rt.create_root();
    let tree = || h("div").child(list(&["a", "b", "c", "d"]));

    root.render(tree());
    rt.run_until_idle();
    root.render(tree());
    rt.run_until_idle();
    let steady = root.fiber_count();

    for _ in 0..10 {
        root.render(tree());
        rt.run_until_idle();
    }
    assert_eq!(root.fiber_count(), steady);
}

// ---- State and batching ----

#[test]
fn two_updates_in_one_event_render_once() {
    let rt = runtime();
    let root = rt.create_root();
    let renders = Rc::new(Cell::new(0));
    let app = {
        let renders = Rc::clone(&renders);
        Component::new("Counter", move |cx, _props| {
            renders.set(renders.get() + 1);
            let (count, set_count) = cx.use_state(0)?;
            Ok(h("button")
                .attr("id", "inc")
                .on("on_click", move || {
                    set_count.update(|c| c + 1);
                    set_count.update(|c| c + 1);
                })
                .child(text(count.to_string()))
                .into())
        })
    };
    root.render(el(&app));
    rt.run_until_idle();
    rt.clear_ops();

    assert!(rt.click(&root, "inc"));
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<button id=\"inc\">2</button>");
    assert_eq!(renders.get(), 2);
    let ops = rt.take_ops();
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::UpdateText { .. })), 1);
}

#[test]
fn setting_the_same_state_skips_rendering() {
    let rt = runtime();
    let root = rt.create_root();
    let renders = Rc::new(Cell::new(0));
    let state = slot();
    let app = {
        let renders = Rc::clone(&renders);
        let state = Rc::clone(&state);
        Component::new("Static", move |cx, _props| {
            renders.set(renders.get() + 1);
            let (value, set_value) = cx.use_state(7)?;
            *state.borrow_mut() = Some(set_value);
            Ok(text(value.to_string()))
        })
    };
    root.render(el(&app));
    rt.run_until_idle();

    setter(&state).set(7);
    rt.run_until_idle();

    assert_eq!(renders.get(), 1);
    assert!(!root.has_pending_work());
}

#[test]
fn state_survives_parent_rerenders() {
    let rt = runtime();
    let root = rt.create_root();
    let state = slot();
    let child = counter(&state, 0);

    root.render(h("div").attr("v", 1).child(el(&child)));
    rt.run_until_idle();
    setter(&state).set(5);
    rt.run_until_idle();

    root.render(h("div").attr("v", 2).child(el(&child)));
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<div v=\"2\"><p>5</p></div>");
}

#[test]
fn render_calls_before_the_flush_are_batched() {
    let rt = runtime();
    let root = rt.create_root();

    root.render(h("p").child("first"));
    root.render(h("p").child("second"));
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<p>second</p>");
    let ops = rt.take_ops();
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { .. })), 1);
}

#[test]
fn updates_after_unmount_are_ignored() {
    let rt = runtime();
    let root = rt.create_root();
    let state = slot();
    root.render(el(&counter(&state, 0)));
    rt.run_until_idle();

    root.unmount();
    rt.run_until_idle();
    assert_eq!(rt.dump(&root), "");

    setter(&state).set(3);
    rt.run_until_idle();
    assert_eq!(rt.dump(&root), "");
    assert!(!root.has_pending_work());
}

// ---- Priorities and interruption ----

#[test]
fn urgent_update_renders_before_pending_transition() {
    let rt = runtime();
    let root = rt.create_root();
    let state = slot();
    root.render(el(&counter(&state, 1)));
    rt.run_until_idle();

    let set = setter(&state);
    rt.reconciler.start_transition(|| set.update(|c| c + 10));
    rt.scheduler
        .run_with_priority(Priority::Immediate, &mut || set.update(|c| c * 2));

    // The sync pass skips the transition update.
    rt.flush_microtasks();
    assert_eq!(rt.dump(&root), "<p>2</p>");

    // The transition pass replays both in dispatch order.
    rt.run_until_idle();
    assert_eq!(rt.dump(&root), "<p>22</p>");
}

#[test]
fn interrupted_render_leaves_host_untouched() {
    let rt = runtime();
    let root = rt.create_root();
    root.render(list(&["a", "b", "c"]));
    rt.run_until_idle();
    rt.clear_ops();

    rt.scheduler.set_yield_after(Some(2));
    rt.reconciler
        .start_transition(|| root.render_deferred(list(&["a", "b", "c", "d", "e", "f", "g", "h"])));
    assert!(rt.scheduler.run_next_task());
    assert!(root.has_pending_work());

    let ops = rt.take_ops();
    assert_eq!(count_ops(&ops, |op| op.is_mutation_of_attached_tree()), 0);
    assert_eq!(rt.dump(&root), "<ul><li>a</li><li>b</li><li>c</li></ul>");

    // A sync render cuts in and commits on its own.
    root.render(list(&["z"]));
    rt.flush_microtasks();
    assert_eq!(rt.dump(&root), "<ul><li>z</li></ul>");

    rt.run_until_idle();
    assert_eq!(rt.dump(&root), "<ul><li>z</li></ul>");
    assert!(!root.has_pending_work());
}

#[test]
fn same_lane_update_during_a_paused_render_restarts_it() {
    let rt = runtime();
    let root = rt.create_root();
    let state = slot();
    root.render(h("div").child(el(&counter(&state, 1))));
    rt.run_until_idle();

    // Root, div and the counter fit into the first slice.
    rt.scheduler.set_yield_after(Some(3));
    let set = setter(&state);
    set.update(|c| c + 1);
    assert!(rt.scheduler.run_next_task());
    assert_eq!(rt.dump(&root), "<div><p>1</p></div>");

    set.update(|c| c + 1);
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<div><p>3</p></div>");
    assert!(!root.has_pending_work());
}

#[test]
fn expired_task_renders_without_yielding() {
    let rt = runtime();
    let root = rt.create_root();
    rt.scheduler.set_yield_after(Some(1));

    rt.reconciler.start_transition(|| root.render_deferred(list(&["a", "b", "c"])));
    assert!(rt.scheduler.expire_next_task());

    assert_eq!(rt.dump(&root), "<ul><li>a</li><li>b</li><li>c</li></ul>");
}

#[test]
fn transitions_report_pending_first() {
    let rt = runtime();
    let root = rt.create_root();
    let seen: Rc<RefCell<Vec<(bool, i32)>>> = Rc::new(RefCell::new(Vec::new()));
    let app = {
        let seen = Rc::clone(&seen);
        Component::new("Tabs", move |cx, _props| {
            let (is_pending, start) = cx.use_transition()?;
            let (tab, set_tab) = cx.use_state(0)?;
            seen.borrow_mut().push((is_pending, tab));
            Ok(h("button")
                .attr("id", "next")
                .on("on_click", move || {
                    let set_tab = set_tab.clone();
                    start.start(move || set_tab.update(|t| t + 1));
                })
                .child(text(tab.to_string()))
                .into())
        })
    };
    root.render(el(&app));
    rt.run_until_idle();
    seen.borrow_mut().clear();

    rt.click(&root, "next");
    rt.run_until_idle();

    assert_eq!(*seen.borrow(), vec![(true, 0), (false, 1)]);
    assert_eq!(rt.dump(&root), "<button id=\"next\">1</button>");
}

// ---- Effects ----

fn tracked(name: &'static str, log: &Log) -> Component {
    let log = Rc::clone(log);
    Component::new(name, move |cx, props| {
        let dep = props.get_int("dep").unwrap_or(0);
        let log = Rc::clone(&log);
        cx.use_effect(
            move || {
                log.borrow_mut().push(format!("create {name} {dep}"));
                cleanup(move || log.borrow_mut().push(format!("destroy {name} {dep}")))
            },
            dep,
        )?;
        Ok(text(name))
    })
}

#[test]
fn effects_run_after_commit_and_cleanups_run_first() {
    let rt = runtime();
    let root = rt.create_root();
    let events = log();
    let a = tracked("A", &events);
    let b = tracked("B", &events);
    let tree = |dep: i64| h("div").child(el(&a).attr("dep", dep)).child(el(&b).attr("dep", dep));

    root.render(tree(1));
    rt.flush_microtasks();
    // Committed, effects still queued.
    assert_eq!(rt.dump(&root), "<div>AB</div>");
    assert!(entries(&events).is_empty());

    rt.run_until_idle();
    assert_eq!(entries(&events), vec!["create A 1", "create B 1"]);
    events.borrow_mut().clear();

    root.render(tree(2));
    rt.run_until_idle();
    assert_eq!(
        entries(&events),
        vec!["destroy A 1", "destroy B 1", "create A 2", "create B 2"]
    );
}

#[test]
fn unchanged_deps_skip_the_effect() {
    let rt = runtime();
    let root = rt.create_root();
    let events = log();
    let a = tracked("A", &events);

    root.render(el(&a).attr("dep", 1).attr("other", 1));
    rt.run_until_idle();
    root.render(el(&a).attr("dep", 1).attr("other", 2));
    rt.run_until_idle();

    assert_eq!(entries(&events), vec!["create A 1"]);
}

#[test]
fn unmounting_runs_every_cleanup() {
    let rt = runtime();
    let root = rt.create_root();
    let events = log();
    let a = tracked("A", &events);
    let b = tracked("B", &events);
    root.render(h("div").child(el(&a)).child(h("span").child(el(&b))));
    rt.run_until_idle();
    events.borrow_mut().clear();

    root.unmount();
    rt.run_until_idle();

    let mut seen = entries(&events);
    seen.sort();
    assert_eq!(seen, vec!["destroy A 0", "destroy B 0"]);
    assert_eq!(rt.dump(&root), "");
}

#[test]
fn passive_effects_flush_before_the_next_render() {
    let rt = runtime();
    let root = rt.create_root();
    let events = log();
    let a = tracked("A", &events);

    root.render(el(&a).attr("dep", 1));
    rt.flush_microtasks();
    root.render(el(&a).attr("dep", 2));
    rt.flush_microtasks();

    // The second render flushed the first commit's effects first.
    assert_eq!(entries(&events), vec!["create A 1"]);
    rt.run_until_idle();
    assert_eq!(entries(&events), vec!["create A 1", "destroy A 1", "create A 2"]);
}

#[test]
fn flush_passive_effects_runs_them_now() {
    let rt = runtime();
    let root = rt.create_root();
    let events = log();
    root.render(el(&tracked("A", &events)));
    rt.flush_microtasks();

    assert!(root.flush_passive_effects());
    assert_eq!(entries(&events), vec!["create A 0"]);
    assert!(!root.flush_passive_effects());
}

#[test]
fn effect_updates_beyond_the_limit_abort() {
    let rt = runtime_with(ReconcilerConfig::default().with_nested_update_limit(5));
    let root = rt.create_root();
    let app = Component::new("Runaway", |cx, _props| {
        let (count, set_count) = cx.use_state(0)?;
        cx.use_effect_always(move || {
            set_count.update(|c| c + 1);
            None
        })?;
        Ok(text(count.to_string()))
    });

    root.render(el(&app));
    rt.run_until_idle();

    assert_eq!(root.take_error(), Some(ReconcilerError::NestedUpdateLimit { limit: 5 }));
    assert!(root.pending_lanes().is_empty());
    assert_eq!(rt.scheduler.pending_tasks(), 0);
}

// ---- Memo, context and refs ----

#[test]
fn memo_component_skips_equal_props() {
    let rt = runtime();
    let root = rt.create_root();
    let renders = Rc::new(Cell::new(0));
    let label = {
        let renders = Rc::clone(&renders);
        memo(Component::new("Label", move |_cx, props| {
            renders.set(renders.get() + 1);
            Ok(text(props.get_str("text").unwrap_or_default()))
        }))
    };
    let state = slot();
    let parent = {
        let state = Rc::clone(&state);
        Component::new("Parent", move |cx, _props| {
            let (count, set_count) = cx.use_state(0)?;
            *state.borrow_mut() = Some(set_count);
            Ok(h("div")
                .child(text(count.to_string()))
                .child(el(&label).attr("text", "fixed"))
                .into())
        })
    };
    root.render(el(&parent));
    rt.run_until_idle();

    setter(&state).set(1);
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<div>1fixed</div>");
    assert_eq!(renders.get(), 1);
}

#[test]
fn context_change_reaches_consumer_below_memo() {
    let rt = runtime();
    let root = rt.create_root();
    let theme = Context::new(String::from("light"));
    let consumer = {
        let theme = theme.clone();
        Component::new("Consumer", move |cx, _props| {
            let value = cx.use_context(&theme);
            Ok(h("span").child(text(value)).into())
        })
    };
    let middle = {
        let consumer = consumer.clone();
        memo(Component::new("Middle", move |_cx, _props| Ok(el(&consumer).into())))
    };
    let state = slot();
    let app = {
        let state = Rc::clone(&state);
        let theme = theme.clone();
        Component::new("App", move |cx, _props| {
            let (dark, set_dark) = cx.use_state(false)?;
            *state.borrow_mut() = Some(set_dark);
            let value = if dark { "dark" } else { "light" };
            Ok(theme.provider(value.to_owned()).child(el(&middle)).into())
        })
    };

    root.render(h("div").child(el(&app)).child(el(&consumer)));
    rt.run_until_idle();
    assert_eq!(rt.dump(&root), "<div><span>light</span><span>light</span></div>");

    setter(&state).set(true);
    rt.run_until_idle();
    // The consumer outside the provider keeps the default.
    assert_eq!(rt.dump(&root), "<div><span>dark</span><span>light</span></div>");
}

#[test]
fn nested_providers_shadow_and_restore() {
    let rt = runtime();
    let root = rt.create_root();
    let depth = Context::new(0);
    let show = {
        let depth = depth.clone();
        Component::new("Show", move |cx, _props| Ok(text(cx.use_context(&depth).to_string())))
    };

    root.render(
        depth
            .provider(1)
            .child(el(&show))
            .child(depth.provider(2).child(el(&show)))
            .child(el(&show)),
    );
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "121");
}

#[test]
fn object_ref_follows_the_instance() {
    let rt = runtime();
    let root = rt.create_root();
    let field = NodeRef::new();

    root.render(h("form").child(h("input").attr("id", "field").node_ref(&field)));
    rt.run_until_idle();
    assert!(field.get().is_some());
    assert_eq!(field.get(), rt.find(&root, "field"));

    root.render(h("form"));
    rt.run_until_idle();
    assert_eq!(field.get(), None);
}

#[test]
fn callback_ref_detaches_before_attaching_new_one() {
    let rt = runtime();
    let root = rt.create_root();
    let calls: Rc<RefCell<Vec<(&'static str, Option<HostNodeId>)>>> = Rc::new(RefCell::new(Vec::new()));
    let make_ref = |name: &'static str| {
        let calls = Rc::clone(&calls);
        ElementRef::callback(move |node| calls.borrow_mut().push((name, node)))
    };

    root.render(h("div").attr("id", "target").node_ref(make_ref("first")));
    rt.run_until_idle();
    let target = rt.find(&root, "target");
    assert_eq!(*calls.borrow(), vec![("first", target)]);
    calls.borrow_mut().clear();

    root.render(h("div").attr("id", "target").node_ref(make_ref("second")));
    rt.run_until_idle();
    assert_eq!(*calls.borrow(), vec![("first", None), ("second", target)]);
}

// ---- Suspense ----

fn reader(source: &Rc<RefCell<Thenable<String>>>) -> Component {
    let source = Rc::clone(source);
    Component::new("Reader", move |cx, _props| {
        let thenable = source.borrow().clone();
        let value = cx.use_thenable(&thenable)?;
        Ok(h("p").child(text(value)).into())
    })
}

#[test]
fn suspense_shows_fallback_until_data_resolves() {
    let rt = runtime();
    let root = rt.create_root();
    let data = Thenable::pending();
    let source = Rc::new(RefCell::new(data.clone()));

    root.render(h("div").child(suspense(text("loading")).child(el(&reader(&source)))));
    rt.run_until_idle();
    assert_eq!(rt.dump(&root), "<div>loading</div>");
    rt.clear_ops();

    data.resolve("done".to_owned());
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<div><p>done</p></div>");
    assert_eq!(rt.dump_all(&root), "<div><p>done</p></div>");
    let ops = rt.take_ops();
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Remove { .. })), 1);
    assert!(!root.has_pending_work());
}

#[test]
fn suspending_again_hides_committed_content() {
    let rt = runtime();
    let root = rt.create_root();
    let source = Rc::new(RefCell::new(Thenable::resolved("first".to_owned())));
    let view = reader(&source);
    let tree = |version: i64| h("div").child(suspense(text("loading")).child(el(&view).attr("v", version)));

    root.render(tree(1));
    rt.run_until_idle();
    assert_eq!(rt.dump(&root), "<div><p>first</p></div>");

    let next = Thenable::pending();
    *source.borrow_mut() = next.clone();
    root.render(tree(2));
    rt.run_until_idle();

    assert_eq!(rt.dump(&root), "<div>loading</div>");
    assert_eq!(rt.dump_all(&root), "<div><p hidden>first</p>loading</div>");
    rt.clear_ops();

    next.resolve("second".to_owned());
    rt.run_until_idle();

    assert_eq!(rt.dump_all(&root), "<div><p>second</p></div>");
    let ops = rt.take_ops();
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Unhide { .. })), 1);
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Remove { .. })), 1);
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { .. })), 0);
}

#[test]
fn data_resolving_during_a_paused_render_is_not_lost() {
    let spans: String = (0..10).map(|i| format!("<span>{i}</span>")).collect();

    // Pause the pass at every depth, before and after the boundary suspends.
    for slice in 1..=12 {
        let rt = runtime();
        let root = rt.create_root();
        let data = Thenable::pending();
        let source = Rc::new(RefCell::new(data.clone()));
        let view = reader(&source);

        rt.scheduler.set_yield_after(Some(slice));
        rt.reconciler.start_transition(|| {
            root.render_deferred(
                h("div")
                    .child(suspense(text("loading")).child(el(&view)))
                    .children((0..10).map(|i| h("span").key(i).child(text(i.to_string())))),
            )
        });
        assert!(rt.scheduler.run_next_task());

        data.resolve("done".to_owned());
        rt.flush_microtasks();
        rt.run_until_idle();

        assert_eq!(rt.dump(&root), format!("<div><p>done</p>{spans}</div>"), "slice {slice}");
        assert!(!root.has_pending_work(), "slice {slice}");
    }
}

#[test]
fn concurrent_retry_reveals_hidden_content() {
    let rt = runtime();
    let root = rt.create_root();
    let source = Rc::new(RefCell::new(Thenable::resolved("first".to_owned())));
    let view = reader(&source);
    let tree = |version: i64| h("div").child(suspense(text("loading")).child(el(&view).attr("v", version)));

    root.render(tree(1));
    rt.run_until_idle();

    let next = Thenable::pending();
    *source.borrow_mut() = next.clone();
    rt.reconciler.start_transition(|| root.render_deferred(tree(2)));
    rt.run_until_idle();
    assert_eq!(rt.dump_all(&root), "<div><p hidden>first</p>loading</div>");
    rt.clear_ops();

    // The retry runs at the transition lane, one slice at a time.
    rt.scheduler.set_yield_after(Some(2));
    next.resolve("second".to_owned());
    rt.flush_microtasks();
    assert!(rt.scheduler.run_next_task());
    assert!(root.has_pending_work());
    assert_eq!(count_ops(&rt.take_ops(), |op| op.is_mutation_of_attached_tree()), 0);
    assert_eq!(rt.dump_all(&root), "<div><p hidden>first</p>loading</div>");

    rt.run_until_idle();
    assert_eq!(rt.dump_all(&root), "<div><p>second</p></div>");
    let ops = rt.take_ops();
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Unhide { .. })), 1);
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::Remove { .. })), 1);
    assert_eq!(count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { .. })), 0);
    assert!(!root.has_pending_work());
}

#[test]
fn siblings_outside_the_boundary_stay_visible() {
    let rt = runtime();
    let root = rt.create_root();
    let data = Thenable::pending();
    let source = Rc::new(RefCell::new(data.clone()));

    root.render(
        h("main")
            .child(h("header").child("top"))
            .child(suspense(h("i").child("wait")).child(el(&reader(&source))))
            .child(h("footer").child("bottom")),
    );
    rt.run_until_idle();
    assert_eq!(
        rt.dump(&root),
        "<main><header>top</header><i>wait</i><footer>bottom</footer></main>"
    );

    data.resolve("body".to_owned());
    rt.run_until_idle();
    assert_eq!(
        rt.dump(&root),
        "<main><header>top</header><p>body</p><footer>bottom</footer></main>"
    );
}

#[test]
fn rejected_data_reports_an_error() {
    let rt = runtime();
    let root = rt.create_root();
    let source = Rc::new(RefCell::new(Thenable::<String>::pending()));
    let data = source.borrow().clone();

    root.render(suspense(text("loading")).child(el(&reader(&source))));
    rt.run_until_idle();
    data.reject("offline");
    rt.run_until_idle();

    assert_eq!(root.take_error(), Some(ReconcilerError::Thrown(ThrownError::new("offline"))));
    assert_eq!(rt.dump(&root), "loading");
}

// ---- Errors ----

#[test]
fn thrown_error_keeps_the_committed_tree() {
    let rt = runtime();
    let root = rt.create_root();
    let widget = Component::new("Widget", |_cx, props| {
        if props.get_bool("explode").unwrap_or(false) {
            return Err(ThrownError::new("boom").into());
        }
        Ok(text("fine"))
    });

    root.render(h("div").child(el(&widget)));
    rt.run_until_idle();
    root.render(h("div").child(el(&widget).attr("explode", true)));
    rt.run_until_idle();

    assert_eq!(root.take_error(), Some(ReconcilerError::Thrown(ThrownError::new("boom"))));
    assert_eq!(rt.dump(&root), "<div>fine</div>");
    assert_eq!(root.take_error(), None);
}

#[test]
fn changing_hook_count_is_a_usage_error() {
    let rt = runtime();
    let root = rt.create_root();
    let unstable = Component::new("Unstable", |cx, props| {
        let (a, _) = cx.use_state(1)?;
        if props.get_bool("extra").unwrap_or(false) {
            let (b, _) = cx.use_state(2)?;
            return Ok(text((a + b).to_string()));
        }
        Ok(text(a.to_string()))
    });

    root.render(el(&unstable));
    rt.run_until_idle();
    root.render(el(&unstable).attr("extra", true));
    rt.run_until_idle();

    assert!(matches!(
        root.take_error(),
        Some(ReconcilerError::Usage(UsageError::MoreHooksThanPreviousRender { .. }))
    ));
    assert_eq!(rt.dump(&root), "1");
}

#[test]
fn changing_hook_kind_is_a_usage_error() {
    let rt = runtime();
    let root = rt.create_root();
    let unstable = Component::new("Unstable", |cx, props| {
        if props.get_bool("flip").unwrap_or(false) {
            cx.use_ref(0)?;
        } else {
            cx.use_state(0)?;
        }
        Ok(Child::Empty)
    });

    root.render(el(&unstable));
    rt.run_until_idle();
    root.render(el(&unstable).attr("flip", true));
    rt.run_until_idle();

    assert!(matches!(
        root.take_error(),
        Some(ReconcilerError::Usage(UsageError::HookMismatch { index: 0, .. }))
    ));
}

#[test]
fn roots_render_independently() {
    let rt = runtime();
    let left = rt.create_root();
    let right = rt.create_root();

    left.render(h("p").child("left"));
    right.render(h("p").child("right"));
    rt.run_until_idle();
    left.unmount();
    rt.run_until_idle();

    assert_eq!(rt.dump(&left), "");
    assert_eq!(rt.dump(&right), "<p>right</p>");
}
