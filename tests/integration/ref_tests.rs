use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::{block_on, LocalPool};
use futures::task::LocalSpawnExt;
use oxide_component::{
    Component, ComponentError, ComponentSource, Constructor, Dom, Element, Factory, Host,
    MemoryDom, Phase, Props, RefConfig, Target,
};
use serde_json::{json, Value};

use super::{setup, state, Journal, TestLogic};

/// A mounted parent with `count: 0` whose root holds `.slot-a` and `.slot-b`.
fn mounted_parent(dom: &MemoryDom, host: &Host, journal: &Journal) -> (Component, Element) {
    let root = dom.append(dom.document(), "div", &[("id", "parent")]);
    dom.append(root, "div", &[("class", "slot-a")]);
    dom.append(root, "div", &[("class", "slot-b")]);

    let component = host.create(TestLogic::named("parent", journal).declaring(|_, declare| {
        declare.state("count", json!(0));
    }));
    component.mount(root, Some(state(json!({})))).unwrap();
    (component, root)
}

fn child(name: &'static str, journal: &Journal) -> Constructor {
    let journal = journal.clone();
    Constructor::new(move || TestLogic::named(name, &journal))
}

#[test]
fn given_a_bound_prop_when_the_parent_state_changes_should_update_the_child() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);

    let label = block_on(parent.set_ref(
        RefConfig::new("label", child("label", &journal)).el(".slot-a"),
        Some(
            Props::new()
                .value("title", json!("Counter"))
                .bind("label", |parent_state: &Value, _: &Component| {
                    json!(format!("n={}", parent_state["count"]))
                }),
        ),
    ))
    .unwrap();

    assert!(label.is_active());
    assert_eq!(label.get_state("title", json!(null)), json!("Counter"));
    assert_eq!(label.get_state("label", json!(null)), json!("n=0"));

    parent.set_state(json!({ "count": 5 }));

    assert_eq!(label.get_state("label", json!(null)), json!("n=5"));
}

#[test]
fn given_a_sliced_binding_should_receive_only_the_named_parent_key() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);
    let inputs = Rc::new(RefCell::new(Vec::new()));
    let seen = inputs.clone();

    let badge = block_on(parent.set_ref(
        RefConfig::new("badge", child("badge", &journal)).el(".slot-b"),
        Some(Props::new().bind(
            "count>value",
            move |count: &Value, _: &Component| {
                seen.borrow_mut().push(count.clone());
                json!(count.as_i64().unwrap_or(0) * 10)
            },
        )),
    ))
    .unwrap();

    parent.set_state(json!({ "count": 2 }));

    assert_eq!(*inputs.borrow(), vec![json!(0), json!(2)]);
    assert_eq!(badge.get_state("value", json!(null)), json!(20));
}

#[test]
fn given_an_occupied_id_should_destroy_the_previous_child_before_swapping_in_place() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, root) = mounted_parent(&dom, &host, &journal);
    let slot_a = dom.query(".slot-a", Some(root)).unwrap();
    let replacement = dom.element("div", &[("class", "replacement")]);

    let old = block_on(parent.set_ref(
        RefConfig::new("item", {
            let journal = journal.clone();
            let dom = dom.clone();
            Constructor::new(move || {
                let journal = journal.clone();
                let dom = dom.clone();
                TestLogic::named("old", &journal).on_destroy(move |_| {
                    let attached = dom.contains(root, replacement);
                    journal.record(format!("replacement attached: {attached}"));
                })
            })
        })
        .el(slot_a),
        None,
    ))
    .unwrap();
    let nested_el = dom.append(slot_a, "span", &[]);
    block_on(old.set_ref(
        RefConfig::new("nested", child("nested", &journal)).el(nested_el),
        None,
    ))
    .unwrap();

    let new = block_on(parent.set_ref(
        RefConfig::new("item", child("new", &journal)).el(replacement),
        None,
    ))
    .unwrap();

    assert_eq!(old.phase(), Phase::Destroyed);
    assert_eq!(journal.count("replacement attached: false"), 1);
    assert!(journal.position("nested:before_destroy") < journal.position("new:initialize"));
    assert!(journal.position("old:before_destroy") < journal.position("new:initialize"));
    assert_eq!(dom.children(root)[0], replacement);
    assert!(!dom.contains(root, slot_a));
    assert!(parent.child("item").unwrap().ptr_eq(&new));
    assert_eq!(parent.child_ids(), vec!["item"]);
}

#[test]
fn given_a_child_root_outside_the_parent_should_append_it() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, root) = mounted_parent(&dom, &host, &journal);
    let floating = dom.element("aside", &[]);

    block_on(parent.set_ref(
        RefConfig::new("aside", child("aside", &journal)).el(floating),
        None,
    ))
    .unwrap();

    assert_eq!(dom.children(root).last(), Some(&floating));
    assert_eq!(parent.child_elements(), vec![floating]);
}

#[test]
fn given_invalid_configurations_should_fail_without_registering_a_child() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);
    let detached_parent = host.create(TestLogic::named("service", &journal).declaring(
        |_, declare| {
            declare.detached();
        },
    ));
    detached_parent.init(state(json!({}))).unwrap();

    let missing_id = block_on(parent.set_ref(RefConfig::new("", child("x", &journal)), None));
    let rooted_under_detached = block_on(detached_parent.set_ref(
        RefConfig::new("x", child("x", &journal)).el(".slot-a"),
        None,
    ));
    let missing_root = block_on(parent.set_ref(RefConfig::new("x", child("x", &journal)), None));

    assert!(matches!(missing_id, Err(ComponentError::InvalidConfig(_))));
    assert!(matches!(
        rooted_under_detached,
        Err(ComponentError::InvalidConfig(_))
    ));
    assert!(matches!(
        missing_root,
        Err(ComponentError::MissingRoot { id }) if id == "x"
    ));
    assert!(parent.child_ids().is_empty());
    assert!(detached_parent.child_ids().is_empty());
}

#[test]
fn given_an_unresolvable_el_when_replacing_a_child_should_keep_the_previous_one() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, root) = mounted_parent(&dom, &host, &journal);
    let slot_a = dom.query(".slot-a", Some(root)).unwrap();
    let bound = || Props::new().bind("count>value", |count: &Value, _: &Component| count.clone());

    let item = block_on(parent.set_ref(
        RefConfig::new("item", child("first", &journal)).el(".slot-a"),
        Some(bound()),
    ))
    .unwrap();
    journal.clear();

    let replaced = block_on(parent.set_ref(
        RefConfig::new("item", child("second", &journal)).el("#does-not-exist"),
        Some(bound()),
    ));

    assert!(matches!(
        replaced,
        Err(ComponentError::MissingRoot { id }) if id == "item"
    ));
    assert!(parent.child("item").unwrap().ptr_eq(&item));
    assert!(item.is_active());
    assert_eq!(item.el(), Some(slot_a));
    assert_eq!(dom.parent(slot_a), Some(root));
    assert_eq!(journal.count("first:before_destroy"), 0);
    assert_eq!(parent.events().listener_count("change:count"), 1);

    parent.set_state(json!({ "count": 3 }));
    assert_eq!(item.get_state("value", json!(null)), json!(3));
}

#[test]
fn given_a_detached_child_should_attach_without_a_root() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, root) = mounted_parent(&dom, &host, &journal);
    let before = dom.children(root);

    let store = block_on(parent.set_ref(
        RefConfig::new(
            "store",
            Constructor::new({
                let journal = journal.clone();
                move || {
                    TestLogic::named("store", &journal).declaring(|_, declare| {
                        declare.detached();
                    })
                }
            }),
        ),
        Some(Props::new().value("items", json!([]))),
    ))
    .unwrap();

    assert_eq!(store.el(), None);
    assert!(store.is_active());
    assert_eq!(store.get_state("items", json!(null)), json!([]));
    assert_eq!(dom.children(root), before);
}

#[test]
fn given_an_unknown_id_when_destroyed_should_fail_with_not_found() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);

    let result = block_on(parent.destroy_ref("ghost", false));

    assert!(matches!(result, Err(ComponentError::NotFound { id }) if id == "ghost"));
}

#[test]
fn given_a_child_when_destroyed_by_id_should_detach_its_node_only_on_request() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, root) = mounted_parent(&dom, &host, &journal);
    let slot_a = dom.query(".slot-a", Some(root)).unwrap();
    let slot_b = dom.query(".slot-b", Some(root)).unwrap();

    block_on(parent.set_ref(
        RefConfig::new("kept", child("kept", &journal)).el(slot_a),
        Some(Props::new().bind("count>count", |count: &Value, _: &Component| count.clone())),
    ))
    .unwrap();
    block_on(parent.set_ref(
        RefConfig::new("removed", child("removed", &journal)).el(slot_b),
        None,
    ))
    .unwrap();
    assert_eq!(parent.events().listener_count("change:count"), 1);

    block_on(parent.destroy_ref("kept", false)).unwrap();
    block_on(parent.destroy_ref("removed", true)).unwrap();

    assert!(dom.contains(root, slot_a));
    assert!(!dom.contains(root, slot_b));
    assert_eq!(dom.parent(slot_b), None);
    assert_eq!(parent.events().listener_count("change:count"), 0);
    assert!(parent.child_ids().is_empty());
    assert_eq!(journal.count("kept:before_destroy"), 1);
}

#[test]
fn given_several_children_when_one_fails_to_tear_down_should_still_destroy_all_concurrently() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, root) = mounted_parent(&dom, &host, &journal);

    let logics = [
        TestLogic::named("a", &journal).yielding(),
        TestLogic::named("b", &journal).yielding().failing(),
        TestLogic::named("c", &journal),
    ];
    for (index, logic) in logics.into_iter().enumerate() {
        let el = dom.append(root, "div", &[]);
        block_on(parent.set_ref(
            RefConfig::new(format!("child-{index}"), Constructor::new(move || logic.clone()))
                .el(el),
            None,
        ))
        .unwrap();
    }
    journal.clear();

    let failures = match block_on(parent.destroy_refs()) {
        Err(ComponentError::Teardown { failures }) => failures,
        other => panic!("expected a teardown failure, got {other:?}"),
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].id, "child-1");
    assert!(matches!(*failures[0].source, ComponentError::Hook(_)));

    assert!(journal.position("b:before_destroy") < journal.position("a:resumed"));
    assert!(journal.position("c:before_destroy") < journal.position("a:resumed"));
    assert_eq!(journal.count("b:resumed"), 1);
    assert!(parent.child_ids().is_empty());
}

#[test]
fn given_a_failing_child_when_the_parent_is_destroyed_should_reject_and_stay_active() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);
    let failing = TestLogic::named("failing", &journal).failing();

    block_on(parent.set_ref(
        RefConfig::new("failing", Constructor::new(move || failing.clone())).el(".slot-a"),
        None,
    ))
    .unwrap();

    let result = block_on(parent.destroy());

    assert!(matches!(result, Err(ComponentError::Teardown { .. })));
    assert_eq!(parent.phase(), Phase::Destroyed);
    assert!(parent.is_active());
    assert!(parent.child_ids().is_empty());
}

#[test]
fn given_no_children_when_destroying_refs_should_do_nothing() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);
    journal.clear();

    block_on(parent.destroy_refs()).unwrap();

    assert!(journal.entries().is_empty());
    assert!(parent.is_active());
}

#[test]
fn given_a_broadcast_should_reach_direct_children_only() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);

    let listen = |name: &'static str| {
        let journal = journal.clone();
        move |args: &[Value]| journal.record(format!("{name} heard {}", Value::Array(args.to_vec())))
    };

    let middle = block_on(parent.set_ref(
        RefConfig::new("middle", child("middle", &journal))
            .el(".slot-a")
            .on("broadcast:ping", listen("middle")),
        None,
    ))
    .unwrap();
    let leaf_el = dom.append(middle.el().unwrap(), "span", &[]);
    block_on(middle.set_ref(
        RefConfig::new("leaf", child("leaf", &journal))
            .el(leaf_el)
            .on("broadcast:ping", listen("leaf")),
        None,
    ))
    .unwrap();

    parent.broadcast("ping", &[json!(1)]);

    assert_eq!(journal.count("middle heard [1]"), 1);
    assert_eq!(journal.count("leaf heard [1]"), 0);
}

#[test]
fn given_event_bindings_should_subscribe_them_on_the_child() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);
    let picked = Rc::new(RefCell::new(Vec::new()));
    let sink = picked.clone();

    let menu = block_on(parent.set_ref(
        RefConfig::new("menu", child("menu", &journal))
            .el(".slot-a")
            .on("picked", move |args| sink.borrow_mut().extend(args.iter().cloned())),
        None,
    ))
    .unwrap();

    menu.emit("picked", &[json!("first")]);

    assert_eq!(*picked.borrow(), vec![json!("first")]);
}

struct Theme {
    accent: &'static str,
}

#[test]
fn given_a_parent_context_should_share_the_same_value_at_any_depth() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);
    parent.provide_context(Theme { accent: "teal" });

    let middle = block_on(parent.set_ref(
        RefConfig::new("middle", child("middle", &journal)).el(".slot-a"),
        None,
    ))
    .unwrap();
    let leaf_el = dom.append(middle.el().unwrap(), "span", &[]);
    let leaf = block_on(middle.set_ref(
        RefConfig::new("leaf", child("leaf", &journal)).el(leaf_el),
        None,
    ))
    .unwrap();

    let shared = parent.context::<Theme>().unwrap();
    let seen = leaf.context::<Theme>().unwrap();
    assert!(Rc::ptr_eq(&shared, &seen));
    assert_eq!(seen.accent, "teal");
    assert!(leaf.context::<String>().is_none());
}

#[test]
fn given_a_parent_without_context_should_leave_children_without_one() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);

    let orphan = block_on(parent.set_ref(
        RefConfig::new("orphan", child("orphan", &journal)).el(".slot-a"),
        None,
    ))
    .unwrap();

    assert!(orphan.context_handle().is_none());
}

#[test]
fn given_a_factory_should_build_the_child_from_its_root_and_the_parent_state() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);
    parent.set_state(json!({ "count": 4 }));
    let calls = Rc::new(RefCell::new(Vec::new()));
    let seen = calls.clone();

    let factory = {
        let journal = journal.clone();
        Factory::new(move |host, el, parent_state| {
            seen.borrow_mut()
                .push((el.cloned(), parent_state.get("count").cloned()));
            host.create(TestLogic::named("made", &journal))
        })
    };
    let made = block_on(parent.set_ref(RefConfig::new("made", factory).el(".slot-b"), None)).unwrap();

    assert_eq!(
        *calls.borrow(),
        vec![(Some(Target::Selector(".slot-b".to_string())), Some(json!(4)))]
    );
    assert!(made.is_active());
    assert_eq!(made.el(), dom.query(".slot-b", None));
}

#[test]
fn given_a_live_instance_should_attach_it_as_is() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);
    let existing = host.create(TestLogic::named("existing", &journal));

    let attached = block_on(parent.set_ref(
        RefConfig::new("existing", ComponentSource::Instance(existing.clone())).el(".slot-a"),
        None,
    ))
    .unwrap();

    assert!(attached.ptr_eq(&existing));
    assert_eq!(journal.count("existing:created"), 1);
    assert_eq!(existing.el(), dom.query(".slot-a", None));
}

#[test]
fn given_a_child_with_deferred_readiness_should_resolve_only_once_it_is_ready() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (parent, _root) = mounted_parent(&dom, &host, &journal);
    let mut pool = LocalPool::new();

    let slow = {
        let journal = journal.clone();
        Constructor::new(move || {
            TestLogic::named("slow", &journal).declaring(|_, declare| {
                declare
                    .state("loaded", json!(false))
                    .ready_state(|current, _| current.get("loaded") == Some(&json!(true)));
            })
        })
    };
    let attaching = parent.clone();
    let outcome = journal.clone();
    pool.spawner()
        .spawn_local(async move {
            let result = attaching
                .set_ref(RefConfig::new("slow", slow).el(".slot-a"), None)
                .await;
            outcome.record(format!("attached: {}", result.is_ok()));
        })
        .unwrap();

    pool.run_until_stalled();
    assert_eq!(journal.count("attached: true"), 0);
    let slow = parent.child("slow").unwrap();
    assert!(slow.is_active());
    assert!(!slow.is_ready());

    slow.set_state(json!({ "loaded": true }));
    pool.run_until_stalled();

    assert_eq!(journal.count("slow:ready"), 1);
    assert_eq!(journal.count("attached: true"), 1);
}
