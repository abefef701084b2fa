use std::rc::Rc;

use futures::executor::block_on;
use oxide_component::{
    ComponentError, Constructor, Dom, Element, MemoryDom, Options, Phase, RefConfig, Registration,
    Sandbox, SandboxConfig, BEFORE_START, BEFORE_STOP, SANDBOX_DATA_ATTR, SANDBOX_ID_PREFIX, START,
    STOP,
};
use serde_json::json;

use super::{setup, Journal, TestLogic};

/// `<main id="app">` holding two `.gallery` and one `.cart`, plus a stray `.gallery`.
fn markup(dom: &MemoryDom) -> (Element, Vec<Element>, Element, Element) {
    let app = dom.append(dom.document(), "main", &[("id", "app")]);
    let galleries = vec![
        dom.append(app, "div", &[("class", "gallery")]),
        dom.append(app, "div", &[("class", "gallery")]),
    ];
    let cart = dom.append(app, "aside", &[("class", "cart")]);
    let stray = dom.append(dom.document(), "div", &[("class", "gallery")]);
    (app, galleries, cart, stray)
}

fn gallery(journal: &Journal) -> Constructor {
    let journal = journal.clone();
    Constructor::new(move || TestLogic::named("gallery", &journal).rooted(".gallery"))
}

fn cart(journal: &Journal) -> Constructor {
    let journal = journal.clone();
    Constructor::new(move || TestLogic::named("cart", &journal))
}

fn record_events(sandbox: &Sandbox, journal: &Journal) {
    for event in [BEFORE_START, START, BEFORE_STOP, STOP] {
        let journal = journal.clone();
        sandbox.on(event, move |_args| journal.record(format!("sandbox:{event}")));
    }
}

#[derive(Debug)]
struct Locale(&'static str);

#[test]
fn given_no_id_should_generate_one_and_stamp_the_root() {
    let (dom, host) = setup();
    let (app, _galleries, _cart, _stray) = markup(&dom);

    let first = Sandbox::new(&host, SandboxConfig::new("#app")).unwrap();
    let second = Sandbox::new(&host, SandboxConfig::new(app)).unwrap();

    let suffix = first.id().strip_prefix(SANDBOX_ID_PREFIX).unwrap();
    assert!(suffix.parse::<u64>().is_ok());
    assert_ne!(first.id(), second.id());
    assert_eq!(first.root(), app);
    assert_eq!(dom.attribute(app, SANDBOX_DATA_ATTR).as_deref(), Some(second.id()));
}

#[test]
fn given_an_explicit_id_should_use_it() {
    let (dom, host) = setup();
    let (app, _galleries, _cart, _stray) = markup(&dom);

    let sandbox = Sandbox::new(&host, SandboxConfig::new("#app").id("shop")).unwrap();

    assert_eq!(sandbox.id(), "shop");
    assert_eq!(dom.attribute(app, SANDBOX_DATA_ATTR), Some("shop".to_string()));
}

#[test]
fn given_an_unresolvable_root_should_fail() {
    let (_dom, host) = setup();

    let result = Sandbox::new(&host, SandboxConfig::new("#nowhere"));

    assert!(matches!(
        result,
        Err(ComponentError::RootNotFound { target }) if target == "#nowhere"
    ));
}

#[test]
fn given_a_registration_without_a_usable_selector_should_reject_it() {
    let (dom, host) = setup();
    let journal = Journal::default();
    markup(&dom);
    let mut sandbox = Sandbox::new(&host, SandboxConfig::new("#app")).unwrap();

    let unrooted = sandbox.register(Registration::new(cart(&journal)));
    let blank = sandbox.register(Registration::new(gallery(&journal)).selector("  "));
    let configured = Sandbox::new(
        &host,
        SandboxConfig::new("#app").component(Registration::new(cart(&journal))),
    );

    assert!(matches!(unrooted, Err(ComponentError::InvalidConfig(_))));
    assert!(matches!(blank, Err(ComponentError::InvalidConfig(_))));
    assert!(matches!(configured, Err(ComponentError::InvalidConfig(_))));
    assert_eq!(sandbox.registered(), 0);
    assert_eq!(journal.count("cart:created"), 0);
}

#[test]
fn given_a_started_sandbox_should_mount_one_instance_per_matching_element_inside_the_root() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (_app, galleries, cart_el, stray) = markup(&dom);
    let mut sandbox = Sandbox::new(
        &host,
        SandboxConfig::new("#app")
            .component(Registration::new(gallery(&journal)))
            .component(
                Registration::new(cart(&journal))
                    .selector(".cart")
                    .option("currency", json!("EUR")),
            ),
    )
    .unwrap();
    record_events(&sandbox, &journal);

    sandbox.start(Locale("fr-FR")).unwrap();

    let mounted: Vec<Option<Element>> =
        sandbox.instances(".gallery").iter().map(|c| c.el()).collect();
    assert_eq!(mounted, galleries.iter().copied().map(Some).collect::<Vec<_>>());
    assert!(!mounted.contains(&Some(stray)));
    assert!(sandbox.instances(".gallery").iter().all(|c| c.is_active()));
    assert_eq!(journal.count("gallery:ready"), 2);

    let carts = sandbox.instances(".cart");
    assert_eq!(carts.len(), 1);
    assert_eq!(carts[0].el(), Some(cart_el));
    assert_eq!(carts[0].options().value("currency"), None);

    assert!(sandbox.is_running());
    assert_eq!(journal.position("sandbox:beforeStart"), Some(0));
    assert!(journal.position("gallery:created") > journal.position("sandbox:beforeStart"));
    assert_eq!(journal.entries().last().map(String::as_str), Some("sandbox:start"));
}

#[test]
fn given_registration_options_should_override_the_known_defaults() {
    let (dom, host) = setup();
    let journal = Journal::default();
    markup(&dom);
    let priced = {
        let journal = journal.clone();
        Constructor::new(move || {
            TestLogic::named("cart", &journal)
                .with_defaults(Options::new().with("currency", json!("USD")))
        })
    };
    let mut sandbox = Sandbox::new(
        &host,
        SandboxConfig::new("#app").component(
            Registration::new(priced)
                .selector(".cart")
                .option("currency", json!("EUR")),
        ),
    )
    .unwrap();

    sandbox.start(()).unwrap();

    let cart = &sandbox.instances(".cart")[0];
    assert_eq!(cart.options().value("currency"), Some(&json!("EUR")));
}

#[test]
fn given_a_start_context_should_share_it_with_every_instance_and_their_children() {
    let (dom, host) = setup();
    let journal = Journal::default();
    let (_app, galleries, _cart, _stray) = markup(&dom);
    let caption = dom.append(galleries[0], "span", &[("class", "caption")]);
    let mut sandbox = Sandbox::new(
        &host,
        SandboxConfig::new("#app").component(Registration::new(gallery(&journal))),
    )
    .unwrap();

    sandbox.start(Locale("fr-FR")).unwrap();

    let shared = sandbox.context_handle().unwrap();
    for instance in sandbox.instances(".gallery") {
        let seen = instance.context_handle().unwrap();
        assert!(Rc::ptr_eq(&shared, &seen));
    }

    let first = &sandbox.instances(".gallery")[0];
    let child = block_on(first.set_ref(RefConfig::new("caption", cart(&journal)).el(caption), None))
        .unwrap();
    assert_eq!(child.context::<Locale>().map(|locale| locale.0), Some("fr-FR"));
}

#[test]
fn given_a_started_sandbox_when_started_again_should_not_duplicate_instances() {
    let (dom, host) = setup();
    let journal = Journal::default();
    markup(&dom);
    let mut sandbox = Sandbox::new(
        &host,
        SandboxConfig::new("#app").component(Registration::new(gallery(&journal))),
    )
    .unwrap();

    sandbox.start(Locale("en-GB")).unwrap();
    sandbox.start(Locale("de-DE")).unwrap();

    assert_eq!(sandbox.instances(".gallery").len(), 2);
    assert_eq!(journal.count("gallery:created"), 2);
    let locale = sandbox.context_handle().unwrap().downcast::<Locale>().unwrap();
    assert_eq!(locale.0, "en-GB");
}

#[test]
fn given_a_running_sandbox_when_stopped_should_destroy_every_instance_and_report_failures() {
    let (dom, host) = setup();
    let journal = Journal::default();
    markup(&dom);
    let refusing = {
        let journal = journal.clone();
        Constructor::new(move || TestLogic::named("cart", &journal).yielding().failing())
    };
    let mut sandbox = Sandbox::new(
        &host,
        SandboxConfig::new("#app")
            .component(Registration::new(gallery(&journal)))
            .component(Registration::new(refusing).selector(".cart")),
    )
    .unwrap();
    record_events(&sandbox, &journal);
    sandbox.start(()).unwrap();
    let started: Vec<_> = sandbox
        .instances(".gallery")
        .iter()
        .chain(sandbox.instances(".cart"))
        .cloned()
        .collect();
    journal.clear();

    let result = block_on(sandbox.stop());

    match result {
        Err(ComponentError::Teardown { failures }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].id, ".cart");
        }
        other => panic!("expected a teardown failure, got {other:?}"),
    }
    assert!(started.iter().all(|c| c.phase() == Phase::Destroyed));
    assert!(sandbox.instances(".gallery").is_empty());
    assert!(!sandbox.is_running());
    assert_eq!(journal.position("sandbox:beforeStop"), Some(0));
    assert_eq!(journal.count("gallery:before_destroy"), 2);
    assert!(journal.position("cart:resumed") > journal.position("gallery:before_destroy"));
    assert_eq!(journal.entries().last().map(String::as_str), Some("sandbox:stop"));

    journal.clear();
    block_on(sandbox.stop()).unwrap();
    assert!(journal.entries().is_empty());
}
