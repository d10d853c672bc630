use serde_json::{json, Value};

use skein_forms::schema::Manifest;
use skein_forms::{
    extract, inject, stable_key, ComponentCatalogue, ComponentSet, DiagnosticKind, DocumentFormat, FormNode,
    FormRegistry, InjectIssueKind, Instance, Presets, SchemaDocument,
};

const REGISTRY: &str = include_str!("fixtures/component_tests.json");

fn load() -> (SchemaDocument, FormRegistry) {
    let doc = SchemaDocument::parse(REGISTRY).unwrap();
    let registry = FormRegistry::build(&doc);
    (doc, registry)
}

fn manifest(value: Value) -> Manifest {
    Manifest::parse(&value.to_string()).unwrap()
}

fn default_json(registry: &FormRegistry, type_path: &str) -> Value {
    let node = registry.lookup(type_path).unwrap_or_else(|| panic!("{type_path} did not compile"));
    let instance = Instance::default_for(registry, node).unwrap();
    extract(registry, &instance, node).unwrap()
}

/// Inject `value` into a default instance and extract it again.
fn through(registry: &FormRegistry, type_path: &str, value: &Value) -> Value {
    let node = registry.lookup(type_path).unwrap();
    let mut instance = Instance::default_for(registry, node).unwrap();
    let report = inject(registry, &mut instance, node, value);
    assert!(report.is_clean(), "{type_path}: {:?}", report.issues);
    extract(registry, &instance, node).unwrap()
}

#[test]
fn registry_compiles_with_expected_diagnostics() {
    let (doc, registry) = load();
    assert_eq!(doc.len(), 33);
    assert!(!registry.contains("bevy_ecs::entity::Entity"));
    assert!(!registry.contains("test_components::MultiElementTupleStruct"));
    assert!(registry.contains("test_components::TimerContainer"));

    let diagnostics: Vec<_> = registry.diagnostics().iter().map(|d| (d.type_path.as_str(), d.member.as_deref(), &d.kind)).collect();
    assert_eq!(
        diagnostics,
        [
            ("bevy_ecs::entity::Entity", None, &DiagnosticKind::UnsupportedValue),
            (
                "test_components::MultiElementTupleStruct",
                None,
                &DiagnosticKind::UnsupportedTupleArity { kind: "TupleStruct".into(), arity: 4 }
            ),
            (
                "test_components::BucketOfTypes",
                Some("entity"),
                &DiagnosticKind::UnavailableReference("bevy_ecs::entity::Entity".into())
            ),
        ]
    );
}

#[test]
fn catalogue_keys_and_compile_status() {
    let (doc, registry) = load();
    let catalogue = ComponentCatalogue::from_document(&doc, &registry);
    assert_eq!(catalogue.len(), 16);

    let player = catalogue.get("test_components::Player").unwrap();
    assert_eq!(player.storage_key, "TestComponentsPlayer");
    assert_eq!(player.short_path.as_deref(), Some("Player"));

    let long = catalogue.get("test_components::scene::lighting::baked::volumetric::IrradianceVolumeSettings").unwrap();
    assert_eq!(long.storage_key, "SKEIN_24E359503E4FB45C86C924F61E5E1124");
    assert_eq!(long.storage_key, stable_key(&long.type_path));

    let uncompiled: Vec<_> = catalogue.iter().filter(|c| !c.compiled).map(|c| c.type_path.as_str()).collect();
    assert_eq!(uncompiled, ["bevy_ecs::entity::Entity", "test_components::MultiElementTupleStruct"]);
}

#[test]
fn defaults_match_the_wire_format() {
    let (_, registry) = load();
    let player = json!({"name": "", "power": 0.0, "test": 0});
    assert_eq!(default_json(&registry, "test_components::Player"), player);
    assert_eq!(default_json(&registry, "test_components::TeamMember"), json!({"player": player, "team": "Green"}));
    assert_eq!(default_json(&registry, "test_components::ATupleStruct"), json!(0));
    assert_eq!(default_json(&registry, "test_components::Marker"), json!({}));
    assert_eq!(default_json(&registry, "test_components::TaskPriority"), json!("High"));
    assert_eq!(default_json(&registry, "test_components::SomeThings"), json!({"OneThing": {"name": ""}}));
    assert_eq!(default_json(&registry, "test_components::AnOptionalName"), json!({"name": null}));
    assert_eq!(default_json(&registry, "test_components::NonZeroNumbers"), json!({"small": 1, "an_int": 1}));
    assert_eq!(default_json(&registry, "test_components::BucketOfTypes"), json!({"uuid": "", "bvec": [false, false, false]}));
    assert_eq!(default_json(&registry, "test_components::RichAndUnitEnum"), json!({"Player": player}));
    assert_eq!(default_json(&registry, "test_components::LinearVelocity"), json!([0.0, 0.0, 0.0]));
    assert_eq!(
        default_json(&registry, "test_components::TimerContainer"),
        json!({
            "stopwatch": {"elapsed": {"secs": 0, "nanos": 0}, "is_paused": false},
            "duration": {"secs": 0, "nanos": 0},
            "mode": "Once",
            "finished": false,
            "times_finished_this_tick": 0
        })
    );
}

#[test]
fn authored_values_survive_inject_and_extract() {
    let (_, registry) = load();
    let cases = [
        ("test_components::Player", json!({"name": "Luigi Mario", "power": 100.0, "test": 5})),
        (
            "test_components::TeamMember",
            json!({"player": {"name": "Luigi Mario", "power": 100.0, "test": 5}, "team": "Red"}),
        ),
        ("test_components::ATupleStruct", json!(12)),
        ("test_components::TaskPriority", json!("Low")),
        ("test_components::SomeThings", json!({"Low": -3})),
        ("test_components::AnOptionalName", json!({"name": "Ferris"})),
        ("test_components::NonZeroNumbers", json!({"small": 255, "an_int": -1})),
        ("test_components::RichAndUnitEnum", json!("NotAPlayer")),
        ("test_components::LinearVelocity", json!([4.0, 5.0, 6.0])),
        (
            "bevy_transform::components::transform::Transform",
            json!({"translation": [1.0, 2.0, 3.0], "rotation": [0.0, 0.0, 0.0, 1.0], "scale": [1.0, 1.0, 1.0]}),
        ),
        (
            "test_components::TimerContainer",
            json!({
                "stopwatch": {"elapsed": {"secs": 1, "nanos": 500000000}, "is_paused": false},
                "duration": {"secs": 2, "nanos": 0},
                "mode": "Repeating",
                "finished": false,
                "times_finished_this_tick": 0
            }),
        ),
    ];
    for (type_path, value) in cases {
        assert_eq!(through(&registry, type_path, &value), value, "{type_path}");
    }
}

#[test]
fn option_and_alias_laws() {
    let (_, registry) = load();
    let node = registry.lookup("core::option::Option<alloc::string::String>").unwrap();
    assert!(matches!(registry.node(node), Some(FormNode::Enum { is_option: true, .. })));

    let mut instance = Instance::default_for(&registry, node).unwrap();
    assert_eq!(extract(&registry, &instance, node).unwrap(), Value::Null);
    assert!(inject(&registry, &mut instance, node, &json!("five")).is_clean());
    assert_eq!(extract(&registry, &instance, node).unwrap(), json!("five"));

    let wrapper = registry.lookup("test_components::ATupleStruct").unwrap();
    assert!(matches!(registry.node(wrapper), Some(FormNode::Alias { .. })));
}

#[test]
fn out_of_range_values_are_reported_not_applied() {
    let (_, registry) = load();
    let node = registry.lookup("test_components::NonZeroNumbers").unwrap();
    let mut instance = Instance::default_for(&registry, node).unwrap();
    let report = inject(&registry, &mut instance, node, &json!({"small": 0, "an_int": 0}));
    let paths: Vec<_> = report.issues.iter().map(|i| i.path.as_str()).collect();
    assert_eq!(paths, ["$.small", "$.an_int"]);
    assert!(report.issues.iter().all(|i| matches!(i.kind, InjectIssueKind::OutOfRange { .. })));
    assert_eq!(extract(&registry, &instance, node).unwrap(), json!({"small": 1, "an_int": 1}));

    let timer = registry.lookup("test_components::TimerContainer").unwrap();
    let mut instance = Instance::default_for(&registry, timer).unwrap();
    let mut value = default_json(&registry, "test_components::TimerContainer");
    value["duration"]["nanos"] = json!(1_000_000_000u64);
    let report = inject(&registry, &mut instance, timer, &value);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].path, "$.duration.nanos");
}

#[test]
fn gltf_extras_round_trip_through_a_component_set() {
    let (_, registry) = load();
    let extras = json!({
        "skein": [
            {"test_components::Player": {"name": "Mario", "power": 50.5, "test": 1}},
            {"test_components::Marker": {}},
            {"test_components::TaskPriority": "Medium"},
            {"test_components::LinearVelocity": [0.0, -9.8, 0.0]},
            {"test_components::MultiElementTupleStruct": [1, [0.0, 0.0, 0.0], 2, "three"]}
        ]
    });
    let (mut set, reports) = ComponentSet::from_extras(&registry, &extras).unwrap();
    assert!(reports.is_empty());
    assert_eq!(set.len(), 4);
    assert!(set.unrecognized_components.contains_key("test_components::MultiElementTupleStruct"));
    assert_eq!(set.to_extras(&registry).unwrap(), extras["skein"]);

    set.remove("test_components::Marker");
    set.insert_default(&registry, &Presets::default(), "test_components::AnOptionalName").unwrap();
    let written = set.to_extras(&registry).unwrap();
    let keys: Vec<_> = written
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry.as_object().unwrap().keys().next().unwrap().clone())
        .collect();
    assert_eq!(
        keys,
        [
            "test_components::Player",
            "test_components::TaskPriority",
            "test_components::LinearVelocity",
            "test_components::AnOptionalName",
            "test_components::MultiElementTupleStruct",
        ]
    );
}

#[test]
fn brp_envelope_and_manifest_load_the_same_registry() {
    let dir = tempfile::tempdir().unwrap();
    let registry: Value = serde_json::from_str(REGISTRY).unwrap();

    let brp = dir.path().join("schema.json");
    std::fs::write(&brp, json!({"jsonrpc": "2.0", "id": 1, "result": registry}).to_string()).unwrap();
    let manifest = dir.path().join("skein.manifest.registry.json");
    std::fs::write(
        &manifest,
        json!({"version": 1, "crate_safelist": [], "created_using_bevy_skein_version": "0.3.0", "registry": registry}).to_string(),
    )
    .unwrap();

    let from_brp = FormRegistry::build(&SchemaDocument::load(&brp, DocumentFormat::BrpResponse).unwrap());
    let from_manifest = FormRegistry::build(&SchemaDocument::load(&manifest, DocumentFormat::Manifest).unwrap());
    let (_, direct) = load();
    assert_eq!(from_brp.type_paths().collect::<Vec<_>>(), direct.type_paths().collect::<Vec<_>>());
    assert_eq!(from_manifest.len(), direct.len());
}

#[test]
fn manifest_presets_seed_new_components() {
    let registry_json: Value = serde_json::from_str(REGISTRY).unwrap();
    let manifest = manifest(json!({
        "version": 1,
        "crate_safelist": ["test_components"],
        "registry": registry_json,
        "presets": {
            "test_components::Player": {
                "default": {"name": "Mario", "power": 100.0, "test": 3},
                "weak": {"name": "Mario", "power": 1.0, "test": 3}
            },
            "test_components::TeamMember": {
                "default": {"player": {"name": "Luigi", "power": 80.0, "test": 2}, "team": "Blue"}
            }
        }
    }));
    let registry = FormRegistry::build(&manifest.document().unwrap());
    let presets = manifest.presets.clone().unwrap_or_default();

    let mut set = ComponentSet::new();
    for type_path in ["test_components::Player", "test_components::TeamMember", "test_components::Marker"] {
        assert!(set.insert_default(&registry, &presets, type_path).unwrap().is_clean(), "{type_path}");
    }
    assert_eq!(
        set.to_extras(&registry).unwrap(),
        json!([
            {"test_components::Player": {"name": "Mario", "power": 100.0, "test": 3}},
            {"test_components::TeamMember": {"player": {"name": "Luigi", "power": 80.0, "test": 2}, "team": "Blue"}},
            {"test_components::Marker": {}}
        ])
    );

    set.apply_preset(&registry, &presets, "test_components::Player", "weak").unwrap();
    let written = set.to_extras(&registry).unwrap();
    assert_eq!(written[0]["test_components::Player"]["power"], json!(1.0));
}
