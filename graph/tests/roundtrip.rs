use std::collections::HashMap;

use redlilium_graph::{
    xml, Body, Document, FieldKind, FieldOwnership, GraphReader, Heap, MemberDecl, ObjRef, Object,
    ReadError, SerializationContext, TypeDescriptor, TypeRef, TypeRegistry, TypeSchema, Value,
    WriteOptions, STD_MODULE,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn game(name: &str) -> TypeDescriptor {
    TypeDescriptor::new(name, "game")
}

fn node_list() -> TypeDescriptor {
    TypeDescriptor::generic("Vec", STD_MODULE, &[game("Node")])
}

fn registry() -> TypeRegistry {
    let registry = TypeRegistry::new();
    registry.register(
        TypeSchema::record(game("Node"))
            .with_member(MemberDecl::public("label", FieldKind::Text))
            .with_member(MemberDecl::public("weight", FieldKind::Float))
            .with_member(MemberDecl::public("count", FieldKind::Int))
            .with_member(MemberDecl::public("flag", FieldKind::Bool))
            .with_member(MemberDecl::public("letter", FieldKind::Char))
            .with_member(MemberDecl::public("child", FieldKind::Reference))
            .with_member(MemberDecl::public("owner", FieldKind::Reference)),
    );
    registry.register(
        TypeSchema::record(game("Holder"))
            .with_member(MemberDecl::public("f1", FieldKind::Text))
            .with_member(MemberDecl::public("f2", FieldKind::Text)),
    );
    registry.register(
        TypeSchema::record(game("Bag"))
            .with_member(MemberDecl::public("items", FieldKind::Reference))
            .with_member(MemberDecl::public("lookup", FieldKind::Reference)),
    );
    registry
}

fn node(heap: &mut Heap, label: &str) -> ObjRef {
    let label = heap.alloc_text(label);
    heap.alloc_record(
        game("Node"),
        vec![
            ("label".into(), Value::Ref(label)),
            ("weight".into(), Value::Float(0.0)),
            ("count".into(), Value::Int(0)),
            ("flag".into(), Value::Bool(false)),
            ("letter".into(), Value::Char('\0')),
            ("child".into(), Value::Null),
            ("owner".into(), Value::Null),
        ],
    )
}

fn bag(heap: &mut Heap, items: Vec<Value>) -> ObjRef {
    let list = heap.alloc_sequence(node_list(), items);
    heap.alloc_record(
        game("Bag"),
        vec![
            ("items".into(), Value::Ref(list)),
            ("lookup".into(), Value::Null),
        ],
    )
}

/// Write, encode as XML text, parse, and read into a fresh heap.
fn round_trip(ctx: &SerializationContext<'_>, heap: &Heap, root: ObjRef) -> (Heap, ObjRef) {
    let document = ctx.write(heap, &Value::Ref(root)).unwrap();
    let text = xml::to_xml(&document);
    let parsed = xml::from_xml(&text).unwrap();
    assert_eq!(parsed, document);

    let mut out = Heap::new();
    let mut reader = GraphReader::new(ctx);
    let value = reader.read(&parsed, 1, &mut out).unwrap();
    assert!(reader.warnings().is_empty(), "{:?}", reader.warnings());
    (out, value.as_ref().unwrap())
}

fn label(heap: &Heap, object: ObjRef) -> &str {
    heap.text(heap.field(object, "label").unwrap()).unwrap()
}

fn items(heap: &Heap, bag: ObjRef) -> Vec<Value> {
    let list = heap.field_ref(bag, "items").unwrap();
    heap.items(list).unwrap().to_vec()
}

#[test]
fn scalars_and_structure_survive() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);

    let mut heap = Heap::new();
    let a = node(&mut heap, "alpha");
    let b = node(&mut heap, "beta");
    heap.set_field(a, "weight", Value::Float(2.5));
    heap.set_field(a, "count", Value::Int(-3));
    heap.set_field(a, "flag", Value::Bool(true));
    heap.set_field(a, "letter", Value::Char('é'));
    heap.set_field(a, "child", Value::Ref(b));

    let (out, root) = round_trip(&ctx, &heap, a);
    assert_eq!(label(&out, root), "alpha");
    assert_eq!(out.field(root, "weight"), Some(&Value::Float(2.5)));
    assert_eq!(out.field(root, "count"), Some(&Value::Int(-3)));
    assert_eq!(out.field(root, "flag"), Some(&Value::Bool(true)));
    assert_eq!(out.field(root, "letter"), Some(&Value::Char('é')));
    assert_eq!(out.field(root, "owner"), Some(&Value::Null));
    let child = out.field_ref(root, "child").unwrap();
    assert_eq!(label(&out, child), "beta");
}

#[test]
fn shared_objects_stay_shared() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);

    let mut heap = Heap::new();
    let a = node(&mut heap, "a");
    let b = node(&mut heap, "b");
    let root = bag(&mut heap, vec![Value::Ref(a), Value::Ref(a), Value::Ref(b)]);

    let (out, root) = round_trip(&ctx, &heap, root);
    let items = items(&out, root);
    assert_eq!(items.len(), 3);
    assert_eq!(items[0], items[1]);
    assert_ne!(items[0], items[2]);
}

#[test]
fn cycles_are_reconstructed() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);

    let mut heap = Heap::new();
    let a = node(&mut heap, "a");
    let b = node(&mut heap, "b");
    heap.set_field(a, "child", Value::Ref(b));
    heap.set_field(b, "owner", Value::Ref(a));

    let (out, root) = round_trip(&ctx, &heap, a);
    let child = out.field_ref(root, "child").unwrap();
    assert_eq!(out.field_ref(child, "owner"), Some(root));
}

#[test]
fn self_reference_is_reconstructed() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);
    let mut heap = Heap::new();
    let a = node(&mut heap, "loop");
    heap.set_field(a, "child", Value::Ref(a));

    let (out, root) = round_trip(&ctx, &heap, a);
    assert_eq!(out.field_ref(root, "child"), Some(root));
}

#[test]
fn one_string_instance_in_two_fields_stays_one() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);

    let mut heap = Heap::new();
    let shared = heap.alloc_text("shared");
    let holder = heap.alloc_record(
        game("Holder"),
        vec![
            ("f1".into(), Value::Ref(shared)),
            ("f2".into(), Value::Ref(shared)),
        ],
    );

    let (out, root) = round_trip(&ctx, &heap, holder);
    let f1 = out.field_ref(root, "f1").unwrap();
    let f2 = out.field_ref(root, "f2").unwrap();
    assert_eq!(f1, f2);
    assert_eq!(out.text(&Value::Ref(f1)), Some("shared"));
}

#[test]
fn equal_strings_in_different_objects_are_not_merged() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);

    let mut heap = Heap::new();
    let first = heap.alloc_text("hello");
    let second = heap.alloc_text("hello");
    let h1 = heap.alloc_record(
        game("Holder"),
        vec![("f1".into(), Value::Ref(first)), ("f2".into(), Value::Null)],
    );
    let h2 = heap.alloc_record(
        game("Holder"),
        vec![("f1".into(), Value::Ref(second)), ("f2".into(), Value::Null)],
    );
    let list = heap.alloc_sequence(node_list(), vec![Value::Ref(h1), Value::Ref(h2)]);
    let root = heap.alloc_record(
        game("Bag"),
        vec![("items".into(), Value::Ref(list)), ("lookup".into(), Value::Null)],
    );

    let document = ctx.write(&heap, &Value::Ref(root)).unwrap();
    assert!(document.nodes().iter().all(|n| n.id.is_none()));

    let (out, root) = round_trip(&ctx, &heap, root);
    let items = items(&out, root);
    let s1 = out.field_ref(items[0].as_ref().unwrap(), "f1").unwrap();
    let s2 = out.field_ref(items[1].as_ref().unwrap(), "f1").unwrap();
    assert_ne!(s1, s2);
    assert_eq!(out.text(&Value::Ref(s1)), out.text(&Value::Ref(s2)));
}

#[test]
fn newer_document_is_rejected_without_touching_the_target() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry).with_options(WriteOptions {
        version: 2,
        ..Default::default()
    });

    let mut heap = Heap::new();
    let a = node(&mut heap, "from v2");
    let document = ctx.write(&heap, &Value::Ref(a)).unwrap();
    assert_eq!(document.version, 2);

    let mut out = Heap::new();
    let target = node(&mut out, "original");
    let before = out.get(target).unwrap().body.clone();
    let len = out.len();

    let result = GraphReader::new(&ctx).read_into(&document, 1, &mut out, target);
    assert_eq!(result, Err(ReadError::VersionUnsupported { found: 2, max: 1 }));
    assert_eq!(out.get(target).unwrap().body, before);
    assert_eq!(out.len(), len);
    assert_eq!(label(&out, target), "original");
}

#[test]
fn read_into_fills_target_and_redirects_root_references() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);

    let mut heap = Heap::new();
    let a = node(&mut heap, "alpha");
    let b = node(&mut heap, "beta");
    heap.set_field(a, "child", Value::Ref(b));
    heap.set_field(b, "owner", Value::Ref(a));
    let document = ctx.write(&heap, &Value::Ref(a)).unwrap();

    let mut out = Heap::new();
    let target = node(&mut out, "original");
    GraphReader::new(&ctx)
        .read_into(&document, 1, &mut out, target)
        .unwrap();
    assert_eq!(label(&out, target), "alpha");
    let child = out.field_ref(target, "child").unwrap();
    assert_eq!(out.field_ref(child, "owner"), Some(target));
}

/// Per descriptor: written in full exactly once, then only by id.
fn assert_type_cache_economy(document: &Document) {
    let mut inline: HashMap<TypeDescriptor, usize> = HashMap::new();
    let mut declared: HashMap<u32, TypeDescriptor> = HashMap::new();
    let mut cached: HashMap<u32, usize> = HashMap::new();
    for node in document.nodes() {
        match &node.ty {
            Some(TypeRef::Inline(d)) => *inline.entry(d.clone()).or_default() += 1,
            Some(TypeRef::Declared { id, descriptor }) => {
                assert!(declared.insert(*id, descriptor.clone()).is_none());
            }
            Some(TypeRef::Cached(id)) => *cached.entry(*id).or_default() += 1,
            None => {}
        }
    }
    for (descriptor, count) in &inline {
        assert_eq!(*count, 1, "{descriptor} written inline {count} times");
        assert!(!declared.values().any(|d| d == descriptor));
    }
    for (id, descriptor) in &declared {
        assert!(cached.get(id).copied().unwrap_or(0) >= 1, "{descriptor} declared but unused");
    }
    for id in cached.keys() {
        assert!(declared.contains_key(id));
    }
}

#[test]
fn type_descriptors_are_written_once() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);

    let mut heap = Heap::new();
    let a = node(&mut heap, "a");
    let b = node(&mut heap, "b");
    let c = node(&mut heap, "c");
    heap.set_field(a, "weight", Value::Float(1.0));
    let root = bag(&mut heap, vec![Value::Ref(a), Value::Ref(b), Value::Ref(c)]);
    let document = ctx.write(&heap, &Value::Ref(root)).unwrap();
    assert_type_cache_economy(&document);

    // Bag is used once: inline descriptor, no type id.
    assert_eq!(document.root.ty, Some(TypeRef::Inline(game("Bag"))));
    let nodes = document.nodes();
    let node_uses: Vec<_> = nodes
        .iter()
        .filter(|n| n.name == "item")
        .map(|n| n.ty.clone().unwrap())
        .collect();
    assert_eq!(node_uses.len(), 3);
    assert!(matches!(
        &node_uses[0],
        TypeRef::Declared { descriptor, .. } if *descriptor == game("Node")
    ));
    let id = node_uses[0].id().unwrap();
    assert_eq!(node_uses[1], TypeRef::Cached(id));
    assert_eq!(node_uses[2], TypeRef::Cached(id));
}

#[test]
fn hoisted_type_cache_round_trips() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry).with_options(WriteOptions {
        hoist_type_cache: true,
        ..Default::default()
    });

    let mut heap = Heap::new();
    let a = node(&mut heap, "a");
    let b = node(&mut heap, "b");
    heap.set_field(a, "child", Value::Ref(b));
    heap.set_field(b, "owner", Value::Ref(a));

    let document = ctx.write(&heap, &Value::Ref(a)).unwrap();
    assert!(document.root.has_type_cache);
    assert!(document.root.content().iter().all(|n| n.name != "typeCache"));
    let declarations = document
        .nodes()
        .iter()
        .filter(|n| matches!(n.ty, Some(TypeRef::Declared { .. })))
        .count();
    assert_eq!(declarations, document.root.children[0].children.len());

    let (out, root) = round_trip(&ctx, &heap, a);
    let child = out.field_ref(root, "child").unwrap();
    assert_eq!(out.field_ref(child, "owner"), Some(root));
    assert_eq!(label(&out, child), "b");
}

#[test]
fn destroyed_objects_read_back_as_null() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);
    let mut heap = Heap::new();
    let a = node(&mut heap, "a");
    let b = node(&mut heap, "b");
    heap.set_field(a, "child", Value::Ref(b));
    heap.set_field(a, "owner", Value::Ref(b));
    heap.destroy(b);

    let document = ctx.write(&heap, &Value::Ref(a)).unwrap();
    assert!(document.nodes().iter().all(|n| n.id.is_none()));
    let (out, root) = round_trip(&ctx, &heap, a);
    assert_eq!(out.field(root, "child"), Some(&Value::Null));
    assert_eq!(out.field(root, "owner"), Some(&Value::Null));
}

#[test]
fn multi_dimensional_sequences_keep_their_shape() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);
    let grid_ty = TypeDescriptor::generic("Array", STD_MODULE, &[TypeDescriptor::int()]);

    let mut heap = Heap::new();
    let grid = heap.alloc(Object::new(
        grid_ty.clone(),
        Body::Sequence {
            ranks: vec![2, 3],
            items: (1..=6).map(Value::Int).collect(),
        },
    ));

    let (out, root) = round_trip(&ctx, &heap, grid);
    let object = out.get(root).unwrap();
    assert_eq!(object.ty, grid_ty);
    assert_eq!(
        object.body,
        Body::Sequence {
            ranks: vec![2, 3],
            items: (1..=6).map(Value::Int).collect(),
        }
    );
}

#[test]
fn maps_share_values_with_the_rest_of_the_graph() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);
    let map_ty = TypeDescriptor::generic(
        "HashMap",
        STD_MODULE,
        &[TypeDescriptor::int(), game("Node")],
    );

    let mut heap = Heap::new();
    let a = node(&mut heap, "a");
    let root = bag(&mut heap, vec![Value::Ref(a)]);
    let map = heap.alloc(Object::new(
        map_ty,
        Body::Map(vec![
            (Value::Int(1), Value::Ref(a)),
            (Value::Int(2), Value::Ref(a)),
            (Value::Int(3), Value::Null),
        ]),
    ));
    heap.set_field(root, "lookup", Value::Ref(map));

    let (out, root) = round_trip(&ctx, &heap, root);
    let item = items(&out, root)[0].clone();
    let lookup = out.field_ref(root, "lookup").unwrap();
    assert_eq!(
        out.get(lookup).unwrap().body,
        Body::Map(vec![
            (Value::Int(1), item.clone()),
            (Value::Int(2), item),
            (Value::Int(3), Value::Null),
        ])
    );
}

#[test]
fn comma_cultures_round_trip_floats() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry).with_options(WriteOptions {
        culture: "de-DE".into(),
        ..Default::default()
    });

    let mut heap = Heap::new();
    let a = node(&mut heap, "a");
    heap.set_field(a, "weight", Value::Float(1.5));
    let document = ctx.write(&heap, &Value::Ref(a)).unwrap();
    assert_eq!(document.culture, "de-DE");
    assert_eq!(
        document.root.child("weight").unwrap().value.as_deref(),
        Some("1,5")
    );

    let (out, root) = round_trip(&ctx, &heap, a);
    assert_eq!(out.field(root, "weight"), Some(&Value::Float(1.5)));
}

#[test]
fn xml_text_round_trip() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);

    let mut heap = Heap::new();
    let a = node(&mut heap, "line one\nline \"two\" <&>");
    let b = node(&mut heap, "b");
    heap.set_field(a, "child", Value::Ref(b));
    heap.set_field(b, "owner", Value::Ref(a));

    let text = ctx.write_xml(&heap, &Value::Ref(a)).unwrap();
    assert!(text.contains("<graph version=\"1\" culture=\"invariant\">"));

    let mut out = Heap::new();
    let root = ctx.read_xml(&text, 1, &mut out).unwrap().as_ref().unwrap();
    assert_eq!(label(&out, root), "line one\nline \"two\" <&>");
    let child = out.field_ref(root, "child").unwrap();
    assert_eq!(out.field_ref(child, "owner"), Some(root));
}

#[test]
fn scalar_and_null_roots() {
    init_logging();
    let registry = registry();
    let ctx = SerializationContext::new(&registry);
    let heap = Heap::new();
    let mut out = Heap::new();

    let document = ctx.write(&heap, &Value::Int(42)).unwrap();
    assert_eq!(ctx.read(&document, 1, &mut out).unwrap(), Value::Int(42));

    let document = ctx.write(&heap, &Value::Null).unwrap();
    assert!(document.root.is_null());
    assert_eq!(ctx.read(&document, 1, &mut out).unwrap(), Value::Null);
}

mod ownership {
    use super::*;

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register(
            TypeSchema::record(game("Scene"))
                .with_member(MemberDecl::public("selected", FieldKind::Reference))
                .with_member(MemberDecl::public("objects", FieldKind::Reference)),
        );
        registry.register(
            TypeSchema::record(game("GameObject"))
                .with_member(MemberDecl::public("name", FieldKind::Text))
                .with_member(MemberDecl::public("components", FieldKind::Reference))
                .with_member(MemberDecl::public("target", FieldKind::Reference)),
        );
        registry.register(
            TypeSchema::record(game("Component"))
                .with_member(MemberDecl::public("owner", FieldKind::Reference))
                .with_member(MemberDecl::public("power", FieldKind::Int)),
        );
        registry
    }

    fn list(heap: &mut Heap, element: &str, items: Vec<Value>) -> ObjRef {
        heap.alloc_sequence(TypeDescriptor::generic("Vec", STD_MODULE, &[game(element)]), items)
    }

    fn game_object(heap: &mut Heap, name: &str) -> ObjRef {
        let name = heap.alloc_text(name);
        let components = list(heap, "Component", vec![]);
        heap.alloc_record(
            game("GameObject"),
            vec![
                ("name".into(), Value::Ref(name)),
                ("components".into(), Value::Ref(components)),
                ("target".into(), Value::Null),
            ],
        )
    }

    fn component(heap: &mut Heap, owner: ObjRef, power: i64) -> ObjRef {
        let c = heap.alloc_record(
            game("Component"),
            vec![
                ("owner".into(), Value::Ref(owner)),
                ("power".into(), Value::Int(power)),
            ],
        );
        let components = heap.field_ref(owner, "components").unwrap();
        if let Some(Body::Sequence { ranks, items }) =
            heap.get_mut(components).map(|o| &mut o.body)
        {
            items.push(Value::Ref(c));
            ranks[0] = items.len();
        }
        c
    }

    fn scene(heap: &mut Heap, selected: Value, objects: Vec<Value>) -> ObjRef {
        let objects = list(heap, "GameObject", objects);
        heap.alloc_record(
            game("Scene"),
            vec![
                ("selected".into(), selected),
                ("objects".into(), Value::Ref(objects)),
            ],
        )
    }

    fn policy() -> FieldOwnership {
        FieldOwnership::new()
            .contains(game("Scene"), "objects")
            .contains(game("GameObject"), "components")
            .bounded(game("GameObject"))
            .owned_via(game("Component"), "owner")
    }

    /// Every deferred id has exactly one non-deferred definition.
    fn assert_deferred_complete(document: &Document) {
        let nodes = document.nodes();
        for stub in nodes.iter().filter(|n| n.deferred) {
            let id = stub.id.unwrap();
            let definitions = nodes
                .iter()
                .filter(|n| n.id == Some(id) && !n.deferred && !n.is_reference())
                .count();
            assert_eq!(definitions, 1, "id {id} has {definitions} definitions");
        }
    }

    #[test]
    fn components_reached_early_are_deferred_to_their_owner() {
        init_logging();
        let registry = registry();
        let policy = policy();
        let ctx = SerializationContext::new(&registry).with_ownership(&policy);

        let mut heap = Heap::new();
        let go = game_object(&mut heap, "hero");
        let weapon = component(&mut heap, go, 7);
        let root = scene(&mut heap, Value::Ref(weapon), vec![Value::Ref(go)]);

        let document = ctx.write(&heap, &Value::Ref(root)).unwrap();
        let selected = document.root.child("selected").unwrap();
        assert!(selected.deferred);
        assert!(document.definitions.is_empty());
        assert_deferred_complete(&document);

        let (out, root) = round_trip(&ctx, &heap, root);
        let selected = out.field_ref(root, "selected").unwrap();
        let objects = out.field_ref(root, "objects").unwrap();
        let go = out.items(objects).unwrap()[0].as_ref().unwrap();
        let components = out.field_ref(go, "components").unwrap();
        assert_eq!(out.items(components).unwrap()[0], Value::Ref(selected));
        assert_eq!(out.field(selected, "power"), Some(&Value::Int(7)));
        assert_eq!(out.field_ref(selected, "owner"), Some(go));
    }

    #[test]
    fn root_list_items_are_deferred_to_their_owner() {
        init_logging();
        let registry = registry();
        let policy = FieldOwnership::new()
            .contains(game("GameObject"), "components")
            .owned_via(game("Component"), "owner");
        let ctx = SerializationContext::new(&registry).with_ownership(&policy);

        let mut heap = Heap::new();
        let go = game_object(&mut heap, "hero");
        let shield = component(&mut heap, go, 4);
        let root = list(&mut heap, "Entity", vec![Value::Ref(shield), Value::Ref(go)]);

        let document = ctx.write(&heap, &Value::Ref(root)).unwrap();
        let first = &document.root.children[0];
        assert!(first.deferred);
        assert!(first.children.is_empty());
        let owned = &document.root.children[1].child("components").unwrap().children[0];
        assert!(!owned.deferred);
        assert_eq!(owned.id, first.id);
        assert!(owned.child("power").is_some());
        assert!(document.definitions.is_empty());
        assert_deferred_complete(&document);

        let (out, root) = round_trip(&ctx, &heap, root);
        let entries = out.items(root).unwrap().to_vec();
        let shield = entries[0].as_ref().unwrap();
        let go = entries[1].as_ref().unwrap();
        let components = out.field_ref(go, "components").unwrap();
        assert_eq!(out.items(components).unwrap()[0], Value::Ref(shield));
        assert_eq!(out.field(shield, "power"), Some(&Value::Int(4)));
        assert_eq!(out.field_ref(shield, "owner"), Some(go));
    }

    #[test]
    fn deferred_objects_no_owner_writes_become_definitions() {
        init_logging();
        let registry = registry();
        let policy = FieldOwnership::new()
            .contains(game("Scene"), "objects")
            .owned_via(game("Component"), "owner");
        let ctx = SerializationContext::new(&registry).with_ownership(&policy);

        let mut heap = Heap::new();
        let elsewhere = game_object(&mut heap, "elsewhere");
        let orphan = component(&mut heap, elsewhere, 3);
        let root = scene(&mut heap, Value::Ref(orphan), vec![]);

        let document = ctx.write(&heap, &Value::Ref(root)).unwrap();
        assert!(document.root.child("selected").unwrap().deferred);
        assert_eq!(document.definitions.len(), 1);
        assert_deferred_complete(&document);

        let (out, root) = round_trip(&ctx, &heap, root);
        let selected = out.field_ref(root, "selected").unwrap();
        assert_eq!(out.field(selected, "power"), Some(&Value::Int(3)));
        let owner = out.field_ref(selected, "owner").unwrap();
        let name = out.field(owner, "name").unwrap();
        assert_eq!(out.text(name), Some("elsewhere"));
    }

    #[test]
    fn bounded_objects_outside_the_domain_become_null() {
        init_logging();
        let registry = registry();
        let policy = policy();
        let ctx = SerializationContext::new(&registry).with_ownership(&policy);

        let mut heap = Heap::new();
        let hero = game_object(&mut heap, "hero");
        let stranger = game_object(&mut heap, "stranger");
        heap.set_field(hero, "target", Value::Ref(stranger));
        let root = scene(&mut heap, Value::Null, vec![Value::Ref(hero)]);

        let document = ctx.write(&heap, &Value::Ref(root)).unwrap();
        let text = xml::to_xml(&document);
        assert!(!text.contains("stranger"));

        let (out, root) = round_trip(&ctx, &heap, root);
        let objects = out.field_ref(root, "objects").unwrap();
        let hero = out.items(objects).unwrap()[0].as_ref().unwrap();
        assert_eq!(out.field(hero, "target"), Some(&Value::Null));
    }

    #[test]
    fn without_a_policy_nothing_is_deferred() {
        init_logging();
        let registry = registry();
        let ctx = SerializationContext::new(&registry);

        let mut heap = Heap::new();
        let go = game_object(&mut heap, "hero");
        let weapon = component(&mut heap, go, 7);
        let root = scene(&mut heap, Value::Ref(weapon), vec![Value::Ref(go)]);

        let document = ctx.write(&heap, &Value::Ref(root)).unwrap();
        assert!(document.nodes().iter().all(|n| !n.deferred));
        assert!(document.definitions.is_empty());
    }
}
