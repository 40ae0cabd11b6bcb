use super::*;

fn returns(value: i32) -> impl FnOnce(&mut Assembler) {
    move |asm: &mut Assembler| {
        asm.constant(value).end();
    }
}

#[test]
fn most_derived_handler_wins_across_three_levels() {
    let root = ClassBuilder::new().handler(5, 0, returns(1)).handler(6, 0, returns(60));
    let mid = ClassBuilder::child_of(0).padding(3).handler(5, 0, returns(2));
    let leaf = ClassBuilder::child_of(1).padding(7).handler(5, 0, returns(3));
    let (mut engine, _) = boot(vec![root, mid, leaf]);

    let thunk = engine.thunk(class_id(2)).unwrap();
    assert_eq!(thunk.depth(), 3);
    assert_eq!(thunk.levels[0].class, class_id(2));
    assert_eq!(thunk.levels[2].class, class_id(0));
    let entry = thunk.handler(5).unwrap();
    assert_eq!((entry.level, entry.offset), (0, 7));
    assert_eq!(thunk.handler(6).unwrap().level, 2);
    assert_eq!(thunk.handler_above(0, 5).unwrap().level, 1);
    assert_eq!(thunk.handler_above(1, 5).unwrap().level, 2);
    assert_eq!(thunk.handler_above(2, 5), None);
    assert_eq!(thunk.messages(), vec![5, 6]);

    let obj = spawn(&mut engine, 2);
    assert_eq!(send_ok(&mut engine, obj, 5, &[]), 3);
    assert_eq!(send_ok(&mut engine, obj, 6, &[]), 60);
    let mid_obj = spawn(&mut engine, 1);
    assert_eq!(send_ok(&mut engine, mid_obj, 5, &[]), 2);
}

#[test]
fn thunks_are_shared_per_class_when_enabled() {
    let (mut engine, _) = boot(vec![ClassBuilder::new().handler(5, 0, returns(1))]);
    let a = engine.thunk(class_id(0)).unwrap();
    let b = engine.thunk(class_id(0)).unwrap();
    assert!(Rc::ptr_eq(&a, &b));

    let config = EngineConfig {
        share_thunks: false,
        ..test_config()
    };
    let (mut engine, _) = engine_with(vec![ClassBuilder::new().handler(5, 0, returns(1))], config);
    let a = engine.thunk(class_id(0)).unwrap();
    let b = engine.thunk(class_id(0)).unwrap();
    assert!(!Rc::ptr_eq(&a, &b));
}

#[test]
fn natives_and_externals_resolve_per_level() {
    let root = ClassBuilder::new().statics(4).native("beep", 2);
    let leaf = ClassBuilder::child_of(0)
        .native("rnd", 0)
        .external(Width::Word, "flags", 2, 1)
        .external(Width::Byte, "own", 0, 0);
    let (mut engine, _) = boot(vec![root, leaf]);
    let thunk = engine.thunk(class_id(1)).unwrap();
    let rnd = engine.natives().lookup("rnd").unwrap();
    let beep = engine.natives().lookup("beep").unwrap();

    assert_eq!(thunk.levels[0].natives.get(&0), Some(&rnd));
    assert_eq!(thunk.levels[0].natives.get(&2), None);
    assert_eq!(thunk.levels[1].natives.get(&2), Some(&beep));

    let externals = &thunk.levels[0].externals;
    assert_eq!(externals.len(), 2);
    assert_eq!((externals[0].name.as_str(), externals[0].level, externals[0].offset), ("flags", 1, 2));
    assert_eq!(externals[1].width, Width::Byte);
    assert_eq!(externals[1].level, 0);
}

#[test]
fn chain_deeper_than_the_limit_is_rejected() {
    let config = EngineConfig {
        max_class_depth: 2,
        ..test_config()
    };
    let classes = vec![ClassBuilder::new(), ClassBuilder::child_of(0), ClassBuilder::child_of(1)];
    let (mut engine, _) = engine_with(classes, config);
    assert!(engine.thunk(class_id(1)).is_ok());
    assert!(matches!(
        engine.thunk(class_id(2)),
        Err(LinkError::TooDeep { max: 2, .. })
    ));
}

#[test]
fn link_failures_never_create_objects() {
    let (mut engine, _) = boot(vec![ClassBuilder::new().native("no_such_native", 0)]);
    let err = engine.create_program(class_id(0), None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Link(LinkError::UnknownNative { ref name, .. }) if name == "no_such_native"
    ));
    assert!(engine.objects().is_empty());

    let (mut engine, _) = boot(vec![ClassBuilder::new().external(Width::Long, "up", 0, 3)]);
    assert!(matches!(
        engine.thunk(class_id(0)),
        Err(LinkError::BadExternalClass { level: 3, depth: 1, .. })
    ));

    let mut bad_offset = ClassBuilder::new().handler(5, 0, returns(1));
    bad_offset.exports.message(9, 5000);
    let (mut engine, _) = boot(vec![bad_offset]);
    assert!(matches!(
        engine.thunk(class_id(0)),
        Err(LinkError::BadHandlerOffset { message: 9, offset: 5000, .. })
    ));
}

#[test]
fn broken_parent_links_report_the_archive_error() {
    let missing = ClassBuilder {
        parent: ShortId::new(0, 200).into(),
        ..ClassBuilder::new()
    };
    let (mut engine, _) = boot(vec![missing]);
    assert!(matches!(
        engine.thunk(class_id(0)),
        Err(LinkError::Archive(ArchiveError::UnknownResource { .. }))
    ));

    // parent points at the class's own import dictionary
    let wrong_kind = ClassBuilder {
        parent: ShortId::new(0, 1).into(),
        ..ClassBuilder::new()
    };
    let (mut engine, _) = boot(vec![wrong_kind]);
    assert!(matches!(
        engine.thunk(class_id(0)),
        Err(LinkError::Archive(ArchiveError::KindMismatch { .. }))
    ));
}

#[test]
fn truncated_program_header_is_a_link_error() {
    let mut builder = ArchiveBuilder::new();
    let dir = builder.add_directory().unwrap();
    builder
        .add(dir, ResourceKind::PROGRAM, Compression::Raw, &[0xFF; 6])
        .unwrap();
    let (mut engine, _) = engine_from(&builder, test_config());
    assert!(matches!(
        engine.thunk(class_id(0)),
        Err(LinkError::BadProgramHeader { .. })
    ));
}
