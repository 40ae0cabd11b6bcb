use super::*;

/// CREATE stores the object's own slot in its first static word and beeps.
fn marking_class() -> ClassBuilder {
    ClassBuilder::new()
        .statics(2)
        .native("beep", 0)
        .handler(MSG_CREATE, 0, |asm| {
            asm.op(Opcode::Sole).op_u16(Opcode::Ssw, 0);
            asm.rcrs(0).call(0).end();
        })
        .handler(7, 0, |asm| {
            asm.op_u16(Opcode::Lsw, 0).end();
        })
}

#[test]
fn create_runs_the_create_handler_before_returning() {
    let (mut engine, host) = boot(vec![marking_class()]);
    let obj = spawn(&mut engine, 0);
    assert_eq!(obj.slot, 8);
    assert_eq!(engine.read_static(obj, 0, 0, Width::Word), Some(8));
    assert_eq!(host.calls(), vec![HostCall::Beep]);
    assert_eq!(engine.object(obj).unwrap().class, class_id(0));
}

#[test]
fn explicit_slots_are_checked() {
    let (mut engine, _) = boot(vec![marking_class()]);
    let obj = engine.create_program(class_id(0), Some(3)).unwrap();
    assert_eq!(obj.slot, 3);
    assert!(matches!(
        engine.create_program(class_id(0), Some(3)),
        Err(EngineError::SlotOccupied { slot: 3 })
    ));
    assert!(matches!(
        engine.create_program(class_id(0), Some(16)),
        Err(EngineError::SlotOutOfRange { slot: 16, capacity: 16 })
    ));
}

#[test]
fn full_table_reports_no_free_slot_and_keeps_existing_objects() {
    let config = EngineConfig {
        object_capacity: 4,
        program_slots_start: 0,
        ..test_config()
    };
    let (mut engine, host) = engine_with(vec![marking_class()], config);
    let handles: Vec<ObjectHandle> = (0..4).map(|_| spawn(&mut engine, 0)).collect();
    assert_eq!(handles.iter().map(|h| h.slot).collect::<Vec<_>>(), vec![0, 1, 2, 3]);

    assert!(matches!(
        engine.create_program(class_id(0), None),
        Err(EngineError::NoFreeSlot { start: 0, end: 4 })
    ));
    assert_eq!(engine.objects().len(), 4);
    for handle in &handles {
        assert_eq!(send_ok(&mut engine, *handle, 7, &[]), handle.slot as i32);
    }
    assert_eq!(host.calls().len(), 4);
}

#[test]
fn destroy_runs_destroy_and_invalidates_handles() {
    let class = marking_class().native("fill_rectangle", 1).handler(MSG_DESTROY, 0, |asm| {
        asm.rcrs(1);
        for v in [1, 2, 3, 4, 5] {
            asm.push_constant(v);
        }
        asm.call(5).end();
    });
    let (mut engine, host) = boot(vec![class]);
    let old = spawn(&mut engine, 0);
    assert!(engine.destroy(old.slot).unwrap());
    assert_eq!(host.calls(), vec![HostCall::Beep, HostCall::Rect(1, 2, 3, 4, 5)]);
    assert!(!engine.objects().is_live(old));
    assert!(matches!(engine.send(old, 7, &[]), Err(VmFault::BadObject { .. })));
    assert!(!engine.destroy(old.slot).unwrap());

    // the slot is reused under a new generation
    let new = spawn(&mut engine, 0);
    assert_eq!(new.slot, old.slot);
    assert_ne!(new.generation, old.generation);
    assert!(engine.object(old).is_none());
    assert_eq!(send_ok(&mut engine, new, 7, &[]), new.slot as i32);
}

#[test]
fn restore_reaches_every_object_that_handles_it() {
    let restoring = marking_class().handler(MSG_RESTORE, 0, |asm| {
        asm.constant(99).op_u16(Opcode::Ssw, 0).end();
    });
    let silent = ClassBuilder::new().handler(7, 0, |asm| {
        asm.constant(5).end();
    });
    let failing = ClassBuilder::new().handler(MSG_RESTORE, 0, |asm| {
        asm.constant(1).push_constant(0).op(Opcode::Div).end();
    });
    let (mut engine, _) = boot(vec![restoring, silent, failing]);
    let first = spawn(&mut engine, 0);
    let other = spawn(&mut engine, 1);
    let broken = spawn(&mut engine, 2);
    let second = spawn(&mut engine, 0);

    assert_eq!(engine.restore_all(), 2);
    assert_eq!(send_ok(&mut engine, first, 7, &[]), 99);
    assert_eq!(send_ok(&mut engine, second, 7, &[]), 99);
    assert_eq!(send_ok(&mut engine, other, 7, &[]), 5);
    assert!(engine.objects().is_live(broken));
    assert_eq!(engine.stack_depth(), 0);
}

#[test]
fn failing_create_handler_releases_the_slot() {
    let class = ClassBuilder::new().handler(MSG_CREATE, 0, |asm| {
        asm.constant(1).push_constant(0).op(Opcode::Div).end();
    });
    let (mut engine, _) = boot(vec![class]);
    let err = engine.create_program(class_id(0), None).unwrap_err();
    assert!(matches!(err, EngineError::Vm(VmFault::DivisionByZero { .. })));
    assert!(engine.objects().is_empty());
    assert_eq!(engine.objects().find_free(8, 16), Some(8));
    assert_eq!(engine.stack_depth(), 0);
}

#[test]
fn send_to_an_empty_slot_is_a_bad_object() {
    let class = ClassBuilder::new().handler(9, 0, |asm| {
        asm.constant(12).send(0, 1).end();
    });
    let (mut engine, _) = boot(vec![class]);
    let obj = spawn(&mut engine, 0);
    assert!(matches!(
        engine.send(obj, 9, &[]),
        Err(VmFault::BadObject { handle: 12 })
    ));
}

#[test]
fn object_table_tracks_free_slots() {
    let (mut engine, _) = boot(vec![ClassBuilder::new()]);
    let thunk = engine.thunk(class_id(0)).unwrap();
    let mut table = crate::vm::ObjectTable::new(4);
    assert_eq!(table.find_free(1, 3), Some(1));
    let handle = table.check_vacant(1).unwrap();
    table
        .insert(crate::vm::Object::new(class_id(0), handle, thunk.clone()))
        .unwrap();
    assert_eq!(table.find_free(1, 3), Some(2));
    assert_eq!(table.find_free(3, 99), Some(3));
    assert_eq!(table.find_free(3, 3), None);
    assert!(table.remove(1).is_some());
    assert!(table.resolve(handle).is_none());
    assert_eq!(table.check_vacant(1).unwrap().generation, handle.generation + 1);
    assert!(table.remove(1).is_none());
}
