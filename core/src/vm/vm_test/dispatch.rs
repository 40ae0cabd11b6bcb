use super::*;

fn one_handler(message: u16, auto_size: u16, body: impl FnOnce(&mut Assembler)) -> (Engine, ObjectHandle) {
    let (mut engine, _) = boot(vec![ClassBuilder::new().handler(message, auto_size, body)]);
    let handle = spawn(&mut engine, 0);
    (engine, handle)
}

#[test]
fn binary_operators_combine_second_with_top() {
    let (mut engine, obj) = one_handler(10, 0, |asm| {
        asm.constant(7).push_constant(3).op(Opcode::Sub).end();
    });
    assert_eq!(send_ok(&mut engine, obj, 10, &[]), 4);
    assert_eq!(engine.stack_depth(), 0);
}

#[test]
fn arguments_and_arithmetic() {
    let (mut engine, obj) = one_handler(11, 0, |asm| {
        asm.arg(0).op(Opcode::Push).arg(1).op(Opcode::Mul);
        asm.push_constant(5).op(Opcode::Add).end();
    });
    assert_eq!(send_ok(&mut engine, obj, 11, &[6, 7]), 47);
    // missing arguments read as zero
    assert_eq!(send_ok(&mut engine, obj, 11, &[6]), 5);
}

#[test]
fn comparisons_and_logic() {
    let (mut engine, obj) = one_handler(12, 0, |asm| {
        asm.arg(0).op(Opcode::Push).arg(1).op(Opcode::Lt).op(Opcode::Not).end();
    });
    assert_eq!(send_ok(&mut engine, obj, 12, &[2, 5]), 0);
    assert_eq!(send_ok(&mut engine, obj, 12, &[5, 2]), 1);

    let (mut engine, obj) = one_handler(13, 0, |asm| {
        asm.arg(0).op(Opcode::SetB).op(Opcode::Push).constant(2).op(Opcode::Shl).end();
    });
    assert_eq!(send_ok(&mut engine, obj, 13, &[-9]), 4);
    assert_eq!(send_ok(&mut engine, obj, 13, &[0]), 0);
}

#[test]
fn wrapping_and_power() {
    let (mut engine, obj) = one_handler(14, 0, |asm| {
        asm.arg(0).op(Opcode::Push).arg(1).op(Opcode::Exp).end();
    });
    assert_eq!(send_ok(&mut engine, obj, 14, &[3, 4]), 81);
    assert_eq!(send_ok(&mut engine, obj, 14, &[2, -1]), 0);

    let (mut engine, obj) = one_handler(15, 0, |asm| {
        asm.arg(0).op(Opcode::Inc).end();
    });
    assert_eq!(send_ok(&mut engine, obj, 15, &[i32::MAX]), i32::MIN);
}

#[test]
fn division_by_zero_aborts_only_that_dispatch() {
    let (mut engine, _) = boot(vec![
        ClassBuilder::new()
            .handler(16, 0, |asm| {
                asm.arg(0).op(Opcode::Push).arg(1).op(Opcode::Div).end();
            })
            .handler(17, 0, |asm| {
                asm.arg(0).op(Opcode::Push).arg(1).op(Opcode::Mod).end();
            }),
    ]);
    let obj = spawn(&mut engine, 0);
    assert!(matches!(
        engine.send(obj, 16, &ints(&[1, 0])),
        Err(VmFault::DivisionByZero { .. })
    ));
    assert_eq!(engine.stack_depth(), 0);
    assert!(engine.objects().is_live(obj));
    assert_eq!(send_ok(&mut engine, obj, 16, &[-7, 2]), -3);
    assert_eq!(send_ok(&mut engine, obj, 17, &[-7, 2]), -1);
}

#[test]
fn counting_loop_with_autos() {
    let (mut engine, obj) = one_handler(18, 8, |asm| {
        let top = asm.label();
        let done = asm.label();
        asm.constant(0).op_u16(Opcode::Sad, 0);
        asm.arg(0).op_u16(Opcode::Sad, 4);
        asm.bind(top);
        asm.op_u16(Opcode::Lad, 4).branch(Opcode::Brf, done);
        asm.op_u16(Opcode::Lad, 0)
            .op(Opcode::Push)
            .op_u16(Opcode::Lad, 4)
            .op(Opcode::Add)
            .op_u16(Opcode::Sad, 0);
        asm.op_u16(Opcode::Lad, 4).op(Opcode::Dec).op_u16(Opcode::Sad, 4);
        asm.branch(Opcode::Bra, top);
        asm.bind(done);
        asm.op_u16(Opcode::Lad, 0).end();
    });
    assert_eq!(send_ok(&mut engine, obj, 18, &[5]), 15);
    assert_eq!(send_ok(&mut engine, obj, 18, &[100]), 5050);
}

#[test]
fn auto_access_outside_the_frame_faults() {
    let (mut engine, obj) = one_handler(19, 2, |asm| {
        asm.op_u16(Opcode::Lad, 0).end();
    });
    assert!(matches!(
        engine.send(obj, 19, &[]),
        Err(VmFault::BadVariable { area: "auto", size: 2, .. })
    ));
}

#[test]
fn case_picks_first_matching_arm_or_default() {
    let (mut engine, obj) = one_handler(20, 0, |asm| {
        let (a, b, c, d) = (asm.label(), asm.label(), asm.label(), asm.label());
        asm.arg(0).case(&[(1, a), (300, b), (-1, c), (1, d)], d);
        asm.bind(a).constant(10).end();
        asm.bind(b).constant(20).end();
        asm.bind(c).constant(30).end();
        asm.bind(d).constant(40).end();
    });
    assert_eq!(send_ok(&mut engine, obj, 20, &[1]), 10);
    assert_eq!(send_ok(&mut engine, obj, 20, &[300]), 20);
    assert_eq!(send_ok(&mut engine, obj, 20, &[-1]), 30);
    assert_eq!(send_ok(&mut engine, obj, 20, &[5]), 40);
}

#[test]
fn subroutines_return_to_the_caller() {
    let (mut engine, _) = boot(vec![
        ClassBuilder::new()
            .handler(21, 0, |asm| {
                let double = asm.label();
                asm.arg(0).branch(Opcode::Jsr, double).branch(Opcode::Jsr, double).end();
                asm.bind(double).op(Opcode::Dup).op(Opcode::Add).op(Opcode::Rts);
            })
            .handler(22, 0, |asm| {
                asm.op(Opcode::Rts);
            }),
    ]);
    let obj = spawn(&mut engine, 0);
    assert_eq!(send_ok(&mut engine, obj, 21, &[3]), 12);
    assert!(matches!(
        engine.send(obj, 22, &[]),
        Err(VmFault::ReturnWithoutCall { pc: 16 })
    ));
}

#[test]
fn inherited_handlers_branch_within_their_own_code() {
    let parent = ClassBuilder::new().handler(30, 0, |asm| {
        let taken = asm.label();
        asm.constant(1).branch(Opcode::Brt, taken).constant(99).end();
        asm.bind(taken).constant(42).end();
    });
    let child = ClassBuilder::child_of(0)
        .padding(4)
        .handler(31, 0, |asm| {
            let taken = asm.label();
            asm.constant(0).branch(Opcode::Brf, taken).constant(1).end();
            asm.bind(taken).constant(2).end();
        })
        .padding(16);
    let (mut engine, _) = boot(vec![parent, child]);
    let obj = spawn(&mut engine, 1);
    assert_eq!(send_ok(&mut engine, obj, 30, &[]), 42);
    assert_eq!(send_ok(&mut engine, obj, 31, &[]), 2);
}

#[test]
fn pass_forwards_to_the_next_class_up() {
    let root = ClassBuilder::new()
        .handler(40, 0, |asm| {
            asm.arg(0).push_constant(1).op(Opcode::Add).end();
        })
        .handler(41, 0, |asm| {
            asm.constant(5).pass(0).end();
        });
    let mid = ClassBuilder::child_of(0).handler(40, 0, |asm| {
        asm.op(Opcode::Push).arg(0).push_constant(10).op(Opcode::Mul).pass(1).end();
    });
    let leaf = ClassBuilder::child_of(1).handler(40, 0, |asm| {
        asm.op(Opcode::Push).arg(0).push_constant(2).op(Opcode::Add).pass(1).end();
    });
    let (mut engine, _) = boot(vec![root, mid, leaf]);
    let obj = spawn(&mut engine, 2);
    assert_eq!(send_ok(&mut engine, obj, 40, &[1]), 31);
    // nothing above the root: the pass yields zero
    assert_eq!(send_ok(&mut engine, obj, 41, &[]), 0);
}

#[test]
fn statics_and_externals_are_per_instance() {
    let root = ClassBuilder::new().statics(8);
    let child = ClassBuilder::child_of(0)
        .statics(4)
        .external(Width::Long, "counter", 4, 1)
        .handler(50, 0, |asm| {
            asm.arg(0).op_u16(Opcode::Sxd, 0);
            asm.constant(9).op_u16(Opcode::Ssw, 2);
            asm.op_u16(Opcode::Lxd, 0)
                .op(Opcode::Push)
                .op_u16(Opcode::Lsw, 2)
                .op(Opcode::Add)
                .end();
        })
        .handler(51, 0, |asm| {
            asm.op_u16(Opcode::Lxd, 0).end();
        });
    let (mut engine, _) = boot(vec![root, child]);
    let first = spawn(&mut engine, 1);
    let second = spawn(&mut engine, 1);

    assert_eq!(send_ok(&mut engine, first, 50, &[5]), 14);
    assert_eq!(engine.read_static(first, 1, 4, Width::Long), Some(5));
    assert_eq!(engine.read_static(first, 0, 2, Width::Word), Some(9));
    assert_eq!(send_ok(&mut engine, first, 51, &[]), 5);
    assert_eq!(send_ok(&mut engine, second, 51, &[]), 0);
}

#[test]
fn unbound_external_index_faults() {
    let (mut engine, obj) = one_handler(52, 0, |asm| {
        asm.op_u16(Opcode::Lxb, 3).end();
    });
    assert!(matches!(
        engine.send(obj, 52, &[]),
        Err(VmFault::UnboundExternal { index: 3 })
    ));
}

#[test]
fn self_reference_and_send_to_self() {
    let (mut engine, obj) = one_handler(53, 0, |asm| {
        asm.op(Opcode::Sole).end();
    });
    assert_eq!(send_ok(&mut engine, obj, 53, &[]), obj.slot as i32);

    let (mut engine, _) = boot(vec![
        ClassBuilder::new()
            .handler(54, 0, |asm| {
                asm.op(Opcode::Sole).push_constant(4).send(1, 55).end();
            })
            .handler(55, 0, |asm| {
                asm.arg(0).push_constant(3).op(Opcode::Mul).end();
            }),
    ]);
    let obj = spawn(&mut engine, 0);
    assert_eq!(send_ok(&mut engine, obj, 54, &[]), 12);
}

#[test]
fn runaway_push_overflows_the_stack() {
    let config = EngineConfig {
        stack_size: 16,
        ..test_config()
    };
    let (mut engine, _) = engine_with(
        vec![ClassBuilder::new().handler(60, 0, |asm| {
            let top = asm.label();
            asm.bind(top).op(Opcode::Push).branch(Opcode::Bra, top);
        })],
        config,
    );
    let obj = spawn(&mut engine, 0);
    assert!(matches!(
        engine.send(obj, 60, &[]),
        Err(VmFault::StackOverflow { capacity: 16 })
    ));
    assert_eq!(engine.stack_depth(), 0);
}

#[test]
fn runaway_subroutine_calls_overflow_the_stack() {
    let config = EngineConfig {
        stack_size: 16,
        ..test_config()
    };
    let (mut engine, _) = engine_with(
        vec![ClassBuilder::new().handler(62, 4, |asm| {
            let top = asm.label();
            let done = asm.label();
            asm.bind(top).op_u16(Opcode::Lad, 0).op(Opcode::Inc).op_u16(Opcode::Sad, 0);
            asm.op(Opcode::Push).constant(1000).op(Opcode::Lt).branch(Opcode::Brf, done);
            asm.branch(Opcode::Jsr, top);
            asm.bind(done).op_u16(Opcode::Lad, 0).end();
        })],
        config,
    );
    let obj = spawn(&mut engine, 0);
    assert!(matches!(
        engine.send(obj, 62, &[]),
        Err(VmFault::StackOverflow { capacity: 16 })
    ));
    assert_eq!(engine.stack_depth(), 0);

    // return cells are given back, so the object stays usable
    assert!(matches!(
        engine.send(obj, 62, &[]),
        Err(VmFault::StackOverflow { capacity: 16 })
    ));
    assert_eq!(engine.stack_depth(), 0);
}

#[test]
fn runaway_recursion_hits_the_call_depth_limit() {
    let config = EngineConfig {
        max_call_depth: 8,
        ..test_config()
    };
    let (mut engine, _) = engine_with(
        vec![ClassBuilder::new().handler(61, 0, |asm| {
            asm.op(Opcode::Sole).send(0, 61).end();
        })],
        config,
    );
    let obj = spawn(&mut engine, 0);
    assert!(matches!(
        engine.send(obj, 61, &[]),
        Err(VmFault::CallDepthExceeded { max: 8 })
    ));
    assert_eq!(engine.stack_depth(), 0);
}

#[test]
fn malformed_code_faults() {
    let (mut engine, _) = boot(vec![
        ClassBuilder::new()
            .handler(70, 0, |asm| {
                asm.bytes(&[0x99]);
            })
            .handler(71, 0, |asm| {
                asm.op_u16(Opcode::Laba, 0);
            })
            .handler(72, 0, |asm| {
                asm.op_u16(Opcode::Bra, 500);
            })
            .handler(73, 0, |asm| {
                asm.constant(1);
            }),
    ]);
    let obj = spawn(&mut engine, 0);
    assert!(matches!(
        engine.send(obj, 70, &[]),
        Err(VmFault::InvalidOpcode { opcode: 0x99, pc: 2 })
    ));
    assert!(matches!(
        engine.send(obj, 71, &[]),
        Err(VmFault::UnsupportedOpcode { name: "LABA", pc: 5 })
    ));
    assert!(matches!(
        engine.send(obj, 72, &[]),
        Err(VmFault::InvalidBranch { target: 500, .. })
    ));
    // the last handler has no END and runs off the code segment
    assert!(matches!(engine.send(obj, 73, &[]), Err(VmFault::CodeOverrun { .. })));
    assert_eq!(engine.stack_depth(), 0);
}

#[test]
fn unhandled_messages_depend_on_strictness() {
    let class = || ClassBuilder::new().handler(80, 0, |asm| {
        asm.constant(1).end();
    });
    let (mut engine, _) = boot(vec![class()]);
    let obj = spawn(&mut engine, 0);
    assert_eq!(engine.send(obj, 81, &[]).unwrap(), Value::ZERO);

    let strict = EngineConfig {
        strict_dispatch: true,
        ..test_config()
    };
    let (mut engine, _) = engine_with(vec![class()], strict);
    let obj = spawn(&mut engine, 0);
    assert!(matches!(
        engine.send(obj, 81, &[]),
        Err(VmFault::NoHandler { message: 81, .. })
    ));
}
