use emberc::compile_to_ir;
use emberc::ir::{AbiTy, Arg, BinOp, DataItem, Instr, Linkage, Val};

use pretty_assertions::assert_eq;

fn ident(name: &str) -> Val {
    Val::Ident(name.to_string())
}

fn body_of(ir: &emberc::ir::CompilationUnit, name: &str) -> Vec<Instr> {
    ir.func_defs
        .iter()
        .find(|f| f.name == name)
        .unwrap_or_else(|| panic!("function `{name}` not in IR"))
        .body
        .clone()
        .unwrap_or_else(|| panic!("function `{name}` has no body"))
}

// ── Functions and attributes ─────────────────────────────────────────────

#[test]
fn extern_and_export_functions() {
    let source = r#"
        package main

        @(extern) printf :: func(msg: string, arg: int)

        @(export) main :: func() -> int {
            return 0
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    assert_eq!(ir.name, "main");
    assert_eq!(ir.func_defs.len(), 2);

    let printf = &ir.func_defs[0];
    assert_eq!(printf.name, "printf");
    assert!(printf.body.is_none(), "extern functions carry no body");
    assert!(printf.linkage.is_none());
    assert_eq!(printf.ret, None);
    assert_eq!(printf.params[0].abi, AbiTy::Long);
    assert_eq!(printf.params[1].abi, AbiTy::Word);

    let main = &ir.func_defs[1];
    assert_eq!(main.linkage, Some(Linkage::Export));
    assert_eq!(main.ret, Some(AbiTy::Word));
    assert_eq!(
        main.body.as_deref(),
        Some(&[Instr::Ret(Some(Val::Integer(0)))][..])
    );
}

#[test]
fn linkname_substitutes_the_callee_symbol() {
    let source = r#"
        package main

        @(extern, linkname="puts_impl") puts :: func(msg: string)

        main :: func() {
            puts("hello")
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    assert_eq!(ir.func_defs[0].link_name.as_deref(), Some("puts_impl"));

    let body = body_of(&ir, "main");
    match &body[0] {
        Instr::Call { callee, .. } => {
            assert_eq!(callee, &Val::Global("puts_impl".to_string()));
        }
        other => panic!("expected a call, got: {other:?}"),
    }
}

// ── Declarations and arithmetic ──────────────────────────────────────────

#[test]
fn declaration_with_inference_and_arithmetic() {
    let source = r#"
        package main

        main :: func() -> int {
            count := 11 + 12
            return count
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    assert_eq!(
        body_of(&ir, "main"),
        vec![
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("_tmp_0001"),
                lhs: Val::Integer(11),
                rhs: Val::Integer(12),
            },
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("count"),
                lhs: ident("_tmp_0001"),
                rhs: Val::Integer(0),
            },
            Instr::Ret(Some(ident("count"))),
        ]
    );
}

#[test]
fn typed_declaration_without_initializer_emits_nothing() {
    let source = r#"
        package main

        main :: func() -> int {
            x : int
            x = 7
            return x
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    assert_eq!(
        body_of(&ir, "main"),
        vec![
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("x"),
                lhs: Val::Integer(7),
                rhs: Val::Integer(0),
            },
            Instr::Ret(Some(ident("x"))),
        ]
    );
}

// ── Calls and string interning ───────────────────────────────────────────

#[test]
fn call_with_string_argument() {
    let source = r#"
        package main

        @(extern) printf :: func(msg: string, arg: int)

        hello :: func() {
            printf("Hi-%d\n", 7)
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    assert_eq!(ir.data_defs.len(), 1);
    let data = &ir.data_defs[0];
    assert_eq!(data.name, "_str_0001");
    assert_eq!(
        data.items,
        vec![DataItem::Str("Hi-%d\\n".to_string()), DataItem::Byte(0)]
    );

    assert_eq!(
        body_of(&ir, "hello"),
        vec![
            Instr::Call {
                dest: None,
                callee: Val::Global("printf".to_string()),
                args: vec![
                    Arg {
                        abi: AbiTy::Long,
                        val: Val::Global("_str_0001".to_string()),
                    },
                    Arg {
                        abi: AbiTy::Word,
                        val: Val::Integer(7),
                    },
                ],
            },
            Instr::Ret(None),
        ]
    );
}

#[test]
fn equal_string_literals_are_interned_separately() {
    let source = r#"
        package main

        @(extern) puts :: func(msg: string)

        main :: func() {
            puts("same")
            puts("same")
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    assert_eq!(ir.data_defs.len(), 2);
    assert_eq!(ir.data_defs[0].name, "_str_0001");
    assert_eq!(ir.data_defs[1].name, "_str_0002");
    assert_eq!(ir.data_defs[0].items, ir.data_defs[1].items);
}

#[test]
fn call_result_feeds_the_expression() {
    let source = r#"
        package main

        @(extern) getchar :: func() -> int

        next :: func() -> int {
            c := getchar() + 1
            return c
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    assert_eq!(
        body_of(&ir, "next"),
        vec![
            Instr::Call {
                dest: Some(("_tmp_0001".to_string(), AbiTy::Word)),
                callee: Val::Global("getchar".to_string()),
                args: vec![],
            },
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("_tmp_0002"),
                lhs: ident("_tmp_0001"),
                rhs: Val::Integer(1),
            },
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("c"),
                lhs: ident("_tmp_0002"),
                rhs: Val::Integer(0),
            },
            Instr::Ret(Some(ident("c"))),
        ]
    );
}

// ── Control flow ─────────────────────────────────────────────────────────

#[test]
fn if_else_shape() {
    let source = r#"
        package main

        pick :: func(x: int) -> int {
            if x == 1 {
                return 1
            } else {
                return 2
            }
            return 0
        }
    "#;
    let ir = compile_to_ir(source).unwrap();
    let body = body_of(&ir, "pick");

    assert_eq!(
        body,
        vec![
            Instr::Binop {
                op: BinOp::Eq,
                dest: ident("_tmp_0001"),
                lhs: ident("x"),
                rhs: Val::Integer(1),
            },
            Instr::Jnz {
                cond: ident("_tmp_0001"),
                if_true: "L0001_then".to_string(),
                if_false: "L0002_else".to_string(),
            },
            Instr::Label("L0001_then".to_string()),
            Instr::Ret(Some(Val::Integer(1))),
            Instr::Label("L0004_block".to_string()),
            Instr::Jmp("L0003_end".to_string()),
            Instr::Label("L0002_else".to_string()),
            Instr::Ret(Some(Val::Integer(2))),
            Instr::Label("L0003_end".to_string()),
            Instr::Ret(Some(Val::Integer(0))),
        ]
    );
}

#[test]
fn if_with_init_scopes_the_binding() {
    let source = r#"
        package main

        @(extern) consume :: func(x: int)

        main :: func() {
            if v := 3; v == 3 {
                consume(v)
            }
        }
    "#;
    let ir = compile_to_ir(source).unwrap();
    let body = body_of(&ir, "main");

    // init assignment lands before the branch
    assert_eq!(
        body[0],
        Instr::Binop {
            op: BinOp::Add,
            dest: ident("v"),
            lhs: Val::Integer(3),
            rhs: Val::Integer(0),
        }
    );
    assert!(matches!(body[2], Instr::Jnz { .. }));
}

#[test]
fn else_if_chain_lowers_to_nested_branches() {
    let source = r#"
        package main

        classify :: func(x: int) -> int {
            r := 0
            if x == 0 {
                r = 1
            } else if x == 1 {
                r = 2
            } else {
                r = 3
            }
            return r
        }
    "#;
    let ir = compile_to_ir(source).unwrap();
    let body = body_of(&ir, "classify");

    let jnz_count = body
        .iter()
        .filter(|i| matches!(i, Instr::Jnz { .. }))
        .count();
    assert_eq!(jnz_count, 2, "two conditions, two branches");

    // Both branch targets must exist as labels.
    let labels: Vec<&str> = body
        .iter()
        .filter_map(|i| match i {
            Instr::Label(l) => Some(l.as_str()),
            _ => None,
        })
        .collect();
    for instr in &body {
        if let Instr::Jnz {
            if_true, if_false, ..
        } = instr
        {
            assert!(labels.contains(&if_true.as_str()));
            assert!(labels.contains(&if_false.as_str()));
        }
    }
}

#[test]
fn for_loop_shape() {
    let source = r#"
        package main

        @(extern) printf :: func(msg: string, arg: int)

        count :: func() {
            for i := 0; i < 3; i = i + 1 {
                printf("x", i)
            }
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    assert_eq!(
        body_of(&ir, "count"),
        vec![
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("i"),
                lhs: Val::Integer(0),
                rhs: Val::Integer(0),
            },
            Instr::Label("L0001_for".to_string()),
            Instr::Binop {
                op: BinOp::Lt,
                dest: ident("_tmp_0001"),
                lhs: ident("i"),
                rhs: Val::Integer(3),
            },
            Instr::Jnz {
                cond: ident("_tmp_0001"),
                if_true: "L0002_body".to_string(),
                if_false: "L0003_end".to_string(),
            },
            Instr::Label("L0002_body".to_string()),
            Instr::Call {
                dest: None,
                callee: Val::Global("printf".to_string()),
                args: vec![
                    Arg {
                        abi: AbiTy::Long,
                        val: Val::Global("_str_0002".to_string()),
                    },
                    Arg {
                        abi: AbiTy::Word,
                        val: ident("i"),
                    },
                ],
            },
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("_tmp_0003"),
                lhs: ident("i"),
                rhs: Val::Integer(1),
            },
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("i"),
                lhs: ident("_tmp_0003"),
                rhs: Val::Integer(0),
            },
            Instr::Jmp("L0001_for".to_string()),
            Instr::Label("L0003_end".to_string()),
            Instr::Ret(None),
        ]
    );
}

// ── Short-circuit operators ──────────────────────────────────────────────

#[test]
fn short_circuit_and() {
    let source = r#"
        package main

        both :: func(x: int, y: int) -> bool {
            b := (x < 10) && (y > 0)
            return b
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    assert_eq!(
        body_of(&ir, "both"),
        vec![
            Instr::Binop {
                op: BinOp::Lt,
                dest: ident("_tmp_0001"),
                lhs: ident("x"),
                rhs: Val::Integer(10),
            },
            Instr::Jnz {
                cond: ident("_tmp_0001"),
                if_true: "L0001_true".to_string(),
                if_false: "L0002_false".to_string(),
            },
            Instr::Label("L0002_false".to_string()),
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("_tmp_0002"),
                lhs: ident("_tmp_0001"),
                rhs: Val::Integer(0),
            },
            Instr::Jmp("L0003_end".to_string()),
            Instr::Label("L0001_true".to_string()),
            Instr::Binop {
                op: BinOp::Gt,
                dest: ident("_tmp_0003"),
                lhs: ident("y"),
                rhs: Val::Integer(0),
            },
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("_tmp_0002"),
                lhs: ident("_tmp_0003"),
                rhs: Val::Integer(0),
            },
            Instr::Label("L0003_end".to_string()),
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("b"),
                lhs: ident("_tmp_0002"),
                rhs: Val::Integer(0),
            },
            Instr::Ret(Some(ident("b"))),
        ]
    );
}

#[test]
fn short_circuit_or_keeps_left_when_true() {
    let source = r#"
        package main

        either :: func(x: int, y: int) -> bool {
            b := (x < 10) || (y > 0)
            return b
        }
    "#;
    let ir = compile_to_ir(source).unwrap();
    let body = body_of(&ir, "either");

    // The arm directly after the jnz keeps the left value for `||`.
    assert!(matches!(body[1], Instr::Jnz { .. }));
    assert_eq!(body[2], Instr::Label("L0001_true".to_string()));
    assert_eq!(
        body[3],
        Instr::Binop {
            op: BinOp::Add,
            dest: ident("_tmp_0002"),
            lhs: ident("_tmp_0001"),
            rhs: Val::Integer(0),
        }
    );
    assert_eq!(body[5], Instr::Label("L0002_false".to_string()));
}

// ── Pointers ─────────────────────────────────────────────────────────────

#[test]
fn store_through_pointer_parameter() {
    let source = r#"
        package main

        set :: func(p: ^int) {
            p^ = 42
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    let set = ir.func_defs.iter().find(|f| f.name == "set").unwrap();
    assert_eq!(set.params[0].abi, AbiTy::Long);

    assert_eq!(
        body_of(&ir, "set"),
        vec![
            Instr::Store {
                value: Val::Integer(42),
                addr: ident("p"),
            },
            Instr::Ret(None),
        ]
    );
}

#[test]
fn pointer_arithmetic_scales_by_element_size() {
    let source = r#"
        package main

        second :: func(p: ^int) -> int {
            return (p + 1)^
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    assert_eq!(
        body_of(&ir, "second"),
        vec![
            Instr::Binop {
                op: BinOp::Mul,
                dest: ident("_idx_0002"),
                lhs: Val::Integer(1),
                rhs: Val::Integer(4),
            },
            Instr::Binop {
                op: BinOp::Add,
                dest: ident("_tmp_0001"),
                lhs: ident("p"),
                rhs: ident("_idx_0002"),
            },
            Instr::Load {
                dest: ident("_tmp_0003"),
                addr: ident("_tmp_0001"),
            },
            Instr::Ret(Some(ident("_tmp_0003"))),
        ]
    );
}

#[test]
fn int_plus_pointer_scales_the_left_operand() {
    let source = r#"
        package main

        shift :: func(p: ^int) -> ^int {
            q := 2 + p
            return q
        }
    "#;
    let ir = compile_to_ir(source).unwrap();
    let body = body_of(&ir, "shift");

    assert_eq!(
        body[0],
        Instr::Binop {
            op: BinOp::Mul,
            dest: ident("_idx_0002"),
            lhs: Val::Integer(2),
            rhs: Val::Integer(4),
        }
    );
    assert_eq!(
        body[1],
        Instr::Binop {
            op: BinOp::Add,
            dest: ident("_tmp_0001"),
            lhs: ident("p"),
            rhs: ident("_idx_0002"),
        }
    );
}

// ── Counters reset per function ──────────────────────────────────────────

#[test]
fn temp_and_label_counters_restart_at_each_function() {
    let source = r#"
        package main

        first :: func() -> int {
            a := 1 + 2
            return a
        }

        second :: func() -> int {
            b := 3 + 4
            return b
        }
    "#;
    let ir = compile_to_ir(source).unwrap();

    for name in ["first", "second"] {
        let body = body_of(&ir, name);
        assert!(
            matches!(&body[0], Instr::Binop { dest: Val::Ident(d), .. } if d == "_tmp_0001"),
            "temporaries restart at _tmp_0001 in `{name}`"
        );
    }
}
