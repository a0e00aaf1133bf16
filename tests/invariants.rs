//! Structural IR invariants, checked over hand-written programs and a
//! deterministic pseudo-random sweep of expression trees.

use std::collections::HashSet;

use emberc::compile_to_ir;
use emberc::ir::{CompilationUnit, Instr, Val};

// ── Invariant checks ─────────────────────────────────────────────────────

fn check_invariants(ir: &CompilationUnit) {
    for func in &ir.func_defs {
        let Some(body) = &func.body else { continue };

        // Labels are unique within the function.
        let mut labels = HashSet::new();
        for instr in body {
            if let Instr::Label(label) = instr {
                assert!(
                    labels.insert(label.clone()),
                    "duplicate label {label} in `{}`",
                    func.name
                );
            }
        }

        // Every jump targets a label of the same function.
        for instr in body {
            match instr {
                Instr::Jmp(target) => {
                    assert!(
                        labels.contains(target),
                        "jmp to undefined label {target} in `{}`",
                        func.name
                    );
                }
                Instr::Jnz {
                    if_true, if_false, ..
                } => {
                    assert!(
                        labels.contains(if_true),
                        "jnz to undefined label {if_true} in `{}`",
                        func.name
                    );
                    assert!(
                        labels.contains(if_false),
                        "jnz to undefined label {if_false} in `{}`",
                        func.name
                    );
                }
                _ => {}
            }
        }

        // Nothing follows a return within its block.
        for window in body.windows(2) {
            if matches!(window[0], Instr::Ret(_)) {
                assert!(
                    matches!(window[1], Instr::Label(_)),
                    "instruction after return is not a label in `{}`",
                    func.name
                );
            }
        }

        // Generated temporaries are assigned at most once per block; the
        // short-circuit join temp is written on two arms, each in its own
        // block.
        let mut assigned = HashSet::new();
        for instr in body {
            let dest = match instr {
                Instr::Label(_) => {
                    assigned.clear();
                    None
                }
                Instr::Binop {
                    dest: Val::Ident(d),
                    ..
                } => Some(d.clone()),
                Instr::Load {
                    dest: Val::Ident(d),
                    ..
                } => Some(d.clone()),
                Instr::Call {
                    dest: Some((d, _)), ..
                } => Some(d.clone()),
                _ => None,
            };

            if let Some(d) = dest {
                if d.starts_with("_tmp_") || d.starts_with("_idx_") {
                    assert!(
                        assigned.insert(d.clone()),
                        "temporary {d} assigned twice in one block of `{}`",
                        func.name
                    );
                }
            }
        }
    }
}

// ── Hand-written programs ────────────────────────────────────────────────

const MIXED_PROGRAM: &str = r#"
    package main

    @(extern) printf :: func(msg: string, arg: int)

    classify :: func(x: int) -> int {
        if x == 0 {
            return 10
        } else if x == 1 {
            return 20
        } else {
            return 30
        }
        return 0
    }

    sum :: func(n: int) -> int {
        total := 0
        for i := 0; i < n; i = i + 1 {
            total = total + i
            if (total > 100) || (i > 50) {
                return total
            }
        }
        return total
    }

    main :: func() -> int {
        printf("sum-%d\n", sum(10))
        return classify(2)
    }
"#;

#[test]
fn mixed_program_upholds_all_invariants() {
    let ir = compile_to_ir(MIXED_PROGRAM).unwrap();
    check_invariants(&ir);
}

#[test]
fn lowering_is_deterministic() {
    let first = compile_to_ir(MIXED_PROGRAM).unwrap();
    let second = compile_to_ir(MIXED_PROGRAM).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.to_lines().join("\n"),
        second.to_lines().join("\n"),
        "rendered IR must match byte for byte"
    );
}

#[test]
fn nested_loops_and_branches() {
    let source = r#"
        package main

        grid :: func(w: int, h: int) -> int {
            acc := 0
            for y := 0; y < h; y = y + 1 {
                for x := 0; x < w; x = x + 1 {
                    if (x == y) && (x > 0) {
                        acc = acc + x
                    } else {
                        acc = acc + 1
                    }
                }
            }
            return acc
        }
    "#;
    let ir = compile_to_ir(source).unwrap();
    check_invariants(&ir);
}

// ── Pseudo-random expression sweep ───────────────────────────────────────

/// Small deterministic generator; xorshift keeps the sweep reproducible
/// without pulling in a dependency.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

fn gen_int_expr(rng: &mut Rng, depth: u32) -> String {
    if depth == 0 || rng.below(3) == 0 {
        match rng.below(3) {
            0 => "x".to_string(),
            1 => "y".to_string(),
            _ => format!("{}", rng.below(100)),
        }
    } else {
        let op = ["+", "-", "*", "/", "<<", ">>", "&", "|"][rng.below(8) as usize];
        let lhs = gen_int_expr(rng, depth - 1);
        let rhs = gen_int_expr(rng, depth - 1);
        format!("({lhs} {op} {rhs})")
    }
}

fn gen_bool_expr(rng: &mut Rng, depth: u32) -> String {
    if depth == 0 || rng.below(3) == 0 {
        let op = ["==", "!=", "<", "<=", ">", ">="][rng.below(6) as usize];
        let lhs = gen_int_expr(rng, 1);
        let rhs = gen_int_expr(rng, 1);
        format!("({lhs} {op} {rhs})")
    } else {
        let op = ["&&", "||"][rng.below(2) as usize];
        let lhs = gen_bool_expr(rng, depth - 1);
        let rhs = gen_bool_expr(rng, depth - 1);
        format!("({lhs} {op} {rhs})")
    }
}

#[test]
fn random_expressions_lower_with_invariants_intact() {
    for seed in 1..=60u64 {
        let mut rng = Rng(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));

        let int_expr = gen_int_expr(&mut rng, 3);
        let bool_expr = gen_bool_expr(&mut rng, 2);

        let source = format!(
            r#"
            package main

            probe :: func(x: int, y: int) -> int {{
                v := {int_expr}
                b := {bool_expr}
                if b {{
                    return v
                }}
                return x
            }}
            "#
        );

        let ir = compile_to_ir(&source)
            .unwrap_or_else(|e| panic!("seed {seed} failed to compile: {e}\n{source}"));
        check_invariants(&ir);

        let again = compile_to_ir(&source).unwrap();
        assert_eq!(ir, again, "seed {seed} lowered non-deterministically");
    }
}
