//! End-to-end checks: source text in, diagnostics and fragments out

use tiger_frame::{Fragment, Frame, X64Frame};
use tiger_ir::{Exp, Label, Stm};
use tiger_lexer::Span;
use tiger_parser::Parser;
use tiger_semant::{translate, Category, ErrorKind, Options, Translation};
use tiger_types::TypeId;

fn analyze(source: &str) -> Translation<X64Frame> {
    analyze_with(source, &Options::default())
}

fn analyze_with(source: &str, options: &Options) -> Translation<X64Frame> {
    let program = Parser::parse(source).expect("test program should parse");
    translate::<X64Frame>(&program, options)
}

fn categories(t: &Translation<X64Frame>) -> Vec<Category> {
    t.diagnostics.iter().map(|d| d.kind.category()).collect()
}

fn assert_clean(t: &Translation<X64Frame>) {
    assert!(t.is_ok(), "unexpected diagnostics: {:?}", t.diagnostics);
}

/// The procedure whose label starts with `prefix`
fn proc_named<'a>(t: &'a Translation<X64Frame>, prefix: &str) -> (&'a Stm, &'a X64Frame) {
    t.fragments
        .iter()
        .find_map(|f| match f {
            Fragment::Proc { body, frame } if frame.name().to_string().starts_with(prefix) => {
                Some((body, frame))
            }
            _ => None,
        })
        .unwrap_or_else(|| panic!("no procedure named {}", prefix))
}

/// Argument lists of every call to a label starting with `prefix`
fn calls_to(body: &Stm, prefix: &str) -> Vec<Vec<Exp>> {
    let mut calls = Vec::new();
    body.for_each_exp(&mut |e| {
        if let Exp::Call(func, args) = e {
            if let Exp::Name(label) = &**func {
                if label.to_string().starts_with(prefix) {
                    calls.push(args.clone());
                }
            }
        }
    });
    calls
}

/// Span of the first occurrence of `needle` in `source`
fn span_of(source: &str, needle: &str) -> Span {
    let start = source.find(needle).expect("needle should occur in source");
    Span::new(start, start + needle.len())
}

/// The single diagnostic of `source`
fn only_diagnostic(source: &str) -> (ErrorKind, Span) {
    let t = analyze(source);
    assert_eq!(t.diagnostics.len(), 1, "{}: {:?}", source, t.diagnostics);
    (t.diagnostics[0].kind.clone(), t.diagnostics[0].span)
}

fn count_mems(body: &Stm) -> usize {
    let mut count = 0;
    body.for_each_exp(&mut |e| {
        if matches!(e, Exp::Mem(_)) {
            count += 1;
        }
    });
    count
}

// === Well-typed programs ===

#[test]
fn test_call_from_declaring_level_passes_frame_pointer() {
    let t = analyze("let function f(x: int): int = x + 1 in f(f(2)) end");
    assert_clean(&t);
    assert_eq!(t.ty, TypeId::INT);

    let (main, _) = proc_named(&t, "tigermain");
    let calls = calls_to(main, "f_");
    assert_eq!(calls.len(), 2);
    for args in &calls {
        assert_eq!(args.len(), 2);
        assert_eq!(args[0], Exp::Temp(X64Frame::frame_pointer()));
    }
}

#[test]
fn test_recursive_call_follows_one_static_link() {
    let t = analyze("let function f(n: int): int = if n = 0 then 0 else f(n - 1) in f(3) end");
    assert_clean(&t);

    let (body, _) = proc_named(&t, "f_");
    let calls = calls_to(body, "f_");
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0][0],
        Exp::mem(Exp::offset(Exp::Temp(X64Frame::frame_pointer()), 0))
    );
}

#[test]
fn test_deep_variable_access_walks_static_links() {
    let source = "
        let var x := 1
            function a(): int =
                let function b(): int =
                    let function c(): int = x in c() end
                in b() end
        in a() end";
    let t = analyze(source);
    assert_clean(&t);

    // Three static links, then x itself
    let (body, _) = proc_named(&t, "c_");
    assert_eq!(count_mems(body), 4);

    let (_, main_frame) = proc_named(&t, "tigermain");
    assert_eq!(main_frame.frame_size(), 8);
}

#[test]
fn test_escape_analysis_keeps_locals_in_registers() {
    let source = "let var x := 1 in x end";

    let t = analyze(source);
    let (_, frame) = proc_named(&t, "tigermain");
    assert_eq!(frame.frame_size(), 0);

    let t = analyze_with(source, &Options { escape_analysis: false });
    let (_, frame) = proc_named(&t, "tigermain");
    assert_eq!(frame.frame_size(), 8);
}

#[test]
fn test_mutual_recursion() {
    let source = "
        let function even(n: int): int = if n = 0 then 1 else odd(n - 1)
            function odd(n: int): int = if n = 0 then 0 else even(n - 1)
        in even(10) end";
    let t = analyze(source);
    assert_clean(&t);
    let procs = t
        .fragments
        .iter()
        .filter(|f| matches!(f, Fragment::Proc { .. }))
        .count();
    assert_eq!(procs, 3);
    // Main is always last
    assert!(matches!(
        t.fragments.last(),
        Some(Fragment::Proc { frame, .. }) if *frame.name() == Label::named("tigermain")
    ));
}

#[test]
fn test_recursive_record_with_nil() {
    let source = "
        let type list = {head: int, tail: list}
            var l := list{head = 1, tail = nil}
        in l.tail.head end";
    let t = analyze(source);
    assert_clean(&t);
    assert_eq!(t.ty, TypeId::INT);
}

#[test]
fn test_nil_for_annotated_record() {
    let t = analyze("let type r = {x: int} var v: r := nil in v end");
    assert_clean(&t);
}

#[test]
fn test_negative_array_size_is_not_a_type_error() {
    let t = analyze("let type myarr = array of int var a := myarr[-1] of 0 in a end");
    assert_clean(&t);
}

#[test]
fn test_string_comparison_uses_runtime() {
    let t = analyze("\"a\" < \"b\"");
    assert_clean(&t);
    let (main, _) = proc_named(&t, "tigermain");
    let calls = calls_to(main, "stringCompare");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 2);
}

#[test]
fn test_runtime_call_has_no_static_link() {
    let t = analyze("print(\"hello\")");
    assert_clean(&t);
    assert_eq!(t.ty, TypeId::VOID);
    let (main, _) = proc_named(&t, "tigermain");
    let calls = calls_to(main, "print");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 1);
    assert!(matches!(calls[0][0], Exp::Name(_)));
}

#[test]
fn test_break_inside_loops() {
    let t = analyze("while 1 do (for i := 0 to 10 do break; break)");
    assert_clean(&t);
}

#[test]
fn test_seq_takes_last_type() {
    let t = analyze("(print(\"a\"); \"b\")");
    assert_clean(&t);
    assert_eq!(t.ty, TypeId::STRING);
}

#[test]
fn test_nested_array_accepts_innermost_element_as_initialiser() {
    let t = analyze("let type a = array of int type aa = array of a var x := aa[2] of 5 in 0 end");
    assert_clean(&t);
}

// === Diagnostics ===

#[test]
fn test_if_branch_mismatch_reported_once_at_if() {
    let source = "if 1 then 2 else \"a\"";
    let t = analyze(source);
    assert_eq!(categories(&t), vec![Category::KindMismatch]);
    assert!(matches!(t.diagnostics[0].kind, ErrorKind::BranchMismatch { .. }));
    assert_eq!(t.diagnostics[0].span, Span::new(0, source.len()));
}

#[test]
fn test_var_annotation_mismatch() {
    let t = analyze("let var b: string := 5 in b end");
    assert_eq!(categories(&t), vec![Category::KindMismatch]);
    assert_eq!(
        t.diagnostics[0].kind,
        ErrorKind::TypeMismatch {
            expected: "string".to_string(),
            found: "int".to_string(),
        }
    );
}

#[test]
fn test_untyped_nil() {
    let t = analyze("let var v := nil in 0 end");
    assert_eq!(t.diagnostics.len(), 1);
    assert_eq!(t.diagnostics[0].kind, ErrorKind::UntypedNil);
}

#[test]
fn test_duplicate_function_in_group() {
    let t = analyze("let function f() = () function f() = () in f() end");
    assert_eq!(categories(&t), vec![Category::DuplicateDefinition]);
}

#[test]
fn test_illegal_cycle_reported_once() {
    let t = analyze("let type a = b type b = a var x: a := 0 in 0 end");
    let cycles = categories(&t)
        .into_iter()
        .filter(|c| *c == Category::IllegalCycle)
        .count();
    assert_eq!(cycles, 1);
}

#[test]
fn test_self_alias_is_illegal() {
    let t = analyze("let type a = a in 0 end");
    assert_eq!(categories(&t), vec![Category::IllegalCycle]);
}

#[test]
fn test_self_reference_through_record_is_legal() {
    let t = analyze("let type a = {next: a} var x: a := nil in x end");
    assert_clean(&t);
}

#[test]
fn test_cycle_through_record_is_legal() {
    let t = analyze("let type a = {next: b} type b = a in nil end");
    assert_clean(&t);
}

#[test]
fn test_assign_to_loop_variable() {
    let t = analyze("for i := 0 to 10 do i := 1");
    assert_eq!(categories(&t), vec![Category::InvalidMutation]);
}

#[test]
fn test_break_in_function_inside_loop() {
    let t = analyze("while 1 do let function f() = break in f() end");
    assert_eq!(categories(&t), vec![Category::InvalidBreak]);
}

#[test]
fn test_undefined_variable_reported_once() {
    let t = analyze("(x; x)");
    assert_eq!(categories(&t), vec![Category::UndefinedName]);
    assert_eq!(t.diagnostics[0].kind, ErrorKind::UndefinedVariable("x".to_string()));
}

#[test]
fn test_arity_and_argument_types() {
    let t = analyze("substring(\"abc\", \"1\")");
    assert_eq!(
        categories(&t),
        vec![Category::KindMismatch, Category::ArityMismatch]
    );
}

#[test]
fn test_record_field_errors() {
    let t = analyze("let type p = {x: int, y: int} in p{x = 1, z = 2} end");
    let kinds: Vec<_> = t.diagnostics.iter().map(|d| &d.kind).collect();
    assert_eq!(kinds.len(), 2);
    assert!(matches!(kinds[0], ErrorKind::UnknownField { field, .. } if field == "z"));
    assert!(matches!(kinds[1], ErrorKind::MissingField { field, .. } if field == "y"));
}

#[test]
fn test_procedure_body_must_not_produce_value() {
    let t = analyze("let function f() = 1 in f() end");
    assert_eq!(categories(&t), vec![Category::KindMismatch]);
    assert!(matches!(
        t.diagnostics[0].kind,
        ErrorKind::BodyProducesValue { construct: "procedure", .. }
    ));
}

#[test]
fn test_comparing_distinct_record_types() {
    let source = "
        let type a = {x: int}
            type b = {x: int}
        in a{x = 1} = b{x = 1} end";
    let t = analyze(source);
    assert_eq!(categories(&t), vec![Category::KindMismatch]);
}

#[test]
fn test_undefined_name_has_no_follow_on_errors() {
    for (source, name) in [
        ("x + 1", "x"),
        ("y.f", "y"),
        ("y[0]", "y"),
        ("let var a : int := z in a end", "z"),
        ("if q then 1 else 2", "q"),
        ("while cond do ()", "cond"),
    ] {
        let (kind, span) = only_diagnostic(source);
        assert_eq!(kind, ErrorKind::UndefinedVariable(name.to_string()), "{}", source);
        assert_eq!(span, span_of(source, name), "{}", source);
    }

    let source = "let function f(x: t): int = x + 1 in f(2) end";
    let (kind, span) = only_diagnostic(source);
    assert_eq!(kind, ErrorKind::UndefinedType("t".to_string()));
    assert_eq!(span, Span::new(18, 19));
}

#[test]
fn test_type_and_variable_of_same_name_both_reported() {
    let t = analyze("let var v : t := 0 in t end");
    assert_eq!(
        categories(&t),
        vec![Category::UndefinedName, Category::UndefinedName]
    );
    assert_eq!(t.diagnostics[0].kind, ErrorKind::UndefinedType("t".to_string()));
    assert_eq!(t.diagnostics[0].span, Span::new(12, 13));
    assert_eq!(t.diagnostics[1].kind, ErrorKind::UndefinedVariable("t".to_string()));
    assert_eq!(t.diagnostics[1].span, Span::new(22, 23));
}

#[test]
fn test_name_leading_into_cycle_reported_once() {
    let t = analyze("let type a = b type b = c type c = b in 0 end");
    assert_eq!(categories(&t), vec![Category::IllegalCycle]);
    assert_eq!(t.diagnostics[0].kind, ErrorKind::IllegalCycle("b".to_string()));
}

#[test]
fn test_loop_bodies_must_not_produce_values() {
    let source = "while 1 do 5";
    let (kind, span) = only_diagnostic(source);
    assert_eq!(kind.category(), Category::KindMismatch);
    assert_eq!(
        kind,
        ErrorKind::BodyProducesValue {
            construct: "while",
            found: "int".to_string(),
        }
    );
    assert_eq!(span, Span::new(11, 12));

    let source = "for i := 0 to 3 do i";
    let (kind, span) = only_diagnostic(source);
    assert!(matches!(kind, ErrorKind::BodyProducesValue { construct: "for", .. }));
    assert_eq!(span, Span::new(19, 20));
}

#[test]
fn test_for_bounds_must_be_integers() {
    let source = "for i := 0 to \"b\" do ()";
    let (kind, span) = only_diagnostic(source);
    assert_eq!(kind.category(), Category::KindMismatch);
    assert_eq!(
        kind,
        ErrorKind::IntegerRequired {
            found: "string".to_string(),
        }
    );
    assert_eq!(span, span_of(source, "\"b\""));
}

#[test]
fn test_field_of_non_record() {
    let source = "let var n := 3 in n.f end";
    let (kind, span) = only_diagnostic(source);
    assert_eq!(kind.category(), Category::KindMismatch);
    assert_eq!(kind, ErrorKind::NotARecord("int".to_string()));
    let at = span_of(source, "n.f");
    assert_eq!(span, Span::new(at.start, at.start + 1));
}

#[test]
fn test_subscript_errors() {
    let source = "let var n := 3 in n[0] end";
    let (kind, span) = only_diagnostic(source);
    assert_eq!(kind.category(), Category::KindMismatch);
    assert_eq!(kind, ErrorKind::NotAnArray("int".to_string()));
    let at = span_of(source, "n[0]");
    assert_eq!(span, Span::new(at.start, at.start + 1));

    let source = "let type a = array of int var v := a[2] of 0 in v[\"x\"] end";
    let (kind, span) = only_diagnostic(source);
    assert!(matches!(kind, ErrorKind::IntegerRequired { .. }));
    assert_eq!(span, span_of(source, "\"x\""));
}

#[test]
fn test_variable_and_function_confusion() {
    let source = "print + 1";
    let (kind, span) = only_diagnostic(source);
    assert_eq!(kind.category(), Category::KindMismatch);
    assert_eq!(kind, ErrorKind::NotAVariable("print".to_string()));
    assert_eq!(span, Span::new(0, 5));

    let source = "let var x := 1 in x(2) end";
    let (kind, span) = only_diagnostic(source);
    assert_eq!(kind.category(), Category::KindMismatch);
    assert_eq!(kind, ErrorKind::NotAFunction("x".to_string()));
    let at = span_of(source, "x(2)");
    assert_eq!(span, Span::new(at.start, at.start + 1));
}

#[test]
fn test_duplicate_type_and_field() {
    let source = "let type a = int type a = string in 0 end";
    let (kind, span) = only_diagnostic(source);
    assert_eq!(kind.category(), Category::DuplicateDefinition);
    assert_eq!(kind, ErrorKind::DuplicateType("a".to_string()));
    let at = source.rfind("a = string").expect("second declaration");
    assert_eq!(span, Span::new(at, at + 1));

    let source = "let type r = {x: int, x: string} in 0 end";
    let (kind, span) = only_diagnostic(source);
    assert_eq!(kind.category(), Category::DuplicateDefinition);
    assert_eq!(kind, ErrorKind::DuplicateField("x".to_string()));
    let at = source.rfind("x: string").expect("second field");
    assert_eq!(span, Span::new(at, at + 1));
}

#[test]
fn test_records_are_not_ordered() {
    let source = "let type r = {x: int} var a := r{x = 1} in a < a end";
    let (kind, span) = only_diagnostic(source);
    assert_eq!(kind.category(), Category::KindMismatch);
    assert!(matches!(kind, ErrorKind::NotOrdered { .. }));
    assert_eq!(span, span_of(source, "a < a"));
}

#[test]
fn test_function_body_must_match_result_type() {
    let source = "let function f(): int = \"s\" in f() end";
    let (kind, span) = only_diagnostic(source);
    assert_eq!(kind.category(), Category::KindMismatch);
    assert_eq!(
        kind,
        ErrorKind::TypeMismatch {
            expected: "int".to_string(),
            found: "string".to_string(),
        }
    );
    assert_eq!(span, span_of(source, "\"s\""));
}
