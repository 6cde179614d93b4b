use insta::assert_snapshot;
use php_depend::ast::sexpr::SExprFormatter;

fn sexpr(source: &str) -> String {
    let (_, ast) = php_depend::parse(source).unwrap();
    SExprFormatter::format(&ast, ast.root().unwrap())
}

#[test]
fn array_with_key_and_reference() {
    assert_snapshot!(sexpr("<?php $a = [1, 'x' => &$b];"), @r#"
    (CompilationUnit "<input>"
      (Statement
        (AssignmentExpression "="
          (Variable "$a")
          (Array
            (ArrayElement
              (Literal "1"))
            (ArrayElement &
              (Literal "'x'")
              (Variable "$b"))))))
    "#);
}

#[test]
fn static_method_call() {
    assert_snapshot!(sexpr("<?php Clazz::method(42);"), @r#"
    (CompilationUnit "<input>"
      (Statement
        (MemberPrimaryPrefix "::"
          (ClassOrInterfaceReference "Clazz")
          (MethodPostfix "method"
            (Identifier "method")
            (Arguments
              (Literal "42"))))))
    "#);
}

#[test]
fn binary_precedence() {
    assert_snapshot!(sexpr("<?php $x = 1 + 2 * 3 ** 2;"), @r#"
    (CompilationUnit "<input>"
      (Statement
        (AssignmentExpression "="
          (Variable "$x")
          (Expression "+"
            (Literal "1")
            (Expression "*"
              (Literal "2")
              (Expression "**"
                (Literal "3")
                (Literal "2")))))))
    "#);
}

#[test]
fn coalesce_binds_tighter_than_short_ternary() {
    assert_snapshot!(sexpr("<?php $r = $a ?? $b ?: $c;"), @r#"
    (CompilationUnit "<input>"
      (Statement
        (AssignmentExpression "="
          (Variable "$r")
          (ConditionalExpression "?"
            (Expression "??"
              (Variable "$a")
              (Variable "$b"))
            (Variable "$c")))))
    "#);
}

#[test]
fn static_arrow_function() {
    assert_snapshot!(sexpr("<?php $f = static fn($x) => $x * 2;"), @r#"
    (CompilationUnit "<input>"
      (Statement
        (AssignmentExpression "="
          (Variable "$f")
          (Closure "fn" static
            (FormalParameters
              (FormalParameter "$x"
                (Variable "$x")))
            (Expression "*"
              (Variable "$x")
              (Literal "2"))))))
    "#);
}

#[test]
fn allocation_with_spread_argument() {
    assert_snapshot!(sexpr("<?php $o = new Foo\\Bar(1, ...$rest);"), @r#"
    (CompilationUnit "<input>"
      (Statement
        (AssignmentExpression "="
          (Variable "$o")
          (AllocationExpression "new"
            (ClassReference "Foo\\Bar")
            (Arguments
              (Literal "1")
              (Variable "$rest" ...))))))
    "#);
}

#[test]
fn trait_use_with_adaptations() {
    let source = "<?php class C { use A, B { A::hello insteadof B; B::hello as protected greet; } }";
    assert_snapshot!(sexpr(source), @r#"
    (CompilationUnit "<input>"
      (Class "C"
        (TraitUseStatement "use"
          (TraitReference "A")
          (TraitReference "B")
          (TraitAdaptation
            (TraitAdaptationPrecedence "hello"
              (TraitReference "A")
              (TraitReference "B"))
            (TraitAdaptationAlias "hello"
              (TraitReference "B"))))))
    "#);
}

#[test]
fn foreach_with_list_value() {
    assert_snapshot!(sexpr("<?php foreach ($rows as $key => [$a, $b]) {}"), @r#"
    (CompilationUnit "<input>"
      (ForeachStatement "foreach"
        (Variable "$rows")
        (Variable "$key")
        (ListExpression "["
          (Variable "$a")
          (Variable "$b"))
        (ScopeStatement)))
    "#);
}
