use php_depend::{Builder, NodeKind, ParseError, SourceFile};

fn parse_err(source: &str) -> ParseError {
    php_depend::parse(source).unwrap_err()
}

#[test]
fn unexpected_token_reports_position() {
    let err = parse_err("<?php class { }");
    assert_eq!(
        err,
        ParseError::UnexpectedToken { image: "{".to_string(), line: 1, column: 13, file: "<input>".to_string() }
    );
    assert_eq!(err.to_string(), "Unexpected token: {, line: 1, col: 13, file: <input>.");
}

#[test]
fn unexpected_end_of_stream() {
    let err = parse_err("<?php function f() {");
    assert_eq!(err, ParseError::TokenStreamEnd { file: "<input>".to_string() });
}

#[test]
fn self_outside_class() {
    let err = parse_err("<?php self::run();");
    assert_eq!(
        err,
        ParseError::InvalidState {
            line: 1,
            column: 7,
            file: "<input>".to_string(),
            message: "The keyword \"self\" was used outside of a class/method scope.".to_string(),
        }
    );
}

#[test]
fn parent_without_parent_class() {
    let err = parse_err("<?php class A { function f() { parent::f(); } }");
    let ParseError::InvalidState { message, .. } = err else {
        panic!("expected invalid state, got {err:?}");
    };
    assert_eq!(message, "The keyword \"parent\" was used but the class \"A\" does not declare a parent.");
}

#[test]
fn parent_is_allowed_in_traits() {
    assert!(php_depend::parse("<?php trait T { function f() { return parent::f(); } }").is_ok());
}

#[test]
fn reference_key_in_foreach() {
    let err = parse_err("<?php foreach ($a as &$k => $v) {}");
    let ParseError::InvalidState { message, column, .. } = err else {
        panic!("expected invalid state, got {err:?}");
    };
    assert_eq!(message, "Key element cannot be a reference.");
    assert_eq!(column, 22);
}

#[test]
fn abstract_field_is_rejected() {
    let builder = Builder::new();
    let err = builder.parse_source(&SourceFile::new("<input>", "<?php class A { abstract public $x; }")).unwrap_err();
    assert!(builder.find_type("A").is_none());
    assert_eq!(builder.len(), 0);
    let ParseError::InvalidModifiers(err) = err else {
        panic!("expected invalid modifiers, got {err:?}");
    };
    assert_eq!(
        err.message,
        "Invalid field modifiers given, allowed modifiers are IS_PUBLIC, IS_PROTECTED, IS_PRIVATE, IS_STATIC and IS_READONLY."
    );
}

#[test]
fn private_static_field_is_accepted() {
    let (builder, _) = php_depend::parse("<?php class A { private static $x = 1; }").unwrap();
    let decl = builder.declaration(builder.find_type("A").unwrap()).unwrap();
    assert_eq!(decl.properties.len(), 1);
    assert_eq!(decl.properties[0].name, "$x");

    let (_, ast) = php_depend::parse("<?php class A { private static $x = 1; }").unwrap();
    let root = ast.root().unwrap();
    let field = ast.find_children_of_type(root, &NodeKind::FieldDeclaration)[0];
    assert!(ast[field].is_private());
    assert!(ast[field].is_static());
    assert!(!ast[field].is_public());
}

#[test]
fn try_needs_catch_or_finally() {
    let err = parse_err("<?php try {} echo 1;");
    assert!(matches!(err, ParseError::UnexpectedToken { ref image, .. } if image == "echo"));
}

#[test]
fn declarations_before_error_stay_registered() {
    let builder = Builder::new();
    let file = SourceFile::new("broken.php", "<?php class Kept {} class {");
    assert!(builder.parse_source(&file).is_err());
    let kept = builder.find_type("Kept").unwrap();
    assert!(builder.entity(kept).unwrap().is_resolved());
    assert!(builder.unit(file.id).is_none());
}
