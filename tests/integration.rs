//! End-to-end tests driving the full lex -> parse -> compile pipeline.

use furnace_compiler::compiler::Compiler;
use furnace_compiler::error::CompileError;
use furnace_compiler::lexer::Lexer;
use furnace_compiler::parser::Parser;

fn compile(src: &str) -> furnace_compiler::compiler::CompileOutput {
    let tokens = Lexer::new(src).tokenize();
    let mut parser = Parser::new(tokens);
    let program = parser.parse();
    assert!(parser.errors().is_empty(), "unexpected parse errors: {:?}", parser.errors());
    Compiler::new().compile(&program)
}

#[test]
fn bare_return_from_void_main() {
    let out = compile("void main() { return; }");
    assert!(!out.has_errors, "{:?}", out.errors);
}

#[test]
fn puts_call_interns_string_literal() {
    let out = compile(r#"void main() { puts("hi there"); }"#);
    assert!(!out.has_errors, "{:?}", out.errors);
    assert!(out.image.windows(9).any(|w| w == b"hi there\0"));
}

#[test]
fn increment_of_local_variable() {
    let out = compile("void main() { int x = 0; ++x; return; }");
    assert!(!out.has_errors, "{:?}", out.errors);
}

#[test]
fn addition_of_two_locals() {
    let out = compile("void main() { int a = 1; int b = 2; int c = a + b; return; }");
    assert!(!out.has_errors, "{:?}", out.errors);
}

#[test]
fn while_loop_with_less_than_condition() {
    let out = compile("void main() { int i = 0; while (i < 3) { ++i; } return; }");
    assert!(!out.has_errors, "{:?}", out.errors);
}

#[test]
fn void_function_cannot_return_a_value() {
    let out = compile("void main() { return 5; }");
    assert!(out.has_errors);
    assert_eq!(out.errors[0], CompileError::VoidReturnValue);
}

#[test]
fn program_without_main_is_rejected() {
    let out = compile("void helper() { return; }");
    assert!(out.has_errors);
    assert!(out.errors.contains(&CompileError::MissingMain));
}

#[test]
fn calling_a_user_defined_function() {
    let out = compile(
        "int add(int a, int b) { return a + b; } void main() { int x = add(1, 2); return; }",
    );
    assert!(!out.has_errors, "{:?}", out.errors);
}

#[test]
fn calling_a_function_declared_later_in_the_source() {
    let out = compile(
        "void main() { int x = add(1, 2); return; } int add(int a, int b) { return a + b; }",
    );
    assert!(!out.has_errors, "{:?}", out.errors);
}

#[test]
fn pointer_dereference_and_address_of() {
    let out = compile("void main() { int x = 5; int *p = &x; int y = *p; return; }");
    assert!(!out.has_errors, "{:?}", out.errors);
}
