//! End-to-end tests that run real `.ddp` source through [`ddp::run_source`]
//! and check the program's stdout / failure kind, mirroring the worked
//! examples and ambient coverage called for alongside the module tests.

use ddp::error::DdpError;
use std::io::Write;

fn run(src: &str) -> Result<String, DdpError> {
    let mut out = Vec::new();
    ddp::run_source(src, "integration.ddp", &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

#[test]
fn operator_precedence_binds_mal_tighter_than_plus() {
    let out = run("die Zahl x ist 3 plus 4 mal 2.\n$x.\n").unwrap();
    assert_eq!(out.trim(), "11");
}

#[test]
fn array_indexing_is_one_based() {
    let out = run("die Zahlen a sind [1; 2; 3].\n$a an der Stelle 2.\n").unwrap();
    assert_eq!(out.trim(), "2");
}

#[test]
fn comparison_expression_yields_a_boolean() {
    let out = run("der Boolean b ist wahr wenn 5 größer 3 ist.\n$b.\n").unwrap();
    assert_eq!(out.trim(), "wahr");
}

#[test]
fn reassigning_a_variable_is_visible_on_the_next_statement() {
    let out = run("die Zahl n ist 10.\nn ist n plus 1.\n$n.\n").unwrap();
    assert_eq!(out.trim(), "11");
}

#[test]
fn text_concatenation_with_plus() {
    let out = run("die Text s ist \"Hallo\" plus \", Welt\".\n$s.\n").unwrap();
    assert_eq!(out.trim(), "Hallo, Welt");
}

#[test]
fn stueck_allocates_a_zero_filled_array_of_the_given_size() {
    // `$` (debug-print) writes its value with no trailing newline, so three
    // prints in a row land on the same line - check the concatenation.
    let out = run(
        "die Zahlen xs sind 5 Stück.\n$Laenge(xs).\n$xs an der Stelle 1.\n$xs an der Stelle 5.\n",
    )
    .unwrap();
    assert_eq!(out, "500");
}

#[test]
fn division_by_zero_is_a_runtime_error_with_exit_code_70() {
    let err = run("die Zahl x ist 1 durch 0.\n").unwrap_err();
    assert!(matches!(err, DdpError::Runtime(_)));
    assert_eq!(err.exit_code(), 70);
}

#[test]
fn unknown_variable_reference_is_a_compile_error_with_exit_code_65() {
    let err = run("$nichtDeklariert.\n").unwrap_err();
    assert!(matches!(err, DdpError::Compile(_)));
    assert_eq!(err.exit_code(), 65);
}

#[test]
fn unterminated_string_literal_is_a_lexical_error_with_exit_code_65() {
    let err = run("die Text s ist \"nie beendet.\n").unwrap_err();
    assert!(matches!(err, DdpError::Lexical(_)));
    assert_eq!(err.exit_code(), 65);
}

#[test]
fn ascending_and_descending_for_loops_iterate_the_same_count() {
    let ascending = run(
        "die Zahl n ist 0.\nfür jede Zahl i von 1 bis 5 mache:\n    n ist n plus 1.\n$n.\n",
    )
    .unwrap();
    let descending = run(
        "die Zahl n ist 0.\nfür jede Zahl i von 5 bis 1 mache:\n    n ist n plus 1.\n$n.\n",
    )
    .unwrap();
    assert_eq!(ascending.trim(), "5");
    assert_eq!(descending.trim(), "5");
}

#[test]
fn native_argument_type_mismatch_is_a_compile_error() {
    // Laenge's declared param kind accepts Any, but Max demands two Numeric
    // arguments - passing a Text where a number is expected must be caught
    // statically rather than surfacing as a runtime panic.
    let err = run("die Zahl x ist Max(\"ho\"; 1).\n").unwrap_err();
    assert!(matches!(err, DdpError::Compile(_)));
}

#[test]
fn calling_an_unknown_native_is_a_compile_error() {
    let err = run("schreibeNichtVorhanden(1).\n").unwrap_err();
    assert!(matches!(err, DdpError::Compile(_)));
}

#[test]
fn include_directive_splices_in_the_referenced_file() {
    let dir = tempfile::tempdir().unwrap();
    let included_path = dir.path().join("helper.ddp");
    let mut included = std::fs::File::create(&included_path).unwrap();
    writeln!(included, "die Zahl geholfen ist 42.").unwrap();

    let main_path = dir.path().join("main.ddp");
    std::fs::write(&main_path, "binde \"helper\" ein.\n$geholfen.\n").unwrap();

    let source = std::fs::read_to_string(&main_path).unwrap();
    let mut out = Vec::new();
    ddp::run_source(&source, &main_path, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap().trim(), "42");
}

#[test]
fn missing_include_target_is_a_lexical_error() {
    let dir = tempfile::tempdir().unwrap();
    let main_path = dir.path().join("main.ddp");
    std::fs::write(&main_path, "binde \"does_not_exist\" ein.\n").unwrap();
    let source = std::fs::read_to_string(&main_path).unwrap();
    let mut out = Vec::new();
    let result = ddp::run_source(&source, &main_path, &mut out);
    assert!(matches!(result, Err(DdpError::Lexical(_))));
}
