//! End-to-end tests for tawk
//!
//! These tests parse and run complete AWK programs through the library API
//! and verify the output matches expected results.

use std::fs;

use tawk::{exec_program, extensions, parse_program, ExecConfig, ParseConfig};
use tempfile::TempDir;

/// Run an AWK program with `-v` style assignments and operands
fn run_awk_with(
    program: &str,
    input: &str,
    vars: &[(&str, &str)],
    args: &[&str],
) -> Result<(String, i32), String> {
    let funcs = extensions();
    let mut parse_config = ParseConfig::new(&funcs);
    let program = parse_program(program.as_bytes(), &mut parse_config).map_err(|e| e.to_string())?;

    let mut output = Vec::new();
    let mut config = ExecConfig::new(&funcs);
    config.vars = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    config.args = args.iter().map(|a| a.to_string()).collect();
    config.stdin = Some(Box::new(input.as_bytes()));
    config.output = Some(Box::new(&mut output));
    let status = exec_program(&program, config).map_err(|e| e.to_string())?;

    let output = String::from_utf8(output).map_err(|e| e.to_string())?;
    Ok((output, status))
}

/// Run an AWK program with the given input and return the output
fn run_awk(program: &str, input: &str) -> Result<String, String> {
    run_awk_with(program, input, &[], &[]).map(|(output, _)| output)
}

/// Run an AWK program with a custom field separator
fn run_awk_with_fs(program: &str, input: &str, fs: &str) -> Result<String, String> {
    run_awk_with(program, input, &[("FS", fs)], &[]).map(|(output, _)| output)
}

// ============================================================================
// Basic Output Tests
// ============================================================================

#[test]
fn test_hello_world() {
    let output = run_awk(r#"BEGIN { print "Hello, World!" }"#, "").unwrap();
    assert_eq!(output, "Hello, World!\n");
}

#[test]
fn test_print_number() {
    let output = run_awk("BEGIN { print 42 }", "").unwrap();
    assert_eq!(output, "42\n");
}

#[test]
fn test_print_float() {
    let output = run_awk("BEGIN { print 3.14159, 0.1 + 0.2, 1/3 }", "").unwrap();
    assert_eq!(output, "3.14159 0.3 0.333333\n");
}

#[test]
fn test_print_large_integer() {
    let output = run_awk("BEGIN { print 100000 * 100000, 2^31 }", "").unwrap();
    assert_eq!(output, "10000000000 2147483648\n");
}

#[test]
fn test_print_multiple_values() {
    let output = run_awk(r#"BEGIN { print "a", "b", "c" }"#, "").unwrap();
    assert_eq!(output, "a b c\n");
}

#[test]
fn test_print_concatenation() {
    let output = run_awk(r#"BEGIN { print "hello" "world", "x" 5 "y" }"#, "").unwrap();
    assert_eq!(output, "helloworld x5y\n");
}

#[test]
fn test_print_parenthesized_list() {
    let output = run_awk(r#"BEGIN { print("a", "b") }"#, "").unwrap();
    assert_eq!(output, "a b\n");
}

// ============================================================================
// Field Access Tests
// ============================================================================

#[test]
fn test_print_fields() {
    let output = run_awk("{ print $0; print $1; print $1, $3; print NF, $NF }", "one two three four").unwrap();
    assert_eq!(output, "one two three four\none\none three\n4 four\n");
}

#[test]
fn test_field_separator_colon() {
    let output = run_awk_with_fs("{ print $1 }", "root:x:0:0:root:/root:/bin/bash", ":").unwrap();
    assert_eq!(output, "root\n");
}

#[test]
fn test_field_separator_in_begin() {
    let output = run_awk(
        r#"BEGIN { FS = ":" } { print $1, $3 }"#,
        "root:x:0:0:root:/root:/bin/bash",
    )
    .unwrap();
    assert_eq!(output, "root 0\n");
}

#[test]
fn test_field_separator_regex() {
    let output = run_awk_with_fs("{ print $2, NF }", "a1b22c333d", "[0-9]+").unwrap();
    assert_eq!(output, "b 4\n");
}

#[test]
fn test_field_separator_tab() {
    let output = run_awk_with_fs("{ print $2 }", "a b\tc d", "\\t").unwrap();
    assert_eq!(output, "c d\n");
}

#[test]
fn test_field_separator_single_space_trims() {
    let output = run_awk("{ print NF, $1 }", "   lead  and trail   ").unwrap();
    assert_eq!(output, "3 lead\n");
}

#[test]
fn test_fs_change_applies_to_next_record() {
    let output = run_awk(r#"{ FS = ":"; print $1 }"#, "a:b c\nd:e f").unwrap();
    assert_eq!(output, "a:b\nd\n");
}

#[test]
fn test_multiple_lines() {
    let output = run_awk("{ print $1 }", "one two\nthree four\nfive six").unwrap();
    assert_eq!(output, "one\nthree\nfive\n");
}

#[test]
fn test_crlf_input() {
    let output = run_awk("{ print $2 \"|\" }", "a b\r\nc d\r\n").unwrap();
    assert_eq!(output, "b|\nd|\n");
}

// ============================================================================
// Arithmetic Tests
// ============================================================================

#[test]
fn test_arithmetic() {
    let output = run_awk(
        "BEGIN { print 1 + 2, 10 - 3, 6 * 7, 15 / 3, 17 % 5, 2 ^ 10, 2 ** 3 }",
        "",
    )
    .unwrap();
    assert_eq!(output, "3 7 42 5 2 1024 8\n");
}

#[test]
fn test_operator_precedence() {
    let output = run_awk("BEGIN { print 2 + 3 * 4, (2 + 3) * 4, -2 ^ 2, 2 ^ 3 ^ 2 }", "").unwrap();
    assert_eq!(output, "14 20 -4 512\n");
}

#[test]
fn test_unary_operators() {
    let output = run_awk("BEGIN { x = -3; print -5, +x, -x, - -x }", "").unwrap();
    assert_eq!(output, "-5 -3 3 -3\n");
}

#[test]
fn test_modulo_keeps_sign_of_dividend() {
    let output = run_awk("BEGIN { print -7 % 3, 7 % -3, 5.5 % 2 }", "").unwrap();
    assert_eq!(output, "-1 1 1.5\n");
}

#[test]
fn test_division_by_zero() {
    let err = run_awk("BEGIN { x = 0; print 1 / x }", "").unwrap_err();
    assert_eq!(err, "runtime error at 1:24: division by zero");
}

#[test]
fn test_string_to_number() {
    let output = run_awk(r#"BEGIN { print "3abc" + 1, " 12 " * 2, "abc" + 0, ".5" + 0, "1e2" + 0 }"#, "").unwrap();
    assert_eq!(output, "4 24 0 0.5 100\n");
}

// ============================================================================
// Variable Tests
// ============================================================================

#[test]
fn test_variable_assignment() {
    let output = run_awk("BEGIN { x = 42; print x }", "").unwrap();
    assert_eq!(output, "42\n");
}

#[test]
fn test_uninitialized_variable() {
    let output = run_awk(r#"BEGIN { print x + 1; print x ""; print length(x) }"#, "").unwrap();
    assert_eq!(output, "1\n\n0\n");
}

#[test]
fn test_increment_decrement() {
    let output = run_awk("BEGIN { x = 5; print ++x; print x++; print x; print --x, x-- }", "").unwrap();
    assert_eq!(output, "6\n6\n7\n6 6\n");
}

#[test]
fn test_compound_assignment() {
    let output = run_awk("BEGIN { x = 10; x += 5; x -= 3; x *= 2; x /= 4; x %= 4; x ^= 3; print x }", "").unwrap();
    assert_eq!(output, "8\n");
}

#[test]
fn test_chained_assignment() {
    let output = run_awk("BEGIN { a = b = c = 7; print a, b, c }", "").unwrap();
    assert_eq!(output, "7 7 7\n");
}

#[test]
fn test_command_line_variables() {
    let (output, _) = run_awk_with("BEGIN { print n + 1, s }", "", &[("n", "41"), ("s", "a\\tb")], &[]).unwrap();
    assert_eq!(output, "42 a\tb\n");
}

#[test]
fn test_command_line_variable_is_strnum() {
    let (output, _) = run_awk_with("BEGIN { print (v == 10), (v < 9) }", "", &[("v", "10.0")], &[]).unwrap();
    assert_eq!(output, "1 0\n");
}

// ============================================================================
// Comparison Tests
// ============================================================================

#[test]
fn test_numeric_comparison() {
    let output = run_awk("BEGIN { print (5 > 3), (5 < 3), (5 == 5), (5 != 5), (3 <= 3), (2 >= 3) }", "").unwrap();
    assert_eq!(output, "1 0 1 0 1 0\n");
}

#[test]
fn test_string_comparison() {
    let output = run_awk(r#"BEGIN { print ("abc" < "def"), ("abc" == "abc"), ("abc" < "abd") }"#, "").unwrap();
    assert_eq!(output, "1 1 1\n");
}

#[test]
fn test_string_constants_compare_as_strings() {
    let output = run_awk(r#"BEGIN { print ("10" < "9"), ("a" < 1) }"#, "").unwrap();
    assert_eq!(output, "1 0\n");
}

#[test]
fn test_fields_compare_numerically_when_numeric() {
    let output = run_awk("{ print ($1 < $2), ($3 < $4) }", "10 9 abc abd").unwrap();
    assert_eq!(output, "0 1\n");
}

#[test]
fn test_comparison_in_print() {
    let output = run_awk("BEGIN { print (5 > 3); print 5 < 3; print 5 >= 3 }", "").unwrap();
    assert_eq!(output, "1\n0\n1\n");
}

// ============================================================================
// Control Flow Tests
// ============================================================================

#[test]
fn test_if_else() {
    let output = run_awk(r#"BEGIN { if (1) print "yes"; if (0) print "no"; if (0) { print "yes" } else { print "no" } }"#, "").unwrap();
    assert_eq!(output, "yes\nno\n");
}

#[test]
fn test_if_else_chain() {
    let output = run_awk(
        r#"BEGIN { x = 2; if (x == 1) { print "one" } else if (x == 2) { print "two" } else { print "other" } }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "two\n");
}

#[test]
fn test_else_after_semicolon() {
    let output = run_awk(r#"BEGIN { if (1) print "yes"; else print "no"; if (0) print "yes"; else print "no" }"#, "").unwrap();
    assert_eq!(output, "yes\nno\n");
}

#[test]
fn test_while_loop() {
    let output = run_awk("BEGIN { i = 0; while (i < 3) { print i; i++ } }", "").unwrap();
    assert_eq!(output, "0\n1\n2\n");
}

#[test]
fn test_for_loop() {
    let output = run_awk("BEGIN { for (i = 1; i <= 3; i++) print i }", "").unwrap();
    assert_eq!(output, "1\n2\n3\n");
}

#[test]
fn test_for_empty_parts() {
    let output = run_awk("BEGIN { i = 0; for (;;) { if (++i > 2) break; print i } }", "").unwrap();
    assert_eq!(output, "1\n2\n");
}

#[test]
fn test_do_while() {
    let output = run_awk("BEGIN { i = 0; do { print i; i++ } while (i < 3); do print \"x\"; while (0) }", "").unwrap();
    assert_eq!(output, "0\n1\n2\nx\n");
}

#[test]
fn test_break_and_continue() {
    let output = run_awk(
        "BEGIN { for (i = 1; i <= 10; i++) { if (i == 3) continue; if (i > 5) break; print i } }",
        "",
    )
    .unwrap();
    assert_eq!(output, "1\n2\n4\n5\n");
}

#[test]
fn test_break_in_nested_loop() {
    let output = run_awk(
        "BEGIN { for (i = 1; i <= 2; i++) for (j = 1; j <= 3; j++) { if (j == 2) break; print i, j } }",
        "",
    )
    .unwrap();
    assert_eq!(output, "1 1\n2 1\n");
}

#[test]
fn test_next() {
    let output = run_awk("/skip/ { next } { print }", "line1\nskip\nline2").unwrap();
    assert_eq!(output, "line1\nline2\n");
}

#[test]
fn test_exit_runs_end() {
    let (output, status) = run_awk_with(r#"NR == 2 { exit 3 } { print } END { print "end", NR }"#, "a\nb\nc", &[], &[]).unwrap();
    assert_eq!(output, "a\nend 2\n");
    assert_eq!(status, 3);
}

#[test]
fn test_exit_in_end_keeps_status() {
    let (output, status) = run_awk_with(r#"BEGIN { exit 2 } END { print "end"; exit }"#, "", &[], &[]).unwrap();
    assert_eq!(output, "end\n");
    assert_eq!(status, 2);
}

#[test]
fn test_short_circuit() {
    let output = run_awk("BEGIN { x = 0; y = 0; if (0 && (x = 1)) z = 1; if (1 || (y = 1)) z = 2; print x, y, z }", "").unwrap();
    assert_eq!(output, "0 0 2\n");
}

#[test]
fn test_logical_operators() {
    let output = run_awk("BEGIN { print (1 && 0), (0 || 1), !0, !1, !!5, !\"\", !\"a\" }", "").unwrap();
    assert_eq!(output, "0 1 1 0 1 1 0\n");
}

#[test]
fn test_ternary() {
    let output = run_awk(r#"BEGIN { x = 5; print (x > 3 ? x * 2 : x / 2), (0 ? "yes" : "no") }"#, "").unwrap();
    assert_eq!(output, "10 no\n");
}

// ============================================================================
// Pattern Tests
// ============================================================================

#[test]
fn test_begin_and_end() {
    let output = run_awk(r#"BEGIN { print "start" } { print "line" } END { print "end" }"#, "a\nb").unwrap();
    assert_eq!(output, "start\nline\nline\nend\n");
}

#[test]
fn test_multiple_begin_blocks_run_in_order() {
    let output = run_awk(r#"BEGIN { print 1 } BEGIN { print 2 }"#, "").unwrap();
    assert_eq!(output, "1\n2\n");
}

#[test]
fn test_begin_only_does_not_read_input() {
    let output = run_awk(r#"BEGIN { print NR }"#, "a\nb").unwrap();
    assert_eq!(output, "0\n");
}

#[test]
fn test_regex_pattern() {
    let output = run_awk("/error/ { print }", "info: ok\nerror: fail\ninfo: done").unwrap();
    assert_eq!(output, "error: fail\n");
}

#[test]
fn test_expression_pattern() {
    let output = run_awk("$1 > 5", "3 a\n7 b\n2 c\n10 d").unwrap();
    assert_eq!(output, "7 b\n10 d\n");
}

#[test]
fn test_negated_regex() {
    let output = run_awk("!/skip/ { print }", "keep\nskip\nalso keep").unwrap();
    assert_eq!(output, "keep\nalso keep\n");
}

#[test]
fn test_range_pattern() {
    let output = run_awk("/start/,/end/ { print }", "before\nstart\nmiddle\nend\nafter\nstart\nopen").unwrap();
    assert_eq!(output, "start\nmiddle\nend\nstart\nopen\n");
}

#[test]
fn test_range_pattern_single_record() {
    let output = run_awk("/a/,/a/", "a\nb\na").unwrap();
    assert_eq!(output, "a\na\n");
}

#[test]
fn test_multiple_patterns_same_line() {
    let output = run_awk(r#"/a/ { print "A" } /b/ { print "B" }"#, "ab").unwrap();
    assert_eq!(output, "A\nB\n");
}

// ============================================================================
// Regex Tests
// ============================================================================

#[test]
fn test_match_operators() {
    let output = run_awk(r#"BEGIN { print ("hello" ~ /ell/), ("hello" !~ /xyz/), ("hello" ~ "^h.*o$") }"#, "").unwrap();
    assert_eq!(output, "1 1 1\n");
}

#[test]
fn test_match_in_pattern() {
    let output = run_awk("$1 ~ /^[0-9]+$/ { print }", "123 num\nabc text\n456 num").unwrap();
    assert_eq!(output, "123 num\n456 num\n");
}

#[test]
fn test_bare_regex_matches_record() {
    let output = run_awk("{ print /hello/, !/hello/ }", "hello world\ngoodbye").unwrap();
    assert_eq!(output, "1 0\n0 1\n");
}

#[test]
fn test_dynamic_regex() {
    let output = run_awk(r#"BEGIN { re = "^[a-c]+$" } $0 ~ re"#, "abc\nabd\ncab").unwrap();
    assert_eq!(output, "abc\ncab\n");
}

#[test]
fn test_regex_with_slash() {
    let output = run_awk(r#"$0 ~ /a\/b/"#, "a/b\nab").unwrap();
    assert_eq!(output, "a/b\n");
}

// ============================================================================
// Array Tests
// ============================================================================

#[test]
fn test_array_assignment() {
    let output = run_awk(r#"BEGIN { a[1] = 10; a["foo"] = "bar"; print a[1], a["foo"] }"#, "").unwrap();
    assert_eq!(output, "10 bar\n");
}

#[test]
fn test_array_in_operator() {
    let output = run_awk("BEGIN { a[1] = 1; print (1 in a), (2 in a), (\"1\" in a) }", "").unwrap();
    assert_eq!(output, "1 0 1\n");
}

#[test]
fn test_in_does_not_create_element() {
    let output = run_awk("BEGIN { if (5 in a) print \"yes\"; n = 0; for (k in a) n++; print n }", "").unwrap();
    assert_eq!(output, "0\n");
}

#[test]
fn test_reference_creates_element() {
    let output = run_awk("BEGIN { x = a[5]; print (5 in a) }", "").unwrap();
    assert_eq!(output, "1\n");
}

#[test]
fn test_for_in_loop() {
    let output = run_awk("BEGIN { a[1]=1; a[2]=2; a[3]=3; sum=0; for (k in a) sum += a[k]; print sum }", "").unwrap();
    assert_eq!(output, "6\n");
}

#[test]
fn test_for_in_order() {
    let output = run_awk(
        "{ for (i = 1; i <= NF; i++) count[$i]++ } END { for (w in count) print w, count[w] }",
        "b a c b a 10 9 a",
    )
    .unwrap();
    assert_eq!(output, "9 1\n10 1\na 3\nb 2\nc 1\n");
}

#[test]
fn test_delete() {
    let output = run_awk(
        "BEGIN { a[1]=1; a[2]=2; delete a[1]; print (1 in a), (2 in a); delete a; for (k in a) n++; print n+0 }",
        "",
    )
    .unwrap();
    assert_eq!(output, "0 1\n0\n");
}

#[test]
fn test_delete_during_iteration() {
    let output = run_awk("BEGIN { a[1]; a[2]; a[3]; for (k in a) { delete a[k]; n++ }; print n, length(a) }", "").unwrap();
    assert_eq!(output, "3 0\n");
}

#[test]
fn test_multidimensional_array() {
    let output = run_awk(
        r#"BEGIN { a[1,2] = "x"; print a[1,2], ((1,2) in a); for (k in a) { split(k, p, SUBSEP); print p[1], p[2] } }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "x 1\n1 2\n");
}

#[test]
fn test_numeric_subscripts_use_integer_form() {
    let output = run_awk(r#"BEGIN { a[4 / 4] = "one"; print a[1], a["1"] }"#, "").unwrap();
    assert_eq!(output, "one one\n");
}

#[test]
fn test_duplicate_lines() {
    let output = run_awk("!seen[$0]++", "a\nb\na\nc\nb\na").unwrap();
    assert_eq!(output, "a\nb\nc\n");
}

// ============================================================================
// Built-in Function Tests
// ============================================================================

#[test]
fn test_length() {
    let output = run_awk(r#"{ print length("hello"), length(), length, length($1) }"#, "hello world").unwrap();
    assert_eq!(output, "5 11 11 5\n");
}

#[test]
fn test_length_of_array() {
    let output = run_awk("BEGIN { a[1]; a[2]; print length(a) }", "").unwrap();
    assert_eq!(output, "2\n");
}

#[test]
fn test_substr() {
    let output = run_awk(
        r#"BEGIN { s = "hello"; print substr(s, 2, 3), substr(s, 3), substr(s, 0, 3), substr(s, -1), substr(s, 4, 100) "|" substr(s, 10) "|" }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "ell llo he hello lo||\n");
}

#[test]
fn test_index() {
    let output = run_awk(r#"BEGIN { print index("hello", "ll"), index("hello", "x"), index("abc", "") }"#, "").unwrap();
    assert_eq!(output, "3 0 0\n");
}

#[test]
fn test_split() {
    let output = run_awk(
        r#"BEGIN { n = split("a:b:c", arr, ":"); print n, arr[1], arr[3]; n = split("  x  y ", w); print n, w[1], w[2]; print split("", e), length(e) }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "3 a c\n2 x y\n0 0\n");
}

#[test]
fn test_split_with_regex_literal() {
    let output = run_awk("BEGIN { n = split(\"a1b22c\", arr, /[0-9]+/); print n, arr[1], arr[2], arr[3] }", "").unwrap();
    assert_eq!(output, "3 a b c\n");
}

#[test]
fn test_split_elements_are_strnum() {
    let output = run_awk(r#"BEGIN { split("10 9", a); print (a[1] > a[2]) }"#, "").unwrap();
    assert_eq!(output, "1\n");
}

#[test]
fn test_case_conversion() {
    let output = run_awk(r#"BEGIN { print tolower("HeLLo 1"), toupper("HeLLo 1") }"#, "").unwrap();
    assert_eq!(output, "hello 1 HELLO 1\n");
}

#[test]
fn test_sub_and_gsub() {
    let output = run_awk(
        r#"{ n = gsub(/o/, "0"); print n, $0; s = "aaa"; print sub("a", "b", s), s; print gsub(/x/, "y", s), s }"#,
        "hello world",
    )
    .unwrap();
    assert_eq!(output, "2 hell0 w0rld\n1 baa\n0 baa\n");
}

#[test]
fn test_gsub_ampersand() {
    let output = run_awk(r#"BEGIN { s = "cat"; gsub(/a/, "[&]", s); t = "cat"; gsub(/a/, "\\&", t); print s, t }"#, "").unwrap();
    assert_eq!(output, "c[a]t c&t\n");
}

#[test]
fn test_gsub_empty_matches() {
    let output = run_awk(r#"BEGIN { s = "abc"; n = gsub(/x*/, "-", s); print n, s }"#, "").unwrap();
    assert_eq!(output, "4 -a-b-c-\n");
}

#[test]
fn test_gsub_on_field_rebuilds_record() {
    let output = run_awk(r#"{ gsub(/b/, "B", $2); print; print NF }"#, "abc  abc abc").unwrap();
    assert_eq!(output, "abc aBc abc\n3\n");
}

#[test]
fn test_match() {
    let output = run_awk(
        r#"BEGIN { print match("hello world", /wor/), RSTART, RLENGTH; print match("hello", "xyz"), RSTART, RLENGTH }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "7 7 3\n0 0 -1\n");
}

#[test]
fn test_sprintf() {
    let output = run_awk(r#"BEGIN { s = sprintf("%05d|%-3s|%.1f", 42, "a", 2.26); print s }"#, "").unwrap();
    assert_eq!(output, "00042|a  |2.3\n");
}

#[test]
fn test_math_functions() {
    let output = run_awk(
        "BEGIN { print sqrt(16), int(3.7), int(-3.7), int(sin(0) * 100), int(cos(0) * 100), int(exp(1) * 100), int(log(10) * 100), int(atan2(1, 1) * 1000) }",
        "",
    )
    .unwrap();
    assert_eq!(output, "4 3 -3 0 100 271 230 785\n");
}

#[test]
fn test_rand_is_deterministic() {
    let output = run_awk("BEGIN { x = rand(); print (x >= 0 && x < 1) }", "").unwrap();
    assert_eq!(output, "1\n");
    let first = run_awk("BEGIN { print rand(), rand() }", "").unwrap();
    let second = run_awk("BEGIN { print rand(), rand() }", "").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_srand_returns_previous_seed() {
    let output = run_awk("BEGIN { a = srand(42); b = srand(7); print a, b }", "").unwrap();
    assert_eq!(output, "0 42\n");
    let output = run_awk("BEGIN { srand(5); x = rand(); srand(5); print (x == rand()) }", "").unwrap();
    assert_eq!(output, "1\n");
}

#[test]
fn test_utf8_strings() {
    let output = run_awk(
        r#"BEGIN { print length("héllo"), length("你好"), substr("你好世界", 2, 2), index("hello世界", "世"), toupper("é") }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "5 2 好世 6 É\n");
}

#[test]
fn test_native_functions() {
    let output = run_awk(r#"BEGIN { print sum(1, "2", 3.5), repeat("ab", 2) "|" repeat("x", 0) "|", isodate(0) }"#, "").unwrap();
    assert_eq!(output, "6.5 abab|| 1970-01-01T00:00:00Z\n");
}

// ============================================================================
// Printf Tests
// ============================================================================

#[test]
fn test_printf_conversions() {
    let output = run_awk(
        r#"BEGIN { printf "%s %d %i %.2f %x %X %o %c%c %e %g %%\n", "hi", 42.9, -7, 3.14159, 255, 255, 8, 65, "BC", 1234.5, 0.0001 }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "hi 42 -7 3.14 ff FF 10 AB 1.234500e+03 0.0001 %\n");
}

#[test]
fn test_printf_width_and_flags() {
    let output = run_awk(
        r#"BEGIN { printf "%10s|%-10s|%05d|%+d|%10.3f|%-5s|\n", "hi", "hi", 42, 5, 3.14159, "ab" }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "        hi|hi        |00042|+5|     3.142|ab   |\n");
}

#[test]
fn test_printf_star_width() {
    let output = run_awk(r#"BEGIN { printf "%*d|%-*d|%.*f\n", 4, 1, 3, 2, 1, 2.56 }"#, "").unwrap();
    assert_eq!(output, "   1|2  |2.6\n");
}

#[test]
fn test_printf_missing_arguments() {
    let output = run_awk(r#"BEGIN { printf "[%s][%d]\n" }"#, "").unwrap();
    assert_eq!(output, "[][0]\n");
}

#[test]
fn test_printf_parenthesized() {
    let output = run_awk(r#"BEGIN { printf("%s-%s\n", "a", "b") }"#, "").unwrap();
    assert_eq!(output, "a-b\n");
}

// ============================================================================
// Number Formatting Tests
// ============================================================================

#[test]
fn test_ofmt_and_convfmt() {
    let output = run_awk(
        r#"BEGIN { OFMT = "%.2f"; CONVFMT = "%.3f"; x = 3.14159; print x; y = x ""; print y; print 10 }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "3.14\n3.142\n10\n");
}

// ============================================================================
// User-Defined Function Tests
// ============================================================================

#[test]
fn test_function_definition() {
    let output = run_awk("function double(x) { return x * 2 } BEGIN { print double(21) }", "").unwrap();
    assert_eq!(output, "42\n");
}

#[test]
fn test_function_with_side_effect() {
    let output = run_awk(
        "function increment() { count++ } BEGIN { count = 0; increment(); increment(); print count }",
        "",
    )
    .unwrap();
    assert_eq!(output, "2\n");
}

#[test]
fn test_function_recursion() {
    let output = run_awk(
        "function fact(n) { if (n <= 1) return 1; return n * fact(n-1) }\nfunction fib(n) { if (n <= 2) return 1; return fib(n-1) + fib(n-2) }\nBEGIN { print fact(5), fib(10) }",
        "",
    )
    .unwrap();
    assert_eq!(output, "120 55\n");
}

#[test]
fn test_function_locals() {
    let output = run_awk(
        "function f(a,    local) { local = a * 5; return local } BEGIN { local = \"global\"; print f(1), local }",
        "",
    )
    .unwrap();
    assert_eq!(output, "5 global\n");
}

#[test]
fn test_function_scalars_by_value() {
    let output = run_awk("function f(x) { x = 99 } BEGIN { y = 1; f(y); print y }", "").unwrap();
    assert_eq!(output, "1\n");
}

#[test]
fn test_array_by_reference() {
    let output = run_awk(
        r#"function modify(arr) { arr[1] = "modified" }
        BEGIN {
            a[1] = "original"
            modify(a)
            print a[1]
        }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "modified\n");
}

#[test]
fn test_return_no_value() {
    let output = run_awk("function f() { return } BEGIN { x = f(); print x + 0, length(x) }", "").unwrap();
    assert_eq!(output, "0 0\n");
}

#[test]
fn test_function_with_print() {
    let output = run_awk(
        "
        function count_to(n) { for (i = 1; i <= n; i++) print i }
        BEGIN { count_to(3) }
    ",
        "",
    )
    .unwrap();
    assert_eq!(output, "1\n2\n3\n");
}

#[test]
fn test_undefined_function() {
    let err = run_awk("BEGIN { nope(1) }", "").unwrap_err();
    assert!(err.starts_with("parse error at 1:9: "), "{}", err);
}

// ============================================================================
// Special Variable Tests
// ============================================================================

#[test]
fn test_nr_and_fnr() {
    let output = run_awk("{ print NR, FNR, $0 } END { print NR }", "a\nb\nc").unwrap();
    assert_eq!(output, "1 1 a\n2 2 b\n3 3 c\n3\n");
}

#[test]
fn test_ofs_and_ors() {
    let output = run_awk(r#"BEGIN { OFS = ","; ORS = ";" } { print $1, $2 }"#, "a b c\nd e f").unwrap();
    assert_eq!(output, "a,b;d,e;");
}

#[test]
fn test_modify_field_rebuilds_record() {
    let output = run_awk(r#"BEGIN { OFS = ":" } { $2 = "X"; print $0 }"#, "a b c").unwrap();
    assert_eq!(output, "a:X:c\n");
}

#[test]
fn test_assign_to_field_extends_nf() {
    let output = run_awk(r#"{ $5 = "x"; print NF, $0 }"#, "a b").unwrap();
    assert_eq!(output, "5 a b   x\n");
}

#[test]
fn test_assign_nf_truncates_record() {
    let output = run_awk("{ NF = 2; print; NF = 4; print }", "a b c").unwrap();
    assert_eq!(output, "a b\na b  \n");
}

#[test]
fn test_assign_record_resplits() {
    let output = run_awk(r#"{ $0 = "x y z w"; print NF, $4 }"#, "a").unwrap();
    assert_eq!(output, "4 w\n");
}

#[test]
fn test_nonexistent_field() {
    let output = run_awk(r#"{ print $100 == "", NF }"#, "a b c").unwrap();
    assert_eq!(output, "1 3\n");
}

#[test]
fn test_negative_field_is_an_error() {
    let err = run_awk("{ x = -1; print $x }", "hello world").unwrap_err();
    assert_eq!(err, "runtime error at 1:17: attempt to access field -1");
}

#[test]
fn test_subsep() {
    let output = run_awk(r#"BEGIN { SUBSEP = ":"; a["x", "y"] = 1; for (k in a) print k }"#, "").unwrap();
    assert_eq!(output, "x:y\n");
}

#[test]
fn test_environ() {
    let path = std::env::var("PATH").unwrap_or_default();
    let output = run_awk(r#"BEGIN { print ENVIRON["PATH"] }"#, "").unwrap();
    assert_eq!(output, format!("{}\n", path));
}

#[test]
fn test_argv_and_argc() {
    let (output, _) = run_awk_with(
        r#"BEGIN { for (i = 0; i < ARGC; i++) print i, ARGV[i] }"#,
        "",
        &[],
        &["x=1", "file"],
    )
    .unwrap();
    assert_eq!(output, "0 tawk\n1 x=1\n2 file\n");
}

// ============================================================================
// Input Tests
// ============================================================================

#[test]
fn test_paragraph_mode() {
    let input = "word1 word2\nword3\n\n\n\nword4 word5\n";
    let output = run_awk(r#"BEGIN { RS = "" } { print NR, NF, $1, $NF }"#, input).unwrap();
    assert_eq!(output, "1 3 word1 word3\n2 2 word4 word5\n");
}

#[test]
fn test_paragraph_mode_splits_fields_on_newline() {
    let input = "a:b\nc:d\n\ne\n";
    let output = run_awk(r#"BEGIN { RS = ""; FS = ":" } { print NF, $2 }"#, input).unwrap();
    assert_eq!(output, "4 b\n1 \n");
}

#[test]
fn test_record_separator_char() {
    let output = run_awk(r#"BEGIN { RS = ";" } { print NR ": " $0 }"#, "a;b;c").unwrap();
    assert_eq!(output, "1: a\n2: b\n3: c\n");
}

#[test]
fn test_input_files_and_assignments() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    fs::write(&first, "1\n2\n").unwrap();
    fs::write(&second, "3\n").unwrap();
    let first = first.to_string_lossy().into_owned();
    let second = second.to_string_lossy().into_owned();

    let (output, _) = run_awk_with(
        "FNR == 1 { n++ } { print n, FNR, NR, tag, $0 }",
        "ignored\n",
        &[],
        &[&first, "tag=b", &second],
    )
    .unwrap();
    assert_eq!(output, "1 1 1  1\n1 2 2  2\n2 1 3 b 3\n");
}

#[test]
fn test_dash_operand_reads_stdin() {
    let (output, _) = run_awk_with("{ print NR, $0 }", "in\n", &[], &["-"]).unwrap();
    assert_eq!(output, "1 in\n");
}

#[test]
fn test_getline_forms() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    fs::write(&data, "x\ny\n").unwrap();
    let data = data.to_string_lossy().into_owned();

    let (output, _) = run_awk_with(
        r#"NR == 1 {
            while ((getline line < path) > 0) print "file:", line
            close(path)
            getline line < path
            print "again:", line
            getline
            print "next:", $0, NR
            getline v
            print "var:", v, NR
        }"#,
        "a\nb\nc\n",
        &[("path", &data)],
        &[],
    )
    .unwrap();
    assert_eq!(output, "file: x\nfile: y\nagain: x\nnext: b 2\nvar: c 3\n");
}

#[test]
fn test_getline_from_missing_file() {
    let output = run_awk(r#"BEGIN { print (getline line < "/nonexistent/tawk-data") }"#, "").unwrap();
    assert_eq!(output, "-1\n");
}

#[test]
fn test_command_getline() {
    let output = run_awk(
        r#"BEGIN { "echo hello" | getline x; print x; "echo test" | getline; print $0, NR; while (("printf \"a\\nb\\n\"" | getline line) > 0) print "got", line }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "hello\ntest 2\ngot a\ngot b\n");
}

// ============================================================================
// Output Tests
// ============================================================================

#[test]
fn test_output_redirection() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.txt");
    let out = out.to_string_lossy().into_owned();

    let (output, _) = run_awk_with(
        r#"{ print $1 > path } END { close(path); print "more" >> path; printf "%s\n", "last" > path }"#,
        "a 1\nb 2\n",
        &[("path", &out)],
        &[],
    )
    .unwrap();
    assert_eq!(output, "");
    assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\nmore\nlast\n");
}

#[test]
fn test_output_pipe() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sorted.txt");
    let out = out.to_string_lossy().into_owned();

    let (output, _) = run_awk_with(
        r#"{ print | ("sort > " path) } END { print close("sort > " path) }"#,
        "c\na\nb\n",
        &[("path", &out)],
        &[],
    )
    .unwrap();
    assert_eq!(output, "0\n");
    assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\nc\n");
}

#[test]
fn test_system() {
    let output = run_awk(r#"BEGIN { print "before"; r = system("exit 3"); print r; print system("true") }"#, "").unwrap();
    assert_eq!(output, "before\n3\n0\n");
}

#[test]
fn test_close_unknown_stream() {
    let output = run_awk(r#"BEGIN { print close("nonexistent") }"#, "").unwrap();
    assert_eq!(output, "-1\n");
}

#[test]
fn test_fflush() {
    let output = run_awk(r#"BEGIN { print "test"; print fflush(); print fflush("nope") }"#, "").unwrap();
    assert_eq!(output, "test\n0\n-1\n");
}

// ============================================================================
// String Escape Tests
// ============================================================================

#[test]
fn test_escape_sequences() {
    let output = run_awk(r#"BEGIN { print "a\tb\\c\"d\/e" }"#, "").unwrap();
    assert_eq!(output, "a\tb\\c\"d/e\n");
}

#[test]
fn test_numeric_escape_sequences() {
    let output = run_awk(r#"BEGIN { print "\x41\x62\x43", "\101\102\103", "a\011b" }"#, "").unwrap();
    assert_eq!(output, "AbC ABC a\tb\n");
}

// ============================================================================
// Complex Program Tests
// ============================================================================

#[test]
fn test_sum_and_average() {
    let output = run_awk("{ sum += $1; count++ } END { print sum, sum / count }", "10\n20\n30").unwrap();
    assert_eq!(output, "60 20\n");
}

#[test]
fn test_max_value() {
    let output = run_awk("NR == 1 || $1 > max { max = $1 } END { print max }", "5\n3\n8\n2\n9\n1").unwrap();
    assert_eq!(output, "9\n");
}

#[test]
fn test_field_sum_per_line() {
    let output = run_awk("{ sum = 0; for (i = 1; i <= NF; i++) sum += $i; print sum }", "1 2 3\n4 5 6").unwrap();
    assert_eq!(output, "6\n15\n");
}

#[test]
fn test_reverse_fields() {
    let output = run_awk(r#"{ for (i = NF; i >= 1; i--) printf "%s ", $i; print "" }"#, "a b c").unwrap();
    assert_eq!(output, "c b a \n");
}

#[test]
fn test_group_by() {
    let output = run_awk(
        r#"{ total[$1] += $2 } END { for (k in total) printf "%s=%d\n", k, total[k] }"#,
        "b 2\na 1\nb 3\na 4\n",
    )
    .unwrap();
    assert_eq!(output, "a=5\nb=5\n");
}

#[test]
fn test_semicolons_and_newlines() {
    let output = run_awk(
        "BEGIN {\n  x = 1 ;;\n  if (x &&\n      1) print \"ok\" ,\n    \"yes\"\n}\n# comment\n",
        "",
    )
    .unwrap();
    assert_eq!(output, "ok yes\n");
}

// ============================================================================
// Edge Cases
// ============================================================================

#[test]
fn test_empty_input() {
    let output = run_awk("{ print } END { print NR }", "").unwrap();
    assert_eq!(output, "0\n");
}

#[test]
fn test_empty_and_blank_lines() {
    let output = run_awk("{ print NF }", "\n   \t  \n").unwrap();
    assert_eq!(output, "0\n0\n");
}

#[test]
fn test_last_line_without_newline() {
    let output = run_awk("{ print NR \":\" $0 }", "a\nb").unwrap();
    assert_eq!(output, "1:a\n2:b\n");
}

#[test]
fn test_parse_error_message() {
    let err = run_awk("BEGIN { x*; }", "").unwrap_err();
    assert_eq!(err, "parse error at 1:11: expected expression instead of ;");
}

#[test]
fn test_print_redirect_parsing() {
    assert!(run_awk(r#"BEGIN { print "test" > "/dev/null" }"#, "").is_ok());
    assert!(run_awk(r#"BEGIN { print "test" >> "/dev/null" }"#, "").is_ok());
    assert!(run_awk(r#"BEGIN { print "test" | "cat > /dev/null" }"#, "").is_ok());
    assert!(run_awk(r#"BEGIN { printf "%s\n", "test" > "/dev/null" }"#, "").is_ok());
}
