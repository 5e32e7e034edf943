//! CLI integration tests for tawk
//!
//! These tests run the tawk binary and check its output, diagnostics and
//! exit status.

use std::io::{ErrorKind, Write};
use std::process::{Command, Output, Stdio};

use tempfile::{NamedTempFile, TempDir};

/// Run tawk with the given arguments and stdin
fn run_tawk(args: &[&str], input: Option<&str>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tawk"));
    cmd.args(args)
        .env_remove("TAWK_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().expect("failed to start tawk");
    if let Some(mut stdin) = child.stdin.take() {
        if let Some(input) = input {
            // tawk may exit without reading stdin, e.g. under -i
            if let Err(err) = stdin.write_all(input.as_bytes()) {
                assert_eq!(err.kind(), ErrorKind::BrokenPipe, "{}", err);
            }
        }
    }
    child.wait_with_output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn path(file: &NamedTempFile) -> String {
    file.path().to_string_lossy().into_owned()
}

#[test]
fn test_cli_help() {
    for flag in ["-h", "-help", "--help"] {
        let output = run_tawk(&[flag], None);
        assert!(output.status.success());
        assert!(stdout(&output).starts_with("usage: tawk [-F fs]"));
    }
}

#[test]
fn test_cli_version() {
    let output = run_tawk(&["-version"], None);
    assert!(output.status.success());
    assert_eq!(stdout(&output), format!("tawk {}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_simple_program() {
    let output = run_tawk(&["BEGIN { print \"hello\" }"], None);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "hello\n");
    assert_eq!(stderr(&output), "");
}

#[test]
fn test_cli_with_input() {
    let output = run_tawk(&["{ print $1 }"], Some("a b c\nd e f\n"));
    assert_eq!(stdout(&output), "a\nd\n");
}

#[test]
fn test_cli_field_separator() {
    assert_eq!(stdout(&run_tawk(&["-F", ":", "{ print $2 }"], Some("a:b:c"))), "b\n");
    assert_eq!(stdout(&run_tawk(&["-F,", "{ print $3 }"], Some("a,b,c"))), "c\n");
    assert_eq!(stdout(&run_tawk(&["-F\\t", "{ print $2 }"], Some("a b\tc"))), "c\n");
}

#[test]
fn test_cli_variables_in_order() {
    let output = run_tawk(
        &["-F", ":", "-v", "A=1", "-v", "FS=,", "-v", "A=2", "{ print A, $2 }"],
        Some("x:y,z"),
    );
    assert_eq!(stdout(&output), "2 z\n");
}

#[test]
fn test_cli_variable_escapes() {
    let output = run_tawk(&["-v", "s=a\\tb", "BEGIN { print s }"], None);
    assert_eq!(stdout(&output), "a\tb\n");
}

#[test]
fn test_cli_bad_variable() {
    let output = run_tawk(&["-v", "novalue", "BEGIN { print }"], None);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr(&output), "-v flag must be in format name=value\n");
}

#[test]
fn test_cli_no_program() {
    let output = run_tawk(&[], None);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stderr(&output),
        "usage: tawk [-F fs] [-v var=value] [-f progfile | 'prog'] [file ...]\n"
    );
}

#[test]
fn test_cli_unknown_flag() {
    let output = run_tawk(&["-q", "BEGIN { }"], None);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr(&output), "flag provided but not defined: -q\n");
}

#[test]
fn test_cli_parse_error_diagnostic() {
    let output = run_tawk(&["BEGIN { x*; }"], None);
    assert_eq!(output.status.code(), Some(1));

    let message = "parse error at 1:11: expected expression instead of ;";
    let divider = "-".repeat(message.len());
    let expected = format!(
        "{d}\nBEGIN {{ x*; }}\n{caret}\n{d}\n{m}\n",
        d = divider,
        caret = format!("{}^", " ".repeat(10)),
        m = message
    );
    assert_eq!(stderr(&output), expected);
    assert_eq!(stdout(&output), "");
}

#[test]
fn test_cli_parse_error_with_tabs() {
    let prog = temp_file("BEGIN {\n\ty = }\n");
    let output = run_tawk(&["-f", &path(&prog)], None);
    assert_eq!(output.status.code(), Some(1));

    let err = stderr(&output);
    let lines: Vec<&str> = err.lines().collect();
    assert_eq!(lines[1], "    y = }");
    assert_eq!(lines[2], format!("{}^", " ".repeat(8)));
    assert_eq!(lines[4], "parse error at 2:6: expected expression instead of }");
}

#[test]
fn test_cli_program_files() {
    let begin = temp_file("BEGIN { n = 0 }");
    let body = temp_file("{ n += $1 }\nEND { print n }");
    let output = run_tawk(&["-f", &path(&begin), "-f", &path(&body)], Some("1\n2\n3\n"));
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "6\n");
}

#[test]
fn test_cli_program_from_stdin() {
    let output = run_tawk(&["-f", "-", "x=7"], Some("BEGIN { print ARGV[1], ARGC }"));
    assert_eq!(stdout(&output), "x=7 2\n");
}

#[test]
fn test_cli_missing_program_file() {
    let output = run_tawk(&["-f", "/nonexistent/prog.awk"], None);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("/nonexistent/prog.awk: "));
}

#[test]
fn test_cli_input_files_and_operands() {
    let a = temp_file("1\n2\n");
    let b = temp_file("3\n");
    let output = run_tawk(
        &["{ print FILENAME == ARGV[1] ? \"a\" : \"b\", tag, $0 }", &path(&a), "tag=x", &path(&b)],
        None,
    );
    assert_eq!(stdout(&output), "a  1\na  2\nb x 3\n");
}

#[test]
fn test_cli_input_override() {
    let input = temp_file("from file\n");
    let output = run_tawk(&["-i", &path(&input), "{ print NR, $2 }"], Some("from stdin\n"));
    assert_eq!(stdout(&output), "1 file\n");
}

#[test]
fn test_cli_missing_input_override() {
    let output = run_tawk(&["-i", "/nonexistent/input", "{ print }"], None);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("/nonexistent/input: "));
}

#[test]
fn test_cli_missing_input_file() {
    let output = run_tawk(&["{ print }", "/nonexistent/data"], None);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr(&output), "runtime error: can't open file /nonexistent/data\n");
}

#[test]
fn test_cli_exit_status() {
    let output = run_tawk(&["{ exit $1 }"], Some("3\n"));
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_cli_runtime_error() {
    let output = run_tawk(&["BEGIN { print \"partial\"; x = 1 / 0 }"], None);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "partial\n");
    assert_eq!(stderr(&output), "runtime error at 1:32: division by zero\n");
}

#[test]
fn test_cli_oversized_requests_are_runtime_errors() {
    let output = run_tawk(&["BEGIN { $(2^60) = \"x\" }"], None);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr(&output), "runtime error at 1:9: field index 1152921504606846976 too large\n");

    let output = run_tawk(&["BEGIN { printf \"%*d\", 2^40, 1 }"], None);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr(&output), "runtime error at 1:9: format width 1099511627776 too large\n");
}

#[test]
fn test_cli_argv0_is_base_name() {
    let output = run_tawk(&["BEGIN { print ARGV[0] }"], None);
    assert_eq!(stdout(&output), "tawk\n");
}

#[test]
fn test_cli_native_functions() {
    let output = run_tawk(&["BEGIN { print sum(1, 2, 3), repeat(\"ab\", 3), isodate(86400000) }"], None);
    assert_eq!(stdout(&output), "6 ababab 1970-01-02T00:00:00Z\n");
}

#[test]
fn test_cli_debug_types() {
    let output = run_tawk(&["-dt", "BEGIN { n = 1; s = \"x\"; a[1] = 2 }"], None);
    assert!(output.status.success());
    assert_eq!(stderr(&output), "global a: array\nglobal n: number\nglobal s: string\n");
}

#[test]
fn test_cli_debug_ast() {
    let output = run_tawk(&["-d", "BEGIN { print 1 + 2 }"], None);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "3\n");
    assert!(stderr(&output).starts_with("BEGIN {"), "{}", stderr(&output));
    assert!(stderr(&output).contains("print"));
}

#[test]
fn test_cli_memprofile() {
    let dir = TempDir::new().unwrap();
    let heap = dir.path().join("heap.json");
    let output = run_tawk(&["-memprofile", heap.to_str().unwrap(), "BEGIN { for (i = 0; i < 100; i++) a[i] = i }"], None);
    assert!(output.status.success(), "{}", stderr(&output));

    let text = std::fs::read_to_string(&heap).unwrap();
    for key in ["live_bytes", "live_blocks", "peak_bytes", "total_bytes", "total_blocks"] {
        assert!(text.contains(&format!("\"{}\"", key)), "missing {} in {}", key, text);
    }
    assert!(!text.contains("\"total_blocks\": 0"));
}

#[test]
fn test_cli_memprofile_written_on_failure() {
    let dir = TempDir::new().unwrap();
    let heap = dir.path().join("heap.json");
    let output = run_tawk(&["-memprofile", heap.to_str().unwrap(), "BEGIN { x = 1 % 0 }"], None);
    assert_eq!(output.status.code(), Some(1));
    assert!(heap.exists());
}

#[cfg(unix)]
#[test]
fn test_cli_cpuprofile() {
    let dir = TempDir::new().unwrap();
    let cpu = dir.path().join("cpu.pb");
    let output = run_tawk(&["-cpuprofile", cpu.to_str().unwrap(), "BEGIN { for (i = 0; i < 1000; i++) s += i; print s }"], None);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "499500\n");
    assert!(cpu.exists());
}

#[test]
fn test_cli_logging_goes_to_stderr() {
    let output = Command::new(env!("CARGO_BIN_EXE_tawk"))
        .args(["BEGIN { print \"out\" }"])
        .env("TAWK_LOG", "debug")
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("parsed program"));
}
