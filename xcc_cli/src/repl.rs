//! Interactive REPL (spec.md §4.9.1, §6.4): accumulates input lines until a
//! syntactically complete top-level item has been typed, then feeds the
//! accumulated buffer to the core driver and prints the value of a trailing
//! expression, if any.

use std::io::{self, Write};

use colored::Colorize;
use inkwell::context::Context as LlvmContext;
use log::info;

use xcc_ir::{GlobalContext, JitValue};

const BANNER: &str = "xcc REPL — /help for meta-commands, /quit to exit.";

pub fn run(emit_ir: bool) {
    println!("{BANNER}");

    let llvm_ctx = LlvmContext::create();
    let mut gctx = match GlobalContext::new(&llvm_ctx) {
        Ok(gctx) => gctx,
        Err(e) => {
            eprintln!("{} {e}", "fatal:".red().bold());
            return;
        }
    };

    let mut buffer = String::new();
    let stdin = io::stdin();

    loop {
        print_prompt(&buffer);

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break; // EOF (Ctrl-D)
        }
        let line = line.trim_end_matches('\n');

        if buffer.is_empty() {
            match line.trim() {
                "/quit" => break,
                "/help" => {
                    print_help();
                    continue;
                }
                "/list" => {
                    print_list(&gctx);
                    continue;
                }
                "" => continue,
                _ => {}
            }
        }

        buffer.push_str(line);
        buffer.push('\n');

        if !is_complete_unit(&buffer) {
            continue;
        }

        let turn = std::mem::take(&mut buffer);
        info!("REPL turn starting");
        match xcc_ir::run(&mut gctx, &turn, true, emit_ir) {
            Ok(Some(JitValue::Void)) | Ok(None) => {}
            Ok(Some(value)) => println!("{} {value}", "=>".green().bold()),
            Err(e) => eprintln!("{} {e}", "error:".red().bold()),
        }
        info!("REPL turn ended");
    }
}

fn print_prompt(buffer: &str) {
    if buffer.is_empty() {
        print!("{} ", "xcc>".cyan().bold());
    } else {
        print!("{} ", "...>".cyan());
    }
    let _ = io::stdout().flush();
}

fn print_help() {
    println!("  {}   show this message", "/help".yellow());
    println!("  {}   list currently registered functions and globals", "/list".yellow());
    println!("  {}   exit the REPL", "/quit".yellow());
}

fn print_list(gctx: &GlobalContext<'_>) {
    let mut functions = gctx.function_names();
    functions.sort_unstable();
    let mut globals = gctx.global_names();
    globals.sort_unstable();

    println!("{}", "functions:".yellow().bold());
    for name in functions {
        println!("  {name}");
    }
    println!("{}", "globals:".yellow().bold());
    for name in globals {
        println!("  {name}");
    }
}

/// Whether `buffer` is a syntactically complete top-level item: braces,
/// parens and brackets balance and the trailing non-whitespace character is
/// `;` or `}` (spec.md §4.9.1). This is a lightweight structural check, not
/// a full parse — the core driver remains the final authority and reports a
/// `ParseError` for anything this heuristic lets through too early.
fn is_complete_unit(buffer: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut in_char = false;
    let mut escaped = false;

    for ch in buffer.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string || in_char => escaped = true,
            '"' if !in_char => in_string = !in_string,
            '\'' if !in_string => in_char = !in_char,
            '{' | '(' | '[' if !in_string && !in_char => depth += 1,
            '}' | ')' | ']' if !in_string && !in_char => depth -= 1,
            _ => {}
        }
    }

    if depth > 0 || in_string || in_char {
        return false;
    }

    matches!(buffer.trim_end().chars().last(), Some(';') | Some('}'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    /// Table-driven coverage of `is_complete_unit`'s brace/bracket-depth and
    /// string/char-literal tracking (spec.md §5, the REPL's "is this turn's
    /// buffer ready to lex/parse/run yet" check).
    #[test_case("var g: i32 = 1", false; "statement missing its semicolon")]
    #[test_case("var g: i32 = 1;", true; "statement complete once semicolon typed")]
    #[test_case("fn add(a: i32, b: i32): i32 {", false; "function incomplete before closing brace")]
    #[test_case(
        "fn add(a: i32, b: i32): i32 {\n  return a + b;\n}",
        true;
        "function complete once closing brace typed"
    )]
    #[test_case("var s: i8* = \"{ ( [\";", true; "braces inside string literals do not count")]
    #[test_case("var s: i8* = \"unterminated;", false; "unterminated string never looks complete")]
    fn tracks_buffer_completeness(buffer: &str, expected: bool) {
        assert_eq!(is_complete_unit(buffer), expected);
    }
}
