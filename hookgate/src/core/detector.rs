//! Lexical detection of fallback anti-patterns in proposed edits.
//!
//! Every matcher runs on every line and every occurrence is reported, so a
//! single edit can yield several violations. Detection is line-oriented regex
//! matching; it does not parse the language.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{PatternId, Violation};

/// Rule every fallback pattern violates.
pub const FAIL_FAST_RULE: &str = "P#8";

static EXCEPT_INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(except\b[^:]*:\s*(?:pass|continue|\.\.\.))\s*(?:#.*)?$").unwrap()
});
static EXCEPT_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(except\b[^:]*:)\s*(?:#.*)?$").unwrap());
static SILENT_BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(pass|continue|\.\.\.)\s*(?:#.*)?$").unwrap());
static EMPTY_CATCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"catch\s*(?:\([^)]*\))?\s*\{\s*\}").unwrap());
static ENV_DEFAULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"os\.(?:getenv|environ\.get)\(\s*[^,()]+?\s*,\s*([^()]+?)\s*\)").unwrap()
});
static ENV_UNWRAP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"env::var(?:_os)?\([^)]*\)\s*\.unwrap_or(?:_else|_default)?\(").unwrap()
});
static LOOKUP_DEFAULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w+)\.get\(\s*[^,()]+?\s*,\s*([^()]+?)\s*\)").unwrap()
});
static LOOKUP_UNWRAP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.get\([^)]*\)\s*\.unwrap_or(?:_else|_default)?\(").unwrap()
});
static OR_LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:\bor\s+|\|\|\s*)(?:"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|-?\d+(?:\.\d+)?\b|\[\s*\]|\{\s*\})"#,
    )
    .unwrap()
});

/// A keyword argument (`timeout=30`), not a positional default.
static KEYWORD_ARG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+\s*=(?:[^=]|$)").unwrap());

/// Lookup defaults that carry no invented value.
const TRIVIAL_DEFAULTS: [&str; 5] = ["None", "False", "0", "[]", "{}"];

/// Scan `text` and return every fallback occurrence, ordered by line.
pub fn detect(text: &str) -> Vec<Violation> {
    let lines: Vec<&str> = text.lines().collect();
    let mut found = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if is_comment_only(line) {
            continue;
        }
        let line_no = idx + 1;
        let mut on_line: Vec<(usize, PatternId, String)> = Vec::new();

        if let Some(m) = EXCEPT_INLINE_RE.captures(line).and_then(|caps| caps.get(1)) {
            on_line.push((m.start(), PatternId::SilentExcept, m.as_str().to_string()));
        } else if let Some(head) = EXCEPT_HEAD_RE.captures(line).and_then(|caps| caps.get(1)) {
            if let Some(body) = next_significant(&lines, idx + 1)
                && SILENT_BODY_RE.is_match(body)
            {
                let snippet = format!("{} {}", head.as_str(), body.trim());
                on_line.push((head.start(), PatternId::SilentExcept, snippet));
            }
        }
        for m in EMPTY_CATCH_RE.find_iter(line) {
            on_line.push((m.start(), PatternId::SilentExcept, m.as_str().to_string()));
        }

        for caps in ENV_DEFAULT_RE.captures_iter(line) {
            let (Some(whole), Some(default)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if default.as_str().trim() != "None" {
                on_line.push((whole.start(), PatternId::EnvDefault, whole.as_str().to_string()));
            }
        }
        for m in ENV_UNWRAP_RE.find_iter(line) {
            on_line.push((m.start(), PatternId::EnvDefault, m.as_str().to_string()));
        }

        for caps in LOOKUP_DEFAULT_RE.captures_iter(line) {
            let (Some(whole), Some(receiver), Some(default)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if receiver.as_str() != "environ"
                && !is_trivial_default(default.as_str())
                && !KEYWORD_ARG_RE.is_match(default.as_str())
            {
                on_line.push((
                    whole.start(),
                    PatternId::LookupDefault,
                    whole.as_str().to_string(),
                ));
            }
        }
        for m in LOOKUP_UNWRAP_RE.find_iter(line) {
            on_line.push((m.start(), PatternId::LookupDefault, m.as_str().to_string()));
        }

        for m in OR_LITERAL_RE.find_iter(line) {
            if m.as_str().starts_with("||") && !has_left_operand(&line[..m.start()]) {
                continue;
            }
            on_line.push((m.start(), PatternId::OrFallback, m.as_str().to_string()));
        }

        on_line.sort_by_key(|(column, _, _)| *column);
        found.extend(
            on_line
                .into_iter()
                .map(|(_, pattern, snippet)| violation(pattern, line_no, snippet)),
        );
    }

    found
}

fn violation(pattern: PatternId, line: usize, snippet: String) -> Violation {
    Violation {
        pattern,
        rule: FAIL_FAST_RULE,
        message: format!("{}: `{}` ({})", describe(pattern), snippet, pattern),
        line,
        snippet,
    }
}

fn describe(pattern: PatternId) -> &'static str {
    match pattern {
        PatternId::SilentExcept => "exception silently swallowed",
        PatternId::EnvDefault => "environment variable read with a default value",
        PatternId::LookupDefault => "lookup falls back to an invented default",
        PatternId::OrFallback => "missing value replaced by a literal fallback",
    }
}

fn is_comment_only(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') || trimmed.starts_with("//")
}

fn next_significant<'a>(lines: &[&'a str], from: usize) -> Option<&'a str> {
    lines
        .iter()
        .skip(from)
        .find(|line| !line.trim().is_empty() && !is_comment_only(line))
        .copied()
}

/// `||` after an operand is a logical or; elsewhere it opens a closure
/// (`.map(|| 0)`, `let f = || 0`, `move || 0`).
fn has_left_operand(before: &str) -> bool {
    let before = before.trim_end();
    let Some(last) = before.chars().last() else {
        return false;
    };
    if "(,|={[;:>!&".contains(last) {
        return false;
    }
    let word = before
        .rsplit(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();
    !matches!(word, "move" | "return")
}

fn is_trivial_default(default: &str) -> bool {
    let compact: String = default.split_whitespace().collect();
    TRIVIAL_DEFAULTS.contains(&compact.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(text: &str) -> Vec<PatternId> {
        detect(text).into_iter().map(|v| v.pattern).collect()
    }

    #[test]
    fn except_continue_forms_are_single_violations() {
        let cases = [
            "try:\n    z()\nexcept: continue",
            "for item in items:\n    try:\n        process(item)\n    except ValueError:\n        continue",
            "try:\n    do_work()\nexcept:\n    continue",
        ];
        for code in cases {
            assert_eq!(patterns(code), vec![PatternId::SilentExcept], "{code}");
        }
    }

    #[test]
    fn except_pass_forms_are_single_violations() {
        let cases = [
            "try:\n    z()\nexcept:\n    pass",
            "try:\n    z()\nexcept Exception:\n    pass",
            "def process():\n    for item in items:\n        try:\n            result = do_something(item)\n        except Exception:\n            pass",
        ];
        for code in cases {
            let found = detect(code);
            assert_eq!(found.len(), 1, "{code}");
            assert_eq!(found[0].pattern, PatternId::SilentExcept);
            assert_eq!(found[0].rule, "P#8");
        }
    }

    #[test]
    fn handled_except_is_clean() {
        let code = "try:\n    z()\nexcept ValueError as err:\n    raise RuntimeError('bad') from err";
        assert!(detect(code).is_empty());
    }

    #[test]
    fn empty_catch_block_is_flagged() {
        assert_eq!(
            patterns("try { run(); } catch (e) {}"),
            vec![PatternId::SilentExcept]
        );
    }

    #[test]
    fn env_defaults_are_flagged() {
        assert!(patterns(r#"path = os.getenv("HOME", "/root")"#).contains(&PatternId::EnvDefault));
        assert_eq!(
            patterns(r#"path = os.environ.get("PATH", "/usr/bin")"#),
            vec![PatternId::EnvDefault]
        );
        assert_eq!(
            patterns(r#"let home = std::env::var("HOME").unwrap_or_else(|_| "/root".into());"#),
            vec![PatternId::EnvDefault]
        );
    }

    #[test]
    fn env_violation_reports_its_line() {
        let code = "line1\nline2\npath = os.environ.get(\"X\", \"/bad\")\nline4\n";
        let env = detect(code)
            .into_iter()
            .find(|v| v.pattern == PatternId::EnvDefault)
            .expect("env violation");
        assert_eq!(env.line, 3);
        assert!(env.message.contains(r#"os.environ.get("X", "/bad")"#));
    }

    #[test]
    fn trivial_lookup_defaults_are_allowed() {
        for code in [
            r#"items = config.get("items", [])"#,
            r#"settings = config.get("settings", {})"#,
            r#"enabled = config.get("enabled", False)"#,
            r#"count = config.get("count", 0)"#,
            r#"value = config.get("key", None)"#,
        ] {
            assert!(detect(code).is_empty(), "{code}");
        }
    }

    #[test]
    fn meaningful_lookup_default_is_flagged() {
        assert_eq!(
            patterns(r#"timeout = config.get("timeout", 30)"#),
            vec![PatternId::LookupDefault]
        );
        assert_eq!(
            patterns("let port = ports.get(&name).unwrap_or(&8080);"),
            vec![PatternId::LookupDefault]
        );
    }

    #[test]
    fn or_literal_fallbacks_are_flagged() {
        assert_eq!(
            patterns(r#"name = user_name or "Anonymous""#),
            vec![PatternId::OrFallback]
        );
        assert_eq!(
            patterns("path = custom_path or '/tmp'"),
            vec![PatternId::OrFallback]
        );
        assert_eq!(
            patterns("const label = input || 'unknown';"),
            vec![PatternId::OrFallback]
        );
    }

    #[test]
    fn keyword_arguments_are_not_lookup_defaults() {
        for code in [
            "resp = requests.get(url, timeout=30)",
            "resp = session.get(url, headers=headers)",
            "resp = client.get(url, verify = False)",
        ] {
            assert!(detect(code).is_empty(), "{code}");
        }
        assert_eq!(
            patterns(r#"mode = opts.get("mode", flag == "x")"#),
            vec![PatternId::LookupDefault]
        );
    }

    #[test]
    fn zero_argument_closures_are_not_or_fallbacks() {
        for code in [
            "let counts = keys.iter().map(|| 0);",
            "let zero = || 0;",
            "spawn(move || 1);",
            "items.forEach(x => x, || 'a');",
        ] {
            assert!(detect(code).is_empty(), "{code}");
        }
        assert_eq!(patterns("let n = count || 0;"), vec![PatternId::OrFallback]);
    }

    #[test]
    fn multiple_patterns_on_one_line_are_all_reported() {
        let found = detect(r#"a = os.getenv("X", "/bad"); b = conf.get("y", 99)"#);
        let got: Vec<(usize, PatternId)> = found.iter().map(|v| (v.line, v.pattern)).collect();
        assert_eq!(got, vec![(1, PatternId::EnvDefault), (1, PatternId::LookupDefault)]);
    }

    #[test]
    fn all_four_patterns_in_one_input() {
        let code = "def load(cfg):\n    try:\n        warm()\n    except Exception:\n        pass\n    home = os.getenv(\"HOME\", \"/root\")\n    port = cfg.get(\"port\", 8080)\n    name = cfg.name or \"main\"\n";
        let got: Vec<(usize, PatternId)> = detect(code).iter().map(|v| (v.line, v.pattern)).collect();
        assert_eq!(
            got,
            vec![
                (4, PatternId::SilentExcept),
                (6, PatternId::EnvDefault),
                (7, PatternId::LookupDefault),
                (8, PatternId::OrFallback),
            ]
        );
    }

    #[test]
    fn empty_and_clean_inputs_have_no_violations() {
        assert!(detect("").is_empty());
        assert!(detect("   \n\t\n  ").is_empty());
        assert!(detect("def f():\n    value = os.environ[\"REQUIRED_VAR\"]  # fail-fast\n    return value\n").is_empty());
        assert!(detect("def get_config():\n    return os.environ[\"REQUIRED_VAR\"]\n").is_empty());
    }

    #[test]
    fn comment_lines_are_ignored() {
        let code = "# name = user or \"x\"\n// let v = cfg.get(&k).unwrap_or(&1);\nx = 1";
        assert!(detect(code).is_empty());
    }
}
