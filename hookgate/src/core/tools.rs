//! Tool-argument extraction shared by the gates.

use std::path::{Component, Path, PathBuf};

use serde_json::{Map, Value};

/// Argument names under which hosts pass a tool's target path.
pub const PATH_ARGS: [&str; 5] = ["file_path", "path", "absolute_path", "notebook_path", "dir_path"];

const SHELL_TOOLS: [&str; 2] = ["Bash", "run_shell_command"];

/// Tools that start another capability by name.
const ACTIVATION_TOOLS: [&str; 4] = ["Task", "Skill", "activate_skill", "delegate_to_agent"];
const ACTIVATION_ARGS: [&str; 4] = ["subagent_type", "skill", "name", "agent_name"];

const READ_ONLY_TOOLS: [&str; 15] = [
    "Read",
    "Glob",
    "Grep",
    "WebFetch",
    "WebSearch",
    "ListMcpResourcesTool",
    "ReadMcpResourceTool",
    "TaskOutput",
    "read_file",
    "view_file",
    "list_dir",
    "find_by_name",
    "grep_search",
    "search_web",
    "read_url_content",
];
const META_TOOLS: [&str; 9] = [
    "Task",
    "Skill",
    "TodoWrite",
    "AskUserQuestion",
    "EnterPlanMode",
    "ExitPlanMode",
    "KillShell",
    "activate_skill",
    "delegate_to_agent",
];

/// Side-effect class of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    ReadOnly,
    /// Steers the agent without touching user files.
    Meta,
    Write,
}

/// Category of `tool_name`; tools not listed are assumed to write.
pub fn tool_category(tool_name: &str) -> ToolCategory {
    if READ_ONLY_TOOLS.contains(&tool_name) {
        ToolCategory::ReadOnly
    } else if META_TOOLS.contains(&tool_name) {
        ToolCategory::Meta
    } else {
        ToolCategory::Write
    }
}

/// Whether the call invokes the capability named by `keyword`.
///
/// Matches tools whose own name contains `keyword` (case-insensitive), and
/// activation tools whose target argument contains it.
pub fn invokes_capability(tool_name: &str, tool_input: &Map<String, Value>, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    if keyword.is_empty() {
        return false;
    }
    if tool_name.to_lowercase().contains(&keyword) {
        return true;
    }
    if !ACTIVATION_TOOLS.contains(&tool_name) {
        return false;
    }
    ACTIVATION_ARGS.iter().any(|arg| {
        tool_input
            .get(*arg)
            .and_then(Value::as_str)
            .is_some_and(|target| target.to_lowercase().contains(&keyword))
    })
}

/// Proposed file content carried by an editing tool call.
///
/// Multi-part edits are joined with newlines so line numbers stay meaningful
/// within each part. Returns `None` for tools that do not write text or when
/// the expected field is absent.
pub fn edited_text(tool_name: &str, tool_input: &Map<String, Value>) -> Option<String> {
    match tool_name {
        "Write" | "write_file" | "write_to_file" => string_arg(tool_input, "content"),
        "Edit" | "replace" | "replace_file_content" => string_arg(tool_input, "new_string"),
        "MultiEdit" => joined_parts(tool_input, "edits"),
        "multi_replace_file_content" => joined_parts(tool_input, "replacements"),
        "NotebookEdit" => string_arg(tool_input, "new_source"),
        _ => None,
    }
}

/// First target path found among [`PATH_ARGS`].
pub fn target_path(tool_input: &Map<String, Value>) -> Option<&str> {
    PATH_ARGS
        .iter()
        .find_map(|key| tool_input.get(*key).and_then(Value::as_str))
}

pub fn is_shell_tool(tool_name: &str) -> bool {
    SHELL_TOOLS.contains(&tool_name)
}

/// Whether `path` lies inside `dir`, compared lexically component by component.
///
/// `..` segments are resolved before comparison, so `/tmp/x/../../etc` is not
/// inside `/tmp/x`. Relative paths never match an absolute directory.
pub fn is_within(path: &Path, dir: &Path) -> bool {
    let path = lexical_normalize(path);
    let dir = lexical_normalize(dir);
    !dir.as_os_str().is_empty() && path.starts_with(&dir)
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn string_arg(tool_input: &Map<String, Value>, key: &str) -> Option<String> {
    tool_input
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(ToString::to_string)
}

fn joined_parts(tool_input: &Map<String, Value>, key: &str) -> Option<String> {
    let parts: Vec<&str> = tool_input
        .get(key)
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|part| part.get("new_string").and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn write_family_reads_content() {
        let args = input(json!({"file_path": "a.py", "content": "x = 1"}));
        for tool in ["Write", "write_file", "write_to_file"] {
            assert_eq!(edited_text(tool, &args).as_deref(), Some("x = 1"));
        }
    }

    #[test]
    fn edit_family_reads_new_string() {
        let args = input(json!({"old_string": "a", "new_string": "b"}));
        for tool in ["Edit", "replace", "replace_file_content"] {
            assert_eq!(edited_text(tool, &args).as_deref(), Some("b"));
        }
    }

    #[test]
    fn multi_part_edits_are_joined() {
        let args = input(json!({"replacements": [
            {"old_string": "o1", "new_string": "clean1"},
            {"old_string": "o2", "new_string": "clean2"}
        ]}));
        assert_eq!(
            edited_text("multi_replace_file_content", &args).as_deref(),
            Some("clean1\nclean2")
        );
        let args = input(json!({"edits": [{"new_string": "only"}]}));
        assert_eq!(edited_text("MultiEdit", &args).as_deref(), Some("only"));
        let args = input(json!({"replacements": []}));
        assert_eq!(edited_text("multi_replace_file_content", &args), None);
    }

    #[test]
    fn non_editing_tools_and_missing_fields_yield_none() {
        let args = input(json!({"file_path": "a.py"}));
        assert_eq!(edited_text("Read", &args), None);
        assert_eq!(edited_text("Bash", &args), None);
        assert_eq!(edited_text("Write", &args), None);
        let args = input(json!({"content": ""}));
        assert_eq!(edited_text("Write", &args), None);
    }

    #[test]
    fn notebook_edit_reads_new_source() {
        let args = input(json!({"notebook_path": "n.ipynb", "new_source": "print(1)"}));
        assert_eq!(edited_text("NotebookEdit", &args).as_deref(), Some("print(1)"));
        assert_eq!(target_path(&args), Some("n.ipynb"));
    }

    #[test]
    fn unknown_tools_are_treated_as_writes() {
        assert_eq!(tool_category("Read"), ToolCategory::ReadOnly);
        assert_eq!(tool_category("grep_search"), ToolCategory::ReadOnly);
        assert_eq!(tool_category("Task"), ToolCategory::Meta);
        assert_eq!(tool_category("Edit"), ToolCategory::Write);
        assert_eq!(tool_category("run_shell_command"), ToolCategory::Write);
        assert_eq!(tool_category("mcp__custom__mutate"), ToolCategory::Write);
    }

    #[test]
    fn capability_invocation_by_name_or_activation_argument() {
        assert!(invokes_capability("custodiet", &Map::new(), "custodiet"));
        assert!(invokes_capability("aops-core:Custodiet", &Map::new(), "custodiet"));
        let args = input(json!({"subagent_type": "aops-core:custodiet"}));
        assert!(invokes_capability("Task", &args, "custodiet"));
        assert!(!invokes_capability("Bash", &args, "custodiet"));
        assert!(!invokes_capability("Task", &input(json!({"skill": "critic"})), "custodiet"));
        assert!(!invokes_capability("custodiet", &Map::new(), ""));
    }

    #[test]
    fn within_is_component_wise_and_resolves_parents() {
        let dir = Path::new("/tmp/claude-hydrator");
        assert!(is_within(Path::new("/tmp/claude-hydrator/ctx.md"), dir));
        assert!(is_within(Path::new("/tmp/claude-hydrator"), dir));
        assert!(is_within(Path::new("/tmp/./claude-hydrator/a/../b.md"), dir));
        assert!(!is_within(Path::new("/tmp/claude-hydrator-evil/x"), dir));
        assert!(!is_within(Path::new("/tmp/claude-hydrator/../../etc/hosts"), dir));
        assert!(!is_within(Path::new("claude-hydrator/x"), dir));
    }
}
