//! Tool descriptors advertised by `tools/list`.

use mcp_types::Tool;
use mcp_types::ToolInputSchema;
use serde_json::json;

fn tool(name: &str, description: &str, schema: ToolInputSchema) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: schema,
    }
}

fn object_schema(properties: serde_json::Value, required: &[&str]) -> ToolInputSchema {
    ToolInputSchema {
        r#type: "object".to_string(),
        properties: Some(properties),
        required: if required.is_empty() {
            None
        } else {
            Some(required.iter().map(|name| (*name).to_string()).collect())
        },
    }
}

pub(crate) fn all_tools() -> Vec<Tool> {
    let cwd = json!({
        "type": "string",
        "description": "Project directory; defaults to the server's project root.",
    });
    let extra_args = json!({
        "type": "array",
        "items": {"type": "string"},
        "description": "Extra arguments appended to the script invocation.",
    });

    vec![
        tool(
            "run_tests",
            "Run the project's test script in the foreground and return its output.",
            object_schema(json!({"cwd": cwd, "args": extra_args}), &[]),
        ),
        tool(
            "build_project",
            "Run the project's build script in the foreground and return its output.",
            object_schema(json!({"cwd": cwd, "args": extra_args}), &[]),
        ),
        tool(
            "install_dependencies",
            "Install dependencies with the project's package manager, either the whole \
             manifest or named packages.",
            object_schema(
                json!({
                    "cwd": cwd,
                    "packages": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Packages to add; installs the whole manifest when omitted.",
                    },
                    "dev": {
                        "type": "boolean",
                        "description": "Add named packages as dev dependencies.",
                    },
                }),
                &[],
            ),
        ),
        tool(
            "run_script",
            "Run a package.json script. Long-running scripts (dev servers, watchers) are \
             detached automatically unless `background` overrides the heuristic.",
            object_schema(
                json!({
                    "script": {"type": "string", "description": "Script name from package.json."},
                    "args": extra_args,
                    "cwd": cwd,
                    "background": {
                        "type": "boolean",
                        "description": "Force background (true) or foreground (false) execution.",
                    },
                    "timeout_ms": {
                        "type": "number",
                        "description": "Foreground timeout in milliseconds (1000-300000).",
                    },
                }),
                &["script"],
            ),
        ),
        tool(
            "list_tasks",
            "List all background tasks, newest first, with status and a tail preview.",
            object_schema(json!({}), &[]),
        ),
        tool(
            "task_output",
            "Read the most recent output lines of a background task.",
            object_schema(
                json!({
                    "task_id": {"type": "string", "description": "Id returned when the task started."},
                    "lines": {
                        "type": "number",
                        "description": "How many lines of the tail to return (max 100, default 50).",
                    },
                }),
                &["task_id"],
            ),
        ),
        tool(
            "stop_task",
            "Stop a background task: graceful termination with forced-kill escalation, or \
             an immediate kill with `force`.",
            object_schema(
                json!({
                    "task_id": {"type": "string", "description": "Id returned when the task started."},
                    "force": {"type": "boolean", "description": "Kill immediately instead of gracefully."},
                }),
                &["task_id"],
            ),
        ),
    ]
}
