//! Sandboxed code tool: code_runner
//!
//! Runs a Python snippet in a separate interpreter process:
//!
//! - isolated mode (`-I`) with a cleared environment
//! - a throwaway working directory, removed afterwards
//! - a checked source, restricted builtins and an import allowlist,
//!   enforced by a prelude (see [`PRELUDE`])
//! - a hard timeout; the child is killed when the call is dropped
//! - stdout/stderr capped before they reach the model

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use aion_domain::util::cap_with_marker;
use aion_domain::{
    ArgumentsExt, ToolArguments, ToolContext, ToolContract, ToolDefinition, ToolError,
    ToolParameter,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, warn};

/// Tool name constant
pub const CODE_RUNNER: &str = "code_runner";

/// Default timeout for snippet execution (10 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on captured stdout/stderr (64 KB each)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Modules a snippet may import.
pub const ALLOWED_MODULES: &[&str] = &[
    "collections",
    "datetime",
    "itertools",
    "json",
    "math",
    "re",
];

/// Runs the snippet under three restrictions:
///
/// - the source is checked before it runs: no `_`-prefixed or frame/code
///   attributes (`x._sys`, `g.gi_frame`), no dunder names except
///   `__name__`, and imports only of allowlisted public modules
/// - the snippet gets its own builtins without `open`, `eval`, `getattr` and
///   friends; its `__import__` enforces the allowlist again at run time
/// - imported modules are handed over as views holding only public
///   attributes, with submodules outside the allowlist left out
///
/// `_strptime` is imported lazily by `datetime.strptime` through the
/// snippet's builtins and is let through as-is.
const PRELUDE: &str = r#"
import ast, builtins, sys, types
_allowed = frozenset(sys.argv[2].split(","))
_internal = frozenset({"_strptime"})
_inspect = frozenset({
    "gi_frame", "gi_code", "gi_yieldfrom", "cr_frame", "cr_code", "cr_await",
    "ag_frame", "ag_code", "ag_await", "f_back", "f_builtins", "f_code",
    "f_globals", "f_locals", "f_trace", "tb_frame", "tb_next", "co_code",
})
_blocked = frozenset({
    "open", "input", "breakpoint", "help", "exit", "quit", "eval", "exec",
    "compile", "globals", "locals", "vars", "getattr", "setattr", "delattr",
    "copyright", "credits", "license",
})

class SandboxViolation(Exception):
    pass

def _module_allowed(name):
    parts = name.split(".")
    return parts[0] in _allowed and not any(p.startswith("_") for p in parts)

def _check_attr(attr):
    if attr.startswith("_") or attr in _inspect:
        raise SandboxViolation("access to attribute '%s' is not allowed" % attr)

def _check(tree):
    for node in ast.walk(tree):
        if isinstance(node, ast.Attribute):
            _check_attr(node.attr)
        elif isinstance(node, ast.MatchClass):
            for attr in node.kwd_attrs:
                _check_attr(attr)
        elif isinstance(node, ast.Name):
            if node.id.startswith("__") and node.id != "__name__":
                raise SandboxViolation("use of name '%s' is not allowed" % node.id)
        elif isinstance(node, ast.Import):
            for alias in node.names:
                if not _module_allowed(alias.name):
                    raise ImportError("import of '%s' is not allowed" % alias.name)
        elif isinstance(node, ast.ImportFrom):
            module = node.module or ""
            if node.level or not _module_allowed(module):
                raise ImportError("import of '%s' is not allowed" % ("." * node.level + module))
            for alias in node.names:
                if alias.name != "*" and alias.name.startswith("_"):
                    raise ImportError("import of '%s.%s' is not allowed" % (module, alias.name))

def _view(module, seen):
    if id(module) in seen:
        return seen[id(module)]
    view = types.ModuleType(module.__name__, module.__doc__)
    seen[id(module)] = view
    for attr, value in list(vars(module).items()):
        if attr.startswith("_"):
            continue
        if isinstance(value, types.ModuleType):
            if value.__name__.split(".")[0] not in _allowed:
                continue
            value = _view(value, seen)
        setattr(view, attr, value)
    return view

_real_import = builtins.__import__

def _guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
    if level == 0 and name in _internal:
        return _real_import(name)
    if level != 0 or not _module_allowed(name):
        raise ImportError("import of '%s' is not allowed" % name)
    return _view(_real_import(name, None, None, fromlist, 0), {})

_builtins = {
    name: getattr(builtins, name)
    for name in dir(builtins)
    if not name.startswith("_") and name not in _blocked
}
_builtins["__build_class__"] = builtins.__build_class__
_builtins["__import__"] = _guarded_import
_builtins["__name__"] = "builtins"

with open(sys.argv[1], encoding="utf-8") as _f:
    _tree = ast.parse(_f.read(), "<snippet>")
_check(_tree)
exec(compile(_tree, "<snippet>", "exec"), {"__name__": "__main__", "__builtins__": _builtins})
"#;

pub struct CodeRunner {
    definition: ToolDefinition,
    interpreter: String,
    timeout: Duration,
    max_output_bytes: usize,
}

impl CodeRunner {
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new(
                CODE_RUNNER,
                format!(
                    "Execute a Python snippet in a sandbox and return its output. Use print() \
                     to produce output. No file system or network access; imports limited to: {}. \
                     Time limit {} seconds.",
                    ALLOWED_MODULES.join(", "),
                    DEFAULT_TIMEOUT.as_secs()
                ),
            )
            .with_parameter(ToolParameter::new(
                "code",
                "Python code to execute",
                true,
            )),
            interpreter: "python3".to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    fn command(&self, script: &Path, workdir: &Path) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-I")
            .arg("-c")
            .arg(PRELUDE)
            .arg(script)
            .arg(ALLOWED_MODULES.join(","))
            .current_dir(workdir)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Interpreter lookup only; nothing else from the parent environment.
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }
        cmd
    }
}

impl Default for CodeRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolContract for CodeRunner {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Slightly above the runner's own limit so the child is reaped here.
    fn default_timeout(&self) -> Duration {
        self.timeout + Duration::from_secs(2)
    }

    async fn execute(&self, args: &ToolArguments, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let code = args
            .require_string("code")
            .map_err(ToolError::invalid_argument)?;

        let workdir = tempfile::tempdir().map_err(|e| {
            ToolError::execution(format!("Failed to create sandbox directory: {}", e))
        })?;
        let script = workdir.path().join("snippet.py");
        tokio::fs::write(&script, code)
            .await
            .map_err(|e| ToolError::execution(format!("Failed to write snippet: {}", e)))?;

        debug!(code_len = code.len(), interpreter = %self.interpreter, "Running snippet");

        let child = self
            .command(&script, workdir.path())
            .spawn()
            .map_err(|e| ToolError::execution(format!("Failed to start interpreter: {}", e)))?;

        // Dropping the future on timeout kills the child (kill_on_drop).
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::execution(format!("Interpreter failed: {}", e)));
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Snippet timed out");
                return Err(ToolError::timeout(CODE_RUNNER, self.timeout));
            }
        };

        let stdout = cap_with_marker(
            &String::from_utf8_lossy(&output.stdout),
            self.max_output_bytes,
        );
        let stderr = cap_with_marker(
            &String::from_utf8_lossy(&output.stderr),
            self.max_output_bytes,
        );
        let exit_code = output.status.code().unwrap_or(-1);

        let payload = json!({
            "success": output.status.success(),
            "exit_code": exit_code,
            "output": stdout,
            "error": if stderr.is_empty() { Value::Null } else { json!(stderr) },
        });

        if output.status.success() {
            Ok(payload)
        } else {
            Err(ToolError::execution_with_payload(
                format!("Snippet exited with status {}", exit_code),
                payload,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    async fn run(runner: &CodeRunner, code: &str) -> Result<Value, ToolError> {
        let args: ToolArguments = [("code".to_string(), json!(code))].into();
        runner.execute(&args, &ToolContext::default()).await
    }

    #[tokio::test]
    async fn test_prints_are_captured() {
        if !python_available() {
            return;
        }
        let out = run(&CodeRunner::new(), "import math\nprint(sum(range(10)), math.floor(2.7))")
            .await
            .unwrap();
        assert_eq!(out["success"], json!(true));
        assert_eq!(out["output"], json!("45 2\n"));
        assert_eq!(out["error"], Value::Null);
    }

    #[tokio::test]
    async fn test_disallowed_import_fails_with_payload() {
        if !python_available() {
            return;
        }
        let err = run(&CodeRunner::new(), "import os\nprint(os.listdir('/'))")
            .await
            .unwrap_err();
        match err {
            ToolError::Execution { payload: Some(payload), .. } => {
                assert_eq!(payload["success"], json!(false));
                assert!(payload["error"]
                    .as_str()
                    .is_some_and(|e| e.contains("import of 'os' is not allowed")));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dunder_import_is_also_guarded() {
        if !python_available() {
            return;
        }
        let err = run(&CodeRunner::new(), "__import__('subprocess')").await.unwrap_err();
        assert_eq!(err.code(), "EXECUTION_FAILED");
    }

    async fn violation(code: &str) -> String {
        match run(&CodeRunner::new(), code).await.unwrap_err() {
            ToolError::Execution { payload: Some(payload), .. } => {
                payload["error"].as_str().unwrap_or_default().to_string()
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_import_with_forged_globals_is_rejected() {
        if !python_available() {
            return;
        }
        let stderr = violation(
            "os = __import__('os', {'__name__': 'x'})\nprint(os.getpid())",
        )
        .await;
        assert!(stderr.contains("use of name '__import__' is not allowed"));
    }

    #[tokio::test]
    async fn test_private_module_attributes_are_hidden() {
        if !python_available() {
            return;
        }
        let stderr = violation(
            "import collections\nprint(collections._sys.modules['os'].name)",
        )
        .await;
        assert!(stderr.contains("access to attribute '_sys' is not allowed"));
    }

    #[tokio::test]
    async fn test_submodules_outside_allowlist_are_hidden() {
        if !python_available() {
            return;
        }
        let stderr = violation("import re\nprint(re.enum.sys.modules['os'].name)").await;
        assert!(stderr.contains("has no attribute 'enum'"));
    }

    #[tokio::test]
    async fn test_frame_walking_is_rejected() {
        if !python_available() {
            return;
        }
        let stderr = violation(
            "def walk():\n    yield me.gi_frame.f_back\nme = walk()\nprint(next(me))",
        )
        .await;
        assert!(stderr.contains("access to attribute 'f_back' is not allowed"));
    }

    #[tokio::test]
    async fn test_private_from_import_is_rejected() {
        if !python_available() {
            return;
        }
        let stderr = violation("from collections import _sys").await;
        assert!(stderr.contains("import of 'collections._sys' is not allowed"));
    }

    #[tokio::test]
    async fn test_ordinary_python_still_runs() {
        if !python_available() {
            return;
        }
        let out = run(
            &CodeRunner::new(),
            "from collections import Counter\nimport json\n\n\
             class Point:\n    def __init__(self, x):\n        self.x = x\n\n\
             if __name__ == '__main__':\n\
             \x20   counts = Counter('abca')\n\
             \x20   print(sum(Point(i).x for i in range(4)), json.dumps(counts['a']))",
        )
        .await
        .unwrap();
        assert_eq!(out["output"], json!("6 2\n"));
    }

    #[tokio::test]
    async fn test_open_is_removed() {
        if !python_available() {
            return;
        }
        let err = run(&CodeRunner::new(), "open('/etc/passwd').read()").await.unwrap_err();
        assert_eq!(err.code(), "EXECUTION_FAILED");
    }

    #[tokio::test]
    async fn test_stdlib_lazy_imports_still_work() {
        if !python_available() {
            return;
        }
        let out = run(
            &CodeRunner::new(),
            "import datetime, json\nprint(json.dumps(datetime.datetime.strptime('2024-01-02', '%Y-%m-%d').day))",
        )
        .await
        .unwrap();
        assert_eq!(out["output"], json!("2\n"));
    }

    #[tokio::test]
    async fn test_timeout_kills_snippet() {
        if !python_available() {
            return;
        }
        let runner = CodeRunner::new().with_timeout(Duration::from_millis(300));
        let err = run(&runner, "while True:\n    pass").await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_ms: 300, .. }));
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        if !python_available() {
            return;
        }
        let runner = CodeRunner::new().with_max_output_bytes(16);
        let out = run(&runner, "print('x' * 1000)").await.unwrap();
        let text = out["output"].as_str().unwrap();
        assert!(text.starts_with("xxxxxxxxxxxxxxxx\n...[truncated"));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_execution_error() {
        let runner = CodeRunner::new().with_interpreter("definitely-not-a-python-binary");
        let err = run(&runner, "print(1)").await.unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }

    #[test]
    fn test_runner_timeout_is_inside_dispatch_timeout() {
        let runner = CodeRunner::new();
        assert!(runner.default_timeout() > DEFAULT_TIMEOUT);
    }
}
