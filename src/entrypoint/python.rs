use crate::entrypoint::{WrapperExit, SCRIPT_FILE};
use std::path::Path;

/// Wrapper program template. Exit statuses are substituted from [`WrapperExit`]
/// so the Rust side and the generated program can never disagree.
const WRAPPER_TEMPLATE: &str = r#"import json
import os
import sys
import traceback

EXIT_LOAD_FAILED = @EXIT_LOAD_FAILED@
EXIT_MISSING_ENTRY_POINT = @EXIT_MISSING_ENTRY_POINT@
EXIT_INVOCATION_FAILED = @EXIT_INVOCATION_FAILED@
EXIT_NOT_SERIALIZABLE = @EXIT_NOT_SERIALIZABLE@


def _fail(message, status, with_trace):
    sys.stderr.write("ERROR: " + message + "\n")
    if with_trace:
        traceback.print_exc(file=sys.stderr)
    sys.stdout.flush()
    sys.stderr.flush()
    sys.exit(status)


_script_path = os.path.join(os.path.dirname(os.path.abspath(__file__)), "@SCRIPT_FILE@")
_namespace = {"__name__": "__main__", "__file__": _script_path}

try:
    with open(_script_path, "r", encoding="utf-8") as _handle:
        _source = _handle.read()
    exec(compile(_source, _script_path, "exec"), _namespace)
except Exception as _exc:
    _fail(str(_exc), EXIT_LOAD_FAILED, True)

_entry = _namespace.get("main")
if _entry is None or not callable(_entry):
    _fail("No main() function found", EXIT_MISSING_ENTRY_POINT, False)

try:
    _result = _entry()
except Exception as _exc:
    _fail(str(_exc), EXIT_INVOCATION_FAILED, True)

try:
    _payload = json.dumps(_result, allow_nan=False)
except (TypeError, ValueError, OverflowError, RecursionError):
    _fail("main() function must return JSON serializable data", EXIT_NOT_SERIALIZABLE, False)

sys.stdout.write(_payload)
sys.stdout.flush()
sys.exit(0)
"#;

/// Render the wrapper program source
pub fn render_wrapper() -> String {
    WRAPPER_TEMPLATE
        .replace("@EXIT_LOAD_FAILED@", &WrapperExit::LoadFailed.code().to_string())
        .replace(
            "@EXIT_MISSING_ENTRY_POINT@",
            &WrapperExit::MissingEntryPoint.code().to_string(),
        )
        .replace(
            "@EXIT_INVOCATION_FAILED@",
            &WrapperExit::InvocationFailed.code().to_string(),
        )
        .replace(
            "@EXIT_NOT_SERIALIZABLE@",
            &WrapperExit::NotSerializable.code().to_string(),
        )
        .replace("@SCRIPT_FILE@", SCRIPT_FILE)
}

/// Command executed inside the jail: the runtime against the wrapper file
pub fn run_command(runtime_binary: &Path, wrapper_path: &Path) -> Vec<String> {
    vec![
        runtime_binary.to_string_lossy().to_string(),
        "-B".to_string(),
        wrapper_path.to_string_lossy().to_string(),
    ]
}
