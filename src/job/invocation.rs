use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::error::Result;
use crate::job::target::Target;
use crate::job::task::{argument_field, diary_file, output_file};
use crate::shell;

/// Default per-task command line, see `data/templates/invocation.txt`
pub static DEFAULT_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/invocation.txt"));

/// Name of the arguments artifact in the workspace
pub static ARGUMENTS_FILE: &str = "arguments.json";

/// Rendering context for one task's invocation
///
/// Everything except `runtime` is shell-quoted before rendering. `runtime` is the command that
/// runs the target on the execution host and comes from configuration, so it's used verbatim.
#[derive(Serialize)]
struct InvocationContext {
    workspace: String,
    runtime: String,
    function: String,
    arguments: String,
    field: String,
    diary: String,
    output: Option<String>,
}

/// Renders the shell command that runs one task inside the workspace
///
/// The command loads only the task's slice of the arguments artifact, calls the target with it,
/// writes the return values to the task's output file when the target has any, and sends all of
/// its diagnostics to the task's diary.
pub struct Invocation<'a> {
    tt: TinyTemplate<'a>,
    runtime: &'a str,
}

impl<'a> Invocation<'a> {
    pub fn new(template: &'a str, runtime: &'a str) -> Result<Self> {
        let mut tt = TinyTemplate::new();
        tt.set_default_formatter(&format_unescaped);
        tt.add_template("invocation", template)?;
        Ok(Invocation { tt, runtime })
    }

    pub fn render(&self, workspace: &str, target: &Target, index: usize) -> Result<String> {
        let context = InvocationContext {
            workspace: shell::quote(workspace),
            runtime: self.runtime.to_string(),
            function: shell::quote(&target.function),
            arguments: shell::quote(ARGUMENTS_FILE),
            field: shell::quote(&argument_field(index)),
            diary: shell::quote(&diary_file(index)),
            output: target.produces_output.then(|| shell::quote(&output_file(index))),
        };
        Ok(self.tt.render("invocation", &context)?.trim().to_string())
    }
}
