/*!
Subcommand modules.

  serve.rs   (ServeArgs + execute_serve)  MCP server on stdio (default)
  list.rs    (ListArgs  + execute_list)   registered operations
  exec.rs    (ExecArgs  + execute_exec)   invoke one operation directly
  shared.rs  wiring, parameter collection and coercion

Conventions:
  - Each subcommand module exposes exactly one public `execute_*` function
    that returns `anyhow::Result<()>`.
  - Argument structs derive `clap::Args` and are kept minimal.
*/

pub mod exec;
pub mod list;
pub mod serve;
pub mod shared;

pub use exec::{ExecArgs, execute_exec};
pub use list::{ListArgs, execute_list};
pub use serve::{ServeArgs, execute_serve};
