//! Dispatcher: the single place where operation failures become envelopes.

use std::any::Any;
use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::registry::{JsonObject, OperationInfo, Registry};
use crate::azure::AzureCli;

/// Transport-facing result of every invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub is_error: bool,
    pub payload: Value,
}

impl ResponseEnvelope {
    pub fn success(payload: Value) -> Self {
        Self {
            is_error: false,
            payload,
        }
    }

    /// `{ success: false, error, detail }`; `detail` is the full cause chain.
    pub fn failure(err: &anyhow::Error) -> Self {
        Self {
            is_error: true,
            payload: json!({
                "success": false,
                "error": err.to_string(),
                "detail": format!("{err:#}"),
            }),
        }
    }

    /// Pretty JSON of the payload (what the MCP text content carries).
    pub fn payload_text(&self) -> String {
        serde_json::to_string_pretty(&self.payload).unwrap_or_else(|_| self.payload.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    cli: Arc<AzureCli>,
}

impl Dispatcher {
    pub fn new(registry: Registry, cli: AzureCli) -> Self {
        Self {
            registry: Arc::new(registry),
            cli: Arc::new(cli),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn list_operations(&self) -> Vec<OperationInfo> {
        self.registry.iter().map(|op| op.info()).collect()
    }

    /// Route `name` to its handler. Always yields an envelope: unknown names,
    /// handler errors and handler panics all come back with `is_error`.
    pub async fn invoke(&self, name: &str, arguments: Option<JsonObject>) -> ResponseEnvelope {
        let op = match self.registry.lookup(name) {
            Ok(op) => op,
            Err(e) => {
                warn!(operation = name, "unknown operation");
                return ResponseEnvelope::failure(&anyhow::Error::new(e));
            }
        };

        info!(operation = name, "invoking");
        let task = tokio::spawn((op.handler)(
            Arc::clone(&self.cli),
            arguments.unwrap_or_default(),
        ));

        match task.await {
            Ok(Ok(payload)) => {
                debug!(operation = name, "completed");
                ResponseEnvelope::success(payload)
            }
            Ok(Err(err)) => {
                warn!(operation = name, error = %format!("{err:#}"), "operation failed");
                ResponseEnvelope::failure(&err)
            }
            Err(join) => {
                let err = if join.is_panic() {
                    anyhow!(
                        "operation '{name}' panicked: {}",
                        panic_message(join.into_panic())
                    )
                } else {
                    anyhow!("operation '{name}' was cancelled")
                };
                warn!(operation = name, error = %err, "operation aborted");
                ResponseEnvelope::failure(&err)
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::{DEFAULT_MAX_OUTPUT, Locator};
    use crate::ops::registry::{HandlerFuture, InputShape, OperationDescriptor, boxed};

    fn echo_version(cli: Arc<AzureCli>, _: JsonObject) -> HandlerFuture {
        boxed(async move {
            let res = cli.execute(["version_flag"]).await?.into_success()?;
            Ok(res.structured_data.unwrap_or(Value::Null))
        })
    }

    fn echo_args(_: Arc<AzureCli>, args: JsonObject) -> HandlerFuture {
        boxed(async move { Ok(Value::Object(args)) })
    }

    fn explode(_: Arc<AzureCli>, _: JsonObject) -> HandlerFuture {
        boxed(async move {
            let missing: Option<Value> = None;
            Ok(missing.expect("handler bug"))
        })
    }

    fn dispatcher(locator: Locator) -> Dispatcher {
        let registry = Registry::with_operations([
            OperationDescriptor::new("echo_version", "az version", InputShape::empty(), echo_version),
            OperationDescriptor::new("echo_args", "echo", InputShape::empty(), echo_args),
            OperationDescriptor::new("explode", "panics", InputShape::empty(), explode),
        ])
        .unwrap();
        Dispatcher::new(registry, AzureCli::new(locator, DEFAULT_MAX_OUTPUT))
    }

    fn absent() -> Locator {
        Locator::new(vec!["/nonexistent/azure-cli-mcp/az".into()], None)
    }

    #[tokio::test]
    async fn unknown_operation_is_an_error_envelope() {
        let env = dispatcher(absent()).invoke("nonexistent_op", None).await;
        assert!(env.is_error);
        assert_eq!(env.payload["error"], "Unknown tool: nonexistent_op");
        assert_eq!(env.payload["success"], false);
    }

    #[tokio::test]
    async fn arguments_pass_through_unmodified() {
        let mut args = JsonObject::new();
        args.insert("anything".into(), json!([1, "two"]));
        let env = dispatcher(absent()).invoke("echo_args", Some(args)).await;
        assert!(!env.is_error);
        assert_eq!(env.payload, json!({"anything": [1, "two"]}));
    }

    #[tokio::test]
    async fn missing_executable_is_contained() {
        let env = dispatcher(absent()).invoke("echo_version", None).await;
        assert!(env.is_error);
        assert!(
            env.payload["error"]
                .as_str()
                .unwrap()
                .contains("Azure CLI not found")
        );
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let env = dispatcher(absent()).invoke("explode", None).await;
        assert!(env.is_error);
        assert!(env.payload["error"].as_str().unwrap().contains("handler bug"));
    }

    #[test]
    fn list_operations_hides_handlers() {
        let ops = dispatcher(absent()).list_operations();
        let names: Vec<_> = ops.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["echo_version", "echo_args", "explode"]);
        let listed = serde_json::to_value(&ops[0]).unwrap();
        assert_eq!(listed["inputSchema"]["type"], "object");
    }

    #[cfg(unix)]
    mod with_fake_az {
        use super::*;
        use crate::azure::executor::testing::fake_program;

        #[tokio::test]
        async fn echo_version_success() {
            let dir = tempfile::tempdir().unwrap();
            let az = fake_program(dir.path(), "az", r#"printf '{"version":"1.0"}'"#);
            let env = dispatcher(Locator::fixed(az)).invoke("echo_version", None).await;
            assert_eq!(
                env,
                ResponseEnvelope {
                    is_error: false,
                    payload: json!({"version": "1.0"}),
                }
            );
        }

        #[tokio::test]
        async fn echo_version_failure_carries_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let az = fake_program(dir.path(), "az", "echo boom >&2; exit 1");
            let env = dispatcher(Locator::fixed(az)).invoke("echo_version", None).await;
            assert!(env.is_error);
            let detail = env.payload["detail"].as_str().unwrap();
            assert!(detail.contains("boom"), "{detail}");
            assert!(detail.contains("exited with code 1"), "{detail}");
        }
    }
}
