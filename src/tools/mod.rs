/*!
Azure operations exposed as MCP tools.

Each submodule contributes `operations()`: descriptors whose handlers build an
`az` argument vector, run it through `AzureCli`, and reshape the JSON into the
typed records below. Failures are returned as errors; the dispatcher turns
them into error envelopes.

  auth.rs       azure_auth_status / azure_auth_login / azure_subscription_*
  functions.rs  azure_function_*
  general.rs    azure_cli / azure_resource_group_list / azure_resource_list / azure_storage_key
*/

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ops::{JsonObject, Registry, RegistryError};

pub mod auth;
pub mod functions;
pub mod general;

/// All Azure operations, in listing order.
pub fn registry() -> Result<Registry, RegistryError> {
    Registry::with_operations(
        auth::operations()
            .into_iter()
            .chain(functions::operations())
            .chain(general::operations()),
    )
}

/// Deserialize handler arguments into their typed form.
pub(crate) fn parse_args<T: DeserializeOwned>(args: JsonObject) -> Result<T> {
    serde_json::from_value(Value::Object(args)).context("Invalid arguments")
}

/// Deserialize a JSON array printed by `az`.
pub(crate) fn parse_items<T: DeserializeOwned>(data: Value) -> Result<Vec<T>> {
    serde_json::from_value(data).context("Unexpected Azure CLI output shape")
}

pub(crate) fn payload<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to serialize result")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_operations_register() {
        let reg = registry().unwrap();
        let names: Vec<_> = reg.iter().map(|o| o.name).collect();
        assert_eq!(
            names,
            [
                "azure_auth_status",
                "azure_auth_login",
                "azure_subscription_list",
                "azure_subscription_set",
                "azure_function_list",
                "azure_function_deploy",
                "azure_function_logs",
                "azure_function_settings",
                "azure_function_restart",
                "azure_cli",
                "azure_resource_group_list",
                "azure_resource_list",
                "azure_storage_key",
            ]
        );
    }

    #[test]
    fn required_fields_are_declared() {
        let reg = registry().unwrap();
        let schema = Value::Object(reg.lookup("azure_storage_key").unwrap().input.to_json_schema());
        assert_eq!(schema["required"], serde_json::json!(["accountName", "resourceGroup"]));
    }
}
