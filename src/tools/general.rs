//! Free-form `az` passthrough plus resource group / resource / storage helpers.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_args, parse_items, payload};
use crate::azure::AzureCli;
use crate::ops::{Field, FieldKind, HandlerFuture, InputShape, JsonObject, OperationDescriptor, boxed};

pub fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "azure_cli",
            "Execute any Azure CLI command. Use this for operations not covered by specific tools. \
             Example: \"functionapp list --resource-group MyRG\" or \
             \"storage account keys list --account-name mystorage --resource-group MyRG\"",
            InputShape::new(vec![Field::required(
                "command",
                FieldKind::String,
                "The Azure CLI command to execute (without the \"az\" prefix). Example: \"account show\" or \"group list\"",
            )]),
            azure_cli,
        ),
        OperationDescriptor::new(
            "azure_resource_group_list",
            "List all resource groups in the current subscription",
            InputShape::empty(),
            resource_group_list,
        ),
        OperationDescriptor::new(
            "azure_resource_list",
            "List all resources in a specific resource group",
            InputShape::new(vec![Field::required(
                "resourceGroup",
                FieldKind::String,
                "Resource group name",
            )]),
            resource_list,
        ),
        OperationDescriptor::new(
            "azure_storage_key",
            "Get access keys for an Azure Storage account",
            InputShape::new(vec![
                Field::required("accountName", FieldKind::String, "Storage account name"),
                Field::required("resourceGroup", FieldKind::String, "Resource group name"),
            ]),
            storage_key,
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct CliArgs {
    command: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceListArgs {
    resource_group: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageKeyArgs {
    account_name: String,
    resource_group: String,
}

/// One entry of `az group list`.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One entry of `az resource list`.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Resource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One entry of `az storage account keys list`.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

#[derive(Debug, Serialize)]
struct CliOutput {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    output: String,
    command: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceGroups {
    success: bool,
    resource_groups: Vec<ResourceGroup>,
    count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Resources {
    success: bool,
    resources: Vec<Resource>,
    count: usize,
    resource_group: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StorageKeys {
    success: bool,
    keys: Vec<StorageKey>,
    account_name: String,
}

fn azure_cli(cli: Arc<AzureCli>, args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let args: CliArgs = parse_args(args)?;
        let command = format!("az {}", args.command.trim());
        let res = cli
            .execute_line(&args.command)
            .await?
            .into_success()
            .with_context(|| format!("Command execution failed: {command}"))?;
        payload(&CliOutput {
            success: true,
            output: res.output().to_string(),
            data: res.structured_data,
            command,
        })
    })
}

fn resource_group_list(cli: Arc<AzureCli>, _args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let data = cli
            .execute(["group", "list"])
            .await?
            .into_data()
            .context("Failed to list resource groups")?;
        let groups: Vec<ResourceGroup> = parse_items(data)?;
        payload(&ResourceGroups {
            success: true,
            count: groups.len(),
            resource_groups: groups,
        })
    })
}

fn resource_list(cli: Arc<AzureCli>, args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let args: ResourceListArgs = parse_args(args)?;
        let data = cli
            .execute([
                "resource",
                "list",
                "--resource-group",
                args.resource_group.as_str(),
            ])
            .await?
            .into_data()
            .context("Failed to list resources")?;
        let resources: Vec<Resource> = parse_items(data)?;
        payload(&Resources {
            success: true,
            count: resources.len(),
            resources,
            resource_group: args.resource_group,
        })
    })
}

fn storage_key(cli: Arc<AzureCli>, args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let args: StorageKeyArgs = parse_args(args)?;
        let data = cli
            .execute([
                "storage",
                "account",
                "keys",
                "list",
                "--account-name",
                args.account_name.as_str(),
                "--resource-group",
                args.resource_group.as_str(),
            ])
            .await?
            .into_data()
            .context("Failed to get storage keys")?;
        let keys: Vec<StorageKey> = parse_items(data)?;
        payload(&StorageKeys {
            success: true,
            keys,
            account_name: args.account_name,
        })
    })
}

#[cfg(all(test, unix))]
mod tests {
    use crate::tools::testing::{dispatcher, invoke};
    use serde_json::json;

    #[tokio::test]
    async fn passthrough_returns_data_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(
            dir.path(),
            r#"[ "$1 $2 $3 $4" = "group show --name My RG" ] || exit 1
printf '%s' '{"name":"My RG"}'"#,
        );
        let env = invoke(&d, "azure_cli", json!({"command": r#"group show --name "My RG""#})).await;
        assert!(!env.is_error, "{:?}", env.payload);
        assert_eq!(env.payload["data"], json!({"name": "My RG"}));
        assert_eq!(env.payload["output"], r#"{"name":"My RG"}"#);
        assert_eq!(env.payload["command"], r#"az group show --name "My RG""#);
    }

    #[tokio::test]
    async fn passthrough_text_has_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path(), "echo 'azure-cli 2.60.0'");
        let env = invoke(&d, "azure_cli", json!({"command": "version -o tsv"})).await;
        assert!(!env.is_error);
        assert!(env.payload.get("data").is_none());
        assert_eq!(env.payload["output"], "azure-cli 2.60.0\n");
    }

    #[tokio::test]
    async fn passthrough_failure_names_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path(), "echo 'ERROR: unrecognized' >&2; exit 2");
        let env = invoke(&d, "azure_cli", json!({"command": "bogus"})).await;
        assert!(env.is_error);
        assert_eq!(env.payload["error"], "Command execution failed: az bogus");
        assert!(env.payload["detail"].as_str().unwrap().contains("ERROR: unrecognized"));
    }

    #[tokio::test]
    async fn resources_keep_the_group() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(
            dir.path(),
            r#"[ "$4" = "rg-1" ] || exit 1
printf '%s' '[{"name":"st1","type":"Microsoft.Storage/storageAccounts","location":"eastus","id":"/s/1","tags":null}]'"#,
        );
        let env = invoke(&d, "azure_resource_list", json!({"resourceGroup": "rg-1"})).await;
        assert!(!env.is_error, "{:?}", env.payload);
        assert_eq!(
            env.payload,
            json!({
                "success": true,
                "resources": [{"name":"st1","type":"Microsoft.Storage/storageAccounts","location":"eastus","id":"/s/1"}],
                "count": 1,
                "resourceGroup": "rg-1"
            })
        );
    }

    #[tokio::test]
    async fn storage_keys_are_reshaped() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(
            dir.path(),
            r#"printf '%s' '[{"keyName":"key1","value":"abc","permissions":"FULL","creationTime":"2024-01-01"}]'"#,
        );
        let env = invoke(
            &d,
            "azure_storage_key",
            json!({"accountName": "st1", "resourceGroup": "rg-1"}),
        )
        .await;
        assert_eq!(
            env.payload,
            json!({
                "success": true,
                "keys": [{"keyName":"key1","value":"abc","permissions":"FULL"}],
                "accountName": "st1"
            })
        );
    }

    #[tokio::test]
    async fn resource_groups_count() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(
            dir.path(),
            r#"printf '%s' '[{"name":"a","location":"x","id":"1"},{"name":"b","location":"y","id":"2"}]'"#,
        );
        let env = invoke(&d, "azure_resource_group_list", json!({})).await;
        assert_eq!(env.payload["count"], 2);
        assert_eq!(env.payload["resourceGroups"][1]["name"], "b");
    }
}
