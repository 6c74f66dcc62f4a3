//! Azure Function App operations.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::info;

use super::{parse_args, parse_items, payload};
use crate::azure::{AzureCli, Invocation, run_program};
use crate::ops::{Field, FieldKind, HandlerFuture, InputShape, JsonObject, OperationDescriptor, boxed};

const DEFAULT_LOG_LINES: u64 = 50;

pub fn operations() -> Vec<OperationDescriptor> {
    let app = || {
        vec![
            Field::required("name", FieldKind::String, "Function app name"),
            Field::required("resourceGroup", FieldKind::String, "Resource group name"),
        ]
    };

    vec![
        OperationDescriptor::new(
            "azure_function_list",
            "List all Azure Function Apps in the current subscription or resource group",
            InputShape::new(vec![Field::optional(
                "resourceGroup",
                FieldKind::String,
                "Optional: Filter by resource group name",
            )]),
            function_list,
        ),
        OperationDescriptor::new(
            "azure_function_deploy",
            "Deploy an Azure Function App from a local directory",
            InputShape::new({
                let mut f = app();
                f.push(Field::required(
                    "path",
                    FieldKind::String,
                    "Local path to the function app directory",
                ));
                f
            }),
            function_deploy,
        ),
        OperationDescriptor::new(
            "azure_function_logs",
            "Get recent logs from an Azure Function App",
            InputShape::new({
                let mut f = app();
                f.push(Field::optional(
                    "lines",
                    FieldKind::Number,
                    "Number of log lines to retrieve (default: 50)",
                ));
                f
            }),
            function_logs,
        ),
        OperationDescriptor::new(
            "azure_function_settings",
            "Get application settings for an Azure Function App",
            InputShape::new(app()),
            function_settings,
        ),
        OperationDescriptor::new(
            "azure_function_restart",
            "Restart an Azure Function App",
            InputShape::new(app()),
            function_restart,
        ),
    ]
}

/* ---- arguments ---- */

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ListArgs {
    resource_group: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppArgs {
    name: String,
    resource_group: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployArgs {
    name: String,
    resource_group: String,
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogsArgs {
    name: String,
    resource_group: String,
    #[serde(default, deserialize_with = "lenient_number")]
    lines: Option<f64>,
}

/// Numbers, or strings holding one; anything else counts as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl LogsArgs {
    fn line_count(&self) -> u64 {
        self.lines
            .filter(|n| n.is_finite() && *n >= 1.0)
            .map(|n| n as u64)
            .unwrap_or(DEFAULT_LOG_LINES)
    }
}

/* ---- az output / payloads ---- */

/// One entry of `az functionapp list`.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FunctionApp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_host_name: Option<String>,
}

/// One entry of `az functionapp config appsettings list`.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSetting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_setting: Option<bool>,
}

#[derive(Debug, Serialize)]
struct FunctionList {
    success: bool,
    functions: Vec<FunctionApp>,
    count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Deployed {
    success: bool,
    message: String,
    output: String,
    function_app: DeployedApp,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployedApp {
    name: String,
    resource_group: String,
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Logs {
    success: bool,
    logs: String,
    function_app: String,
}

#[derive(Debug, Serialize)]
struct Settings {
    success: bool,
    settings: Vec<AppSetting>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct Restarted {
    success: bool,
    message: String,
}

/* ---- handlers ---- */

fn function_list(cli: Arc<AzureCli>, args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let args: ListArgs = parse_args(args)?;
        let mut cmd = vec!["functionapp".to_string(), "list".to_string()];
        if let Some(rg) = args.resource_group.filter(|rg| !rg.is_empty()) {
            cmd.push("--resource-group".into());
            cmd.push(rg);
        }
        let data = cli
            .execute(cmd)
            .await?
            .into_data()
            .context("Failed to list function apps")?;
        let functions: Vec<FunctionApp> = parse_items(data)?;
        payload(&FunctionList {
            success: true,
            count: functions.len(),
            functions,
        })
    })
}

fn node_tool(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.cmd")
    } else {
        name.to_string()
    }
}

/// Current `PATH` with the directory holding `az` appended, so the Functions
/// Core Tools can find it.
fn path_with(dir: &Path) -> Option<OsString> {
    let mut paths: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default();
    if !paths.iter().any(|p| p == dir) {
        paths.push(dir.to_path_buf());
    }
    std::env::join_paths(paths).ok()
}

fn function_deploy(cli: Arc<AzureCli>, args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let args: DeployArgs = parse_args(args)?;
        let dir = PathBuf::from(&args.path);
        let az_dir = cli.path().await?.parent().map(Path::to_path_buf);

        info!(app = %args.name, path = %dir.display(), "building function app");
        let build = Invocation::new(node_tool("npm"), ["run", "build"]).current_dir(&dir);
        run_program(&build, cli.max_output())
            .await
            .into_success()
            .with_context(|| format!("Build failed in {}", args.path))?;

        let mut publish = Invocation::new(
            node_tool("npx"),
            ["func", "azure", "functionapp", "publish", args.name.as_str()],
        )
        .current_dir(&dir);
        if let Some(path) = az_dir.as_deref().and_then(path_with) {
            publish = publish.env("PATH", path);
        }

        info!(app = %args.name, "publishing function app");
        let published = run_program(&publish, cli.max_output())
            .await
            .into_success()
            .with_context(|| format!("Failed to deploy {}", args.name))?;

        payload(&Deployed {
            success: true,
            message: format!("Successfully deployed {}", args.name),
            output: published.output().to_string(),
            function_app: DeployedApp {
                url: format!("https://{}.azurewebsites.net", args.name),
                name: args.name,
                resource_group: args.resource_group,
            },
        })
    })
}

fn function_logs(cli: Arc<AzureCli>, args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let args: LogsArgs = parse_args(args)?;
        let lines = args.line_count().to_string();
        let res = cli
            .execute([
                "functionapp",
                "log",
                "tail",
                "--name",
                args.name.as_str(),
                "--resource-group",
                args.resource_group.as_str(),
                "--max-log-lines",
                lines.as_str(),
            ])
            .await?
            .into_success()
            .context("Failed to retrieve logs")?;
        payload(&Logs {
            success: true,
            logs: res.output().to_string(),
            function_app: args.name,
        })
    })
}

fn function_settings(cli: Arc<AzureCli>, args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let args: AppArgs = parse_args(args)?;
        let data = cli
            .execute([
                "functionapp",
                "config",
                "appsettings",
                "list",
                "--name",
                args.name.as_str(),
                "--resource-group",
                args.resource_group.as_str(),
            ])
            .await?
            .into_data()
            .context("Failed to get settings")?;
        let settings: Vec<AppSetting> = parse_items(data)?;
        payload(&Settings {
            success: true,
            count: settings.len(),
            settings,
        })
    })
}

fn function_restart(cli: Arc<AzureCli>, args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let args: AppArgs = parse_args(args)?;
        cli.execute([
            "functionapp",
            "restart",
            "--name",
            args.name.as_str(),
            "--resource-group",
            args.resource_group.as_str(),
        ])
        .await?
        .into_success()
        .context("Failed to restart function app")?;
        payload(&Restarted {
            success: true,
            message: format!("Successfully restarted {}", args.name),
        })
    })
}
