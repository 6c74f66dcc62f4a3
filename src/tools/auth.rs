//! Authentication and subscription operations.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{parse_args, parse_items, payload};
use crate::azure::AzureCli;
use crate::ops::{Field, FieldKind, HandlerFuture, InputShape, JsonObject, OperationDescriptor, boxed};

pub fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "azure_auth_status",
            "Check if authenticated to Azure CLI and show current subscription details",
            InputShape::empty(),
            auth_status,
        ),
        OperationDescriptor::new(
            "azure_auth_login",
            "Trigger Azure CLI login flow (opens browser for authentication)",
            InputShape::empty(),
            auth_login,
        ),
        OperationDescriptor::new(
            "azure_subscription_list",
            "List all Azure subscriptions available to the current user",
            InputShape::empty(),
            subscription_list,
        ),
        OperationDescriptor::new(
            "azure_subscription_set",
            "Set the active Azure subscription for subsequent commands",
            InputShape::new(vec![Field::required(
                "subscriptionId",
                FieldKind::String,
                "The subscription ID or name to set as active",
            )]),
            subscription_set,
        ),
    ]
}

/* ---- az output ---- */

/// `az account show`
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Account {
    pub id: Option<String>,
    pub name: Option<String>,
    pub tenant_id: Option<String>,
    pub user: AccountUser,
    pub environment_name: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// One entry of `az account list`.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Subscription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/* ---- payloads ---- */

const LOGIN_INSTRUCTIONS: [&str; 4] = [
    "1. Open a terminal",
    "2. Run: az login",
    "3. Follow the browser authentication flow",
    "4. Return to your MCP client and try again",
];

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AuthStatus {
    Anonymous {
        authenticated: bool,
        message: &'static str,
        instructions: [&'static str; 4],
    },
    SignedIn {
        authenticated: bool,
        subscription: SubscriptionRef,
        user: AccountUser,
        environment: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionRef {
    id: Option<String>,
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginResult {
    success: bool,
    message: &'static str,
    account: LoginAccount,
}

#[derive(Debug, Serialize)]
struct LoginAccount {
    subscription: Option<String>,
    user: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubscriptionList {
    success: bool,
    subscriptions: Vec<Subscription>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct SubscriptionSwitched {
    success: bool,
    message: String,
    subscription: SubscriptionRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionSetArgs {
    subscription_id: String,
}

/* ---- handlers ---- */

/// `az account show`, parsed.
pub async fn current_account(cli: &AzureCli) -> Result<Account> {
    let data = cli
        .execute(["account", "show"])
        .await?
        .into_data()
        .context("Failed to read the current Azure account")?;
    serde_json::from_value(data).context("Unexpected `az account show` output")
}

fn auth_status(cli: Arc<AzureCli>, _args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let shown = cli.execute(["account", "show"]).await?;
        if !shown.succeeded {
            return payload(&AuthStatus::Anonymous {
                authenticated: false,
                message: "Not authenticated to Azure CLI. Please run: az login",
                instructions: LOGIN_INSTRUCTIONS,
            });
        }

        let data = shown
            .into_data()
            .context("Failed to read the current Azure account")?;
        let account: Account =
            serde_json::from_value(data).context("Unexpected `az account show` output")?;
        payload(&AuthStatus::SignedIn {
            authenticated: true,
            subscription: SubscriptionRef {
                id: account.id,
                name: account.name,
                tenant_id: account.tenant_id,
            },
            user: account.user,
            environment: account.environment_name,
        })
    })
}

fn auth_login(cli: Arc<AzureCli>, _args: JsonObject) -> HandlerFuture {
    boxed(async move {
        cli.execute(["login"])
            .await?
            .into_success()
            .context("Failed to authenticate")?;
        let account = current_account(&cli).await?;
        payload(&LoginResult {
            success: true,
            message: "Successfully authenticated to Azure",
            account: LoginAccount {
                subscription: account.name,
                user: account.user.name,
            },
        })
    })
}

fn subscription_list(cli: Arc<AzureCli>, _args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let data = cli
            .execute(["account", "list"])
            .await?
            .into_data()
            .context("Failed to list subscriptions")?;
        let subscriptions: Vec<Subscription> = parse_items(data)?;
        payload(&SubscriptionList {
            success: true,
            count: subscriptions.len(),
            subscriptions,
        })
    })
}

fn subscription_set(cli: Arc<AzureCli>, args: JsonObject) -> HandlerFuture {
    boxed(async move {
        let args: SubscriptionSetArgs = parse_args(args)?;
        cli.execute(["account", "set", "--subscription", args.subscription_id.as_str()])
            .await?
            .into_success()
            .context("Failed to set subscription")?;
        let account = current_account(&cli).await?;
        payload(&SubscriptionSwitched {
            success: true,
            message: format!(
                "Switched to subscription: {}",
                account.name.as_deref().unwrap_or_default()
            ),
            subscription: SubscriptionRef {
                id: account.id,
                name: account.name,
                tenant_id: None,
            },
        })
    })
}
