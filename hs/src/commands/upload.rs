//! `hs project upload` - upload the project and wait for its build.

use hs_core::{BuildStatus, DeployStatus};

use crate::api::{HttpProjectApi, ProjectApi};
use crate::commands::resolve_account;
use crate::config;
use crate::output;

pub async fn run(account: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let project_dir = std::env::current_dir()?;
    let project_config = config::load_project_config(&project_dir)?;

    let global = config::GlobalConfig::load()?;
    let account_id = resolve_account(account, &global)?;
    let env = global.account_env(account_id);
    let api = HttpProjectApi::new(env)?;

    output::step(&format!(
        "Uploading {} to account {}...",
        project_config.name, account_id
    ));
    let outcome = api
        .upload_project(
            account_id,
            &project_config.name,
            &project_dir.join(&project_config.src_dir),
        )
        .await?;

    match outcome.build.status {
        BuildStatus::Success => {
            output::success(&format!("Build #{} succeeded.", outcome.build.build_id));
        }
        BuildStatus::Pending => {
            output::warning(&format!(
                "Build #{} is still pending; check the project page for the result.",
                outcome.build.build_id
            ));
        }
        BuildStatus::Failure => {
            output::error(&format!("Build #{} failed.", outcome.build.build_id));
            return Err("project build failed".into());
        }
    }

    match outcome.deploy_status {
        Some(DeployStatus::Success) => {
            output::success("Auto-deploy succeeded.");
        }
        Some(DeployStatus::Pending) => {
            output::step("Auto-deploy is still running.");
        }
        Some(DeployStatus::Failure) => {
            output::error("Auto-deploy failed.");
            return Err("project deploy failed".into());
        }
        None => {
            output::muted("Auto-deploy did not run for this build.");
        }
    }

    Ok(())
}
