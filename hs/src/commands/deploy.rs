//! `hs project deploy` - promote the latest uploaded build.

use crate::api::{HttpProjectApi, ProjectApi};
use crate::commands::resolve_account;
use crate::config;
use crate::output;

pub async fn run(account: Option<u64>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let project_dir = std::env::current_dir()?;
    let project_config = config::load_project_config(&project_dir)?;

    let global = config::GlobalConfig::load()?;
    let account_id = resolve_account(account, &global)?;
    let env = global.account_env(account_id);
    let api = HttpProjectApi::new(env)?;

    let project_data = api
        .fetch_project_status(account_id, &project_config.name)
        .await?;
    let Some(latest_build) = project_data.latest_build else {
        return Err("There is no build to deploy. Run `hs project upload` first.".into());
    };

    output::step(&format!("Deploying build #{}...", latest_build.build_id));
    let deploy_id = api
        .deploy_build(account_id, &project_config.name, latest_build.build_id, force)
        .await?;
    output::success(&format!(
        "Deploy #{deploy_id} started for build #{}.",
        latest_build.build_id
    ));

    Ok(())
}
