//! Provisions a team project the way the chat bot does, against an in-process fake api server.
//!
//! Run with `RUST_LOG=subatomic_openshift=debug` to see every request that is made.
use subatomic_openshift::prelude::*;
use subatomic_openshift::serde_json::json;
use subatomic_openshift::testkit::{run, FakeApiServer};

use std::collections::BTreeMap;

const PROJECT: &str = "team-dev";
const DEVOPS_PROJECT: &str = "team-devops";

fn main() {
    let _ = env_logger::try_init();

    if let Err(err) = run(provision()) {
        eprintln!("Provisioning failed: {}", err);
        std::process::exit(1);
    }
}

async fn provision() -> Result<(), Box<dyn std::error::Error>> {
    let server = FakeApiServer::start().await?;
    let api = server.api();

    let project = ResourceFactory::project_request(PROJECT, "Team Dev", "Development environment");
    report("project request", &api.create(project, "").await?);
    // the fake server has no project controller, so create the namespace ourselves
    let namespace = ResourceEnvelope::named("Namespace", "v1", PROJECT);
    report("namespace", &api.apply(namespace, "").await?);

    let mut settings = BTreeMap::new();
    settings.insert("JAVA_OPTS".to_owned(), "-Xmx512m".to_owned());
    let resources = ResourceFactory::list_of(vec![
        ResourceFactory::service_account("jenkins"),
        ResourceFactory::config_map("app-settings", settings),
        ResourceEnvelope::from_value(json!({
            "kind": "Service",
            "metadata": {"name": "app"},
            "spec": {"ports": [{"port": 8080}], "selector": {"name": "app"}}
        }))?,
        ResourceEnvelope::from_value(json!({
            "kind": "Route",
            "metadata": {"name": "app"},
            "spec": {"to": {"kind": "Service", "name": "app"}}
        }))?,
    ]);
    let applied = api.apply(resources.clone(), PROJECT).await?;
    report("resources", &applied);

    // a second run changes nothing, apply only creates what is missing
    report("resources again", &api.apply(resources, PROJECT).await?);

    let owners = vec!["alice", "bob"];
    report(
        "admin role",
        &api.policy().add_role_to_users(&owners, "admin", PROJECT).await?,
    );
    let jenkins = format!("system:serviceaccount:{}:jenkins", DEVOPS_PROJECT);
    report(
        "edit role",
        &api.policy().add_role_to_users(vec![jenkins], "edit", PROJECT).await?,
    );
    if let Some(response) = api.policy().remove_role_from_user("bob", "admin", PROJECT).await? {
        report("remove bob", &response);
    }

    let join = api.adm().pod_network_join_to_project(PROJECT, DEVOPS_PROJECT).await?;
    if join.is_not_found() {
        println!("pod network: multitenant plugin not installed, skipping");
    } else {
        report("pod network", &join);
    }

    println!("{} requests were made", server.requests().len());
    Ok(())
}

fn report(step: &str, response: &ApiResponse) {
    let outcome = if response.is_success() { "ok" } else { "failed" };
    println!("{}: {} ({})", step, outcome, response.status);
}
