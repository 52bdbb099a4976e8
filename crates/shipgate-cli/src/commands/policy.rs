use shipgate_core::{BlockingPolicy, PolicyScope};

fn scope(namespace: Option<&str>) -> PolicyScope {
    match namespace {
        Some(ns) => PolicyScope::Namespace(ns.to_string()),
        None => PolicyScope::Cluster,
    }
}

pub fn add(
    ctx: &super::Context,
    name: &str,
    namespace: Option<&str>,
    message: Option<&str>,
) -> anyhow::Result<()> {
    let mut policy = match namespace {
        Some(ns) => BlockingPolicy::namespaced(ns, name),
        None => BlockingPolicy::cluster(name),
    };
    if let Some(message) = message {
        policy = policy.with_message(message);
    }
    ctx.store.put_policy(&policy)?;
    println!("✓ Blocking policy {name} ({})", policy.scope.label());
    Ok(())
}

pub fn remove(ctx: &super::Context, name: &str, namespace: Option<&str>) -> anyhow::Result<()> {
    let scope = scope(namespace);
    if ctx.store.delete_policy(&scope, name)? {
        println!("✓ Removed blocking policy {name} ({})", scope.label());
    } else {
        anyhow::bail!("no blocking policy {name} ({})", scope.label());
    }
    Ok(())
}

pub fn list(ctx: &super::Context, namespace: Option<&str>) -> anyhow::Result<()> {
    let policies = match namespace {
        Some(ns) => {
            let mut active = ctx.store.list_namespace_policies(ns)?;
            active.extend(ctx.store.list_cluster_policies()?);
            active
        }
        None => ctx.store.list_policies()?,
    };

    if policies.is_empty() {
        println!("No blocking policies.");
        return Ok(());
    }
    for policy in &policies {
        match &policy.message {
            Some(message) => println!("{:<32} {:<24} {message}", policy.name, policy.scope.label()),
            None => println!("{:<32} {}", policy.name, policy.scope.label()),
        }
    }
    Ok(())
}
