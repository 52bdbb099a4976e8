use shipgate_core::{Application, OverrideSet};

pub fn create(
    ctx: &super::Context,
    namespace: &str,
    name: &str,
    overrides: &str,
) -> anyhow::Result<()> {
    let mut app = Application::new(namespace, name);
    if !overrides.is_empty() {
        app.set_override_declaration(OverrideSet::parse(overrides).to_annotation());
    }
    let stored = ctx.store.create_application(&app)?;
    println!("✓ Created application {}", stored.key());
    Ok(())
}

pub fn show(ctx: &super::Context, namespace: &str, name: &str) -> anyhow::Result<()> {
    let app = ctx
        .store
        .get_application(namespace, name)?
        .ok_or_else(|| anyhow::anyhow!("application {namespace}/{name} not found"))?;
    println!("{}", serde_json::to_string_pretty(&app)?);
    Ok(())
}

pub fn list(ctx: &super::Context) -> anyhow::Result<()> {
    let apps = ctx.store.list_applications()?;
    if apps.is_empty() {
        println!("No applications.");
        return Ok(());
    }
    for app in &apps {
        println!("{:<48} overrides={}", app.key(), app.override_declaration());
    }
    Ok(())
}

/// Replace the override declaration, re-reading on conflict.
pub fn set_overrides(
    ctx: &super::Context,
    namespace: &str,
    name: &str,
    overrides: &str,
) -> anyhow::Result<()> {
    let declaration = OverrideSet::parse(overrides).to_annotation();
    let attempts = ctx.config.controller.max_update_attempts.max(1);
    for attempt in 1..=attempts {
        let mut app = ctx
            .store
            .get_application(namespace, name)?
            .ok_or_else(|| anyhow::anyhow!("application {namespace}/{name} not found"))?;
        app.set_override_declaration(declaration.clone());
        match ctx.store.update_application(&app) {
            Ok(stored) => {
                println!("✓ {} overrides: {:?}", stored.key(), declaration);
                return Ok(());
            }
            Err(e) if e.is_conflict() && attempt < attempts => {
                tracing::debug!(attempt, "override update conflicted, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    anyhow::bail!("could not update {namespace}/{name}")
}
