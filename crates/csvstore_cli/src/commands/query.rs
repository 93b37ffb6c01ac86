//! Read-only commands: search, resolve and authenticate.

use super::{print_value, CommandResult, Context, ObjectView};
use csvstore_core::Secret;

/// Runs the search command.
pub fn search(ctx: &Context<'_>, uid: Option<&str>) -> CommandResult {
    let mut objects = Vec::new();
    ctx.connector.search(ctx.object_class, uid, |object| {
        objects.push(ObjectView::from(object));
        true
    })?;

    if ctx.json() {
        println!("{}", serde_json::to_string_pretty(&objects)?);
    } else {
        for object in &objects {
            object.print_text();
        }
        println!("{} record(s)", objects.len());
    }
    Ok(())
}

/// Runs the resolve command.
pub fn resolve(ctx: &Context<'_>, username: &str) -> CommandResult {
    let uid = ctx.connector.resolve_username(ctx.object_class, username)?;
    print_value(ctx, "uid", &uid)
}

/// Runs the authenticate command.
pub fn authenticate(ctx: &Context<'_>, username: &str, password: String) -> CommandResult {
    let password = Secret::text(password);
    let uid = ctx
        .connector
        .authenticate(ctx.object_class, username, &password)?;
    print_value(ctx, "uid", &uid)
}
