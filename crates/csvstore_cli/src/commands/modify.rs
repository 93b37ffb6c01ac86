//! Commands that rewrite the backing file.

use super::{build_attributes, print_value, CommandResult, Context};

/// Runs the create command.
pub fn create(ctx: &Context<'_>, attrs: Vec<(String, String)>) -> CommandResult {
    let uid = ctx
        .connector
        .create(ctx.object_class, build_attributes(attrs))?;
    print_value(ctx, "uid", &uid)
}

/// Runs the update command.
pub fn update(ctx: &Context<'_>, uid: &str, attrs: Vec<(String, String)>) -> CommandResult {
    let uid = ctx
        .connector
        .update(ctx.object_class, uid, build_attributes(attrs))?;
    print_value(ctx, "uid", &uid)
}

/// Runs the add-values command.
pub fn add_values(ctx: &Context<'_>, uid: &str, attrs: Vec<(String, String)>) -> CommandResult {
    let uid = ctx
        .connector
        .add_attribute_values(ctx.object_class, uid, build_attributes(attrs))?;
    print_value(ctx, "uid", &uid)
}

/// Runs the remove-values command.
pub fn remove_values(ctx: &Context<'_>, uid: &str, attrs: Vec<(String, String)>) -> CommandResult {
    let uid = ctx
        .connector
        .remove_attribute_values(ctx.object_class, uid, build_attributes(attrs))?;
    print_value(ctx, "uid", &uid)
}

/// Runs the delete command.
pub fn delete(ctx: &Context<'_>, uid: &str) -> CommandResult {
    ctx.connector.delete(ctx.object_class, uid)?;
    print_value(ctx, "deleted", uid)
}
