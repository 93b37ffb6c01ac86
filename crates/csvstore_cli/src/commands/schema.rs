//! Schema command implementation.

use super::{CommandResult, Context};

/// Runs the schema command.
pub fn run(ctx: &Context<'_>) -> CommandResult {
    let schema = ctx.connector.schema();

    if ctx.json() {
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    for class in &schema {
        println!("Object class: {}", class.name);
        println!("  Container: {}", class.container);
        println!("  Auxiliary: {}", class.auxiliary);
        println!("  Attributes:");
        for info in &class.attributes {
            let mut flags = Vec::new();
            if info.required {
                flags.push("required");
            }
            if info.multi_valued {
                flags.push("multi-valued");
            }
            println!(
                "    {:<20} column={:<16} type={:?} {}",
                info.exported_name,
                info.native_name,
                info.value_type,
                flags.join(",")
            );
        }
    }
    Ok(())
}
