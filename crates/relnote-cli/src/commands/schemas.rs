use crate::config::RelnoteConfig;
use crate::support::print_json;
use serde_json::json;

pub fn run(config: &RelnoteConfig, json_output: bool) {
    let schemas = config.all_schemas();

    if json_output {
        print_json(&json!({
            "action": "schemas",
            "default": config.store.schema,
            "schemas": schemas
        }));
        return;
    }

    println!("relnote schemas\n  Default: {}", config.store.schema);
    for schema in &schemas {
        println!("  {}", schema.name);
        for field in &schema.fields {
            let required = if field.required { " required" } else { "" };
            let items = if field.items.is_empty() {
                String::new()
            } else {
                format!(" [{}]", field.items.join(", "))
            };
            println!(
                "    - {} \"{}\" ({}{required}){items}",
                field.name,
                field.title,
                field.kind.as_str()
            );
        }
    }
}
