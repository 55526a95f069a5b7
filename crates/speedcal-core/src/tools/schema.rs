//! Tool definitions offered to the model.
//!
//! Parameter schemas are generated from the argument types with `schemars`,
//! so the schema the model sees and the shape `ToolCall::parse` accepts
//! cannot drift apart.

use schemars::JsonSchema;
use serde_json::Value;

use speedcal_types::llm::ToolDefinition;
use speedcal_types::tool::{
    CREATE_SCHEDULE, CreateScheduleArgs, DELETE_SCHEDULE, DELETE_SCHEDULE_BY_INDEX, DeleteArgs,
    DeleteByIndexArgs, QUERY_SCHEDULES, QueryArgs, QuickCreateArgs, ToolSet,
};

/// Definitions for every tool in `set`, in a stable order.
pub fn definitions(set: ToolSet) -> Vec<ToolDefinition> {
    match set {
        ToolSet::Calendar => vec![
            definition::<CreateScheduleArgs>(
                CREATE_SCHEDULE,
                "Create a schedule for the current user. Use when the user wants to add, \
                 arrange or remember an event. Title and date are required.",
            ),
            definition::<QueryArgs>(
                QUERY_SCHEDULES,
                "List the current user's schedules in one month. Use when the user asks \
                 what is planned for a month.",
            ),
            definition::<DeleteArgs>(
                DELETE_SCHEDULE,
                "Delete a schedule whose title contains a keyword. If several schedules \
                 match, a numbered list is returned and the user must pick one.",
            ),
            definition::<DeleteByIndexArgs>(
                DELETE_SCHEDULE_BY_INDEX,
                "Delete one schedule from the numbered list returned by deleteSchedule, \
                 after the user picked a number.",
            ),
        ],
        ToolSet::QuickSchedule => vec![definition::<QuickCreateArgs>(
            CREATE_SCHEDULE,
            "Create a schedule from the user's description, filling in notes, reminder, \
             repeat rule, color, importance and category when they can be inferred.",
        )],
    }
}

fn definition<T: JsonSchema>(name: &str, description: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters: parameters_schema::<T>(),
    }
}

fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
    // Providers reject or ignore these keys on function parameters.
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}
