use crate::orchestration::error::OrchestratorError;

pub const PLANNER_TEMPLATE: &str = r#"You plan how to satisfy a user query by calling APIs, one step at a time.
Write every plan step in natural language. A separate component maps each step to exactly one API call and reports the result back to you as "API response".
Each step must be concrete: avoid pronouns and name the values obtained earlier (ids, names, lists) instead.
Search, filter and sort for one thing belong in a single step. Break the rest of the task down the way a person would, without skipping sub-tasks.
If the last API response does not fulfil the last step, plan a step that does.
When the query has been fulfilled, write a Thought and then the Final Answer.
If the query has nothing to do with software or work tracking, answer with [] and nothing else.

Format:
User query: the query to solve
Plan step 1: the first step
API response: the result of executing the first step
... (Plan step n / API response may repeat)
Thought: I am finished executing a plan and have what the user asked for
Final Answer: the final output of the plan

Examples:
{{examples}}

Begin!

User query: {{query}}
Plan step 1: {{scratchpad}}"#;

pub const PLANNER_EXAMPLES: &str = r#"Example 1:
User query: Prioritize my P0 issues and add them to the current sprint.
Plan step 1: Get the id of the current user.
API response: Successfully identified the user.
Plan step 2: Retrieve the P0 issues owned by the current user.
API response: Successfully obtained the P0 issues owned by the user.
Plan step 3: Prioritize the retrieved P0 issues.
API response: Successfully prioritized the P0 issues.
Plan step 4: Get the id of the current sprint.
API response: Successfully obtained the current sprint id.
Plan step 5: Add the prioritized P0 issues to the current sprint.
API response: Successfully added the issues to the sprint.
Thought: I am finished executing a plan and have prioritized the P0 issues and added them to the current sprint.
Final Answer: The P0 issues were prioritized and added to the current sprint.

Example 2:
User query: Summarize high severity tickets from the customer UltimateCustomer.
Plan step 1: Search for the customer named "UltimateCustomer".
API response: Successfully found the customer.
Plan step 2: Retrieve the high severity tickets of the customer "UltimateCustomer".
API response: Successfully obtained the high severity tickets.
Plan step 3: Summarize the retrieved high severity tickets.
API response: Successfully summarized the tickets.
Thought: I am finished executing a plan and have summarized the high severity tickets of "UltimateCustomer".
Final Answer: The high severity tickets of "UltimateCustomer" were summarized."#;

pub const ROOT_SELECTOR_TEMPLATE: &str = r#"These APIs are the closest matches for an instruction:
=====
{{candidates}}
=====
Pick the single API that carries out the instruction below. Treat words such as summarize, prioritize, my id or current sprint as strong hints.
Return only a JSON object {"api_name": "<name>", "data_source": "<source>"} using the name and source of one API above.
If none of them can carry out the instruction, return None.

Instruction: "{{instruction}}"
Output:"#;

pub const PRODUCER_SELECTOR_TEMPLATE: &str = r#"Required argument: {{argument}}
Candidate APIs:
=====
{{candidates}}
=====
Pick the API whose output provides the required argument.
Return only a JSON object {"api_name": "<name>", "data_source": "<source>"} using the name and source of one API above.
If none of them produces it, return None.
Output:"#;

pub const ARGUMENT_TEMPLATE: &str = r#"Available values from earlier API calls:
{{known_values}}

You extract arguments for one API call. For every argument in the documentation below decide whether its value is in the user query, in the available values above, or has to come from another API.
Answer with a JSON object whose keys are the argument names.
- If the value is known, use it.
- If the argument is required and the value is unknown, use null.
- If the argument is optional (required = false) and the query does not give a value, use "RequiredFalse".
If the API takes no arguments, return {}.

API documentation:
{{documentation}}

User query: "{{query}}"
Arguments:"#;

/// Replaces `{{name}}` placeholders in `template`. Only the template is scanned, so
/// substituted values may contain braces.
pub fn render(template: &str, values: &[(&str, &str)]) -> Result<String, OrchestratorError> {
    let mut rendered = String::with_capacity(template.len());
    let mut cursor = template;

    while let Some(start) = cursor.find("{{") {
        rendered.push_str(&cursor[..start]);
        let after_open = &cursor[start + 2..];
        let Some(close_offset) = after_open.find("}}") else {
            return Err(OrchestratorError::PromptRender {
                reason: "unclosed placeholder in template".to_string(),
            });
        };
        let token = after_open[..close_offset].trim();
        let value = values
            .iter()
            .find(|(key, _)| *key == token)
            .map(|(_, value)| *value)
            .ok_or_else(|| OrchestratorError::PromptRender {
                reason: format!("no value for placeholder `{token}`"),
            })?;
        rendered.push_str(value);
        cursor = &after_open[close_offset + 2..];
    }

    rendered.push_str(cursor);
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_without_rescanning_values() {
        let rendered = render("a={{a}} b={{ b }}", &[("a", "{{b}}"), ("b", "2")]).expect("ok");
        assert_eq!(rendered, "a={{b}} b=2");
    }

    #[test]
    fn render_rejects_unknown_and_unclosed_placeholders() {
        let err = render("{{missing}}", &[]).expect_err("unknown");
        assert!(err.to_string().contains("missing"));
        assert!(render("{{open", &[]).is_err());
    }

    #[test]
    fn json_braces_in_templates_are_left_alone() {
        let rendered = render(
            ROOT_SELECTOR_TEMPLATE,
            &[("candidates", "c"), ("instruction", "i")],
        )
        .expect("render");
        assert!(rendered.contains(r#"{"api_name": "<name>", "data_source": "<source>"}"#));
    }

    #[test]
    fn every_builtin_template_renders() {
        render(
            PLANNER_TEMPLATE,
            &[
                ("examples", PLANNER_EXAMPLES),
                ("query", "q"),
                ("scratchpad", ""),
            ],
        )
        .expect("planner");
        render(
            PRODUCER_SELECTOR_TEMPLATE,
            &[("argument", "user_id"), ("candidates", "c")],
        )
        .expect("producer");
        render(
            ARGUMENT_TEMPLATE,
            &[
                ("known_values", "none"),
                ("documentation", "{}"),
                ("query", "q"),
            ],
        )
        .expect("arguments");
    }
}
