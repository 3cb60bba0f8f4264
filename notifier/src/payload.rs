use relay::model::ActionSpec;
use serde_json::Value;

/// Buttons for a notification.
///
/// A command id yields a single command button labelled with `label` (or the
/// command id itself); a bare label yields a dismiss button.
pub fn build_actions(
    label: Option<&str>,
    command_id: Option<&str>,
    command_args: Option<Value>,
) -> Option<Vec<ActionSpec>> {
    match (label, command_id) {
        (label, Some(command_id)) => Some(vec![ActionSpec::command(
            label.unwrap_or(command_id),
            command_id,
            command_args,
        )]),
        (Some(label), None) => Some(vec![ActionSpec::dismiss(label)]),
        (None, None) => None,
    }
}

/// Trims user names and drops blank ones.
pub fn normalize_users<I, S>(users: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    users
        .into_iter()
        .map(|user| user.as_ref().trim().to_string())
        .filter(|user| !user.is_empty())
        .collect()
}
