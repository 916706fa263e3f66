use crate::args::{value_name, Args};
use crate::config::SearchSpec;

/// Build the issue search parameters for the given arguments.
///
/// `q` holds the free text first, then the qualifiers, then the
/// involvement qualifier for the user.
pub fn build_search_spec(args: &Args) -> SearchSpec {
    let involvement = value_name(&args.involvement);
    let qualifiers = [
        ("in", args.in_.as_ref().map(value_name)),
        ("type", args.type_.as_ref().map(value_name)),
        ("state", args.state.as_ref().map(value_name)),
        ("created", args.created.clone()),
        ("updated", args.updated.clone()),
        ("label", args.label.clone()),
        ("language", args.language.clone()),
        (involvement.as_str(), Some(args.username.clone())),
    ];

    let mut terms: Vec<String> = args.text.iter().cloned().collect();
    terms.extend(
        qualifiers
            .iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| format!("{}:{}", key, v))),
    );

    let mut spec = SearchSpec::new().with("q", terms.join(" "));
    if let Some(sort) = &args.sort {
        spec.insert("sort", value_name(sort));
    }
    if let Some(order) = &args.order {
        spec.insert("order", value_name(order));
    }
    spec
}
