//! Conditional field visibility over plugin configuration groups.
//!
//! A plugin's widget metadata carries configuration groups (the fields shown
//! for the stage) and filters. Each filter names a condition and a list of
//! `show` targets; a target field is visible when at least one filter showing
//! it evaluates true. Fields no filter references are always visible.
//!
//! Conditions come in two forms: a structured comparison
//! (`property`/`operator`/`value`) or an expression string with the grammar:
//!
//! ```text
//! Expression ::= Clause ( '&&' Clause )*
//! Clause     ::= property ( '==' | '!=' ) Literal
//! Literal    ::= QuotedString | BareWord
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use trellis_types::{PluginSpec, TrellisError};

// ---------------------------------------------------------------------------
// Widget metadata
// ---------------------------------------------------------------------------

/// One field of a configuration group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetProperty {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "widget-type", default)]
    pub widget_type: String,
}

/// A titled group of fields in the stage configuration panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigGroup {
    pub label: String,
    #[serde(default)]
    pub properties: Vec<WidgetProperty>,
}

/// A field made visible (or not) by a filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowTarget {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
}

/// Comparison operator of a structured filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "equal to")]
    EqualTo,
    #[serde(rename = "not equal to")]
    NotEqualTo,
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = "does not exist")]
    DoesNotExist,
}

/// Condition of a visibility filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterCondition {
    Expression {
        expression: String,
    },
    Comparison {
        property: String,
        operator: CompareOp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

/// A named visibility rule over configuration fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityFilter {
    pub name: String,
    pub condition: FilterCondition,
    #[serde(default)]
    pub show: Vec<ShowTarget>,
}

// ---------------------------------------------------------------------------
// Expression parsing
// ---------------------------------------------------------------------------

/// A parsed filter expression: one or more clauses joined by `&&`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpr {
    pub clauses: Vec<FieldClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldClause {
    pub property: String,
    pub negated: bool,
    pub value: String,
}

/// Parse a filter expression.
///
/// An empty or whitespace-only input produces an expression with zero
/// clauses, which [`evaluate_expression`] treats as always true.
pub fn parse_expression(input: &str) -> Result<FieldExpr, TrellisError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(FieldExpr {
            clauses: Vec::new(),
        });
    }

    let mut clauses = Vec::new();
    for part in trimmed.split("&&") {
        clauses.push(parse_clause(part.trim())?);
    }
    Ok(FieldExpr { clauses })
}

fn parse_clause(input: &str) -> Result<FieldClause, TrellisError> {
    if input.is_empty() {
        return Err(make_error("empty clause"));
    }

    let (property, negated, rest) = if let Some((lhs, rhs)) = input.split_once("!=") {
        (lhs.trim(), true, rhs.trim())
    } else if let Some((lhs, rhs)) = input.split_once("==") {
        (lhs.trim(), false, rhs.trim())
    } else {
        return Err(make_error(&format!("no operator found in '{input}'")));
    };

    if property.is_empty() {
        return Err(make_error("missing property before operator"));
    }
    if !property
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(make_error(&format!("invalid property name '{property}'")));
    }
    if rest.is_empty() {
        return Err(make_error(&format!("missing value after operator in '{input}'")));
    }

    Ok(FieldClause {
        property: property.to_string(),
        negated,
        value: strip_quotes(rest),
    })
}

fn strip_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if s.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        return s[1..s.len() - 1].to_string();
    }
    s.to_string()
}

fn make_error(msg: &str) -> TrellisError {
    TrellisError::Validation(format!("filter expression parse error: {msg}"))
}

/// Evaluate an expression against a property resolver. Missing properties
/// resolve to the empty string. Zero clauses evaluate to `true`.
pub fn evaluate_expression(expr: &FieldExpr, resolve: &dyn Fn(&str) -> String) -> bool {
    expr.clauses.iter().all(|clause| {
        let actual = resolve(&clause.property);
        if clause.negated {
            actual != clause.value
        } else {
            actual == clause.value
        }
    })
}

// ---------------------------------------------------------------------------
// Visibility computation
// ---------------------------------------------------------------------------

/// Computes the visibility map of a stage's configuration fields from its
/// groups and filters, evaluated against the stage's configured properties.
///
/// Malformed expressions are logged and treated as true, leaving their
/// targets visible; visibility computation never fails.
pub fn compute_visibility(
    groups: &[ConfigGroup],
    filters: &[VisibilityFilter],
    plugin: &PluginSpec,
) -> BTreeMap<String, bool> {
    let mut visibility: BTreeMap<String, bool> = BTreeMap::new();
    for group in groups {
        for property in &group.properties {
            visibility.insert(property.name.clone(), true);
        }
    }

    // Fields referenced by at least one filter are visible only when some
    // referencing filter passes.
    let mut filtered: BTreeMap<String, bool> = BTreeMap::new();
    for filter in filters {
        let pass = condition_passes(filter, plugin);
        for target in &filter.show {
            let entry = filtered.entry(target.name.clone()).or_insert(false);
            *entry = *entry || pass;
        }
    }
    for (name, shown) in filtered {
        visibility.insert(name, shown);
    }

    visibility
}

fn condition_passes(filter: &VisibilityFilter, plugin: &PluginSpec) -> bool {
    match &filter.condition {
        FilterCondition::Comparison {
            property,
            operator,
            value,
        } => {
            let actual = plugin.property(property);
            match operator {
                CompareOp::EqualTo => actual == value.as_deref(),
                CompareOp::NotEqualTo => actual != value.as_deref(),
                CompareOp::Exists => actual.is_some(),
                CompareOp::DoesNotExist => actual.is_none(),
            }
        }
        FilterCondition::Expression { expression } => match parse_expression(expression) {
            Ok(expr) => {
                let resolve =
                    |name: &str| plugin.property(name).unwrap_or_default().to_string();
                evaluate_expression(&expr, &resolve)
            }
            Err(err) => {
                warn!(filter = %filter.name, error = %err, "ignoring malformed visibility filter");
                true
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin_with(props: &[(&str, &str)]) -> PluginSpec {
        let mut plugin = PluginSpec::new("File", "batchsource");
        for (k, v) in props {
            plugin.properties.insert((*k).into(), (*v).into());
        }
        plugin
    }

    fn groups(names: &[&str]) -> Vec<ConfigGroup> {
        vec![ConfigGroup {
            label: "Basic".into(),
            properties: names
                .iter()
                .map(|n| WidgetProperty {
                    name: (*n).into(),
                    ..Default::default()
                })
                .collect(),
        }]
    }

    fn show(names: &[&str]) -> Vec<ShowTarget> {
        names
            .iter()
            .map(|n| ShowTarget {
                name: (*n).into(),
                target_type: None,
            })
            .collect()
    }

    #[test]
    fn parse_simple_expression() {
        let expr = parse_expression("format == 'csv'").unwrap();
        assert_eq!(expr.clauses.len(), 1);
        assert_eq!(expr.clauses[0].property, "format");
        assert!(!expr.clauses[0].negated);
        assert_eq!(expr.clauses[0].value, "csv");
    }

    #[test]
    fn parse_compound_expression() {
        let expr = parse_expression("format == csv && compression != none").unwrap();
        assert_eq!(expr.clauses.len(), 2);
        assert!(expr.clauses[1].negated);
    }

    #[test]
    fn parse_empty_expression_is_always_true() {
        let expr = parse_expression("   ").unwrap();
        assert!(evaluate_expression(&expr, &|_| String::new()));
    }

    #[test]
    fn parse_rejects_missing_operator() {
        assert!(parse_expression("justaword").is_err());
        assert!(parse_expression("a == ").is_err());
        assert!(parse_expression(" == b").is_err());
    }

    #[test]
    fn evaluate_resolves_missing_as_empty() {
        let expr = parse_expression("format == ''").unwrap();
        // Missing property resolves to "", quoted empty literal matches.
        assert!(evaluate_expression(&expr, &|_| String::new()));
    }

    #[test]
    fn comparison_equal_to_shows_target() {
        let filters = vec![VisibilityFilter {
            name: "delimiter for csv".into(),
            condition: FilterCondition::Comparison {
                property: "format".into(),
                operator: CompareOp::EqualTo,
                value: Some("csv".into()),
            },
            show: show(&["delimiter"]),
        }];
        let vis = compute_visibility(
            &groups(&["format", "delimiter"]),
            &filters,
            &plugin_with(&[("format", "csv")]),
        );
        assert_eq!(vis["delimiter"], true);
        assert_eq!(vis["format"], true);
    }

    #[test]
    fn comparison_failing_hides_target() {
        let filters = vec![VisibilityFilter {
            name: "delimiter for csv".into(),
            condition: FilterCondition::Comparison {
                property: "format".into(),
                operator: CompareOp::EqualTo,
                value: Some("csv".into()),
            },
            show: show(&["delimiter"]),
        }];
        let vis = compute_visibility(
            &groups(&["format", "delimiter"]),
            &filters,
            &plugin_with(&[("format", "json")]),
        );
        assert_eq!(vis["delimiter"], false);
    }

    #[test]
    fn exists_and_does_not_exist() {
        let exists = VisibilityFilter {
            name: "f1".into(),
            condition: FilterCondition::Comparison {
                property: "path".into(),
                operator: CompareOp::Exists,
                value: None,
            },
            show: show(&["a"]),
        };
        let absent = VisibilityFilter {
            name: "f2".into(),
            condition: FilterCondition::Comparison {
                property: "path".into(),
                operator: CompareOp::DoesNotExist,
                value: None,
            },
            show: show(&["b"]),
        };
        let vis = compute_visibility(
            &groups(&["a", "b"]),
            &[exists, absent],
            &plugin_with(&[("path", "/tmp/in")]),
        );
        assert_eq!(vis["a"], true);
        assert_eq!(vis["b"], false);
    }

    #[test]
    fn any_passing_filter_wins() {
        let failing = VisibilityFilter {
            name: "f1".into(),
            condition: FilterCondition::Comparison {
                property: "mode".into(),
                operator: CompareOp::EqualTo,
                value: Some("advanced".into()),
            },
            show: show(&["threshold"]),
        };
        let passing = VisibilityFilter {
            name: "f2".into(),
            condition: FilterCondition::Comparison {
                property: "mode".into(),
                operator: CompareOp::NotEqualTo,
                value: Some("off".into()),
            },
            show: show(&["threshold"]),
        };
        let vis = compute_visibility(
            &groups(&["threshold"]),
            &[failing, passing],
            &plugin_with(&[("mode", "basic")]),
        );
        assert_eq!(vis["threshold"], true);
    }

    #[test]
    fn malformed_expression_leaves_targets_visible() {
        let filters = vec![VisibilityFilter {
            name: "broken".into(),
            condition: FilterCondition::Expression {
                expression: "this is not an expression".into(),
            },
            show: show(&["field"]),
        }];
        let vis = compute_visibility(&groups(&["field"]), &filters, &plugin_with(&[]));
        assert_eq!(vis["field"], true);
    }

    #[test]
    fn expression_condition_evaluates_against_plugin_properties() {
        let filters = vec![VisibilityFilter {
            name: "advanced".into(),
            condition: FilterCondition::Expression {
                expression: "format == 'avro' && codec != 'none'".into(),
            },
            show: show(&["schema"]),
        }];
        let vis = compute_visibility(
            &groups(&["schema"]),
            &filters,
            &plugin_with(&[("format", "avro"), ("codec", "snappy")]),
        );
        assert_eq!(vis["schema"], true);
    }

    #[test]
    fn filter_condition_deserializes_both_forms() {
        let comparison: FilterCondition = serde_json::from_str(
            r#"{"property": "format", "operator": "equal to", "value": "csv"}"#,
        )
        .unwrap();
        assert!(matches!(comparison, FilterCondition::Comparison { .. }));

        let expression: FilterCondition =
            serde_json::from_str(r#"{"expression": "format == 'csv'"}"#).unwrap();
        assert!(matches!(expression, FilterCondition::Expression { .. }));
    }

    #[test]
    fn unreferenced_fields_stay_visible() {
        let vis = compute_visibility(&groups(&["x", "y"]), &[], &plugin_with(&[]));
        assert_eq!(vis.len(), 2);
        assert!(vis.values().all(|v| *v));
    }
}
