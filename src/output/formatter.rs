use std::io::IsTerminal;
use owo_colors::OwoColorize;
use terminal_size::{Width, terminal_size};

use crate::error::{EvaluationError, ScoreError};
use crate::models::{Evaluation, ModelDefinition, ModelRole, VariableKind};
use crate::scoring::{BatchRow, BatchSummary, ContributionKind, Direction, ScoringResult, ValidationIssue};

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Format a value with up to 4 decimals, trailing zeros trimmed
/// (13040, 4.25, -0.0123)
pub fn format_value(value: f64) -> String {
    let formatted = format!("{:.4}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Format a percentage with one decimal ("92.3%")
pub fn format_percentage(percentage: f64) -> String {
    format!("{:.1}%", percentage)
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate text to fit available width, accounting for Unicode
fn truncate(text: &str, max_width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_width {
        text.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// One line per model: id, role/range, variable count, display name
pub fn format_model_list(models: &[ModelDefinition], use_colors: bool) -> String {
    if models.is_empty() {
        return "No models loaded.".to_string();
    }

    let id_width = models.iter().map(|m| m.id.chars().count()).max().unwrap_or(0);

    models
        .iter()
        .map(|model| {
            let applies = match (model.role, model.population) {
                (ModelRole::Companion, _) => "companion".to_string(),
                (ModelRole::Selector, Some(range)) => format!("population {}", range),
                (ModelRole::Selector, None) => "population ?".to_string(),
            };
            let id = format!("{:<width$}", model.id, width = id_width);
            let vars = format!("{} vars", model.variables.len());
            if use_colors {
                format!("{}  {:<28}  {:>8}  {}", id.bold(), applies.cyan(), vars.dimmed(), model.name)
            } else {
                format!("{}  {:<28}  {:>8}  {}", id, applies, vars, model.name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a scoring result with its contribution breakdown
pub fn format_result_detail(result: &ScoringResult, use_colors: bool) -> String {
    let mut lines = Vec::new();

    let value = format_value(result.reported());
    let header = match result.clamped {
        Some(_) => format!("{} (clamped, raw {})", value, format_value(result.total)),
        None => value,
    };
    if use_colors {
        lines.push(format!("{}: {}", result.model_name.bold(), header.green().bold()));
    } else {
        lines.push(format!("{}: {}", result.model_name, header));
    }
    lines.push(format!("  Model: {}", result.model_id));

    let label_width = result
        .contributions
        .iter()
        .map(|c| c.label.chars().count())
        .max()
        .unwrap_or(0)
        .max(8);

    for c in &result.contributions {
        let label = match c.kind {
            ContributionKind::Feature => c.label.clone(),
            ContributionKind::Municipality => format!("municipality {}", c.label),
            ContributionKind::Intercept => "intercept".to_string(),
        };
        let arrow = match c.direction {
            Direction::Increases => "+",
            Direction::Decreases => "-",
        };
        let term = match c.kind {
            ContributionKind::Feature => format!(
                "{} x {} = {}",
                format_value(c.value),
                format_value(c.coefficient),
                format_value(c.product)
            ),
            _ => format_value(c.product),
        };
        let pct = format!("{:>7}", format_percentage(c.percentage));
        let label = format!("{:<width$}", label, width = label_width + 13);

        if use_colors {
            let arrow = match c.direction {
                Direction::Increases => arrow.green().to_string(),
                Direction::Decreases => arrow.red().to_string(),
            };
            lines.push(format!("  {} {} {}  {}", arrow, label, pct.bold(), term.dimmed()));
        } else {
            lines.push(format!("  {} {} {}  {}", arrow, label, pct, term));
        }
    }

    lines.join("\n")
}

/// Format a full evaluation: selected model first, then companions
pub fn format_evaluation(evaluation: &Evaluation, use_colors: bool) -> String {
    let details = std::iter::once(&evaluation.primary)
        .chain(&evaluation.companions)
        .map(|result| format_result_detail(result, use_colors));
    let failures = evaluation.companion_errors.iter().map(|err| match err {
        ScoreError::InvalidRecord { model, issues } => format_issues(model, issues, use_colors),
    });
    details.chain(failures).collect::<Vec<_>>().join("\n\n")
}

/// Format validation issues as a bulleted list
pub fn format_issues(model_id: &str, issues: &[ValidationIssue], use_colors: bool) -> String {
    let title = format!("Record is not valid for model '{}':", model_id);
    let mut lines = vec![if use_colors {
        title.red().bold().to_string()
    } else {
        title
    }];
    for issue in issues {
        lines.push(format!("  - {}", issue));
    }
    lines.join("\n")
}

/// Format an evaluation failure for the user
pub fn format_evaluation_error(err: &EvaluationError, use_colors: bool) -> String {
    match err {
        EvaluationError::Invalid { model, issues } => format_issues(model, issues, use_colors),
        other if use_colors => other.to_string().red().to_string(),
        other => other.to_string(),
    }
}

/// Format batch rows as a table with columns: Row, Model, Result, Error
/// No headers (minimal format, same as list output)
/// Row column: 1-based with trailing dot, right-aligned
pub fn format_batch_table(rows: &[BatchRow], use_colors: bool) -> String {
    if rows.is_empty() {
        return "No rows in batch.".to_string();
    }

    let term_width = get_terminal_width();
    let index_width = rows.len().to_string().len() + 1;
    let model_width = rows
        .iter()
        .filter_map(|r| r.outcome.as_ref().ok())
        .map(|e| e.primary.model_id.chars().count())
        .max()
        .unwrap_or(0)
        .max(5);
    let value_width = 12;
    let separator = "  ";

    rows.iter()
        .map(|row| {
            let index_str = format!("{:>width$}", format!("{}.", row.index + 1), width = index_width);
            match &row.outcome {
                Ok(evaluation) => {
                    let model = format!("{:<width$}", evaluation.primary.model_id, width = model_width);
                    let mut value = format!(
                        "{:>width$}",
                        format_value(evaluation.primary.reported()),
                        width = value_width
                    );
                    for companion in &evaluation.companions {
                        value.push_str(&format!(
                            "{}{}={}",
                            separator,
                            companion.model_id,
                            format_value(companion.reported())
                        ));
                    }
                    for ScoreError::InvalidRecord { model, .. } in &evaluation.companion_errors {
                        value.push_str(&format!("{}{}=invalid", separator, model));
                    }
                    if use_colors {
                        format!("{} {}{}{}", index_str.dimmed(), model, separator, value.bold())
                    } else {
                        format!("{} {}{}{}", index_str, model, separator, value)
                    }
                }
                Err(err) => {
                    let fixed = index_width + 1 + model_width + separator.len();
                    let message = err.to_string();
                    let message = match term_width {
                        Some(width) if width > fixed + 20 => truncate(&message, width - fixed),
                        Some(_) => truncate(&message, 20),
                        None => message,
                    };
                    let model = format!("{:<width$}", "-", width = model_width);
                    if use_colors {
                        format!("{} {}{}{}", index_str.dimmed(), model, separator, message.red())
                    } else {
                        format!("{} {}{}{}", index_str, model, separator, message)
                    }
                }
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format batch rows as tab-separated values for scripting
/// Columns: row, model, result, error (no headers, no colors)
pub fn format_tsv(rows: &[BatchRow]) -> String {
    rows.iter()
        .map(|row| match &row.outcome {
            Ok(evaluation) => format!(
                "{}\t{}\t{}\t{}",
                row.index + 1,
                evaluation.primary.model_id,
                evaluation.primary.reported(),
                evaluation.companion_error_message().unwrap_or_default()
            ),
            Err(err) => format!("{}\t\t\t{}", row.index + 1, err),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_batch_summary(summary: &BatchSummary) -> String {
    format!(
        "{} rows: {} scored, {} failed",
        summary.total, summary.scored, summary.failed
    )
}

/// Model documentation: formula, applicability and variable table
pub fn format_model_doc(model: &ModelDefinition, use_colors: bool) -> String {
    let mut lines = Vec::new();

    let title = format!("{} ({})", model.name, model.id);
    lines.push(if use_colors { title.bold().to_string() } else { title });

    let applies = match model.population {
        Some(range) => format!("Applies to municipalities with population in {}", range),
        None => "Companion model, scored alongside the population-selected model".to_string(),
    };
    lines.push(applies);
    lines.push(String::new());

    let terms: Vec<String> = (1..=model.variables.len())
        .map(|i| format!("β{i}·X{i}"))
        .collect();
    let formula = if terms.is_empty() {
        "Result = β0".to_string()
    } else {
        format!("Result = β0 + {}", terms.join(" + "))
    };
    lines.push(formula);
    lines.push(format!("  β0 (intercept) = {}", format_value(model.intercept)));
    if !model.municipalities.is_empty() {
        lines.push(format!(
            "  + municipality fixed effect ({} municipalities)",
            model.municipalities.len()
        ));
    }
    lines.push(String::new());

    for (i, var) in model.variables.iter().enumerate() {
        let range = match (var.kind, var.min, var.max) {
            (VariableKind::Boolean, _, _) => "0/1".to_string(),
            (_, None, None) => "any".to_string(),
            (_, min, max) => format!(
                "[{}, {}]",
                min.map_or("-∞".to_string(), format_value),
                max.map_or("∞".to_string(), format_value)
            ),
        };
        let name = format!("X{} {}", i + 1, var.name);
        let line = format!(
            "  {:<24} β={:<12} {:<8} {:<16} {}",
            name,
            format_value(model.coefficient(&var.name)),
            var.kind,
            range,
            var.description
        );
        lines.push(line.trim_end().to_string());
    }

    lines.join("\n")
}
