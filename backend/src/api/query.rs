//! Query document resolution.
//!
//! Only two root fields exist, so the document is not fully parsed: the
//! first field of the first selection set picks the operation, and its
//! argument list is read for the upload content.
//!
//! ```text
//! mutation Up($csv: String!) { uploadCSV(fileContent: $csv) }
//!                              ^^^^^^^^^ ^^^^^^^^^^^^^^^^^^
//!                              operation  argument (literal or variable)
//! ```
//!
//! `read` lives on the query root and `uploadCSV` on the mutation root; a
//! field under the wrong keyword is rejected.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::config::UPLOAD_ARGUMENT_NAMES;
use crate::dispatch::{Argument, Operation, OperationRequest};
use crate::error::{PipelineError, PipelineResult};

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?P<comment>#[^\n]*)"#,
        r#"|(?P<block>"{3}(?s:(?:\\"{3}|.)*?)"{3})"#,
        r#"|(?P<string>"(?:[^"\\\n]|\\.)*")"#,
        r#"|(?P<variable>\$[_A-Za-z][_0-9A-Za-z]*)"#,
        r#"|(?P<name>[_A-Za-z][_0-9A-Za-z]*)"#,
        r#"|(?P<number>-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)"#,
        r#"|(?P<punct>[{}()\[\]:!=@,])"#,
    ))
    .expect("token pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Str(&'a str),
    Block(&'a str),
    Var(&'a str),
    Name(&'a str),
    Num,
    Punct(char),
}

fn tokenize(query: &str) -> Vec<Token<'_>> {
    TOKEN
        .captures_iter(query)
        .filter_map(|caps| {
            if let Some(m) = caps.name("block") {
                let raw = m.as_str();
                Some(Token::Block(&raw[3..raw.len() - 3]))
            } else if let Some(m) = caps.name("string") {
                Some(Token::Str(m.as_str()))
            } else if let Some(m) = caps.name("variable") {
                Some(Token::Var(&m.as_str()[1..]))
            } else if let Some(m) = caps.name("name") {
                Some(Token::Name(m.as_str()))
            } else if caps.name("number").is_some() {
                Some(Token::Num)
            } else {
                caps.name("punct")
                    .and_then(|m| m.as_str().chars().next())
                    .map(Token::Punct)
            }
        })
        .collect()
}

/// Value of a `"""` block string: common indentation and blank first/last
/// lines removed, `\"""` unescaped.
fn block_string_value(raw: &str) -> String {
    let raw = raw.replace("\\\"\"\"", "\"\"\"");
    let lines: Vec<&str> = raw.lines().collect();

    let indent = lines
        .iter()
        .skip(1)
        .filter_map(|line| {
            let width = line.len() - line.trim_start_matches([' ', '\t']).len();
            (width < line.len()).then_some(width)
        })
        .min()
        .unwrap_or(0);

    let mut lines: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| if i == 0 { *line } else { line.get(indent..).unwrap_or("") })
        .collect();

    let is_blank = |line: &&str| line.trim_matches([' ', '\t']).is_empty();
    while lines.first().map_or(false, is_blank) {
        lines.remove(0);
    }
    while lines.last().map_or(false, is_blank) {
        lines.pop();
    }
    lines.join("\n")
}

/// Root type of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootType {
    Query,
    Mutation,
}

impl RootType {
    fn of(operation: Operation) -> Self {
        match operation {
            Operation::Read => RootType::Query,
            Operation::UploadCsv => RootType::Mutation,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            RootType::Query => "Query",
            RootType::Mutation => "Mutation",
        }
    }
}

/// An operation picked out of a query document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOperation {
    pub operation: Operation,
    /// Key under `data` in the response (the alias, if any)
    pub response_key: String,
    pub argument: Argument,
}

impl ResolvedOperation {
    pub fn into_request(self) -> OperationRequest {
        OperationRequest {
            operation: self.operation,
            argument: self.argument,
        }
    }
}

/// Resolve a request into an operation.
///
/// An empty `query` falls back to `operation_name`, with the upload
/// argument taken straight from `variables`.
pub fn resolve(
    query: Option<&str>,
    operation_name: Option<&str>,
    variables: &Map<String, Value>,
) -> PipelineResult<ResolvedOperation> {
    match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => resolve_document(query, variables),
        None => {
            let name = operation_name.ok_or_else(|| {
                PipelineError::BadRequest("Must provide a query string".to_string())
            })?;
            let operation: Operation = name.parse()?;
            Ok(ResolvedOperation {
                operation,
                response_key: operation.field_name().to_string(),
                argument: upload_argument_from_variables(operation, variables),
            })
        }
    }
}

fn upload_argument_from_variables(operation: Operation, variables: &Map<String, Value>) -> Argument {
    match operation {
        Operation::Read => Argument::None,
        Operation::UploadCsv => Argument::from_json(
            UPLOAD_ARGUMENT_NAMES
                .iter()
                .find_map(|name| variables.get(*name)),
        ),
    }
}

fn resolve_document(query: &str, variables: &Map<String, Value>) -> PipelineResult<ResolvedOperation> {
    let tokens = tokenize(query);
    let root = match tokens.first() {
        Some(Token::Name("mutation")) => RootType::Mutation,
        Some(Token::Name("query")) | Some(Token::Punct('{')) => RootType::Query,
        Some(Token::Name(other)) => {
            return Err(PipelineError::BadRequest(format!(
                "Unsupported operation type '{}'",
                other
            )))
        }
        _ => {
            return Err(PipelineError::BadRequest(
                "Query document has no operation".to_string(),
            ))
        }
    };

    let mut iter = tokens
        .iter()
        .copied()
        .skip_while(|t| *t != Token::Punct('{'))
        .skip(1)
        .peekable();

    let first = match iter.next() {
        Some(Token::Name(name)) => name,
        _ => {
            return Err(PipelineError::BadRequest(
                "Query document has no field selection".to_string(),
            ))
        }
    };

    let (response_key, field) = if iter.peek() == Some(&Token::Punct(':')) {
        iter.next();
        match iter.next() {
            Some(Token::Name(name)) => (first, name),
            _ => return Err(PipelineError::BadRequest("Alias without field".to_string())),
        }
    } else {
        (first, first)
    };

    let operation: Operation = field.parse()?;
    if RootType::of(operation) != root {
        return Err(PipelineError::BadRequest(format!(
            "Cannot query field '{}' on type '{}'",
            field,
            root.name()
        )));
    }

    let mut arguments: Vec<(&str, Argument)> = Vec::new();
    if iter.peek() == Some(&Token::Punct('(')) {
        iter.next();
        loop {
            match iter.next() {
                Some(Token::Punct(')')) => break,
                Some(Token::Punct(',')) => continue,
                Some(Token::Name(name)) => {
                    if iter.next() != Some(Token::Punct(':')) {
                        return Err(PipelineError::BadRequest(format!(
                            "Expected ':' after argument '{}'",
                            name
                        )));
                    }
                    let value = argument_value(&mut iter, variables)?;
                    arguments.push((name, value));
                }
                _ => {
                    return Err(PipelineError::BadRequest(
                        "Unterminated argument list".to_string(),
                    ))
                }
            }
        }
    }

    let argument = match operation {
        Operation::Read => match arguments.into_iter().next() {
            Some((_, arg)) => arg,
            None => Argument::None,
        },
        Operation::UploadCsv => UPLOAD_ARGUMENT_NAMES
            .iter()
            .find_map(|wanted| {
                arguments
                    .iter()
                    .position(|(name, _)| name == wanted)
                    .map(|i| arguments.swap_remove(i).1)
            })
            .unwrap_or(Argument::None),
    };

    Ok(ResolvedOperation {
        operation,
        response_key: response_key.to_string(),
        argument,
    })
}

fn argument_value<'a, I>(iter: &mut I, variables: &Map<String, Value>) -> PipelineResult<Argument>
where
    I: Iterator<Item = Token<'a>>,
{
    match iter.next() {
        Some(Token::Str(literal)) => serde_json::from_str::<String>(literal)
            .map(Argument::Inline)
            .map_err(|e| PipelineError::BadRequest(format!("Invalid string literal: {}", e))),
        Some(Token::Block(raw)) => Ok(Argument::Inline(block_string_value(raw))),
        Some(Token::Var(name)) => Ok(Argument::from_json(variables.get(name))),
        Some(Token::Num) => Ok(Argument::Unsupported("number")),
        Some(Token::Name("null")) => Ok(Argument::None),
        Some(Token::Name("true" | "false")) => Ok(Argument::Unsupported("boolean")),
        Some(Token::Name(_)) => Ok(Argument::Unsupported("enum")),
        Some(Token::Punct(open @ ('[' | '{'))) => {
            let close = if open == '[' { ']' } else { '}' };
            skip_nested(iter, open, close)?;
            Ok(Argument::Unsupported(if open == '[' { "list" } else { "object" }))
        }
        _ => Err(PipelineError::BadRequest("Missing argument value".to_string())),
    }
}

fn skip_nested<'a, I>(iter: &mut I, open: char, close: char) -> PipelineResult<()>
where
    I: Iterator<Item = Token<'a>>,
{
    let mut depth = 1usize;
    for token in iter.by_ref() {
        match token {
            Token::Punct(c) if c == open => depth += 1,
            Token::Punct(c) if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            _ => {}
        }
    }
    Err(PipelineError::BadRequest(format!("Unclosed '{}'", open)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn resolve_query(query: &str) -> PipelineResult<ResolvedOperation> {
        resolve(Some(query), None, &Map::new())
    }

    #[test]
    fn test_shorthand_read() {
        let resolved = resolve_query("{ read }").unwrap();
        assert_eq!(resolved.operation, Operation::Read);
        assert_eq!(resolved.response_key, "read");
        assert_eq!(resolved.argument, Argument::None);
    }

    #[test]
    fn test_named_query_called_read() {
        let resolved = resolve_query("query read { read }").unwrap();
        assert_eq!(resolved.operation, Operation::Read);
    }

    #[test]
    fn test_inline_string_argument() {
        let resolved =
            resolve_query(r#"mutation { uploadCSV(fileContent: "a,b\nc,d") }"#).unwrap();
        assert_eq!(resolved.operation, Operation::UploadCsv);
        assert_eq!(resolved.argument, Argument::Inline("a,b\nc,d".into()));
    }

    #[test]
    fn test_variable_argument() {
        let resolved = resolve(
            Some("mutation Up($csv: String!) { uploadCSV(file: $csv) }"),
            None,
            &vars(json!({ "csv": "x,y" })),
        )
        .unwrap();
        assert_eq!(resolved.argument, Argument::Inline("x,y".into()));
    }

    #[test]
    fn test_non_string_arguments() {
        let cases = [
            ("mutation { uploadCSV(fileContent: 42) }", "number"),
            ("mutation { uploadCSV(fileContent: true) }", "boolean"),
            ("mutation { uploadCSV(fileContent: [\"a\"]) }", "list"),
            ("mutation { uploadCSV(fileContent: {a: \"b\"}) }", "object"),
        ];
        for (query, kind) in cases {
            assert_eq!(
                resolve_query(query).unwrap().argument,
                Argument::Unsupported(kind),
                "{query}"
            );
        }
    }

    #[test]
    fn test_alias() {
        let resolved = resolve_query("{ dataset: read }").unwrap();
        assert_eq!(resolved.operation, Operation::Read);
        assert_eq!(resolved.response_key, "dataset");
    }

    #[test]
    fn test_comments_ignored() {
        let resolved = resolve_query("# fetch it\n{ # the dataset\n read }").unwrap();
        assert_eq!(resolved.operation, Operation::Read);
    }

    #[test]
    fn test_unknown_field() {
        let err = resolve_query("{ hello }").unwrap_err();
        assert!(matches!(err, PipelineError::BadRequest(_)));
    }

    #[test]
    fn test_no_selection() {
        assert!(resolve_query("query").is_err());
        assert!(resolve(None, None, &Map::new()).is_err());
    }

    #[test]
    fn test_unterminated_arguments() {
        let err = resolve_query("mutation { uploadCSV(fileContent: \"a\" }").unwrap_err();
        assert!(matches!(err, PipelineError::BadRequest(_)));
    }

    #[test]
    fn test_block_string_argument() {
        let query = "mutation {\n  uploadCSV(fileContent: \"\"\"\n    a,b\n    \"q\",d\n  \"\"\")\n}";
        let resolved = resolve_query(query).unwrap();
        assert_eq!(resolved.argument, Argument::Inline("a,b\n\"q\",d".into()));
    }

    #[test]
    fn test_block_string_escaped_delimiter() {
        let query = r#"mutation { uploadCSV(fileContent: """x,\"""y""") }"#;
        let resolved = resolve_query(query).unwrap();
        assert_eq!(resolved.argument, Argument::Inline("x,\"\"\"y".into()));
    }

    #[test]
    fn test_field_must_match_operation_type() {
        for query in [
            "query { uploadCSV(fileContent: \"a\") }",
            "{ uploadCSV(fileContent: \"a\") }",
            "mutation { read }",
            "subscription { read }",
        ] {
            let err = resolve_query(query).unwrap_err();
            assert!(matches!(err, PipelineError::BadRequest(_)), "{query}");
        }
    }

    #[test]
    fn test_operation_name_fallback() {
        let resolved = resolve(
            None,
            Some("uploadCSV"),
            &vars(json!({ "fileContent": "1,2" })),
        )
        .unwrap();
        assert_eq!(resolved.operation, Operation::UploadCsv);
        assert_eq!(resolved.argument, Argument::Inline("1,2".into()));
    }
}
