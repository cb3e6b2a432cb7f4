//! Deterministic local arithmetic, used by the mock provider adapter to
//! exercise a real tool round-trip without any network dependency.

use evoagent_domain::envelope::{Lineage, ToolExecutionError};
use serde_json::{json, Value};

use crate::registry::ToolHandler;

pub struct CalcTool;

#[async_trait::async_trait]
impl ToolHandler for CalcTool {
    async fn call(&self, payload: Value, _lineage: &Lineage) -> Result<Value, ToolExecutionError> {
        let expression = payload
            .get("expression")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolExecutionError::validation("'expression' is required"))?;

        let value = eval_arithmetic(expression)
            .map_err(|e| ToolExecutionError::validation(format!("unsupported expression: {e}")))?;

        Ok(json!({
            "expression": expression,
            "value": value,
        }))
    }
}

pub const CALC_DESCRIPTION: &str = "WHEN: Evaluate a basic arithmetic expression for deterministic local computation.\nAVOID: Passing non-arithmetic or unsafe code-like expressions.\nCRITICAL_ARGS: expression.\nRETURNS: numeric evaluation result.\nFAILS_IF: expression is missing or unsupported.";

pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "expression": {"type": "string", "description": "Arithmetic expression, e.g. (2+3)*4"}
        },
        "required": ["expression"],
    })
}

/// Evaluates `+ - * / %` with parentheses and unary minus over `f64`.
/// Deliberately minimal — there is no general expression language in
/// scope, only what the mock provider needs to trigger a tool call.
fn eval_arithmetic(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut pos = 0;
    let value = parse_expr(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err("trailing tokens".into());
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num = text.parse::<f64>().map_err(|_| format!("bad number '{text}'"))?;
                tokens.push(Token::Num(num));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    let mut value = parse_term(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::Plus) => {
                *pos += 1;
                value += parse_term(tokens, pos)?;
            }
            Some(Token::Minus) => {
                *pos += 1;
                value -= parse_term(tokens, pos)?;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_term(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    let mut value = parse_unary(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::Star) => {
                *pos += 1;
                value *= parse_unary(tokens, pos)?;
            }
            Some(Token::Slash) => {
                *pos += 1;
                let rhs = parse_unary(tokens, pos)?;
                if rhs == 0.0 {
                    return Err("division by zero".into());
                }
                value /= rhs;
            }
            Some(Token::Percent) => {
                *pos += 1;
                let rhs = parse_unary(tokens, pos)?;
                value %= rhs;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_unary(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    if let Some(Token::Minus) = tokens.get(*pos) {
        *pos += 1;
        return Ok(-parse_unary(tokens, pos)?);
    }
    parse_atom(tokens, pos)
}

fn parse_atom(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    match tokens.get(*pos) {
        Some(Token::Num(n)) => {
            *pos += 1;
            Ok(*n)
        }
        Some(Token::LParen) => {
            *pos += 1;
            let value = parse_expr(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Token::RParen) => {
                    *pos += 1;
                    Ok(value)
                }
                _ => Err("expected ')'".into()),
            }
        }
        _ => Err("expected a number or '('".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn lineage() -> Lineage {
        Lineage {
            thread_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            tool_use_id: "call-1".into(),
        }
    }

    #[tokio::test]
    async fn evaluates_nested_expression() {
        let out = CalcTool
            .call(json!({"expression": "(2 + 3) * 4"}), &lineage())
            .await
            .unwrap();
        assert_eq!(out["value"], 20.0);
    }

    #[tokio::test]
    async fn missing_expression_is_validation_error() {
        let err = CalcTool.call(json!({}), &lineage()).await.unwrap_err();
        assert_eq!(err.code, evoagent_domain::envelope::ToolErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn division_by_zero_is_validation_error() {
        let err = CalcTool
            .call(json!({"expression": "1 / 0"}), &lineage())
            .await
            .unwrap_err();
        assert_eq!(err.code, evoagent_domain::envelope::ToolErrorCode::ValidationError);
    }
}
