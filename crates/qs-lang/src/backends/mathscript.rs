//! The legacy MathScript backend, kept for questions authored before the
//! sandboxed engine existed. The language is deliberately small: newline or
//! semicolon separated statements, `name = expr` assignments,
//! `f(a, b) = expr` single-expression function definitions, and arithmetic,
//! comparison, and logical operators over numbers, text, and booleans.
//! There is no loop construct, so the only resource budget it needs is a
//! call-depth cap on recursive user functions.

use std::collections::BTreeMap;

use qs_core::{loose_equals, numeric_value, Bindings, FunctionBindings, LanguageError, Value};

use crate::interpreter::Interpreter;
use crate::summary::{summarize_environment, FunctionStubber};

const MAX_CALL_DEPTH: usize = 64;
const MAX_EXPR_NESTING: usize = 64;
const MAX_STATEMENT_TOKENS: usize = 512;

pub struct MathScriptBackend {
    variables: Bindings,
    functions: BTreeMap<String, UserFunction>,
    stubber: FunctionStubber,
}

#[derive(Debug, Clone)]
struct UserFunction {
    params: Vec<String>,
    body: Expr,
    source: String,
}

impl MathScriptBackend {
    pub fn new(variables: Bindings, functions: FunctionBindings) -> Self {
        let mut backend = Self {
            variables,
            functions: BTreeMap::new(),
            stubber: FunctionStubber::new(),
        };
        backend.set_functions(functions);
        backend
    }
}

impl Interpreter for MathScriptBackend {
    fn name(&self) -> &'static str {
        "MathScript"
    }

    /// Runs a statement block and returns the last statement's value.
    fn execute(&mut self, code: &str) -> Result<Value, LanguageError> {
        let mut last = Value::Text(String::new());
        for (line, text) in split_statements(code) {
            let statement = parse_statement(&text, line)?;
            match statement {
                Stmt::Assign(name, expr) => {
                    let value = self.eval(&expr, &Bindings::new(), line, 0)?;
                    self.variables.insert(name, value.clone());
                    last = value;
                }
                Stmt::Define { name, params, body } => {
                    self.functions.insert(
                        name,
                        UserFunction {
                            params,
                            body,
                            source: text.trim().to_string(),
                        },
                    );
                }
                Stmt::Expr(expr) => {
                    last = self.eval(&expr, &Bindings::new(), line, 0)?;
                }
            }
        }
        Ok(last)
    }

    /// Evaluates a single expression. Assignments and definitions are
    /// rejected, so evaluation can never mutate the environment.
    fn evaluate(&mut self, expr: &str) -> Result<Value, LanguageError> {
        match parse_statement(expr, 1)? {
            Stmt::Expr(parsed) => self.eval(&parsed, &Bindings::new(), 1, 0),
            _ => Err(LanguageError::Syntax(
                "1: expected an expression".to_string(),
            )),
        }
    }

    fn get_variables(&self) -> Bindings {
        self.variables.clone()
    }

    fn set_variables(&mut self, variables: Bindings) {
        if variables.is_empty() {
            return;
        }
        self.variables = variables;
    }

    fn get_functions(&self) -> FunctionBindings {
        self.functions
            .iter()
            .map(|(name, function)| (name.clone(), function.source.clone()))
            .collect()
    }

    /// Restores functions from their persisted source text. Entries that no
    /// longer parse are dropped rather than failing the whole restore.
    fn set_functions(&mut self, functions: FunctionBindings) {
        if functions.is_empty() {
            return;
        }
        self.functions.clear();
        for (name, source) in functions {
            if let Ok(Stmt::Define { params, body, .. }) = parse_statement(&source, 1) {
                self.functions.insert(
                    name,
                    UserFunction {
                        params,
                        body,
                        source: source.trim().to_string(),
                    },
                );
            }
        }
    }

    fn summarize_variables(&mut self) -> BTreeMap<String, String> {
        let functions = self.get_functions();
        summarize_environment(&self.variables, &functions, &mut self.stubber)
    }
}

impl MathScriptBackend {
    fn eval(
        &self,
        expr: &Expr,
        locals: &Bindings,
        line: usize,
        depth: usize,
    ) -> Result<Value, LanguageError> {
        match expr {
            Expr::Number(value) => Ok(Value::Number(*value)),
            Expr::Text(value) => Ok(Value::Text(value.clone())),
            Expr::Var(name) => locals
                .get(name)
                .or_else(|| self.variables.get(name))
                .cloned()
                .ok_or_else(|| {
                    LanguageError::Runtime(format!("{}: undefined variable \"{}\"", line, name))
                }),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand, locals, line, depth)?;
                match op {
                    UnaryOp::Neg => Ok(Value::Number(-self.number(&value, line)?)),
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                }
            }
            Expr::Binary(op, lhs, rhs) => self.eval_binary(*op, lhs, rhs, locals, line, depth),
            Expr::Call(name, args) => self.eval_call(name, args, locals, line, depth),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        locals: &Bindings,
        line: usize,
        depth: usize,
    ) -> Result<Value, LanguageError> {
        // Logical operators short-circuit before the right side runs.
        if op == BinaryOp::And {
            let left = self.eval(lhs, locals, line, depth)?;
            if !left.is_truthy() {
                return Ok(Value::Bool(false));
            }
            let right = self.eval(rhs, locals, line, depth)?;
            return Ok(Value::Bool(right.is_truthy()));
        }
        if op == BinaryOp::Or {
            let left = self.eval(lhs, locals, line, depth)?;
            if left.is_truthy() {
                return Ok(Value::Bool(true));
            }
            let right = self.eval(rhs, locals, line, depth)?;
            return Ok(Value::Bool(right.is_truthy()));
        }

        let left = self.eval(lhs, locals, line, depth)?;
        let right = self.eval(rhs, locals, line, depth)?;

        match op {
            BinaryOp::Eq => Ok(Value::Bool(loose_equals(&left, &right))),
            BinaryOp::Ne => Ok(Value::Bool(!loose_equals(&left, &right))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = self.compare(&left, &right, line)?;
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering < 0,
                    BinaryOp::Le => ordering <= 0,
                    BinaryOp::Gt => ordering > 0,
                    _ => ordering >= 0,
                }))
            }
            BinaryOp::Add => match (&left, &right) {
                (Value::Text(a), Value::Text(b)) => Ok(Value::Text(format!("{}{}", a, b))),
                _ => Ok(Value::Number(
                    self.number(&left, line)? + self.number(&right, line)?,
                )),
            },
            BinaryOp::Sub => Ok(Value::Number(
                self.number(&left, line)? - self.number(&right, line)?,
            )),
            BinaryOp::Mul => Ok(Value::Number(
                self.number(&left, line)? * self.number(&right, line)?,
            )),
            BinaryOp::Div => {
                let divisor = self.number(&right, line)?;
                if divisor == 0.0 {
                    return Err(LanguageError::Runtime(format!("{}: division by zero", line)));
                }
                Ok(Value::Number(self.number(&left, line)? / divisor))
            }
            BinaryOp::Mod => {
                let divisor = self.number(&right, line)?;
                if divisor == 0.0 {
                    return Err(LanguageError::Runtime(format!("{}: modulo by zero", line)));
                }
                Ok(Value::Number(self.number(&left, line)? % divisor))
            }
            BinaryOp::Pow => Ok(Value::Number(
                self.number(&left, line)?.powf(self.number(&right, line)?),
            )),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_call(
        &self,
        name: &str,
        args: &[Expr],
        locals: &Bindings,
        line: usize,
        depth: usize,
    ) -> Result<Value, LanguageError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, locals, line, depth)?);
        }

        if let Some(result) = self.eval_builtin(name, &values, line)? {
            return Ok(result);
        }

        let function = self.functions.get(name).ok_or_else(|| {
            LanguageError::Runtime(format!("{}: unknown function \"{}\"", line, name))
        })?;
        if values.len() != function.params.len() {
            return Err(LanguageError::Runtime(format!(
                "{}: function \"{}\" expects {} argument(s), got {}",
                line,
                name,
                function.params.len(),
                values.len()
            )));
        }
        if depth + 1 > MAX_CALL_DEPTH {
            return Err(LanguageError::ResourceExceeded(format!(
                "{}: call depth budget of {} exceeded",
                line, MAX_CALL_DEPTH
            )));
        }

        let mut frame = Bindings::new();
        for (param, value) in function.params.iter().zip(values) {
            frame.insert(param.clone(), value);
        }
        self.eval(&function.body, &frame, line, depth + 1)
    }

    fn eval_builtin(
        &self,
        name: &str,
        args: &[Value],
        line: usize,
    ) -> Result<Option<Value>, LanguageError> {
        let unary = |f: fn(f64) -> f64| -> Result<Option<Value>, LanguageError> {
            self.expect_arity(name, args, 1, line)?;
            Ok(Some(Value::Number(f(self.number(&args[0], line)?))))
        };
        let binary = |f: fn(f64, f64) -> f64| -> Result<Option<Value>, LanguageError> {
            self.expect_arity(name, args, 2, line)?;
            Ok(Some(Value::Number(f(
                self.number(&args[0], line)?,
                self.number(&args[1], line)?,
            ))))
        };

        match name {
            "abs" => unary(f64::abs),
            "ceil" => unary(f64::ceil),
            "floor" => unary(f64::floor),
            "round" => unary(f64::round),
            "sqrt" => unary(f64::sqrt),
            "sin" => unary(f64::sin),
            "cos" => unary(f64::cos),
            "tan" => unary(f64::tan),
            "exp" => unary(f64::exp),
            "ln" => unary(f64::ln),
            "log" => unary(f64::log10),
            "min" => binary(f64::min),
            "max" => binary(f64::max),
            "pow" => binary(f64::powf),
            "len" => {
                self.expect_arity(name, args, 1, line)?;
                match &args[0] {
                    Value::Text(text) => Ok(Some(Value::Number(text.chars().count() as f64))),
                    Value::Sequence(values) => Ok(Some(Value::Number(values.len() as f64))),
                    other => Err(LanguageError::Runtime(format!(
                        "{}: len() expects text, got {}",
                        line,
                        other.type_name()
                    ))),
                }
            }
            _ => Ok(None),
        }
    }

    fn expect_arity(
        &self,
        name: &str,
        args: &[Value],
        arity: usize,
        line: usize,
    ) -> Result<(), LanguageError> {
        if args.len() != arity {
            return Err(LanguageError::Runtime(format!(
                "{}: function \"{}\" expects {} argument(s), got {}",
                line,
                name,
                arity,
                args.len()
            )));
        }
        Ok(())
    }

    fn number(&self, value: &Value, line: usize) -> Result<f64, LanguageError> {
        numeric_value(value).ok_or_else(|| {
            LanguageError::Runtime(format!(
                "{}: expected a number, got {}",
                line,
                value.type_name()
            ))
        })
    }

    /// Orders two values: numerically when both are numeric-comparable,
    /// lexicographically when both are text.
    fn compare(&self, left: &Value, right: &Value, line: usize) -> Result<i32, LanguageError> {
        if let (Some(a), Some(b)) = (numeric_value(left), numeric_value(right)) {
            return Ok(if a < b {
                -1
            } else if a > b {
                1
            } else {
                0
            });
        }
        if let (Value::Text(a), Value::Text(b)) = (left, right) {
            return Ok(match a.cmp(b) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            });
        }
        Err(LanguageError::Runtime(format!(
            "{}: cannot order {} against {}",
            line,
            left.type_name(),
            right.type_name()
        )))
    }
}

// ---------------------------------------------------------------------------
// Statement splitting

/// Splits a script into `(line, text)` statements at top-level newlines and
/// semicolons. Separators inside parentheses or string literals do not
/// split; `#` starts a comment that runs to the end of the line.
fn split_statements(source: &str) -> Vec<(usize, String)> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut line = 1usize;
    let mut start_line = 1usize;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut in_comment = false;

    let mut flush = |current: &mut String, start_line: usize| {
        if !current.trim().is_empty() {
            statements.push((start_line, std::mem::take(current)));
        } else {
            current.clear();
        }
    };

    for ch in source.chars() {
        if in_string {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            if ch == '\n' {
                line += 1;
            }
            continue;
        }
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                flush(&mut current, start_line);
                line += 1;
                start_line = line;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                current.push(ch);
            }
            '#' => in_comment = true,
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            '\n' if depth == 0 => {
                flush(&mut current, start_line);
                line += 1;
                start_line = line;
            }
            ';' if depth == 0 => flush(&mut current, start_line),
            '\n' => {
                current.push(' ');
                line += 1;
            }
            _ => current.push(ch),
        }
    }
    flush(&mut current, start_line);

    statements
}

// ---------------------------------------------------------------------------
// Lexer

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    Comma,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

fn tokenize(statement: &str, line: usize) -> Result<Vec<Token>, LanguageError> {
    let chars = statement.chars().collect::<Vec<_>>();
    let mut tokens = Vec::new();
    let mut cursor = 0usize;

    while cursor < chars.len() {
        let ch = chars[cursor];
        match ch {
            c if c.is_whitespace() => cursor += 1,
            '+' => {
                tokens.push(Token::Plus);
                cursor += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                cursor += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                cursor += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                cursor += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                cursor += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                cursor += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                cursor += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                cursor += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                cursor += 1;
            }
            '=' => {
                if chars.get(cursor + 1) == Some(&'=') {
                    tokens.push(Token::Eq);
                    cursor += 2;
                } else {
                    tokens.push(Token::Assign);
                    cursor += 1;
                }
            }
            '!' => {
                if chars.get(cursor + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    cursor += 2;
                } else {
                    tokens.push(Token::Not);
                    cursor += 1;
                }
            }
            '<' => {
                if chars.get(cursor + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    cursor += 2;
                } else {
                    tokens.push(Token::Lt);
                    cursor += 1;
                }
            }
            '>' => {
                if chars.get(cursor + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    cursor += 2;
                } else {
                    tokens.push(Token::Gt);
                    cursor += 1;
                }
            }
            '&' if chars.get(cursor + 1) == Some(&'&') => {
                tokens.push(Token::And);
                cursor += 2;
            }
            '|' if chars.get(cursor + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                cursor += 2;
            }
            '"' => {
                let (text, next) = lex_string(&chars, cursor, line)?;
                tokens.push(Token::Text(text));
                cursor = next;
            }
            c if c.is_ascii_digit() || (c == '.' && next_is_digit(&chars, cursor)) => {
                let (number, next) = lex_number(&chars, cursor, line)?;
                tokens.push(Token::Number(number));
                cursor = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = cursor;
                while cursor < chars.len()
                    && (chars[cursor].is_ascii_alphanumeric() || chars[cursor] == '_')
                {
                    cursor += 1;
                }
                tokens.push(Token::Ident(chars[start..cursor].iter().collect()));
            }
            other => {
                return Err(LanguageError::Syntax(format!(
                    "{}: unexpected character '{}'",
                    line, other
                )));
            }
        }
    }

    Ok(tokens)
}

fn next_is_digit(chars: &[char], cursor: usize) -> bool {
    chars
        .get(cursor + 1)
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false)
}

fn lex_string(
    chars: &[char],
    start: usize,
    line: usize,
) -> Result<(String, usize), LanguageError> {
    let mut text = String::new();
    let mut cursor = start + 1;
    while cursor < chars.len() {
        match chars[cursor] {
            '\\' => {
                let escaped = chars.get(cursor + 1).ok_or_else(|| {
                    LanguageError::Syntax(format!("{}: unterminated string", line))
                })?;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                cursor += 2;
            }
            '"' => return Ok((text, cursor + 1)),
            other => {
                text.push(other);
                cursor += 1;
            }
        }
    }
    Err(LanguageError::Syntax(format!(
        "{}: unterminated string",
        line
    )))
}

fn lex_number(chars: &[char], start: usize, line: usize) -> Result<(f64, usize), LanguageError> {
    let mut cursor = start;
    while cursor < chars.len() && (chars[cursor].is_ascii_digit() || chars[cursor] == '.') {
        cursor += 1;
    }
    if cursor < chars.len() && (chars[cursor] == 'e' || chars[cursor] == 'E') {
        let mut lookahead = cursor + 1;
        if matches!(chars.get(lookahead), Some('+') | Some('-')) {
            lookahead += 1;
        }
        if matches!(chars.get(lookahead), Some(c) if c.is_ascii_digit()) {
            cursor = lookahead;
            while cursor < chars.len() && chars[cursor].is_ascii_digit() {
                cursor += 1;
            }
        }
    }
    let literal = chars[start..cursor].iter().collect::<String>();
    literal
        .parse::<f64>()
        .map(|number| (number, cursor))
        .map_err(|_| LanguageError::Syntax(format!("{}: invalid number \"{}\"", line, literal)))
}

// ---------------------------------------------------------------------------
// Parser

#[derive(Debug, Clone)]
enum Stmt {
    Assign(String, Expr),
    Define {
        name: String,
        params: Vec<String>,
        body: Expr,
    },
    Expr(Expr),
}

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Text(String),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

fn parse_statement(text: &str, line: usize) -> Result<Stmt, LanguageError> {
    let tokens = tokenize(text, line)?;
    if tokens.is_empty() {
        return Err(LanguageError::Syntax(format!("{}: empty statement", line)));
    }
    // Bounds the expression tree a single statement can build, which in
    // turn bounds recursion in the parser and the evaluator.
    if tokens.len() > MAX_STATEMENT_TOKENS {
        return Err(LanguageError::ResourceExceeded(format!(
            "{}: statement exceeds the {}-token budget",
            line, MAX_STATEMENT_TOKENS
        )));
    }

    // name = expr
    if let (Some(Token::Ident(name)), Some(Token::Assign)) = (tokens.first(), tokens.get(1)) {
        let mut parser = Parser::new(&tokens[2..], line);
        let expr = parser.parse_expression(0)?;
        parser.expect_end()?;
        return Ok(Stmt::Assign(name.clone(), expr));
    }

    // name(params) = expr
    if let Some(definition) = try_parse_definition(&tokens, line)? {
        return Ok(definition);
    }

    let mut parser = Parser::new(&tokens, line);
    let expr = parser.parse_expression(0)?;
    parser.expect_end()?;
    Ok(Stmt::Expr(expr))
}

fn try_parse_definition(tokens: &[Token], line: usize) -> Result<Option<Stmt>, LanguageError> {
    let Some(Token::Ident(name)) = tokens.first() else {
        return Ok(None);
    };
    if tokens.get(1) != Some(&Token::LParen) {
        return Ok(None);
    }

    let mut params = Vec::new();
    let mut cursor = 2usize;
    loop {
        match tokens.get(cursor) {
            Some(Token::RParen) if params.is_empty() => {
                cursor += 1;
                break;
            }
            Some(Token::Ident(param)) => {
                params.push(param.clone());
                cursor += 1;
                match tokens.get(cursor) {
                    Some(Token::Comma) => cursor += 1,
                    Some(Token::RParen) => {
                        cursor += 1;
                        break;
                    }
                    _ => return Ok(None),
                }
            }
            _ => return Ok(None),
        }
    }
    if tokens.get(cursor) != Some(&Token::Assign) {
        return Ok(None);
    }

    let mut parser = Parser::new(&tokens[cursor + 1..], line);
    let body = parser.parse_expression(0)?;
    parser.expect_end()?;
    Ok(Some(Stmt::Define {
        name: name.clone(),
        params,
        body,
    }))
}

struct Parser<'a> {
    tokens: &'a [Token],
    cursor: usize,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], line: usize) -> Self {
        Self {
            tokens,
            cursor: 0,
            line,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.cursor);
        self.cursor += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect_end(&self) -> Result<(), LanguageError> {
        if self.cursor < self.tokens.len() {
            return Err(LanguageError::Syntax(format!(
                "{}: unexpected trailing tokens",
                self.line
            )));
        }
        Ok(())
    }

    // Nesting grows wherever the grammar recurses (grouping parentheses,
    // call arguments, unary chains, exponents). Past the budget the parse
    // aborts instead of overflowing the stack.
    fn check_nesting(&self, depth: usize) -> Result<(), LanguageError> {
        if depth > MAX_EXPR_NESTING {
            return Err(LanguageError::ResourceExceeded(format!(
                "{}: expression nesting budget of {} exceeded",
                self.line, MAX_EXPR_NESTING
            )));
        }
        Ok(())
    }

    fn parse_expression(&mut self, depth: usize) -> Result<Expr, LanguageError> {
        self.check_nesting(depth)?;
        self.parse_or(depth)
    }

    fn parse_or(&mut self, depth: usize) -> Result<Expr, LanguageError> {
        let mut expr = self.parse_and(depth)?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and(depth)?;
            expr = Expr::Binary(BinaryOp::Or, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self, depth: usize) -> Result<Expr, LanguageError> {
        let mut expr = self.parse_equality(depth)?;
        while self.eat(&Token::And) {
            let rhs = self.parse_equality(depth)?;
            expr = Expr::Binary(BinaryOp::And, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_equality(&mut self, depth: usize) -> Result<Expr, LanguageError> {
        let mut expr = self.parse_comparison(depth)?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                _ => break,
            };
            self.cursor += 1;
            let rhs = self.parse_comparison(depth)?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self, depth: usize) -> Result<Expr, LanguageError> {
        let mut expr = self.parse_additive(depth)?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.cursor += 1;
            let rhs = self.parse_additive(depth)?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_additive(&mut self, depth: usize) -> Result<Expr, LanguageError> {
        let mut expr = self.parse_multiplicative(depth)?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.cursor += 1;
            let rhs = self.parse_multiplicative(depth)?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self, depth: usize) -> Result<Expr, LanguageError> {
        let mut expr = self.parse_unary(depth)?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.cursor += 1;
            let rhs = self.parse_unary(depth)?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self, depth: usize) -> Result<Expr, LanguageError> {
        self.check_nesting(depth)?;
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary(depth + 1)?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        if self.eat(&Token::Not) {
            let operand = self.parse_unary(depth + 1)?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_power(depth)
    }

    fn parse_power(&mut self, depth: usize) -> Result<Expr, LanguageError> {
        let base = self.parse_primary(depth)?;
        if self.eat(&Token::Caret) {
            // Right-associative: 2 ^ 3 ^ 2 is 2 ^ (3 ^ 2).
            let exponent = self.parse_unary(depth + 1)?;
            return Ok(Expr::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_primary(&mut self, depth: usize) -> Result<Expr, LanguageError> {
        match self.advance().cloned() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Text(value)) => Ok(Expr::Text(value)),
            Some(Token::Ident(name)) => {
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.parse_expression(depth + 1)?);
                            if self.eat(&Token::RParen) {
                                break;
                            }
                            if !self.eat(&Token::Comma) {
                                return Err(LanguageError::Syntax(format!(
                                    "{}: expected ',' or ')' in argument list",
                                    self.line
                                )));
                            }
                        }
                    }
                    return Ok(Expr::Call(name, args));
                }
                match name.as_str() {
                    "true" => Ok(Expr::Number(1.0)),
                    "false" => Ok(Expr::Number(0.0)),
                    _ => Ok(Expr::Var(name)),
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression(depth + 1)?;
                if !self.eat(&Token::RParen) {
                    return Err(LanguageError::Syntax(format!(
                        "{}: expected ')'",
                        self.line
                    )));
                }
                Ok(expr)
            }
            Some(other) => Err(LanguageError::Syntax(format!(
                "{}: unexpected token {:?}",
                self.line, other
            ))),
            None => Err(LanguageError::Syntax(format!(
                "{}: unexpected end of statement",
                self.line
            ))),
        }
    }
}
