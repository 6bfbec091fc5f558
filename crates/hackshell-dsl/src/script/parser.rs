use super::ast::{AssignOp, BinaryOp, Expr, Literal, LogicalOp, ScriptAst, Stmt, UnaryOp};
use super::lexer::{Spanned, Token};
use super::ScriptSyntaxError;

const MAX_PARAMS: usize = 2;

/// Deepest nesting of expressions and blocks a script may use.
pub const MAX_NESTING: usize = 64;

/// Words that never name a variable.
const RESERVED: &[&str] = &[
    "function", "let", "const", "var", "if", "else", "while", "for", "of", "break", "continue",
    "return", "typeof", "new", "this", "class", "delete", "in", "do", "throw", "try",
];

type ParseResult<T> = Result<T, ScriptSyntaxError>;

/// Parses rewritten tokens into a script.
///
/// The token stream must be exactly one `function [name](a, b) { ... }`;
/// anything else is a [`ScriptSyntaxError::Signature`].
pub fn parse_script(tokens: &[Spanned]) -> ParseResult<ScriptAst> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let (name, params) = parser.signature()?;
    let body = parser.statements_until_close()?;

    while parser.eat_punct(";") {}
    if parser.peek().is_some() {
        return Err(parser.unexpected());
    }

    Ok(ScriptAst { name, params, body })
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |s| s.line)
    }

    fn at_punct(&self, p: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(p))
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(word))
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> ParseResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> ScriptSyntaxError {
        let message = match self.peek() {
            None => "Unexpected end of input".to_string(),
            Some(Token::Number(_)) => "Unexpected number".to_string(),
            Some(Token::Str(_)) => "Unexpected string".to_string(),
            Some(Token::Ident(word)) if !RESERVED.contains(&word.as_str()) => {
                format!("Unexpected identifier '{word}'")
            }
            Some(token) => format!("Unexpected token '{}'", token.describe()),
        };
        ScriptSyntaxError::Syntax {
            line: self.line(),
            message,
        }
    }

    /// Runs `f` one nesting level deeper, failing once the limit is hit.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(ScriptSyntaxError::Syntax {
                line: self.line(),
                message: "Maximum nesting depth exceeded".to_string(),
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn binding_name(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(Token::Ident(word)) if !RESERVED.contains(&word.as_str()) => {
                self.pos += 1;
                Ok(word.clone())
            }
            _ => Err(self.unexpected()),
        }
    }

    fn bad_signature(&self) -> ScriptSyntaxError {
        ScriptSyntaxError::Signature { line: self.line() }
    }

    fn signature(&mut self) -> ParseResult<(Option<String>, Vec<String>)> {
        if !self.at_keyword("function") {
            return Err(self.bad_signature());
        }
        self.pos += 1;

        let name = match self.peek() {
            Some(Token::Ident(word)) if !RESERVED.contains(&word.as_str()) => {
                self.pos += 1;
                Some(word.clone())
            }
            _ => None,
        };

        if !self.eat_punct("(") {
            return Err(self.bad_signature());
        }
        let mut params = Vec::new();
        if !self.eat_punct(")") {
            loop {
                match self.peek() {
                    Some(Token::Ident(word)) if !RESERVED.contains(&word.as_str()) => {
                        self.pos += 1;
                        params.push(word.clone());
                    }
                    _ => return Err(self.bad_signature()),
                }
                if self.eat_punct(")") {
                    break;
                }
                if !self.eat_punct(",") {
                    return Err(self.bad_signature());
                }
            }
        }
        if params.len() > MAX_PARAMS {
            return Err(self.bad_signature());
        }

        if !self.eat_punct("{") {
            return Err(self.bad_signature());
        }
        Ok((name, params))
    }

    /// Statements up to and including the closing `}`.
    fn statements_until_close(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            if self.eat_punct("}") {
                return Ok(body);
            }
            if self.peek().is_none() {
                return Err(self.unexpected());
            }
            if let Some(stmt) = self.statement()? {
                body.push(stmt);
            }
        }
    }

    /// A braced block or a single statement.
    fn body(&mut self) -> ParseResult<Vec<Stmt>> {
        if self.eat_punct("{") {
            return self.statements_until_close();
        }
        Ok(self.statement()?.into_iter().collect())
    }

    fn parenthesized(&mut self) -> ParseResult<Expr> {
        self.expect_punct("(")?;
        let expr = self.expression()?;
        self.expect_punct(")")?;
        Ok(expr)
    }

    fn statement(&mut self) -> ParseResult<Option<Stmt>> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> ParseResult<Option<Stmt>> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected());
        };

        let stmt = match token {
            Token::Punct(";") => {
                self.pos += 1;
                return Ok(None);
            }
            Token::Punct("{") => {
                self.pos += 1;
                Stmt::Block(self.statements_until_close()?)
            }
            Token::Ident(word) => match word.as_str() {
                "let" | "const" | "var" => {
                    self.pos += 1;
                    let name = self.binding_name()?;
                    let value = if self.eat_punct("=") {
                        self.expression()?
                    } else {
                        Expr::Literal(Literal::Null)
                    };
                    Stmt::Let { name, value }
                }
                "if" => {
                    self.pos += 1;
                    let test = self.parenthesized()?;
                    let then = self.body()?;
                    let otherwise = if self.at_keyword("else") {
                        self.pos += 1;
                        self.body()?
                    } else {
                        Vec::new()
                    };
                    Stmt::If {
                        test,
                        then,
                        otherwise,
                    }
                }
                "while" => {
                    self.pos += 1;
                    let test = self.parenthesized()?;
                    let body = self.body()?;
                    Stmt::While { test, body }
                }
                "for" => {
                    self.pos += 1;
                    self.expect_punct("(")?;
                    if !(self.at_keyword("let") || self.at_keyword("const") || self.at_keyword("var")) {
                        return Err(self.unexpected());
                    }
                    self.pos += 1;
                    let binding = self.binding_name()?;
                    if !self.at_keyword("of") {
                        return Err(self.unexpected());
                    }
                    self.pos += 1;
                    let iterable = self.expression()?;
                    self.expect_punct(")")?;
                    let body = self.body()?;
                    Stmt::ForOf {
                        binding,
                        iterable,
                        body,
                    }
                }
                "break" => {
                    self.pos += 1;
                    Stmt::Break
                }
                "continue" => {
                    self.pos += 1;
                    Stmt::Continue
                }
                "return" => {
                    let line = self.line();
                    self.pos += 1;
                    let bare = match self.tokens.get(self.pos) {
                        None => true,
                        Some(next) => {
                            next.line != line || next.token.is_punct(";") || next.token.is_punct("}")
                        }
                    };
                    if bare {
                        Stmt::Return(None)
                    } else {
                        Stmt::Return(Some(self.expression()?))
                    }
                }
                _ => self.expression_statement()?,
            },
            _ => self.expression_statement()?,
        };

        self.eat_punct(";");
        Ok(Some(stmt))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;

        let op = match self.peek() {
            Some(Token::Punct("=")) => Some(AssignOp::Set),
            Some(Token::Punct("+=")) => Some(AssignOp::Add),
            Some(Token::Punct("-=")) => Some(AssignOp::Sub),
            _ => None,
        };
        if let Some(op) = op {
            self.check_place(&expr)?;
            self.pos += 1;
            let value = self.expression()?;
            return Ok(Stmt::Assign {
                target: expr,
                op,
                value,
            });
        }

        let step = match self.peek() {
            Some(Token::Punct("++")) => Some(AssignOp::Add),
            Some(Token::Punct("--")) => Some(AssignOp::Sub),
            _ => None,
        };
        if let Some(op) = step {
            self.check_place(&expr)?;
            self.pos += 1;
            return Ok(Stmt::Assign {
                target: expr,
                op,
                value: Expr::Literal(Literal::Number(1.0)),
            });
        }

        Ok(Stmt::Expr(expr))
    }

    fn check_place(&self, expr: &Expr) -> ParseResult<()> {
        if expr.is_place() {
            Ok(())
        } else {
            Err(ScriptSyntaxError::Syntax {
                line: self.line(),
                message: "Invalid left-hand side in assignment".to_string(),
            })
        }
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> ParseResult<Expr> {
        let test = self.logical_or()?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.expression()?;
        self.expect_punct(":")?;
        let alternate = self.expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn logical_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.logical_and()?;
        while self.eat_punct("||") {
            let right = self.logical_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.binary(0)?;
        while self.eat_punct("&&") {
            let right = self.binary(0)?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Precedence climbing over the left-associative binary tiers.
    fn binary(&mut self, tier: usize) -> ParseResult<Expr> {
        const TIERS: &[&[(&str, BinaryOp)]] = &[
            &[
                ("===", BinaryOp::Eq),
                ("==", BinaryOp::Eq),
                ("!==", BinaryOp::Ne),
                ("!=", BinaryOp::Ne),
            ],
            &[
                ("<=", BinaryOp::Le),
                ("<", BinaryOp::Lt),
                (">=", BinaryOp::Ge),
                (">", BinaryOp::Gt),
            ],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
        ];

        let Some(ops) = TIERS.get(tier) else {
            return self.unary();
        };

        let mut left = self.binary(tier + 1)?;
        loop {
            let Some(&(_, op)) = ops
                .iter()
                .find(|(p, _)| self.peek().is_some_and(|t| t.is_punct(p)))
            else {
                return Ok(left);
            };
            self.pos += 1;
            let right = self.binary(tier + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek() {
            Some(Token::Punct("!")) => Some(UnaryOp::Not),
            Some(Token::Punct("-")) => Some(UnaryOp::Neg),
            Some(Token::Ident(w)) if w == "typeof" => Some(UnaryOp::TypeOf),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                let operand = self.nested(Self::unary)?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct(".") {
                let property = match self.peek() {
                    Some(Token::Ident(name)) => name.clone(),
                    _ => return Err(self.unexpected()),
                };
                self.pos += 1;
                if self.eat_punct("(") {
                    let args = self.arguments()?;
                    expr = Expr::MethodCall {
                        object: Box::new(expr),
                        method: property,
                        args,
                    };
                } else {
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                    };
                }
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat_punct("(") {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions after an opening `(`, through the `)`.
    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            args.push(self.expression()?);
            if !self.at_punct(")") {
                self.expect_punct(",")?;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected());
        };

        let expr = match token {
            Token::Number(n) => Expr::Literal(Literal::Number(*n)),
            Token::Str(s) => Expr::Literal(Literal::String(s.clone())),
            Token::Ident(word) => match word.as_str() {
                "true" => Expr::Literal(Literal::Bool(true)),
                "false" => Expr::Literal(Literal::Bool(false)),
                "null" | "undefined" => Expr::Literal(Literal::Null),
                w if RESERVED.contains(&w) => return Err(self.unexpected()),
                _ => Expr::Ident(word.clone()),
            },
            Token::CallSite(site) => {
                self.pos += 1;
                let mut argument = None;
                if self.eat_punct("(") && !self.eat_punct(")") {
                    argument = Some(Box::new(self.expression()?));
                    self.expect_punct(")")?;
                }
                return Ok(Expr::CallSite {
                    site: site.clone(),
                    argument,
                });
            }
            Token::Punct("(") => {
                return self.parenthesized();
            }
            Token::Punct("[") => {
                self.pos += 1;
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    items.push(self.expression()?);
                    if !self.at_punct("]") {
                        self.expect_punct(",")?;
                    }
                }
                return Ok(Expr::Array(items));
            }
            Token::Punct("{") => {
                self.pos += 1;
                return self.object_literal();
            }
            _ => return Err(self.unexpected()),
        };

        self.pos += 1;
        Ok(expr)
    }

    fn object_literal(&mut self) -> ParseResult<Expr> {
        let mut fields = Vec::new();
        while !self.eat_punct("}") {
            let (key, bare) = match self.peek() {
                Some(Token::Ident(name)) => (name.clone(), true),
                Some(Token::Str(s)) => (s.clone(), false),
                Some(Token::Number(n)) => (crate::value::format_number(*n), false),
                _ => return Err(self.unexpected()),
            };
            self.pos += 1;

            let value = if bare && (self.at_punct(",") || self.at_punct("}")) {
                Expr::Ident(key.clone())
            } else {
                self.expect_punct(":")?;
                self.expression()?
            };
            fields.push((key, value));

            if !self.at_punct("}") {
                self.expect_punct(",")?;
            }
        }
        Ok(Expr::Object(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse(source: &str) -> ParseResult<ScriptAst> {
        parse_script(&tokenize(source).unwrap())
    }

    #[test]
    fn accepts_named_and_anonymous_functions() {
        let ast = parse("function (context, args) { return 1 }").unwrap();
        assert_eq!(ast.name, None);
        assert_eq!(ast.params, vec!["context", "args"]);
        assert_eq!(
            ast.body,
            vec![Stmt::Return(Some(Expr::Literal(Literal::Number(1.0))))]
        );

        let ast = parse("function main(c) {}").unwrap();
        assert_eq!(ast.name.as_deref(), Some("main"));
        assert!(ast.body.is_empty());
    }

    #[test]
    fn rejects_bad_signatures_with_line() {
        assert_eq!(
            parse("\nreturn 1").unwrap_err(),
            ScriptSyntaxError::Signature { line: 2 }
        );
        assert_eq!(
            parse("function (a, b, c) {}").unwrap_err(),
            ScriptSyntaxError::Signature { line: 1 }
        );
        assert_eq!(
            parse("").unwrap_err(),
            ScriptSyntaxError::Signature { line: 1 }
        );
    }

    #[test]
    fn precedence_follows_javascript() {
        let ast = parse("function () { return 1 + 2 * 3 < 10 && !false }").unwrap();
        let Stmt::Return(Some(Expr::Logical { op, left, .. })) = &ast.body[0] else {
            panic!("expected logical and, got {:?}", ast.body[0]);
        };
        assert_eq!(*op, LogicalOp::And);
        let Expr::Binary { op: BinaryOp::Lt, left: sum, .. } = left.as_ref() else {
            panic!("expected comparison");
        };
        let Expr::Binary { op: BinaryOp::Add, right: product, .. } = sum.as_ref() else {
            panic!("expected addition");
        };
        assert!(matches!(
            product.as_ref(),
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn statements_and_assignments() {
        let ast = parse(
            "function (c, a) {
                let xs = [1, 2]
                for (const x of xs) { if (x > 1) break; else continue }
                a.count += 1
                n++
                while (false) {}
            }",
        )
        .unwrap();
        assert_eq!(ast.body.len(), 5);
        assert!(matches!(ast.body[2], Stmt::Assign { op: AssignOp::Add, .. }));
        assert!(matches!(ast.body[3], Stmt::Assign { op: AssignOp::Add, .. }));
    }

    #[test]
    fn reports_syntax_errors_by_line() {
        assert_eq!(
            parse("function () {\n let = 4 }").unwrap_err(),
            ScriptSyntaxError::Syntax {
                line: 2,
                message: "Unexpected token '='".into()
            }
        );
        assert_eq!(
            parse("function () {\n 1 = 2 }").unwrap_err(),
            ScriptSyntaxError::Syntax {
                line: 2,
                message: "Invalid left-hand side in assignment".into()
            }
        );
        assert_eq!(
            parse("function () { return (1").unwrap_err(),
            ScriptSyntaxError::Syntax {
                line: 1,
                message: "Unexpected end of input".into()
            }
        );
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let deep = format!(
            "function (c, a) {{ return {}1{} }}",
            "(".repeat(3000),
            ")".repeat(3000)
        );
        assert_eq!(
            parse(&deep).unwrap_err(),
            ScriptSyntaxError::Syntax {
                line: 1,
                message: "Maximum nesting depth exceeded".into()
            }
        );

        let negations = format!("function () {{ return {}true }}", "!".repeat(3000));
        assert!(matches!(parse(&negations), Err(ScriptSyntaxError::Syntax { .. })));

        let blocks = format!("function () {{ {}{} }}", "{".repeat(3000), "}".repeat(3000));
        assert!(matches!(parse(&blocks), Err(ScriptSyntaxError::Syntax { .. })));

        let shallow = format!("function () {{ return {}1{} }}", "(".repeat(20), ")".repeat(20));
        assert!(parse(&shallow).is_ok());
    }

    #[test]
    fn object_literals_accept_shorthand_and_quoted_keys() {
        let ast = parse("function () { return { a, 'b c': 2, d: 3, } }").unwrap();
        let Stmt::Return(Some(Expr::Object(fields))) = &ast.body[0] else {
            panic!("expected object");
        };
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b c", "d"]);
        assert_eq!(fields[0].1, Expr::Ident("a".into()));
    }
}
