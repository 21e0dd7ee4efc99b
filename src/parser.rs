use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::{Argument, BinaryOp, CallTarget, FunctionDef, IntrinsicKind, Node, ScopeFrame};
use crate::error::{Diagnostic, OrganicError, OrganicResult};
use crate::location::SourceLocation;
use crate::source_path;
use crate::token::{EnumLiteral, Token, TokenKind, Tokenizer};

/// State shared across an entire parse, including every file pulled in by
/// `include(...)`: the set of canonicalized included paths (so a file
/// reached by two different relative routes is still recognized) and the
/// accumulated non-fatal diagnostics.
pub struct ParseSession {
    pub included: HashSet<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseSession {
    pub fn new() -> Self {
        Self {
            included: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }
}

impl Default for ParseSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses one file's token stream into an AST, resolving includes by
/// recursing into fresh `Parser` instances that share the session above.
pub struct Parser {
    path: Rc<str>,
    file_path: PathBuf,
    tokens: Vec<Token>,
    pos: usize,
    scopes: Vec<ScopeFrame>,
}

pub fn parse_program(path: &Path) -> OrganicResult<(Node, Vec<Diagnostic>)> {
    let mut session = ParseSession::new();
    let canonical = source_path::canonicalize(path);
    session.included.insert(canonical);
    let (node, _scope) = parse_file(path, &mut session)?;
    Ok((node, session.diagnostics))
}

fn parse_file(path: &Path, session: &mut ParseSession) -> OrganicResult<(Node, ScopeFrame)> {
    let source = source_path::read_to_string(path)?;
    let path_str: Rc<str> = path.to_string_lossy().into_owned().into();
    let tokens = Tokenizer::new(path_str.clone(), &source).tokenize()?;
    let mut parser = Parser {
        path: path_str,
        file_path: path.to_path_buf(),
        tokens,
        pos: 0,
        scopes: vec![ScopeFrame::new()],
    };
    let program = parser.parse_top_level(session)?;
    let root_scope = parser.scopes.remove(0);
    Ok((program, root_scope))
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or_else(|| self.tokens.last().unwrap())
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn error(&self, message: impl Into<String>) -> OrganicError {
        OrganicError::parse(self.peek().location.clone(), message)
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> OrganicResult<Token> {
        if std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn current_frame(&self) -> &ScopeFrame {
        self.scopes.last().unwrap()
    }

    fn current_frame_mut(&mut self) -> &mut ScopeFrame {
        self.scopes.last_mut().unwrap()
    }

    fn check_reserved(&self, name: &str) -> OrganicResult<()> {
        if IntrinsicKind::from_name(name).is_some() {
            Err(self.error(format!("'{name}' is a reserved name")))
        } else {
            Ok(())
        }
    }

    /// Walks inputs -> variables -> functions -> parent, innermost scope
    /// first, matching `ParserContext::findIdentifier`.
    fn find_identifier(&self, name: &str, location: &SourceLocation) -> Option<Node> {
        for frame in self.scopes.iter().rev() {
            if frame.has_input(name) {
                return Some(Node::InputRef {
                    name: name.to_string(),
                    location: location.clone(),
                });
            }
            if frame.has_variable(name) {
                return Some(Node::VariableRef {
                    name: name.to_string(),
                    location: location.clone(),
                });
            }
            if frame.find_function(name).is_some() {
                return Some(Node::FunctionRef {
                    name: name.to_string(),
                    location: location.clone(),
                });
            }
        }
        None
    }

    fn find_function(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|frame| frame.find_function(name).is_some())
    }

    fn find_input(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|frame| frame.has_input(name))
    }

    // ---- top level -----------------------------------------------------

    fn parse_top_level(&mut self, session: &mut ParseSession) -> OrganicResult<Node> {
        let start_location = self.peek().location.clone();
        let mut instructions = Vec::new();
        let mut seen_non_include = false;

        while !self.at_eof() {
            if self.looks_like_include() {
                if seen_non_include {
                    return Err(self.error("include must appear before any other instruction"));
                }
                instructions.push(self.parse_include(session)?);
                continue;
            }
            seen_non_include = true;
            instructions.push(self.parse_instruction()?);
        }

        Ok(Node::Program {
            instructions,
            location: start_location,
        })
    }

    fn looks_like_include(&self) -> bool {
        matches!(&self.peek().kind, TokenKind::Identifier(name) if name == "include")
            && matches!(self.peek_at(1).kind, TokenKind::OpenParen)
    }

    fn parse_include(&mut self, session: &mut ParseSession) -> OrganicResult<Node> {
        let location = self.peek().location.clone();
        self.advance(); // `include`
        self.expect(&TokenKind::OpenParen, "'('")?;
        let literal_token = self.advance();
        let literal = match literal_token.kind {
            TokenKind::Str(s) => s,
            _ => return Err(self.error("include expects a string literal path")),
        };
        self.expect(&TokenKind::CloseParen, "')'")?;

        let resolved = source_path::resolve_include(&literal, &self.file_path);
        let canonical = source_path::canonicalize(&resolved);

        if session.included.contains(&canonical) {
            session.diagnostics.push(Diagnostic::new(
                location.clone(),
                format!("duplicate include of '{}'", resolved.display()),
            ));
            return Ok(Node::Include {
                program: None,
                location,
            });
        }

        session.included.insert(canonical);
        let (child_program, child_scope) = parse_file(&resolved, session)?;
        self.merge_scope(child_scope, &location)?;

        Ok(Node::Include {
            program: Some(Box::new(child_program)),
            location,
        })
    }

    fn merge_scope(&mut self, incoming: ScopeFrame, location: &SourceLocation) -> OrganicResult<()> {
        let current = self.current_frame_mut();
        for variable in incoming.variables {
            if current.has_variable(&variable) {
                return Err(OrganicError::include(
                    location.clone(),
                    format!("included file redefines variable '{variable}'"),
                ));
            }
            current.variables.push(variable);
        }
        for function in incoming.functions {
            if current.find_function(&function.name).is_some() {
                return Err(OrganicError::include(
                    location.clone(),
                    format!("included file redefines function '{}'", function.name),
                ));
            }
            current.functions.push(function);
        }
        Ok(())
    }

    // ---- instructions ----------------------------------------------------

    fn parse_instruction(&mut self) -> OrganicResult<Node> {
        if let TokenKind::Identifier(name) = &self.peek().kind {
            let name = name.clone();
            if matches!(self.peek_at(1).kind, TokenKind::Equals) {
                return self.parse_assign(name);
            }
            if matches!(self.peek_at(1).kind, TokenKind::OpenParen) && self.looks_like_define() {
                return self.parse_define(name);
            }
        }
        self.parse_top_level_expression()
    }

    /// A `name(params) = { ... }` define is distinguished from a call by
    /// scanning past the balanced parameter list for `=` `{`.
    fn looks_like_define(&self) -> bool {
        let mut depth = 0i32;
        let mut i = self.pos + 1;
        loop {
            match self.tokens.get(i).map(|t| &t.kind) {
                Some(TokenKind::OpenParen) => depth += 1,
                Some(TokenKind::CloseParen) => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(
                            (self.tokens.get(i + 1).map(|t| &t.kind), self.tokens.get(i + 2).map(|t| &t.kind)),
                            (Some(TokenKind::Equals), Some(TokenKind::OpenBrace))
                        );
                    }
                }
                Some(TokenKind::Eof) | None => return false,
                _ => {}
            }
            i += 1;
        }
    }

    fn parse_assign(&mut self, name: String) -> OrganicResult<Node> {
        let location = self.peek().location.clone();
        self.check_reserved(&name)?;
        self.advance(); // name
        self.advance(); // =
        let value = self.parse_expression()?;
        if !self.current_frame().has_variable(&name) {
            self.current_frame_mut().variables.push(name.clone());
        }
        Ok(Node::Assign {
            variable: name,
            value: Box::new(value),
            location,
        })
    }

    fn parse_define(&mut self, name: String) -> OrganicResult<Node> {
        let location = self.peek().location.clone();
        self.check_reserved(&name)?;
        if self.find_function(&name) {
            return Err(self.error(format!("function '{name}' is already defined")));
        }
        self.advance(); // name
        self.expect(&TokenKind::OpenParen, "'('")?;
        let mut params = Vec::new();
        if !matches!(self.peek().kind, TokenKind::CloseParen) {
            loop {
                let param = self.expect_identifier()?;
                params.push(param);
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(&TokenKind::CloseParen, "')'")?;
        self.expect(&TokenKind::Equals, "'='")?;
        self.expect(&TokenKind::OpenBrace, "'{'")?;

        // Register the function before parsing its body so the body can
        // call itself.
        self.current_frame_mut().functions.push(FunctionDef {
            name: name.clone(),
            params: params.clone(),
            body: Vec::new(),
            location: location.clone(),
        });

        let mut frame = ScopeFrame::with_function(name.clone());
        frame.inputs = params.clone();
        self.scopes.push(frame);

        let mut body = Vec::new();
        while !matches!(self.peek().kind, TokenKind::CloseBrace) {
            if self.at_eof() {
                return Err(self.error("unterminated function body"));
            }
            body.push(self.parse_instruction()?);
        }
        self.advance(); // '}'
        self.scopes.pop();

        let outer = self.current_frame_mut();
        let stub = outer
            .functions
            .iter_mut()
            .rev()
            .find(|f| f.name == name)
            .expect("function stub registered above");
        stub.body = body.clone();

        Ok(Node::Define {
            name,
            inputs: params,
            body,
            location,
        })
    }

    fn expect_identifier(&mut self) -> OrganicResult<String> {
        match self.advance().kind {
            TokenKind::Identifier(name) => Ok(name),
            _ => Err(self.error("expected identifier")),
        }
    }

    /// A bare audio-source call at top level is automatically wrapped in
    /// `play(...)`.
    fn parse_top_level_expression(&mut self) -> OrganicResult<Node> {
        let expr = self.parse_expression()?;
        if let Node::Call { target, top_level, .. } = &expr {
            if *top_level {
                if let CallTarget::Intrinsic(kind) = target {
                    if kind.is_audio_source() {
                        let location = expr.location().clone();
                        return Ok(Node::Call {
                            target: CallTarget::Intrinsic(IntrinsicKind::Play),
                            arguments: vec![Argument {
                                name: None,
                                value: Box::new(expr),
                                location: location.clone(),
                            }],
                            top_level: true,
                            location,
                        });
                    }
                }
            }
        }
        Ok(expr)
    }

    // ---- expressions -----------------------------------------------------

    fn parse_expression(&mut self) -> OrganicResult<Node> {
        if matches!(self.peek().kind, TokenKind::OpenBracket) {
            self.parse_list()
        } else {
            self.parse_terms()
        }
    }

    fn parse_list(&mut self) -> OrganicResult<Node> {
        let location = self.peek().location.clone();
        self.advance(); // '['
        let mut values = Vec::new();
        if !matches!(self.peek().kind, TokenKind::CloseBracket) {
            loop {
                values.push(self.parse_terms()?);
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(&TokenKind::CloseBracket, "']'")?;
        if values.is_empty() {
            return Err(OrganicError::parse(location, "list must not be empty"));
        }
        Ok(Node::List { values, location })
    }

    /// Four-pass left-to-right fold matching the source's `parseTerms`:
    /// comparison (checked not to chain), power, multiplicative, additive.
    /// This is not generic precedence climbing: each pass is a flat,
    /// left-to-right scan, so chained same-precedence operators associate
    /// left exactly as the source does.
    fn parse_terms(&mut self) -> OrganicResult<Node> {
        let mut atoms = vec![self.parse_term()?];
        let mut ops: Vec<(BinaryOp, SourceLocation)> = Vec::new();

        loop {
            let op = match &self.peek().kind {
                TokenKind::EqualEqual => BinaryOp::Equal,
                TokenKind::Less => BinaryOp::Less,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Caret => BinaryOp::Power,
                _ => break,
            };
            let location = self.peek().location.clone();
            self.advance();
            ops.push((op, location));
            atoms.push(self.parse_term()?);
        }

        self.fold_comparison(&mut atoms, &mut ops)?;
        self.fold_pass(&mut atoms, &mut ops, &[BinaryOp::Power]);
        self.fold_pass(&mut atoms, &mut ops, &[BinaryOp::Multiply, BinaryOp::Divide]);
        self.fold_pass(&mut atoms, &mut ops, &[BinaryOp::Add, BinaryOp::Subtract]);

        debug_assert_eq!(atoms.len(), 1);
        Ok(atoms.into_iter().next().unwrap())
    }

    fn fold_comparison(
        &self,
        atoms: &mut Vec<Node>,
        ops: &mut Vec<(BinaryOp, SourceLocation)>,
    ) -> OrganicResult<()> {
        let is_comparison = |op: BinaryOp| {
            matches!(
                op,
                BinaryOp::Equal | BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEqual | BinaryOp::GreaterEqual
            )
        };
        let count = ops.iter().filter(|(op, _)| is_comparison(*op)).count();
        if count > 1 {
            let (_, location) = ops.iter().find(|(op, _)| is_comparison(*op)).unwrap().clone();
            return Err(OrganicError::parse(location, "comparison operators do not chain"));
        }
        self.fold_pass(
            atoms,
            ops,
            &[
                BinaryOp::Equal,
                BinaryOp::Less,
                BinaryOp::Greater,
                BinaryOp::LessEqual,
                BinaryOp::GreaterEqual,
            ],
        );
        Ok(())
    }

    fn fold_pass(&self, atoms: &mut Vec<Node>, ops: &mut Vec<(BinaryOp, SourceLocation)>, matching: &[BinaryOp]) {
        let mut i = 0;
        while i < ops.len() {
            if matching.contains(&ops[i].0) {
                let (op, location) = ops.remove(i);
                let right = atoms.remove(i + 1);
                let left = atoms.remove(i);
                atoms.insert(
                    i,
                    Node::BinaryOp {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                        location,
                    },
                );
            } else {
                i += 1;
            }
        }
    }

    fn parse_term(&mut self) -> OrganicResult<Node> {
        match &self.peek().kind {
            TokenKind::OpenParen => {
                let location = self.peek().location.clone();
                self.advance();
                let inner = self.parse_terms()?;
                self.expect(&TokenKind::CloseParen, "')'")?;
                Ok(Node::Paren {
                    inner: Box::new(inner),
                    location,
                })
            }
            TokenKind::Value(v) => {
                let value = *v;
                let location = self.peek().location.clone();
                self.advance();
                Ok(Node::Value { value, location })
            }
            TokenKind::Str(s) => {
                let value = s.clone();
                let location = self.peek().location.clone();
                self.advance();
                Ok(Node::Str { value, location })
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let location = self.peek().location.clone();
                if matches!(self.peek_at(1).kind, TokenKind::OpenParen) {
                    self.parse_call(name, location)
                } else {
                    self.advance();
                    self.find_identifier(&name, &location)
                        .ok_or_else(|| OrganicError::parse(location.clone(), format!("unknown identifier '{name}'")))
                }
            }
            TokenKind::Enum(literal) => {
                let literal = *literal;
                let location = self.peek().location.clone();
                self.advance();
                Ok(enum_literal_value(literal, location))
            }
            _ => Err(self.error("expected an expression")),
        }
    }

    fn parse_call(&mut self, name: String, location: SourceLocation) -> OrganicResult<Node> {
        self.advance(); // name
        self.expect(&TokenKind::OpenParen, "'('")?;

        let target = if let Some(kind) = IntrinsicKind::from_name(&name) {
            CallTarget::Intrinsic(kind)
        } else if self.find_function(&name) || self.find_input(&name) {
            CallTarget::User(name.clone())
        } else {
            return Err(OrganicError::parse(location, format!("unknown identifier '{name}'")));
        };

        let mut arguments = Vec::new();
        if !matches!(self.peek().kind, TokenKind::CloseParen) {
            loop {
                arguments.push(self.parse_argument()?);
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(&TokenKind::CloseParen, "')'")?;

        Ok(Node::Call {
            target,
            arguments,
            top_level: true,
            location,
        })
    }

    fn parse_argument(&mut self) -> OrganicResult<Argument> {
        let location = self.peek().location.clone();
        let name = if matches!(self.peek().kind, TokenKind::Identifier(_)) && matches!(self.peek_at(1).kind, TokenKind::Colon) {
            let name = self.expect_identifier()?;
            self.advance(); // ':'
            Some(name)
        } else {
            None
        };
        let mut value = self.parse_expression()?;
        if let Node::Call { top_level, .. } = &mut value {
            *top_level = false;
        }
        Ok(Argument {
            name,
            value: Box::new(value),
            location,
        })
    }
}

fn enum_literal_value(literal: EnumLiteral, location: SourceLocation) -> Node {
    // Enum literals are folded straight to a numeric tag the bytecode
    // emitter and VM agree on; they never participate in arithmetic.
    let tag = match literal {
        EnumLiteral::SequenceForwards => 0.0,
        EnumLiteral::SequenceBackwards => 1.0,
        EnumLiteral::SequencePingPong => 2.0,
        EnumLiteral::SequenceRandom => 3.0,
        EnumLiteral::RandomStep => 0.0,
        EnumLiteral::RandomLinear => 1.0,
        EnumLiteral::RoundNearest => 0.0,
        EnumLiteral::RoundUp => 1.0,
        EnumLiteral::RoundDown => 2.0,
    };
    Node::Value { value: tag, location }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse_source(src: &str) -> Node {
        let mut dir = std::env::temp_dir();
        dir.push(format!("organic-parser-test-{}.organic", std::process::id()));
        let mut file = std::fs::File::create(&dir).unwrap();
        file.write_all(src.as_bytes()).unwrap();
        let (node, _diagnostics) = parse_program(&dir).unwrap();
        std::fs::remove_file(&dir).ok();
        node
    }

    #[test]
    fn empty_file_parses_to_empty_program() {
        let node = parse_source("");
        match node {
            Node::Program { instructions, location } => {
                assert!(instructions.is_empty());
                assert_eq!(location.line, 1);
                assert_eq!(location.column, 1);
            }
            _ => panic!("expected Program"),
        }
    }

    #[test]
    fn bare_audio_source_call_is_wrapped_in_play() {
        let node = parse_source("sine(volume: 1, frequency: 440)");
        match node {
            Node::Program { instructions, .. } => {
                assert_eq!(instructions.len(), 1);
                match &instructions[0] {
                    Node::Call { target, arguments, .. } => {
                        assert_eq!(*target, CallTarget::Intrinsic(IntrinsicKind::Play));
                        assert_eq!(arguments.len(), 1);
                    }
                    _ => panic!("expected Call"),
                }
            }
            _ => panic!("expected Program"),
        }
    }

    #[test]
    fn comparison_operators_do_not_chain() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("organic-parser-chain-{}.organic", std::process::id()));
        std::fs::write(&dir, "x = 1 < 2 < 3").unwrap();
        let result = parse_program(&dir);
        std::fs::remove_file(&dir).ok();
        assert!(result.is_err());
    }

    #[test]
    fn reserved_names_cannot_be_assigned() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("organic-parser-reserved-{}.organic", std::process::id()));
        std::fs::write(&dir, "sine = 1").unwrap();
        let result = parse_program(&dir);
        std::fs::remove_file(&dir).ok();
        assert!(result.is_err());
    }

    #[test]
    fn left_to_right_fold_matches_additive_associativity() {
        let node = parse_source("x = 1 - 2 - 3");
        match node {
            Node::Program { instructions, .. } => match &instructions[0] {
                Node::Assign { value, .. } => match value.as_ref() {
                    Node::BinaryOp { op, left, .. } => {
                        assert_eq!(*op, BinaryOp::Subtract);
                        // left should itself be (1 - 2), i.e. left-associative.
                        assert!(matches!(left.as_ref(), Node::BinaryOp { op: BinaryOp::Subtract, .. }));
                    }
                    _ => panic!("expected BinaryOp"),
                },
                _ => panic!("expected Assign"),
            },
            _ => panic!("expected Program"),
        }
    }
}
