//! Line-oriented parser for the netlist language.

use std::collections::HashMap;

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::error::{Result, WdfError};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// Parse the whole input.
    pub fn parse(&mut self) -> Result<CircuitAst> {
        let mut ast = CircuitAst::new();

        loop {
            match self.current.kind {
                TokenKind::Eof => break,
                TokenKind::Newline => {}
                TokenKind::Directive => self.parse_directive(&mut ast)?,
                TokenKind::Identifier => {
                    let component = self.parse_component()?;
                    ast.components.push(component);
                }
                _ => {
                    return Err(WdfError::parse(
                        self.current.line,
                        format!("unexpected '{}' at start of line", self.current.text),
                    ))
                }
            }
            self.end_of_line()?;
        }

        Ok(ast)
    }

    fn advance(&mut self) -> Result<Token> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn at_line_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn end_of_line(&mut self) -> Result<()> {
        match self.current.kind {
            TokenKind::Newline => {
                self.advance()?;
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(WdfError::parse(
                self.current.line,
                format!("unexpected '{}'", self.current.text),
            )),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.current.kind == kind {
            self.advance()
        } else {
            Err(WdfError::parse(
                self.current.line,
                format!("expected {what}, found '{}'", self.current.text),
            ))
        }
    }

    fn number(&mut self, what: &str) -> Result<f64> {
        let tok = self.expect(TokenKind::Number, what)?;
        parse_value(&tok.text)
            .ok_or_else(|| WdfError::parse(tok.line, format!("invalid number '{}'", tok.text)))
    }

    fn parse_directive(&mut self, ast: &mut CircuitAst) -> Result<()> {
        let directive = self.advance()?;
        match directive.text.to_ascii_lowercase().as_str() {
            ".title" => {
                let title = if self.current.kind == TokenKind::Text {
                    self.advance()?.text
                } else {
                    String::new()
                };
                ast.title = Some(title);
            }
            ".samplerate" => {
                let rate = self.number("a sample rate")?;
                if !(rate.is_finite() && rate > 0.0) {
                    return Err(WdfError::parse(
                        directive.line,
                        format!("sample rate must be positive, got {rate}"),
                    ));
                }
                ast.sample_rate = Some(rate);
            }
            ".model" => {
                let model = self.parse_model(directive.line)?;
                if ast.models.contains_key(&model.name) {
                    return Err(WdfError::DuplicateModel { name: model.name });
                }
                ast.models.insert(model.name.clone(), model);
            }
            other => {
                return Err(WdfError::parse(
                    directive.line,
                    format!("unknown directive '{other}'"),
                ))
            }
        }
        Ok(())
    }

    /// `.model NAME TYPE (key=value ...)`
    fn parse_model(&mut self, line: usize) -> Result<ModelDef> {
        let name = self.expect(TokenKind::Identifier, "a model name")?.text;
        let kind = self.expect(TokenKind::Identifier, "a model type")?.text;
        let model_type = ModelType::from_name(&kind)
            .ok_or_else(|| WdfError::parse(line, format!("unknown model type '{kind}'")))?;

        let mut params = HashMap::new();
        if self.current.kind == TokenKind::OpenParen {
            self.advance()?;
            while self.current.kind != TokenKind::CloseParen {
                if self.at_line_end() {
                    return Err(WdfError::parse(line, "unclosed parameter list"));
                }
                let (key, value) = self.key_value()?;
                params.insert(key, value);
            }
            self.advance()?;
        }

        Ok(ModelDef {
            name,
            model_type,
            params,
            line,
        })
    }

    fn key_value(&mut self) -> Result<(String, f64)> {
        let key = self.expect(TokenKind::Identifier, "a parameter name")?.text;
        self.expect(TokenKind::Equals, "'='")?;
        let value = self.number("a parameter value")?;
        Ok((key.to_ascii_lowercase(), value))
    }

    fn node(&mut self) -> Result<String> {
        match self.current.kind {
            TokenKind::Identifier | TokenKind::Number => {
                let text = self.advance()?.text;
                if text.eq_ignore_ascii_case("gnd") {
                    Ok("0".to_string())
                } else {
                    Ok(text)
                }
            }
            _ => Err(WdfError::parse(
                self.current.line,
                format!("expected a node name, found '{}'", self.current.text),
            )),
        }
    }

    /// `NAME n+ n- [value] [AC amp | DC v] [key=value ...] [model] [input] [output]`
    fn parse_component(&mut self) -> Result<ComponentDef> {
        let name_token = self.advance()?;
        let line = name_token.line;
        let name = name_token.text;
        let component_type =
            ComponentType::from_name(&name).ok_or_else(|| WdfError::UnknownComponentType {
                component_type: name.clone(),
                line,
            })?;

        if self.at_line_end() {
            return Err(WdfError::parse(line, format!("{name} needs two nodes")));
        }
        let positive = self.node()?;
        if self.at_line_end() {
            return Err(WdfError::parse(line, format!("{name} needs two nodes")));
        }
        let negative = self.node()?;

        let mut def = ComponentDef {
            component_type,
            name,
            nodes: vec![positive, negative],
            value: None,
            source: None,
            model_ref: None,
            params: HashMap::new(),
            options: Default::default(),
            line,
        };

        while !self.at_line_end() {
            if self.current.kind == TokenKind::Number {
                let value = self.number("a value")?;
                if def.value.replace(value).is_some() {
                    return Err(WdfError::parse(line, format!("{} has two values", def.name)));
                }
                continue;
            }

            let word = self.expect(TokenKind::Identifier, "a value, keyword or parameter")?;
            if self.current.kind == TokenKind::Equals {
                self.advance()?;
                let value = self.number("a parameter value")?;
                def.params.insert(word.text.to_ascii_lowercase(), value);
                continue;
            }

            match word.text.to_ascii_lowercase().as_str() {
                "ac" | "dc" if component_type.is_source() => {
                    let value = self.number("a source value")?;
                    def.source = Some(if word.text.eq_ignore_ascii_case("ac") {
                        SourceType::Ac(value)
                    } else {
                        SourceType::Dc(value)
                    });
                }
                "input" => def.options.input = true,
                "output" => def.options.output = true,
                _ if component_type.takes_model() && def.model_ref.is_none() => {
                    def.model_ref = Some(word.text);
                }
                _ => {
                    return Err(WdfError::parse(
                        line,
                        format!("unexpected '{}' in {}", word.text, def.name),
                    ))
                }
            }
        }

        Ok(def)
    }
}
