//! Boolean expression grammar: comparisons combined with `&&`/`||` at a
//! single precedence level, evaluated strictly left-to-right with
//! short-circuiting (§4.K, §6). Parses once into a closure tree per the
//! "parse once into a closure tree" design note (§9).

use crate::error::{ExprError, Result};
use crate::lexer::{tokenize, Token};
use crate::path::PropertyPath;
use crate::value::Value;
use media_dedup_common::Media;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    And,
    Or,
}

enum Node {
    Compare { path: PropertyPath, op: CmpOp, rhs: Value },
    IsNull(PropertyPath),
    IsEmpty(PropertyPath),
    Truthy(PropertyPath),
    Not(Box<Node>),
    Chain(Box<Node>, Vec<(Combinator, Node)>),
}

impl Node {
    fn eval(&self, media: &Media) -> Result<bool> {
        Ok(match self {
            Node::Compare { path, op, rhs } => {
                let lhs = path.extract(media);
                match op {
                    CmpOp::Eq => lhs.as_str() == rhs.as_str(),
                    CmpOp::Ne => lhs.as_str() != rhs.as_str(),
                    CmpOp::Lt => lhs.compare(rhs) == std::cmp::Ordering::Less,
                    CmpOp::Le => lhs.compare(rhs) != std::cmp::Ordering::Greater,
                    CmpOp::Gt => lhs.compare(rhs) == std::cmp::Ordering::Greater,
                    CmpOp::Ge => lhs.compare(rhs) != std::cmp::Ordering::Less,
                    CmpOp::Match => {
                        let pattern = rhs.as_str();
                        let re = Regex::new(&pattern).map_err(|e| ExprError::BadRegex(pattern.clone(), e))?;
                        re.is_match(&lhs.as_str())
                    }
                }
            }
            Node::IsNull(path) => path.extract(media).is_null(),
            Node::IsEmpty(path) => path.extract(media).is_empty(),
            Node::Truthy(path) => {
                let v = path.extract(media);
                !v.is_empty() && v.as_str() != "false" && v.as_str() != "0"
            }
            Node::Not(inner) => !inner.eval(media)?,
            Node::Chain(first, rest) => {
                let mut acc = first.eval(media)?;
                for (combinator, node) in rest {
                    acc = match combinator {
                        Combinator::And => acc && node.eval(media)?,
                        Combinator::Or => acc || node.eval(media)?,
                    };
                }
                acc
            }
        })
    }
}

/// A parsed, reusable expression. `matches` can be called once per
/// candidate without re-parsing.
pub struct Expression {
    root: Node,
}

impl Expression {
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.parse_chain()?;
        if parser.pos != parser.tokens.len() {
            return Err(ExprError::UnexpectedToken(format!("{:?}", parser.tokens[parser.pos])));
        }
        Ok(Expression { root })
    }

    pub fn matches(&self, media: &Media) -> Result<bool> {
        self.root.eval(media)
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_chain(&mut self) -> Result<Node> {
        let first = self.parse_unary()?;
        let mut rest = Vec::new();
        loop {
            let combinator = match self.peek() {
                Some(Token::And) => Combinator::And,
                Some(Token::Or) => Combinator::Or,
                _ => break,
            };
            self.advance();
            let node = self.parse_unary()?;
            rest.push((combinator, node));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Node::Chain(Box::new(first), rest))
        }
    }

    fn parse_unary(&mut self) -> Result<Node> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            return Ok(Node::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Node> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.advance();
            let inner = self.parse_chain()?;
            match self.advance() {
                Some(Token::RParen) => return Ok(inner),
                _ => return Err(ExprError::UnexpectedToken(")".into())),
            }
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let path_str = match self.advance() {
            Some(Token::Ident(s)) => s,
            other => return Err(ExprError::UnexpectedToken(format!("{other:?}"))),
        };
        let path = PropertyPath::parse(&path_str)?;
        let op = match self.peek() {
            Some(Token::Eq) => Some(CmpOp::Eq),
            Some(Token::Ne) => Some(CmpOp::Ne),
            Some(Token::Lt) => Some(CmpOp::Lt),
            Some(Token::Le) => Some(CmpOp::Le),
            Some(Token::Gt) => Some(CmpOp::Gt),
            Some(Token::Ge) => Some(CmpOp::Ge),
            Some(Token::Match) => Some(CmpOp::Match),
            Some(Token::IsNull) => {
                self.advance();
                return Ok(Node::IsNull(path));
            }
            Some(Token::IsEmpty) => {
                self.advance();
                return Ok(Node::IsEmpty(path));
            }
            _ => None,
        };
        let Some(op) = op else {
            return Ok(Node::Truthy(path));
        };
        self.advance();
        let rhs = match self.advance() {
            Some(Token::Ident(s)) => literal_value(&s),
            Some(Token::StringLit(s)) => Value::Str(s),
            other => return Err(ExprError::UnexpectedToken(format!("{other:?}"))),
        };
        Ok(Node::Compare { path, op, rhs })
    }
}

fn literal_value(s: &str) -> Value {
    if let Ok(i) = s.parse::<i64>() {
        Value::Int(i)
    } else if let Ok(f) = s.parse::<f64>() {
        Value::Float(f)
    } else {
        Value::Str(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_dedup_common::MediaType;
    use std::path::PathBuf;

    fn media(width: u32, path: &str) -> Media {
        let mut m = Media::new(PathBuf::from(path), MediaType::Image);
        m.width = width;
        m
    }

    #[test]
    fn simple_numeric_comparison() {
        let expr = Expression::parse("width >= 100").unwrap();
        assert!(expr.matches(&media(200, "/a")).unwrap());
        assert!(!expr.matches(&media(50, "/a")).unwrap());
    }

    #[test]
    fn left_to_right_and_or_chain_has_no_precedence() {
        // (false && true) || true -> true, evaluated strictly left to right
        let expr = Expression::parse("width >= 999 && width >= 0 || width >= 0").unwrap();
        assert!(expr.matches(&media(10, "/a")).unwrap());
    }

    #[test]
    fn unary_not_negates() {
        let expr = Expression::parse("!(width >= 100)").unwrap();
        assert!(expr.matches(&media(10, "/a")).unwrap());
    }

    #[test]
    fn regex_match_operator() {
        let expr = Expression::parse("path ~ \"\\.jpg$\"").unwrap();
        assert!(expr.matches(&media(1, "/a/b.jpg")).unwrap());
        assert!(!expr.matches(&media(1, "/a/b.png")).unwrap());
    }

    #[test]
    fn is_empty_unary() {
        let mut m = media(1, "/a");
        m.attributes.insert("tag".into(), String::new());
        let expr = Expression::parse("tag%empty").unwrap();
        assert!(expr.matches(&m).unwrap());
    }

    #[test]
    fn is_null_unary_on_missing_attribute() {
        let expr = Expression::parse("missing_attr%null").unwrap();
        assert!(expr.matches(&media(1, "/a")).unwrap());
    }
}
