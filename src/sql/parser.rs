use crate::data::datatable::DataValue;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    Like,
    Is,
    Null,
    True,
    False,
    OrderBy,
    Asc,
    Desc,
    Limit,
    Offset,
    As,
    Describe,

    // Literals
    Identifier(String),
    QuotedIdentifier(String), // For "Customer Id" style identifiers
    StringLiteral(String),
    NumberLiteral(String),
    Star,

    // Operators
    Comma,
    LeftParen,
    RightParen,
    Semicolon,
    Minus,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,

    // Special
    Unknown(char),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Select => "SELECT",
            Token::From => "FROM",
            Token::Where => "WHERE",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "NOT",
            Token::Like => "LIKE",
            Token::Is => "IS",
            Token::Null => "NULL",
            Token::True => "TRUE",
            Token::False => "FALSE",
            Token::OrderBy => "ORDER BY",
            Token::Asc => "ASC",
            Token::Desc => "DESC",
            Token::Limit => "LIMIT",
            Token::Offset => "OFFSET",
            Token::As => "AS",
            Token::Describe => "DESCRIBE",
            Token::Identifier(s) | Token::NumberLiteral(s) => return write!(f, "\"{}\"", s),
            Token::QuotedIdentifier(s) => return write!(f, "\"\"{}\"\"", s),
            Token::StringLiteral(s) => return write!(f, "\"'{}'\"", s),
            Token::Unknown(ch) => return write!(f, "\"{}\"", ch),
            Token::Star => "*",
            Token::Comma => ",",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::Semicolon => ";",
            Token::Minus => "-",
            Token::Equal => "=",
            Token::NotEqual => "<>",
            Token::LessThan => "<",
            Token::GreaterThan => ">",
            Token::LessThanOrEqual => "<=",
            Token::GreaterThanOrEqual => ">=",
            Token::Eof => return write!(f, "end of input"),
        };
        write!(f, "\"{}\"", text)
    }
}

#[derive(Debug, Clone)]
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current = chars.first().copied();
        Self {
            input: chars,
            position: 0,
            current_char: current,
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '-' && self.peek(1) == Some('-') {
                // Line comment
                while let Some(c) = self.current_char {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Reads a quoted run; a doubled quote inside is an escaped quote.
    /// Returns `None` when the closing quote is missing.
    fn read_quoted(&mut self, quote_char: char) -> Option<String> {
        let mut result = String::new();
        self.advance(); // skip opening quote

        while let Some(ch) = self.current_char {
            if ch == quote_char {
                if self.peek(1) == Some(quote_char) {
                    result.push(ch);
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance(); // skip closing quote
                return Some(result);
            }
            result.push(ch);
            self.advance();
        }
        None
    }

    fn read_number(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() || ch == '.' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.current_char {
            None => Token::Eof,
            Some('*') => {
                self.advance();
                Token::Star
            }
            Some(',') => {
                self.advance();
                Token::Comma
            }
            Some('(') => {
                self.advance();
                Token::LeftParen
            }
            Some(')') => {
                self.advance();
                Token::RightParen
            }
            Some(';') => {
                self.advance();
                Token::Semicolon
            }
            Some('-') => {
                self.advance();
                Token::Minus
            }
            Some('=') => {
                self.advance();
                Token::Equal
            }
            Some('<') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::LessThanOrEqual
                } else if self.current_char == Some('>') {
                    self.advance();
                    Token::NotEqual
                } else {
                    Token::LessThan
                }
            }
            Some('>') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::GreaterThanOrEqual
                } else {
                    Token::GreaterThan
                }
            }
            Some('!') if self.peek(1) == Some('=') => {
                self.advance();
                self.advance();
                Token::NotEqual
            }
            Some('"') => match self.read_quoted('"') {
                Some(ident) => Token::QuotedIdentifier(ident),
                None => Token::Unknown('"'),
            },
            Some('\'') => match self.read_quoted('\'') {
                Some(value) => Token::StringLiteral(value),
                None => Token::Unknown('\''),
            },
            Some(ch) if ch.is_ascii_digit() => Token::NumberLiteral(self.read_number()),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                match ident.to_uppercase().as_str() {
                    "SELECT" => Token::Select,
                    "FROM" => Token::From,
                    "WHERE" => Token::Where,
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "LIKE" => Token::Like,
                    "IS" => Token::Is,
                    "NULL" => Token::Null,
                    "TRUE" => Token::True,
                    "FALSE" => Token::False,
                    "ORDER" if self.peek_keyword("BY") => {
                        self.skip_whitespace();
                        self.read_identifier(); // consume "BY"
                        Token::OrderBy
                    }
                    "ASC" => Token::Asc,
                    "DESC" => Token::Desc,
                    "LIMIT" => Token::Limit,
                    "OFFSET" => Token::Offset,
                    "AS" => Token::As,
                    "DESCRIBE" => Token::Describe,
                    _ => Token::Identifier(ident),
                }
            }
            Some(ch) => {
                self.advance();
                Token::Unknown(ch)
            }
        }
    }

    fn peek_keyword(&mut self, keyword: &str) -> bool {
        let saved_pos = self.position;
        let saved_char = self.current_char;

        self.skip_whitespace();
        let next_word = self.read_identifier();
        let matches = next_word.eq_ignore_ascii_case(keyword);

        self.position = saved_pos;
        self.current_char = saved_char;

        matches
    }
}

// AST Nodes
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Describe(SelectStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub columns: Vec<SelectItem>,
    pub from: TableSource,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByColumn>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Column { name: String, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Table(String),
    Subquery(Box<SelectStatement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByColumn {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(DataValue),
    Comparison {
        left: Box<Expr>,
        op: ComparisonOp,
        right: Box<Expr>,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// Recursive-descent parser over the [`Lexer`] token stream.
///
/// Errors carry the offending token as the engine reports it, e.g. `"FROM"`
/// or `end of input`.
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Self {
            lexer,
            current_token,
        }
    }

    fn advance(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    fn unexpected<T>(&self) -> Result<T, String> {
        Err(self.current_token.to_string())
    }

    fn consume(&mut self, expected: Token) -> Result<(), String> {
        if self.current_token == expected {
            self.advance();
            Ok(())
        } else {
            self.unexpected()
        }
    }

    /// Parse one statement with an optional trailing terminator
    pub fn parse(&mut self) -> Result<Statement, String> {
        let statement = if matches!(self.current_token, Token::Describe) {
            self.advance();
            Statement::Describe(self.parse_query_expression()?)
        } else {
            Statement::Select(self.parse_query_expression()?)
        };

        if matches!(self.current_token, Token::Semicolon) {
            self.advance();
        }
        if !matches!(self.current_token, Token::Eof) {
            return self.unexpected();
        }
        Ok(statement)
    }

    /// A SELECT, optionally wrapped in any number of parentheses
    fn parse_query_expression(&mut self) -> Result<SelectStatement, String> {
        if matches!(self.current_token, Token::LeftParen) {
            self.advance();
            let inner = self.parse_query_expression()?;
            self.consume(Token::RightParen)?;
            return Ok(inner);
        }
        self.parse_select_statement()
    }

    fn parse_select_statement(&mut self) -> Result<SelectStatement, String> {
        self.consume(Token::Select)?;

        let columns = self.parse_select_list()?;

        self.consume(Token::From)?;
        let from = self.parse_table_source()?;

        let where_clause = if matches!(self.current_token, Token::Where) {
            self.advance();
            Some(self.parse_or()?)
        } else {
            None
        };

        let order_by = if matches!(self.current_token, Token::OrderBy) {
            self.advance();
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        let limit = if matches!(self.current_token, Token::Limit) {
            self.advance();
            Some(self.parse_unsigned()?)
        } else {
            None
        };

        let offset = if matches!(self.current_token, Token::Offset) {
            self.advance();
            Some(self.parse_unsigned()?)
        } else {
            None
        };

        Ok(SelectStatement {
            columns,
            from,
            where_clause,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_unsigned(&mut self) -> Result<usize, String> {
        match &self.current_token {
            Token::NumberLiteral(num) => {
                let value = num.parse::<usize>().map_err(|_| self.current_token.to_string())?;
                self.advance();
                Ok(value)
            }
            _ => self.unexpected(),
        }
    }

    fn parse_select_list(&mut self) -> Result<Vec<SelectItem>, String> {
        let mut columns = Vec::new();
        loop {
            if matches!(self.current_token, Token::Star) {
                self.advance();
                columns.push(SelectItem::Wildcard);
            } else {
                let name = self.parse_identifier()?;
                let alias = self.parse_optional_alias(true)?;
                columns.push(SelectItem::Column { name, alias });
            }

            if matches!(self.current_token, Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(columns)
    }

    fn parse_identifier(&mut self) -> Result<String, String> {
        match &self.current_token {
            Token::Identifier(name) | Token::QuotedIdentifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => self.unexpected(),
        }
    }

    /// `[AS] alias`; a bare alias is only accepted where `allow_bare` is set
    fn parse_optional_alias(&mut self, allow_bare: bool) -> Result<Option<String>, String> {
        if matches!(self.current_token, Token::As) {
            self.advance();
            return self.parse_identifier().map(Some);
        }
        match &self.current_token {
            Token::Identifier(_) | Token::QuotedIdentifier(_) if allow_bare => {
                self.parse_identifier().map(Some)
            }
            _ => Ok(None),
        }
    }

    fn parse_table_source(&mut self) -> Result<TableSource, String> {
        if matches!(self.current_token, Token::LeftParen) {
            self.advance();
            let inner = self.parse_query_expression()?;
            self.consume(Token::RightParen)?;
            // Subquery aliases are accepted and ignored
            self.parse_optional_alias(true)?;
            return Ok(TableSource::Subquery(Box::new(inner)));
        }

        let name = self.parse_identifier()?;
        self.parse_optional_alias(true)?;
        Ok(TableSource::Table(name))
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderByColumn>, String> {
        let mut columns = Vec::new();
        loop {
            let column = self.parse_identifier()?;
            let direction = match self.current_token {
                Token::Asc => {
                    self.advance();
                    SortDirection::Asc
                }
                Token::Desc => {
                    self.advance();
                    SortDirection::Desc
                }
                _ => SortDirection::Asc,
            };
            columns.push(OrderByColumn { column, direction });

            if matches!(self.current_token, Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(columns)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while matches!(self.current_token, Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_not()?;
        while matches!(self.current_token, Token::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if matches!(self.current_token, Token::Not) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Expr, String> {
        let left = self.parse_primary()?;

        let op = match self.current_token {
            Token::Equal => Some(ComparisonOp::Equal),
            Token::NotEqual => Some(ComparisonOp::NotEqual),
            Token::LessThan => Some(ComparisonOp::LessThan),
            Token::LessThanOrEqual => Some(ComparisonOp::LessThanOrEqual),
            Token::GreaterThan => Some(ComparisonOp::GreaterThan),
            Token::GreaterThanOrEqual => Some(ComparisonOp::GreaterThanOrEqual),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_primary()?;
            return Ok(Expr::Comparison {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }

        match self.current_token {
            Token::Is => {
                self.advance();
                let negated = if matches!(self.current_token, Token::Not) {
                    self.advance();
                    true
                } else {
                    false
                };
                self.consume(Token::Null)?;
                Ok(Expr::IsNull {
                    expr: Box::new(left),
                    negated,
                })
            }
            Token::Like => {
                self.advance();
                let pattern = self.parse_primary()?;
                Ok(Expr::Like {
                    expr: Box::new(left),
                    pattern: Box::new(pattern),
                    negated: false,
                })
            }
            Token::Not => {
                self.advance();
                self.consume(Token::Like)?;
                let pattern = self.parse_primary()?;
                Ok(Expr::Like {
                    expr: Box::new(left),
                    pattern: Box::new(pattern),
                    negated: true,
                })
            }
            _ => Ok(left),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let expr = match &self.current_token {
            Token::Identifier(name) | Token::QuotedIdentifier(name) => Expr::Column(name.clone()),
            Token::StringLiteral(s) => Expr::Literal(DataValue::String(s.clone())),
            Token::NumberLiteral(num) => Expr::Literal(parse_number(num, false)?),
            Token::Minus => {
                self.advance();
                return match &self.current_token {
                    Token::NumberLiteral(num) => {
                        let value = parse_number(num, true)?;
                        self.advance();
                        Ok(Expr::Literal(value))
                    }
                    _ => self.unexpected(),
                };
            }
            Token::True => Expr::Literal(DataValue::Boolean(true)),
            Token::False => Expr::Literal(DataValue::Boolean(false)),
            Token::Null => Expr::Literal(DataValue::Null),
            Token::LeftParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.consume(Token::RightParen)?;
                return Ok(inner);
            }
            _ => return self.unexpected(),
        };
        self.advance();
        Ok(expr)
    }
}

fn parse_number(text: &str, negative: bool) -> Result<DataValue, String> {
    let signed = if negative {
        format!("-{}", text)
    } else {
        text.to_string()
    };
    if let Ok(i) = signed.parse::<i64>() {
        return Ok(DataValue::Integer(i));
    }
    signed
        .parse::<f64>()
        .map(DataValue::Float)
        .map_err(|_| format!("\"{}\"", text))
}

/// Parse a full statement
pub fn parse_statement(sql: &str) -> Result<Statement, String> {
    Parser::new(sql).parse()
}
